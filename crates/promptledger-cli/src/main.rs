use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "promptledger",
    version,
    about = "Record the evolving prompt of LLM sessions as Git-native, append-only history"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    #[command(subcommand)]
    command: commands::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        commands::Commands::Init(args) => commands::init::run(args),
        commands::Commands::Create(args) => commands::create::run(args, cli.format),
        commands::Commands::Append(args) => commands::append::run(args, cli.format),
        commands::Commands::Prompt(args) => commands::prompt::run(args),
        commands::Commands::Sessions(args) => commands::sessions::run(args, cli.format),
        commands::Commands::Show(args) => commands::show::run(args, cli.format),
        commands::Commands::History(args) => commands::history::run(args, cli.format),
        commands::Commands::ToolCalls(args) => commands::tool_calls::run(args, cli.format),
        commands::Commands::Status(args) => commands::status::run(args, cli.format),
        commands::Commands::Extract(args) => commands::extract::run(args, cli.format),
        commands::Commands::Stats => commands::stats::run(cli.format),
        commands::Commands::Mcp => commands::mcp::run(),
        commands::Commands::Version => commands::version::run(),
    }
}
