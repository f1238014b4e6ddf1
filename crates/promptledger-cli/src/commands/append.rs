use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use promptledger_core::model::Fragment;

use crate::output::OutputFormat;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AppendKind {
    UserInput,
    SystemMarker,
    LlmOutput,
}

#[derive(Args)]
pub struct AppendArgs {
    /// Session key
    pub key: String,

    /// What is being appended
    #[arg(long)]
    pub kind: AppendKind,

    /// Text to append; `-` or omitted reads stdin (ignored for system-marker)
    pub payload: Option<String>,

    /// Reason carried by a system marker
    #[arg(long)]
    pub reason: Option<String>,
}

pub fn run(args: &AppendArgs, format: OutputFormat) -> Result<()> {
    let ledger = super::open_ledger()?;

    let fragment = match args.kind {
        AppendKind::UserInput => Fragment::UserInput(super::read_payload(args.payload.as_deref())?),
        AppendKind::LlmOutput => Fragment::LlmOutput(super::read_payload(args.payload.as_deref())?),
        AppendKind::SystemMarker => Fragment::SystemMarker {
            reason: args.reason.clone().unwrap_or_default(),
        },
    };

    let appended = ledger
        .append_fragment(&args.key, fragment)
        .with_context(|| format!("Failed to append to session '{}'", args.key))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&appended)?),
        OutputFormat::Text => {
            println!(
                "Appended #{} to {} ({} chars)",
                appended.sequence, args.key, appended.new_length
            );
            if appended.tool_calls_extracted > 0 {
                println!("Extracted {} tool call(s)", appended.tool_calls_extracted);
            }
        }
    }
    Ok(())
}
