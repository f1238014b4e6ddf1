use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use promptledger_core::storage::GitLedgerStore;
use promptledger_core::{LedgerConfig, Pairing};

#[derive(Args)]
pub struct InitArgs {
    /// Force re-initialization
    #[arg(long)]
    pub force: bool,

    /// File whose contents replace the built-in default template
    #[arg(long)]
    pub template_file: Option<PathBuf>,

    /// How Action spans bind to ActionInput spans: first-match or exclusive
    #[arg(long, default_value = "first-match")]
    pub pairing: Pairing,
}

pub fn run(args: &InitArgs) -> Result<()> {
    let store =
        GitLedgerStore::discover().context("Not inside a Git repository. Run `git init` first.")?;

    if store.is_initialized() && !args.force {
        println!("promptledger is already initialized in this repository.");
        println!("Use --force to re-initialize.");
        return Ok(());
    }

    let config = LedgerConfig {
        template_file: args.template_file.clone(),
        pairing: args.pairing,
        ..LedgerConfig::default_init()
    };
    store
        .init(&config)
        .context("Failed to initialize promptledger")?;
    // Fail early on an unreadable template file.
    store
        .settings()
        .context("Configured template file is not readable")?;

    println!("promptledger initialized. Sessions are recorded under refs/promptledger/.");
    println!();
    println!("Next steps:");
    println!("  promptledger create <key>                        Start a session");
    println!("  promptledger append <key> --kind user-input ...  Grow its prompt");
    println!("  promptledger prompt <key>                        Print the current prompt");
    Ok(())
}
