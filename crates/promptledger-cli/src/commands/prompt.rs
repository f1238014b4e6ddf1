use anyhow::{Context, Result};
use clap::Args;

#[derive(Args)]
pub struct PromptArgs {
    /// Session key
    pub key: String,
}

pub fn run(args: &PromptArgs) -> Result<()> {
    let ledger = super::open_ledger()?;
    let prompt = ledger
        .get_current_prompt(&args.key)
        .context("Failed to read prompt")?;
    match prompt {
        Some(text) => {
            println!("{text}");
            Ok(())
        }
        None => anyhow::bail!("Session '{}' not found", args.key),
    }
}
