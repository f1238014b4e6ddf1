use anyhow::{Context, Result};
use clap::Args;
use promptledger_core::model::SessionStatus;

use crate::output::OutputFormat;

#[derive(Args)]
pub struct StatusArgs {
    /// Session key
    pub key: String,

    /// New status: active, completed or error
    pub status: SessionStatus,
}

pub fn run(args: &StatusArgs, format: OutputFormat) -> Result<()> {
    let ledger = super::open_ledger()?;
    let session = ledger
        .set_status(&args.key, args.status)
        .with_context(|| format!("Failed to set status of '{}'", args.key))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&session)?),
        OutputFormat::Text => println!("Session {} is now {}", session.key, session.status),
    }
    Ok(())
}
