use anyhow::{Context, Result};
use clap::Args;
use promptledger_core::HistoryFilter;

use crate::output::format::format_session_detail;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct ShowArgs {
    /// Session key
    pub key: String,
}

pub fn run(args: &ShowArgs, format: OutputFormat) -> Result<()> {
    let ledger = super::open_ledger()?;

    let Some(session) = ledger
        .session(&args.key)
        .with_context(|| format!("Failed to read session '{}'", args.key))?
    else {
        anyhow::bail!("Session '{}' not found", args.key);
    };
    let snapshots = ledger
        .history(&args.key, &HistoryFilter::default())
        .context("Failed to read snapshots")?;
    let tool_calls = ledger
        .tool_calls(&args.key, 0, None)
        .context("Failed to read tool calls")?;

    println!(
        "{}",
        format_session_detail(&session, &snapshots, tool_calls.len(), format)
    );
    Ok(())
}
