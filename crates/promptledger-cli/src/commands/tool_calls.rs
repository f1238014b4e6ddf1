use anyhow::{Context, Result};
use clap::Args;

use crate::output::format::format_tool_call_records;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct ToolCallsArgs {
    /// Session key
    pub key: String,

    /// Number of calls to skip
    #[arg(long, default_value = "0")]
    pub skip: usize,

    /// Maximum number of entries
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

pub fn run(args: &ToolCallsArgs, format: OutputFormat) -> Result<()> {
    let ledger = super::open_ledger()?;
    let records = ledger
        .tool_calls(&args.key, args.skip, Some(args.limit))
        .with_context(|| format!("Failed to read tool calls of '{}'", args.key))?;
    print!("{}", format_tool_call_records(&records, format));
    Ok(())
}
