use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use promptledger_core::{extract_tool_calls, ExtractOptions};

use crate::output::format::format_tool_calls;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct ExtractArgs {
    /// File holding model output; `-` or omitted reads stdin
    pub file: Option<PathBuf>,
}

pub fn run(args: &ExtractArgs, format: OutputFormat) -> Result<()> {
    let text = match &args.file {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        _ => super::read_payload(None)?,
    };

    // Inside an initialized repository the configured pairing policy applies.
    let opts = match super::open_ledger() {
        Ok(ledger) => ledger.settings().extract,
        Err(e) => {
            tracing::debug!("Using default extraction options: {e}");
            ExtractOptions::default()
        }
    };

    let calls = extract_tool_calls(&text, &opts);
    print!("{}", format_tool_calls(&calls, format));
    Ok(())
}
