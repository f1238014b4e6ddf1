use anyhow::{Context, Result};

use crate::output::OutputFormat;

pub fn run(format: OutputFormat) -> Result<()> {
    let ledger = super::open_ledger()?;
    let stats = ledger.stats().context("Failed to collect statistics")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("promptledger Statistics");
            println!("=======================");
            println!("Sessions:    {}", stats.sessions);
            for (status, count) in &stats.sessions_by_status {
                println!("  {status}: {count}");
            }
            println!("Snapshots:   {}", stats.snapshots);
            for (kind, count) in &stats.snapshots_by_kind {
                println!("  {kind}: {count}");
            }
            println!("Tool calls:  {}", stats.tool_calls);
        }
    }
    Ok(())
}
