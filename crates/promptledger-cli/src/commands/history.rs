use anyhow::{Context, Result};
use clap::Args;
use promptledger_core::model::SnapshotKind;
use promptledger_core::HistoryFilter;

use crate::output::format::format_snapshot_list;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct HistoryArgs {
    /// Session key
    pub key: String,

    /// Only snapshots of this kind (init, user-input, system-marker, llm-output)
    #[arg(long)]
    pub kind: Option<SnapshotKind>,

    /// Number of snapshots to skip
    #[arg(long, default_value = "0")]
    pub skip: usize,

    /// Maximum number of entries
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,

    /// Print full prompt text of every snapshot
    #[arg(long)]
    pub full: bool,
}

pub fn run(args: &HistoryArgs, format: OutputFormat) -> Result<()> {
    let ledger = super::open_ledger()?;
    let filter = HistoryFilter {
        kind: args.kind,
        skip: args.skip,
        limit: Some(args.limit),
    };
    let snapshots = ledger
        .history(&args.key, &filter)
        .with_context(|| format!("Failed to read history of '{}'", args.key))?;
    print!("{}", format_snapshot_list(&snapshots, args.full, format));
    Ok(())
}
