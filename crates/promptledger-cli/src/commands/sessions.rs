use anyhow::{Context, Result};
use clap::Args;
use promptledger_core::model::SessionStatus;
use promptledger_core::SessionFilter;

use crate::output::format::format_session_list;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct SessionsArgs {
    /// Only sessions with this status (active, completed, error)
    #[arg(long)]
    pub status: Option<SessionStatus>,

    /// Number of sessions to skip
    #[arg(long, default_value = "0")]
    pub skip: usize,

    /// Maximum number of entries
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

pub fn run(args: &SessionsArgs, format: OutputFormat) -> Result<()> {
    let ledger = super::open_ledger()?;
    let filter = SessionFilter {
        status: args.status,
        skip: args.skip,
        limit: Some(args.limit),
    };
    let sessions = ledger
        .list_sessions(&filter)
        .context("Failed to list sessions")?;
    print!("{}", format_session_list(&sessions, format));
    Ok(())
}
