pub mod append;
pub mod create;
pub mod extract;
pub mod history;
pub mod init;
pub mod mcp;
pub mod prompt;
pub mod sessions;
pub mod show;
pub mod stats;
pub mod status;
pub mod tool_calls;
pub mod version;

use std::io::Read;

use anyhow::{Context, Result};
use clap::Subcommand;
use promptledger_core::storage::GitLedgerStore;
use promptledger_core::SessionLedger;

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize promptledger in the current Git repository
    Init(init::InitArgs),
    /// Create a session and its initial prompt
    Create(create::CreateArgs),
    /// Append user input, a start marker or model output to a session
    Append(append::AppendArgs),
    /// Print the current full prompt of a session
    Prompt(prompt::PromptArgs),
    /// List sessions (most recently updated first)
    Sessions(sessions::SessionsArgs),
    /// Show details of a session
    Show(show::ShowArgs),
    /// List the prompt snapshots of a session
    History(history::HistoryArgs),
    /// List tool calls extracted from a session's model output
    ToolCalls(tool_calls::ToolCallsArgs),
    /// Set the status of a session
    Status(status::StatusArgs),
    /// Extract tool calls from model output without recording it
    Extract(extract::ExtractArgs),
    /// Show aggregate statistics across all sessions
    Stats,
    /// Serve the ledger over MCP on stdio
    Mcp,
    /// Print version information
    Version,
}

/// Open the ledger of the enclosing repository, failing if it was never initialized.
pub fn open_ledger() -> Result<SessionLedger<GitLedgerStore>> {
    let store = GitLedgerStore::discover().context("Not inside a Git repository")?;

    if !store.is_initialized() {
        anyhow::bail!("promptledger is not initialized. Run `promptledger init` first.");
    }

    let settings = store
        .settings()
        .context("Failed to load promptledger settings")?;
    Ok(SessionLedger::new(store, settings))
}

/// Read a payload argument, where `-` or no argument means stdin.
pub fn read_payload(arg: Option<&str>) -> Result<String> {
    match arg {
        Some(text) if text != "-" => Ok(text.to_string()),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}
