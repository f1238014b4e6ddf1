use anyhow::{Context, Result};

use promptledger_core::storage::GitLedgerStore;

pub fn run() -> Result<()> {
    let store = GitLedgerStore::discover().context("Not inside a Git repository")?;

    if !store.is_initialized() {
        anyhow::bail!("promptledger is not initialized. Run `promptledger init` first.");
    }

    let repo_path = store
        .repo()
        .path()
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| store.repo().path().to_path_buf());

    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    rt.block_on(async {
        promptledger_mcp::run_stdio(repo_path)
            .await
            .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))
    })
}
