use chrono::{DateTime, Utc};
use git2::{Oid, Repository, Signature};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{Session, SessionStatus, SnapshotKind, ToolCall};

pub const SESSION_BLOB: &str = "session.json";
pub const SNAPSHOT_BLOB: &str = "snapshot.json";
pub const PROMPT_BLOB: &str = "prompt.txt";
pub const TOOL_CALLS_BLOB: &str = "tool_calls.json";
pub const STATUS_BLOB: &str = "status.json";

/// Per-snapshot metadata stored as snapshot.json.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotMeta {
    pub sequence: u64,
    pub kind: SnapshotKind,
    pub created_at: DateTime<Utc>,
}

/// One entry of a session's status history, stored as status.json.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusRecord {
    pub status: SessionStatus,
    pub updated_at: DateTime<Utc>,
}

/// Write one snapshot as a commit and return its Oid. No ref is touched, so
/// the commit stays invisible until a ref is moved onto it.
///
/// Object layout:
///   commit (message = "promptledger: {key} #{sequence} {kind}", parent = previous snapshot)
///     -> tree
///        -> blob "session.json"
///        -> blob "snapshot.json"
///        -> blob "prompt.txt"
///        -> blob "tool_calls.json"
pub fn write_snapshot_commit(
    repo: &Repository,
    session: &Session,
    meta: &SnapshotMeta,
    text: &str,
    tool_calls: &[ToolCall],
    parent: Option<Oid>,
) -> Result<Oid, CoreError> {
    let session_oid = repo.blob(&serde_json::to_vec_pretty(session)?)?;
    let meta_oid = repo.blob(&serde_json::to_vec_pretty(meta)?)?;
    let prompt_oid = repo.blob(text.as_bytes())?;
    let tool_calls_oid = repo.blob(&serde_json::to_vec_pretty(tool_calls)?)?;

    let mut builder = repo.treebuilder(None)?;
    builder.insert(SESSION_BLOB, session_oid, 0o100644)?;
    builder.insert(SNAPSHOT_BLOB, meta_oid, 0o100644)?;
    builder.insert(PROMPT_BLOB, prompt_oid, 0o100644)?;
    builder.insert(TOOL_CALLS_BLOB, tool_calls_oid, 0o100644)?;
    let tree_oid = builder.write()?;

    let message = format!(
        "promptledger: {} #{} {}",
        session.key, meta.sequence, meta.kind
    );
    commit_tree(repo, tree_oid, &message, parent)
}

/// Write one status change as a commit on top of the previous one.
pub fn write_status_commit(
    repo: &Repository,
    record: &StatusRecord,
    parent: Option<Oid>,
) -> Result<Oid, CoreError> {
    let status_oid = repo.blob(&serde_json::to_vec_pretty(record)?)?;
    let mut builder = repo.treebuilder(None)?;
    builder.insert(STATUS_BLOB, status_oid, 0o100644)?;
    let tree_oid = builder.write()?;
    let message = format!("promptledger: status {}", record.status);
    commit_tree(repo, tree_oid, &message, parent)
}

fn commit_tree(
    repo: &Repository,
    tree_oid: Oid,
    message: &str,
    parent: Option<Oid>,
) -> Result<Oid, CoreError> {
    let tree = repo.find_tree(tree_oid)?;
    let sig = Signature::now("promptledger", "promptledger@local")?;
    let parent = parent.map(|oid| repo.find_commit(oid)).transpose()?;
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    Ok(repo.commit(None, &sig, &sig, message, &tree, &parents)?)
}
