use git2::{Oid, Repository};

use super::objects::{
    SnapshotMeta, StatusRecord, PROMPT_BLOB, SESSION_BLOB, SNAPSHOT_BLOB, STATUS_BLOB,
    TOOL_CALLS_BLOB,
};
use crate::error::CoreError;
use crate::model::{PromptSnapshot, Session, SnapshotId, ToolCall};

/// Read a snapshot from its commit Oid.
pub fn read_snapshot(repo: &Repository, commit_oid: Oid) -> Result<PromptSnapshot, CoreError> {
    let commit = repo.find_commit(commit_oid)?;
    let tree = commit.tree()?;

    let session = read_blob_json::<Session>(repo, &tree, SESSION_BLOB)?;
    let meta = read_blob_json::<SnapshotMeta>(repo, &tree, SNAPSHOT_BLOB)?;
    let text = read_blob_string(repo, &tree, PROMPT_BLOB)?;

    Ok(PromptSnapshot {
        id: SnapshotId(commit_oid.to_string()),
        key: session.key,
        sequence: meta.sequence,
        kind: meta.kind,
        text,
        created_at: meta.created_at,
    })
}

/// Read only the session record (fast path for listing).
pub fn read_session(repo: &Repository, commit_oid: Oid) -> Result<Session, CoreError> {
    let commit = repo.find_commit(commit_oid)?;
    let tree = commit.tree()?;
    read_blob_json::<Session>(repo, &tree, SESSION_BLOB)
}

/// Read only the snapshot metadata, without the prompt text.
pub fn read_snapshot_meta(repo: &Repository, commit_oid: Oid) -> Result<SnapshotMeta, CoreError> {
    let commit = repo.find_commit(commit_oid)?;
    let tree = commit.tree()?;
    read_blob_json::<SnapshotMeta>(repo, &tree, SNAPSHOT_BLOB)
}

pub fn read_tool_calls(repo: &Repository, commit_oid: Oid) -> Result<Vec<ToolCall>, CoreError> {
    let commit = repo.find_commit(commit_oid)?;
    let tree = commit.tree()?;
    read_blob_json::<Vec<ToolCall>>(repo, &tree, TOOL_CALLS_BLOB)
}

pub fn read_status(repo: &Repository, commit_oid: Oid) -> Result<StatusRecord, CoreError> {
    let commit = repo.find_commit(commit_oid)?;
    let tree = commit.tree()?;
    read_blob_json::<StatusRecord>(repo, &tree, STATUS_BLOB)
}

/// Commit Oids of a chain from its root to `tip`.
pub fn chain_oids(repo: &Repository, tip: Oid) -> Result<Vec<Oid>, CoreError> {
    let mut oids = Vec::new();
    let mut commit = repo.find_commit(tip)?;
    loop {
        oids.push(commit.id());
        if commit.parent_count() == 0 {
            break;
        }
        commit = commit.parent(0)?;
    }
    oids.reverse();
    Ok(oids)
}

fn read_blob_bytes(repo: &Repository, tree: &git2::Tree, name: &str) -> Result<Vec<u8>, CoreError> {
    let entry = tree
        .get_name(name)
        .ok_or_else(|| CoreError::MissingBlob(name.to_string()))?;
    let blob = repo.find_blob(entry.id())?;
    Ok(blob.content().to_vec())
}

fn read_blob_string(repo: &Repository, tree: &git2::Tree, name: &str) -> Result<String, CoreError> {
    let bytes = read_blob_bytes(repo, tree, name)?;
    String::from_utf8(bytes).map_err(CoreError::Utf8)
}

fn read_blob_json<T: serde::de::DeserializeOwned>(
    repo: &Repository,
    tree: &git2::Tree,
    name: &str,
) -> Result<T, CoreError> {
    let bytes = read_blob_bytes(repo, tree, name)?;
    serde_json::from_slice(&bytes).map_err(CoreError::InvalidRecord)
}
