//! Persistence for sessions, snapshots and tool calls.
//!
//! Writes go through an explicit unit of work: [`LedgerStore::begin`] opens a
//! [`LedgerTxn`] scoped to one session key that holds the key's exclusive lock
//! until it is committed, rolled back or dropped. Nothing staged in a
//! transaction is visible to readers before [`LedgerTxn::commit`].

pub mod git_backend;
pub mod lock;
pub mod memory;
pub mod objects;
pub mod read;
pub mod refs;

pub use git_backend::GitLedgerStore;
pub use memory::MemoryLedgerStore;

use crate::error::CoreError;
use crate::model::{
    PromptSnapshot, Session, SessionKey, SessionStatus, SnapshotKind, ToolCall, ToolCallRecord,
};

/// Durable, sequence-ordered storage of the ledger's records.
pub trait LedgerStore {
    type Txn<'a>: LedgerTxn
    where
        Self: 'a;

    /// Open a unit of work for `key`, blocking until no other transaction
    /// holds that key. Transactions on different keys do not block each other.
    fn begin(&self, key: &SessionKey) -> Result<Self::Txn<'_>, CoreError>;

    fn session(&self, key: &SessionKey) -> Result<Option<Session>, CoreError>;

    /// The snapshot with the highest sequence number.
    fn latest(&self, key: &SessionKey) -> Result<Option<PromptSnapshot>, CoreError>;

    /// All snapshots in ascending sequence order.
    fn snapshots(&self, key: &SessionKey) -> Result<Vec<PromptSnapshot>, CoreError>;

    /// All tool calls in ascending sequence order, then by position.
    fn tool_calls(&self, key: &SessionKey) -> Result<Vec<ToolCallRecord>, CoreError>;

    fn list_sessions(&self) -> Result<Vec<Session>, CoreError>;

    /// Record an externally decided status. Fails with `NotFound` for unknown keys.
    fn set_status(&self, key: &SessionKey, status: SessionStatus) -> Result<Session, CoreError>;
}

/// A per-key unit of work.
pub trait LedgerTxn {
    fn key(&self) -> &SessionKey;

    /// The session as seen by this transaction, including staged creation.
    fn session(&self) -> Option<&Session>;

    /// The latest snapshot as seen by this transaction, including staged appends.
    fn latest(&self) -> Option<&PromptSnapshot>;

    /// Stage a new session together with its `init` snapshot, whose text is
    /// the session's initial prompt. Fails with `AlreadyExists` if the key
    /// already has a session.
    fn create_session(&mut self, session: Session) -> Result<PromptSnapshot, CoreError>;

    /// Stage the next snapshot after [`LedgerTxn::latest`], with the tool calls
    /// extracted for it. Fails with `NotFound` if the key has no snapshots.
    fn append_snapshot(
        &mut self,
        kind: SnapshotKind,
        text: String,
        tool_calls: &[ToolCall],
    ) -> Result<PromptSnapshot, CoreError>;

    /// Make everything staged visible at once, then release the key.
    fn commit(self) -> Result<(), CoreError>;

    /// Discard everything staged and release the key. Dropping an
    /// uncommitted transaction has the same effect.
    fn rollback(self);
}
