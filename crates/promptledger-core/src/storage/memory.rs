use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use uuid::Uuid;

use super::{LedgerStore, LedgerTxn};
use crate::error::CoreError;
use crate::model::{
    PromptSnapshot, Session, SessionKey, SessionStatus, SnapshotId, SnapshotKind, ToolCall,
    ToolCallRecord,
};

#[derive(Debug, Clone)]
struct Chain {
    session: Session,
    snapshots: Vec<PromptSnapshot>,
    tool_calls: Vec<ToolCallRecord>,
}

#[derive(Debug, Default)]
struct Busy {
    keys: Mutex<HashSet<SessionKey>>,
    released: Condvar,
}

impl Busy {
    fn acquire(&self, key: &SessionKey) {
        let mut keys = self.keys.lock();
        while keys.contains(key) {
            self.released.wait(&mut keys);
        }
        keys.insert(key.clone());
    }

    fn release(&self, key: &SessionKey) {
        self.keys.lock().remove(key);
        self.released.notify_all();
    }
}

/// In-process ledger storage for tests and embedding.
///
/// Clones share the same chains. Writers to one key serialize on a busy set;
/// staged records are applied only when the transaction commits.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    chains: Arc<Mutex<HashMap<SessionKey, Chain>>>,
    busy: Arc<Busy>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    type Txn<'a>
        = MemoryTxn<'a>
    where
        Self: 'a;

    fn begin(&self, key: &SessionKey) -> Result<MemoryTxn<'_>, CoreError> {
        self.busy.acquire(key);
        let (session, latest) = match self.chains.lock().get(key) {
            Some(chain) => (Some(chain.session.clone()), chain.snapshots.last().cloned()),
            None => (None, None),
        };
        Ok(MemoryTxn {
            store: self,
            key: key.clone(),
            existed: session.is_some(),
            session,
            latest,
            staged: Vec::new(),
            staged_calls: Vec::new(),
        })
    }

    fn session(&self, key: &SessionKey) -> Result<Option<Session>, CoreError> {
        Ok(self.chains.lock().get(key).map(|c| c.session.clone()))
    }

    fn latest(&self, key: &SessionKey) -> Result<Option<PromptSnapshot>, CoreError> {
        Ok(self
            .chains
            .lock()
            .get(key)
            .and_then(|c| c.snapshots.last().cloned()))
    }

    fn snapshots(&self, key: &SessionKey) -> Result<Vec<PromptSnapshot>, CoreError> {
        Ok(self
            .chains
            .lock()
            .get(key)
            .map(|c| c.snapshots.clone())
            .unwrap_or_default())
    }

    fn tool_calls(&self, key: &SessionKey) -> Result<Vec<ToolCallRecord>, CoreError> {
        Ok(self
            .chains
            .lock()
            .get(key)
            .map(|c| c.tool_calls.clone())
            .unwrap_or_default())
    }

    fn list_sessions(&self) -> Result<Vec<Session>, CoreError> {
        Ok(self
            .chains
            .lock()
            .values()
            .map(|c| c.session.clone())
            .collect())
    }

    fn set_status(&self, key: &SessionKey, status: SessionStatus) -> Result<Session, CoreError> {
        let mut chains = self.chains.lock();
        let chain = chains.get_mut(key).ok_or_else(|| CoreError::NotFound {
            key: key.to_string(),
        })?;
        chain.session.status = status;
        chain.session.updated_at = Utc::now();
        Ok(chain.session.clone())
    }
}

/// A unit of work on one session of a [`MemoryLedgerStore`].
pub struct MemoryTxn<'a> {
    store: &'a MemoryLedgerStore,
    key: SessionKey,
    existed: bool,
    session: Option<Session>,
    latest: Option<PromptSnapshot>,
    staged: Vec<PromptSnapshot>,
    staged_calls: Vec<ToolCallRecord>,
}

impl MemoryTxn<'_> {
    fn stage(
        &mut self,
        kind: SnapshotKind,
        sequence: u64,
        text: String,
        tool_calls: &[ToolCall],
    ) -> PromptSnapshot {
        let snapshot = PromptSnapshot {
            id: SnapshotId(Uuid::new_v4().as_simple().to_string()),
            key: self.key.clone(),
            sequence,
            kind,
            text,
            created_at: Utc::now(),
        };
        self.staged_calls
            .extend(tool_calls.iter().cloned().enumerate().map(|(index, call)| {
                ToolCallRecord {
                    snapshot_id: snapshot.id.clone(),
                    sequence,
                    index,
                    call,
                }
            }));
        self.staged.push(snapshot.clone());
        self.latest = Some(snapshot.clone());
        snapshot
    }
}

impl LedgerTxn for MemoryTxn<'_> {
    fn key(&self) -> &SessionKey {
        &self.key
    }

    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn latest(&self) -> Option<&PromptSnapshot> {
        self.latest.as_ref()
    }

    fn create_session(&mut self, session: Session) -> Result<PromptSnapshot, CoreError> {
        if self.session.is_some() {
            return Err(CoreError::AlreadyExists {
                key: self.key.to_string(),
            });
        }
        let text = session.initial_prompt.clone();
        self.session = Some(session);
        Ok(self.stage(SnapshotKind::Init, 1, text, &[]))
    }

    fn append_snapshot(
        &mut self,
        kind: SnapshotKind,
        text: String,
        tool_calls: &[ToolCall],
    ) -> Result<PromptSnapshot, CoreError> {
        let sequence = match (&self.session, &self.latest) {
            (Some(_), Some(latest)) => latest.sequence + 1,
            _ => {
                return Err(CoreError::NotFound {
                    key: self.key.to_string(),
                })
            }
        };
        Ok(self.stage(kind, sequence, text, tool_calls))
    }

    fn commit(mut self) -> Result<(), CoreError> {
        let Some(last) = self.staged.last() else {
            return Ok(());
        };
        let updated_at = last.created_at;
        let staged = std::mem::take(&mut self.staged);
        let staged_calls = std::mem::take(&mut self.staged_calls);

        let mut chains = self.store.chains.lock();
        if self.existed {
            let chain = chains.get_mut(&self.key).ok_or_else(|| CoreError::NotFound {
                key: self.key.to_string(),
            })?;
            chain.session.updated_at = updated_at;
            chain.snapshots.extend(staged);
            chain.tool_calls.extend(staged_calls);
        } else {
            let session = self.session.clone().ok_or_else(|| CoreError::NotFound {
                key: self.key.to_string(),
            })?;
            if chains.contains_key(&self.key) {
                return Err(CoreError::AlreadyExists {
                    key: self.key.to_string(),
                });
            }
            chains.insert(
                self.key.clone(),
                Chain {
                    session: Session {
                        updated_at,
                        ..session
                    },
                    snapshots: staged,
                    tool_calls: staged_calls,
                },
            );
        }
        Ok(())
    }

    fn rollback(self) {
        tracing::debug!("Rolled back transaction on session {}", self.key);
    }
}

impl Drop for MemoryTxn<'_> {
    fn drop(&mut self) {
        self.store.busy.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(store: &MemoryLedgerStore, key: &str) {
        let key = SessionKey::from(key);
        let mut txn = store.begin(&key).unwrap();
        txn.create_session(Session::new(key.clone(), "t".into()))
            .unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn test_create_append_commit() {
        let store = MemoryLedgerStore::new();
        create(&store, "demo");
        let key = SessionKey::from("demo");

        let mut txn = store.begin(&key).unwrap();
        let calls = vec![ToolCall::raw("a", None, "x")];
        let snap = txn
            .append_snapshot(SnapshotKind::LlmOutput, "t\no".into(), &calls)
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(snap.sequence, 2);
        assert_eq!(store.snapshots(&key).unwrap().len(), 2);
        let records = store.tool_calls(&key).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].snapshot_id, snap.id);
    }

    #[test]
    fn test_drop_without_commit_discards() {
        let store = MemoryLedgerStore::new();
        create(&store, "demo");
        let key = SessionKey::from("demo");
        {
            let mut txn = store.begin(&key).unwrap();
            txn.append_snapshot(SnapshotKind::UserInput, "t\nu".into(), &[])
                .unwrap();
        }
        assert_eq!(store.latest(&key).unwrap().unwrap().sequence, 1);
        // The key is free again after the drop.
        let txn = store.begin(&key).unwrap();
        txn.rollback();
    }

    #[test]
    fn test_duplicate_create() {
        let store = MemoryLedgerStore::new();
        create(&store, "demo");
        let key = SessionKey::from("demo");
        let mut txn = store.begin(&key).unwrap();
        assert!(matches!(
            txn.create_session(Session::new(key.clone(), "x".into())),
            Err(CoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_set_status() {
        let store = MemoryLedgerStore::new();
        create(&store, "demo");
        let session = store
            .set_status(&SessionKey::from("demo"), SessionStatus::Completed)
            .unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(store
            .set_status(&SessionKey::from("nope"), SessionStatus::Completed)
            .is_err());
    }

    #[test]
    fn test_same_key_serializes() {
        let store = MemoryLedgerStore::new();
        create(&store, "race");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let key = SessionKey::from("race");
                    for _ in 0..10 {
                        let mut txn = store.begin(&key).unwrap();
                        let prev = txn.latest().unwrap().text.clone();
                        txn.append_snapshot(SnapshotKind::UserInput, format!("{prev}\nx"), &[])
                            .unwrap();
                        txn.commit().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshots = store.snapshots(&SessionKey::from("race")).unwrap();
        assert_eq!(snapshots.len(), 81);
        assert!(snapshots
            .iter()
            .enumerate()
            .all(|(i, s)| s.sequence == i as u64 + 1));
    }
}
