use std::path::{Path, PathBuf};

use chrono::Utc;
use git2::{Oid, Repository};

use super::lock::KeyLock;
use super::objects::{write_snapshot_commit, write_status_commit, SnapshotMeta, StatusRecord};
use super::{read, refs, LedgerStore, LedgerTxn};
use crate::config::{LedgerConfig, LedgerSettings};
use crate::error::CoreError;
use crate::model::{
    PromptSnapshot, Session, SessionKey, SessionStatus, SnapshotKind, ToolCall, ToolCallRecord,
};

const LEDGER_DIR: &str = "promptledger";

/// Git-native ledger storage.
///
/// Each snapshot is a commit chained onto the previous one; a session's
/// chain tip lives at `refs/promptledger/sessions/<ab>/<digest>`. Commits are
/// written first and only become visible when the ref moves, which makes a
/// transaction's commit a single ref update.
pub struct GitLedgerStore {
    repo: Repository,
}

impl GitLedgerStore {
    /// Open the Git repository at the given path.
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let repo = Repository::open(path)?;
        Ok(Self { repo })
    }

    /// Discover the Git repository from the current directory.
    pub fn discover() -> Result<Self, CoreError> {
        let repo = Repository::discover(".")?;
        Ok(Self { repo })
    }

    /// Check if promptledger has been initialized in this repo.
    pub fn is_initialized(&self) -> bool {
        self.repo
            .config()
            .ok()
            .and_then(|c| c.get_bool("promptledger.enabled").ok())
            .unwrap_or(false)
    }

    /// Initialize promptledger in this repo: write config, create the lock directory.
    pub fn init(&self, config: &LedgerConfig) -> Result<(), CoreError> {
        let mut git_config = self.repo.config()?;
        config.save(&mut git_config)?;
        git_config.set_i32("promptledger.version", 1)?;
        std::fs::create_dir_all(self.lock_dir())?;
        Ok(())
    }

    /// Load the `[promptledger]` config section.
    pub fn config(&self) -> Result<LedgerConfig, CoreError> {
        LedgerConfig::load(&self.repo.config()?)
    }

    /// Resolve the ledger settings, reading a configured template file
    /// relative to the working directory.
    pub fn settings(&self) -> Result<LedgerSettings, CoreError> {
        self.config()?.settings(self.workdir())
    }

    /// Get the underlying git2::Repository reference.
    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Get the repo working directory path.
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// The directory (inside .git) holding per-key lock files.
    pub fn lock_dir(&self) -> PathBuf {
        self.repo.path().join(LEDGER_DIR).join("locks")
    }

    fn session_tip(&self, key: &SessionKey) -> Result<Option<Oid>, CoreError> {
        refs::resolve_tip(&self.repo, &refs::session_ref_name(key))
    }

    /// The session record of a chain, with `updated_at` taken from its tip
    /// and the latest recorded status overlaid.
    fn current_session(&self, tip: Oid) -> Result<Session, CoreError> {
        let mut session = read::read_session(&self.repo, tip)?;
        let meta = read::read_snapshot_meta(&self.repo, tip)?;
        session.updated_at = session.updated_at.max(meta.created_at);
        self.with_status(session)
    }

    fn with_status(&self, mut session: Session) -> Result<Session, CoreError> {
        if let Some(tip) = refs::resolve_tip(&self.repo, &refs::status_ref_name(&session.key))? {
            let record = read::read_status(&self.repo, tip)?;
            session.status = record.status;
            session.updated_at = session.updated_at.max(record.updated_at);
        }
        Ok(session)
    }
}

impl LedgerStore for GitLedgerStore {
    type Txn<'a>
        = GitTxn<'a>
    where
        Self: 'a;

    fn begin(&self, key: &SessionKey) -> Result<GitTxn<'_>, CoreError> {
        let lock = KeyLock::acquire(&self.lock_dir(), key)?;
        // Read the tip only once the lock is held.
        let base = self.session_tip(key)?;
        let (session, latest) = match base {
            Some(tip) => (
                Some(read::read_session(&self.repo, tip)?),
                Some(read::read_snapshot(&self.repo, tip)?),
            ),
            None => (None, None),
        };
        Ok(GitTxn {
            repo: &self.repo,
            key: key.clone(),
            _lock: lock,
            base,
            tip: base,
            session,
            latest,
        })
    }

    fn session(&self, key: &SessionKey) -> Result<Option<Session>, CoreError> {
        match self.session_tip(key)? {
            Some(tip) => Ok(Some(self.current_session(tip)?)),
            None => Ok(None),
        }
    }

    fn latest(&self, key: &SessionKey) -> Result<Option<PromptSnapshot>, CoreError> {
        self.session_tip(key)?
            .map(|tip| read::read_snapshot(&self.repo, tip))
            .transpose()
    }

    fn snapshots(&self, key: &SessionKey) -> Result<Vec<PromptSnapshot>, CoreError> {
        let Some(tip) = self.session_tip(key)? else {
            return Ok(Vec::new());
        };
        read::chain_oids(&self.repo, tip)?
            .into_iter()
            .map(|oid| read::read_snapshot(&self.repo, oid))
            .collect()
    }

    fn tool_calls(&self, key: &SessionKey) -> Result<Vec<ToolCallRecord>, CoreError> {
        let Some(tip) = self.session_tip(key)? else {
            return Ok(Vec::new());
        };
        let mut records = Vec::new();
        for oid in read::chain_oids(&self.repo, tip)? {
            let meta = read::read_snapshot_meta(&self.repo, oid)?;
            if meta.kind != SnapshotKind::LlmOutput {
                continue;
            }
            let snapshot_id = crate::model::SnapshotId(oid.to_string());
            for (index, call) in read::read_tool_calls(&self.repo, oid)?.into_iter().enumerate() {
                records.push(ToolCallRecord {
                    snapshot_id: snapshot_id.clone(),
                    sequence: meta.sequence,
                    index,
                    call,
                });
            }
        }
        Ok(records)
    }

    fn list_sessions(&self) -> Result<Vec<Session>, CoreError> {
        let mut sessions = Vec::new();
        for tip in refs::list_session_tips(&self.repo)? {
            match self.current_session(tip) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    tracing::warn!("Skipping unreadable session {tip}: {e}");
                }
            }
        }
        Ok(sessions)
    }

    fn set_status(&self, key: &SessionKey, status: SessionStatus) -> Result<Session, CoreError> {
        let tip = self.session_tip(key)?.ok_or_else(|| CoreError::NotFound {
            key: key.to_string(),
        })?;
        let _lock = KeyLock::acquire(&self.lock_dir(), key)?;
        let session = self.current_session(tip)?;

        let status_ref = refs::status_ref_name(key);
        let previous = refs::resolve_tip(&self.repo, &status_ref)?;
        let record = StatusRecord {
            status,
            updated_at: Utc::now(),
        };
        let oid = write_status_commit(&self.repo, &record, previous)?;
        match previous {
            Some(expected) => refs::advance_ref(&self.repo, &status_ref, oid, expected, key)?,
            None => refs::create_ref(&self.repo, &status_ref, oid, key)?,
        }

        Ok(Session {
            status: record.status,
            updated_at: session.updated_at.max(record.updated_at),
            ..session
        })
    }
}

/// A unit of work on one session chain of a [`GitLedgerStore`].
pub struct GitTxn<'a> {
    repo: &'a Repository,
    key: SessionKey,
    _lock: KeyLock,
    /// Chain tip when the transaction began.
    base: Option<Oid>,
    /// Tip including staged commits.
    tip: Option<Oid>,
    session: Option<Session>,
    latest: Option<PromptSnapshot>,
}

impl GitTxn<'_> {
    fn stage(
        &mut self,
        session: &Session,
        kind: SnapshotKind,
        sequence: u64,
        text: String,
        tool_calls: &[ToolCall],
    ) -> Result<PromptSnapshot, CoreError> {
        let meta = SnapshotMeta {
            sequence,
            kind,
            created_at: Utc::now(),
        };
        // The session record is written unchanged so every commit of the
        // chain shares one blob.
        let oid = write_snapshot_commit(self.repo, session, &meta, &text, tool_calls, self.tip)?;
        let snapshot = PromptSnapshot {
            id: crate::model::SnapshotId(oid.to_string()),
            key: self.key.clone(),
            sequence,
            kind,
            text,
            created_at: meta.created_at,
        };
        self.tip = Some(oid);
        self.latest = Some(snapshot.clone());
        Ok(snapshot)
    }
}

impl LedgerTxn for GitTxn<'_> {
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
        let snapshot = self.stage(&session, SnapshotKind::Init, 1, text, &[])?;
        self.session = Some(session);
        Ok(snapshot)
    }

    fn append_snapshot(
        &mut self,
        kind: SnapshotKind,
        text: String,
        tool_calls: &[ToolCall],
    ) -> Result<PromptSnapshot, CoreError> {
        let (Some(session), Some(latest)) = (self.session.clone(), self.latest.as_ref()) else {
            return Err(CoreError::NotFound {
                key: self.key.to_string(),
            });
        };
        let sequence = latest.sequence + 1;
        self.stage(&session, kind, sequence, text, tool_calls)
    }

    fn commit(self) -> Result<(), CoreError> {
        let ref_name = refs::session_ref_name(&self.key);
        match (self.base, self.tip) {
            (_, None) => Ok(()),
            (Some(base), Some(tip)) if base == tip => Ok(()),
            (None, Some(tip)) => refs::create_ref(self.repo, &ref_name, tip, &self.key),
            (Some(base), Some(tip)) => refs::advance_ref(self.repo, &ref_name, tip, base, &self.key),
        }
    }

    fn rollback(self) {
        tracing::debug!("Rolled back transaction on session {}", self.key);
    }
}
