//! The session ledger: append-only prompt accumulation over a [`LedgerStore`].

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::LedgerSettings;
use crate::error::CoreError;
use crate::extract::extract_tool_calls;
use crate::model::{
    Fragment, PromptSnapshot, Session, SessionId, SessionKey, SessionStatus, SnapshotId,
    SnapshotKind, ToolCall, ToolCallRecord,
};
use crate::storage::{GitLedgerStore, LedgerStore, LedgerTxn};

/// Outcome of [`SessionLedger::create_session`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionCreated {
    pub session_id: SessionId,
    pub snapshot_id: SnapshotId,
    /// Length of the initial prompt in characters.
    pub template_length: usize,
}

/// Outcome of [`SessionLedger::append_fragment`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FragmentAppended {
    pub snapshot_id: SnapshotId,
    pub sequence: u64,
    /// Length of the full prompt after the append, in characters.
    pub new_length: usize,
    pub tool_calls_extracted: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub skip: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub kind: Option<SnapshotKind>,
    pub skip: usize,
    pub limit: Option<usize>,
}

/// Totals across every session in the store.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LedgerStats {
    pub sessions: usize,
    pub sessions_by_status: BTreeMap<String, usize>,
    pub snapshots: usize,
    pub snapshots_by_kind: BTreeMap<String, usize>,
    pub tool_calls: usize,
}

/// Owns the snapshot chain of every session in its store.
///
/// Each mutating call runs in its own transaction: the store's per-key lock
/// is held from reading the latest snapshot until the new one is committed,
/// and any error drops the transaction, which rolls it back.
pub struct SessionLedger<S: LedgerStore> {
    store: S,
    settings: LedgerSettings,
}

impl<S: LedgerStore> SessionLedger<S> {
    pub fn new(store: S, settings: LedgerSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Create a session and its `init` snapshot.
    ///
    /// `None` or an empty template uses the configured default template.
    pub fn create_session(
        &self,
        key: &str,
        template: Option<&str>,
    ) -> Result<SessionCreated, CoreError> {
        let key = SessionKey::parse(key)?;
        let template = template
            .filter(|t| !t.is_empty())
            .unwrap_or(self.settings.default_template.as_str())
            .to_string();

        let mut txn = self.store.begin(&key)?;
        let session = Session::new(key.clone(), template);
        let session_id = session.id.clone();
        let snapshot = txn.create_session(session)?;
        txn.commit()?;

        tracing::info!(
            "Created session {key} ({session_id}), template {} chars",
            snapshot.len()
        );
        Ok(SessionCreated {
            session_id,
            template_length: snapshot.len(),
            snapshot_id: snapshot.id,
        })
    }

    /// Append one fragment to the latest snapshot of `key`.
    ///
    /// Model output is additionally mined for tool calls, which are stored
    /// against the new snapshot in the same transaction.
    pub fn append_fragment(
        &self,
        key: &str,
        fragment: Fragment,
    ) -> Result<FragmentAppended, CoreError> {
        // Sessions are never removed, so an unknown key is rejected before
        // its lock is taken.
        let key = self.require(key)?;
        let mut txn = self.store.begin(&key)?;
        let previous = txn.latest().ok_or_else(|| CoreError::NotFound {
            key: key.to_string(),
        })?;

        let text = fragment.extend(&previous.text, &key);
        let tool_calls = match &fragment {
            Fragment::LlmOutput(output) => extract_tool_calls(output, &self.settings.extract),
            _ => Vec::new(),
        };
        let snapshot = txn.append_snapshot(fragment.kind(), text, &tool_calls)?;
        txn.commit()?;

        tracing::info!(
            "Appended {} #{} to session {key} ({} chars, {} tool calls)",
            snapshot.kind,
            snapshot.sequence,
            snapshot.len(),
            tool_calls.len()
        );
        Ok(FragmentAppended {
            sequence: snapshot.sequence,
            new_length: snapshot.len(),
            tool_calls_extracted: tool_calls.len(),
            snapshot_id: snapshot.id,
        })
    }

    /// The full prompt right now, or `None` for an unknown session.
    pub fn get_current_prompt(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self
            .store
            .latest(&SessionKey::from(key))?
            .map(|snapshot| snapshot.text))
    }

    /// Standalone extraction with the configured pairing policy.
    pub fn extract_tool_calls(&self, text: &str) -> Vec<ToolCall> {
        extract_tool_calls(text, &self.settings.extract)
    }

    pub fn session(&self, key: &str) -> Result<Option<Session>, CoreError> {
        self.store.session(&SessionKey::from(key))
    }

    /// Sessions matching `filter`, most recently updated first.
    pub fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, CoreError> {
        let mut sessions: Vec<Session> = self
            .store
            .list_sessions()?
            .into_iter()
            .filter(|s| filter.status.map_or(true, |status| s.status == status))
            .collect();
        sessions.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(page(sessions, filter.skip, filter.limit))
    }

    /// Snapshots of one session in sequence order.
    pub fn history(
        &self,
        key: &str,
        filter: &HistoryFilter,
    ) -> Result<Vec<PromptSnapshot>, CoreError> {
        let key = self.require(key)?;
        let snapshots = self
            .store
            .snapshots(&key)?
            .into_iter()
            .filter(|s| filter.kind.map_or(true, |kind| s.kind == kind))
            .collect();
        Ok(page(snapshots, filter.skip, filter.limit))
    }

    /// Tool calls recorded for one session, newest first.
    pub fn tool_calls(
        &self,
        key: &str,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<ToolCallRecord>, CoreError> {
        let key = self.require(key)?;
        let mut records = self.store.tool_calls(&key)?;
        records.reverse();
        Ok(page(records, skip, limit))
    }

    pub fn set_status(&self, key: &str, status: SessionStatus) -> Result<Session, CoreError> {
        let session = self.store.set_status(&SessionKey::from(key), status)?;
        tracing::info!("Session {key} is now {status}");
        Ok(session)
    }

    pub fn stats(&self) -> Result<LedgerStats, CoreError> {
        let mut stats = LedgerStats::default();
        for status in SessionStatus::ALL {
            stats.sessions_by_status.insert(status.as_str().into(), 0);
        }
        for kind in SnapshotKind::ALL {
            stats.snapshots_by_kind.insert(kind.as_str().into(), 0);
        }

        for session in self.store.list_sessions()? {
            stats.sessions += 1;
            *stats
                .sessions_by_status
                .entry(session.status.as_str().into())
                .or_default() += 1;
            for snapshot in self.store.snapshots(&session.key)? {
                stats.snapshots += 1;
                *stats
                    .snapshots_by_kind
                    .entry(snapshot.kind.as_str().into())
                    .or_default() += 1;
            }
            stats.tool_calls += self.store.tool_calls(&session.key)?.len();
        }
        Ok(stats)
    }

    fn require(&self, key: &str) -> Result<SessionKey, CoreError> {
        let key = SessionKey::from(key);
        match self.store.session(&key)? {
            Some(_) => Ok(key),
            None => Err(CoreError::NotFound {
                key: key.to_string(),
            }),
        }
    }
}

impl SessionLedger<GitLedgerStore> {
    /// Open the ledger of an initialized repository, with settings read
    /// from its `[promptledger]` config.
    pub fn open(path: &std::path::Path) -> Result<Self, CoreError> {
        Self::from_store(GitLedgerStore::open(path)?)
    }

    /// Like [`SessionLedger::open`], discovering the repository from the
    /// current directory.
    pub fn discover() -> Result<Self, CoreError> {
        Self::from_store(GitLedgerStore::discover()?)
    }

    fn from_store(store: GitLedgerStore) -> Result<Self, CoreError> {
        if !store.is_initialized() {
            return Err(CoreError::NotInitialized);
        }
        let settings = store.settings()?;
        Ok(Self::new(store, settings))
    }
}

fn page<T>(items: Vec<T>, skip: usize, limit: Option<usize>) -> Vec<T> {
    items
        .into_iter()
        .skip(skip)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractOptions, Pairing};
    use crate::storage::{GitLedgerStore, MemoryLedgerStore};
    use crate::LedgerConfig;
    use serde_json::json;

    const DEMO_OUTPUT: &str = "<Action><ToolName>image_gen</ToolName><Description>d</Description></Action><ActionInput><ToolName>image_gen</ToolName><Arguments>{\"query\":\"五彩斑斓的黑\"}</Arguments></ActionInput>";

    fn ledger() -> SessionLedger<MemoryLedgerStore> {
        SessionLedger::new(
            MemoryLedgerStore::new(),
            LedgerSettings {
                default_template: "TEMPLATE".into(),
                extract: ExtractOptions::default(),
            },
        )
    }

    #[test]
    fn test_create_uses_default_template() {
        let ledger = ledger();
        let created = ledger.create_session("demo", None).unwrap();
        assert_eq!(created.template_length, 8);
        assert_eq!(
            ledger.get_current_prompt("demo").unwrap().as_deref(),
            Some("TEMPLATE")
        );

        ledger.create_session("empty", Some("")).unwrap();
        assert_eq!(
            ledger.get_current_prompt("empty").unwrap().as_deref(),
            Some("TEMPLATE")
        );

        let custom = ledger.create_session("custom", Some("你好")).unwrap();
        assert_eq!(custom.template_length, 2);
    }

    #[test]
    fn test_no_double_create() {
        let ledger = ledger();
        ledger.create_session("s1", Some("a")).unwrap();
        assert!(matches!(
            ledger.create_session("s1", Some("b")),
            Err(CoreError::AlreadyExists { .. })
        ));
        let history = ledger.history("s1", &HistoryFilter::default()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "a");
    }

    #[test]
    fn test_invalid_key_rejected_on_create() {
        let ledger = ledger();
        assert!(matches!(
            ledger.create_session("", None),
            Err(CoreError::InvalidKey(_))
        ));
        assert!(matches!(
            ledger.create_session(&"k".repeat(65), None),
            Err(CoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_append_to_unknown_session() {
        let ledger = ledger();
        assert!(matches!(
            ledger.append_fragment("ghost", Fragment::UserInput("hi".into())),
            Err(CoreError::NotFound { .. })
        ));
        assert_eq!(ledger.get_current_prompt("ghost").unwrap(), None);
    }

    #[test]
    fn test_end_to_end_demo() {
        let ledger = ledger();
        ledger.create_session("demo", None).unwrap();
        ledger
            .append_fragment("demo", Fragment::UserInput("五彩斑斓的黑".into()))
            .unwrap();
        ledger
            .append_fragment(
                "demo",
                Fragment::from_parts(SnapshotKind::SystemMarker, "", Some("UserInput".into()))
                    .unwrap(),
            )
            .unwrap();
        let appended = ledger
            .append_fragment("demo", Fragment::LlmOutput(DEMO_OUTPUT.into()))
            .unwrap();
        assert_eq!(appended.tool_calls_extracted, 1);
        assert_eq!(appended.sequence, 4);

        let expected = format!(
            "TEMPLATE\n<UserInput>五彩斑斓的黑</UserInput>\n<Start><SessionId>demo</SessionId><Reason>UserInput</Reason></Start>\n{DEMO_OUTPUT}"
        );
        let prompt = ledger.get_current_prompt("demo").unwrap().unwrap();
        assert_eq!(prompt, expected);
        assert_eq!(appended.new_length, expected.chars().count());

        let records = ledger.tool_calls("demo", 0, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].snapshot_id, appended.snapshot_id);
        assert_eq!(records[0].call.tool_name, "image_gen");
        assert_eq!(records[0].call.description.as_deref(), Some("d"));
        assert_eq!(
            records[0].call.arguments_value(),
            json!({"query": "五彩斑斓的黑"})
        );
    }

    #[test]
    fn test_monotonic_extension() {
        let ledger = ledger();
        ledger.create_session("m", None).unwrap();
        ledger
            .append_fragment("m", Fragment::UserInput(String::new()))
            .unwrap();
        ledger
            .append_fragment("m", Fragment::SystemMarker { reason: String::new() })
            .unwrap();
        ledger
            .append_fragment("m", Fragment::LlmOutput(String::new()))
            .unwrap();

        let history = ledger.history("m", &HistoryFilter::default()).unwrap();
        assert_eq!(history.len(), 4);
        for pair in history.windows(2) {
            assert_eq!(pair[1].sequence, pair[0].sequence + 1);
            assert!(pair[1].text.starts_with(&format!("{}\n", pair[0].text)));
            assert!(pair[1].len() > pair[0].len());
        }
    }

    #[test]
    fn test_idempotent_read() {
        let ledger = ledger();
        ledger.create_session("r", None).unwrap();
        ledger
            .append_fragment("r", Fragment::UserInput("x".into()))
            .unwrap();
        let first = ledger.get_current_prompt("r").unwrap();
        let second = ledger.get_current_prompt("r").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_extraction_only_on_raw_llm_fragment() {
        let ledger = ledger();
        // Action markup in the template and user input is never mined.
        ledger.create_session("x", Some(DEMO_OUTPUT)).unwrap();
        let user = ledger
            .append_fragment("x", Fragment::UserInput(DEMO_OUTPUT.into()))
            .unwrap();
        assert_eq!(user.tool_calls_extracted, 0);
        let out = ledger
            .append_fragment("x", Fragment::LlmOutput("no tools here".into()))
            .unwrap();
        assert_eq!(out.tool_calls_extracted, 0);
        assert!(ledger.tool_calls("x", 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_configured_pairing_policy() {
        let text = "<Action><ToolName>t</ToolName><Description>1</Description></Action>\
                    <Action><ToolName>t</ToolName><Description>2</Description></Action>\
                    <ActionInput><ToolName>t</ToolName><Arguments>{\"n\":1}</Arguments></ActionInput>\
                    <ActionInput><ToolName>t</ToolName><Arguments>{\"n\":2}</Arguments></ActionInput>";
        let exclusive = SessionLedger::new(
            MemoryLedgerStore::new(),
            LedgerSettings {
                default_template: String::new(),
                extract: ExtractOptions {
                    pairing: Pairing::Exclusive,
                },
            },
        );
        let calls = exclusive.extract_tool_calls(text);
        assert_eq!(calls[1].arguments_value(), json!({"n": 2}));

        let calls = ledger().extract_tool_calls(text);
        assert_eq!(calls[1].arguments_value(), json!({"n": 1}));
    }

    #[test]
    fn test_list_history_and_tool_call_paging() {
        let ledger = ledger();
        ledger.create_session("a", None).unwrap();
        ledger.create_session("b", None).unwrap();
        ledger
            .append_fragment("a", Fragment::LlmOutput(DEMO_OUTPUT.into()))
            .unwrap();
        ledger
            .append_fragment("a", Fragment::LlmOutput(DEMO_OUTPUT.into()))
            .unwrap();
        ledger.set_status("b", SessionStatus::Completed).unwrap();

        let all = ledger.list_sessions(&SessionFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        let completed = ledger
            .list_sessions(&SessionFilter {
                status: Some(SessionStatus::Completed),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].key.as_str(), "b");

        let outputs = ledger
            .history(
                "a",
                &HistoryFilter {
                    kind: Some(SnapshotKind::LlmOutput),
                    skip: 1,
                    limit: Some(5),
                },
            )
            .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].sequence, 3);

        let newest = ledger.tool_calls("a", 0, Some(1)).unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].sequence, 3);

        assert!(matches!(
            ledger.history("zzz", &HistoryFilter::default()),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_status_is_external_attribute() {
        let ledger = ledger();
        ledger.create_session("s", None).unwrap();
        ledger.set_status("s", SessionStatus::Error).unwrap();
        ledger.set_status("s", SessionStatus::Active).unwrap();
        assert_eq!(
            ledger.session("s").unwrap().unwrap().status,
            SessionStatus::Active
        );
        assert!(matches!(
            ledger.set_status("nope", SessionStatus::Completed),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_stats() {
        let ledger = ledger();
        ledger.create_session("a", None).unwrap();
        ledger.create_session("b", None).unwrap();
        ledger
            .append_fragment("a", Fragment::LlmOutput(DEMO_OUTPUT.into()))
            .unwrap();
        ledger.set_status("a", SessionStatus::Completed).unwrap();

        let stats = ledger.stats().unwrap();
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.sessions_by_status["completed"], 1);
        assert_eq!(stats.sessions_by_status["error"], 0);
        assert_eq!(stats.snapshots, 3);
        assert_eq!(stats.snapshots_by_kind["init"], 2);
        assert_eq!(stats.snapshots_by_kind["llm_output"], 1);
        assert_eq!(stats.tool_calls, 1);
    }

    #[test]
    fn test_concurrent_append_serialization() {
        let ledger = std::sync::Arc::new(ledger());
        ledger.create_session("c", None).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for j in 0..10 {
                        ledger
                            .append_fragment("c", Fragment::UserInput(format!("{i}-{j}")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let history = ledger.history("c", &HistoryFilter::default()).unwrap();
        assert_eq!(history.len(), 81);
        for (i, snapshot) in history.iter().enumerate() {
            assert_eq!(snapshot.sequence, i as u64 + 1);
        }
        for pair in history.windows(2) {
            assert!(pair[1].text.starts_with(&pair[0].text));
        }
    }

    #[test]
    fn test_open_requires_init() {
        let tmp = tempfile::TempDir::new().unwrap();
        git2::Repository::init(tmp.path()).unwrap();
        assert!(matches!(
            SessionLedger::open(tmp.path()),
            Err(CoreError::NotInitialized)
        ));
    }

    #[test]
    fn test_append_to_unknown_session_leaves_no_lock_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        git2::Repository::init(tmp.path()).unwrap();
        let store = GitLedgerStore::open(tmp.path()).unwrap();
        store.init(&LedgerConfig::default_init()).unwrap();
        let lock_dir = store.lock_dir();
        let ledger = SessionLedger::new(store, LedgerSettings::default());

        for key in ["ghost-1", "ghost-2"] {
            assert!(matches!(
                ledger.append_fragment(key, Fragment::UserInput("x".into())),
                Err(CoreError::NotFound { .. })
            ));
        }
        assert_eq!(std::fs::read_dir(&lock_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_git_backed_ledger() {
        let tmp = tempfile::TempDir::new().unwrap();
        git2::Repository::init(tmp.path()).unwrap();
        let store = GitLedgerStore::open(tmp.path()).unwrap();
        store.init(&LedgerConfig::default_init()).unwrap();
        let ledger = SessionLedger::new(store, LedgerSettings::default());

        ledger.create_session("demo", None).unwrap();
        let appended = ledger
            .append_fragment("demo", Fragment::LlmOutput(DEMO_OUTPUT.into()))
            .unwrap();
        assert_eq!(appended.tool_calls_extracted, 1);

        let reopened = SessionLedger::open(tmp.path()).unwrap();
        let prompt = reopened.get_current_prompt("demo").unwrap().unwrap();
        assert!(prompt.starts_with(crate::DEFAULT_TEMPLATE));
        assert!(prompt.ends_with(DEMO_OUTPUT));
        assert_eq!(reopened.tool_calls("demo", 0, None).unwrap().len(), 1);
    }
}
