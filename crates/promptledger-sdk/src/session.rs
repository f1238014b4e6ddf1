use promptledger_core::error::CoreError;
use promptledger_core::ledger::{FragmentAppended, HistoryFilter, SessionLedger};
use promptledger_core::model::{
    Fragment, PromptSnapshot, Session, SessionStatus, SnapshotKind, ToolCall, ToolCallRecord,
};
use promptledger_core::storage::LedgerStore;

/// A handle on one session of a [`SessionLedger`].
///
/// Use this from agent code to feed the ledger turn by turn: user input,
/// the `<Start>` marker that hands control to the model, then the model's
/// output. Every call is its own committed append.
pub struct PromptSession<'a, S: LedgerStore> {
    ledger: &'a SessionLedger<S>,
    key: String,
}

impl<'a, S: LedgerStore> PromptSession<'a, S> {
    /// Create a new session. `None` uses the ledger's default template.
    pub fn begin(
        ledger: &'a SessionLedger<S>,
        key: &str,
        template: Option<&str>,
    ) -> Result<Self, CoreError> {
        ledger.create_session(key, template)?;
        Ok(Self {
            ledger,
            key: key.to_string(),
        })
    }

    /// Attach to an existing session.
    pub fn resume(ledger: &'a SessionLedger<S>, key: &str) -> Result<Self, CoreError> {
        if ledger.session(key)?.is_none() {
            return Err(CoreError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(Self {
            ledger,
            key: key.to_string(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append raw user text.
    pub fn user_input(&self, text: &str) -> Result<FragmentAppended, CoreError> {
        self.ledger
            .append_fragment(&self.key, Fragment::UserInput(text.to_string()))
    }

    /// Append the `<Start>` marker for the next model turn.
    pub fn start(&self, reason: &str) -> Result<FragmentAppended, CoreError> {
        self.ledger.append_fragment(
            &self.key,
            Fragment::SystemMarker {
                reason: reason.to_string(),
            },
        )
    }

    /// User input followed by a `<Start>` marker, as one turn.
    pub fn turn(&self, user_text: &str, reason: &str) -> Result<FragmentAppended, CoreError> {
        self.user_input(user_text)?;
        self.start(reason)
    }

    /// Append model output verbatim; its tool calls are extracted and stored.
    pub fn llm_output(&self, output: &str) -> Result<FragmentAppended, CoreError> {
        self.ledger
            .append_fragment(&self.key, Fragment::LlmOutput(output.to_string()))
    }

    /// The full prompt to send to the model next.
    pub fn current_prompt(&self) -> Result<String, CoreError> {
        self.ledger
            .get_current_prompt(&self.key)?
            .ok_or_else(|| CoreError::NotFound {
                key: self.key.clone(),
            })
    }

    /// Tool calls extracted from the most recent model output, in text order.
    /// Empty when that output carried no calls or no output exists yet.
    pub fn last_tool_calls(&self) -> Result<Vec<ToolCall>, CoreError> {
        let outputs = self.ledger.history(
            &self.key,
            &HistoryFilter {
                kind: Some(SnapshotKind::LlmOutput),
                ..Default::default()
            },
        )?;
        let Some(latest) = outputs.last() else {
            return Ok(Vec::new());
        };
        let mut calls: Vec<ToolCallRecord> = self
            .ledger
            .tool_calls(&self.key, 0, None)?
            .into_iter()
            .filter(|r| r.snapshot_id == latest.id)
            .collect();
        calls.sort_by_key(|r| r.index);
        Ok(calls.into_iter().map(|r| r.call).collect())
    }

    pub fn history(&self) -> Result<Vec<PromptSnapshot>, CoreError> {
        self.ledger.history(&self.key, &HistoryFilter::default())
    }

    /// Record the outcome of the conversation.
    pub fn finish(self, status: SessionStatus) -> Result<Session, CoreError> {
        tracing::debug!("Finishing session {} as {status}", self.key);
        self.ledger.set_status(&self.key, status)
    }
}
