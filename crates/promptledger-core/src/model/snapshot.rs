use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SessionKey;
use crate::error::CoreError;

/// Store-assigned identity of a snapshot (a commit id for the Git backend).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for display.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Init,
    UserInput,
    SystemMarker,
    LlmOutput,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 4] = [
        SnapshotKind::Init,
        SnapshotKind::UserInput,
        SnapshotKind::SystemMarker,
        SnapshotKind::LlmOutput,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Init => "init",
            SnapshotKind::UserInput => "user_input",
            SnapshotKind::SystemMarker => "system_marker",
            SnapshotKind::LlmOutput => "llm_output",
        }
    }
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SnapshotKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(SnapshotKind::Init),
            "user_input" | "user-input" => Ok(SnapshotKind::UserInput),
            "system_marker" | "system-marker" => Ok(SnapshotKind::SystemMarker),
            "llm_output" | "llm-output" => Ok(SnapshotKind::LlmOutput),
            other => Err(CoreError::Config(format!("unknown snapshot kind '{other}'"))),
        }
    }
}

/// The full prompt text of a session at one point in its history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptSnapshot {
    pub id: SnapshotId,
    pub key: SessionKey,
    /// 1 for the `init` snapshot, then +1 per append. Authoritative for
    /// ordering; `created_at` is informational only.
    pub sequence: u64,
    pub kind: SnapshotKind,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl PromptSnapshot {
    /// Length of the prompt in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// One increment appended to a session's prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Raw user text, wrapped in `<UserInput>`.
    UserInput(String),
    /// A `<Start>` marker carrying the session key and the reason the
    /// next model turn begins.
    SystemMarker { reason: String },
    /// Model output, appended verbatim.
    LlmOutput(String),
}

impl Fragment {
    /// Build a fragment from the boundary's `(kind, payload, reason)` form.
    ///
    /// The payload is ignored for system markers; a missing reason renders
    /// as an empty `<Reason>`. `init` is not appendable.
    pub fn from_parts(
        kind: SnapshotKind,
        payload: impl Into<String>,
        reason: Option<String>,
    ) -> Result<Self, CoreError> {
        match kind {
            SnapshotKind::UserInput => Ok(Fragment::UserInput(payload.into())),
            SnapshotKind::SystemMarker => Ok(Fragment::SystemMarker {
                reason: reason.unwrap_or_default(),
            }),
            SnapshotKind::LlmOutput => Ok(Fragment::LlmOutput(payload.into())),
            SnapshotKind::Init => Err(CoreError::Config(
                "init snapshots are written by session creation only".into(),
            )),
        }
    }

    pub fn kind(&self) -> SnapshotKind {
        match self {
            Fragment::UserInput(_) => SnapshotKind::UserInput,
            Fragment::SystemMarker { .. } => SnapshotKind::SystemMarker,
            Fragment::LlmOutput(_) => SnapshotKind::LlmOutput,
        }
    }

    /// The text appended (after a newline) to the previous snapshot.
    pub fn render(&self, key: &SessionKey) -> String {
        match self {
            Fragment::UserInput(text) => format!("<UserInput>{text}</UserInput>"),
            Fragment::SystemMarker { reason } => format!(
                "<Start><SessionId>{}</SessionId><Reason>{reason}</Reason></Start>",
                key.as_str()
            ),
            Fragment::LlmOutput(text) => text.clone(),
        }
    }

    /// `previous + "\n" + rendered fragment`.
    pub fn extend(&self, previous: &str, key: &SessionKey) -> String {
        let fragment = self.render(key);
        let mut text = String::with_capacity(previous.len() + 1 + fragment.len());
        text.push_str(previous);
        text.push('\n');
        text.push_str(&fragment);
        text
    }
}
