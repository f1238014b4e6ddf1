use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::CoreError;

/// Longest accepted session key, in characters.
pub const MAX_KEY_LEN: usize = 64;

/// The caller-supplied key a session is created under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey(pub String);

impl SessionKey {
    /// Parse and validate a key for session creation. Must be 1..=64 characters.
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        let len = s.chars().count();
        if len == 0 || len > MAX_KEY_LEN {
            return Err(CoreError::InvalidKey(format!(
                "key must be 1..={MAX_KEY_LEN} characters, got {len}"
            )));
        }
        Ok(Self(s))
    }

    /// Hex SHA-256 of the key. Used as the storage path component so any
    /// key string maps to a valid ref name.
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.0.as_bytes());
        hash.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Internally assigned session identity (UUID v4 hex, no dashes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().as_simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation outcome. Set from outside the ledger; the ledger only stores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Error,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 3] = [
        SessionStatus::Active,
        SessionStatus::Completed,
        SessionStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            "error" => Ok(SessionStatus::Error),
            other => Err(CoreError::Config(format!("unknown session status '{other}'"))),
        }
    }
}

/// A recorded session. `initial_prompt` is the immutable template the
/// snapshot chain starts from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub key: SessionKey,
    pub initial_prompt: String,
    #[serde(default)]
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh `active` session.
    pub fn new(key: SessionKey, initial_prompt: String) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            key,
            initial_prompt,
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parse_validation() {
        assert!(SessionKey::parse("s").is_ok());
        assert!(SessionKey::parse("a".repeat(MAX_KEY_LEN)).is_ok());
        assert!(SessionKey::parse("").is_err());
        assert!(SessionKey::parse("a".repeat(MAX_KEY_LEN + 1)).is_err());
        // Characters, not bytes
        assert!(SessionKey::parse("会".repeat(MAX_KEY_LEN)).is_ok());
    }

    #[test]
    fn test_key_digest_is_stable_hex() {
        let key = SessionKey::from("demo");
        let digest = key.digest();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, SessionKey::from("demo").digest());
        assert_ne!(digest, SessionKey::from("demo2").digest());
    }

    #[test]
    fn test_session_id_generation() {
        let id = SessionId::new();
        assert_eq!(id.0.len(), 32);
        assert_ne!(id, SessionId::new());
    }

    #[test]
    fn test_status_parse_and_serde() {
        for status in SessionStatus::ALL {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("done".parse::<SessionStatus>().is_err());
        let json = serde_json::to_string(&SessionStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn test_new_session_is_active() {
        let session = Session::new(SessionKey::from("s1"), "template".into());
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.created_at, session.updated_at);
    }
}
