//! Fluent Rust SDK for recording an agent loop in a promptledger.
//!
//! # Example
//! ```no_run
//! use promptledger_sdk::{PromptSession, SessionLedger, SessionStatus};
//!
//! let ledger = SessionLedger::discover().unwrap();
//! let session = PromptSession::begin(&ledger, "chat-42", None).unwrap();
//! session.turn("Draw something pitch black", "UserInput").unwrap();
//! let prompt = session.current_prompt().unwrap();
//! // ... send `prompt` to the model ...
//! let output = session.llm_output("<Action>...</Action>").unwrap();
//! println!("{} tool calls", output.tool_calls_extracted);
//! session.finish(SessionStatus::Completed).unwrap();
//! ```

mod session;

pub use session::PromptSession;

// Re-export core types that SDK users may need
pub use promptledger_core::model::{
    PromptSnapshot, Session, SessionStatus, SnapshotKind, ToolCall, ToolCallRecord,
};
pub use promptledger_core::storage::{GitLedgerStore, LedgerStore, MemoryLedgerStore};
pub use promptledger_core::{CoreError, FragmentAppended, LedgerSettings, SessionLedger};
