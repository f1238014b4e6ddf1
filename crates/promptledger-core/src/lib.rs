//! Append-only prompt ledger for LLM sessions.
//!
//! A session's prompt grows one fragment at a time; every growth step is
//! stored as an immutable [`model::PromptSnapshot`]. Model output appended to
//! the ledger is mined for `<Action>` / `<ActionInput>` tool calls by
//! [`extract::extract_tool_calls`].

pub mod config;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod model;
pub mod storage;

pub use config::{LedgerConfig, LedgerSettings, DEFAULT_TEMPLATE};
pub use error::CoreError;
pub use extract::{extract_tool_calls, ExtractOptions, Pairing};
pub use ledger::{
    FragmentAppended, HistoryFilter, LedgerStats, SessionCreated, SessionFilter, SessionLedger,
};
