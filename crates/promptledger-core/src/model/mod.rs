pub mod session;
pub mod snapshot;
pub mod tool_call;

pub use session::{Session, SessionId, SessionKey, SessionStatus, MAX_KEY_LEN};
pub use snapshot::{Fragment, PromptSnapshot, SnapshotId, SnapshotKind};
pub use tool_call::{ToolCall, ToolCallRecord, RAW_ARGUMENTS_KEY};
