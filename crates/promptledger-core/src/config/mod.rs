pub mod settings;
pub mod template;

pub use settings::{LedgerConfig, LedgerSettings};
pub use template::DEFAULT_TEMPLATE;
