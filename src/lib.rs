// Library crate - exports the session level engine and its host-side helpers

pub mod types;
pub mod session_core;
pub mod calendar;
pub mod cache;
pub mod api;

// Re-export commonly used types
pub use types::*;
pub use session_core::{EngineConfig, EngineError, SessionLevelEngine};
pub use calendar::{SessionRolloverClassifier, TradingDayClassifier, UtcDateClassifier};
