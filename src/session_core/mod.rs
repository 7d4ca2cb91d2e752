//! Session Core - prior-session price levels
//!
//! This module contains the level engine components:
//! - Session boundary tracking over a bar stream
//! - Level calculation from offset tables
//! - Rolling history of level sets with render-resource release
//! - The engine tying them together per bar

pub mod calculator;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod levels;
pub mod offsets;
pub mod render;
pub mod tracker;

// Re-export commonly used types
pub use calculator::{LevelCalculator, LevelInputs};
pub use config::{BasePriceMode, EngineConfig, RangeMode, SessionOrdering};
pub use engine::{BarOutcome, SessionLevelEngine};
pub use error::{ConfigError, EngineError};
pub use history::LevelHistory;
pub use levels::{ColorTag, LevelView, LevelsSnapshot, PriceLevel, SessionLevelSet, SessionView};
pub use offsets::{Anchor, OffsetEntry, OffsetTable};
pub use render::{NoopRelease, RecordingRelease, ReleasedHandle, RenderHandle, ResourceRelease};
pub use tracker::{SessionEvent, SessionSnapshot, SessionTracker};
