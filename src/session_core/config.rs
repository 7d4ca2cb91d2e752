//! Configuration for the session level engine

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::offsets::OffsetTable;

/// Which price the level table is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasePriceMode {
    /// Canonical quartile table anchored at prior high (Q1) and prior low (Q4)
    PriorRange,
    /// Symmetric table around the prior session close
    PriorClose,
    /// Symmetric table around the prior session high
    PriorHigh,
    /// Symmetric table around the prior session low
    PriorLow,
    /// Symmetric table around the open of the new session
    CurrentOpen,
}

impl Default for BasePriceMode {
    fn default() -> Self {
        Self::PriorRange
    }
}

impl std::fmt::Display for BasePriceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PriorRange => write!(f, "prior-range"),
            Self::PriorClose => write!(f, "prior-close"),
            Self::PriorHigh => write!(f, "prior-high"),
            Self::PriorLow => write!(f, "prior-low"),
            Self::CurrentOpen => write!(f, "current-open"),
        }
    }
}

impl std::str::FromStr for BasePriceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prior-range" | "range" => Ok(Self::PriorRange),
            "prior-close" | "close" => Ok(Self::PriorClose),
            "prior-high" | "high" => Ok(Self::PriorHigh),
            "prior-low" | "low" => Ok(Self::PriorLow),
            "current-open" | "open" => Ok(Self::CurrentOpen),
            other => Err(format!("unknown base price mode: {}", other)),
        }
    }
}

/// Range window used to size the offsets
///
/// `ThreeDay` is accepted but sizes the range from the prior session only,
/// same as `OneDay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeMode {
    OneDay,
    ThreeDay,
}

impl Default for RangeMode {
    fn default() -> Self {
        Self::OneDay
    }
}

impl std::str::FromStr for RangeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1d" | "one-day" => Ok(Self::OneDay),
            "3d" | "three-day" => Ok(Self::ThreeDay),
            other => Err(format!("unknown range mode: {}", other)),
        }
    }
}

/// How the tracker treats a trading day earlier than the one it is tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionOrdering {
    /// Any change of trading day starts a new session
    Unchecked,
    /// A trading day earlier than the tracked one is rejected
    RejectRegression,
}

impl Default for SessionOrdering {
    fn default() -> Self {
        Self::Unchecked
    }
}

/// Configuration for the session level engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Finalized sessions kept in history (default: 5)
    pub retained_sessions: usize,

    /// Anchor policy, also selects the default offset table
    pub base_price_mode: BasePriceMode,

    /// Carried for hosts that expose it; has no effect on computed levels
    pub use_gap_calculation: bool,

    pub range_mode: RangeMode,

    pub session_ordering: SessionOrdering,

    /// Replaces the table chosen by `base_price_mode`
    #[serde(default)]
    pub offset_table: Option<OffsetTable>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retained_sessions: 5,
            base_price_mode: BasePriceMode::PriorRange,
            use_gap_calculation: false,
            range_mode: RangeMode::OneDay,
            session_ordering: SessionOrdering::Unchecked,
            offset_table: None,
        }
    }
}

impl EngineConfig {
    /// Symmetric levels around the prior close
    pub fn prior_close() -> Self {
        Self {
            base_price_mode: BasePriceMode::PriorClose,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retained_sessions < 1 {
            return Err(ConfigError::RetainedSessions(self.retained_sessions));
        }
        if let Some(table) = &self.offset_table {
            table.validate()?;
        }
        Ok(())
    }

    /// Table used by the calculator: the override if set, else the mode default
    pub fn resolved_table(&self) -> OffsetTable {
        match &self.offset_table {
            Some(table) => table.clone(),
            None => OffsetTable::for_mode(self.base_price_mode),
        }
    }
}
