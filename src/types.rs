use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One closed bar delivered by the host feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarObservation {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: u64,
}

impl BarObservation {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// `high >= low`; false for NaN prices as well
    pub fn is_well_formed(&self) -> bool {
        self.high >= self.low
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}
