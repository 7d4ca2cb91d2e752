//! Session tracking
//!
//! Turns the bar stream into session-boundary events. The trading day of each
//! bar comes from the caller; the tracker only compares it with the day it is
//! currently tracking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::config::SessionOrdering;
use super::error::EngineError;
use crate::types::BarObservation;

/// Realized range of one trading session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub trading_day: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    /// Close of the last bar seen
    pub close: f64,
    pub bar_count: usize,
}

impl SessionSnapshot {
    fn seed(trading_day: NaiveDate, bar: &BarObservation) -> Self {
        Self {
            trading_day,
            high: bar.high,
            low: bar.low,
            open: bar.open,
            close: bar.close,
            bar_count: 1,
        }
    }

    fn update(&mut self, bar: &BarObservation) {
        self.high = self.high.max(bar.high);
        self.low = self.low.min(bar.low);
        self.close = bar.close;
        self.bar_count += 1;
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Result of feeding one bar to the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Continuing,
    /// A new trading day began; carries the finalized prior session, or
    /// `None` for the first session of the stream
    NewSessionStarted(Option<SessionSnapshot>),
}

#[derive(Debug, Default)]
pub struct SessionTracker {
    ordering: SessionOrdering,
    running: Option<SessionSnapshot>,
    bars_seen: usize,
}

impl SessionTracker {
    pub fn new(ordering: SessionOrdering) -> Self {
        Self {
            ordering,
            running: None,
            bars_seen: 0,
        }
    }

    pub fn on_bar(
        &mut self,
        bar: &BarObservation,
        trading_day: NaiveDate,
    ) -> Result<SessionEvent, EngineError> {
        let bar_index = self.bars_seen;
        self.bars_seen += 1;

        if !bar.is_well_formed() {
            return Err(EngineError::InvalidObservation {
                bar_index,
                high: bar.high,
                low: bar.low,
            });
        }

        let ordering = self.ordering;
        let Some(running) = self.running.as_mut() else {
            self.running = Some(SessionSnapshot::seed(trading_day, bar));
            return Ok(SessionEvent::NewSessionStarted(None));
        };

        if running.trading_day == trading_day {
            running.update(bar);
            return Ok(SessionEvent::Continuing);
        }

        if ordering == SessionOrdering::RejectRegression && trading_day < running.trading_day {
            return Err(EngineError::OutOfOrderSession {
                current: running.trading_day,
                got: trading_day,
            });
        }

        let prior = std::mem::replace(running, SessionSnapshot::seed(trading_day, bar));
        Ok(SessionEvent::NewSessionStarted(Some(prior)))
    }

    /// Bars delivered so far, including rejected ones
    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    /// Running snapshot of the in-progress session
    pub fn current(&self) -> Option<&SessionSnapshot> {
        self.running.as_ref()
    }

    pub fn reset(&mut self) {
        self.running = None;
        self.bars_seen = 0;
    }
}
