//! Session level engine
//!
//! Owns one tracker, one calculator and one history and drives them in
//! sequence for every bar:
//! 1. tracker detects whether the bar opens a new trading day
//! 2. on a new day the open set is finalized and a fresh one started
//! 3. if a finalized prior session exists, its levels populate the new set

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::calculator::{LevelCalculator, LevelInputs};
use super::config::{EngineConfig, RangeMode};
use super::error::EngineError;
use super::history::LevelHistory;
use super::levels::LevelsSnapshot;
use super::render::{NoopRelease, RenderHandle, ResourceRelease};
use super::tracker::{SessionEvent, SessionSnapshot, SessionTracker};
use crate::calendar::TradingDayClassifier;
use crate::types::BarObservation;

/// What a bar did to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum BarOutcome {
    Continuing,
    NewSession {
        trading_day: NaiveDate,
        /// Finalized prior session; `None` for the first session of the stream
        prior: Option<SessionSnapshot>,
        /// Levels stored for the new session (0 without a prior session)
        level_count: usize,
        /// Sessions evicted from history by this rollover
        evicted: Vec<NaiveDate>,
    },
}

pub struct SessionLevelEngine<R: ResourceRelease = NoopRelease> {
    config: EngineConfig,
    tracker: SessionTracker,
    calculator: LevelCalculator,
    history: LevelHistory<R>,
}

impl SessionLevelEngine<NoopRelease> {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_release(config, NoopRelease)
    }
}

impl<R: ResourceRelease> SessionLevelEngine<R> {
    pub fn with_release(config: EngineConfig, releaser: R) -> Result<Self, EngineError> {
        config.validate()?;

        if config.range_mode == RangeMode::ThreeDay {
            warn!("Three-day range mode is not implemented; levels use the prior session range");
        }
        if config.use_gap_calculation {
            debug!("Gap calculation flag is set; it does not change computed levels");
        }

        let calculator = LevelCalculator::from_config(&config);
        let history = LevelHistory::with_release(config.retained_sessions, releaser)?;

        info!(
            "Session level engine ready: mode={}, {} levels per session, retaining {} sessions",
            config.base_price_mode,
            calculator.table().len(),
            config.retained_sessions
        );

        Ok(Self {
            tracker: SessionTracker::new(config.session_ordering),
            calculator,
            history,
            config,
        })
    }

    /// Feed one closed bar with the trading day assigned by the host calendar
    ///
    /// Every bar consumes a bar index, rejected ones included, so indices
    /// line up with the host chart.
    pub fn on_bar(
        &mut self,
        bar: &BarObservation,
        trading_day: NaiveDate,
    ) -> Result<BarOutcome, EngineError> {
        let bar_index = self.tracker.bars_seen();

        let prior = match self.tracker.on_bar(bar, trading_day)? {
            SessionEvent::Continuing => return Ok(BarOutcome::Continuing),
            SessionEvent::NewSessionStarted(prior) => prior,
        };

        let evicted = if self.history.current().is_some() {
            self.history.finalize_current(bar_index.saturating_sub(1))?
        } else {
            Vec::new()
        };

        self.history.start_new_current(trading_day, bar_index)?;

        let level_count = match &prior {
            Some(prior) => {
                let levels = self
                    .calculator
                    .calculate(&LevelInputs::from_prior(prior, bar.open));
                if levels.is_empty() {
                    debug!("No levels for {}: prior session {} gave no valid range", trading_day, prior.trading_day);
                }
                let count = levels.len();
                self.history.populate_current(levels)?;
                count
            }
            None => 0,
        };

        match &prior {
            Some(p) => info!(
                "New session {} at bar {}: prior {} H={:.2} L={:.2} -> {} levels",
                trading_day, bar_index, p.trading_day, p.high, p.low, level_count
            ),
            None => info!("First session {} at bar {}", trading_day, bar_index),
        }

        Ok(BarOutcome::NewSession {
            trading_day,
            prior,
            level_count,
            evicted,
        })
    }

    /// Feed one bar, asking a classifier for its trading day
    pub fn on_bar_with<C: TradingDayClassifier + ?Sized>(
        &mut self,
        bar: &BarObservation,
        classifier: &C,
    ) -> Result<BarOutcome, EngineError> {
        self.on_bar(bar, classifier.trading_day(bar.timestamp))
    }

    pub fn attach_handle(
        &mut self,
        trading_day: NaiveDate,
        level: &str,
        handle: RenderHandle,
    ) -> Result<(), EngineError> {
        self.history.attach_handle(trading_day, level, handle)
    }

    pub fn history(&self) -> &LevelHistory<R> {
        &self.history
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Owned copy of the current and retained sets
    pub fn snapshot(&self) -> LevelsSnapshot {
        self.history.snapshot()
    }

    /// Release everything and forget the running session
    pub fn shutdown(&mut self) {
        self.history.clear();
        self.tracker.reset();
        info!("Session level engine shut down");
    }
}
