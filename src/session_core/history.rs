//! Rolling window of session level sets
//!
//! Holds the current (open) session plus at most `max_retained` finalized
//! sessions, oldest first. The current set is only reachable through
//! [`LevelHistory::current`], never through the retained iterator.

use chrono::NaiveDate;
use std::collections::VecDeque;
use tracing::{debug, info};

use super::error::{ConfigError, EngineError};
use super::levels::{LevelsSnapshot, PriceLevel, SessionLevelSet};
use super::render::{NoopRelease, RenderHandle, ResourceRelease};

pub struct LevelHistory<R: ResourceRelease = NoopRelease> {
    retained: VecDeque<SessionLevelSet>,
    current: Option<SessionLevelSet>,
    max_retained: usize,
    releaser: R,
}

impl LevelHistory<NoopRelease> {
    pub fn new(max_retained: usize) -> Result<Self, ConfigError> {
        Self::with_release(max_retained, NoopRelease)
    }
}

impl<R: ResourceRelease> LevelHistory<R> {
    pub fn with_release(max_retained: usize, releaser: R) -> Result<Self, ConfigError> {
        if max_retained < 1 {
            return Err(ConfigError::RetainedSessions(max_retained));
        }
        Ok(Self {
            retained: VecDeque::new(),
            current: None,
            max_retained,
            releaser,
        })
    }

    /// Open an empty set for a session that just started
    pub fn start_new_current(
        &mut self,
        trading_day: NaiveDate,
        start_bar_index: usize,
    ) -> Result<(), EngineError> {
        if self.current.is_some() {
            return Err(precondition("start_new_current called while a session is still open"));
        }
        self.current = Some(SessionLevelSet::new(trading_day, start_bar_index));
        Ok(())
    }

    /// Store the calculated levels on the current set
    pub fn populate_current(&mut self, levels: Vec<PriceLevel>) -> Result<(), EngineError> {
        let Some(current) = self.current.as_mut() else {
            return Err(precondition("populate_current called before start_new_current"));
        };

        let trading_day = current.trading_day;
        for mut old in current.set_levels(levels) {
            if let Some(handle) = old.take_handle() {
                self.releaser.release(trading_day, &old.name, handle);
            }
        }
        Ok(())
    }

    /// Move the current set into history and evict past the retention bound
    ///
    /// Returns the trading days that were evicted, oldest first.
    pub fn finalize_current(&mut self, end_bar_index: usize) -> Result<Vec<NaiveDate>, EngineError> {
        let Some(mut set) = self.current.take() else {
            return Err(precondition("finalize_current called without an open session"));
        };

        set.end_bar_index = Some(end_bar_index);
        debug!(
            "Finalized {} (bars {}..={}, {} levels)",
            set.trading_day,
            set.start_bar_index,
            end_bar_index,
            set.len()
        );
        self.retained.push_back(set);

        let mut evicted = Vec::new();
        while self.retained.len() > self.max_retained {
            if let Some(mut old) = self.retained.pop_front() {
                release_set(&mut self.releaser, &mut old);
                evicted.push(old.trading_day);
            }
        }

        if !evicted.is_empty() {
            info!("Evicted sessions {:?} (retaining {})", evicted, self.max_retained);
        }
        Ok(evicted)
    }

    /// Evict everything, the current set included
    pub fn clear(&mut self) {
        while let Some(mut set) = self.retained.pop_front() {
            release_set(&mut self.releaser, &mut set);
        }
        if let Some(mut set) = self.current.take() {
            release_set(&mut self.releaser, &mut set);
        }
    }

    /// Bind a host render resource to a level
    ///
    /// A handle already bound to that level is released first.
    pub fn attach_handle(
        &mut self,
        trading_day: NaiveDate,
        level: &str,
        handle: RenderHandle,
    ) -> Result<(), EngineError> {
        let set = self
            .current
            .iter_mut()
            .chain(self.retained.iter_mut().rev())
            .find(|s| s.trading_day == trading_day);

        let Some(target) = set.and_then(|s| s.get_mut(level)) else {
            return Err(EngineError::UnknownLevel {
                trading_day,
                name: level.to_string(),
            });
        };

        if let Some(old) = target.replace_handle(handle) {
            if old != handle {
                self.releaser.release(trading_day, level, old);
            }
        }
        Ok(())
    }

    pub fn current(&self) -> Option<&SessionLevelSet> {
        self.current.as_ref()
    }

    /// Finalized sessions, oldest first
    pub fn retained(&self) -> impl Iterator<Item = &SessionLevelSet> {
        self.retained.iter()
    }

    /// Most recent finalized session for a trading day
    pub fn get(&self, trading_day: NaiveDate) -> Option<&SessionLevelSet> {
        self.retained.iter().rev().find(|s| s.trading_day == trading_day)
    }

    pub fn len(&self) -> usize {
        self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    pub fn max_retained(&self) -> usize {
        self.max_retained
    }

    pub fn releaser(&self) -> &R {
        &self.releaser
    }

    pub fn snapshot(&self) -> LevelsSnapshot {
        LevelsSnapshot {
            current: self.current.as_ref().map(SessionLevelSet::view),
            history: self.retained.iter().map(SessionLevelSet::view).collect(),
        }
    }
}

impl<R: ResourceRelease> Drop for LevelHistory<R> {
    fn drop(&mut self) {
        self.clear();
    }
}

fn release_set<R: ResourceRelease>(releaser: &mut R, set: &mut SessionLevelSet) {
    let trading_day = set.trading_day;
    for level in set.levels_mut() {
        if let Some(handle) = level.take_handle() {
            releaser.release(trading_day, &level.name, handle);
        }
    }
}

/// Out-of-sequence calls are bugs in the caller: loud in debug builds,
/// an error value in release builds.
fn precondition(message: &'static str) -> EngineError {
    debug_assert!(false, "{}", message);
    EngineError::Precondition(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_core::levels::ColorTag;
    use crate::session_core::render::RecordingRelease;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn levels(high: f64, low: f64) -> Vec<PriceLevel> {
        vec![
            PriceLevel::new("Q1", high, None, ColorTag::PriorHigh),
            PriceLevel::new("Q4", low, None, ColorTag::PriorLow),
        ]
    }

    /// Open, populate and attach a handle to Q1; handle id = day number
    fn add_session<R: ResourceRelease>(history: &mut LevelHistory<R>, d: u32, start: usize) {
        history.start_new_current(day(d), start).unwrap();
        history.populate_current(levels(110.0, 100.0)).unwrap();
        history.attach_handle(day(d), "Q1", RenderHandle(d as u64)).unwrap();
    }

    #[test]
    fn test_zero_retention_rejected() {
        assert!(matches!(
            LevelHistory::new(0),
            Err(ConfigError::RetainedSessions(0))
        ));
    }

    #[test]
    fn test_retention_bound() {
        for k in 1..=4usize {
            for n in 0..=7usize {
                let mut history = LevelHistory::new(k).unwrap();
                for i in 0..n {
                    history.start_new_current(day(i as u32 + 1), i * 10).unwrap();
                    history.finalize_current(i * 10 + 9).unwrap();
                    assert!(history.len() <= k);
                }
                assert_eq!(history.len(), n.min(k));

                let days: Vec<_> = history.retained().map(|s| s.trading_day).collect();
                let expected: Vec<_> = (n.saturating_sub(k)..n).map(|i| day(i as u32 + 1)).collect();
                assert_eq!(days, expected);
            }
        }
    }

    #[test]
    fn test_current_not_visible_in_retained() {
        let mut history = LevelHistory::new(3).unwrap();
        history.start_new_current(day(3), 0).unwrap();
        history.populate_current(levels(110.0, 100.0)).unwrap();

        assert_eq!(history.len(), 0);
        assert_eq!(history.retained().count(), 0);
        assert_eq!(history.current().unwrap().value("Q1"), Some(110.0));
        assert_eq!(history.current().unwrap().end_bar_index, None);

        history.finalize_current(41).unwrap();
        assert!(history.current().is_none());
        let set = history.get(day(3)).unwrap();
        assert_eq!(set.end_bar_index, Some(41));
        assert!(set.is_finalized());
    }

    #[test]
    fn test_eviction_releases_oldest_session_only() {
        let mut history = LevelHistory::with_release(2, RecordingRelease::new()).unwrap();

        add_session(&mut history, 3, 0);
        assert!(history.finalize_current(9).unwrap().is_empty());
        add_session(&mut history, 4, 10);
        assert!(history.finalize_current(19).unwrap().is_empty());
        add_session(&mut history, 5, 20);
        let evicted = history.finalize_current(29).unwrap();

        assert_eq!(evicted, vec![day(3)]);
        let released = history.releaser().released();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].trading_day, day(3));
        assert_eq!(released[0].level, "Q1");
        assert_eq!(released[0].handle, RenderHandle(3));

        let days: Vec<_> = history.retained().map(|s| s.trading_day).collect();
        assert_eq!(days, vec![day(4), day(5)]);
    }

    #[test]
    fn test_clear_releases_everything_once() {
        let mut history = LevelHistory::with_release(5, RecordingRelease::new()).unwrap();
        add_session(&mut history, 3, 0);
        history.finalize_current(9).unwrap();
        add_session(&mut history, 4, 10);

        history.clear();
        assert!(history.is_empty());
        assert!(history.current().is_none());
        assert_eq!(history.releaser().len(), 2);

        history.clear();
        assert_eq!(history.releaser().len(), 2);
    }

    #[test]
    fn test_replaced_handle_released() {
        let mut history = LevelHistory::with_release(5, RecordingRelease::new()).unwrap();
        add_session(&mut history, 3, 0);

        history.attach_handle(day(3), "Q1", RenderHandle(99)).unwrap();
        assert_eq!(history.releaser().released()[0].handle, RenderHandle(3));
        assert_eq!(history.current().unwrap().get("Q1").unwrap().handle(), Some(RenderHandle(99)));

        // Same handle again is not a replacement
        history.attach_handle(day(3), "Q1", RenderHandle(99)).unwrap();
        assert_eq!(history.releaser().len(), 1);

        // Repopulating drops the old levels and their handles
        history.populate_current(levels(111.0, 101.0)).unwrap();
        assert_eq!(history.releaser().len(), 2);
        assert_eq!(history.releaser().released()[1].handle, RenderHandle(99));
    }

    #[test]
    fn test_attach_to_unknown_level() {
        let mut history = LevelHistory::new(2).unwrap();
        history.start_new_current(day(3), 0).unwrap();
        let err = history.attach_handle(day(3), "NR2", RenderHandle(1)).unwrap_err();
        assert!(matches!(err, EngineError::UnknownLevel { .. }));
        assert!(history.attach_handle(day(9), "Q1", RenderHandle(1)).is_err());
    }

    #[test]
    fn test_drop_releases_handles() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Shared(Rc<RefCell<Vec<RenderHandle>>>);
        impl ResourceRelease for Shared {
            fn release(&mut self, _day: NaiveDate, _level: &str, handle: RenderHandle) {
                self.0.borrow_mut().push(handle);
            }
        }

        let released = Rc::new(RefCell::new(Vec::new()));
        {
            let mut history = LevelHistory::with_release(2, Shared(released.clone())).unwrap();
            add_session(&mut history, 3, 0);
            history.finalize_current(9).unwrap();
            add_session(&mut history, 4, 10);
        }
        assert_eq!(*released.borrow(), vec![RenderHandle(3), RenderHandle(4)]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "populate_current called before start_new_current")]
    fn test_populate_without_session_panics_in_debug() {
        let mut history = LevelHistory::new(2).unwrap();
        let _ = history.populate_current(levels(110.0, 100.0));
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_populate_without_session_errors_in_release() {
        let mut history = LevelHistory::new(2).unwrap();
        assert!(matches!(
            history.populate_current(levels(110.0, 100.0)),
            Err(EngineError::Precondition(_))
        ));
    }
}
