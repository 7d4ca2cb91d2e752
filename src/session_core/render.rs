//! Render resource handles
//!
//! Hosts attach their own rendering resources (cached text layouts, brushes)
//! to levels through opaque handles. The history releases every handle
//! exactly once: on eviction, on replacement, on clear or on drop.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Opaque id of a host-owned rendering resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderHandle(pub u64);

/// Release hook invoked for each handle leaving the history
pub trait ResourceRelease {
    fn release(&mut self, trading_day: NaiveDate, level: &str, handle: RenderHandle);
}

/// Discards release notifications
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRelease;

impl ResourceRelease for NoopRelease {
    fn release(&mut self, _trading_day: NaiveDate, _level: &str, _handle: RenderHandle) {}
}

/// A handle that has been released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedHandle {
    pub trading_day: NaiveDate,
    pub level: String,
    pub handle: RenderHandle,
}

/// Records every release in order
#[derive(Debug, Default, Clone)]
pub struct RecordingRelease {
    released: Vec<ReleasedHandle>,
}

impl RecordingRelease {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn released(&self) -> &[ReleasedHandle] {
        &self.released
    }

    pub fn len(&self) -> usize {
        self.released.len()
    }

    pub fn is_empty(&self) -> bool {
        self.released.is_empty()
    }
}

impl ResourceRelease for RecordingRelease {
    fn release(&mut self, trading_day: NaiveDate, level: &str, handle: RenderHandle) {
        self.released.push(ReleasedHandle {
            trading_day,
            level: level.to_string(),
            handle,
        });
    }
}

impl<R: ResourceRelease + ?Sized> ResourceRelease for Box<R> {
    fn release(&mut self, trading_day: NaiveDate, level: &str, handle: RenderHandle) {
        (**self).release(trading_day, level, handle)
    }
}
