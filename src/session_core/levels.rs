//! Price level types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::render::RenderHandle;

/// Symbolic color category; hosts map these to brushes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorTag {
    PriorHigh,
    PriorLow,
    Midpoint,
    Quartile,
    Zone,
    Target,
    Extension,
    Base,
}

impl std::fmt::Display for ColorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColorTag::PriorHigh => "prior-high",
            ColorTag::PriorLow => "prior-low",
            ColorTag::Midpoint => "midpoint",
            ColorTag::Quartile => "quartile",
            ColorTag::Zone => "zone",
            ColorTag::Target => "target",
            ColorTag::Extension => "extension",
            ColorTag::Base => "base",
        };
        f.pad(name)
    }
}

/// A named horizontal price marker
///
/// `value` is always finite. The level exclusively owns its render handle,
/// so the type is not `Clone`; use [`LevelView`] for copies.
#[derive(Debug, PartialEq)]
pub struct PriceLevel {
    pub name: String,
    pub value: f64,
    pub modifier: Option<String>,
    pub color: ColorTag,
    handle: Option<RenderHandle>,
}

impl PriceLevel {
    pub fn new(name: &str, value: f64, modifier: Option<String>, color: ColorTag) -> Self {
        Self {
            name: name.to_string(),
            value,
            modifier,
            color,
            handle: None,
        }
    }

    pub fn handle(&self) -> Option<RenderHandle> {
        self.handle
    }

    /// Binds a handle, returning the one it replaces
    pub(crate) fn replace_handle(&mut self, handle: RenderHandle) -> Option<RenderHandle> {
        self.handle.replace(handle)
    }

    /// Removes the handle so it can be released exactly once
    pub(crate) fn take_handle(&mut self) -> Option<RenderHandle> {
        self.handle.take()
    }

    pub fn view(&self) -> LevelView {
        LevelView {
            name: self.name.clone(),
            value: self.value,
            modifier: self.modifier.clone(),
            color: self.color,
        }
    }
}

/// Read-only copy of a level handed to renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelView {
    pub name: String,
    pub value: f64,
    pub modifier: Option<String>,
    pub color: ColorTag,
}

/// All levels produced for one session plus the bar range they cover
#[derive(Debug)]
pub struct SessionLevelSet {
    pub trading_day: NaiveDate,
    pub start_bar_index: usize,
    /// `None` while the session is current (extends past the last bar)
    pub end_bar_index: Option<usize>,
    levels: Vec<PriceLevel>,
}

impl SessionLevelSet {
    pub fn new(trading_day: NaiveDate, start_bar_index: usize) -> Self {
        Self {
            trading_day,
            start_bar_index,
            end_bar_index: None,
            levels: Vec::new(),
        }
    }

    pub fn levels(&self) -> &[PriceLevel] {
        &self.levels
    }

    pub fn get(&self, name: &str) -> Option<&PriceLevel> {
        self.levels.iter().find(|l| l.name == name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).map(|l| l.value)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.end_bar_index.is_some()
    }

    pub(crate) fn set_levels(&mut self, levels: Vec<PriceLevel>) -> Vec<PriceLevel> {
        std::mem::replace(&mut self.levels, levels)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut PriceLevel> {
        self.levels.iter_mut().find(|l| l.name == name)
    }

    pub(crate) fn levels_mut(&mut self) -> impl Iterator<Item = &mut PriceLevel> {
        self.levels.iter_mut()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            trading_day: self.trading_day,
            start_bar_index: self.start_bar_index,
            end_bar_index: self.end_bar_index,
            levels: self.levels.iter().map(PriceLevel::view).collect(),
        }
    }
}

/// Owned copy of a session level set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub trading_day: NaiveDate,
    pub start_bar_index: usize,
    pub end_bar_index: Option<usize>,
    pub levels: Vec<LevelView>,
}

impl SessionView {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.levels.iter().find(|l| l.name == name).map(|l| l.value)
    }
}

/// Copy-on-read snapshot of the whole history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelsSnapshot {
    pub current: Option<SessionView>,
    /// Oldest first
    pub history: Vec<SessionView>,
}
