//! Offset tables
//!
//! A table lists every level the calculator produces, in display order.
//! Each entry is anchored at the prior high (Q1), the prior low (Q4) or a
//! single base price, and sits `fraction * range` away from its anchor:
//! negative fractions below the anchor, positive above.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::config::BasePriceMode;
use super::error::ConfigError;
use super::levels::ColorTag;

/// Price an offset is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    /// Prior session high (Q1)
    High,
    /// Prior session low (Q4)
    Low,
    /// Base price selected by `BasePriceMode`
    Base,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetEntry {
    pub name: String,
    pub anchor: Anchor,
    /// Signed multiple of the range added to the anchor price
    pub fraction: f64,
    #[serde(default)]
    pub modifier: Option<String>,
    pub color: ColorTag,
}

impl OffsetEntry {
    pub fn new(name: &str, anchor: Anchor, fraction: f64, color: ColorTag) -> Self {
        Self {
            name: name.to_string(),
            anchor,
            fraction,
            modifier: None,
            color,
        }
    }

    pub fn with_modifier(mut self, modifier: &str) -> Self {
        self.modifier = Some(modifier.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OffsetTable {
    entries: Vec<OffsetEntry>,
}

impl OffsetTable {
    pub fn new(entries: Vec<OffsetEntry>) -> Self {
        Self { entries }
    }

    /// Quartile table anchored at the prior high and low (23 levels)
    pub fn prior_range() -> Self {
        use Anchor::{High, Low};
        use ColorTag::*;

        Self::new(vec![
            OffsetEntry::new("Q1", High, 0.0, PriorHigh).with_modifier("Máximo día anterior"),
            OffsetEntry::new("TC", High, -0.0625, Zone),
            OffsetEntry::new("ZSell", High, -0.125, Zone),
            OffsetEntry::new("NR1(sell)", High, -0.159, Target),
            OffsetEntry::new("Q2", High, -0.25, Quartile),
            OffsetEntry::new("M+", High, -0.375, Quartile),
            OffsetEntry::new("NR2", High, -0.5, Midpoint),
            OffsetEntry::new("M-", Low, 0.375, Quartile),
            OffsetEntry::new("Q3", Low, 0.25, Quartile),
            OffsetEntry::new("ZBuy", Low, 0.125, Zone),
            OffsetEntry::new("TV", Low, 0.0625, Zone),
            OffsetEntry::new("NR1(buy)", Low, 0.159, Target),
            OffsetEntry::new("Q4", Low, 0.0, PriorLow).with_modifier("Mínimo día anterior"),
            OffsetEntry::new("Std1+", High, 0.0855, Extension),
            OffsetEntry::new("Std2+", High, 0.125, Extension),
            OffsetEntry::new("Std3+", High, 0.25, Extension),
            OffsetEntry::new("Std4+", High, 0.375, Extension),
            OffsetEntry::new("1D+", High, 0.5, Extension),
            OffsetEntry::new("Std1-", Low, -0.0855, Extension),
            OffsetEntry::new("Std2-", Low, -0.125, Extension),
            OffsetEntry::new("Std3-", Low, -0.25, Extension),
            OffsetEntry::new("Std4-", Low, -0.375, Extension),
            OffsetEntry::new("1D-", Low, -0.5, Extension),
        ])
    }

    /// Symmetric table around a single base price (13 levels)
    pub fn symmetric() -> Self {
        use Anchor::Base;
        use ColorTag::*;

        let steps = [
            ("8.55", 0.0855, Zone),
            ("17.1", 0.171, Zone),
            ("25", 0.25, Quartile),
            ("34.2", 0.342, Target),
            ("37.5", 0.375, Quartile),
            ("50", 0.5, Extension),
        ];

        let mut entries = Vec::with_capacity(steps.len() * 2 + 1);
        for (label, fraction, color) in steps.iter().rev() {
            entries.push(OffsetEntry::new(&format!("{}+", label), Base, *fraction, *color));
        }
        entries.push(OffsetEntry::new("Base", Base, 0.0, ColorTag::Base));
        for (label, fraction, color) in steps.iter() {
            entries.push(OffsetEntry::new(&format!("{}-", label), Base, -fraction, *color));
        }

        Self::new(entries)
    }

    /// Default table for a base price mode
    pub fn for_mode(mode: BasePriceMode) -> Self {
        match mode {
            BasePriceMode::PriorRange => Self::prior_range(),
            _ => Self::symmetric(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entries.is_empty() {
            return Err(ConfigError::EmptyTable);
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !entry.fraction.is_finite() {
                return Err(ConfigError::NonFiniteFraction {
                    name: entry.name.clone(),
                    fraction: entry.fraction,
                });
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::DuplicateLevel(entry.name.clone()));
            }
        }

        Ok(())
    }

    /// True if any entry is anchored at the base price
    pub fn uses_base(&self) -> bool {
        self.entries.iter().any(|e| e.anchor == Anchor::Base)
    }

    pub fn entries(&self) -> &[OffsetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
