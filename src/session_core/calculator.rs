//! Level calculation from a finalized session range

use tracing::debug;

use super::config::{BasePriceMode, EngineConfig};
use super::levels::PriceLevel;
use super::offsets::{Anchor, OffsetTable};
use super::tracker::SessionSnapshot;

/// Prices the calculator works from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelInputs {
    /// Prior session high (Q1)
    pub high: f64,
    /// Prior session low (Q4)
    pub low: f64,
    pub prior_open: f64,
    pub prior_close: f64,
    /// Open of the first bar of the new session
    pub current_open: f64,
}

impl LevelInputs {
    /// Inputs with only the range known; base-anchored entries come out empty
    pub fn from_range(high: f64, low: f64) -> Self {
        Self {
            high,
            low,
            prior_open: f64::NAN,
            prior_close: f64::NAN,
            current_open: f64::NAN,
        }
    }

    pub fn from_prior(prior: &SessionSnapshot, current_open: f64) -> Self {
        Self {
            high: prior.high,
            low: prior.low,
            prior_open: prior.open,
            prior_close: prior.close,
            current_open,
        }
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Stateless mapping from a prior session range to named levels
#[derive(Debug, Clone)]
pub struct LevelCalculator {
    table: OffsetTable,
    mode: BasePriceMode,
}

impl LevelCalculator {
    pub fn new(table: OffsetTable, mode: BasePriceMode) -> Self {
        Self { table, mode }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.resolved_table(), config.base_price_mode)
    }

    pub fn table(&self) -> &OffsetTable {
        &self.table
    }

    pub fn mode(&self) -> BasePriceMode {
        self.mode
    }

    /// Price used for `Anchor::Base` entries
    ///
    /// In `PriorRange` mode the base is the range midpoint (NR2).
    pub fn base_price(&self, inputs: &LevelInputs) -> f64 {
        match self.mode {
            BasePriceMode::PriorRange => inputs.high - inputs.range() / 2.0,
            BasePriceMode::PriorClose => inputs.prior_close,
            BasePriceMode::PriorHigh => inputs.high,
            BasePriceMode::PriorLow => inputs.low,
            BasePriceMode::CurrentOpen => inputs.current_open,
        }
    }

    /// Compute one level per table entry
    ///
    /// Entries whose value is NaN or infinite are left out. Non-finite Q1/Q4,
    /// or a non-finite base price when the table uses one, yields no levels at
    /// all. An inverted range (Q1 < Q4) is computed as is.
    pub fn calculate(&self, inputs: &LevelInputs) -> Vec<PriceLevel> {
        if !inputs.high.is_finite() || !inputs.low.is_finite() {
            debug!(
                "No levels: prior range is not finite (high={}, low={})",
                inputs.high, inputs.low
            );
            return Vec::new();
        }

        let range = inputs.range();
        let base = self.base_price(inputs);
        if self.table.uses_base() && !base.is_finite() {
            debug!("No levels: {} base price is not finite", self.mode);
            return Vec::new();
        }

        self.table
            .entries()
            .iter()
            .filter_map(|entry| {
                let anchor = match entry.anchor {
                    Anchor::High => inputs.high,
                    Anchor::Low => inputs.low,
                    Anchor::Base => base,
                };
                let value = anchor + entry.fraction * range;
                if !value.is_finite() {
                    debug!("Omitting {}: value {} is not finite", entry.name, value);
                    return None;
                }
                Some(PriceLevel::new(&entry.name, value, entry.modifier.clone(), entry.color))
            })
            .collect()
    }
}

impl Default for LevelCalculator {
    fn default() -> Self {
        Self::new(OffsetTable::prior_range(), BasePriceMode::PriorRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_core::levels::ColorTag;
    use rand::Rng;

    const EPS: f64 = 1e-9;

    fn value(levels: &[PriceLevel], name: &str) -> f64 {
        levels
            .iter()
            .find(|l| l.name == name)
            .unwrap_or_else(|| panic!("missing level {}", name))
            .value
    }

    #[test]
    fn test_prior_session_scenario() {
        let levels = LevelCalculator::default().calculate(&LevelInputs::from_range(110.0, 100.0));
        assert_eq!(levels.len(), 23);

        assert!((value(&levels, "Q1") - 110.0).abs() < EPS);
        assert!((value(&levels, "Q4") - 100.0).abs() < EPS);
        assert!((value(&levels, "NR2") - 105.0).abs() < EPS);
        // range 10 * 0.0855 = 0.855 above Q1
        assert!((value(&levels, "Std1+") - 110.855).abs() < EPS);
        assert!((value(&levels, "Std1-") - 99.145).abs() < EPS);
        assert!((value(&levels, "TC") - 109.375).abs() < EPS);
        assert!((value(&levels, "TV") - 100.625).abs() < EPS);
        assert!((value(&levels, "1D+") - 115.0).abs() < EPS);
        assert!((value(&levels, "1D-") - 95.0).abs() < EPS);

        let q1 = levels.iter().find(|l| l.name == "Q1").unwrap();
        assert_eq!(q1.modifier.as_deref(), Some("Máximo día anterior"));
        assert_eq!(q1.color, ColorTag::PriorHigh);
    }

    #[test]
    fn test_deterministic() {
        let calc = LevelCalculator::default();
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let low: f64 = rng.gen_range(1.0..50_000.0);
            let high = low + rng.gen_range(0.25..2_000.0);
            let inputs = LevelInputs::from_range(high, low);
            assert_eq!(calc.calculate(&inputs), calc.calculate(&inputs));
        }
    }

    #[test]
    fn test_midpoint() {
        let calc = LevelCalculator::default();
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let low: f64 = rng.gen_range(1.0..50_000.0);
            let high = low + rng.gen_range(0.25..2_000.0);
            let levels = calc.calculate(&LevelInputs::from_range(high, low));
            let nr2 = value(&levels, "NR2");
            assert_eq!(nr2, high - (high - low) / 2.0);
            assert!((nr2 - (high + low) / 2.0).abs() <= 1e-9 * high.abs());
        }
    }

    #[test]
    fn test_monotonic_ordering() {
        let calc = LevelCalculator::default();
        let down_from_q1 = ["Q1", "TC", "ZSell", "NR1(sell)", "Q2", "M+", "NR2"];
        let up_from_q4 = ["Q4", "TV", "ZBuy", "NR1(buy)", "Q3", "M-"];
        let above_q1 = ["Q1", "Std1+", "Std2+", "Std3+", "Std4+", "1D+"];
        let below_q4 = ["Q4", "Std1-", "Std2-", "Std3-", "Std4-", "1D-"];

        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let low: f64 = rng.gen_range(1.0..50_000.0);
            let high = low + rng.gen_range(1.0..2_000.0);
            let levels = calc.calculate(&LevelInputs::from_range(high, low));

            let decreasing = |names: &[&str]| {
                names
                    .windows(2)
                    .all(|w| value(&levels, w[0]) > value(&levels, w[1]))
            };
            let increasing = |names: &[&str]| {
                names
                    .windows(2)
                    .all(|w| value(&levels, w[0]) < value(&levels, w[1]))
            };

            assert!(decreasing(&down_from_q1[..]));
            assert!(increasing(&up_from_q4[..]));
            assert!(increasing(&above_q1[..]));
            assert!(decreasing(&below_q4[..]));
        }
    }

    #[test]
    fn test_zero_range_keeps_every_level() {
        let levels = LevelCalculator::default().calculate(&LevelInputs::from_range(100.0, 100.0));
        assert_eq!(levels.len(), 23);
        assert!(levels.iter().all(|l| l.value == 100.0));
    }

    #[test]
    fn test_non_finite_inputs_yield_nothing() {
        let calc = LevelCalculator::default();
        assert!(calc.calculate(&LevelInputs::from_range(f64::NAN, 100.0)).is_empty());
        assert!(calc.calculate(&LevelInputs::from_range(110.0, f64::NEG_INFINITY)).is_empty());
        assert!(calc.calculate(&LevelInputs::from_range(f64::INFINITY, 100.0)).is_empty());
    }

    #[test]
    fn test_overflowing_entries_omitted() {
        let levels = LevelCalculator::default().calculate(&LevelInputs::from_range(f64::MAX, 0.0));
        // Std1+..Std4+ and 1D+ overflow above f64::MAX
        assert_eq!(levels.len(), 18);
        assert!(levels.iter().all(|l| l.value.is_finite()));
        assert!(levels.iter().all(|l| !l.name.ends_with('+') || l.name == "M+"));
        assert_eq!(value(&levels, "Q1"), f64::MAX);
    }

    #[test]
    fn test_inverted_range_not_corrected() {
        let levels = LevelCalculator::default().calculate(&LevelInputs::from_range(100.0, 110.0));
        assert_eq!(levels.len(), 23);
        // range is -10, so TC lands above Q1
        assert!((value(&levels, "TC") - 100.625).abs() < EPS);
        assert!((value(&levels, "NR2") - 105.0).abs() < EPS);
    }

    #[test]
    fn test_symmetric_around_prior_close() {
        let calc = LevelCalculator::new(OffsetTable::symmetric(), BasePriceMode::PriorClose);
        let inputs = LevelInputs {
            high: 110.0,
            low: 100.0,
            prior_open: 101.0,
            prior_close: 104.0,
            current_open: 104.5,
        };
        let levels = calc.calculate(&inputs);
        assert_eq!(levels.len(), 13);
        assert!((value(&levels, "Base") - 104.0).abs() < EPS);
        assert!((value(&levels, "50+") - 109.0).abs() < EPS);
        assert!((value(&levels, "50-") - 99.0).abs() < EPS);
        assert!((value(&levels, "8.55-") - 103.145).abs() < EPS);
        assert!((value(&levels, "34.2+") - 107.42).abs() < EPS);
    }

    #[test]
    fn test_base_modes() {
        let inputs = LevelInputs {
            high: 110.0,
            low: 100.0,
            prior_open: 101.0,
            prior_close: 104.0,
            current_open: 106.0,
        };
        let base = |mode| LevelCalculator::new(OffsetTable::symmetric(), mode).base_price(&inputs);
        assert_eq!(base(BasePriceMode::PriorRange), 105.0);
        assert_eq!(base(BasePriceMode::PriorClose), 104.0);
        assert_eq!(base(BasePriceMode::PriorHigh), 110.0);
        assert_eq!(base(BasePriceMode::PriorLow), 100.0);
        assert_eq!(base(BasePriceMode::CurrentOpen), 106.0);
    }

    #[test]
    fn test_missing_base_price_yields_nothing() {
        let calc = LevelCalculator::new(OffsetTable::symmetric(), BasePriceMode::CurrentOpen);
        assert!(calc.calculate(&LevelInputs::from_range(110.0, 100.0)).is_empty());
    }
}
