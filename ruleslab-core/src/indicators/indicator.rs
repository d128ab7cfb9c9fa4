//! Indicator trait and precomputed indicator values container.
//!
//! Indicators are pure functions: bar history in, numeric series out.
//! They are computed once before the simulation pass and read per-bar by
//! index. No recomputation on each bar.

use super::Column;
use crate::domain::Bar;
use std::collections::HashMap;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. Values before `lookback()` are warm-up: either `f64::NAN`
/// or, for the return-based series, a documented fill value.
///
/// # Look-ahead contamination guard
/// No indicator value at bar t may depend on price data from bar t+1 or later.
/// Every indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_48", "atr_14").
    fn name(&self) -> &str;

    /// Index of the first bar whose value is fully determined by real history.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Container for precomputed indicator series, keyed by column.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<Column, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a column's series, replacing any previous one.
    pub fn insert(&mut self, column: Column, values: Vec<f64>) {
        self.series.insert(column, values);
    }

    /// Get the indicator value at a specific bar index.
    pub fn get(&self, column: Column, bar_index: usize) -> Option<f64> {
        self.series
            .get(&column)
            .and_then(|v| v.get(bar_index).copied())
    }

    /// Get the full series for a column.
    pub fn get_series(&self, column: Column) -> Option<&[f64]> {
        self.series.get(&column).map(|v| v.as_slice())
    }

    pub fn contains(&self, column: Column) -> bool {
        self.series.contains_key(&column)
    }

    /// Number of indicator series stored.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
