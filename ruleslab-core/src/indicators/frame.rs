//! IndicatorFrame: bars plus the named indicator columns the simulator reads.
//!
//! A frame is the time-series store handed to the simulator. It is built either
//! by [`IndicatorFrame::compute`] from raw bars and [`IndicatorParams`], or
//! column by column with [`IndicatorFrame::with_column`] (synthetic scenarios,
//! externally computed indicators). Each column carries its own lookback so the
//! simulator can derive its warm-up offset from the columns it actually reads.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use super::{Adx, Atr, Indicator, IndicatorValues, RollingHigh, SignalStrength, SignalZ, Sma};
use crate::domain::Bar;

/// Errors from indicator computation or frame assembly.
#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    #[error("invalid indicator parameter '{name}' = {value}: {reason}")]
    InvalidParam {
        name: &'static str,
        value: usize,
        reason: &'static str,
    },

    #[error("column '{column}' has {actual} values, expected {expected}")]
    LengthMismatch {
        column: Column,
        expected: usize,
        actual: usize,
    },
}

/// The indicator columns the simulator knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    SignalStrength,
    SignalZ,
    Atr,
    SmaFast,
    SmaSlow,
    Adx,
    /// Highest high of the preceding breakout window.
    BreakoutHigh,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::SignalStrength,
        Column::SignalZ,
        Column::Atr,
        Column::SmaFast,
        Column::SmaSlow,
        Column::Adx,
        Column::BreakoutHigh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::SignalStrength => "signal_strength",
            Column::SignalZ => "signal_z",
            Column::Atr => "atr",
            Column::SmaFast => "sma_fast",
            Column::SmaSlow => "sma_slow",
            Column::Adx => "adx",
            Column::BreakoutHigh => "hh",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookback windows for every computed column, in bars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub ret_periods: usize,
    pub vol_window: usize,
    pub atr_period: usize,
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub adx_period: usize,
    pub breakout_lookback: usize,
    pub zscore_window: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ret_periods: 24,
            vol_window: 24,
            atr_period: 14,
            sma_fast: 48,
            sma_slow: 200,
            adx_period: 14,
            breakout_lookback: 48,
            zscore_window: 240,
        }
    }
}

impl IndicatorParams {
    pub fn validate(&self) -> Result<(), IndicatorError> {
        let at_least = |name: &'static str, value: usize, min: usize, reason: &'static str| {
            if value < min {
                Err(IndicatorError::InvalidParam { name, value, reason })
            } else {
                Ok(())
            }
        };
        at_least("ret_periods", self.ret_periods, 1, "must be >= 1")?;
        at_least("vol_window", self.vol_window, 2, "must be >= 2")?;
        at_least("atr_period", self.atr_period, 1, "must be >= 1")?;
        at_least("sma_fast", self.sma_fast, 1, "must be >= 1")?;
        at_least("sma_slow", self.sma_slow, 1, "must be >= 1")?;
        at_least("adx_period", self.adx_period, 1, "must be >= 1")?;
        at_least("breakout_lookback", self.breakout_lookback, 1, "must be >= 1")?;
        at_least("zscore_window", self.zscore_window, 2, "must be >= 2")?;
        Ok(())
    }

    fn indicator_for(&self, column: Column) -> Box<dyn Indicator> {
        match column {
            Column::SignalStrength => Box::new(SignalStrength::new(self.ret_periods, self.vol_window)),
            Column::SignalZ => Box::new(SignalZ::new(
                self.ret_periods,
                self.vol_window,
                self.zscore_window,
            )),
            Column::Atr => Box::new(Atr::new(self.atr_period)),
            Column::SmaFast => Box::new(Sma::new(self.sma_fast)),
            Column::SmaSlow => Box::new(Sma::new(self.sma_slow)),
            Column::Adx => Box::new(Adx::new(self.adx_period)),
            Column::BreakoutHigh => Box::new(RollingHigh::new(self.breakout_lookback)),
        }
    }
}

/// Bars plus named indicator columns. Immutable once built.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    bars: Vec<Bar>,
    values: IndicatorValues,
    lookbacks: HashMap<Column, usize>,
}

impl IndicatorFrame {
    /// A frame with bars but no indicator columns.
    pub fn new(bars: Vec<Bar>) -> Self {
        Self {
            bars,
            values: IndicatorValues::new(),
            lookbacks: HashMap::new(),
        }
    }

    /// Compute every known column from raw bars.
    pub fn compute(bars: Vec<Bar>, params: &IndicatorParams) -> Result<Self, IndicatorError> {
        params.validate()?;
        let mut frame = Self::new(bars);
        for column in Column::ALL {
            let indicator = params.indicator_for(column);
            let series = indicator.compute(&frame.bars);
            frame = frame.with_column(column, series, indicator.lookback())?;
        }
        tracing::debug!(
            bars = frame.len(),
            columns = frame.values.len(),
            "indicator frame computed"
        );
        Ok(frame)
    }

    /// Attach (or replace) a column. The series must match the bar count.
    pub fn with_column(
        mut self,
        column: Column,
        series: Vec<f64>,
        lookback: usize,
    ) -> Result<Self, IndicatorError> {
        if series.len() != self.bars.len() {
            return Err(IndicatorError::LengthMismatch {
                column,
                expected: self.bars.len(),
                actual: series.len(),
            });
        }
        self.values.insert(column, series);
        self.lookbacks.insert(column, lookback);
        Ok(self)
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn has(&self, column: Column) -> bool {
        self.values.contains(column)
    }

    /// Value of `column` at `index`; None if the column is absent.
    pub fn value(&self, column: Column, index: usize) -> Option<f64> {
        self.values.get(column, index)
    }

    pub fn series(&self, column: Column) -> Option<&[f64]> {
        self.values.get_series(column)
    }

    pub fn lookback(&self, column: Column) -> Option<usize> {
        self.lookbacks.get(&column).copied()
    }

    pub fn columns(&self) -> Vec<Column> {
        let mut cols: Vec<Column> = self.lookbacks.keys().copied().collect();
        cols.sort();
        cols
    }
}
