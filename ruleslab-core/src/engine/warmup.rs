//! Warm-up offset: the first bar index at which every column the strategy
//! reads is fully determined by history.

use super::config::StrategyConfig;
use crate::indicators::{Column, IndicatorFrame};

/// Columns the strategy reads, derived from which filters and exits are active.
pub fn required_columns(config: &StrategyConfig) -> Vec<Column> {
    let mut cols = vec![Column::Atr];
    if config.needs_trend() {
        cols.push(Column::SmaFast);
        cols.push(Column::SmaSlow);
    }
    if config.use_adx {
        cols.push(Column::Adx);
    }
    if config.require_breakout {
        cols.push(Column::BreakoutHigh);
    }
    if config.needs_momentum() {
        cols.push(config.momentum_source.column());
    }
    cols
}

/// Longest lookback among the required columns that the frame carries.
pub fn max_lookback(frame: &IndicatorFrame, columns: &[Column]) -> usize {
    columns
        .iter()
        .filter_map(|c| frame.lookback(*c))
        .max()
        .unwrap_or(0)
}

/// `i_start = max(1, max lookback + padding)`. Bar 0 is never decided.
pub fn start_index(frame: &IndicatorFrame, config: &StrategyConfig) -> usize {
    let lookback = max_lookback(frame, &required_columns(config));
    (lookback + config.warmup_padding).max(1)
}
