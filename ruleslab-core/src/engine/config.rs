//! Strategy configuration: the single parameter surface every variant maps onto.

use serde::{Deserialize, Serialize};

use super::nav::NavMode;
use crate::indicators::Column;

/// Which indicator column the momentum filter (and signal-reversal exit) reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MomentumSource {
    #[default]
    SignalStrength,
    SignalZ,
}

impl MomentumSource {
    pub fn column(&self) -> Column {
        match self {
            MomentumSource::SignalStrength => Column::SignalStrength,
            MomentumSource::SignalZ => Column::SignalZ,
        }
    }
}

/// One exit predicate. Rules are checked in declared order; the first that
/// holds names the exit reason.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ExitRule {
    /// close <= max(initial stop, trailing stop).
    Stop,
    /// Bars since entry >= `time_stop_bars`.
    TimeStop,
    /// Trend filter no longer holds.
    TrendInvalidation,
    /// Momentum column below `threshold` (normally negative).
    SignalReversal { threshold: f64 },
    /// Close at or above entry * (1 + pct).
    TakeProfit { pct: f64 },
    /// In profit, and the close has retreated `pct` from its peak close since entry.
    ProfitGiveback { pct: f64 },
}

impl ExitRule {
    pub fn name(&self) -> &'static str {
        match self {
            ExitRule::Stop => "stop",
            ExitRule::TimeStop => "time_stop",
            ExitRule::TrendInvalidation => "trend_invalidation",
            ExitRule::SignalReversal { .. } => "signal_reversal",
            ExitRule::TakeProfit { .. } => "take_profit",
            ExitRule::ProfitGiveback { .. } => "profit_giveback",
        }
    }
}

/// Full strategy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// ATR multiple for the initial stop below entry.
    pub k_init: f64,
    /// ATR multiple for the trailing stop below the highest high. None disables trailing.
    pub k_trail: Option<f64>,
    pub time_stop_bars: Option<usize>,
    pub cooldown_bars: usize,

    pub use_trend_filter: bool,
    pub use_adx: bool,
    pub adx_min: f64,
    pub require_breakout: bool,
    pub require_momentum: bool,
    pub momentum_source: MomentumSource,
    pub momentum_threshold: f64,

    pub exit_rules: Vec<ExitRule>,
    /// Extra bars added on top of the longest required lookback.
    pub warmup_padding: usize,
    pub nav_mode: NavMode,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            k_init: 2.0,
            k_trail: Some(2.5),
            time_stop_bars: Some(240),
            cooldown_bars: 0,
            use_trend_filter: true,
            use_adx: false,
            adx_min: 15.0,
            require_breakout: false,
            require_momentum: false,
            momentum_source: MomentumSource::SignalStrength,
            momentum_threshold: 0.5,
            exit_rules: vec![ExitRule::Stop, ExitRule::TimeStop, ExitRule::TrendInvalidation],
            warmup_padding: 0,
            nav_mode: NavMode::Compounding,
        }
    }
}

impl StrategyConfig {
    pub fn has_exit(&self, name: &str) -> bool {
        self.exit_rules.iter().any(|r| r.name() == name)
    }

    /// Whether any entry filter or exit rule reads the moving averages.
    pub fn needs_trend(&self) -> bool {
        self.use_trend_filter || self.has_exit("trend_invalidation")
    }

    /// Whether any entry filter or exit rule reads the momentum column.
    pub fn needs_momentum(&self) -> bool {
        self.require_momentum || self.has_exit("signal_reversal")
    }
}
