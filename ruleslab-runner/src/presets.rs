//! Named strategy variants.
//!
//! Each variant is a [`StrategyConfig`] plus the indicator windows it was
//! tuned with. There is one engine; a preset only chooses which filters and
//! exits are switched on.

use ruleslab_core::engine::{ExitRule, MomentumSource, NavMode, StrategyConfig};
use ruleslab_core::indicators::IndicatorParams;

#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: &'static str,
    /// Short historical label (V1, V2, V3).
    pub label: &'static str,
    pub description: &'static str,
    pub strategy: StrategyConfig,
    pub indicators: IndicatorParams,
}

pub const NAMES: [&str; 3] = ["signal_atr", "trend_breakout", "trend_relaxed"];

/// Look up a preset by name or by label (case-insensitive).
pub fn preset(name: &str) -> Option<Preset> {
    all()
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(name) || p.label.eq_ignore_ascii_case(name))
}

pub fn all() -> Vec<Preset> {
    vec![signal_atr(), trend_breakout(), trend_relaxed()]
}

/// V1: momentum entry, fixed ATR stop, 10% profit giveback, no trend filter.
fn signal_atr() -> Preset {
    Preset {
        name: "signal_atr",
        label: "V1",
        description: "signal_strength > 0.5 entry, 2 ATR stop, exit on 10% giveback from peak",
        strategy: StrategyConfig {
            k_init: 2.0,
            k_trail: None,
            time_stop_bars: None,
            cooldown_bars: 0,
            use_trend_filter: false,
            use_adx: false,
            require_breakout: false,
            require_momentum: true,
            momentum_source: MomentumSource::SignalStrength,
            momentum_threshold: 0.5,
            exit_rules: vec![ExitRule::Stop, ExitRule::ProfitGiveback { pct: 0.1 }],
            warmup_padding: 0,
            nav_mode: NavMode::Additive,
            ..StrategyConfig::default()
        },
        indicators: IndicatorParams {
            ret_periods: 10,
            vol_window: 10,
            ..IndicatorParams::default()
        },
    }
}

/// V2: trend + ADX + z-scored momentum + breakout, trailing stop.
fn trend_breakout() -> Preset {
    Preset {
        name: "trend_breakout",
        label: "V2",
        description: "SMA trend, ADX >= 15, signal_z > 0.8, 48-bar breakout; 2.5 ATR trail, 240-bar time stop",
        strategy: StrategyConfig {
            k_init: 2.0,
            k_trail: Some(2.5),
            time_stop_bars: Some(240),
            cooldown_bars: 24,
            use_trend_filter: true,
            use_adx: true,
            adx_min: 15.0,
            require_breakout: true,
            require_momentum: true,
            momentum_source: MomentumSource::SignalZ,
            momentum_threshold: 0.8,
            exit_rules: vec![ExitRule::Stop, ExitRule::TimeStop, ExitRule::TrendInvalidation],
            warmup_padding: 0,
            nav_mode: NavMode::Compounding,
        },
        indicators: IndicatorParams::default(),
    }
}

/// V3: V2 with the momentum and breakout filters off and a shorter cooldown.
fn trend_relaxed() -> Preset {
    let base = trend_breakout();
    Preset {
        name: "trend_relaxed",
        label: "V3",
        description: "SMA trend and ADX >= 15 only; 2.5 ATR trail, 240-bar time stop, 6-bar cooldown",
        strategy: StrategyConfig {
            require_breakout: false,
            require_momentum: false,
            momentum_source: MomentumSource::SignalStrength,
            momentum_threshold: 0.0,
            cooldown_bars: 6,
            warmup_padding: 6,
            ..base.strategy
        },
        indicators: base.indicators,
    }
}
