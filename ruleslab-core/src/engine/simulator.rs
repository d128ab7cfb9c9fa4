//! Position-state simulator.
//!
//! A single forward pass over an [`IndicatorFrame`]. At each bar from the
//! warm-up offset onward it either opens a long position (flat, cooldown
//! elapsed, every active entry filter true), closes one (first exit rule that
//! holds, in declared order), or carries the previous position forward.
//!
//! The frame is never mutated; the annotated series is a new value. The only
//! state carried between bars is [`SimulationState`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::{ExitRule, StrategyConfig};
use super::state::{OpenPosition, SimulationState};
use super::warmup::{required_columns, start_index};
use crate::domain::{EntryRecord, ExitReason, ExitRecord, TradeLedger};
use crate::indicators::{Column, IndicatorFrame};

/// Fatal conditions detected before the first bar is processed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("required indicator column '{column}' is missing")]
    MissingColumn { column: Column },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("insufficient history: need more than {required} bars, got {available}")]
    InsufficientHistory { required: usize, available: usize },
}

/// Per-bar output columns alongside the inputs they were decided on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub close: Vec<f64>,
    /// 0.0 flat, 1.0 long.
    pub position: Vec<f64>,
    /// +1 entry, -1 exit, 0 no change.
    pub flag: Vec<i8>,
}

impl AnnotatedSeries {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// Fraction of bars spent in a position.
    pub fn exposure(&self) -> f64 {
        if self.position.is_empty() {
            return 0.0;
        }
        self.position.iter().sum::<f64>() / self.position.len() as f64
    }
}

/// Counters for what the pass did and why it did nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationDiagnostics {
    /// Bars before the first decision bar.
    pub warmup_bars: usize,
    pub bars_evaluated: usize,
    /// Candidate entry bars skipped because a required indicator was NaN.
    pub degenerate_bars: usize,
    pub entries: usize,
    pub exits: usize,
}

#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub series: AnnotatedSeries,
    pub trades: TradeLedger,
    pub diagnostics: SimulationDiagnostics,
}

// ── Validation ──

fn invalid(name: &'static str, reason: impl Into<String>) -> SimulationError {
    SimulationError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

fn validate(config: &StrategyConfig) -> Result<(), SimulationError> {
    if !config.k_init.is_finite() || config.k_init < 0.0 {
        return Err(invalid("k_init", format!("must be finite and >= 0, got {}", config.k_init)));
    }
    if let Some(k) = config.k_trail {
        if !k.is_finite() || k < 0.0 {
            return Err(invalid("k_trail", format!("must be finite and >= 0, got {k}")));
        }
    }
    if config.use_adx && !config.adx_min.is_finite() {
        return Err(invalid("adx_min", "must be finite when the ADX filter is on"));
    }
    if config.require_momentum && !config.momentum_threshold.is_finite() {
        return Err(invalid(
            "momentum_threshold",
            "must be finite when the momentum filter is on",
        ));
    }
    for rule in &config.exit_rules {
        match *rule {
            ExitRule::TimeStop => match config.time_stop_bars {
                None => return Err(invalid("time_stop_bars", "required by the time_stop exit")),
                Some(0) => return Err(invalid("time_stop_bars", "must be >= 1")),
                Some(_) => {}
            },
            ExitRule::SignalReversal { threshold } if !threshold.is_finite() => {
                return Err(invalid("signal_reversal.threshold", "must be finite"));
            }
            ExitRule::TakeProfit { pct } if !(pct.is_finite() && pct > 0.0) => {
                return Err(invalid("take_profit.pct", format!("must be > 0, got {pct}")));
            }
            ExitRule::ProfitGiveback { pct } if !(pct > 0.0 && pct < 1.0) => {
                return Err(invalid(
                    "profit_giveback.pct",
                    format!("must be in (0, 1), got {pct}"),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

// ── Per-bar predicates ──

/// Reads the columns a decision needs at one bar.
struct BarView<'a> {
    frame: &'a IndicatorFrame,
    index: usize,
}

impl BarView<'_> {
    fn get(&self, column: Column) -> f64 {
        self.frame.value(column, self.index).unwrap_or(f64::NAN)
    }

    fn close(&self) -> f64 {
        self.frame.bars()[self.index].close
    }

    fn high(&self) -> f64 {
        self.frame.bars()[self.index].high
    }

    /// fast > slow and close > slow. NaN anywhere → None.
    fn trend_up(&self) -> Option<bool> {
        let (fast, slow, close) = (self.get(Column::SmaFast), self.get(Column::SmaSlow), self.close());
        if fast.is_nan() || slow.is_nan() || close.is_nan() {
            return None;
        }
        Some(fast > slow && close > slow)
    }
}

fn entry_signal(view: &BarView<'_>, config: &StrategyConfig) -> bool {
    let close = view.close();
    if config.use_trend_filter && view.trend_up() != Some(true) {
        return false;
    }
    if config.require_momentum && !(view.get(config.momentum_source.column()) > config.momentum_threshold) {
        return false;
    }
    if config.require_breakout && !(close > view.get(Column::BreakoutHigh)) {
        return false;
    }
    if config.use_adx && !(view.get(Column::Adx) >= config.adx_min) {
        return false;
    }
    true
}

/// First exit rule that holds, with the reason it reports.
fn exit_signal(
    view: &BarView<'_>,
    pos: &OpenPosition,
    config: &StrategyConfig,
) -> Option<ExitReason> {
    let close = view.close();
    config.exit_rules.iter().find_map(|rule| match *rule {
        ExitRule::Stop => (close <= pos.stop_price()).then(|| {
            if pos.trailing_binding() {
                ExitReason::TrailingStop
            } else {
                ExitReason::StopLoss
            }
        }),
        ExitRule::TimeStop => config
            .time_stop_bars
            .is_some_and(|n| pos.bars_held(view.index) >= n)
            .then_some(ExitReason::TimeStop),
        // A NaN average is no evidence the trend broke.
        ExitRule::TrendInvalidation => {
            (view.trend_up() == Some(false)).then_some(ExitReason::TrendInvalidated)
        }
        ExitRule::SignalReversal { threshold } => (view.get(config.momentum_source.column())
            < threshold)
            .then_some(ExitReason::SignalReversal),
        ExitRule::TakeProfit { pct } => {
            (close >= pos.entry_price * (1.0 + pct)).then_some(ExitReason::TakeProfit)
        }
        // Drawdown from the peak must exceed pct, not merely reach it.
        ExitRule::ProfitGiveback { pct } => (close > pos.entry_price
            && (pos.peak_close - close) / pos.peak_close > pct)
            .then_some(ExitReason::TakeProfit),
    })
}

// ── Main pass ──

/// Run the strategy over the frame.
///
/// Fails before touching any bar if the config is inconsistent, a required
/// column is missing, or the frame is not longer than the warm-up offset.
pub fn simulate(
    frame: &IndicatorFrame,
    config: &StrategyConfig,
) -> Result<SimulationOutput, SimulationError> {
    validate(config)?;

    let required = required_columns(config);
    if let Some(&column) = required.iter().find(|c| !frame.has(**c)) {
        return Err(SimulationError::MissingColumn { column });
    }

    let n = frame.len();
    let i_start = start_index(frame, config);
    if n <= i_start {
        return Err(SimulationError::InsufficientHistory {
            required: i_start,
            available: n,
        });
    }

    let bars = frame.bars();
    let mut position = vec![0.0; n];
    let mut flag = vec![0i8; n];
    let mut trades = TradeLedger::new();
    let mut state = SimulationState::new();
    let mut diag = SimulationDiagnostics {
        warmup_bars: i_start,
        ..SimulationDiagnostics::default()
    };

    tracing::debug!(bars = n, i_start, columns = ?required, "simulation start");

    for i in i_start..n {
        diag.bars_evaluated += 1;
        let view = BarView { frame, index: i };
        let bar = &bars[i];

        // Exits are only checked on bars after the entry bar.
        if let Some(open) = state.open.as_mut() {
            let atr = view.get(Column::Atr);
            open.update(view.high(), bar.close, atr, config.k_trail);

            if let Some(reason) = exit_signal(&view, open, config) {
                let stop_price = open.stop_price();
                let entry_index = open.entry_index;
                state.close(i);
                flag[i] = -1;
                position[i] = 0.0;
                trades.record_exit(ExitRecord {
                    bar_index: i,
                    time: bar.timestamp,
                    price: bar.close,
                    reason,
                    stop_price,
                });
                diag.exits += 1;
                tracing::debug!(
                    bar = i,
                    time = %bar.timestamp,
                    price = bar.close,
                    reason = %reason,
                    bars_held = i - entry_index,
                    "exit"
                );
            } else {
                position[i] = 1.0;
            }
            continue;
        }

        if !state.cooldown_ok(i, config.cooldown_bars) {
            continue;
        }

        if bar.close.is_nan() || required.iter().any(|c| view.get(*c).is_nan()) {
            diag.degenerate_bars += 1;
            tracing::trace!(bar = i, time = %bar.timestamp, "no entry: degenerate indicator");
            continue;
        }

        if !entry_signal(&view, config) {
            tracing::trace!(bar = i, "no entry: filters not met");
            continue;
        }

        let atr = view.get(Column::Atr);
        let open = OpenPosition::new(bar.close, i, bar.high, atr, config.k_init, config.k_trail);
        let signal = config
            .needs_momentum()
            .then(|| view.get(config.momentum_source.column()));
        trades.record_entry(EntryRecord {
            bar_index: i,
            time: bar.timestamp,
            price: bar.close,
            atr,
            initial_stop: open.initial_stop,
            signal,
        });
        tracing::debug!(
            bar = i,
            time = %bar.timestamp,
            price = bar.close,
            stop = open.stop_price(),
            "entry"
        );
        state.open(open);
        flag[i] = 1;
        position[i] = 1.0;
        diag.entries += 1;
    }

    tracing::debug!(
        entries = diag.entries,
        exits = diag.exits,
        degenerate = diag.degenerate_bars,
        "simulation complete"
    );

    Ok(SimulationOutput {
        series: AnnotatedSeries {
            timestamps: bars.iter().map(|b| b.timestamp).collect(),
            close: bars.iter().map(|b| b.close).collect(),
            position,
            flag,
        },
        trades,
        diagnostics: diag,
    })
}
