//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: NAV curve, strategy returns and/or trade
//! list in, scalar out. Crypto trades every day, so annualization uses 365
//! days per year, scaled to the bar frequency.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use ruleslab_core::domain::TradeRecord;
use ruleslab_core::engine::NavSeries;

pub const DAYS_PER_YEAR: f64 = 365.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Whole-series statistics derived from the NAV curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetrics {
    pub total_return: f64,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe: f64,
    /// Positive fraction, e.g. 0.15 = 15% below the running peak.
    pub max_drawdown: f64,
    pub calmar: f64,
    /// Fraction of bars held long.
    pub exposure: f64,
    pub elapsed_days: f64,
    pub periods_per_year: f64,
}

impl SeriesMetrics {
    pub fn compute(
        timestamps: &[NaiveDateTime],
        nav: &[f64],
        strategy_returns: &[f64],
        position: &[f64],
        risk_free_rate: f64,
    ) -> Self {
        let elapsed = elapsed_days(timestamps);
        let periods = periods_per_year(timestamps);
        let total = total_return(nav);
        let annual = annualized_return(total, elapsed);
        let vol = annualized_volatility(strategy_returns, periods);
        let mdd = max_drawdown(nav);
        Self {
            total_return: total,
            annual_return: annual,
            annual_volatility: vol,
            sharpe: sharpe_ratio(annual, vol, risk_free_rate),
            max_drawdown: mdd,
            calmar: calmar_ratio(annual, mdd),
            exposure: mean_f64(position),
            elapsed_days: elapsed,
            periods_per_year: periods,
        }
    }
}

/// Everything the reporter derives for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub series: SeriesMetrics,
    pub trades: TradeMetrics,
    pub score: f64,
    pub grade: Grade,
}

impl PerformanceReport {
    pub fn compute(
        timestamps: &[NaiveDateTime],
        nav: &NavSeries,
        position: &[f64],
        trades: &[TradeRecord],
        risk_free_rate: f64,
    ) -> Self {
        let series = SeriesMetrics::compute(
            timestamps,
            &nav.nav,
            &nav.strategy_returns(),
            position,
            risk_free_rate,
        );
        let trades = TradeMetrics::compute(trades);
        let score = composite_score(&trades, Some(series.max_drawdown));
        Self {
            series,
            trades,
            score,
            grade: Grade::from_score(score),
        }
    }
}

// ─── Series metric functions ────────────────────────────────────────

/// Total return of a NAV curve that starts at 1.0: final - 1.
pub fn total_return(nav: &[f64]) -> f64 {
    match nav.last() {
        Some(last) if nav.len() >= 2 => last - 1.0,
        _ => 0.0,
    }
}

/// Calendar days between first and last timestamp, fractional.
pub fn elapsed_days(timestamps: &[NaiveDateTime]) -> f64 {
    match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) => (*last - *first).num_seconds() as f64 / SECONDS_PER_DAY,
        _ => 0.0,
    }
}

/// Bars per year implied by the median bar spacing.
///
/// Falls back to daily bars (365) when fewer than two timestamps exist.
pub fn periods_per_year(timestamps: &[NaiveDateTime]) -> f64 {
    let mut gaps: Vec<i64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds())
        .filter(|&s| s > 0)
        .collect();
    if gaps.is_empty() {
        return DAYS_PER_YEAR;
    }
    gaps.sort_unstable();
    let median = gaps[gaps.len() / 2] as f64;
    DAYS_PER_YEAR * SECONDS_PER_DAY / median
}

/// (1 + total)^(365 / elapsed_days) - 1.
///
/// Returns 0.0 for an empty span; -1.0 once the curve is wiped out.
pub fn annualized_return(total_return: f64, elapsed_days: f64) -> f64 {
    if elapsed_days <= 0.0 {
        return 0.0;
    }
    if total_return <= -1.0 {
        return -1.0;
    }
    (1.0 + total_return).powf(DAYS_PER_YEAR / elapsed_days) - 1.0
}

/// Sample std of per-bar strategy returns scaled by sqrt(periods per year).
pub fn annualized_volatility(strategy_returns: &[f64], periods_per_year: f64) -> f64 {
    std_dev(strategy_returns) * periods_per_year.sqrt()
}

/// (annual return - rf) / annual volatility. 0.0 when volatility is zero.
pub fn sharpe_ratio(annual_return: f64, annual_volatility: f64, risk_free_rate: f64) -> f64 {
    if annual_volatility < 1e-15 {
        return 0.0;
    }
    (annual_return - risk_free_rate) / annual_volatility
}

/// Maximum drawdown as a positive fraction of the running peak.
pub fn max_drawdown(nav: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &v in nav {
        peak = peak.max(v);
        if peak > 0.0 {
            max_dd = max_dd.max(1.0 - v / peak);
        }
    }
    max_dd
}

/// Calmar ratio: annual return / max drawdown. 0.0 with no drawdown.
pub fn calmar_ratio(annual_return: f64, max_drawdown: f64) -> f64 {
    if max_drawdown <= 0.0 {
        return 0.0;
    }
    annual_return / max_drawdown
}

// ─── Trade statistics ───────────────────────────────────────────────

/// Counts of trade returns per bucket. Buckets are right-inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnDistribution {
    /// <= -10%
    pub severe_loss: usize,
    /// (-10%, -5%]
    pub large_loss: usize,
    /// (-5%, 0%]
    pub small_loss: usize,
    /// (0%, 5%]
    pub small_gain: usize,
    /// (5%, 10%]
    pub large_gain: usize,
    /// > 10%
    pub big_gain: usize,
}

impl ReturnDistribution {
    pub fn from_returns(returns: &[f64]) -> Self {
        let mut d = Self::default();
        for &r in returns {
            match r {
                r if r <= -0.10 => d.severe_loss += 1,
                r if r <= -0.05 => d.large_loss += 1,
                r if r <= 0.0 => d.small_loss += 1,
                r if r <= 0.05 => d.small_gain += 1,
                r if r <= 0.10 => d.large_gain += 1,
                _ => d.big_gain += 1,
            }
        }
        d
    }

    pub fn rows(&self) -> [(&'static str, usize); 6] {
        [
            ("< -10%", self.severe_loss),
            ("-10% .. -5%", self.large_loss),
            ("-5% .. 0%", self.small_loss),
            ("0% .. 5%", self.small_gain),
            ("5% .. 10%", self.large_gain),
            ("> 10%", self.big_gain),
        ]
    }
}

/// Per-trade statistics over completed round trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMetrics {
    pub trade_count: usize,
    pub winners: usize,
    pub losers: usize,
    pub win_rate: f64,
    /// Sum of per-trade returns.
    pub sum_return: f64,
    pub avg_return: f64,
    pub avg_win: f64,
    /// Absolute value of the mean losing return.
    pub avg_loss: f64,
    /// avg_win / avg_loss; None unless both winners and losers exist.
    pub profit_loss_ratio: Option<f64>,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub return_std: f64,
    pub avg_holding_hours: f64,
    pub min_holding_hours: f64,
    pub max_holding_hours: f64,
    /// Share of trades held <= 24h.
    pub short_share: f64,
    /// Share of trades held (24h, 168h].
    pub medium_share: f64,
    /// Share of trades held > 168h.
    pub long_share: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    /// None when all entries fall on the same day.
    pub trades_per_day: Option<f64>,
    pub trades_per_week: Option<f64>,
    pub distribution: ReturnDistribution,
    pub exit_reasons: BTreeMap<String, usize>,
}

impl TradeMetrics {
    /// Trades must be ordered by entry time.
    pub fn compute(trades: &[TradeRecord]) -> Self {
        let returns: Vec<f64> = trades.iter().map(|t| t.return_pct()).collect();
        let wins: Vec<f64> = returns.iter().copied().filter(|&r| r > 0.0).collect();
        let losses: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
        let hours: Vec<f64> = trades.iter().map(|t| t.holding_hours()).collect();
        let n = trades.len();

        let share = |pred: &dyn Fn(f64) -> bool| -> f64 {
            if n == 0 {
                0.0
            } else {
                hours.iter().filter(|&&h| pred(h)).count() as f64 / n as f64
            }
        };

        let avg_win = mean_f64(&wins);
        let avg_loss = mean_f64(&losses).abs();
        let profit_loss_ratio =
            (!wins.is_empty() && !losses.is_empty() && avg_loss > 0.0).then(|| avg_win / avg_loss);

        let mut exit_reasons = BTreeMap::new();
        for t in trades {
            *exit_reasons.entry(t.exit_reason.as_str().to_string()).or_insert(0) += 1;
        }

        let entry_span_days = match (trades.first(), trades.last()) {
            (Some(first), Some(last)) if n >= 2 => (last.entry_time - first.entry_time).num_days(),
            _ => 0,
        };
        let trades_per_day = (entry_span_days > 0).then(|| n as f64 / entry_span_days as f64);

        Self {
            trade_count: n,
            winners: wins.len(),
            losers: n - wins.len(),
            win_rate: win_rate(trades),
            sum_return: returns.iter().sum(),
            avg_return: mean_f64(&returns),
            avg_win,
            avg_loss,
            profit_loss_ratio,
            best_trade: returns.iter().copied().fold(f64::NAN, f64::max),
            worst_trade: returns.iter().copied().fold(f64::NAN, f64::min),
            return_std: std_dev(&returns),
            avg_holding_hours: mean_f64(&hours),
            min_holding_hours: hours.iter().copied().fold(f64::NAN, f64::min),
            max_holding_hours: hours.iter().copied().fold(f64::NAN, f64::max),
            short_share: share(&|h| h <= 24.0),
            medium_share: share(&|h| h > 24.0 && h <= 168.0),
            long_share: share(&|h| h > 168.0),
            max_consecutive_wins: max_consecutive_wins(trades),
            max_consecutive_losses: max_consecutive_losses(trades),
            trades_per_day,
            trades_per_week: trades_per_day.map(|d| d * 7.0),
            distribution: ReturnDistribution::from_returns(&returns),
            exit_reasons,
        }
    }
}

/// Win rate: fraction of trades with a positive return.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Maximum consecutive winning trades.
pub fn max_consecutive_wins(trades: &[TradeRecord]) -> usize {
    max_consecutive(trades, true)
}

/// Maximum consecutive losing (or flat) trades.
pub fn max_consecutive_losses(trades: &[TradeRecord]) -> usize {
    max_consecutive(trades, false)
}

// ─── Composite score ────────────────────────────────────────────────

/// Qualitative band for the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 80.0 => Grade::Excellent,
            s if s >= 60.0 => Grade::Good,
            s if s >= 40.0 => Grade::Fair,
            s if s >= 20.0 => Grade::Poor,
            _ => Grade::VeryPoor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Excellent => "excellent",
            Grade::Good => "good",
            Grade::Fair => "fair",
            Grade::Poor => "poor",
            Grade::VeryPoor => "very poor",
        }
    }
}

/// 0–100 score blending win rate, average return, profit/loss ratio,
/// streak balance and drawdown.
///
/// - win rate: ×20 above 50%, ×10 otherwise
/// - average return: ×200 capped at 20 when positive, ×100 (a penalty) otherwise
/// - profit/loss ratio: ×10 capped at 20 above 1, ×5 otherwise, 0 if undefined
/// - streaks: +15 if the longest win streak beats the longest loss streak, else +5
/// - drawdown: +15 if max drawdown is known and below 10%
pub fn composite_score(trades: &TradeMetrics, max_drawdown: Option<f64>) -> f64 {
    if trades.trade_count == 0 {
        return 0.0;
    }
    let mut score = 0.0;

    score += if trades.win_rate > 0.5 {
        trades.win_rate * 20.0
    } else {
        trades.win_rate * 10.0
    };

    score += if trades.avg_return > 0.0 {
        (trades.avg_return * 200.0).min(20.0)
    } else {
        trades.avg_return * 100.0
    };

    score += match trades.profit_loss_ratio {
        Some(r) if r > 1.0 => (r * 10.0).min(20.0),
        Some(r) => r * 5.0,
        None => 0.0,
    };

    score += if trades.max_consecutive_wins > trades.max_consecutive_losses {
        15.0
    } else {
        5.0
    };

    if matches!(max_drawdown, Some(dd) if dd < 0.1) {
        score += 15.0;
    }

    score.clamp(0.0, 100.0)
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;

    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}
