//! Look-ahead contamination tests for every indicator and the simulator.
//!
//! Invariant: no value at bar t may depend on price data from bar t+1 or later.
//!
//! Method: compute on a truncated series (bars 0..k) and the full series
//! (bars 0..n). Assert bars 0..k are identical between both runs. Any
//! difference means future data is leaking into past values.

use chrono::NaiveDate;
use ruleslab_core::domain::Bar;
use ruleslab_core::engine::{simulate, ExitRule, MomentumSource, StrategyConfig};
use ruleslab_core::indicators::*;

/// Generate N hourly bars of synthetic OHLCV data with realistic variation.
fn make_test_bars(n: usize) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        // Deterministic pseudo-random walk using a simple LCG
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let change = ((seed % 200) as f64 - 100.0) * 0.05; // -5.0 to +5.0
        price += change + (i as f64 * 0.05).sin();
        price = price.max(10.0);

        let open = price - 0.5;
        let close = price + 0.3;
        bars.push(Bar {
            timestamp: base + chrono::Duration::hours(i as i64),
            open,
            high: open.max(close) + 2.0,
            low: open.min(close) - 2.0,
            close,
            volume: 1000.0 + i as f64 * 10.0,
        });
    }

    bars
}

fn same(t: f64, f: f64) -> bool {
    (t.is_nan() && f.is_nan()) || (t - f).abs() < 1e-10
}

fn assert_no_lookahead(indicator: &dyn Indicator, full_bars: &[Bar], truncated_len: usize) {
    let full_result = indicator.compute(full_bars);
    let truncated_result = indicator.compute(&full_bars[..truncated_len]);

    assert_eq!(truncated_result.len(), truncated_len, "{}: length", indicator.name());
    assert_eq!(full_result.len(), full_bars.len(), "{}: length", indicator.name());

    for i in 0..truncated_len {
        let (t, f) = (truncated_result[i], full_result[i]);
        assert!(
            same(t, f),
            "{}: look-ahead contamination at bar {i}: truncated={t}, full={f}",
            indicator.name()
        );
    }
}

#[test]
fn lookahead_sma() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&Sma::new(10), &bars, 150);
    assert_no_lookahead(&Sma::new(48), &bars, 150);
}

#[test]
fn lookahead_atr() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&Atr::new(14), &bars, 150);
    assert_no_lookahead(&Atr::new(5), &bars, 150);
}

#[test]
fn lookahead_adx() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&Adx::new(14), &bars, 150);
    assert_no_lookahead(&Adx::new(7), &bars, 150);
}

#[test]
fn lookahead_rolling_high() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&RollingHigh::new(20), &bars, 150);
    assert_no_lookahead(&RollingHigh::new(48), &bars, 150);
}

#[test]
fn lookahead_returns_and_volatility() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&RollingReturn::new(24), &bars, 150);
    assert_no_lookahead(&RollingVolatility::new(24), &bars, 150);
}

#[test]
fn lookahead_signal_strength() {
    let bars = make_test_bars(300);
    assert_no_lookahead(&SignalStrength::new(10, 10), &bars, 150);
    assert_no_lookahead(&SignalStrength::new(24, 24), &bars, 150);
    assert_no_lookahead(&SignalZ::new(10, 10, 60), &bars, 150);
}

/// Two inputs identical up to bar k produce identical decisions up to bar k.
#[test]
fn lookahead_simulator() {
    let full = make_test_bars(400);
    let params = IndicatorParams {
        ret_periods: 10,
        vol_window: 10,
        atr_period: 14,
        sma_fast: 12,
        sma_slow: 40,
        adx_period: 7,
        breakout_lookback: 12,
        zscore_window: 30,
    };
    let cfg = StrategyConfig {
        use_adx: true,
        adx_min: 10.0,
        require_momentum: true,
        momentum_source: MomentumSource::SignalZ,
        momentum_threshold: 0.0,
        time_stop_bars: Some(30),
        cooldown_bars: 3,
        exit_rules: vec![ExitRule::Stop, ExitRule::TimeStop, ExitRule::TrendInvalidation],
        ..StrategyConfig::default()
    };

    let k = 250;
    let mut altered = full.clone();
    for (j, bar) in altered.iter_mut().enumerate().skip(k) {
        let shift = if j % 2 == 0 { 6.0 } else { -5.0 };
        bar.open += shift;
        bar.high += shift + 3.0;
        bar.low += shift - 3.0;
        bar.close += shift;
    }

    let a = simulate(&IndicatorFrame::compute(full, &params).unwrap(), &cfg).unwrap();
    let b = simulate(&IndicatorFrame::compute(altered, &params).unwrap(), &cfg).unwrap();

    assert_eq!(a.series.position[..k], b.series.position[..k]);
    assert_eq!(a.series.flag[..k], b.series.flag[..k]);
    let entries_before = |out: &ruleslab_core::engine::SimulationOutput| {
        out.trades
            .entries
            .iter()
            .filter(|e| e.bar_index < k)
            .count()
    };
    assert_eq!(entries_before(&a), entries_before(&b));
}
