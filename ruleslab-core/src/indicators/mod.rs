//! Indicator computation.
//!
//! Every indicator implements [`Indicator`]: a pure function from the bar
//! series to a numeric series of the same length. They are computed once
//! into an [`IndicatorFrame`] before the simulation pass, never per bar.

pub mod adx;
pub mod atr;
pub mod frame;
pub mod indicator;
pub mod rolling_high;
pub mod signal_strength;
pub mod sma;

pub use adx::Adx;
pub use atr::Atr;
pub use frame::{Column, IndicatorError, IndicatorFrame, IndicatorParams};
pub use indicator::{Indicator, IndicatorValues};
pub use rolling_high::RollingHigh;
pub use signal_strength::{
    RollingReturn, RollingVolatility, SignalStrength, SignalZ, VOLATILITY_FLOOR,
};
pub use sma::Sma;

#[cfg(test)]
fn test_timestamp(i: usize) -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::hours(i as i64)
}

/// Create synthetic hourly bars from close prices for testing.
///
/// open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            crate::domain::Bar {
                timestamp: test_timestamp(i),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Create hourly bars from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| crate::domain::Bar {
            timestamp: test_timestamp(i),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
