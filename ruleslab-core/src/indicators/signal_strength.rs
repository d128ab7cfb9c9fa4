//! Volatility-adjusted momentum.
//!
//! signal_strength[t] = rolling_return[t] / rolling_volatility[t], a
//! Sharpe-like reading of the last `ret_periods` bars. The volatility
//! denominator is clamped to [`VOLATILITY_FLOOR`] so a flat window never
//! divides by zero.
//!
//! Warm-up values follow the fill conventions of the return series:
//! rolling return is 0 and volatility is the floor until their windows fill.

use super::Indicator;
use crate::domain::Bar;

/// Smallest volatility the signal ever divides by.
pub const VOLATILITY_FLOOR: f64 = 1e-6;

/// Simple close-to-close return per bar. ret[0] = 0.
pub fn bar_returns(closes: &[f64]) -> Vec<f64> {
    let mut ret = vec![0.0; closes.len()];
    for i in 1..closes.len() {
        let r = (closes[i] - closes[i - 1]) / closes[i - 1];
        ret[i] = if r.is_finite() { r } else { 0.0 };
    }
    ret
}

/// N-bar percent change. 0 until N bars of history exist.
pub fn rolling_return(closes: &[f64], periods: usize) -> Vec<f64> {
    let mut out = vec![0.0; closes.len()];
    for i in periods..closes.len() {
        let r = closes[i] / closes[i - periods] - 1.0;
        out[i] = if r.is_finite() { r } else { 0.0 };
    }
    out
}

/// Sample standard deviation (ddof = 1) over a trailing window.
/// NaN until the window fills, or if the window holds a NaN.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if window < 2 || n < window {
        return out;
    }
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / window as f64;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
        out[i] = var.sqrt();
    }
    out
}

/// Rolling z-score of a series.
///
/// A zero standard deviation is replaced by 1; positions without a full
/// window (or with NaN inputs) score 0.
pub fn rolling_zscore(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![0.0; n];
    if window < 2 || n < window {
        return out;
    }
    let std = rolling_std(values, window);
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let sd = if std[i] == 0.0 { 1.0 } else { std[i] };
        let z = (values[i] - mean) / sd;
        out[i] = if z.is_nan() { 0.0 } else { z };
    }
    out
}

/// N-bar percent change of the close.
#[derive(Debug, Clone)]
pub struct RollingReturn {
    periods: usize,
    name: String,
}

impl RollingReturn {
    pub fn new(periods: usize) -> Self {
        assert!(periods >= 1, "return periods must be >= 1");
        Self {
            periods,
            name: format!("ret_{periods}"),
        }
    }
}

impl Indicator for RollingReturn {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.periods
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        rolling_return(&closes, self.periods)
    }
}

/// Rolling volatility of bar returns, floored at [`VOLATILITY_FLOOR`].
#[derive(Debug, Clone)]
pub struct RollingVolatility {
    window: usize,
    name: String,
}

impl RollingVolatility {
    pub fn new(window: usize) -> Self {
        assert!(window >= 2, "volatility window must be >= 2");
        Self {
            window,
            name: format!("vol_{window}"),
        }
    }
}

impl Indicator for RollingVolatility {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        rolling_std(&bar_returns(&closes), self.window)
            .into_iter()
            .map(|v| if v.is_nan() || v < VOLATILITY_FLOOR { VOLATILITY_FLOOR } else { v })
            .collect()
    }
}

/// Rolling return divided by rolling volatility.
#[derive(Debug, Clone)]
pub struct SignalStrength {
    ret_periods: usize,
    volatility: RollingVolatility,
    name: String,
}

impl SignalStrength {
    pub fn new(ret_periods: usize, vol_window: usize) -> Self {
        assert!(ret_periods >= 1, "return periods must be >= 1");
        Self {
            ret_periods,
            volatility: RollingVolatility::new(vol_window),
            name: format!("signal_strength_{ret_periods}_{vol_window}"),
        }
    }
}

impl Indicator for SignalStrength {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.ret_periods.max(self.volatility.lookback())
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let ret = RollingReturn::new(self.ret_periods).compute(bars);
        let vol = self.volatility.compute(bars);
        ret.iter().zip(vol.iter()).map(|(r, v)| r / v).collect()
    }
}

/// Z-score of [`SignalStrength`] over a long normalization window.
#[derive(Debug, Clone)]
pub struct SignalZ {
    strength: SignalStrength,
    window: usize,
    name: String,
}

impl SignalZ {
    pub fn new(ret_periods: usize, vol_window: usize, window: usize) -> Self {
        assert!(window >= 2, "z-score window must be >= 2");
        Self {
            strength: SignalStrength::new(ret_periods, vol_window),
            window,
            name: format!("signal_z_{window}"),
        }
    }
}

impl Indicator for SignalZ {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.strength.lookback() + self.window - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        rolling_zscore(&self.strength.compute(bars), self.window)
    }
}
