//! Breakout reference level: highest high of the preceding N bars.
//!
//! hh[t] = max(high[t-N..=t-1]); the current bar is excluded so that
//! `close[t] > hh[t]` is a genuine breakout above prior history.
//!
//! Lookback: period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct RollingHigh {
    period: usize,
    name: String,
}

impl RollingHigh {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RollingHigh period must be >= 1");
        Self {
            period,
            name: format!("hh_{period}"),
        }
    }
}

impl Indicator for RollingHigh {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];

        for (i, slot) in result.iter_mut().enumerate().skip(self.period) {
            let window = &bars[i - self.period..i];
            let mut max_val = f64::NEG_INFINITY;
            let mut has_nan = false;
            for bar in window {
                if bar.high.is_nan() {
                    has_nan = true;
                    break;
                }
                max_val = max_val.max(bar.high);
            }
            *slot = if has_nan { f64::NAN } else { max_val };
        }

        result
    }
}
