//! NAV derivation: a stateless second pass over the annotated series.
//!
//! P&L on bar i is earned on the position decided at the close of bar i-1,
//! so `effective_position[i] = position[i-1]`.

use serde::{Deserialize, Serialize};

use crate::indicators::signal_strength::bar_returns;

/// How per-bar strategy returns accumulate into the NAV curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavMode {
    /// nav = 1 + cumsum(ret * effective_position)
    Additive,
    /// nav = cumprod(1 + ret * effective_position), floored at 0
    Compounding,
}

impl NavMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavMode::Additive => "additive",
            NavMode::Compounding => "compounding",
        }
    }
}

/// Per-bar return, effective position, NAV, and buy-and-hold benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavSeries {
    pub ret: Vec<f64>,
    pub effective_position: Vec<f64>,
    pub nav: Vec<f64>,
    pub benchmark: Vec<f64>,
}

impl NavSeries {
    /// Strategy return on each bar.
    pub fn strategy_returns(&self) -> Vec<f64> {
        self.ret
            .iter()
            .zip(&self.effective_position)
            .map(|(r, p)| r * p)
            .collect()
    }

    pub fn final_nav(&self) -> f64 {
        self.nav.last().copied().unwrap_or(1.0)
    }
}

/// Derive the NAV curve from closes and the simulator's position column.
pub fn derive_nav(close: &[f64], position: &[f64], mode: NavMode) -> NavSeries {
    debug_assert_eq!(close.len(), position.len());
    let n = close.len().min(position.len());

    let ret = bar_returns(&close[..n]);

    let mut effective_position = vec![0.0; n];
    for i in 1..n {
        effective_position[i] = position[i - 1];
    }

    let mut nav = Vec::with_capacity(n);
    let mut acc = match mode {
        NavMode::Additive => 0.0,
        NavMode::Compounding => 1.0,
    };
    for i in 0..n {
        let strat = ret[i] * effective_position[i];
        match mode {
            NavMode::Additive => {
                acc += strat;
                nav.push(1.0 + acc);
            }
            NavMode::Compounding => {
                acc = (acc * (1.0 + strat)).max(0.0);
                nav.push(acc);
            }
        }
    }

    let base = close.first().copied().unwrap_or(f64::NAN);
    let benchmark = close[..n].iter().map(|c| c / base).collect();

    NavSeries {
        ret,
        effective_position,
        nav,
        benchmark,
    }
}
