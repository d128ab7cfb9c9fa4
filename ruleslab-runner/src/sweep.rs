//! Parameter sweeps over the stop, cooldown and ADX knobs.
//!
//! Indicators depend only on the bars and the indicator windows, so the
//! frame is computed once and shared read-only across every run.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use ruleslab_core::domain::Bar;
use ruleslab_core::engine::{SimulationError, StrategyConfig};
use ruleslab_core::indicators::IndicatorFrame;

use crate::config::ResolvedConfig;
use crate::metrics::PerformanceReport;
use crate::runner::{evaluate, RunError};

/// Values to try for each swept parameter.
///
/// An empty list keeps the base config's value for that parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub k_init: Vec<f64>,
    pub k_trail: Vec<Option<f64>>,
    pub cooldown_bars: Vec<usize>,
    pub adx_min: Vec<f64>,
}

fn or_base<T: Clone>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

impl ParamGrid {
    /// k_init 1.5..3, trailing off or 2..3, cooldown 0/6/24.
    pub fn stops_default() -> Self {
        Self {
            k_init: vec![1.5, 2.0, 2.5, 3.0],
            k_trail: vec![None, Some(2.0), Some(2.5), Some(3.0)],
            cooldown_bars: vec![0, 6, 24],
            adx_min: Vec::new(),
        }
    }

    /// Number of configurations [`generate_configs`](Self::generate_configs) yields.
    pub fn size(&self) -> usize {
        self.k_init.len().max(1)
            * self.k_trail.len().max(1)
            * self.cooldown_bars.len().max(1)
            * self.adx_min.len().max(1)
    }

    pub fn generate_configs(&self, base: &StrategyConfig) -> Vec<StrategyConfig> {
        let mut configs = Vec::with_capacity(self.size());

        for k_init in or_base(&self.k_init, base.k_init) {
            for k_trail in or_base(&self.k_trail, base.k_trail) {
                for cooldown in or_base(&self.cooldown_bars, base.cooldown_bars) {
                    for adx_min in or_base(&self.adx_min, base.adx_min) {
                        configs.push(StrategyConfig {
                            k_init,
                            k_trail,
                            cooldown_bars: cooldown,
                            adx_min,
                            ..base.clone()
                        });
                    }
                }
            }
        }

        configs
    }
}

/// One grid point's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub strategy: StrategyConfig,
    pub report: PerformanceReport,
}

#[derive(Debug, Clone)]
pub struct SweepResults {
    /// Successful runs, best Sharpe first.
    points: Vec<SweepPoint>,
    /// Grid points the simulator rejected.
    failures: Vec<(StrategyConfig, SimulationError)>,
}

impl SweepResults {
    pub fn points(&self) -> &[SweepPoint] {
        &self.points
    }

    pub fn failures(&self) -> &[(StrategyConfig, SimulationError)] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn best(&self) -> Option<&SweepPoint> {
        self.points.first()
    }

    pub fn top_n(&self, n: usize) -> &[SweepPoint] {
        &self.points[..n.min(self.points.len())]
    }
}

/// Evaluate every grid configuration on one shared frame.
pub fn sweep_frame(
    frame: &IndicatorFrame,
    base: &StrategyConfig,
    grid: &ParamGrid,
    risk_free_rate: f64,
    parallel: bool,
) -> SweepResults {
    let configs = grid.generate_configs(base);
    tracing::info!(configs = configs.len(), parallel, "starting sweep");

    let run = |strategy: StrategyConfig| match evaluate(frame, &strategy, risk_free_rate) {
        Ok(eval) => Ok(SweepPoint {
            strategy,
            report: eval.report,
        }),
        Err(e) => Err((strategy, e)),
    };

    let outcomes: Vec<Result<SweepPoint, (StrategyConfig, SimulationError)>> = if parallel {
        configs.into_par_iter().map(run).collect()
    } else {
        configs.into_iter().map(run).collect()
    };

    let mut points = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(p) => points.push(p),
            Err((strategy, e)) => {
                tracing::warn!(k_init = strategy.k_init, error = %e, "sweep point rejected");
                failures.push((strategy, e));
            }
        }
    }

    points.sort_by(|a, b| b.report.series.sharpe.total_cmp(&a.report.series.sharpe));
    SweepResults { points, failures }
}

/// Compute indicators once for `config`, then sweep `grid` around its strategy.
pub fn sweep(
    bars: Vec<Bar>,
    config: &ResolvedConfig,
    grid: &ParamGrid,
    parallel: bool,
) -> Result<SweepResults, RunError> {
    let frame = IndicatorFrame::compute(bars, &config.indicators)?;
    Ok(sweep_frame(
        &frame,
        &config.strategy,
        grid,
        config.risk_free_rate,
        parallel,
    ))
}
