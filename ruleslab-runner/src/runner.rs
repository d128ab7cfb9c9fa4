//! Backtest orchestration: load → resample → clean → indicators → simulate
//! → NAV → metrics.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use ruleslab_core::domain::{Bar, EntryRecord, TradeRecord};
use ruleslab_core::engine::{
    derive_nav, simulate, AnnotatedSeries, NavSeries, SimulationDiagnostics, SimulationError,
    StrategyConfig,
};
use ruleslab_core::indicators::{IndicatorError, IndicatorFrame};

use crate::config::{BacktestConfig, ConfigError, DataConfig, ResolvedConfig, RunId};
use crate::data_loader::{self, CleanReport, LoadError, YearMonth};
use crate::metrics::PerformanceReport;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("failed to hash config: {0}")]
    Hash(#[from] serde_json::Error),

    #[error("no usable bars after cleaning")]
    NoBars,
}

// ── Data provenance ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    Files {
        files: Vec<PathBuf>,
        missing_months: Vec<YearMonth>,
    },
    Synthetic {
        seed: u64,
    },
    InMemory,
}

/// What went into the simulation, and what cleaning did to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub source: DataSource,
    /// Bars before resampling.
    pub raw_bars: usize,
    /// Bars after resampling and cleaning.
    pub bars: usize,
    pub filled_bars: usize,
    pub dropped_leading: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub dataset_hash: String,
}

impl DataSummary {
    pub fn is_synthetic(&self) -> bool {
        matches!(self.source, DataSource::Synthetic { .. })
    }
}

/// Read (or generate) bars for `data`, then resample and clean them.
pub fn load_bars(data: &DataConfig) -> Result<(Vec<Bar>, DataSummary), RunError> {
    let (raw, source) = match (data.synthetic, &data.dir, data.start, data.end) {
        (Some(n), _, _, _) => {
            tracing::warn!(bars = n, seed = data.seed, "using synthetic data");
            (
                data_loader::synthetic_bars(n, data.seed),
                DataSource::Synthetic { seed: data.seed },
            )
        }
        (None, Some(dir), Some(start), Some(end)) => {
            let loaded = data_loader::load_months(dir, &data.symbol, &data.interval, start, end)?;
            (
                loaded.bars,
                DataSource::Files {
                    files: loaded.files,
                    missing_months: loaded.missing_months,
                },
            )
        }
        _ => {
            return Err(ConfigError::Invalid {
                field: "data",
                reason: "set either data.synthetic or data.dir, data.start and data.end".into(),
            }
            .into())
        }
    };

    prepare(raw, data, source)
}

fn prepare(
    raw: Vec<Bar>,
    data: &DataConfig,
    source: DataSource,
) -> Result<(Vec<Bar>, DataSummary), RunError> {
    let raw_bars = raw.len();
    let (bars, report) = data_loader::clean(data_loader::resample(&raw, data.freq));
    let summary = summarize(&bars, raw_bars, report, source)?;
    tracing::info!(
        raw = raw_bars,
        bars = summary.bars,
        freq = %data.freq,
        hash = &summary.dataset_hash[..12],
        "bars prepared"
    );
    Ok((bars, summary))
}

fn summarize(
    bars: &[Bar],
    raw_bars: usize,
    report: CleanReport,
    source: DataSource,
) -> Result<DataSummary, RunError> {
    if bars.is_empty() {
        return Err(RunError::NoBars);
    }
    Ok(DataSummary {
        source,
        raw_bars,
        bars: bars.len(),
        filled_bars: report.filled,
        dropped_leading: report.dropped_leading,
        first: bars.first().map(|b| b.timestamp),
        last: bars.last().map(|b| b.timestamp),
        dataset_hash: data_loader::dataset_hash(bars),
    })
}

// ── Evaluation ──

/// Simulation output plus everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub series: AnnotatedSeries,
    pub nav: NavSeries,
    /// Completed round trips, ordered by entry time.
    pub trades: Vec<TradeRecord>,
    /// An entry still open at the last bar.
    pub open_trade: Option<EntryRecord>,
    pub diagnostics: SimulationDiagnostics,
    pub report: PerformanceReport,
}

/// Run one strategy over a precomputed frame.
pub fn evaluate(
    frame: &IndicatorFrame,
    strategy: &StrategyConfig,
    risk_free_rate: f64,
) -> Result<Evaluation, SimulationError> {
    let out = simulate(frame, strategy)?;
    let nav = derive_nav(&out.series.close, &out.series.position, strategy.nav_mode);
    let trades = out.trades.paired();
    let report = PerformanceReport::compute(
        &out.series.timestamps,
        &nav,
        &out.series.position,
        &trades,
        risk_free_rate,
    );
    Ok(Evaluation {
        open_trade: out.trades.open_entry().cloned(),
        series: out.series,
        nav,
        trades,
        diagnostics: out.diagnostics,
        report,
    })
}

// ── Backtest ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub run_id: RunId,
    pub config: ResolvedConfig,
    pub data: DataSummary,
    pub evaluation: Evaluation,
}

impl BacktestResult {
    pub fn is_synthetic(&self) -> bool {
        self.data.is_synthetic()
    }
}

/// Load the configured data and run the configured strategy on it.
pub fn run_backtest(config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    let resolved = config.resolve()?;
    let (bars, data) = load_bars(&resolved.data)?;
    run_resolved(bars, data, resolved)
}

/// Run the configured strategy on bars already in memory.
///
/// The bars are cleaned but not resampled; the `[data]` section is ignored.
pub fn run_on_bars(bars: Vec<Bar>, config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    let resolved = config.resolve_params()?;
    let raw_bars = bars.len();
    let (bars, report) = data_loader::clean(bars);
    let data = summarize(&bars, raw_bars, report, DataSource::InMemory)?;
    run_resolved(bars, data, resolved)
}

fn run_resolved(
    bars: Vec<Bar>,
    data: DataSummary,
    config: ResolvedConfig,
) -> Result<BacktestResult, RunError> {
    let run_id = config.run_id()?;
    let frame = IndicatorFrame::compute(bars, &config.indicators)?;
    let evaluation = evaluate(&frame, &config.strategy, config.risk_free_rate)?;

    let report = &evaluation.report;
    tracing::info!(
        run_id = &run_id[..12],
        preset = config.preset.as_deref().unwrap_or("custom"),
        trades = report.trades.trade_count,
        total_return = report.series.total_return,
        sharpe = report.series.sharpe,
        max_drawdown = report.series.max_drawdown,
        synthetic = data.is_synthetic(),
        "backtest complete"
    );

    Ok(BacktestResult {
        run_id,
        config,
        data,
        evaluation,
    })
}
