//! RulesLab Runner: backtest orchestration around `ruleslab-core`.
//!
//! This crate provides:
//! - TOML backtest configs with preset + override resolution
//! - Kline CSV loading, resampling and cleaning (plus synthetic bars)
//! - The named strategy variants
//! - Series and trade metrics with a composite score
//! - Parallel parameter sweeps
//! - CSV / JSON / Markdown artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod presets;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError, DataConfig, ReportConfig, ResolvedConfig, RunId};
pub use data_loader::{Frequency, LoadError, YearMonth};
pub use export::save_artifacts;
pub use metrics::{Grade, PerformanceReport, SeriesMetrics, TradeMetrics};
pub use presets::Preset;
pub use runner::{run_backtest, run_on_bars, BacktestResult, DataSummary, Evaluation, RunError};
pub use sweep::{sweep, ParamGrid, SweepPoint, SweepResults};
