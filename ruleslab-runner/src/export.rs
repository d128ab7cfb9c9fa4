//! Artifact export: per-bar series CSV, trade CSV, JSON summary and a
//! Markdown report.
//!
//! `save_artifacts` writes all four into one directory:
//!
//! | file           | contents                                                  |
//! |----------------|-----------------------------------------------------------|
//! | `series.csv`   | timestamp, close, position, flag, ret, nav, benchmark     |
//! | `trades.csv`   | one row per completed round trip                          |
//! | `summary.json` | run id, resolved config, data provenance, metrics         |
//! | `report.md`    | human-readable version of the summary                     |

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use ruleslab_core::domain::{EntryRecord, TradeRecord};
use ruleslab_core::engine::SimulationDiagnostics;

use crate::config::ResolvedConfig;
use crate::metrics::PerformanceReport;
use crate::runner::{BacktestResult, DataSummary};

pub const SCHEMA_VERSION: u32 = 1;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── CSV ────────────────────────────────────────────────────────────

pub fn export_series_csv(result: &BacktestResult) -> Result<String> {
    let series = &result.evaluation.series;
    let nav = &result.evaluation.nav;
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["timestamp", "close", "position", "flag", "ret", "nav", "benchmark"])?;
    for i in 0..series.len() {
        wtr.write_record([
            series.timestamps[i].format(TIME_FORMAT).to_string(),
            format!("{:.8}", series.close[i]),
            format!("{}", series.position[i]),
            series.flag[i].to_string(),
            format!("{:.10}", nav.ret[i]),
            format!("{:.10}", nav.nav[i]),
            format!("{:.10}", nav.benchmark[i]),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush series CSV")?;
    String::from_utf8(bytes).context("series CSV is not UTF-8")
}

pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "exit_reason",
        "bars_held",
        "holding_hours",
        "return_pct",
    ])?;
    for t in trades {
        wtr.write_record([
            t.entry_bar.to_string(),
            t.entry_time.format(TIME_FORMAT).to_string(),
            format!("{:.8}", t.entry_price),
            t.exit_bar.to_string(),
            t.exit_time.format(TIME_FORMAT).to_string(),
            format!("{:.8}", t.exit_price),
            t.exit_reason.as_str().to_string(),
            t.bars_held.to_string(),
            format!("{:.2}", t.holding_hours()),
            format!("{:.6}", t.return_pct()),
        ])?;
    }

    let bytes = wtr.into_inner().context("failed to flush trades CSV")?;
    String::from_utf8(bytes).context("trades CSV is not UTF-8")
}

// ─── JSON ───────────────────────────────────────────────────────────

/// Everything in a result except the per-bar columns.
#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub schema_version: u32,
    pub run_id: &'a str,
    pub synthetic: bool,
    pub config: &'a ResolvedConfig,
    pub data: &'a DataSummary,
    pub diagnostics: &'a SimulationDiagnostics,
    pub open_trade: Option<&'a EntryRecord>,
    pub report: &'a PerformanceReport,
}

impl<'a> Summary<'a> {
    pub fn new(result: &'a BacktestResult) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_id: &result.run_id,
            synthetic: result.is_synthetic(),
            config: &result.config,
            data: &result.data,
            diagnostics: &result.evaluation.diagnostics,
            open_trade: result.evaluation.open_trade.as_ref(),
            report: &result.evaluation.report,
        }
    }
}

pub fn export_summary_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(&Summary::new(result)).context("failed to serialize summary")
}

// ─── Markdown ───────────────────────────────────────────────────────

fn pct(v: f64) -> String {
    if v.is_finite() {
        format!("{:.2}%", v * 100.0)
    } else {
        "n/a".to_string()
    }
}

fn num(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.2}")
    } else {
        "n/a".to_string()
    }
}

pub fn render_markdown(result: &BacktestResult) -> String {
    let r = &result.evaluation.report;
    let s = &r.series;
    let t = &r.trades;
    let d = &result.evaluation.diagnostics;
    let mut md = String::new();

    let name = result.config.preset.as_deref().unwrap_or("custom");
    let _ = writeln!(md, "# Backtest report: {name}\n");
    if result.is_synthetic() {
        let _ = writeln!(md, "> **Synthetic data.** These numbers say nothing about any market.\n");
    }
    let _ = writeln!(md, "- Run id: `{}`", result.run_id);
    let _ = writeln!(md, "- Dataset hash: `{}`", result.data.dataset_hash);
    if let (Some(first), Some(last)) = (result.data.first, result.data.last) {
        let _ = writeln!(md, "- Period: {first} to {last} ({} bars)", result.data.bars);
    }
    let _ = writeln!(
        md,
        "- Warm-up bars: {}, degenerate bars: {}",
        d.warmup_bars, d.degenerate_bars
    );
    let _ = writeln!(md, "- NAV mode: {}\n", result.config.strategy.nav_mode.as_str());

    md.push_str("## Performance\n\n| metric | value |\n|---|---|\n");
    let benchmark = result.evaluation.nav.benchmark.last().copied().unwrap_or(1.0) - 1.0;
    let rows = [
        ("Total return", pct(s.total_return)),
        ("Buy & hold", pct(benchmark)),
        ("Annual return", pct(s.annual_return)),
        ("Annual volatility", pct(s.annual_volatility)),
        ("Sharpe", num(s.sharpe)),
        ("Max drawdown", pct(s.max_drawdown)),
        ("Calmar", num(s.calmar)),
        ("Exposure", pct(s.exposure)),
    ];
    for (k, v) in rows {
        let _ = writeln!(md, "| {k} | {v} |");
    }

    md.push_str("\n## Trades\n\n| metric | value |\n|---|---|\n");
    let rows = [
        ("Trades", t.trade_count.to_string()),
        ("Win rate", pct(t.win_rate)),
        ("Average return", pct(t.avg_return)),
        ("Average win", pct(t.avg_win)),
        ("Average loss", pct(t.avg_loss)),
        (
            "Profit/loss ratio",
            t.profit_loss_ratio.map_or_else(|| "n/a".to_string(), num),
        ),
        ("Best trade", pct(t.best_trade)),
        ("Worst trade", pct(t.worst_trade)),
        ("Average holding (h)", num(t.avg_holding_hours)),
        ("Max consecutive wins", t.max_consecutive_wins.to_string()),
        ("Max consecutive losses", t.max_consecutive_losses.to_string()),
        (
            "Trades per week",
            t.trades_per_week.map_or_else(|| "n/a".to_string(), num),
        ),
    ];
    for (k, v) in rows {
        let _ = writeln!(md, "| {k} | {v} |");
    }
    if let Some(open) = &result.evaluation.open_trade {
        let _ = writeln!(
            md,
            "\nPosition still open at the last bar (entered {} at {:.2}).",
            open.time, open.price
        );
    }

    md.push_str("\n## Holding time\n\n| bucket | share |\n|---|---|\n");
    let _ = writeln!(md, "| <= 24h | {} |", pct(t.short_share));
    let _ = writeln!(md, "| 24h .. 168h | {} |", pct(t.medium_share));
    let _ = writeln!(md, "| > 168h | {} |", pct(t.long_share));

    md.push_str("\n## Return distribution\n\n| bucket | trades |\n|---|---|\n");
    for (bucket, count) in t.distribution.rows() {
        let _ = writeln!(md, "| {bucket} | {count} |");
    }

    md.push_str("\n## Exit reasons\n\n| reason | trades |\n|---|---|\n");
    for (reason, count) in &t.exit_reasons {
        let _ = writeln!(md, "| {reason} | {count} |");
    }

    let _ = writeln!(
        md,
        "\n## Score\n\n{:.1} / 100 ({})",
        r.score,
        r.grade.as_str()
    );
    md
}

// ─── Files ──────────────────────────────────────────────────────────

/// Paths written by [`save_artifacts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub series: PathBuf,
    pub trades: PathBuf,
    pub summary: PathBuf,
    pub report: PathBuf,
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

pub fn save_artifacts(dir: &Path, result: &BacktestResult) -> Result<ArtifactPaths> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let paths = ArtifactPaths {
        series: dir.join("series.csv"),
        trades: dir.join("trades.csv"),
        summary: dir.join("summary.json"),
        report: dir.join("report.md"),
    };
    write(&paths.series, &export_series_csv(result)?)?;
    write(&paths.trades, &export_trades_csv(&result.evaluation.trades)?)?;
    write(&paths.summary, &export_summary_json(result)?)?;
    write(&paths.report, &render_markdown(result))?;

    tracing::info!(dir = %dir.display(), "artifacts written");
    Ok(paths)
}
