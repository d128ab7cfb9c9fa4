//! RulesLab CLI: run and sweep rule-based crypto backtests.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file or named preset
//! - `sweep`: grid-search stop, cooldown and ADX parameters around a config
//! - `presets`: list the built-in strategy variants

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ruleslab_runner::data_loader::{Frequency, YearMonth};
use ruleslab_runner::runner::load_bars;
use ruleslab_runner::sweep::{sweep, ParamGrid, SweepResults};
use ruleslab_runner::{presets, run_backtest, save_artifacts, BacktestConfig, BacktestResult};

#[derive(Parser)]
#[command(
    name = "ruleslab",
    version,
    about = "RulesLab CLI: rule-based crypto backtesting"
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file or named preset.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Output directory for artifacts. Defaults to results/<run id>.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Sweep a parameter grid around a config or preset.
    Sweep {
        #[command(flatten)]
        source: SourceArgs,

        /// Initial stop ATR multiples, e.g. 1.5,2,2.5.
        #[arg(long, value_delimiter = ',')]
        k_init: Vec<f64>,

        /// Trailing stop ATR multiples; `none` disables trailing, e.g. none,2.5,3.
        #[arg(long, value_delimiter = ',')]
        k_trail: Vec<String>,

        /// Cooldown bars after an exit, e.g. 0,6,24.
        #[arg(long, value_delimiter = ',')]
        cooldown: Vec<usize>,

        /// Minimum ADX, e.g. 10,15,20.
        #[arg(long, value_delimiter = ',')]
        adx_min: Vec<f64>,

        /// Run grid points one at a time instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Write sweep.json here.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// List the built-in strategy presets.
    Presets,
}

/// Where the config and bars come from. Flags override the config file.
#[derive(Args)]
struct SourceArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Named preset: signal_atr, trend_breakout, trend_relaxed (or V1/V2/V3).
    #[arg(long)]
    preset: Option<String>,

    /// Directory of `{SYMBOL}-{interval}-{YYYY-MM}.csv` kline files.
    #[arg(long)]
    data: Option<PathBuf>,

    #[arg(long)]
    symbol: Option<String>,

    /// Interval of the raw files (part of their names), e.g. 1m.
    #[arg(long)]
    interval: Option<String>,

    /// First month, YYYY-MM.
    #[arg(long)]
    start: Option<YearMonth>,

    /// Last month, YYYY-MM.
    #[arg(long)]
    end: Option<YearMonth>,

    /// Resampling frequency, e.g. 15min, 1h, 4h, 1d.
    #[arg(long)]
    freq: Option<Frequency>,

    /// Use N synthetic hourly bars instead of files.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for synthetic bars.
    #[arg(long)]
    seed: Option<u64>,
}

impl SourceArgs {
    fn into_config(self) -> Result<BacktestConfig> {
        let mut cfg = match (self.config, self.preset) {
            (Some(_), Some(_)) => bail!("--config and --preset are mutually exclusive"),
            (None, None) => bail!("one of --config or --preset is required"),
            (Some(path), None) => BacktestConfig::from_toml_file(&path)
                .with_context(|| format!("loading config {}", path.display()))?,
            (None, Some(name)) => {
                if presets::preset(&name).is_none() {
                    bail!(
                        "unknown preset '{name}'. Valid: {}",
                        presets::NAMES.join(", ")
                    );
                }
                BacktestConfig::for_preset(&name)
            }
        };

        let data = &mut cfg.data;
        if let Some(dir) = self.data {
            data.dir = Some(dir);
        }
        if let Some(symbol) = self.symbol {
            data.symbol = symbol;
        }
        if let Some(interval) = self.interval {
            data.interval = interval;
        }
        if self.start.is_some() {
            data.start = self.start;
        }
        if self.end.is_some() {
            data.end = self.end;
        }
        if let Some(freq) = self.freq {
            data.freq = freq;
        }
        if self.synthetic.is_some() {
            data.synthetic = self.synthetic;
        }
        if let Some(seed) = self.seed {
            data.seed = seed;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { source, output_dir } => run_cmd(source, output_dir),
        Commands::Sweep {
            source,
            k_init,
            k_trail,
            cooldown,
            adx_min,
            sequential,
            top,
            output_dir,
        } => {
            let grid = ParamGrid {
                k_init,
                k_trail: parse_k_trail(&k_trail)?,
                cooldown_bars: cooldown,
                adx_min,
            };
            sweep_cmd(source, grid, !sequential, top, output_dir)
        }
        Commands::Presets => {
            print_presets();
            Ok(())
        }
    }
}

fn run_cmd(source: SourceArgs, output_dir: Option<PathBuf>) -> Result<()> {
    let config = source.into_config()?;
    let result = run_backtest(&config)?;

    print_summary(&result);

    let dir = output_dir
        .or_else(|| config.report.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("results").join(&result.run_id[..12]));
    let paths = save_artifacts(&dir, &result)?;
    println!("Artifacts saved to: {}", dir.display());
    println!("Report:             {}", paths.report.display());
    Ok(())
}

fn parse_k_trail(values: &[String]) -> Result<Vec<Option<f64>>> {
    values
        .iter()
        .map(|v| match v.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(None),
            s => s
                .parse::<f64>()
                .map(Some)
                .with_context(|| format!("invalid --k-trail value '{v}'")),
        })
        .collect()
}

fn sweep_cmd(
    source: SourceArgs,
    grid: ParamGrid,
    parallel: bool,
    top: usize,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = source.into_config()?;
    let resolved = config.resolve()?;
    let (bars, data) = load_bars(&resolved.data)?;

    println!(
        "Sweeping {} configurations over {} bars{}",
        grid.size(),
        data.bars,
        if data.is_synthetic() { " (SYNTHETIC)" } else { "" }
    );
    let results = sweep(bars, &resolved, &grid, parallel)?;
    print_sweep(&results, top);

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join("sweep.json");
        let json = serde_json::to_string_pretty(results.points())
            .context("failed to serialize sweep results")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Sweep results saved to: {}", path.display());
    }
    Ok(())
}

fn print_presets() {
    println!("{:<16} {:<4} description", "name", "");
    for p in presets::all() {
        println!("{:<16} {:<4} {}", p.name, p.label, p.description);
    }
}

fn print_summary(result: &BacktestResult) {
    let r = &result.evaluation.report;
    let d = &result.evaluation.diagnostics;
    println!();
    println!("=== Backtest Result ===");
    println!(
        "Strategy:       {}",
        result.config.preset.as_deref().unwrap_or("custom")
    );
    println!("Run id:         {}", &result.run_id[..12]);
    if let (Some(first), Some(last)) = (result.data.first, result.data.last) {
        println!("Period:         {first} to {last}");
    }
    println!(
        "Bars:           {} ({} warmup, {} degenerate)",
        result.data.bars, d.warmup_bars, d.degenerate_bars
    );
    println!("Trades:         {}", r.trades.trade_count);
    if result.evaluation.open_trade.is_some() {
        println!("Open position:  yes");
    }
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", r.series.total_return * 100.0);
    println!("Annual Return:  {:.2}%", r.series.annual_return * 100.0);
    println!("Volatility:     {:.2}%", r.series.annual_volatility * 100.0);
    println!("Sharpe:         {:.3}", r.series.sharpe);
    println!("Calmar:         {:.3}", r.series.calmar);
    println!("Max Drawdown:   {:.2}%", r.series.max_drawdown * 100.0);
    println!("Exposure:       {:.1}%", r.series.exposure * 100.0);
    println!("Win Rate:       {:.1}%", r.trades.win_rate * 100.0);
    if let Some(ratio) = r.trades.profit_loss_ratio {
        println!("P/L Ratio:      {ratio:.2}");
    }
    println!("Max Consec Win: {}", r.trades.max_consecutive_wins);
    println!("Max Consec Loss:{}", r.trades.max_consecutive_losses);
    println!("Score:          {:.1} ({})", r.score, r.grade.as_str());
    if result.is_synthetic() {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}

fn print_sweep(results: &SweepResults, top: usize) {
    println!();
    println!(
        "{:>6} {:>8} {:>7} {:>7} {:>8} {:>9} {:>8} {:>7}",
        "k_init", "k_trail", "cool", "adx", "sharpe", "return", "max_dd", "trades"
    );
    for p in results.top_n(top) {
        let s = &p.strategy;
        let k_trail = s.k_trail.map_or_else(|| "none".to_string(), |k| format!("{k:.2}"));
        println!(
            "{:>6.2} {:>8} {:>7} {:>7.1} {:>8.3} {:>8.2}% {:>7.2}% {:>7}",
            s.k_init,
            k_trail,
            s.cooldown_bars,
            s.adx_min,
            p.report.series.sharpe,
            p.report.series.total_return * 100.0,
            p.report.series.max_drawdown * 100.0,
            p.report.trades.trade_count
        );
    }
    if !results.failures().is_empty() {
        println!();
        for (strategy, err) in results.failures() {
            println!(
                "rejected k_init={} k_trail={:?}: {err}",
                strategy.k_init, strategy.k_trail
            );
        }
    }
}
