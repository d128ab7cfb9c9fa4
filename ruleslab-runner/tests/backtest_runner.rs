use std::fs;

use ruleslab_core::engine::NavMode;
use ruleslab_runner::data_loader::synthetic_bars;
use ruleslab_runner::presets;
use ruleslab_runner::sweep::{sweep, ParamGrid};
use ruleslab_runner::{run_backtest, run_on_bars, save_artifacts, BacktestConfig, BacktestResult};

fn synthetic(preset: &str, n: usize, seed: u64) -> BacktestResult {
    let mut cfg = BacktestConfig::for_preset(preset);
    cfg.data.synthetic = Some(n);
    cfg.data.seed = seed;
    run_backtest(&cfg).unwrap()
}

fn assert_consistent(result: &BacktestResult) {
    let s = &result.evaluation.series;
    let start = result.evaluation.diagnostics.warmup_bars;

    // Nothing before the warm-up offset is touched.
    assert!(s.position[..start].iter().all(|&p| p == 0.0));
    assert!(s.flag[..start].iter().all(|&f| f == 0));

    for i in start.max(1)..s.len() {
        let p = s.position[i];
        assert!(p == 0.0 || p == 1.0);
        let expected = match s.flag[i] {
            1 => 1.0,
            -1 => 0.0,
            _ => s.position[i - 1],
        };
        assert_eq!(p, expected, "bar {i}");
    }

    let entries = s.flag.iter().filter(|&&f| f == 1).count();
    let exits = s.flag.iter().filter(|&&f| f == -1).count();
    assert_eq!(result.evaluation.trades.len(), exits);
    assert_eq!(
        entries,
        exits + usize::from(result.evaluation.open_trade.is_some())
    );
    for t in &result.evaluation.trades {
        assert!(t.exit_bar > t.entry_bar);
        assert!(t.exit_time > t.entry_time);
    }
}

#[test]
fn every_preset_runs_on_synthetic_data() {
    for name in presets::NAMES {
        let result = synthetic(name, 3_000, 5);
        assert!(result.is_synthetic(), "{name}");
        assert_eq!(result.config.preset.as_deref(), Some(name));
        assert_consistent(&result);

        let score = result.evaluation.report.score;
        assert!((0.0..=100.0).contains(&score), "{name}: score {score}");
    }
}

#[test]
fn compounding_nav_never_negative() {
    let result = synthetic("trend_relaxed", 3_000, 9);
    assert_eq!(result.config.strategy.nav_mode, NavMode::Compounding);
    assert!(result.evaluation.nav.nav.iter().all(|&v| v >= 0.0));
    assert_eq!(result.evaluation.nav.nav[0], 1.0);
}

#[test]
fn run_id_tracks_config_not_data() {
    let a = synthetic("signal_atr", 1_500, 1);
    let b = synthetic("signal_atr", 1_500, 1);
    let c = synthetic("trend_relaxed", 1_500, 1);
    assert_eq!(a.run_id, b.run_id);
    assert_ne!(a.run_id, c.run_id);
    assert_eq!(a.data.dataset_hash, c.data.dataset_hash);
}

#[test]
fn artifacts_written() {
    let result = synthetic("trend_relaxed", 2_000, 4);
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("run");
    let paths = save_artifacts(&out, &result).unwrap();

    let series = fs::read_to_string(&paths.series).unwrap();
    let mut lines = series.lines();
    assert_eq!(
        lines.next(),
        Some("timestamp,close,position,flag,ret,nav,benchmark")
    );
    assert_eq!(lines.count(), 2_000);

    let trades = fs::read_to_string(&paths.trades).unwrap();
    assert!(trades.starts_with("entry_bar,entry_time,entry_price"));
    assert_eq!(trades.lines().count(), result.evaluation.trades.len() + 1);

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&paths.summary).unwrap()).unwrap();
    assert_eq!(summary["run_id"], result.run_id.as_str());
    assert_eq!(summary["synthetic"], true);
    assert_eq!(summary["config"]["strategy"]["cooldown_bars"], 6);
    assert!(summary["report"]["series"]["sharpe"].is_number());

    let report = fs::read_to_string(&paths.report).unwrap();
    assert!(report.contains("Synthetic data"));
    assert!(report.contains(&result.run_id));
    assert!(report.contains("## Exit reasons"));
}

#[test]
fn sweep_parallel_matches_sequential() {
    let bars = synthetic_bars(2_500, 21);
    let resolved = BacktestConfig::for_preset("trend_relaxed")
        .resolve_params()
        .unwrap();
    let grid = ParamGrid {
        k_init: vec![1.5, 2.5],
        k_trail: vec![None, Some(2.5)],
        cooldown_bars: vec![0, 12],
        adx_min: Vec::new(),
    };

    let par = sweep(bars.clone(), &resolved, &grid, true).unwrap();
    let seq = sweep(bars, &resolved, &grid, false).unwrap();

    assert_eq!(par.len(), grid.size());
    assert!(par.failures().is_empty());
    for (a, b) in par.points().iter().zip(seq.points()) {
        assert_eq!(a.strategy, b.strategy);
        assert_eq!(a.report.series, b.report.series);
        assert_eq!(a.report.trades.trade_count, b.report.trades.trade_count);
    }

    let sharpes: Vec<f64> = par.points().iter().map(|p| p.report.series.sharpe).collect();
    assert!(sharpes.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(par.top_n(3).len(), 3);
    assert_eq!(
        par.best().map(|p| &p.strategy),
        par.points().first().map(|p| &p.strategy)
    );
}

#[test]
fn sweep_point_matches_single_run() {
    let bars = synthetic_bars(2_000, 8);
    let cfg = BacktestConfig::for_preset("trend_relaxed");
    let resolved = cfg.resolve_params().unwrap();
    let grid = ParamGrid {
        k_init: vec![resolved.strategy.k_init],
        ..ParamGrid::default()
    };

    let swept = sweep(bars.clone(), &resolved, &grid, false).unwrap();
    let single = run_on_bars(bars, &cfg).unwrap();
    assert_eq!(swept.points()[0].strategy, resolved.strategy);
    assert_eq!(
        swept.points()[0].report.trades.trade_count,
        single.evaluation.report.trades.trade_count
    );
    assert_eq!(
        swept.points()[0].report.series.total_return,
        single.evaluation.report.series.total_return
    );
}

#[test]
fn sweep_reports_rejected_points() {
    let bars = synthetic_bars(1_000, 2);
    let resolved = BacktestConfig::for_preset("signal_atr")
        .resolve_params()
        .unwrap();
    let grid = ParamGrid {
        k_init: vec![2.0, -1.0],
        ..ParamGrid::default()
    };
    let results = sweep(bars, &resolved, &grid, true).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results.failures().len(), 1);
    assert_eq!(results.failures()[0].0.k_init, -1.0);
}
