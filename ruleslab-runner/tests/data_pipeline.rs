use std::fs;
use std::path::Path;

use ruleslab_runner::data_loader::{self, Frequency, LoadError, YearMonth};
use ruleslab_runner::runner::DataSource;
use ruleslab_runner::{run_backtest, BacktestConfig};

const MS_2023_01: i64 = 1_672_531_200_000;
const MS_2023_03: i64 = 1_677_628_800_000;

/// Write a kline file of `rows` bars spaced `step_ms` apart. Timestamps are
/// multiplied by `unit_scale` to exercise epoch unit detection.
fn write_month(dir: &Path, month: &str, start_ms: i64, step_ms: i64, rows: usize, unit_scale: i64) {
    let mut body = String::new();
    for i in 0..rows {
        let t = start_ms + i as i64 * step_ms;
        let c = 20_000.0 + (i as f64 * 0.05).sin() * 400.0 + i as f64 * 0.8;
        let o = c - 3.0;
        body.push_str(&format!(
            "{},{o:.2},{:.2},{:.2},{c:.2},{:.3},{},{:.2},42,1.0,2.0,0\n",
            t * unit_scale,
            c + 10.0,
            o - 10.0,
            1.5 + (i % 7) as f64,
            (t + step_ms - 1) * unit_scale,
            c * 1.5,
        ));
    }
    fs::write(dir.join(format!("BTCUSDT-15m-{month}.csv")), body).unwrap();
}

#[test]
fn load_months_skips_missing_and_normalises_units() {
    let tmp = tempfile::tempdir().unwrap();
    // January in milliseconds, March in microseconds, February absent.
    write_month(tmp.path(), "2023-01", MS_2023_01, 900_000, 8, 1);
    write_month(tmp.path(), "2023-03", MS_2023_03, 900_000, 4, 1_000);

    let loaded = data_loader::load_months(
        tmp.path(),
        "BTCUSDT",
        "15m",
        "2023-01".parse().unwrap(),
        "2023-03".parse().unwrap(),
    )
    .unwrap();

    assert_eq!(loaded.bars.len(), 12);
    assert_eq!(loaded.files.len(), 2);
    assert_eq!(loaded.missing_months, vec![YearMonth::new(2023, 2).unwrap()]);
    assert_eq!(
        loaded.bars[0].timestamp.to_string(),
        "2023-01-01 00:00:00"
    );
    assert_eq!(
        loaded.bars[8].timestamp.to_string(),
        "2023-03-01 00:00:00"
    );
    assert!(loaded.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn header_row_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("BTCUSDT-1h-2023-01.csv");
    fs::write(
        &path,
        "open_time,open,high,low,close,volume,close_time,quote_volume,count,tbv,tbqv,ignore\n\
         1672531200000,100,110,95,105,3,1672534799999,0,1,0,0,0\n\
         1672534800000,105,108,101,102,4,1672538399999,0,1,0,0,0\n",
    )
    .unwrap();

    let bars = data_loader::read_kline_csv(&path).unwrap();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[1].close, 102.0);
    assert_eq!(bars[1].volume, 4.0);
}

#[test]
fn malformed_price_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("bad.csv");
    fs::write(&path, "1672531200000,100,110,95,abc,3\n").unwrap();

    let err = data_loader::read_kline_csv(&path).unwrap_err();
    assert!(matches!(err, LoadError::Malformed { row: 0, .. }), "{err}");
}

#[test]
fn no_files_is_no_data() {
    let tmp = tempfile::tempdir().unwrap();
    let err = data_loader::load_months(
        tmp.path(),
        "BTCUSDT",
        "15m",
        "2023-01".parse().unwrap(),
        "2023-02".parse().unwrap(),
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::NoData { .. }));
}

#[test]
fn fifteen_minute_bars_resample_to_hourly() {
    let tmp = tempfile::tempdir().unwrap();
    write_month(tmp.path(), "2023-01", MS_2023_01, 900_000, 16, 1);
    let month: YearMonth = "2023-01".parse().unwrap();
    let loaded = data_loader::load_months(tmp.path(), "BTCUSDT", "15m", month, month).unwrap();

    let hourly = data_loader::resample(&loaded.bars, Frequency::hourly());
    assert_eq!(hourly.len(), 4);
    let first_four = &loaded.bars[..4];
    assert_eq!(hourly[0].open, first_four[0].open);
    assert_eq!(hourly[0].close, first_four[3].close);
    assert_eq!(
        hourly[0].high,
        first_four.iter().map(|b| b.high).fold(f64::MIN, f64::max)
    );
    let vol: f64 = first_four.iter().map(|b| b.volume).sum();
    assert!((hourly[0].volume - vol).abs() < 1e-9);
}

#[test]
fn config_driven_backtest_over_files() {
    let tmp = tempfile::tempdir().unwrap();
    // 31 days of 15-minute bars: 744 hourly bars after resampling.
    write_month(tmp.path(), "2023-01", MS_2023_01, 900_000, 31 * 96, 1);

    let toml = format!(
        r#"
        [data]
        dir = "{}"
        symbol = "BTCUSDT"
        interval = "15m"
        start = "2023-01"
        end = "2023-02"
        freq = "1h"

        [strategy]
        preset = "trend_relaxed"
        "#,
        tmp.path().display().to_string().replace('\\', "/")
    );
    let cfg = BacktestConfig::from_toml_str(&toml).unwrap();
    let result = run_backtest(&cfg).unwrap();

    assert!(!result.is_synthetic());
    assert_eq!(result.data.raw_bars, 31 * 96);
    assert_eq!(result.data.bars, 744);
    match &result.data.source {
        DataSource::Files {
            files,
            missing_months,
        } => {
            assert_eq!(files.len(), 1);
            assert_eq!(missing_months.len(), 1);
        }
        other => panic!("unexpected source {other:?}"),
    }
    assert_eq!(result.evaluation.series.len(), 744);
    // trend_relaxed warm-up: slow SMA 200 + padding 5
    assert_eq!(result.evaluation.diagnostics.warmup_bars, 205);
}
