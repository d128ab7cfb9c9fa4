//! Property tests for simulator invariants.
//!
//! Uses proptest to verify, over random price paths and signals:
//! 1. Position consistency: a flag changes the position, no flag carries it
//! 2. At most one position: no entry while long, no exit while flat
//! 3. Cooldown enforcement: no entry sooner than `cooldown_bars` after an exit
//! 4. Trade-list pairing: exits never outnumber entries, trail by at most one
//! 5. NAV non-negativity: compounding NAV stays >= 0 for returns >= -100%

use chrono::NaiveDate;
use proptest::prelude::*;
use ruleslab_core::domain::Bar;
use ruleslab_core::engine::{derive_nav, simulate, ExitRule, NavMode, StrategyConfig};
use ruleslab_core::indicators::{Column, IndicatorFrame};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_path() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (20usize..120).prop_flat_map(|n| {
        (
            prop::collection::vec(-0.08..0.08_f64, n),
            prop::collection::vec(-2.0..2.0_f64, n),
        )
    })
}

fn arb_config() -> impl Strategy<Value = StrategyConfig> {
    (
        0.5..4.0_f64,
        prop::option::of(0.5..4.0_f64),
        prop::option::of(2usize..30),
        0usize..10,
        -0.5..1.0_f64,
        0.02..0.3_f64,
    )
        .prop_map(|(k_init, k_trail, time_stop, cooldown, threshold, tp)| {
            let mut exit_rules = vec![ExitRule::Stop];
            if time_stop.is_some() {
                exit_rules.push(ExitRule::TimeStop);
            }
            exit_rules.push(ExitRule::SignalReversal { threshold: -1.0 });
            exit_rules.push(ExitRule::TakeProfit { pct: tp });
            StrategyConfig {
                k_init,
                k_trail,
                time_stop_bars: time_stop,
                cooldown_bars: cooldown,
                use_trend_filter: false,
                require_momentum: true,
                momentum_threshold: threshold,
                exit_rules,
                ..StrategyConfig::default()
            }
        })
}

fn frame_from(returns: &[f64], signal: &[f64]) -> IndicatorFrame {
    let base = NaiveDate::from_ymd_opt(2023, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut close = 100.0;
    let bars: Vec<Bar> = returns
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let open = close;
            close *= 1.0 + r;
            Bar {
                timestamp: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) * 1.01,
                low: open.min(close) * 0.99,
                close,
                volume: 1.0,
            }
        })
        .collect();
    let n = bars.len();
    let atr: Vec<f64> = bars.iter().map(|b| b.close * 0.02).collect();
    IndicatorFrame::new(bars)
        .with_column(Column::Atr, atr, 0)
        .unwrap()
        .with_column(Column::SignalStrength, signal[..n].to_vec(), 0)
        .unwrap()
}

proptest! {
    #[test]
    fn position_consistency_and_single_position(
        (returns, signal) in arb_path(),
        cfg in arb_config(),
    ) {
        let out = simulate(&frame_from(&returns, &signal), &cfg).unwrap();
        let s = &out.series;
        for i in 1..s.len() {
            let (prev, cur, flag) = (s.position[i - 1], s.position[i], s.flag[i]);
            match flag {
                1 => {
                    prop_assert_eq!(prev, 0.0, "entry while long at {}", i);
                    prop_assert_eq!(cur, 1.0);
                }
                -1 => {
                    prop_assert_eq!(prev, 1.0, "exit while flat at {}", i);
                    prop_assert_eq!(cur, 0.0);
                }
                0 => prop_assert_eq!(prev, cur, "position changed without flag at {}", i),
                other => prop_assert!(false, "unexpected flag {}", other),
            }
        }
        prop_assert_eq!(s.flag[0], 0);
        prop_assert_eq!(s.position[0], 0.0);
    }

    #[test]
    fn cooldown_is_enforced(
        (returns, signal) in arb_path(),
        cfg in arb_config(),
    ) {
        let out = simulate(&frame_from(&returns, &signal), &cfg).unwrap();
        let mut last_exit: Option<usize> = None;
        for (i, &flag) in out.series.flag.iter().enumerate() {
            if flag == -1 {
                last_exit = Some(i);
            }
            if flag == 1 {
                if let Some(exit) = last_exit {
                    prop_assert!(i - exit >= cfg.cooldown_bars, "entry at {} after exit at {}", i, exit);
                }
            }
        }
    }

    #[test]
    fn trade_lists_pair_up(
        (returns, signal) in arb_path(),
        cfg in arb_config(),
    ) {
        let out = simulate(&frame_from(&returns, &signal), &cfg).unwrap();
        let ledger = &out.trades;
        prop_assert!(ledger.exits.len() <= ledger.entries.len());
        prop_assert!(ledger.entries.len() - ledger.exits.len() <= 1);
        for (entry, exit) in ledger.entries.iter().zip(&ledger.exits) {
            prop_assert!(entry.bar_index < exit.bar_index);
        }
        let open_at_end = out.series.position.last() == Some(&1.0);
        prop_assert_eq!(ledger.open_entry().is_some(), open_at_end);
        prop_assert_eq!(ledger.paired().len(), ledger.exits.len());
    }

    #[test]
    fn compounding_nav_never_negative(
        returns in prop::collection::vec(-1.0..0.5_f64, 2..200),
        position in prop::collection::vec(prop::bool::ANY, 2..200),
    ) {
        let n = returns.len().min(position.len());
        let mut close = vec![100.0];
        for r in &returns[1..n] {
            let last = *close.last().unwrap();
            close.push(last * (1.0 + r));
        }
        let position: Vec<f64> = position[..n].iter().map(|&p| if p { 1.0 } else { 0.0 }).collect();
        let nav = derive_nav(&close, &position, NavMode::Compounding);
        prop_assert!(nav.nav.iter().all(|&v| v >= 0.0));
    }
}
