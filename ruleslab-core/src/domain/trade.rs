//! Trade records: half-records collected during the pass, paired afterwards.
//!
//! The simulator appends an [`EntryRecord`] when a position opens and an
//! [`ExitRecord`] when it closes. The two lists are only zipped into
//! [`TradeRecord`]s once the full pass completes, so a position still open at
//! the end of the series leaves exactly one unmatched entry.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    TimeStop,
    SignalReversal,
    TrendInvalidated,
}

impl ExitReason {
    pub const ALL: [ExitReason; 6] = [
        ExitReason::StopLoss,
        ExitReason::TakeProfit,
        ExitReason::TrailingStop,
        ExitReason::TimeStop,
        ExitReason::SignalReversal,
        ExitReason::TrendInvalidated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TimeStop => "time_stop",
            ExitReason::SignalReversal => "signal_reversal",
            ExitReason::TrendInvalidated => "trend_invalidated",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open half of a trade, written on the entry bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub bar_index: usize,
    pub time: NaiveDateTime,
    pub price: f64,
    /// ATR on the entry bar (sizes the initial and trailing stops).
    pub atr: f64,
    pub initial_stop: f64,
    /// Momentum reading on the entry bar, when a momentum column is loaded.
    pub signal: Option<f64>,
}

/// Close half of a trade, written on the exit bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitRecord {
    pub bar_index: usize,
    pub time: NaiveDateTime,
    pub price: f64,
    pub reason: ExitReason,
    /// Effective stop level on the exit bar: max(initial, trailing).
    pub stop_price: f64,
}

/// A completed round-trip long trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_bar: usize,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub bars_held: usize,
}

impl TradeRecord {
    pub fn from_halves(entry: &EntryRecord, exit: &ExitRecord) -> Self {
        Self {
            entry_bar: entry.bar_index,
            entry_time: entry.time,
            entry_price: entry.price,
            exit_bar: exit.bar_index,
            exit_time: exit.time,
            exit_price: exit.price,
            exit_reason: exit.reason,
            bars_held: exit.bar_index.saturating_sub(entry.bar_index),
        }
    }

    /// (exit_price - entry_price) / entry_price
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        (self.exit_price - self.entry_price) / self.entry_price
    }

    pub fn pnl(&self) -> f64 {
        self.exit_price - self.entry_price
    }

    pub fn is_winner(&self) -> bool {
        self.pnl() > 0.0
    }

    pub fn holding_duration(&self) -> Duration {
        self.exit_time - self.entry_time
    }

    pub fn holding_hours(&self) -> f64 {
        self.holding_duration().num_seconds() as f64 / 3600.0
    }
}

/// The buy-side and sell-side lists produced by one simulation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeLedger {
    pub entries: Vec<EntryRecord>,
    pub exits: Vec<ExitRecord>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_entry(&mut self, entry: EntryRecord) {
        debug_assert_eq!(
            self.entries.len(),
            self.exits.len(),
            "entry recorded while a trade is still open"
        );
        self.entries.push(entry);
    }

    pub fn record_exit(&mut self, exit: ExitRecord) {
        debug_assert_eq!(
            self.entries.len(),
            self.exits.len() + 1,
            "exit recorded without an open trade"
        );
        self.exits.push(exit);
    }

    /// Entries minus exits; always 0 or 1.
    pub fn unmatched(&self) -> usize {
        self.entries.len().saturating_sub(self.exits.len())
    }

    /// The entry of the position still open at the end of the series.
    pub fn open_entry(&self) -> Option<&EntryRecord> {
        if self.unmatched() == 1 {
            self.entries.last()
        } else {
            None
        }
    }

    /// Completed trades, ordered by entry time ascending.
    pub fn paired(&self) -> Vec<TradeRecord> {
        let mut trades: Vec<TradeRecord> = self
            .entries
            .iter()
            .zip(self.exits.iter())
            .map(|(entry, exit)| TradeRecord::from_halves(entry, exit))
            .collect();
        trades.sort_by_key(|t| t.entry_time);
        trades
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(hour as i64)
    }

    fn entry(bar: usize, price: f64) -> EntryRecord {
        EntryRecord {
            bar_index: bar,
            time: ts(bar as u32),
            price,
            atr: 5.0,
            initial_stop: price - 10.0,
            signal: Some(0.8),
        }
    }

    fn exit(bar: usize, price: f64, reason: ExitReason) -> ExitRecord {
        ExitRecord {
            bar_index: bar,
            time: ts(bar as u32),
            price,
            reason,
            stop_price: 120.0,
        }
    }

    #[test]
    fn return_pct_calculation() {
        let trade = TradeRecord::from_halves(&entry(10, 130.0), &exit(12, 115.0, ExitReason::StopLoss));
        assert!((trade.return_pct() - (115.0 - 130.0) / 130.0).abs() < 1e-12);
        assert!(!trade.is_winner());
        assert_eq!(trade.bars_held, 2);
        assert!((trade.holding_hours() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ledger_pairs_in_entry_order() {
        let mut ledger = TradeLedger::new();
        ledger.record_entry(entry(3, 100.0));
        ledger.record_exit(exit(5, 104.0, ExitReason::TimeStop));
        ledger.record_entry(entry(8, 101.0));
        ledger.record_exit(exit(9, 99.0, ExitReason::TrendInvalidated));

        let trades = ledger.paired();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].entry_bar, 3);
        assert_eq!(trades[1].exit_reason, ExitReason::TrendInvalidated);
        assert!(ledger.open_entry().is_none());
    }

    #[test]
    fn ledger_keeps_final_open_entry_unmatched() {
        let mut ledger = TradeLedger::new();
        ledger.record_entry(entry(3, 100.0));
        ledger.record_exit(exit(5, 104.0, ExitReason::StopLoss));
        ledger.record_entry(entry(7, 102.0));

        assert_eq!(ledger.unmatched(), 1);
        assert_eq!(ledger.paired().len(), 1);
        assert_eq!(ledger.open_entry().map(|e| e.bar_index), Some(7));
    }

    #[test]
    fn exit_reason_serializes_snake_case() {
        let json = serde_json::to_string(&ExitReason::TrailingStop).unwrap();
        assert_eq!(json, "\"trailing_stop\"");
        assert_eq!(ExitReason::TrendInvalidated.to_string(), "trend_invalidated");
    }
}
