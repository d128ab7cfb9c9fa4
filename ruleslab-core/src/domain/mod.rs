//! Domain types for RulesLab

pub mod bar;
pub mod trade;

pub use bar::Bar;
pub use trade::{EntryRecord, ExitReason, ExitRecord, TradeLedger, TradeRecord};
