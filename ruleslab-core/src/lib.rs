//! RulesLab Core: domain types, indicators, position-state simulator, NAV.
//!
//! This crate contains the deterministic heart of a rule-based backtest:
//! - Domain types (bars, exit reasons, the two-list trade ledger)
//! - Indicator computation into an [`indicators::IndicatorFrame`]
//! - A single-pass long-only simulator driven by one configuration surface
//! - Additive or compounding NAV derivation
//!
//! Everything here is a pure function of its inputs. No I/O.

pub mod domain;
pub mod engine;
pub mod indicators;

pub use domain::{Bar, EntryRecord, ExitReason, ExitRecord, TradeLedger, TradeRecord};
pub use engine::{
    derive_nav, simulate, AnnotatedSeries, ExitRule, MomentumSource, NavMode, NavSeries,
    SimulationDiagnostics, SimulationError, SimulationOutput, StrategyConfig,
};
pub use indicators::{Column, IndicatorError, IndicatorFrame, IndicatorParams};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: every type a parallel sweep moves across threads
    /// is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::TradeRecord>();
        require_sync::<domain::TradeRecord>();
        require_send::<domain::TradeLedger>();
        require_sync::<domain::TradeLedger>();

        // Indicator types
        require_send::<indicators::IndicatorFrame>();
        require_sync::<indicators::IndicatorFrame>();
        require_send::<indicators::IndicatorParams>();
        require_sync::<indicators::IndicatorParams>();

        // Engine types
        require_send::<engine::StrategyConfig>();
        require_sync::<engine::StrategyConfig>();
        require_send::<engine::SimulationOutput>();
        require_sync::<engine::SimulationOutput>();
        require_send::<engine::NavSeries>();
        require_sync::<engine::NavSeries>();
        require_send::<engine::SimulationError>();
        require_sync::<engine::SimulationError>();
    }
}
