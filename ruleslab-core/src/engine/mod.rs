//! Position-state simulation engine.
//!
//! The engine consumes an [`IndicatorFrame`](crate::indicators::IndicatorFrame)
//! (bars plus precomputed indicator columns) and a [`StrategyConfig`], then:
//!
//! 1. Derives the warm-up offset from the columns the config reads
//! 2. Runs one forward pass deciding entry / exit / carry per bar
//! 3. Leaves NAV derivation to a separate stateless pass ([`derive_nav`])

pub mod config;
pub mod nav;
pub mod simulator;
pub mod state;
pub mod warmup;

pub use config::{ExitRule, MomentumSource, StrategyConfig};
pub use nav::{derive_nav, NavMode, NavSeries};
pub use simulator::{
    simulate, AnnotatedSeries, SimulationDiagnostics, SimulationError, SimulationOutput,
};
pub use state::{OpenPosition, SimulationState};
pub use warmup::{required_columns, start_index};
