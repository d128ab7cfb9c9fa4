//! Serializable backtest configuration.
//!
//! A config file has four sections:
//!
//! ```toml
//! [data]
//! dir = "data/spot/monthly/klines/BTCUSDT/1m"
//! symbol = "BTCUSDT"
//! interval = "1m"
//! start = "2023-01"
//! end = "2023-12"
//! freq = "1h"
//!
//! [indicators]
//! sma_slow = 150
//!
//! [strategy]
//! preset = "trend_relaxed"
//! cooldown_bars = 12
//!
//! [report]
//! risk_free_rate = 0.02
//! ```
//!
//! `[indicators]` and `[strategy]` are override tables: fields given there
//! replace the matching fields of the named preset (or of the defaults when
//! no preset is named).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

use ruleslab_core::engine::StrategyConfig;
use ruleslab_core::indicators::{IndicatorError, IndicatorParams};

use crate::data_loader::{Frequency, YearMonth};
use crate::presets;

/// Content-addressable identifier of a resolved configuration.
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown preset '{0}' (see `ruleslab presets`)")]
    UnknownPreset(String),

    #[error("unknown field '{field}' in [{section}]")]
    UnknownField { section: &'static str, field: String },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("invalid [{section}] override: {source}")]
    Override {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Indicator(#[from] IndicatorError),
}

/// Where the bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Directory holding `{symbol}-{interval}-{YYYY-MM}.csv` files.
    pub dir: Option<PathBuf>,
    pub symbol: String,
    /// Interval of the raw files, part of their names.
    pub interval: String,
    pub start: Option<YearMonth>,
    pub end: Option<YearMonth>,
    /// Resampling frequency for the simulation.
    pub freq: Frequency,
    /// Generate this many synthetic hourly bars instead of reading files.
    pub synthetic: Option<usize>,
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: None,
            symbol: "BTCUSDT".to_string(),
            interval: "1m".to_string(),
            start: None,
            end: None,
            freq: Frequency::hourly(),
            synthetic: None,
            seed: 42,
        }
    }
}

/// `[strategy]`: optional preset name plus field overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategySection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(flatten)]
    pub overrides: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Annual risk-free rate subtracted in the Sharpe ratio.
    pub risk_free_rate: f64,
    pub output_dir: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            output_dir: None,
        }
    }
}

/// A backtest configuration as written in a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestConfig {
    pub data: DataConfig,
    pub indicators: Map<String, Value>,
    pub strategy: StrategySection,
    pub report: ReportConfig,
}

/// A configuration with preset and overrides applied. This is what runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub data: DataConfig,
    pub preset: Option<String>,
    pub indicators: IndicatorParams,
    pub strategy: StrategyConfig,
    pub risk_free_rate: f64,
}

impl ResolvedConfig {
    /// BLAKE3 hash of the canonical JSON form.
    ///
    /// Repeating a preset's value as an explicit override does not change
    /// the id.
    pub fn run_id(&self) -> Result<RunId, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

impl BacktestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// A config that runs the named preset with default data settings.
    pub fn for_preset(name: &str) -> Self {
        Self {
            strategy: StrategySection {
                preset: Some(name.to_string()),
                overrides: Map::new(),
            },
            ..Self::default()
        }
    }

    fn preset(&self) -> Result<Option<presets::Preset>, ConfigError> {
        self.strategy
            .preset
            .as_deref()
            .map(|name| presets::preset(name).ok_or_else(|| ConfigError::UnknownPreset(name.into())))
            .transpose()
    }

    /// Strategy parameters: preset (or defaults) with `[strategy]` overrides.
    pub fn strategy_config(&self) -> Result<StrategyConfig, ConfigError> {
        let base = self.preset()?.map(|p| p.strategy).unwrap_or_default();
        apply_overrides("strategy", &base, &self.strategy.overrides)
    }

    /// Indicator windows: preset (or defaults) with `[indicators]` overrides.
    pub fn indicator_params(&self) -> Result<IndicatorParams, ConfigError> {
        let base = self.preset()?.map(|p| p.indicators).unwrap_or_default();
        apply_overrides("indicators", &base, &self.indicators)
    }

    /// Apply overrides and validate everything that can be checked without data.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        self.validate_data()?;
        self.resolve_params()
    }

    /// Like [`resolve`](Self::resolve) but skips the `[data]` checks, for
    /// runs on bars supplied by the caller.
    pub fn resolve_params(&self) -> Result<ResolvedConfig, ConfigError> {
        let indicators = self.indicator_params()?;
        indicators.validate()?;
        let strategy = self.strategy_config()?;

        let rf = self.report.risk_free_rate;
        if !rf.is_finite() {
            return Err(ConfigError::Invalid {
                field: "report.risk_free_rate",
                reason: format!("must be finite, got {rf}"),
            });
        }

        Ok(ResolvedConfig {
            data: self.data.clone(),
            preset: self.strategy.preset.clone(),
            indicators,
            strategy,
            risk_free_rate: rf,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolve().map(|_| ())
    }

    fn validate_data(&self) -> Result<(), ConfigError> {
        let data = &self.data;
        match data.synthetic {
            Some(0) => Err(ConfigError::Invalid {
                field: "data.synthetic",
                reason: "bar count must be positive".into(),
            }),
            Some(_) => Ok(()),
            None => {
                let missing = |field| ConfigError::Invalid {
                    field,
                    reason: "required unless data.synthetic is set".into(),
                };
                if data.dir.is_none() {
                    return Err(missing("data.dir"));
                }
                let start = data.start.ok_or_else(|| missing("data.start"))?;
                let end = data.end.ok_or_else(|| missing("data.end"))?;
                if start > end {
                    return Err(ConfigError::Invalid {
                        field: "data.start",
                        reason: format!("{start} is after data.end {end}"),
                    });
                }
                if data.symbol.trim().is_empty() {
                    return Err(missing("data.symbol"));
                }
                Ok(())
            }
        }
    }
}

/// Overlay `overrides` onto the JSON form of `base` and read it back.
///
/// Keys that `base` does not have are rejected so typos fail loudly.
fn apply_overrides<T>(
    section: &'static str,
    base: &T,
    overrides: &Map<String, Value>,
) -> Result<T, ConfigError>
where
    T: Serialize + serde::de::DeserializeOwned,
{
    let to_err = |source| ConfigError::Override { section, source };
    let mut value = serde_json::to_value(base).map_err(to_err)?;
    if let Value::Object(fields) = &mut value {
        for (key, v) in overrides {
            if !fields.contains_key(key) {
                return Err(ConfigError::UnknownField {
                    section,
                    field: key.clone(),
                });
            }
            fields.insert(key.clone(), v.clone());
        }
    }
    serde_json::from_value(value).map_err(to_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruleslab_core::engine::{ExitRule, MomentumSource, NavMode};

    const FULL: &str = r#"
        [data]
        dir = "data/klines"
        symbol = "ETHUSDT"
        start = "2023-01"
        end = "2023-06"
        freq = "4h"

        [indicators]
        sma_slow = 150

        [strategy]
        preset = "trend_relaxed"
        cooldown_bars = 12
        exit_rules = [{ rule = "stop" }, { rule = "take_profit", pct = 0.2 }]

        [report]
        risk_free_rate = 0.0
    "#;

    #[test]
    fn parses_full_config() {
        let cfg = BacktestConfig::from_toml_str(FULL).unwrap();
        assert_eq!(cfg.data.symbol, "ETHUSDT");
        assert_eq!(cfg.data.interval, "1m");
        assert_eq!(cfg.data.freq.seconds(), 4 * 3_600);
        assert_eq!(cfg.data.start, YearMonth::new(2023, 1));
        assert_eq!(cfg.strategy.preset.as_deref(), Some("trend_relaxed"));
        assert_eq!(cfg.strategy.overrides.len(), 2);
    }

    #[test]
    fn overrides_replace_preset_fields() {
        let cfg = BacktestConfig::from_toml_str(FULL).unwrap();
        let resolved = cfg.resolve().unwrap();
        let preset = presets::preset("trend_relaxed").unwrap();

        assert_eq!(resolved.strategy.cooldown_bars, 12);
        assert_eq!(
            resolved.strategy.exit_rules,
            vec![ExitRule::Stop, ExitRule::TakeProfit { pct: 0.2 }]
        );
        // untouched fields come from the preset
        assert_eq!(resolved.strategy.use_adx, preset.strategy.use_adx);
        assert_eq!(resolved.strategy.warmup_padding, preset.strategy.warmup_padding);
        assert_eq!(resolved.indicators.sma_slow, 150);
        assert_eq!(resolved.indicators.sma_fast, preset.indicators.sma_fast);
        assert_eq!(resolved.risk_free_rate, 0.0);
    }

    #[test]
    fn explicit_fields_without_preset_use_defaults() {
        let cfg = BacktestConfig::from_toml_str(
            r#"
            [data]
            synthetic = 1000

            [strategy]
            require_momentum = true
            momentum_source = "signal_z"
            nav_mode = "additive"
            "#,
        )
        .unwrap();
        let s = cfg.resolve().unwrap().strategy;
        assert!(s.require_momentum);
        assert_eq!(s.momentum_source, MomentumSource::SignalZ);
        assert_eq!(s.nav_mode, NavMode::Additive);
        assert_eq!(s.k_init, StrategyConfig::default().k_init);
    }

    #[test]
    fn unknown_preset_rejected() {
        let cfg = BacktestConfig {
            data: DataConfig {
                synthetic: Some(10),
                ..DataConfig::default()
            },
            ..BacktestConfig::for_preset("v9")
        };
        assert!(matches!(cfg.resolve(), Err(ConfigError::UnknownPreset(n)) if n == "v9"));
    }

    #[test]
    fn unknown_override_field_rejected() {
        let cfg = BacktestConfig::from_toml_str(
            "[data]\nsynthetic = 10\n[strategy]\ncooldown = 3\n",
        )
        .unwrap();
        assert!(matches!(
            cfg.resolve(),
            Err(ConfigError::UnknownField { section: "strategy", ref field }) if field == "cooldown"
        ));
    }

    #[test]
    fn wrong_override_type_rejected() {
        let cfg = BacktestConfig::from_toml_str(
            "[data]\nsynthetic = 10\n[strategy]\nk_init = \"two\"\n",
        )
        .unwrap();
        assert!(matches!(cfg.resolve(), Err(ConfigError::Override { .. })));
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(BacktestConfig::from_toml_str("[engine]\nx = 1\n").is_err());
    }

    #[test]
    fn file_data_requires_dir_and_range() {
        let cfg = BacktestConfig::from_toml_str("[data]\ndir = \"d\"\nstart = \"2023-01\"\n").unwrap();
        assert!(matches!(
            cfg.resolve(),
            Err(ConfigError::Invalid { field: "data.end", .. })
        ));

        let cfg = BacktestConfig::from_toml_str(
            "[data]\ndir = \"d\"\nstart = \"2023-05\"\nend = \"2023-01\"\n",
        )
        .unwrap();
        assert!(matches!(
            cfg.resolve(),
            Err(ConfigError::Invalid { field: "data.start", .. })
        ));
    }

    #[test]
    fn invalid_indicator_override_rejected() {
        let cfg = BacktestConfig::from_toml_str("[data]\nsynthetic = 10\n[indicators]\natr_period = 0\n")
            .unwrap();
        assert!(matches!(cfg.resolve(), Err(ConfigError::Indicator(_))));
    }

    #[test]
    fn run_id_deterministic_and_sensitive() {
        let cfg = BacktestConfig::from_toml_str(FULL).unwrap();
        let a = cfg.resolve().unwrap().run_id().unwrap();
        let b = cfg.resolve().unwrap().run_id().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut other = cfg.clone();
        other
            .strategy
            .overrides
            .insert("cooldown_bars".into(), Value::from(13));
        assert_ne!(other.resolve().unwrap().run_id().unwrap(), a);
    }

    #[test]
    fn run_id_ignores_where_a_value_came_from() {
        let preset = presets::preset("trend_relaxed").unwrap();
        let via_preset = BacktestConfig {
            data: DataConfig {
                synthetic: Some(500),
                ..DataConfig::default()
            },
            ..BacktestConfig::for_preset("trend_relaxed")
        };
        let mut explicit = via_preset.clone();
        explicit
            .strategy
            .overrides
            .insert("cooldown_bars".into(), Value::from(preset.strategy.cooldown_bars));

        assert_eq!(
            via_preset.resolve().unwrap().run_id().unwrap(),
            explicit.resolve().unwrap().run_id().unwrap()
        );
    }
}
