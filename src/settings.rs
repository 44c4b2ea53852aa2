use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::VenueRule;
use crate::Result;

/// Strategy tunables
///
/// Layered as: built-in defaults, then an optional TOML file, then
/// `SMALLCAP_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyConfig {
    /// Number of names held per rotation
    pub stocknum: usize,
    pub max_drawdown_threshold: f64,
    /// Squeeze when current bandwidth < historical average × ratio
    pub relative_squeeze_ratio: f64,
    /// Protective limit offset for restricted-venue orders
    pub restricted_venue_buffer: f64,
    /// Trading days a computed candidate list stays valid while flat
    pub refresh_rate: u32,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    /// Mean return that counts as "target met"
    pub target_return: f64,
    pub volume_contraction_ratio: f64,
    pub min_hold_days_for_squeeze: i64,
    /// Half-width of the band around the 20-day mean for stagnation exits
    pub ma_proximity_band: f64,
    pub lot_size: u64,
    pub restricted_prefixes: Vec<String>,
    pub state_path: PathBuf,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            stocknum: 10,
            max_drawdown_threshold: 0.10,
            relative_squeeze_ratio: 0.7,
            restricted_venue_buffer: 0.05,
            refresh_rate: 1,
            lower_percentile: 0.05,
            upper_percentile: 0.10,
            target_return: 0.15,
            volume_contraction_ratio: 0.8,
            min_hold_days_for_squeeze: 7,
            ma_proximity_band: 0.05,
            lot_size: 100,
            restricted_prefixes: vec!["688".to_string()],
            state_path: PathBuf::from("state/strategy_state.json"),
        }
    }
}

impl StrategyConfig {
    /// Load configuration
    ///
    /// # Arguments
    /// * `path` - Optional TOML file; when given it must exist
    ///
    /// # Errors
    /// `EngineError::Config` on unreadable files, malformed values or failed validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: StrategyConfig = builder
            .add_source(Environment::with_prefix("SMALLCAP").try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;

        tracing::debug!("Loaded strategy config: {:?}", config);

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stocknum == 0 {
            return Err(EngineError::Config("stocknum must be at least 1".to_string()));
        }

        if !(0.0..1.0).contains(&self.lower_percentile)
            || self.upper_percentile <= self.lower_percentile
            || self.upper_percentile > 1.0
        {
            return Err(EngineError::Config(format!(
                "percentile band [{}, {}) is not within [0, 1]",
                self.lower_percentile, self.upper_percentile
            )));
        }

        for (name, value) in [
            ("max_drawdown_threshold", self.max_drawdown_threshold),
            ("relative_squeeze_ratio", self.relative_squeeze_ratio),
            ("restricted_venue_buffer", self.restricted_venue_buffer),
            ("volume_contraction_ratio", self.volume_contraction_ratio),
            ("ma_proximity_band", self.ma_proximity_band),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(EngineError::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.target_return <= 0.0 || !self.target_return.is_finite() {
            return Err(EngineError::Config(format!(
                "target_return must be positive, got {}",
                self.target_return
            )));
        }

        if self.lot_size == 0 {
            return Err(EngineError::Config("lot_size must be at least 1".to_string()));
        }

        if self.refresh_rate == 0 {
            return Err(EngineError::Config("refresh_rate must be at least 1".to_string()));
        }

        Ok(())
    }

    pub fn venue_rule(&self) -> VenueRule {
        VenueRule::new(self.restricted_prefixes.clone())
    }
}
