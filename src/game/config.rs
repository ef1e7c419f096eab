//! Engine configuration.
//!
//! One engine serves both game variants; they differ only in the numbers
//! below. Every config is validated before a table can be built from it.

use std::path::Path;
use std::time::Duration;

use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::game::error::ConfigError;

/// Tolerance when checking that tier probabilities sum to 1.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Game variant. Selects presets and the shape of bet details.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameVariant {
    /// Rising chart.
    #[default]
    Crash,
    /// Plane in flight.
    Aviator,
}

impl GameVariant {
    /// Parse a variant name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "crash" => Some(GameVariant::Crash),
            "aviator" => Some(GameVariant::Aviator),
            _ => None,
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            GameVariant::Crash => "Crash",
            GameVariant::Aviator => "Aviator",
        }
    }
}

/// One band of the crash-point distribution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributionTier {
    /// Probability mass of this tier.
    pub probability: f64,
    /// Inclusive lower bound.
    pub min: f64,
    /// Exclusive upper bound.
    pub max: f64,
}

impl DistributionTier {
    /// Create a tier.
    pub const fn new(probability: f64, min: f64, max: f64) -> Self {
        Self { probability, min, max }
    }
}

/// Multiplier curve constants: `m(t) = base ^ (t * scale)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveConfig {
    /// Growth base, must exceed 1.
    pub base: f64,
    /// Time scale, must be positive.
    pub scale: f64,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self { base: 1.0024, scale: 100.0 }
    }
}

/// Full engine configuration.
///
/// JSON configs are partial: fields left out keep the preset of the
/// config's `variant`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Game variant.
    pub variant: GameVariant,
    /// WAITING phase duration.
    pub countdown_seconds: f64,
    /// CRASHED phase duration before the next round.
    pub settle_seconds: f64,
    /// Tick period for the driver.
    pub tick_interval_ms: u64,
    /// Minimum stake, whole units.
    pub min_bet: u64,
    /// Largest stake as a fraction of balance, in (0, 1].
    pub max_bet_multiplier_of_balance: f64,
    /// Crash points kept in the history log.
    pub history_capacity: usize,
    /// Crash-point distribution.
    pub distribution_tiers: Vec<DistributionTier>,
    /// Multiplier curve.
    pub curve: CurveConfig,
    /// Rounds of resolved bets kept in the ledger feed.
    pub bet_retention_rounds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_variant(GameVariant::Crash)
    }
}

impl EngineConfig {
    /// Preset for a game variant.
    pub fn for_variant(variant: GameVariant) -> Self {
        match variant {
            GameVariant::Crash => Self {
                variant,
                countdown_seconds: 5.0,
                settle_seconds: 3.0,
                tick_interval_ms: 100,
                min_bet: 25,
                max_bet_multiplier_of_balance: 1.0,
                history_capacity: 7,
                distribution_tiers: vec![
                    DistributionTier::new(0.4, 1.0, 2.0),
                    DistributionTier::new(0.3, 2.0, 5.0),
                    DistributionTier::new(0.2, 5.0, 15.0),
                    DistributionTier::new(0.1, 15.0, 100.0),
                ],
                curve: CurveConfig { base: 1.05, scale: 1.0 },
                bet_retention_rounds: 50,
            },
            GameVariant::Aviator => Self {
                variant,
                countdown_seconds: 7.0,
                settle_seconds: 4.0,
                tick_interval_ms: 50,
                min_bet: 25,
                max_bet_multiplier_of_balance: 1.0,
                history_capacity: 10,
                distribution_tiers: vec![
                    DistributionTier::new(0.4, 1.0, 2.0),
                    DistributionTier::new(0.3, 2.0, 5.0),
                    DistributionTier::new(0.2, 5.0, 10.0),
                    DistributionTier::new(0.1, 10.0, 50.0),
                ],
                curve: CurveConfig { base: 1.0024, scale: 100.0 },
                bet_retention_rounds: 50,
            },
        }
    }

    /// Parse and validate a JSON config. Without a `variant` key the
    /// Crash preset fills the gaps.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Self::from_json_with_default(json, GameVariant::default())
    }

    /// Parse and validate a JSON config over the preset of its `variant`
    /// key, or of `fallback` when the key is absent.
    pub fn from_json_with_default(json: &str, fallback: GameVariant) -> Result<Self, ConfigError> {
        let overlay: Value = serde_json::from_str(json)?;
        let variant = match overlay.get("variant") {
            Some(name) => GameVariant::deserialize(name)?,
            None => fallback,
        };

        let mut merged = serde_json::to_value(Self::for_variant(variant))?;
        merge_json(&mut merged, overlay);

        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with_default(path, GameVariant::default())
    }

    /// Read a JSON config file over the preset of its `variant` key, or of
    /// `fallback` when the key is absent.
    pub fn load_with_default(path: impl AsRef<Path>, fallback: GameVariant) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_with_default(&json, fallback)
    }

    /// WAITING phase duration.
    pub fn countdown(&self) -> Duration {
        Duration::from_secs_f64(self.countdown_seconds)
    }

    /// CRASHED phase duration.
    pub fn settle(&self) -> Duration {
        Duration::from_secs_f64(self.settle_seconds)
    }

    /// Driver tick period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Check every field. Tiers and curve are checked by [`validate_tiers`]
    /// and [`validate_curve`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_seconds("countdown_seconds", self.countdown_seconds)?;
        positive_seconds("settle_seconds", self.settle_seconds)?;

        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms", "must be at least 1"));
        }
        if self.min_bet == 0 {
            return Err(invalid("min_bet", "must be at least 1"));
        }
        let fraction = self.max_bet_multiplier_of_balance;
        if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
            return Err(invalid(
                "max_bet_multiplier_of_balance",
                format!("{} outside (0, 1]", fraction),
            ));
        }
        if self.history_capacity == 0 {
            return Err(invalid("history_capacity", "must be at least 1"));
        }

        validate_tiers(&self.distribution_tiers)?;
        validate_curve(&self.curve)?;
        Ok(())
    }
}

/// Validate a tier list.
pub fn validate_tiers(tiers: &[DistributionTier]) -> Result<(), ConfigError> {
    if tiers.is_empty() {
        return Err(ConfigError::NoTiers);
    }

    let mut total = 0.0;
    for (index, tier) in tiers.iter().enumerate() {
        let p = tier.probability;
        if !p.is_finite() || p <= 0.0 || p > 1.0 {
            return Err(ConfigError::InvalidProbability { index, probability: p });
        }
        let range_ok = tier.min.is_finite()
            && tier.max.is_finite()
            && tier.min >= 1.0
            && tier.max > tier.min;
        if !range_ok {
            return Err(ConfigError::InvalidTierRange {
                index,
                min: tier.min,
                max: tier.max,
            });
        }
        total += p;
    }

    if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(ConfigError::ProbabilitySum(total));
    }
    Ok(())
}

/// Validate curve constants.
pub fn validate_curve(curve: &CurveConfig) -> Result<(), ConfigError> {
    let ok = curve.base.is_finite()
        && curve.scale.is_finite()
        && curve.base > 1.0
        && curve.scale > 0.0;
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidCurve {
            base: curve.base,
            scale: curve.scale,
        })
    }
}

/// Lay `overlay` over `base`. Objects merge key by key; anything else,
/// arrays included, replaces the base value.
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}

fn positive_seconds(field: &'static str, value: f64) -> Result<(), ConfigError> {
    // Duration::from_secs_f64 panics on negative or non-finite input
    if value.is_finite() && value > 0.0 && value < 86_400.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{} seconds is not a usable duration", value)))
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidField {
        field,
        reason: reason.into(),
    }
}
