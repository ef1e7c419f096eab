//! Multiplier growth curve.
//!
//! `m(t) = base ^ (t * scale)`, with `t` in seconds since launch. Always
//! evaluated from the elapsed time, never accumulated tick by tick, so
//! irregular tick spacing cannot make the curve drift.

use std::time::Duration;

use crate::game::config::{validate_curve, CurveConfig};
use crate::game::error::ConfigError;

/// Pure multiplier curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MultiplierCurve {
    base: f64,
    scale: f64,
    /// Precomputed `scale * ln(base)`, the exponent rate per second.
    rate: f64,
}

impl MultiplierCurve {
    /// Build a curve from validated constants.
    pub fn new(config: CurveConfig) -> Result<Self, ConfigError> {
        validate_curve(&config)?;
        Ok(Self {
            base: config.base,
            scale: config.scale,
            rate: config.scale * config.base.ln(),
        })
    }

    /// Multiplier after `elapsed`.
    #[inline]
    pub fn at(&self, elapsed: Duration) -> f64 {
        self.at_seconds(elapsed.as_secs_f64())
    }

    /// Multiplier after `seconds`. Negative input is treated as zero.
    #[inline]
    pub fn at_seconds(&self, seconds: f64) -> f64 {
        let t = seconds.max(0.0);
        self.base.powf(t * self.scale)
    }

    /// Earliest elapsed time at which the curve reaches `multiplier`.
    ///
    /// Returns zero for targets at or below 1.00, and [`Duration::MAX`] when
    /// the curve is too flat to reach the target in a representable time.
    pub fn time_to_reach(&self, multiplier: f64) -> Duration {
        if multiplier <= 1.0 || !multiplier.is_finite() {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(multiplier.ln() / self.rate).unwrap_or(Duration::MAX)
    }

    /// Curve constants.
    pub fn config(&self) -> CurveConfig {
        CurveConfig {
            base: self.base,
            scale: self.scale,
        }
    }
}
