//! Crash point sampling.
//!
//! Two draws per round: the first picks a tier by cumulative probability,
//! the second places the value uniformly inside that tier's range.

use crate::core::rng::RandomSource;
use crate::game::config::{validate_tiers, DistributionTier};
use crate::game::error::ConfigError;

/// Lowest possible crash point.
pub const MIN_CRASH_POINT: f64 = 1.0;

/// Samples one crash point per round from a tiered distribution.
pub struct CrashPointGenerator {
    tiers: Vec<DistributionTier>,
    /// Upper edge of each tier's cumulative probability band.
    cumulative: Vec<f64>,
    source: Box<dyn RandomSource>,
}

impl CrashPointGenerator {
    /// Build a generator. Fails fast on a malformed distribution.
    pub fn new(
        tiers: Vec<DistributionTier>,
        source: Box<dyn RandomSource>,
    ) -> Result<Self, ConfigError> {
        validate_tiers(&tiers)?;

        let mut acc = 0.0;
        let cumulative = tiers
            .iter()
            .map(|tier| {
                acc += tier.probability;
                acc
            })
            .collect();

        Ok(Self {
            tiers,
            cumulative,
            source,
        })
    }

    /// Index of the tier whose cumulative band contains `r`.
    ///
    /// Rounding can leave the last band a hair short of 1.0; anything past
    /// it falls into the last tier.
    pub fn tier_for(&self, r: f64) -> usize {
        self.cumulative
            .iter()
            .position(|&upper| r < upper)
            .unwrap_or(self.tiers.len() - 1)
    }

    /// Draw the next crash point and the tier it came from.
    pub fn sample_with_tier(&mut self) -> (f64, usize) {
        let r = self.source.next_unit();
        let index = self.tier_for(r);
        let tier = self.tiers[index];

        let u = self.source.next_unit();
        let value = tier.min + u * (tier.max - tier.min);

        (value.max(MIN_CRASH_POINT), index)
    }

    /// Draw the next crash point.
    pub fn sample(&mut self) -> f64 {
        self.sample_with_tier().0
    }

    /// Configured tiers.
    pub fn tiers(&self) -> &[DistributionTier] {
        &self.tiers
    }
}

impl std::fmt::Debug for CrashPointGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashPointGenerator")
            .field("tiers", &self.tiers)
            .finish_non_exhaustive()
    }
}
