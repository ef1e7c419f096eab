//! Core deterministic primitives.
//!
//! Randomness, time and money. Everything the round simulation needs from the
//! outside world comes through these types so it can be replaced in tests.

pub mod clock;
pub mod money;
pub mod rng;

// Re-export core types
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use money::{Amount, AMOUNT_SCALE};
pub use rng::{DeterministicRng, RandomSource};
