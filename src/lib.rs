//! # Crash Round Server
//!
//! Round engine for crash-style multiplier wagering: a multiplier climbs from
//! 1.00x until a hidden, pre-sampled crash point. Bets cashed out before the
//! crash pay stake x multiplier; bets still in at the crash are lost.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CRASH ROUND SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Injectable primitives                    │
//! │  ├── rng.rs       - Xorshift128+ PRNG, RandomSource seam     │
//! │  ├── clock.rs     - Clock trait, manual and tokio clocks     │
//! │  └── money.rs     - Fixed-point amounts                      │
//! │                                                              │
//! │  game/            - Round simulation (no I/O)                │
//! │  ├── config.rs    - Engine config and variant presets        │
//! │  ├── curve.rs     - Multiplier curve                         │
//! │  ├── crash_point.rs - Tiered crash point sampling            │
//! │  ├── round.rs     - WAITING → RUNNING → CRASHED machine      │
//! │  ├── ledger.rs    - Bets, cashouts, crash resolution         │
//! │  ├── history.rs   - Recent crash points                      │
//! │  └── table.rs     - Command queue and tick ordering          │
//! │                                                              │
//! │  runtime/         - Real-time driving (tokio)                │
//! │  ├── driver.rs    - Tick loop, command channel, broadcast    │
//! │  └── sink.rs      - Render sinks                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fairness
//!
//! Within a tick, commands queued since the previous tick are applied before
//! the crash check. A cashout that lands on the tick where the curve crosses
//! the crash point settles at the last multiplier players actually saw.
//!
//! Given the same seed, config and tick timestamps, a table produces the
//! same rounds, bets and balances.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod runtime;

// Re-export commonly used types
pub use crate::core::clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use crate::core::money::{Amount, AMOUNT_SCALE};
pub use crate::core::rng::{DeterministicRng, RandomSource};
pub use crate::game::config::{EngineConfig, GameVariant};
pub use crate::game::error::{AccountError, BetError, ConfigError};
pub use crate::game::table::{Command, CrashTable, RoundSnapshot, TickResult};
pub use crate::runtime::driver::{spawn_table, DriverError, TableHandle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
