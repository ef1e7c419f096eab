//! Game Logic Module
//!
//! Round simulation. No I/O and no wall clock: time arrives as a timestamp
//! on every tick and randomness through an injected source.
//!
//! ## Module Structure
//!
//! - `config`: Engine configuration and variant presets
//! - `curve`: Multiplier growth curve
//! - `crash_point`: Tiered crash point sampling
//! - `round`: Round state machine
//! - `bet`: Bets and account ids
//! - `ledger`: Stakes, cashouts and crash resolution
//! - `history`: Recent crash points
//! - `events`: Round events for sinks and subscribers
//! - `table`: Command queue and tick ordering
//! - `error`: Error types

pub mod bet;
pub mod config;
pub mod crash_point;
pub mod curve;
pub mod error;
pub mod events;
pub mod history;
pub mod ledger;
pub mod round;
pub mod table;

// Re-export key types
pub use bet::{AccountId, Bet, BetDetails, BetId, BetStatus};
pub use config::{CurveConfig, DistributionTier, EngineConfig, GameVariant};
pub use crash_point::CrashPointGenerator;
pub use curve::MultiplierCurve;
pub use error::{AccountError, BetError, ConfigError};
pub use events::{RoundEvent, RoundEventData};
pub use history::{CrashBand, HistoryEntry, HistoryLog};
pub use ledger::{AccountProvider, BetLedger, BetLimits, InMemoryAccounts, QUICK_STAKES};
pub use round::{Round, RoundEngine, RoundId, RoundPhase};
pub use table::{Command, CrashTable, RoundSnapshot, TickResult};
