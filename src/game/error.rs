//! Error types for commands, accounts and configuration.

use crate::core::money::Amount;
use crate::game::bet::{AccountId, BetId};
use crate::game::round::{RoundId, RoundPhase};

/// Command errors. All of them are recoverable: the command fails and the
/// engine keeps running.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BetError {
    /// Command issued in the wrong round phase.
    #[error("Round is {actual:?}, command requires {expected:?}")]
    InvalidState {
        /// Phase the command needs.
        expected: RoundPhase,
        /// Phase the round is in.
        actual: RoundPhase,
    },

    /// Stake exceeds the available balance.
    #[error("Stake {stake} exceeds balance {balance}")]
    InsufficientFunds {
        /// Requested stake, in [`Amount`] units.
        stake: Amount,
        /// Balance at the time of the request.
        balance: Amount,
    },

    /// Second bet from the same account in the same round.
    #[error("Already placed a bet in round {round_id}")]
    DuplicateBet {
        /// Round that already holds a bet.
        round_id: RoundId,
    },

    /// No such bet on the current round, or no pending bet for the account.
    #[error("Bet {0} not found")]
    NotFound(BetId),

    /// Bet is already WON or LOST.
    #[error("Bet {0} already resolved")]
    AlreadyResolved(BetId),

    /// Stake outside the table limits.
    #[error("Stake {stake} outside allowed range [{min}, {max}]")]
    StakeOutOfRange {
        /// Requested stake, in whole units.
        stake: u64,
        /// Table minimum, in whole units.
        min: u64,
        /// Largest stake allowed for this balance, in whole units.
        max: u64,
    },

    /// Account provider refused the request.
    #[error("Account error: {0}")]
    Account(#[from] AccountError),
}

/// Errors signalled by an account provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    /// Account is not known to the provider.
    #[error("Unknown account {0}")]
    UnknownAccount(AccountId),

    /// Applying the delta would take the balance below zero.
    #[error("Delta {delta} would overdraw balance {balance}")]
    WouldOverdraw {
        /// Current balance.
        balance: Amount,
        /// Requested delta.
        delta: Amount,
    },
}

/// Malformed configuration. Fatal at construction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No distribution tiers.
    #[error("Distribution has no tiers")]
    NoTiers,

    /// Tier probability outside (0, 1].
    #[error("Tier {index} probability {probability} outside (0, 1]")]
    InvalidProbability {
        /// Tier index.
        index: usize,
        /// Offending probability.
        probability: f64,
    },

    /// Tier probabilities do not sum to 1.
    #[error("Tier probabilities sum to {0}, expected 1.0")]
    ProbabilitySum(f64),

    /// Tier range empty, inverted, non-finite, or below 1.00.
    #[error("Tier {index} range [{min}, {max}) is invalid")]
    InvalidTierRange {
        /// Tier index.
        index: usize,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// Curve base or scale out of range.
    #[error("Curve base {base} and scale {scale} must satisfy base > 1, scale > 0")]
    InvalidCurve {
        /// Curve base.
        base: f64,
        /// Curve scale.
        scale: f64,
    },

    /// A field that must be positive is zero or out of range.
    #[error("Invalid value for {field}: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Config file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config JSON could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
