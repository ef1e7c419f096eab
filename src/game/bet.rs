//! Bet and account types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::money::Amount;
use crate::game::config::GameVariant;
use crate::game::round::RoundId;

// =============================================================================
// ACCOUNT ID
// =============================================================================

/// Account identifier (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct AccountId(pub [u8; 16]);

impl AccountId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    /// Short hex form for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

// =============================================================================
// BET
// =============================================================================

/// Bet identifier (monotonic per ledger).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BetId(pub u64);

impl BetId {
    /// Placeholder for account lookups that found no bet. Real ids start at 1.
    pub const NONE: BetId = BetId(0);
}

impl fmt::Display for BetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bet lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    /// Placed, round not yet resolved for this bet.
    Pending,
    /// Cashed out before the crash.
    Won,
    /// Still in when the round crashed.
    Lost,
}

impl BetStatus {
    /// WON or LOST.
    pub fn is_resolved(self) -> bool {
        !matches!(self, BetStatus::Pending)
    }
}

/// Variant-specific bet details.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum BetDetails {
    /// Chart game: tick index at which the player exited.
    Crash {
        /// Table tick of the cashout.
        exit_tick: Option<u64>,
    },
    /// Flight game: time aloft when the player jumped.
    Aviator {
        /// Milliseconds since launch at the cashout.
        flight_time_ms: Option<u64>,
    },
}

impl BetDetails {
    /// Empty details for a freshly placed bet.
    pub fn pending(variant: GameVariant) -> Self {
        match variant {
            GameVariant::Crash => BetDetails::Crash { exit_tick: None },
            GameVariant::Aviator => BetDetails::Aviator { flight_time_ms: None },
        }
    }

    /// Fill in the exit data.
    pub fn with_exit(self, tick: u64, flight_time_ms: u64) -> Self {
        match self {
            BetDetails::Crash { .. } => BetDetails::Crash { exit_tick: Some(tick) },
            BetDetails::Aviator { .. } => BetDetails::Aviator {
                flight_time_ms: Some(flight_time_ms),
            },
        }
    }

    /// Which game these details belong to.
    pub fn variant(&self) -> GameVariant {
        match self {
            BetDetails::Crash { .. } => GameVariant::Crash,
            BetDetails::Aviator { .. } => GameVariant::Aviator,
        }
    }
}

/// A single wager on one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    /// Bet id.
    pub id: BetId,
    /// Round the bet belongs to.
    pub round_id: RoundId,
    /// Owning account.
    pub account: AccountId,
    /// Stake in whole units.
    pub stake: u64,
    /// Lifecycle status.
    pub status: BetStatus,
    /// Multiplier at cashout (WON only).
    pub cashout_multiplier: Option<f64>,
    /// Amount credited back (WON: stake x multiplier, LOST: 0).
    pub payout: Option<Amount>,
    /// Placement time.
    pub placed_at: DateTime<Utc>,
    /// Resolution time.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Variant-specific details.
    pub details: BetDetails,
}

impl Bet {
    /// Still waiting on the round.
    pub fn is_pending(&self) -> bool {
        self.status == BetStatus::Pending
    }

    /// One-line description for logs and feeds.
    pub fn summary(&self) -> String {
        let outcome = match (self.status, self.cashout_multiplier) {
            (BetStatus::Pending, _) => "pending".to_string(),
            (BetStatus::Won, Some(m)) => format!("won @ {:.2}x", m),
            (BetStatus::Won, None) => "won".to_string(),
            (BetStatus::Lost, _) => "bust".to_string(),
        };
        let exit = match self.details {
            BetDetails::Crash { exit_tick: Some(tick) } => format!(" (tick {})", tick),
            BetDetails::Aviator { flight_time_ms: Some(ms) } => {
                format!(" (aloft {:.1}s)", ms as f64 / 1000.0)
            }
            BetDetails::Crash { exit_tick: None } | BetDetails::Aviator { flight_time_ms: None } => {
                String::new()
            }
        };
        format!(
            "{} {} bet {} by {} on round {}: {}{}",
            self.details.variant().name(),
            self.stake,
            self.id,
            self.account,
            self.round_id,
            outcome,
            exit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bet(details: BetDetails) -> Bet {
        Bet {
            id: BetId(7),
            round_id: 3,
            account: AccountId::new([0xAB; 16]),
            stake: 100,
            status: BetStatus::Pending,
            cashout_multiplier: None,
            payout: None,
            placed_at: DateTime::<Utc>::default(),
            resolved_at: None,
            details,
        }
    }

    #[test]
    fn test_details_follow_variant() {
        let crash = BetDetails::pending(GameVariant::Crash).with_exit(42, 4200);
        assert_eq!(crash, BetDetails::Crash { exit_tick: Some(42) });
        assert_eq!(crash.variant(), GameVariant::Crash);

        let aviator = BetDetails::pending(GameVariant::Aviator).with_exit(42, 4200);
        assert_eq!(aviator, BetDetails::Aviator { flight_time_ms: Some(4200) });
        assert_eq!(aviator.variant(), GameVariant::Aviator);
    }

    #[test]
    fn test_summary() {
        let mut bet = sample_bet(BetDetails::pending(GameVariant::Aviator));
        assert!(bet.summary().ends_with("pending"));

        bet.status = BetStatus::Won;
        bet.cashout_multiplier = Some(2.5);
        bet.details = bet.details.with_exit(10, 1500);
        assert!(bet.summary().contains("won @ 2.50x (aloft 1.5s)"));
        assert!(bet.summary().contains("abababab"));
    }

    #[test]
    fn test_random_account_ids_differ() {
        assert_ne!(AccountId::random(), AccountId::random());
        assert_eq!(AccountId::random().short().len(), 8);
    }

    #[test]
    fn test_details_serialize_tagged() {
        let json = serde_json::to_string(&BetDetails::Crash { exit_tick: Some(5) }).unwrap();
        assert_eq!(json, r#"{"game":"crash","exit_tick":5}"#);
    }
}
