//! Round Events
//!
//! Discrete events emitted by the table, consumed by render sinks and
//! broadcast subscribers.

use serde::{Serialize, Deserialize};

use crate::game::bet::Bet;
use crate::game::round::RoundId;

/// Round event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEventData {
    /// New round open for bets
    RoundStarted {
        round_id: RoundId,
        countdown_ms: u64,
    },

    /// Countdown over, multiplier rising
    Launched {
        round_id: RoundId,
    },

    /// Bet accepted
    BetPlaced {
        bet: Bet,
    },

    /// Bet reached WON or LOST
    BetResolved {
        bet: Bet,
    },

    /// Multiplier reached the crash point
    Crashed {
        round_id: RoundId,
        crash_point: f64,
    },
}

/// A round event with its tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Event data
    pub data: RoundEventData,
}

impl RoundEvent {
    /// Create a new event.
    pub fn new(tick: u64, data: RoundEventData) -> Self {
        Self { tick, data }
    }

    /// Create round started event.
    pub fn round_started(tick: u64, round_id: RoundId, countdown_ms: u64) -> Self {
        Self::new(tick, RoundEventData::RoundStarted { round_id, countdown_ms })
    }

    /// Create launched event.
    pub fn launched(tick: u64, round_id: RoundId) -> Self {
        Self::new(tick, RoundEventData::Launched { round_id })
    }

    /// Create bet placed event.
    pub fn bet_placed(tick: u64, bet: Bet) -> Self {
        Self::new(tick, RoundEventData::BetPlaced { bet })
    }

    /// Create bet resolved event.
    pub fn bet_resolved(tick: u64, bet: Bet) -> Self {
        Self::new(tick, RoundEventData::BetResolved { bet })
    }

    /// Create crashed event.
    pub fn crashed(tick: u64, round_id: RoundId, crash_point: f64) -> Self {
        Self::new(tick, RoundEventData::Crashed { round_id, crash_point })
    }

    /// Round the event belongs to.
    pub fn round_id(&self) -> RoundId {
        match &self.data {
            RoundEventData::RoundStarted { round_id, .. }
            | RoundEventData::Launched { round_id }
            | RoundEventData::Crashed { round_id, .. } => *round_id,
            RoundEventData::BetPlaced { bet } | RoundEventData::BetResolved { bet } => bet.round_id,
        }
    }
}
