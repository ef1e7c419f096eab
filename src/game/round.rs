//! Round lifecycle state machine.
//!
//! ```text
//!   ┌──────────┐ countdown ┌─────────┐ m(t) >= crash ┌─────────┐
//!   │ WAITING  │──────────▶│ RUNNING │──────────────▶│ CRASHED │
//!   └──────────┘           └─────────┘               └─────────┘
//!        ▲                                                │
//!        └──────────────────── settle ────────────────────┘
//! ```
//!
//! A tick is split in two halves so the table can apply queued commands in
//! between: [`RoundEngine::begin_tick`] evaluates the curve without changing
//! anything, [`RoundEngine::finish_tick`] publishes the multiplier and makes
//! at most one transition.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::clock::elapsed_between;
use crate::game::crash_point::CrashPointGenerator;
use crate::game::curve::MultiplierCurve;

/// Round identifier (monotonic per engine).
pub type RoundId = u64;

/// Phase of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Countdown; bets accepted.
    Waiting,
    /// Multiplier rising; cashouts accepted.
    Running,
    /// Round over; settling before the next one.
    Crashed,
}

impl RoundPhase {
    /// The only phase this one may move to.
    pub fn next(self) -> RoundPhase {
        match self {
            RoundPhase::Waiting => RoundPhase::Running,
            RoundPhase::Running => RoundPhase::Crashed,
            RoundPhase::Crashed => RoundPhase::Waiting,
        }
    }
}

/// One round.
#[derive(Clone)]
pub struct Round {
    /// Round id.
    pub id: RoundId,
    /// Current phase.
    pub phase: RoundPhase,
    /// Pre-sampled crash point. Hidden until the round crashes.
    crash_point: f64,
    /// Multiplier published on the last tick.
    pub current_multiplier: f64,
    /// WAITING entry.
    pub created_at: DateTime<Utc>,
    /// RUNNING entry.
    pub launched_at: Option<DateTime<Utc>>,
    /// CRASHED entry.
    pub crashed_at: Option<DateTime<Utc>>,
}

impl Round {
    fn new(id: RoundId, crash_point: f64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            phase: RoundPhase::Waiting,
            crash_point,
            current_multiplier: 1.0,
            created_at: now,
            launched_at: None,
            crashed_at: None,
        }
    }

    /// Crash point, once the round has crashed.
    pub fn revealed_crash_point(&self) -> Option<f64> {
        match self.phase {
            RoundPhase::Crashed => Some(self.crash_point),
            RoundPhase::Waiting | RoundPhase::Running => None,
        }
    }
}

impl fmt::Debug for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Round")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("crash_point", &self.revealed_crash_point())
            .field("current_multiplier", &self.current_multiplier)
            .field("created_at", &self.created_at)
            .field("launched_at", &self.launched_at)
            .field("crashed_at", &self.crashed_at)
            .finish()
    }
}

/// What the first half of a tick observed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickFrame {
    /// Tick timestamp.
    pub now: DateTime<Utc>,
    /// Round the frame was taken on.
    pub round_id: RoundId,
    /// Phase commands applied this tick are checked against.
    pub command_phase: RoundPhase,
    /// Multiplier a cashout applied this tick settles at.
    pub command_multiplier: f64,
    /// Time since launch (RUNNING only).
    pub elapsed: Duration,
    /// Curve value this tick (RUNNING only).
    candidate: Option<f64>,
    /// Curve reached the crash point this tick.
    crossed: bool,
}

/// Phase transition made by [`RoundEngine::finish_tick`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RoundTransition {
    /// Countdown expired; multiplier started rising.
    Launched {
        /// Round id.
        round_id: RoundId,
    },
    /// Multiplier reached the crash point.
    Crashed {
        /// Round id.
        round_id: RoundId,
        /// Crash point, now public.
        crash_point: f64,
    },
    /// Settle expired; a new WAITING round began.
    Started {
        /// New round id.
        round_id: RoundId,
    },
}

/// Drives rounds through WAITING → RUNNING → CRASHED → WAITING.
#[derive(Debug)]
pub struct RoundEngine {
    round: Round,
    generator: CrashPointGenerator,
    curve: MultiplierCurve,
    countdown: Duration,
    settle: Duration,
}

impl RoundEngine {
    /// Create an engine and open round 1 in WAITING.
    pub fn new(
        mut generator: CrashPointGenerator,
        curve: MultiplierCurve,
        countdown: Duration,
        settle: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let crash_point = generator.sample();
        info!("Round 1 open, countdown {:?}", countdown);

        Self {
            round: Round::new(1, crash_point, now),
            generator,
            curve,
            countdown,
            settle,
        }
    }

    /// Current round.
    pub fn round(&self) -> &Round {
        &self.round
    }

    /// Current round id.
    pub fn round_id(&self) -> RoundId {
        self.round.id
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.round.phase
    }

    /// Multiplier published on the last tick.
    pub fn current_multiplier(&self) -> f64 {
        self.round.current_multiplier
    }

    /// Multiplier curve.
    pub fn curve(&self) -> &MultiplierCurve {
        &self.curve
    }

    /// Time left on the countdown (WAITING only).
    pub fn countdown_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.round.phase {
            RoundPhase::Waiting => {
                let elapsed = elapsed_between(self.round.created_at, now);
                Some(self.countdown.saturating_sub(elapsed))
            }
            RoundPhase::Running | RoundPhase::Crashed => None,
        }
    }

    /// Time left before the next round opens (CRASHED only).
    pub fn settle_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match (self.round.phase, self.round.crashed_at) {
            (RoundPhase::Crashed, Some(crashed_at)) => {
                Some(self.settle.saturating_sub(elapsed_between(crashed_at, now)))
            }
            _ => None,
        }
    }

    /// First half of a tick: evaluate the curve, change nothing.
    pub fn begin_tick(&self, now: DateTime<Utc>) -> TickFrame {
        let round = &self.round;
        let mut frame = TickFrame {
            now,
            round_id: round.id,
            command_phase: round.phase,
            command_multiplier: round.current_multiplier,
            elapsed: Duration::ZERO,
            candidate: None,
            crossed: false,
        };

        if round.phase != RoundPhase::Running {
            return frame;
        }

        let launched_at = round.launched_at.unwrap_or(round.created_at);
        let elapsed = elapsed_between(launched_at, now);
        // A clock stepping backwards must not pull the multiplier down
        let candidate = self.curve.at(elapsed).max(round.current_multiplier);
        let crossed = candidate >= round.crash_point;

        frame.elapsed = elapsed;
        frame.candidate = Some(candidate);
        frame.crossed = crossed;

        if !crossed {
            frame.command_multiplier = candidate;
        } else if round.current_multiplier < round.crash_point {
            // Crossing tick: queued cashouts still settle at the last published value
            frame.command_multiplier = round.current_multiplier;
        } else {
            frame.command_phase = RoundPhase::Crashed;
        }

        frame
    }

    /// Second half of a tick: publish the multiplier and make at most one
    /// transition.
    pub fn finish_tick(&mut self, frame: &TickFrame) -> Option<RoundTransition> {
        let now = frame.now;

        match self.round.phase {
            RoundPhase::Waiting => {
                if elapsed_between(self.round.created_at, now) < self.countdown {
                    return None;
                }
                self.round.phase = RoundPhase::Running;
                self.round.launched_at = Some(now);
                self.round.current_multiplier = 1.0;
                info!("Round {} launched", self.round.id);
                Some(RoundTransition::Launched {
                    round_id: self.round.id,
                })
            }
            RoundPhase::Running => {
                let candidate = frame.candidate.unwrap_or(self.round.current_multiplier);
                if !frame.crossed {
                    self.round.current_multiplier = candidate;
                    return None;
                }

                let crash_point = self.round.crash_point;
                self.round.current_multiplier = crash_point;
                self.round.phase = RoundPhase::Crashed;
                self.round.crashed_at = Some(now);
                info!(
                    "Round {} crashed @ {:.2}x after {:.2}s",
                    self.round.id,
                    crash_point,
                    frame.elapsed.as_secs_f64()
                );
                Some(RoundTransition::Crashed {
                    round_id: self.round.id,
                    crash_point,
                })
            }
            RoundPhase::Crashed => {
                let crashed_at = self.round.crashed_at.unwrap_or(now);
                if elapsed_between(crashed_at, now) < self.settle {
                    return None;
                }
                self.open_next_round(now);
                Some(RoundTransition::Started {
                    round_id: self.round.id,
                })
            }
        }
    }

    fn open_next_round(&mut self, now: DateTime<Utc>) {
        let id = self.round.id + 1;
        let crash_point = self.generator.sample();
        self.round = Round::new(id, crash_point, now);
        debug!("Round {} crash point sampled", id);
        info!("Round {} open, countdown {:?}", id, self.countdown);
    }
}
