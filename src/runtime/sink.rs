//! Render sinks.
//!
//! A sink is whatever shows the table to people: a UI, a log, a socket. It
//! gets a snapshot every tick plus the discrete round events, and cannot
//! change anything.

use tracing::info;
#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::game::bet::{Bet, BetStatus};
use crate::game::events::RoundEventData;
use crate::game::round::RoundId;
use crate::game::table::{RoundSnapshot, TickResult};

/// Read-only consumer of table output.
pub trait RenderSink: Send {
    /// Called once per tick with the post-tick state.
    fn snapshot(&mut self, snapshot: &RoundSnapshot);

    /// A new round opened for bets.
    fn round_started(&mut self, _round_id: RoundId) {}

    /// The round crashed.
    fn crashed(&mut self, _round_id: RoundId, _crash_point: f64) {}

    /// A bet reached WON or LOST.
    fn bet_resolved(&mut self, _bet: &Bet) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn snapshot(&mut self, _snapshot: &RoundSnapshot) {}
}

/// Logs table output through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl RenderSink for TracingSink {
    fn snapshot(&mut self, _snapshot: &RoundSnapshot) {
        #[cfg(feature = "debug-tracing")]
        trace!(
            "tick {} round {} {:?} {:.2}x",
            _snapshot.tick,
            _snapshot.round_id,
            _snapshot.phase,
            _snapshot.current_multiplier
        );
    }

    fn round_started(&mut self, round_id: RoundId) {
        info!("[render] round {} accepting bets", round_id);
    }

    fn crashed(&mut self, round_id: RoundId, crash_point: f64) {
        info!("[render] round {} crashed @ {:.2}x", round_id, crash_point);
    }

    fn bet_resolved(&mut self, bet: &Bet) {
        match bet.status {
            BetStatus::Won | BetStatus::Lost => info!("[render] {}", bet.summary()),
            BetStatus::Pending => {}
        }
    }
}

/// Push one tick's output into a sink: events first, then the snapshot.
pub fn dispatch(sink: &mut dyn RenderSink, result: &TickResult) {
    for event in &result.events {
        match &event.data {
            RoundEventData::RoundStarted { round_id, .. } => sink.round_started(*round_id),
            RoundEventData::Crashed { round_id, crash_point } => {
                sink.crashed(*round_id, *crash_point)
            }
            RoundEventData::BetResolved { bet } => sink.bet_resolved(bet),
            RoundEventData::Launched { .. } | RoundEventData::BetPlaced { .. } => {}
        }
    }
    sink.snapshot(&result.snapshot);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::events::RoundEvent;
    use crate::game::round::RoundPhase;
    use std::sync::{Arc, Mutex};

    /// Records every call as a short string.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSink {
        pub(crate) calls: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingSink {
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl RenderSink for RecordingSink {
        fn snapshot(&mut self, snapshot: &RoundSnapshot) {
            self.push(format!("snapshot {}", snapshot.tick));
        }

        fn round_started(&mut self, round_id: RoundId) {
            self.push(format!("start {}", round_id));
        }

        fn crashed(&mut self, round_id: RoundId, crash_point: f64) {
            self.push(format!("crash {} {:.2}", round_id, crash_point));
        }

        fn bet_resolved(&mut self, bet: &Bet) {
            self.push(format!("resolved {}", bet.id));
        }
    }

    #[test]
    fn test_dispatch_order() {
        let mut sink = RecordingSink::default();
        let result = TickResult {
            tick: 9,
            events: vec![
                RoundEvent::launched(9, 2),
                RoundEvent::crashed(9, 2, 1.37),
                RoundEvent::round_started(9, 3, 5000),
            ],
            command_results: Vec::new(),
            snapshot: RoundSnapshot {
                tick: 9,
                round_id: 3,
                phase: RoundPhase::Waiting,
                current_multiplier: 1.0,
                countdown_remaining_ms: Some(5000),
                last_crash_point: Some(1.37),
            },
        };

        dispatch(&mut sink, &result);
        assert_eq!(sink.calls(), vec!["crash 2 1.37", "start 3", "snapshot 9"]);
    }
}
