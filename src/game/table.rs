//! Crash Table
//!
//! Wires the round engine, bet ledger and history log together behind a
//! command queue. Everything happens inside [`CrashTable::tick`]:
//!
//! 1. Evaluate the curve for the running round.
//! 2. Apply queued commands in arrival order against that evaluation.
//! 3. Publish the multiplier.
//! 4. Make at most one phase transition (launch, crash + resolution, or a
//!    new round).
//!
//! Commands queued since the previous tick are therefore always applied
//! before the crash check, so a cashout that arrives on the crossing tick
//! still settles.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::core::money::Amount;
use crate::core::rng::RandomSource;
use crate::game::bet::{AccountId, Bet, BetId};
use crate::game::config::EngineConfig;
use crate::game::crash_point::CrashPointGenerator;
use crate::game::curve::MultiplierCurve;
use crate::game::error::{AccountError, BetError, ConfigError};
use crate::game::events::RoundEvent;
use crate::game::history::{HistoryEntry, HistoryLog};
use crate::game::ledger::{AccountProvider, BetLedger, BetLimits, RoundView};
use crate::game::round::{RoundEngine, RoundId, RoundPhase, RoundTransition};

/// Identifier handed back by [`CrashTable::enqueue`].
pub type CommandId = u64;

/// Player command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Bet `stake` whole units on the current round.
    PlaceBet {
        /// Betting account.
        account: AccountId,
        /// Stake, whole units.
        stake: u64,
    },
    /// Cash out a specific bet.
    CashOut {
        /// Bet to cash out.
        bet_id: BetId,
    },
    /// Cash out the account's bet on the current round.
    CashOutAccount {
        /// Account whose bet to cash out.
        account: AccountId,
    },
}

/// Outcome of one queued command.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandResult {
    /// Command id from [`CrashTable::enqueue`].
    pub id: CommandId,
    /// Resulting bet, or why the command failed.
    pub result: Result<Bet, BetError>,
}

/// Read-only view pushed to render sinks once per tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    /// Table tick.
    pub tick: u64,
    /// Current round.
    pub round_id: RoundId,
    /// Current phase.
    pub phase: RoundPhase,
    /// Published multiplier.
    pub current_multiplier: f64,
    /// Milliseconds until launch (WAITING only).
    pub countdown_remaining_ms: Option<u64>,
    /// Crash point of the most recent crashed round.
    pub last_crash_point: Option<f64>,
}

/// Result of a tick.
#[derive(Clone, Debug)]
pub struct TickResult {
    /// Tick number.
    pub tick: u64,
    /// Events this tick, in the order they happened.
    pub events: Vec<RoundEvent>,
    /// Outcome of every command applied this tick.
    pub command_results: Vec<CommandResult>,
    /// State after the tick.
    pub snapshot: RoundSnapshot,
}

/// One table running rounds back to back.
pub struct CrashTable {
    config: EngineConfig,
    engine: RoundEngine,
    ledger: BetLedger,
    history: HistoryLog,
    accounts: Box<dyn AccountProvider>,
    queue: VecDeque<(CommandId, Command)>,
    /// Events raised outside a tick, flushed on the next one.
    pending_events: Vec<RoundEvent>,
    next_command: CommandId,
    tick: u64,
}

impl CrashTable {
    /// Build a table and open its first round.
    ///
    /// Fails fast on an invalid configuration.
    pub fn new(
        config: EngineConfig,
        source: Box<dyn RandomSource>,
        accounts: Box<dyn AccountProvider>,
        now: DateTime<Utc>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let generator = CrashPointGenerator::new(config.distribution_tiers.clone(), source)?;
        let curve = MultiplierCurve::new(config.curve)?;
        let engine = RoundEngine::new(generator, curve, config.countdown(), config.settle(), now);
        let ledger = BetLedger::new(BetLimits::from_config(&config), config.variant);
        let history = HistoryLog::new(config.history_capacity);
        let first = RoundEvent::round_started(0, engine.round_id(), countdown_ms(&config));

        Ok(Self {
            config,
            engine,
            ledger,
            history,
            accounts,
            queue: VecDeque::new(),
            pending_events: vec![first],
            next_command: 1,
            tick: 0,
        })
    }

    /// Queue a command for the next tick.
    pub fn enqueue(&mut self, command: Command) -> CommandId {
        let id = self.next_command;
        self.next_command += 1;
        self.queue.push_back((id, command));
        id
    }

    /// Drop every queued command and hand them back.
    pub fn drain_queue(&mut self) -> Vec<(CommandId, Command)> {
        self.queue.drain(..).collect()
    }

    /// Run one tick at `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickResult {
        self.tick += 1;
        let tick = self.tick;

        let mut events = std::mem::take(&mut self.pending_events);
        let mut command_results = Vec::with_capacity(self.queue.len());

        // 1. Curve
        let frame = self.engine.begin_tick(now);
        let view = RoundView {
            id: frame.round_id,
            phase: frame.command_phase,
            multiplier: frame.command_multiplier,
            tick,
            elapsed: frame.elapsed,
        };

        // 2. Commands
        while let Some((id, command)) = self.queue.pop_front() {
            let placing = matches!(command, Command::PlaceBet { .. });
            let result = self.apply(&view, command, now);

            match &result {
                Ok(bet) if placing => events.push(RoundEvent::bet_placed(tick, bet.clone())),
                Ok(bet) => events.push(RoundEvent::bet_resolved(tick, bet.clone())),
                Err(e) => warn!("Command {} rejected: {}", id, e),
            }
            command_results.push(CommandResult { id, result });
        }

        // 3-4. Publish and transition
        if let Some(transition) = self.engine.finish_tick(&frame) {
            self.on_transition(transition, tick, now, &mut events);
        }

        TickResult {
            tick,
            events,
            command_results,
            snapshot: self.snapshot(now),
        }
    }

    fn apply(&mut self, view: &RoundView, command: Command, now: DateTime<Utc>) -> Result<Bet, BetError> {
        let accounts = self.accounts.as_mut();
        match command {
            Command::PlaceBet { account, stake } => {
                self.ledger.place_bet(accounts, view, account, stake, now)
            }
            Command::CashOut { bet_id } => self.ledger.cash_out(accounts, view, bet_id, now),
            Command::CashOutAccount { account } => {
                self.ledger.cash_out_account(accounts, view, account, now)
            }
        }
    }

    fn on_transition(
        &mut self,
        transition: RoundTransition,
        tick: u64,
        now: DateTime<Utc>,
        events: &mut Vec<RoundEvent>,
    ) {
        match transition {
            RoundTransition::Launched { round_id } => {
                events.push(RoundEvent::launched(tick, round_id));
            }
            RoundTransition::Crashed { round_id, crash_point } => {
                events.push(RoundEvent::crashed(tick, round_id, crash_point));
                for bet in self.ledger.resolve_crash(round_id, now) {
                    events.push(RoundEvent::bet_resolved(tick, bet));
                }
                self.history.append(HistoryEntry {
                    round_id,
                    crash_point,
                    timestamp: now,
                });
            }
            RoundTransition::Started { round_id } => {
                let pruned = self.ledger.prune(round_id, self.config.bet_retention_rounds);
                if pruned > 0 {
                    debug!("Pruned {} settled bets", pruned);
                }
                events.push(RoundEvent::round_started(
                    tick,
                    round_id,
                    countdown_ms(&self.config),
                ));
            }
        }
    }

    /// Current state as seen by render sinks.
    pub fn snapshot(&self, now: DateTime<Utc>) -> RoundSnapshot {
        RoundSnapshot {
            tick: self.tick,
            round_id: self.engine.round_id(),
            phase: self.engine.phase(),
            current_multiplier: self.engine.current_multiplier(),
            countdown_remaining_ms: self
                .engine
                .countdown_remaining(now)
                .map(|d| d.as_millis() as u64),
            last_crash_point: self.history.last().map(|e| e.crash_point),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Round engine.
    pub fn engine(&self) -> &RoundEngine {
        &self.engine
    }

    /// Bet ledger.
    pub fn ledger(&self) -> &BetLedger {
        &self.ledger
    }

    /// Crash history.
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Balance of an account.
    pub fn balance(&self, account: &AccountId) -> Result<Amount, AccountError> {
        self.accounts.balance(account)
    }

    /// Ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Commands waiting for the next tick.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl std::fmt::Debug for CrashTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashTable")
            .field("tick", &self.tick)
            .field("round", self.engine.round())
            .field("queued", &self.queue.len())
            .field("bets", &self.ledger.len())
            .finish_non_exhaustive()
    }
}

fn countdown_ms(config: &EngineConfig) -> u64 {
    config.countdown().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::{Clock, ManualClock};
    use crate::core::money::stake_amount;
    use crate::core::rng::DeterministicRng;
    use crate::game::bet::BetStatus;
    use crate::game::config::{CurveConfig, DistributionTier, GameVariant};
    use crate::game::events::RoundEventData;
    use crate::game::ledger::InMemoryAccounts;
    use crate::game::round::tests::CycleSource;
    use std::collections::BTreeMap;

    const ALICE: AccountId = AccountId::new([0xA1; 16]);
    const BOB: AccountId = AccountId::new([0xB0; 16]);

    /// 5s countdown, 3s settle, doubling curve, fixed crash point.
    fn table_crashing_at(crash_point: f64, clock: &ManualClock) -> CrashTable {
        let mut config = EngineConfig::for_variant(GameVariant::Crash);
        config.curve = CurveConfig { base: 2.0, scale: 1.0 };
        config.distribution_tiers = vec![DistributionTier::new(1.0, crash_point, crash_point + 1.0)];

        let mut accounts = InMemoryAccounts::new();
        accounts.open_default(ALICE);
        accounts.open_default(BOB);

        CrashTable::new(
            config,
            Box::new(CycleSource::new(vec![0.0])),
            Box::new(accounts),
            clock.now(),
        )
        .unwrap()
    }

    fn tick_after(table: &mut CrashTable, clock: &ManualClock, ms: i64) -> TickResult {
        clock.advance_ms(ms);
        table.tick(clock.now())
    }

    fn launch(table: &mut CrashTable, clock: &ManualClock) -> TickResult {
        let result = tick_after(table, clock, 5000);
        assert_eq!(result.snapshot.phase, RoundPhase::Running);
        result
    }

    #[test]
    fn test_cashout_before_crash_wins() {
        let clock = ManualClock::at_epoch();
        let mut table = table_crashing_at(3.4, &clock);

        let place = table.enqueue(Command::PlaceBet { account: ALICE, stake: 100 });
        let result = tick_after(&mut table, &clock, 100);
        assert_eq!(result.command_results[0].id, place);
        let bet = result.command_results[0].result.clone().unwrap();
        assert_eq!(table.balance(&ALICE).unwrap(), stake_amount(2400));

        launch(&mut table, &clock);

        // 1s after launch the curve is exactly 2.00x
        table.enqueue(Command::CashOut { bet_id: bet.id });
        let result = tick_after(&mut table, &clock, 1000);
        let won = result.command_results[0].result.clone().unwrap();

        assert_eq!(won.status, BetStatus::Won);
        assert_eq!(won.cashout_multiplier, Some(2.0));
        assert_eq!(won.payout, Some(stake_amount(200)));
        assert_eq!(table.balance(&ALICE).unwrap(), stake_amount(2600));
        assert_eq!(result.snapshot.current_multiplier, 2.0);
    }

    #[test]
    fn test_no_cashout_loses() {
        let clock = ManualClock::at_epoch();
        let mut table = table_crashing_at(3.4, &clock);

        table.enqueue(Command::PlaceBet { account: ALICE, stake: 100 });
        let bet = tick_after(&mut table, &clock, 100).command_results[0]
            .result
            .clone()
            .unwrap();
        launch(&mut table, &clock);

        let mut crash_tick = None;
        for _ in 0..40 {
            let result = tick_after(&mut table, &clock, 100);
            if result.snapshot.phase == RoundPhase::Crashed {
                crash_tick = Some(result);
                break;
            }
        }
        let result = crash_tick.unwrap();

        assert_eq!(result.snapshot.current_multiplier, 3.4);
        assert_eq!(result.snapshot.last_crash_point, Some(3.4));
        let lost = table.ledger().get(bet.id).unwrap();
        assert_eq!(lost.status, BetStatus::Lost);
        assert_eq!(lost.payout, Some(0));
        assert_eq!(table.balance(&ALICE).unwrap(), stake_amount(2400));
        assert!(result.events.iter().any(|e| matches!(
            e.data,
            RoundEventData::Crashed { crash_point, .. } if crash_point == 3.4
        )));
    }

    #[test]
    fn test_cashout_on_crossing_tick_settles_at_previous_multiplier() {
        let clock = ManualClock::at_epoch();
        let mut table = table_crashing_at(3.4, &clock);

        table.enqueue(Command::PlaceBet { account: ALICE, stake: 100 });
        tick_after(&mut table, &clock, 100);
        launch(&mut table, &clock);
        tick_after(&mut table, &clock, 1000);

        // Next tick lands at 4.00x, past the crash point
        table.enqueue(Command::CashOutAccount { account: ALICE });
        let result = tick_after(&mut table, &clock, 1000);
        let won = result.command_results[0].result.clone().unwrap();

        assert_eq!(won.cashout_multiplier, Some(2.0));
        assert!(won.cashout_multiplier.unwrap() < 3.4);
        assert_eq!(result.snapshot.phase, RoundPhase::Crashed);
        assert_eq!(table.balance(&ALICE).unwrap(), stake_amount(2600));
    }

    #[test]
    fn test_instant_bust_rejects_cashout() {
        let clock = ManualClock::at_epoch();
        let mut table = table_crashing_at(1.0, &clock);

        table.enqueue(Command::PlaceBet { account: ALICE, stake: 50 });
        tick_after(&mut table, &clock, 100);
        launch(&mut table, &clock);

        table.enqueue(Command::CashOutAccount { account: ALICE });
        let result = tick_after(&mut table, &clock, 100);
        assert_eq!(
            result.command_results[0].result,
            Err(BetError::InvalidState {
                expected: RoundPhase::Running,
                actual: RoundPhase::Crashed,
            })
        );
        assert_eq!(result.snapshot.phase, RoundPhase::Crashed);
    }

    #[test]
    fn test_commands_in_wrong_phase() {
        let clock = ManualClock::at_epoch();
        let mut table = table_crashing_at(3.4, &clock);
        launch(&mut table, &clock);

        table.enqueue(Command::PlaceBet { account: ALICE, stake: 100 });
        let result = tick_after(&mut table, &clock, 100);
        assert_eq!(
            result.command_results[0].result,
            Err(BetError::InvalidState {
                expected: RoundPhase::Waiting,
                actual: RoundPhase::Running,
            })
        );
        assert_eq!(table.balance(&ALICE).unwrap(), stake_amount(2500));
    }

    #[test]
    fn test_duplicate_and_insufficient() {
        let clock = ManualClock::at_epoch();
        let mut table = table_crashing_at(3.4, &clock);

        table.enqueue(Command::PlaceBet { account: ALICE, stake: 50 });
        table.enqueue(Command::PlaceBet { account: ALICE, stake: 50 });
        table.enqueue(Command::PlaceBet { account: BOB, stake: 5000 });
        let result = tick_after(&mut table, &clock, 100);

        assert!(result.command_results[0].result.is_ok());
        assert_eq!(
            result.command_results[1].result,
            Err(BetError::DuplicateBet { round_id: 1 })
        );
        assert!(matches!(
            result.command_results[2].result,
            Err(BetError::InsufficientFunds { .. })
        ));
        assert_eq!(table.balance(&BOB).unwrap(), stake_amount(2500));
    }

    #[test]
    fn test_every_bet_resolved_exactly_once() {
        let clock = ManualClock::at_epoch();
        let mut table = table_crashing_at(3.4, &clock);
        let mut resolutions: BTreeMap<BetId, usize> = BTreeMap::new();

        table.enqueue(Command::PlaceBet { account: ALICE, stake: 100 });
        table.enqueue(Command::PlaceBet { account: BOB, stake: 100 });
        tick_after(&mut table, &clock, 100);
        launch(&mut table, &clock);

        table.enqueue(Command::CashOutAccount { account: ALICE });
        table.enqueue(Command::CashOutAccount { account: ALICE });

        for _ in 0..80 {
            let result = tick_after(&mut table, &clock, 100);
            for event in &result.events {
                if let RoundEventData::BetResolved { bet } = &event.data {
                    *resolutions.entry(bet.id).or_default() += 1;
                }
            }
        }

        assert_eq!(resolutions.len(), 2);
        assert!(resolutions.values().all(|&n| n == 1));
        for account in [ALICE, BOB] {
            let bet = table.ledger().bet_for(1, &account).unwrap();
            assert!(bet.status.is_resolved());
        }
    }

    #[test]
    fn test_rounds_cycle_with_jitter() {
        let clock = ManualClock::at_epoch();
        let mut accounts = InMemoryAccounts::new();
        accounts.open_default(ALICE);
        let mut table = CrashTable::new(
            EngineConfig::for_variant(GameVariant::Aviator),
            Box::new(DeterministicRng::new(0xBEEF)),
            Box::new(accounts),
            clock.now(),
        )
        .unwrap();

        let steps = [50i64, 7, 130, 50, -20, 3, 250, 50, 0, 90];
        let mut phases = vec![table.engine().phase()];
        let mut last_multiplier = 1.0;
        let mut crashes = 0;

        for i in 0..20_000 {
            let result = tick_after(&mut table, &clock, steps[i % steps.len()]);
            let snap = &result.snapshot;

            if phases.last() != Some(&snap.phase) {
                assert_eq!(phases.last().map(|p| p.next()), Some(snap.phase));
                if snap.phase == RoundPhase::Running {
                    assert_eq!(snap.current_multiplier, 1.0);
                    last_multiplier = 1.0;
                }
                phases.push(snap.phase);
            }

            if snap.phase == RoundPhase::Running {
                assert!(snap.current_multiplier >= last_multiplier);
                last_multiplier = snap.current_multiplier;
            }

            for event in &result.events {
                if let RoundEventData::Crashed { crash_point, .. } = event.data {
                    assert!(crash_point >= 1.0);
                    assert_eq!(snap.current_multiplier, crash_point);
                    crashes += 1;
                }
            }
            assert!(table.history().len() <= 10);
        }

        assert!(crashes > 0);
        assert_eq!(table.history().len(), crashes.min(10));
    }

    #[test]
    fn test_seeded_cashouts_stay_below_crash_point() {
        let players: Vec<AccountId> = (1..=8u8).map(|i| AccountId::new([i; 16])).collect();
        let mut checked = 0;

        for seed in 0..8u64 {
            let clock = ManualClock::at_epoch();
            let mut accounts = InMemoryAccounts::new();
            for &account in &players {
                accounts.open_default(account);
            }
            let mut table = CrashTable::new(
                EngineConfig::for_variant(GameVariant::Aviator),
                Box::new(DeterministicRng::new(seed)),
                Box::new(accounts),
                clock.now(),
            )
            .unwrap();
            let mut behaviour = DeterministicRng::new(seed ^ 0x5EED);

            let mut crash_points: BTreeMap<RoundId, f64> = BTreeMap::new();
            let mut exits: Vec<(RoundId, f64)> = Vec::new();
            let mut resolutions: BTreeMap<BetId, usize> = BTreeMap::new();
            let mut placed: BTreeMap<BetId, RoundId> = BTreeMap::new();

            for _ in 0..5_000 {
                let round_id = table.engine().round_id();
                match table.engine().phase() {
                    RoundPhase::Waiting => {
                        for &account in &players {
                            if table.ledger().bet_for(round_id, &account).is_none() {
                                table.enqueue(Command::PlaceBet { account, stake: 25 });
                            }
                        }
                    }
                    RoundPhase::Running => {
                        for &account in &players {
                            if behaviour.next_f64() < 0.05 {
                                table.enqueue(Command::CashOutAccount { account });
                            }
                        }
                    }
                    RoundPhase::Crashed => {}
                }

                // -10..110 ms, backwards steps included
                let step = (behaviour.next_u64() % 120) as i64 - 10;
                let result = tick_after(&mut table, &clock, step);

                for outcome in &result.command_results {
                    if let Ok(bet) = &outcome.result {
                        if bet.is_pending() {
                            placed.insert(bet.id, bet.round_id);
                        }
                    }
                }
                for event in &result.events {
                    match &event.data {
                        RoundEventData::BetResolved { bet } => {
                            *resolutions.entry(bet.id).or_default() += 1;
                            if bet.status == BetStatus::Won {
                                let multiplier = bet.cashout_multiplier.unwrap();
                                exits.push((bet.round_id, multiplier));
                            }
                        }
                        RoundEventData::Crashed { round_id, crash_point } => {
                            crash_points.insert(*round_id, *crash_point);
                        }
                        _ => {}
                    }
                }
                for &account in &players {
                    assert!(table.balance(&account).unwrap() >= 0);
                }
            }

            assert!(crash_points.len() > 3, "seed {} crashed only {} rounds", seed, crash_points.len());
            assert!(resolutions.values().all(|&n| n == 1));

            for (round_id, multiplier) in &exits {
                if let Some(&crash_point) = crash_points.get(round_id) {
                    assert!(
                        *multiplier < crash_point,
                        "seed {} round {}: exit {} at or above crash {}",
                        seed,
                        round_id,
                        multiplier,
                        crash_point
                    );
                    checked += 1;
                }
            }

            // Every bet on a crashed round was resolved exactly once
            for (bet_id, round_id) in &placed {
                if crash_points.contains_key(round_id) {
                    assert_eq!(resolutions.get(bet_id), Some(&1), "bet {} unresolved", bet_id);
                }
            }
        }

        assert!(checked > 100, "only {} cashouts checked", checked);
    }

    #[test]
    fn test_first_tick_announces_round() {
        let clock = ManualClock::at_epoch();
        let mut table = table_crashing_at(2.0, &clock);

        let result = tick_after(&mut table, &clock, 100);
        assert_eq!(
            result.events[0].data,
            RoundEventData::RoundStarted { round_id: 1, countdown_ms: 5000 }
        );
        assert_eq!(result.snapshot.countdown_remaining_ms, Some(4900));
        assert!(tick_after(&mut table, &clock, 100).events.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.distribution_tiers[0].probability = 0.9;

        let result = CrashTable::new(
            config,
            Box::new(DeterministicRng::new(1)),
            Box::new(InMemoryAccounts::new()),
            Utc::now(),
        );
        assert!(matches!(result, Err(ConfigError::ProbabilitySum(_))));
    }
}
