//! Bet ledger and account provider.
//!
//! The ledger is the only component that moves money. Stakes are debited on
//! placement, payouts credited on cashout, and a crash resolves every bet
//! still pending without touching balances.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::money::{payout_for, stake_amount, Amount, AMOUNT_SCALE};
use crate::game::bet::{AccountId, Bet, BetDetails, BetId, BetStatus};
use crate::game::config::{EngineConfig, GameVariant};
use crate::game::error::{AccountError, BetError};
use crate::game::round::{RoundId, RoundPhase};

/// Stake buttons offered by the table, whole units.
pub const QUICK_STAKES: [u64; 4] = [25, 50, 125, 250];

/// Balance a new account opens with, whole units.
pub const STARTING_BALANCE: u64 = 2500;

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Balance store the ledger debits and credits.
///
/// Implementations must refuse any delta that would take a balance below
/// zero.
pub trait AccountProvider: Send {
    /// Current balance.
    fn balance(&self, account: &AccountId) -> Result<Amount, AccountError>;

    /// Apply a signed delta and return the new balance.
    fn apply_delta(&mut self, account: &AccountId, delta: Amount) -> Result<Amount, AccountError>;
}

/// In-process account store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAccounts {
    /// Balances (BTreeMap for deterministic iteration).
    balances: BTreeMap<AccountId, Amount>,
}

impl InMemoryAccounts {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or reset) an account with `balance`.
    pub fn open(&mut self, account: AccountId, balance: Amount) {
        self.balances.insert(account, balance);
    }

    /// Open an account with [`STARTING_BALANCE`].
    pub fn open_default(&mut self, account: AccountId) {
        self.open(account, stake_amount(STARTING_BALANCE));
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// No accounts open.
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

impl AccountProvider for InMemoryAccounts {
    fn balance(&self, account: &AccountId) -> Result<Amount, AccountError> {
        self.balances
            .get(account)
            .copied()
            .ok_or(AccountError::UnknownAccount(*account))
    }

    fn apply_delta(&mut self, account: &AccountId, delta: Amount) -> Result<Amount, AccountError> {
        let balance = self
            .balances
            .get_mut(account)
            .ok_or(AccountError::UnknownAccount(*account))?;

        let updated = balance.saturating_add(delta);
        if updated < 0 {
            return Err(AccountError::WouldOverdraw {
                balance: *balance,
                delta,
            });
        }

        *balance = updated;
        Ok(updated)
    }
}

// =============================================================================
// LIMITS
// =============================================================================

/// Table stake limits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BetLimits {
    /// Minimum stake, whole units.
    pub min_bet: u64,
    /// Largest stake as a fraction of balance.
    pub max_fraction: f64,
}

impl BetLimits {
    /// Limits from an engine config.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            min_bet: config.min_bet,
            max_fraction: config.max_bet_multiplier_of_balance,
        }
    }

    /// Largest stake allowed for `balance`, whole units.
    pub fn max_stake(&self, balance: Amount) -> u64 {
        if balance <= 0 {
            return 0;
        }
        let allowed = balance as f64 * self.max_fraction / AMOUNT_SCALE as f64;
        allowed.floor() as u64
    }

    /// Double `stake`, capped at the maximum for `balance`.
    pub fn double(&self, stake: u64, balance: Amount) -> u64 {
        stake.saturating_mul(2).min(self.max_stake(balance))
    }

    /// Half the balance in whole units, capped at the maximum for `balance`.
    pub fn half_balance(&self, balance: Amount) -> u64 {
        let half = (balance.max(0) / AMOUNT_SCALE / 2) as u64;
        half.min(self.max_stake(balance))
    }

    /// Check `stake` against `balance`.
    pub fn check(&self, stake: u64, balance: Amount) -> Result<(), BetError> {
        let requested = stake_amount(stake);
        if requested > balance {
            return Err(BetError::InsufficientFunds {
                stake: requested,
                balance,
            });
        }

        let max = self.max_stake(balance);
        if stake < self.min_bet || stake > max {
            return Err(BetError::StakeOutOfRange {
                stake,
                min: self.min_bet,
                max,
            });
        }
        Ok(())
    }
}

// =============================================================================
// LEDGER
// =============================================================================

/// What the ledger needs to know about the round a command runs against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundView {
    /// Current round.
    pub id: RoundId,
    /// Phase commands are checked against.
    pub phase: RoundPhase,
    /// Multiplier a cashout settles at.
    pub multiplier: f64,
    /// Table tick the command is applied on.
    pub tick: u64,
    /// Time since launch.
    pub elapsed: Duration,
}

/// Bets for every round still within retention.
#[derive(Debug)]
pub struct BetLedger {
    /// All bets by id (ids are monotonic, so this is placement order).
    bets: BTreeMap<BetId, Bet>,
    /// One bet per (round, account).
    by_round: BTreeMap<(RoundId, AccountId), BetId>,
    next_id: u64,
    limits: BetLimits,
    variant: GameVariant,
}

impl BetLedger {
    /// Empty ledger.
    pub fn new(limits: BetLimits, variant: GameVariant) -> Self {
        Self {
            bets: BTreeMap::new(),
            by_round: BTreeMap::new(),
            next_id: 1,
            limits,
            variant,
        }
    }

    /// Stake limits.
    pub fn limits(&self) -> &BetLimits {
        &self.limits
    }

    /// Place a bet on the current round and debit the stake.
    pub fn place_bet(
        &mut self,
        accounts: &mut dyn AccountProvider,
        round: &RoundView,
        account: AccountId,
        stake: u64,
        now: DateTime<Utc>,
    ) -> Result<Bet, BetError> {
        if round.phase != RoundPhase::Waiting {
            return Err(BetError::InvalidState {
                expected: RoundPhase::Waiting,
                actual: round.phase,
            });
        }
        if self.by_round.contains_key(&(round.id, account)) {
            return Err(BetError::DuplicateBet { round_id: round.id });
        }

        let balance = accounts.balance(&account)?;
        self.limits.check(stake, balance)?;
        accounts.apply_delta(&account, -stake_amount(stake))?;

        let id = BetId(self.next_id);
        self.next_id += 1;

        let bet = Bet {
            id,
            round_id: round.id,
            account,
            stake,
            status: BetStatus::Pending,
            cashout_multiplier: None,
            payout: None,
            placed_at: now,
            resolved_at: None,
            details: BetDetails::pending(self.variant),
        };

        debug!("Bet {} placed: {} by {} on round {}", id, stake, account, round.id);

        self.by_round.insert((round.id, account), id);
        self.bets.insert(id, bet.clone());
        Ok(bet)
    }

    /// Cash out a bet at the round's current multiplier and credit the payout.
    pub fn cash_out(
        &mut self,
        accounts: &mut dyn AccountProvider,
        round: &RoundView,
        bet_id: BetId,
        now: DateTime<Utc>,
    ) -> Result<Bet, BetError> {
        let bet = self.bets.get_mut(&bet_id).ok_or(BetError::NotFound(bet_id))?;

        if bet.status.is_resolved() {
            return Err(BetError::AlreadyResolved(bet_id));
        }
        if round.phase != RoundPhase::Running {
            return Err(BetError::InvalidState {
                expected: RoundPhase::Running,
                actual: round.phase,
            });
        }
        // Only bets on the flying round can exit
        if bet.round_id != round.id {
            return Err(BetError::NotFound(bet_id));
        }

        let payout = payout_for(bet.stake, round.multiplier);
        accounts.apply_delta(&bet.account, payout)?;

        bet.status = BetStatus::Won;
        bet.cashout_multiplier = Some(round.multiplier);
        bet.payout = Some(payout);
        bet.resolved_at = Some(now);
        bet.details = bet
            .details
            .with_exit(round.tick, round.elapsed.as_millis() as u64);

        debug!("Bet {} cashed out @ {:.2}x", bet_id, round.multiplier);
        Ok(bet.clone())
    }

    /// Cash out the account's bet on the current round.
    pub fn cash_out_account(
        &mut self,
        accounts: &mut dyn AccountProvider,
        round: &RoundView,
        account: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Bet, BetError> {
        let bet_id = self
            .by_round
            .get(&(round.id, account))
            .copied()
            .ok_or(BetError::NotFound(BetId::NONE))?;
        self.cash_out(accounts, round, bet_id, now)
    }

    /// Mark every pending bet on `round_id` as LOST. Returns the resolved bets.
    ///
    /// Balances are untouched; stakes were debited at placement.
    pub fn resolve_crash(&mut self, round_id: RoundId, now: DateTime<Utc>) -> Vec<Bet> {
        let ids: Vec<BetId> = self
            .by_round
            .range((round_id, AccountId::default())..=(round_id, AccountId([0xFF; 16])))
            .map(|(_, id)| *id)
            .collect();

        let mut lost = Vec::new();
        for id in ids {
            if let Some(bet) = self.bets.get_mut(&id) {
                if bet.is_pending() {
                    bet.status = BetStatus::Lost;
                    bet.payout = Some(0);
                    bet.resolved_at = Some(now);
                    lost.push(bet.clone());
                }
            }
        }

        debug!("Round {} resolved: {} bets bust", round_id, lost.len());
        lost
    }

    /// Drop resolved bets from rounds more than `retention` rounds behind
    /// `current_round`. Pending bets are always kept.
    pub fn prune(&mut self, current_round: RoundId, retention: u64) -> usize {
        let cutoff = current_round.saturating_sub(retention);
        let before = self.bets.len();

        self.bets
            .retain(|_, bet| bet.is_pending() || bet.round_id >= cutoff);
        let bets = &self.bets;
        self.by_round.retain(|_, id| bets.contains_key(id));

        before - self.bets.len()
    }

    /// Look up a bet.
    pub fn get(&self, bet_id: BetId) -> Option<&Bet> {
        self.bets.get(&bet_id)
    }

    /// Account's bet on a round.
    pub fn bet_for(&self, round_id: RoundId, account: &AccountId) -> Option<&Bet> {
        self.by_round
            .get(&(round_id, *account))
            .and_then(|id| self.bets.get(id))
    }

    /// Account's bets, most recent first.
    pub fn bets_for_account(&self, account: &AccountId) -> Vec<&Bet> {
        self.bets
            .values()
            .rev()
            .filter(|bet| bet.account == *account)
            .collect()
    }

    /// Number of bets held.
    pub fn len(&self) -> usize {
        self.bets.len()
    }

    /// No bets held.
    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }
}
