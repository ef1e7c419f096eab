//! Table Driver
//!
//! Runs a [`CrashTable`] on a tokio task. One interval timer owns all table
//! timing (countdown, flight and settle are all measured on ticks), so
//! stopping it leaves nothing behind that could touch the table later.
//!
//! Commands arrive over an mpsc channel and are queued on the table; each
//! caller is answered after the tick that applies its command.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::clock::Clock;
use crate::game::bet::{AccountId, Bet, BetId};
use crate::game::error::BetError;
use crate::game::events::RoundEvent;
use crate::game::table::{Command, CommandId, CrashTable, RoundSnapshot};
use crate::runtime::sink::{dispatch, RenderSink};

/// Command channel depth.
const COMMAND_BUFFER: usize = 256;

/// Event broadcast depth.
const EVENT_BUFFER: usize = 1024;

type Reply = oneshot::Sender<Result<Bet, DriverError>>;

/// Driver errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    /// The driver has been shut down.
    #[error("Table driver stopped")]
    Stopped,

    /// The command was applied and failed.
    #[error(transparent)]
    Bet(#[from] BetError),

    /// The driver task panicked.
    #[error("Table task failed: {0}")]
    Task(String),
}

struct Request {
    command: Command,
    reply: Reply,
}

/// Cloneable command surface for a running table.
#[derive(Clone)]
pub struct TableClient {
    commands: mpsc::Sender<Request>,
    events: broadcast::Sender<RoundEvent>,
    snapshots: watch::Receiver<RoundSnapshot>,
}

impl TableClient {
    /// Bet `stake` whole units on the current round.
    pub async fn place_bet(&self, account: AccountId, stake: u64) -> Result<Bet, DriverError> {
        self.send(Command::PlaceBet { account, stake }).await
    }

    /// Cash out a bet.
    pub async fn cash_out(&self, bet_id: BetId) -> Result<Bet, DriverError> {
        self.send(Command::CashOut { bet_id }).await
    }

    /// Cash out the account's bet on the current round.
    pub async fn cash_out_account(&self, account: AccountId) -> Result<Bet, DriverError> {
        self.send(Command::CashOutAccount { account }).await
    }

    async fn send(&self, command: Command) -> Result<Bet, DriverError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Request { command, reply })
            .await
            .map_err(|_| DriverError::Stopped)?;
        response.await.map_err(|_| DriverError::Stopped)?
    }

    /// Subscribe to round events.
    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> RoundSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Watch snapshots as they are published.
    pub fn snapshots(&self) -> watch::Receiver<RoundSnapshot> {
        self.snapshots.clone()
    }
}

/// Owner of a running table. Dropping it stops the driver.
pub struct TableHandle {
    client: TableClient,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<CrashTable>,
}

impl TableHandle {
    /// A cloneable command surface.
    pub fn client(&self) -> TableClient {
        self.client.clone()
    }

    /// Bet `stake` whole units on the current round.
    pub async fn place_bet(&self, account: AccountId, stake: u64) -> Result<Bet, DriverError> {
        self.client.place_bet(account, stake).await
    }

    /// Cash out a bet.
    pub async fn cash_out(&self, bet_id: BetId) -> Result<Bet, DriverError> {
        self.client.cash_out(bet_id).await
    }

    /// Cash out the account's bet on the current round.
    pub async fn cash_out_account(&self, account: AccountId) -> Result<Bet, DriverError> {
        self.client.cash_out_account(account).await
    }

    /// Subscribe to round events.
    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.client.subscribe()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> RoundSnapshot {
        self.client.snapshot()
    }

    /// Stop the timer, fail queued commands with [`DriverError::Stopped`]
    /// and hand back the table.
    pub async fn shutdown(mut self) -> Result<CrashTable, DriverError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        (&mut self.task)
            .await
            .map_err(|e| DriverError::Task(e.to_string()))
    }
}

/// Start driving `table` on the current tokio runtime.
pub fn spawn_table(
    table: CrashTable,
    clock: Arc<dyn Clock>,
    sink: Box<dyn RenderSink>,
) -> TableHandle {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(table.snapshot(clock.now()));
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(run_table(
        table,
        clock,
        sink,
        commands_rx,
        events_tx.clone(),
        snapshot_tx,
        shutdown_rx,
    ));

    TableHandle {
        client: TableClient {
            commands: commands_tx,
            events: events_tx,
            snapshots: snapshot_rx,
        },
        shutdown: Some(shutdown_tx),
        task,
    }
}

async fn run_table(
    mut table: CrashTable,
    clock: Arc<dyn Clock>,
    mut sink: Box<dyn RenderSink>,
    mut commands: mpsc::Receiver<Request>,
    events: broadcast::Sender<RoundEvent>,
    snapshots: watch::Sender<RoundSnapshot>,
    mut shutdown: oneshot::Receiver<()>,
) -> CrashTable {
    let mut tick_interval = interval(table.config().tick_interval());
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut waiting: BTreeMap<CommandId, Reply> = BTreeMap::new();

    info!(
        "Table driver started: {} @ {:?}/tick",
        table.config().variant.name(),
        table.config().tick_interval()
    );

    loop {
        tokio::select! {
            biased;

            // Explicit shutdown, or the handle was dropped
            _ = &mut shutdown => break,

            Some(request) = commands.recv() => {
                let id = table.enqueue(request.command);
                waiting.insert(id, request.reply);
            }

            _ = tick_interval.tick() => {
                let result = table.tick(clock.now());

                for outcome in &result.command_results {
                    if let Some(reply) = waiting.remove(&outcome.id) {
                        let _ = reply.send(outcome.result.clone().map_err(DriverError::Bet));
                    }
                }

                dispatch(sink.as_mut(), &result);

                for event in result.events {
                    // No subscribers is fine
                    let _ = events.send(event);
                }
                let _ = snapshots.send(result.snapshot);
            }
        }
    }

    // Teardown: nothing queued survives the driver
    let dropped = table.drain_queue().len();
    for (_, reply) in waiting {
        let _ = reply.send(Err(DriverError::Stopped));
    }
    commands.close();
    while let Ok(request) = commands.try_recv() {
        let _ = request.reply.send(Err(DriverError::Stopped));
    }

    debug!("Dropped {} queued commands", dropped);
    info!("Table driver stopped after {} ticks", table.tick_count());
    table
}
