//! Crash Round Server
//!
//! Runs a table with a few bots. By default the rounds are simulated on a
//! virtual clock and finish instantly; `--live` drives the table in real
//! time through the tokio driver.
//!
//! ```text
//! crash-round-server [--variant crash|aviator] [--config FILE]
//!                    [--rounds N] [--seed N] [--live]
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crash_round::{
    core::{
        clock::{Clock, ManualClock, TokioClock},
        money::from_amount,
        rng::{derive_table_seed, DeterministicRng},
    },
    game::{
        bet::AccountId,
        curve::MultiplierCurve,
        events::RoundEventData,
        history::CrashBand,
        ledger::{InMemoryAccounts, QUICK_STAKES},
        round::RoundId,
        table::{Command, CrashTable},
        EngineConfig, GameVariant, RoundPhase,
    },
    runtime::{dispatch, spawn_table, TracingSink},
    VERSION,
};

/// Command-line options.
#[derive(Debug)]
struct Options {
    variant: Option<GameVariant>,
    config: Option<PathBuf>,
    rounds: u64,
    seed: Option<u64>,
    live: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            variant: None,
            config: None,
            rounds: 5,
            seed: None,
            live: false,
        }
    }
}

/// A player that always bets the same stake and exits at a fixed target.
#[derive(Clone, Copy, Debug)]
struct Bot {
    account: AccountId,
    stake: u64,
    target: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let options = parse_args(std::env::args().skip(1))?;
    let config = match &options.config {
        Some(path) => {
            let config = EngineConfig::load_with_default(path, options.variant.unwrap_or_default())
                .with_context(|| format!("loading config {}", path.display()))?;
            if let Some(variant) = options.variant.filter(|v| *v != config.variant) {
                bail!(
                    "--variant {} conflicts with variant {} in {}",
                    variant.name(),
                    config.variant.name(),
                    path.display()
                );
            }
            config
        }
        None => EngineConfig::for_variant(options.variant.unwrap_or_default()),
    };

    let seed = options.seed.unwrap_or_else(fresh_seed);

    info!("Crash Round Server v{}", VERSION);
    info!(
        "Variant: {}, countdown {}s, settle {}s, tick {}ms",
        config.variant.name(),
        config.countdown_seconds,
        config.settle_seconds,
        config.tick_interval_ms
    );
    info!("RNG Seed: {}", seed);

    let bots = make_bots();
    if options.live {
        run_live(config, seed, options.rounds, &bots).await
    } else {
        run_simulated(config, seed, options.rounds, &bots)
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Options> {
    let mut options = Options::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--variant" => {
                let name = args.next().context("--variant needs a value")?;
                options.variant = Some(
                    GameVariant::from_name(&name)
                        .with_context(|| format!("unknown variant '{}'", name))?,
                );
            }
            "--config" => {
                options.config = Some(args.next().context("--config needs a path")?.into());
            }
            "--rounds" => {
                options.rounds = args
                    .next()
                    .context("--rounds needs a value")?
                    .parse()
                    .context("--rounds must be a number")?;
            }
            "--seed" => {
                options.seed = Some(
                    args.next()
                        .context("--seed needs a value")?
                        .parse()
                        .context("--seed must be a number")?,
                );
            }
            "--live" => options.live = true,
            other => bail!("unknown argument '{}'", other),
        }
    }
    Ok(options)
}

/// Seed from fresh entropy and a random table id.
fn fresh_seed() -> u64 {
    let mut entropy = [0u8; 32];
    entropy[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    entropy[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    let table_id = uuid::Uuid::new_v4().into_bytes();
    derive_table_seed(&entropy, &table_id)
}

fn make_bots() -> Vec<Bot> {
    [1.5, 2.0, 5.0]
        .iter()
        .zip(QUICK_STAKES.iter())
        .map(|(&target, &stake)| Bot {
            account: AccountId::random(),
            stake,
            target,
        })
        .collect()
}

fn open_accounts(bots: &[Bot]) -> InMemoryAccounts {
    let mut accounts = InMemoryAccounts::new();
    for bot in bots {
        accounts.open_default(bot.account);
        info!("Bot {} bets {} and exits at {:.2}x", bot.account, bot.stake, bot.target);
    }
    accounts
}

/// Run rounds on a virtual clock, as fast as the CPU allows.
fn run_simulated(config: EngineConfig, seed: u64, rounds: u64, bots: &[Bot]) -> anyhow::Result<()> {
    info!("=== Simulating {} rounds ===", rounds);

    let clock = ManualClock::at_epoch();
    let step = config.tick_interval_ms as i64;
    let mut table = CrashTable::new(
        config,
        Box::new(DeterministicRng::new(seed)),
        Box::new(open_accounts(bots)),
        clock.now(),
    )?;
    let mut sink = TracingSink;

    // Last round each bot bet on / asked to cash out of
    let mut placed: BTreeMap<AccountId, RoundId> = BTreeMap::new();
    let mut exited: BTreeMap<AccountId, RoundId> = BTreeMap::new();
    let mut crashes = 0;

    while crashes < rounds {
        let round_id = table.engine().round_id();
        let phase = table.engine().phase();
        let multiplier = table.engine().current_multiplier();

        for bot in bots {
            match phase {
                RoundPhase::Waiting if placed.get(&bot.account) != Some(&round_id) => {
                    table.enqueue(Command::PlaceBet {
                        account: bot.account,
                        stake: bot.stake,
                    });
                    placed.insert(bot.account, round_id);
                }
                RoundPhase::Running
                    if multiplier >= bot.target && exited.get(&bot.account) != Some(&round_id) =>
                {
                    table.enqueue(Command::CashOutAccount { account: bot.account });
                    exited.insert(bot.account, round_id);
                }
                _ => {}
            }
        }

        clock.advance_ms(step);
        let result = table.tick(clock.now());
        dispatch(&mut sink, &result);

        for outcome in &result.command_results {
            if let Err(e) = &outcome.result {
                warn!("Bot command {} failed: {}", outcome.id, e);
            }
        }
        crashes += result
            .events
            .iter()
            .filter(|e| matches!(e.data, RoundEventData::Crashed { .. }))
            .count() as u64;
    }

    report(&table, bots)
}

/// Run rounds in real time through the tokio driver.
async fn run_live(config: EngineConfig, seed: u64, rounds: u64, bots: &[Bot]) -> anyhow::Result<()> {
    info!("=== Running {} live rounds ===", rounds);

    let curve = MultiplierCurve::new(config.curve)?;
    let clock = Arc::new(TokioClock::new());
    let table = CrashTable::new(
        config,
        Box::new(DeterministicRng::new(seed)),
        Box::new(open_accounts(bots)),
        clock.now(),
    )?;

    let handle = spawn_table(table, clock, Box::new(TracingSink));
    let mut events = handle.subscribe();
    let mut crashes = 0;

    while crashes < rounds {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event stream lagged, skipped {}", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event.data {
            RoundEventData::RoundStarted { .. } => {
                for bot in bots {
                    if let Err(e) = handle.place_bet(bot.account, bot.stake).await {
                        warn!("Bot {} could not bet: {}", bot.account, e);
                    }
                }
            }
            RoundEventData::Launched { .. } => {
                for bot in bots {
                    let client = handle.client();
                    let wait = curve.time_to_reach(bot.target);
                    let account = bot.account;
                    tokio::spawn(async move {
                        tokio::time::sleep(wait).await;
                        if let Err(e) = client.cash_out_account(account).await {
                            info!("Bot {} missed its exit: {}", account, e);
                        }
                    });
                }
            }
            RoundEventData::Crashed { .. } => crashes += 1,
            RoundEventData::BetPlaced { .. } | RoundEventData::BetResolved { .. } => {}
        }
    }

    let table = handle.shutdown().await?;
    report(&table, bots)
}

fn report(table: &CrashTable, bots: &[Bot]) -> anyhow::Result<()> {
    info!("=== Results ===");

    for bot in bots {
        let balance = table.balance(&bot.account)?;
        let bets = table.ledger().bets_for_account(&bot.account);
        let won = bets.iter().filter(|b| b.cashout_multiplier.is_some()).count();
        info!(
            "Bot {} ({:.2}x): balance {:.2}, won {}/{}",
            bot.account,
            bot.target,
            from_amount(balance),
            won,
            bets.len()
        );
    }

    let history = table.history();
    let line: Vec<String> = history
        .iter()
        .map(|e| {
            let band = match e.band() {
                CrashBand::High => "+",
                CrashBand::Medium => "~",
                CrashBand::Low => "-",
            };
            format!("{:.2}x{}", e.crash_point, band)
        })
        .collect();
    info!("History: {}", line.join(" "));
    if let (Some(avg), Some(best), Some(worst)) =
        (history.average(), history.best(), history.worst())
    {
        info!(
            "Crash points over {} rounds: average {:.2}x, best {:.2}x, worst {:.2}x",
            history.len(),
            avg,
            best,
            worst
        );
    }
    info!("Ticks: {}", table.tick_count());
    Ok(())
}
