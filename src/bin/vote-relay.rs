//! vote-relay CLI: runs the relay worker and offers a few operator commands.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use vote_relay::config::Config;
use vote_relay::config::environment::{self, Bootstrap};
use vote_relay::model::VoteMessage;
use vote_relay::queue::RedisQueue;
use vote_relay::relay::{DEFAULT_POLL_INTERVAL, Relay, RelayConfig};
use vote_relay::store::PostgresStore;
use vote_relay::supervisor::{DEFAULT_RETRY_DELAY, Resource, Supervisor};
use vote_relay::telemetry::{TelemetryConfig, TelemetryGuard, init_telemetry};

#[derive(Parser)]
#[command(name = "vote-relay", about = "Relay votes from Redis into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay worker (default)
    Run(RunArgs),
    /// Push a single vote onto the queue
    Enqueue {
        voter_id: String,
        vote: String,
    },
    /// Print the current vote counts from the store
    Tally,
}

#[derive(Args, Debug, PartialEq, Eq)]
struct RunArgs {
    /// Pause between loop iterations
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    poll_interval_ms: u64,
    /// Pause between failed connection attempts
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY.as_millis() as u64)]
    retry_delay_ms: u64,
    /// Redis list to drain (overrides VOTE_QUEUE)
    #[arg(long)]
    queue: Option<String>,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            queue: None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let bootstrap = environment::load_dotenv_unless_container();
    let cli = Cli::parse();

    match run_cli(cli, bootstrap).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Fatal errors come from startup, before the subscriber is up.
            eprintln!("fatal error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_cli(cli: Cli, bootstrap: Bootstrap) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;

    match cli.command.unwrap_or_else(|| Command::Run(RunArgs::default())) {
        Command::Run(RunArgs {
            poll_interval_ms,
            retry_delay_ms,
            queue,
        }) => {
            if let Some(queue) = queue {
                config.queue.name = queue;
            }
            let guard = init_telemetry(TelemetryConfig {
                endpoint: config.otel_endpoint.clone(),
                service_name: "vote-relay".to_string(),
                log_level: config.log_level.clone(),
            })?;
            log_bootstrap(bootstrap);
            cmd_run(
                &config,
                Duration::from_millis(poll_interval_ms),
                Duration::from_millis(retry_delay_ms),
                &guard,
            )
            .await;
            Ok(())
        }
        Command::Enqueue { voter_id, vote } => cmd_enqueue(&config, voter_id, vote).await,
        Command::Tally => cmd_tally(&config).await,
    }
}

fn log_bootstrap(bootstrap: Bootstrap) {
    match bootstrap {
        Bootstrap::Container => info!("running in container"),
        Bootstrap::Local { dotenv_loaded } => info!(dotenv_loaded, "running locally"),
    }
}

async fn cmd_run(
    config: &Config,
    poll_interval: Duration,
    retry_delay: Duration,
    guard: &TelemetryGuard,
) {
    let queue = Supervisor::new(RedisQueue::new(&config.queue)).with_retry_delay(retry_delay);
    let store = Supervisor::new(PostgresStore::new(&config.store)).with_retry_delay(retry_delay);

    let mut relay = Relay::new(queue, store, RelayConfig { poll_interval });

    let shutdown = relay.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        shutdown.shutdown();
    });

    info!(
        queue = %config.queue.name,
        redis_host = %config.queue.host,
        postgres_host = %config.store.host,
        "starting relay"
    );
    relay.run().await;
    guard.force_flush();
}

async fn cmd_enqueue(config: &Config, voter_id: String, vote: String) -> anyhow::Result<()> {
    let mut redis = RedisQueue::new(&config.queue);
    let addr = redis.resolve().await?;
    let mut queue = redis.open(&addr).await?;

    queue.push(&VoteMessage::new(voter_id, vote)).await?;
    let pending = queue.pending().await?;
    println!("Queued on '{}' ({pending} pending)", config.queue.name);
    Ok(())
}

async fn cmd_tally(config: &Config) -> anyhow::Result<()> {
    let mut postgres = PostgresStore::new(&config.store);
    let mut repo = postgres.open(&()).await?;

    let tallies = repo.tally().await?;
    if tallies.is_empty() {
        println!("No votes recorded.");
        return Ok(());
    }

    println!("{:<20}  VOTES", "CHOICE");
    println!("{}", "-".repeat(30));
    let total: i64 = tallies.iter().map(|t| t.count).sum();
    for tally in &tallies {
        println!("{:<20}  {}", tally.choice, tally.count);
    }
    println!("\n{total} vote(s)");
    Ok(())
}
