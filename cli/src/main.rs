//! ChainNotify CLI — run notification channels and manage feed cursors.
//!
//! # Commands
//! ```text
//! chainnotify run     [--interval-secs N]
//! chainnotify cycle   --channel <ID> [--from A --to B] [--simulate]
//! chainnotify cursor  list | get <FEED> | set <FEED> <HEIGHT> | reset <FEED>
//! chainnotify feeds
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use chainnotify_core::{
    BlockRange, ChannelOrchestrator, CursorStore, CycleOptions, FeedPoller, MemoryCursorStore,
};
use chainnotify_evm::{EvmGateway, EvmMetadataResolver, HttpTransport, RpcTransport};
use chainnotify_storage::SqliteCursorStore;

mod config;
mod sink;
mod telemetry;

use config::AppConfig;

#[derive(Parser)]
#[command(
    name = "chainnotify",
    about = "On-chain marketplace event notifications — ChainNotify CLI",
    long_about = "
ChainNotify polls NFT marketplace and bid contracts on Ethereum and Polygon,
turns new events into notifications and remembers the last processed block
per feed.

ENVIRONMENT VARIABLES:
  CHAINNOTIFY_CONFIG         Path to the YAML config (default: chainnotify.yaml)
  CHAINNOTIFY_RPC_ETHEREUM   Ethereum RPC URL (overrides config)
  CHAINNOTIFY_RPC_POLYGON    Polygon RPC URL (overrides config)
  RUST_LOG                   Log filter (overrides config)
",
    version
)]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true, env = "CHAINNOTIFY_CONFIG", default_value = "chainnotify.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every channel on a fixed interval until interrupted
    Run {
        /// Seconds between cycles (default: config `interval_secs`)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Run one cycle of one channel and print the report as JSON
    Cycle {
        /// Channel id
        #[arg(long)]
        channel: String,
        /// First block of an explicit range (inclusive)
        #[arg(long, requires = "to")]
        from: Option<u64>,
        /// Last block of an explicit range (inclusive)
        #[arg(long, requires = "from")]
        to: Option<u64>,
        /// Flag every notification as simulated
        #[arg(long)]
        simulate: bool,
    },

    /// Inspect or override feed cursors
    Cursor {
        #[command(subcommand)]
        action: CursorAction,
    },

    /// List configured channels and feeds
    Feeds,
}

#[derive(Subcommand)]
enum CursorAction {
    /// List every stored cursor
    List,
    /// Show the cursor of one feed
    Get { feed: String },
    /// Overwrite the cursor of one feed
    Set { feed: String, height: u64 },
    /// Delete the cursor so the feed restarts from the chain head
    Reset { feed: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    telemetry::init_tracing(&config.log);

    match cli.command {
        Commands::Run { interval_secs } => {
            let interval = interval_secs.unwrap_or(config.interval_secs);
            cmd_run(&config, interval).await
        }
        Commands::Cycle {
            channel,
            from,
            to,
            simulate,
        } => {
            let range_override = from.zip(to).map(|(from, to)| BlockRange::new(from, to));
            cmd_cycle(
                &config,
                &channel,
                CycleOptions {
                    range_override,
                    simulate,
                },
            )
            .await
        }
        Commands::Cursor { action } => cmd_cursor(&config, action).await,
        Commands::Feeds => {
            cmd_feeds(&config);
            Ok(())
        }
    }
}

// ─── Wiring ───────────────────────────────────────────────────────────────────

async fn open_store(config: &AppConfig) -> Result<Arc<dyn CursorStore>> {
    if config.database == ":memory:" {
        tracing::warn!("Using an in-memory cursor store; cursors are lost on exit");
        return Ok(Arc::new(MemoryCursorStore::new()));
    }
    let store = SqliteCursorStore::open(&config.database)
        .await
        .with_context(|| format!("opening cursor database {}", config.database))?;
    Ok(Arc::new(store))
}

async fn build_orchestrator(config: &AppConfig) -> Result<ChannelOrchestrator> {
    let cursors = open_store(config).await?;
    let timeout = Duration::from_millis(config.evm.request_timeout_ms);

    let mut gateway = EvmGateway::new(config.evm.max_block_range);
    let mut resolver = EvmMetadataResolver::new();
    for chain in config.chains_in_use() {
        let url = config
            .rpc
            .get(&chain)
            .with_context(|| format!("no RPC URL configured for {chain}"))?;
        let transport: Arc<dyn RpcTransport> = Arc::new(
            HttpTransport::new(url.clone(), timeout)
                .with_context(|| format!("creating RPC transport for {chain}"))?,
        );
        gateway = gateway.with_chain(chain, transport.clone());
        resolver = resolver.with_chain(chain, transport);
    }

    let sink = config.sink.build()?;
    let poller = FeedPoller::new(
        Arc::new(gateway),
        cursors,
        Arc::new(resolver),
        sink,
        config.notifier.poller.clone(),
    );
    Ok(ChannelOrchestrator::new(config.notifier.clone(), poller)?)
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn cmd_run(config: &AppConfig, interval_secs: u64) -> Result<()> {
    if interval_secs == 0 {
        bail!("--interval-secs must be at least 1");
    }
    let orchestrator = build_orchestrator(config).await?;
    tracing::info!(
        channels = orchestrator.channels().len(),
        interval_secs,
        "Scheduler started"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    let orchestrator = &orchestrator;
    schedule(Duration::from_secs(interval_secs), shutdown, move || async move {
        for report in orchestrator.run_all(CycleOptions::default()).await {
            if report.failed() > 0 {
                tracing::warn!(
                    channel = %report.channel_id,
                    failed = report.failed(),
                    "Cycle finished with failed feeds"
                );
            }
        }
    })
    .await;
    tracing::info!("Shutting down");
    Ok(())
}

/// Run `cycle` every `period` until `shutdown` resolves. Missed ticks are
/// skipped, and a shutdown during a cycle abandons it; feeds that had not
/// finished keep their previous cursors.
async fn schedule<C, F>(period: Duration, shutdown: impl Future<Output = ()>, mut cycle: C)
where
    C: FnMut() -> F,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => return,
        }
        tokio::select! {
            _ = cycle() => {}
            _ = &mut shutdown => {
                tracing::warn!("Shutdown requested mid-cycle");
                return;
            }
        }
    }
}

async fn cmd_cycle(config: &AppConfig, channel: &str, opts: CycleOptions) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    let report = orchestrator.run_cycle(channel, opts).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.failed() > 0 {
        bail!("{} feed(s) failed in channel '{channel}'", report.failed());
    }
    Ok(())
}

async fn cmd_cursor(config: &AppConfig, action: CursorAction) -> Result<()> {
    let store = open_store(config).await?;
    match action {
        CursorAction::List => {
            let cursors = store.list().await?;
            if cursors.is_empty() {
                println!("No cursors stored.");
            }
            for c in cursors {
                println!("{:<32} {:>12}  updated_at={}", c.feed_id, c.last_processed_block, c.updated_at);
            }
        }
        CursorAction::Get { feed } => match store.get(&feed).await? {
            Some(c) => println!("{} {}", c.feed_id, c.last_processed_block),
            None => println!("{feed}: no cursor (next cycle starts at the chain head)"),
        },
        CursorAction::Set { feed, height } => {
            ensure_known_feed(config, &feed)?;
            store.advance(&feed, height).await?;
            println!("{feed} -> {height}");
        }
        CursorAction::Reset { feed } => {
            ensure_known_feed(config, &feed)?;
            store.reset(&feed).await?;
            println!("{feed}: cursor deleted");
        }
    }
    Ok(())
}

fn ensure_known_feed(config: &AppConfig, feed: &str) -> Result<()> {
    let known = config
        .notifier
        .channels
        .iter()
        .any(|c| c.feeds.iter().any(|f| f.id == feed));
    if !known {
        bail!("unknown feed '{feed}'");
    }
    Ok(())
}

fn cmd_feeds(config: &AppConfig) {
    for channel in &config.notifier.channels {
        println!("{} ({})", channel.id, channel.name);
        for feed in &channel.feeds {
            let payment = feed
                .payment_token
                .map(|t| format!(" priced in {t}"))
                .unwrap_or_default();
            println!(
                "  {:<24} {:<9} {:<13} {}{payment}",
                feed.id, feed.chain, feed.kind, feed.contract
            );
            println!("  {:<24} {}", "", feed.kind.signature());
        }
    }
}
