//! skystats-daemon - Post daily profile statistics to Bluesky
//!
//! Logs in once at startup, then once per day reads the account's post,
//! follow and follower counts and publishes the change since the last post.

use chrono::{DateTime, Local, NaiveTime};
use clap::Parser;
use libskystats::credentials::FileSessionStore;
use libskystats::scheduling::{duration_until, next_run_after};
use libskystats::xrpc::bsky::BskyXrpc;
use libskystats::{BotContext, Config, Result, SessionManager, TickOutcome};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "skystats-daemon")]
#[command(version)]
#[command(about = "Post daily profile statistics to Bluesky")]
#[command(long_about = "\
skystats-daemon - Post daily profile statistics to Bluesky

DESCRIPTION:
    skystats-daemon logs in to your PDS, records the account's post,
    follow and follower counts, and every day at the configured local
    time publishes a post with the counts and their change since the
    previous post.

    The session is cached next to the configuration so restarts refresh
    the existing session instead of logging in with the password again.

USAGE:
    # Run in foreground (logs to stderr)
    skystats-daemon

    # Use a specific config file
    skystats-daemon --config ~/.config/skystats/config.json

    # Render today's post once without publishing it
    skystats-daemon --once --dry-run

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current post)

CONFIGURATION:
    Resolved from --config, $SKYSTATS_CONFIG, ./config.json, then
    ~/.config/skystats/config.json.

    {
      \"host\": \"https://bsky.social\",
      \"handle\": \"alice.bsky.social\",
      \"password\": \"app-password\",
      \"cache_dir\": \".\",
      \"post_at\": \"00:00\",
      \"request_timeout_secs\": 30,
      \"persist_refreshed_session\": false,
      \"persist_baseline\": false
    }

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
    3 - Authentication error
")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run a single tick immediately and exit
    #[arg(long)]
    once: bool,

    /// Render the post and print it to stdout instead of publishing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libskystats::logging::init_default(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let post_at = config.post_time()?;

    let api = Arc::new(BskyXrpc::connect(&config.host, config.request_timeout()).await?);
    let store = FileSessionStore::new(config.cache_path());
    let client = SessionManager::new(&config, api, &store)
        .obtain_client()
        .await?;

    let mut ctx = BotContext::initialize(client, &config)
        .await?
        .with_dry_run(cli.dry_run);

    if cli.once {
        return process_tick(&mut ctx).await;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    info!("skystats-daemon starting for {}", ctx.client().handle());
    run_daemon_loop(&mut ctx, post_at, shutdown).await?;
    info!("skystats-daemon stopped");

    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

/// Main daemon loop: wait for the next trigger, run one tick, repeat
///
/// Stops with an error only when a tick fails in a way the next trigger
/// cannot recover from.
async fn run_daemon_loop(
    ctx: &mut BotContext,
    post_at: NaiveTime,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        let next = next_run_after(&Local::now(), post_at);
        info!("Next post at {}", next.format("%Y-%m-%d %H:%M:%S %:z"));

        if !wait_until(&next, &shutdown).await {
            info!("Shutdown requested, stopping daemon loop");
            return Ok(());
        }

        continue_after(process_tick(ctx).await)?;
    }
}

/// Swallow tick errors the next trigger retries; pass the rest through
fn continue_after(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if !e.is_tick_recoverable() => Err(e),
        _ => Ok(()),
    }
}

/// Sleep until `next`, checking for shutdown every second
///
/// Returns `false` if shutdown was requested first.
async fn wait_until(next: &DateTime<Local>, shutdown: &AtomicBool) -> bool {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return false;
        }

        let remaining = duration_until(&Local::now(), next);
        if remaining.is_zero() {
            return true;
        }

        sleep(remaining.min(Duration::from_secs(1))).await;
    }
}

async fn process_tick(ctx: &mut BotContext) -> Result<()> {
    match ctx.run_tick().await {
        Ok(TickOutcome::Published { .. }) => Ok(()),
        Ok(TickOutcome::DryRun { text, .. }) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => {
            error!("Tick aborted: {}", e);
            Err(e)
        }
    }
}
