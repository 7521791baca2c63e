//! Memo Cache demo
//!
//! Memoizes a slow computation with expiring and bumped entries, logs cache
//! statistics, and purges the cache on SIGUSR1 as a stand-in for a host
//! low-memory notification.

use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memo_cache::{spawn_pressure_relay, Config, Deadline, MemoCache, MemoryPressure};

const TICK: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memo_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    info!(
        "Configuration loaded: name={}, count_limit={}, total_cost_limit={}",
        config.name, config.count_limit, config.total_cost_limit
    );

    let pressure = MemoryPressure::new();
    let cache: MemoCache<u64, u64> = MemoCache::from_config(&config, &pressure);

    let (events_tx, events_rx) = mpsc::channel(8);
    let relay = spawn_pressure_relay(pressure.clone(), events_rx);
    forward_low_memory_signal(events_tx)?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(TICK);
    let mut round: u64 = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                round += 1;
                run_round(&cache, round).await?;
            }
            _ = &mut shutdown => break,
        }
    }

    relay.abort();
    warn!("Pressure relay aborted");
    info!("Shutdown complete");
    Ok(())
}

/// Memoizes a few fibonacci numbers under different deadline policies.
async fn run_round(cache: &MemoCache<u64, u64>, round: u64) -> anyhow::Result<()> {
    let cache = cache.clone();
    let stats = tokio::task::spawn_blocking(move || {
        let n = 25 + round % 5;
        let expiring = cache.get_or_compute_expiring(n, Deadline::in_seconds(3), || fibonacci(n));
        let bumped = cache.get_or_compute_bumping(n + 100, Deadline::in_seconds(2), || fibonacci(n));
        info!(round, n, expiring, bumped, "Round complete");
        cache.stats()
    })
    .await
    .context("cache round panicked")?;

    info!(
        "Stats: {} (hit rate {:.2})",
        serde_json::to_string(&stats)?,
        stats.hit_rate()
    );
    Ok(())
}

fn fibonacci(n: u64) -> u64 {
    match n {
        0 | 1 => n,
        _ => fibonacci(n - 1) + fibonacci(n - 2),
    }
}

/// Forwards SIGUSR1 to the pressure relay. No-op off unix.
fn forward_low_memory_signal(events: mpsc::Sender<()>) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut usr1 = signal::unix::signal(signal::unix::SignalKind::user_defined1())
            .context("failed to install SIGUSR1 handler")?;
        tokio::spawn(async move {
            while usr1.recv().await.is_some() {
                if events.send(()).await.is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    drop(events);

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
