//! Headless dayplan host.
//!
//! Loads `config.toml` (path from the first argument, or the default
//! location), opens the JSON task store and runs a today session until
//! Ctrl-C. Reminders are emitted as tracing events on stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dayplan::notifications::LogNotificationCenter;
use dayplan::{Clock, DayplanConfig, MemoryTaskStore, SystemClock, Task, TodaySession};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(DayplanConfig::default_config_path);
    let config = DayplanConfig::load_or_default(&config_path)
        .with_context(|| format!("cannot load config {}", config_path.display()))?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    tracing::info!(store = %config.store.path.display(), "dayplan-host starting");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = MemoryTaskStore::open(&config.store.path, Arc::clone(&clock))
        .context("cannot open task store")?;
    let session = TodaySession::start(
        Arc::new(store),
        Arc::new(LogNotificationCenter),
        clock,
        &config.reminders,
    )
    .context("cannot start session")?;

    let mut today = session.today();
    log_view(&today.borrow_and_update());

    let mut refresh =
        tokio::time::interval(Duration::from_secs(config.reminders.refresh_interval_secs));
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = refresh.tick() => session.refresh(),
            changed = today.changed() => {
                if changed.is_err() {
                    break;
                }
                log_view(&today.borrow_and_update());
            }
        }
    }

    session.shutdown().await;
    tracing::info!("dayplan-host shut down cleanly");
    Ok(())
}

fn log_view(view: &[Task]) {
    tracing::info!(tasks = view.len(), "today");
    for task in view {
        let mark = if task.completed { "[x]" } else { "[ ]" };
        tracing::info!("{mark} {} ({})", task.text, task.schedule);
    }
}
