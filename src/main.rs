// Group ledger bot entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config
// 3. Open the ledger store
// 4. Create the message channel
// 5. Spawn the Telegram polling task
// 6. Run the message-handling loop until Ctrl+C
// 7. Cleanup on exit

use tallybot::app;
use tallybot::config;
use tallybot::ledger::Ledger;
use tallybot::telegram::{self, BotClient};

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("tallybot starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: poll timeout {}s, database {}",
        config.telegram.poll_timeout_secs, config.db_path
    );

    // 3. Open the ledger store (explicit lifecycle; the store is injected
    //    into the handler rather than living in a global)
    let ledger = Ledger::open(&config.db_path).context("failed to open ledger database")?;
    info!("Ledger database opened at {}", config.db_path);

    // 4. Create the message channel
    let (tx, rx) = mpsc::channel(256);

    // 5. Spawn the Telegram polling task
    let client = BotClient::new(&config.telegram.token);
    let poll_timeout = config.telegram.poll_timeout_secs;
    let poller_client = client.clone();
    let poller = tokio::spawn(async move {
        if let Err(e) = telegram::run(poller_client, poll_timeout, tx).await {
            error!("polling loop error: {e:#}");
        }
    });

    // 6. Run the message-handling loop until Ctrl+C
    let state = app::AppState::new(config, ledger);
    info!("tallybot ready, polling for messages");

    tokio::select! {
        result = app::run(rx, client, state) => {
            result.context("message-handling loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    // 7. Cleanup: the poller loops forever, abort it
    poller.abort();

    info!("tallybot shut down cleanly");
    Ok(())
}

/// Initialize tracing to stdout, filtered by `RUST_LOG` when set.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tallybot=info,warn")),
        )
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
