//! App orchestration: wiring the store, broker pool, radar and executor
//! together, with a shared shutdown flag and a bounded graceful drain.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use url::Url;

use crate::broker::BrokerClient;
use crate::config::{Config, Environment};
use crate::error::{Error, Result};
use crate::executor::{Executor, RiskTracker};
use crate::notifier::{LogNotifier, NotifierRegistry};
use crate::pattern::{CatalogSettings, PatternCatalog};
use crate::radar::Radar;
use crate::store::{RestStore, Store};

/// How long shutdown waits for in-flight work before giving up.
const DRAIN_DEADLINE: Duration = Duration::from_secs(30);

/// Main application struct.
pub struct App;

impl App {
    /// Run radar and executor side by side until Ctrl-C.
    pub async fn run(config: Config, env: Environment) -> Result<()> {
        let store = build_store(&env)?;
        let notifiers = build_notifiers(&env);

        // Radar::run performs its own startup cleanup before the first pass.
        let radar = build_radar(&config, Arc::clone(&store), Arc::clone(&notifiers));
        let executor = build_executor(&config, &env, Arc::clone(&store), notifiers).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let radar_task = tokio::spawn(radar.run(shutdown_rx.clone()));
        let executor_task = tokio::spawn(executor.run(shutdown_rx));

        wait_for_shutdown(shutdown_tx, vec![("radar", radar_task), ("executor", executor_task)])
            .await
    }

    /// Run only the radar (no broker connection needed).
    pub async fn run_radar(config: Config, env: Environment) -> Result<()> {
        let store = build_store(&env)?;
        let notifiers = build_notifiers(&env);

        let radar = build_radar(&config, store, notifiers);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(radar.run(shutdown_rx));
        wait_for_shutdown(shutdown_tx, vec![("radar", task)]).await
    }

    /// Run only the executor against an already-populated signal row.
    pub async fn run_executor(config: Config, env: Environment) -> Result<()> {
        let store = build_store(&env)?;
        let notifiers = build_notifiers(&env);

        let executor = build_executor(&config, &env, store, notifiers).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(executor.run(shutdown_rx));
        wait_for_shutdown(shutdown_tx, vec![("executor", task)]).await
    }
}

fn build_store(env: &Environment) -> Result<Arc<dyn Store>> {
    let base = Url::parse(&env.store_url)?;
    let store = RestStore::new(&base, &env.store_anon_key)?;
    Ok(Arc::new(store))
}

fn build_notifiers(env: &Environment) -> Arc<NotifierRegistry> {
    let mut registry = NotifierRegistry::default();
    registry.register(Box::new(LogNotifier));

    #[cfg(feature = "telegram")]
    if let (Some(token), Some(chat_id)) = (env.telegram_token.clone(), env.telegram_chat_id) {
        use crate::notifier::{TelegramNotifier, TelegramSettings};
        registry.register(Box::new(TelegramNotifier::new(&TelegramSettings {
            token,
            chat_id,
        })));
        info!("Telegram notifications enabled");
    }
    #[cfg(not(feature = "telegram"))]
    let _ = env;

    Arc::new(registry)
}

fn build_radar(config: &Config, store: Arc<dyn Store>, notifiers: Arc<NotifierRegistry>) -> Radar {
    Radar::new(
        store,
        PatternCatalog::standard(&CatalogSettings::default()),
        notifiers,
        config.radar_settings(),
    )
}

async fn build_executor(
    config: &Config,
    env: &Environment,
    store: Arc<dyn Store>,
    notifiers: Arc<NotifierRegistry>,
) -> Result<Executor> {
    let broker = BrokerClient::connect(&config.broker_settings(env)).await?;
    info!(
        live_connections = broker.live_connections(),
        "broker client connected"
    );
    Ok(Executor::new(
        Arc::new(broker),
        store,
        notifiers,
        config.executor_settings(),
        RiskTracker::new(config.risk_settings()),
    ))
}

/// Block until Ctrl-C or a component exits, then flip the shutdown flag
/// and drain the remaining tasks within [`DRAIN_DEADLINE`].
async fn wait_for_shutdown(
    shutdown_tx: watch::Sender<bool>,
    mut tasks: Vec<(&'static str, JoinHandle<Result<()>>)>,
) -> Result<()> {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = wait_any(&mut tasks) => {}
    }

    let _ = shutdown_tx.send(true);

    let mut outcome = Ok(());
    for (name, task) in tasks {
        match tokio::time::timeout(DRAIN_DEADLINE, task).await {
            Ok(Ok(Ok(()))) => info!(component = name, "stopped cleanly"),
            Ok(Ok(Err(e))) => {
                error!(component = name, error = %e, "stopped with error");
                outcome = Err(e);
            }
            Ok(Err(join)) => {
                error!(component = name, error = %join, "task panicked");
                outcome = Err(Error::Other(anyhow::anyhow!("{name} task panicked: {join}")));
            }
            Err(_) => {
                warn!(component = name, "did not drain in time, aborting");
            }
        }
    }
    outcome
}

/// Resolves when any task finishes; the finished task is left in place
/// for the drain loop to join and report.
async fn wait_any(tasks: &mut [(&'static str, JoinHandle<Result<()>>)]) {
    loop {
        if tasks.iter().any(|(_, t)| t.is_finished()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
