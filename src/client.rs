mod remote;
mod shutdown;

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Context;
use tokio::{net::TcpStream, sync::mpsc, time::timeout};
use tracing::{info, warn};

use crate::{
    gdb::GdbStore, outbox::Outbox, savefolder::SaveFolder, session::SyncSession, tasks,
};
use hoksync_protocol::ClientMessage;
use remote::{Handles, SessionEnd};

/// Game identifier announced to the coordination service
pub const GAME: &str = "SettlersHeritageOfKings";

/// Delay between reconnection attempts
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Client config
#[derive(Debug)]
pub struct Config {
    pub server: String,
    pub slot_name: String,
    pub password: Option<String>,
    pub state_path: PathBuf,
    pub saves_dir: PathBuf,
}

/// Setup state access and run the sync client until shutdown
pub async fn run(config: Config) -> anyhow::Result<()> {
    // Setup logging
    #[cfg(debug_assertions)]
    tracing_subscriber::fmt()
        .with_max_level(tracing::level_filters::LevelFilter::DEBUG)
        .init();

    #[cfg(not(debug_assertions))]
    tracing_subscriber::fmt()
        .event_format(tracing_subscriber::fmt::format::json().flatten_event(true))
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Open the state file and the save-folder side channel
    let store = GdbStore::open(config.state_path.clone())?;
    info!("state file: {}", config.state_path.display());
    let store = Arc::new(Mutex::new(store));
    let folder = Arc::new(SaveFolder::new(config.saves_dir.clone()));
    let session = Arc::new(Mutex::new(SyncSession::default()));
    let (outbox, mut outbox_rx) = Outbox::new();

    // Spawn all tasks
    let mut shutdown_sig = shutdown::setup_shutdown_signal();
    let all_tasks = tasks::spawn_client_tasks(&store, &session, &outbox, &shutdown_sig);

    let handles = Handles {
        store,
        session,
        folder,
        outbox,
    };

    tokio::select! {
        result = session_loop(&config, handles, &mut outbox_rx, shutdown_sig.clone()) => result?,
        _ = shutdown_sig.changed() => {
            info!("shutdown signal received. shutting down...");
        },
    }

    // Ensure all tasks have shut down
    timeout(Duration::from_secs(5), all_tasks.join_all())
        .await
        .context("some task(s) didn't shut down within grace period")?;
    info!("sync client shut down. goodbye for now 👋");
    Ok(())
}

/// Connect, sync, and reconnect with a fixed delay. Only a refused
/// handshake or the shutdown signal ends the loop.
async fn session_loop(
    config: &Config,
    handles: Handles,
    outbox_rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
    mut shutdown_sig: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    loop {
        match connect_once(config, &handles, outbox_rx).await {
            Ok(SessionEnd::Refused(reason)) => {
                anyhow::bail!("service refused the connection: {reason}");
            }
            Ok(SessionEnd::Disconnected) => warn!("connection lost"),
            Err(err) => warn!("connection failed: {err:#}"),
        }

        // The catalog is connection state; the next delivery restores it
        handles.session.lock().unwrap().catalog = None;

        info!("reconnecting in {RECONNECT_DELAY:?}...");
        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => (),
            _ = shutdown_sig.changed() => return Ok(()),
        }
    }
}

async fn connect_once(
    config: &Config,
    handles: &Handles,
    outbox_rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
) -> anyhow::Result<SessionEnd> {
    let stream = TcpStream::connect(&config.server)
        .await
        .with_context(|| format!("Failed to connect to {}", config.server))?;
    info!("connected to {}", config.server);

    let connect = ClientMessage::Connect {
        name: config.slot_name.clone(),
        password: config.password.clone(),
        game: GAME.to_owned(),
        uuid: rand::random(),
    };
    remote::run_connection(stream, connect, handles.clone(), outbox_rx).await
}
