//! One live connection to the coordination service: handshake, inbound
//! message dispatch, and draining of the outbox.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Context;
use futures::{SinkExt, StreamExt, TryStreamExt};
use hoksync_protocol::{ClientMessage, ItemGrant, ServerMessage, WireCodec};
use tokio::{net::TcpStream, sync::mpsc, task::spawn_blocking, time::timeout};
use tracing::{debug, info, warn};

use crate::{
    catalog::Catalog, gdb::GdbStore, outbox::Outbox, savefolder::SaveFolder,
    session::SyncSession, snapshot,
};

/// How long the service gets to answer the handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a connection ended
#[derive(Debug)]
pub enum SessionEnd {
    /// Stream closed; the caller may reconnect
    Disconnected,
    /// Service refused the handshake; the caller must not retry
    Refused(String),
}

/// Shared handles the message handlers work against
#[derive(Clone)]
pub struct Handles {
    pub store: Arc<Mutex<GdbStore>>,
    pub session: Arc<Mutex<SyncSession>>,
    pub folder: Arc<SaveFolder>,
    pub outbox: Outbox,
}

/// Drive one connection until either side ends it. Messages queued in
/// the outbox while connected are flushed here; messages queued while
/// disconnected wait in the channel for the next call.
pub async fn run_connection(
    stream: TcpStream,
    connect: ClientMessage,
    handles: Handles,
    outbox_rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
) -> anyhow::Result<SessionEnd> {
    let mut cxn = WireCodec::framed_io(stream);
    cxn.send(connect).await.context("Failed to send handshake")?;

    let first = timeout(HANDSHAKE_TIMEOUT, cxn.try_next())
        .await
        .context("Handshake timed out")?
        .context("Handshake failed")?
        .context("Connection closed during handshake")?;
    if let Some(end) = dispatch_batch(first, &handles).await {
        return Ok(end);
    }

    let (mut sink, mut inbound) = cxn.split();
    loop {
        tokio::select! {
            batch = inbound.try_next() => match batch.context("Connection failed")? {
                Some(batch) => {
                    if let Some(end) = dispatch_batch(batch, &handles).await {
                        return Ok(end);
                    }
                }
                None => return Ok(SessionEnd::Disconnected),
            },
            queued = outbox_rx.recv() => match queued {
                Some(message) => sink.send(message).await.context("Failed to send message")?,
                None => return Ok(SessionEnd::Disconnected),
            },
        }
    }
}

async fn dispatch_batch(batch: Vec<ServerMessage>, handles: &Handles) -> Option<SessionEnd> {
    for message in batch {
        if let Some(end) = dispatch(message, handles).await {
            return Some(end);
        }
    }
    None
}

/// Apply one inbound message. Returns Some when the connection must end.
/// Handlers that touch the state file run on the blocking pool.
async fn dispatch(message: ServerMessage, handles: &Handles) -> Option<SessionEnd> {
    match message {
        ServerMessage::Connected { slot } => {
            info!("connected as slot {slot}");
            handles.session.lock().unwrap().slot = slot;
            handles.outbox.get_catalog();
            handles.outbox.get_state();
        }
        ServerMessage::ConnectionRefused { errors } => {
            return Some(SessionEnd::Refused(errors.join(", ")));
        }
        ServerMessage::Catalog { games } => {
            let Some(tables) = games.get(super::GAME) else {
                warn!("catalog message carries no tables for {:?}", super::GAME);
                return None;
            };
            let catalog = Arc::new(Catalog::from_tables(tables));
            info!(
                "catalog loaded: {} items, {} locations",
                catalog.item_count(),
                catalog.location_count()
            );
            let run_snapshot = {
                let mut session = handles.session.lock().unwrap();
                session.catalog = Some(catalog);
                std::mem::take(&mut session.snapshot_pending)
            };
            if run_snapshot {
                apply_snapshot(handles).await;
            }
        }
        ServerMessage::ReceivedItems { index, items } => {
            let handles = handles.clone();
            if let Err(err) =
                spawn_blocking(move || apply_received_items(&handles, index, items)).await
            {
                warn!("Panic while applying received items: {err}");
            }
        }
        ServerMessage::LocationChecks { locations } => {
            let handles = handles.clone();
            if let Err(err) =
                spawn_blocking(move || apply_location_checks(&handles, locations)).await
            {
                warn!("Panic while applying location checks: {err}");
            }
        }
        ServerMessage::StateSnapshot {
            checked_locations,
            options,
        } => {
            {
                let mut session = handles.session.lock().unwrap();
                session.checked_locations.extend(checked_locations);
                session.options = options;
                if session.catalog.is_none() {
                    session.snapshot_pending = true;
                    debug!("snapshot parked until the catalog arrives");
                    return None;
                }
            }
            apply_snapshot(handles).await;
        }
        ServerMessage::Print { text } => info!("service: {text}"),
    }
    None
}

async fn apply_snapshot(handles: &Handles) {
    let handles = handles.clone();
    if let Err(err) = spawn_blocking(move || {
        let session = handles.session.lock().unwrap();
        let mut store = handles.store.lock().unwrap();
        snapshot::apply(&session, &mut store, &handles.folder);
    })
    .await
    {
        warn!("Panic while applying the state snapshot: {err}");
    }
}

/// Fold a delivery message into the ledger. Genuinely new deliveries are
/// mirrored into the save-folder name; a full history (index 0) replaces
/// the ledger wholesale and never touches the folder.
fn apply_received_items(handles: &Handles, index: usize, items: Vec<ItemGrant>) {
    let mut session = handles.session.lock().unwrap();
    let store = handles.store.lock().unwrap();

    if index == 0 {
        session.items_received.clear();
        session.appended_until = 0;
    } else if index != session.items_received.len() {
        debug!(
            "delivery index {index} does not continue the ledger ({}), requesting a resync",
            session.items_received.len()
        );
        handles.outbox.get_state();
    }

    let catalog = session.catalog.clone();
    let count = items.len();
    for (offset, grant) in items.into_iter().enumerate() {
        session.items_received.push(grant);
        if index == 0 || index + offset < session.appended_until {
            continue;
        }
        let Some(name) = catalog.as_ref().and_then(|c| c.item_name(grant.item)) else {
            debug!("item {} has no catalog name yet", grant.item);
            continue;
        };
        let mut in_game = 1;
        let stored = store.get(name);
        if stored > 0 {
            in_game += stored;
        }
        handles.folder.append(name, in_game);
    }
    session.appended_until = session.appended_until.max(index + count);
}

/// Record broadcast location checks and raise their flags in the store
fn apply_location_checks(handles: &Handles, locations: Vec<i64>) {
    let mut session = handles.session.lock().unwrap();
    let mut store = handles.store.lock().unwrap();
    let catalog = session.catalog.clone();

    for id in locations {
        session.checked_locations.insert(id);
        let Some(name) = catalog.as_ref().and_then(|c| c.location_name(id)) else {
            // The next snapshot apply writes the flag once names are known
            debug!("location {id} has no catalog name yet");
            continue;
        };
        if let Err(err) = store.set(name, 1) {
            warn!("failed to raise location flag {name:?}: {err:#}");
        }
    }
}
