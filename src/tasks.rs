mod poll;

pub use poll::poll_task;

use std::sync::{Arc, Mutex};

use tokio::{sync::watch, task::JoinSet};

use crate::{gdb::GdbStore, outbox::Outbox, session::SyncSession};

/// Spawn the long-lived background tasks
pub fn spawn_client_tasks(
    store: &Arc<Mutex<GdbStore>>,
    session: &Arc<Mutex<SyncSession>>,
    outbox: &Outbox,
    shutdown_sig: &watch::Receiver<bool>,
) -> JoinSet<()> {
    let mut all_tasks = JoinSet::new();
    all_tasks.spawn(poll_task(
        Arc::clone(store),
        Arc::clone(session),
        outbox.clone(),
        shutdown_sig.clone(),
    ));
    all_tasks
}
