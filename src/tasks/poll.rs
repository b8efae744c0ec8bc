use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use hoksync_protocol::ItemGrant;
use tokio::{task::spawn_blocking, time::interval};
use tracing::{debug, instrument, warn};

use crate::{gdb::GdbStore, outbox::Outbox, session::SyncSession};

/// How often the state file is polled for flag changes
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Extra delay after a failed tick before polling resumes
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Task that polls every catalog key in the state file and reports
/// newly raised item and location flags to the coordination service.
/// A failed tick logs and backs off; only the shutdown signal ends the
/// loop.
#[instrument(skip_all)]
pub async fn poll_task(
    store: Arc<Mutex<GdbStore>>,
    session: Arc<Mutex<SyncSession>>,
    outbox: Outbox,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => (),
            _ = shutdown.changed() => break
        }

        let store = Arc::clone(&store);
        let session = Arc::clone(&session);
        let tick_outbox = outbox.clone();
        match spawn_blocking(move || poll_once(&store, &session, &tick_outbox)).await {
            Ok(0) => {}
            Ok(reported) => debug!("poll tick reported {reported} change(s)"),
            Err(err) => {
                warn!("Panic while polling the state file: {err}");
                tokio::select! {
                    _ = tokio::time::sleep(ERROR_BACKOFF) => (),
                    _ = shutdown.changed() => break
                }
            }
        }
    }
}

/// One reconciliation pass over every catalog key. Returns the number of
/// reports sent. Does nothing while the catalog is missing.
pub fn poll_once(
    store: &Mutex<GdbStore>,
    session: &Mutex<SyncSession>,
    outbox: &Outbox,
) -> usize {
    let mut session = session.lock().unwrap();
    let Some(catalog) = session.catalog.clone() else {
        return 0;
    };
    let store = store.lock().unwrap();
    let slot = session.slot;
    let mut reported = 0;

    for (name, id) in catalog.items() {
        let current = store.get(name);
        let previous = session.item_values.get(name).copied().unwrap_or(0);
        if current == previous {
            continue;
        }
        session.item_values.insert(name.to_owned(), current);
        if current > 0 && !session.owns_item(id) {
            session.items_received.push(ItemGrant {
                item: id,
                slot,
                location: 0,
            });
            outbox.item_received(id);
            reported += 1;
        }
    }

    for (name, id) in catalog.locations() {
        let current = store.get(name);
        let previous = session.location_values.get(name).copied().unwrap_or(0);
        if current == previous {
            continue;
        }
        session.location_values.insert(name.to_owned(), current);
        if current > 0 && session.checked_locations.insert(id) {
            outbox.location_checks(vec![id]);
            reported += 1;
        }
    }

    reported
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::gdb::testing::fresh_store;
    use hoksync_protocol::{CatalogTables, ClientMessage};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn fixture(dir: &TempDir) -> (Mutex<GdbStore>, Mutex<SyncSession>) {
        let store = fresh_store(dir);
        let tables = CatalogTables {
            item_name_to_id: HashMap::from([("masonry".to_owned(), 105)]),
            location_name_to_id: HashMap::from([("thalgrund_victory".to_owned(), 201)]),
        };
        let mut session = SyncSession::default();
        session.slot = 4;
        session.catalog = Some(Arc::new(Catalog::from_tables(&tables)));
        (Mutex::new(store), Mutex::new(session))
    }

    #[test]
    fn raised_item_flag_is_reported_once() {
        let dir = TempDir::new().unwrap();
        let (store, session) = fixture(&dir);
        let (outbox, mut rx) = Outbox::new();

        assert_eq!(poll_once(&store, &session, &outbox), 0);
        store.lock().unwrap().set("masonry", 1).unwrap();

        assert_eq!(poll_once(&store, &session, &outbox), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientMessage::ItemReceived { item: 105 }
        );

        let locked = session.lock().unwrap();
        assert_eq!(
            locked.items_received,
            [ItemGrant {
                item: 105,
                slot: 4,
                location: 0
            }]
        );
        drop(locked);

        // Unchanged on the next pass
        assert_eq!(poll_once(&store, &session, &outbox), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn raised_location_flag_is_reported_once() {
        let dir = TempDir::new().unwrap();
        let (store, session) = fixture(&dir);
        let (outbox, mut rx) = Outbox::new();

        store
            .lock()
            .unwrap()
            .set("thalgrund_victory", 1)
            .unwrap();

        assert_eq!(poll_once(&store, &session, &outbox), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientMessage::LocationChecks {
                locations: vec![201]
            }
        );
        assert!(session.lock().unwrap().checked_locations.contains(&201));

        assert_eq!(poll_once(&store, &session, &outbox), 0);
    }

    #[test]
    fn known_items_are_not_reported_again() {
        let dir = TempDir::new().unwrap();
        let (store, session) = fixture(&dir);
        let (outbox, mut rx) = Outbox::new();

        session.lock().unwrap().items_received.push(ItemGrant {
            item: 105,
            slot: 2,
            location: 9,
        });
        store.lock().unwrap().set("masonry", 1).unwrap();

        assert_eq!(poll_once(&store, &session, &outbox), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn a_flag_dropping_back_to_zero_is_remembered_quietly() {
        let dir = TempDir::new().unwrap();
        let (store, session) = fixture(&dir);
        let (outbox, mut rx) = Outbox::new();

        store.lock().unwrap().set("masonry", 1).unwrap();
        assert_eq!(poll_once(&store, &session, &outbox), 1);
        rx.try_recv().unwrap();

        store.lock().unwrap().set("masonry", 0).unwrap();
        assert_eq!(poll_once(&store, &session, &outbox), 0);
        assert_eq!(
            session.lock().unwrap().item_values.get("masonry"),
            Some(&0)
        );
    }

    #[test]
    fn without_a_catalog_polling_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let store = Mutex::new(fresh_store(&dir));
        let session = Mutex::new(SyncSession::default());
        let (outbox, mut rx) = Outbox::new();

        assert_eq!(poll_once(&store, &session, &outbox), 0);
        assert!(rx.try_recv().is_err());
    }
}
