use std::sync::Arc;

use fxhash::{FxHashMap, FxHashSet};
use hoksync_protocol::{ItemGrant, SlotOptions};

use crate::catalog::Catalog;

/// Mutable session state shared between the poll task and the inbound
/// message handlers. Guarded by one mutex; when the store mutex is taken
/// as well, the session lock is always taken first.
#[derive(Default)]
pub struct SyncSession {
    /// Slot number assigned at the handshake
    pub slot: i64,
    /// Per-slot configuration from the latest snapshot
    pub options: SlotOptions,
    /// Name/id tables; None until the service delivers them, and again
    /// between a disconnect and the next delivery
    pub catalog: Option<Arc<Catalog>>,
    /// Ledger of delivered and locally detected items, in delivery order
    pub items_received: Vec<ItemGrant>,
    /// Location ids already known as checked; never shrinks in-session
    pub checked_locations: FxHashSet<i64>,
    /// Last observed store value per item key
    pub item_values: FxHashMap<String, i64>,
    /// Last observed store value per location key
    pub location_values: FxHashMap<String, i64>,
    /// Ledger positions already mirrored into the save-folder name
    pub appended_until: usize,
    /// Set when a state snapshot arrived before the catalog; the snapshot
    /// is applied as soon as the catalog lands
    pub snapshot_pending: bool,
}

impl SyncSession {
    /// Whether the ledger already holds a grant of this item
    pub fn owns_item(&self, item_id: i64) -> bool {
        self.items_received.iter().any(|grant| grant.item == item_id)
    }
}
