//! Message types exchanged with the coordination service

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Messages sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum ClientMessage {
    /// Session handshake; the service answers with `Connected` or
    /// `ConnectionRefused`
    Connect {
        name: String,
        password: Option<String>,
        game: String,
        uuid: u64,
    },
    /// Request the item/location name tables for every game in the session
    GetCatalog,
    /// Request the full remote state. The service answers with a
    /// `StateSnapshot` and a fresh full `ReceivedItems` history, so this
    /// doubles as the resync request after a delivery gap.
    GetState,
    /// Report an item the player acquired in-game
    ItemReceived { item: i64 },
    /// Report newly checked locations
    LocationChecks { locations: Vec<i64> },
}

/// Messages delivered by the coordination service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum ServerMessage {
    /// Handshake accepted; carries the slot number assigned to this player
    Connected { slot: i64 },
    /// Handshake rejected; the connection is about to be dropped
    ConnectionRefused {
        #[serde(default)]
        errors: Vec<String>,
    },
    /// Item/location name-to-id tables, keyed by game name
    Catalog { games: HashMap<String, CatalogTables> },
    /// Item deliveries. `index` is the ledger position of the first item:
    /// 0 means the full history, anything else an incremental batch.
    ReceivedItems { index: usize, items: Vec<ItemGrant> },
    /// Locations checked by anyone in the session
    LocationChecks { locations: Vec<i64> },
    /// Full snapshot of this slot's remote state
    StateSnapshot {
        #[serde(default)]
        checked_locations: Vec<i64>,
        #[serde(default)]
        options: SlotOptions,
    },
    /// Informational broadcast
    Print { text: String },
}

/// One delivered item: what, from whose slot, found at which location.
/// Slot 0 marks items granted by the service rather than found by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemGrant {
    pub item: i64,
    pub slot: i64,
    pub location: i64,
}

/// Name-to-id tables for a single game
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogTables {
    #[serde(default)]
    pub item_name_to_id: HashMap<String, i64>,
    #[serde(default)]
    pub location_name_to_id: HashMap<String, i64>,
}

/// Per-slot session configuration, generated when the session was rolled
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotOptions {
    pub starting_hero: String,
    pub starting_unit: String,
    pub difficulty: i64,
    pub progression_difficulty: i64,
    pub player_color: i64,
    pub game_speed: i64,
}
