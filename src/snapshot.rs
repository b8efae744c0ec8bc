//! Bulk initialization of the state file from the full remote state.
//!
//! Runs after a state snapshot arrives (or, if the snapshot beat the
//! catalog, as soon as the catalog lands): every location flag, the
//! session's scalar options, and every item count are written out, and
//! the save-folder side channel is reset. Individual write failures are
//! logged and skipped so one bad key cannot abort the rest.

use fxhash::FxHashMap;
use hoksync_protocol::SlotOptions;
use tracing::{debug, warn};

use crate::{gdb::GdbStore, savefolder::SaveFolder, session::SyncSession};

pub fn apply(session: &SyncSession, store: &mut GdbStore, folder: &SaveFolder) {
    let Some(catalog) = session.catalog.as_deref() else {
        debug!("snapshot apply deferred, no catalog yet");
        return;
    };

    // Items granted by the service itself (slot 0) don't count as owned
    let mut owned: FxHashMap<i64, i64> = FxHashMap::default();
    for grant in &session.items_received {
        if grant.slot != 0 {
            *owned.entry(grant.item).or_default() += 1;
        }
    }

    for (name, id) in catalog.locations() {
        let value = u8::from(session.checked_locations.contains(&id));
        if let Err(err) = store.set(name, value) {
            warn!("snapshot: location {name:?}: {err:#}");
        }
    }

    let options = &session.options;
    let scalars = [
        ("starting_hero", hero_id(&options.starting_hero)),
        ("difficulty", clamp(options.difficulty)),
        ("player_color", clamp(options.player_color)),
        ("game_speed", clamp(options.game_speed)),
        (
            "progression",
            progression(owned.len(), catalog.item_count(), options),
        ),
    ];
    for (name, value) in scalars {
        if let Err(err) = store.set(name, value) {
            warn!("snapshot: {name}: {err:#}");
        }
    }

    for (name, id) in catalog.items() {
        let mut value = owned.get(&id).copied().unwrap_or(0);
        if is_starting_unit(name, &options.starting_unit) {
            value += 1;
        }
        if let Err(err) = store.set(name, clamp(value)) {
            warn!("snapshot: item {name:?}: {err:#}");
        }
    }

    folder.reset();
}

/// Hero name to in-game id; unknown names map to 0. The configured name
/// may carry a `progressive_` prefix.
fn hero_id(name: &str) -> u8 {
    match name.strip_prefix("progressive_").unwrap_or(name) {
        "dario" => 1,
        "pilgrim" => 2,
        "salim" => 3,
        "erec" => 4,
        "ari" => 5,
        "helias" => 6,
        "kerberos" => 7,
        "mary" => 8,
        "varg" => 9,
        "drake" => 10,
        "yuki" => 11,
        "kala" => 12,
        _ => 0,
    }
}

/// Progression level scales with the owned share of the item catalog,
/// steepened by difficulty. Zero unless the slot opted in.
fn progression(owned: usize, total: usize, options: &SlotOptions) -> u8 {
    if options.progression_difficulty != 1 || total == 0 {
        return 0;
    }
    let share = owned as f64 / total as f64;
    let steepness = match options.difficulty {
        1 => 2.0,
        2 => 3.0,
        _ => 4.0,
    };
    (share * steepness).floor() as u8
}

/// The configured starting unit is granted one extra progressive step
fn is_starting_unit(item_name: &str, starting_unit: &str) -> bool {
    !starting_unit.is_empty()
        && starting_unit != "disabled"
        && item_name == format!("progressive_{starting_unit}")
}

fn clamp(value: i64) -> u8 {
    value.clamp(0, u8::MAX as i64) as u8
}
