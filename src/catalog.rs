use fxhash::FxHashMap;
use hoksync_protocol::CatalogTables;

/// Item and location name/id tables for the synced game, as delivered by
/// the coordination service. Lookups run on every poll tick, so both
/// directions are indexed.
#[derive(Debug, Default)]
pub struct Catalog {
    items: FxHashMap<String, i64>,
    items_by_id: FxHashMap<i64, String>,
    locations: FxHashMap<String, i64>,
    locations_by_id: FxHashMap<i64, String>,
}

impl Catalog {
    pub fn from_tables(tables: &CatalogTables) -> Self {
        let mut catalog = Self::default();
        for (name, &id) in &tables.item_name_to_id {
            catalog.items.insert(name.clone(), id);
            catalog.items_by_id.insert(id, name.clone());
        }
        for (name, &id) in &tables.location_name_to_id {
            catalog.locations.insert(name.clone(), id);
            catalog.locations_by_id.insert(id, name.clone());
        }
        catalog
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, i64)> {
        self.items.iter().map(|(name, &id)| (name.as_str(), id))
    }

    pub fn locations(&self) -> impl Iterator<Item = (&str, i64)> {
        self.locations.iter().map(|(name, &id)| (name.as_str(), id))
    }

    pub fn item_name(&self, id: i64) -> Option<&str> {
        self.items_by_id.get(&id).map(String::as_str)
    }

    pub fn location_name(&self, id: i64) -> Option<&str> {
        self.locations_by_id.get(&id).map(String::as_str)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }
}
