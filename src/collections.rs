//! Load order carried inside a mod collection.

use crate::{
    error::SyncError,
    host::{Host, Mod, ModRegistry, Profile},
    load_order::{DisplayItem, LoadOrder},
    reorder::Lists,
    store::Store,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionData {
    #[serde(rename = "loadOrder", default)]
    pub load_order: LoadOrder,
}

fn require_profile(host: &dyn Host, game_id: &str) -> Result<Profile, SyncError> {
    host.last_active_profile(game_id)
        .filter(|profile| profile.game_id == game_id)
        .ok_or_else(|| SyncError::ProfileMissing {
            game_id: game_id.to_string(),
        })
}

fn without_collections(order: &LoadOrder, registry: &ModRegistry) -> LoadOrder {
    order
        .iter()
        .filter(|(id, _)| !registry.get(id).is_some_and(Mod::is_collection))
        .map(|(id, entry)| (id.clone(), *entry))
        .collect()
}

/// Entries of `order` for the mods bundled in the collection.
pub fn export_load_order(
    host: &dyn Host,
    game_id: &str,
    mod_ids: &[String],
    order: &LoadOrder,
) -> Result<LoadOrder, SyncError> {
    require_profile(host, game_id)?;
    let mut exported = without_collections(order, &host.mods(game_id));
    exported.retain(|id, _| mod_ids.iter().any(|included| included == id));
    info!(entries = exported.len(), "load order exported for collection");
    Ok(exported)
}

pub fn export_collection(
    host: &dyn Host,
    game_id: &str,
    mod_ids: &[String],
    order: &LoadOrder,
) -> Result<CollectionData, SyncError> {
    Ok(CollectionData {
        load_order: export_load_order(host, game_id, mod_ids, order)?,
    })
}

/// Replaces the whole load order with the collection's, minus any entries
/// that name a collection.
pub fn import_load_order(
    host: &dyn Host,
    store: &mut Store,
    game_id: &str,
    data: &CollectionData,
) -> Result<(), SyncError> {
    require_profile(host, game_id)?;
    let sanitized = without_collections(&data.load_order, &host.mods(game_id));
    info!(entries = sanitized.len(), "load order imported from collection");
    store.write(sanitized);
    Ok(())
}

/// Read-only view of `order` restricted to installed, non-collection mods
/// and, when `collection` is given, to its members.
pub fn preview_load_order(
    order: &LoadOrder,
    registry: &ModRegistry,
    collection: Option<&Mod>,
) -> Lists {
    let mut lists = Lists::default();
    for id in order.ids_by_position() {
        let Some(mod_entry) = registry.get(&id) else {
            continue;
        };
        if mod_entry.is_collection() {
            continue;
        }
        if collection.is_some_and(|collection| !is_mod_in_collection(collection, mod_entry)) {
            continue;
        }
        let Some(entry) = order.get(&id) else {
            continue;
        };
        let item = DisplayItem::new(id.as_str(), mod_entry.display_name());
        if entry.enabled {
            lists.enabled.push(item);
        } else {
            lists.disabled.push(item);
        }
    }
    lists
}

pub fn is_mod_in_collection(collection: &Mod, mod_entry: &Mod) -> bool {
    collection.rules.iter().any(|rule| rule.id == mod_entry.id)
}
