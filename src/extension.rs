use crate::{
    collections::{self, CollectionData},
    editor::Editor,
    error::SyncError,
    host::Host,
    load_order::LoadOrder,
    poe2::{self, GamePaths},
    reorder::Lists,
    store::Store,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, info};

/// Ties the store, the editor and the host together for one session.
pub struct Extension {
    host: Arc<dyn Host>,
    store: Store,
    editor: Editor,
    active_game: Option<String>,
}

impl Extension {
    pub fn new(paths: Option<GamePaths>, host: Arc<dyn Host>, flush_delay: Duration) -> Self {
        let store = Store::open(paths, host.clone());
        Self {
            host,
            store,
            editor: Editor::new(poe2::GAME_ID, flush_delay),
            active_game: None,
        }
    }

    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    pub fn active_game(&self) -> Option<&str> {
        self.active_game.as_deref()
    }

    /// Starts watching `modconfig.json` when Deadfire becomes the active
    /// game, stops for anything else.
    pub fn on_game_activated(&mut self, game_id: &str) {
        self.active_game = Some(game_id.to_string());
        if game_id != poe2::GAME_ID {
            debug!(game_id, "other game activated");
            self.store.stop_watch();
            return;
        }
        info!(game_id, "game activated");
        if let Err(err) = self.store.start_watch() {
            self.report("Failed to update modorder", &err);
            self.store.refresh();
        }
        self.editor.sync(&self.store, self.host.as_ref());
    }

    /// Re-reads the file without a watch, for one-shot callers.
    pub fn reload(&mut self) {
        self.store.refresh();
        self.editor.sync(&self.store, self.host.as_ref());
    }

    pub fn load_order(&self) -> &LoadOrder {
        self.store.load_order()
    }

    /// Replaces the load order outright. Unflushed editor edits are dropped
    /// so they cannot overwrite it later.
    pub fn set_load_order(&mut self, order: LoadOrder) {
        self.editor.discard_pending();
        self.store.write(order);
        self.editor.sync(&self.store, self.host.as_ref());
    }

    /// Applies file changes, writes a due flush and refreshes the lists.
    /// Returns whether anything visible may have changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let changed = self.store.poll_changes();
        let flushed = self.editor.tick(now, &mut self.store);
        let rebuilt = self.editor.sync(&self.store, self.host.as_ref());
        changed || flushed || rebuilt
    }

    pub fn export_collection(&self, mod_ids: &[String]) -> Result<CollectionData, SyncError> {
        collections::export_collection(
            self.host.as_ref(),
            poe2::GAME_ID,
            mod_ids,
            self.store.load_order(),
        )
    }

    pub fn import_collection(&mut self, data: &CollectionData) -> Result<(), SyncError> {
        collections::import_load_order(self.host.as_ref(), &mut self.store, poe2::GAME_ID, data)?;
        self.editor.discard_pending();
        self.editor.sync(&self.store, self.host.as_ref());
        Ok(())
    }

    /// Read-only view of a collection's load order against the installed
    /// mods. `None` when `collection_id` does not name an installed
    /// collection.
    pub fn preview_collection(
        &self,
        data: &CollectionData,
        collection_id: Option<&str>,
    ) -> Option<Lists> {
        let registry = self.host.mods(poe2::GAME_ID);
        let collection = match collection_id {
            Some(id) => Some(registry.get(id).filter(|entry| entry.is_collection())?),
            None => None,
        };
        Some(collections::preview_load_order(
            &data.load_order,
            &registry,
            collection,
        ))
    }

    /// Writes a pending edit without waiting for the quiet period.
    pub fn flush_now(&mut self) -> bool {
        let flushed = self.editor.flush_now(&mut self.store);
        self.editor.sync(&self.store, self.host.as_ref());
        flushed
    }

    /// Like `flush_now`, for callers that report the write's outcome.
    pub fn try_flush_now(&mut self) -> Result<bool, SyncError> {
        let flushed = self.editor.try_flush_now(&mut self.store);
        self.editor.sync(&self.store, self.host.as_ref());
        flushed
    }

    /// Writes any pending edit and stops watching.
    pub fn shutdown(mut self) {
        self.editor.cancel_drag();
        self.editor.flush_now(&mut self.store);
        self.store.close();
    }

    fn report(&self, title: &str, err: &SyncError) {
        self.host
            .notify_error(err.kind(), &format!("{title}: {err}"), err.allow_report());
    }
}
