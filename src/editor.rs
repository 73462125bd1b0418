use crate::{
    debounce::Debouncer,
    error::SyncError,
    host::{Host, ModRegistry, Profile},
    load_order::{DisplayItem, LoadOrder},
    reorder::{self, Commit, Container, DragState, HoverPoint, Lists},
    store::Store,
};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Inputs {
    generation: u64,
    registry: ModRegistry,
    profile: Option<Profile>,
}

/// Enabled/disabled lists derived from the store, edited by the user and
/// flushed back after a quiet period.
pub struct Editor {
    game_id: String,
    lists: Lists,
    registry: ModRegistry,
    drag: DragState,
    drag_origin: Option<Lists>,
    flush: Debouncer<LoadOrder>,
    seen: Option<Inputs>,
}

impl Editor {
    pub fn new(game_id: impl Into<String>, flush_delay: Duration) -> Self {
        Self {
            game_id: game_id.into(),
            lists: Lists::default(),
            registry: ModRegistry::new(),
            drag: DragState::Idle,
            drag_origin: None,
            flush: Debouncer::new(flush_delay),
            seen: None,
        }
    }

    pub fn lists(&self) -> &Lists {
        &self.lists
    }

    pub fn registry(&self) -> &ModRegistry {
        &self.registry
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    pub fn has_pending_flush(&self) -> bool {
        self.flush.is_pending()
    }

    pub fn flush_due_at(&self) -> Option<Instant> {
        self.flush.due_at()
    }

    /// Rebuilds the lists when the store, the mod registry or the profile
    /// changed since the last rebuild. Local edits that are still dragging
    /// or waiting to flush are left alone.
    pub fn sync(&mut self, store: &Store, host: &dyn Host) -> bool {
        if self.drag.is_dragging() || self.flush.is_pending() {
            return false;
        }
        let inputs = Inputs {
            generation: store.generation(),
            registry: host.mods(&self.game_id),
            profile: host
                .active_profile()
                .filter(|profile| profile.game_id == self.game_id),
        };
        if self.seen.as_ref() == Some(&inputs) {
            return false;
        }
        self.rebuild(store.load_order(), &inputs.registry, inputs.profile.as_ref());
        self.seen = Some(inputs);
        true
    }

    pub fn rebuild(&mut self, order: &LoadOrder, registry: &ModRegistry, profile: Option<&Profile>) {
        self.lists = build_lists(order, registry, profile);
        self.registry = registry.clone();
        self.drag.cancel();
        self.drag_origin = None;
        debug!(
            enabled = self.lists.enabled.len(),
            disabled = self.lists.disabled.len(),
            "load order lists rebuilt"
        );
    }

    pub fn begin_drag(&mut self, container: Container, index: usize) -> bool {
        if !self.drag.begin(&self.lists, container, index) {
            return false;
        }
        self.drag_origin = Some(self.lists.clone());
        true
    }

    pub fn hover_item(&mut self, container: Container, index: usize, point: HoverPoint) -> bool {
        self.drag.hover_item(&mut self.lists, container, index, point)
    }

    pub fn hover_container(&mut self, container: Container) -> bool {
        self.drag.hover_container(&mut self.lists, container)
    }

    /// Ends the gesture; a gesture that moved something schedules a flush.
    pub fn drop(&mut self, now: Instant) -> Option<Commit> {
        self.drag_origin = None;
        let commit = self.drag.drop(&self.lists)?;
        self.schedule(&commit, now);
        Some(commit)
    }

    /// Abandons the gesture and puts the lists back as they were.
    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
        if let Some(lists) = self.drag_origin.take() {
            self.lists = lists;
        }
    }

    pub fn move_within(&mut self, container: Container, from: usize, to: usize, now: Instant) -> bool {
        if !reorder::move_within(&mut self.lists, container, from, to) {
            return false;
        }
        self.schedule_current(now);
        true
    }

    pub fn transfer(&mut self, id: &str, container: Container, index: usize, now: Instant) -> bool {
        if !reorder::transfer(&mut self.lists, id, container, index) {
            return false;
        }
        self.schedule_current(now);
        true
    }

    /// Flips `id` to the top of the other list.
    pub fn toggle(&mut self, id: &str, now: Instant) -> bool {
        let Some((container, _)) = self.lists.locate(id) else {
            return false;
        };
        self.transfer(id, container.other(), 0, now)
    }

    /// Writes the pending order once its quiet period has passed.
    pub fn tick(&mut self, now: Instant, store: &mut Store) -> bool {
        let Some(order) = self.flush.take_due(now) else {
            return false;
        };
        info!(entries = order.len(), "flushing load order");
        store.write(order);
        true
    }

    pub fn flush_now(&mut self, store: &mut Store) -> bool {
        let Some(order) = self.flush.flush() else {
            return false;
        };
        info!(entries = order.len(), "flushing load order");
        store.write(order);
        true
    }

    /// Same as `flush_now`, but a failed write comes back to the caller.
    pub fn try_flush_now(&mut self, store: &mut Store) -> Result<bool, SyncError> {
        let Some(order) = self.flush.flush() else {
            return Ok(false);
        };
        info!(entries = order.len(), "flushing load order");
        store.try_write(order)?;
        Ok(true)
    }

    /// Drops unflushed edits and any gesture in progress. The next `sync`
    /// rebuilds from the store.
    pub fn discard_pending(&mut self) {
        if self.flush.is_pending() {
            debug!("pending load order flush discarded");
        }
        self.flush.cancel();
        self.drag.cancel();
        self.drag_origin = None;
        self.seen = None;
    }

    fn schedule_current(&mut self, now: Instant) {
        let commit = Commit {
            enabled: self.lists.enabled.clone(),
            disabled: self.lists.disabled.clone(),
        };
        self.schedule(&commit, now);
    }

    fn schedule(&mut self, commit: &Commit, now: Instant) {
        let order = LoadOrder::from_sequences(&commit.enabled, &commit.disabled);
        debug!(entries = order.len(), "load order flush scheduled");
        self.flush.schedule(order, now);
    }
}

/// Splits known mods into the two lists.
///
/// A mod lands in "enabled" only if it has an enabled entry and the profile
/// (when given) has it switched on. Everything else the registry knows about
/// goes to "disabled": first the remaining entries by position, then mods
/// without an entry in registry order. Every registry mod, collections
/// included, ends up in exactly one list. Entries for mods the registry does
/// not know are dropped.
pub fn build_lists(order: &LoadOrder, registry: &ModRegistry, profile: Option<&Profile>) -> Lists {
    let known = |id: &str| registry.contains(id);
    let active = |id: &str| profile.map_or(true, |profile| profile.is_enabled(id));
    let to_item = |id: &str| DisplayItem::new(id, registry.display_name(id));

    let sorted: Vec<String> = order
        .ids_by_position()
        .into_iter()
        .filter(|id| known(id) && active(id))
        .collect();

    let enabled = sorted
        .iter()
        .filter(|id| order.get(id).is_some_and(|entry| entry.enabled))
        .map(|id| to_item(id))
        .collect();

    let mut disabled: Vec<DisplayItem> = sorted
        .iter()
        .filter(|id| order.get(id).is_some_and(|entry| !entry.enabled))
        .map(|id| to_item(id))
        .collect();
    disabled.extend(
        registry
            .ids()
            .filter(|id| known(id) && !sorted.contains(id))
            .map(|id| to_item(id)),
    );

    Lists::new(enabled, disabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        host::Mod,
        load_order::LoadOrderEntry,
        modconfig::MODCONFIG_FILE,
        poe2::{GamePaths, GAME_ID},
    };
    use pretty_assertions::assert_eq;
    use std::{
        fs,
        sync::{Arc, Mutex},
    };
    use tempfile::TempDir;

    struct FakeHost {
        registry: Mutex<ModRegistry>,
        profile: Mutex<Option<Profile>>,
    }

    impl FakeHost {
        fn new(ids: &[&str]) -> Self {
            let registry = ids.iter().map(|id| Mod::new(*id)).collect();
            let mut profile = Profile::new("p1", GAME_ID);
            for id in ids {
                profile.set_enabled(id, true);
            }
            Self {
                registry: Mutex::new(registry),
                profile: Mutex::new(Some(profile)),
            }
        }
    }

    impl Host for FakeHost {
        fn mods(&self, _game_id: &str) -> ModRegistry {
            self.registry.lock().unwrap().clone()
        }

        fn active_profile(&self) -> Option<Profile> {
            self.profile.lock().unwrap().clone()
        }

        fn last_active_profile(&self, _game_id: &str) -> Option<Profile> {
            self.active_profile()
        }

        fn notify_error(&self, _kind: ErrorKind, _message: &str, _allow_report: bool) {}
    }

    fn ids(list: &[DisplayItem]) -> Vec<&str> {
        list.iter().map(|item| item.id.as_str()).collect()
    }

    fn entry(position: usize, enabled: bool) -> LoadOrderEntry {
        LoadOrderEntry { position, enabled }
    }

    fn setup(contents: &str, mods: &[&str]) -> (TempDir, Store, Arc<FakeHost>) {
        let temp = TempDir::new().unwrap();
        let paths = GamePaths::from_dirs(temp.path().join("game"), temp.path().join("user"));
        fs::create_dir_all(&paths.user_dir).unwrap();
        fs::write(&paths.modconfig_path, contents).unwrap();
        let host = Arc::new(FakeHost::new(mods));
        let mut store = Store::open(Some(paths), host.clone());
        store.refresh();
        (temp, store, host)
    }

    #[test]
    fn build_lists_partitions_registry() {
        let order: LoadOrder = [
            ("c".to_string(), entry(0, true)),
            ("a".to_string(), entry(1, false)),
            ("b".to_string(), entry(2, true)),
            ("gone".to_string(), entry(3, true)),
        ]
        .into_iter()
        .collect();
        let mut registry: ModRegistry = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|id| Mod::new(*id))
            .collect();
        registry.insert(Mod::collection("pack", &["a"]));
        let mut profile = Profile::new("p", GAME_ID);
        for id in ["a", "c", "d"] {
            profile.set_enabled(id, true);
        }

        let lists = build_lists(&order, &registry, Some(&profile));
        assert_eq!(ids(&lists.enabled), vec!["c"]);
        assert_eq!(ids(&lists.disabled), vec!["a", "b", "d", "e", "pack"]);
        assert_eq!(lists.len(), registry.len());
    }

    #[test]
    fn collections_get_a_slot_like_any_mod() {
        let order: LoadOrder = [("pack".to_string(), entry(0, true))].into_iter().collect();
        let registry: ModRegistry = [Mod::new("a"), Mod::collection("pack", &["a"])]
            .into_iter()
            .collect();

        let lists = build_lists(&LoadOrder::new(), &registry, None);
        assert_eq!(ids(&lists.disabled), vec!["a", "pack"]);
        assert_eq!(lists.len(), registry.len());

        let lists = build_lists(&order, &registry, None);
        assert_eq!(ids(&lists.enabled), vec!["pack"]);
        assert_eq!(ids(&lists.disabled), vec!["a"]);
    }

    #[test]
    fn build_lists_without_profile_trusts_entries() {
        let order: LoadOrder = [
            ("b".to_string(), entry(0, true)),
            ("a".to_string(), entry(1, true)),
        ]
        .into_iter()
        .collect();
        let registry: ModRegistry = [Mod::named("a", "Alpha"), Mod::new("b")]
            .into_iter()
            .collect();
        let lists = build_lists(&order, &registry, None);
        assert_eq!(ids(&lists.enabled), vec!["b", "a"]);
        assert_eq!(lists.enabled[1].name, "Alpha");
        assert!(lists.disabled.is_empty());
    }

    #[test]
    fn drag_disabled_to_enabled_then_flush() {
        let (_temp, mut store, host) = setup(
            r#"{"Entries":[{"FolderName":"modA","Enabled":true},{"FolderName":"modB","Enabled":false}]}"#,
            &["modA", "modB"],
        );
        let mut editor = Editor::new(GAME_ID, Duration::from_secs(2));
        assert!(editor.sync(&store, host.as_ref()));
        assert_eq!(ids(&editor.lists().enabled), vec!["modA"]);
        assert_eq!(ids(&editor.lists().disabled), vec!["modB"]);

        let start = Instant::now();
        assert!(editor.begin_drag(Container::Disabled, 0));
        assert!(editor.hover_container(Container::Enabled));
        let commit = editor.drop(start).unwrap();
        assert_eq!(ids(&commit.enabled), vec!["modB", "modA"]);

        assert!(!editor.tick(start + Duration::from_millis(1999), &mut store));
        assert!(editor.tick(start + Duration::from_secs(2), &mut store));

        let expected: LoadOrder = [
            ("modB".to_string(), entry(0, true)),
            ("modA".to_string(), entry(1, true)),
        ]
        .into_iter()
        .collect();
        assert_eq!(store.load_order(), &expected);
        assert_eq!(store.read(), expected);
        let path = store.paths().unwrap().user_dir.join(MODCONFIG_FILE);
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(
            value["Entries"],
            serde_json::json!([
                {"FolderName": "modB", "Enabled": true},
                {"FolderName": "modA", "Enabled": true}
            ])
        );
    }

    #[test]
    fn bursts_of_edits_write_once_with_last_state() {
        let (_temp, mut store, host) = setup(
            r#"{"Entries":[{"FolderName":"a","Enabled":true},{"FolderName":"b","Enabled":true},{"FolderName":"c","Enabled":true}]}"#,
            &["a", "b", "c"],
        );
        let mut editor = Editor::new(GAME_ID, Duration::from_millis(500));
        editor.sync(&store, host.as_ref());
        let generation = store.generation();

        let start = Instant::now();
        assert!(editor.move_within(Container::Enabled, 0, 2, start));
        assert!(editor.toggle("b", start + Duration::from_millis(200)));
        assert!(editor.move_within(Container::Enabled, 0, 1, start + Duration::from_millis(400)));

        assert!(!editor.tick(start + Duration::from_millis(800), &mut store));
        assert!(editor.tick(start + Duration::from_millis(900), &mut store));
        assert!(!editor.tick(start + Duration::from_secs(5), &mut store));
        assert_eq!(store.generation(), generation + 1);

        assert_eq!(store.load_order().ids_by_position(), vec!["a", "c", "b"]);
        assert_eq!(store.load_order().get("b"), Some(&entry(2, false)));
    }

    #[test]
    fn flushed_positions_are_dense_and_enabled_first() {
        let (_temp, mut store, host) = setup(
            r#"{"Entries":[{"FolderName":"x","Enabled":false},{"FolderName":"y","Enabled":true},{"FolderName":"z","Enabled":false}]}"#,
            &["w", "x", "y", "z"],
        );
        let mut editor = Editor::new(GAME_ID, Duration::from_millis(10));
        editor.sync(&store, host.as_ref());
        assert!(editor.toggle("w", Instant::now()));
        assert!(editor.flush_now(&mut store));

        let order = store.load_order();
        let mut positions: Vec<usize> = order.iter().map(|(_, entry)| entry.position).collect();
        positions.sort();
        assert_eq!(positions, vec![0, 1, 2, 3]);
        let ranked = order.ids_by_position();
        let first_disabled = ranked
            .iter()
            .position(|id| !order.get(id).unwrap().enabled)
            .unwrap();
        assert!(ranked[first_disabled..]
            .iter()
            .all(|id| !order.get(id).unwrap().enabled));
        assert_eq!(ranked, vec!["w", "y", "x", "z"]);
    }

    #[test]
    fn sync_rebuilds_only_on_input_change() {
        let (_temp, mut store, host) = setup(r#"{"Entries":[]}"#, &["a"]);
        let mut editor = Editor::new(GAME_ID, Duration::from_secs(1));
        assert!(editor.sync(&store, host.as_ref()));
        assert!(!editor.sync(&store, host.as_ref()));

        host.registry.lock().unwrap().insert(Mod::new("b"));
        assert!(editor.sync(&store, host.as_ref()));
        assert_eq!(ids(&editor.lists().disabled), vec!["a", "b"]);

        store.refresh();
        assert!(editor.sync(&store, host.as_ref()));

        *host.profile.lock().unwrap() = None;
        assert!(editor.sync(&store, host.as_ref()));
    }

    #[test]
    fn pending_edit_blocks_rebuild_until_flushed() {
        let (_temp, mut store, host) = setup(
            r#"{"Entries":[{"FolderName":"a","Enabled":true}]}"#,
            &["a", "b"],
        );
        let mut editor = Editor::new(GAME_ID, Duration::from_secs(1));
        editor.sync(&store, host.as_ref());
        let start = Instant::now();
        editor.toggle("b", start);

        store.refresh();
        assert!(!editor.sync(&store, host.as_ref()));
        assert_eq!(ids(&editor.lists().enabled), vec!["b", "a"]);

        assert!(editor.tick(start + Duration::from_secs(1), &mut store));
        assert!(editor.sync(&store, host.as_ref()));
        assert_eq!(ids(&editor.lists().enabled), vec!["b", "a"]);
    }

    #[test]
    fn discarding_pending_edit_lets_sync_rebuild() {
        let (_temp, mut store, host) = setup(
            r#"{"Entries":[{"FolderName":"a","Enabled":true}]}"#,
            &["a", "b"],
        );
        let mut editor = Editor::new(GAME_ID, Duration::from_secs(1));
        editor.sync(&store, host.as_ref());
        let start = Instant::now();
        assert!(editor.toggle("b", start));

        editor.discard_pending();
        assert!(!editor.has_pending_flush());
        assert!(editor.sync(&store, host.as_ref()));
        assert_eq!(ids(&editor.lists().enabled), vec!["a"]);
        assert!(!editor.tick(start + Duration::from_secs(5), &mut store));
        assert_eq!(store.load_order().ids_by_position(), vec!["a"]);
    }

    #[test]
    fn try_flush_reports_refused_write() {
        let (_temp, mut store, host) = setup(r#"{"Entries":[]}"#, &["a"]);
        let mut editor = Editor::new(GAME_ID, Duration::from_secs(1));
        editor.sync(&store, host.as_ref());
        assert!(matches!(editor.try_flush_now(&mut store), Ok(false)));

        let path = store.paths().unwrap().modconfig_path.clone();
        fs::write(&path, "{ broken").unwrap();
        assert!(editor.toggle("a", Instant::now()));
        assert!(matches!(
            editor.try_flush_now(&mut store),
            Err(SyncError::MalformedConfig { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ broken");
    }

    #[test]
    fn cancel_restores_lists() {
        let (_temp, store, host) = setup(
            r#"{"Entries":[{"FolderName":"a","Enabled":true},{"FolderName":"b","Enabled":true}]}"#,
            &["a", "b"],
        );
        let mut editor = Editor::new(GAME_ID, Duration::from_secs(1));
        editor.sync(&store, host.as_ref());
        let before = editor.lists().clone();

        assert!(editor.begin_drag(Container::Enabled, 0));
        assert!(editor.hover_container(Container::Disabled));
        assert_ne!(editor.lists(), &before);
        editor.cancel_drag();
        assert_eq!(editor.lists(), &before);
        assert!(!editor.drag_state().is_dragging());
        assert!(!editor.has_pending_flush());
    }

    #[test]
    fn drop_without_change_schedules_nothing() {
        let (_temp, store, host) = setup(
            r#"{"Entries":[{"FolderName":"a","Enabled":true}]}"#,
            &["a"],
        );
        let mut editor = Editor::new(GAME_ID, Duration::from_secs(1));
        editor.sync(&store, host.as_ref());
        assert!(editor.begin_drag(Container::Enabled, 0));
        assert!(editor.drop(Instant::now()).is_none());
        assert!(!editor.has_pending_flush());
    }
}
