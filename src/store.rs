use crate::{
    error::{ErrorKind, SyncError},
    host::Host,
    load_order::LoadOrder,
    modconfig,
    poe2::GamePaths,
};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc,
    },
};
use tracing::{debug, info, warn};

struct WatchHandle {
    _watcher: RecommendedWatcher,
    tx: Sender<()>,
    rx: Receiver<()>,
}

/// Owns the in-memory load order and keeps it in step with `modconfig.json`.
pub struct Store {
    paths: Option<GamePaths>,
    host: Arc<dyn Host>,
    order: LoadOrder,
    generation: u64,
    watch: Option<WatchHandle>,
    last_malformed: Option<String>,
}

impl Store {
    /// `paths` is `None` while the game has not been located.
    pub fn open(paths: Option<GamePaths>, host: Arc<dyn Host>) -> Self {
        Self {
            paths,
            host,
            order: LoadOrder::new(),
            generation: 0,
            watch: None,
            last_malformed: None,
        }
    }

    pub fn paths(&self) -> Option<&GamePaths> {
        self.paths.as_ref()
    }

    pub fn modconfig_path(&self) -> Option<&Path> {
        self.paths.as_ref().map(|paths| paths.modconfig_path.as_path())
    }

    pub fn load_order(&self) -> &LoadOrder {
        &self.order
    }

    /// Bumped every time the in-memory order is replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Parses the file without touching the in-memory copy. Missing or
    /// unparsable files read as an empty order.
    pub fn read(&self) -> LoadOrder {
        match self.modconfig_path() {
            Some(path) => modconfig::read_load_order(path),
            None => LoadOrder::new(),
        }
    }

    /// Re-reads the file and replaces the in-memory copy.
    pub fn refresh(&mut self) {
        let Some(path) = self.modconfig_path().map(Path::to_path_buf) else {
            self.replace(LoadOrder::new());
            return;
        };
        let order = match modconfig::read_load_order_strict(&path) {
            Ok(Some(order)) => {
                self.last_malformed = None;
                order
            }
            Ok(None) => {
                debug!(path = %path.display(), "modconfig.json missing, using empty load order");
                self.last_malformed = None;
                LoadOrder::new()
            }
            Err(err @ SyncError::MalformedConfig { .. }) => {
                self.report_malformed(&path, &err);
                LoadOrder::new()
            }
            Err(err) => {
                warn!("load order read failed: {err}");
                LoadOrder::new()
            }
        };
        info!(entries = order.len(), "load order refreshed");
        self.replace(order);
    }

    /// Replaces the in-memory order and persists it. Failures are reported to
    /// the host instead of being returned.
    pub fn write(&mut self, order: LoadOrder) {
        if let Err(err) = self.try_write(order) {
            self.host.notify_error(
                err.kind(),
                &format!("Failed to save load order: {err}"),
                err.allow_report(),
            );
        }
    }

    pub fn try_write(&mut self, order: LoadOrder) -> Result<(), SyncError> {
        self.replace(order);
        let path = self
            .modconfig_path()
            .map(Path::to_path_buf)
            .ok_or(SyncError::GameNotDiscovered)?;
        modconfig::write_load_order(&path, &self.order)?;
        info!(entries = self.order.len(), path = %path.display(), "load order written");
        Ok(())
    }

    /// Watches the directory holding `modconfig.json` and performs an
    /// immediate refresh. Restarts the watch if one is already running.
    pub fn start_watch(&mut self) -> Result<(), SyncError> {
        let paths = self.paths.as_ref().ok_or(SyncError::GameNotDiscovered)?;
        let path = paths.modconfig_path.clone();
        let dir = paths.user_dir.clone();
        self.stop_watch();

        fs::create_dir_all(&dir).map_err(|err| SyncError::io("create mod config dir", err))?;
        let (tx, rx) = mpsc::channel();
        let watcher = build_watcher(&dir, path, tx.clone())?;
        self.watch = Some(WatchHandle {
            _watcher: watcher,
            tx,
            rx,
        });
        info!(dir = %dir.display(), "load order watch started");

        self.refresh();
        Ok(())
    }

    pub fn stop_watch(&mut self) {
        if self.watch.take().is_some() {
            info!("load order watch stopped");
        }
    }

    /// Sender that marks the file as changed, for callers with their own
    /// change source. `None` while not watching.
    pub fn change_notifier(&self) -> Option<Sender<()>> {
        self.watch.as_ref().map(|watch| watch.tx.clone())
    }

    /// Drains queued change notifications and refreshes once if any arrived.
    pub fn poll_changes(&mut self) -> bool {
        let Some(watch) = &self.watch else {
            return false;
        };
        let mut changed = false;
        loop {
            match watch.rx.try_recv() {
                Ok(()) => changed = true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if changed {
            debug!("modconfig.json changed on disk");
            self.refresh();
        }
        changed
    }

    pub fn close(mut self) {
        self.stop_watch();
    }

    fn replace(&mut self, order: LoadOrder) {
        self.order = order;
        self.generation = self.generation.wrapping_add(1);
    }

    fn report_malformed(&mut self, path: &Path, err: &SyncError) {
        let message = err.to_string();
        if self.last_malformed.as_deref() == Some(message.as_str()) {
            return;
        }
        warn!("{message}");
        self.host.notify_error(
            ErrorKind::MalformedConfig,
            &format!(
                "Your mod configuration file is invalid. Fix or delete it: {}",
                path.display()
            ),
            false,
        );
        self.last_malformed = Some(message);
    }
}

fn build_watcher(dir: &Path, target: PathBuf, tx: Sender<()>) -> Result<RecommendedWatcher, SyncError> {
    let file_name = target.file_name().map(|name| name.to_os_string());
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| {
            let Ok(event) = res else {
                return;
            };
            if !(event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove()) {
                return;
            }
            let touches_target = event
                .paths
                .iter()
                .any(|path| path.file_name().map(|name| name.to_os_string()) == file_name);
            if touches_target {
                let _ = tx.send(());
            }
        },
        Config::default(),
    )?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::{ModRegistry, Notice, Profile},
        load_order::LoadOrderEntry,
        modconfig::MODCONFIG_FILE,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingHost {
        notices: Mutex<Vec<Notice>>,
    }

    impl RecordingHost {
        fn kinds(&self) -> Vec<ErrorKind> {
            self.notices
                .lock()
                .unwrap()
                .iter()
                .map(|notice| notice.kind)
                .collect()
        }
    }

    impl Host for RecordingHost {
        fn mods(&self, _game_id: &str) -> ModRegistry {
            ModRegistry::new()
        }

        fn active_profile(&self) -> Option<Profile> {
            None
        }

        fn last_active_profile(&self, _game_id: &str) -> Option<Profile> {
            None
        }

        fn notify_error(&self, kind: ErrorKind, message: &str, allow_report: bool) {
            self.notices.lock().unwrap().push(Notice {
                kind,
                message: message.to_string(),
                allow_report,
            });
        }
    }

    fn setup() -> (TempDir, GamePaths, Arc<RecordingHost>) {
        let temp = TempDir::new().unwrap();
        let paths = GamePaths::from_dirs(temp.path().join("game"), temp.path().join("user"));
        (temp, paths, Arc::new(RecordingHost::default()))
    }

    fn entry(position: usize, enabled: bool) -> LoadOrderEntry {
        LoadOrderEntry { position, enabled }
    }

    #[test]
    fn start_watch_without_game_fails_before_touching_disk() {
        let host = Arc::new(RecordingHost::default());
        let mut store = Store::open(None, host.clone());
        let err = store.start_watch().unwrap_err();
        assert!(matches!(err, SyncError::GameNotDiscovered));
        assert!(err.is_cancelable());
        assert!(!store.is_watching());
        assert_eq!(store.generation(), 0);
        assert!(host.kinds().is_empty());
    }

    #[test]
    fn start_watch_reads_immediately() {
        let (_temp, paths, host) = setup();
        fs::create_dir_all(&paths.user_dir).unwrap();
        fs::write(
            &paths.modconfig_path,
            r#"{"Entries":[{"FolderName":"modA","Enabled":true},{"FolderName":"modB","Enabled":false}]}"#,
        )
        .unwrap();

        let mut store = Store::open(Some(paths), host);
        store.start_watch().unwrap();
        assert!(store.is_watching());
        assert_eq!(store.load_order().get("modA"), Some(&entry(0, true)));
        assert_eq!(store.load_order().get("modB"), Some(&entry(1, false)));
        store.close();
    }

    #[test]
    fn change_notifications_trigger_one_refresh() {
        let (_temp, paths, host) = setup();
        let config_path = paths.modconfig_path.clone();
        let mut store = Store::open(Some(paths), host);
        store.start_watch().unwrap();
        assert!(store.load_order().is_empty());

        fs::write(
            &config_path,
            r#"{"Entries":[{"FolderName":"late","Enabled":true}]}"#,
        )
        .unwrap();
        // Drop whatever the OS watcher queued so only our notifications count.
        while store.poll_changes() {}
        let generation = store.generation();

        let notifier = store.change_notifier().unwrap();
        notifier.send(()).unwrap();
        notifier.send(()).unwrap();
        assert!(store.poll_changes());
        assert_eq!(store.generation(), generation + 1);
        assert_eq!(store.load_order().get("late"), Some(&entry(0, true)));
    }

    #[test]
    fn stop_watch_is_idempotent_and_discards_changes() {
        let (_temp, paths, host) = setup();
        let mut store = Store::open(Some(paths), host);
        store.stop_watch();
        store.start_watch().unwrap();
        let notifier = store.change_notifier().unwrap();
        store.stop_watch();
        store.stop_watch();
        let _ = notifier.send(());
        assert!(!store.poll_changes());
        assert!(store.change_notifier().is_none());
    }

    #[test]
    fn malformed_file_is_empty_and_reported_once() {
        let (_temp, paths, host) = setup();
        fs::create_dir_all(&paths.user_dir).unwrap();
        fs::write(&paths.modconfig_path, "{ broken").unwrap();

        let mut store = Store::open(Some(paths), host.clone());
        assert!(store.read().is_empty());
        store.refresh();
        store.refresh();
        assert!(store.load_order().is_empty());
        assert_eq!(host.kinds(), vec![ErrorKind::MalformedConfig]);
        let notices = host.notices.lock().unwrap();
        assert!(!notices[0].allow_report);
        assert!(notices[0].message.contains(MODCONFIG_FILE));
    }

    #[test]
    fn write_persists_and_preserves_metadata() {
        let (_temp, paths, host) = setup();
        fs::create_dir_all(&paths.user_dir).unwrap();
        fs::write(
            &paths.modconfig_path,
            r#"{"Entries":[],"GameVersion":"5.0.0.0040"}"#,
        )
        .unwrap();
        let config_path = paths.modconfig_path.clone();

        let mut store = Store::open(Some(paths), host.clone());
        let mut order = LoadOrder::new();
        order.insert("modB".to_string(), entry(0, true));
        order.insert("modA".to_string(), entry(1, true));
        store.write(order.clone());

        assert_eq!(store.load_order(), &order);
        assert_eq!(store.read(), order);
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&config_path).unwrap()).unwrap();
        assert_eq!(value["GameVersion"], "5.0.0.0040");
        assert_eq!(value["Entries"][0]["FolderName"], "modB");
        assert!(host.kinds().is_empty());
    }

    #[test]
    fn write_failure_goes_to_host() {
        let host = Arc::new(RecordingHost::default());
        let mut store = Store::open(None, host.clone());
        let mut order = LoadOrder::new();
        order.insert("modA".to_string(), entry(0, true));
        store.write(order.clone());
        assert_eq!(store.load_order(), &order);
        assert_eq!(host.kinds(), vec![ErrorKind::Precondition]);
    }
}
