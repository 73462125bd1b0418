use crate::{error::ErrorKind, poe2};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::{error, warn};
use walkdir::WalkDir;

/// What the load order code needs from whoever embeds it.
pub trait Host {
    fn mods(&self, game_id: &str) -> ModRegistry;
    fn active_profile(&self) -> Option<Profile>;
    fn last_active_profile(&self, game_id: &str) -> Option<Profile>;
    fn notify_error(&self, kind: ErrorKind, message: &str, allow_report: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModKind {
    #[default]
    Mod,
    /// Meta-package bundling other mods; never has a load order slot.
    Collection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModReference {
    pub id: String,
}

/// Game versions a mod declares support for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameVersionRange {
    pub min: String,
    pub max: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mod {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: ModKind,
    #[serde(default)]
    pub rules: Vec<ModReference>,
    #[serde(default)]
    pub game_versions: Option<GameVersionRange>,
}

impl Mod {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: ModKind::Mod,
            rules: Vec::new(),
            game_versions: None,
        }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(id)
        }
    }

    pub fn collection(id: impl Into<String>, members: &[&str]) -> Self {
        Self {
            kind: ModKind::Collection,
            rules: members
                .iter()
                .map(|id| ModReference { id: id.to_string() })
                .collect(),
            ..Self::new(id)
        }
    }

    pub fn display_name(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.id,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.kind == ModKind::Collection
    }
}

/// Installed mods keyed by id, iterated in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModRegistry {
    mods: BTreeMap<String, Mod>,
}

impl ModRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mod_entry: Mod) {
        self.mods.insert(mod_entry.id.clone(), mod_entry);
    }

    pub fn get(&self, id: &str) -> Option<&Mod> {
        self.mods.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.mods.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.mods.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mod> {
        self.mods.values()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    pub fn display_name(&self, id: &str) -> String {
        self.get(id)
            .map(|mod_entry| mod_entry.display_name().to_string())
            .unwrap_or_else(|| id.to_string())
    }
}

impl FromIterator<Mod> for ModRegistry {
    fn from_iter<I: IntoIterator<Item = Mod>>(iter: I) -> Self {
        let mut registry = ModRegistry::new();
        for mod_entry in iter {
            registry.insert(mod_entry);
        }
        registry
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub game_id: String,
    #[serde(default)]
    pub mod_state: HashMap<String, bool>,
}

impl Profile {
    pub fn new(id: impl Into<String>, game_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            game_id: game_id.into(),
            mod_state: HashMap::new(),
        }
    }

    pub fn is_enabled(&self, mod_id: &str) -> bool {
        self.mod_state.get(mod_id).copied().unwrap_or(false)
    }

    pub fn set_enabled(&mut self, mod_id: &str, enabled: bool) {
        self.mod_state.insert(mod_id.to_string(), enabled);
    }
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: ErrorKind,
    pub message: String,
    pub allow_report: bool,
}

const RESCAN_INTERVAL: Duration = Duration::from_secs(2);

/// Host backed by the game's override folder: every sub-folder is a mod and
/// the single "Default" profile enables all of them.
pub struct LocalHost {
    mod_dir: Option<PathBuf>,
    notices: Mutex<Vec<Notice>>,
    scanned: Mutex<Option<(Instant, ModRegistry)>>,
}

impl LocalHost {
    pub fn new(mod_dir: Option<PathBuf>) -> Self {
        Self {
            mod_dir,
            notices: Mutex::new(Vec::new()),
            scanned: Mutex::new(None),
        }
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(mut notices) => std::mem::take(&mut *notices),
            Err(_) => Vec::new(),
        }
    }

    /// Reuses the last scan for a short while; the TUI asks every frame.
    fn scan_registry(&self) -> ModRegistry {
        let Some(dir) = &self.mod_dir else {
            return ModRegistry::new();
        };
        let Ok(mut scanned) = self.scanned.lock() else {
            return scan_mod_dir(dir);
        };
        if let Some((at, registry)) = scanned.as_ref() {
            if at.elapsed() < RESCAN_INTERVAL {
                return registry.clone();
            }
        }
        let registry = scan_mod_dir(dir);
        *scanned = Some((Instant::now(), registry.clone()));
        registry
    }

    /// Forgets the cached scan so the next query sees new folders.
    pub fn rescan(&self) {
        if let Ok(mut scanned) = self.scanned.lock() {
            *scanned = None;
        }
    }

    fn profile_for(&self, game_id: &str) -> Option<Profile> {
        if game_id != poe2::GAME_ID {
            return None;
        }
        self.mod_dir.as_ref()?;
        let mut profile = Profile::new("Default", poe2::GAME_ID);
        for id in self.scan_registry().ids() {
            profile.set_enabled(id, true);
        }
        Some(profile)
    }
}

impl Host for LocalHost {
    fn mods(&self, game_id: &str) -> ModRegistry {
        if game_id != poe2::GAME_ID {
            return ModRegistry::new();
        }
        self.scan_registry()
    }

    fn active_profile(&self) -> Option<Profile> {
        self.profile_for(poe2::GAME_ID)
    }

    fn last_active_profile(&self, game_id: &str) -> Option<Profile> {
        self.profile_for(game_id)
    }

    fn notify_error(&self, kind: ErrorKind, message: &str, allow_report: bool) {
        if allow_report {
            error!(kind = kind.label(), "{message}");
        } else {
            warn!(kind = kind.label(), "{message}");
        }
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(Notice {
                kind,
                message: message.to_string(),
                allow_report,
            });
        }
    }
}

/// Sub-folders of the override dir, each one a mod. Display names and the
/// supported game versions come from the mod's manifest.
pub fn scan_mod_dir(dir: &Path) -> ModRegistry {
    let mut registry = ModRegistry::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(id) = entry.file_name().to_str() else {
            continue;
        };
        let manifest = crate::manifest::read_manifest(entry.path());
        let mut mod_entry = match manifest.title {
            Some(title) => Mod::named(id, title),
            None => Mod::new(id),
        };
        mod_entry.game_versions = Some(GameVersionRange {
            min: manifest.min_game_version,
            max: manifest.max_game_version,
        });
        registry.insert(mod_entry);
    }
    registry
}
