use crate::modconfig::MODCONFIG_FILE;
use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const GAME_ID: &str = "pillarsofeternity2";
pub const GAME_NAME: &str = "Pillars Of Eternity II: Deadfire";
pub const STEAM_APP_ID: u32 = 560130;
const DATA_DIR: &str = "PillarsOfEternityII_Data";
const OVERRIDE_DIR: &str = "override";
const USER_DIR_TAIL: [&str; 2] = ["Obsidian Entertainment", "Pillars of Eternity II"];

/// Registration facts about the game, independent of where it is installed.
#[derive(Debug, Clone, Copy)]
pub struct GameDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub merge_mods: bool,
    pub executable: &'static str,
    pub required_files: &'static [&'static str],
    pub steam_app_id: u32,
    pub logo: &'static str,
}

pub const DESCRIPTOR: GameDescriptor = GameDescriptor {
    id: GAME_ID,
    name: GAME_NAME,
    merge_mods: false,
    executable: "PillarsOfEternityII.exe",
    required_files: &["PillarsOfEternityII.exe"],
    steam_app_id: STEAM_APP_ID,
    logo: "gameart.png",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePaths {
    pub game_root: PathBuf,
    /// `PillarsOfEternityII_Data/override`, one folder per mod.
    pub mod_dir: PathBuf,
    pub user_dir: PathBuf,
    pub modconfig_path: PathBuf,
}

impl GamePaths {
    pub fn from_dirs(game_root: PathBuf, user_dir: PathBuf) -> Self {
        let mod_dir = game_root.join(mod_path());
        let modconfig_path = user_dir.join(MODCONFIG_FILE);
        Self {
            game_root,
            mod_dir,
            user_dir,
            modconfig_path,
        }
    }
}

/// Mod folder relative to the game root.
pub fn mod_path() -> PathBuf {
    Path::new(DATA_DIR).join(OVERRIDE_DIR)
}

pub fn detect_paths(
    game_root_override: Option<&Path>,
    user_dir_override: Option<&Path>,
) -> Result<GamePaths> {
    let game_root = match game_root_override {
        Some(path) => path.to_path_buf(),
        None => find_game_root().context("locate Deadfire game directory")?,
    };

    let user_dir = match user_dir_override {
        Some(path) => path.to_path_buf(),
        None => find_user_dir().context("locate Deadfire user config directory")?,
    };

    if !looks_like_game_root(&game_root) {
        bail!(
            "invalid game root: expected {DATA_DIR}/ in {}",
            game_root.display()
        );
    }

    Ok(GamePaths::from_dirs(game_root, user_dir))
}

/// Creates the override folder so mods can be deployed into it.
pub fn prepare_for_modding(paths: &GamePaths) -> Result<()> {
    fs::create_dir_all(&paths.mod_dir).context("create override dir")
}

fn find_game_root() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(home) = dirs_home() {
        candidates.push(home.join(".local/share/Steam"));
        candidates.push(home.join(".steam/steam"));
    }

    let mut libraries = Vec::new();
    for base in candidates {
        let vdf = base.join("steamapps/libraryfolders.vdf");
        if vdf.exists() {
            if let Ok(paths) = parse_steam_library_paths(&vdf) {
                libraries.extend(paths);
            }
        }
        libraries.push(base);
    }

    for lib in libraries {
        for folder in ["Pillars of Eternity II", "Pillars of Eternity II Deadfire"] {
            let candidate = lib.join("steamapps/common").join(folder);
            if looks_like_game_root(&candidate) {
                return Some(candidate);
            }
        }
    }

    None
}

fn find_user_dir() -> Option<PathBuf> {
    let home = dirs_home()?;
    let mut native = home.join(".config/unity3d");
    let mut proton = home
        .join(".local/share/Steam/steamapps/compatdata")
        .join(STEAM_APP_ID.to_string())
        .join("pfx/drive_c/users/steamuser/AppData/LocalLow");
    for part in USER_DIR_TAIL {
        native.push(part);
        proton.push(part);
    }

    [native, proton].into_iter().find(|candidate| candidate.is_dir())
}

fn parse_steam_library_paths(path: &Path) -> Result<Vec<PathBuf>> {
    let raw = fs::read_to_string(path).context("read libraryfolders.vdf")?;
    Ok(steam_library_paths(&raw))
}

fn steam_library_paths(raw: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if !line.contains("\"path\"") {
            continue;
        }

        let parts: Vec<&str> = line.split('"').collect();
        if parts.len() >= 4 {
            let path = parts[3].replace("\\\\", "\\");
            paths.push(PathBuf::from(path));
        }
    }
    paths
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

pub fn looks_like_game_root(path: &Path) -> bool {
    path.join(DATA_DIR).is_dir()
}
