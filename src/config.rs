use crate::{
    game::{self, GameId},
    poe2::GamePaths,
};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub active_game: GameId,
    #[serde(default)]
    pub game_root: Option<PathBuf>,
    /// Folder holding `modconfig.json`.
    #[serde(default)]
    pub user_dir: Option<PathBuf>,
    #[serde(default = "default_flush_delay_ms")]
    pub flush_delay_ms: u64,
    #[serde(default = "default_true")]
    pub watch_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            active_game: GameId::default(),
            game_root: None,
            user_dir: None,
            flush_delay_ms: default_flush_delay_ms(),
            watch_enabled: true,
        }
    }
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_in(&base_data_dir()?)
    }

    pub fn load_or_create_in(base_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_dir).context("create app data dir")?;
        let path = base_dir.join(CONFIG_FILE);
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig::default();
        config.save_in(base_dir)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_in(&base_data_dir()?)
    }

    pub fn save_in(&self, base_dir: &Path) -> Result<()> {
        fs::create_dir_all(base_dir).context("create app data dir")?;
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(base_dir.join(CONFIG_FILE), raw).context("write app config")?;
        Ok(())
    }

    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }

    pub fn detect_paths(&self) -> Result<GamePaths> {
        game::detect_paths(
            self.active_game,
            self.game_root.as_deref(),
            self.user_dir.as_deref(),
        )
    }
}

pub fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("deadfire-order"))
}

fn default_flush_delay_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn creates_default_config() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load_or_create_in(temp.path()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.flush_delay(), Duration::from_secs(2));
        assert!(temp.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn fills_missing_fields_with_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            r#"{"active_game":"pillarsofeternity2","game_root":"/games/poe2"}"#,
        )
        .unwrap();
        let config = AppConfig::load_or_create_in(temp.path()).unwrap();
        assert_eq!(config.active_game, GameId::Poe2);
        assert_eq!(config.game_root, Some(PathBuf::from("/games/poe2")));
        assert_eq!(config.flush_delay_ms, 2000);
        assert!(config.watch_enabled);
    }

    #[test]
    fn save_round_trips() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.flush_delay_ms = 250;
        config.user_dir = Some(PathBuf::from("/tmp/user"));
        config.save_in(temp.path()).unwrap();
        assert_eq!(AppConfig::load_or_create_in(temp.path()).unwrap(), config);
    }
}
