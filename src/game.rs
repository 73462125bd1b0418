use crate::poe2;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameId {
    #[serde(alias = "pillarsofeternity2")]
    Poe2,
}

impl Default for GameId {
    fn default() -> Self {
        GameId::Poe2
    }
}

impl GameId {
    pub fn display_name(self) -> &'static str {
        match self {
            GameId::Poe2 => poe2::GAME_NAME,
        }
    }

    /// Id used in collection payloads and profile lookups.
    pub fn as_str(self) -> &'static str {
        match self {
            GameId::Poe2 => poe2::GAME_ID,
        }
    }
}

pub fn detect_paths(
    game: GameId,
    game_root_override: Option<&Path>,
    user_dir_override: Option<&Path>,
) -> Result<poe2::GamePaths> {
    match game {
        GameId::Poe2 => poe2::detect_paths(game_root_override, user_dir_override),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_names_map_to_host_id() {
        for raw in [r#""poe2""#, r#""pillarsofeternity2""#] {
            let game: GameId = serde_json::from_str(raw).unwrap();
            assert_eq!(game, GameId::Poe2);
            assert_eq!(game.as_str(), poe2::GAME_ID);
        }
        assert!(serde_json::from_str::<GameId>(r#""skyrim""#).is_err());
    }
}
