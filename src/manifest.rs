use serde::Serialize;
use serde_json::{Map, Value};
use std::{fs, path::Path};

pub const MANIFEST_FILE: &str = "manifest.json";
const DEFAULT_MIN_VERSION: &str = "1.0";
const DEFAULT_MAX_VERSION: &str = "9.0";

/// Attributes pulled from a mod's `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModManifest {
    pub title: Option<String>,
    pub min_game_version: String,
    pub max_game_version: String,
}

impl Default for ModManifest {
    fn default() -> Self {
        Self {
            title: None,
            min_game_version: DEFAULT_MIN_VERSION.to_string(),
            max_game_version: DEFAULT_MAX_VERSION.to_string(),
        }
    }
}

pub fn read_manifest(mod_path: &Path) -> ModManifest {
    let bytes = match fs::read(mod_path.join(MANIFEST_FILE)) {
        Ok(bytes) => bytes,
        Err(_) => return ModManifest::default(),
    };
    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(_) => return ModManifest::default(),
    };
    parse_manifest(&value)
}

// Key casing in the wild is inconsistent ("Min", "min", "MIN").
fn parse_manifest(value: &Value) -> ModManifest {
    let Some(obj) = value.as_object() else {
        return ModManifest::default();
    };
    let versions = get_ci(obj, "SupportedGameVersion").and_then(|v| v.as_object());
    let version = |key: &str, fallback: &str| {
        versions
            .and_then(|versions| get_ci(versions, key))
            .and_then(version_string)
            .unwrap_or_else(|| fallback.to_string())
    };
    ModManifest {
        title: get_ci(obj, "Title").and_then(localized_text),
        min_game_version: version("min", DEFAULT_MIN_VERSION),
        max_game_version: version("max", DEFAULT_MAX_VERSION),
    }
}

fn get_ci<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).or_else(|| {
        obj.iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    })
}

fn version_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn localized_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => Some(text.as_str()),
        Value::Object(map) => get_ci(map, "en")
            .and_then(|v| v.as_str())
            .or_else(|| map.values().find_map(|v| v.as_str())),
        _ => None,
    }?;
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_manifest_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let manifest = read_manifest(temp.path());
        assert_eq!(manifest, ModManifest::default());
        assert_eq!(manifest.min_game_version, "1.0");
        assert_eq!(manifest.max_game_version, "9.0");
    }

    #[test]
    fn malformed_manifest_uses_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), "{{{").unwrap();
        assert_eq!(read_manifest(temp.path()), ModManifest::default());
    }

    #[test]
    fn versions_are_case_insensitive() {
        let value = serde_json::json!({
            "supportedgameversion": {"MIN": "4.0", "Max": 5.1},
            "Title": {"de": "Beute", "en": "Loot"}
        });
        let manifest = parse_manifest(&value);
        assert_eq!(manifest.min_game_version, "4.0");
        assert_eq!(manifest.max_game_version, "5.1");
        assert_eq!(manifest.title.as_deref(), Some("Loot"));
    }

    #[test]
    fn partial_versions_fill_in_defaults() {
        let value = serde_json::json!({"SupportedGameVersion": {"Min": "2.0"}, "Title": "Plain"});
        let manifest = parse_manifest(&value);
        assert_eq!(manifest.min_game_version, "2.0");
        assert_eq!(manifest.max_game_version, "9.0");
        assert_eq!(manifest.title.as_deref(), Some("Plain"));
    }
}
