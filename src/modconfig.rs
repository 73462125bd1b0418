use crate::{
    error::SyncError,
    load_order::{LoadOrder, LoadOrderEntry},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs, io,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

pub const MODCONFIG_FILE: &str = "modconfig.json";
const ENTRIES_KEY: &str = "Entries";

#[derive(Debug, Deserialize)]
struct RawModConfig {
    #[serde(rename = "Entries", default)]
    entries: Option<Vec<RawEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "FolderName", default)]
    folder_name: Option<String>,
    #[serde(rename = "Enabled", default)]
    enabled: Option<bool>,
}

#[derive(Debug, Serialize)]
struct EntryOut<'a> {
    #[serde(rename = "FolderName")]
    folder_name: &'a str,
    #[serde(rename = "Enabled")]
    enabled: bool,
}

/// Array index becomes the position. A repeated folder keeps its last index.
/// Anything but a JSON object at the top level is rejected, as on write.
pub fn parse_load_order(raw: &str) -> Result<LoadOrder, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(not_an_object());
    }
    let parsed: RawModConfig = serde_json::from_value(value)?;
    let mut order = LoadOrder::new();
    for (idx, entry) in parsed.entries.unwrap_or_default().into_iter().enumerate() {
        let Some(folder_name) = entry.folder_name else {
            continue;
        };
        order.insert(
            folder_name,
            LoadOrderEntry {
                position: idx,
                enabled: entry.enabled.unwrap_or(false),
            },
        );
    }
    Ok(order)
}

/// `Ok(None)` when the file does not exist.
pub fn read_load_order_strict(path: &Path) -> Result<Option<LoadOrder>, SyncError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(SyncError::io("read modconfig.json", err)),
    };
    parse_load_order(&raw)
        .map(Some)
        .map_err(|source| SyncError::MalformedConfig {
            path: path.to_path_buf(),
            source,
        })
}

/// Never fails: anything unreadable is an empty load order.
pub fn read_load_order(path: &Path) -> LoadOrder {
    read_load_order_strict(path)
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Replaces `Entries` in the document at `path`, leaving every other
/// top-level field untouched and in place.
pub fn write_load_order(path: &Path, order: &LoadOrder) -> Result<(), SyncError> {
    let mut document = read_document(path)?;
    document.insert(ENTRIES_KEY.to_string(), entries_value(order)?);
    let raw = serde_json::to_string_pretty(&Value::Object(document))
        .map_err(SyncError::Serialize)?;
    write_atomic_text(path, &raw)
}

fn entries_value(order: &LoadOrder) -> Result<Value, SyncError> {
    let ids = order.ids_by_position();
    let entries: Vec<EntryOut<'_>> = ids
        .iter()
        .filter_map(|id| {
            order.get(id).map(|entry| EntryOut {
                folder_name: id.as_str(),
                enabled: entry.enabled,
            })
        })
        .collect();
    serde_json::to_value(entries).map_err(SyncError::Serialize)
}

fn read_document(path: &Path) -> Result<Map<String, Value>, SyncError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(err) => return Err(SyncError::io("read modconfig.json", err)),
    };
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(SyncError::MalformedConfig {
            path: path.to_path_buf(),
            source: not_an_object(),
        }),
        Err(source) => Err(SyncError::MalformedConfig {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn not_an_object() -> serde_json::Error {
    <serde_json::Error as serde::de::Error>::custom("top-level value is not an object")
}

fn write_atomic_text(path: &Path, contents: &str) -> Result<(), SyncError> {
    let parent = path.parent().ok_or_else(|| {
        SyncError::io(
            "modconfig.json parent",
            io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"),
        )
    })?;
    fs::create_dir_all(parent).map_err(|err| SyncError::io("create modconfig dir", err))?;
    let file_name = path.file_name().unwrap_or_else(|| MODCONFIG_FILE.as_ref());
    let mut temp_name = std::ffi::OsString::from(file_name);
    temp_name.push(".tmp");
    let mut temp_path = parent.join(temp_name);
    if temp_path.exists() {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let mut temp_name = std::ffi::OsString::from(file_name);
        temp_name.push(format!(".{stamp}.tmp"));
        temp_path = parent.join(temp_name);
    }
    fs::write(&temp_path, contents).map_err(|err| SyncError::io("write modconfig temp", err))?;
    fs::rename(&temp_path, path).map_err(|err| SyncError::io("finalize modconfig.json", err))?;
    Ok(())
}
