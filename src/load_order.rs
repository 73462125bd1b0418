use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOrderEntry {
    #[serde(rename = "pos")]
    pub position: usize,
    pub enabled: bool,
}

/// Mod folder name -> position and activation state.
///
/// Map order carries no meaning; `position` is the only ordering signal.
/// Positions read from disk may repeat, the writer always produces a dense
/// `0..len` ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadOrder {
    entries: HashMap<String, LoadOrderEntry>,
}

impl LoadOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ranks `enabled` first, then `disabled`, ignoring any prior positions.
    pub fn from_sequences(enabled: &[DisplayItem], disabled: &[DisplayItem]) -> Self {
        let mut order = LoadOrder::new();
        let enabled_count = enabled.len();
        for (idx, item) in enabled.iter().enumerate() {
            order.insert(
                item.id.clone(),
                LoadOrderEntry {
                    position: idx,
                    enabled: true,
                },
            );
        }
        for (idx, item) in disabled.iter().enumerate() {
            order.insert(
                item.id.clone(),
                LoadOrderEntry {
                    position: enabled_count + idx,
                    enabled: false,
                },
            );
        }
        order
    }

    pub fn get(&self, id: &str) -> Option<&LoadOrderEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn insert(&mut self, id: String, entry: LoadOrderEntry) -> Option<LoadOrderEntry> {
        self.entries.insert(id, entry)
    }

    pub fn remove(&mut self, id: &str) -> Option<LoadOrderEntry> {
        self.entries.remove(id)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &LoadOrderEntry) -> bool) {
        self.entries.retain(|id, entry| keep(id, entry));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LoadOrderEntry)> {
        self.entries.iter()
    }

    /// Ids sorted by position; equal positions fall back to the id.
    pub fn ids_by_position(&self) -> Vec<String> {
        let mut ids: Vec<(&String, usize)> = self
            .entries
            .iter()
            .map(|(id, entry)| (id, entry.position))
            .collect();
        ids.sort_by(|(lhs_id, lhs_pos), (rhs_id, rhs_pos)| {
            lhs_pos.cmp(rhs_pos).then_with(|| lhs_id.cmp(rhs_id))
        });
        ids.into_iter().map(|(id, _)| id.clone()).collect()
    }
}

impl FromIterator<(String, LoadOrderEntry)> for LoadOrder {
    fn from_iter<I: IntoIterator<Item = (String, LoadOrderEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Read-only row shown in the load order lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayItem {
    pub id: String,
    pub name: String,
}

impl DisplayItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
