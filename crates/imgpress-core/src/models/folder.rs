use serde::{Deserialize, Serialize};

/// One asset-host folder in the cached snapshot.
///
/// Serialized with exactly the keys `path` and `name`; the snapshot file is a JSON array of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub path: String,
    pub name: String,
}

impl FolderEntry {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

/// Drop entries whose path was already seen. First occurrence wins, order is preserved.
pub fn dedup_folder_entries(entries: Vec<FolderEntry>) -> Vec<FolderEntry> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.path.clone()))
        .collect()
}
