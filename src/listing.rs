use std::fmt;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::Result;

/// Entries per listing page.
pub const PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Projects,
    Favorites,
    Following,
    Followers,
}

impl ListingKind {
    /// The order a user's listings are downloaded in. Projects last so that
    /// the listing is saved before any project is archived.
    pub const USER: [ListingKind; 4] = [
        ListingKind::Favorites,
        ListingKind::Following,
        ListingKind::Followers,
        ListingKind::Projects,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ListingKind::Projects => "projects",
            ListingKind::Favorites => "favorites",
            ListingKind::Following => "following",
            ListingKind::Followers => "followers",
        }
    }

    /// File the merged listing is saved to, e.g. `favorites.json`.
    pub fn file_name(self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appends the entries of `previous` whose `id` no longer appears in `fresh`.
/// Those were deleted remotely but are kept locally.
pub fn merge_deleted(mut fresh: Vec<Value>, previous: Vec<Value>) -> Vec<Value> {
    let deleted = previous
        .into_iter()
        .filter(|old| !fresh.iter().any(|new| new.get("id") == old.get("id")))
        .collect::<Vec<_>>();
    fresh.extend(deleted);
    fresh
}

/// Merges `fresh` with the listing saved at `path`, if any, and overwrites it.
pub fn save_merged(path: &Path, fresh: Vec<Value>) -> Result<Vec<Value>> {
    let merged = if path.exists() {
        let previous: Vec<Value> = serde_json::from_slice(&fs::read(path)?)?;
        merge_deleted(fresh, previous)
    } else {
        fresh
    };
    fs::write(path, serde_json::to_vec(&merged)?)?;
    Ok(merged)
}
