use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cache::{PersistedEntry, PriceCache};
use crate::errors::CoreError;

/// Bumped when the persisted entry layout changes; other versions are dropped.
pub const CACHE_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u16,
    entries: Vec<PersistedEntry>,
}

/// Load the price cache saved by a previous session.
///
/// The cache is disposable: a missing, unreadable or outdated file yields an
/// empty cache rather than an error.
pub fn load(path: &Path) -> PriceCache {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "could not read price cache");
            }
            return PriceCache::new();
        }
    };
    match serde_json::from_str::<CacheFile>(&text) {
        Ok(file) if file.version == CACHE_FORMAT_VERSION => {
            tracing::debug!(entries = file.entries.len(), "loaded price cache");
            PriceCache::from_entries(file.entries)
        }
        Ok(file) => {
            tracing::info!(version = file.version, "discarding price cache with old format");
            PriceCache::new()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "discarding corrupt price cache");
            PriceCache::new()
        }
    }
}

/// Persist every entry, stale or not. In-flight markers are not saved.
pub fn save(path: &Path, cache: &PriceCache) -> Result<(), CoreError> {
    let file = CacheFile {
        version: CACHE_FORMAT_VERSION,
        entries: cache.to_entries(),
    };
    let json = serde_json::to_string(&file)
        .map_err(|e| CoreError::Serialization(format!("Failed to serialize price cache: {e}")))?;
    super::write_atomic(path, json.as_bytes())
}
