//! Commands for the downloaded release cache.

use crate::cache::{CachedReleaseMetadata, ReleaseCache};

/// Cached releases, sorted by key.
pub fn list_cached(cache: &ReleaseCache) -> Result<Vec<CachedReleaseMetadata>, String> {
    let mut entries: Vec<CachedReleaseMetadata> = cache.load_index()?.into_values().collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}

/// Drop entries whose file is missing or whose hash no longer matches.
///
/// Returns the keys removed.
pub fn verify_and_clean(cache: &ReleaseCache) -> Result<Vec<String>, String> {
    let mut removed = cache.verify_cache_integrity()?;
    for key in &removed {
        cache.remove_entry(key)?;
    }

    let mut corrupted = Vec::new();
    for entry in list_cached(cache)? {
        if !cache.verify_hash(&entry.key)? {
            cache.remove_entry(&entry.key)?;
            corrupted.push(entry.key);
        }
    }

    removed.extend(corrupted);
    Ok(removed)
}

/// Remove every cached release. Returns how many were removed.
pub fn clear_cache(cache: &ReleaseCache) -> Result<usize, String> {
    cache.clear()
}
