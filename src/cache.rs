use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::release::ReleaseAsset;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedReleaseMetadata {
    pub key: String,
    pub tag_name: String,
    pub asset_name: String,
    pub sha256_hash: String,
    pub path: String,
    pub downloaded_at: String,
    pub file_size: u64,
    pub download_url: String,
}

pub type ReleaseCacheIndex = HashMap<String, CachedReleaseMetadata>;

const INDEX_FILENAME: &str = "release_cache.json";

pub struct ReleaseCache {
    cache_dir: PathBuf,
    index_path: PathBuf,
}

impl ReleaseCache {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            index_path: cache_dir.join(INDEX_FILENAME),
        }
    }

    /// Calculate SHA256 hash of a file
    pub fn calculate_sha256(file_path: &Path) -> Result<String, String> {
        let mut file = fs::File::open(file_path)
            .map_err(|e| format!("Failed to open file for hashing: {}", e))?;

        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = file
                .read(&mut buffer)
                .map_err(|e| format!("Failed to read file for hashing: {}", e))?;

            if bytes_read == 0 {
                break;
            }

            hasher.update(&buffer[..bytes_read]);
        }

        let hash = hasher.finalize();
        Ok(format!("{:x}", hash))
    }

    /// Load the cache index from disk
    pub fn load_index(&self) -> Result<ReleaseCacheIndex, String> {
        if !self.index_path.exists() {
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(&self.index_path)
            .map_err(|e| format!("Failed to read cache index: {}", e))?;

        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse cache index: {}", e))
    }

    /// Save the cache index to disk
    pub fn save_index(&self, index: &ReleaseCacheIndex) -> Result<(), String> {
        let contents = serde_json::to_string_pretty(index)
            .map_err(|e| format!("Failed to serialize cache index: {}", e))?;

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| format!("Failed to create cache directory: {}", e))?;

        fs::write(&self.index_path, contents)
            .map_err(|e| format!("Failed to write cache index: {}", e))?;

        Ok(())
    }

    /// Add or update a release entry in the cache index
    pub fn update_entry(&self, metadata: CachedReleaseMetadata) -> Result<(), String> {
        let mut index = self.load_index()?;
        index.insert(metadata.key.clone(), metadata);
        self.save_index(&index)
    }

    /// Remove a release entry and its binary
    pub fn remove_entry(&self, key: &str) -> Result<(), String> {
        let mut index = self.load_index()?;
        if let Some(metadata) = index.remove(key) {
            let path = Path::new(&metadata.path);
            if path.exists() {
                fs::remove_file(path)
                    .map_err(|e| format!("Failed to delete cached binary: {}", e))?;
            }
        }
        self.save_index(&index)
    }

    /// Get a specific release entry from the cache
    pub fn get_entry(&self, key: &str) -> Result<Option<CachedReleaseMetadata>, String> {
        let index = self.load_index()?;
        Ok(index.get(key).cloned())
    }

    /// Clear all entries and delete the cached binaries
    pub fn clear(&self) -> Result<usize, String> {
        let index = self.load_index()?;
        let count = index.len();

        for metadata in index.values() {
            let path = Path::new(&metadata.path);
            if path.exists() {
                fs::remove_file(path)
                    .map_err(|e| format!("Failed to delete cached binary: {}", e))?;
            }
        }

        self.save_index(&HashMap::new())?;
        Ok(count)
    }

    /// Keys whose cached binary no longer exists on disk
    pub fn verify_cache_integrity(&self) -> Result<Vec<String>, String> {
        let index = self.load_index()?;
        let mut missing: Vec<String> = index
            .iter()
            .filter(|(_, metadata)| !Path::new(&metadata.path).exists())
            .map(|(key, _)| key.clone())
            .collect();
        missing.sort();
        Ok(missing)
    }

    /// Verify SHA256 hash of a cached binary
    pub fn verify_hash(&self, key: &str) -> Result<bool, String> {
        match self.get_entry(key)? {
            Some(metadata) => {
                let path = Path::new(&metadata.path);
                if !path.exists() {
                    return Ok(false);
                }

                let calculated_hash = Self::calculate_sha256(path)?;
                Ok(calculated_hash == metadata.sha256_hash)
            }
            None => Ok(false),
        }
    }

    /// Store a downloaded release binary and index it
    pub fn store(&self, asset: &ReleaseAsset, data: &[u8]) -> Result<CachedReleaseMetadata, String> {
        let release_dir = self.cache_dir.join(sanitize(&asset.tag_name));
        fs::create_dir_all(&release_dir)
            .map_err(|e| format!("Failed to create release directory: {}", e))?;

        let path = release_dir.join(sanitize(&asset.name));
        fs::write(&path, data).map_err(|e| format!("Failed to write release binary: {}", e))?;

        let metadata = CachedReleaseMetadata {
            key: asset.cache_key(),
            tag_name: asset.tag_name.clone(),
            asset_name: asset.name.clone(),
            sha256_hash: Self::calculate_sha256(&path)?,
            path: path.to_string_lossy().to_string(),
            downloaded_at: chrono::Utc::now().to_rfc3339(),
            file_size: data.len() as u64,
            download_url: asset.download_url.clone(),
        };

        self.update_entry(metadata.clone())?;
        Ok(metadata)
    }

    /// Read a cached binary if it is indexed and its hash still matches
    pub fn load_verified(&self, key: &str) -> Result<Option<Vec<u8>>, String> {
        if !self.verify_hash(key)? {
            return Ok(None);
        }

        match self.get_entry(key)? {
            Some(metadata) => fs::read(&metadata.path)
                .map(Some)
                .map_err(|e| format!("Failed to read cached binary: {}", e)),
            None => Ok(None),
        }
    }
}

/// Keep a tag or asset name usable as a single path component
fn sanitize(component: &str) -> String {
    // Empty, "." and ".." would resolve outside the release directory.
    if component.chars().all(|c| c == '.') {
        return "_".repeat(component.len().max(1));
    }
    component
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ReleaseMetadataBuilder, TestContext};

    fn asset(tag: &str, name: &str) -> ReleaseAsset {
        ReleaseAsset {
            tag_name: tag.to_string(),
            name: name.to_string(),
            download_url: format!("https://example.com/{}/{}", tag, name),
            size: 0,
            published_at: String::new(),
        }
    }

    #[test]
    fn test_calculate_sha256_valid_file() {
        let ctx = TestContext::new();
        let file_path = ctx.create_file("test.txt", "hello world");

        let hash = ReleaseCache::calculate_sha256(&file_path).unwrap();
        // SHA256 of "hello world"
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_calculate_sha256_empty_file() {
        let ctx = TestContext::new();
        let file_path = ctx.create_file("empty.bin", "");

        let hash = ReleaseCache::calculate_sha256(&file_path).unwrap();
        // SHA256 of empty string
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_calculate_sha256_missing_file() {
        let result = ReleaseCache::calculate_sha256(Path::new("/nonexistent/file.bin"));
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_load_index_missing_file() {
        let ctx = TestContext::new();
        let cache = ReleaseCache::new(ctx.root());

        assert!(cache.load_index().unwrap().is_empty());
    }

    #[test]
    fn test_load_index_invalid_json() {
        let ctx = TestContext::new();
        ctx.create_file(INDEX_FILENAME, "{ not json");
        let cache = ReleaseCache::new(ctx.root());

        assert!(cache.load_index().unwrap_err().contains("Failed to parse"));
    }

    #[test]
    fn test_update_entry_overwrites() {
        let ctx = TestContext::new();
        let cache = ReleaseCache::new(ctx.root());

        cache
            .update_entry(ReleaseMetadataBuilder::new("v5.20.R").file_size(1).build())
            .unwrap();
        cache
            .update_entry(ReleaseMetadataBuilder::new("v5.20.R").file_size(2).build())
            .unwrap();

        let index = cache.load_index().unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("v5.20.R/stm32_sine.bin").unwrap().file_size, 2);
    }

    #[test]
    fn test_store_and_load_verified() {
        let ctx = TestContext::new();
        let cache = ReleaseCache::new(&ctx.path("cache"));
        let data = vec![0x5A; 64];

        let metadata = cache.store(&asset("v5.24.R", "stm32_foc.bin"), &data).unwrap();

        assert_eq!(metadata.key, "v5.24.R/stm32_foc.bin");
        assert_eq!(metadata.file_size, 64);
        assert!(ctx.exists("cache/v5.24.R/stm32_foc.bin"));
        assert!(ctx.exists(&format!("cache/{}", INDEX_FILENAME)));
        assert_eq!(
            cache.load_verified("v5.24.R/stm32_foc.bin").unwrap(),
            Some(data)
        );
    }

    #[test]
    fn test_load_verified_rejects_tampered_file() {
        let ctx = TestContext::new();
        let cache = ReleaseCache::new(ctx.root());
        let metadata = cache.store(&asset("v1", "stm32_sine.bin"), b"original").unwrap();

        fs::write(&metadata.path, b"tampered").unwrap();

        assert!(!cache.verify_hash(&metadata.key).unwrap());
        assert_eq!(cache.load_verified(&metadata.key).unwrap(), None);
    }

    #[test]
    fn test_verify_hash_nonexistent_key() {
        let ctx = TestContext::new();
        let cache = ReleaseCache::new(ctx.root());

        assert!(!cache.verify_hash("v9/none.bin").unwrap());
        assert_eq!(cache.load_verified("v9/none.bin").unwrap(), None);
    }

    #[test]
    fn test_verify_cache_integrity_missing_files() {
        let ctx = TestContext::new();
        let cache = ReleaseCache::new(ctx.root());
        let kept = cache.store(&asset("v2", "stm32_sine.bin"), b"kept").unwrap();
        cache
            .update_entry(
                ReleaseMetadataBuilder::new("v1")
                    .path("/nonexistent/stm32_sine.bin")
                    .build(),
            )
            .unwrap();

        let missing = cache.verify_cache_integrity().unwrap();

        assert_eq!(missing, vec!["v1/stm32_sine.bin".to_string()]);
        assert!(!missing.contains(&kept.key));
    }

    #[test]
    fn test_remove_entry_deletes_binary() {
        let ctx = TestContext::new();
        let cache = ReleaseCache::new(ctx.root());
        let metadata = cache.store(&asset("v1", "stm32_sine.bin"), b"data").unwrap();

        cache.remove_entry(&metadata.key).unwrap();

        assert!(cache.get_entry(&metadata.key).unwrap().is_none());
        assert!(!ctx.exists("v1/stm32_sine.bin"));
    }

    #[test]
    fn test_remove_nonexistent_entry() {
        let ctx = TestContext::new();
        let cache = ReleaseCache::new(ctx.root());

        assert!(cache.remove_entry("nonexistent").is_ok());
    }

    #[test]
    fn test_clear() {
        let ctx = TestContext::new();
        let cache = ReleaseCache::new(ctx.root());
        cache.store(&asset("v1", "a.bin"), b"a").unwrap();
        cache.store(&asset("v2", "b.bin"), b"b").unwrap();

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.load_index().unwrap().is_empty());
        assert!(!ctx.exists("v1/a.bin"));
        assert!(ctx.read_file(INDEX_FILENAME).contains("{}"));
    }

    #[test]
    fn test_sanitize_path_components() {
        assert_eq!(sanitize("release/v1"), "release_v1");
        assert_eq!(sanitize("v5.24.R"), "v5.24.R");
        assert_eq!(sanitize(".."), "__");
        assert_eq!(sanitize("."), "_");
        assert_eq!(sanitize(""), "_");
        assert_eq!(sanitize("..bin"), "..bin");
    }

    #[test]
    fn test_store_keeps_dot_tags_inside_cache() {
        let ctx = TestContext::new();
        let cache = ReleaseCache::new(&ctx.path("cache"));

        let metadata = cache.store(&asset("..", "stm32_foc.bin"), b"firmware").unwrap();

        assert!(Path::new(&metadata.path).starts_with(ctx.path("cache")));
        assert!(ctx.exists("cache/__/stm32_foc.bin"));
        assert!(!ctx.exists("stm32_foc.bin"));
    }

    #[test]
    fn test_metadata_builder_overrides() {
        let metadata = ReleaseMetadataBuilder::default()
            .asset_name("stm32_foc.bin")
            .sha256_hash("00")
            .build();

        assert_eq!(metadata.key, "v1.0.0/stm32_foc.bin");
        assert_eq!(metadata.sha256_hash, "00");
    }
}
