use crate::cache::CachedReleaseMetadata;

/// Builder for GitHub-style release feed JSON
pub struct ReleaseFeedBuilder {
    releases: Vec<serde_json::Value>,
}

impl ReleaseFeedBuilder {
    pub fn new() -> Self {
        Self {
            releases: Vec::new(),
        }
    }

    /// Append a release carrying the given asset file names
    pub fn release(mut self, tag_name: &str, assets: &[&str]) -> Self {
        let assets: Vec<serde_json::Value> = assets
            .iter()
            .map(|name| {
                serde_json::json!({
                    "name": name,
                    "browser_download_url": format!("https://example.com/{}/{}", tag_name, name),
                    "size": 1024,
                })
            })
            .collect();

        self.releases.push(serde_json::json!({
            "tag_name": tag_name,
            "published_at": "2024-01-01T00:00:00Z",
            "assets": assets,
        }));
        self
    }

    pub fn build(self) -> String {
        serde_json::Value::Array(self.releases).to_string()
    }
}

impl Default for ReleaseFeedBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test CachedReleaseMetadata instances
pub struct ReleaseMetadataBuilder {
    tag_name: String,
    asset_name: String,
    sha256_hash: String,
    path: String,
    downloaded_at: String,
    file_size: u64,
    download_url: String,
}

impl ReleaseMetadataBuilder {
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            asset_name: "stm32_sine.bin".to_string(),
            sha256_hash: "abc123def456789012345678901234567890123456789012345678901234".to_string(),
            path: format!("/cache/{}/stm32_sine.bin", tag_name),
            downloaded_at: "2024-01-01T00:00:00Z".to_string(),
            file_size: 1024,
            download_url: format!("https://example.com/{}/stm32_sine.bin", tag_name),
        }
    }

    pub fn asset_name(mut self, name: &str) -> Self {
        self.asset_name = name.to_string();
        self
    }

    pub fn sha256_hash(mut self, hash: &str) -> Self {
        self.sha256_hash = hash.to_string();
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn file_size(mut self, size: u64) -> Self {
        self.file_size = size;
        self
    }

    pub fn build(self) -> CachedReleaseMetadata {
        CachedReleaseMetadata {
            key: format!("{}/{}", self.tag_name, self.asset_name),
            tag_name: self.tag_name,
            asset_name: self.asset_name,
            sha256_hash: self.sha256_hash,
            path: self.path,
            downloaded_at: self.downloaded_at,
            file_size: self.file_size,
            download_url: self.download_url,
        }
    }
}

impl Default for ReleaseMetadataBuilder {
    fn default() -> Self {
        Self::new("v1.0.0")
    }
}
