//! Firmware release feed.
//!
//! Reads the GitHub releases listing for the inverter firmware and
//! exposes the downloadable `.bin` assets.

use serde::{Deserialize, Serialize};

/// A downloadable firmware binary from the release feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseAsset {
    pub tag_name: String,
    pub name: String,
    pub download_url: String,
    pub size: u64,
    pub published_at: String,
}

impl ReleaseAsset {
    /// Label shown in listings, e.g. `v5.24.R : stm32_sine.bin`.
    pub fn label(&self) -> String {
        format!("{} : {}", self.tag_name, self.name)
    }

    /// Key this asset is cached under.
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.tag_name, self.name)
    }
}

/// Raw release structure for deserialization.
#[derive(Debug, Deserialize)]
struct RawRelease {
    tag_name: String,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    assets: Vec<RawAsset>,
}

#[derive(Debug, Deserialize)]
struct RawAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    size: u64,
}

/// Parse a release feed body into its `.bin` assets, in feed order.
///
/// Each release can carry several binaries (e.g. sine and FOC builds);
/// all of them are listed.
pub fn parse_release_feed(body: &str) -> Result<Vec<ReleaseAsset>, String> {
    let releases: Vec<RawRelease> = serde_json::from_str(body)
        .map_err(|e| format!("Failed to parse release feed: {}", e))?;

    let assets = releases
        .into_iter()
        .flat_map(|release| {
            let tag_name = release.tag_name;
            let published_at = release.published_at.unwrap_or_default();
            release
                .assets
                .into_iter()
                .filter(|asset| asset.name.ends_with(".bin"))
                .map(move |asset| ReleaseAsset {
                    tag_name: tag_name.clone(),
                    name: asset.name,
                    download_url: asset.browser_download_url,
                    size: asset.size,
                    published_at: published_at.clone(),
                })
        })
        .collect();

    Ok(assets)
}

/// Find the asset to install for `tag`.
///
/// With no `asset_name`, the release must carry exactly one binary.
pub fn select_asset<'a>(
    assets: &'a [ReleaseAsset],
    tag: &str,
    asset_name: Option<&str>,
) -> Result<&'a ReleaseAsset, String> {
    let candidates: Vec<&ReleaseAsset> = assets
        .iter()
        .filter(|a| a.tag_name == tag)
        .filter(|a| asset_name.map_or(true, |name| a.name == name))
        .collect();

    match candidates.as_slice() {
        [] => Err(match asset_name {
            Some(name) => format!("Release {} has no asset named {}", tag, name),
            None => format!("Release {} not found or has no .bin assets", tag),
        }),
        [single] => Ok(*single),
        many => Err(format!(
            "Release {} has {} binaries, choose one with --asset: {}",
            tag,
            many.len(),
            many.iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}
