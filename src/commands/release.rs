//! Commands for the firmware release feed.

use tracing::info;

use crate::cache::ReleaseCache;
use crate::commands::update::install_image;
use crate::commands::AppDirs;
use crate::release::{parse_release_feed, select_asset, ReleaseAsset};
use crate::settings::UpdaterSettings;
use crate::update::{UpdateSession, OTA_IMAGE_NAME};

const USER_AGENT: &str = concat!("inverter-updater/", env!("CARGO_PKG_VERSION"));

fn http_client() -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {}", e))
}

/// List the `.bin` assets published on the release feed.
pub async fn fetch_releases(settings: &UpdaterSettings) -> Result<Vec<ReleaseAsset>, String> {
    let body = http_client()?
        .get(&settings.release_feed_url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| format!("Failed to fetch release feed: {}", e))?
        .text()
        .await
        .map_err(|e| format!("Failed to read release feed: {}", e))?;

    parse_release_feed(&body)
}

/// Return the asset's bytes, from the cache when a verified copy exists.
pub async fn download_release(cache: &ReleaseCache, asset: &ReleaseAsset) -> Result<Vec<u8>, String> {
    let key = asset.cache_key();
    if let Some(data) = cache.load_verified(&key)? {
        info!(%key, "using cached release");
        return Ok(data);
    }

    info!(url = %asset.download_url, "downloading release");
    let bytes = http_client()?
        .get(&asset.download_url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| format!("Failed to download firmware: {}", e))?
        .bytes()
        .await
        .map_err(|e| format!("Failed to read firmware data: {}", e))?;

    cache.store(asset, &bytes)?;
    Ok(bytes.to_vec())
}

/// Download a release binary and store it on the device as `stm32.bin`,
/// running the paged update afterwards only when `flash` is set.
pub async fn install_release(
    settings: &UpdaterSettings,
    dirs: &AppDirs,
    tag: &str,
    asset_name: Option<&str>,
    flash: bool,
) -> Result<Option<UpdateSession>, String> {
    let assets = fetch_releases(settings).await?;
    let asset = select_asset(&assets, tag, asset_name)?;
    info!(release = %asset.label(), "installing release");

    let cache = ReleaseCache::new(&dirs.cache_dir);
    let data = download_release(&cache, asset).await?;

    install_image(settings, OTA_IMAGE_NAME.to_string(), data, flash).await
}
