mod cache;
mod commands;
mod release;
mod settings;
mod update;

#[cfg(test)]
mod test_helpers;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cache::ReleaseCache;
use crate::commands::settings::SettingsUpdate;
use crate::commands::AppDirs;
use crate::update::{SessionStatus, TransportKind, UpdateSession};

#[derive(Parser)]
#[command(name = "inverter-updater", version)]
#[command(about = "Upload and flash firmware on an inverter web interface", long_about = None)]
struct Cli {
    /// Device base URL, overriding the saved setting
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Verbose logging (RUST_LOG takes precedence)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a file on the device without flashing it
    Upload { file: PathBuf },
    /// Upload a .bin image and flash it page by page
    Update { file: PathBuf },
    /// Upload an image and flash it through the debug probe
    SwdFlash { file: PathBuf },
    /// Hard-reset the target through the debug probe
    SwdReset,
    /// List firmware binaries on the release feed
    Releases,
    /// Download a release and store it on the device
    InstallRelease {
        tag: String,
        /// Binary to install when the release carries several
        #[arg(long)]
        asset: Option<String>,
        /// Also run the paged update once the binary is stored
        #[arg(long)]
        flash: bool,
    },
    /// Manage downloaded releases
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show or change saved settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    List,
    /// Drop entries that are missing or fail their hash check
    Verify,
    Clear,
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        #[arg(long)]
        device_url: Option<String>,
        #[arg(long)]
        release_feed_url: Option<String>,
        /// Seconds allowed to connect to the device
        #[arg(long)]
        connect_timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose > 0 { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let dirs = AppDirs::locate().map_err(anyhow::Error::msg)?;
    let settings = dirs
        .load_settings(cli.device.as_deref())
        .map_err(anyhow::Error::msg)
        .context("loading settings")?;

    match cli.command {
        Command::Upload { file } => {
            let image = commands::update::upload_file(&settings, file)
                .await
                .map_err(anyhow::Error::msg)?;
            println!("Stored {} ({} bytes)", image.name, image.size);
        }
        Command::Update { file } => {
            let session = commands::update::flash_paged(&settings, file)
                .await
                .map_err(anyhow::Error::msg)?;
            print_session(&session);
        }
        Command::SwdFlash { file } => {
            let session = commands::update::flash_swd(&settings, file)
                .await
                .map_err(anyhow::Error::msg)?;
            print_session(&session);
        }
        Command::SwdReset => {
            commands::update::reset_swd(&settings)
                .await
                .map_err(anyhow::Error::msg)?;
            println!("Reset requested");
        }
        Command::Releases => {
            let assets = commands::release::fetch_releases(&settings)
                .await
                .map_err(anyhow::Error::msg)?;
            if assets.is_empty() {
                println!("No firmware binaries published");
            }
            for asset in assets {
                println!("{:<40} {:>8} bytes  {}", asset.label(), asset.size, asset.published_at);
            }
        }
        Command::InstallRelease {
            tag,
            asset,
            flash,
        } => {
            let session = commands::release::install_release(
                &settings,
                &dirs,
                &tag,
                asset.as_deref(),
                flash,
            )
            .await
            .map_err(anyhow::Error::msg)?;
            match session {
                Some(session) => print_session(&session),
                None => println!("Stored {} on the device", update::OTA_IMAGE_NAME),
            }
        }
        Command::Cache { action } => {
            let cache = ReleaseCache::new(&dirs.cache_dir);
            match action {
                CacheAction::List => {
                    for entry in commands::cache::list_cached(&cache).map_err(anyhow::Error::msg)? {
                        println!("{:<40} {:>8} bytes  {}", entry.key, entry.file_size, entry.downloaded_at);
                    }
                }
                CacheAction::Verify => {
                    let removed = commands::cache::verify_and_clean(&cache).map_err(anyhow::Error::msg)?;
                    println!("Removed {} invalid entries", removed.len());
                    for key in removed {
                        println!("  {}", key);
                    }
                }
                CacheAction::Clear => {
                    let count = commands::cache::clear_cache(&cache).map_err(anyhow::Error::msg)?;
                    println!("Removed {} cached releases", count);
                }
            }
        }
        Command::Settings { action } => match action {
            SettingsAction::Show => {
                let stored = commands::settings::get_settings(&dirs.config_dir).map_err(anyhow::Error::msg)?;
                println!("{}", serde_json::to_string_pretty(&stored)?);
            }
            SettingsAction::Set {
                device_url,
                release_feed_url,
                connect_timeout,
            } => {
                let saved = commands::settings::save_settings(
                    &dirs.config_dir,
                    SettingsUpdate {
                        device_url,
                        release_feed_url,
                        connect_timeout_secs: connect_timeout,
                    },
                )
                .map_err(anyhow::Error::msg)?;
                println!("{}", serde_json::to_string_pretty(&saved)?);
            }
        },
    }

    Ok(())
}

fn print_session(session: &UpdateSession) {
    match (session.status, session.transport) {
        (SessionStatus::Complete, TransportKind::Paged) => println!(
            "{} flashed: {} of {} pages",
            session.image.name,
            session.steps_completed(),
            session.total_steps
        ),
        (SessionStatus::Complete, TransportKind::Streamed) => println!(
            "{} flashed: {} of {} bytes",
            session.image.name, session.bytes_flashed, session.image.size
        ),
        (status, _) => println!("{} ended as {:?}", session.image.name, status),
    }
}
