use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{OptionExt, Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Remote-imposed maxima. Configured sizes are clamped into `1..=MAX`.
pub const MAX_LIKED_PAGE_SIZE: u32 = 50;
pub const MAX_PLAYLIST_PAGE_SIZE: u32 = 50;
pub const MAX_PLAYLIST_TRACKS_PAGE_SIZE: u32 = 100;
pub const MAX_PLAYLIST_ADD_BATCH: usize = 100;
pub const MAX_UNLIKE_BATCH: usize = 50;

/// Spotify rejects playlist names longer than this.
pub const MAX_PLAYLIST_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncSettings,
    pub playlists: PlaylistSettings,
    pub pagination: PaginationSettings,
    pub batching: BatchSettings,
    pub rate_limit: RateLimitSettings,
    pub order_check: OrderCheckSettings,
    pub state: StateSettings,
    pub paths: PathSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub liked_tracks: bool,
    pub playlists: bool,
    pub interval_minutes: u64,
    /// Only the oldest N missing tracks are liked per run when set.
    pub max_tracks_per_sync: Option<usize>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            liked_tracks: true,
            playlists: true,
            interval_minutes: 30,
            max_tracks_per_sync: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistSettings {
    pub excluded: Vec<String>,
    pub copy_suffix: String,
    pub include_collaborative: bool,
}

impl Default for PlaylistSettings {
    fn default() -> Self {
        let mut excluded = vec!["Discover Weekly".to_string(), "Release Radar".to_string()];
        excluded.extend((1..=6).map(|n| format!("Daily Mix {n}")));
        Self {
            excluded,
            copy_suffix: " (Sync)".to_string(),
            include_collaborative: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationSettings {
    pub liked_page_size: u32,
    pub playlist_page_size: u32,
    pub playlist_tracks_page_size: u32,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            liked_page_size: MAX_LIKED_PAGE_SIZE,
            playlist_page_size: MAX_PLAYLIST_PAGE_SIZE,
            playlist_tracks_page_size: MAX_PLAYLIST_TRACKS_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub playlist_add_batch_size: usize,
    pub unlike_batch_size: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            playlist_add_batch_size: MAX_PLAYLIST_ADD_BATCH,
            unlike_batch_size: MAX_UNLIKE_BATCH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub requests_per_second: u32,
    pub page_delay_ms: u64,
    pub write_delay_ms: u64,
    pub playlist_batch_delay_ms: u64,
    pub playlist_delay_ms: u64,
    pub retry_attempts: usize,
    pub retry_delay_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            page_delay_ms: 100,
            write_delay_ms: 1000,
            playlist_batch_delay_ms: 500,
            playlist_delay_ms: 1000,
            retry_attempts: 3,
            retry_delay_ms: 2000,
        }
    }
}

impl RateLimitSettings {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }

    pub fn playlist_batch_delay(&self) -> Duration {
        Duration::from_millis(self.playlist_batch_delay_ms)
    }

    pub fn playlist_delay(&self) -> Duration {
        Duration::from_millis(self.playlist_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderCheckSettings {
    /// Maximum position drift still counted as correctly ordered.
    pub tolerance: usize,
    /// How many examples to show for each kind of problem.
    pub sample_size: usize,
}

impl Default for OrderCheckSettings {
    fn default() -> Self {
        Self {
            tolerance: 2,
            sample_size: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    pub max_processed_ids: usize,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            max_processed_ids: 50_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub stats_file: Option<String>,
    pub accounts_file: Option<String>,
    pub log_file: Option<String>,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err(format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config.normalized())
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("spotify-mirror").join("config.toml"))
    }

    /// Load the config, falling back to defaults when the file is missing or broken.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::config_path) else {
            tracing::info!("No config directory available, using default configuration");
            return Self::default();
        };

        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Self::default();
        }

        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                let error = SyncError::Configuration {
                    path: path.display().to_string(),
                    reason: format!("{e:#}"),
                };
                tracing::warn!(%error, "Falling back to default configuration");
                Self::default()
            }
        }
    }

    /// Write the default config file, if it doesn't exist. Returns its path.
    pub fn create_default(path: Option<&Path>) -> Result<PathBuf> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(Self::config_path)
            .ok_or_eyre("No config directory available on this platform")?;

        if path.exists() {
            tracing::info!(path = %path.display(), "Config file already exists, leaving it untouched");
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(&Config::default())
            .wrap_err("Failed to serialize default config")?;
        std::fs::write(&path, contents)
            .wrap_err(format!("Failed to write config file: {}", path.display()))?;

        Ok(path)
    }

    /// Clamp sizes into what the Web API accepts.
    fn normalized(mut self) -> Self {
        self.pagination.liked_page_size =
            clamp_size("pagination.liked_page_size", self.pagination.liked_page_size, MAX_LIKED_PAGE_SIZE);
        self.pagination.playlist_page_size = clamp_size(
            "pagination.playlist_page_size",
            self.pagination.playlist_page_size,
            MAX_PLAYLIST_PAGE_SIZE,
        );
        self.pagination.playlist_tracks_page_size = clamp_size(
            "pagination.playlist_tracks_page_size",
            self.pagination.playlist_tracks_page_size,
            MAX_PLAYLIST_TRACKS_PAGE_SIZE,
        );
        self.batching.playlist_add_batch_size = clamp_size(
            "batching.playlist_add_batch_size",
            self.batching.playlist_add_batch_size,
            MAX_PLAYLIST_ADD_BATCH,
        );
        self.batching.unlike_batch_size = clamp_size(
            "batching.unlike_batch_size",
            self.batching.unlike_batch_size,
            MAX_UNLIKE_BATCH,
        );
        if self.rate_limit.retry_attempts == 0 {
            tracing::warn!("rate_limit.retry_attempts must be at least 1, using 1");
            self.rate_limit.retry_attempts = 1;
        }
        if self.sync.interval_minutes == 0 {
            tracing::warn!("sync.interval_minutes must be at least 1, using 1");
            self.sync.interval_minutes = 1;
        }
        self
    }

    fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    fn data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join("spotify-mirror"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn stats_path(&self) -> PathBuf {
        match &self.paths.stats_file {
            Some(path) => Self::expand_path(path),
            None => Self::data_dir().join("sync_stats.json"),
        }
    }

    pub fn accounts_path(&self) -> PathBuf {
        match &self.paths.accounts_file {
            Some(path) => Self::expand_path(path),
            None => Self::data_dir().join("accounts.json"),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        match &self.paths.log_file {
            Some(path) => Self::expand_path(path),
            None => Self::data_dir().join("spotify_sync.log"),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_minutes * 60)
    }
}

fn clamp_size<T>(key: &str, value: T, max: T) -> T
where
    T: Copy + Ord + From<u8> + std::fmt::Display,
{
    let clamped = value.clamp(T::from(1u8), max);
    if clamped != value {
        tracing::warn!("{key} = {value} is outside 1..={max}, using {clamped}");
    }
    clamped
}
