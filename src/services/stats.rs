use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

const MAX_HISTORY: usize = 100;
const MAX_ERRORS: usize = 50;
const SUMMARY_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub date: DateTime<Local>,
    pub tracks_synced: u64,
    pub playlists_synced: u64,
    pub success: bool,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub date: DateTime<Local>,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncStatsFile {
    pub total_syncs: u64,
    pub total_tracks_synced: u64,
    pub total_playlists_synced: u64,
    pub last_sync_date: Option<DateTime<Local>>,
    pub sync_history: Vec<SyncRecord>,
    pub errors: Vec<ErrorRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub total_syncs: u64,
    pub total_tracks_synced: u64,
    pub total_playlists_synced: u64,
    pub last_sync_date: Option<DateTime<Local>>,
    pub recent_syncs: usize,
    pub recent_successful: usize,
    pub recent_errors: usize,
}

impl StatsSummary {
    pub fn success_rate(&self) -> Option<f64> {
        (self.recent_syncs > 0)
            .then(|| self.recent_successful as f64 * 100.0 / self.recent_syncs as f64)
    }
}

/// Persistent run history, stored as JSON next to the other data files.
/// Write failures are logged and never interrupt a sync.
pub struct StatsStore {
    path: PathBuf,
    stats: SyncStatsFile,
}

impl StatsStore {
    pub fn open(path: &Path) -> Self {
        let stats = match Self::load(path) {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = ?e, path = %path.display(), "Could not read stats file, starting fresh");
                SyncStatsFile::default()
            }
        };
        Self {
            path: path.to_path_buf(),
            stats,
        }
    }

    fn load(path: &Path) -> Result<SyncStatsFile> {
        if !path.exists() {
            return Ok(SyncStatsFile::default());
        }
        let contents = std::fs::read_to_string(path)
            .wrap_err(format!("Failed to read stats file: {}", path.display()))?;
        serde_json::from_str(&contents).wrap_err("Failed to parse stats file")
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err(format!("Failed to create directory: {}", parent.display()))?;
        }
        let contents =
            serde_json::to_string_pretty(&self.stats).wrap_err("Failed to serialize stats")?;
        std::fs::write(&self.path, contents)
            .wrap_err(format!("Failed to write stats file: {}", self.path.display()))
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            tracing::error!(error = ?e, "Failed to save sync stats");
        }
    }

    pub fn stats(&self) -> &SyncStatsFile {
        &self.stats
    }

    pub fn record_sync(&mut self, tracks: u64, playlists: u64, success: bool, duration: Duration) {
        self.record_sync_at(Local::now(), tracks, playlists, success, duration);
    }

    fn record_sync_at(
        &mut self,
        date: DateTime<Local>,
        tracks: u64,
        playlists: u64,
        success: bool,
        duration: Duration,
    ) {
        let stats = &mut self.stats;
        stats.total_syncs += 1;
        if success {
            stats.total_tracks_synced += tracks;
            stats.total_playlists_synced += playlists;
            stats.last_sync_date = Some(date);
        }
        stats.sync_history.push(SyncRecord {
            date,
            tracks_synced: tracks,
            playlists_synced: playlists,
            success,
            duration_seconds: duration.as_secs_f64(),
        });
        truncate_front(&mut stats.sync_history, MAX_HISTORY);
        self.persist();
    }

    pub fn record_error(&mut self, error: &SyncError) {
        self.record_error_at(Local::now(), error);
    }

    fn record_error_at(&mut self, date: DateTime<Local>, error: &SyncError) {
        self.stats.errors.push(ErrorRecord {
            date,
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
        truncate_front(&mut self.stats.errors, MAX_ERRORS);
        self.persist();
    }

    pub fn summary(&self) -> StatsSummary {
        self.summary_at(Local::now())
    }

    fn summary_at(&self, now: DateTime<Local>) -> StatsSummary {
        let cutoff = now - chrono::Duration::days(SUMMARY_WINDOW_DAYS);
        let recent: Vec<&SyncRecord> = self
            .stats
            .sync_history
            .iter()
            .filter(|record| record.date > cutoff)
            .collect();

        StatsSummary {
            total_syncs: self.stats.total_syncs,
            total_tracks_synced: self.stats.total_tracks_synced,
            total_playlists_synced: self.stats.total_playlists_synced,
            last_sync_date: self.stats.last_sync_date,
            recent_syncs: recent.len(),
            recent_successful: recent.iter().filter(|record| record.success).count(),
            recent_errors: self
                .stats
                .errors
                .iter()
                .filter(|error| error.date > cutoff)
                .count(),
        }
    }
}

/// Keep only the newest `max` entries.
fn truncate_front<T>(items: &mut Vec<T>, max: usize) {
    if items.len() > max {
        items.drain(..items.len() - max);
    }
}
