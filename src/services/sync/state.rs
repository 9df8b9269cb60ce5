use std::collections::HashSet;

use chrono::{DateTime, Local};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counters {
    pub tracks: u64,
    pub playlists: u64,
}

/// Snapshot of the orchestrator's counters, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub session_tracks: u64,
    pub session_playlists: u64,
    pub total_tracks: u64,
    pub total_playlists: u64,
    pub last_sync: Option<DateTime<Local>>,
}

/// Process-lifetime memory of what this process already applied.
///
/// The processed sets guard against stale destination snapshots: an id that
/// was confirmed once is never submitted again, even if a later listing does
/// not show it yet.
#[derive(Debug)]
pub struct SyncState {
    synced_tracks: HashSet<String>,
    synced_playlists: HashSet<String>,
    session: Counters,
    total: Counters,
    last_sync: Option<DateTime<Local>>,
    max_processed_ids: usize,
}

impl SyncState {
    pub fn new(max_processed_ids: usize) -> Self {
        Self {
            synced_tracks: HashSet::new(),
            synced_playlists: HashSet::new(),
            session: Counters::default(),
            total: Counters::default(),
            last_sync: None,
            max_processed_ids,
        }
    }

    pub fn synced_tracks(&self) -> &HashSet<String> {
        &self.synced_tracks
    }

    pub fn synced_playlists(&self) -> &HashSet<String> {
        &self.synced_playlists
    }

    pub fn record_track(&mut self, id: String) {
        if self.synced_tracks.insert(id) {
            self.session.tracks += 1;
            self.total.tracks += 1;
        }
    }

    pub fn record_playlist(&mut self, id: String) {
        if self.synced_playlists.insert(id) {
            self.session.playlists += 1;
            self.total.playlists += 1;
        }
    }

    pub fn reset_session(&mut self) {
        self.session = Counters::default();
    }

    pub fn mark_synced(&mut self, at: DateTime<Local>) {
        self.last_sync = Some(at);
    }

    /// Once the processed track set outgrows its cap, forget ids the
    /// destination listing already shows: the diff skips those anyway.
    /// Returns how many ids were dropped.
    pub fn compact_tracks(&mut self, present_at_destination: &HashSet<&str>) -> usize {
        if self.synced_tracks.len() <= self.max_processed_ids {
            return 0;
        }
        let before = self.synced_tracks.len();
        self.synced_tracks
            .retain(|id| !present_at_destination.contains(id.as_str()));
        let dropped = before - self.synced_tracks.len();
        tracing::debug!(dropped, remaining = self.synced_tracks.len(), "Compacted processed track ids");
        dropped
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            session_tracks: self.session.tracks,
            session_playlists: self.session.playlists,
            total_tracks: self.total.tracks,
            total_playlists: self.total.playlists,
            last_sync: self.last_sync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_follow_new_records() {
        let mut state = SyncState::new(100);
        state.record_track("a".into());
        state.record_track("a".into());
        state.record_playlist("p".into());

        let stats = state.stats();
        assert_eq!(stats.session_tracks, 1);
        assert_eq!(stats.session_playlists, 1);

        state.reset_session();
        state.record_track("b".into());

        let stats = state.stats();
        assert_eq!(stats.session_tracks, 1);
        assert_eq!(stats.total_tracks, 2);
        assert_eq!(stats.total_playlists, 1);
        assert!(state.synced_tracks().contains("a"));
    }

    #[test]
    fn test_compaction_only_past_cap() {
        let mut state = SyncState::new(2);
        state.record_track("a".into());
        state.record_track("b".into());

        let present: HashSet<&str> = ["a", "b"].into();
        assert_eq!(state.compact_tracks(&present), 0);

        state.record_track("c".into());
        assert_eq!(state.compact_tracks(&present), 2);
        assert_eq!(state.synced_tracks().len(), 1);
        assert!(state.synced_tracks().contains("c"));
        assert_eq!(state.stats().total_tracks, 3);
    }
}
