use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::ports::spotify::SpotifyApiTrack;

/// A track entry as fetched from one account. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub added_at: Option<DateTime<Utc>>,
}

impl Track {
    /// Drops entries without a usable id (local files, removed tracks).
    pub fn from_api(track: SpotifyApiTrack) -> Option<Self> {
        let id = track.id.filter(|id| !id.is_empty())?;
        Some(Self {
            id,
            name: track.name,
            artists: track.artists,
            added_at: track.added_at,
        })
    }

    pub fn artists_label(&self) -> String {
        self.artists.join(" & ")
    }
}

/// One full pagination pass over one account's track listing, kept in the
/// order the API returned it (newest first). Never mutated, only replaced.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    newest_first: Vec<Track>,
}

impl Snapshot {
    pub fn from_newest_first(newest_first: Vec<Track>) -> Self {
        Self { newest_first }
    }

    pub fn len(&self) -> usize {
        self.newest_first.len()
    }

    pub fn newest_first(&self) -> &[Track] {
        &self.newest_first
    }

    /// Oldest first, the engine's working order.
    pub fn chronological(&self) -> Vec<Track> {
        self.newest_first.iter().rev().cloned().collect()
    }

    pub fn ids(&self) -> HashSet<&str> {
        self.newest_first.iter().map(|t| t.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_track(id: Option<&str>) -> SpotifyApiTrack {
        SpotifyApiTrack {
            id: id.map(String::from),
            name: "Song".into(),
            artists: vec!["A".into(), "B".into()],
            added_at: None,
        }
    }

    #[test]
    fn test_from_api_skips_missing_ids() {
        assert!(Track::from_api(api_track(None)).is_none());
        assert!(Track::from_api(api_track(Some(""))).is_none());

        let track = Track::from_api(api_track(Some("t1"))).unwrap();
        assert_eq!(track.id, "t1");
        assert_eq!(track.artists_label(), "A & B");
    }

    #[test]
    fn test_chronological_reverses_remote_order() {
        let tracks = ["c", "b", "a"]
            .into_iter()
            .filter_map(|id| Track::from_api(api_track(Some(id))))
            .collect();
        let snapshot = Snapshot::from_newest_first(tracks);

        let ids: Vec<_> = snapshot.chronological().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(snapshot.newest_first()[0].id, "c");
    }
}
