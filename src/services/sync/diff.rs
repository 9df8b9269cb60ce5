use std::collections::HashSet;

use crate::config::MAX_PLAYLIST_NAME_CHARS;
use crate::ports::spotify::SpotifyApiPlaylist;
use crate::services::sync::types::{Snapshot, Track};

/// Source ids missing at the destination and never applied before, in source
/// chronological order. Duplicate source entries are emitted once.
pub fn compute_additions(
    source_chronological: &[Track],
    destination: &Snapshot,
    already_processed: &HashSet<String>,
) -> Vec<String> {
    let present = destination.ids();
    let mut emitted = HashSet::new();

    source_chronological
        .iter()
        .map(|track| track.id.as_str())
        .filter(|id| !present.contains(id) && !already_processed.contains(*id))
        .filter(|id| emitted.insert(*id))
        .map(String::from)
        .collect()
}

/// Name of the destination copy. The source name is cut so that the
/// suffix still fits inside the remote name limit.
pub fn copy_name(source_name: &str, suffix: &str) -> String {
    let suffix_len = suffix.chars().count();
    let room = MAX_PLAYLIST_NAME_CHARS.saturating_sub(suffix_len);
    if source_name.chars().count() <= room {
        return format!("{source_name}{suffix}");
    }
    let truncated: String = source_name.chars().take(room).collect();
    format!("{}{suffix}", truncated.trim_end())
}

/// A source playlist counts as synced when its id was already processed or a
/// destination playlist already carries the derived copy name.
pub fn is_playlist_synced(
    source: &SpotifyApiPlaylist,
    destination_names: &HashSet<String>,
    suffix: &str,
    already_processed: &HashSet<String>,
) -> bool {
    already_processed.contains(&source.id)
        || destination_names.contains(&copy_name(&source.name, suffix))
}
