use std::future::Future;
use std::time::Duration;

use color_eyre::eyre::Result;

use crate::config::{Config, PaginationSettings, PlaylistSettings};
use crate::error::SyncError;
use crate::ports::spotify::{SpotifyApiPlaylist, SpotifyClient};
use crate::services::sync::types::{Snapshot, Track};
use crate::shutdown::Shutdown;

/// Request `page_size` pages from offset 0 until a page comes back empty.
///
/// A failing page ends the pass early and returns what was gathered so far.
/// There is no completeness flag: only reaching an empty page means the
/// listing was read in full.
pub async fn fetch_all_pages<T, F, Fut>(
    resource: &str,
    page_size: u32,
    pacing: Duration,
    shutdown: &Shutdown,
    mut fetch_page: F,
) -> Vec<T>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut items = Vec::new();
    let mut offset = 0u32;

    loop {
        if shutdown.is_requested() {
            tracing::warn!(resource, offset, "Shutdown requested, stopping pagination");
            break;
        }

        match fetch_page(offset, page_size).await {
            Ok(page) if page.is_empty() => break,
            Ok(page) => {
                tracing::debug!(resource, offset, count = page.len(), "Fetched page");
                items.extend(page);
                offset += page_size;
                shutdown.sleep(pacing).await;
            }
            Err(e) => {
                let error = SyncError::TransientPage {
                    resource: resource.to_string(),
                    offset,
                    reason: format!("{e:#}"),
                };
                tracing::error!(%error, fetched = items.len(), "Pagination stopped early, listing may be incomplete");
                break;
            }
        }
    }

    items
}

/// Paged Collection Fetcher bound to one account.
pub struct PagedFetcher<'a, C: ?Sized> {
    client: &'a C,
    pagination: PaginationSettings,
    page_delay: Duration,
    shutdown: Shutdown,
}

impl<'a, C: SpotifyClient + ?Sized> PagedFetcher<'a, C> {
    pub fn new(client: &'a C, config: &Config, shutdown: Shutdown) -> Self {
        Self {
            client,
            pagination: config.pagination.clone(),
            page_delay: config.rate_limit.page_delay(),
            shutdown,
        }
    }

    /// The account's liked tracks, newest first.
    pub async fn liked_tracks(&self) -> Snapshot {
        let client = self.client;
        let raw = fetch_all_pages(
            "liked tracks",
            self.pagination.liked_page_size,
            self.page_delay,
            &self.shutdown,
            |offset, limit| client.saved_tracks_page(offset, limit),
        )
        .await;

        let tracks: Vec<Track> = raw.into_iter().filter_map(Track::from_api).collect();
        tracing::info!(count = tracks.len(), "Fetched liked tracks");
        Snapshot::from_newest_first(tracks)
    }

    /// Playlists owned by `owner_id`. Followed playlists of other users are dropped.
    pub async fn owned_playlists(&self, owner_id: &str) -> Vec<SpotifyApiPlaylist> {
        let client = self.client;
        let raw = fetch_all_pages(
            "playlists",
            self.pagination.playlist_page_size,
            self.page_delay,
            &self.shutdown,
            |offset, limit| client.playlists_page(offset, limit),
        )
        .await;

        let playlists: Vec<_> = raw
            .into_iter()
            .filter(|playlist| playlist.owner_id == owner_id)
            .collect();
        tracing::info!(count = playlists.len(), owner_id, "Fetched owned playlists");
        playlists
    }

    /// Member track ids of a playlist, in playlist order.
    pub async fn playlist_track_ids(&self, playlist_id: &str) -> Vec<String> {
        let client = self.client;
        let raw = fetch_all_pages(
            "playlist tracks",
            self.pagination.playlist_tracks_page_size,
            self.page_delay,
            &self.shutdown,
            |offset, limit| client.playlist_tracks_page(playlist_id, offset, limit),
        )
        .await;

        raw.into_iter()
            .filter_map(Track::from_api)
            .map(|track| track.id)
            .collect()
    }
}

/// Source-side filtering: drop excluded names, and collaborative playlists
/// unless they are explicitly included.
pub fn filter_source_playlists(
    playlists: Vec<SpotifyApiPlaylist>,
    settings: &PlaylistSettings,
) -> Vec<SpotifyApiPlaylist> {
    playlists
        .into_iter()
        .filter(|playlist| {
            if settings.excluded.iter().any(|name| name == &playlist.name) {
                tracing::debug!(playlist = %playlist.name, "Skipping excluded playlist");
                return false;
            }
            if playlist.collaborative && !settings.include_collaborative {
                tracing::debug!(playlist = %playlist.name, "Skipping collaborative playlist");
                return false;
            }
            true
        })
        .collect()
}
