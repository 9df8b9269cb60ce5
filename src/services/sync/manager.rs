use std::collections::HashSet;

use chrono::Local;
use tracing::instrument;

use crate::config::Config;
use crate::error::SyncError;
use crate::ports::spotify::{NewPlaylist, SpotifyApiPlaylist, SpotifyClient, SpotifyUserProfile};
use crate::services::sync::diff::{compute_additions, copy_name, is_playlist_synced};
use crate::services::sync::executor::{BatchExecutor, WriteOperation};
use crate::services::sync::fetch::{PagedFetcher, filter_source_playlists};
use crate::services::sync::state::{SyncState, SyncStats};
use crate::shutdown::Shutdown;

/// An authenticated account: the API client plus whom it acts as.
pub struct ConnectedAccount<C> {
    pub client: C,
    pub profile: SpotifyUserProfile,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Compute and log the plan without any destination write.
    pub dry_run: bool,
}

/// Sync Orchestrator: mirrors the source account's liked tracks and owned
/// playlists onto the destination account.
///
/// Flows return `true` when they ran to completion. Individual failed writes
/// do not make a flow fail; they are collected and can be drained with
/// [`SyncManager::take_failures`].
pub struct SyncManager<C: SpotifyClient> {
    source: ConnectedAccount<C>,
    destination: ConnectedAccount<C>,
    config: Config,
    options: SyncOptions,
    shutdown: Shutdown,
    state: SyncState,
    failures: Vec<SyncError>,
}

impl<C: SpotifyClient> SyncManager<C> {
    pub fn new(
        source: ConnectedAccount<C>,
        destination: ConnectedAccount<C>,
        config: Config,
        options: SyncOptions,
        shutdown: Shutdown,
    ) -> Self {
        let state = SyncState::new(config.state.max_processed_ids);
        Self {
            source,
            destination,
            config,
            options,
            shutdown,
            state,
            failures: Vec::new(),
        }
    }

    pub fn reset_session_counters(&mut self) {
        self.state.reset_session();
    }

    pub fn sync_stats(&self) -> SyncStats {
        self.state.stats()
    }

    /// Failures collected since the last call.
    pub fn take_failures(&mut self) -> Vec<SyncError> {
        std::mem::take(&mut self.failures)
    }

    /// Run the enabled flows in sequence. Session counters start from zero.
    #[instrument(skip(self), fields(source = %self.source.profile.id, destination = %self.destination.profile.id))]
    pub async fn full_sync(&mut self) -> bool {
        self.reset_session_counters();
        tracing::info!(dry_run = self.options.dry_run, "Starting full sync");

        let mut success = true;
        if self.config.sync.liked_tracks {
            success &= self.sync_liked_tracks().await;
        }
        if self.config.sync.playlists && !self.shutdown.is_requested() {
            success &= self.sync_playlists().await;
        }
        if self.shutdown.is_requested() {
            success = false;
        }

        if success {
            self.state.mark_synced(Local::now());
        }
        let stats = self.state.stats();
        tracing::info!(
            success,
            tracks = stats.session_tracks,
            playlists = stats.session_playlists,
            total_tracks = stats.total_tracks,
            total_playlists = stats.total_playlists,
            "Full sync finished"
        );
        success
    }

    /// Like every source liked track missing at the destination, oldest first,
    /// so the destination's like dates come out in the source's order.
    pub async fn sync_liked_tracks(&mut self) -> bool {
        tracing::info!("Syncing liked tracks");

        let source_snapshot =
            PagedFetcher::new(&self.source.client, &self.config, self.shutdown.clone())
                .liked_tracks()
                .await;
        let destination_snapshot =
            PagedFetcher::new(&self.destination.client, &self.config, self.shutdown.clone())
                .liked_tracks()
                .await;
        if self.shutdown.is_requested() {
            return false;
        }

        tracing::info!(
            source = source_snapshot.len(),
            destination = destination_snapshot.len(),
            "Liked track listings fetched"
        );
        self.state.compact_tracks(&destination_snapshot.ids());

        let mut additions = compute_additions(
            &source_snapshot.chronological(),
            &destination_snapshot,
            self.state.synced_tracks(),
        );
        if additions.is_empty() {
            tracing::info!("Liked tracks already up to date");
            return true;
        }

        if let Some(max) = self.config.sync.max_tracks_per_sync {
            if additions.len() > max {
                tracing::info!(
                    pending = additions.len(),
                    max,
                    "Limiting this run, the rest is picked up next time"
                );
                additions.truncate(max);
            }
        }

        if self.options.dry_run {
            for id in &additions {
                tracing::info!(track_id = %id, "[dry run] would like track");
            }
            tracing::info!(count = additions.len(), "[dry run] liked tracks plan");
            return true;
        }

        tracing::info!(count = additions.len(), "Liking tracks in chronological order");
        let executor =
            BatchExecutor::new(&self.destination.client, &self.config.rate_limit, self.shutdown.clone());
        let outcome = executor
            .apply(&WriteOperation::LikeTrack, &additions, 1)
            .await;

        let liked = outcome.applied_count();
        let failed = outcome.failed_count();
        for id in outcome.applied {
            self.state.record_track(id);
        }
        self.failures.extend(outcome.failures);

        tracing::info!(liked, failed, "Liked tracks sync finished");
        !self.shutdown.is_requested()
    }

    /// Copy owned source playlists that have no copy at the destination yet.
    /// A copy, once created, is never revisited.
    pub async fn sync_playlists(&mut self) -> bool {
        tracing::info!("Syncing playlists");

        let source_playlists = filter_source_playlists(
            PagedFetcher::new(&self.source.client, &self.config, self.shutdown.clone())
                .owned_playlists(&self.source.profile.id)
                .await,
            &self.config.playlists,
        );
        let mut destination_names: HashSet<String> =
            PagedFetcher::new(&self.destination.client, &self.config, self.shutdown.clone())
                .owned_playlists(&self.destination.profile.id)
                .await
                .into_iter()
                .map(|playlist| playlist.name)
                .collect();
        if self.shutdown.is_requested() {
            return false;
        }

        let suffix = self.config.playlists.copy_suffix.clone();
        let mut copied = 0usize;

        for playlist in &source_playlists {
            if self.shutdown.is_requested() {
                tracing::warn!("Shutdown requested, remaining playlists are left for the next run");
                return false;
            }
            if is_playlist_synced(
                playlist,
                &destination_names,
                &suffix,
                self.state.synced_playlists(),
            ) {
                tracing::debug!(playlist = %playlist.name, "Playlist already synced");
                continue;
            }

            let name = copy_name(&playlist.name, &suffix);
            if self.options.dry_run {
                tracing::info!(playlist = %playlist.name, copy = %name, tracks = playlist.total_tracks, "[dry run] would copy playlist");
                destination_names.insert(name);
                continue;
            }

            if self.copy_playlist(playlist, &name).await {
                destination_names.insert(name);
                self.state.record_playlist(playlist.id.clone());
                copied += 1;
            }
            self.shutdown
                .sleep(self.config.rate_limit.playlist_delay())
                .await;
        }

        tracing::info!(copied, "Playlist sync finished");
        !self.shutdown.is_requested()
    }

    /// Create the copy and fill it. Returns `false` when the copy could not be
    /// created; member additions that fail are recorded but do not undo it.
    #[instrument(skip(self, playlist), fields(playlist = %playlist.name))]
    async fn copy_playlist(&mut self, playlist: &SpotifyApiPlaylist, name: &str) -> bool {
        let new_playlist = NewPlaylist {
            name: name.to_string(),
            // Spotify creates public playlists when the flag is omitted.
            public: playlist.public.or(Some(false)),
            collaborative: false,
            description: format!("Automatic copy of \"{}\"", playlist.name),
        };

        let created = match self
            .destination
            .client
            .create_playlist(&self.destination.profile.id, &new_playlist)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                let failure = SyncError::DefinitiveWriteFailure {
                    operation: "create playlist".to_string(),
                    item_ids: vec![playlist.id.clone()],
                    attempts: 1,
                    reason: format!("{e:#}"),
                };
                tracing::error!(%failure, "Could not create playlist copy");
                self.failures.push(failure);
                return false;
            }
        };

        let track_ids = PagedFetcher::new(&self.source.client, &self.config, self.shutdown.clone())
            .playlist_track_ids(&playlist.id)
            .await;
        if track_ids.is_empty() {
            tracing::info!(copy_id = %created.id, "Created empty playlist copy");
            return true;
        }

        let executor =
            BatchExecutor::new(&self.destination.client, &self.config.rate_limit, self.shutdown.clone());
        let outcome = executor
            .apply(
                &WriteOperation::AddToPlaylist {
                    playlist_id: created.id.clone(),
                },
                &track_ids,
                self.config.batching.playlist_add_batch_size,
            )
            .await;

        tracing::info!(
            copy_id = %created.id,
            added = outcome.applied_count(),
            failed = outcome.failed_count(),
            "Playlist copied"
        );
        self.failures.extend(outcome.failures);
        true
    }
}
