use tracing::instrument;

use crate::config::Config;
use crate::error::SyncError;
use crate::ports::spotify::SpotifyClient;
use crate::services::sync::executor::{BatchExecutor, WriteOperation};
use crate::services::sync::fetch::PagedFetcher;
use crate::services::sync::manager::ConnectedAccount;
use crate::shutdown::Shutdown;

#[derive(Debug, Default)]
pub struct CleanupOutcome {
    pub found: usize,
    pub removed: usize,
    pub failures: Vec<SyncError>,
}

impl CleanupOutcome {
    pub fn is_complete(&self) -> bool {
        self.removed == self.found
    }
}

/// Destructive reset of one account: deletes its owned playlists and unlikes
/// its liked tracks. Callers are expected to confirm with the user first.
pub struct CleanupService<'a, C> {
    account: &'a ConnectedAccount<C>,
    config: &'a Config,
    shutdown: Shutdown,
}

impl<'a, C: SpotifyClient> CleanupService<'a, C> {
    pub fn new(account: &'a ConnectedAccount<C>, config: &'a Config, shutdown: Shutdown) -> Self {
        Self {
            account,
            config,
            shutdown,
        }
    }

    #[instrument(skip(self), fields(account = %self.account.profile.id))]
    pub async fn delete_owned_playlists(&self) -> CleanupOutcome {
        let ids: Vec<String> = self
            .fetcher()
            .owned_playlists(&self.account.profile.id)
            .await
            .into_iter()
            .map(|playlist| playlist.id)
            .collect();
        tracing::info!(count = ids.len(), "Deleting owned playlists");

        self.remove(&WriteOperation::DeletePlaylist, ids, 1).await
    }

    #[instrument(skip(self), fields(account = %self.account.profile.id))]
    pub async fn unlike_all_tracks(&self) -> CleanupOutcome {
        let ids: Vec<String> = self
            .fetcher()
            .liked_tracks()
            .await
            .newest_first()
            .iter()
            .map(|track| track.id.clone())
            .collect();
        tracing::info!(count = ids.len(), "Removing liked tracks");

        self.remove(
            &WriteOperation::UnlikeTracks,
            ids,
            self.config.batching.unlike_batch_size,
        )
        .await
    }

    fn fetcher(&self) -> PagedFetcher<'a, C> {
        PagedFetcher::new(&self.account.client, self.config, self.shutdown.clone())
    }

    async fn remove(
        &self,
        operation: &WriteOperation,
        ids: Vec<String>,
        batch_size: usize,
    ) -> CleanupOutcome {
        let outcome = BatchExecutor::new(&self.account.client, &self.config.rate_limit, self.shutdown.clone())
            .apply(operation, &ids, batch_size)
            .await;

        let result = CleanupOutcome {
            found: ids.len(),
            removed: outcome.applied_count(),
            failures: outcome.failures,
        };
        tracing::info!(
            found = result.found,
            removed = result.removed,
            operation = operation.label(),
            "Cleanup step finished"
        );
        result
    }
}
