use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use color_eyre::eyre::Result;

use crate::config::{MAX_PLAYLIST_ADD_BATCH, MAX_UNLIKE_BATCH, RateLimitSettings};
use crate::error::SyncError;
use crate::ports::spotify::SpotifyClient;
use crate::shutdown::Shutdown;

/// A destination-side write, applied to a list of item ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOperation {
    /// Like tracks. Always one per request so the like timestamps keep the
    /// source order.
    LikeTrack,
    AddToPlaylist { playlist_id: String },
    UnlikeTracks,
    /// Unfollowing an owned playlist deletes it.
    DeletePlaylist,
}

impl WriteOperation {
    pub fn label(&self) -> &'static str {
        match self {
            WriteOperation::LikeTrack => "like track",
            WriteOperation::AddToPlaylist { .. } => "add tracks to playlist",
            WriteOperation::UnlikeTracks => "unlike tracks",
            WriteOperation::DeletePlaylist => "delete playlist",
        }
    }

    /// Largest batch one request may carry.
    pub fn max_batch_size(&self) -> usize {
        match self {
            WriteOperation::LikeTrack | WriteOperation::DeletePlaylist => 1,
            WriteOperation::AddToPlaylist { .. } => MAX_PLAYLIST_ADD_BATCH,
            WriteOperation::UnlikeTracks => MAX_UNLIKE_BATCH,
        }
    }

    /// Replaying an idempotent write is harmless. Playlist additions are not:
    /// a request that timed out after landing would add the batch twice.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, WriteOperation::AddToPlaylist { .. })
    }

    fn pacing(&self, rate_limit: &RateLimitSettings) -> Duration {
        match self {
            WriteOperation::LikeTrack | WriteOperation::UnlikeTracks => rate_limit.write_delay(),
            WriteOperation::AddToPlaylist { .. } | WriteOperation::DeletePlaylist => {
                rate_limit.playlist_batch_delay()
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ApplyOutcome {
    /// Ids confirmed by the destination, in submission order.
    pub applied: Vec<String>,
    /// One `DefinitiveWriteFailure` per batch that exhausted its attempts.
    pub failures: Vec<SyncError>,
}

impl ApplyOutcome {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures
            .iter()
            .map(|failure| match failure {
                SyncError::DefinitiveWriteFailure { item_ids, .. } => item_ids.len(),
                _ => 0,
            })
            .sum()
    }
}

/// Batch Operation Executor: submits writes sequentially, paces between
/// successful batches and retries idempotent ones with exponential backoff.
pub struct BatchExecutor<'a, C: ?Sized> {
    client: &'a C,
    rate_limit: RateLimitSettings,
    shutdown: Shutdown,
}

impl<'a, C: SpotifyClient + ?Sized> BatchExecutor<'a, C> {
    pub fn new(client: &'a C, rate_limit: &RateLimitSettings, shutdown: Shutdown) -> Self {
        Self {
            client,
            rate_limit: rate_limit.clone(),
            shutdown,
        }
    }

    /// Apply `operation` to `items` in input order. Never fails as a whole:
    /// batches that give up are reported in the outcome and the next batch
    /// proceeds. Stops early, between batches, when shutdown is requested.
    pub async fn apply(
        &self,
        operation: &WriteOperation,
        items: &[String],
        max_batch_size: usize,
    ) -> ApplyOutcome {
        let batch_size = max_batch_size.clamp(1, operation.max_batch_size());
        let batch_count = items.len().div_ceil(batch_size);
        let mut outcome = ApplyOutcome::default();

        for (index, batch) in items.chunks(batch_size).enumerate() {
            if self.shutdown.is_requested() {
                tracing::warn!(
                    operation = operation.label(),
                    remaining = items.len() - index * batch_size,
                    "Shutdown requested, leaving remaining writes for the next run"
                );
                break;
            }

            match self.submit(operation, batch).await {
                Ok(()) => {
                    tracing::debug!(
                        operation = operation.label(),
                        batch = index + 1,
                        batch_count,
                        size = batch.len(),
                        "Write applied"
                    );
                    outcome.applied.extend_from_slice(batch);
                    self.shutdown.sleep(operation.pacing(&self.rate_limit)).await;
                }
                Err(failure) => {
                    tracing::error!(%failure, batch = index + 1, batch_count, "Giving up on batch");
                    outcome.failures.push(failure);
                }
            }
        }

        outcome
    }

    async fn submit(&self, operation: &WriteOperation, batch: &[String]) -> Result<(), SyncError> {
        let max_attempts = if operation.is_idempotent() {
            self.rate_limit.retry_attempts.max(1)
        } else {
            1
        };
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.rate_limit.retry_delay())
            .with_factor(2.0)
            .with_max_times(max_attempts - 1);

        let attempt = AtomicUsize::new(0);
        let write_op = || async {
            attempt.fetch_add(1, Ordering::SeqCst);
            self.send(operation, batch).await
        };

        write_op
            .retry(backoff)
            .notify(|err, dur| {
                let error = SyncError::TransientWrite {
                    operation: operation.label().to_string(),
                    attempt: attempt.load(Ordering::SeqCst),
                    max_attempts,
                    reason: format!("{err:#}"),
                };
                tracing::warn!(%error, retry_in = ?dur, "Retrying write");
            })
            .await
            .map_err(|e| SyncError::DefinitiveWriteFailure {
                operation: operation.label().to_string(),
                item_ids: batch.to_vec(),
                attempts: attempt.load(Ordering::SeqCst),
                reason: format!("{e:#}"),
            })
    }

    async fn send(&self, operation: &WriteOperation, batch: &[String]) -> Result<()> {
        match operation {
            WriteOperation::LikeTrack => self.client.save_tracks(batch).await,
            WriteOperation::AddToPlaylist { playlist_id } => {
                self.client.add_tracks_to_playlist(playlist_id, batch).await
            }
            WriteOperation::UnlikeTracks => self.client.remove_saved_tracks(batch).await,
            WriteOperation::DeletePlaylist => {
                for playlist_id in batch {
                    self.client.unfollow_playlist(playlist_id).await?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::spotify::MockSpotifyClient;
    use crate::test_utils::test_config;
    use color_eyre::eyre::eyre;
    use mockall::Sequence;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn executor(client: &MockSpotifyClient) -> BatchExecutor<'_, MockSpotifyClient> {
        BatchExecutor::new(client, &test_config().rate_limit, Shutdown::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_likes_are_sent_one_at_a_time_in_order() {
        let mut client = MockSpotifyClient::new();
        let mut seq = Sequence::new();
        for id in ["a", "b", "c"] {
            client
                .expect_save_tracks()
                .withf(move |batch| batch == [id.to_string()])
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        let outcome = executor(&client)
            .apply(&WriteOperation::LikeTrack, &ids(&["a", "b", "c"]), 50)
            .await;

        assert_eq!(outcome.applied, ids(&["a", "b", "c"]));
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_record_failure_and_continue() {
        let mut client = MockSpotifyClient::new();
        client
            .expect_save_tracks()
            .withf(|batch| batch == ["bad".to_string()])
            .times(3)
            .returning(|_| Err(eyre!("502 Bad Gateway")));
        client
            .expect_save_tracks()
            .withf(|batch| batch == ["good".to_string()])
            .times(1)
            .returning(|_| Ok(()));

        let outcome = executor(&client)
            .apply(&WriteOperation::LikeTrack, &ids(&["bad", "good"]), 1)
            .await;

        assert_eq!(outcome.applied, ids(&["good"]));
        assert_eq!(outcome.failures.len(), 1);
        match &outcome.failures[0] {
            SyncError::DefinitiveWriteFailure {
                item_ids, attempts, ..
            } => {
                assert_eq!(item_ids, &ids(&["bad"]));
                assert_eq!(*attempts, 3);
            }
            other => panic!("unexpected failure: {other:?}"),
        }
        assert_eq!(outcome.failed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_recovers() {
        let mut client = MockSpotifyClient::new();
        let mut seq = Sequence::new();
        client
            .expect_remove_saved_tracks()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(eyre!("timeout")));
        client
            .expect_remove_saved_tracks()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let outcome = executor(&client)
            .apply(&WriteOperation::UnlikeTracks, &ids(&["a", "b"]), 50)
            .await;

        assert_eq!(outcome.applied_count(), 2);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_playlist_additions_are_not_retried() {
        let mut client = MockSpotifyClient::new();
        client
            .expect_add_tracks_to_playlist()
            .times(1)
            .returning(|_, _| Err(eyre!("timeout")));

        let operation = WriteOperation::AddToPlaylist {
            playlist_id: "p1".into(),
        };
        let outcome = executor(&client).apply(&operation, &ids(&["a"]), 100).await;

        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.failures.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_respect_size_limits() {
        let mut client = MockSpotifyClient::new();
        let mut seq = Sequence::new();
        for expected in [100usize, 100, 50] {
            client
                .expect_add_tracks_to_playlist()
                .withf(move |playlist_id, batch| playlist_id == "p1" && batch.len() == expected)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
        }

        let items: Vec<String> = (0..250).map(|i| format!("t{i}")).collect();
        let operation = WriteOperation::AddToPlaylist {
            playlist_id: "p1".into(),
        };
        // Oversized requests are capped at the API maximum.
        let outcome = executor(&client).apply(&operation, &items, 500).await;

        assert_eq!(outcome.applied, items);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_between_batches() {
        let mut client = MockSpotifyClient::new();
        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        client.expect_save_tracks().times(1).returning(move |_| {
            trigger.request();
            Ok(())
        });

        let mut rate_limit = test_config().rate_limit;
        rate_limit.write_delay_ms = 1000;
        let outcome = BatchExecutor::new(&client, &rate_limit, shutdown)
            .apply(&WriteOperation::LikeTrack, &ids(&["a", "b", "c"]), 1)
            .await;

        assert_eq!(outcome.applied, ids(&["a"]));
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_pause_doubles_then_paces_after_success() {
        let mut client = MockSpotifyClient::new();
        let mut seq = Sequence::new();
        client
            .expect_save_tracks()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(eyre!("503 Service Unavailable")));
        client
            .expect_save_tracks()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let started = tokio::time::Instant::now();
        let outcome = BatchExecutor::new(&client, &RateLimitSettings::default(), Shutdown::new())
            .apply(&WriteOperation::LikeTrack, &ids(&["a"]), 1)
            .await;

        // 2s and 4s between attempts, then 1s of pacing after the like lands.
        assert_eq!(started.elapsed(), Duration::from_secs(7));
        assert_eq!(outcome.applied, ids(&["a"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_successful_like_is_paced() {
        let mut client = MockSpotifyClient::new();
        client.expect_save_tracks().times(3).returning(|_| Ok(()));

        let started = tokio::time::Instant::now();
        let outcome = BatchExecutor::new(&client, &RateLimitSettings::default(), Shutdown::new())
            .apply(&WriteOperation::LikeTrack, &ids(&["a", "b", "c"]), 1)
            .await;

        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(outcome.applied_count(), 3);
    }

    #[test]
    fn test_operation_properties() {
        assert_eq!(WriteOperation::LikeTrack.max_batch_size(), 1);
        assert_eq!(WriteOperation::UnlikeTracks.max_batch_size(), 50);
        assert!(WriteOperation::UnlikeTracks.is_idempotent());
        assert!(
            !WriteOperation::AddToPlaylist {
                playlist_id: "p".into()
            }
            .is_idempotent()
        );
    }
}
