use std::time::Duration;

use tokio::time::Instant;

use crate::ports::spotify::SpotifyClient;
use crate::services::sync::manager::SyncManager;
use crate::shutdown::Shutdown;

/// How often the watch loop wakes up to check whether a run is due.
pub const WATCH_TICK: Duration = Duration::from_secs(60);

/// Run a full sync now and then again every `interval`, until shutdown.
///
/// Runs never overlap: the next one is only considered after the previous
/// one returned. `after_run` gets the manager, the run's result and its
/// duration. Returns the number of runs performed.
pub async fn run_watch<C, F>(
    manager: &mut SyncManager<C>,
    interval: Duration,
    shutdown: &Shutdown,
    mut after_run: F,
) -> usize
where
    C: SpotifyClient,
    F: FnMut(&mut SyncManager<C>, bool, Duration),
{
    let tick = interval.min(WATCH_TICK);
    tracing::info!(interval = ?interval, "Watch mode started");

    let mut runs = 0usize;
    loop {
        let started = Instant::now();
        let success = manager.full_sync().await;
        runs += 1;
        after_run(manager, success, started.elapsed());

        loop {
            if !shutdown.sleep(tick).await {
                tracing::info!(runs, "Watch mode stopped");
                return runs;
            }
            if started.elapsed() >= interval {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sync::manager::{ConnectedAccount, SyncOptions};
    use crate::test_utils::{FakeSpotify, test_config};

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_interval() {
        let source = FakeSpotify::new("alice").with_liked(&["a"]);
        let destination = FakeSpotify::new("bob");
        let shutdown = Shutdown::new();

        let mut manager = SyncManager::new(
            ConnectedAccount {
                profile: source.profile(),
                client: source.clone(),
            },
            ConnectedAccount {
                profile: destination.profile(),
                client: destination.clone(),
            },
            test_config(),
            SyncOptions::default(),
            shutdown.clone(),
        );

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12 * 60 + 30)).await;
            trigger.request();
        });

        let mut results = Vec::new();
        let runs = run_watch(
            &mut manager,
            Duration::from_secs(5 * 60),
            &shutdown,
            |manager, success, _| results.push((success, manager.sync_stats().session_tracks)),
        )
        .await;

        assert_eq!(runs, 3);
        assert_eq!(results, vec![(true, 1), (true, 0), (true, 0)]);
        assert_eq!(destination.liked_ids_chronological(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_interval_uses_interval_as_tick() {
        let source = FakeSpotify::new("alice");
        let destination = FakeSpotify::new("bob");
        let shutdown = Shutdown::new();
        let mut manager = SyncManager::new(
            ConnectedAccount {
                profile: source.profile(),
                client: source,
            },
            ConnectedAccount {
                profile: destination.profile(),
                client: destination,
            },
            test_config(),
            SyncOptions::default(),
            shutdown.clone(),
        );

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(45)).await;
            trigger.request();
        });

        let runs = run_watch(&mut manager, Duration::from_secs(20), &shutdown, |_, _, _| {}).await;

        // t=0, t=20, t=40
        assert_eq!(runs, 3);
    }
}
