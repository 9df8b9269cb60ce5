use std::time::{Duration, Instant};

use color_eyre::eyre::{Result, bail};

use crate::config::Config;
use crate::ports::spotify::SpotifyClient;
use crate::services::spotify::account::SpotifyAccountService;
use crate::services::stats::StatsStore;
use crate::services::sync::manager::{SyncManager, SyncOptions};
use crate::services::sync::state::SyncStats;
use crate::services::watch::run_watch;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone)]
pub(crate) struct SyncArgs {
    pub watch: bool,
    pub interval: Option<Duration>,
    pub dry_run: bool,
    pub no_liked: bool,
    pub no_playlists: bool,
}

pub(crate) async fn handle_sync(
    mut config: Config,
    accounts: &SpotifyAccountService,
    args: SyncArgs,
    shutdown: Shutdown,
) -> Result<()> {
    if args.no_liked {
        config.sync.liked_tracks = false;
    }
    if args.no_playlists {
        config.sync.playlists = false;
    }
    let interval = args.interval.unwrap_or_else(|| config.interval());
    if args.watch && interval < Duration::from_secs(60) {
        bail!("The sync interval must be at least one minute");
    }

    let (source, destination) = accounts.connect_both().await?;
    println!(
        "Mirroring {} → {}{}",
        source.profile.label(),
        destination.profile.label(),
        if args.dry_run { " (dry run)" } else { "" }
    );

    let mut stats = StatsStore::open(&config.stats_path());
    let options = SyncOptions {
        dry_run: args.dry_run,
    };
    let mut manager = SyncManager::new(source, destination, config, options, shutdown.clone());

    if args.watch {
        println!(
            "Watch mode: syncing every {}, press Ctrl+C to stop",
            humantime::format_duration(interval)
        );
        let runs = run_watch(&mut manager, interval, &shutdown, |manager, success, elapsed| {
            report_run(manager, &mut stats, success, elapsed, args.dry_run)
        })
        .await;
        println!("Stopped after {runs} run(s)");
        return Ok(());
    }

    let started = Instant::now();
    let success = manager.full_sync().await;
    report_run(&mut manager, &mut stats, success, started.elapsed(), args.dry_run);
    Ok(())
}

/// Print the run summary and record it. Dry runs are not recorded.
fn report_run<C: SpotifyClient>(
    manager: &mut SyncManager<C>,
    stats: &mut StatsStore,
    success: bool,
    elapsed: Duration,
    dry_run: bool,
) {
    let failures = manager.take_failures();
    let counters = manager.sync_stats();

    println!("{}", run_summary(&counters, success, elapsed));
    for failure in &failures {
        println!("  ✗ {failure}");
    }

    if dry_run {
        return;
    }
    for failure in &failures {
        stats.record_error(failure);
    }
    stats.record_sync(
        counters.session_tracks,
        counters.session_playlists,
        success,
        elapsed,
    );
}

fn run_summary(counters: &SyncStats, success: bool, elapsed: Duration) -> String {
    let headline = if success {
        format!("✓ Sync finished in {:.1}s", elapsed.as_secs_f64())
    } else {
        format!("⚠ Sync interrupted after {:.1}s", elapsed.as_secs_f64())
    };
    let last_sync = counters
        .last_sync
        .map(|at| at.format("%d/%m/%Y %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());

    format!(
        "{headline}: {} track(s), {} playlist(s)\n  Since start: {} track(s), {} playlist(s), last complete sync {last_sync}",
        counters.session_tracks,
        counters.session_playlists,
        counters.total_tracks,
        counters.total_playlists,
    )
}
