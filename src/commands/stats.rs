use crate::config::Config;
use crate::services::stats::StatsStore;

pub(crate) fn handle_stats(config: &Config) {
    let store = StatsStore::open(&config.stats_path());
    let summary = store.summary();

    println!("Total syncs:             {}", summary.total_syncs);
    println!("Total tracks synced:     {}", summary.total_tracks_synced);
    println!("Total playlists synced:  {}", summary.total_playlists_synced);
    match summary.last_sync_date {
        Some(date) => println!("Last sync:               {}", date.format("%d/%m/%Y %H:%M:%S")),
        None => println!("Last sync:               never"),
    }

    println!("\nLast 7 days");
    println!("  Runs:    {}", summary.recent_syncs);
    match summary.success_rate() {
        Some(rate) => println!("  Success: {rate:.1}%"),
        None => println!("  Success: n/a"),
    }
    println!("  Errors:  {}", summary.recent_errors);

    let errors = &store.stats().errors;
    if !errors.is_empty() {
        println!("\nRecent errors");
        for error in errors.iter().rev().take(5) {
            println!(
                "  {} [{}] {}",
                error.date.format("%d/%m/%Y %H:%M"),
                error.kind,
                error.message
            );
        }
    }
}
