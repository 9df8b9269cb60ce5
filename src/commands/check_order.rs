use color_eyre::eyre::Result;

use crate::config::Config;
use crate::ports::spotify::SpotifyUserProfile;
use crate::services::order_check::{AccountChronology, OrderCheckReport, SyncQuality, verify_order};
use crate::services::spotify::account::SpotifyAccountService;
use crate::services::sync::types::Track;
use crate::shutdown::Shutdown;

pub(crate) async fn handle_check_order(
    config: &Config,
    accounts: &SpotifyAccountService,
    shutdown: Shutdown,
) -> Result<()> {
    let (source, destination) = accounts.connect_both().await?;
    println!("Checking liked tracks order, this reads both libraries...\n");

    let Some(report) = verify_order(&source.client, &destination.client, config, shutdown).await
    else {
        println!("⚠ Order check interrupted, no report for partial listings");
        return Ok(());
    };
    render(
        &report,
        &source.profile,
        &destination.profile,
        config.order_check.sample_size,
    );
    Ok(())
}

fn describe(track: &Track) -> String {
    let added = track
        .added_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown date".to_string());
    format!("{} - {} ({added})", track.name, track.artists_label())
}

fn render_listing(label: &str, tracks: &[Track], sample_size: usize) {
    println!("{label}: {} liked track(s)", tracks.len());
    if tracks.is_empty() {
        return;
    }
    println!("  Oldest:");
    for (position, track) in tracks.iter().enumerate().take(sample_size) {
        println!("    {:>5}. {}", position + 1, describe(track));
    }
    if tracks.len() > sample_size {
        println!("  Newest:");
        let start = tracks.len().saturating_sub(sample_size).max(sample_size);
        for (position, track) in tracks.iter().enumerate().skip(start) {
            println!("    {:>5}. {}", position + 1, describe(track));
        }
    }
}

fn render_chronology(label: &str, chronology: &AccountChronology, sample_size: usize) {
    if chronology.is_chronological() {
        println!(
            "  ✓ {label}: all {} likes are in chronological order",
            chronology.total
        );
        return;
    }
    println!(
        "  ✗ {label}: {} out-of-order pair(s) among {} likes",
        chronology.violations.len(),
        chronology.total
    );
    for violation in chronology.violations.iter().take(sample_size) {
        println!(
            "      #{}: {} liked before {}",
            violation.position,
            describe(&violation.current),
            describe(&violation.previous)
        );
    }
}

fn render(
    report: &OrderCheckReport,
    source: &SpotifyUserProfile,
    destination: &SpotifyUserProfile,
    sample_size: usize,
) {
    let source_label = format!("Source ({})", source.label());
    let destination_label = format!("Destination ({})", destination.label());

    render_listing(&source_label, &report.source_tracks, sample_size);
    println!();
    render_listing(&destination_label, &report.destination_tracks, sample_size);
    println!();

    println!("Chronology");
    render_chronology(&source_label, &report.source, sample_size);
    render_chronology(&destination_label, &report.destination, sample_size);
    println!();

    let comparison = &report.comparison;
    println!("Comparison");
    println!("  In both libraries:    {}", comparison.common);
    println!("  Only at source:       {}", comparison.only_source);
    println!("  Only at destination:  {}", comparison.only_destination);
    println!("  Correctly ordered:    {}", comparison.correctly_ordered);

    if !comparison.issues.is_empty() {
        println!("  Order issues: {}", comparison.issues.len());
        for issue in comparison.issues.iter().take(sample_size) {
            println!(
                "      {}: position {} at source, {} at destination (off by {})",
                describe(&issue.track),
                issue.source_position,
                issue.destination_position,
                issue.delta
            );
        }
    }

    match (comparison.accuracy(), comparison.quality()) {
        (Some(accuracy), Some(quality)) => {
            let verdict = match quality {
                SyncQuality::Excellent => "✓ Excellent sync quality",
                SyncQuality::Good => "~ Good sync quality",
                SyncQuality::NeedsAttention => "✗ Sync order needs attention",
            };
            println!("\n  Accuracy: {accuracy:.1}%  {verdict}");
        }
        _ => println!("\n  Accuracy: n/a, the libraries have no tracks in common"),
    }
}
