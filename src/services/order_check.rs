use std::collections::{HashMap, HashSet};

use crate::config::{Config, OrderCheckSettings};
use crate::ports::spotify::SpotifyClient;
use crate::services::sync::fetch::PagedFetcher;
use crate::services::sync::types::{Snapshot, Track};
use crate::shutdown::Shutdown;

/// Two consecutive chronological entries whose like dates go backwards.
#[derive(Debug, Clone)]
pub struct ChronologyViolation {
    /// 1-based position of the later entry.
    pub position: usize,
    pub previous: Track,
    pub current: Track,
}

#[derive(Debug, Clone, Default)]
pub struct AccountChronology {
    pub total: usize,
    pub violations: Vec<ChronologyViolation>,
}

impl AccountChronology {
    pub fn is_chronological(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A common track whose relative position drifted past the tolerance.
#[derive(Debug, Clone)]
pub struct OrderIssue {
    pub track: Track,
    pub source_position: usize,
    pub destination_position: usize,
    pub delta: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncQuality {
    Excellent,
    Good,
    NeedsAttention,
}

impl SyncQuality {
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 95.0 {
            SyncQuality::Excellent
        } else if accuracy >= 85.0 {
            SyncQuality::Good
        } else {
            SyncQuality::NeedsAttention
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderComparison {
    pub common: usize,
    pub only_source: usize,
    pub only_destination: usize,
    pub correctly_ordered: usize,
    pub issues: Vec<OrderIssue>,
}

impl OrderComparison {
    /// Percentage of common tracks within tolerance. `None` when the two
    /// libraries share nothing.
    pub fn accuracy(&self) -> Option<f64> {
        (self.common > 0).then(|| self.correctly_ordered as f64 * 100.0 / self.common as f64)
    }

    pub fn quality(&self) -> Option<SyncQuality> {
        self.accuracy().map(SyncQuality::from_accuracy)
    }
}

#[derive(Debug, Clone)]
pub struct OrderCheckReport {
    /// Chronological (oldest first) listings both checks ran on.
    pub source_tracks: Vec<Track>,
    pub destination_tracks: Vec<Track>,
    pub source: AccountChronology,
    pub destination: AccountChronology,
    pub comparison: OrderComparison,
}

/// Pairs whose like timestamps decrease. Entries without a timestamp are
/// compared with neither neighbour.
pub fn check_chronology(chronological: &[Track]) -> AccountChronology {
    let violations = chronological
        .windows(2)
        .enumerate()
        .filter_map(|(index, pair)| {
            let (previous, current) = (&pair[0], &pair[1]);
            match (previous.added_at, current.added_at) {
                (Some(earlier), Some(later)) if later < earlier => Some(ChronologyViolation {
                    position: index + 2,
                    previous: previous.clone(),
                    current: current.clone(),
                }),
                _ => None,
            }
        })
        .collect();

    AccountChronology {
        total: chronological.len(),
        violations,
    }
}

/// Compare the relative order of the tracks both listings have in common.
pub fn compare_order(source: &[Track], destination: &[Track], tolerance: usize) -> OrderComparison {
    let source_ids: HashSet<&str> = source.iter().map(|t| t.id.as_str()).collect();
    let destination_ids: HashSet<&str> = destination.iter().map(|t| t.id.as_str()).collect();

    let common_source: Vec<&Track> = source
        .iter()
        .filter(|t| destination_ids.contains(t.id.as_str()))
        .collect();
    let destination_positions: HashMap<&str, usize> = destination
        .iter()
        .filter(|t| source_ids.contains(t.id.as_str()))
        .enumerate()
        .map(|(position, t)| (t.id.as_str(), position))
        .collect();

    let mut comparison = OrderComparison {
        common: common_source.len(),
        only_source: source_ids.difference(&destination_ids).count(),
        only_destination: destination_ids.difference(&source_ids).count(),
        ..OrderComparison::default()
    };

    for (source_position, track) in common_source.into_iter().enumerate() {
        let Some(&destination_position) = destination_positions.get(track.id.as_str()) else {
            continue;
        };
        let delta = source_position.abs_diff(destination_position);
        if delta <= tolerance {
            comparison.correctly_ordered += 1;
        } else {
            comparison.issues.push(OrderIssue {
                track: track.clone(),
                source_position: source_position + 1,
                destination_position: destination_position + 1,
                delta,
            });
        }
    }

    comparison
}

/// Order Verifier over two already-fetched snapshots.
pub fn check_order(
    source: &Snapshot,
    destination: &Snapshot,
    settings: &OrderCheckSettings,
) -> OrderCheckReport {
    let source_tracks = source.chronological();
    let destination_tracks = destination.chronological();

    OrderCheckReport {
        source: check_chronology(&source_tracks),
        destination: check_chronology(&destination_tracks),
        comparison: compare_order(&source_tracks, &destination_tracks, settings.tolerance),
        source_tracks,
        destination_tracks,
    }
}

/// Fetch both liked-track listings and verify their order. Read-only.
///
/// Returns `None` when shutdown cut a listing short, since a partial listing
/// would report tracks as missing and skew the accuracy.
pub async fn verify_order<C: SpotifyClient + ?Sized>(
    source: &C,
    destination: &C,
    config: &Config,
    shutdown: Shutdown,
) -> Option<OrderCheckReport> {
    let source_snapshot = PagedFetcher::new(source, config, shutdown.clone())
        .liked_tracks()
        .await;
    let destination_snapshot = PagedFetcher::new(destination, config, shutdown.clone())
        .liked_tracks()
        .await;
    if shutdown.is_requested() {
        tracing::warn!("Order check interrupted, listings are incomplete");
        return None;
    }

    Some(check_order(
        &source_snapshot,
        &destination_snapshot,
        &config.order_check,
    ))
}
