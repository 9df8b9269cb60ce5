use color_eyre::eyre::Result;

use crate::commands::prompt;
use crate::config::Config;
use crate::error::AccountRole;
use crate::services::cleanup::{CleanupOutcome, CleanupService};
use crate::services::spotify::account::SpotifyAccountService;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CleanupTarget {
    Playlists,
    Liked,
    All,
}

impl CleanupTarget {
    fn includes_playlists(self) -> bool {
        matches!(self, CleanupTarget::Playlists | CleanupTarget::All)
    }

    fn includes_liked(self) -> bool {
        matches!(self, CleanupTarget::Liked | CleanupTarget::All)
    }
}

/// Wipe the destination account. Asks twice unless `yes` is set.
pub(crate) async fn handle_cleanup(
    config: &Config,
    accounts: &SpotifyAccountService,
    target: CleanupTarget,
    yes: bool,
    shutdown: Shutdown,
) -> Result<()> {
    let destination = accounts.connect(AccountRole::Destination).await?;
    let label = destination.profile.label().to_string();

    let mut what = Vec::new();
    if target.includes_playlists() {
        what.push("every playlist it owns");
    }
    if target.includes_liked() {
        what.push("every liked track");
    }
    println!("This permanently removes {} from {label}.", what.join(" and "));

    if !yes {
        if prompt("Continue? [y/N] ")?.to_lowercase() != "y" {
            println!("Aborted");
            return Ok(());
        }
        if prompt(&format!("Type the account name ({label}) to confirm: "))? != label {
            println!("Name does not match, aborted");
            return Ok(());
        }
    }

    let service = CleanupService::new(&destination, config, shutdown);
    if target.includes_playlists() {
        report("Playlists deleted", &service.delete_owned_playlists().await);
    }
    if target.includes_liked() {
        report("Liked tracks removed", &service.unlike_all_tracks().await);
    }
    Ok(())
}

fn report(label: &str, outcome: &CleanupOutcome) {
    let mark = if outcome.is_complete() { "✓" } else { "⚠" };
    println!("{mark} {label}: {}/{}", outcome.removed, outcome.found);
    for failure in &outcome.failures {
        println!("  ✗ {failure}");
    }
}
