use color_eyre::eyre::Result;

use crate::commands::prompt;
use crate::error::AccountRole;
use crate::services::spotify::account::SpotifyAccountService;

pub(crate) async fn handle_login(accounts: &SpotifyAccountService, role: AccountRole) -> Result<()> {
    let (response, session) = accounts.begin_login(role);

    println!("Log in with the {role} account by opening this URL in your browser:\n");
    println!("  {}\n", response.auth_url);
    println!("After approving access you are redirected to a page that may not load.");
    let callback_url = prompt("Paste the full URL of that page here: ")?;

    let account = accounts
        .complete_login(role, &session, &callback_url)
        .await?;
    println!("✓ {role} account connected: {}", account.label());

    if accounts.load_accounts()?.same_user() {
        println!("⚠ Source and destination are the same Spotify account.");
    }
    Ok(())
}

pub(crate) fn handle_status(accounts: &SpotifyAccountService) -> Result<()> {
    let stored = accounts.load_accounts()?;
    for role in [AccountRole::Source, AccountRole::Destination] {
        match stored.get(role) {
            Some(account) => println!(
                "{role:<12} {} ({}), connected {}",
                account.label(),
                account.user_id,
                account.connected_at.format("%Y-%m-%d %H:%M")
            ),
            None => println!("{role:<12} not connected"),
        }
    }
    if stored.same_user() {
        println!("⚠ Source and destination are the same Spotify account.");
    }
    Ok(())
}

pub(crate) fn handle_logout(accounts: &SpotifyAccountService, role: AccountRole) -> Result<()> {
    if accounts.logout(role)? {
        println!("✓ {role} account disconnected");
    } else {
        println!("No {role} account was connected");
    }
    Ok(())
}
