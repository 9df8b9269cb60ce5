use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use color_eyre::eyre::{OptionExt, Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::error::{AccountRole, SyncError};
use crate::ports::spotify::SpotifyClient;
use crate::services::spotify::client::{SpotifyApiCredentials, SpotifyHttpAdapter};
use crate::services::sync::manager::ConnectedAccount;
use crate::spotify_rs::auth::{exchange_code_for_token, initiate_oauth, parse_callback_url};
use crate::spotify_rs::client::get_current_user;
use crate::spotify_rs::types::{OAuthSession, SpotifyAuthResponse};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAccount {
    pub user_id: String,
    pub display_name: Option<String>,
    pub refresh_token: String,
    pub connected_at: DateTime<Utc>,
}

impl StoredAccount {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_id)
    }
}

/// On-disk credentials, one slot per role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsFile {
    pub source: Option<StoredAccount>,
    pub destination: Option<StoredAccount>,
}

impl AccountsFile {
    pub fn get(&self, role: AccountRole) -> Option<&StoredAccount> {
        match role {
            AccountRole::Source => self.source.as_ref(),
            AccountRole::Destination => self.destination.as_ref(),
        }
    }

    fn slot(&mut self, role: AccountRole) -> &mut Option<StoredAccount> {
        match role {
            AccountRole::Source => &mut self.source,
            AccountRole::Destination => &mut self.destination,
        }
    }

    /// Both roles stored and pointing at the same Spotify user.
    pub fn same_user(&self) -> bool {
        match (&self.source, &self.destination) {
            (Some(source), Some(destination)) => source.user_id == destination.user_id,
            _ => false,
        }
    }
}

pub struct SpotifyAccountService {
    http: reqwest::Client,
    credentials: SpotifyApiCredentials,
    accounts_path: PathBuf,
    requests_per_second: u32,
}

impl SpotifyAccountService {
    pub fn new(
        credentials: SpotifyApiCredentials,
        accounts_path: PathBuf,
        requests_per_second: u32,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            accounts_path,
            requests_per_second,
        }
    }

    pub fn load_accounts(&self) -> Result<AccountsFile> {
        load_accounts(&self.accounts_path)
    }

    fn save_accounts(&self, accounts: &AccountsFile) -> Result<()> {
        save_accounts(&self.accounts_path, accounts)
    }

    /// First half of the login: the URL to open and the session to check the
    /// callback against.
    pub fn begin_login(&self, role: AccountRole) -> (SpotifyAuthResponse, OAuthSession) {
        initiate_oauth(
            self.credentials.client_id(),
            self.credentials.redirect_uri(),
            role,
        )
    }

    /// Second half of the login: validate the redirect URL, exchange the code
    /// and store the account under `role`.
    pub async fn complete_login(
        &self,
        role: AccountRole,
        session: &OAuthSession,
        callback_url: &str,
    ) -> Result<StoredAccount> {
        let code = parse_callback_url(callback_url, session)
            .wrap_err("Invalid authorization callback")?;

        let token = exchange_code_for_token(
            &self.http,
            self.credentials.client_id(),
            self.credentials.client_secret(),
            &code,
            self.credentials.redirect_uri(),
        )
        .await
        .wrap_err("Failed to exchange authorization code")?;

        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_eyre("Spotify did not return a refresh token")?;

        let user = get_current_user(&self.http, &token.access_token)
            .await
            .wrap_err("Failed to get user info")?;

        let account = StoredAccount {
            user_id: user.id,
            display_name: user.display_name,
            refresh_token,
            connected_at: Utc::now(),
        };

        let mut accounts = self.load_accounts()?;
        *accounts.slot(role) = Some(account.clone());
        self.save_accounts(&accounts)?;

        tracing::info!(%role, user_id = %account.user_id, "Account connected");
        if accounts.same_user() {
            tracing::warn!("Source and destination are the same Spotify account");
        }
        Ok(account)
    }

    /// Forget the account stored under `role`. Returns whether one was stored.
    pub fn logout(&self, role: AccountRole) -> Result<bool> {
        let mut accounts = self.load_accounts()?;
        let removed = accounts.slot(role).take().is_some();
        if removed {
            self.save_accounts(&accounts)?;
            tracing::info!(%role, "Account disconnected");
        }
        Ok(removed)
    }

    /// Build an authenticated client for `role` and confirm who it acts as.
    pub async fn connect(
        &self,
        role: AccountRole,
    ) -> Result<ConnectedAccount<SpotifyHttpAdapter>, SyncError> {
        let authentication = |reason: String| SyncError::Authentication { role, reason };

        let accounts = self
            .load_accounts()
            .map_err(|e| authentication(format!("{e:#}")))?;
        let stored = accounts.get(role).ok_or_else(|| {
            authentication(format!(
                "no {role} account connected, run `spotify-mirror auth login --role {role}`"
            ))
        })?;

        let client = SpotifyHttpAdapter::new(
            self.http.clone(),
            self.credentials.clone(),
            stored.refresh_token.clone(),
            self.requests_per_second,
        );
        let profile = client
            .current_user()
            .await
            .map_err(|e| authentication(format!("{e:#}")))?;

        // A rotated refresh token must be stored or the next start fails.
        let refresh_token = client.refresh_token().await;
        if refresh_token != stored.refresh_token {
            let mut updated = accounts.clone();
            if let Some(account) = updated.slot(role).as_mut() {
                account.refresh_token = refresh_token;
            }
            if let Err(e) = self.save_accounts(&updated) {
                tracing::warn!(error = ?e, "Failed to store rotated refresh token");
            }
        }

        tracing::info!(%role, user = %profile.label(), "Connected to Spotify");
        Ok(ConnectedAccount { client, profile })
    }

    /// Connect both roles. Warns when they are the same user.
    pub async fn connect_both(
        &self,
    ) -> Result<
        (
            ConnectedAccount<SpotifyHttpAdapter>,
            ConnectedAccount<SpotifyHttpAdapter>,
        ),
        SyncError,
    > {
        let source = self.connect(AccountRole::Source).await?;
        let destination = self.connect(AccountRole::Destination).await?;
        if source.profile.id == destination.profile.id {
            tracing::warn!(
                user_id = %source.profile.id,
                "Source and destination are the same Spotify account, nothing will be mirrored"
            );
        }
        Ok((source, destination))
    }
}

pub fn load_accounts(path: &Path) -> Result<AccountsFile> {
    if !path.exists() {
        return Ok(AccountsFile::default());
    }
    let contents = std::fs::read_to_string(path)
        .wrap_err(format!("Failed to read accounts file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .wrap_err(format!("Failed to parse accounts file: {}", path.display()))
}

fn save_accounts(path: &Path, accounts: &AccountsFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .wrap_err(format!("Failed to create directory: {}", parent.display()))?;
    }
    let contents =
        serde_json::to_string_pretty(accounts).wrap_err("Failed to serialize accounts")?;
    std::fs::write(path, contents)
        .wrap_err(format!("Failed to write accounts file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(user_id: &str) -> StoredAccount {
        StoredAccount {
            user_id: user_id.into(),
            display_name: None,
            refresh_token: "refresh".into(),
            connected_at: Utc::now(),
        }
    }

    fn service(path: PathBuf) -> SpotifyAccountService {
        SpotifyAccountService::new(
            SpotifyApiCredentials::new(
                "client".into(),
                "secret".into(),
                "http://127.0.0.1:8888/callback".into(),
            ),
            path,
            10,
        )
    }

    #[test]
    fn test_accounts_file_round_trip_and_logout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let accounts = AccountsFile {
            source: Some(stored("alice")),
            destination: Some(stored("bob")),
        };
        save_accounts(&path, &accounts).unwrap();

        let service = service(path.clone());
        assert_eq!(service.load_accounts().unwrap(), accounts);

        assert!(service.logout(AccountRole::Source).unwrap());
        assert!(!service.logout(AccountRole::Source).unwrap());
        let remaining = load_accounts(&path).unwrap();
        assert!(remaining.source.is_none());
        assert_eq!(remaining.get(AccountRole::Destination).unwrap().user_id, "bob");
    }

    #[test]
    fn test_same_user_detection() {
        let mut accounts = AccountsFile {
            source: Some(stored("alice")),
            destination: Some(stored("alice")),
        };
        assert!(accounts.same_user());

        accounts.destination = Some(stored("bob"));
        assert!(!accounts.same_user());

        accounts.destination = None;
        assert!(!accounts.same_user());
    }

    #[tokio::test]
    async fn test_connect_without_stored_account_is_authentication_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path().join("accounts.json"));

        let error = service.connect(AccountRole::Destination).await.err().unwrap();

        assert_eq!(error.kind(), "authentication");
        assert!(error.to_string().contains("destination"));
    }

    #[test]
    fn test_begin_login_targets_configured_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path().join("accounts.json"));

        let (response, session) = service.begin_login(AccountRole::Source);

        assert!(response.auth_url.contains("client_id=client"));
        assert!(response.auth_url.contains(&*urlencoding::encode("http://127.0.0.1:8888/callback")));
        assert_eq!(response.state, session.state);
    }
}
