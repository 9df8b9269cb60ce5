use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use url::Url;

use crate::error::AccountRole;
use crate::spotify_rs::types::{OAuthSession, SpotifyAuthResponse, SpotifyTokenResponse};

const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// The source account is only ever read.
pub const SOURCE_SCOPES: [&str; 3] = [
    "user-library-read",
    "playlist-read-private",
    "playlist-read-collaborative",
];

/// The destination account receives likes and playlist copies.
pub const DESTINATION_SCOPES: [&str; 6] = [
    "user-library-read",
    "user-library-modify",
    "playlist-read-private",
    "playlist-read-collaborative",
    "playlist-modify-private",
    "playlist-modify-public",
];

pub fn scopes_for(role: AccountRole) -> &'static [&'static str] {
    match role {
        AccountRole::Source => &SOURCE_SCOPES,
        AccountRole::Destination => &DESTINATION_SCOPES,
    }
}

fn generate_random_string(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            const CHARSET: &[u8] =
                b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
            CHARSET[rng.random_range(0..CHARSET.len())] as char
        })
        .collect()
}

/// Generate a random state parameter for CSRF protection
fn generate_state() -> String {
    generate_random_string(16)
}

/// Initiate the authorization code flow for one account role.
/// Returns the authorization URL and the session needed to validate the callback.
pub fn initiate_oauth(
    client_id: &str,
    redirect_uri: &str,
    role: AccountRole,
) -> (SpotifyAuthResponse, OAuthSession) {
    let state = generate_state();
    let scope = scopes_for(role).join(" ");

    // show_dialog forces the account picker, otherwise the browser silently
    // reuses whichever account is logged in and both roles end up the same user.
    let auth_url = format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&state={}&scope={}&show_dialog=true",
        SPOTIFY_AUTH_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&state),
        urlencoding::encode(&scope)
    );

    let session = OAuthSession {
        state: state.clone(),
    };

    let response = SpotifyAuthResponse { auth_url, state };

    (response, session)
}

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("Not a valid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Spotify denied the authorization: {0}")]
    Denied(String),
    #[error("State mismatch, the callback does not belong to this login attempt")]
    StateMismatch,
    #[error("Callback URL has no `code` parameter")]
    MissingCode,
}

/// Extract the authorization code from the URL the browser was redirected to.
pub fn parse_callback_url(callback_url: &str, session: &OAuthSession) -> Result<String, CallbackError> {
    let url = Url::parse(callback_url.trim())?;
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        return Err(CallbackError::Denied(error.clone()));
    }
    if params.get("state") != Some(&session.state) {
        return Err(CallbackError::StateMismatch);
    }
    params.get("code").cloned().ok_or(CallbackError::MissingCode)
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeCodeForTokenError {
    #[error("Invalid code: {reason}")]
    InvalidCode { reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response")]
    FailedToParseResponse(reqwest::Error),
}

/// Exchange authorization code for access token
/// https://developer.spotify.com/documentation/web-api/tutorials/code-flow
pub async fn exchange_code_for_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    code: &str,
    // Must be the exact redirect URI used to initiate the flow
    redirect_uri: &str,
) -> Result<SpotifyTokenResponse, ExchangeCodeForTokenError> {
    let mut params = HashMap::new();
    params.insert("grant_type", "authorization_code");
    params.insert("code", code);
    params.insert("redirect_uri", redirect_uri);

    let response = client
        .post(SPOTIFY_TOKEN_URL)
        // Serializes to x-www-form-urlencoded, as required by spotify
        .form(&params)
        .basic_auth(client_id, Some(client_secret))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(ExchangeCodeForTokenError::FailedToSendRequest)?;

    if !response.status().is_success() {
        return Err(ExchangeCodeForTokenError::InvalidCode {
            reason: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    response
        .json()
        .await
        .map_err(ExchangeCodeForTokenError::FailedToParseResponse)
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshTokenError {
    #[error("Invalid refresh token: {reason}")]
    InvalidRefreshToken { reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

/// Refresh an access token using a refresh token
pub async fn refresh_access_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<SpotifyTokenResponse, RefreshTokenError> {
    let mut params = HashMap::new();
    params.insert("grant_type", "refresh_token");
    params.insert("refresh_token", refresh_token);

    let response = client
        .post(SPOTIFY_TOKEN_URL)
        .form(&params)
        .basic_auth(client_id, Some(client_secret))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(RefreshTokenError::FailedToSendRequest)?;

    if !response.status().is_success() {
        return Err(RefreshTokenError::InvalidRefreshToken {
            reason: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    response
        .json()
        .await
        .map_err(RefreshTokenError::FailedToParseResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_state() {
        let state = generate_state();
        assert_eq!(state.len(), 16);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()
            || c == '-'
            || c == '.'
            || c == '_'
            || c == '~'));
    }

    #[test]
    fn test_initiate_oauth_uses_role_scopes() {
        let (response, session) =
            initiate_oauth("client", "http://127.0.0.1:8888/callback", AccountRole::Source);

        assert!(response.auth_url.starts_with(SPOTIFY_AUTH_URL));
        assert!(response.auth_url.contains("user-library-read"));
        assert!(!response.auth_url.contains("user-library-modify"));
        assert_eq!(response.state, session.state);

        let (response, _) = initiate_oauth(
            "client",
            "http://127.0.0.1:8888/callback",
            AccountRole::Destination,
        );
        assert!(response.auth_url.contains("user-library-modify"));
        assert!(response.auth_url.contains("playlist-modify-public"));
    }

    #[test]
    fn test_parse_callback_url() {
        let session = OAuthSession {
            state: "abc".into(),
        };

        let code =
            parse_callback_url("http://127.0.0.1:8888/callback?code=xyz&state=abc", &session)
                .unwrap();
        assert_eq!(code, "xyz");

        assert!(matches!(
            parse_callback_url("http://127.0.0.1:8888/callback?code=xyz&state=other", &session),
            Err(CallbackError::StateMismatch)
        ));
        assert!(matches!(
            parse_callback_url(
                "http://127.0.0.1:8888/callback?error=access_denied&state=abc",
                &session
            ),
            Err(CallbackError::Denied(_))
        ));
        assert!(matches!(
            parse_callback_url("http://127.0.0.1:8888/callback?state=abc", &session),
            Err(CallbackError::MissingCode)
        ));
    }
}
