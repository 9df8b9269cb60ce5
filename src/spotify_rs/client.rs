use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::spotify_rs::types::{
    CreatePlaylistRequest, PlaylistUrisRequest, SpotifyPage, SpotifyPlaylist, SpotifySavedTrack,
    SpotifyUser, TrackIdsRequest,
};

const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest `Retry-After` we are willing to honour inline.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to send http request: {0}")]
    Request(reqwest::Error),
    #[error("Spotify responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Rate limited by Spotify (retry after {}s)", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("Failed to parse response: {0}")]
    Decode(reqwest::Error),
}

/// Send a request and turn non-success statuses into `ApiError`.
///
/// A 429 waits for the advertised `Retry-After` (capped) before returning the
/// error, so whoever retries next talks to a cooled-down API.
async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(ApiError::Request)?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(1))
            .min(MAX_RETRY_AFTER);
        tracing::warn!(
            retry_after_secs = retry_after.as_secs(),
            "Spotify rate limit hit, cooling down"
        );
        tokio::time::sleep(retry_after).await;
        return Err(ApiError::RateLimited { retry_after });
    }

    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or("Failed to get error text".to_string());
        return Err(ApiError::Status { status, body });
    }

    Ok(response)
}

async fn get_json<T: DeserializeOwned>(
    client: &Client,
    access_token: &str,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, ApiError> {
    send(client.get(url).bearer_auth(access_token).query(query))
        .await?
        .json()
        .await
        .map_err(ApiError::Decode)
}

fn page_query(offset: u32, limit: u32) -> Vec<(&'static str, String)> {
    vec![("offset", offset.to_string()), ("limit", limit.to_string())]
}

/// Get the current user's profile
pub async fn get_current_user(client: &Client, access_token: &str) -> Result<SpotifyUser, ApiError> {
    get_json(client, access_token, &format!("{SPOTIFY_API_URL}/me"), &[]).await
}

/// One page of the current user's liked tracks, newest first
pub async fn get_saved_tracks_page(
    client: &Client,
    access_token: &str,
    offset: u32,
    limit: u32,
) -> Result<SpotifyPage<SpotifySavedTrack>, ApiError> {
    get_json(
        client,
        access_token,
        &format!("{SPOTIFY_API_URL}/me/tracks"),
        &page_query(offset, limit),
    )
    .await
}

/// One page of the playlists the current user owns or follows
pub async fn get_user_playlists_page(
    client: &Client,
    access_token: &str,
    offset: u32,
    limit: u32,
) -> Result<SpotifyPage<SpotifyPlaylist>, ApiError> {
    get_json(
        client,
        access_token,
        &format!("{SPOTIFY_API_URL}/me/playlists"),
        &page_query(offset, limit),
    )
    .await
}

/// One page of a playlist's members
pub async fn get_playlist_tracks_page(
    client: &Client,
    access_token: &str,
    playlist_id: &str,
    offset: u32,
    limit: u32,
) -> Result<SpotifyPage<SpotifySavedTrack>, ApiError> {
    let mut query = page_query(offset, limit);
    query.push((
        "fields",
        "items(added_at,track(id,name,artists(name)))".to_string(),
    ));
    get_json(
        client,
        access_token,
        &format!(
            "{SPOTIFY_API_URL}/playlists/{}/tracks",
            urlencoding::encode(playlist_id)
        ),
        &query,
    )
    .await
}

/// Add tracks to the current user's liked tracks (max 50 ids per call)
pub async fn save_tracks(
    client: &Client,
    access_token: &str,
    track_ids: &[String],
) -> Result<(), ApiError> {
    send(
        client
            .put(format!("{SPOTIFY_API_URL}/me/tracks"))
            .bearer_auth(access_token)
            .json(&TrackIdsRequest { ids: track_ids }),
    )
    .await?;
    Ok(())
}

/// Remove tracks from the current user's liked tracks (max 50 ids per call)
pub async fn remove_saved_tracks(
    client: &Client,
    access_token: &str,
    track_ids: &[String],
) -> Result<(), ApiError> {
    send(
        client
            .delete(format!("{SPOTIFY_API_URL}/me/tracks"))
            .bearer_auth(access_token)
            .json(&TrackIdsRequest { ids: track_ids }),
    )
    .await?;
    Ok(())
}

pub async fn create_playlist(
    client: &Client,
    access_token: &str,
    user_id: &str,
    request: &CreatePlaylistRequest<'_>,
) -> Result<SpotifyPlaylist, ApiError> {
    send(
        client
            .post(format!(
                "{SPOTIFY_API_URL}/users/{}/playlists",
                urlencoding::encode(user_id)
            ))
            .bearer_auth(access_token)
            .json(request),
    )
    .await?
    .json()
    .await
    .map_err(ApiError::Decode)
}

/// Append tracks to a playlist (max 100 per call), in the given order
pub async fn add_tracks_to_playlist(
    client: &Client,
    access_token: &str,
    playlist_id: &str,
    track_ids: &[String],
) -> Result<(), ApiError> {
    let body = PlaylistUrisRequest {
        uris: track_ids
            .iter()
            .map(|id| format!("spotify:track:{id}"))
            .collect(),
    };
    send(
        client
            .post(format!(
                "{SPOTIFY_API_URL}/playlists/{}/tracks",
                urlencoding::encode(playlist_id)
            ))
            .bearer_auth(access_token)
            .json(&body),
    )
    .await?;
    Ok(())
}

/// Unfollow a playlist. For an owned playlist this is how Spotify deletes it.
pub async fn unfollow_playlist(
    client: &Client,
    access_token: &str,
    playlist_id: &str,
) -> Result<(), ApiError> {
    send(
        client
            .delete(format!(
                "{SPOTIFY_API_URL}/playlists/{}/followers",
                urlencoding::encode(playlist_id)
            ))
            .bearer_auth(access_token),
    )
    .await?;
    Ok(())
}
