use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use color_eyre::eyre::{Result, WrapErr};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};
use reqwest::Client;
use tokio::sync::Mutex;

use crate::ports::spotify::{
    NewPlaylist, SpotifyApiPlaylist, SpotifyApiTrack, SpotifyClient, SpotifyUserProfile,
};
use crate::spotify_rs::auth::refresh_access_token;
use crate::spotify_rs::client::{
    add_tracks_to_playlist, create_playlist, get_current_user, get_playlist_tracks_page,
    get_saved_tracks_page, get_user_playlists_page, remove_saved_tracks, save_tracks,
    unfollow_playlist,
};
use crate::spotify_rs::types::{
    CreatePlaylistRequest, SpotifyPlaylist, SpotifySavedTrack, SpotifyTokenResponse,
};

/// Refresh this long before the access token actually expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Clone)]
pub struct SpotifyApiCredentials {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl SpotifyApiCredentials {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn from_response(response: &SpotifyTokenResponse) -> Self {
        Self {
            value: response.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        }
    }

    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

struct TokenState {
    refresh_token: String,
    access: Option<AccessToken>,
}

/// Spotify Web API adapter acting as one account. Keeps its own access
/// token fresh and shares one request-rate ceiling across every call.
pub struct SpotifyHttpAdapter {
    client: Client,
    credentials: SpotifyApiCredentials,
    token: Mutex<TokenState>,
    rate_limiter: DirectRateLimiter,
}

impl SpotifyHttpAdapter {
    pub fn new(
        client: Client,
        credentials: SpotifyApiCredentials,
        refresh_token: String,
        requests_per_second: u32,
    ) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            client,
            credentials,
            token: Mutex::new(TokenState {
                refresh_token,
                access: None,
            }),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        }
    }

    /// The refresh token currently in use. Spotify may rotate it on refresh.
    pub async fn refresh_token(&self) -> String {
        self.token.lock().await.refresh_token.clone()
    }

    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(access) = token.access.as_ref().filter(|access| access.is_fresh()) {
            return Ok(access.value.clone());
        }

        tracing::debug!("Refreshing Spotify access token");
        let response = refresh_access_token(
            &self.client,
            self.credentials.client_id(),
            self.credentials.client_secret(),
            &token.refresh_token,
        )
        .await
        .wrap_err("Failed to refresh Spotify access token")?;

        if let Some(rotated) = response.refresh_token.clone() {
            token.refresh_token = rotated;
        }
        let access = AccessToken::from_response(&response);
        let value = access.value.clone();
        token.access = Some(access);
        Ok(value)
    }

    /// Wait for the rate limiter, then hand out a valid access token.
    async fn authorize(&self) -> Result<String> {
        self.rate_limiter.until_ready().await;
        self.access_token().await
    }
}

fn to_api_track(entry: Option<SpotifySavedTrack>) -> SpotifyApiTrack {
    let Some(entry) = entry else {
        return SpotifyApiTrack {
            id: None,
            name: String::new(),
            artists: Vec::new(),
            added_at: None,
        };
    };
    match entry.track {
        Some(track) => SpotifyApiTrack {
            id: track.id,
            name: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
            added_at: entry.added_at,
        },
        None => SpotifyApiTrack {
            id: None,
            name: String::new(),
            artists: Vec::new(),
            added_at: entry.added_at,
        },
    }
}

fn to_api_playlist(playlist: SpotifyPlaylist) -> SpotifyApiPlaylist {
    SpotifyApiPlaylist {
        id: playlist.id,
        name: playlist.name,
        public: playlist.public,
        collaborative: playlist.collaborative,
        owner_id: playlist.owner.id,
        total_tracks: playlist.tracks.total,
    }
}

#[async_trait::async_trait]
impl SpotifyClient for SpotifyHttpAdapter {
    async fn current_user(&self) -> Result<SpotifyUserProfile> {
        let token = self.authorize().await?;
        let user = get_current_user(&self.client, &token)
            .await
            .wrap_err("Failed to get user profile")?;
        Ok(SpotifyUserProfile {
            id: user.id,
            display_name: user.display_name,
        })
    }

    async fn saved_tracks_page(&self, offset: u32, limit: u32) -> Result<Vec<SpotifyApiTrack>> {
        let token = self.authorize().await?;
        let page = get_saved_tracks_page(&self.client, &token, offset, limit)
            .await
            .wrap_err("Failed to fetch liked tracks")?;
        // Null entries are kept so an all-null page does not look like the end.
        Ok(page.items.into_iter().map(to_api_track).collect())
    }

    async fn playlists_page(&self, offset: u32, limit: u32) -> Result<Vec<SpotifyApiPlaylist>> {
        let token = self.authorize().await?;
        let page = get_user_playlists_page(&self.client, &token, offset, limit)
            .await
            .wrap_err("Failed to fetch playlists")?;
        Ok(page.items.into_iter().flatten().map(to_api_playlist).collect())
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<SpotifyApiTrack>> {
        let token = self.authorize().await?;
        let page = get_playlist_tracks_page(&self.client, &token, playlist_id, offset, limit)
            .await
            .wrap_err(format!("Failed to fetch tracks of playlist {playlist_id}"))?;
        Ok(page.items.into_iter().map(to_api_track).collect())
    }

    async fn save_tracks(&self, track_ids: &[String]) -> Result<()> {
        let token = self.authorize().await?;
        save_tracks(&self.client, &token, track_ids)
            .await
            .wrap_err("Failed to like tracks")
    }

    async fn remove_saved_tracks(&self, track_ids: &[String]) -> Result<()> {
        let token = self.authorize().await?;
        remove_saved_tracks(&self.client, &token, track_ids)
            .await
            .wrap_err("Failed to unlike tracks")
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        playlist: &NewPlaylist,
    ) -> Result<SpotifyApiPlaylist> {
        let token = self.authorize().await?;
        let request = CreatePlaylistRequest {
            name: &playlist.name,
            public: playlist.public,
            collaborative: playlist.collaborative,
            description: &playlist.description,
        };
        let created = create_playlist(&self.client, &token, user_id, &request)
            .await
            .wrap_err(format!("Failed to create playlist {}", playlist.name))?;
        Ok(to_api_playlist(created))
    }

    async fn add_tracks_to_playlist(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let token = self.authorize().await?;
        add_tracks_to_playlist(&self.client, &token, playlist_id, track_ids)
            .await
            .wrap_err(format!("Failed to add tracks to playlist {playlist_id}"))
    }

    async fn unfollow_playlist(&self, playlist_id: &str) -> Result<()> {
        let token = self.authorize().await?;
        unfollow_playlist(&self.client, &token, playlist_id)
            .await
            .wrap_err(format!("Failed to delete playlist {playlist_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spotify_rs::types::{SpotifyArtist, SpotifyPlaylistOwner, SpotifyPlaylistTracks, SpotifyTrack};

    #[test]
    fn test_token_freshness_margin() {
        let fresh = AccessToken {
            value: "a".into(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        };
        let expiring = AccessToken {
            value: "b".into(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(fresh.is_fresh());
        assert!(!expiring.is_fresh());
    }

    #[test]
    fn test_null_entries_map_to_id_less_tracks() {
        assert!(to_api_track(None).id.is_none());

        let entry = SpotifySavedTrack {
            added_at: None,
            track: Some(SpotifyTrack {
                id: Some("t1".into()),
                name: "One".into(),
                artists: vec![
                    SpotifyArtist { name: "A".into() },
                    SpotifyArtist { name: "B".into() },
                ],
            }),
        };
        let track = to_api_track(Some(entry));
        assert_eq!(track.id.as_deref(), Some("t1"));
        assert_eq!(track.artists, vec!["A", "B"]);
    }

    #[test]
    fn test_playlist_mapping_keeps_owner() {
        let playlist = to_api_playlist(SpotifyPlaylist {
            id: "p1".into(),
            name: "Road Trip".into(),
            public: Some(true),
            collaborative: false,
            owner: SpotifyPlaylistOwner {
                id: "alice".into(),
                display_name: None,
            },
            tracks: SpotifyPlaylistTracks { total: 12 },
        });
        assert_eq!(playlist.owner_id, "alice");
        assert_eq!(playlist.total_tracks, 12);
    }
}
