use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Spotify OAuth token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

/// Spotify user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// Offset-paged listing envelope. Spotify occasionally returns `null` entries
/// inside `items`, so they are kept optional.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<Option<T>>,
}

/// Entry of `/me/tracks` and `/playlists/{id}/tracks`
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifySavedTrack {
    pub added_at: Option<DateTime<Utc>>,
    pub track: Option<SpotifyTrack>,
}

/// Spotify track from API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

/// Spotify playlist from API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
    pub public: Option<bool>,
    #[serde(default)]
    pub collaborative: bool,
    pub owner: SpotifyPlaylistOwner,
    pub tracks: SpotifyPlaylistTracks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylistOwner {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylistTracks {
    pub total: u32,
}

/// Body of `POST /users/{user_id}/playlists`
#[derive(Debug, Clone, Serialize)]
pub struct CreatePlaylistRequest<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    pub collaborative: bool,
    pub description: &'a str,
}

/// Body of `PUT`/`DELETE /me/tracks`
#[derive(Debug, Clone, Serialize)]
pub struct TrackIdsRequest<'a> {
    pub ids: &'a [String],
}

/// Body of `POST /playlists/{id}/tracks`
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistUrisRequest {
    pub uris: Vec<String>,
}

/// OAuth session data for the authorization code flow
#[derive(Debug, Clone)]
pub struct OAuthSession {
    pub state: String,
}

/// Response for authentication initiation
#[derive(Debug, Clone)]
pub struct SpotifyAuthResponse {
    pub auth_url: String,
    pub state: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saved_tracks_page_tolerates_null_entries() {
        let json = r#"{
            "items": [
                {"added_at": "2024-03-01T10:00:00Z", "track": {"id": "t1", "name": "One", "artists": [{"name": "A"}]}},
                null,
                {"added_at": "2024-02-01T10:00:00Z", "track": null},
                {"added_at": "2024-01-01T10:00:00Z", "track": {"id": null, "name": "Local file", "artists": []}}
            ],
            "total": 4
        }"#;

        let page: SpotifyPage<SpotifySavedTrack> = serde_json::from_str(json).unwrap();

        assert_eq!(page.items.len(), 4);
        assert!(page.items[1].is_none());
        let first = page.items[0].as_ref().unwrap();
        assert_eq!(first.track.as_ref().unwrap().id.as_deref(), Some("t1"));
        assert!(page.items[2].as_ref().unwrap().track.is_none());
        assert!(page.items[3].as_ref().unwrap().track.as_ref().unwrap().id.is_none());
    }

    #[test]
    fn test_playlist_deserializes_owner_and_flags() {
        let json = r#"{
            "id": "p1",
            "name": "Road Trip",
            "description": "",
            "public": null,
            "collaborative": true,
            "owner": {"id": "alice", "display_name": "Alice"},
            "tracks": {"total": 12}
        }"#;

        let playlist: SpotifyPlaylist = serde_json::from_str(json).unwrap();

        assert_eq!(playlist.owner.id, "alice");
        assert!(playlist.collaborative);
        assert_eq!(playlist.public, None);
        assert_eq!(playlist.tracks.total, 12);
    }
}
