use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;

/// Decoupled representation of the current user's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyUserProfile {
    pub id: String,
    pub display_name: Option<String>,
}

impl SpotifyUserProfile {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// Decoupled representation of one entry of a track listing (liked tracks or
/// playlist members). The API can return entries without a track id (local
/// files, removed tracks), so `id` is optional here and filtered by the fetcher.
#[derive(Debug, Clone)]
pub struct SpotifyApiTrack {
    pub id: Option<String>,
    pub name: String,
    pub artists: Vec<String>,
    pub added_at: Option<DateTime<Utc>>,
}

/// Decoupled representation of a Spotify playlist from the API.
#[derive(Debug, Clone)]
pub struct SpotifyApiPlaylist {
    pub id: String,
    pub name: String,
    pub public: Option<bool>,
    pub collaborative: bool,
    pub owner_id: String,
    pub total_tracks: u32,
}

/// Parameters for creating a playlist on the destination account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlaylist {
    pub name: String,
    pub public: Option<bool>,
    pub collaborative: bool,
    pub description: String,
}

/// Port trait wrapping the Spotify Web API capabilities used by the sync engine.
///
/// Listings are offset/limit pages in the order the API returns them
/// (newest first for liked tracks). Implementations live in
/// `services::spotify::client` (production), `test_utils` or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyClient: Send + Sync {
    async fn current_user(&self) -> Result<SpotifyUserProfile>;

    async fn saved_tracks_page(&self, offset: u32, limit: u32) -> Result<Vec<SpotifyApiTrack>>;

    async fn playlists_page(&self, offset: u32, limit: u32) -> Result<Vec<SpotifyApiPlaylist>>;

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<SpotifyApiTrack>>;

    async fn save_tracks(&self, track_ids: &[String]) -> Result<()>;

    async fn remove_saved_tracks(&self, track_ids: &[String]) -> Result<()>;

    async fn create_playlist(
        &self,
        user_id: &str,
        playlist: &NewPlaylist,
    ) -> Result<SpotifyApiPlaylist>;

    async fn add_tracks_to_playlist(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;

    async fn unfollow_playlist(&self, playlist_id: &str) -> Result<()>;
}
