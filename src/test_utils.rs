use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use color_eyre::eyre::{Result, eyre};

use crate::config::Config;
use crate::ports::spotify::{
    NewPlaylist, SpotifyApiPlaylist, SpotifyApiTrack, SpotifyClient, SpotifyUserProfile,
};
use crate::services::sync::types::Track;

/// Config with every pause set to zero.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.rate_limit.page_delay_ms = 0;
    config.rate_limit.write_delay_ms = 0;
    config.rate_limit.playlist_batch_delay_ms = 0;
    config.rate_limit.playlist_delay_ms = 0;
    config.rate_limit.retry_delay_ms = 0;
    config
}

fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0)
        .single()
        .unwrap()
}

pub fn track(id: &str, seconds: i64) -> Track {
    Track {
        id: id.to_string(),
        name: format!("Song {id}"),
        artists: vec!["Artist".to_string()],
        added_at: Some(timestamp(seconds)),
    }
}

pub fn playlist(id: &str, name: &str, owner_id: &str, collaborative: bool) -> SpotifyApiPlaylist {
    SpotifyApiPlaylist {
        id: id.to_string(),
        name: name.to_string(),
        public: Some(false),
        collaborative,
        owner_id: owner_id.to_string(),
        total_tracks: 0,
    }
}

#[derive(Default)]
struct FakeState {
    user_id: String,
    /// Oldest first, with the time each like was recorded.
    liked: Vec<(String, DateTime<Utc>)>,
    clock: i64,
    playlists: Vec<SpotifyApiPlaylist>,
    playlist_tracks: HashMap<String, Vec<String>>,
    save_failures: HashMap<String, usize>,
    fail_next_creation: bool,
    next_playlist_id: usize,
    save_calls: Vec<Vec<String>>,
    remove_calls: Vec<usize>,
    created: Vec<NewPlaylist>,
    writes: usize,
}

impl FakeState {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        timestamp(self.clock)
    }
}

/// An in-memory Spotify account. Clones share the same account.
#[derive(Clone, Default)]
pub struct FakeSpotify {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSpotify {
    pub fn new(user_id: &str) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().user_id = user_id.to_string();
        fake
    }

    /// Like `ids` in the given order, oldest first.
    pub fn with_liked(self, ids: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for id in ids {
                let at = state.tick();
                state.liked.push((id.to_string(), at));
            }
        }
        self
    }

    pub fn profile(&self) -> SpotifyUserProfile {
        let state = self.state.lock().unwrap();
        SpotifyUserProfile {
            id: state.user_id.clone(),
            display_name: Some(state.user_id.to_uppercase()),
        }
    }

    pub fn add_playlist(&self, id: &str, name: &str, collaborative: bool, tracks: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let owner = state.user_id.clone();
        let mut entry = playlist(id, name, &owner, collaborative);
        entry.total_tracks = tracks.len() as u32;
        state.playlists.push(entry);
        state.playlist_tracks.insert(
            id.to_string(),
            tracks.iter().map(|t| t.to_string()).collect(),
        );
    }

    pub fn set_playlist_public(&self, id: &str, public: Option<bool>) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.playlists.iter_mut().find(|p| p.id == id) {
            entry.public = public;
        }
    }

    pub fn add_foreign_playlist(&self, id: &str, name: &str, owner_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.playlists.push(playlist(id, name, owner_id, false));
        state.playlist_tracks.insert(id.to_string(), Vec::new());
    }

    /// The next `times` saves of `id` fail.
    pub fn fail_saves(&self, id: &str, times: usize) {
        self.state
            .lock()
            .unwrap()
            .save_failures
            .insert(id.to_string(), times);
    }

    pub fn fail_next_playlist_creation(&self) {
        self.state.lock().unwrap().fail_next_creation = true;
    }

    /// Forget the likes without recording writes, as a lagging listing would.
    pub fn clear_liked(&self) {
        self.state.lock().unwrap().liked.clear();
    }

    pub fn liked_ids_chronological(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.liked.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn save_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().save_calls.clone()
    }

    /// Batch sizes of the unlike requests.
    pub fn remove_calls(&self) -> Vec<usize> {
        self.state.lock().unwrap().remove_calls.clone()
    }

    pub fn created_playlists(&self) -> Vec<NewPlaylist> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn playlist_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.playlists.iter().map(|p| p.name.clone()).collect()
    }

    pub fn tracks_of_playlist_named(&self, name: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .playlists
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| state.playlist_tracks.get(&p.id))
            .cloned()
            .unwrap_or_default()
    }

    /// Successful and failed write requests alike.
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

fn page<T: Clone>(items: &[T], offset: u32, limit: u32) -> Vec<T> {
    items
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

#[async_trait::async_trait]
impl SpotifyClient for FakeSpotify {
    async fn current_user(&self) -> Result<SpotifyUserProfile> {
        Ok(self.profile())
    }

    async fn saved_tracks_page(&self, offset: u32, limit: u32) -> Result<Vec<SpotifyApiTrack>> {
        let state = self.state.lock().unwrap();
        let newest_first: Vec<SpotifyApiTrack> = state
            .liked
            .iter()
            .rev()
            .map(|(id, at)| SpotifyApiTrack {
                id: Some(id.clone()),
                name: format!("Song {id}"),
                artists: vec!["Artist".to_string()],
                added_at: Some(*at),
            })
            .collect();
        Ok(page(&newest_first, offset, limit))
    }

    async fn playlists_page(&self, offset: u32, limit: u32) -> Result<Vec<SpotifyApiPlaylist>> {
        let state = self.state.lock().unwrap();
        Ok(page(&state.playlists, offset, limit))
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<SpotifyApiTrack>> {
        let state = self.state.lock().unwrap();
        let tracks: Vec<SpotifyApiTrack> = state
            .playlist_tracks
            .get(playlist_id)
            .ok_or_else(|| eyre!("404 playlist {playlist_id} not found"))?
            .iter()
            .map(|id| SpotifyApiTrack {
                id: Some(id.clone()),
                name: format!("Song {id}"),
                artists: vec!["Artist".to_string()],
                added_at: None,
            })
            .collect();
        Ok(page(&tracks, offset, limit))
    }

    async fn save_tracks(&self, track_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        for id in track_ids {
            if let Some(remaining) = state.save_failures.get_mut(id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(eyre!("503 Service Unavailable"));
                }
            }
        }
        state.save_calls.push(track_ids.to_vec());
        for id in track_ids {
            if !state.liked.iter().any(|(liked, _)| liked == id) {
                let at = state.tick();
                state.liked.push((id.clone(), at));
            }
        }
        Ok(())
    }

    async fn remove_saved_tracks(&self, track_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        state.remove_calls.push(track_ids.len());
        state.liked.retain(|(id, _)| !track_ids.contains(id));
        Ok(())
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        new_playlist: &NewPlaylist,
    ) -> Result<SpotifyApiPlaylist> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        if state.fail_next_creation {
            state.fail_next_creation = false;
            return Err(eyre!("500 Internal Server Error"));
        }
        state.next_playlist_id += 1;
        let created = SpotifyApiPlaylist {
            id: format!("created-{}", state.next_playlist_id),
            name: new_playlist.name.clone(),
            public: new_playlist.public,
            collaborative: new_playlist.collaborative,
            owner_id: user_id.to_string(),
            total_tracks: 0,
        };
        state.created.push(new_playlist.clone());
        state.playlists.push(created.clone());
        state.playlist_tracks.insert(created.id.clone(), Vec::new());
        Ok(created)
    }

    async fn add_tracks_to_playlist(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        state
            .playlist_tracks
            .get_mut(playlist_id)
            .ok_or_else(|| eyre!("404 playlist {playlist_id} not found"))?
            .extend_from_slice(track_ids);
        Ok(())
    }

    async fn unfollow_playlist(&self, playlist_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        state.playlists.retain(|p| p.id != playlist_id);
        state.playlist_tracks.remove(playlist_id);
        Ok(())
    }
}
