//! Spotify Web API adapter
//!
//! `MusicApi` is the seam the sync engine talks to. `SpotifyClient` is the
//! HTTP implementation; tests substitute an in-memory fake.

mod auth;
#[cfg(test)]
mod test_server;

pub use auth::{resolve_access_token, AccessToken, SpotifyAuth};

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::normalize_base_url;
use crate::error::{Error, Result};
use crate::models::{Album, Artist, Paging, PlayHistory, SavedTrack};
use crate::util::compact_text;

/// Largest id batch accepted by `/albums` and `/artists`
pub const MAX_IDS_PER_REQUEST: usize = 20;

/// Largest page accepted by the paginated listings
pub const MAX_PAGE_SIZE: u32 = 50;

/// Read access to a user's streaming library (async)
#[allow(async_fn_in_trait)]
pub trait MusicApi {
    /// One page of saved tracks, newest save first
    async fn fetch_liked_page(&self, offset: u32, limit: u32) -> Result<Paging<SavedTrack>>;

    /// The most recent plays
    async fn fetch_recent_page(&self, limit: u32) -> Result<Paging<PlayHistory>>;

    /// Full album objects for at most [`MAX_IDS_PER_REQUEST`] ids
    async fn fetch_albums(&self, ids: &[String]) -> Result<Vec<Album>>;

    /// Full artist objects for at most [`MAX_IDS_PER_REQUEST`] ids
    async fn fetch_artists(&self, ids: &[String]) -> Result<Vec<Artist>>;
}

/// HTTP client for the Spotify Web API
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    base_url: String,
    access_token: AccessToken,
    client: Client,
}

impl SpotifyClient {
    pub fn new(base_url: impl Into<String>, access_token: AccessToken) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url.into())?,
            access_token,
            client: Client::builder().build()?,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        tracing::debug!("GET {}", path);
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(self.access_token.secret())
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(parse_api_error(status, &body)));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|error| Error::Upstream(format!("Unexpected payload from {path}: {error}")))
    }
}

#[derive(Debug, Deserialize)]
struct AlbumsResponse {
    albums: Vec<Option<Album>>,
}

#[derive(Debug, Deserialize)]
struct ArtistsResponse {
    artists: Vec<Option<Artist>>,
}

fn validate_page_size(limit: u32) -> Result<()> {
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(Error::InvalidInput(format!(
            "Page size must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
        )));
    }
    Ok(())
}

fn validate_id_batch(ids: &[String]) -> Result<()> {
    if ids.len() > MAX_IDS_PER_REQUEST {
        return Err(Error::InvalidInput(format!(
            "At most {MAX_IDS_PER_REQUEST} ids per request, got {}",
            ids.len()
        )));
    }
    Ok(())
}

/// Drop `null` entries the API returns for unknown ids
fn present<T>(kind: &str, entries: Vec<Option<T>>) -> Vec<T> {
    let requested = entries.len();
    let found = entries.into_iter().flatten().collect::<Vec<_>>();
    if found.len() < requested {
        tracing::debug!(
            "{} of {} {} ids were not found",
            requested - found.len(),
            requested,
            kind
        );
    }
    found
}

impl MusicApi for SpotifyClient {
    async fn fetch_liked_page(&self, offset: u32, limit: u32) -> Result<Paging<SavedTrack>> {
        validate_page_size(limit)?;
        self.get_json(
            "/me/tracks",
            &[("offset", offset.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn fetch_recent_page(&self, limit: u32) -> Result<Paging<PlayHistory>> {
        validate_page_size(limit)?;
        self.get_json(
            "/me/player/recently-played",
            &[("limit", limit.to_string())],
        )
        .await
    }

    async fn fetch_albums(&self, ids: &[String]) -> Result<Vec<Album>> {
        validate_id_batch(ids)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: AlbumsResponse = self.get_json("/albums", &[("ids", ids.join(","))]).await?;
        Ok(present("album", response.albums))
    }

    async fn fetch_artists(&self, ids: &[String]) -> Result<Vec<Artist>> {
        validate_id_batch(ids)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: ArtistsResponse = self.get_json("/artists", &[("ids", ids.join(","))]).await?;
        Ok(present("artist", response.artists))
    }
}

/// Error bodies: `{"error": {"status", "message"}}` from the Web API,
/// `{"error", "error_description"}` from the accounts service.
#[derive(Debug, Deserialize)]
struct SpotifyErrorResponse {
    error: Option<serde_json::Value>,
    error_description: Option<String>,
}

pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<SpotifyErrorResponse>(body) {
        let message = match payload.error {
            Some(serde_json::Value::Object(error)) => error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            Some(serde_json::Value::String(error)) => payload.error_description.or(Some(error)),
            _ => payload.error_description,
        };
        if let Some(message) = message.filter(|message| !message.trim().is_empty()) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
