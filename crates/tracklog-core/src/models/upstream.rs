//! Typed Spotify Web API payloads
//!
//! Only the fields tracklog stores are modeled. A missing required key fails
//! deserialization, which the adapter reports as an upstream error.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One page of a paginated listing.
///
/// `next` is `None` on the last page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

/// Entry of `GET /me/tracks`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTrack {
    pub added_at: String,
    pub track: Track,
}

/// Entry of `GET /me/player/recently-played`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayHistory {
    pub played_at: String,
    pub track: TrackRef,
}

/// Full track object as nested in saved tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub album: AlbumRef,
    pub artists: Vec<ArtistRef>,
    pub popularity: u32,
    pub preview_url: Option<String>,
    pub duration_ms: u64,
}

/// Minimal track reference; the recently-played feed is flattened from this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Full album object from `GET /albums`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub popularity: u32,
    pub genres: Vec<String>,
    pub artists: Vec<ArtistRef>,
}

/// Full artist object from `GET /artists`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub popularity: u32,
    pub genres: Vec<String>,
    pub followers: Followers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Followers {
    pub total: u64,
}

/// Parse an upstream ISO-8601 timestamp into Unix milliseconds.
pub fn parse_timestamp(raw: &str) -> Result<i64> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|instant| instant.timestamp_millis())
        .map_err(|error| Error::Upstream(format!("invalid timestamp '{raw}': {error}")))
}
