//! Record categories

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A logical record type with its own storage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Saved ("liked") tracks
    Liked,
    /// Recently played tracks
    Recent,
    /// Album metadata, one row per genre
    Album,
    /// Album to contributing artist links
    AlbumArtist,
    /// Artist metadata, one row per genre
    Artist,
}

impl Category {
    pub const ALL: [Self; 5] = [
        Self::Liked,
        Self::Recent,
        Self::Album,
        Self::AlbumArtist,
        Self::Artist,
    ];

    /// Storage table backing this category
    pub const fn table(self) -> &'static str {
        match self {
            Self::Liked => "liked_songs",
            Self::Recent => "recents",
            Self::Album => "album",
            Self::AlbumArtist => "album_artist",
            Self::Artist => "artist",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Liked => "liked",
            Self::Recent => "recent",
            Self::Album => "album",
            Self::AlbumArtist => "album-artist",
            Self::Artist => "artist",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.label() == normalized || category.table() == normalized)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}
