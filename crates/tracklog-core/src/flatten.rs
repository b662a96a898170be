//! Record flattening
//!
//! Expands nested upstream records into flat storage rows. Every function here
//! is pure and keeps the upstream order; per-artist and per-genre expansion
//! happens in place.

use crate::error::Result;
use crate::models::{
    parse_timestamp, Album, AlbumArtistRow, AlbumRow, Artist, ArtistRow, LikedTrackRow, PlayHistory,
    RecentTrackRow, SavedTrack, NO_GENRE,
};

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// One row per (track, contributing artist).
///
/// A track without artists yields no rows.
pub fn flatten_liked(items: &[SavedTrack]) -> Result<Vec<LikedTrackRow>> {
    let mut rows = Vec::with_capacity(items.len());

    for item in items {
        let added_at = parse_timestamp(&item.added_at)?;
        let track = &item.track;

        if track.artists.is_empty() {
            tracing::debug!("Track {} has no artists; no rows emitted", track.id);
            continue;
        }

        rows.extend(track.artists.iter().map(|artist| LikedTrackRow {
            track_id: track.id.clone(),
            track_name: track.name.clone(),
            added_at,
            album_id: track.album.id.clone(),
            popularity: i64::from(track.popularity),
            preview_url: track.preview_url.clone(),
            duration_ms: to_i64(track.duration_ms),
            artist_id: artist.id.clone(),
        }));
    }

    Ok(rows)
}

/// Exactly one row per play.
pub fn flatten_recent(items: &[PlayHistory]) -> Result<Vec<RecentTrackRow>> {
    items
        .iter()
        .map(|item| {
            Ok(RecentTrackRow {
                track_id: item.track.id.clone(),
                track_name: item.track.name.clone(),
                played_at: parse_timestamp(&item.played_at)?,
            })
        })
        .collect()
}

fn genres_or_sentinel(genres: &[String]) -> Vec<String> {
    if genres.is_empty() {
        vec![NO_GENRE.to_string()]
    } else {
        genres.to_vec()
    }
}

/// Album rows (per genre) and album/artist links (per artist).
pub fn flatten_albums(albums: &[Album]) -> (Vec<AlbumRow>, Vec<AlbumArtistRow>) {
    let mut album_rows = Vec::new();
    let mut link_rows = Vec::new();

    for album in albums {
        album_rows.extend(
            genres_or_sentinel(&album.genres)
                .into_iter()
                .map(|genre| AlbumRow {
                    album_id: album.id.clone(),
                    album_name: album.name.clone(),
                    popularity: i64::from(album.popularity),
                    genre,
                }),
        );
        link_rows.extend(album.artists.iter().map(|artist| AlbumArtistRow {
            album_id: album.id.clone(),
            artist_id: artist.id.clone(),
        }));
    }

    (album_rows, link_rows)
}

/// Artist rows, one per genre.
pub fn flatten_artists(artists: &[Artist]) -> Vec<ArtistRow> {
    artists
        .iter()
        .flat_map(|artist| {
            genres_or_sentinel(&artist.genres)
                .into_iter()
                .map(move |genre| ArtistRow {
                    artist_id: artist.id.clone(),
                    artist_name: artist.name.clone(),
                    followers: to_i64(artist.followers.total),
                    popularity: i64::from(artist.popularity),
                    genre,
                })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{
        Album, AlbumRef, Artist, ArtistRef, Followers, PlayHistory, SavedTrack, Track, TrackRef,
    };

    pub fn saved_track(id: &str, added_at: &str, artists: &[&str]) -> SavedTrack {
        SavedTrack {
            added_at: added_at.to_string(),
            track: Track {
                id: id.to_string(),
                name: format!("Track {id}"),
                album: AlbumRef {
                    id: format!("album-{id}"),
                },
                artists: artists
                    .iter()
                    .map(|artist| ArtistRef {
                        id: (*artist).to_string(),
                        name: None,
                    })
                    .collect(),
                popularity: 50,
                preview_url: Some(format!("https://p.scdn.co/mp3-preview/{id}")),
                duration_ms: 180_000,
            },
        }
    }

    pub fn play(id: &str, played_at: &str) -> PlayHistory {
        PlayHistory {
            played_at: played_at.to_string(),
            track: TrackRef {
                id: id.to_string(),
                name: format!("Track {id}"),
            },
        }
    }

    pub fn album(id: &str, genres: &[&str], artists: &[&str]) -> Album {
        Album {
            id: id.to_string(),
            name: format!("Album {id}"),
            popularity: 40,
            genres: genres.iter().map(|genre| (*genre).to_string()).collect(),
            artists: artists
                .iter()
                .map(|artist| ArtistRef {
                    id: (*artist).to_string(),
                    name: None,
                })
                .collect(),
        }
    }

    pub fn artist(id: &str, genres: &[&str]) -> Artist {
        Artist {
            id: id.to_string(),
            name: format!("Artist {id}"),
            popularity: 70,
            genres: genres.iter().map(|genre| (*genre).to_string()).collect(),
            followers: Followers { total: 1_234 },
        }
    }
}
