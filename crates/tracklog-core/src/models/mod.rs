//! Data models for tracklog

mod category;
mod rows;
mod upstream;

pub use category::Category;
pub use rows::{
    AlbumArtistRow, AlbumRow, ArtistRow, Column, ColumnKind, LikedTrackRow, RecentTrackRow, Record,
    TimestampedRecord, NO_GENRE,
};
pub use upstream::{
    parse_timestamp, Album, AlbumRef, Artist, ArtistRef, Followers, Paging, PlayHistory, SavedTrack,
    Track, TrackRef,
};
