//! Flat storage rows, one struct per category
//!
//! Every row type declares its column set up front. The store validates each
//! row against that declaration before a batch is written.

use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::Category;

/// Genre stored when an album or artist has none
pub const NO_GENRE: &str = "N.A";

/// Declared type of a storage column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Non-empty text identifier
    Id,
    /// Text, may be empty
    Text,
    /// Integer
    Integer,
    /// Nullable text
    OptionalText,
}

impl ColumnKind {
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Id | Self::Text => "TEXT NOT NULL",
            Self::Integer => "INTEGER NOT NULL",
            Self::OptionalText => "TEXT",
        }
    }

    /// Whether `value` is acceptable for a column of this kind
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Id, Value::Text(text)) => !text.trim().is_empty(),
            (Self::Text | Self::OptionalText, Value::Text(_))
            | (Self::Integer, Value::Integer(_))
            | (Self::OptionalText, Value::Null) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

/// A row with a fixed, declared column set.
pub trait Record: Sized {
    const CATEGORY: Category;
    const COLUMNS: &'static [Column];
    /// Identifier column used for distinct-key lookups
    const KEY: &'static str;
    /// Columns that get a secondary index
    const INDEXES: &'static [&'static str];

    /// Column values in `COLUMNS` order
    fn values(&self) -> Vec<Value>;

    /// Build a row from a `SELECT` of `COLUMNS` in declaration order
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn table() -> &'static str {
        Self::CATEGORY.table()
    }
}

/// A row whose category carries a watermark timestamp.
pub trait TimestampedRecord: Record {
    const TIMESTAMP_COLUMN: &'static str;

    /// Unix milliseconds
    fn timestamp(&self) -> i64;
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

/// One saved track per contributing artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikedTrackRow {
    pub track_id: String,
    pub track_name: String,
    /// Unix ms
    pub added_at: i64,
    pub album_id: String,
    pub popularity: i64,
    pub preview_url: Option<String>,
    pub duration_ms: i64,
    pub artist_id: String,
}

impl Record for LikedTrackRow {
    const CATEGORY: Category = Category::Liked;
    const COLUMNS: &'static [Column] = &[
        Column::new("track_id", ColumnKind::Id),
        Column::new("track_name", ColumnKind::Text),
        Column::new("added_at", ColumnKind::Integer),
        Column::new("album_id", ColumnKind::Id),
        Column::new("popularity", ColumnKind::Integer),
        Column::new("preview_url", ColumnKind::OptionalText),
        Column::new("duration_ms", ColumnKind::Integer),
        Column::new("artist_id", ColumnKind::Id),
    ];
    const KEY: &'static str = "track_id";
    const INDEXES: &'static [&'static str] = &["added_at", "track_id"];

    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.track_id),
            text(&self.track_name),
            Value::Integer(self.added_at),
            text(&self.album_id),
            Value::Integer(self.popularity),
            self.preview_url.as_deref().map_or(Value::Null, text),
            Value::Integer(self.duration_ms),
            text(&self.artist_id),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            track_id: row.get(0)?,
            track_name: row.get(1)?,
            added_at: row.get(2)?,
            album_id: row.get(3)?,
            popularity: row.get(4)?,
            preview_url: row.get(5)?,
            duration_ms: row.get(6)?,
            artist_id: row.get(7)?,
        })
    }
}

impl TimestampedRecord for LikedTrackRow {
    const TIMESTAMP_COLUMN: &'static str = "added_at";

    fn timestamp(&self) -> i64 {
        self.added_at
    }
}

/// One recently played entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentTrackRow {
    pub track_id: String,
    pub track_name: String,
    /// Unix ms
    pub played_at: i64,
}

impl Record for RecentTrackRow {
    const CATEGORY: Category = Category::Recent;
    const COLUMNS: &'static [Column] = &[
        Column::new("track_id", ColumnKind::Id),
        Column::new("track_name", ColumnKind::Text),
        Column::new("played_at", ColumnKind::Integer),
    ];
    const KEY: &'static str = "track_id";
    const INDEXES: &'static [&'static str] = &["played_at"];

    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.track_id),
            text(&self.track_name),
            Value::Integer(self.played_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            track_id: row.get(0)?,
            track_name: row.get(1)?,
            played_at: row.get(2)?,
        })
    }
}

impl TimestampedRecord for RecentTrackRow {
    const TIMESTAMP_COLUMN: &'static str = "played_at";

    fn timestamp(&self) -> i64 {
        self.played_at
    }
}

/// One album per genre, or one row with [`NO_GENRE`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRow {
    pub album_id: String,
    pub album_name: String,
    pub popularity: i64,
    pub genre: String,
}

impl Record for AlbumRow {
    const CATEGORY: Category = Category::Album;
    const COLUMNS: &'static [Column] = &[
        Column::new("album_id", ColumnKind::Id),
        Column::new("album_name", ColumnKind::Text),
        Column::new("popularity", ColumnKind::Integer),
        Column::new("genre", ColumnKind::Text),
    ];
    const KEY: &'static str = "album_id";
    const INDEXES: &'static [&'static str] = &["album_id"];

    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.album_id),
            text(&self.album_name),
            Value::Integer(self.popularity),
            text(&self.genre),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            album_id: row.get(0)?,
            album_name: row.get(1)?,
            popularity: row.get(2)?,
            genre: row.get(3)?,
        })
    }
}

/// Album to contributing artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumArtistRow {
    pub album_id: String,
    pub artist_id: String,
}

impl Record for AlbumArtistRow {
    const CATEGORY: Category = Category::AlbumArtist;
    const COLUMNS: &'static [Column] = &[
        Column::new("album_id", ColumnKind::Id),
        Column::new("artist_id", ColumnKind::Id),
    ];
    const KEY: &'static str = "album_id";
    const INDEXES: &'static [&'static str] = &["album_id", "artist_id"];

    fn values(&self) -> Vec<Value> {
        vec![text(&self.album_id), text(&self.artist_id)]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            album_id: row.get(0)?,
            artist_id: row.get(1)?,
        })
    }
}

/// One artist per genre, or one row with [`NO_GENRE`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRow {
    pub artist_id: String,
    pub artist_name: String,
    pub followers: i64,
    pub popularity: i64,
    pub genre: String,
}

impl Record for ArtistRow {
    const CATEGORY: Category = Category::Artist;
    const COLUMNS: &'static [Column] = &[
        Column::new("artist_id", ColumnKind::Id),
        Column::new("artist_name", ColumnKind::Text),
        Column::new("followers", ColumnKind::Integer),
        Column::new("popularity", ColumnKind::Integer),
        Column::new("genre", ColumnKind::Text),
    ];
    const KEY: &'static str = "artist_id";
    const INDEXES: &'static [&'static str] = &["artist_id"];

    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.artist_id),
            text(&self.artist_name),
            Value::Integer(self.followers),
            Value::Integer(self.popularity),
            text(&self.genre),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            artist_id: row.get(0)?,
            artist_name: row.get(1)?,
            followers: row.get(2)?,
            popularity: row.get(3)?,
            genre: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_values_match_columns<R: Record>(row: &R) {
        let values = row.values();
        assert_eq!(values.len(), R::COLUMNS.len());
        for (column, value) in R::COLUMNS.iter().zip(&values) {
            assert!(
                column.kind.accepts(value),
                "{}.{} rejected {value:?}",
                R::table(),
                column.name
            );
        }
    }

    #[test]
    fn declared_columns_match_values() {
        assert_values_match_columns(&LikedTrackRow {
            track_id: "t".into(),
            track_name: "n".into(),
            added_at: 1,
            album_id: "al".into(),
            popularity: 10,
            preview_url: None,
            duration_ms: 1000,
            artist_id: "ar".into(),
        });
        assert_values_match_columns(&RecentTrackRow {
            track_id: "t".into(),
            track_name: String::new(),
            played_at: 1,
        });
        assert_values_match_columns(&AlbumRow {
            album_id: "al".into(),
            album_name: "a".into(),
            popularity: 1,
            genre: NO_GENRE.into(),
        });
        assert_values_match_columns(&AlbumArtistRow {
            album_id: "al".into(),
            artist_id: "ar".into(),
        });
        assert_values_match_columns(&ArtistRow {
            artist_id: "ar".into(),
            artist_name: "x".into(),
            followers: 5,
            popularity: 1,
            genre: "rock".into(),
        });
    }

    #[test]
    fn id_columns_reject_blank_text() {
        assert!(!ColumnKind::Id.accepts(&Value::Text("  ".into())));
        assert!(!ColumnKind::Id.accepts(&Value::Null));
        assert!(ColumnKind::Text.accepts(&Value::Text(String::new())));
        assert!(ColumnKind::OptionalText.accepts(&Value::Null));
        assert!(!ColumnKind::Integer.accepts(&Value::Text("1".into())));
    }

    #[test]
    fn timestamp_columns_are_declared() {
        assert!(LikedTrackRow::COLUMNS
            .iter()
            .any(|column| column.name == LikedTrackRow::TIMESTAMP_COLUMN));
        assert!(RecentTrackRow::COLUMNS
            .iter()
            .any(|column| column.name == RecentTrackRow::TIMESTAMP_COLUMN));
    }
}
