//! Read-only analytics over stored liked songs

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::{Error, Result};

/// Sort order for popularity rankings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RankDirection {
    /// Least popular first
    Ascending,
    /// Most popular first
    #[default]
    Descending,
}

impl RankDirection {
    const fn sql_keyword(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// One ranked track inside a month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedTrack {
    pub rank: u32,
    pub track_id: String,
    pub track_name: String,
    pub popularity: i64,
    /// Unix ms of the earliest save
    pub added_at: i64,
}

/// Ranked tracks saved during one month of the requested year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyRanking {
    /// 1-12
    pub month: u32,
    pub tracks: Vec<RankedTrack>,
}

/// Queries used by the presentation commands
pub struct LibraryQueries<'a> {
    conn: &'a Connection,
}

impl<'a> LibraryQueries<'a> {
    /// Create query helpers over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Years with at least one saved track, newest first
    pub fn select_distinct_years(&self) -> Result<Vec<i32>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT CAST(strftime('%Y', added_at / 1000, 'unixepoch') AS INTEGER) AS year
             FROM liked_songs
             ORDER BY year DESC",
        )?;

        let years = stmt
            .query_map([], |row| row.get::<_, i32>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(years)
    }

    /// Per-month popularity ranking of tracks saved in `year`
    ///
    /// Tracks are collapsed across their artist rows before ranking. Ties are
    /// broken by the earliest save, then by track id. Months without saves are
    /// omitted.
    pub fn select_popularity_ranked(
        &self,
        year: i32,
        direction: RankDirection,
        limit: u32,
    ) -> Result<Vec<MonthlyRanking>> {
        if !(0..=9999).contains(&year) {
            return Err(Error::InvalidInput(format!("year out of range: {year}")));
        }

        let sql = format!(
            "WITH tracks AS (
                SELECT track_id,
                       MIN(track_name) AS track_name,
                       MAX(popularity) AS popularity,
                       MIN(added_at) AS added_at
                FROM liked_songs
                GROUP BY track_id
            ),
            dated AS (
                SELECT track_id, track_name, popularity, added_at,
                       CAST(strftime('%m', added_at / 1000, 'unixepoch') AS INTEGER) AS month
                FROM tracks
                WHERE strftime('%Y', added_at / 1000, 'unixepoch') = ?1
            ),
            ranked AS (
                SELECT month, track_id, track_name, popularity, added_at,
                       ROW_NUMBER() OVER (
                           PARTITION BY month
                           ORDER BY popularity {}, added_at ASC, track_id ASC
                       ) AS position
                FROM dated
            )
            SELECT month, position, track_id, track_name, popularity, added_at
            FROM ranked
            WHERE position <= ?2
            ORDER BY month ASC, position ASC",
            direction.sql_keyword()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![format!("{year:04}"), i64::from(limit)], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    RankedTrack {
                        rank: row.get(1)?,
                        track_id: row.get(2)?,
                        track_name: row.get(3)?,
                        popularity: row.get(4)?,
                        added_at: row.get(5)?,
                    },
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut months: Vec<MonthlyRanking> = Vec::new();
        for (month, track) in rows {
            match months.last_mut() {
                Some(current) if current.month == month => current.tracks.push(track),
                _ => months.push(MonthlyRanking {
                    month,
                    tracks: vec![track],
                }),
            }
        }

        Ok(months)
    }
}
