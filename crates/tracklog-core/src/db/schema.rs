//! Table DDL derived from the declared row columns
//!
//! Every statement is `IF NOT EXISTS`, so creating a table is safe on every
//! sync. There is no versioning: the column sets are fixed.

use rusqlite::Connection;

use crate::error::Result;
use crate::models::{AlbumArtistRow, AlbumRow, ArtistRow, LikedTrackRow, RecentTrackRow, Record};

fn create_table_sql<R: Record>() -> String {
    let columns = R::COLUMNS
        .iter()
        .map(|column| format!("{} {}", column.name, column.kind.sql_type()))
        .collect::<Vec<_>>()
        .join(",\n            ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n            {columns}\n        )",
        R::table()
    )
}

fn create_index_sql<R: Record>(column: &str) -> String {
    let table = R::table();
    format!("CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table}({column})")
}

/// Create one category table and its indexes in a single transaction
pub(crate) fn ensure_table<R: Record>(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(&create_table_sql::<R>(), ())?;
    for column in R::INDEXES {
        tx.execute(&create_index_sql::<R>(column), ())?;
    }
    tx.commit()?;
    Ok(())
}

/// Create every category table
pub(crate) fn ensure_all(conn: &Connection) -> Result<()> {
    ensure_table::<LikedTrackRow>(conn)?;
    ensure_table::<RecentTrackRow>(conn)?;
    ensure_table::<AlbumRow>(conn)?;
    ensure_table::<AlbumArtistRow>(conn)?;
    ensure_table::<ArtistRow>(conn)?;
    Ok(())
}
