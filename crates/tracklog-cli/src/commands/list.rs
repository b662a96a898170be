use std::path::Path;

use serde::Serialize;
use tracklog_core::db::{CategoryStore, SqliteCategoryStore};
use tracklog_core::models::{
    AlbumArtistRow, AlbumRow, ArtistRow, LikedTrackRow, RecentTrackRow, Record,
};
use tracklog_core::Category;

use crate::commands::common::{
    format_album_artist_line, format_album_line, format_artist_line, format_liked_line,
    format_page_footer, format_recent_line, open_database,
};
use crate::error::CliError;

pub fn run_list(
    category: Category,
    limit: usize,
    offset: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let lines = list_lines(category, limit, offset, as_json, db_path)?;
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// Rendered output of one page, either JSON or text rows plus a footer
pub fn list_lines(
    category: Category,
    limit: usize,
    offset: usize,
    json: bool,
    db_path: &Path,
) -> Result<Vec<String>, CliError> {
    let db = open_database(db_path)?;
    let store = SqliteCategoryStore::new(db.connection());

    match category {
        Category::Liked => render_page(&store, limit, offset, json, format_liked_line),
        Category::Recent => render_page(&store, limit, offset, json, format_recent_line),
        Category::Album => render_page(&store, limit, offset, json, format_album_line),
        Category::AlbumArtist => render_page(&store, limit, offset, json, format_album_artist_line),
        Category::Artist => render_page(&store, limit, offset, json, format_artist_line),
    }
}

fn render_page<R: Record + Serialize>(
    store: &SqliteCategoryStore<'_>,
    limit: usize,
    offset: usize,
    json: bool,
    format_line: fn(&R) -> String,
) -> Result<Vec<String>, CliError> {
    let rows = store.select_page::<R>(offset, limit)?;

    if json {
        return Ok(vec![serde_json::to_string_pretty(&rows)?]);
    }

    let total = store.count::<R>()?;
    let mut lines = rows.iter().map(format_line).collect::<Vec<_>>();
    lines.push(format_page_footer(offset, rows.len(), total));
    Ok(lines)
}
