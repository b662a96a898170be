use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracklog_core::config::{SpotifyCredentials, ENV_CLIENT_ID};
use tracklog_core::db::{Database, MonthlyRanking};
use tracklog_core::models::{AlbumArtistRow, AlbumRow, ArtistRow, LikedTrackRow, RecentTrackRow};
use tracklog_core::sync::SyncReport;

use crate::config_profiles::{normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub const ENV_DB_PATH: &str = "TRACKLOG_DB_PATH";

/// Profile and database selected for one invocation
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub profile_name: String,
    pub profile: CliProfile,
    pub db_path: PathBuf,
}

pub fn load_context(
    config_path: &Path,
    explicit_profile: Option<&str>,
    cli_db_path: Option<PathBuf>,
) -> Result<CommandContext, CliError> {
    let config = CliProfilesConfig::load_from_path(config_path).map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(explicit_profile);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();
    let db_path = resolve_db_path(cli_db_path, &profile_name)?;

    Ok(CommandContext {
        profile_name,
        profile,
        db_path,
    })
}

pub fn resolve_db_path(
    cli_db_path: Option<PathBuf>,
    profile_name: &str,
) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path {
        return Ok(path);
    }
    if let Some(path) = env::var_os(ENV_DB_PATH) {
        return Ok(PathBuf::from(path));
    }
    default_db_path(profile_name)
}

pub fn default_db_path(profile_name: &str) -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("tracklog").join(format!("{profile_name}.db")))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn open_database(path: &Path) -> Result<Database, CliError> {
    Ok(Database::open(path)?)
}

/// Credentials from `lookup`, with the profile's client id as fallback
pub fn resolve_credentials(
    lookup: impl Fn(&str) -> Option<String>,
    profile: &CliProfile,
) -> Result<SpotifyCredentials, CliError> {
    SpotifyCredentials::from_lookup(|key| {
        normalize_text_option(lookup(key)).or_else(|| {
            if key == ENV_CLIENT_ID {
                profile.spotify_client_id.clone()
            } else {
                None
            }
        })
    })
    .map_err(|error| CliError::Auth(error.to_string()))
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_liked_line(row: &LikedTrackRow) -> String {
    format!(
        "{}  {:<22}  {:>3}  {}  artist={}",
        format_timestamp(row.added_at),
        row.track_id,
        row.popularity,
        row.track_name,
        row.artist_id
    )
}

pub fn format_recent_line(row: &RecentTrackRow) -> String {
    format!(
        "{}  {:<22}  {}",
        format_timestamp(row.played_at),
        row.track_id,
        row.track_name
    )
}

pub fn format_album_line(row: &AlbumRow) -> String {
    format!(
        "{:<22}  {:>3}  {:<20}  {}",
        row.album_id, row.popularity, row.genre, row.album_name
    )
}

pub fn format_album_artist_line(row: &AlbumArtistRow) -> String {
    format!("{:<22}  {}", row.album_id, row.artist_id)
}

pub fn format_artist_line(row: &ArtistRow) -> String {
    format!(
        "{:<22}  {:>3}  {:>10}  {:<20}  {}",
        row.artist_id, row.popularity, row.followers, row.genre, row.artist_name
    )
}

pub fn format_sync_report_lines(report: &SyncReport) -> Vec<String> {
    report
        .categories
        .iter()
        .map(|category| {
            let watermark = category
                .watermark
                .map_or_else(|| "-".to_string(), format_timestamp);
            format!(
                "{:<13} fetched={:<5} rows={:<5} new={:<5} watermark={}",
                category.category,
                category.fetched,
                category.flattened,
                category.appended,
                watermark
            )
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct PopularityReportItem<'a> {
    pub year: i32,
    pub order: &'static str,
    pub months: &'a [MonthlyRanking],
}

pub fn format_popularity_lines(year: i32, months: &[MonthlyRanking]) -> Vec<String> {
    let mut lines = Vec::new();
    for month in months {
        lines.push(format!("{year}-{:02}", month.month));
        lines.extend(month.tracks.iter().map(|track| {
            format!(
                "  {:>2}. [{:>3}] {}  ({})",
                track.rank, track.popularity, track.track_name, track.track_id
            )
        }));
    }
    lines
}

pub fn format_page_footer(offset: usize, shown: usize, total: usize) -> String {
    if shown == 0 {
        format!("No rows at offset {offset} ({total} stored)")
    } else {
        format!("Showing {}-{} of {}", offset + 1, offset + shown, total)
    }
}
