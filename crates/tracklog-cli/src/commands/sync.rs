use std::env;
use std::path::Path;

use tracklog_core::config::SpotifyEndpoints;
use tracklog_core::db::SqliteCategoryStore;
use tracklog_core::spotify::{resolve_access_token, MusicApi, SpotifyClient};
use tracklog_core::sync::{SyncEngine, SyncReport};

use crate::cli::SyncCategory;
use crate::commands::common::{
    format_sync_report_lines, open_database, resolve_credentials, CommandContext,
};
use crate::error::CliError;

pub async fn run_sync(
    category: Option<SyncCategory>,
    as_json: bool,
    context: &CommandContext,
) -> Result<(), CliError> {
    let credentials = resolve_credentials(|key| env::var(key).ok(), &context.profile)?;
    let endpoints = SpotifyEndpoints::resolve(
        context.profile.api_base_url.clone(),
        context.profile.accounts_url.clone(),
    )?;
    let token = resolve_access_token(&credentials, &endpoints)
        .await
        .map_err(|error| CliError::Auth(error.to_string()))?;
    let client = SpotifyClient::new(&endpoints.api_base_url, token)?;

    let report = sync_with_api(&client, &context.profile_name, category, &context.db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_sync_report_lines(&report) {
            println!("{line}");
        }
        println!("Sync completed: {} new rows", report.total_appended());
    }
    Ok(())
}

pub async fn sync_with_api<A: MusicApi>(
    api: &A,
    user: &str,
    category: Option<SyncCategory>,
    db_path: &Path,
) -> Result<SyncReport, CliError> {
    let db = open_database(db_path)?;
    let engine = SyncEngine::new(user, SqliteCategoryStore::new(db.connection()), api);

    let report = match category {
        None => engine.sync_all().await?,
        Some(SyncCategory::Liked) => engine.sync_liked().await?,
        Some(SyncCategory::Recent) => SyncReport {
            categories: vec![engine.sync_recent().await?],
        },
    };
    Ok(report)
}
