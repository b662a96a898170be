use std::path::Path;

use tracklog_core::db::LibraryQueries;

use crate::commands::common::open_database;
use crate::error::CliError;

pub fn run_years(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let years = LibraryQueries::new(db.connection()).select_distinct_years()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&years)?);
        return Ok(());
    }

    if years.is_empty() {
        println!("No liked songs stored yet. Run `tracklog sync` first.");
        return Ok(());
    }

    for year in years {
        println!("{year}");
    }
    Ok(())
}
