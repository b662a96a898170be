use std::path::Path;

use tracklog_core::db::{LibraryQueries, RankDirection};

use crate::commands::common::{format_popularity_lines, open_database, PopularityReportItem};
use crate::error::CliError;

pub fn run_popularity(
    year: i32,
    direction: RankDirection,
    limit: u32,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let months =
        LibraryQueries::new(db.connection()).select_popularity_ranked(year, direction, limit)?;

    if as_json {
        let item = PopularityReportItem {
            year,
            order: match direction {
                RankDirection::Ascending => "asc",
                RankDirection::Descending => "desc",
            },
            months: &months,
        };
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    if months.is_empty() {
        println!("No liked songs saved in {year}.");
        return Ok(());
    }

    for line in format_popularity_lines(year, &months) {
        println!("{line}");
    }
    Ok(())
}
