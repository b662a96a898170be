//! Database layer for tracklog

mod connection;
mod queries;
mod schema;
mod store;

pub use connection::Database;
pub use queries::{LibraryQueries, MonthlyRanking, RankDirection, RankedTrack};
pub use store::{CategoryStore, SqliteCategoryStore};
