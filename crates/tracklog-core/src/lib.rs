//! tracklog-core - Core library for tracklog
//!
//! This crate contains the upstream payload models, the record flattener,
//! the SQLite watermark store and the incremental sync engine used by the
//! `tracklog` CLI.

pub mod config;
pub mod db;
pub mod error;
pub mod flatten;
pub mod models;
pub mod spotify;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::Category;
