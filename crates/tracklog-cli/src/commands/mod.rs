pub mod common;
pub mod config;
pub mod list;
pub mod popularity;
pub mod sync;
pub mod years;
