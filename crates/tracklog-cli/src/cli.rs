use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracklog_core::db::RankDirection;
use tracklog_core::Category;

#[derive(Parser)]
#[command(name = "tracklog")]
#[command(about = "Keep your Spotify listening history in a local SQLite store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name (one database per profile)
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch new liked songs and recent plays from Spotify
    Sync {
        /// Only sync one category (liked also syncs its artists and albums)
        #[arg(long, value_enum)]
        category: Option<SyncCategory>,
        /// Output the sync report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored rows of one category
    List {
        /// Category to list (liked, recent, album, album-artist, artist or a table name)
        #[arg(value_name = "CATEGORY")]
        category: Category,
        /// Number of rows to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Number of rows to skip
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Years with saved tracks, newest first
    Years {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Monthly popularity ranking of tracks saved in one year
    Popularity {
        /// Year to rank
        #[arg(long)]
        year: i32,
        /// Ranking order
        #[arg(long, value_enum, default_value_t = RankOrder::Desc)]
        order: RankOrder,
        /// Tracks per month
        #[arg(short, long, default_value = "5")]
        limit: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SyncCategory {
    Liked,
    Recent,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum RankOrder {
    Asc,
    Desc,
}

impl From<RankOrder> for RankDirection {
    fn from(value: RankOrder) -> Self {
        match value {
            RankOrder::Asc => Self::Ascending,
            RankOrder::Desc => Self::Descending,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Spotify application client id
        #[arg(long, value_name = "ID")]
        client_id: Option<String>,
        /// Spotify Web API base URL
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Spotify accounts token endpoint
        #[arg(long, value_name = "URL")]
        accounts_url: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved profile, endpoints and database path
    Show,
}
