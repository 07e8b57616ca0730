use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "notebox", about = "Durable notes with ranked full-text search")]
pub struct Cli {
    /// Directory holding the note log and index snapshot
    #[arg(long, global = true, env = "NOTEBOX_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Write rolling logs to this absolute directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Log level when --log-dir is set (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a note; reads stdin when no text is given
    Add {
        /// Note text
        content: Option<String>,
    },
    /// Ranked search over stored notes
    Search {
        /// Free-text query
        query: String,
        /// Maximum number of results (0 uses the default)
        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },
    /// Print one note by id
    Get { id: u64 },
    /// List notes, newest first
    List {
        #[arg(short = 'n', long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Rebuild the search index from the note log
    Rebuild,
    /// Show store and index statistics
    Status,
}
