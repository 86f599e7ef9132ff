//! Command-line interface definitions for River Digest.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. Options that change where data lives or which services are used
//! can also be given through environment variables.

use crate::config::Overrides;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the River Digest application.
///
/// # Examples
///
/// ```sh
/// # Weekly job: archive, scrape, digest
/// river_digest --data-dir ./data
///
/// # Only regenerate the digest with another model
/// river_digest digest --model llama3.1
///
/// # Inspect the search queries without sending them
/// river_digest queries
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the dataset files
    #[arg(short, long, env = "RIVER_DIGEST_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the Ollama server
    #[arg(long, env = "OLLAMA_URL", global = true)]
    pub ollama_url: Option<String>,

    /// Model used for the digests
    #[arg(long, env = "OLLAMA_MODEL", global = true)]
    pub model: Option<String>,

    /// Semantic Scholar API key
    #[arg(long, env = "SEMANTIC_SCHOLAR_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Seconds to wait before every search request
    #[arg(long, global = true)]
    pub request_delay_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Archive, scrape new articles, then write the AI digest (default)
    Run {
        /// Skip the dated backup of the dataset files
        #[arg(long)]
        no_archive: bool,
    },
    /// Archive, then fetch new articles into the dataset
    Scrape {
        /// Skip the dated backup of the dataset files
        #[arg(long)]
        no_archive: bool,
    },
    /// Summarize the last scrape's new articles per river
    Digest,
    /// Print the search queries that a scrape would send
    Queries,
}

impl Cli {
    /// The subcommand to run, `run` when none was given.
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Run { no_archive: false })
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            data_dir: self.data_dir.clone(),
            ollama_url: self.ollama_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            request_delay_secs: self.request_delay_secs,
        }
    }
}
