//! # River Digest
//!
//! A collection pipeline for scientific articles about Italian river basins.
//! It searches a paper index for drought and water-scarcity research, keeps a
//! growing deduplicated dataset, tags each article with topical keywords and
//! writes a short AI digest per river.
//!
//! ## Features
//!
//! - Builds one search per monitored river plus topic-only searches
//! - Pages through Semantic Scholar under its free-tier rate limit
//! - Deduplicates by title against everything collected so far
//! - Extracts domain keywords from abstracts without a model
//! - Summarizes new articles per river through a local Ollama model
//!
//! ## Usage
//!
//! ```sh
//! river_digest --data-dir ./data run
//! ```
//!
//! ## Architecture
//!
//! The application runs strictly sequentially:
//! 1. **Archive**: Copy the current CSV files to a dated backup
//! 2. **Scrape**: Query, fetch, normalize, deduplicate, tag keywords, merge
//! 3. **Digest**: Group the new articles by river and summarize each group

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod dataset;
mod digest;
mod keywords;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod queries;
mod scrapers;
mod utils;

use api::OllamaAsk;
use cli::{Cli, Command};
use config::PipelineConfig;
use scrapers::semantic_scholar::ReqwestTransport;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("river_digest starting up");

    let args = Cli::parse();
    let command = args.command();
    debug!(?command, config = ?args.config, "Parsed CLI arguments");

    let config = PipelineConfig::load(args.config.as_deref(), args.overrides())?;

    if command == Command::Queries {
        let queries = queries::build_queries(&config.rivers, &config.river_qualifier, &config.term_groups);
        for q in &queries {
            println!("{}\t{}", q.river.as_deref().unwrap_or("-"), q.query);
        }
        return Ok(());
    }

    // Early check: the dataset files must be writable before any slow work starts
    if let Err(e) = ensure_writable_dir(&config.files.data_dir).await {
        error!(
            path = %config.files.data_dir.display(),
            error = %e,
            "Data directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let today = Local::now().date_naive();
    match command {
        Command::Run { no_archive } => {
            let model = OllamaAsk::from_config(&config.llm)?;
            let transport = ReqwestTransport::new(config.api_key.clone());
            let (report, digests) =
                pipeline::run(&config, transport, &model, today, !no_archive).await?;
            info!(
                new_articles = report.new_articles,
                total_articles = report.total_articles,
                digests = digests.len(),
                "Weekly update completed"
            );
        }
        Command::Scrape { no_archive } => {
            if !no_archive {
                pipeline::archive_datasets(&config, today).await?;
            }
            let transport = ReqwestTransport::new(config.api_key.clone());
            pipeline::scrape(&config, transport, today).await?;
        }
        Command::Digest => {
            let model = OllamaAsk::from_config(&config.llm)?;
            pipeline::digest(&config, &model).await?;
        }
        Command::Queries => {}
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
