//! Stage wiring for the `scrape`, `digest` and `run` commands.
//!
//! ```text
//! queries ─▶ fetch ─▶ normalize ─▶ accumulate ─▶ keywords ─▶ merge ─▶ dataset files
//!                                                                       │
//!                                         digest file ◀─ summarize ◀─ group by river
//! ```
//!
//! A scrape either completes or aborts. Nothing is checkpointed: an aborted
//! run loses its in-memory batch, and the next run relies on the title dedup
//! to skip what the dataset already holds.

use crate::api::AskAsync;
use crate::config::PipelineConfig;
use crate::dataset::{Accumulator, last_known_date, merge};
use crate::digest::build_digests;
use crate::keywords::KeywordExtractor;
use crate::models::DigestRecord;
use crate::outputs::{archive, tables};
use crate::queries::build_queries;
use crate::scrapers::semantic_scholar::{SearchClient, SearchTransport};
use chrono::NaiveDate;
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Counts reported at the end of a scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeReport {
    pub queries: usize,
    pub new_articles: usize,
    pub total_articles: usize,
}

/// Copy the current dataset files to the dated archive.
pub async fn archive_datasets(
    config: &PipelineConfig,
    today: NaiveDate,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    archive::archive_files(&config.files.archived_files(), &config.files.archive_path(), today).await
}

/// Fetch new articles, tag them with keywords and merge them into the dataset.
///
/// # Arguments
///
/// * `config` - Pipeline settings, including file locations
/// * `transport` - HTTP layer used for the searches
/// * `today` - Reference date for the fallback lower date bound
///
/// # Returns
///
/// Counts of queries sent, new articles and dataset rows after the merge.
#[instrument(level = "info", skip_all, fields(%today))]
pub async fn scrape<T: SearchTransport>(
    config: &PipelineConfig,
    transport: T,
    today: NaiveDate,
) -> Result<ScrapeReport, Box<dyn Error>> {
    let t0 = Instant::now();
    let articles_path = config.files.articles_path();

    let existing = tables::read_articles(&articles_path)?;
    if !articles_path.exists() {
        tables::write_articles(&articles_path, &[])?;
    }
    info!(count = existing.len(), "Loaded existing articles");

    let date_from = last_known_date(&existing, today, config.fallback_lookback_days);
    info!(%date_from, "Searching papers published since");

    let client = SearchClient::from_config(transport, config, Some(date_from))?;
    let queries = build_queries(&config.rivers, &config.river_qualifier, &config.term_groups);
    info!(count = queries.len(), "Built search queries");

    let mut acc = Accumulator::new(&existing, config.per_river_quota);
    for query in &queries {
        client.collect_query(query, &mut acc).await?;
    }
    if acc.is_empty() {
        info!("No new articles found");
    } else {
        info!(count = acc.len(), "Total new articles collected");
    }

    let extractor = KeywordExtractor::new(&config.vocabulary);
    for article in acc.articles_mut() {
        article.keywords = extractor.keywords_for(&article.abstract_text);
    }
    let new_articles = acc.into_articles();

    tables::write_articles(&config.files.new_articles_path(), &new_articles)?;

    let total_articles = if new_articles.is_empty() {
        existing.len()
    } else {
        let new_count = new_articles.len();
        let merged = merge(existing, new_articles.clone());
        tables::write_articles(&articles_path, &merged)?;
        info!(added = new_count, total = merged.len(), "Updated main dataset");
        merged.len()
    };

    let report = ScrapeReport {
        queries: queries.len(),
        new_articles: new_articles.len(),
        total_articles,
    };
    info!(?report, secs = t0.elapsed().as_secs(), "Scrape complete");
    Ok(report)
}

/// Summarize the last scrape's new articles per river and write the digest file.
///
/// An unreadable new-articles file is reported and treated as empty.
#[instrument(level = "info", skip_all)]
pub async fn digest<A: AskAsync>(
    config: &PipelineConfig,
    model: &A,
) -> Result<Vec<DigestRecord>, Box<dyn Error>> {
    let path = config.files.new_articles_path();
    let articles = tables::read_articles(&path).unwrap_or_else(|e| {
        warn!(error = %e, "Could not read new articles; continuing without them");
        Vec::new()
    });
    if articles.is_empty() {
        info!("No new articles to summarize");
    }

    let digests = build_digests(model, &articles, &config.rivers).await;
    tables::write_digests(&config.files.digest_path(), &digests)?;
    info!(groups = digests.len(), "Saved AI digest");
    Ok(digests)
}

/// Archive, scrape, then digest. A failed scrape stops before the digest.
pub async fn run<T: SearchTransport, A: AskAsync>(
    config: &PipelineConfig,
    transport: T,
    model: &A,
    today: NaiveDate,
    archive_first: bool,
) -> Result<(ScrapeReport, Vec<DigestRecord>), Box<dyn Error>> {
    if archive_first {
        archive_datasets(config, today).await?;
    }
    let report = scrape(config, transport, today).await?;
    let digests = digest(config, model).await?;
    Ok((report, digests))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::ScriptedAsk;
    use crate::models::Article;
    use crate::scrapers::semantic_scholar::tests::{ScriptedTransport, page};
    use std::path::Path;

    fn config(dir: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.rivers = vec!["Po".into()];
        config.term_groups = vec![];
        config.request_delay_secs = 0;
        config.rate_limit.cooldown_secs = 0;
        config.files.data_dir = dir.to_path_buf();
        config
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 10).unwrap()
    }

    fn existing(title: &str, year: i32) -> Article {
        Article {
            title: title.into(),
            authors: "Old Author".into(),
            year,
            publication_date: NaiveDate::from_ymd_opt(year, 1, 1),
            link: String::new(),
            abstract_text: String::new(),
            river: "Po".into(),
            keywords: String::new(),
            source: "Semantic Scholar".into(),
            scraped_at: None,
        }
    }

    #[tokio::test]
    async fn test_first_run_keeps_only_valid_papers() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let body = serde_json::json!({"data": [
            {"title": "Low flows on the Po", "year": 2025, "publicationDate": "2025-12-05",
             "abstract": "Drought reduced river flow across the basin."},
            {"title": "", "year": 2025},
            {"title": "Irrigation demand", "year": 2025}
        ]})
        .to_string();
        let transport = ScriptedTransport::new(vec![(200, body)]);

        let report = scrape(&config, transport, today()).await.unwrap();
        assert_eq!(report.queries, 1);
        assert_eq!(report.new_articles, 2);

        let merged = tables::read_articles(&config.files.articles_path()).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title, "Low flows on the Po");
        assert!(merged.iter().all(|a| a.river == "Po"));

        let new = tables::read_articles(&config.files.new_articles_path()).unwrap();
        assert_eq!(new.len(), 2);
    }

    #[tokio::test]
    async fn test_known_title_keeps_old_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        tables::write_articles(&config.files.articles_path(), &[existing("A", 2020)]).unwrap();

        let body = serde_json::json!({"data": [
            {"title": "A", "year": 2023},
            {"title": "B", "year": 2024}
        ]})
        .to_string();
        let transport = ScriptedTransport::new(vec![(200, body)]);

        let report = scrape(&config, transport, today()).await.unwrap();
        assert_eq!(report.new_articles, 1);
        assert_eq!(report.total_articles, 2);

        let merged = tables::read_articles(&config.files.articles_path()).unwrap();
        let titles: Vec<&str> = merged.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);
        assert_eq!(merged[1].year, 2020);
        assert_eq!(merged[1].authors, "Old Author");
    }

    #[tokio::test]
    async fn test_nothing_new_leaves_dataset_and_empties_batch_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let rows = vec![existing("A", 2020)];
        tables::write_articles(&config.files.articles_path(), &rows).unwrap();

        let transport = ScriptedTransport::new(vec![(200, page(&["A"]))]);
        let report = scrape(&config, transport, today()).await.unwrap();

        assert_eq!(report.new_articles, 0);
        assert_eq!(tables::read_articles(&config.files.articles_path()).unwrap(), rows);
        assert!(tables::read_articles(&config.files.new_articles_path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_scrape_creates_dataset_file_even_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        scrape(&config, ScriptedTransport::new(vec![]), today()).await.unwrap();
        assert!(config.files.articles_path().exists());
    }

    #[tokio::test]
    async fn test_fatal_status_aborts_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let transport = ScriptedTransport::new(vec![(500, "oops".to_string())]);

        assert!(scrape(&config, transport, today()).await.is_err());
        assert!(!config.files.new_articles_path().exists());
    }

    #[tokio::test]
    async fn test_keywords_filled_for_new_articles() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let body = serde_json::json!({"data": [
            {"title": "Basin study", "year": 2025,
             "abstract": "Severe drought lowered river flow in the Po basin. River flow recovered slowly after the drought."},
            {"title": "No abstract", "year": 2025}
        ]})
        .to_string();

        scrape(&config, ScriptedTransport::new(vec![(200, body)]), today()).await.unwrap();
        let new = tables::read_articles(&config.files.new_articles_path()).unwrap();
        assert!(!new[0].keywords.is_empty());
        assert_eq!(new[1].keywords, "");
    }

    #[tokio::test]
    async fn test_digest_with_missing_input_writes_empty_digest() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let model = ScriptedAsk::new(vec![]);

        let digests = digest(&config, &model).await.unwrap();
        assert!(digests.is_empty());
        assert!(config.files.digest_path().exists());
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_archives_scrapes_and_digests() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        tables::write_articles(&config.files.articles_path(), &[existing("A", 2020)]).unwrap();

        let body = serde_json::json!({"data": [
            {"title": "Po snowpack", "year": 2025, "abstract": "Snowpack loss drives drought."},
            {"title": "Drought indices", "year": 2025}
        ]})
        .to_string();
        let transport = ScriptedTransport::new(vec![(200, body)]);
        let model = ScriptedAsk::new(vec![Ok("The Po saw new drought work.")]);

        let (report, digests) = run(&config, transport, &model, today(), true).await.unwrap();
        assert_eq!(report.new_articles, 2);
        assert_eq!(digests.len(), 1);
        assert_eq!(digests[0].river, "Po");
        assert_eq!(digests[0].summary, "The Po saw new drought work.");

        let archived = config
            .files
            .archive_path()
            .join("2025-12-10_semantic_scholar_results.csv");
        assert_eq!(tables::read_articles(&archived).unwrap().len(), 1);
        assert_eq!(tables::read_digests(&config.files.digest_path()).unwrap(), digests);
    }
}
