//! Pipeline configuration.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! the overrides taken from CLI flags and environment variables (see
//! [`crate::cli`]). Every YAML field is optional so a config file only needs
//! to name what it changes.
//!
//! ```yaml
//! rivers: [Po, Adige]
//! request_delay_secs: 5
//! rate_limit:
//!   cooldown_secs: 60
//!   max_retries: ~        # retry forever
//! llm:
//!   model: llama3.1
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How the fetcher reacts to a rate-limit response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Fixed wait before retrying the same request.
    pub cooldown_secs: u64,
    /// Maximum retries of one request; `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 62,
            max_retries: Some(20),
        }
    }
}

/// Text-generation settings for the local Ollama server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub url: String,
    pub model: String,
    pub temperature: f32,
    pub context_window: u64,
    pub max_tokens: i32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.2,
            context_window: 5000,
            max_tokens: 350,
        }
    }
}

/// Location of the dataset files, relative to `data_dir`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub data_dir: PathBuf,
    pub articles: String,
    pub new_articles: String,
    pub digest: String,
    pub archive_dir: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            articles: "semantic_scholar_results.csv".to_string(),
            new_articles: "new_articles_digest.csv".to_string(),
            digest: "new_articles_digest_ai.csv".to_string(),
            archive_dir: "archive".to_string(),
        }
    }
}

impl FilesConfig {
    pub fn articles_path(&self) -> PathBuf {
        self.data_dir.join(&self.articles)
    }

    pub fn new_articles_path(&self) -> PathBuf {
        self.data_dir.join(&self.new_articles)
    }

    pub fn digest_path(&self) -> PathBuf {
        self.data_dir.join(&self.digest)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join(&self.archive_dir)
    }

    /// The files copied to the archive before each run.
    pub fn archived_files(&self) -> [PathBuf; 3] {
        [
            self.articles_path(),
            self.new_articles_path(),
            self.digest_path(),
        ]
    }
}

/// Everything the scrape and digest stages need.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// The known-river set, in display order.
    pub rivers: Vec<String>,
    /// Appended to each river name to form its query.
    pub river_qualifier: String,
    /// Topic-only queries, each group joined with `" AND "`.
    pub term_groups: Vec<Vec<String>>,
    /// A keyword phrase survives only if it contains one of these terms.
    pub vocabulary: Vec<String>,
    pub endpoint: String,
    pub fields: String,
    /// Fields-of-study filter sent with every search, empty to omit.
    pub fields_of_study: Vec<String>,
    pub page_size: u32,
    /// Sent as `x-api-key` when set.
    pub api_key: Option<String>,
    /// Wait before every search request.
    pub request_delay_secs: u64,
    pub rate_limit: RateLimitConfig,
    /// Cap on new articles per river in one run; `None` leaves it open.
    pub per_river_quota: Option<usize>,
    /// Lower date bound used when the dataset holds no dates yet.
    pub fallback_lookback_days: i64,
    pub source_tag: String,
    pub llm: LlmConfig,
    pub files: FilesConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let groups: [&[&str]; 7] = [
            &["drought", "Italy", "water scarcity"],
            &["aridity", "Italy"],
            &["SPI", "Italy"],
            &["SPEI", "Italy"],
            &["PDSI", "Italy"],
            &["temperature anomaly", "Italy"],
            &["hydrological index", "Italy"],
        ];
        Self {
            rivers: to_strings(&["Po", "Sarca", "Chiese", "Adige", "Noce", "Brenta", "Avisio"]),
            river_qualifier: "River AND drought AND Italy".to_string(),
            term_groups: groups.iter().map(|g| to_strings(g)).collect(),
            vocabulary: to_strings(&[
                "drought",
                "water",
                "river",
                "basin",
                "irrigation",
                "scarcity",
                "flow",
                "hydrology",
            ]),
            endpoint: "https://api.semanticscholar.org/graph/v1/paper/search".to_string(),
            fields: "title,authors,year,publicationDate,url,abstract,fieldsOfStudy".to_string(),
            fields_of_study: to_strings(&[
                "Environmental Science",
                "Agricultural and Food Sciences",
                "Geography",
                "Geology",
                "Engineering",
                "Physics",
                "Computer Science",
            ]),
            page_size: 100,
            api_key: None,
            request_delay_secs: 62,
            rate_limit: RateLimitConfig::default(),
            per_river_quota: None,
            fallback_lookback_days: 7,
            source_tag: "Semantic Scholar".to_string(),
            llm: LlmConfig::default(),
            files: FilesConfig::default(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Values taken from the command line or environment, applied last.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub ollama_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_delay_secs: Option<u64>,
}

impl PipelineConfig {
    /// Parse a YAML document on top of the defaults.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load defaults, the optional YAML file, then the overrides, and validate.
    #[instrument(level = "info", skip_all, fields(path = ?path))]
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                    path: p.to_path_buf(),
                    source,
                })?;
                info!("Loaded configuration file");
                Self::from_yaml(&text)?
            }
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        debug!(?config, "Effective configuration");
        Ok(config)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(dir) = overrides.data_dir {
            self.files.data_dir = dir;
        }
        if let Some(url) = overrides.ollama_url {
            self.llm.url = url;
        }
        if let Some(model) = overrides.model {
            self.llm.model = model;
        }
        if overrides.api_key.is_some() {
            self.api_key = overrides.api_key;
        }
        if let Some(delay) = overrides.request_delay_secs {
            self.request_delay_secs = delay;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rivers.iter().all(|r| r.trim().is_empty()) {
            return Err(ConfigError::Invalid("at least one river is required".into()));
        }
        if self.vocabulary.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid("keyword vocabulary is empty".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} outside 0..=2",
                self.llm.temperature
            )));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".into()));
        }
        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_secs(self.request_delay_secs)
    }
}
