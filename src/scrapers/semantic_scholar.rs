//! Semantic Scholar paper search.
//!
//! This module pages through the
//! [Graph API search endpoint](https://api.semanticscholar.org/api-docs/graph)
//! one request at a time. The free tier is rate limited, so every request is
//! preceded by a fixed delay, and a `429` answer parks the run for a fixed
//! cooldown before the same request is sent again.
//!
//! # Status Handling
//!
//! | Status | Meaning | Outcome |
//! |--------|---------|---------|
//! | 2xx | Page of results | Parsed `data` array |
//! | 429 | Rate limited | Wait `cooldown`, retry (bounded by [`RateLimitPolicy::max_retries`]) |
//! | 400 | Offset past the last result, bad parameters | Empty page |
//! | other | Anything else | [`FetchError::Http`], fatal |

use crate::config::PipelineConfig;
use crate::dataset::{Accumulator, Rejected};
use crate::models::{RawPaper, SearchQuery, SearchResponse};
use crate::normalize::normalize;
use crate::utils::truncate_for_log;
use chrono::{Local, NaiveDate};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Failures that abort a scrape.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("search endpoint answered {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed search response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("still rate limited after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },
    #[error("invalid search endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Status code and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Trait for issuing a single GET request.
///
/// This abstraction separates status handling and pagination from the HTTP
/// client, so both can be exercised against scripted replies.
pub trait SearchTransport {
    /// Send a GET request to `url` and return the raw reply.
    async fn get(&self, url: &Url) -> Result<HttpReply, FetchError>;
}

/// [`SearchTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl ReqwestTransport {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

impl SearchTransport for ReqwestTransport {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &Url) -> Result<HttpReply, FetchError> {
        let t0 = Instant::now();
        let mut request = self.client.get(url.clone());
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(
            status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u128,
            "Search request finished"
        );
        Ok(HttpReply { status, body })
    }
}

/// Reaction to a rate-limit answer: wait `cooldown`, then resend.
///
/// The cooldown never grows. `max_retries: None` resends forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub cooldown: Duration,
    pub max_retries: Option<u32>,
}

impl RateLimitPolicy {
    fn exhausted(&self, attempt: u32) -> bool {
        matches!(self.max_retries, Some(max) if attempt > max)
    }
}

/// Paginated, rate-limited search against one endpoint.
#[derive(Debug)]
pub struct SearchClient<T> {
    transport: T,
    endpoint: Url,
    fields: String,
    fields_of_study: String,
    page_size: u32,
    date_from: Option<NaiveDate>,
    request_delay: Duration,
    rate_limit: RateLimitPolicy,
    source: String,
}

impl<T: SearchTransport> SearchClient<T> {
    /// Build a client from the pipeline configuration.
    ///
    /// `date_from` becomes the lower bound of the publication date filter.
    pub fn from_config(
        transport: T,
        config: &PipelineConfig,
        date_from: Option<NaiveDate>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            transport,
            endpoint: Url::parse(&config.endpoint)?,
            fields: config.fields.clone(),
            fields_of_study: config.fields_of_study.join(","),
            page_size: config.page_size,
            date_from,
            request_delay: config.request_delay(),
            rate_limit: RateLimitPolicy {
                cooldown: Duration::from_secs(config.rate_limit.cooldown_secs),
                max_retries: config.rate_limit.max_retries,
            },
            source: config.source_tag.clone(),
        })
    }

    /// URL of one page of results for `query`.
    pub fn request_url(&self, query: &str, offset: usize) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("query", query)
                .append_pair("fields", &self.fields)
                .append_pair("offset", &offset.to_string())
                .append_pair("limit", &self.page_size.to_string());
            if let Some(date) = self.date_from {
                pairs.append_pair("publicationDateOrYear", &format!("{}:", date.format("%Y-%m-%d")));
            }
            if !self.fields_of_study.is_empty() {
                pairs.append_pair("fieldsOfStudy", &self.fields_of_study);
            }
        }
        url
    }

    /// Fetch one page. An empty page means there is nothing more to read.
    ///
    /// # Arguments
    ///
    /// * `query` - Search string, sent as-is
    /// * `offset` - Index of the first result of the page
    ///
    /// # Returns
    ///
    /// The raw papers of the page, or an empty vector on `400`.
    ///
    /// # Errors
    ///
    /// [`FetchError::RateLimitExhausted`] when the retry budget runs out,
    /// [`FetchError::Http`] for any other non-success status, and
    /// [`FetchError::Decode`] when a success body is not a search response.
    #[instrument(level = "info", skip_all, fields(%query, offset))]
    pub async fn fetch_batch(&self, query: &str, offset: usize) -> Result<Vec<RawPaper>, FetchError> {
        let url = self.request_url(query, offset);
        let mut attempt = 0u32;

        loop {
            let reply = self.transport.get(&url).await?;
            match reply.status {
                200..=299 => {
                    let parsed: SearchResponse = serde_json::from_str(&reply.body)?;
                    debug!(
                        count = parsed.data.len(),
                        total = ?parsed.total,
                        next = ?parsed.next,
                        "Received page"
                    );
                    return Ok(parsed.data);
                }
                429 => {
                    attempt += 1;
                    if self.rate_limit.exhausted(attempt) {
                        error!(
                            attempt,
                            max = ?self.rate_limit.max_retries,
                            "Rate limit retries exhausted"
                        );
                        return Err(FetchError::RateLimitExhausted { attempts: attempt });
                    }
                    warn!(
                        attempt,
                        cooldown = ?self.rate_limit.cooldown,
                        "429 Too Many Requests; waiting before retry"
                    );
                    sleep(self.rate_limit.cooldown).await;
                }
                400 => {
                    debug!(body = %truncate_for_log(&reply.body, 200), "400 Bad Request; treating as end of results");
                    return Ok(Vec::new());
                }
                status => {
                    error!(status, body = %truncate_for_log(&reply.body, 300), "Search request failed");
                    return Err(FetchError::Http {
                        status,
                        body: truncate_for_log(&reply.body, 300),
                    });
                }
            }
        }
    }

    /// Page through `query`, pushing new articles into `acc`.
    ///
    /// Stops at the first empty page or the first page that adds nothing
    /// new. Every request, the first included, waits the request delay.
    ///
    /// # Arguments
    ///
    /// * `query` - The query and the river its results are tagged with
    /// * `acc` - The run's accumulator, seeded with the known titles
    ///
    /// # Returns
    ///
    /// How many articles this query contributed. On error, articles pushed
    /// before the failure stay in `acc`.
    #[instrument(level = "info", skip_all, fields(query = %query.query, river = ?query.river))]
    pub async fn collect_query(
        &self,
        query: &SearchQuery,
        acc: &mut Accumulator,
    ) -> Result<usize, FetchError> {
        let mut offset = 0usize;
        let mut added = 0usize;

        loop {
            debug!(delay = ?self.request_delay, "Waiting before request");
            sleep(self.request_delay).await;

            let papers = self.fetch_batch(&query.query, offset).await?;
            if papers.is_empty() {
                info!("No more papers found for this query");
                break;
            }

            let scraped_at = Local::now().naive_local();
            let mut new_count = 0usize;
            for paper in &papers {
                let Some(article) = normalize(paper, query.river.as_deref(), &self.source, scraped_at)
                else {
                    continue;
                };
                let title = article.title.clone();
                match acc.push(article) {
                    Ok(()) => {
                        new_count += 1;
                        info!(%title, fields_of_study = ?paper.fieldsOfStudy, "New article");
                    }
                    Err(Rejected::Duplicate) => debug!(%title, "Already known"),
                    Err(Rejected::QuotaReached) => debug!(%title, "River quota reached"),
                }
            }

            added += new_count;
            if new_count == 0 {
                info!("No new articles in this batch; moving to next query");
                break;
            }
            offset += papers.len();
        }

        info!(added, total = acc.len(), "Finished query");
        Ok(added)
    }
}
