//! Data models for scraped papers, stored articles and river digests.
//!
//! This module defines the core data structures used throughout the application:
//! - [`SearchQuery`]: One search to run against the paper index, optionally tied to a river
//! - [`SearchResponse`] / [`RawPaper`]: The search API payload, as loosely typed as it arrives
//! - [`Article`]: A normalized row of the persisted article dataset
//! - [`DigestRecord`]: One generated summary per river group
//!
//! The raw API types use camelCase field names to match the JSON returned by
//! the search endpoint, hence the `#[allow(non_snake_case)]` attributes.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Label of the synthetic group holding articles without a known river.
pub const OTHERS: &str = "Others";

/// A single search to issue against the paper index.
///
/// River queries carry the river name as a tag so that every paper they
/// return is filed under that river. Topic queries carry no tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// The query string sent verbatim to the search endpoint.
    pub query: String,
    /// River label attached to every result of this query.
    pub river: Option<String>,
}

/// Top-level body of a paper search response.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    /// Total number of hits reported by the index.
    #[serde(default)]
    pub total: Option<u64>,
    /// Offset of the next page, absent on the last page.
    #[serde(default)]
    pub next: Option<u64>,
    /// The papers on this page.
    #[serde(default)]
    pub data: Vec<RawPaper>,
}

/// A paper exactly as returned by the search API.
///
/// Every field is optional: the index regularly omits years, dates and
/// abstracts. Validation happens in [`crate::normalize`].
#[allow(non_snake_case)]
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawPaper {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<Vec<RawAuthor>>,
    pub year: Option<i32>,
    pub publicationDate: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "abstract")]
    pub abstractText: Option<String>,
    pub fieldsOfStudy: Option<Vec<String>>,
}

/// One author entry of a [`RawPaper`].
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawAuthor {
    pub name: Option<String>,
}

/// A normalized article, one row of the persisted dataset.
///
/// The title is the dedup key: no two rows of the dataset share one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    /// Author names joined with `", "`.
    #[serde(default)]
    pub authors: String,
    pub year: i32,
    /// Exact publication date when the index knows it.
    #[serde(rename = "publicationDate", default)]
    pub publication_date: Option<NaiveDate>,
    #[serde(default)]
    pub link: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    /// River label, empty when the article is not tied to a river.
    #[serde(default)]
    pub river: String,
    /// Keyword phrases separated by `", "` (older rows may use `";"`).
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub scraped_at: Option<NaiveDateTime>,
}

impl Article {
    /// Publication date, falling back to the first of January of `year`.
    pub fn published_on(&self) -> NaiveDate {
        self.publication_date
            .or_else(|| NaiveDate::from_ymd_opt(self.year, 1, 1))
            .unwrap_or_default()
    }

    /// Split the stored keyword string into trimmed, non-empty phrases.
    ///
    /// Both `;` and `,` are accepted as separators since both appear in
    /// stored datasets.
    pub fn keyword_list(&self) -> Vec<String> {
        self.keywords
            .split([';', ','])
            .map(str::trim)
            .filter(|kw| !kw.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// A generated digest for one river group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestRecord {
    /// River label, or [`OTHERS`].
    pub river: String,
    /// Generated text, empty when generation failed.
    #[serde(default)]
    pub summary: String,
    /// Aggregated keywords, sorted, deduplicated and joined with `";"`.
    #[serde(default)]
    pub keywords: String,
}
