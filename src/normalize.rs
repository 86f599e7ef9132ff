//! Mapping raw search results onto [`Article`] rows.

use crate::models::{Article, RawPaper};
use chrono::{NaiveDate, NaiveDateTime};
use itertools::Itertools;
use tracing::debug;

/// Normalize one raw paper, or `None` when it has no title or no year.
///
/// The title is trimmed, authors are joined into one display string, line
/// breaks in the abstract become spaces and a missing publication date
/// becomes the first of January of `year`.
pub fn normalize(
    paper: &RawPaper,
    river: Option<&str>,
    source: &str,
    scraped_at: NaiveDateTime,
) -> Option<Article> {
    let title = paper.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        debug!("Skipping paper without title");
        return None;
    }
    let Some(year) = paper.year.filter(|y| *y > 0) else {
        debug!(title, "Skipping paper without year");
        return None;
    };

    let authors = paper
        .authors
        .iter()
        .flatten()
        .filter_map(|a| a.name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .join(", ");

    let abstract_text = paper
        .abstractText
        .as_deref()
        .unwrap_or_default()
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string();

    let publication_date = paper
        .publicationDate
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        .or_else(|| NaiveDate::from_ymd_opt(year, 1, 1));

    Some(Article {
        title: title.to_string(),
        authors,
        year,
        publication_date,
        link: paper.url.clone().unwrap_or_default(),
        abstract_text,
        river: river.unwrap_or_default().to_string(),
        keywords: String::new(),
        source: source.to_string(),
        scraped_at: Some(scraped_at),
    })
}
