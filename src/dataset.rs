//! Deduplication and merging of the article dataset.
//!
//! The title is the dedup key. Records already in the dataset always win
//! over newly fetched ones, and within a batch the first record with a
//! given title wins.

use crate::models::Article;
use chrono::{Duration, NaiveDate};
use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Why [`Accumulator::push`] refused a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// The title is already in the dataset or earlier in this batch.
    Duplicate,
    /// The record's river already reached its per-run quota.
    QuotaReached,
}

/// Collects the new records of one run.
///
/// Seeded with the titles of the existing dataset, it is threaded through
/// every fetch step and hands back the batch in arrival order.
#[derive(Debug, Default)]
pub struct Accumulator {
    seen: HashSet<String>,
    per_river: HashMap<String, usize>,
    quota: Option<usize>,
    articles: Vec<Article>,
}

impl Accumulator {
    pub fn new<'a>(existing: impl IntoIterator<Item = &'a Article>, quota: Option<usize>) -> Self {
        Self {
            seen: existing.into_iter().map(|a| a.title.clone()).collect(),
            per_river: HashMap::new(),
            quota,
            articles: Vec::new(),
        }
    }

    /// Add a record unless its title was seen or its river is full.
    pub fn push(&mut self, article: Article) -> Result<(), Rejected> {
        if self.seen.contains(&article.title) {
            return Err(Rejected::Duplicate);
        }
        if let (Some(quota), false) = (self.quota, article.river.is_empty()) {
            let count = self.per_river.entry(article.river.clone()).or_default();
            if *count >= quota {
                return Err(Rejected::QuotaReached);
            }
            *count += 1;
        }
        self.seen.insert(article.title.clone());
        self.articles.push(article);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn articles_mut(&mut self) -> &mut [Article] {
        &mut self.articles
    }

    pub fn into_articles(self) -> Vec<Article> {
        self.articles
    }
}

/// Combine the dataset with a batch of new records.
///
/// Titles stay unique (first seen wins, existing rows first) and the result
/// is sorted by publication date, newest first.
///
/// # Arguments
///
/// * `existing` - The current dataset
/// * `batch` - Records collected by this run
///
/// # Returns
///
/// The new dataset. A batch title already in `existing` leaves the existing
/// row untouched.
pub fn merge(existing: Vec<Article>, batch: Vec<Article>) -> Vec<Article> {
    let before = existing.len() + batch.len();
    let mut combined: Vec<Article> = existing
        .into_iter()
        .chain(batch)
        .unique_by(|a| a.title.clone())
        .collect();
    combined.sort_by(|a, b| b.published_on().cmp(&a.published_on()));
    debug!(
        rows = combined.len(),
        dropped = before - combined.len(),
        "Merged dataset"
    );
    combined
}

/// Lower bound for the publication-date filter of the next search.
///
/// The newest publication date in the dataset, or `lookback_days` before
/// `today` when the dataset has none.
pub fn last_known_date(existing: &[Article], today: NaiveDate, lookback_days: i64) -> NaiveDate {
    existing
        .iter()
        .filter_map(|a| a.publication_date)
        .max()
        .unwrap_or_else(|| today - Duration::days(lookback_days))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, date: (i32, u32, u32)) -> Article {
        Article {
            title: title.to_string(),
            authors: String::new(),
            year: date.0,
            publication_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            link: String::new(),
            abstract_text: String::new(),
            river: String::new(),
            keywords: String::new(),
            source: String::new(),
            scraped_at: None,
        }
    }

    fn with_river(mut a: Article, river: &str) -> Article {
        a.river = river.to_string();
        a
    }

    #[test]
    fn test_existing_title_wins_over_new() {
        let existing = vec![article("A", (2020, 1, 1)), article("B", (2021, 1, 1))];
        let batch = vec![article("A", (2023, 1, 1))];

        let merged = merge(existing.clone(), batch);
        assert_eq!(merged.len(), existing.len());
        let a = merged.iter().find(|a| a.title == "A").unwrap();
        assert_eq!(a.year, 2020);
    }

    #[test]
    fn test_merge_sorts_newest_first_without_duplicates() {
        let existing = vec![article("old", (2019, 3, 1))];
        let batch = vec![
            article("mid", (2022, 6, 1)),
            article("new", (2024, 2, 1)),
            article("mid", (2025, 1, 1)),
        ];

        let merged = merge(existing, batch);
        let titles: Vec<&str> = merged.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
        assert_eq!(merged[1].year, 2022);
    }

    #[test]
    fn test_accumulator_rejects_known_and_repeated_titles() {
        let existing = vec![article("A", (2020, 1, 1))];
        let mut acc = Accumulator::new(&existing, None);

        assert_eq!(acc.push(article("A", (2023, 1, 1))), Err(Rejected::Duplicate));
        assert_eq!(acc.push(article("B", (2023, 1, 1))), Ok(()));
        assert_eq!(acc.push(article("B", (2024, 1, 1))), Err(Rejected::Duplicate));
        assert_eq!(acc.len(), 1);
        assert_eq!(acc.into_articles()[0].year, 2023);
    }

    #[test]
    fn test_accumulator_quota_applies_to_rivers_only() {
        let mut acc = Accumulator::new(&[], Some(1));

        assert!(acc.push(with_river(article("p1", (2024, 1, 1)), "Po")).is_ok());
        assert_eq!(
            acc.push(with_river(article("p2", (2024, 1, 1)), "Po")),
            Err(Rejected::QuotaReached)
        );
        assert!(acc.push(with_river(article("a1", (2024, 1, 1)), "Adige")).is_ok());
        assert!(acc.push(article("x1", (2024, 1, 1))).is_ok());
        assert!(acc.push(article("x2", (2024, 1, 1))).is_ok());
        assert_eq!(acc.len(), 4);
        // a quota rejection does not burn the title
        assert_eq!(acc.push(article("p2", (2024, 1, 1))), Ok(()));
        assert_eq!(acc.len(), 5);
    }

    #[test]
    fn test_last_known_date() {
        let today = NaiveDate::from_ymd_opt(2025, 12, 10).unwrap();
        assert_eq!(
            last_known_date(&[], today, 7),
            NaiveDate::from_ymd_opt(2025, 12, 3).unwrap()
        );

        let existing = vec![article("a", (2024, 3, 1)), article("b", (2025, 11, 20))];
        assert_eq!(
            last_known_date(&existing, today, 7),
            NaiveDate::from_ymd_opt(2025, 11, 20).unwrap()
        );

        let mut undated = article("c", (2024, 1, 1));
        undated.publication_date = None;
        assert_eq!(
            last_known_date(&[undated], today, 7),
            NaiveDate::from_ymd_opt(2025, 12, 3).unwrap()
        );
    }
}
