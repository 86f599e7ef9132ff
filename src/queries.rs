//! Search query construction.
//!
//! One query per river (river name plus the topical qualifier, tagged with
//! the river) followed by one topic-only query per term group. Exact
//! duplicate query strings are dropped, first occurrence wins.

use crate::models::SearchQuery;
use itertools::Itertools;

/// Build the ordered, duplicate-free list of queries.
pub fn build_queries(
    rivers: &[String],
    river_qualifier: &str,
    term_groups: &[Vec<String>],
) -> Vec<SearchQuery> {
    let river_queries = rivers
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(|river| SearchQuery {
            query: format!("{river} {river_qualifier}").trim().to_string(),
            river: Some(river.to_string()),
        });

    let topic_queries = term_groups
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .join(" AND ")
        })
        .filter(|q| !q.is_empty())
        .map(|query| SearchQuery { query, river: None });

    river_queries
        .chain(topic_queries)
        .unique_by(|q| q.query.clone())
        .collect()
}
