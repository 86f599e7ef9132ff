//! River classification and per-river digests.
//!
//! Articles are partitioned by river label. Articles whose label is empty
//! or outside the known-river set land in the synthetic [`OTHERS`] group.
//!
//! The two kinds of group are summarized differently:
//! - a **known river** gets a digest written from its articles' titles and
//!   abstracts, with the titles kept as Markdown links;
//! - **Others** gets a digest written from its aggregated keywords alone.

use crate::api::{AskAsync, summarize};
use crate::models::{Article, DigestRecord, OTHERS};
use itertools::Itertools;
use std::collections::BTreeSet;
use tracing::{info, instrument};

/// Articles sharing one river label.
#[derive(Debug)]
pub struct RiverGroup<'a> {
    pub river: String,
    pub articles: Vec<&'a Article>,
}

impl RiverGroup<'_> {
    pub fn is_others(&self) -> bool {
        self.river == OTHERS
    }
}

/// Partition `articles` into river groups.
///
/// Groups follow the order of `known_rivers`, with [`OTHERS`] last; groups
/// without articles are left out. Inside a group, articles keep their
/// input order.
pub fn group_by_river<'a>(articles: &'a [Article], known_rivers: &[String]) -> Vec<RiverGroup<'a>> {
    let mut groups: Vec<RiverGroup<'a>> = known_rivers
        .iter()
        .unique()
        .map(|river| RiverGroup {
            river: river.clone(),
            articles: Vec::new(),
        })
        .chain(std::iter::once(RiverGroup {
            river: OTHERS.to_string(),
            articles: Vec::new(),
        }))
        .collect();
    let others = groups.len() - 1;

    for article in articles {
        let label = article.river.trim();
        let idx = groups[..others]
            .iter()
            .position(|g| !label.is_empty() && g.river == label)
            .unwrap_or(others);
        groups[idx].articles.push(article);
    }

    groups.retain(|g| !g.articles.is_empty());
    groups
}

/// Keywords of all `articles`, deduplicated and sorted.
pub fn aggregate_keywords(articles: &[&Article]) -> BTreeSet<String> {
    articles.iter().flat_map(|a| a.keyword_list()).collect()
}

/// Prompt asking for a linked digest of one river's articles.
pub fn river_prompt(river: &str, articles: &[&Article]) -> String {
    let joined = articles
        .iter()
        .map(|a| format!("[{}]({})\n\n{}", a.title, a.link, a.abstract_text))
        .join("\n\n");

    format!(
        "You are analyzing NEW scientific articles about {river} River.\n\
         \n\
         Write a very concise digest (2-3 sentences) in Markdown format:\n\
         - new data, indices, models, or results\n\
         - relevance for hydrology, drought, climate, or monitoring\n\
         - keep article titles as Markdown links [Title](URL)\n\
         \n\
         Start immediately with the digest. Do NOT add introductory phrases. Do NOT output bullet points.\n\
         \n\
         Articles to summarize:\n\
         {joined}\n"
    )
}

/// Prompt asking for a digest of the Others group from keywords only.
pub fn others_prompt(keywords: &str) -> String {
    format!(
        "You are analyzing NEW scientific articles in the '{OTHERS}' category.\n\
         \n\
         Using only the provided keywords, write a single, concise digest (2-3 sentences) suitable for website display.\n\
         - Mention the main topics discovered (from keywords)\n\
         - Start immediately with the digest\n\
         - Do NOT include links or bullet points\n\
         \n\
         Keywords:\n\
         {keywords}\n"
    )
}

/// Summarize every river group of `articles`, one [`DigestRecord`] per group.
///
/// A failed generation leaves that group's summary empty and moves on.
///
/// # Arguments
///
/// * `model` - Text generator used for each group
/// * `articles` - The articles of the last scrape
/// * `known_rivers` - Known-river set, in output order
///
/// # Returns
///
/// One record per non-empty group, known rivers first and [`OTHERS`] last.
#[instrument(level = "info", skip_all, fields(articles = articles.len()))]
pub async fn build_digests<A: AskAsync>(
    model: &A,
    articles: &[Article],
    known_rivers: &[String],
) -> Vec<DigestRecord> {
    let groups = group_by_river(articles, known_rivers);
    info!(groups = groups.len(), "Generating digest per river");

    let mut digests = Vec::with_capacity(groups.len());
    for group in groups {
        let keywords = aggregate_keywords(&group.articles);
        info!(river = %group.river, articles = group.articles.len(), keywords = keywords.len(), "Summarizing group");

        let prompt = if group.is_others() {
            others_prompt(&keywords.iter().join(", "))
        } else {
            river_prompt(&group.river, &group.articles)
        };
        let summary = summarize(model, &prompt).await;

        digests.push(DigestRecord {
            river: group.river,
            summary,
            keywords: keywords.iter().join(";"),
        });
    }
    digests
}
