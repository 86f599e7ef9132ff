//! Unsupervised keyword extraction from abstracts.
//!
//! A statistical extractor in the YAKE family: every word is scored from
//! local features of the text alone (casing, position, frequency, how many
//! different words surround it, how many sentences it appears in) and
//! candidate phrases of up to three words are ranked by combining the
//! scores of their words. Lower scores rank higher. Near-duplicate phrases
//! collapse to the better ranked one using normalized Levenshtein
//! similarity.
//!
//! The ranked phrases are then filtered down to the ones mentioning a term
//! from the domain vocabulary.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use strsim::normalized_levenshtein;

static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[.!?;]+(?:\s+|$)|\n+").expect("static regex")
});

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['’\-][\p{L}\p{N}]+)*|[^\s\p{L}\p{N}]").expect("static regex")
});

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "among", "an",
        "and", "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down",
        "during", "each", "either", "et", "etc", "few", "for", "from", "further", "had", "has",
        "have", "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how",
        "however", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "less", "may",
        "me", "might", "more", "most", "much", "must", "my", "myself", "no", "nor", "not", "now",
        "of", "off", "on", "once", "one", "only", "or", "other", "our", "ours", "ourselves",
        "out", "over", "own", "per", "same", "she", "should", "since", "so", "some", "such",
        "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
        "therefore", "these", "they", "this", "those", "through", "thus", "to", "too", "two",
        "under", "until", "up", "upon", "us", "used", "using", "very", "via", "was", "we",
        "were", "what", "when", "where", "whereas", "which", "while", "who", "whom", "whose",
        "why", "will", "with", "within", "without", "would", "yet", "you", "your", "yours",
        "yourself", "yourselves", "study", "paper", "results", "show", "shows", "based",
    ]
    .into_iter()
    .collect()
});

/// Tunables of the extractor.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    /// Longest candidate phrase, in words.
    pub max_ngram: usize,
    /// How many phrases survive ranking before the vocabulary filter.
    pub top: usize,
    /// Phrases more similar than this to a better ranked one are dropped.
    pub dedup_threshold: f64,
    /// How many preceding words count as co-occurring.
    pub window: usize,
    vocabulary: Vec<String>,
}

#[derive(Debug, Clone)]
struct Token {
    surface: String,
    lower: String,
    sentence_start: bool,
}

#[derive(Debug, Default)]
struct TermStats {
    tf: f64,
    tf_acronym: f64,
    tf_upper: f64,
    sentences: Vec<usize>,
    stop: bool,
    h: f64,
}

#[derive(Debug)]
struct Candidate {
    /// Lowercased words, the identity of the candidate.
    words: Vec<String>,
    /// The phrase as written at its first occurrence.
    surface: String,
    tf: f64,
    first_seen: usize,
}

impl KeywordExtractor {
    pub fn new(vocabulary: &[String]) -> Self {
        Self {
            max_ngram: 3,
            top: 7,
            dedup_threshold: 0.9,
            window: 2,
            vocabulary: vocabulary
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Keyword string for an abstract: ranked phrases mentioning a
    /// vocabulary term, joined with `", "`. Empty when nothing matches.
    pub fn keywords_for(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        self.extract(text)
            .into_iter()
            .map(|(phrase, _)| phrase)
            .filter(|phrase| self.is_relevant(phrase))
            .join(", ")
    }

    /// Whether `phrase` mentions a vocabulary term, ignoring case.
    pub fn is_relevant(&self, phrase: &str) -> bool {
        let phrase = phrase.to_lowercase();
        self.vocabulary.iter().any(|term| phrase.contains(term.as_str()))
    }

    /// Ranked, deduplicated phrases with their scores, best first.
    pub fn extract(&self, text: &str) -> Vec<(String, f64)> {
        let sentences = tokenize(text);
        if sentences.is_empty() {
            return Vec::new();
        }

        let mut terms: HashMap<String, TermStats> = HashMap::new();
        let mut edges: HashMap<(String, String), f64> = HashMap::new();
        let mut candidates: HashMap<String, Candidate> = HashMap::new();
        let mut position = 0usize;

        for (sentence_idx, blocks) in sentences.iter().enumerate() {
            for block in blocks {
                for (j, token) in block.iter().enumerate() {
                    let stats = terms.entry(token.lower.clone()).or_insert_with(|| TermStats {
                        stop: is_stopword(&token.lower),
                        ..Default::default()
                    });
                    stats.tf += 1.0;
                    if is_acronym(&token.surface) {
                        stats.tf_acronym += 1.0;
                    } else if !token.sentence_start && starts_upper(&token.surface) {
                        stats.tf_upper += 1.0;
                    }
                    stats.sentences.push(sentence_idx);

                    for prev in &block[j.saturating_sub(self.window)..j] {
                        *edges
                            .entry((prev.lower.clone(), token.lower.clone()))
                            .or_default() += 1.0;
                    }

                    for n in 1..=self.max_ngram.min(block.len() - j) {
                        let words: Vec<String> =
                            block[j..j + n].iter().map(|t| t.lower.clone()).collect();
                        let key = words.join(" ");
                        position += 1;
                        candidates
                            .entry(key)
                            .or_insert_with(|| Candidate {
                                words,
                                surface: block[j..j + n].iter().map(|t| t.surface.as_str()).join(" "),
                                tf: 0.0,
                                first_seen: position,
                            })
                            .tf += 1.0;
                    }
                }
            }
        }

        score_terms(&mut terms, &edges, sentences.len());

        let mut ranked: Vec<(String, f64, usize)> = candidates
            .into_iter()
            .filter(|(_, c)| is_valid_candidate(&c.words, &terms))
            .map(|(_, c)| {
                let h = candidate_score(&c, &terms, &edges);
                (c.surface, h, c.first_seen)
            })
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.2.cmp(&b.2)));

        dedup_ranked(
            ranked.into_iter().map(|(k, h, _)| (k, h)),
            self.dedup_threshold,
            self.top,
        )
    }
}

/// Keep the best ranked phrases, skipping any too similar to one already kept.
///
/// Similarity ignores case.
fn dedup_ranked(
    ranked: impl IntoIterator<Item = (String, f64)>,
    threshold: f64,
    top: usize,
) -> Vec<(String, f64)> {
    let mut kept: Vec<(String, f64)> = Vec::with_capacity(top);
    for (phrase, score) in ranked {
        if kept.len() >= top {
            break;
        }
        let lower = phrase.to_lowercase();
        if kept
            .iter()
            .any(|(k, _)| normalized_levenshtein(&k.to_lowercase(), &lower) > threshold)
        {
            continue;
        }
        kept.push((phrase, score));
    }
    kept
}

/// Sentences, split into blocks of word tokens at punctuation and numbers.
fn tokenize(text: &str) -> Vec<Vec<Vec<Token>>> {
    SENTENCE_SPLIT
        .split(text)
        .filter_map(|sentence| {
            let mut blocks = Vec::new();
            let mut block: Vec<Token> = Vec::new();
            let mut first = true;
            for m in TOKEN.find_iter(sentence) {
                let word = m.as_str();
                let is_word = word.chars().any(char::is_alphabetic);
                let has_digit = word.chars().any(|c| c.is_ascii_digit());
                if !is_word || has_digit {
                    if !block.is_empty() {
                        blocks.push(std::mem::take(&mut block));
                    }
                    first = false;
                    continue;
                }
                block.push(Token {
                    surface: word.to_string(),
                    lower: word.to_lowercase(),
                    sentence_start: first,
                });
                first = false;
            }
            if !block.is_empty() {
                blocks.push(block);
            }
            (!blocks.is_empty()).then_some(blocks)
        })
        .collect()
}

fn is_stopword(word: &str) -> bool {
    word.chars().count() < 3 || STOPWORDS.contains(word)
}

fn is_acronym(word: &str) -> bool {
    word.chars().count() > 1
        && word.chars().all(|c| !c.is_alphabetic() || c.is_uppercase())
}

fn starts_upper(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_uppercase)
}

fn score_terms(
    terms: &mut HashMap<String, TermStats>,
    edges: &HashMap<(String, String), f64>,
    sentence_count: usize,
) {
    let valid_tfs: Vec<f64> = terms.values().filter(|t| !t.stop).map(|t| t.tf).collect();
    let (mean, std) = mean_std(&valid_tfs);
    let max_tf = terms.values().map(|t| t.tf).fold(1.0, f64::max);

    // (distinct neighbours, total weight) on each side
    let mut left: HashMap<&str, (f64, f64)> = HashMap::new();
    let mut right: HashMap<&str, (f64, f64)> = HashMap::new();
    for ((from, to), weight) in edges {
        let r = right.entry(from.as_str()).or_default();
        r.0 += 1.0;
        r.1 += weight;
        let l = left.entry(to.as_str()).or_default();
        l.0 += 1.0;
        l.1 += weight;
    }
    let ratio = |side: Option<&(f64, f64)>| match side {
        Some((distinct, total)) if *total > 0.0 => distinct / total,
        _ => 0.0,
    };

    let mut scores: Vec<(String, f64)> = Vec::with_capacity(terms.len());
    for (word, t) in terms.iter() {
        let mut sentences = t.sentences.clone();
        sentences.sort_unstable();
        sentences.dedup();

        let w_case = t.tf_acronym.max(t.tf_upper) / (1.0 + t.tf.ln());
        let w_pos = (3.0 + median(&sentences)).ln().ln();
        let w_freq = if mean + std > 0.0 { t.tf / (mean + std) } else { 0.0 };
        let share = t.tf / max_tf;
        let w_rel = (0.5 + ratio(left.get(word.as_str())) * share)
            + (0.5 + ratio(right.get(word.as_str())) * share);
        let w_spread = sentences.len() as f64 / sentence_count.max(1) as f64;

        let h = (w_pos * w_rel) / (w_case + w_freq / w_rel + w_spread / w_rel);
        scores.push((word.clone(), h));
    }
    for (word, h) in scores {
        if let Some(t) = terms.get_mut(&word) {
            t.h = h;
        }
    }
}

fn is_valid_candidate(words: &[String], terms: &HashMap<String, TermStats>) -> bool {
    let stop = |w: &String| terms.get(w).is_none_or(|t| t.stop);
    match (words.first(), words.last()) {
        (Some(first), Some(last)) => !stop(first) && !stop(last),
        _ => false,
    }
}

fn candidate_score(
    candidate: &Candidate,
    terms: &HashMap<String, TermStats>,
    edges: &HashMap<(String, String), f64>,
) -> f64 {
    let tf_of = |w: &str| terms.get(w).map_or(0.0, |t| t.tf);
    let edge = |a: &str, b: &str| {
        edges
            .get(&(a.to_string(), b.to_string()))
            .copied()
            .unwrap_or_default()
    };

    let mut prod_h = 1.0;
    let mut sum_h = 0.0;
    for (i, word) in candidate.words.iter().enumerate() {
        let Some(term) = terms.get(word) else { continue };
        if term.stop {
            // inner stopwords weigh by how tightly they bind their neighbours
            let prev = &candidate.words[i - 1];
            let next = &candidate.words[i + 1];
            let p_prev = safe_div(edge(prev, word), tf_of(prev));
            let p_next = safe_div(edge(word, next), tf_of(next));
            let prob = p_prev * p_next;
            prod_h *= 1.0 + (1.0 - prob);
            sum_h -= 1.0 - prob;
        } else {
            prod_h *= term.h;
            sum_h += term.h;
        }
    }
    if sum_h == -1.0 {
        sum_h = 0.999_999_999;
    }
    prod_h / ((sum_h + 1.0) * candidate.tf)
}

fn safe_div(a: f64, b: f64) -> f64 {
    if b > 0.0 { a / b } else { 0.0 }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn median(sorted: &[usize]) -> f64 {
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2] as f64,
        n => (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABSTRACT: &str = "Drought events in the Po River basin have intensified during the last decades. \
        We analyse river flow records and irrigation demand across the Po River basin. \
        Water scarcity in northern Italy is linked to reduced snowpack and low river flow. \
        The results support drought monitoring and water management in the Po River basin.";

    fn extractor() -> KeywordExtractor {
        let vocab: Vec<String> = [
            "drought", "water", "river", "basin", "irrigation", "scarcity", "flow", "hydrology",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        KeywordExtractor::new(&vocab)
    }

    #[test]
    fn test_no_vocabulary_terms_gives_empty_string() {
        let text = "Wine tourism in Tuscany attracts visitors. Local vineyards report strong autumn sales.";
        assert_eq!(extractor().keywords_for(text), "");
    }

    #[test]
    fn test_empty_abstract_gives_empty_string() {
        assert_eq!(extractor().keywords_for(""), "");
        assert_eq!(extractor().keywords_for("   "), "");
    }

    #[test]
    fn test_every_phrase_mentions_the_vocabulary() {
        let ex = extractor();
        let keywords = ex.keywords_for(ABSTRACT);
        assert!(!keywords.is_empty());
        for phrase in keywords.split(", ") {
            assert!(ex.is_relevant(phrase), "{phrase} has no vocabulary term");
        }
    }

    #[test]
    fn test_extract_respects_top_and_ngram_length() {
        let ex = extractor();
        let ranked = ex.extract(ABSTRACT);
        assert!(!ranked.is_empty());
        assert!(ranked.len() <= ex.top);
        for (phrase, _) in &ranked {
            assert!(phrase.split(' ').count() <= ex.max_ngram);
        }
        for pair in ranked.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn test_frequent_phrase_ranks_high() {
        let ranked = extractor().extract(ABSTRACT);
        let top: Vec<String> = ranked.iter().take(3).map(|(p, _)| p.to_lowercase()).collect();
        assert!(
            top.iter().any(|p| p.contains("river")),
            "unexpected top phrases: {top:?}"
        );
    }

    #[test]
    fn test_candidates_do_not_start_or_end_with_stopwords() {
        for (phrase, _) in extractor().extract(ABSTRACT) {
            let lower = phrase.to_lowercase();
            let words: Vec<&str> = lower.split(' ').collect();
            assert!(!is_stopword(words[0]), "{phrase}");
            assert!(!is_stopword(words[words.len() - 1]), "{phrase}");
        }
    }

    #[test]
    fn test_dedup_collapses_near_duplicates() {
        let ranked = vec![
            ("water flow".to_string(), 0.1),
            ("water flows".to_string(), 0.2),
            ("river basin".to_string(), 0.3),
        ];
        let kept = dedup_ranked(ranked, 0.9, 7);
        let phrases: Vec<&str> = kept.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(phrases, vec!["water flow", "river basin"]);
    }

    #[test]
    fn test_dedup_ignores_case() {
        let ranked = vec![("Water flow".to_string(), 0.1), ("water flows".to_string(), 0.2)];
        let kept = dedup_ranked(ranked, 0.9, 7);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0, "Water flow");
    }

    #[test]
    fn test_phrases_keep_their_written_casing() {
        let text = "The SPI drought index describes meteorological drought in Italy. \
            Low SPI values marked the 2022 drought across the Po basin. \
            SPI anomalies preceded low river flow.";
        let ranked = extractor().extract(text);
        let words: Vec<&str> = ranked.iter().flat_map(|(p, _)| p.split(' ')).collect();

        assert!(words.contains(&"SPI"), "acronym lost: {ranked:?}");
        assert!(!words.contains(&"spi"), "acronym lowercased: {ranked:?}");
    }

    #[test]
    fn test_dedup_stops_at_top() {
        let ranked = (0..10).map(|i| (format!("phrase number {i} apart"), i as f64));
        assert_eq!(dedup_ranked(ranked, 0.99, 3).len(), 3);
    }

    #[test]
    fn test_relevance_is_case_insensitive() {
        let ex = extractor();
        assert!(ex.is_relevant("Severe DROUGHT"));
        assert!(ex.is_relevant("groundwater"));
        assert!(!ex.is_relevant("snowpack"));
    }

    #[test]
    fn test_numbers_break_phrases() {
        let blocks = tokenize("Rainfall fell 40 percent in 2022.");
        assert_eq!(blocks.len(), 1);
        let words: Vec<Vec<&str>> = blocks[0]
            .iter()
            .map(|b| b.iter().map(|t| t.lower.as_str()).collect())
            .collect();
        assert_eq!(words, vec![vec!["rainfall", "fell"], vec!["percent", "in"]]);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[4]), 4.0);
        assert_eq!(median(&[1, 3]), 2.0);
        assert_eq!(median(&[0, 2, 9]), 2.0);
    }
}
