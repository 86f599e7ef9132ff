//! Paper index scrapers.
//!
//! Each scraper turns a list of [`crate::models::SearchQuery`] values into
//! normalized [`crate::models::Article`] rows, following the same pattern:
//!
//! 1. **Request**: wait the fixed politeness delay, then fetch one page
//! 2. **Normalize**: map each raw result to an article, skipping invalid ones
//! 3. **Accumulate**: push into the run's [`crate::dataset::Accumulator`],
//!    which rejects titles already seen
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Semantic Scholar | [`semantic_scholar`] | Graph API paper search | Free tier allows roughly one request per minute |
//!
//! Requests go out strictly one after another; the scrapers never fetch
//! concurrently.

pub mod semantic_scholar;
