//! Persistence of the pipeline's tabular files.
//!
//! # Submodules
//!
//! - [`tables`]: Reads and writes the article dataset, the new-articles file and the digest file
//! - [`archive`]: Copies the current files to a dated backup before a run
//!
//! # Output Structure
//!
//! ```text
//! data_dir/
//! ├── semantic_scholar_results.csv   # every article ever collected, newest first
//! ├── new_articles_digest.csv        # articles added by the last scrape
//! ├── new_articles_digest_ai.csv     # one generated summary per river
//! └── archive/
//!     ├── 2025-12-10_semantic_scholar_results.csv
//!     └── ...
//! ```
//!
//! Every file is rewritten whole; nothing is patched in place.

pub mod archive;
pub mod tables;
