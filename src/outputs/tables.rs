//! CSV reading and writing for articles and digests.
//!
//! Files carry a header row and one row per record. Readers are lenient
//! about columns: unknown ones (such as the legacy `region`) are ignored and
//! missing optional ones take their defaults.

use crate::models::{Article, DigestRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Column order of the article files.
pub const ARTICLE_COLUMNS: [&str; 10] = [
    "title",
    "authors",
    "year",
    "publicationDate",
    "link",
    "abstract",
    "river",
    "keywords",
    "source",
    "scraped_at",
];

/// Column order of the digest file.
pub const DIGEST_COLUMNS: [&str; 3] = ["river", "summary", "keywords"];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl DatasetError {
    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read an article file.
///
/// A missing or zero-byte file reads as no articles; the latter is logged
/// as a warning. Malformed rows are an error.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_articles(path: &Path) -> Result<Vec<Article>, DatasetError> {
    read_rows(path)
}

/// Write an article file, replacing any previous content.
#[instrument(level = "info", skip_all, fields(path = %path.display(), rows = articles.len()))]
pub fn write_articles(path: &Path, articles: &[Article]) -> Result<(), DatasetError> {
    write_rows(path, articles, &ARTICLE_COLUMNS)
}

/// Read a digest file.
#[cfg(test)]
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_digests(path: &Path) -> Result<Vec<DigestRecord>, DatasetError> {
    read_rows(path)
}

/// Write the digest file, replacing any previous content.
#[instrument(level = "info", skip_all, fields(path = %path.display(), rows = digests.len()))]
pub fn write_digests(path: &Path, digests: &[DigestRecord]) -> Result<(), DatasetError> {
    write_rows(path, digests, &DIGEST_COLUMNS)
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, DatasetError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => {
            warn!("File is empty; continuing without its rows");
            return Ok(Vec::new());
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("File not found; starting empty");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(DatasetError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    let mut reader = csv::Reader::from_path(path).map_err(|e| DatasetError::csv(path, e))?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| DatasetError::csv(path, e))?;
    info!(rows = rows.len(), "Loaded rows");
    Ok(rows)
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T], columns: &[&str]) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| DatasetError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| DatasetError::csv(path, e))?;
    if rows.is_empty() {
        writer
            .write_record(columns)
            .map_err(|e| DatasetError::csv(path, e))?;
    }
    for row in rows {
        writer.serialize(row).map_err(|e| DatasetError::csv(path, e))?;
    }
    writer.flush().map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(rows = rows.len(), "Wrote file");
    Ok(())
}
