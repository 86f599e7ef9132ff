//! Dated backups of the dataset files.
//!
//! Before each run, every file that exists is copied to
//! `{archive_dir}/{YYYY-MM-DD}_{file_name}`. A second run on the same day
//! overwrites that day's copies. There is no restore path.

use chrono::NaiveDate;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

/// Copy each existing file in `files` into `archive_dir`, returning the copies.
#[instrument(level = "info", skip_all, fields(archive_dir = %archive_dir.display(), %date))]
pub async fn archive_files(
    files: &[PathBuf],
    archive_dir: &Path,
    date: NaiveDate,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    fs::create_dir_all(archive_dir).await?;

    let mut archived = Vec::new();
    for file in files {
        if !fs::try_exists(file).await? {
            debug!(path = %file.display(), "Nothing to archive");
            continue;
        }
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let target = archive_dir.join(format!("{}_{}", date.format("%Y-%m-%d"), name));
        fs::copy(file, &target).await?;
        info!(from = %file.display(), to = %target.display(), "Archived file");
        archived.push(target);
    }
    Ok(archived)
}
