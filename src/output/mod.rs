//! Output module for persisting crawl results and reporting on a run
//!
//! This module handles:
//! - Writing the content database as one pretty-printed JSON file
//! - Reading a previously written database back
//! - Summarizing a finished run

mod report;

pub use report::{CrawlReport, TerminationReason};

use crate::content::ContentDatabase;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Writes the database to `path`
///
/// The JSON is written to a sibling temporary file first and renamed into
/// place, so a reader never sees a half-written file. Non-ASCII text is
/// written as-is.
///
/// # Arguments
///
/// * `database` - The records to write
/// * `path` - Destination file
pub fn save_database(database: &ContentDatabase, path: &Path) -> OutputResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let json = serde_json::to_string_pretty(database)?;
    let tmp = temp_path(path);

    fs::write(&tmp, json.as_bytes()).map_err(io_error(&tmp))?;
    fs::rename(&tmp, path).map_err(io_error(path))?;

    tracing::debug!(path = %path.display(), records = database.len(), "database written");
    Ok(())
}

/// Reads a database written by [`save_database`]
pub fn load_database(path: &Path) -> OutputResult<ContentDatabase> {
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    Ok(serde_json::from_str(&content)?)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
