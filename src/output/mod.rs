//! Output module for persisting run artifacts
//!
//! This module writes the files produced by one crawl job:
//! - Idempotent creation of the per-title run directory
//! - Timestamped `crawl{title}{DDMMYYYY_HHMMSS}` filenames
//! - Raw-bytes mode (one file) and records mode (labels file plus `_href` sibling)
//!
//! The records serialization is a fixed compatibility format: every row is
//! `"Result","{value}"` with both fields quoted, embedded quotes doubled, and
//! CRLF row terminators. Existing archives were written this way, so the
//! layout is preserved bit-for-bit.

use crate::job::Record;
use chrono::NaiveDateTime;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from persisting a run artifact
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Output path {path} exists but is not a directory")]
    PathConflict { path: PathBuf },

    #[error("Failed to write {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Content of a run artifact: either the raw response or extracted records
#[derive(Debug)]
pub enum ArtifactContent {
    Raw(Vec<u8>),
    Records(Vec<Record>),
}

/// The output of one crawl job invocation
///
/// `started_at` is captured once at job start; both files of a records-mode
/// artifact share it, and two jobs started in different seconds can never
/// clobber each other's files.
#[derive(Debug)]
pub struct RunArtifact {
    pub title: String,
    pub started_at: NaiveDateTime,
    pub content: ArtifactContent,
}

/// Writes run artifacts under a fixed output root
#[derive(Debug, Clone)]
pub struct OutputSink {
    root: PathBuf,
}

impl OutputSink {
    /// Creates a sink rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        OutputSink { root: root.into() }
    }

    /// Persists one run artifact, returning the paths written
    ///
    /// Ensures `{root}/{title}/` exists (pre-existing directories are fine),
    /// then writes `crawl{title}{DDMMYYYY_HHMMSS}` — and, in records mode, the
    /// `_href` sibling. Partial files from a failed write are left in place.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<PathBuf>)` - Paths of the files written
    /// * `Err(OutputError)` - Path conflict or write failure
    pub fn persist(&self, artifact: &RunArtifact) -> Result<Vec<PathBuf>, OutputError> {
        let directory = self.root.join(&artifact.title);
        ensure_directory(&directory)?;

        let filename = format!(
            "crawl{}{}",
            artifact.title,
            artifact.started_at.format("%d%m%Y_%H%M%S")
        );
        let path = directory.join(&filename);

        match &artifact.content {
            ArtifactContent::Raw(bytes) => {
                tracing::info!(path = %path.display(), "writing file");
                write_file(&path, bytes)?;
                Ok(vec![path])
            }
            ArtifactContent::Records(records) => {
                let href_path = directory.join(format!("{}_href", filename));
                tracing::info!(
                    path = %path.display(),
                    href_path = %href_path.display(),
                    "writing files"
                );

                write_rows(&path, records.iter().map(|r| r.label.as_str()))?;
                write_rows(&href_path, records.iter().map(|r| r.link.as_str()))?;
                Ok(vec![path, href_path])
            }
        }
    }
}

/// Creates the run directory if needed; existing directories are not an error
fn ensure_directory(directory: &Path) -> Result<(), OutputError> {
    if directory.exists() {
        if directory.is_dir() {
            return Ok(());
        }
        return Err(OutputError::PathConflict {
            path: directory.to_path_buf(),
        });
    }

    tracing::debug!(directory = %directory.display(), "creating output directory");
    fs::create_dir_all(directory).map_err(|e| OutputError::WriteFailure {
        path: directory.to_path_buf(),
        source: e,
    })
}

/// Writes raw bytes to the given path
fn write_file(path: &Path, bytes: &[u8]) -> Result<(), OutputError> {
    fs::write(path, bytes).map_err(|e| OutputError::WriteFailure {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Writes one `"Result","{value}"` row per value to the given path
fn write_rows<'a>(
    path: &Path,
    values: impl Iterator<Item = &'a str>,
) -> Result<(), OutputError> {
    let as_write_failure = |e: std::io::Error| OutputError::WriteFailure {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = fs::File::create(path).map_err(as_write_failure)?;
    for value in values {
        let row = format!("{},{}\r\n", quote_field("Result"), quote_field(value));
        file.write_all(row.as_bytes()).map_err(as_write_failure)?;
    }

    Ok(())
}

/// Quotes a field unconditionally, doubling embedded quotes
///
/// Values may contain any text token, commas and quotes included, so every
/// field is quoted rather than only those needing it.
fn quote_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}
