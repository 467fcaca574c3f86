//! Crawl job orchestration
//!
//! This module contains the core pipeline logic, including:
//! - HTTP fetching through the configured proxy
//! - Record extraction from HTML result pages
//! - Stage sequencing: rotate identity, fetch, extract, persist
//!
//! One job is one attempt: no retries, no backoff, no partial continuation.
//! Failure at any stage skips the remaining stages.

mod extractor;
mod fetcher;

pub use extractor::{extract, ExtractError, ExtractionRule, Record};
pub use fetcher::{FetchError, FetchResult, HttpFetcher, Method, Target};

use crate::config::Config;
use crate::control::{ControlError, IdentityRotator};
use crate::output::{ArtifactContent, OutputError, OutputSink, RunArtifact};
use std::path::PathBuf;
use thiserror::Error;

/// The stage a job is in, or the terminal state it ended in
///
/// Transitions run strictly forward: `Idle -> Rotating -> Fetching ->
/// (Extracting ->) Persisting -> Done`. Any stage failure transitions
/// directly to `Failed`. There is no transition out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Idle,
    Rotating,
    Fetching,
    Extracting,
    Persisting,

    // ===== Terminal States =====
    Done,
    Failed,
}

impl JobStage {
    /// Returns true if this is a terminal state (the job has ended)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Stage name used in structured log events
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Rotating => "rotating",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// A stage failure, naming the stage that produced it
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Identity rotation failed: {0}")]
    Rotate(#[from] ControlError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Persist failed: {0}")]
    Persist(#[from] OutputError),
}

impl JobError {
    /// The stage this error originated from
    pub fn stage(&self) -> JobStage {
        match self {
            Self::Rotate(_) => JobStage::Rotating,
            Self::Fetch(_) => JobStage::Fetching,
            Self::Extract(_) => JobStage::Extracting,
            Self::Persist(_) => JobStage::Persisting,
        }
    }
}

/// Outcome of one job invocation
#[derive(Debug)]
pub enum JobOutcome {
    /// All stages completed; the listed files were written
    Success { files: Vec<PathBuf> },

    /// A stage failed; remaining stages were skipped
    Failure(JobError),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Orchestrates one fetch-extract-persist pipeline run
///
/// Holds the process-wide configuration, read-only after startup. The target
/// and extraction rule are supplied per invocation; nothing persists in
/// memory between runs.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    config: Config,
}

impl CrawlJob {
    /// Creates a job runner from the loaded configuration
    pub fn new(config: Config) -> Self {
        CrawlJob { config }
    }

    /// Runs one crawl: rotate identity, fetch, optionally extract, persist
    ///
    /// Identity rotation runs only when a control endpoint is configured, and
    /// a rotation failure is a precondition failure: the fetch is not
    /// attempted. With a rule, the body is extracted and persisted as
    /// records; without one, the raw body is persisted as-is.
    ///
    /// # Arguments
    ///
    /// * `target` - What to fetch and the run title
    /// * `rule` - Extraction rule; `None` persists the raw response
    ///
    /// # Returns
    ///
    /// A `JobOutcome`; the caller translates it to exit codes or messages.
    /// The job itself never terminates the process.
    pub async fn run(&self, target: Target, rule: Option<ExtractionRule>) -> JobOutcome {
        tracing::info!(title = %target.title, url = %target.url, "starting crawl");

        let started_at = chrono::Local::now().naive_local();

        match self.run_stages(&target, rule, started_at).await {
            Ok(files) => {
                tracing::info!(
                    stage = JobStage::Done.as_str(),
                    title = %target.title,
                    files = files.len(),
                    "crawl successfully created"
                );
                JobOutcome::Success { files }
            }
            Err(e) => {
                tracing::error!(
                    stage = JobStage::Failed.as_str(),
                    failed_stage = e.stage().as_str(),
                    title = %target.title,
                    error = %e,
                    "crawl failed"
                );
                JobOutcome::Failure(e)
            }
        }
    }

    /// Drives the stage sequence, stopping at the first failure
    async fn run_stages(
        &self,
        target: &Target,
        rule: Option<ExtractionRule>,
        started_at: chrono::NaiveDateTime,
    ) -> Result<Vec<PathBuf>, JobError> {
        if let Some(control) = &self.config.control {
            tracing::info!(stage = JobStage::Rotating.as_str(), "renewing identity");
            IdentityRotator::new(control).rotate().await?;
        }

        tracing::info!(stage = JobStage::Fetching.as_str(), url = %target.url, "fetching");
        let fetcher = HttpFetcher::new(&self.config.client)?;
        let result = fetcher.fetch(target).await?;

        let content = match rule {
            Some(rule) => {
                tracing::info!(stage = JobStage::Extracting.as_str(), "extracting records");
                if !result.is_html {
                    tracing::warn!("response did not declare text/html; extracting anyway");
                }
                let records = extract(&result.body, &rule)?;
                tracing::info!(records = records.len(), "records extracted");
                ArtifactContent::Records(records)
            }
            None => ArtifactContent::Raw(result.body),
        };

        tracing::info!(stage = JobStage::Persisting.as_str(), "persisting artifact");
        let sink = OutputSink::new(&self.config.output.root);
        let files = sink.persist(&RunArtifact {
            title: target.title.clone(),
            started_at,
            content,
        })?;

        Ok(files)
    }
}

/// Runs a complete crawl job
///
/// This is the main library entry point: it builds a `CrawlJob` from the
/// configuration and runs the single target through the pipeline.
pub async fn crawl(config: Config, target: Target, rule: Option<ExtractionRule>) -> JobOutcome {
    CrawlJob::new(config).run(target, rule).await
}
