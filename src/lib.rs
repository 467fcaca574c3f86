//! Onion-Snapshot: a one-shot anonymized page snapshotter
//!
//! This crate implements a minimal fetch-extract-persist pipeline: it renews
//! the anonymizing-network identity, fetches a single page through a local
//! forwarding proxy, optionally extracts (label, link) records from the HTML,
//! and writes timestamped delimited files under an output directory.

pub mod config;
pub mod control;
pub mod job;
pub mod output;

use thiserror::Error;

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{load_config, ClientConfig, Config, ControlConfig, OutputConfig};
pub use control::{ControlError, IdentityRotator};
pub use job::{
    CrawlJob, ExtractError, ExtractionRule, FetchError, FetchResult, JobError, JobOutcome,
    JobStage, Method, Record, Target,
};
pub use output::{ArtifactContent, OutputError, OutputSink, RunArtifact};
