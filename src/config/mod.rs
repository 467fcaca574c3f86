//! Configuration module for Onion-Snapshot
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use onion_snapshot::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Proxy: {}", config.client.proxy_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ClientConfig, Config, ControlConfig, CookieEntry, OutputConfig};

// Re-export parser functions
pub use parser::load_config;
