//! Onion-Snapshot main entry point
//!
//! This is the command-line interface for the one-shot page snapshotter.

use anyhow::{bail, Context};
use clap::Parser;
use onion_snapshot::config::load_config;
use onion_snapshot::job::{crawl, ExtractionRule, JobOutcome, Method, Target};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Onion-Snapshot: a one-shot anonymized page snapshotter
///
/// Renews the anonymizing-network identity, fetches one page through the
/// configured proxy, optionally extracts (label, link) records, and writes
/// timestamped files under the output directory.
#[derive(Parser, Debug)]
#[command(name = "onion-snapshot")]
#[command(version = "1.0.0")]
#[command(about = "A one-shot anonymized page snapshotter", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Run title; names the output directory and files
    #[arg(value_name = "TITLE")]
    title: String,

    /// URL to fetch (or form action with --post)
    #[arg(value_name = "URL")]
    url: String,

    /// Submit a POST form instead of a GET request
    #[arg(long)]
    post: bool,

    /// Form field, repeatable (requires --post)
    #[arg(long, value_name = "KEY=VALUE", requires = "post")]
    form: Vec<String>,

    /// CSS selector for record labels (element text)
    #[arg(long, value_name = "SELECTOR", requires = "link_selector")]
    label_selector: Option<String>,

    /// CSS selector for record links (href attribute)
    #[arg(long, value_name = "SELECTOR", requires = "label_selector")]
    link_selector: Option<String>,

    /// Skip identity rotation even if a control endpoint is configured
    #[arg(long)]
    no_rotate: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    if cli.no_rotate {
        config.control = None;
    }

    let target = Target {
        url: cli.url,
        method: if cli.post { Method::Post } else { Method::Get },
        form_data: parse_form_fields(&cli.form)?,
        title: cli.title,
    };

    let rule = match (cli.label_selector, cli.link_selector) {
        (Some(label_selector), Some(link_selector)) => Some(ExtractionRule {
            label_selector,
            link_selector,
        }),
        _ => None,
    };

    match crawl(config, target, rule).await {
        JobOutcome::Success { files } => {
            for file in &files {
                println!("{}", file.display());
            }
            Ok(())
        }
        JobOutcome::Failure(e) => Err(e.into()),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("onion_snapshot=info,warn"),
            1 => EnvFilter::new("onion_snapshot=debug,info"),
            2 => EnvFilter::new("onion_snapshot=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Parses repeated KEY=VALUE form flags into ordered pairs
fn parse_form_fields(fields: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    let mut pairs = Vec::with_capacity(fields.len());

    for field in fields {
        match field.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                pairs.push((key.to_string(), value.to_string()));
            }
            _ => bail!("invalid --form value '{}', expected KEY=VALUE", field),
        }
    }

    Ok(pairs)
}
