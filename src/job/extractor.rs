//! Record extraction from HTML search-result pages
//!
//! This module evaluates a pair of CSS selectors against a fetched document,
//! collecting labels (element text) and links (href attributes) as two
//! document-order lists, then pairs them positionally into records.

use scraper::{Html, Selector};
use thiserror::Error;

/// Errors from record extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Document is not parseable as HTML text: {0}")]
    MalformedDocument(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// A pair of CSS selectors locating repeated result elements
///
/// The label selector yields element text, the link selector yields `href`
/// attribute values. The two are usually the same selector read two ways.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    pub label_selector: String,
    pub link_selector: String,
}

/// One extracted (label, link) pair, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub label: String,
    pub link: String,
}

/// Extracts records from an HTML document using the given rule
///
/// Labels and links are collected independently and zipped positionally up to
/// the shorter length; the persisted output keeps them as two parallel files,
/// so a count mismatch loses the unpaired tail rather than failing the job.
/// Selectors that match nothing yield an empty record list, not an error.
///
/// # Arguments
///
/// * `document` - The fetched response body
/// * `rule` - Label and link selectors to evaluate
///
/// # Returns
///
/// * `Ok(Vec<Record>)` - Extracted records, possibly empty
/// * `Err(ExtractError)` - Undecodable document or unparseable selector
///
/// # Example
///
/// ```
/// use onion_snapshot::job::{extract, ExtractionRule};
///
/// let html = br#"<div class="media-body"><a href="/a">Item1</a></div>"#;
/// let rule = ExtractionRule {
///     label_selector: "div.media-body a".to_string(),
///     link_selector: "div.media-body a".to_string(),
/// };
/// let records = extract(html, &rule).unwrap();
/// assert_eq!(records[0].label, "Item1");
/// assert_eq!(records[0].link, "/a");
/// ```
pub fn extract(document: &[u8], rule: &ExtractionRule) -> Result<Vec<Record>, ExtractError> {
    let text = std::str::from_utf8(document)
        .map_err(|e| ExtractError::MalformedDocument(e.to_string()))?;

    let label_selector = parse_selector(&rule.label_selector)?;
    let link_selector = parse_selector(&rule.link_selector)?;

    let html = Html::parse_document(text);

    let labels: Vec<String> = html
        .select(&label_selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .collect();

    let links: Vec<String> = html
        .select(&link_selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.to_string())
        .collect();

    if labels.len() != links.len() {
        tracing::warn!(
            labels = labels.len(),
            links = links.len(),
            "label/link count mismatch; pairing up to the shorter list"
        );
    }

    Ok(labels
        .into_iter()
        .zip(links)
        .map(|(label, link)| Record { label, link })
        .collect())
}

/// Parses a CSS selector string into a typed error on failure
fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}
