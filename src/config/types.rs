use serde::Deserialize;

/// Main configuration structure for Onion-Snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub client: ClientConfig,

    /// Identity-rotation control endpoint; omit the section to skip rotation
    #[serde(default)]
    pub control: Option<ControlConfig>,

    #[serde(default)]
    pub output: OutputConfig,
}

/// HTTP client configuration
///
/// Headers, cookies, and the proxy endpoint are configuration values rather
/// than hardcoded constants; the pipeline itself is site-agnostic.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Forwarding proxy all requests route through (e.g. "http://127.0.0.1:8118")
    #[serde(rename = "proxy-url")]
    pub proxy_url: String,

    /// User-Agent header sent on every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Referer header sent on every request
    pub referer: String,

    /// Cookies attached to POST requests only (session tokens for form targets)
    #[serde(default)]
    pub cookies: Vec<CookieEntry>,

    /// Echo endpoint queried before each crawl to report the apparent address
    #[serde(rename = "probe-url", default = "default_probe_url")]
    pub probe_url: String,

    /// Request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// A single named cookie value
#[derive(Debug, Clone, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
}

/// Anonymizing-network control endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    /// Control endpoint host (e.g. "127.0.0.1")
    pub host: String,

    /// Control endpoint port (e.g. 9051)
    pub port: u16,

    /// Control passphrase; may be empty
    #[serde(default)]
    pub passphrase: String,

    /// Control connection timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_control_timeout_secs")]
    pub timeout_secs: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory run artifacts are written under
    #[serde(default = "default_output_root")]
    pub root: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            root: default_output_root(),
        }
    }
}

fn default_probe_url() -> String {
    "http://icanhazip.com".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_control_timeout_secs() -> u64 {
    10
}

fn default_output_root() -> String {
    "output".to_string()
}
