//! Kumascope configuration
use std::time::Duration;

use clap::Parser;
use url::Url;

/// Valid polling interval presets in seconds. Out-of-range values are
/// normalized to the nearest preset.
pub const INTERVAL_PRESETS: [u64; 5] = [30, 60, 120, 300, 600];

/// Default polling interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 120;

/// CLI options for kumascope
#[derive(Debug, Clone, Parser)]
pub struct Opts {
    /// Metrics endpoint of the uptime server (e.g. `http://host:3001/metrics`)
    #[clap(long, env = "KUMA_METRICS_URL", default_value = "")]
    pub metrics_url: String,
    /// HTTP basic auth username
    #[clap(long, env = "KUMA_USERNAME", default_value = "")]
    pub username: String,
    /// HTTP basic auth password
    #[clap(long, env = "KUMA_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,
    /// Polling interval in seconds, normalized to the nearest preset
    #[clap(long, env = "KUMA_REFRESH_INTERVAL_SECS", default_value = "120")]
    pub refresh_interval_secs: u64,
    /// Status page slugs to resolve into grouped sections
    #[clap(long, env = "KUMA_STATUS_PAGES", value_delimiter = ',', num_args = 0..)]
    pub status_pages: Vec<String>,
    /// Enable the status-page grouping sub-fetch
    #[clap(long, env = "KUMA_GROUPING_ENABLED")]
    pub grouping_enabled: bool,
}

/// Immutable configuration snapshot for one polling session.
///
/// If configuration changes mid-cycle, the change takes effect only on the
/// next restart, never retroactively.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Metrics endpoint URL; empty means "not configured yet".
    pub metrics_url: String,
    /// Basic auth username; empty disables authentication.
    pub username: String,
    /// Basic auth password; empty disables authentication.
    pub password: String,
    /// Interval between polling cycles.
    pub refresh_interval: Duration,
    /// Status page slugs, in the order sections should be built.
    pub status_pages: Vec<String>,
    /// Whether the grouping sub-fetch runs at all.
    pub grouping_enabled: bool,
}

impl PollerConfig {
    /// Builds a snapshot from parsed CLI options, normalizing the interval.
    pub fn from_opts(opts: &Opts) -> Self {
        Self {
            metrics_url: opts.metrics_url.trim().to_owned(),
            username: opts.username.clone(),
            password: opts.password.clone(),
            refresh_interval: Duration::from_secs(normalize_interval(opts.refresh_interval_secs)),
            status_pages: opts.status_pages.clone(),
            grouping_enabled: opts.grouping_enabled,
        }
    }

    /// Whether an endpoint has been configured at all.
    pub fn is_configured(&self) -> bool {
        !self.metrics_url.trim().is_empty()
    }

    /// Base URL for status-page requests: the metrics endpoint with path,
    /// query and fragment stripped. `None` when the endpoint is not a
    /// usable URL.
    pub fn status_page_base(&self) -> Option<Url> {
        let mut url = Url::parse(self.metrics_url.trim()).ok()?;
        url.host_str()?;
        url.set_path("");
        url.set_query(None);
        url.set_fragment(None);
        Some(url)
    }
}

/// Normalizes a polling interval to the nearest preset value.
pub fn normalize_interval(secs: u64) -> u64 {
    INTERVAL_PRESETS
        .into_iter()
        .min_by_key(|preset| preset.abs_diff(secs))
        .unwrap_or(DEFAULT_INTERVAL_SECS)
}

/// Validates a metrics endpoint: it must parse as a URL, use an http or
/// https scheme, and include a hostname. An empty string is accepted (it
/// drives the needs-setup state instead of an error).
pub fn validate_endpoint(raw: &str) -> Result<(), String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    let url = Url::parse(trimmed).map_err(|_| "invalid URL format".to_owned())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err("URL must start with http:// or https://".to_owned());
    }
    if url.host_str().is_none() {
        return Err("URL must include a hostname".to_owned());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Opts::command().debug_assert()
    }

    #[test]
    fn presets_normalize_to_nearest() {
        assert_eq!(normalize_interval(0), 30);
        assert_eq!(normalize_interval(30), 30);
        assert_eq!(normalize_interval(44), 30);
        assert_eq!(normalize_interval(46), 60);
        assert_eq!(normalize_interval(120), 120);
        assert_eq!(normalize_interval(500), 600);
        assert_eq!(normalize_interval(10_000), 600);
    }

    #[test]
    fn empty_endpoint_is_accepted() {
        assert!(validate_endpoint("").is_ok());
        assert!(validate_endpoint("   ").is_ok());
    }

    #[test]
    fn valid_endpoints_pass() {
        assert!(validate_endpoint("http://192.168.1.10:3001/metrics").is_ok());
        assert!(validate_endpoint("https://kuma.example.com/metrics").is_ok());
    }

    #[test]
    fn invalid_endpoints_are_rejected() {
        assert!(validate_endpoint("not a url").is_err());
        assert!(validate_endpoint("ftp://example.com/metrics").is_err());
        assert!(validate_endpoint("http://").is_err());
    }

    #[test]
    fn status_page_base_strips_path() {
        let config = PollerConfig {
            metrics_url: "http://kuma.local:3001/metrics?x=1#frag".to_owned(),
            username: String::new(),
            password: String::new(),
            refresh_interval: Duration::from_secs(120),
            status_pages: Vec::new(),
            grouping_enabled: false,
        };
        assert_eq!(config.status_page_base().unwrap().as_str(), "http://kuma.local:3001/");
    }

    #[test]
    fn status_page_base_requires_usable_url() {
        let config = PollerConfig {
            metrics_url: "not a url".to_owned(),
            username: String::new(),
            password: String::new(),
            refresh_interval: Duration::from_secs(120),
            status_pages: Vec::new(),
            grouping_enabled: false,
        };
        assert!(config.status_page_base().is_none());
    }
}
