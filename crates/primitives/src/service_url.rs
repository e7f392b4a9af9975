use url::Url;

/// Health-check paths that are stripped when deriving a service URL.
const HEALTH_CHECK_PATHS: [&str; 9] = [
    "/ping",
    "/health",
    "/healthcheck",
    "/healthz",
    "/api/health",
    "/api/healthcheck",
    "/api/ping",
    "/_health",
    "/status",
];

/// Path terms that, combined with an `/api/` segment, mark a health endpoint.
const HEALTH_TERMS: [&str; 4] = ["health", "ping", "status", "check"];

/// Derives a browsable service URL from a monitor's health-check URL by
/// stripping well-known health-check paths. URLs that do not match any
/// pattern, or that fail to parse, are returned unchanged.
pub fn service_url(health_check_url: &str) -> String {
    let Ok(url) = Url::parse(health_check_url) else {
        return health_check_url.to_owned();
    };
    let Some(host) = url.host_str() else {
        return health_check_url.to_owned();
    };

    let path = url.path().to_lowercase();

    let is_health_path = HEALTH_CHECK_PATHS.iter().any(|p| path == *p)
        || (path.contains("/api/") && HEALTH_TERMS.iter().any(|t| path.contains(t)));
    if !is_health_path {
        return health_check_url.to_owned();
    }

    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    format!("{}://{host}{port}/", url.scheme())
}
