//! URL helpers shared by the gateway, the renderer and the orchestrator.

use anyhow::{Result, anyhow};
use url::Url;

/// Check if a URL is something the crawler can render and archive
///
/// Only absolute `http`/`https` URLs with a host qualify; `data:`,
/// `javascript:`, `mailto:` and friends are rejected.
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// Whether two URLs share scheme, host and effective port
#[must_use]
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Derive the canonical live URL for a request that reached the gateway
///
/// The request keeps its path, query and fragment; scheme, host and port are
/// taken from `live_origin`, so a request addressed to the worker (for example
/// `localhost:8787`) never leaks its local port into the live URL.
///
/// # Errors
///
/// Fails when the live origin cannot carry a host (e.g. a `data:` URL).
pub fn canonicalize_request_url(request: &Url, live_origin: &Url) -> Result<Url> {
    if live_origin.cannot_be_a_base() || live_origin.host_str().is_none() {
        return Err(anyhow!("Live origin {live_origin} has no host"));
    }

    let mut canonical = live_origin.clone();
    canonical.set_path(request.path());
    canonical.set_query(request.query());
    canonical.set_fragment(request.fragment());

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("test URL")
    }

    #[test]
    fn local_request_maps_onto_live_origin() {
        let canonical = canonicalize_request_url(
            &url("http://localhost:8787/docs/intro?lang=en#setup"),
            &url("https://confidence.sh"),
        )
        .expect("canonical");

        assert_eq!(canonical.as_str(), "https://confidence.sh/docs/intro?lang=en#setup");
    }

    #[test]
    fn live_origin_port_is_kept() {
        let canonical = canonicalize_request_url(
            &url("http://localhost:8787/a"),
            &url("http://127.0.0.1:9000"),
        )
        .expect("canonical");

        assert_eq!(canonical.as_str(), "http://127.0.0.1:9000/a");
    }

    #[test]
    fn rejects_origin_without_host() {
        assert!(canonicalize_request_url(&url("http://localhost:8787/a"), &url("data:text/plain,x")).is_err());
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("mailto:someone@example.com"));
        assert!(!is_valid_url("ftp://example.com/file"));
        assert!(!is_valid_url(""));
        assert!(is_valid_url("https://example.com/"));
    }

    #[test]
    fn default_ports_are_same_origin() {
        assert!(same_origin(&url("https://x.dev:443/a"), &url("https://x.dev/b")));
        assert!(!same_origin(&url("http://x.dev/a"), &url("https://x.dev/a")));
    }
}
