//! Base URL derivation for runs against a dev server

use e2e_builder_common::BuilderOutput;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use url::Url;

use crate::server::ServerOptions;

static HAS_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+://").expect("static regex"));

/// Work out the base URL of a running dev server.
///
/// In order: the declared public host, the URL the server reported, then
/// scheme, `host` and the reported port. `None` when none of those exist.
pub fn derive_base_url(
    server: &ServerOptions,
    result: &BuilderOutput,
    host: &str,
) -> Option<String> {
    if let Some(public_host) = &server.public_host {
        return Some(public_host_url(public_host, server.ssl));
    }
    if let Some(base_url) = &result.base_url {
        return Some(base_url.clone());
    }
    result
        .port
        .map(|port| host_port_url(server.scheme(), host, port))
}

/// Give a public host a scheme if it has none and normalize it through a
/// parse/format round trip.
pub fn public_host_url(public_host: &str, ssl: bool) -> String {
    let with_scheme = if HAS_SCHEME.is_match(public_host) {
        public_host.to_string()
    } else {
        let scheme = if ssl { "https" } else { "http" };
        format!("{}://{}", scheme, public_host)
    };

    match Url::parse(&with_scheme) {
        Ok(parsed) => {
            let mut formatted = parsed.to_string();
            // The parser always gives an empty path a "/"; keep the input's shape.
            let bare_origin = parsed.path() == "/"
                && parsed.query().is_none()
                && parsed.fragment().is_none();
            if bare_origin && !with_scheme.ends_with('/') && formatted.ends_with('/') {
                formatted.pop();
            }
            formatted
        }
        Err(e) => {
            warn!("Could not parse public host {:?}: {}", with_scheme, e);
            with_scheme
        }
    }
}

/// `scheme://host:port`, bracketing IPv6 literals
pub fn host_port_url(scheme: &str, host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("{}://[{}]:{}", scheme, host, port)
    } else {
        format!("{}://{}:{}", scheme, host, port)
    }
}

/// The runner treats the base URL as a directory, so it has to end in `/`.
pub fn ensure_trailing_slash(mut base_url: String) -> String {
    if !base_url.is_empty() && !base_url.ends_with('/') {
        base_url.push('/');
    }
    base_url
}
