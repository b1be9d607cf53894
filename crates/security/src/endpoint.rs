//! Outbound fetch guard for `web_fetch`.
//!
//! Only http(s) URLs are fetched, and never to loopback, private, link-local
//! or metadata addresses.

use std::net::{Ipv4Addr, Ipv6Addr};

use alin_core::ToolError;
use url::{Host, Url};

/// Parse and validate a URL for fetching.
///
/// Parsing uses the same WHATWG rules as the HTTP client, so numeric host
/// forms such as `0x7f000001` or `127.1` are checked as the address they
/// actually name.
pub fn check_fetch_url(raw: &str) -> Result<Url, ToolError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ToolError::InvalidArguments(format!("invalid URL {raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ToolError::InvalidArguments(format!("only http(s) URLs can be fetched: {raw}")));
    }
    if url.host().is_none() {
        return Err(ToolError::InvalidArguments(format!("URL has no host: {raw}")));
    }
    if is_private_url(&url) {
        let host = url.host_str().unwrap_or_default();
        return Err(ToolError::ExecutionFailed(format!(
            "refusing to fetch private or internal address {host}"
        )));
    }
    Ok(url)
}

/// Whether the URL's host names this machine or a private/internal network.
/// URLs without a host count as private.
pub fn is_private_url(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(name)) => is_private_domain(name),
        Some(Host::Ipv4(ip)) => is_private_v4(ip),
        Some(Host::Ipv6(ip)) => is_private_v6(ip),
        None => true,
    }
}

fn is_private_domain(name: &str) -> bool {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    name == "localhost" || name.ends_with(".localhost") || name.ends_with(".internal")
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // carrier-grade NAT 100.64.0.0/10
        || (ip.octets()[0] == 100 && (ip.octets()[1] & 0xc0) == 64)
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_private_v4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00 // unique local
        || (first & 0xffc0) == 0xfe80 // link local
}
