//! Origin canonicalization.
//!
//! Canonical equivalence of origins decides which budget counter a spend
//! lands on, so this function is a security boundary: two spellings of the
//! same origin must collapse to one counter, and anything that is not a
//! bare https origin is rejected outright.

use url::{Host, Url};

use crate::error::{OriginError, OriginResult};

/// Canonicalize an origin string.
///
/// Contract: lowercase scheme and host; IDNA-to-ASCII (punycode) the host;
/// https only; no userinfo, path, query, or fragment; trailing dots
/// stripped from the host (a now-empty host is rejected); default port 443
/// omitted; IPv6 literals normalized inside brackets.
pub fn canonical_origin(raw: &str) -> OriginResult<String> {
    let parsed = Url::parse(raw).map_err(|_| OriginError::InvalidOrigin)?;

    // Url lowercases the scheme during parsing.
    if parsed.scheme() != "https" {
        return Err(OriginError::MustBeHttps);
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(OriginError::InvalidOrigin);
    }

    // For https URLs the parser normalizes an absent path to "/".
    if !matches!(parsed.path(), "" | "/") {
        return Err(OriginError::MustNotContainPathQueryFragment);
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(OriginError::MustNotContainPathQueryFragment);
    }

    // Url has already lowercased the host and applied IDNA-to-ASCII.
    let host = match parsed.host() {
        Some(Host::Domain(domain)) => {
            let trimmed = domain.trim_end_matches('.');
            if trimmed.is_empty() {
                return Err(OriginError::InvalidHostname);
            }
            trimmed.to_string()
        }
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => format!("[{}]", addr),
        None => return Err(OriginError::InvalidHostname),
    };

    // port() is None when the port is the scheme default.
    Ok(match parsed.port() {
        Some(port) => format!("https://{}:{}", host, port),
        None => format!("https://{}", host),
    })
}
