use std::net::IpAddr;

use url::{Position, Url};

use crate::error::ProbeError;
use crate::prober::Target;

const DEFAULT_PORT: u16 = 80;

/// Turn a loosely written URL (`example.com`, `host:8080/path?q`,
/// `http://host/`) into a [`Target`]. The port defaults to 80 whatever the
/// scheme, since only plain HTTP is spoken.
pub fn parse_target(raw: &str) -> Result<Target, ProbeError> {
    let invalid = |reason: String| ProbeError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host".to_string()))?;

    let port = match url.port() {
        Some(0) | None => DEFAULT_PORT,
        Some(port) => port,
    };
    let path = &url[Position::BeforePath..Position::AfterQuery];
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    Ok(Target {
        scheme: url.scheme().to_string(),
        host: host.to_string(),
        port,
        path,
    })
}

pub async fn resolve_host_to_ip(host: &str) -> Result<IpAddr, ProbeError> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    // First try to parse as IP address
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(ip);
    }

    // If parsing fails, resolve via DNS
    let resolve_err = |source| ProbeError::Resolve {
        host: host.to_string(),
        source,
    };
    let addr = format!("{}:0", host);
    let mut addrs = tokio::net::lookup_host(&addr).await.map_err(resolve_err)?;
    addrs
        .next()
        .map(|a| a.ip())
        .ok_or_else(|| resolve_err(std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found")))
}
