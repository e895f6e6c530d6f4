//! Upstream target resolution.
//!
//! # Responsibilities
//! - Classify absolute-URI (proxy form) vs origin-form requests
//! - Derive host, port, forward path and the Host value to send
//! - Resolve CONNECT authorities
//!
//! # Design Decisions
//! - The forward path is sliced from the raw request-target, never re-serialized
//! - Origin-form requests without a Host header are rejected, never guessed

use url::{Host, Url};

use crate::error::ProxyError;
use crate::http::authority::{parse_authority, HostPort};
use crate::http::request::FramedRequest;

pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;

/// Where a plain HTTP request is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub host: String,
    pub port: u16,
    /// Request-target written on the forwarded request line.
    pub forward_path: String,
    /// Host value injected when the client sent none.
    pub host_header: Option<String>,
}

impl UpstreamTarget {
    pub fn connect_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }

    pub fn authority(&self) -> HostPort {
        HostPort {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

/// Resolve the origin for a non-CONNECT request.
pub fn resolve_target(request: &FramedRequest) -> Result<UpstreamTarget, ProxyError> {
    let uri = request.target.as_str();
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return resolve_absolute(uri);
    }

    let host_value = request
        .host
        .as_deref()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ProxyError::BadRequest(format!("no Host header for {uri:?}")))?;

    let authority = parse_authority(host_value, HTTP_PORT)?;
    if authority.host.is_empty() {
        return Err(ProxyError::BadRequest(format!("empty host in {host_value:?}")));
    }

    Ok(UpstreamTarget {
        host: authority.host,
        port: authority.port,
        forward_path: uri.to_string(),
        host_header: Some(host_value.to_string()),
    })
}

/// Resolve the tunnel endpoint of a CONNECT request.
pub fn resolve_connect(request: &FramedRequest) -> Result<HostPort, ProxyError> {
    let authority = parse_authority(&request.target, HTTPS_PORT)?;
    if authority.host.is_empty() {
        return Err(ProxyError::BadRequest(format!(
            "empty CONNECT host in {:?}",
            request.target
        )));
    }
    Ok(authority)
}

fn resolve_absolute(uri: &str) -> Result<UpstreamTarget, ProxyError> {
    let url = Url::parse(uri)
        .map_err(|e| ProxyError::BadRequest(format!("invalid URI {uri:?}: {e}")))?;

    let host = match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        _ => return Err(ProxyError::BadRequest(format!("no host in {uri:?}"))),
    };
    let host_str = url.host_str().unwrap_or(host.as_str());

    let port = url
        .port_or_known_default()
        .ok_or_else(|| ProxyError::BadRequest(format!("no port for {uri:?}")))?;

    // `Url` drops ports equal to the scheme default.
    let host_header = match url.port() {
        Some(explicit) => format!("{host_str}:{explicit}"),
        None => host_str.to_string(),
    };

    Ok(UpstreamTarget {
        host,
        port,
        forward_path: origin_form(uri),
        host_header: Some(host_header),
    })
}

/// Path and query of an absolute URI, as sent by the client.
fn origin_form(uri: &str) -> String {
    let after_scheme = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    let rest = after_scheme
        .find(['/', '?', '#'])
        .map_or("", |idx| &after_scheme[idx..]);
    let rest = rest.split('#').next().unwrap_or_default();

    if rest.is_empty() {
        "/".to_string()
    } else if rest.starts_with('?') {
        format!("/{rest}")
    } else {
        rest.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(target: &str, host: Option<&str>) -> FramedRequest {
        FramedRequest {
            method: "GET".into(),
            target: target.into(),
            version: "HTTP/1.1".into(),
            host: host.map(str::to_string),
            headers: host.map(|h| format!("Host: {h}")).into_iter().collect(),
            body_prefix: Vec::new(),
        }
    }

    #[test]
    fn absolute_uri_with_default_port() {
        let target = resolve_target(&request("http://example.com/path?x=1", None)).unwrap();
        assert_eq!(
            target,
            UpstreamTarget {
                host: "example.com".into(),
                port: 80,
                forward_path: "/path?x=1".into(),
                host_header: Some("example.com".into()),
            }
        );
    }

    #[test]
    fn absolute_uri_keeps_non_default_port_in_host() {
        let target = resolve_target(&request("http://example.com:8080/a", None)).unwrap();
        assert_eq!(target.port, 8080);
        assert_eq!(target.host_header.as_deref(), Some("example.com:8080"));

        let target = resolve_target(&request("https://example.com:443/a", None)).unwrap();
        assert_eq!(target.port, 443);
        assert_eq!(target.host_header.as_deref(), Some("example.com"));
    }

    #[test]
    fn https_scheme_defaults_to_443() {
        let target = resolve_target(&request("https://secure.test", None)).unwrap();
        assert_eq!(target.port, 443);
        assert_eq!(target.forward_path, "/");
    }

    #[test]
    fn forward_path_is_not_normalized() {
        let target = resolve_target(&request("http://h/a/../b%2f?q=%20&r#frag", None)).unwrap();
        assert_eq!(target.forward_path, "/a/../b%2f?q=%20&r");

        let target = resolve_target(&request("http://h?only=query", None)).unwrap();
        assert_eq!(target.forward_path, "/?only=query");
    }

    #[test]
    fn absolute_ipv6_host() {
        let target = resolve_target(&request("http://[::1]:8080/x", None)).unwrap();
        assert_eq!(target.host, "::1");
        assert_eq!(target.host_header.as_deref(), Some("[::1]:8080"));
    }

    #[test]
    fn absolute_uri_without_host_is_bad_request() {
        let err = resolve_target(&request("http://:8080/nohost", None)).unwrap_err();
        assert!(matches!(err, ProxyError::BadRequest(_)));
    }

    #[test]
    fn origin_form_uses_host_header() {
        let target = resolve_target(&request("/index.html?a=b", Some("intranet:8000"))).unwrap();
        assert_eq!(target.host, "intranet");
        assert_eq!(target.port, 8000);
        assert_eq!(target.forward_path, "/index.html?a=b");
        assert_eq!(target.host_header.as_deref(), Some("intranet:8000"));
    }

    #[test]
    fn origin_form_without_host_is_never_guessed() {
        for host in [None, Some("")] {
            let err = resolve_target(&request("bad_host_with_no_colon_and_empty_host", host))
                .unwrap_err();
            assert!(matches!(err, ProxyError::BadRequest(_)));
        }
    }

    #[test]
    fn connect_defaults_to_443() {
        let mut req = request("example.com", None);
        req.method = "CONNECT".into();
        let target = resolve_connect(&req).unwrap();
        assert_eq!((target.host.as_str(), target.port), ("example.com", 443));

        req.target = "[2001:db8::2]:8443".into();
        let target = resolve_connect(&req).unwrap();
        assert_eq!((target.host.as_str(), target.port), ("2001:db8::2", 8443));
    }

    #[test]
    fn connect_with_empty_host_is_rejected() {
        let mut req = request(":443", None);
        req.method = "CONNECT".into();
        assert!(matches!(
            resolve_connect(&req),
            Err(ProxyError::BadRequest(_))
        ));
    }
}
