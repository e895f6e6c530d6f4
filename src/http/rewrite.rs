//! Forward request construction.
//!
//! Hop-by-hop connection headers are dropped, a Host header is injected when
//! the client sent none, and the upstream is always told to close after one
//! response so no upstream keep-alive state exists.

use crate::http::latin1;
use crate::http::request::{field_name, is_host_line, FramedRequest};
use crate::http::target::UpstreamTarget;

const HOP_BY_HOP: [&str; 2] = ["proxy-connection", "connection"];

fn is_hop_by_hop(line: &str) -> bool {
    field_name(line).is_some_and(|name| {
        HOP_BY_HOP
            .iter()
            .any(|hop| name.trim().eq_ignore_ascii_case(hop))
    })
}

/// Build the header block sent to the origin server.
pub fn build_forward_header(request: &FramedRequest, target: &UpstreamTarget) -> Vec<u8> {
    let mut out = format!(
        "{} {} {}\r\n",
        request.method, target.forward_path, request.version
    );

    let mut has_host = false;
    for line in &request.headers {
        if is_host_line(line) {
            has_host = true;
        }
        if is_hop_by_hop(line) {
            continue;
        }
        out.push_str(line);
        out.push_str("\r\n");
    }

    if !has_host {
        if let Some(host) = &target.host_header {
            out.push_str("Host: ");
            out.push_str(host);
            out.push_str("\r\n");
        }
    }

    out.push_str("Connection: close\r\n\r\n");
    latin1::encode(&out)
}
