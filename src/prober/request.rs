use std::fmt::Write;

use super::{RequestFlags, Target};

const USER_AGENT: &str = concat!("httpbox/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "text/xml,application/xml,application/xhtml+xml,text/html;q=0.9,text/plain;q=0.8,image/png,*/*;q=0.5";
const ACCEPT_LANGUAGE: &str = "en-us,en;q=0.5";
const ACCEPT_CHARSET: &str = "ISO-8859-1,utf-8;q=0.7,*;q=0.7";
const DEFAULT_HTTP_PORT: u16 = 80;

/// Build the full request text for one cycle. The request never has a body.
pub fn build_request(target: &Target, flags: RequestFlags) -> Vec<u8> {
    let method = if flags.use_head_method { "HEAD" } else { "GET" };
    let version = if flags.use_http10 { "HTTP/1.0" } else { "HTTP/1.1" };

    let mut req = String::with_capacity(512);
    let _ = write!(req, "{method} {} {version}\r\n", target.path);
    let _ = write!(req, "Host: {}", target.host);
    if target.port != DEFAULT_HTTP_PORT {
        let _ = write!(req, ":{}", target.port);
    }
    req.push_str("\r\n");
    let _ = write!(req, "User-Agent: {USER_AGENT}\r\n");
    let _ = write!(req, "Accept: {ACCEPT}\r\n");
    let _ = write!(req, "Accept-Language: {ACCEPT_LANGUAGE}\r\n");
    if flags.accept_compression {
        req.push_str("Accept-Encoding: gzip,deflate\r\n");
    }
    let _ = write!(req, "Accept-Charset: {ACCEPT_CHARSET}\r\n");
    req.push_str("Connection: close\r\n\r\n");
    req.into_bytes()
}
