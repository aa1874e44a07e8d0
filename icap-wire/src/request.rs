//! ICAP request description and wire serialization.
//!
//! This module defines:
//! - [`Request`]: method, service, ICAP headers and the ordered list of
//!   encapsulated body parts.
//! - [`build`]: turns a [`Request`] into the exact bytes sent to the server.
//!
//! Body parts are laid out in the order they were added and their offsets
//! land in the `Encapsulated` header. Header parts are expected before body
//! parts; [`build`] does not enforce it, [`Request::validate_order`] does on
//! demand.
//!
//! # Example (RESPMOD with an encapsulated HTTP response)
//! ```rust
//! use icap_wire::{Request, SectionKind};
//!
//! let req = Request::respmod("example")
//!     .part(SectionKind::ResHdr, "HTTP/1.1 200 OK\r\n\r\n")
//!     .part(SectionKind::ResBody, "hi");
//!
//! let wire = icap_wire::request::build("127.0.0.1", "demo/1.0", &req);
//! let text = String::from_utf8(wire).unwrap();
//! assert!(text.starts_with("RESPMOD icap://127.0.0.1/example ICAP/1.0\r\n"));
//! assert!(text.contains("Encapsulated: res-hdr=0, res-body=19\r\n"));
//! assert!(text.ends_with("2\r\nhi\r\n0\r\n\r\n"));
//! ```

use crate::ICAP_VERSION;
use crate::error::IcapResult;
use crate::headers::Headers;
use crate::parser::encapsulated::{self, ENCAPSULATED, SectionKind};
use http::{Request as HttpRequest, Response as HttpResponse, Version};
use tracing::{debug, trace};

/// ICAP request to be serialized by [`build`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// ICAP method: `"OPTIONS" | "REQMOD" | "RESPMOD"`.
    pub method: String,
    /// Service path like `"example"`. A leading slash is allowed.
    pub service: String,
    /// ICAP headers in emission order.
    pub headers: Headers,
    /// Encapsulated sections in layout order.
    pub body_parts: Vec<(SectionKind, Vec<u8>)>,
}

impl Request {
    pub fn new(method: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            service: service.into(),
            headers: Headers::new(),
            body_parts: Vec::new(),
        }
    }

    pub fn options(service: impl Into<String>) -> Self {
        Self::new("OPTIONS", service)
    }
    pub fn reqmod(service: impl Into<String>) -> Self {
        Self::new("REQMOD", service)
    }
    pub fn respmod(service: impl Into<String>) -> Self {
        Self::new("RESPMOD", service)
    }

    /// Set/override an ICAP header (exact name).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add an encapsulated section. A section of the same kind is replaced
    /// in place, so each kind appears at most once.
    pub fn part(mut self, kind: SectionKind, data: impl AsRef<[u8]>) -> Self {
        let data = data.as_ref().to_vec();
        match self.body_parts.iter_mut().find(|(k, _)| *k == kind) {
            Some(slot) => slot.1 = data,
            None => self.body_parts.push((kind, data)),
        }
        self
    }

    /// Add several sections at once, with the same replacement rule as [`Request::part`].
    pub fn parts<I, B>(self, parts: I) -> Self
    where
        I: IntoIterator<Item = (SectionKind, B)>,
        B: AsRef<[u8]>,
    {
        parts
            .into_iter()
            .fold(self, |req, (kind, data)| req.part(kind, data))
    }

    /// Encapsulate an HTTP request as `req-hdr` (+ `req-body` when the body is non-empty).
    pub fn with_http_request(self, req: &HttpRequest<Vec<u8>>) -> Self {
        let head = serialize_http_request_head(req);
        self.with_http_parts(SectionKind::ReqHdr, SectionKind::ReqBody, head, req.body())
    }

    /// Encapsulate an HTTP response as `res-hdr` (+ `res-body` when the body is non-empty).
    pub fn with_http_response(self, resp: &HttpResponse<Vec<u8>>) -> Self {
        let head = serialize_http_response_head(resp);
        self.with_http_parts(SectionKind::ResHdr, SectionKind::ResBody, head, resp.body())
    }

    fn with_http_parts(
        self,
        hdr: SectionKind,
        body_kind: SectionKind,
        head: String,
        body: &[u8],
    ) -> Self {
        let req = self.part(hdr, head);
        if body.is_empty() {
            req
        } else {
            req.part(body_kind, body)
        }
    }

    /// True for REQMOD/RESPMOD.
    #[inline]
    pub fn is_mod(&self) -> bool {
        self.method.eq_ignore_ascii_case("REQMOD") || self.method.eq_ignore_ascii_case("RESPMOD")
    }

    /// Optional check of the header-before-body section layout.
    pub fn validate_order(&self) -> IcapResult<()> {
        encapsulated::validate_order(&self.body_parts)
    }
}

/// Serialize `req` for the server at `host`.
///
/// `Host`, `User-Agent` and `Connection: close` are added only when the
/// request does not carry them already. When body parts are present the
/// `Encapsulated` header is computed from them, replacing any caller value.
pub fn build(host: &str, user_agent: &str, req: &Request) -> Vec<u8> {
    let mut headers = req.headers.clone();
    headers.insert_default("Host", host);
    headers.insert_default("User-Agent", user_agent);
    headers.insert_default("Connection", "close");

    let enc = encapsulated::compute(&req.body_parts);
    if !enc.offsets.is_empty() {
        headers.set(ENCAPSULATED, enc.header_value());
    }

    let mut out = Vec::with_capacity(256 + enc.body.len());
    out.extend_from_slice(
        format!(
            "{} icap://{}/{} {}\r\n",
            req.method,
            host,
            trim_leading_slash(&req.service),
            ICAP_VERSION
        )
        .as_bytes(),
    );
    headers.write_to(&mut out);
    out.extend_from_slice(b"\r\n");
    let head_len = out.len();
    out.extend_from_slice(&enc.body);

    debug!(
        "build: {} {} sections={}",
        req.method,
        req.service,
        enc.offsets.len()
    );
    trace!("build: head_len={} total_len={}", head_len, out.len());
    out
}

fn trim_leading_slash(s: &str) -> &str {
    s.strip_prefix('/').unwrap_or(s)
}

fn http_version_str(v: Version) -> &'static str {
    match v {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// Request line and headers of an embedded HTTP request, blank line included.
fn serialize_http_request_head(req: &HttpRequest<Vec<u8>>) -> String {
    let mut out = format!(
        "{} {} {}\r\n",
        req.method(),
        req.uri(),
        http_version_str(req.version())
    );
    write_http_headers(&mut out, req.headers());
    out
}

/// Status line and headers of an embedded HTTP response, blank line included.
fn serialize_http_response_head(resp: &HttpResponse<Vec<u8>>) -> String {
    let code = resp.status();
    let mut out = format!(
        "{} {} {}\r\n",
        http_version_str(resp.version()),
        code.as_u16(),
        code.canonical_reason().unwrap_or("")
    );
    write_http_headers(&mut out, resp.headers());
    out
}

fn write_http_headers(out: &mut String, headers: &http::HeaderMap) {
    for (name, value) in headers.iter() {
        out.push_str(name.as_str());
        out.push_str(": ");
        out.push_str(value.to_str().unwrap_or_default());
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
}
