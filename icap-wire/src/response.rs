//! ICAP response parsing.
//!
//! This module defines:
//! - [`Response`]: status line fields, ICAP headers, the raw encapsulated area
//!   and the sections recovered from it.
//! - [`parse_response`] / [`parse_response_with`]: single-pass parser over a
//!   complete response buffer.
//!
//! The parser walks the buffer once: status line, then header lines up to the
//! first empty line, then everything after the first blank line becomes
//! [`Response::raw_body`]. When an `Encapsulated` header is present its offsets
//! are resolved against the raw body to fill [`Response::sections`].
//!
//! # Example
//!
//! ```rust
//! use icap_wire::{Response, SectionKind};
//!
//! let raw = b"ICAP/1.0 200 OK\r\n\
//!             ISTag: \"policy-1\"\r\n\
//!             Encapsulated: res-hdr=0, res-body=19\r\n\
//!             \r\n\
//!             HTTP/1.1 200 OK\r\n\r\n\
//!             2\r\nhi\r\n0\r\n\r\n";
//!
//! let resp = Response::from_raw(raw).unwrap();
//! assert_eq!(resp.status_code, "200");
//! assert_eq!(resp.section(SectionKind::ResHdr), Some(&b"HTTP/1.1 200 OK\r\n\r\n"[..]));
//! assert_eq!(resp.section(SectionKind::ResBody), Some(&b"hi"[..]));
//! ```

use crate::error::{Error, IcapResult};
use crate::headers::Headers;
use crate::parser::encapsulated::{ChunkPolicy, ENCAPSULATED, SectionKind, extract_sections};
use crate::parser::{find_blank_line, find_line_end};
use indexmap::IndexMap;
use std::fmt;
use tracing::{debug, trace};

/// Prefix every ICAP status line starts with.
const ICAP_PREFIX: &str = "ICAP/";

/// Parsed ICAP response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Protocol token of the status line (usually `"ICAP/1.0"`).
    pub version: String,
    /// Status code as sent by the server (e.g. `"204"`).
    pub status_code: String,
    /// Reason phrase, inner spaces preserved (e.g. `"No Content"`).
    pub status_text: String,
    /// ICAP headers; on duplicates the last value wins.
    pub headers: Headers,
    /// Sections announced by `Encapsulated`, in header order.
    pub sections: IndexMap<SectionKind, Vec<u8>>,
    /// Everything after the blank line closing the ICAP headers.
    pub raw_body: Vec<u8>,
}

impl Response {
    /// Parse an ICAP response from raw bytes, decoding one chunk per body section.
    pub fn from_raw(raw: &[u8]) -> IcapResult<Self> {
        parse_response(raw)
    }

    /// Numeric status code, if the status token is a number.
    pub fn code(&self) -> Option<u16> {
        self.status_code.parse().ok()
    }

    /// Get a header value by exact name.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Content of an encapsulated section.
    pub fn section(&self, kind: SectionKind) -> Option<&[u8]> {
        self.sections.get(&kind).map(Vec::as_slice)
    }

    /// Whether the response indicates success (200 or 204).
    pub fn is_success(&self) -> bool {
        matches!(self.code(), Some(200 | 204))
    }

    /// Whether the response indicates an error (4xx/5xx).
    pub fn is_error(&self) -> bool {
        matches!(self.code(), Some(400..=599))
    }
}

impl fmt::Display for Response {
    /// Status line, headers and raw body (lossy UTF-8), for debugging.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} {}",
            self.version, self.status_code, self.status_text
        )?;
        write!(f, "{}", self.headers)?;
        if !self.raw_body.is_empty() {
            writeln!(f, "\n{}", String::from_utf8_lossy(&self.raw_body))?;
        }
        Ok(())
    }
}

/// Parse a complete response buffer with [`ChunkPolicy::FirstChunk`].
pub fn parse_response(raw: &[u8]) -> IcapResult<Response> {
    parse_response_with(raw, ChunkPolicy::default())
}

/// Parse a complete response buffer, decoding body sections per `policy`.
pub fn parse_response_with(raw: &[u8], policy: ChunkPolicy) -> IcapResult<Response> {
    trace!("parse_response: len={}", raw.len());

    let (status_end, mut pos) = find_line_end(raw, 0).unwrap_or((raw.len(), raw.len()));
    let status_line = String::from_utf8_lossy(&raw[..status_end]);
    if !status_line.starts_with(ICAP_PREFIX) {
        return Err(Error::protocol("not an ICAP response"));
    }
    let (version, status_code, status_text) = split_status_line(&status_line);
    debug!(
        "parse_response: {} {} {}",
        version, status_code, status_text
    );

    let mut headers = Headers::new();
    while pos < raw.len() {
        let (line_end, next) = find_line_end(raw, pos).unwrap_or((raw.len(), raw.len()));
        if line_end == pos {
            break;
        }
        let line = String::from_utf8_lossy(&raw[pos..line_end]);
        match line.split_once(": ") {
            Some((name, value)) => headers.insert(name, value),
            None => headers.insert(&*line, ""),
        };
        pos = next;
    }

    let raw_body = match find_blank_line(raw) {
        Some((_, end)) => raw[end..].to_vec(),
        None => {
            trace!("parse_response: no header/body separator");
            return Ok(Response {
                version,
                status_code,
                status_text,
                headers,
                ..Default::default()
            });
        }
    };

    let mut sections = IndexMap::new();
    let encapsulated = headers
        .get(ENCAPSULATED)
        .or_else(|| headers.get_ignore_case(ENCAPSULATED));
    if let Some(value) = encapsulated {
        for section in extract_sections(&raw_body, value, policy)? {
            sections.insert(section.kind, section.content);
        }
    }
    trace!(
        "parse_response: body_len={} sections={}",
        raw_body.len(),
        sections.len()
    );

    Ok(Response {
        version,
        status_code,
        status_text,
        headers,
        sections,
        raw_body,
    })
}

/// Split `ICAP/1.0 405 Method Not Allowed` into version, code and message.
/// Missing fields come back empty; the message keeps its inner spaces.
fn split_status_line(line: &str) -> (String, String, String) {
    let mut rest = line;
    let version = next_field(&mut rest).to_string();
    let code = next_field(&mut rest).to_string();
    let message = rest.trim().to_string();
    (version, code, message)
}

fn next_field<'a>(rest: &mut &'a str) -> &'a str {
    let s: &'a str = (*rest).trim_start();
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    *rest = &s[end..];
    &s[..end]
}
