//! The `Encapsulated` header: section kinds, offset bookkeeping and section extraction.
//!
//! Offsets are **relative to the start of the encapsulated area**, i.e. the
//! first byte after the blank line that ends the ICAP header block.

use crate::error::{Error, IcapResult};
use crate::parser::find_blank_line;
use crate::parser::wire::{LAST_CHUNK, decode_chunk, decode_chunked, encode_chunk_into};
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

/// Name of the ICAP header carrying the section offsets.
pub const ENCAPSULATED: &str = "Encapsulated";

/// Role of one encapsulated section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    ReqHdr,
    ResHdr,
    ReqBody,
    ResBody,
    NullBody,
}

impl SectionKind {
    /// Token used on the wire (`req-hdr`, `res-body`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::ReqHdr => "req-hdr",
            SectionKind::ResHdr => "res-hdr",
            SectionKind::ReqBody => "req-body",
            SectionKind::ResBody => "res-body",
            SectionKind::NullBody => "null-body",
        }
    }

    /// Embedded HTTP header block, copied verbatim.
    pub fn is_header(&self) -> bool {
        matches!(self, SectionKind::ReqHdr | SectionKind::ResHdr)
    }

    /// Embedded HTTP body, chunk-encoded on the wire.
    pub fn is_body(&self) -> bool {
        matches!(self, SectionKind::ReqBody | SectionKind::ResBody)
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "req-hdr" => SectionKind::ReqHdr,
            "res-hdr" => SectionKind::ResHdr,
            "req-body" => SectionKind::ReqBody,
            "res-body" => SectionKind::ResBody,
            "null-body" => SectionKind::NullBody,
            _ => return Err("unknown Encapsulated section"),
        })
    }
}

/// One section located inside an encapsulated area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncapsulatedSection {
    pub kind: SectionKind,
    pub offset: usize,
    pub content: Vec<u8>,
}

/// How body sections are decoded when extracting them from a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Decode exactly one chunk at the declared offset.
    #[default]
    FirstChunk,
    /// Keep decoding until the zero-length chunk and concatenate the payloads.
    UntilTerminator,
}

/// Serialized encapsulated area together with the offsets of its sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encapsulation {
    pub body: Vec<u8>,
    pub offsets: Vec<(SectionKind, usize)>,
}

impl Encapsulation {
    /// Value for the `Encapsulated` header.
    pub fn header_value(&self) -> String {
        serialize_header_value(&self.offsets)
    }
}

/// Lay out `parts` one after another and record where each one starts.
///
/// Header sections are copied verbatim, body sections are chunk-encoded and
/// the area is closed by the zero-length chunk. When only header sections are
/// present a `null-body` offset is appended instead. `null-body` entries in
/// `parts` are ignored: the marker is always computed.
pub fn compute<B: AsRef<[u8]>>(parts: &[(SectionKind, B)]) -> Encapsulation {
    let mut enc = Encapsulation::default();
    let mut has_body = false;

    for (kind, data) in parts {
        let data = data.as_ref();
        if kind.is_header() {
            enc.offsets.push((*kind, enc.body.len()));
            enc.body.extend_from_slice(data);
        } else if kind.is_body() {
            enc.offsets.push((*kind, enc.body.len()));
            encode_chunk_into(&mut enc.body, data);
            has_body = true;
        }
    }

    if has_body {
        enc.body.extend_from_slice(LAST_CHUNK);
    } else if !enc.offsets.is_empty() {
        enc.offsets.push((SectionKind::NullBody, enc.body.len()));
    }

    trace!(
        "encapsulation: sections={} body_len={}",
        enc.offsets.len(),
        enc.body.len()
    );
    enc
}

/// Render offsets as `req-hdr=0, req-body=123`.
pub fn serialize_header_value(offsets: &[(SectionKind, usize)]) -> String {
    offsets
        .iter()
        .map(|(kind, off)| format!("{kind}={off}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse an `Encapsulated` value into section name → offset, in header order.
///
/// Tokens that are not exactly `name=offset` with a decimal offset are
/// skipped; a damaged token must not hide the other sections.
pub fn parse_header_value(value: &str) -> IndexMap<String, usize> {
    let mut out = IndexMap::new();
    for token in value.split(", ") {
        let parts: Vec<&str> = token.split('=').collect();
        let [name, off_raw] = parts.as_slice() else {
            debug!("skipping malformed Encapsulated token: {token:?}");
            continue;
        };
        let Ok(off) = off_raw.trim().parse::<usize>() else {
            debug!("skipping Encapsulated token with bad offset: {token:?}");
            continue;
        };
        out.insert(name.trim().to_string(), off);
    }
    out
}

/// Recover the sections announced by an `Encapsulated` value from `body`.
///
/// Header sections run up to and including the next blank line (or to the
/// end of `body`). Parsers that stop before the separator differ here; keeping
/// it makes a section equal to the bytes [`crate::request::build`] sent. Body sections are chunk-decoded according to `policy`.
/// Unknown section names and `null-body` produce nothing.
pub fn extract_sections(
    body: &[u8],
    header_value: &str,
    policy: ChunkPolicy,
) -> IcapResult<Vec<EncapsulatedSection>> {
    let mut sections = Vec::new();

    for (name, offset) in parse_header_value(header_value) {
        let Ok(kind) = name.parse::<SectionKind>() else {
            debug!("ignoring unknown Encapsulated section: {name}");
            continue;
        };

        let content = if kind.is_header() {
            let rest = body.get(offset..).unwrap_or_default();
            match find_blank_line(rest) {
                Some((_, end)) => rest[..end].to_vec(),
                None => rest.to_vec(),
            }
        } else if kind.is_body() {
            let decoded = match policy {
                ChunkPolicy::FirstChunk => decode_chunk(body, offset),
                ChunkPolicy::UntilTerminator => decode_chunked(body, offset),
            };
            decoded
                .map_err(|e| match e {
                    Error::MalformedChunk(msg) => {
                        Error::MalformedChunk(format!("{kind} at offset {offset}: {msg}"))
                    }
                    other => other,
                })?
                .0
        } else {
            continue;
        };

        trace!("extracted {} at {}: {} bytes", kind, offset, content.len());
        sections.push(EncapsulatedSection {
            kind,
            offset,
            content,
        });
    }

    Ok(sections)
}

/// Check that `parts` follow the header-before-body convention.
///
/// Rejects repeated kinds, header sections after a body section, more than one
/// body section and a `null-body` combined with a body section.
pub fn validate_order<B>(parts: &[(SectionKind, B)]) -> IcapResult<()> {
    let mut seen: Vec<SectionKind> = Vec::with_capacity(parts.len());
    for (kind, _) in parts {
        if seen.contains(kind) {
            return Err(Error::SectionOrder(format!("duplicate section {kind}")));
        }
        if seen
            .iter()
            .any(|k| k.is_body() || *k == SectionKind::NullBody)
        {
            return Err(Error::SectionOrder(format!(
                "{kind} follows a body section"
            )));
        }
        seen.push(*kind);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_wire_name() {
        for kind in [
            SectionKind::ReqHdr,
            SectionKind::ResHdr,
            SectionKind::ReqBody,
            SectionKind::ResBody,
            SectionKind::NullBody,
        ] {
            assert_eq!(kind.as_str().parse::<SectionKind>(), Ok(kind));
        }
        assert!("opt-body".parse::<SectionKind>().is_err());
        assert!("REQ-HDR".parse::<SectionKind>().is_err());
    }

    #[test]
    fn compute_header_and_body() {
        let hdr = b"HTTP/1.1 200 OK\r\n\r\n";
        let enc = compute(&[
            (SectionKind::ResHdr, &hdr[..]),
            (SectionKind::ResBody, &b"hi"[..]),
        ]);
        assert_eq!(
            enc.offsets,
            vec![(SectionKind::ResHdr, 0), (SectionKind::ResBody, hdr.len())]
        );
        assert_eq!(enc.header_value(), format!("res-hdr=0, res-body={}", hdr.len()));
        let mut expected = hdr.to_vec();
        expected.extend_from_slice(b"2\r\nhi\r\n0\r\n\r\n");
        assert_eq!(enc.body, expected);
    }

    #[test]
    fn compute_headers_only_appends_null_body() {
        let req = b"GET / HTTP/1.1\r\nHost: a\r\n\r\n";
        let enc = compute(&[(SectionKind::ReqHdr, req.to_vec())]);
        assert_eq!(
            enc.offsets,
            vec![(SectionKind::ReqHdr, 0), (SectionKind::NullBody, req.len())]
        );
        assert_eq!(enc.body, req);
    }

    #[test]
    fn compute_body_only() {
        let enc = compute(&[(SectionKind::ReqBody, b"Hello World!".to_vec())]);
        assert_eq!(enc.header_value(), "req-body=0");
        assert_eq!(enc.body, b"c\r\nHello World!\r\n0\r\n\r\n");
    }

    #[test]
    fn compute_nothing() {
        let enc = compute::<Vec<u8>>(&[]);
        assert!(enc.offsets.is_empty());
        assert!(enc.body.is_empty());

        let enc = compute(&[(SectionKind::NullBody, Vec::new())]);
        assert!(enc.offsets.is_empty());
        assert_eq!(enc.header_value(), "");
    }

    #[test]
    fn offsets_track_accumulated_length() {
        let parts = vec![
            (SectionKind::ReqHdr, b"GET / HTTP/1.1\r\n\r\n".to_vec()),
            (SectionKind::ResHdr, b"HTTP/1.1 200 OK\r\nX: y\r\n\r\n".to_vec()),
            (SectionKind::ResBody, vec![b'z'; 300]),
        ];
        let enc = compute(&parts);
        let mut expected = 0;
        for ((kind, off), (part_kind, data)) in enc.offsets.iter().zip(&parts) {
            assert_eq!(kind, part_kind);
            assert_eq!(*off, expected);
            expected += if kind.is_body() {
                crate::parser::wire::encode_chunk(data).len()
            } else {
                data.len()
            };
        }
        assert!(enc.offsets.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn parse_value_variants() {
        let m = parse_header_value("req-hdr=0, req-body=123");
        assert_eq!(m.get("req-hdr"), Some(&0));
        assert_eq!(m.get("req-body"), Some(&123));
        assert_eq!(
            m.keys().map(String::as_str).collect::<Vec<_>>(),
            ["req-hdr", "req-body"]
        );
    }

    #[test]
    fn parse_value_skips_tokens_without_single_equals() {
        let m = parse_header_value("res-hdr0, res-body=10");
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("res-body"), Some(&10));

        let m = parse_header_value("res-hdr=0=1, null-body=4");
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("null-body"), Some(&4));
    }

    #[test]
    fn parse_value_skips_bad_offsets() {
        let m = parse_header_value("res-hdr=abc, res-body=-3, null-body=7");
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("null-body"), Some(&7));
    }

    #[test]
    fn extract_header_and_single_chunk() {
        let hdr = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n";
        let mut body = hdr.to_vec();
        body.extend_from_slice(b"5\r\nhello\r\n5\r\nworld\r\n0\r\n\r\n");
        let value = format!("res-hdr=0, res-body={}", hdr.len());

        let sections = extract_sections(&body, &value, ChunkPolicy::FirstChunk).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].kind, SectionKind::ResHdr);
        assert_eq!(sections[0].content, hdr);
        assert_eq!(sections[1].offset, hdr.len());
        assert_eq!(sections[1].content, b"hello");

        let sections = extract_sections(&body, &value, ChunkPolicy::UntilTerminator).unwrap();
        assert_eq!(sections[1].content, b"helloworld");
    }

    #[test]
    fn extract_header_without_separator_takes_remainder() {
        let sections =
            extract_sections(b"GET / HTTP/1.1\r\nHost: x", "req-hdr=0", ChunkPolicy::FirstChunk)
                .unwrap();
        assert_eq!(sections[0].content, b"GET / HTTP/1.1\r\nHost: x");

        let sections = extract_sections(b"abc", "req-hdr=10", ChunkPolicy::FirstChunk).unwrap();
        assert!(sections[0].content.is_empty());
    }

    #[test]
    fn extract_ignores_null_body_and_unknown_names() {
        let sections = extract_sections(
            b"HTTP/1.1 204 No Content\r\n\r\n",
            "res-hdr=0, opt-body=5, null-body=27",
            ChunkPolicy::FirstChunk,
        )
        .unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].kind, SectionKind::ResHdr);
    }

    #[test]
    fn extract_fails_on_corrupt_chunk() {
        let err = extract_sections(b"xyz\r\nabc", "req-body=0", ChunkPolicy::FirstChunk)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedChunk(ref m) if m.contains("req-body")));
    }

    fn parts(kinds: &[SectionKind]) -> Vec<(SectionKind, Vec<u8>)> {
        kinds.iter().map(|k| (*k, Vec::new())).collect()
    }

    #[test]
    fn validate_order_accepts_protocol_layouts() {
        use SectionKind::*;
        for kinds in [
            &[ReqHdr, ReqBody][..],
            &[ReqHdr, ResHdr, ResBody],
            &[ResHdr],
            &[ReqHdr, NullBody],
        ] {
            assert!(validate_order(&parts(kinds)).is_ok(), "{kinds:?}");
        }
    }

    #[test]
    fn validate_order_rejects_bad_layouts() {
        use SectionKind::*;
        for kinds in [
            &[ReqBody, ReqHdr][..],
            &[ResHdr, ResHdr],
            &[ReqBody, ResBody],
            &[NullBody, ResBody],
        ] {
            assert!(
                matches!(validate_order(&parts(kinds)), Err(Error::SectionOrder(_))),
                "{kinds:?}"
            );
        }
    }
}
