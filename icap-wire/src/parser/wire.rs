//! Chunked framing used inside ICAP encapsulated bodies.

use crate::error::{Error, IcapResult};
use crate::parser::find_line_end;
use tracing::trace;

/// Terminal zero-length chunk closing a chunked body.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Encode `data` as one chunk: `hex(len) CRLF data CRLF`.
pub fn encode_chunk(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 20);
    encode_chunk_into(&mut out, data);
    out
}

/// Append one chunk to an already-assembled buffer.
pub fn encode_chunk_into(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

/// Decode a single chunk starting at `at`.
///
/// Returns the chunk payload and the number of bytes consumed, including the
/// size line, the payload and its trailing line terminator when present.
/// A zero-length payload marks the end of the chunked body.
pub fn decode_chunk(buf: &[u8], at: usize) -> IcapResult<(Vec<u8>, usize)> {
    if at > buf.len() {
        return Err(Error::malformed_chunk(format!(
            "chunk offset {at} is past the end of a {} byte body",
            buf.len()
        )));
    }

    let (line_end, data_start) = find_line_end(buf, at)
        .ok_or_else(|| Error::malformed_chunk("chunk size line is not terminated"))?;
    let size = parse_size_line(&buf[at..line_end])?;

    let data_end = data_start
        .checked_add(size)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| {
            Error::malformed_chunk(format!(
                "chunk declares {size} bytes but only {} remain",
                buf.len() - data_start
            ))
        })?;

    let content = buf[data_start..data_end].to_vec();
    let rest = &buf[data_end..];
    let trailer = if rest.starts_with(b"\r\n") {
        2
    } else if rest.starts_with(b"\n") {
        1
    } else {
        0
    };
    let consumed = data_end + trailer - at;
    trace!("decode_chunk: at={} size={} consumed={}", at, size, consumed);

    Ok((content, consumed))
}

/// Decode chunks from `at` until the zero-length chunk, concatenating payloads.
pub fn decode_chunked(buf: &[u8], at: usize) -> IcapResult<(Vec<u8>, usize)> {
    let mut content = Vec::new();
    let mut pos = at;
    loop {
        let (chunk, consumed) = decode_chunk(buf, pos)?;
        pos += consumed;
        if chunk.is_empty() {
            return Ok((content, pos - at));
        }
        content.extend_from_slice(&chunk);
    }
}

fn parse_size_line(line: &[u8]) -> IcapResult<usize> {
    // Extensions such as `0; ieof` follow the size after a semicolon.
    let size_hex = line.split(|&b| b == b';').next().unwrap_or(line);
    let size_str = std::str::from_utf8(size_hex)
        .map_err(|_| Error::malformed_chunk("chunk size line is not ASCII"))?
        .trim();
    if size_str.is_empty() || !size_str.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::malformed_chunk(format!(
            "invalid chunk size: {size_str:?}"
        )));
    }
    usize::from_str_radix(size_str, 16)
        .map_err(|_| Error::malformed_chunk(format!("chunk size out of range: {size_str}")))
}
