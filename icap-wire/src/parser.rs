//! Byte-level helpers shared by the request builder and the response parser.

pub mod encapsulated;
pub mod wire;

/// Locate the end of the line starting at `from`.
///
/// Returns `(line_end, next_line_start)`: `line_end` excludes the terminator
/// (LF or CRLF), `next_line_start` points right after it.
#[inline]
pub(crate) fn find_line_end(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let rest = buf.get(from..)?;
    let lf = from + memchr::memchr(b'\n', rest)?;
    let end = if lf > from && buf[lf - 1] == b'\r' {
        lf - 1
    } else {
        lf
    };
    Some((end, lf + 1))
}

/// Locate the first blank line, i.e. two consecutive line terminators
/// (`\r\n\r\n`, `\n\n`, `\r\n\n` or `\n\r\n`).
///
/// Returns `(start, end)` where `start` is the first byte of the separator and
/// `end` is the position right after it.
pub(crate) fn find_blank_line(buf: &[u8]) -> Option<(usize, usize)> {
    for lf in memchr::memchr_iter(b'\n', buf) {
        let end = match (buf.get(lf + 1), buf.get(lf + 2)) {
            (Some(b'\n'), _) => lf + 2,
            (Some(b'\r'), Some(b'\n')) => lf + 3,
            _ => continue,
        };
        let start = if lf > 0 && buf[lf - 1] == b'\r' {
            lf - 1
        } else {
            lf
        };
        return Some((start, end));
    }
    None
}
