//! Length-prefix and marker primitives shared by the sealed and archive formats
//!
//! Every integer on the wire is an unsigned 64-bit big-endian value.

use std::io::{self, Read, Write};

/// Size of a length prefix in bytes
pub const LEN_PREFIX_SIZE: usize = 8;

/// Size of every format marker in bytes
pub const MARKER_SIZE: usize = 4;

pub type Marker = [u8; MARKER_SIZE];

pub fn write_len<W: Write + ?Sized>(w: &mut W, len: u64) -> io::Result<()> {
    w.write_all(&len.to_be_bytes())
}

/// Write `data` preceded by its length.
pub fn write_prefixed<W: Write + ?Sized>(w: &mut W, data: &[u8]) -> io::Result<()> {
    write_len(w, data.len() as u64)?;
    w.write_all(data)
}

/// Read a length prefix.
///
/// Returns `Ok(None)` when the reader is already at end of input, and an
/// `UnexpectedEof` error when it ends partway through the prefix.
pub fn read_len<R: Read + ?Sized>(r: &mut R) -> io::Result<Option<u64>> {
    let mut buf = [0u8; LEN_PREFIX_SIZE];
    match fill(r, &mut buf)? {
        0 => Ok(None),
        LEN_PREFIX_SIZE => Ok(Some(u64::from_be_bytes(buf))),
        n => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("length prefix truncated after {n} bytes"),
        )),
    }
}

/// Read a marker, or `None` if fewer than four bytes remain.
pub fn read_marker<R: Read + ?Sized>(r: &mut R) -> io::Result<Option<Marker>> {
    let mut buf = [0u8; MARKER_SIZE];
    let n = fill(r, &mut buf)?;
    Ok((n == MARKER_SIZE).then_some(buf))
}

/// Read until `buf` is full or the reader reports end of input.
///
/// Returns the number of bytes read; anything less than `buf.len()` means EOF.
pub fn fill<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Render a marker for error messages, escaping non-printable bytes.
pub fn marker_display(marker: &[u8]) -> String {
    marker.escape_ascii().to_string()
}
