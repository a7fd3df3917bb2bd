//! Archive writer

use std::io::{self, Read, Write};

use seal_core::error::{SealError, SealResult, Stage};
use seal_core::scan;
use seal_core::wire::{self, MARKER_SIZE};
use tracing::{debug, trace, warn};

use crate::{DATA, END, NAME, START, TERMINATOR};

/// Appends named entries to an archive stream.
///
/// The start marker is written on construction; [`Packager::close`] writes
/// the end marker and hands the sink back.
#[derive(Debug)]
pub struct Packager<W: Write> {
    writer: W,
    entries: u64,
}

impl<W: Write> Packager<W> {
    pub fn new(mut writer: W) -> SealResult<Self> {
        writer
            .write_all(&START)
            .map_err(|e| SealError::io(Stage::ArchiveStart, e))?;
        Ok(Self { writer, entries: 0 })
    }

    /// Append one entry, copying `data` to the end of its input.
    ///
    /// Returns the number of data bytes written. Data containing the entry
    /// terminator is written as-is but will be cut short when unpacked; a
    /// warning is logged when that happens.
    pub fn pack<R: Read + ?Sized>(&mut self, name: &str, data: &mut R) -> SealResult<u64> {
        self.writer
            .write_all(&NAME)
            .and_then(|_| wire::write_prefixed(&mut self.writer, name.as_bytes()))
            .map_err(|e| SealError::io(Stage::EntryName, e))?;

        self.writer
            .write_all(&DATA)
            .map_err(|e| SealError::io(Stage::EntryData, e))?;
        let mut watch = TerminatorWatch::new(&mut self.writer);
        let copied = io::copy(data, &mut watch).map_err(|e| SealError::io(Stage::EntryData, e))?;
        if watch.seen {
            warn!(
                name,
                "entry data contains the terminator sequence; it will be truncated when unpacked"
            );
        }
        self.writer
            .write_all(&TERMINATOR)
            .map_err(|e| SealError::io(Stage::EntryData, e))?;

        self.entries += 1;
        trace!(name, bytes = copied, "packed entry");
        Ok(copied)
    }

    pub fn pack_bytes(&mut self, name: &str, data: &[u8]) -> SealResult<u64> {
        self.pack(name, &mut &data[..])
    }

    /// Number of entries packed so far
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Write the end marker, flush, and return the sink.
    pub fn close(mut self) -> SealResult<W> {
        self.writer
            .write_all(&END)
            .and_then(|_| self.writer.flush())
            .map_err(|e| SealError::io(Stage::ArchiveEnd, e))?;
        debug!(entries = self.entries, "closed archive");
        Ok(self.writer)
    }
}

/// Pass-through writer that notices the terminator sequence, including one
/// split across two writes.
struct TerminatorWatch<'a, W: Write> {
    inner: &'a mut W,
    tail: Vec<u8>,
    seen: bool,
}

impl<'a, W: Write> TerminatorWatch<'a, W> {
    fn new(inner: &'a mut W) -> Self {
        Self {
            inner,
            tail: Vec::with_capacity(2 * MARKER_SIZE),
            seen: false,
        }
    }

    fn observe(&mut self, buf: &[u8]) {
        if self.seen || buf.is_empty() {
            return;
        }
        let head = &buf[..buf.len().min(MARKER_SIZE - 1)];
        self.tail.extend_from_slice(head);
        if scan::find(&self.tail, &TERMINATOR).is_some() || scan::find(buf, &TERMINATOR).is_some() {
            self.seen = true;
            return;
        }

        if buf.len() >= MARKER_SIZE - 1 {
            self.tail.clear();
            self.tail.extend_from_slice(&buf[buf.len() - (MARKER_SIZE - 1)..]);
        } else {
            let excess = self.tail.len().saturating_sub(MARKER_SIZE - 1);
            self.tail.drain(..excess);
        }
    }
}

impl<W: Write> Write for TerminatorWatch<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.observe(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let mut pkg = Packager::new(Vec::new()).unwrap();
        assert_eq!(pkg.pack_bytes("test", b"hello").unwrap(), 5);
        let out = pkg.close().unwrap();

        let mut expected = b"PACKNAME".to_vec();
        expected.extend_from_slice(&4u64.to_be_bytes());
        expected.extend_from_slice(b"testDATAhelloHOLEACKE");
        assert_eq!(out, expected);
    }

    #[test]
    fn test_empty_archive() {
        let out = Packager::new(Vec::new()).unwrap().close().unwrap();
        assert_eq!(out, b"PACKACKE");
    }

    #[test]
    fn test_entry_count() {
        let mut pkg = Packager::new(Vec::new()).unwrap();
        pkg.pack_bytes("a", b"1").unwrap();
        pkg.pack("b", &mut &b"22"[..]).unwrap();
        assert_eq!(pkg.entries(), 2);
    }

    fn watch(writes: &[&str]) -> bool {
        let mut sink = Vec::new();
        let mut w = TerminatorWatch::new(&mut sink);
        for chunk in writes {
            w.write_all(chunk.as_bytes()).unwrap();
        }
        w.seen
    }

    #[test]
    fn test_watch_detects_terminator() {
        assert!(!watch(&["hello", "world"]));
        assert!(watch(&["a black HOLE"]));
        assert!(watch(&["xxHO", "LExx"]));
        assert!(watch(&["H", "O", "L", "E"]));
        assert!(watch(&["abcH", "", "OLE"]));
        assert!(!watch(&["HOL", "x", "E"]));
    }

    #[derive(Debug)]
    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_reports_stage() {
        let err = Packager::new(FailingSink).unwrap_err();
        assert!(matches!(
            err,
            SealError::Io {
                stage: Stage::ArchiveStart,
                ..
            }
        ));
    }
}
