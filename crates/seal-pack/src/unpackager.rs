//! Archive reader

use std::io::{Read, Seek, SeekFrom};

use seal_core::error::{SealError, SealResult, Stage};
use seal_core::scan::MarkerScanner;
use seal_core::wire::{self, Marker, MARKER_SIZE};
use seal_core::PackingConfig;
use tracing::{debug, trace};

use crate::{DATA, END, NAME, START, TERMINATOR};

/// One archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub data: Vec<u8>,
}

/// Reads entries back out of an archive.
///
/// The reader must be seekable: the entry terminator is found by reading
/// ahead, and marker probes rewind after looking.
#[derive(Debug)]
pub struct Unpackager<R: Read + Seek> {
    reader: R,
    scanner: MarkerScanner,
    max_name_len: u64,
}

impl<R: Read + Seek> Unpackager<R> {
    pub fn new(reader: R) -> SealResult<Self> {
        Self::with_config(reader, &PackingConfig::default())
    }

    /// Open an archive, consuming and checking its start marker.
    pub fn with_config(mut reader: R, config: &PackingConfig) -> SealResult<Self> {
        config.validate()?;
        let marker = wire::read_marker(&mut reader).map_err(|e| SealError::read(Stage::ArchiveStart, e))?;
        expect_marker(Stage::ArchiveStart, &START, marker)?;
        Ok(Self {
            reader,
            scanner: MarkerScanner::new(TERMINATOR, config.scan_window),
            max_name_len: config.max_name_len,
        })
    }

    /// Read the next entry.
    ///
    /// If the next bytes are not an entry header the reader is left where it
    /// was and a format error is returned. Use [`Unpackager::is_end`] to tell
    /// the end of the archive apart from corruption.
    pub fn unpack(&mut self) -> SealResult<Entry> {
        let marker = self.peek_marker(Stage::EntryName)?;
        expect_marker(Stage::EntryName, &NAME, marker)?;
        self.reader
            .seek(SeekFrom::Current(MARKER_SIZE as i64))
            .map_err(|e| SealError::io(Stage::EntryName, e))?;

        let name_len = wire::read_len(&mut self.reader)
            .map_err(|e| SealError::read(Stage::EntryName, e))?
            .ok_or_else(|| SealError::format(Stage::EntryName, "truncated input"))?;
        if name_len > self.max_name_len {
            return Err(SealError::format(
                Stage::EntryName,
                format!("name length {name_len} exceeds limit {}", self.max_name_len),
            ));
        }
        let mut name = vec![0u8; name_len as usize];
        self.reader
            .read_exact(&mut name)
            .map_err(|e| SealError::read(Stage::EntryName, e))?;
        let name = String::from_utf8(name)
            .map_err(|_| SealError::format(Stage::EntryName, "name is not valid UTF-8"))?;

        let marker = wire::read_marker(&mut self.reader).map_err(|e| SealError::read(Stage::EntryData, e))?;
        expect_marker(Stage::EntryData, &DATA, marker)?;

        let data = self
            .scanner
            .read_until(&mut self.reader)
            .map_err(|e| SealError::io(Stage::EntryData, e))?
            .ok_or_else(|| SealError::format(Stage::EntryData, "input ends before the entry terminator"))?;

        trace!(name = %name, bytes = data.len(), "unpacked entry");
        Ok(Entry { name, data })
    }

    /// Whether the next bytes are the end marker. Never moves the reader.
    pub fn is_end(&mut self) -> SealResult<bool> {
        Ok(self.peek_marker(Stage::ArchiveEnd)? == Some(END))
    }

    /// Iterate over the remaining entries, stopping at the end marker or
    /// after the first error.
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries {
            unpackager: self,
            done: false,
        }
    }

    /// Consume the end marker and return the reader positioned after it.
    pub fn finish(mut self) -> SealResult<R> {
        let marker = wire::read_marker(&mut self.reader).map_err(|e| SealError::read(Stage::ArchiveEnd, e))?;
        expect_marker(Stage::ArchiveEnd, &END, marker)?;
        debug!("archive fully read");
        Ok(self.reader)
    }

    /// Give back the reader wherever it currently stands.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn peek_marker(&mut self, stage: Stage) -> SealResult<Option<Marker>> {
        let mut marker = [0u8; MARKER_SIZE];
        let n = wire::fill(&mut self.reader, &mut marker).map_err(|e| SealError::io(stage, e))?;
        if n > 0 {
            self.reader
                .seek(SeekFrom::Current(-(n as i64)))
                .map_err(|e| SealError::io(stage, e))?;
        }
        Ok((n == MARKER_SIZE).then_some(marker))
    }
}

fn expect_marker(stage: Stage, wanted: &Marker, found: Option<Marker>) -> SealResult<()> {
    match found {
        Some(m) if &m == wanted => Ok(()),
        Some(m) => Err(SealError::format(
            stage,
            format!(
                "expected {}, found {}",
                wire::marker_display(wanted),
                wire::marker_display(&m)
            ),
        )),
        None => Err(SealError::format(
            stage,
            format!("expected {}, found end of input", wire::marker_display(wanted)),
        )),
    }
}

/// Iterator returned by [`Unpackager::entries`]
pub struct Entries<'a, R: Read + Seek> {
    unpackager: &'a mut Unpackager<R>,
    done: bool,
}

impl<R: Read + Seek> Iterator for Entries<'_, R> {
    type Item = SealResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = match self.unpackager.is_end() {
            Ok(true) => None,
            Ok(false) => Some(self.unpackager.unpack()),
            Err(e) => Some(Err(e)),
        };
        self.done = !matches!(next, Some(Ok(_)));
        next
    }
}
