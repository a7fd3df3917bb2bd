//! Buffered search for a 4-byte marker in a seekable stream
//!
//! The stream is read in fixed-size windows. The last `MARKER_SIZE - 1`
//! bytes of each window are held back and searched again together with the
//! next window, so a marker split across two reads is still found. Once the
//! marker is located the reader is rewound to the byte right after it, no
//! matter how far the last window read ahead.

use std::io::{self, Read, Seek, SeekFrom};

use crate::wire::{fill, Marker, MARKER_SIZE};

#[derive(Debug, Clone)]
pub struct MarkerScanner {
    marker: Marker,
    window: usize,
}

impl MarkerScanner {
    /// `window` is clamped to at least the marker size.
    pub fn new(marker: Marker, window: usize) -> Self {
        Self {
            marker,
            window: window.max(MARKER_SIZE),
        }
    }

    /// Scan forward for the marker.
    ///
    /// Every byte that precedes the marker is handed to `consume` exactly
    /// once, in stream order. Returns `true` with the reader positioned just
    /// past the marker, or `false` at end of input (all remaining bytes have
    /// then been consumed).
    pub fn scan<R, F>(&self, reader: &mut R, mut consume: F) -> io::Result<bool>
    where
        R: Read + Seek + ?Sized,
        F: FnMut(&[u8]) -> io::Result<()>,
    {
        let keep = MARKER_SIZE - 1;
        let mut buf = vec![0u8; keep + self.window];
        let mut held = 0;

        loop {
            let n = fill(reader, &mut buf[held..])?;
            let filled = held + n;

            if let Some(pos) = find(&buf[..filled], &self.marker) {
                consume(&buf[..pos])?;
                let overread = filled - (pos + MARKER_SIZE);
                if overread > 0 {
                    reader.seek(SeekFrom::Current(-(overread as i64)))?;
                }
                return Ok(true);
            }

            if n == 0 || filled < buf.len() {
                consume(&buf[..filled])?;
                return Ok(false);
            }

            let emit = filled - keep;
            consume(&buf[..emit])?;
            buf.copy_within(emit..filled, 0);
            held = keep;
        }
    }

    /// Scan forward, discarding everything before the marker.
    pub fn skip_to<R: Read + Seek + ?Sized>(&self, reader: &mut R) -> io::Result<bool> {
        self.scan(reader, |_| Ok(()))
    }

    /// Scan forward, collecting everything before the marker.
    ///
    /// Returns `None` if the input ends without a marker.
    pub fn read_until<R: Read + Seek + ?Sized>(&self, reader: &mut R) -> io::Result<Option<Vec<u8>>> {
        let mut collected = Vec::new();
        let found = self.scan(reader, |bytes| {
            collected.extend_from_slice(bytes);
            Ok(())
        })?;
        Ok(found.then_some(collected))
    }
}

/// Position of the first occurrence of `marker` in `haystack`.
pub fn find(haystack: &[u8], marker: &Marker) -> Option<usize> {
    haystack.windows(MARKER_SIZE).position(|w| w == marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    const HOLE: Marker = *b"HOLE";

    #[test]
    fn test_marker_at_start() {
        let mut cursor = Cursor::new(b"HOLEtail".to_vec());
        let data = MarkerScanner::new(HOLE, 16).read_until(&mut cursor).unwrap();
        assert_eq!(data.unwrap(), b"");
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn test_marker_missing() {
        let mut cursor = Cursor::new(b"no marker here".to_vec());
        let data = MarkerScanner::new(HOLE, 4).read_until(&mut cursor).unwrap();
        assert!(data.is_none());
    }

    #[test]
    fn test_marker_straddles_windows() {
        // first read "abcdefH", second read "OLEx" after the held-back "efH"
        let mut cursor = Cursor::new(b"abcdefHOLExyz".to_vec());
        let data = MarkerScanner::new(HOLE, 4).read_until(&mut cursor).unwrap();
        assert_eq!(data.unwrap(), b"abcdef");
        assert_eq!(cursor.position(), 10);
    }

    #[test]
    fn test_data_exact_window_multiple() {
        let mut input = vec![7u8; 4096 * 2];
        input.extend_from_slice(b"HOLENEXT");
        let mut cursor = Cursor::new(input);

        let data = MarkerScanner::new(HOLE, 4096).read_until(&mut cursor).unwrap();
        assert_eq!(data.unwrap(), vec![7u8; 4096 * 2]);
        assert_eq!(cursor.position(), 4096 * 2 + 4);
    }

    #[test]
    fn test_only_first_marker_counts() {
        let mut cursor = Cursor::new(b"aHOLEbHOLE".to_vec());
        let scanner = MarkerScanner::new(HOLE, 64);
        assert_eq!(scanner.read_until(&mut cursor).unwrap().unwrap(), b"a");
        assert_eq!(scanner.read_until(&mut cursor).unwrap().unwrap(), b"b");
        assert_eq!(scanner.read_until(&mut cursor).unwrap(), None);
    }

    #[test]
    fn test_skip_to_positions_after_marker() {
        let mut input = vec![0u8; 10_000];
        input.extend_from_slice(b"SEAL");
        input.extend_from_slice(b"payload");
        let mut cursor = Cursor::new(input);

        assert!(MarkerScanner::new(*b"SEAL", 4096).skip_to(&mut cursor).unwrap());
        assert_eq!(cursor.position(), 10_004);
    }

    proptest! {
        #[test]
        fn finds_marker_at_any_offset(
            prefix in proptest::collection::vec(0u8..=0x40, 0..=2048),
            suffix in proptest::collection::vec(any::<u8>(), 0..=64),
            window in 4usize..=97,
        ) {
            // bytes <= 0x40 never spell "HOLE", so the first marker is the planted one
            let mut input = prefix.clone();
            input.extend_from_slice(&HOLE);
            input.extend_from_slice(&suffix);
            let mut cursor = Cursor::new(input);

            let data = MarkerScanner::new(HOLE, window).read_until(&mut cursor).unwrap();
            prop_assert_eq!(data, Some(prefix.clone()));
            prop_assert_eq!(cursor.position() as usize, prefix.len() + 4);
        }

        #[test]
        fn consumes_everything_without_marker(
            input in proptest::collection::vec(0u8..=0x40, 0..=2048),
            window in 4usize..=97,
        ) {
            let mut seen = Vec::new();
            let found = MarkerScanner::new(HOLE, window)
                .scan(&mut Cursor::new(input.clone()), |b| {
                    seen.extend_from_slice(b);
                    Ok(())
                })
                .unwrap();
            prop_assert!(!found);
            prop_assert_eq!(seen, input);
        }
    }
}
