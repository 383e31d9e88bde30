//! Memory-mapped windows over a capture file.
//!
//! Uses `memmap2` to map the file one bounded unit at a time rather than
//! all at once, so arbitrarily large captures use a fixed amount of
//! address space. Each window is wrapped in `Bytes`, which keeps the
//! mapping alive for as long as any packet still points into it.

use std::fs::File;
use std::io;

use bytes::Bytes;
use memmap2::MmapOptions;

/// Size of each mapped window.
///
/// A multiple of every common page size (4K, 16K, 64K).
pub const MMAP_UNIT: usize = 256 * 1024;

/// Result of attempting to map the next window.
#[derive(Debug)]
pub enum MapOutcome {
    /// A window was mapped
    Mapped(Bytes),
    /// The file has been fully mapped
    Eof,
    /// Mapping is not possible for this input; switch to reads
    Unusable(io::Error),
}

/// Sequential mapper over a regular file.
#[derive(Debug)]
pub struct Mapper {
    unit: usize,
    next_offset: u64,
}

impl Mapper {
    /// Create a mapper starting at the beginning of the file.
    pub fn new() -> Self {
        Self::with_unit(MMAP_UNIT)
    }

    /// Create a mapper with a custom window size.
    pub fn with_unit(unit: usize) -> Self {
        Self {
            unit: unit.max(1),
            next_offset: 0,
        }
    }

    /// Offset of the first byte that has not been mapped yet.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Whether no window has been mapped yet.
    pub fn is_first(&self) -> bool {
        self.next_offset == 0
    }

    /// Map the window starting right after the previous one.
    ///
    /// When nothing has been mapped yet, a zero-length input reports
    /// `Unusable` rather than `Eof`: it may be a pipe or FIFO whose size says
    /// nothing about how much data will arrive.
    pub fn map_next(&mut self, file: &File) -> MapOutcome {
        let size = match file.metadata() {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => {
                return MapOutcome::Unusable(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "not a regular file",
                ))
            }
            Err(e) => return MapOutcome::Unusable(e),
        };

        if self.next_offset >= size {
            return if self.next_offset == 0 {
                MapOutcome::Unusable(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "nothing to map",
                ))
            } else {
                MapOutcome::Eof
            };
        }

        let len = (size - self.next_offset).min(self.unit as u64) as usize;

        // SAFETY: the mapping is read-only. Truncating the file while it is
        // mapped is outside what this reader supports, as for any mmap reader.
        let mmap = match unsafe {
            MmapOptions::new()
                .offset(self.next_offset)
                .len(len)
                .map(file)
        } {
            Ok(mmap) => mmap,
            Err(e) => return MapOutcome::Unusable(e),
        };

        #[cfg(unix)]
        {
            // advisory only
            let _ = mmap.advise(memmap2::Advice::Sequential);
        }

        self.next_offset += len as u64;
        MapOutcome::Mapped(Bytes::from_owner(mmap))
    }
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_maps_in_units() {
        let mut temp = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..10_000u32).map(|i| i as u8).collect();
        temp.write_all(&data).unwrap();
        temp.flush().unwrap();

        let file = File::open(temp.path()).unwrap();
        let mut mapper = Mapper::with_unit(4096);
        let mut collected = Vec::new();
        loop {
            match mapper.map_next(&file) {
                MapOutcome::Mapped(window) => {
                    assert!(window.len() <= 4096);
                    collected.extend_from_slice(&window);
                }
                MapOutcome::Eof => break,
                MapOutcome::Unusable(e) => panic!("unexpected: {}", e),
            }
        }
        assert_eq!(collected, data);
        assert_eq!(mapper.next_offset(), 10_000);
    }

    #[test]
    fn test_empty_file_is_unusable_on_first_map() {
        let temp = NamedTempFile::new().unwrap();
        let file = File::open(temp.path()).unwrap();
        let mut mapper = Mapper::new();
        assert!(matches!(mapper.map_next(&file), MapOutcome::Unusable(_)));
        assert!(mapper.is_first());
    }

    #[test]
    fn test_window_outlives_mapper() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"hello mapped world").unwrap();
        temp.flush().unwrap();

        let window = {
            let file = File::open(temp.path()).unwrap();
            let mut mapper = Mapper::new();
            match mapper.map_next(&file) {
                MapOutcome::Mapped(w) => w,
                other => panic!("unexpected: {:?}", other),
            }
        };
        assert_eq!(&window.slice(6..12)[..], b"mapped");
    }
}
