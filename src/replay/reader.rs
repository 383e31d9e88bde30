//! Record decoding.
//!
//! [`RecordReader`] turns the byte stream after the file header into
//! packets, one call at a time. Each call runs the record filters in a
//! fixed order:
//!
//! 1. time window (start bound, then end bound)
//! 2. sampling
//! 3. IP validity, when forced
//!
//! Records dropped by a filter are skipped without copying their bodies.
//! Records that fail the IP check are handed to [`RecordHooks::reject`]
//! rather than dropped.

use std::io;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, PcapError, Result};
use crate::io::BufferSource;
use crate::pcap::{ip_header_offset, FileHeader, LinkType, RecordHeader, FILE_HEADER_LEN, RECORD_HEADER_LEN};

use super::packet::Packet;
use super::sampling::Sampler;
use super::task::Mode;
use super::window::TimeWindow;

/// In push mode, every this many records tried in one call yields
/// [`ReadOutcome::TryLater`] so other work gets a turn.
pub const RETRY_BUDGET: u32 = 16;

/// Where the reader is in the record stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    /// Next bytes are a record header
    ExpectHeader,
    /// A header was decoded and its body has not been consumed
    ExpectBody,
    /// A decoded packet is waiting to be emitted
    PacketReady,
    /// The input ended cleanly
    Exhausted,
    /// A corrupt record header was found; nothing more will be read
    FormatError,
}

/// Result of one decode attempt.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A packet passed every filter
    Packet(Packet),
    /// Nothing yet, but more input may remain
    TryLater,
    /// The input is used up
    Exhausted,
    /// The end bound closed the window and the session went inactive
    WindowClosed,
    /// The record stream is corrupt
    Failed,
}

impl ReadOutcome {
    /// Whether another decode attempt could produce a packet straight away.
    pub fn more(&self) -> bool {
        matches!(self, ReadOutcome::Packet(_) | ReadOutcome::TryLater)
    }
}

/// Callbacks the reader makes into its owner while decoding.
pub trait RecordHooks {
    /// The first record was seen and the window bounds were resolved.
    fn window_resolved(&mut self, first: Duration);

    /// The end bound was reached.
    ///
    /// Runs once per arming of the end bound. The hook may extend and
    /// re-arm the window. Returns whether the session is still active.
    fn end_of_window(&mut self, window: &mut TimeWindow) -> bool;

    /// A record failed the IP check.
    fn reject(&mut self, packet: Packet);
}

/// Decoder for the records of one capture.
#[derive(Debug)]
pub struct RecordReader {
    name: String,
    source: BufferSource,
    file: FileHeader,
    link_type: LinkType,
    window: TimeWindow,
    sampler: Sampler,
    force_ip: bool,
    state: ReaderState,
}

impl RecordReader {
    /// Read and validate the file header at the start of `source`.
    ///
    /// Errors name the input as `name`.
    pub fn read_file_header(source: &mut BufferSource, name: &str) -> Result<FileHeader> {
        let capture_err = |source| Error::Capture {
            path: name.to_string(),
            source,
        };
        match source.read_array::<FILE_HEADER_LEN>() {
            Ok(Some(raw)) => FileHeader::parse(&raw).map_err(capture_err),
            Ok(None) => Err(capture_err(PcapError::TooShort)),
            Err(source) => Err(Error::Open {
                path: name.to_string(),
                source,
            }),
        }
    }

    /// Create a reader positioned right after the file header.
    pub fn new(
        name: impl Into<String>,
        source: BufferSource,
        file: FileHeader,
        window: TimeWindow,
        sampler: Sampler,
        force_ip: bool,
    ) -> Self {
        let link_type = LinkType(file.link_type);
        Self {
            name: name.into(),
            source,
            file,
            link_type,
            window,
            sampler,
            force_ip,
            state: ReaderState::ExpectHeader,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn file_header(&self) -> &FileHeader {
        &self.file
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    pub fn force_ip(&self) -> bool {
        self.force_ip
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut TimeWindow {
        &mut self.window
    }

    pub fn source(&self) -> &BufferSource {
        &self.source
    }

    /// Whether no further packets can come from this reader.
    pub fn is_done(&self) -> bool {
        matches!(self.state, ReaderState::Exhausted | ReaderState::FormatError)
    }

    /// Decode the next packet that passes every filter.
    pub fn next_packet(&mut self, mode: Mode, hooks: &mut dyn RecordHooks) -> ReadOutcome {
        match self.state {
            ReaderState::Exhausted => return ReadOutcome::Exhausted,
            ReaderState::FormatError => return ReadOutcome::Failed,
            _ => {}
        }

        let mut tries = 0u32;
        loop {
            tries += 1;
            if tries % RETRY_BUDGET == 0 && mode == Mode::Push {
                return ReadOutcome::TryLater;
            }

            self.state = ReaderState::ExpectHeader;
            let offset = self.source.position();
            let raw = match self.source.read_array::<RECORD_HEADER_LEN>() {
                Ok(Some(raw)) => raw,
                Ok(None) => return self.exhaust(),
                Err(e) => {
                    tracing::error!("{}: {}", self.name, e);
                    return self.exhaust();
                }
            };

            let header = match RecordHeader::decode(
                &raw,
                self.file.byte_order,
                self.file.version_minor,
                offset,
            ) {
                Ok(header) => header,
                Err(e) => {
                    tracing::error!("{}: {}", self.name, e);
                    self.state = ReaderState::FormatError;
                    return ReadOutcome::Failed;
                }
            };
            self.state = ReaderState::ExpectBody;
            self.source.skip(self.file.extra_header_bytes());

            let ts = header.timestamp;
            let caplen = header.captured_length as usize;

            if !self.window.is_resolved() {
                self.window.resolve(ts);
                hooks.window_resolved(ts);
            }

            if !self.window.admits_start(ts) {
                tracing::trace!(?ts, "before start of window");
                self.source.skip(caplen);
                continue;
            }

            while self.window.end_reached(ts) {
                let end = self.window.end();
                self.window.disarm_end();
                tracing::debug!(?ts, "end of window reached");
                if !hooks.end_of_window(&mut self.window) {
                    self.source.skip(caplen);
                    self.state = ReaderState::ExpectHeader;
                    return ReadOutcome::WindowClosed;
                }
                // a re-armed bound that did not move would be reached forever
                if self.window.end() == end {
                    self.window.disarm_end();
                }
            }

            if !self.sampler.keep() {
                tracing::trace!(?ts, "sampled out");
                self.source.skip(caplen);
                continue;
            }

            let data = match self.read_body(caplen) {
                Ok(Some(data)) => data,
                // truncated final record
                Ok(None) => return self.exhaust(),
                Err(e) if e.kind() == io::ErrorKind::OutOfMemory => {
                    tracing::error!("{}: {}", self.name, PcapError::OutOfMemory { size: caplen });
                    self.source.skip(caplen);
                    self.state = ReaderState::ExpectHeader;
                    return ReadOutcome::TryLater;
                }
                Err(e) => {
                    tracing::error!("{}: {}", self.name, e);
                    return self.exhaust();
                }
            };
            self.state = ReaderState::ExpectHeader;

            let mut packet = Packet::new(data, ts, header.extra_length());
            if self.force_ip {
                match ip_header_offset(packet.data(), self.link_type) {
                    Some(offset) => packet.set_network_header(offset),
                    None => {
                        tracing::trace!(?ts, "not an IP packet");
                        hooks.reject(packet);
                        continue;
                    }
                }
            }

            return ReadOutcome::Packet(packet);
        }
    }

    /// Take the record body, shared with the window when it lies inside it.
    fn read_body(&mut self, len: usize) -> io::Result<Option<Bytes>> {
        if let Some(data) = self.source.take_shared(len) {
            return Ok(Some(data));
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
        buf.resize(len, 0);
        if self.source.read_into(&mut buf)? < len {
            return Ok(None);
        }
        Ok(Some(Bytes::from(buf)))
    }

    fn exhaust(&mut self) -> ReadOutcome {
        self.state = ReaderState::Exhausted;
        ReadOutcome::Exhausted
    }

    /// Release the input.
    pub fn close(&mut self) {
        self.source.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Input;
    use crate::pcap::PCAP_MAGIC;
    use crate::replay::sampling::SAMPLING_ONE;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Default)]
    struct Recorder {
        resolved: Vec<Duration>,
        ends: usize,
        stay_active: bool,
        rejected: Vec<Packet>,
    }

    impl RecordHooks for Recorder {
        fn window_resolved(&mut self, first: Duration) {
            self.resolved.push(first);
        }

        fn end_of_window(&mut self, _window: &mut TimeWindow) -> bool {
            self.ends += 1;
            self.stay_active
        }

        fn reject(&mut self, packet: Packet) {
            self.rejected.push(packet);
        }
    }

    fn capture(records: &[(u32, &[u8])]) -> NamedTempFile {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&PCAP_MAGIC.to_ne_bytes());
        bytes.extend_from_slice(&2u16.to_ne_bytes());
        bytes.extend_from_slice(&4u16.to_ne_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        bytes.extend_from_slice(&65535u32.to_ne_bytes());
        bytes.extend_from_slice(&1u32.to_ne_bytes());
        for (sec, data) in records {
            bytes.extend_from_slice(&sec.to_ne_bytes());
            bytes.extend_from_slice(&0u32.to_ne_bytes());
            bytes.extend_from_slice(&(data.len() as u32).to_ne_bytes());
            bytes.extend_from_slice(&(data.len() as u32).to_ne_bytes());
            bytes.extend_from_slice(data);
        }
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(&bytes).unwrap();
        temp.flush().unwrap();
        temp
    }

    fn reader_for(temp: &NamedTempFile, window: TimeWindow, threshold: u32) -> RecordReader {
        let input = Input::open(temp.path()).unwrap();
        let mut source = BufferSource::new(input, false);
        let file = RecordReader::read_file_header(&mut source, "test").unwrap();
        RecordReader::new("test", source, file, window, Sampler::new(threshold, Some(1)), false)
    }

    #[test]
    fn test_reads_all_then_exhausts() {
        let temp = capture(&[(1, b"one"), (2, b"two")]);
        let mut reader = reader_for(&temp, TimeWindow::new(None, None), SAMPLING_ONE);
        let mut hooks = Recorder::default();

        let first = reader.next_packet(Mode::Pull, &mut hooks);
        assert!(matches!(&first, ReadOutcome::Packet(p) if &p.data()[..] == b"one"));
        let second = reader.next_packet(Mode::Pull, &mut hooks);
        assert!(matches!(&second, ReadOutcome::Packet(p) if &p.data()[..] == b"two"));
        assert!(matches!(reader.next_packet(Mode::Pull, &mut hooks), ReadOutcome::Exhausted));
        assert_eq!(reader.state(), ReaderState::Exhausted);
        assert_eq!(hooks.resolved, vec![Duration::from_secs(1)]);
    }

    #[test]
    fn test_retry_budget_in_push_mode() {
        let records: Vec<(u32, &[u8])> = (0..40).map(|i| (i, &b"x"[..])).collect();
        let temp = capture(&records);
        let mut reader = reader_for(&temp, TimeWindow::new(None, None), 0);
        let mut hooks = Recorder::default();

        // everything is sampled out, so the budget runs out first
        assert!(matches!(reader.next_packet(Mode::Push, &mut hooks), ReadOutcome::TryLater));
        assert_eq!(reader.source().position(), 24 + 15 * 17);

        let mut pull = reader_for(&temp, TimeWindow::new(None, None), 0);
        assert!(matches!(pull.next_packet(Mode::Pull, &mut hooks), ReadOutcome::Exhausted));
    }

    #[test]
    fn test_window_closes_once() {
        use crate::replay::config::EndBound;
        let temp = capture(&[(10, b"a"), (11, b"b"), (12, b"c")]);
        let window = TimeWindow::new(None, Some(EndBound::AfterFirst(Duration::from_secs(1))));
        let mut reader = reader_for(&temp, window, SAMPLING_ONE);
        let mut hooks = Recorder::default();

        assert!(matches!(reader.next_packet(Mode::Pull, &mut hooks), ReadOutcome::Packet(_)));
        assert!(matches!(reader.next_packet(Mode::Pull, &mut hooks), ReadOutcome::WindowClosed));
        assert_eq!(hooks.ends, 1);

        // still inactive from the host's view, but the bound is disarmed
        assert!(matches!(reader.next_packet(Mode::Pull, &mut hooks), ReadOutcome::Packet(p) if &p.data()[..] == b"c"));
        assert_eq!(hooks.ends, 1);
    }

    #[test]
    fn test_end_hook_that_keeps_the_bound_does_not_loop() {
        use crate::replay::config::EndBound;

        struct Rearm(usize);

        impl RecordHooks for Rearm {
            fn window_resolved(&mut self, _first: Duration) {}

            fn end_of_window(&mut self, window: &mut TimeWindow) -> bool {
                self.0 += 1;
                window.extend_end(Duration::ZERO);
                window.rearm_end();
                true
            }

            fn reject(&mut self, _packet: Packet) {}
        }

        let temp = capture(&[(10, b"a"), (12, b"b")]);
        let window = TimeWindow::new(None, Some(EndBound::AfterFirst(Duration::from_secs(1))));
        let mut reader = reader_for(&temp, window, SAMPLING_ONE);
        let mut hooks = Rearm(0);

        assert!(matches!(reader.next_packet(Mode::Pull, &mut hooks), ReadOutcome::Packet(_)));
        assert!(matches!(reader.next_packet(Mode::Pull, &mut hooks), ReadOutcome::Packet(p) if &p.data()[..] == b"b"));
        assert_eq!(hooks.0, 1);
        assert!(!reader.window().end_armed());
    }

    #[test]
    fn test_file_header_read_error_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = BufferSource::new(Input::open(dir.path()).unwrap(), false);
        let err = RecordReader::read_file_header(&mut source, "dir").unwrap_err();
        assert!(matches!(err, Error::Open { ref path, .. } if path == "dir"));
    }

    #[test]
    fn test_truncated_body_exhausts() {
        let temp = capture(&[(1, b"whole")]);
        let mut bytes = std::fs::read(temp.path()).unwrap();
        bytes.truncate(bytes.len() - 2);
        std::fs::write(temp.path(), &bytes).unwrap();

        let mut reader = reader_for(&temp, TimeWindow::new(None, None), SAMPLING_ONE);
        let mut hooks = Recorder::default();
        assert!(matches!(reader.next_packet(Mode::Pull, &mut hooks), ReadOutcome::Exhausted));
    }

    #[test]
    fn test_outcome_more() {
        assert!(ReadOutcome::TryLater.more());
        assert!(!ReadOutcome::Exhausted.more());
        assert!(!ReadOutcome::WindowClosed.more());
        assert!(!ReadOutcome::Failed.more());
    }
}
