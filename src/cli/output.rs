//! Packet line output.
//!
//! One line per emitted packet: capture timestamp, captured length, bytes
//! not captured, and the output port it left on.

use std::io::{self, Write};

use clap::ValueEnum;

use crate::replay::{Packet, PacketSink, MAIN_PORT};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Space-separated columns (default)
    Text,
    /// Comma-separated values with a header row
    Csv,
}

/// Sink that prints packets as they arrive.
pub struct PacketPrinter<W: Write> {
    format: OutputFormat,
    writer: W,
    quiet: bool,
    header_written: bool,
    counts: [u64; 2],
    bytes: u64,
    error: Option<io::Error>,
}

impl<W: Write> PacketPrinter<W> {
    /// Create a printer. A quiet printer only counts.
    pub fn new(format: OutputFormat, writer: W, quiet: bool) -> Self {
        Self {
            format,
            writer,
            quiet,
            header_written: false,
            counts: [0; 2],
            bytes: 0,
            error: None,
        }
    }

    /// Packets seen on the main port.
    pub fn main_count(&self) -> u64 {
        self.counts[0]
    }

    /// Packets seen on the side port.
    pub fn side_count(&self) -> u64 {
        self.counts[1]
    }

    /// Captured bytes seen on the main port.
    pub fn main_bytes(&self) -> u64 {
        self.bytes
    }

    /// Flush output, reporting the first write error if there was one.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    /// Print one packet.
    pub fn write_packet(&mut self, port: usize, packet: &Packet) -> io::Result<()> {
        let ts = packet.timestamp();
        let (sec, usec) = (ts.as_secs(), ts.subsec_micros());
        match self.format {
            OutputFormat::Text => writeln!(
                self.writer,
                "{}.{:06} {} {} {}",
                sec,
                usec,
                packet.len(),
                packet.extra_length(),
                port
            ),
            OutputFormat::Csv => {
                if !self.header_written {
                    writeln!(self.writer, "timestamp,length,extra_length,port")?;
                    self.header_written = true;
                }
                writeln!(
                    self.writer,
                    "{}.{:06},{},{},{}",
                    sec,
                    usec,
                    packet.len(),
                    packet.extra_length(),
                    port
                )
            }
        }
    }
}

impl<W: Write> PacketSink for PacketPrinter<W> {
    fn push(&mut self, port: usize, packet: Packet) {
        if port == MAIN_PORT {
            self.counts[0] += 1;
            self.bytes += packet.len() as u64;
        } else {
            self.counts[1] += 1;
        }

        if self.quiet || self.error.is_some() {
            return;
        }
        if let Err(e) = self.write_packet(port, &packet) {
            self.error = Some(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::SIDE_PORT;
    use bytes::Bytes;
    use std::time::Duration;

    fn packet(len: usize, extra: u32) -> Packet {
        Packet::new(
            Bytes::from(vec![0u8; len]),
            Duration::new(1_000_000_000, 42_000),
            extra,
        )
    }

    #[test]
    fn test_text_lines() {
        let mut printer = PacketPrinter::new(OutputFormat::Text, Vec::new(), false);
        printer.push(MAIN_PORT, packet(60, 4));
        printer.push(SIDE_PORT, packet(10, 0));
        let out = String::from_utf8(printer.finish().unwrap()).unwrap();
        assert_eq!(out, "1000000000.000042 60 4 0\n1000000000.000042 10 0 1\n");
    }

    #[test]
    fn test_csv_has_header() {
        let mut printer = PacketPrinter::new(OutputFormat::Csv, Vec::new(), false);
        printer.push(MAIN_PORT, packet(1, 0));
        printer.push(MAIN_PORT, packet(2, 0));
        let out = String::from_utf8(printer.finish().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "timestamp,length,extra_length,port");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_quiet_only_counts() {
        let mut printer = PacketPrinter::new(OutputFormat::Text, Vec::new(), true);
        printer.push(MAIN_PORT, packet(5, 0));
        printer.push(MAIN_PORT, packet(7, 0));
        printer.push(SIDE_PORT, packet(1, 0));
        assert_eq!(printer.main_count(), 2);
        assert_eq!(printer.side_count(), 1);
        assert_eq!(printer.main_bytes(), 12);
        assert!(printer.finish().unwrap().is_empty());
    }
}
