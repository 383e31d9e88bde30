//! Byte windows over a capture input.
//!
//! [`BufferSource`] hands out the capture one window at a time. Windows come
//! from memory-mapped regions of a regular file or from chunked reads into
//! an owned buffer, and are always `Bytes` so that packets can share them
//! without copying.
//!
//! ## Cursor semantics
//!
//! The cursor (`pos`) is relative to the current window and may point past
//! its end after a [`BufferSource::skip`]. The next refill subtracts the old
//! window's length, so a skip that spans several windows is honoured
//! without reading the skipped bytes into a destination.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Stdin};
use std::path::Path;

use bytes::Bytes;

use super::decompress::DecompressPipe;
use super::mmap::{MapOutcome, Mapper};

/// Size of each streamed read buffer.
pub const BUFFER_SIZE: usize = 65536;

/// The open handle a capture is read from.
pub enum Input {
    /// A file opened by path
    File(File),
    /// Standard input
    Stdin(Stdin),
    /// Standard output of a decompression process
    Pipe(DecompressPipe),
}

impl Input {
    /// Open `path`, with `-` meaning standard input.
    pub fn open(path: &Path) -> io::Result<Self> {
        if path == Path::new("-") {
            Ok(Input::Stdin(io::stdin()))
        } else {
            File::open(path).map(Input::File)
        }
    }

    /// Whether this input is a regular file that could be handed to a
    /// decompressor by name.
    pub fn is_regular_file(&self) -> bool {
        match self {
            Input::File(f) => f.metadata().map(|m| m.is_file()).unwrap_or(false),
            _ => false,
        }
    }

    /// Size of the input when it is a regular file.
    pub fn file_size(&self) -> Option<u64> {
        match self {
            Input::File(f) => f
                .metadata()
                .ok()
                .filter(|m| m.is_file())
                .map(|m| m.len()),
            _ => None,
        }
    }

    fn close(self) {
        if let Input::Pipe(mut pipe) = self {
            pipe.close();
        }
    }
}

impl Read for Input {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Input::File(f) => f.read(buf),
            Input::Stdin(s) => s.read(buf),
            Input::Pipe(p) => p.read(buf),
        }
    }
}

impl std::fmt::Debug for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Input::File(_) => f.write_str("Input::File"),
            Input::Stdin(_) => f.write_str("Input::Stdin"),
            Input::Pipe(p) => write!(f, "Input::Pipe({})", p.command()),
        }
    }
}

#[derive(Debug)]
enum Strategy {
    Mapped(Mapper),
    Streamed,
}

/// Windowed byte supplier over an [`Input`].
#[derive(Debug)]
pub struct BufferSource {
    input: Option<Input>,
    strategy: Strategy,
    window: Bytes,
    pos: usize,
    file_offset: u64,
    chunk: usize,
}

impl BufferSource {
    /// Wrap an input. With `mmap` set, regular files are mapped window by
    /// window; anything else silently falls back to streamed reads.
    pub fn new(input: Input, mmap: bool) -> Self {
        Self::with_chunk_size(input, mmap, BUFFER_SIZE)
    }

    /// Like [`BufferSource::new`] with a custom streamed-read size.
    pub fn with_chunk_size(input: Input, mmap: bool, chunk: usize) -> Self {
        let strategy = if mmap {
            Strategy::Mapped(Mapper::new())
        } else {
            Strategy::Streamed
        };
        Self {
            input: Some(input),
            strategy,
            window: Bytes::new(),
            pos: 0,
            file_offset: 0,
            chunk: chunk.max(1),
        }
    }

    /// Use a custom mapping unit. Only meaningful before the first fill.
    pub fn with_mmap_unit(mut self, unit: usize) -> Self {
        if let Strategy::Mapped(_) = self.strategy {
            self.strategy = Strategy::Mapped(Mapper::with_unit(unit));
        }
        self
    }

    /// The current window.
    pub fn window(&self) -> &Bytes {
        &self.window
    }

    /// Whether windows currently come from memory maps.
    pub fn is_mapped(&self) -> bool {
        matches!(self.strategy, Strategy::Mapped(_))
    }

    /// The underlying input, if still open.
    pub fn input(&self) -> Option<&Input> {
        self.input.as_ref()
    }

    /// Absolute offset of the cursor in the input stream.
    ///
    /// A [`BufferSource::skip`] over a truncated tail leaves this past the
    /// end of the input.
    pub fn position(&self) -> u64 {
        self.file_offset + self.pos as u64
    }

    /// Size of the input when it is a regular file.
    pub fn file_size(&self) -> Option<u64> {
        self.input.as_ref().and_then(Input::file_size)
    }

    /// Replace the window with the next region of the input.
    ///
    /// Returns the new window's length; `0` means end of input. A short
    /// count means the input ended partway through the window.
    pub fn fill(&mut self) -> io::Result<usize> {
        let consumed = self.window.len();
        self.file_offset += consumed as u64;
        self.pos = self.pos.saturating_sub(consumed);
        self.window = Bytes::new();

        let Some(input) = self.input.as_mut() else {
            return Ok(0);
        };

        if let Strategy::Mapped(mapper) = &mut self.strategy {
            let probing = mapper.is_first();
            let outcome = match input {
                Input::File(file) => mapper.map_next(file),
                _ => MapOutcome::Unusable(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "input is not a file",
                )),
            };

            match outcome {
                MapOutcome::Mapped(window) => {
                    self.file_offset = mapper.next_offset() - window.len() as u64;
                    self.window = window;
                    return Ok(self.window.len());
                }
                MapOutcome::Eof => return Ok(0),
                MapOutcome::Unusable(e) => {
                    let resume_at = mapper.next_offset();
                    if !probing {
                        tracing::warn!("mmap: {}; falling back to reads", e);
                    } else {
                        tracing::trace!("mmap probe failed: {}", e);
                    }
                    self.strategy = Strategy::Streamed;
                    if let Input::File(file) = input {
                        file.seek(SeekFrom::Start(resume_at))?;
                    }
                }
            }
        }

        self.read_chunk()
    }

    fn read_chunk(&mut self) -> io::Result<usize> {
        let Some(input) = self.input.as_mut() else {
            return Ok(0);
        };

        let mut buf = Vec::new();
        buf.try_reserve_exact(self.chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::OutOfMemory, "out of memory!"))?;
        buf.resize(self.chunk, 0);

        let mut len = 0;
        while len < self.chunk {
            match input.read(&mut buf[len..]) {
                Ok(0) => break,
                Ok(got) => len += got,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                    ) =>
                {
                    continue
                }
                Err(e) => return Err(e),
            }
        }

        buf.truncate(len);
        self.window = Bytes::from(buf);
        Ok(len)
    }

    /// Copy exactly `dst.len()` bytes, refilling as needed.
    ///
    /// Returns how many bytes were copied; fewer than requested means the
    /// input ended.
    pub fn read_into(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let mut done = 0;
        while done < dst.len() {
            if self.pos < self.window.len() {
                let n = (dst.len() - done).min(self.window.len() - self.pos);
                dst[done..done + n].copy_from_slice(&self.window[self.pos..self.pos + n]);
                done += n;
                self.pos += n;
            }
            if done < dst.len() && self.fill()? == 0 {
                return Ok(done);
            }
        }
        Ok(done)
    }

    /// Borrow the next `len` bytes from the current window without copying,
    /// advancing past them. Returns `None` when they are not all buffered.
    pub fn take_shared(&mut self, len: usize) -> Option<Bytes> {
        let end = self.pos.checked_add(len)?;
        if end > self.window.len() {
            return None;
        }
        let slice = self.window.slice(self.pos..end);
        self.pos = end;
        Some(slice)
    }

    /// Read the next `N` bytes, zero-copy from the window when possible.
    /// Returns `None` when the input ends first.
    pub fn read_array<const N: usize>(&mut self) -> io::Result<Option<[u8; N]>> {
        let mut out = [0u8; N];
        if let Some(bytes) = self.take_shared(N) {
            out.copy_from_slice(&bytes);
            return Ok(Some(out));
        }
        if self.read_into(&mut out)? < N {
            return Ok(None);
        }
        Ok(Some(out))
    }

    /// Advance the cursor without reading.
    pub fn skip(&mut self, len: usize) {
        self.pos += len;
    }

    /// Release the window and the input. Safe to call more than once.
    pub fn close(&mut self) {
        self.window = Bytes::new();
        self.pos = 0;
        if let Some(input) = self.input.take() {
            input.close();
        }
    }

    /// Whether [`BufferSource::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.input.is_none()
    }
}

impl Drop for BufferSource {
    fn drop(&mut self) {
        self.close();
    }
}
