//! Capture replay session.
//!
//! [`CaptureReplay`] owns one open capture and emits its packets either by
//! being stepped (push mode) or by being pulled. Timing, sampling and the
//! time window are applied on the way out.
//!
//! ## Example
//!
//! ```no_run
//! use pcapreplay::replay::{CaptureReplay, Collector, Driver, Mode, ReplayConfig};
//!
//! let config = ReplayConfig::new("trace.pcap").with_stop(true);
//! let mut replay = CaptureReplay::open(config, Mode::Push)?;
//! let mut sink = Collector::new();
//! Driver::new().run(&mut replay, &mut sink);
//! println!("{} packets", sink.main().len());
//! # Ok::<(), pcapreplay::Error>(())
//! ```

use std::time::Duration;

use crate::error::{ConfigError, Error, PcapError, Result};
use crate::io::{BufferSource, Compression, DecompressPipe, Input};
use crate::pcap::{LinkType, FILE_HEADER_LEN};

use super::clock::{Clock, ReplayClock, SystemClock};
use super::config::{ControlWrite, ReplayConfig};
use super::packet::Packet;
use super::reader::{ReadOutcome, ReaderState, RecordHooks, RecordReader};
use super::sampling::Sampler;
use super::task::{Mode, NullSink, PacketSink, Stepable, Task, SIDE_PORT};
use super::window::TimeWindow;

/// Session state the control surface and the end-of-window call act on.
#[derive(Debug)]
pub(crate) struct Controls {
    pub(crate) mode: Mode,
    pub(crate) active: bool,
    pub(crate) stop: bool,
    pub(crate) stop_requested: bool,
    pub(crate) task: Task,
    pub(crate) end_call: Option<ControlWrite>,
}

impl Controls {
    pub(crate) fn set_active(&mut self, active: bool) {
        if self.active != active {
            self.active = active;
            if active && self.mode == Mode::Push && !self.task.is_scheduled() {
                self.task.schedule();
            }
        }
    }

    pub(crate) fn apply(&mut self, write: ControlWrite, window: &mut TimeWindow) {
        match write {
            ControlWrite::Active(active) => self.set_active(active),
            ControlWrite::Stop => {
                self.set_active(false);
                self.stop_requested = true;
            }
            ControlWrite::ExtendInterval(delta) => {
                window.extend_end(delta);
                if self.end_call.is_some() {
                    window.rearm_end();
                    self.set_active(true);
                }
            }
        }
    }
}

/// Anchored pacing against a clock.
struct Pacing {
    enabled: bool,
    clock: Box<dyn Clock>,
    replay: ReplayClock,
}

impl Pacing {
    fn time_until_due(&self, packet: &Packet) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        self.replay
            .time_until_due(packet.timestamp(), self.clock.now())
    }

    fn is_due(&self, packet: &Packet) -> bool {
        self.time_until_due(packet).is_zero()
    }
}

impl std::fmt::Debug for Pacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacing")
            .field("enabled", &self.enabled)
            .field("replay", &self.replay)
            .finish_non_exhaustive()
    }
}

struct Hooks<'a> {
    controls: &'a mut Controls,
    pacing: &'a mut Pacing,
    side: &'a mut dyn PacketSink,
}

impl RecordHooks for Hooks<'_> {
    fn window_resolved(&mut self, first: Duration) {
        if self.pacing.enabled {
            let now = self.pacing.clock.now();
            self.pacing.replay.anchor(now, first);
        }
    }

    fn end_of_window(&mut self, window: &mut TimeWindow) -> bool {
        if let Some(call) = self.controls.end_call {
            tracing::debug!(%call, "running end-of-window call");
            self.controls.apply(call, window);
        }
        // the call may have rescheduled us
        self.controls.task.unschedule();
        self.controls.active
    }

    fn reject(&mut self, packet: Packet) {
        self.side.push(SIDE_PORT, packet);
    }
}

/// A replay session over one capture.
#[derive(Debug)]
pub struct CaptureReplay {
    name: String,
    reader: RecordReader,
    pending: Option<Packet>,
    pub(crate) controls: Controls,
    pacing: Pacing,
    closed: bool,
}

impl CaptureReplay {
    /// Open a capture, pacing against the system clock.
    pub fn open(config: ReplayConfig, mode: Mode) -> Result<Self> {
        Self::with_clock(config, mode, SystemClock::new())
    }

    /// Open a capture, pacing against `clock`.
    ///
    /// On error nothing stays open: any file, mapping or child process
    /// acquired so far is released before returning.
    pub fn with_clock(config: ReplayConfig, mode: Mode, clock: impl Clock + 'static) -> Result<Self> {
        let options = config.validate()?;
        let name = config.display_name();
        let capture_err = |source: PcapError| Error::Capture {
            path: name.clone(),
            source,
        };

        let input = Input::open(&config.path).map_err(|source| Error::Open {
            path: name.clone(),
            source,
        })?;
        let mut source = BufferSource::new(input, config.mmap);
        Self::fill_first(&mut source, &name)?;

        let is_file = source.input().is_some_and(Input::is_regular_file);
        let compression = Compression::detect(source.window());
        if is_file && compression.is_compressed() {
            source.close();
            let pipe = DecompressPipe::spawn(&config.path, compression).map_err(capture_err)?;
            tracing::debug!(command = pipe.command(), "reading {} capture through pipe", compression);
            source = BufferSource::new(Input::Pipe(pipe), config.mmap);
            Self::fill_first(&mut source, &name)?;
        }

        let file = RecordReader::read_file_header(&mut source, &name)?;
        let link_type = LinkType(file.link_type);
        tracing::debug!(
            swapped = file.byte_order.is_swapped(),
            version_major = file.version_major,
            version_minor = file.version_minor,
            snaplen = file.snaplen,
            encap = %link_type,
            modified = file.modified,
            "{}: opened capture",
            name
        );

        let mut force_ip = config.force_ip;
        if force_ip {
            if !link_type.is_force_ipable() {
                return Err(capture_err(PcapError::UnsupportedLinkType {
                    link_type: file.link_type,
                }));
            }
            if config.timing {
                return Err(ConfigError::Incompatible("FORCE_IP", "TIMING").into());
            }
        } else if link_type == LinkType::RAW {
            force_ip = true;
        }

        let window = TimeWindow::new(config.start, config.end);
        let sampler = Sampler::new(options.sampling_threshold, config.seed);
        let reader = RecordReader::new(name.clone(), source, file, window, sampler, force_ip);

        let mut task = Task::new();
        if mode == Mode::Push && config.active {
            task.schedule();
        }

        Ok(Self {
            name,
            reader,
            pending: None,
            controls: Controls {
                mode,
                active: config.active,
                stop: config.stop,
                stop_requested: false,
                task,
                end_call: options.end_call,
            },
            pacing: Pacing {
                enabled: config.timing,
                clock: Box::new(clock),
                replay: ReplayClock::new(),
            },
            closed: false,
        })
    }

    fn fill_first(source: &mut BufferSource, name: &str) -> Result<()> {
        let len = source.fill().map_err(|source| Error::Open {
            path: name.to_string(),
            source,
        })?;
        let failure = if len == 0 {
            PcapError::Empty
        } else if len < FILE_HEADER_LEN {
            PcapError::TooShort
        } else {
            return Ok(());
        };
        Err(Error::Capture {
            path: name.to_string(),
            source: failure,
        })
    }

    /// Name of the input in messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.controls.mode
    }

    pub fn is_active(&self) -> bool {
        self.controls.active
    }

    pub fn stop_requested(&self) -> bool {
        self.controls.stop_requested
    }

    pub fn is_scheduled(&self) -> bool {
        self.controls.task.is_scheduled()
    }

    pub fn link_type(&self) -> LinkType {
        self.reader.link_type()
    }

    pub fn force_ip(&self) -> bool {
        self.reader.force_ip()
    }

    pub fn byte_order_swapped(&self) -> bool {
        self.reader.file_header().byte_order.is_swapped()
    }

    pub fn minor_version(&self) -> u16 {
        self.reader.file_header().version_minor
    }

    pub fn sampling_probability(&self) -> f64 {
        self.reader.sampler().probability()
    }

    pub fn time_window(&self) -> &TimeWindow {
        self.reader.window()
    }

    /// Absolute byte offset of the next unread byte of the capture, never
    /// past the end of a regular file.
    pub fn file_position(&self) -> u64 {
        let source = self.reader.source();
        let pos = source.position();
        source.file_size().map_or(pos, |size| pos.min(size))
    }

    /// Size of the capture when it is a regular file.
    pub fn file_size(&self) -> Option<u64> {
        self.reader.source().file_size()
    }

    /// Where decoding stands, counting a held packet as ready.
    pub fn reader_state(&self) -> ReaderState {
        if self.pending.is_some() {
            ReaderState::PacketReady
        } else {
            self.reader.state()
        }
    }

    /// Whether the held packet, if any, has been decoded.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether every packet has been emitted and no more can be read.
    pub fn is_finished(&self) -> bool {
        self.closed || (self.pending.is_none() && self.reader.is_done())
    }

    /// How long until the held packet is due, when timing holds one back.
    pub fn time_until_due(&self) -> Option<Duration> {
        let packet = self.pending.as_ref()?;
        let wait = self.pacing.time_until_due(packet);
        (!wait.is_zero()).then_some(wait)
    }

    /// Start or stop emitting packets.
    ///
    /// In push mode, reactivating an idle session schedules it again.
    pub fn set_active(&mut self, active: bool) {
        self.controls.set_active(active);
    }

    /// Deactivate and ask the host to stop.
    pub fn stop(&mut self) {
        self.apply(ControlWrite::Stop);
    }

    /// Move the end bound later.
    ///
    /// When an end-of-window call is configured the bound is checked again
    /// and the session reactivated.
    pub fn extend_interval(&mut self, delta: Duration) {
        self.apply(ControlWrite::ExtendInterval(delta));
    }

    pub(crate) fn apply(&mut self, write: ControlWrite) {
        self.controls.apply(write, self.reader.window_mut());
    }

    fn read_packet(&mut self, side: &mut dyn PacketSink) -> bool {
        let mode = self.controls.mode;
        let mut hooks = Hooks {
            controls: &mut self.controls,
            pacing: &mut self.pacing,
            side,
        };
        let outcome = self.reader.next_packet(mode, &mut hooks);
        let more = outcome.more();
        if let ReadOutcome::Packet(packet) = outcome {
            self.pending = Some(packet);
        }
        more
    }

    /// One push-mode step.
    ///
    /// Emits at most one packet to port 0 and reschedules itself while
    /// input remains.
    pub fn run_task(&mut self, sink: &mut dyn PacketSink) {
        self.controls.task.unschedule();
        if self.closed || !self.controls.active {
            return;
        }

        let mut more = true;
        if self.pending.is_none() {
            more = self.read_packet(sink);
        }

        if let Some(packet) = &self.pending {
            if !self.pacing.is_due(packet) {
                self.controls.task.schedule();
                return;
            }
        }

        if more {
            self.controls.task.schedule();
        } else if self.controls.stop {
            self.controls.stop_requested = true;
        }

        if let Some(packet) = self.pending.take() {
            sink.push(0, packet);
        }
    }

    /// Take the next packet if one is due, dropping IP-filter rejects.
    pub fn pull(&mut self) -> Option<Packet> {
        self.pull_into(&mut NullSink)
    }

    /// Take the next packet if one is due, sending IP-filter rejects to
    /// `side`.
    ///
    /// A packet that is not yet due stays held and is returned by a later
    /// call.
    pub fn pull_into(&mut self, side: &mut dyn PacketSink) -> Option<Packet> {
        if self.closed || !self.controls.active {
            return None;
        }

        let mut more = true;
        if self.pending.is_none() {
            more = self.read_packet(side);
        }

        if let Some(packet) = &self.pending {
            if !self.pacing.is_due(packet) {
                return None;
            }
        }

        if !more && self.controls.stop {
            self.controls.stop_requested = true;
        }

        self.pending.take()
    }

    /// Release the held packet, the window and the input. Safe to call more
    /// than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.pending = None;
        self.reader.close();
        self.controls.task.unschedule();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Stepable for CaptureReplay {
    fn step(&mut self, sink: &mut dyn PacketSink) {
        self.run_task(sink);
    }

    fn is_scheduled(&self) -> bool {
        CaptureReplay::is_scheduled(self)
    }

    fn wake_hint(&self) -> Option<Duration> {
        self.time_until_due()
    }

    fn stop_requested(&self) -> bool {
        CaptureReplay::stop_requested(self)
    }
}

impl Drop for CaptureReplay {
    fn drop(&mut self) {
        self.close();
    }
}
