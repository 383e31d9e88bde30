//! Scheduling and packet hand-off.
//!
//! The engine never runs its own loop. In push mode a host repeatedly
//! steps whatever [`Stepable`] is scheduled; [`Driver`] is a small host that
//! does exactly that on the current thread. Packets leave through a
//! [`PacketSink`], addressed by output port.

use std::time::Duration;

use super::packet::Packet;

/// Main output port.
pub const MAIN_PORT: usize = 0;

/// Port that receives records rejected by the IP filter.
pub const SIDE_PORT: usize = 1;

/// How packets leave the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// The engine is stepped and pushes packets downstream
    Push,
    /// Downstream pulls packets one at a time
    Pull,
}

/// Run-queue membership of a push-mode element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Task {
    scheduled: bool,
}

impl Task {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self) {
        self.scheduled = true;
    }

    pub fn unschedule(&mut self) {
        self.scheduled = false;
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }
}

/// Downstream receiver of pushed packets.
pub trait PacketSink {
    fn push(&mut self, port: usize, packet: Packet);
}

/// Sink that drops everything, like an unconnected port.
#[derive(Debug, Default)]
pub struct NullSink;

impl PacketSink for NullSink {
    fn push(&mut self, port: usize, packet: Packet) {
        tracing::trace!(port, len = packet.len(), "dropped on unconnected port");
    }
}

/// Sink that keeps every packet it is given, per port.
#[derive(Debug, Default)]
pub struct Collector {
    main: Vec<Packet>,
    side: Vec<Packet>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packets pushed to the main port.
    pub fn main(&self) -> &[Packet] {
        &self.main
    }

    /// Packets pushed to the side port.
    pub fn side(&self) -> &[Packet] {
        &self.side
    }

    pub fn take_main(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.main)
    }
}

impl PacketSink for Collector {
    fn push(&mut self, port: usize, packet: Packet) {
        match port {
            MAIN_PORT => self.main.push(packet),
            _ => self.side.push(packet),
        }
    }
}

/// Something a push-mode host can drive.
pub trait Stepable {
    /// Run one scheduled step, pushing any output into `sink`.
    fn step(&mut self, sink: &mut dyn PacketSink);

    /// Whether the element wants another step.
    fn is_scheduled(&self) -> bool;

    /// How long the host may sleep before the next step is useful.
    fn wake_hint(&self) -> Option<Duration> {
        None
    }

    /// Whether the element asked the host to stop.
    fn stop_requested(&self) -> bool {
        false
    }
}

/// Why a [`Driver`] run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverExit {
    /// The element asked the host to stop
    Stopped,
    /// Nothing is scheduled any more
    Idle,
    /// The step limit was hit
    StepLimit,
}

/// Single-threaded host loop for one element.
#[derive(Debug)]
pub struct Driver {
    max_steps: Option<u64>,
    steps: u64,
    sleep: bool,
}

impl Driver {
    pub fn new() -> Self {
        Self {
            max_steps: None,
            steps: 0,
            sleep: true,
        }
    }

    /// Give up after this many steps.
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Whether to sleep on wake hints instead of stepping straight away.
    pub fn with_sleep(mut self, sleep: bool) -> Self {
        self.sleep = sleep;
        self
    }

    /// Steps taken so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Step `element` until it stops, goes idle, or the step limit is hit.
    pub fn run(&mut self, element: &mut dyn Stepable, sink: &mut dyn PacketSink) -> DriverExit {
        loop {
            if element.stop_requested() {
                return DriverExit::Stopped;
            }
            if !element.is_scheduled() {
                return DriverExit::Idle;
            }
            if self.max_steps.is_some_and(|max| self.steps >= max) {
                return DriverExit::StepLimit;
            }

            if self.sleep {
                if let Some(wait) = element.wake_hint().filter(|d| !d.is_zero()) {
                    std::thread::sleep(wait);
                }
            }

            element.step(sink);
            self.steps += 1;
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}
