//! Capture replay engine.
//!
//! This module reads a capture record by record and re-emits it:
//! - `config`: session options and time parsing
//! - `reader`: record decoding and filtering
//! - `window`, `sampling`: record filters
//! - `clock`: pacing by original inter-arrival times
//! - `engine`: the session itself, in push or pull mode
//! - `control`: string key/value access to the session
//! - `task`: scheduling and packet sinks

mod clock;
mod config;
mod control;
mod engine;
mod packet;
mod reader;
mod sampling;
mod task;
mod window;

pub use clock::{Clock, ManualClock, ReplayClock, SystemClock};
pub use config::{
    format_time, parse_bool, parse_time, ControlWrite, EndBound, ReplayConfig, ResolvedOptions,
    StartBound,
};
pub use control::CONTROL_KEYS;
pub use engine::CaptureReplay;
pub use packet::Packet;
pub use reader::{ReadOutcome, ReaderState, RecordHooks, RecordReader, RETRY_BUDGET};
pub use sampling::{threshold_for, Sampler, SAMPLING_ONE, SAMPLING_SHIFT};
pub use task::{
    Collector, Driver, DriverExit, Mode, NullSink, PacketSink, Stepable, Task, MAIN_PORT,
    SIDE_PORT,
};
pub use window::TimeWindow;
