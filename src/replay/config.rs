//! Replay configuration.
//!
//! [`ReplayConfig`] is a plain struct with builder-style setters. Nothing is
//! checked until [`ReplayConfig::validate`], which the engine runs when it
//! opens the capture.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ControlError};

use super::sampling::{self, SAMPLING_ONE};

/// When the replay window opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartBound {
    /// At an absolute capture time
    Absolute(Duration),
    /// This long after the first record
    AfterFirst(Duration),
}

impl StartBound {
    /// Build a start bound from the two mutually exclusive options.
    pub fn from_options(
        start: Option<Duration>,
        start_after: Option<Duration>,
    ) -> Result<Option<Self>, ConfigError> {
        match (start, start_after) {
            (Some(_), Some(_)) => Err(ConfigError::MutuallyExclusive("START and START_AFTER")),
            (Some(t), None) => Ok(Some(StartBound::Absolute(t))),
            (None, Some(d)) => Ok(Some(StartBound::AfterFirst(d))),
            (None, None) => Ok(None),
        }
    }
}

/// When the replay window closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndBound {
    /// At an absolute capture time
    Absolute(Duration),
    /// This long after the first record
    AfterFirst(Duration),
    /// This long after the window opens
    Interval(Duration),
}

impl EndBound {
    /// Build an end bound from the three mutually exclusive options.
    pub fn from_options(
        end: Option<Duration>,
        end_after: Option<Duration>,
        interval: Option<Duration>,
    ) -> Result<Option<Self>, ConfigError> {
        match (end, end_after, interval) {
            (Some(t), None, None) => Ok(Some(EndBound::Absolute(t))),
            (None, Some(d), None) => Ok(Some(EndBound::AfterFirst(d))),
            (None, None, Some(d)) => Ok(Some(EndBound::Interval(d))),
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::MutuallyExclusive(
                "END, END_AFTER, and INTERVAL",
            )),
        }
    }
}

/// A write to one of the engine's controls.
///
/// Used both by the control surface and as the end-of-window call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlWrite {
    /// `active BOOL`
    Active(bool),
    /// `stop`
    Stop,
    /// `extend_interval TIME`
    ExtendInterval(Duration),
}

impl ControlWrite {
    /// Parse a control write from its key and value.
    pub fn from_key_value(key: &str, value: &str) -> Result<Self, ControlError> {
        let value = value.trim();
        match key {
            "active" => parse_bool(value)
                .map(ControlWrite::Active)
                .ok_or_else(|| ControlError::InvalidValue {
                    key: key.to_string(),
                    expected: "should be Boolean",
                }),
            "stop" => Ok(ControlWrite::Stop),
            "extend_interval" => parse_time(value)
                .map(ControlWrite::ExtendInterval)
                .map_err(|_| ControlError::InvalidValue {
                    key: key.to_string(),
                    expected: "takes a time interval",
                }),
            "sampling_prob" | "encap" | "filesize" | "filepos" | "scheduled" => {
                Err(ControlError::NotWritable(key.to_string()))
            }
            _ => Err(ControlError::Unknown(key.to_string())),
        }
    }

    /// Parse `KEY [VALUE]`.
    pub fn parse(call: &str) -> Result<Self, ControlError> {
        let call = call.trim();
        let (key, value) = call
            .split_once(char::is_whitespace)
            .unwrap_or((call, ""));
        Self::from_key_value(key, value)
    }
}

impl std::fmt::Display for ControlWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlWrite::Active(active) => write!(f, "active {}", active),
            ControlWrite::Stop => f.write_str("stop"),
            ControlWrite::ExtendInterval(d) => {
                write!(f, "extend_interval {}", format_time(*d))
            }
        }
    }
}

/// Options for one replay session.
#[derive(Clone, Debug)]
pub struct ReplayConfig {
    /// Capture file; `-` reads standard input
    pub path: PathBuf,
    /// Pace packets by their original inter-arrival times
    pub timing: bool,
    /// Ask the host to stop once the capture is exhausted
    pub stop: bool,
    /// Whether the engine starts out emitting packets
    pub active: bool,
    /// Try memory-mapping regular files
    pub mmap: bool,
    /// Probability that each record is kept
    pub sample: f64,
    /// Only emit packets with a valid IPv4 header
    pub force_ip: bool,
    /// Start of the replay window
    pub start: Option<StartBound>,
    /// End of the replay window
    pub end: Option<EndBound>,
    /// Control write run once when the end bound is reached
    pub end_call: Option<String>,
    /// Seed for the sampling generator
    pub seed: Option<u64>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("-"),
            timing: false,
            stop: false,
            active: true,
            mmap: cfg!(not(target_os = "linux")),
            sample: 1.0,
            force_ip: false,
            start: None,
            end: None,
            end_call: None,
            seed: None,
        }
    }
}

/// Settings derived from a validated [`ReplayConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedOptions {
    /// Sampling threshold in 28-bit fixed point
    pub sampling_threshold: u32,
    /// End-of-window call, defaulted when an end bound is set
    pub end_call: Option<ControlWrite>,
}

impl ReplayConfig {
    /// Configuration for replaying `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_timing(mut self, timing: bool) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_stop(mut self, stop: bool) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_mmap(mut self, mmap: bool) -> Self {
        self.mmap = mmap;
        self
    }

    pub fn with_sample(mut self, probability: f64) -> Self {
        self.sample = probability;
        self
    }

    pub fn with_force_ip(mut self, force_ip: bool) -> Self {
        self.force_ip = force_ip;
        self
    }

    pub fn with_start(mut self, start: StartBound) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: EndBound) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_end_call(mut self, call: impl Into<String>) -> Self {
        self.end_call = Some(call.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Whether the input is standard input.
    pub fn is_stdin(&self) -> bool {
        self.path == Path::new("-")
    }

    /// Name used in messages about the input.
    pub fn display_name(&self) -> String {
        if self.is_stdin() {
            "<stdin>".to_string()
        } else {
            self.path.display().to_string()
        }
    }

    /// Check the options and derive the settings the engine runs with.
    ///
    /// Probabilities above 1 are reduced to 1 with a warning; a probability
    /// of 0 is accepted with a warning.
    pub fn validate(&self) -> Result<ResolvedOptions, ConfigError> {
        if self.sample.is_nan() || self.sample < 0.0 {
            return Err(ConfigError::InvalidProbability(self.sample));
        }

        let raw = sampling::threshold_for(self.sample);
        let sampling_threshold = if raw > SAMPLING_ONE as u64 {
            tracing::warn!("SAMPLE probability reduced to 1");
            SAMPLING_ONE
        } else {
            if raw == 0 {
                tracing::warn!("SAMPLE probability is 0; emitting no packets");
            }
            raw as u32
        };

        let end_call = match &self.end_call {
            Some(call) => Some(ControlWrite::parse(call).map_err(|e| {
                ConfigError::BadEndCall {
                    call: call.clone(),
                    reason: e.to_string(),
                }
            })?),
            None if self.end.is_some() => Some(ControlWrite::Active(false)),
            None => None,
        };

        Ok(ResolvedOptions {
            sampling_threshold,
            end_call,
        })
    }
}

/// Parse a time value written as `SEC[.FRACTION]`.
///
/// Fractions finer than a nanosecond are truncated.
pub fn parse_time(text: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidTime(text.to_string());
    let text = text.trim();

    let (secs, frac) = text.split_once('.').unwrap_or((text, ""));
    if secs.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !secs.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let secs: u64 = if secs.is_empty() {
        0
    } else {
        secs.parse().map_err(|_| invalid())?
    };

    let mut nanos = 0u32;
    let mut scale = 100_000_000u32;
    for digit in frac.bytes().take(9) {
        nanos += (digit - b'0') as u32 * scale;
        scale /= 10;
    }

    Ok(Duration::new(secs, nanos))
}

/// Render a time value the way [`parse_time`] reads it.
pub fn format_time(d: Duration) -> String {
    let nanos = d.subsec_nanos();
    if nanos == 0 {
        return d.as_secs().to_string();
    }
    let frac = format!("{:09}", nanos);
    format!("{}.{}", d.as_secs(), frac.trim_end_matches('0'))
}

/// Parse a boolean control value.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "t" | "y" | "on" => Some(true),
        "false" | "no" | "0" | "f" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("5").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_time("1.5").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_time("0.000001").unwrap(), Duration::from_micros(1));
        assert_eq!(parse_time(".25").unwrap(), Duration::from_millis(250));
        assert_eq!(
            parse_time("2.1234567891").unwrap(),
            Duration::new(2, 123_456_789)
        );
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        for bad in ["", ".", "abc", "1.2.3", "-1", "1e3", "1 s"] {
            assert!(parse_time(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(Duration::from_secs(3)), "3");
        assert_eq!(format_time(Duration::from_millis(2500)), "2.5");
        assert_eq!(format_time(Duration::from_micros(1)), "0.000001");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("No"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_start_bounds_exclusive() {
        let t = Some(Duration::from_secs(1));
        assert!(StartBound::from_options(t, t).is_err());
        assert_eq!(
            StartBound::from_options(None, t).unwrap(),
            Some(StartBound::AfterFirst(Duration::from_secs(1)))
        );
    }

    #[test]
    fn test_end_bounds_exclusive() {
        let t = Some(Duration::from_secs(1));
        assert!(EndBound::from_options(t, None, t).is_err());
        assert!(EndBound::from_options(None, t, t).is_err());
        assert_eq!(EndBound::from_options(None, None, None).unwrap(), None);
        assert_eq!(
            EndBound::from_options(None, None, t).unwrap(),
            Some(EndBound::Interval(Duration::from_secs(1)))
        );
    }

    #[test]
    fn test_control_write_parse() {
        assert_eq!(ControlWrite::parse("active false").unwrap(), ControlWrite::Active(false));
        assert_eq!(ControlWrite::parse("  stop ").unwrap(), ControlWrite::Stop);
        assert_eq!(
            ControlWrite::parse("extend_interval 2.5").unwrap(),
            ControlWrite::ExtendInterval(Duration::from_millis(2500))
        );
        assert!(matches!(
            ControlWrite::parse("active sometimes"),
            Err(ControlError::InvalidValue { .. })
        ));
        assert!(matches!(
            ControlWrite::parse("filepos 3"),
            Err(ControlError::NotWritable(_))
        ));
        assert!(matches!(ControlWrite::parse("bogus"), Err(ControlError::Unknown(_))));
    }

    #[test]
    fn test_control_write_display_round_trips() {
        let write = ControlWrite::ExtendInterval(Duration::from_millis(1500));
        assert_eq!(write.to_string(), "extend_interval 1.5");
        assert_eq!(ControlWrite::parse(&write.to_string()).unwrap(), write);
    }

    #[test]
    fn test_validate_defaults_end_call() {
        let config = ReplayConfig::new("x.pcap").with_end(EndBound::AfterFirst(Duration::from_secs(1)));
        let opts = config.validate().unwrap();
        assert_eq!(opts.end_call, Some(ControlWrite::Active(false)));
        assert_eq!(opts.sampling_threshold, SAMPLING_ONE);

        let opts = ReplayConfig::new("x.pcap").validate().unwrap();
        assert_eq!(opts.end_call, None);
    }

    #[test]
    fn test_validate_rejects_bad_end_call() {
        let config = ReplayConfig::new("x.pcap").with_end_call("active whenever");
        assert!(matches!(config.validate(), Err(ConfigError::BadEndCall { .. })));
    }

    #[test]
    fn test_validate_clamps_probability() {
        let opts = ReplayConfig::new("x.pcap").with_sample(3.0).validate().unwrap();
        assert_eq!(opts.sampling_threshold, SAMPLING_ONE);

        let opts = ReplayConfig::new("x.pcap").with_sample(0.0).validate().unwrap();
        assert_eq!(opts.sampling_threshold, 0);

        assert!(ReplayConfig::new("x.pcap").with_sample(-0.5).validate().is_err());
        assert!(ReplayConfig::new("x.pcap").with_sample(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(ReplayConfig::new("-").display_name(), "<stdin>");
        assert_eq!(ReplayConfig::new("a.pcap").display_name(), "a.pcap");
    }
}
