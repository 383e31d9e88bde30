//! Capture-time window filtering.

use std::time::Duration;

use super::config::{EndBound, StartBound};

/// Start and end bounds on record timestamps.
///
/// Bounds are configured relative to the capture but only become absolute
/// once the first record is seen, in [`TimeWindow::resolve`].
#[derive(Clone, Debug)]
pub struct TimeWindow {
    start: Option<StartBound>,
    end: Option<EndBound>,
    resolved: bool,
    /// Start time while records are still being checked against it
    start_at: Option<Duration>,
    end_at: Option<Duration>,
    end_armed: bool,
}

impl TimeWindow {
    pub fn new(start: Option<StartBound>, end: Option<EndBound>) -> Self {
        Self {
            start,
            end,
            resolved: false,
            start_at: None,
            end_at: None,
            end_armed: end.is_some(),
        }
    }

    /// Whether the bounds have been made absolute.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Make the bounds absolute, given the first record's timestamp.
    ///
    /// Without a start bound the window opens at the first record, which is
    /// also where an interval is measured from.
    pub fn resolve(&mut self, first: Duration) {
        let start = match self.start {
            Some(StartBound::Absolute(t)) => t,
            Some(StartBound::AfterFirst(d)) => first + d,
            None => first,
        };
        if self.start.is_some() {
            self.start_at = Some(start);
        }

        self.end_at = self.end.map(|end| match end {
            EndBound::Absolute(t) => t,
            EndBound::AfterFirst(d) => first + d,
            EndBound::Interval(d) => start + d,
        });
        self.resolved = true;
    }

    /// Check a record against the start bound.
    ///
    /// The first record at or after the start stops further start checks.
    pub fn admits_start(&mut self, ts: Duration) -> bool {
        match self.start_at {
            Some(start) if ts < start => false,
            Some(_) => {
                self.start_at = None;
                true
            }
            None => true,
        }
    }

    /// Whether an armed end bound has been reached.
    pub fn end_reached(&self, ts: Duration) -> bool {
        self.end_armed && self.end_at.is_some_and(|end| ts >= end)
    }

    /// Stop checking the end bound.
    pub fn disarm_end(&mut self) {
        self.end_armed = false;
    }

    /// Check the end bound again.
    pub fn rearm_end(&mut self) {
        self.end_armed = true;
    }

    /// Whether the end bound is being checked.
    pub fn end_armed(&self) -> bool {
        self.end_armed
    }

    /// Push the end bound later.
    ///
    /// Before resolution the extension is folded into the configured bound.
    /// With no end bound at all, the extension becomes an absolute end.
    pub fn extend_end(&mut self, delta: Duration) {
        if self.resolved {
            self.end_at = Some(self.end_at.unwrap_or_default() + delta);
            return;
        }
        self.end = Some(match self.end {
            Some(EndBound::Absolute(t)) => EndBound::Absolute(t + delta),
            Some(EndBound::AfterFirst(d)) => EndBound::AfterFirst(d + delta),
            Some(EndBound::Interval(d)) => EndBound::Interval(d + delta),
            None => EndBound::Absolute(delta),
        });
    }

    /// Resolved start, while records are still checked against it.
    pub fn start(&self) -> Option<Duration> {
        self.start_at
    }

    /// Resolved end bound.
    pub fn end(&self) -> Option<Duration> {
        self.end_at
    }
}
