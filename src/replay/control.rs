//! String key/value control surface.
//!
//! | key               | access | value                                   |
//! |-------------------|--------|-----------------------------------------|
//! | `sampling_prob`   | read   | sampling probability                    |
//! | `active`          | r/w    | boolean                                 |
//! | `encap`           | read   | encapsulation name                      |
//! | `filesize`        | read   | bytes, or `-` if not a regular file     |
//! | `filepos`         | read   | byte offset of the next unread byte     |
//! | `scheduled`       | read   | push-mode task state                    |
//! | `stop`            | write  | any; forces inactive, requests a stop   |
//! | `extend_interval` | write  | time delta                              |

use crate::error::ControlError;

use super::config::ControlWrite;
use super::engine::CaptureReplay;
use super::task::Mode;

/// Names of every control, in display order.
pub const CONTROL_KEYS: &[&str] = &[
    "sampling_prob",
    "active",
    "encap",
    "filesize",
    "filepos",
    "scheduled",
    "stop",
    "extend_interval",
];

impl CaptureReplay {
    /// Read a control.
    pub fn read_control(&self, key: &str) -> Result<String, ControlError> {
        let value = match key {
            "sampling_prob" => self.sampling_probability().to_string(),
            "active" => self.is_active().to_string(),
            "encap" => self.link_type().to_string(),
            "filesize" => match self.file_size() {
                Some(size) => size.to_string(),
                None => "-".to_string(),
            },
            "filepos" => self.file_position().to_string(),
            "scheduled" if self.mode() == Mode::Push => self.is_scheduled().to_string(),
            "stop" | "extend_interval" => return Err(ControlError::NotReadable(key.to_string())),
            _ => return Err(ControlError::Unknown(key.to_string())),
        };
        Ok(value)
    }

    /// Write a control.
    pub fn write_control(&mut self, key: &str, value: &str) -> Result<(), ControlError> {
        let write = ControlWrite::from_key_value(key, value)?;
        tracing::debug!(%write, "control write");
        self.apply(write);
        Ok(())
    }

    /// Every readable control with its current value.
    pub fn control_readings(&self) -> Vec<(&'static str, String)> {
        CONTROL_KEYS
            .iter()
            .filter_map(|key| self.read_control(key).ok().map(|v| (*key, v)))
            .collect()
    }
}
