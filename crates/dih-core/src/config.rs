//! Session configuration.

use std::time::Duration;

use dih_proto::DEFAULT_MAX_RECORD_LEN;

use crate::error::ConfigError;

/// Minimum wait between registration attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(5_000);

/// Interval between heartbeats while registered.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10_000);

/// Time allowed for the hub to acknowledge a heartbeat.
pub const DEFAULT_HEARTBEAT_ACK_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Smallest accepted record limit. A bare ack is already ~40 bytes.
pub const MIN_RECORD_LEN: usize = 32;

/// Largest accepted record limit. Bounds what a single inbound line may
/// cost in buffer memory.
pub const MAX_RECORD_LEN: usize = 64 * 1024;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Wait between registration attempts, and the deadline for a
    /// registration acknowledgement
    pub retry_interval: Duration,
    /// Interval between heartbeats while registered
    pub heartbeat_interval: Duration,
    /// Deadline for a heartbeat acknowledgement before the hub is considered
    /// lost
    pub heartbeat_ack_timeout: Duration,
    /// Maximum length of a single inbound or outbound record, in bytes
    pub max_record_len: usize,
    /// Drop inbound data and commands unless registered
    pub gate_inbound_on_registration: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_ack_timeout: DEFAULT_HEARTBEAT_ACK_TIMEOUT,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            gate_inbound_on_registration: false,
        }
    }
}

impl SessionConfig {
    /// Check that the configuration can drive a session.
    ///
    /// # Errors
    ///
    /// - `ConfigError::ZeroDuration` if any interval or timeout is zero
    /// - `ConfigError::RecordLimitTooSmall` if `max_record_len` is below
    ///   [`MIN_RECORD_LEN`]
    /// - `ConfigError::RecordLimitTooLarge` if `max_record_len` is above
    ///   [`MAX_RECORD_LEN`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("retry_interval", self.retry_interval),
            ("heartbeat_interval", self.heartbeat_interval),
            ("heartbeat_ack_timeout", self.heartbeat_ack_timeout),
        ];

        if let Some((field, _)) = durations.into_iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::ZeroDuration { field });
        }

        if self.max_record_len < MIN_RECORD_LEN {
            return Err(ConfigError::RecordLimitTooSmall {
                len: self.max_record_len,
                min: MIN_RECORD_LEN,
            });
        }

        if self.max_record_len > MAX_RECORD_LEN {
            return Err(ConfigError::RecordLimitTooLarge {
                len: self.max_record_len,
                max: MAX_RECORD_LEN,
            });
        }

        Ok(())
    }
}
