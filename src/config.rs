//! Pool configuration.
//!
//! Loaded from TOML or built in code. Every table is optional and falls
//! back to the defaults below.
//!
//! # Example
//!
//! ```toml
//! [queue]
//! capacity = 30
//!
//! [timing]
//! partner_timeout_ms = 90000
//!
//! [[devices]]
//! name = "left"
//! address = "192.168.0.20"
//! title = "sword_shield"
//!
//! [[devices]]
//! name = "right"
//! address = "192.168.0.21"
//! port = 6001
//! title = "lets_go"
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::{OffsetTable, Title};
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default agent port.
pub const DEFAULT_PORT: u16 = 6000;

/// Default waiting-list capacity.
pub const DEFAULT_CAPACITY: usize = 50;

// ============================================================================
// Timing
// ============================================================================

/// Pacing and timeout constants, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Idle wait before an idle device checks the list again.
    pub backoff_ms: u64,
    /// Pause after an item finishes before the device is eligible again.
    pub settle_ms: u64,
    /// Flag polling interval.
    pub poll_interval_ms: u64,
    /// How long to wait for a partner.
    pub partner_timeout_ms: u64,
    /// How long to wait for the exchange screen to close.
    pub completion_timeout_ms: u64,
    /// How long the search flag may take to rise after code entry.
    pub search_start_timeout_ms: u64,
    /// Pause after writing the payload.
    pub injection_settle_ms: u64,
    /// Pause between keypad presses.
    pub key_delay_ms: u64,
    /// Pause between recovery presses.
    pub recovery_delay_ms: u64,
    /// Reply timeout on the link.
    pub command_timeout_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            backoff_ms: 1_000,
            settle_ms: 2_000,
            poll_interval_ms: 500,
            partner_timeout_ms: 60_000,
            completion_timeout_ms: 30_000,
            search_start_timeout_ms: 5_000,
            injection_settle_ms: 1_000,
            key_delay_ms: 300,
            recovery_delay_ms: 600,
            command_timeout_ms: 10_000,
        }
    }
}

impl Timing {
    #[inline]
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    #[inline]
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    #[inline]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[inline]
    #[must_use]
    pub const fn partner_timeout(&self) -> Duration {
        Duration::from_millis(self.partner_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub const fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub const fn search_start_timeout(&self) -> Duration {
        Duration::from_millis(self.search_start_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub const fn injection_settle(&self) -> Duration {
        Duration::from_millis(self.injection_settle_ms)
    }

    #[inline]
    #[must_use]
    pub const fn key_delay(&self) -> Duration {
        Duration::from_millis(self.key_delay_ms)
    }

    #[inline]
    #[must_use]
    pub const fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }

    #[inline]
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Checks that polling can make progress.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the poll interval is zero or not
    /// shorter than every polling timeout.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::config("poll_interval_ms must be greater than 0"));
        }

        let timeouts = [
            ("partner_timeout_ms", self.partner_timeout_ms),
            ("completion_timeout_ms", self.completion_timeout_ms),
            ("search_start_timeout_ms", self.search_start_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value <= self.poll_interval_ms {
                return Err(Error::config(format!(
                    "{name} ({value}) must exceed poll_interval_ms ({})",
                    self.poll_interval_ms
                )));
            }
        }

        if self.command_timeout_ms == 0 {
            return Err(Error::config("command_timeout_ms must be greater than 0"));
        }

        Ok(())
    }
}

// ============================================================================
// QueueConfig
// ============================================================================

/// Waiting-list settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of pending items.
    pub capacity: usize,
    /// Whether the list admits items at startup.
    pub open: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            open: true,
        }
    }
}

// ============================================================================
// DeviceConfig
// ============================================================================

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// One device entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Display name.
    pub name: String,
    /// Host name or IP.
    pub address: String,
    /// Agent port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Title the device runs.
    pub title: Title,
    /// Replaces the title's built-in offsets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<OffsetTable>,
}

impl DeviceConfig {
    /// Creates an entry on the default port.
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>, title: Title) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port: DEFAULT_PORT,
            title,
            offsets: None,
        }
    }

    /// Sets the agent port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overrides the title's offsets.
    #[must_use]
    pub fn with_offsets(mut self, offsets: OffsetTable) -> Self {
        self.offsets = Some(offsets);
        self
    }

    /// Offsets to drive with.
    #[must_use]
    pub fn effective_offsets(&self) -> OffsetTable {
        self.offsets.unwrap_or(self.title.profile().offsets)
    }
}

// ============================================================================
// PoolConfig
// ============================================================================

/// Complete pool configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl PoolConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// - [`Error::Toml`] if the document does not parse
    /// - [`Error::Config`] if a value is out of range
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// As [`from_toml_str`](Self::from_toml_str), plus [`Error::Io`] if
    /// the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.queue.capacity == 0 {
            return Err(Error::config("queue capacity must be greater than 0"));
        }

        self.timing.validate()?;

        for (index, device) in self.devices.iter().enumerate() {
            if device.name.trim().is_empty() {
                return Err(Error::config(format!("device #{index} has no name")));
            }
            if device.address.trim().is_empty() {
                return Err(Error::config(format!(
                    "device '{}' has no address",
                    device.name
                )));
            }
            if self.devices[..index].iter().any(|d| d.name == device.name) {
                return Err(Error::config(format!(
                    "device name '{}' is used twice",
                    device.name
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
