//! Error types for the trade pool.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use console_trade_pool::{Link, LinkClient, MemoryRegion, Result};
//!
//! async fn example() -> Result<()> {
//!     let link = LinkClient::connect_to("192.168.0.20", 6000).await?;
//!     let bytes = link.read_bytes(MemoryRegion::Heap, 0x2F7240A0, 4).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Toml`], [`Error::TitleMismatch`] |
//! | Link | [`Error::Connection`], [`Error::NotConnected`], [`Error::ConnectionClosed`], [`Error::ResponseTimeout`] |
//! | Argument | [`Error::InvalidArgument`] |
//! | Sequence | [`Error::SequenceTimeout`], [`Error::Cancelled`] |
//! | Queue | [`Error::InvalidTransition`], [`Error::ItemNotFound`], [`Error::DeviceNotFound`] |
//! | External | [`Error::Io`], [`Error::Resolver`] |
//!
//! Queue admission refusals (full, duplicate, closed) are not errors; they
//! come back as a [`QueueResult`](crate::queue::QueueResult) value.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::{DeviceId, ItemId};
use crate::queue::{FailureReason, ItemStatus};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when pool or device configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Device is running a different title than configured.
    #[error("Title mismatch: expected {expected}, device reports {actual}")]
    TitleMismatch {
        /// Title ID the device was registered for.
        expected: String,
        /// Title ID the device reported.
        actual: String,
    },

    // ========================================================================
    // Link Errors
    // ========================================================================
    /// TCP connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Operation attempted on a link that was never connected or was shut down.
    #[error("Not connected")]
    NotConnected,

    /// Link closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No reply line arrived in time.
    ///
    /// Replies are correlated in order, so the link is dead after this.
    #[error("No response to '{command}' within {timeout_ms}ms")]
    ResponseTimeout {
        /// Verb of the command that went unanswered.
        command: String,
        /// Milliseconds waited.
        timeout_ms: u64,
    },

    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// Invalid argument to an operation.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Sequence Errors
    // ========================================================================
    /// A polling step ran out of time.
    #[error("Timeout after {timeout_ms}ms: {reason}")]
    SequenceTimeout {
        /// What the step was waiting for.
        reason: FailureReason,
        /// Milliseconds waited.
        timeout_ms: u64,
    },

    /// The operation was cancelled by its caller.
    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// Status change not allowed from the item's current status.
    #[error("Invalid transition for item {item_id}: {from} -> {to}")]
    InvalidTransition {
        /// The item.
        item_id: ItemId,
        /// Current status.
        from: ItemStatus,
        /// Requested status.
        to: ItemStatus,
    },

    /// Item is not in the waiting list.
    #[error("Item not found: {item_id}")]
    ItemNotFound {
        /// The missing item ID.
        item_id: ItemId,
    },

    /// Device is not registered with the pool.
    #[error("Device not found: {device_id}")]
    DeviceNotFound {
        /// The missing device ID.
        device_id: DeviceId,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// Payload resolver failed.
    #[error("Resolver error: {message}")]
    Resolver {
        /// Description from the resolver.
        message: String,
    },
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a title mismatch error.
    #[inline]
    pub fn title_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TitleMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a response timeout error.
    #[inline]
    pub fn response_timeout(command: impl Into<String>, timeout_ms: u64) -> Self {
        Self::ResponseTimeout {
            command: command.into(),
            timeout_ms,
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a sequence timeout error.
    #[inline]
    pub fn sequence_timeout(reason: FailureReason, timeout_ms: u64) -> Self {
        Self::SequenceTimeout { reason, timeout_ms }
    }

    /// Creates an invalid transition error.
    #[inline]
    pub fn invalid_transition(item_id: ItemId, from: ItemStatus, to: ItemStatus) -> Self {
        Self::InvalidTransition { item_id, from, to }
    }

    /// Creates an item not found error.
    #[inline]
    pub fn item_not_found(item_id: ItemId) -> Self {
        Self::ItemNotFound { item_id }
    }

    /// Creates a device not found error.
    #[inline]
    pub fn device_not_found(device_id: DeviceId) -> Self {
        Self::DeviceNotFound { device_id }
    }

    /// Creates a resolver error.
    #[inline]
    pub fn resolver(message: impl Into<String>) -> Self {
        Self::Resolver {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a cancellation.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::SequenceTimeout { .. } | Self::ResponseTimeout { .. }
        )
    }

    /// Returns `true` if the link is unusable after this error.
    ///
    /// The owner must reconnect explicitly.
    #[inline]
    #[must_use]
    pub fn is_link_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::NotConnected
                | Self::ConnectionClosed
                | Self::ResponseTimeout { .. }
                | Self::Io(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
