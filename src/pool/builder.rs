//! Builder pattern for pool configuration.
//!
//! Provides a fluent API for configuring and creating [`Pool`] instances.
//!
//! # Example
//!
//! ```no_run
//! use console_trade_pool::{Pool, Timing};
//!
//! # fn example() -> console_trade_pool::Result<()> {
//! let pool = Pool::builder()
//!     .capacity(20)
//!     .timing(Timing::default())
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::config::{QueueConfig, Timing};
use crate::error::{Error, Result};

use super::core::Pool;
use super::resolver::{HexResolver, PayloadResolver};

// ============================================================================
// PoolBuilder
// ============================================================================

/// Builder for configuring a [`Pool`] instance.
///
/// Use [`Pool::builder()`] to create a new builder.
#[derive(Clone)]
pub struct PoolBuilder {
    /// Waiting-list settings.
    queue: QueueConfig,
    /// Pacing and timeouts.
    timing: Timing,
    /// Payload source; hex descriptors when unset.
    resolver: Option<Arc<dyn PayloadResolver>>,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            timing: Timing::default(),
            resolver: None,
        }
    }
}

impl fmt::Debug for PoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("queue", &self.queue)
            .field("timing", &self.timing)
            .field("custom_resolver", &self.resolver.is_some())
            .finish()
    }
}

// ============================================================================
// PoolBuilder Implementation
// ============================================================================

impl PoolBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of pending items.
    #[inline]
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.queue.capacity = capacity;
        self
    }

    /// Starts with admission closed.
    #[inline]
    #[must_use]
    pub fn closed(mut self) -> Self {
        self.queue.open = false;
        self
    }

    /// Sets all waiting-list settings.
    #[inline]
    #[must_use]
    pub fn queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    /// Sets pacing and timeouts.
    #[inline]
    #[must_use]
    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Sets the payload resolver.
    #[inline]
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn PayloadResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Builds the pool with validation. No devices are registered yet.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if capacity is zero
    /// - [`Error::Config`] if the timing cannot make progress
    pub fn build(self) -> Result<Pool> {
        self.validate_queue()?;
        self.timing.validate()?;

        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(HexResolver) as Arc<dyn PayloadResolver>);

        Ok(Pool::new(self.queue, self.timing, resolver))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl PoolBuilder {
    /// Validates the waiting-list configuration.
    fn validate_queue(&self) -> Result<()> {
        if self.queue.capacity == 0 {
            return Err(Error::config(
                "Queue capacity must be greater than 0. Use .capacity() to set it.\n\
                 Example: Pool::builder().capacity(20)",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
