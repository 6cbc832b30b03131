//! Device pool and scheduler.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Pool`] | Matches idle devices to queued items |
//! | [`PoolBuilder`] | Fluent configuration builder |
//! | [`PayloadResolver`] | Turns a payload reference into bytes |
//! | [`DeviceStatus`] / [`PoolStatus`] | Serializable snapshots |
//!
//! # Example
//!
//! ```no_run
//! use console_trade_pool::{Pool, PoolConfig, Result};
//!
//! # async fn example() -> Result<()> {
//! let config = PoolConfig::from_file("pool.toml")?;
//! let pool = Pool::from_config(config).await?;
//!
//! for device in pool.list_device_status() {
//!     println!("{}: busy={} completed={}", device.name, device.busy, device.completed);
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for pool configuration.
pub mod builder;

/// Scheduler implementation.
pub mod core;

/// Payload resolution.
pub mod resolver;

/// Device sessions and status snapshots.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::PoolBuilder;
pub use core::Pool;
pub use resolver::{HexResolver, PayloadResolver};
pub use session::{DeviceStatus, PoolStatus};
