//! Per-device trade drivers.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DeviceDriver`] | Runs one work item through the trade sequence |
//! | [`DriverState`] | Step of the sequence |
//! | [`Progress`] | Step announcement |
//! | [`Title`] | Supported titles and their [`TitleProfile`] |
//! | [`OffsetTable`] | Memory addresses one title uses |
//!
//! # Example
//!
//! ```ignore
//! use console_trade_pool::{DeviceDriver, DeviceId, Timing, Title};
//!
//! let driver = DeviceDriver::new(DeviceId::next(), "left", Title::LetsGo, link, Timing::default());
//! let mut progress = driver.subscribe();
//!
//! let outcome = driver.execute(&item, Some(&payload), &cancel).await;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Driver state machine.
pub mod core;

/// On-screen keypad navigation.
pub mod keypad;

/// Driver states and progress reports.
pub mod state;

/// Per-title capability tables.
pub mod title;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::DeviceDriver;
pub use state::{DriverState, Progress};
pub use title::{Address, FLAG_FOUND, FLAG_IDLE, OffsetTable, Step, Title, TitleProfile};
