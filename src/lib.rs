//! Console Trade Pool - Queued trade automation across networked consoles.
//!
//! This library drives a small pool of consoles, each running a debug
//! agent reachable over TCP, through an in-game trade sequence on behalf
//! of many concurrent submitters.
//!
//! # Architecture
//!
//! ```text
//!  submitters ──► WaitingList ◄── device loop ──► DeviceDriver ──► LinkClient ──► console
//!                     ▲          (one per device)                                  agent
//!                     └── QueueEvent (admitted / started / completed)
//! ```
//!
//! Key design principles:
//!
//! - Each registered device owns one link, one driver and one loop task
//! - The waiting list is the only state shared between loops
//! - Every timed wait races a cancellation token; nothing busy-waits
//! - Titles differ only in data ([`TitleProfile`]), never in code paths
//!
//! # Quick Start
//!
//! ```no_run
//! use console_trade_pool::{
//!     DeviceConfig, PayloadRef, Pool, QueueEvent, Result, SubmitterId, Title, TradeCode,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let pool = Pool::builder().capacity(20).build()?;
//!     pool.add_device(DeviceConfig::new("left", "192.168.0.20", Title::SwordShield))
//!         .await?;
//!
//!     let mut events = pool.subscribe();
//!     pool.submit(
//!         SubmitterId::new(42),
//!         "ash",
//!         PayloadRef::new("Pikachu", "<hex block>"),
//!         TradeCode::new(1234_5678),
//!     );
//!
//!     while let Ok(event) = events.recv().await {
//!         if let QueueEvent::Completed(notice) = event {
//!             println!("{} -> {}: {}", notice.payload_name.unwrap_or_default(), notice.submitter_name, notice.success);
//!             break;
//!         }
//!     }
//!
//!     pool.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | TOML configuration and timing |
//! | [`driver`] | Per-device trade state machine and title tables |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`pool`] | Scheduler, builder and status |
//! | [`protocol`] | Wire commands and reply decoding |
//! | [`queue`] | Work items and the waiting list |
//! | [`transport`] | TCP link to the debug agent |

// ============================================================================
// Modules
// ============================================================================

/// Pool configuration.
///
/// Load with [`PoolConfig::from_file`] or build in code.
pub mod config;

/// Per-device trade drivers.
///
/// A [`DeviceDriver`] runs one item at a time through its title's sequence.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for pool entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Device pool and scheduler.
///
/// Use [`Pool::builder()`] or [`Pool::from_config`] to create one.
pub mod pool;

/// Debug-link wire protocol.
///
/// Command encoding and reply decoding.
pub mod protocol;

/// Work items and the waiting list.
pub mod queue;

/// TCP transport layer.
///
/// The [`Link`] trait and its TCP implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration types
pub use config::{DeviceConfig, PoolConfig, QueueConfig, Timing};

// Driver types
pub use driver::{
    Address, DeviceDriver, DriverState, OffsetTable, Progress, Step, Title, TitleProfile,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{DeviceId, ItemId, SubmitterId};

// Pool types
pub use pool::{DeviceStatus, HexResolver, PayloadResolver, Pool, PoolBuilder, PoolStatus};

// Protocol types
pub use protocol::{Button, MemoryRegion, Stick};

// Queue types
pub use queue::{
    CompletionNotice, FailureReason, ItemStatus, OperationKind, Outcome, PayloadRef, QueueEvent,
    QueueResult, TradeCode, WaitingList, WorkItem,
};

// Transport types
pub use transport::{Link, LinkClient};
