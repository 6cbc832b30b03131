//! TCP transport layer.
//!
//! This module handles communication between the controller and the
//! debug agent running on each console.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Driver (Rust)  │                              │  Console        │
//! │                 │      line-oriented TCP       │                 │
//! │  LinkClient     │◄────────────────────────────►│  Debug agent    │
//! │  → Connection   │        address:6000          │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `LinkClient::new` - Record the device endpoint
//! 2. `LinkClient::connect` - Open TCP, start the I/O loop, disable echo
//! 3. `Link` methods - Peek, poke and simulate input
//! 4. `Link::shutdown` - Close the socket
//!
//! A dead connection stays dead until `connect` is called again.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Socket ownership and I/O loop |
//! | `link` | [`Link`] trait and the TCP [`LinkClient`] |

// ============================================================================
// Submodules
// ============================================================================

/// TCP connection and I/O loop.
pub mod connection;

/// Device operations over a connection.
pub mod link;

/// Scripted link for unit tests.
#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, DEFAULT_COMMAND_TIMEOUT};
pub use link::{Link, LinkClient};
