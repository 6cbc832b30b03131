//! Debug-link wire protocol.
//!
//! The remote agent speaks a line-oriented ASCII protocol over TCP.
//!
//! # Protocol Overview
//!
//! | Direction | Content |
//! |-----------|---------|
//! | Local → Remote | One command per line, `\r\n` terminated |
//! | Remote → Local | One hex line per memory read, one text line per query |
//!
//! Writes and input commands produce no reply once echo is disabled, so
//! replies are correlated strictly in order.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command encoding, buttons, sticks, memory regions |
//! | `reply` | Reply line decoding |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions and encoding.
pub mod command;

/// Reply line decoding.
pub mod reply;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Button, Command, LINE_TERMINATOR, MemoryRegion, Stick};
pub use reply::{decode_hex_reply, normalize_title_id};
