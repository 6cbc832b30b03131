//! Command definitions for the console debug link.
//!
//! Every command encodes to one ASCII line of the shape
//! `<verb> <args>\r\n`.
//!
//! # Command Groups
//!
//! | Group | Verbs |
//! |-------|-------|
//! | Memory (heap-relative) | `peek`, `poke` |
//! | Memory (main-relative) | `peekMain`, `pokeMain` |
//! | Memory (absolute) | `peekAbsolute`, `pokeAbsolute` |
//! | Input | `click`, `press`, `release`, `setStick` |
//! | Session | `configure`, `getTitleID`, `getVersion` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Line terminator expected by the remote end.
pub const LINE_TERMINATOR: &str = "\r\n";

// ============================================================================
// MemoryRegion
// ============================================================================

/// Which address space an offset is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryRegion {
    /// Relative to the running title's heap base.
    #[default]
    Heap,
    /// Relative to the running title's main executable base.
    Main,
    /// Absolute address.
    Absolute,
}

impl MemoryRegion {
    /// Verb used to read from this region.
    #[inline]
    #[must_use]
    pub const fn read_verb(self) -> &'static str {
        match self {
            Self::Heap => "peek",
            Self::Main => "peekMain",
            Self::Absolute => "peekAbsolute",
        }
    }

    /// Verb used to write to this region.
    #[inline]
    #[must_use]
    pub const fn write_verb(self) -> &'static str {
        match self {
            Self::Heap => "poke",
            Self::Main => "pokeMain",
            Self::Absolute => "pokeAbsolute",
        }
    }
}

// ============================================================================
// Button
// ============================================================================

/// Virtual controller buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Button {
    A,
    B,
    X,
    Y,
    L,
    R,
    Zl,
    Zr,
    Plus,
    Minus,
    LStick,
    RStick,
    DUp,
    DDown,
    DLeft,
    DRight,
    Home,
    Capture,
}

impl Button {
    /// Wire name of the button.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::X => "X",
            Self::Y => "Y",
            Self::L => "L",
            Self::R => "R",
            Self::Zl => "ZL",
            Self::Zr => "ZR",
            Self::Plus => "PLUS",
            Self::Minus => "MINUS",
            Self::LStick => "LSTICK",
            Self::RStick => "RSTICK",
            Self::DUp => "DUP",
            Self::DDown => "DDOWN",
            Self::DLeft => "DLEFT",
            Self::DRight => "DRIGHT",
            Self::Home => "HOME",
            Self::Capture => "CAPTURE",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ============================================================================
// Stick
// ============================================================================

/// Analog sticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stick {
    Left,
    Right,
}

impl Stick {
    /// Wire name of the stick.
    #[inline]
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

// ============================================================================
// Command
// ============================================================================

/// One wire command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read `length` bytes at `address`.
    Peek {
        region: MemoryRegion,
        address: u64,
        length: usize,
    },
    /// Write `data` at `address`.
    Poke {
        region: MemoryRegion,
        address: u64,
        data: Vec<u8>,
    },
    /// Press and release a button.
    Click(Button),
    /// Press a button down.
    Press(Button),
    /// Release a held button.
    Release(Button),
    /// Deflect a stick. `0, 0` is centered.
    SetStick { stick: Stick, x: i16, y: i16 },
    /// Toggle echoing of every command back over the link.
    ConfigureEcho(bool),
    /// Ask for the running title ID.
    GetTitleId,
    /// Ask for the remote agent version.
    GetVersion,
}

impl Command {
    /// Returns the command verb.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Peek { region, .. } => region.read_verb(),
            Self::Poke { region, .. } => region.write_verb(),
            Self::Click(_) => "click",
            Self::Press(_) => "press",
            Self::Release(_) => "release",
            Self::SetStick { .. } => "setStick",
            Self::ConfigureEcho(_) => "configure",
            Self::GetTitleId => "getTitleID",
            Self::GetVersion => "getVersion",
        }
    }

    /// Returns `true` if the remote end answers with one line.
    ///
    /// Assumes echo is disabled.
    #[inline]
    #[must_use]
    pub fn expects_reply(&self) -> bool {
        matches!(self, Self::Peek { .. } | Self::GetTitleId | Self::GetVersion)
    }

    /// Encodes the command as a terminated wire line.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{self}{LINE_TERMINATOR}")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = self.verb();
        match self {
            Self::Peek {
                address, length, ..
            } => write!(f, "{verb} 0x{address:X} {length}"),
            Self::Poke { address, data, .. } => {
                write!(f, "{verb} 0x{address:X} 0x{}", hex::encode_upper(data))
            }
            Self::Click(button) | Self::Press(button) | Self::Release(button) => {
                write!(f, "{verb} {button}")
            }
            Self::SetStick { stick, x, y } => write!(
                f,
                "{verb} {} 0x{:X} 0x{:X}",
                stick.wire_name(),
                *x as u16,
                *y as u16
            ),
            Self::ConfigureEcho(enabled) => {
                write!(f, "{verb} echoCommands {}", u8::from(*enabled))
            }
            Self::GetTitleId | Self::GetVersion => f.write_str(verb),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
