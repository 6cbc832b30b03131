//! Per-title capability tables.
//!
//! Every supported title shares one driver skeleton and differs only in
//! the data here: memory offsets, payload size, code length and the
//! button sequences that reach and confirm the trade screen.
//!
//! | Title | Code digits | Payload bytes |
//! |-------|-------------|---------------|
//! | [`Title::SwordShield`] | 8 | 0x158 |
//! | [`Title::BrilliantDiamond`] | 8 | 0x158 |
//! | [`Title::LetsGo`] | 4 | 0x104 |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::{Button, MemoryRegion};

// ============================================================================
// Flag Sentinels
// ============================================================================

/// Flag byte while a partner is connected.
pub const FLAG_FOUND: u8 = 1;

/// Flag byte while no partner is connected.
pub const FLAG_IDLE: u8 = 0;

// ============================================================================
// Address
// ============================================================================

/// An offset and the region it is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub region: MemoryRegion,
    pub offset: u64,
}

impl Address {
    /// Heap-relative address.
    #[inline]
    #[must_use]
    pub const fn heap(offset: u64) -> Self {
        Self {
            region: MemoryRegion::Heap,
            offset,
        }
    }

    /// Main-relative address.
    #[inline]
    #[must_use]
    pub const fn main(offset: u64) -> Self {
        Self {
            region: MemoryRegion::Main,
            offset,
        }
    }
}

// ============================================================================
// OffsetTable
// ============================================================================

/// Memory addresses the trade sequence touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetTable {
    /// Where the outgoing payload is written.
    pub payload: Address,
    /// Partner identity block.
    pub partner_identity: Address,
    /// Length of the partner identity block.
    pub partner_identity_len: usize,
    /// Raised while the console is searching for a partner.
    pub partner_search_flag: Address,
    /// [`FLAG_FOUND`] while a partner is connected.
    pub partner_found_flag: Address,
    /// Block the partner is offering.
    pub partner_offer: Address,
}

// ============================================================================
// Step
// ============================================================================

/// One input in a fixed button sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Click, then wait this many milliseconds.
    Click(Button, u64),
    /// Hold for this many milliseconds.
    Hold(Button, u64),
    /// Wait without input.
    Wait(u64),
}

// ============================================================================
// TitleProfile
// ============================================================================

/// Everything the driver needs to know about one title.
#[derive(Debug)]
pub struct TitleProfile {
    /// Human-readable name.
    pub name: &'static str,
    /// 16-digit title ID reported by the agent.
    pub title_id: &'static str,
    /// Built-in offsets.
    pub offsets: OffsetTable,
    /// Fixed payload length in bytes.
    pub payload_len: usize,
    /// Number of digits in a trade code.
    pub code_digits: usize,
    /// From the overworld to the code keypad.
    pub navigation: &'static [Step],
    /// From a connected partner to a committed trade.
    pub confirmation: &'static [Step],
    /// Back presses that return to the overworld from anywhere.
    pub recovery_presses: usize,
}

// ============================================================================
// Built-in Profiles
// ============================================================================

static SWORD_SHIELD: TitleProfile = TitleProfile {
    name: "Sword/Shield",
    title_id: "0100ABF008968000",
    offsets: OffsetTable {
        payload: Address::heap(0x4506_D890),
        partner_identity: Address::heap(0xAF28_6078),
        partner_identity_len: 8,
        partner_search_flag: Address::heap(0x2F76_C3C4),
        partner_found_flag: Address::heap(0x2F76_C3C8),
        partner_offer: Address::heap(0x2F9C_6E60),
    },
    payload_len: 0x158,
    code_digits: 8,
    navigation: &[
        Step::Click(Button::Y, 2_000),
        Step::Click(Button::A, 1_500),
        Step::Click(Button::DDown, 400),
        Step::Click(Button::A, 1_000),
    ],
    confirmation: &[
        Step::Click(Button::A, 1_000),
        Step::Click(Button::A, 1_000),
        Step::Click(Button::A, 1_000),
    ],
    recovery_presses: 10,
};

static BRILLIANT_DIAMOND: TitleProfile = TitleProfile {
    name: "Brilliant Diamond/Shining Pearl",
    title_id: "0100000011D90000",
    offsets: OffsetTable {
        payload: Address::heap(0x4E7C_1A40),
        partner_identity: Address::main(0x04E5_2C20),
        partner_identity_len: 4,
        partner_search_flag: Address::main(0x04E5_2B88),
        partner_found_flag: Address::main(0x04E5_2B8C),
        partner_offer: Address::heap(0x4E7C_1C00),
    },
    payload_len: 0x158,
    code_digits: 8,
    navigation: &[
        Step::Click(Button::R, 1_000),
        Step::Click(Button::A, 1_500),
        Step::Click(Button::DDown, 400),
        Step::Click(Button::A, 1_500),
        Step::Click(Button::A, 1_000),
    ],
    confirmation: &[
        Step::Click(Button::A, 800),
        Step::Click(Button::A, 800),
        Step::Hold(Button::A, 1_000),
    ],
    recovery_presses: 8,
};

static LETS_GO: TitleProfile = TitleProfile {
    name: "Let's Go",
    title_id: "010003F003A34000",
    offsets: OffsetTable {
        payload: Address::heap(0x5336_75B0),
        partner_identity: Address::heap(0x41A2_8240),
        partner_identity_len: 4,
        partner_search_flag: Address::heap(0x41A2_8078),
        partner_found_flag: Address::heap(0x41A2_807C),
        partner_offer: Address::heap(0x41A2_8300),
    },
    payload_len: 0x104,
    code_digits: 4,
    navigation: &[
        Step::Click(Button::X, 1_500),
        Step::Click(Button::DRight, 400),
        Step::Click(Button::A, 2_000),
        Step::Click(Button::A, 1_000),
    ],
    confirmation: &[Step::Click(Button::A, 1_200), Step::Click(Button::A, 1_200)],
    recovery_presses: 6,
};

// ============================================================================
// Title
// ============================================================================

/// Supported target titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Title {
    SwordShield,
    BrilliantDiamond,
    LetsGo,
}

impl Title {
    /// All supported titles.
    pub const ALL: [Title; 3] = [Self::SwordShield, Self::BrilliantDiamond, Self::LetsGo];

    /// Returns the capability table for this title.
    #[must_use]
    pub fn profile(self) -> &'static TitleProfile {
        match self {
            Self::SwordShield => &SWORD_SHIELD,
            Self::BrilliantDiamond => &BRILLIANT_DIAMOND,
            Self::LetsGo => &LETS_GO,
        }
    }

    /// Looks a title up by the ID the agent reports.
    #[must_use]
    pub fn from_title_id(title_id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.profile().title_id.eq_ignore_ascii_case(title_id.trim()))
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().name)
    }
}

impl FromStr for Title {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "sword_shield" | "swsh" => Ok(Self::SwordShield),
            "brilliant_diamond" | "bdsp" => Ok(Self::BrilliantDiamond),
            "lets_go" | "lgpe" => Ok(Self::LetsGo),
            _ => Err(Error::config(format!("unknown title: {s}"))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
