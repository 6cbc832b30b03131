//! On-screen numeric keypad navigation.
//!
//! ```text
//!        col 0  col 1  col 2
//! row 0    1      2      3
//! row 1    4      5      6
//! row 2    7      8      9
//! row 3           0
//! ```
//!
//! The cursor starts on `1`. Each digit is reached with D-pad moves and
//! entered with `A`; `0` sits alone in the bottom row, so moves into that
//! row go horizontal first and moves out of it go vertical first.

// ============================================================================
// Imports
// ============================================================================

use std::cmp::Ordering;

use crate::protocol::Button;

// ============================================================================
// KeyPosition
// ============================================================================

/// A cell on the keypad grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPosition {
    pub row: u8,
    pub col: u8,
}

/// Cell the cursor starts on.
pub const START: KeyPosition = KeyPosition { row: 0, col: 0 };

/// Cell of digit 0.
const ZERO: KeyPosition = KeyPosition { row: 3, col: 1 };

/// Returns the grid cell of `digit`. Values above 9 are clamped to 9.
#[must_use]
pub fn digit_position(digit: u8) -> KeyPosition {
    match digit {
        0 => ZERO,
        d => {
            let index = d.min(9) - 1;
            KeyPosition {
                row: index / 3,
                col: index % 3,
            }
        }
    }
}

// ============================================================================
// Movement
// ============================================================================

fn vertical(from: KeyPosition, to: KeyPosition, out: &mut Vec<Button>) {
    let (button, count) = match to.row.cmp(&from.row) {
        Ordering::Greater => (Button::DDown, to.row - from.row),
        Ordering::Less => (Button::DUp, from.row - to.row),
        Ordering::Equal => return,
    };
    out.extend(std::iter::repeat_n(button, usize::from(count)));
}

fn horizontal(from: KeyPosition, to: KeyPosition, out: &mut Vec<Button>) {
    let (button, count) = match to.col.cmp(&from.col) {
        Ordering::Greater => (Button::DRight, to.col - from.col),
        Ordering::Less => (Button::DLeft, from.col - to.col),
        Ordering::Equal => return,
    };
    out.extend(std::iter::repeat_n(button, usize::from(count)));
}

/// D-pad moves from one cell to another, never crossing an empty cell.
#[must_use]
pub fn moves_between(from: KeyPosition, to: KeyPosition) -> Vec<Button> {
    let mut out = Vec::new();

    if to.row == ZERO.row {
        horizontal(from, to, &mut out);
        vertical(from, to, &mut out);
    } else {
        vertical(from, to, &mut out);
        horizontal(from, to, &mut out);
    }

    out
}

/// Full input sequence for a code: moves and an `A` per digit, then
/// `Plus` to submit.
#[must_use]
pub fn code_entry(digits: &[u8]) -> Vec<Button> {
    let mut cursor = START;
    let mut out = Vec::with_capacity(digits.len() * 4 + 1);

    for &digit in digits {
        let target = digit_position(digit);
        out.extend(moves_between(cursor, target));
        out.push(Button::A);
        cursor = target;
    }

    out.push(Button::Plus);
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays moves from START, asserting every visited cell exists.
    fn replay(buttons: &[Button]) -> Vec<u8> {
        let mut pos = START;
        let mut entered = Vec::new();

        for button in buttons {
            match button {
                Button::DUp => pos.row -= 1,
                Button::DDown => pos.row += 1,
                Button::DLeft => pos.col -= 1,
                Button::DRight => pos.col += 1,
                Button::A => {
                    let digit = if pos == ZERO { 0 } else { pos.row * 3 + pos.col + 1 };
                    entered.push(digit);
                }
                Button::Plus => {}
                other => panic!("unexpected {other}"),
            }
            assert!(pos.row < 3 || pos.col == 1, "cursor left the grid at {pos:?}");
            assert!(pos.col < 3);
        }

        entered
    }

    #[test]
    fn test_digit_positions() {
        assert_eq!(digit_position(1), KeyPosition { row: 0, col: 0 });
        assert_eq!(digit_position(5), KeyPosition { row: 1, col: 1 });
        assert_eq!(digit_position(9), KeyPosition { row: 2, col: 2 });
    }

    #[test]
    fn test_zero_is_distinguished_cell() {
        assert_eq!(digit_position(0), KeyPosition { row: 3, col: 1 });
    }

    #[test]
    fn test_into_zero_goes_horizontal_first() {
        assert_eq!(
            moves_between(digit_position(7), ZERO),
            vec![Button::DRight, Button::DDown]
        );
    }

    #[test]
    fn test_out_of_zero_goes_vertical_first() {
        assert_eq!(
            moves_between(ZERO, digit_position(3)),
            vec![Button::DUp, Button::DUp, Button::DUp, Button::DRight]
        );
    }

    #[test]
    fn test_code_entry_round_trips_every_digit() {
        let digits = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 0, 9, 1, 0, 7];
        let buttons = code_entry(&digits);
        assert_eq!(buttons.last(), Some(&Button::Plus));
        assert_eq!(replay(&buttons), digits.to_vec());
    }

    #[test]
    fn test_repeated_digit_is_single_press() {
        assert_eq!(code_entry(&[1, 1]), vec![Button::A, Button::A, Button::Plus]);
    }
}
