//! Cell addressing: parsing, printing, shifting.
//!
//! `Addr` is the logical identity of a cell (row, col). Dependency edges and
//! grid storage are keyed by `Addr` — absolute markers never participate in
//! dependency identity. `CellRef` carries the `$` markers on top of an `Addr`
//! and round-trips through its string form; only copy translation cares
//! about it.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Zero-based (row, col) coordinate of a cell.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Addr {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

impl Addr {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Component-wise distance from `self` to `to`, ignoring absolute markers.
    pub fn delta(self, to: Addr) -> (i64, i64) {
        (
            to.row as i64 - self.row as i64,
            to.col as i64 - self.col as i64,
        )
    }
}

impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

/// A parsed spreadsheet reference: an address plus `$` absolute markers.
///
/// Invariant: `CellRef::parse(s)?.to_string()` equals the case-normalized
/// form of `s`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub addr: Addr,
    pub row_abs: bool,
    pub col_abs: bool,
}

impl CellRef {
    /// A fully relative reference at (row, col).
    pub fn relative(row: usize, col: usize) -> Self {
        Self {
            addr: Addr::new(row, col),
            row_abs: false,
            col_abs: false,
        }
    }

    /// Parse `$AA$12`-style text. The whole string must match:
    /// optional `$`, letters (case-insensitive), optional `$`, 1-based row.
    pub fn parse(text: &str) -> Result<CellRef, EngineError> {
        let malformed = || EngineError::MalformedAddress(text.to_string());
        let mut chars = text.chars().peekable();

        let col_abs = chars.peek() == Some(&'$');
        if col_abs {
            chars.next();
        }

        let mut letters = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphabetic() {
                letters.push(c.to_ascii_uppercase());
                chars.next();
            } else {
                break;
            }
        }
        let col = letters_to_col(&letters).ok_or_else(malformed)?;

        let row_abs = chars.peek() == Some(&'$');
        if row_abs {
            chars.next();
        }

        let digits: String = chars.collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }
        let row: usize = digits.parse().map_err(|_| malformed())?;
        if row == 0 {
            return Err(malformed());
        }

        Ok(CellRef {
            addr: Addr::new(row - 1, col),
            row_abs,
            col_abs,
        })
    }

    /// Shift non-absolute components by the deltas; absolute components pass
    /// through unchanged. `None` when a shifted component would leave the
    /// grid (the copy translator renders those as `#REF!`).
    pub fn shift(self, row_delta: i64, col_delta: i64) -> Option<CellRef> {
        let row = if self.row_abs {
            self.addr.row
        } else {
            usize::try_from(self.addr.row as i64 + row_delta).ok()?
        };
        let col = if self.col_abs {
            self.addr.col
        } else {
            usize::try_from(self.addr.col as i64 + col_delta).ok()?
        };
        Some(CellRef {
            addr: Addr::new(row, col),
            row_abs: self.row_abs,
            col_abs: self.col_abs,
        })
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            if self.col_abs { "$" } else { "" },
            col_to_letters(self.addr.col),
            if self.row_abs { "$" } else { "" },
            self.addr.row + 1
        )
    }
}

impl std::str::FromStr for CellRef {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellRef::parse(s)
    }
}

/// Convert 0-based column index to letters: 0=A, 1=B, ..., 25=Z, 26=AA.
pub(crate) fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Inverse of `col_to_letters`. `None` for empty or non-alphabetic input.
pub(crate) fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    let n = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c as usize - 'A' as usize + 1));
    Some(n - 1)
}

/// Enumerate every address in the closed rectangle, row-major: one inner
/// `Vec` per row. Used by the analyzer (range expansion into nested
/// sequences) and the copy/fill translator (tiling).
pub fn expand_range(top_left: Addr, bottom_right: Addr) -> Vec<Vec<Addr>> {
    let mut rows = Vec::new();
    for row in top_left.row..=bottom_right.row {
        let mut cols = Vec::new();
        for col in top_left.col..=bottom_right.col {
            cols.push(Addr::new(row, col));
        }
        rows.push(cols);
    }
    rows
}

/// Parse `"A1:B4"` into its corner references.
pub fn parse_range(text: &str) -> Result<(CellRef, CellRef), EngineError> {
    let (left, right) = text
        .split_once(':')
        .ok_or_else(|| EngineError::MalformedAddress(text.to_string()))?;
    Ok((CellRef::parse(left)?, CellRef::parse(right)?))
}
