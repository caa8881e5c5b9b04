//! Engine error types.
//!
//! Only failures the host must handle surface here. Formula evaluation
//! failures are not `EngineError`s: they mark the cell `invalid` and fall
//! back to the raw text per the evaluator contract.

use crate::addr::Addr;

/// Errors returned to the host from address parsing and copy operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Text did not match the `$A$1` address pattern.
    MalformedAddress(String),
    /// Copy source and destination rectangles share at least one address.
    /// No partial copy is applied.
    OverlappingRanges {
        src: (Addr, Addr),
        dst: (Addr, Addr),
    },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::MalformedAddress(text) => {
                write!(f, "Malformed cell address: '{}'", text)
            }
            EngineError::OverlappingRanges { src, dst } => {
                write!(
                    f,
                    "Source range {}:{} overlaps destination range {}:{}",
                    src.0, src.1, dst.0, dst.1
                )
            }
        }
    }
}

impl std::error::Error for EngineError {}
