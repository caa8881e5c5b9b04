//! Formula pipeline: textual analysis, parsing, and sandboxed evaluation.

pub mod analyze;
pub mod eval;
pub mod functions;
pub mod parser;
