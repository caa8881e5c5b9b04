pub mod addr;
pub mod cell;
pub mod engine;
pub mod error;
pub mod fill;
pub mod formula;
pub mod grid;
pub mod report;
