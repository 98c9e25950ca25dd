//! Consolidation of raw IQ policy reports into fixed-shape CSV rows

pub mod consolidate;
pub mod row;

pub use consolidate::{Consolidator, Strategy};
pub use row::{COLUMNS, ConsolidatedRow, Severity};
