//! CSV and raw JSON output

pub mod writer;

pub use writer::{CONSOLIDATED_FILE_NAME, OutputWriter, sanitize};
