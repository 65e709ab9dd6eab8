//! File-backed record store for sdgtool.
//!
//! This crate provides:
//! - [`reader`]: CSV loading with BOM handling and `,`/`;` delimiter detection
//! - [`writer`]: atomic CSV, JSON and failure-report output

pub mod reader;
pub mod writer;

pub use reader::{detect_delimiter, parse_csv, read_csv};
pub use writer::{render_csv, render_failure_report, write_all, write_csv, write_text};
