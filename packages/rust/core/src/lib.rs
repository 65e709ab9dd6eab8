//! Record transformation stages and pipeline orchestration for sdgtool.
//!
//! Each stage is a pure function over a record sequence; [`pipeline`] wires
//! them to files (e.g., `normalize_file`, `run_pipeline`).

pub mod convert;
pub mod crossref;
pub mod geocode;
pub mod normalize;
pub mod pipeline;
