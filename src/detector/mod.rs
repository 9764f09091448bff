//! Boundary with the external pose detector.
//!
//! Detection itself happens outside this crate; this module reads the
//! per-frame records the detector writes.

pub mod reader;
pub mod types;

// Re-export commonly used types
pub use reader::{read_records, DetectionReader, DetectorError};
pub use types::DetectionRecord;
