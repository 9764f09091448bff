//! Run reporting for extraction runs.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, ExtractionLog, ExtractionStats,
    SharedExtractionLog,
};
