//! Pose Feature Extractor - geometric features for exercise recognition.
//!
//! This library turns body landmarks detected in video frames into labeled
//! feature rows for training exercise and rep-stage classifiers.
//!
//! # Feature Modes
//!
//! - **angles**: 12 joint angles (radians) between adjacent limb vectors
//! - **points**: `x, y, z` of the 17 canonical body parts
//! - **normalized_points**: the same points scaled into the pose bounding box
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Pose Feature Extractor                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Detector   │──▶│   Batch     │──▶│  Features   │       │
//! │  │  records    │   │  extractor  │   │  (compute)  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                           │                 │               │
//! │                           ▼                 ▼               │
//! │                    ┌─────────────┐   ┌─────────────┐       │
//! │                    │ Extraction  │   │  Dataset    │       │
//! │                    │    Log      │   │   (CSV)     │       │
//! │                    └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use pose_feature_extractor::core::{FeatureExtractor, Landmark, Pose};
//!
//! let extractor = FeatureExtractor::canonical();
//! let pose = Pose::new(
//!     (0..33)
//!         .map(|i| Landmark::new(0.01 * i as f64, 0.02 * i as f64 + 0.001 * (i * i) as f64, 0.0))
//!         .collect(),
//! );
//!
//! let angles = extractor.compute_all_angles(&pose).unwrap();
//! assert_eq!(angles.len(), 12);
//! ```

pub mod config;
pub mod core;
pub mod detector;
pub mod report;

// Re-export key types at crate root for convenience
pub use config::{Config, ErrorPolicy, LabelSet};
pub use core::{
    BatchExtractor, BatchOptions, FeatureError, FeatureExtractor, FeatureMode, FeatureRow, Pose,
    RepCounter, Skeleton,
};
pub use detector::{DetectionRecord, DetectionReader};
pub use report::{ExtractionLog, ExtractionStats, SharedExtractionLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
