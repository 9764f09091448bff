//! Core functionality for the pose feature extractor.
//!
//! This module contains:
//! - Landmark and pose types
//! - The fixed body-part, limb and joint-angle tables
//! - Feature computation (joint angles, canonical and normalized points)
//! - Dataset rows, CSV output and cleaning
//! - Batch extraction with per-frame error policy
//! - Repetition counting over per-frame predictions

pub mod batch;
pub mod dataset;
pub mod features;
pub mod landmark;
pub mod reps;
pub mod skeleton;

// Re-export commonly used types
pub use batch::{process_frame, BatchError, BatchExtractor, BatchOptions, FrameOutcome, RowSink};
pub use dataset::{header, Dataset, DatasetError, DatasetSummary, DatasetWriter, FeatureRow};
pub use features::{
    compute_angle, normalize, Axis, FeatureError, FeatureExtractor, FeatureMode, JointAngles,
};
pub use landmark::{Landmark, Pose, Vec3};
pub use reps::{LabelBuffer, RepCounter, RepState};
pub use skeleton::{AngleDefinition, BodyPart, Limb, Skeleton};
