//! Detection record types.
//!
//! A detection record is one frame of external pose-detector output together
//! with the class label of the clip the frame came from.

use crate::core::landmark::Pose;
use serde::{Deserialize, Serialize};

/// One frame of detector output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Class label (exercise or stage)
    pub label: String,
    /// Where the frame came from, e.g. `push-up_8/frame3.jpg`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Detected landmarks; empty when no pose was found
    #[serde(default)]
    pub landmarks: Pose,
}

impl DetectionRecord {
    pub fn new(label: impl Into<String>, landmarks: Pose) -> Self {
        Self {
            label: label.into(),
            source: None,
            landmarks,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Whether the detector found a pose in this frame.
    pub fn has_pose(&self) -> bool {
        !self.landmarks.is_empty()
    }

    /// Human-readable frame identifier for log messages.
    pub fn describe(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_landmarks() {
        let record: DetectionRecord = serde_json::from_str(r#"{"label":"squat"}"#).unwrap();
        assert_eq!(record.label, "squat");
        assert!(!record.has_pose());
        assert_eq!(record.describe(), "squat");
    }

    #[test]
    fn test_record_with_source() {
        let json = r#"{"label":"push-up","source":"push-up_8/frame3.jpg","landmarks":[{"x":0.1,"y":0.2,"z":0.3}]}"#;
        let record: DetectionRecord = serde_json::from_str(json).unwrap();
        assert!(record.has_pose());
        assert_eq!(record.describe(), "push-up_8/frame3.jpg");
        assert_eq!(record.landmarks[0].z, 0.3);
    }
}
