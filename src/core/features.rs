//! Feature computation from detected poses.
//!
//! Features are either the 12 joint angles or the coordinates of the 17
//! canonical body parts, optionally normalized into the pose bounding box.
//! Every function here is pure: the same pose always yields the same output,
//! and degenerate geometry is reported as an error rather than a NaN.

use crate::core::landmark::{Landmark, Pose, Vec3};
use crate::core::skeleton::{Limb, Skeleton};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Coordinate axis of a landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
            Axis::Z => write!(f, "z"),
        }
    }
}

/// Errors raised by feature computation.
///
/// All of them are deterministic properties of the input pose.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureError {
    /// The pose has no landmark at a referenced index.
    IndexOutOfRange { index: usize, len: usize },
    /// A limb vector has zero (or non-finite) length.
    DegenerateVector { limb: &'static str },
    /// All landmarks share the same value on an axis.
    DegenerateRange { axis: Axis },
}

impl FeatureError {
    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FeatureError::IndexOutOfRange { .. } => "index_out_of_range",
            FeatureError::DegenerateVector { .. } => "degenerate_vector",
            FeatureError::DegenerateRange { .. } => "degenerate_range",
        }
    }
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureError::IndexOutOfRange { index, len } => {
                write!(f, "Landmark index {index} out of range for pose of {len} landmarks")
            }
            FeatureError::DegenerateVector { limb } => {
                write!(f, "Degenerate vector: limb '{limb}' has zero length")
            }
            FeatureError::DegenerateRange { axis } => {
                write!(f, "Degenerate range: all landmarks share the same {axis} value")
            }
        }
    }
}

impl std::error::Error for FeatureError {}

/// Which transform produces a dataset row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMode {
    #[default]
    Angles,
    Points,
    NormalizedPoints,
}

impl FeatureMode {
    pub const ALL: [FeatureMode; 3] = [
        FeatureMode::Angles,
        FeatureMode::Points,
        FeatureMode::NormalizedPoints,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureMode::Angles => "angles",
            FeatureMode::Points => "points",
            FeatureMode::NormalizedPoints => "normalized_points",
        }
    }
}

impl fmt::Display for FeatureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "angles" => Ok(FeatureMode::Angles),
            "points" => Ok(FeatureMode::Points),
            "normalized_points" => Ok(FeatureMode::NormalizedPoints),
            other => Err(format!(
                "unknown feature mode '{other}' (expected angles, points or normalized_points)"
            )),
        }
    }
}

/// Joint angles in declared order, in radians.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointAngles {
    entries: Vec<(&'static str, f64)>,
}

impl JointAngles {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (&'static str, f64)> {
        self.entries.iter()
    }
}

fn landmark_at(pose: &Pose, index: usize) -> Result<&Landmark, FeatureError> {
    pose.get(index).ok_or(FeatureError::IndexOutOfRange {
        index,
        len: pose.len(),
    })
}

fn limb_vector(limb: &Limb, pose: &Pose) -> Result<Vec3, FeatureError> {
    let from = landmark_at(pose, limb.from)?.coords();
    let to = landmark_at(pose, limb.to)?.coords();
    Ok(from - to)
}

/// Angle at which two vectors meet, in radians within `[0, π]`.
///
/// Both vectors are rescaled by their largest component first, so tiny or
/// huge limbs neither underflow nor overflow the dot product. The cosine is
/// clamped to `[-1, 1]` before `acos`; rounding on parallel vectors can push
/// it just outside.
pub fn vector_angle(v1: Vec3, v2: Vec3) -> Option<f64> {
    let v1 = v1.unit_max()?;
    let v2 = v2.unit_max()?;
    let cosine = v1.dot(&v2) / (v1.norm() * v2.norm());
    if cosine.is_nan() {
        return None;
    }
    Some(cosine.clamp(-1.0, 1.0).acos())
}

/// Angle between two limb vectors of a pose.
pub fn compute_angle(limb1: &Limb, limb2: &Limb, pose: &Pose) -> Result<f64, FeatureError> {
    let v1 = limb_vector(limb1, pose)?;
    let v2 = limb_vector(limb2, pose)?;

    for (limb, v) in [(limb1, v1), (limb2, v2)] {
        if v.is_zero() || !v.is_finite() {
            return Err(FeatureError::DegenerateVector { limb: limb.name });
        }
    }

    vector_angle(v1, v2).ok_or(FeatureError::DegenerateVector { limb: limb1.name })
}

/// Bounding-box normalization: x and y into `[0, 1]`, z into `[-1, 1]`.
///
/// Returns a new pose; the input is left untouched.
pub fn normalize(pose: &Pose) -> Result<Pose, FeatureError> {
    if pose.is_empty() {
        return Err(FeatureError::IndexOutOfRange { index: 0, len: 0 });
    }

    let (x_min, x_width) = axis_range(pose, Axis::X, |l| l.x)?;
    let (y_min, y_width) = axis_range(pose, Axis::Y, |l| l.y)?;
    let (z_min, z_width) = axis_range(pose, Axis::Z, |l| l.z)?;

    let landmarks = pose
        .iter()
        .map(|l| Landmark {
            x: (l.x - x_min) / x_width,
            y: (l.y - y_min) / y_width,
            z: -1.0 + 2.0 * (l.z - z_min) / z_width,
            visibility: l.visibility,
        })
        .collect();

    Ok(Pose::new(landmarks))
}

/// Minimum and width of one axis; errors when the width is zero or not finite.
fn axis_range(
    pose: &Pose,
    axis: Axis,
    value: impl Fn(&Landmark) -> f64,
) -> Result<(f64, f64), FeatureError> {
    if pose.iter().map(&value).any(|v| !v.is_finite()) {
        return Err(FeatureError::DegenerateRange { axis });
    }
    let (min, max) = pose.iter().map(&value).fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(min, max), v| (min.min(v), max.max(v)),
    );
    let width = max - min;
    if !width.is_finite() || width <= 0.0 {
        return Err(FeatureError::DegenerateRange { axis });
    }
    Ok((min, width))
}

/// Extracts features from poses using a shared skeleton.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    skeleton: Arc<Skeleton>,
}

impl FeatureExtractor {
    pub fn new(skeleton: Arc<Skeleton>) -> Self {
        Self { skeleton }
    }

    /// Extractor over the canonical skeleton.
    pub fn canonical() -> Self {
        Self::new(Arc::new(Skeleton::canonical()))
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Keep only the canonical body parts, in canonical order.
    pub fn restrict_to_canonical_body_parts(&self, pose: &Pose) -> Result<Pose, FeatureError> {
        let landmarks = self
            .skeleton
            .body_parts()
            .iter()
            .map(|part| landmark_at(pose, part.index).copied())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pose::new(landmarks))
    }

    /// All joint angles, in declared order.
    pub fn compute_all_angles(&self, pose: &Pose) -> Result<JointAngles, FeatureError> {
        let entries = self
            .skeleton
            .angles()
            .iter()
            .map(|def| {
                compute_angle(&def.limbs.0, &def.limbs.1, pose).map(|value| (def.name, value))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(JointAngles { entries })
    }

    /// Canonical body-part coordinates flattened to `x, y, z` triples.
    pub fn build_point_feature_row(
        &self,
        pose: &Pose,
        normalize_points: bool,
    ) -> Result<Vec<f64>, FeatureError> {
        let restricted = self.restrict_to_canonical_body_parts(pose)?;
        if normalize_points {
            Ok(normalize(&restricted)?.flatten())
        } else {
            Ok(restricted.flatten())
        }
    }

    /// Feature values for one frame in the given mode.
    pub fn extract(&self, pose: &Pose, mode: FeatureMode) -> Result<Vec<f64>, FeatureError> {
        match mode {
            FeatureMode::Angles => Ok(self.compute_all_angles(pose)?.values()),
            FeatureMode::Points => self.build_point_feature_row(pose, false),
            FeatureMode::NormalizedPoints => self.build_point_feature_row(pose, true),
        }
    }

    /// Value column names for the given mode, without the class column.
    pub fn feature_names(&self, mode: FeatureMode) -> Vec<String> {
        match mode {
            FeatureMode::Angles => self
                .skeleton
                .angles()
                .iter()
                .map(|a| a.name.to_string())
                .collect(),
            FeatureMode::Points | FeatureMode::NormalizedPoints => self
                .skeleton
                .body_parts()
                .iter()
                .flat_map(|p| {
                    [
                        format!("{}_x", p.name),
                        format!("{}_y", p.name),
                        format!("{}_z", p.name),
                    ]
                })
                .collect(),
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::skeleton::{
        ANGLE_COUNT, BODY_PART_COUNT, COLLARBONE, LEFT_FOREARM, LEFT_TORSO, LEFT_UPPER_ARM,
    };
    use std::f64::consts::PI;

    const EPS: f64 = 1e-9;

    /// A 33-landmark pose with a loosely human layout and distinct coordinates.
    fn standing_pose() -> Pose {
        let landmarks = (0..33)
            .map(|i| {
                let f = i as f64;
                Landmark::new(0.3 + 0.013 * f, 0.1 + 0.025 * f + 0.002 * (f * f), -0.2 + 0.011 * f)
            })
            .collect();
        Pose::new(landmarks)
    }

    fn pose_with(points: &[(usize, (f64, f64, f64))]) -> Pose {
        let mut pose: Vec<Landmark> = (0..33)
            .map(|i| Landmark::new(i as f64 * 0.01, 0.5 + i as f64 * 0.02, i as f64 * 0.003))
            .collect();
        for &(index, (x, y, z)) in points {
            pose[index] = Landmark::new(x, y, z);
        }
        Pose::new(pose)
    }

    #[test]
    fn test_left_shoulder_right_angle() {
        let pose = pose_with(&[
            (11, (0.0, 0.0, 0.0)),
            (13, (1.0, 0.0, 0.0)),
            (23, (0.0, 1.0, 0.0)),
            (12, (1.0, 1.0, 0.0)),
        ]);
        let angle = compute_angle(&LEFT_UPPER_ARM, &LEFT_TORSO, &pose).unwrap();
        assert!((angle - PI / 2.0).abs() < EPS);

        let angles = FeatureExtractor::canonical().compute_all_angles(&pose).unwrap();
        assert!((angles.get("left_shoulder_angle").unwrap() - PI / 2.0).abs() < EPS);
    }

    #[test]
    fn test_parallel_and_opposite_limbs() {
        // Upper arm (13 - 11) and forearm (15 - 13) point the same way.
        let straight = pose_with(&[
            (11, (0.0, 0.0, 0.0)),
            (13, (0.1, 0.1, 0.1)),
            (15, (0.2, 0.2, 0.2)),
        ]);
        let angle = compute_angle(&LEFT_UPPER_ARM, &LEFT_FOREARM, &straight).unwrap();
        assert!(angle.abs() < 1e-6);

        // Forearm folded back onto the upper arm.
        let folded = pose_with(&[
            (11, (0.0, 0.0, 0.0)),
            (13, (1.0, 0.0, 0.0)),
            (15, (0.0, 0.0, 0.0)),
        ]);
        let angle = compute_angle(&LEFT_UPPER_ARM, &LEFT_FOREARM, &folded).unwrap();
        assert!((angle - PI).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_overshoot_is_clamped() {
        let v = Vec3::new(0.1, 0.2, 0.3);
        for k in 1..50 {
            let angle = vector_angle(v, v.scale(k as f64 * 0.37)).unwrap();
            assert!(!angle.is_nan());
            assert!(angle >= 0.0 && angle < 1e-6);
        }
    }

    #[test]
    fn test_tiny_and_huge_limbs_keep_their_angle() {
        let tiny = pose_with(&[
            (11, (0.0, 0.0, 0.0)),
            (13, (1e-170, 0.0, 0.0)),
            (23, (0.0, 1e-170, 0.0)),
        ]);
        let angle = compute_angle(&LEFT_UPPER_ARM, &LEFT_TORSO, &tiny).unwrap();
        assert!((angle - PI / 2.0).abs() < EPS);

        let subnormal = vector_angle(Vec3::new(5e-324, 0.0, 0.0), Vec3::new(5e-324, 5e-324, 0.0));
        assert!((subnormal.unwrap() - PI / 4.0).abs() < EPS);

        let huge = pose_with(&[
            (11, (0.0, 0.0, 0.0)),
            (13, (0.0, 0.0, 1e200)),
            (23, (0.0, 0.0, -1e200)),
        ]);
        let angle = compute_angle(&LEFT_UPPER_ARM, &LEFT_TORSO, &huge).unwrap();
        assert!((angle - PI).abs() < EPS);

        let infinite = pose_with(&[(11, (0.0, 0.0, 0.0)), (13, (f64::INFINITY, 0.0, 0.0))]);
        assert_eq!(
            compute_angle(&LEFT_UPPER_ARM, &LEFT_TORSO, &infinite),
            Err(FeatureError::DegenerateVector { limb: "left_upper_arm" })
        );
    }

    #[test]
    fn test_angle_is_scale_invariant() {
        let a = Vec3::new(0.3, -0.2, 0.05);
        let b = Vec3::new(-0.1, 0.4, 0.2);
        let base = vector_angle(a, b).unwrap();
        for factor in [0.001, 0.5, 2.0, 1000.0] {
            assert!((vector_angle(a.scale(factor), b).unwrap() - base).abs() < 1e-9);
            assert!((vector_angle(a, b.scale(factor)).unwrap() - base).abs() < 1e-9);
        }
    }

    #[test]
    fn test_all_angles_in_range_and_ordered() {
        let extractor = FeatureExtractor::canonical();
        let angles = extractor.compute_all_angles(&standing_pose()).unwrap();
        assert_eq!(angles.len(), ANGLE_COUNT);

        let expected: Vec<&str> = extractor.skeleton().angles().iter().map(|a| a.name).collect();
        assert_eq!(angles.names().collect::<Vec<_>>(), expected);
        for (_, value) in angles.iter() {
            assert!((0.0..=PI).contains(value));
        }
    }

    #[test]
    fn test_coincident_landmarks_are_degenerate() {
        let pose = Pose::new(vec![Landmark::new(0.5, 0.5, 0.5); 33]);
        let extractor = FeatureExtractor::canonical();

        for def in extractor.skeleton().angles() {
            let err = compute_angle(&def.limbs.0, &def.limbs.1, &pose).unwrap_err();
            assert!(matches!(err, FeatureError::DegenerateVector { .. }));
        }
        assert!(matches!(
            extractor.compute_all_angles(&pose),
            Err(FeatureError::DegenerateVector { .. })
        ));
        assert!(matches!(
            normalize(&pose),
            Err(FeatureError::DegenerateRange { .. })
        ));
    }

    #[test]
    fn test_degenerate_vector_names_limb() {
        let pose = pose_with(&[(11, (0.2, 0.2, 0.2)), (12, (0.2, 0.2, 0.2))]);
        let err = compute_angle(&COLLARBONE, &LEFT_UPPER_ARM, &pose).unwrap_err();
        assert_eq!(err, FeatureError::DegenerateVector { limb: "collarbone" });
    }

    #[test]
    fn test_short_pose_is_out_of_range() {
        let pose = Pose::from_coords(&[(0.0, 0.0, 0.0); 20]);
        let extractor = FeatureExtractor::canonical();
        assert_eq!(
            extractor.restrict_to_canonical_body_parts(&pose),
            Err(FeatureError::IndexOutOfRange { index: 23, len: 20 })
        );
        assert!(matches!(
            compute_angle(&LEFT_UPPER_ARM, &LEFT_TORSO, &pose),
            Err(FeatureError::IndexOutOfRange { index: 23, .. })
        ));
    }

    #[test]
    fn test_restrict_keeps_canonical_order() {
        let pose = standing_pose();
        let extractor = FeatureExtractor::canonical();
        let restricted = extractor.restrict_to_canonical_body_parts(&pose).unwrap();
        assert_eq!(restricted.len(), BODY_PART_COUNT);
        for (landmark, part) in restricted.iter().zip(extractor.skeleton().body_parts()) {
            assert_eq!(*landmark, pose[part.index]);
        }

        // Extra landmarks past the detector range are ignored.
        let mut longer = pose.landmarks().to_vec();
        longer.extend(vec![Landmark::new(9.0, 9.0, 9.0); 10]);
        let restricted_longer = extractor
            .restrict_to_canonical_body_parts(&Pose::new(longer))
            .unwrap();
        assert_eq!(restricted, restricted_longer);
    }

    #[test]
    fn test_normalize_bounds() {
        let pose = Pose::from_coords(&[
            (0.2, 0.9, -0.3),
            (0.6, 0.1, 0.1),
            (0.4, 0.5, -0.1),
        ]);
        let normalized = normalize(&pose).unwrap();

        assert_eq!(normalized[0].x, 0.0);
        assert_eq!(normalized[1].x, 1.0);
        assert_eq!(normalized[1].y, 0.0);
        assert_eq!(normalized[0].y, 1.0);
        assert_eq!(normalized[0].z, -1.0);
        assert_eq!(normalized[1].z, 1.0);
        assert!((normalized[2].x - 0.5).abs() < EPS);
        assert!((normalized[2].z - 0.0).abs() < EPS);

        // The input pose is untouched.
        assert_eq!(pose[0].x, 0.2);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let extractor = FeatureExtractor::canonical();
        let restricted = extractor
            .restrict_to_canonical_body_parts(&standing_pose())
            .unwrap();
        let once = normalize(&restricted).unwrap();
        let twice = normalize(&once).unwrap();
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a.x - b.x).abs() < EPS);
            assert!((a.y - b.y).abs() < EPS);
            assert!((a.z - b.z).abs() < EPS);
        }
    }

    #[test]
    fn test_normalize_flat_axis() {
        let pose = Pose::from_coords(&[(0.1, 0.5, 0.0), (0.9, 0.5, 1.0)]);
        assert_eq!(
            normalize(&pose),
            Err(FeatureError::DegenerateRange { axis: Axis::Y })
        );

        let flat_x = Pose::from_coords(&[(0.3, 0.1, 0.0), (0.3, 0.9, 1.0)]);
        assert_eq!(
            normalize(&flat_x),
            Err(FeatureError::DegenerateRange { axis: Axis::X })
        );

        let flat_z = Pose::from_coords(&[(0.1, 0.1, -0.2), (0.9, 0.9, -0.2)]);
        assert_eq!(
            normalize(&flat_z),
            Err(FeatureError::DegenerateRange { axis: Axis::Z })
        );
        assert!(matches!(
            normalize(&Pose::default()),
            Err(FeatureError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_point_rows() {
        let extractor = FeatureExtractor::canonical();
        let pose = standing_pose();

        let raw = extractor.build_point_feature_row(&pose, false).unwrap();
        assert_eq!(raw.len(), 51);
        assert_eq!(&raw[..3], &[pose[0].x, pose[0].y, pose[0].z]);
        assert_eq!(&raw[48..], &[pose[28].x, pose[28].y, pose[28].z]);

        let normalized = extractor.build_point_feature_row(&pose, true).unwrap();
        assert_eq!(normalized.len(), 51);
        for triple in normalized.chunks(3) {
            assert!((0.0..=1.0).contains(&triple[0]));
            assert!((0.0..=1.0).contains(&triple[1]));
            assert!((-1.0..=1.0).contains(&triple[2]));
        }
    }

    #[test]
    fn test_extract_is_deterministic() {
        let extractor = FeatureExtractor::canonical();
        let pose = standing_pose();
        for mode in FeatureMode::ALL {
            let first = extractor.extract(&pose, mode).unwrap();
            let second = extractor.extract(&pose, mode).unwrap();
            assert_eq!(first, second);
            assert_eq!(first.len(), extractor.feature_names(mode).len());
        }
    }

    #[test]
    fn test_feature_mode_parsing() {
        assert_eq!("angles".parse::<FeatureMode>(), Ok(FeatureMode::Angles));
        assert_eq!("Normalized-Points".parse::<FeatureMode>(), Ok(FeatureMode::NormalizedPoints));
        assert!("keypoints".parse::<FeatureMode>().is_err());
        assert_eq!(FeatureMode::Points.to_string(), "points");
    }
}
