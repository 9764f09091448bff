//! Fixed body-part, limb and joint-angle tables.
//!
//! The tables define the CSV column order for every feature mode, so their
//! declared order is part of the dataset format.

use serde::Serialize;

/// A named body part at a detector landmark index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BodyPart {
    pub index: usize,
    pub name: &'static str,
}

/// A directed vector between two landmarks: `landmark[from] - landmark[to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limb {
    pub name: &'static str,
    pub from: usize,
    pub to: usize,
}

/// A joint angle measured between two limb vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AngleDefinition {
    pub name: &'static str,
    pub limbs: (Limb, Limb),
}

const fn part(index: usize, name: &'static str) -> BodyPart {
    BodyPart { index, name }
}

const fn limb(name: &'static str, from: usize, to: usize) -> Limb {
    Limb { name, from, to }
}

const fn angle(name: &'static str, first: Limb, second: Limb) -> AngleDefinition {
    AngleDefinition {
        name,
        limbs: (first, second),
    }
}

/// Number of canonical body parts.
pub const BODY_PART_COUNT: usize = 17;

/// Number of joint angles.
pub const ANGLE_COUNT: usize = 12;

/// COCO-aligned subset of the detector landmarks, in column order.
pub const CANONICAL_BODY_PARTS: [BodyPart; BODY_PART_COUNT] = [
    part(0, "nose"),
    part(2, "left_eye"),
    part(5, "right_eye"),
    part(7, "left_ear"),
    part(8, "right_ear"),
    part(11, "left_shoulder"),
    part(12, "right_shoulder"),
    part(13, "left_elbow"),
    part(14, "right_elbow"),
    part(15, "left_wrist"),
    part(16, "right_wrist"),
    part(23, "left_hip"),
    part(24, "right_hip"),
    part(25, "left_knee"),
    part(26, "right_knee"),
    part(27, "left_ankle"),
    part(28, "right_ankle"),
];

pub const LEFT_FOREARM: Limb = limb("left_forearm", 15, 13);
pub const RIGHT_FOREARM: Limb = limb("right_forearm", 16, 14);
pub const LEFT_UPPER_ARM: Limb = limb("left_upper_arm", 13, 11);
pub const RIGHT_UPPER_ARM: Limb = limb("right_upper_arm", 14, 12);
pub const COLLARBONE: Limb = limb("collarbone", 11, 12);
pub const LEFT_TORSO: Limb = limb("left_torso", 23, 11);
pub const RIGHT_TORSO: Limb = limb("right_torso", 24, 12);
pub const HIP: Limb = limb("hip", 23, 24);
pub const LEFT_UPPER_LEG: Limb = limb("left_upper_leg", 25, 23);
pub const RIGHT_UPPER_LEG: Limb = limb("right_upper_leg", 26, 24);
pub const LEFT_LOWER_LEG: Limb = limb("left_lower_leg", 27, 25);
pub const RIGHT_LOWER_LEG: Limb = limb("right_lower_leg", 28, 26);

pub const LIMBS: [Limb; 12] = [
    LEFT_FOREARM,
    RIGHT_FOREARM,
    LEFT_UPPER_ARM,
    RIGHT_UPPER_ARM,
    COLLARBONE,
    LEFT_TORSO,
    RIGHT_TORSO,
    HIP,
    LEFT_UPPER_LEG,
    RIGHT_UPPER_LEG,
    LEFT_LOWER_LEG,
    RIGHT_LOWER_LEG,
];

/// Joint angles in column order.
pub const ANGLE_DEFINITIONS: [AngleDefinition; ANGLE_COUNT] = [
    angle("left_shoulder_angle", LEFT_UPPER_ARM, LEFT_TORSO),
    angle("right_shoulder_angle", RIGHT_UPPER_ARM, RIGHT_TORSO),
    angle("left_inner_shoulder_angle", COLLARBONE, LEFT_UPPER_ARM),
    angle("right_inner_shoulder_angle", COLLARBONE, RIGHT_UPPER_ARM),
    angle("left_elbow_angle", LEFT_UPPER_ARM, LEFT_FOREARM),
    angle("right_elbow_angle", RIGHT_UPPER_ARM, RIGHT_FOREARM),
    angle("left_hip_angle", LEFT_TORSO, LEFT_UPPER_LEG),
    angle("right_hip_angle", RIGHT_TORSO, RIGHT_UPPER_LEG),
    angle("left_inner_hip_angle", HIP, LEFT_UPPER_LEG),
    angle("right_inner_hip_angle", HIP, RIGHT_UPPER_LEG),
    angle("left_knee_angle", LEFT_UPPER_LEG, LEFT_LOWER_LEG),
    angle("right_knee_angle", RIGHT_UPPER_LEG, RIGHT_LOWER_LEG),
];

/// The immutable lookup tables an extractor works from.
///
/// Built once and shared by reference (or `Arc`) between workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skeleton {
    body_parts: Vec<BodyPart>,
    angles: Vec<AngleDefinition>,
}

impl Skeleton {
    /// The canonical 17-part, 12-angle skeleton.
    pub fn canonical() -> Self {
        Self {
            body_parts: CANONICAL_BODY_PARTS.to_vec(),
            angles: ANGLE_DEFINITIONS.to_vec(),
        }
    }

    pub fn body_parts(&self) -> &[BodyPart] {
        &self.body_parts
    }

    pub fn angles(&self) -> &[AngleDefinition] {
        &self.angles
    }

    pub fn angle(&self, name: &str) -> Option<&AngleDefinition> {
        self.angles.iter().find(|a| a.name == name)
    }

    pub fn body_part(&self, name: &str) -> Option<&BodyPart> {
        self.body_parts.iter().find(|p| p.name == name)
    }

    /// Highest landmark index referenced by any body part or limb.
    pub fn max_index(&self) -> usize {
        let parts = self.body_parts.iter().map(|p| p.index);
        let limbs = self
            .angles
            .iter()
            .flat_map(|a| [a.limbs.0.from, a.limbs.0.to, a.limbs.1.from, a.limbs.1.to]);
        parts.chain(limbs).max().unwrap_or(0)
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_body_parts_are_ordered_and_unique() {
        let indices: Vec<usize> = CANONICAL_BODY_PARTS.iter().map(|p| p.index).collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted);

        let names: HashSet<&str> = CANONICAL_BODY_PARTS.iter().map(|p| p.name).collect();
        assert_eq!(names.len(), BODY_PART_COUNT);
    }

    #[test]
    fn test_every_limb_endpoint_is_a_body_part() {
        let skeleton = Skeleton::canonical();
        for l in LIMBS {
            assert!(skeleton.body_parts().iter().any(|p| p.index == l.from), "{}", l.name);
            assert!(skeleton.body_parts().iter().any(|p| p.index == l.to), "{}", l.name);
        }
    }

    #[test]
    fn test_angle_lookup() {
        let skeleton = Skeleton::canonical();
        let elbow = skeleton.angle("left_elbow_angle").unwrap();
        assert_eq!(elbow.limbs, (LEFT_UPPER_ARM, LEFT_FOREARM));
        assert!(skeleton.angle("neck_angle").is_none());
        assert_eq!(skeleton.body_part("left_wrist").unwrap().index, 15);
        assert_eq!(skeleton.max_index(), 28);
    }
}
