//! Landmark and pose types.
//!
//! A pose is the ordered landmark list a detector produces for one frame.
//! Indices follow the detector numbering (0-32).

use serde::{Deserialize, Serialize};
use std::ops::{Index, Sub};

/// A detected body point in normalized image-relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    /// Relative depth
    pub z: f64,
    /// Detector visibility score, carried through but unused by the geometry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    /// Coordinates as a plain vector.
    pub fn coords(&self) -> Vec3 {
        Vec3 {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

/// A 3-component vector used for limb geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn scale(&self, factor: f64) -> Vec3 {
        Vec3::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Largest absolute component.
    pub fn max_abs(&self) -> f64 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Direction-preserving rescale so the largest component is 1 in
    /// magnitude. `None` for zero or non-finite vectors.
    pub fn unit_max(&self) -> Option<Vec3> {
        if !self.is_finite() || self.is_zero() {
            return None;
        }
        let m = self.max_abs();
        Some(Vec3::new(self.x / m, self.y / m, self.z / m))
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// The ordered landmarks detected for one frame.
///
/// Poses are never mutated by the extractor; every transform returns a new one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pose {
    landmarks: Vec<Landmark>,
}

impl Pose {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    /// Build a pose from raw `(x, y, z)` triples.
    pub fn from_coords(coords: &[(f64, f64, f64)]) -> Self {
        Self::new(
            coords
                .iter()
                .map(|&(x, y, z)| Landmark::new(x, y, z))
                .collect(),
        )
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.landmarks.iter()
    }

    /// Flatten to `x, y, z` triples in landmark order.
    pub fn flatten(&self) -> Vec<f64> {
        self.landmarks
            .iter()
            .flat_map(|l| [l.x, l.y, l.z])
            .collect()
    }
}

impl Index<usize> for Pose {
    type Output = Landmark;

    fn index(&self, index: usize) -> &Landmark {
        &self.landmarks[index]
    }
}

impl From<Vec<Landmark>> for Pose {
    fn from(landmarks: Vec<Landmark>) -> Self {
        Self::new(landmarks)
    }
}

impl<'a> IntoIterator for &'a Pose {
    type Item = &'a Landmark;
    type IntoIter = std::slice::Iter<'a, Landmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.landmarks.iter()
    }
}
