//! Hand landmarks: 3D points, the fixed 21-point frame, and a per-finger view.
//!
//! ## Index layout
//!
//! | Index | Landmark |
//! |---|---|
//! | 0 | Wrist |
//! | 1–4 | Thumb MCP, PIP, DIP, TIP |
//! | 5–8 | Index MCP, PIP, DIP, TIP |
//! | 9–12 | Middle MCP, PIP, DIP, TIP |
//! | 13–16 | Ring MCP, PIP, DIP, TIP |
//! | 17–20 | Pinky MCP, PIP, DIP, TIP |
//!
//! Coordinates are image-space: x grows right, y grows *down*, z is relative
//! depth and shrinks away from the camera.

use std::ops::{Add, Mul, Sub};

use crate::error::InputError;

/// Number of landmarks in every frame.
pub const LANDMARK_COUNT: usize = 21;

/// Index of the wrist landmark.
pub const WRIST: usize = 0;

// ════════════════════════════════════════════════════════════════════════════
// Point3: a 3D point / vector
// ════════════════════════════════════════════════════════════════════════════

/// A 3D point, also used as a free vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub const ZERO: Point3 = Point3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Point3 { x, y, z }
    }

    pub fn dot(self, o: Point3) -> f32 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    pub fn cross(self, o: Point3) -> Point3 {
        Point3 {
            x: self.y * o.z - self.z * o.y,
            y: self.z * o.x - self.x * o.z,
            z: self.x * o.y - self.y * o.x,
        }
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, o: Point3) -> f32 {
        (self - o).length()
    }

    /// Unit vector in the same direction, or the zero vector when `self`
    /// has (numerically) zero length.
    pub fn normalize(self) -> Point3 {
        let len = self.length();
        if len <= f32::EPSILON || !len.is_finite() {
            return Point3::ZERO;
        }
        Point3 { x: self.x / len, y: self.y / len, z: self.z / len }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Point3 {
    type Output = Point3;
    fn add(self, o: Point3) -> Point3 {
        Point3 { x: self.x + o.x, y: self.y + o.y, z: self.z + o.z }
    }
}

impl Sub for Point3 {
    type Output = Point3;
    fn sub(self, o: Point3) -> Point3 {
        Point3 { x: self.x - o.x, y: self.y - o.y, z: self.z - o.z }
    }
}

impl Mul<f32> for Point3 {
    type Output = Point3;
    fn mul(self, k: f32) -> Point3 {
        Point3 { x: self.x * k, y: self.y * k, z: self.z * k }
    }
}

impl From<[f32; 3]> for Point3 {
    fn from(a: [f32; 3]) -> Self {
        Point3 { x: a[0], y: a[1], z: a[2] }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Finger / Joint
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb, Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky,
    ];

    /// The four non-thumb fingers.
    pub const FOUR: [Finger; 4] = [
        Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky,
    ];

    /// Landmark index of this finger's MCP joint.
    pub const fn base_index(self) -> usize {
        1 + 4 * self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Joint {
    Mcp,
    Pip,
    Dip,
    Tip,
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkFrame
// ════════════════════════════════════════════════════════════════════════════

/// One detection's worth of landmarks.  Always exactly [`LANDMARK_COUNT`]
/// finite points; the constructors enforce this.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LandmarkFrame {
    points: [Point3; LANDMARK_COUNT],
}

impl LandmarkFrame {
    /// Validate a raw slice of points from a tracker.
    pub fn from_points(points: &[Point3]) -> Result<Self, InputError> {
        if points.len() != LANDMARK_COUNT {
            return Err(InputError::WrongLandmarkCount {
                expected: LANDMARK_COUNT,
                found:    points.len(),
            });
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(InputError::NonFiniteCoordinate { index });
        }
        let mut buf = [Point3::ZERO; LANDMARK_COUNT];
        buf.copy_from_slice(points);
        Ok(LandmarkFrame { points: buf })
    }

    /// Validate a flat `[x0, y0, z0, x1, …]` buffer (63 floats).
    pub fn from_flat(coords: &[f32]) -> Result<Self, InputError> {
        if coords.len() % 3 != 0 {
            return Err(InputError::PartialPoint { len: coords.len() });
        }
        if coords.len() != LANDMARK_COUNT * 3 {
            return Err(InputError::WrongLandmarkCount {
                expected: LANDMARK_COUNT,
                found:    coords.len() / 3,
            });
        }
        let points: Vec<Point3> = coords
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect();
        Self::from_points(&points)
    }

    pub fn points(&self) -> &[Point3; LANDMARK_COUNT] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Point3 {
        self.points[index]
    }

    pub fn wrist(&self) -> Point3 {
        self.points[WRIST]
    }

    pub fn annotations(&self) -> HandAnnotations<'_> {
        HandAnnotations { frame: self }
    }

    /// Flatten back to 63 floats, the layout trained models consume.
    pub fn to_flat(&self) -> [f32; LANDMARK_COUNT * 3] {
        let mut out = [0.0; LANDMARK_COUNT * 3];
        for (i, p) in self.points.iter().enumerate() {
            out[i * 3]     = p.x;
            out[i * 3 + 1] = p.y;
            out[i * 3 + 2] = p.z;
        }
        out
    }

    /// Point-wise `self * keep + other * (1 - keep)`.
    pub(crate) fn blend(&self, other: &LandmarkFrame, keep: f32) -> LandmarkFrame {
        let mut points = self.points;
        for (p, q) in points.iter_mut().zip(other.points.iter()) {
            *p = *p * keep + *q * (1.0 - keep);
        }
        LandmarkFrame { points }
    }
}

impl Default for LandmarkFrame {
    fn default() -> Self {
        LandmarkFrame { points: [Point3::ZERO; LANDMARK_COUNT] }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandAnnotations: per-finger read-only view
// ════════════════════════════════════════════════════════════════════════════

/// Borrowed view grouping a frame's points by finger.
#[derive(Clone, Copy, Debug)]
pub struct HandAnnotations<'a> {
    frame: &'a LandmarkFrame,
}

impl<'a> HandAnnotations<'a> {
    pub fn wrist(&self) -> Point3 {
        self.frame.wrist()
    }

    /// The four joints of `finger`, MCP first.
    pub fn finger(&self, finger: Finger) -> &'a [Point3] {
        let base = finger.base_index();
        &self.frame.points[base..base + 4]
    }

    pub fn joint(&self, finger: Finger, joint: Joint) -> Point3 {
        self.frame.points[finger.base_index() + joint as usize]
    }

    pub fn mcp(&self, finger: Finger) -> Point3 {
        self.joint(finger, Joint::Mcp)
    }

    pub fn pip(&self, finger: Finger) -> Point3 {
        self.joint(finger, Joint::Pip)
    }

    pub fn tip(&self, finger: Finger) -> Point3 {
        self.joint(finger, Joint::Tip)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
