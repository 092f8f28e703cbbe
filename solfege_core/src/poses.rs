//! Synthetic hand poses, one per sign.
//!
//! A pose is described in a hand-local frame: `forward` runs wrist → middle
//! MCP, `side` runs across the knuckles from the thumb toward the pinky, and
//! the back-of-hand normal is `forward × side`.  Fingers bend toward the
//! palm.  The result is a plain [`LandmarkFrame`] in image coordinates, so
//! it goes through exactly the same feature extraction as tracker output.

use crate::confidence::Solfege;
use crate::landmarks::{Finger, LandmarkFrame, Point3, LANDMARK_COUNT};

/// Knuckle offsets along `side`, index to pinky.
const MCP_SIDE: [f32; 4] = [-0.12, 0.0, 0.12, 0.24];
/// MCP→PIP, PIP→DIP, DIP→TIP.
const FINGER_SEGMENTS: [f32; 3] = [0.40, 0.25, 0.20];
const THUMB_SEGMENTS:  [f32; 3] = [0.30, 0.25, 0.20];
/// Thumb MCP in local (forward, side) coordinates.
const THUMB_BASE: (f32, f32) = (0.75, -0.40);

/// Where poses are drawn: centre of the unit image, 0.2 units per hand.
pub const DEFAULT_CENTER: Point3 = Point3::new(0.5, 0.55, 0.0);
pub const DEFAULT_SCALE:  f32    = 0.2;

/// Flexion of one finger in degrees.  `mcp` tilts the whole finger toward
/// the palm; `joint` is added again at the PIP and at the DIP.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bend {
    pub mcp:   f32,
    pub joint: f32,
}

impl Bend {
    pub const STRAIGHT: Bend = Bend { mcp: 0.0, joint: 0.0 };
    pub const HALF:     Bend = Bend { mcp: 20.0, joint: 25.0 };
    pub const LOOSE:    Bend = Bend { mcp: 30.0, joint: 30.0 };
    pub const FIST:     Bend = Bend { mcp: 60.0, joint: 70.0 };
}

/// A complete pose in hand-local terms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseSpec {
    pub forward:     Point3,
    pub side:        Point3,
    /// Index, middle, ring, pinky.
    pub fingers:     [Bend; 4],
    /// Thumb direction as (forward, side, back) weights.
    pub thumb_dir:   (f32, f32, f32),
    pub thumb_joint: f32,
}

const UP:     Point3 = Point3::new(0.0, -1.0, 0.0);
const DOWN:   Point3 = Point3::new(0.0, 1.0, 0.0);
const RIGHT:  Point3 = Point3::new(1.0, 0.0, 0.0);
const LEFT:   Point3 = Point3::new(-1.0, 0.0, 0.0);
const TOWARD: Point3 = Point3::new(0.0, 0.0, 1.0);

const DIAG: f32 = std::f32::consts::FRAC_1_SQRT_2;

impl PoseSpec {
    pub fn for_sign(class: Solfege) -> PoseSpec {
        match class {
            // Fist, thumb out, pinky edge toward the camera.
            Solfege::Do => PoseSpec {
                forward:     UP,
                side:        TOWARD,
                fingers:     [Bend::FIST; 4],
                thumb_dir:   (0.6, -0.8, 0.0),
                thumb_joint: 0.0,
            },
            // Index straight up, palm to the camera, thumb tucked.
            Solfege::Re => PoseSpec {
                forward:     UP,
                side:        LEFT,
                fingers:     [Bend::STRAIGHT, Bend::FIST, Bend::FIST, Bend::FIST],
                thumb_dir:   (0.3, 0.95, 0.0),
                thumb_joint: 40.0,
            },
            // Flat, palm down, pointing at the camera.
            Solfege::Mi => PoseSpec {
                forward:     TOWARD,
                side:        LEFT,
                fingers:     [Bend::STRAIGHT; 4],
                thumb_dir:   (0.9, -0.2, 0.0),
                thumb_joint: 0.0,
            },
            // Hanging down, palm to the camera, thumb down.
            Solfege::Fa => PoseSpec {
                forward:     DOWN,
                side:        RIGHT,
                fingers:     [Bend::LOOSE; 4],
                thumb_dir:   (1.0, 0.0, 0.0),
                thumb_joint: 0.0,
            },
            // Flat, tilted up and away, back of the hand visible.
            Solfege::Sol => PoseSpec {
                forward:     Point3::new(0.0, -DIAG, -DIAG),
                side:        RIGHT,
                fingers:     [Bend::STRAIGHT; 4],
                thumb_dir:   (0.9, -0.2, 0.0),
                thumb_joint: 0.0,
            },
            // Cupped, palm down.
            Solfege::La => PoseSpec {
                forward:     TOWARD,
                side:        LEFT,
                fingers:     [Bend::HALF; 4],
                thumb_dir:   (0.9, -0.2, 0.0),
                thumb_joint: 20.0,
            },
            // Index raised at 40°, the rest half-bent.
            Solfege::Ti => {
                let (s, c) = 40f32.to_radians().sin_cos();
                PoseSpec {
                    forward:     Point3::new(s, -c, 0.0),
                    side:        Point3::new(-c, -s, 0.0),
                    fingers:     [Bend::STRAIGHT, Bend::HALF, Bend::HALF, Bend::HALF],
                    thumb_dir:   (0.5, -0.8, 0.0),
                    thumb_joint: 20.0,
                }
            }
        }
    }

    /// Lay the pose out in image space.
    pub fn build(&self, center: Point3, scale: f32) -> LandmarkFrame {
        let f = self.forward.normalize();
        let s = self.side.normalize();
        let b = f.cross(s);
        let palm = b * -1.0;
        let at = |lf: f32, ls: f32| (f * lf + s * ls) * scale;

        let mut pts = [Point3::ZERO; LANDMARK_COUNT];

        // thumb
        let (tf, ts, tb) = self.thumb_dir;
        let u = (f * tf + s * ts + b * tb).normalize();
        let across = s - u * s.dot(u);
        let w = if across.length() > 1e-4 { across.normalize() } else { palm };
        let base = at(THUMB_BASE.0, THUMB_BASE.1);
        chain(&mut pts, Finger::Thumb, base, u, w, 0.0, self.thumb_joint, &THUMB_SEGMENTS, scale);

        for (i, finger) in Finger::FOUR.iter().enumerate() {
            let bend = self.fingers[i];
            let base = at(1.0, MCP_SIDE[i]);
            chain(&mut pts, *finger, base, f, palm, bend.mcp, bend.joint, &FINGER_SEGMENTS, scale);
        }

        let mut frame = [Point3::ZERO; LANDMARK_COUNT];
        for (out, p) in frame.iter_mut().zip(pts.iter()) {
            *out = center + *p;
        }
        // All points are finite by construction.
        LandmarkFrame::from_points(&frame).unwrap_or_default()
    }
}

/// Lay out one finger: MCP at `base`, then three segments bending from
/// `dir` toward `bend_dir`.
#[allow(clippy::too_many_arguments)]
fn chain(
    pts:       &mut [Point3; LANDMARK_COUNT],
    finger:    Finger,
    base:      Point3,
    dir:       Point3,
    bend_dir:  Point3,
    mcp_deg:   f32,
    joint_deg: f32,
    segments:  &[f32; 3],
    scale:     f32,
) {
    let i = finger.base_index();
    pts[i] = base;
    let mut p = base;
    for (k, len) in segments.iter().enumerate() {
        let a = (mcp_deg + joint_deg * k as f32).to_radians();
        let d = dir * a.cos() + bend_dir * a.sin();
        p = p + d * (len * scale);
        pts[i + k + 1] = p;
    }
}

/// The canonical pose for `class`, at the default position and size.
pub fn synthetic_pose(class: Solfege) -> LandmarkFrame {
    PoseSpec::for_sign(class).build(DEFAULT_CENTER, DEFAULT_SCALE)
}

/// Deterministic tremor: every landmark drifts on its own slow sinusoid.
/// `t` is seconds, `amount` the peak offset in image units.
pub fn with_tremor(frame: &LandmarkFrame, t: f32, amount: f32) -> LandmarkFrame {
    let mut pts = *frame.points();
    for (i, p) in pts.iter_mut().enumerate() {
        let k = i as f32;
        *p = *p + Point3::new(
            (t * 7.1 + k * 1.3).sin(),
            (t * 5.3 + k * 2.1).sin(),
            (t * 3.7 + k * 0.7).sin(),
        ) * amount;
    }
    LandmarkFrame::from_points(&pts).unwrap_or(*frame)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::extract;

    #[test]
    fn wrist_sits_at_center() {
        let frame = synthetic_pose(Solfege::Mi);
        assert_eq!(frame.wrist(), DEFAULT_CENTER);
    }

    #[test]
    fn straight_fingers_are_extended() {
        let f = extract(&synthetic_pose(Solfege::Mi));
        for finger in Finger::FOUR {
            assert!(f.extension(finger) > 0.99, "{finger:?}");
        }
    }

    #[test]
    fn fist_fingers_are_curled() {
        let f = extract(&synthetic_pose(Solfege::Do));
        assert!(f.avg_curl4() > 0.99);
        assert!(f.pinky_side_facing_camera);
    }

    #[test]
    fn palm_orientation_matches_description() {
        assert!(extract(&synthetic_pose(Solfege::Re)).palm_facing_camera);
        assert!(extract(&synthetic_pose(Solfege::Fa)).palm_facing_camera);
        assert!(extract(&synthetic_pose(Solfege::Mi)).palm_facing_down);
        let sol = extract(&synthetic_pose(Solfege::Sol));
        assert!(sol.palm_facing_down && sol.back_of_hand_visible && sol.hand_pointing_forward);
    }

    #[test]
    fn tremor_is_small_and_bounded() {
        let frame = synthetic_pose(Solfege::La);
        let moved = with_tremor(&frame, 1.7, 0.002);
        for (a, b) in frame.points().iter().zip(moved.points().iter()) {
            assert!(a.distance(*b) <= 0.002 * 3f32.sqrt() + 1e-6);
        }
    }
}
