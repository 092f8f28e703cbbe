//! Feature extraction: orientation and shape features from one frame.
//!
//! Everything here is a pure function of a [`LandmarkFrame`].  Degenerate
//! geometry (coincident landmarks) yields zero vectors and zero angles, never
//! NaN, so a collapsed hand scores nothing instead of poisoning the vector.
//!
//! ## Reference axes
//!
//! | Axis | Vector | Note |
//! |---|---|---|
//! | right | `(1, 0, 0)` | |
//! | up | `(0, -1, 0)` | image y grows downward |
//! | forward | `(0, 0, -1)` | away from the camera |
//!
//! The palm normal is `cross(wrist→middle MCP, index MCP→pinky MCP)`.  For a
//! right hand in unmirrored image space it points out of the *back* of the
//! hand, so "palm facing camera" means the normal points forward.

use crate::landmarks::{Finger, LandmarkFrame, Point3};

pub const RIGHT:   Point3 = Point3::new(1.0, 0.0, 0.0);
pub const UP:      Point3 = Point3::new(0.0, -1.0, 0.0);
pub const FORWARD: Point3 = Point3::new(0.0, 0.0, -1.0);

/// Joint angle (degrees) that counts as fully curled / fully extended.
const CURLED_DEG:   f32 = 120.0;
const EXTENDED_DEG: f32 = 170.0;

/// Normalised fingertip gap mapped onto spread 0 / 1.
const SPREAD_MIN: f32 = 0.10;
const SPREAD_MAX: f32 = 0.25;

/// Cosine thresholds for the palm axes and for the hand side vector.
const PALM_AXIS: f32 = 0.6;
const HAND_AXIS: f32 = 0.7;

/// Number of entries in [`FeatureSet::to_vector`].
pub const FEATURE_DIM: usize = 20;

// ════════════════════════════════════════════════════════════════════════════
// Mapping helpers
// ════════════════════════════════════════════════════════════════════════════

/// Linear map of `v` from `[in_lo, in_hi]` onto `[out_lo, out_hi]`, clamped.
///
/// Total: values before the input range give `out_lo`, values past it give
/// `out_hi`, reversed input ranges work, and a non-finite result is 0.
pub fn map_range(v: f32, in_lo: f32, in_hi: f32, out_lo: f32, out_hi: f32) -> f32 {
    let span = in_hi - in_lo;
    let t = if span.abs() <= f32::EPSILON {
        if (v - in_hi) * span.signum() >= 0.0 { 1.0 } else { 0.0 }
    } else {
        ((v - in_lo) / span).clamp(0.0, 1.0)
    };
    let out = out_lo + t * (out_hi - out_lo);
    if out.is_finite() { out } else { 0.0 }
}

/// `map_range` onto `[0, 1]`.
pub fn ramp(v: f32, lo: f32, hi: f32) -> f32 {
    map_range(v, lo, hi, 0.0, 1.0)
}

/// Trapezoid over `[lo, hi]`: 0 outside, 1 across the middle half, linear
/// shoulders on each quarter.
pub fn band(v: f32, lo: f32, hi: f32) -> f32 {
    if !(lo..=hi).contains(&v) {
        return 0.0;
    }
    let edge = (hi - lo) / 4.0;
    ramp(v, lo, lo + edge).min(ramp(v, hi, hi - edge))
}

/// Interior angle at `b` (degrees) between `b→a` and `b→c`.  Zero when
/// either arm has zero length.
pub fn joint_angle(a: Point3, b: Point3, c: Point3) -> f32 {
    let ba = (a - b).normalize();
    let bc = (c - b).normalize();
    if ba == Point3::ZERO || bc == Point3::ZERO {
        return 0.0;
    }
    ba.dot(bc).clamp(-1.0, 1.0).acos().to_degrees()
}

// ════════════════════════════════════════════════════════════════════════════
// FingerShape
// ════════════════════════════════════════════════════════════════════════════

/// How straight one finger is.  `curl == 1 - extension` except for a
/// degenerate finger, where both are 0.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FingerShape {
    pub extension: f32,
    pub curl:      f32,
}

impl FingerShape {
    pub fn from_joints(mcp: Point3, pip: Point3, tip: Point3) -> Self {
        let angle = joint_angle(mcp, pip, tip);
        if angle == 0.0 {
            return FingerShape::default();
        }
        let extension = ramp(angle, CURLED_DEG, EXTENDED_DEG);
        FingerShape { extension, curl: 1.0 - extension }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// FeatureSet
// ════════════════════════════════════════════════════════════════════════════

/// Everything the scorers look at, recomputed every frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FeatureSet {
    /// Indexed by `Finger as usize`.
    pub fingers: [FingerShape; 5],

    // ── palm normal against the reference axes ───────────────────────────
    pub palm_normal:      Point3,
    pub palm_dot_forward: f32,
    pub palm_dot_up:      f32,
    pub palm_dot_right:   f32,

    // ── thumb-MCP → pinky-MCP side vector ────────────────────────────────
    pub side_dot_right:   f32,
    pub side_dot_up:      f32,
    pub side_dot_forward: f32,

    // ── directions ───────────────────────────────────────────────────────
    /// wrist → middle MCP
    pub hand_dot_up:      f32,
    pub hand_dot_forward: f32,
    /// index MCP → index tip
    pub index_dot_up:     f32,
    /// thumb MCP → thumb tip
    pub thumb_dot_up:     f32,

    // ── orientation booleans ─────────────────────────────────────────────
    pub palm_facing_camera:       bool,
    pub back_of_hand_visible:     bool,
    pub palm_facing_down:         bool,
    pub palm_facing_side:         bool,
    pub hand_vertical:            bool,
    pub hand_horizontal:          bool,
    pub pinky_side_facing_camera: bool,
    pub index_pointing_up:        bool,
    pub thumb_pointing_down:      bool,
    pub hand_pointing_down:       bool,
    pub hand_pointing_forward:    bool,

    // ── spread ───────────────────────────────────────────────────────────
    pub spread:           f32,
    pub fingers_together: f32,

    // ── shape detectors ──────────────────────────────────────────────────
    pub cup_shape:       f32,
    pub flat_horizontal: f32,
    pub fist_thumb_out:  f32,
    pub index_angle:     f32,
}

impl FeatureSet {
    pub fn finger(&self, f: Finger) -> FingerShape {
        self.fingers[f as usize]
    }

    pub fn extension(&self, f: Finger) -> f32 {
        self.finger(f).extension
    }

    pub fn curl(&self, f: Finger) -> f32 {
        self.finger(f).curl
    }

    /// Mean curl of index, middle, ring and pinky.
    pub fn avg_curl4(&self) -> f32 {
        Finger::FOUR.iter().map(|&f| self.curl(f)).sum::<f32>() / 4.0
    }

    pub fn avg_extension4(&self) -> f32 {
        Finger::FOUR.iter().map(|&f| self.extension(f)).sum::<f32>() / 4.0
    }

    /// Mean curl of middle, ring and pinky.
    pub fn others_curl(&self) -> f32 {
        (self.curl(Finger::Middle) + self.curl(Finger::Ring) + self.curl(Finger::Pinky)) / 3.0
    }

    // ── graded orientation (0 well below the threshold, 1 at it) ─────────

    pub fn palm_down_grade(&self) -> f32 { ramp(self.palm_dot_up, 0.3, PALM_AXIS) }
    pub fn palm_camera_grade(&self) -> f32 { ramp(self.palm_dot_forward, 0.3, PALM_AXIS) }
    pub fn back_visible_grade(&self) -> f32 { ramp(-self.palm_dot_forward, 0.3, PALM_AXIS) }
    pub fn hand_down_grade(&self) -> f32 { ramp(-self.hand_dot_up, 0.3, PALM_AXIS) }
    pub fn hand_forward_grade(&self) -> f32 { ramp(self.hand_dot_forward, 0.3, PALM_AXIS) }
    pub fn thumb_down_grade(&self) -> f32 { ramp(-self.thumb_dot_up, 0.3, PALM_AXIS) }
    pub fn pinky_side_grade(&self) -> f32 { ramp(-self.side_dot_forward, 0.3, PALM_AXIS) }
    pub fn index_up_grade(&self) -> f32 { ramp(self.index_dot_up, 0.4, 0.8) }

    /// How close the index is to vertical.
    pub fn index_straight_up(&self) -> f32 { ramp(self.index_dot_up, HAND_AXIS, 0.95) }

    /// Fist tightness: the four fingers' curl, saturating early.
    pub fn fist_tightness(&self) -> f32 { ramp(self.avg_curl4(), 0.6, 0.9) }

    /// Flat numeric view for learned classifiers.
    pub fn to_vector(&self) -> [f32; FEATURE_DIM] {
        let e = |f| self.extension(f);
        [
            e(Finger::Thumb), e(Finger::Index), e(Finger::Middle), e(Finger::Ring), e(Finger::Pinky),
            self.palm_dot_forward, self.palm_dot_up, self.palm_dot_right,
            self.side_dot_right, self.side_dot_up, self.side_dot_forward,
            self.hand_dot_up, self.hand_dot_forward,
            self.index_dot_up, self.thumb_dot_up,
            self.spread,
            self.cup_shape, self.flat_horizontal, self.fist_thumb_out, self.index_angle,
        ]
    }
}

// ════════════════════════════════════════════════════════════════════════════
// extract
// ════════════════════════════════════════════════════════════════════════════

/// Derive the full [`FeatureSet`] for one frame.
pub fn extract(frame: &LandmarkFrame) -> FeatureSet {
    let hand  = frame.annotations();
    let wrist = hand.wrist();

    let mut f = FeatureSet::default();
    for finger in Finger::ALL {
        f.fingers[finger as usize] =
            FingerShape::from_joints(hand.mcp(finger), hand.pip(finger), hand.tip(finger));
    }

    // ── palm normal ──────────────────────────────────────────────────────
    let wrist_to_middle = hand.mcp(Finger::Middle) - wrist;
    let index_to_pinky  = hand.mcp(Finger::Pinky) - hand.mcp(Finger::Index);
    let normal = wrist_to_middle.cross(index_to_pinky).normalize();
    f.palm_normal      = normal;
    f.palm_dot_forward = normal.dot(FORWARD);
    f.palm_dot_up      = normal.dot(UP);
    f.palm_dot_right   = normal.dot(RIGHT);

    // ── side vector ──────────────────────────────────────────────────────
    let side = (hand.mcp(Finger::Pinky) - hand.mcp(Finger::Thumb)).normalize();
    f.side_dot_right   = side.dot(RIGHT);
    f.side_dot_up      = side.dot(UP);
    f.side_dot_forward = side.dot(FORWARD);

    // ── directions ───────────────────────────────────────────────────────
    let hand_dir  = wrist_to_middle.normalize();
    let index_dir = (hand.tip(Finger::Index) - hand.mcp(Finger::Index)).normalize();
    let thumb_dir = (hand.tip(Finger::Thumb) - hand.mcp(Finger::Thumb)).normalize();
    f.hand_dot_up      = hand_dir.dot(UP);
    f.hand_dot_forward = hand_dir.dot(FORWARD);
    f.index_dot_up     = index_dir.dot(UP);
    f.thumb_dot_up     = thumb_dir.dot(UP);

    // ── booleans ─────────────────────────────────────────────────────────
    f.palm_facing_camera       = f.palm_dot_forward > PALM_AXIS;
    f.back_of_hand_visible     = f.palm_dot_forward < -PALM_AXIS;
    f.palm_facing_down         = f.palm_dot_up > PALM_AXIS;
    f.palm_facing_side         = f.palm_dot_right.abs() > PALM_AXIS;
    f.hand_vertical            = f.side_dot_up.abs() > HAND_AXIS;
    f.hand_horizontal          = f.side_dot_right.abs() > HAND_AXIS;
    f.pinky_side_facing_camera = f.side_dot_forward < -PALM_AXIS;
    f.index_pointing_up        = f.index_dot_up > HAND_AXIS;
    f.thumb_pointing_down      = f.thumb_dot_up < -PALM_AXIS;
    f.hand_pointing_down       = f.hand_dot_up < -PALM_AXIS;
    f.hand_pointing_forward    = f.hand_dot_forward > PALM_AXIS;

    // ── spread ───────────────────────────────────────────────────────────
    let hand_size = wrist_to_middle.length();
    if hand_size > f32::EPSILON {
        let gap = |a: Finger, b: Finger| hand.tip(a).distance(hand.tip(b)) / hand_size;
        let avg = (gap(Finger::Index, Finger::Middle)
            + gap(Finger::Middle, Finger::Ring)
            + gap(Finger::Ring, Finger::Pinky))
            / 3.0;
        f.spread           = ramp(avg, SPREAD_MIN, SPREAD_MAX);
        f.fingers_together = 1.0 - f.spread;
    }

    // ── shapes ───────────────────────────────────────────────────────────
    f.cup_shape       = cup_shape(&f);
    f.flat_horizontal = flat_horizontal(&f);
    f.fist_thumb_out  = fist_thumb_out(&f);
    f.index_angle     = index_angle(&f);

    f
}

/// Palm down, fingers half-bent and held together.
fn cup_shape(f: &FeatureSet) -> f32 {
    if !f.palm_facing_down {
        return 0.0;
    }
    band(f.avg_curl4(), 0.3, 0.8) * (f.fingers_together * 2.0).clamp(0.0, 1.0)
}

/// Side vector horizontal, fingers straight and together.
fn flat_horizontal(f: &FeatureSet) -> f32 {
    if !f.hand_horizontal {
        return 0.0;
    }
    ramp(f.avg_extension4(), 0.6, 0.9) * (f.fingers_together * 2.0).clamp(0.0, 1.0)
}

/// Tight fist with the thumb at least half out, pinky edge toward the camera.
fn fist_thumb_out(f: &FeatureSet) -> f32 {
    if !f.pinky_side_facing_camera {
        return 0.0;
    }
    f.fist_tightness() * ramp(f.extension(Finger::Thumb), 0.2, 0.5)
}

/// Index straight and raised, the rest half-curled, thumb half-out.
fn index_angle(f: &FeatureSet) -> f32 {
    if f.extension(Finger::Index) <= 0.6 || f.index_dot_up <= 0.4 {
        return 0.0;
    }
    ramp(f.extension(Finger::Index), 0.6, 0.9)
        * band(f.others_curl(), 0.2, 0.9)
        * band(f.extension(Finger::Thumb), 0.2, 0.9)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_range_clamps_both_ends() {
        assert_eq!(map_range(100.0, 120.0, 170.0, 0.0, 1.0), 0.0);
        assert_eq!(map_range(200.0, 120.0, 170.0, 0.0, 1.0), 1.0);
        assert!((map_range(145.0, 120.0, 170.0, 0.0, 1.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn map_range_reversed_input() {
        // 0.3 → 0, 0.05 → 1
        assert_eq!(map_range(0.5, 0.3, 0.05, 0.0, 1.0), 0.0);
        assert_eq!(map_range(0.0, 0.3, 0.05, 0.0, 1.0), 1.0);
    }

    #[test]
    fn map_range_degenerate_span_is_a_step() {
        assert_eq!(map_range(0.4, 0.5, 0.5, 0.0, 1.0), 0.0);
        assert_eq!(map_range(0.6, 0.5, 0.5, 0.0, 1.0), 1.0);
    }

    #[test]
    fn band_shape() {
        assert_eq!(band(0.2, 0.3, 0.8), 0.0);
        assert_eq!(band(0.55, 0.3, 0.8), 1.0);
        assert_eq!(band(0.9, 0.3, 0.8), 0.0);
        let shoulder = band(0.35, 0.3, 0.8);
        assert!(shoulder > 0.0 && shoulder < 1.0);
    }

    #[test]
    fn straight_joint_is_180() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(0.0, 1.0, 0.0);
        let c = Point3::new(0.0, 2.0, 0.0);
        assert!((joint_angle(a, b, c) - 180.0).abs() < 1e-3);
    }

    #[test]
    fn right_angle_joint() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(0.0, 1.0, 0.0);
        let c = Point3::new(1.0, 1.0, 0.0);
        assert!((joint_angle(a, b, c) - 90.0).abs() < 1e-3);
    }

    #[test]
    fn coincident_joint_is_zero_not_nan() {
        let p = Point3::new(1.0, 1.0, 1.0);
        assert_eq!(joint_angle(p, p, Point3::ZERO), 0.0);
        assert_eq!(FingerShape::from_joints(p, p, p), FingerShape::default());
    }

    #[test]
    fn straight_finger_fully_extended() {
        let s = FingerShape::from_joints(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(0.0, -2.0, 0.0),
        );
        assert_eq!(s.extension, 1.0);
        assert_eq!(s.curl, 0.0);
    }

    #[test]
    fn right_angle_finger_fully_curled() {
        let s = FingerShape::from_joints(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
        );
        assert_eq!(s.extension, 0.0);
        assert_eq!(s.curl, 1.0);
    }

    #[test]
    fn collapsed_frame_has_no_features() {
        let f = extract(&LandmarkFrame::default());
        assert_eq!(f.palm_normal, Point3::ZERO);
        assert_eq!(f.spread, 0.0);
        assert_eq!(f.fingers_together, 0.0);
        assert_eq!(f.avg_curl4(), 0.0);
        assert!(!f.palm_facing_down && !f.hand_horizontal && !f.pinky_side_facing_camera);
        assert!(f.to_vector().iter().all(|v| v.is_finite()));
    }
}
