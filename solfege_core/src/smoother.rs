//! Exponential smoothing of landmark positions.
//!
//! Each coordinate follows `smoothed = smoothed * α + incoming * (1 - α)`.
//! A larger α holds on to history longer; α = 1 freezes the hand, α = 0
//! passes every frame through untouched.

use tracing::trace;

use crate::error::InputError;
use crate::landmarks::{LandmarkFrame, Point3};

/// Default smoothing factor.
pub const DEFAULT_SMOOTHING: f32 = 0.7;

/// The smoother's rolling state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SmoothingState {
    pub smoothed:    LandmarkFrame,
    pub initialized: bool,
}

/// Pure smoothing step.
///
/// An uninitialized `previous` adopts `incoming` verbatim.
pub fn smooth(
    previous: &SmoothingState,
    incoming: &LandmarkFrame,
    alpha:    f32,
) -> (LandmarkFrame, SmoothingState) {
    let out = if previous.initialized {
        previous.smoothed.blend(incoming, alpha.clamp(0.0, 1.0))
    } else {
        *incoming
    };
    (out, SmoothingState { smoothed: out, initialized: true })
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSmoother: owns a SmoothingState
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct LandmarkSmoother {
    alpha: f32,
    state: SmoothingState,
}

impl LandmarkSmoother {
    pub fn new(alpha: f32) -> Self {
        LandmarkSmoother { alpha: alpha.clamp(0.0, 1.0), state: SmoothingState::default() }
    }

    pub fn alpha(&self) -> f32 { self.alpha }

    pub fn state(&self) -> &SmoothingState { &self.state }

    pub fn apply(&mut self, frame: &LandmarkFrame) -> LandmarkFrame {
        let (out, next) = smooth(&self.state, frame, self.alpha);
        self.state = next;
        out
    }

    /// Validate raw tracker output, then smooth it.  On error the state is
    /// untouched.
    pub fn apply_raw(&mut self, points: &[Point3]) -> Result<LandmarkFrame, InputError> {
        let frame = LandmarkFrame::from_points(points)?;
        Ok(self.apply(&frame))
    }

    /// Forget history; the next frame is adopted verbatim.
    pub fn reset(&mut self) {
        if self.state.initialized {
            trace!("smoother reset");
        }
        self.state = SmoothingState::default();
    }
}

impl Default for LandmarkSmoother {
    fn default() -> Self {
        LandmarkSmoother::new(DEFAULT_SMOOTHING)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
