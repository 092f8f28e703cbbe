//! The per-frame recognition pipeline.
//!
//! ```text
//!   raw points ─► smoother ─► extract ─► classifier ─► gate ─► sink
//! ```
//!
//! Only the smoother and the gate keep state between frames.  The latest
//! confidences, features and smoothed frame are kept for display.
//!
//! The minimum-separation rule runs on the classifier's output before the
//! gate sees it, whichever classifier is installed.

use std::time::Duration;

use tracing::{trace, warn};

use crate::classifier::{apply_min_separation, build_classifier, Classifier};
use crate::confidence::{ConfidenceVector, Solfege};
use crate::config::PipelineConfig;
use crate::emitter::GestureSink;
use crate::error::{ConfigError, InputError};
use crate::features::{extract, FeatureSet};
use crate::gate::{GateState, StabilityGate};
use crate::landmarks::{LandmarkFrame, Point3};
use crate::smoother::LandmarkSmoother;

pub struct GesturePipeline {
    smoother:           LandmarkSmoother,
    classifier:         Box<dyn Classifier>,
    min_separation:     f32,
    separation_penalty: f32,
    gate:               StabilityGate,
    confidences:        ConfidenceVector,
    features:           Option<FeatureSet>,
    frame:              Option<LandmarkFrame>,
}

impl GesturePipeline {
    /// Validate `config` and build the classifier it selects.
    pub fn new(config: &PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let classifier = build_classifier(config)?;
        Ok(Self::with_classifier(config, classifier))
    }

    /// Use an already-built classifier; `config` supplies the smoother,
    /// separation and gate settings.
    pub fn with_classifier(config: &PipelineConfig, classifier: Box<dyn Classifier>) -> Self {
        GesturePipeline {
            smoother:           LandmarkSmoother::new(config.smoothing_factor),
            classifier,
            min_separation:     config.min_separation,
            separation_penalty: config.separation_penalty,
            gate:               StabilityGate::new(config.detection_threshold, config.hold_delay()),
            confidences:        ConfidenceVector::ZERO,
            features:           None,
            frame:              None,
        }
    }

    /// Process one tracker frame.
    ///
    /// `None` means no hand: the smoother forgets its history, confidences
    /// drop to zero and any active sign is left.  A malformed frame is
    /// rejected with every piece of state untouched.
    pub fn on_frame(
        &mut self,
        landmarks: Option<&[Point3]>,
        now:       Duration,
        sink:      &mut dyn GestureSink,
    ) -> Result<(), InputError> {
        let Some(points) = landmarks else {
            self.smoother.reset();
            self.confidences = ConfidenceVector::ZERO;
            self.features = None;
            self.frame = None;
            self.gate.update(None, now, sink);
            return Ok(());
        };

        let smoothed = match self.smoother.apply_raw(points) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "frame rejected");
                return Err(e);
            }
        };
        let features = extract(&smoothed);
        let mut confidences = self.classifier.classify(&features);
        apply_min_separation(&mut confidences, self.min_separation, self.separation_penalty);

        let (top, value) = confidences.top();
        trace!(%top, value, at_ms = now.as_millis() as u64, "frame");

        self.gate.update(Some(&confidences), now, sink);
        self.confidences = confidences;
        self.features = Some(features);
        self.frame = Some(smoothed);
        Ok(())
    }

    /// Latest confidences; zero while no hand is present.
    pub fn confidences(&self) -> &ConfidenceVector { &self.confidences }

    pub fn features(&self) -> Option<&FeatureSet> { self.features.as_ref() }

    /// Latest smoothed landmarks, for drawing.
    pub fn smoothed_frame(&self) -> Option<&LandmarkFrame> { self.frame.as_ref() }

    pub fn active(&self) -> Option<Solfege> { self.gate.active() }

    pub fn gate_state(&self) -> GateState { self.gate.state() }

    pub fn threshold(&self) -> f32 { self.gate.threshold() }

    pub fn classifier_name(&self) -> &'static str { self.classifier.name() }

    /// Swap classifiers mid-session, e.g. after calibration.
    pub fn set_classifier(&mut self, classifier: Box<dyn Classifier>) {
        self.classifier = classifier;
    }

    /// Drop all history as if the hand had left.
    pub fn reset(&mut self, now: Duration, sink: &mut dyn GestureSink) {
        self.smoother.reset();
        self.confidences = ConfidenceVector::ZERO;
        self.features = None;
        self.frame = None;
        self.gate.reset(now, sink);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassifierConfig, PrototypeConfig};
    use crate::emitter::GestureEvent;
    use crate::features::FeatureSet;
    use crate::landmarks::LANDMARK_COUNT;

    /// Ignores features and always reports a fixed vector.
    struct Fixed(ConfidenceVector);

    impl Classifier for Fixed {
        fn classify(&self, _: &FeatureSet) -> ConfidenceVector { self.0 }
        fn name(&self) -> &'static str { "fixed" }
    }

    fn pipeline(v: ConfidenceVector) -> GesturePipeline {
        GesturePipeline::with_classifier(&PipelineConfig::default(), Box::new(Fixed(v)))
    }

    fn hand() -> Vec<Point3> {
        (0..LANDMARK_COUNT).map(|i| Point3::new(i as f32 * 0.01, 0.5, 0.0)).collect()
    }

    #[test]
    fn rejected_frame_changes_nothing() {
        let mut p = pipeline(ConfidenceVector::single(Solfege::Do, 0.9));
        let mut events: Vec<GestureEvent> = Vec::new();
        p.on_frame(Some(&hand()), Duration::ZERO, &mut events).unwrap();
        let state = p.gate_state();
        let conf = *p.confidences();

        let err = p.on_frame(Some(&hand()[..20]), Duration::from_millis(300), &mut events);
        assert!(matches!(err, Err(InputError::WrongLandmarkCount { found: 20, .. })));
        assert_eq!(p.gate_state(), state);
        assert_eq!(*p.confidences(), conf);
        assert!(events.is_empty());
    }

    #[test]
    fn non_finite_frame_changes_nothing() {
        let mut p = pipeline(ConfidenceVector::single(Solfege::Sol, 0.9));
        let mut twin = pipeline(ConfidenceVector::single(Solfege::Sol, 0.9));
        let mut events: Vec<GestureEvent> = Vec::new();
        let mut twin_events: Vec<GestureEvent> = Vec::new();
        p.on_frame(Some(&hand()), Duration::ZERO, &mut events).unwrap();
        twin.on_frame(Some(&hand()), Duration::ZERO, &mut twin_events).unwrap();

        let state = p.gate_state();
        let conf = *p.confidences();
        let frame = p.smoothed_frame().copied();
        let features = p.features().copied();

        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let mut pts = hand();
            pts[12].z = bad;
            let err = p.on_frame(Some(&pts), Duration::from_millis(300), &mut events);
            assert_eq!(err, Err(InputError::NonFiniteCoordinate { index: 12 }));
        }
        assert_eq!(p.gate_state(), state);
        assert_eq!(*p.confidences(), conf);
        assert_eq!(p.smoothed_frame().copied(), frame);
        assert_eq!(p.features().copied(), features);
        assert!(events.is_empty());

        // the smoother carries on exactly as if the bad frames never came
        let moved: Vec<Point3> = hand().iter().map(|q| Point3::new(q.x + 0.1, q.y, q.z)).collect();
        p.on_frame(Some(&moved), Duration::from_millis(330), &mut events).unwrap();
        twin.on_frame(Some(&moved), Duration::from_millis(330), &mut twin_events).unwrap();
        assert_eq!(p.smoothed_frame(), twin.smoothed_frame());
        assert_eq!(p.gate_state(), twin.gate_state());
        assert_eq!(events, twin_events);
    }

    #[test]
    fn near_tie_is_separated_for_any_classifier() {
        let mut p = pipeline(ConfidenceVector::new([0.0, 0.0, 0.0, 0.71, 0.60, 0.0, 0.0]));
        let mut events: Vec<GestureEvent> = Vec::new();
        p.on_frame(Some(&hand()), Duration::ZERO, &mut events).unwrap();
        assert!((p.confidences().get(Solfege::Fa) - 0.71).abs() < 1e-6);
        assert!((p.confidences().get(Solfege::Sol) - 0.48).abs() < 1e-6);
    }

    #[test]
    fn prototype_near_tie_is_separated() {
        let frame = crate::poses::synthetic_pose(Solfege::La);
        let at = extract(&frame).to_vector();
        let mut near = at;
        near[0] += 0.25;
        let config = PipelineConfig {
            classifier: ClassifierConfig::Prototype {
                sigma:      0.5,
                prototypes: vec![
                    PrototypeConfig { class: Solfege::Do, features: at.to_vec() },
                    PrototypeConfig { class: Solfege::Re, features: near.to_vec() },
                ],
            },
            ..PipelineConfig::default()
        };
        let mut p = GesturePipeline::new(&config).unwrap();
        let mut events: Vec<GestureEvent> = Vec::new();
        p.on_frame(Some(frame.points()), Duration::ZERO, &mut events).unwrap();

        // raw Re = exp(-0.0625 / 0.5) ≈ 0.8825, within 0.15 of Do = 1
        assert!((p.confidences().get(Solfege::Do) - 1.0).abs() < 1e-6);
        let re = (-0.0625f32 / 0.5).exp() * 0.8;
        assert!((p.confidences().get(Solfege::Re) - re).abs() < 1e-4, "{:?}", p.confidences());
    }

    #[test]
    fn separation_follows_config() {
        let config = PipelineConfig { min_separation: 0.0, ..PipelineConfig::default() };
        let v = ConfidenceVector::new([0.0, 0.0, 0.0, 0.71, 0.60, 0.0, 0.0]);
        let mut p = GesturePipeline::with_classifier(&config, Box::new(Fixed(v)));
        let mut events: Vec<GestureEvent> = Vec::new();
        p.on_frame(Some(&hand()), Duration::ZERO, &mut events).unwrap();
        assert_eq!(*p.confidences(), v);
    }

    #[test]
    fn no_hand_zeroes_confidences() {
        let mut p = pipeline(ConfidenceVector::single(Solfege::Mi, 0.95));
        let mut events: Vec<GestureEvent> = Vec::new();
        p.on_frame(Some(&hand()), Duration::ZERO, &mut events).unwrap();
        assert!(p.smoothed_frame().is_some());
        p.on_frame(None, Duration::from_millis(33), &mut events).unwrap();
        assert_eq!(*p.confidences(), ConfidenceVector::ZERO);
        assert!(p.smoothed_frame().is_none());
        assert!(p.features().is_none());
    }

    #[test]
    fn invalid_config_refused() {
        let config = PipelineConfig { smoothing_factor: 2.0, ..PipelineConfig::default() };
        assert!(GesturePipeline::new(&config).is_err());
    }
}
