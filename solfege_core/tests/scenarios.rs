//! End-to-end behaviour of the recognition pipeline.

use std::time::Duration;

use solfege_core::classifier::apply_min_separation;
use solfege_core::poses::{synthetic_pose, with_tremor};
use solfege_core::{
    Classifier, ConfidenceVector, FeatureSet, GestureEvent, GestureKind, GesturePipeline,
    HeuristicClassifier, HeuristicVariant, PipelineConfig, Point3, Solfege, StabilityGate,
};

const FRAME: u64 = 33;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Always reports the same confidences, whatever the hand looks like.
struct Scripted(ConfidenceVector);

impl Classifier for Scripted {
    fn classify(&self, _: &FeatureSet) -> ConfidenceVector {
        self.0
    }
    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn scripted(v: ConfidenceVector) -> GesturePipeline {
    GesturePipeline::with_classifier(&PipelineConfig::default(), Box::new(Scripted(v)))
}

fn points(class: Solfege) -> Vec<Point3> {
    synthetic_pose(class).points().to_vec()
}

fn kinds(events: &[GestureEvent]) -> Vec<(GestureKind, Solfege)> {
    events.iter().map(|e| (e.kind, e.class)).collect()
}

// ════════════════════════════════════════════════════════════════════════════
// Scripted confidences
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn sustained_do_enters_once_and_leaves_once() {
    let v = ConfidenceVector::new([0.92, 0.1, 0.2, 0.0, 0.15, 0.2, 0.05]);
    let mut p = scripted(v);
    let mut events = Vec::new();
    let hand = points(Solfege::Do);
    for i in 0..30 {
        p.on_frame(Some(&hand), ms(i * FRAME), &mut events).unwrap();
    }
    p.on_frame(None, ms(30 * FRAME), &mut events).unwrap();

    assert_eq!(
        kinds(&events),
        vec![(GestureKind::Enter, Solfege::Do), (GestureKind::Leave, Solfege::Do)]
    );
    assert!(events[0].at >= ms(200));
    assert_eq!(events[1].at, ms(30 * FRAME));
}

#[test]
fn ten_mi_frames_then_no_hand() {
    let mut p = scripted(ConfidenceVector::single(Solfege::Mi, 0.95));
    let mut events = Vec::new();
    let hand = points(Solfege::Mi);
    for i in 0..10 {
        p.on_frame(Some(&hand), ms(i * FRAME), &mut events).unwrap();
    }
    // frames at 0, 33, … 297: the candidate matures at 231
    assert_eq!(events, vec![GestureEvent::enter(Solfege::Mi, ms(231))]);

    p.on_frame(None, ms(330), &mut events).unwrap();
    assert_eq!(events[1], GestureEvent::leave(Solfege::Mi, ms(330)));
    assert_eq!(p.active(), None);
}

#[test]
fn close_runner_up_is_separated() {
    let mut v = ConfidenceVector::new([0.0, 0.0, 0.0, 0.71, 0.60, 0.0, 0.0]);
    apply_min_separation(&mut v, 0.15, 0.8);
    assert!((v.get(Solfege::Sol) - 0.48).abs() < 1e-6);
    assert!((v.get(Solfege::Fa) - 0.71).abs() < 1e-6);
}

#[test]
fn hold_minus_one_ms_then_switch_never_enters() {
    let mut gate = StabilityGate::new(0.7, ms(200));
    let mut events = Vec::new();
    let la = ConfidenceVector::single(Solfege::La, 0.9);
    let ti = ConfidenceVector::single(Solfege::Ti, 0.9);
    gate.update(Some(&la), ms(1000), &mut events);
    gate.update(Some(&la), ms(1199), &mut events);
    gate.update(Some(&ti), ms(1199), &mut events);
    gate.update(None, ms(1300), &mut events);
    assert!(events.is_empty());
}

// ════════════════════════════════════════════════════════════════════════════
// Synthetic hands through the real classifier
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn every_sign_is_recognised_from_its_pose() {
    for class in Solfege::ALL {
        let mut p = GesturePipeline::new(&PipelineConfig::default()).unwrap();
        let mut events = Vec::new();
        let hand = points(class);
        for i in 0..12 {
            p.on_frame(Some(&hand), ms(i * FRAME), &mut events).unwrap();
        }
        assert_eq!(kinds(&events), vec![(GestureKind::Enter, class)], "{class}");
        let (top, value) = p.confidences().top();
        assert_eq!(top, class);
        assert!(value > 0.9, "{class}: {value}");
    }
}

#[test]
fn recognition_survives_tremor() {
    for class in Solfege::ALL {
        let mut p = GesturePipeline::new(&PipelineConfig::default()).unwrap();
        let mut events = Vec::new();
        let base = synthetic_pose(class);
        for i in 0..40u64 {
            let frame = with_tremor(&base, i as f32 * 0.033, 0.002);
            p.on_frame(Some(frame.points()), ms(i * FRAME), &mut events).unwrap();
        }
        assert_eq!(kinds(&events), vec![(GestureKind::Enter, class)], "{class}");
    }
}

#[test]
fn switching_signs_leaves_then_enters() {
    let mut p = GesturePipeline::new(&PipelineConfig::default()).unwrap();
    let mut events = Vec::new();
    let mut t = 0;
    for class in [Solfege::Do, Solfege::Re, Solfege::Sol] {
        let hand = points(class);
        for _ in 0..20 {
            p.on_frame(Some(&hand), ms(t), &mut events).unwrap();
            t += FRAME;
        }
    }
    p.on_frame(None, ms(t), &mut events).unwrap();

    assert_eq!(
        kinds(&events),
        vec![
            (GestureKind::Enter, Solfege::Do),
            (GestureKind::Leave, Solfege::Do),
            (GestureKind::Enter, Solfege::Re),
            (GestureKind::Leave, Solfege::Re),
            (GestureKind::Enter, Solfege::Sol),
            (GestureKind::Leave, Solfege::Sol),
        ]
    );
}

#[test]
fn lost_hand_resets_smoothing() {
    let mut p = GesturePipeline::new(&PipelineConfig::default()).unwrap();
    let mut events = Vec::new();
    p.on_frame(Some(&points(Solfege::Do)), ms(0), &mut events).unwrap();
    p.on_frame(None, ms(33), &mut events).unwrap();
    p.on_frame(Some(&points(Solfege::Fa)), ms(66), &mut events).unwrap();
    // no blending with the old fist
    assert_eq!(p.smoothed_frame(), Some(&synthetic_pose(Solfege::Fa)));
    assert_eq!(p.confidences().top().0, Solfege::Fa);
}

#[test]
fn classic_table_still_scores_in_range() {
    let c = HeuristicClassifier::with_variant(HeuristicVariant::Classic);
    for class in Solfege::ALL {
        let v = c.classify(&solfege_core::extract(&synthetic_pose(class)));
        assert!(v.values().iter().all(|x| (0.0..=1.0).contains(x)), "{class}: {v:?}");
    }
}

#[test]
fn zero_hold_delay_from_config() {
    let config = PipelineConfig::from_toml_str("hold_delay_ms = 0").unwrap();
    let mut p = GesturePipeline::new(&config).unwrap();
    let mut events = Vec::new();
    p.on_frame(Some(&points(Solfege::La)), ms(5), &mut events).unwrap();
    assert_eq!(events, vec![GestureEvent::enter(Solfege::La, ms(5))]);
}
