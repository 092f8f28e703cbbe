use std::time::Duration;

use proptest::prelude::*;
use solfege_core::{
    extract, smooth, Classifier, ConfidenceVector, GestureKind, HeuristicClassifier,
    HeuristicVariant, LandmarkFrame, Point3, SmoothingState, Solfege, StabilityGate,
    LANDMARK_COUNT,
};

fn point() -> impl Strategy<Value = Point3> {
    (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0).prop_map(|(x, y, z)| Point3::new(x, y, z))
}

fn frame() -> impl Strategy<Value = LandmarkFrame> {
    prop::collection::vec(point(), LANDMARK_COUNT)
        .prop_map(|pts| LandmarkFrame::from_points(&pts).unwrap())
}

/// Frames whose landmarks collapse onto a handful of shared positions.
fn degenerate_frame() -> impl Strategy<Value = LandmarkFrame> {
    (prop::collection::vec(point(), 2), prop::collection::vec(0usize..2, LANDMARK_COUNT))
        .prop_map(|(anchors, pick)| {
            let pts: Vec<Point3> = pick.iter().map(|&i| anchors[i]).collect();
            LandmarkFrame::from_points(&pts).unwrap()
        })
}

fn class() -> impl Strategy<Value = Solfege> {
    (0usize..Solfege::COUNT).prop_map(|i| Solfege::ALL[i])
}

fn confidences() -> impl Strategy<Value = ConfidenceVector> {
    prop::array::uniform7(0.0f32..1.0).prop_map(ConfidenceVector::new)
}

fn in_unit_range(v: &ConfidenceVector) -> bool {
    v.values().iter().all(|x| x.is_finite() && (0.0..=1.0).contains(x))
}

#[test]
fn confidences_stay_in_unit_range() {
    let revised = HeuristicClassifier::with_variant(HeuristicVariant::Revised);
    let classic = HeuristicClassifier::with_variant(HeuristicVariant::Classic);
    proptest!(|(f in frame())| {
        let features = extract(&f);
        prop_assert!(in_unit_range(&revised.classify(&features)));
        prop_assert!(in_unit_range(&classic.classify(&features)));
    });
}

#[test]
fn degenerate_hands_never_produce_nan() {
    let c = HeuristicClassifier::default();
    proptest!(|(f in degenerate_frame())| {
        let features = extract(&f);
        prop_assert!(features.to_vector().iter().all(|x| x.is_finite()));
        prop_assert!(in_unit_range(&c.classify(&features)));
    });
}

#[test]
fn alpha_one_keeps_previous() {
    proptest!(|(a in frame(), b in frame())| {
        let state = SmoothingState { smoothed: a, initialized: true };
        let (out, _) = smooth(&state, &b, 1.0);
        prop_assert_eq!(out, a);
    });
}

#[test]
fn alpha_zero_takes_incoming() {
    proptest!(|(a in frame(), b in frame())| {
        let state = SmoothingState { smoothed: a, initialized: true };
        let (out, next) = smooth(&state, &b, 0.0);
        prop_assert_eq!(out, b);
        prop_assert_eq!(next.smoothed, b);
    });
}

#[test]
fn smoothed_points_lie_between_inputs() {
    proptest!(|(a in frame(), b in frame(), alpha in 0.0f32..1.0)| {
        let state = SmoothingState { smoothed: a, initialized: true };
        let (out, _) = smooth(&state, &b, alpha);
        for i in 0..LANDMARK_COUNT {
            let (p, q, o) = (a.point(i), b.point(i), out.point(i));
            prop_assert!(o.x >= p.x.min(q.x) - 1e-6 && o.x <= p.x.max(q.x) + 1e-6);
        }
    });
}

#[test]
fn normalizing_zero_is_zero() {
    proptest!(|(k in 0.0f32..1e-8)| {
        let tiny = Point3::new(k, 0.0, 0.0);
        let n = tiny.normalize();
        prop_assert!(n == Point3::ZERO || (n.length() - 1.0).abs() < 1e-5);
    });
    assert_eq!(Point3::ZERO.normalize(), Point3::ZERO);
}

#[test]
fn flicker_between_two_classes_is_silent() {
    proptest!(|(a in class(), b in class(), gaps in prop::collection::vec(1u64..199, 1..80))| {
        prop_assume!(a != b);
        let mut gate = StabilityGate::new(0.7, Duration::from_millis(200));
        let mut events = Vec::new();
        let mut t = 0;
        for (i, gap) in gaps.iter().enumerate() {
            let c = if i % 2 == 0 { a } else { b };
            gate.update(Some(&ConfidenceVector::single(c, 0.95)), Duration::from_millis(t), &mut events);
            t += gap;
        }
        prop_assert!(events.is_empty());
    });
}

#[test]
fn events_pair_up() {
    proptest!(|(steps in prop::collection::vec((prop::option::of(confidences()), 0u64..120), 1..120))| {
        let mut gate = StabilityGate::new(0.7, Duration::from_millis(200));
        let mut events = Vec::new();
        let mut t = 0;
        for (v, gap) in &steps {
            t += gap;
            gate.update(v.as_ref(), Duration::from_millis(t), &mut events);
        }
        let mut open: Option<Solfege> = None;
        for e in &events {
            match e.kind {
                GestureKind::Enter => {
                    prop_assert_eq!(open, None);
                    open = Some(e.class);
                }
                GestureKind::Leave => {
                    prop_assert_eq!(open, Some(e.class));
                    open = None;
                }
            }
        }
        prop_assert_eq!(open, gate.active());
    });
}
