//! # solfege_core
//!
//! Recognise the seven Curwen solfège hand signs in a stream of 21-point
//! hand landmarks, and turn the noisy per-frame guess into clean
//! enter / leave events.
//!
//! | Stage | Module | State |
//! |---|---|---|
//! | Landmark smoothing | [`smoother`] | previous smoothed frame |
//! | Feature extraction | [`features`] | - |
//! | Confidence scoring | [`classifier`] | - |
//! | Debounce | [`gate`] | `Idle` / `Candidate` / `Active` |
//! | Delivery | [`emitter`] | - |
//!
//! [`GesturePipeline`] wires the stages together.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use solfege_core::{GestureEvent, GesturePipeline, PipelineConfig, Point3};
//!
//! let mut pipeline = GesturePipeline::new(&PipelineConfig::default()).unwrap();
//! let mut events: Vec<GestureEvent> = Vec::new();
//!
//! let landmarks: Vec<Point3> = vec![Point3::ZERO; 21]; // from a tracker
//! pipeline.on_frame(Some(&landmarks), Duration::from_millis(16), &mut events).unwrap();
//! pipeline.on_frame(None, Duration::from_millis(33), &mut events).unwrap();
//!
//! for e in &events {
//!     println!("{e}");
//! }
//! ```

pub mod classifier;
pub mod confidence;
pub mod config;
pub mod emitter;
pub mod error;
pub mod features;
pub mod gate;
pub mod landmarks;
pub mod pipeline;
pub mod poses;
pub mod smoother;

pub use classifier::{
    build_classifier, CalibrationSet, Classifier, HeuristicClassifier, PrototypeClassifier,
};
pub use confidence::{ConfidenceVector, Solfege};
pub use config::{ClassifierConfig, HeuristicVariant, PipelineConfig, PrototypeConfig};
pub use emitter::{FnSink, GestureEvent, GestureKind, GestureSink, NullSink};
pub use error::{ConfigError, InputError};
pub use features::{extract, FeatureSet, FEATURE_DIM};
pub use gate::{GateState, StabilityGate};
pub use landmarks::{Finger, HandAnnotations, Joint, LandmarkFrame, Point3, LANDMARK_COUNT};
pub use pipeline::GesturePipeline;
pub use smoother::{smooth, LandmarkSmoother, SmoothingState};
