//! Confidence scoring: FeatureSet → ConfidenceVector.
//!
//! Two implementations of [`Classifier`]:
//!
//! | Classifier | How it scores |
//! |---|---|
//! | [`HeuristicClassifier`] | weighted feature table, pairwise disambiguation |
//! | [`PrototypeClassifier`] | distance to calibrated per-class centroids |
//!
//! Whichever one is in use, the pipeline runs [`apply_min_separation`] on
//! its output once per frame.
//!
//! ## Revised weights
//!
//! | Class | Terms |
//! |---|---|
//! | Do  | 0.35 curl(4) + 0.40 fist-thumb-out + 0.25 pinky side to camera |
//! | Re  | 0.35 index extended + 0.35 others curled + 0.30 index straight up |
//! | Mi  | 0.45 flat horizontal + 0.30 palm down + 0.25 together |
//! | Fa  | 0.40 palm to camera + 0.30 hand down + 0.30 thumb down |
//! | Sol | 0.30 extension(4) + 0.20 palm down + 0.25 back visible + 0.25 hand forward |
//! | La  | 0.50 cup + 0.30 palm down + 0.20 together |
//! | Ti  | 0.60 index angle + 0.40 index up |

use tracing::trace;

use crate::confidence::{ConfidenceVector, Solfege};
use crate::config::{ClassifierConfig, HeuristicVariant, PipelineConfig};
use crate::error::ConfigError;
use crate::features::{FeatureSet, FEATURE_DIM};
use crate::landmarks::Finger;

/// Multiplier applied to the losing side of a confusable pair.
pub const DISAMBIGUATION_PENALTY: f32 = 0.6;

/// Both scores of a pair must exceed this before it is disambiguated.
const PAIR_THRESHOLD: f32 = 0.5;

/// The separation rule only applies when the leader is above this.
const SEPARATION_FLOOR: f32 = 0.6;

pub trait Classifier: Send {
    fn classify(&self, features: &FeatureSet) -> ConfidenceVector;

    fn name(&self) -> &'static str;
}

/// Build the classifier a configuration asks for.
pub fn build_classifier(config: &PipelineConfig) -> Result<Box<dyn Classifier>, ConfigError> {
    match &config.classifier {
        ClassifierConfig::Heuristic { variant } => {
            Ok(Box::new(HeuristicClassifier::with_variant(*variant)))
        }
        ClassifierConfig::Prototype { sigma, prototypes } => {
            let mut c = PrototypeClassifier::new(*sigma);
            for p in prototypes {
                c.add_prototype(p.class, &p.features)?;
            }
            if c.is_empty() {
                return Err(ConfigError::EmptyPrototypes);
            }
            Ok(Box::new(c))
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HeuristicClassifier
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeuristicClassifier {
    pub variant: HeuristicVariant,
}

impl HeuristicClassifier {
    pub fn with_variant(variant: HeuristicVariant) -> Self {
        HeuristicClassifier { variant }
    }
}

impl Classifier for HeuristicClassifier {
    fn classify(&self, f: &FeatureSet) -> ConfidenceVector {
        let mut v = match self.variant {
            HeuristicVariant::Revised => revised_scores(f),
            HeuristicVariant::Classic => classic_scores(f),
        };
        disambiguate(&mut v, f);
        v.clamp();
        v
    }

    fn name(&self) -> &'static str {
        match self.variant {
            HeuristicVariant::Revised => "heuristic/revised",
            HeuristicVariant::Classic => "heuristic/classic",
        }
    }
}

/// Raw per-class scores from the revised table, before any rules.
pub fn revised_scores(f: &FeatureSet) -> ConfidenceVector {
    let index_ext = f.extension(Finger::Index);
    ConfidenceVector::new([
        // Do
        0.35 * f.avg_curl4() + 0.40 * f.fist_thumb_out + 0.25 * f.pinky_side_grade(),
        // Re
        0.35 * index_ext + 0.35 * f.others_curl() + 0.30 * f.index_straight_up(),
        // Mi
        0.45 * f.flat_horizontal + 0.30 * f.palm_down_grade() + 0.25 * f.fingers_together,
        // Fa
        0.40 * f.palm_camera_grade() + 0.30 * f.hand_down_grade() + 0.30 * f.thumb_down_grade(),
        // Sol
        0.30 * f.avg_extension4()
            + 0.20 * f.palm_down_grade()
            + 0.25 * f.back_visible_grade()
            + 0.25 * f.hand_forward_grade(),
        // La
        0.50 * f.cup_shape + 0.30 * f.palm_down_grade() + 0.20 * f.fingers_together,
        // Ti
        0.60 * f.index_angle + 0.40 * f.index_up_grade(),
    ])
}

/// Raw per-class scores from the flat per-finger table.
pub fn classic_scores(f: &FeatureSet) -> ConfidenceVector {
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    let ext = |finger| f.extension(finger);
    let curl = |finger| f.curl(finger);
    let ext4 = Finger::FOUR.iter().map(|&g| ext(g)).sum::<f32>();
    ConfidenceVector::new([
        0.2 * Finger::FOUR.iter().map(|&g| curl(g)).sum::<f32>()
            + 0.1 * ext(Finger::Thumb)
            + 0.1 * flag(f.palm_facing_side),
        0.3 * ext(Finger::Index)
            + 0.15 * (curl(Finger::Middle) + curl(Finger::Ring) + curl(Finger::Pinky))
            + 0.25 * flag(f.hand_vertical),
        0.15 * ext4 + 0.2 * flag(f.palm_facing_down) + 0.2 * flag(f.hand_horizontal),
        0.4 * flag(f.palm_facing_camera)
            + 0.4 * flag(f.thumb_pointing_down)
            + 0.2 * flag(f.side_dot_up > 0.0),
        0.15 * ext4 + 0.4 * flag(f.palm_facing_down),
        0.7 * f.cup_shape + 0.3 * flag(f.palm_facing_down),
        0.25 * ext(Finger::Index)
            + 0.25 * ext(Finger::Middle)
            + 0.3 * flag(f.index_pointing_up)
            + 0.2 * f.fingers_together,
    ])
}

/// Resolve the three confusable pairs, in fixed order: Do/La, Re/Ti,
/// Mi/Sol.  Each rule fires only when both scores exceed 0.5 and penalizes
/// exactly one side.
pub fn disambiguate(v: &mut ConfidenceVector, f: &FeatureSet) {
    let both = |v: &ConfidenceVector, a, b| v.get(a) > PAIR_THRESHOLD && v.get(b) > PAIR_THRESHOLD;

    if both(v, Solfege::Do, Solfege::La) {
        let cup = 0.5 * f.cup_shape + 0.5 * f.palm_down_grade();
        let loser = if cup >= f.fist_tightness() { Solfege::Do } else { Solfege::La };
        trace!(%loser, "do/la disambiguation");
        v.scale(loser, DISAMBIGUATION_PENALTY);
    }

    if both(v, Solfege::Re, Solfege::Ti) {
        let angled = 0.5 * f.extension(Finger::Thumb) + 0.5 * f.index_angle;
        let loser = if angled > f.index_straight_up() { Solfege::Re } else { Solfege::Ti };
        trace!(%loser, "re/ti disambiguation");
        v.scale(loser, DISAMBIGUATION_PENALTY);
    }

    if both(v, Solfege::Mi, Solfege::Sol) {
        let loser = if f.hand_pointing_forward && f.back_of_hand_visible {
            Solfege::Mi
        } else if f.hand_horizontal && f.palm_facing_down {
            Solfege::Sol
        } else if v.get(Solfege::Mi) >= v.get(Solfege::Sol) {
            Solfege::Sol
        } else {
            Solfege::Mi
        };
        trace!(%loser, "mi/sol disambiguation");
        v.scale(loser, DISAMBIGUATION_PENALTY);
    }
}

/// If the runner-up is within `min_separation` of a leader above 0.6,
/// multiply the runner-up by `penalty`.  On an exact tie the later class in
/// Do…Ti order is the one penalized.
pub fn apply_min_separation(v: &mut ConfidenceVector, min_separation: f32, penalty: f32) {
    let ranked = v.ranked();
    let (_, top) = ranked[0];
    let (second_class, second) = ranked[1];
    if top - second < min_separation && top > SEPARATION_FLOOR {
        v.scale(second_class, penalty);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PrototypeClassifier
// ════════════════════════════════════════════════════════════════════════════

/// Nearest-centroid classifier over [`FeatureSet::to_vector`].
///
/// Confidence for a class is `exp(-d² / 2σ²)` where `d` is the distance to
/// that class's nearest prototype; classes without prototypes score 0.
#[derive(Clone, Debug, PartialEq)]
pub struct PrototypeClassifier {
    sigma:      f32,
    prototypes: Vec<(Solfege, [f32; FEATURE_DIM])>,
}

impl PrototypeClassifier {
    pub fn new(sigma: f32) -> Self {
        PrototypeClassifier { sigma, prototypes: Vec::new() }
    }

    pub fn sigma(&self) -> f32 { self.sigma }

    pub fn is_empty(&self) -> bool { self.prototypes.is_empty() }

    pub fn prototypes(&self) -> &[(Solfege, [f32; FEATURE_DIM])] {
        &self.prototypes
    }

    pub fn add_prototype(&mut self, class: Solfege, features: &[f32]) -> Result<(), ConfigError> {
        let centroid: [f32; FEATURE_DIM] =
            features.try_into().map_err(|_| ConfigError::PrototypeDimension {
                class:    class.to_string(),
                expected: FEATURE_DIM,
                found:    features.len(),
            })?;
        self.prototypes.push((class, centroid));
        Ok(())
    }

    /// Average labelled samples into one centroid per class.
    pub fn fit<I>(sigma: f32, samples: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (Solfege, [f32; FEATURE_DIM])>,
    {
        let mut sums   = [[0.0f32; FEATURE_DIM]; Solfege::COUNT];
        let mut counts = [0usize; Solfege::COUNT];
        for (class, x) in samples {
            let sum = &mut sums[class.index()];
            for (s, v) in sum.iter_mut().zip(x.iter()) {
                *s += v;
            }
            counts[class.index()] += 1;
        }

        let mut c = PrototypeClassifier::new(sigma);
        for class in Solfege::ALL {
            let n = counts[class.index()];
            if n == 0 {
                continue;
            }
            let mut centroid = sums[class.index()];
            for v in centroid.iter_mut() {
                *v /= n as f32;
            }
            c.prototypes.push((class, centroid));
        }
        if c.is_empty() {
            return Err(ConfigError::EmptyPrototypes);
        }
        Ok(c)
    }

    /// The configuration that rebuilds this classifier.
    pub fn to_config(&self) -> ClassifierConfig {
        ClassifierConfig::Prototype {
            sigma:      self.sigma,
            prototypes: self
                .prototypes
                .iter()
                .map(|(class, x)| crate::config::PrototypeConfig { class: *class, features: x.to_vec() })
                .collect(),
        }
    }
}

impl Classifier for PrototypeClassifier {
    fn classify(&self, features: &FeatureSet) -> ConfidenceVector {
        let x = features.to_vector();
        let two_sigma_sq = 2.0 * self.sigma * self.sigma;
        let mut v = ConfidenceVector::ZERO;
        for (class, centroid) in &self.prototypes {
            let d2: f32 = x.iter().zip(centroid.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
            let conf = (-d2 / two_sigma_sq).exp();
            if conf > v.get(*class) {
                v.set(*class, conf);
            }
        }
        v.clamp();
        v
    }

    fn name(&self) -> &'static str {
        "prototype"
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CalibrationSet: labelled samples awaiting fit
// ════════════════════════════════════════════════════════════════════════════

/// Collects feature vectors per sign, then fits a [`PrototypeClassifier`].
#[derive(Clone, Debug, Default)]
pub struct CalibrationSet {
    samples: Vec<(Solfege, [f32; FEATURE_DIM])>,
}

impl CalibrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, class: Solfege, features: &FeatureSet) {
        self.samples.push((class, features.to_vector()));
    }

    pub fn count(&self, class: Solfege) -> usize {
        self.samples.iter().filter(|(c, _)| *c == class).count()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn fit(&self, sigma: f32) -> Result<PrototypeClassifier, ConfigError> {
        PrototypeClassifier::fit(sigma, self.samples.iter().copied())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
