//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! smoothing_factor    = 0.7
//! detection_threshold = 0.7
//! hold_delay_ms       = 200
//! min_separation      = 0.15
//! separation_penalty  = 0.8
//!
//! [classifier]
//! kind    = "heuristic"
//! variant = "revised"
//! ```
//!
//! A calibrated prototype classifier is written inline:
//!
//! ```toml
//! [classifier]
//! kind  = "prototype"
//! sigma = 0.5
//!
//! [[classifier.prototypes]]
//! class    = "Do"
//! features = [0.0, 0.0, ...]
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::confidence::Solfege;
use crate::error::ConfigError;
use crate::features::FEATURE_DIM;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Landmark EMA factor α; larger holds history longer.
    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor:    f32,
    /// A class must strictly exceed this to be a candidate.
    #[serde(default = "default_detection_threshold")]
    pub detection_threshold: f32,
    /// How long a candidate must persist before it becomes active.
    #[serde(default = "default_hold_delay_ms")]
    pub hold_delay_ms:       u64,
    #[serde(default = "default_min_separation")]
    pub min_separation:      f32,
    #[serde(default = "default_separation_penalty")]
    pub separation_penalty:  f32,
    #[serde(default)]
    pub classifier:          ClassifierConfig,
}

fn default_smoothing_factor() -> f32 { 0.7 }
fn default_detection_threshold() -> f32 { 0.7 }
fn default_hold_delay_ms() -> u64 { 200 }
fn default_min_separation() -> f32 { 0.15 }
fn default_separation_penalty() -> f32 { 0.8 }
fn default_sigma() -> f32 { 0.5 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            smoothing_factor:    default_smoothing_factor(),
            detection_threshold: default_detection_threshold(),
            hold_delay_ms:       default_hold_delay_ms(),
            min_separation:      default_min_separation(),
            separation_penalty:  default_separation_penalty(),
            classifier:          ClassifierConfig::default(),
        }
    }
}

/// Which [`Classifier`](crate::classifier::Classifier) to build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ClassifierConfig {
    Heuristic {
        #[serde(default)]
        variant: HeuristicVariant,
    },
    Prototype {
        #[serde(default = "default_sigma")]
        sigma:      f32,
        #[serde(default)]
        prototypes: Vec<PrototypeConfig>,
    },
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig::Heuristic { variant: HeuristicVariant::default() }
    }
}

/// Weight table used by the heuristic classifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeuristicVariant {
    #[default]
    Revised,
    Classic,
}

/// One labelled centroid in feature space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrototypeConfig {
    pub class:    Solfege,
    pub features: Vec<f32>,
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn hold_delay(&self) -> Duration {
        Duration::from_millis(self.hold_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit("smoothing_factor", self.smoothing_factor)?;
        unit("detection_threshold", self.detection_threshold)?;
        unit("min_separation", self.min_separation)?;
        unit("separation_penalty", self.separation_penalty)?;

        if let ClassifierConfig::Prototype { sigma, prototypes } = &self.classifier {
            if !(sigma.is_finite() && *sigma > 0.0) {
                return Err(ConfigError::OutOfRange {
                    field:    "classifier.sigma",
                    value:    *sigma as f64,
                    expected: "finite and > 0",
                });
            }
            if prototypes.is_empty() {
                return Err(ConfigError::EmptyPrototypes);
            }
            for p in prototypes {
                if p.features.len() != FEATURE_DIM {
                    return Err(ConfigError::PrototypeDimension {
                        class:    p.class.to_string(),
                        expected: FEATURE_DIM,
                        found:    p.features.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value: value as f64, expected: "0 ..= 1" })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let c = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(c, PipelineConfig::default());
        assert_eq!(c.hold_delay(), Duration::from_millis(200));
        assert_eq!(c.classifier, ClassifierConfig::Heuristic { variant: HeuristicVariant::Revised });
    }

    #[test]
    fn partial_override() {
        let c = PipelineConfig::from_toml_str("hold_delay_ms = 0\ndetection_threshold = 0.5").unwrap();
        assert_eq!(c.hold_delay_ms, 0);
        assert_eq!(c.detection_threshold, 0.5);
        assert_eq!(c.smoothing_factor, 0.7);
    }

    #[test]
    fn classic_variant_selected() {
        let c = PipelineConfig::from_toml_str("[classifier]\nkind = \"heuristic\"\nvariant = \"classic\"").unwrap();
        assert_eq!(c.classifier, ClassifierConfig::Heuristic { variant: HeuristicVariant::Classic });
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let err = PipelineConfig::from_toml_str("detection_threshold = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "detection_threshold", .. }));
    }

    #[test]
    fn negative_hold_delay_is_a_parse_error() {
        let err = PipelineConfig::from_toml_str("hold_delay_ms = -5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn prototype_without_prototypes_rejected() {
        let err = PipelineConfig::from_toml_str("[classifier]\nkind = \"prototype\"").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPrototypes));
    }

    #[test]
    fn prototype_dimension_checked() {
        let src = "[classifier]\nkind = \"prototype\"\n\n[[classifier.prototypes]]\nclass = \"Re\"\nfeatures = [1.0, 2.0]\n";
        let err = PipelineConfig::from_toml_str(src).unwrap_err();
        assert!(matches!(err, ConfigError::PrototypeDimension { found: 2, .. }));
    }

    #[test]
    fn prototype_config_survives_toml() {
        let config = PipelineConfig {
            classifier: ClassifierConfig::Prototype {
                sigma:      0.4,
                prototypes: vec![PrototypeConfig { class: Solfege::La, features: vec![0.25; FEATURE_DIM] }],
            },
            ..PipelineConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }
}
