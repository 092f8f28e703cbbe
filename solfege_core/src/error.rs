//! Error types for the recognition pipeline.
//!
//! None of these are fatal to a session: a rejected frame leaves every piece
//! of pipeline state exactly as it was, and a bad configuration is reported
//! before the pipeline is ever built.

use thiserror::Error;

/// A malformed landmark frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// The tracker delivered the wrong number of landmarks.
    #[error("expected {expected} landmarks, got {found}")]
    WrongLandmarkCount { expected: usize, found: usize },

    /// A flat coordinate buffer whose length is not a whole number of points.
    #[error("{len} coordinates do not split into x, y, z triples")]
    PartialPoint { len: usize },

    /// A coordinate was NaN or infinite.
    #[error("landmark {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
}

/// A configuration that could not be loaded or is out of range.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{field} = {value} is out of range ({expected})")]
    OutOfRange {
        field:    &'static str,
        value:    f64,
        expected: &'static str,
    },

    /// `kind = "prototype"` without any prototypes to compare against.
    #[error("prototype classifier selected but no prototypes were given")]
    EmptyPrototypes,

    #[error("prototype for {class} has {found} features, expected {expected}")]
    PrototypeDimension {
        class:    String,
        expected: usize,
        found:    usize,
    },
}
