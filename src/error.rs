use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PramError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Expected a mapping at `{0}`")]
    NotAMapping(String),

    #[error("Missing field `{field}` for {model}")]
    MissingField { model: &'static str, field: String },

    #[error("Invalid value for field `{field}`: {source}")]
    InvalidField {
        field: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("No suitable strategy found for `{field}` with keys {keys}")]
    NoSuitableStrategy { field: String, keys: String },

    #[error("Parameters for `{field}` matched {strategy} but failed validation: {source}")]
    InvalidStrategy {
        strategy: &'static str,
        field: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Shape mismatch: tensor has {elements} elements but data length is {len}")]
    ShapeDataMismatch {
        shape: Vec<usize>,
        elements: usize,
        len: usize,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raised by a strategy's `parse` to say it does not apply to the given
/// parameters. The builder moves on to the next candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("parameters do not match the build strategy")]
pub struct StrategyNoMatch;

pub type Result<T> = std::result::Result<T, PramError>;
