//! Error taxonomy for the scoring engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the scoring core.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Applicant record violates the input contract
    #[error("invalid applicant record: {field} {reason}")]
    Validation { field: &'static str, reason: String },

    /// Artifacts are missing and could not be produced
    #[error("model artifacts unavailable: {0}")]
    ArtifactUnavailable(String),

    /// Classifier and normalizer come from different training runs
    #[error("artifact pair mismatch: model run {model_run} vs normalizer run {normalizer_run}")]
    ArtifactMismatch {
        model_run: String,
        normalizer_run: String,
    },

    /// A feature dimension cannot be scaled
    #[error("degenerate feature at dimension {dimension}: {reason}")]
    DegenerateFeature { dimension: usize, reason: String },

    /// Nothing to fit on
    #[error("training corpus is empty")]
    EmptyCorpus,

    /// Feature vector does not match what the classifier was trained on
    #[error("feature vector has {actual} dimensions, classifier expects {expected}")]
    InferenceShape { expected: usize, actual: usize },

    #[error("artifact I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact serialization failed for {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ScoringError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScoringError>;
