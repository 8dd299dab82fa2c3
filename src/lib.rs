//! Credit Scoring Engine Library
//!
//! Scores applicants with a random forest trained on a synthetic corpus and
//! explains the result with a rule-based risk factor analysis.

pub mod config;
pub mod error;
pub mod factors;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod synthetic;
pub mod types;

pub use config::AppConfig;
pub use error::ScoringError;
pub use feature_extractor::{FeatureExtractor, FeatureVector};
pub use models::inference::ScoringEngine;
pub use models::store::ModelStore;
pub use normalizer::NormalizationParameters;
pub use types::{applicant::ApplicantRecord, report::CreditReport, score::ScoreResult};
