//! Classifier training, persistence and inference

pub mod forest;
pub mod inference;
pub mod store;

pub use forest::{ClassProbabilities, ClassWeight, ForestConfig, RandomForest};
pub use inference::ScoringEngine;
pub use store::{ArtifactPaths, ModelStore, TrainedArtifacts};
