//! Configuration management for the credit scoring engine

use crate::models::forest::{ClassWeight, ForestConfig};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model artifact locations
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding both artifacts
    pub models_dir: String,
    /// Classifier artifact file name
    #[serde(default = "default_model_file")]
    pub model_file: String,
    /// Normalizer artifact file name
    #[serde(default = "default_normalizer_file")]
    pub normalizer_file: String,
}

fn default_model_file() -> String {
    "credit_model.json".to_string()
}

fn default_normalizer_file() -> String {
    "normalizer.json".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
            model_file: default_model_file(),
            normalizer_file: default_normalizer_file(),
        }
    }
}

/// Synthetic corpus and forest hyperparameters
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// Seed for corpus generation and tree bootstrapping
    pub seed: u64,
    /// Number of synthetic applicants
    pub samples: usize,
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum distinct samples a node needs to be split
    pub min_samples_split: usize,
    /// "balanced" or "none"
    pub class_weight: ClassWeight,
}

impl TrainingConfig {
    pub fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            class_weight: self.class_weight,
            seed: self.seed,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let forest = ForestConfig::default();
        Self {
            seed: 42,
            samples: 1000,
            n_trees: forest.n_trees,
            max_depth: forest.max_depth,
            min_samples_split: forest.min_samples_split,
            class_weight: forest.class_weight,
        }
    }
}

/// Batch scoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of records scored concurrently
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path.
    ///
    /// `CREDIT_SCORING__<SECTION>__<KEY>` environment variables override the file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("CREDIT_SCORING")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path.as_ref().display()))?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.workers == 0 {
            anyhow::bail!("pipeline.workers must be at least 1");
        }
        if self.training.samples == 0 {
            anyhow::bail!("training.samples must be at least 1");
        }
        if self.training.n_trees == 0 {
            anyhow::bail!("training.n_trees must be at least 1");
        }
        Ok(())
    }
}
