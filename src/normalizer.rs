//! Standard scaling of feature vectors

use crate::error::{Result, ScoringError};
use crate::feature_extractor::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Per-dimension mean and scale fit on a training corpus.
///
/// Immutable once fit; always persisted alongside the classifier trained
/// on the same corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParameters {
    means: [f64; FEATURE_COUNT],
    scales: [f64; FEATURE_COUNT],
}

impl NormalizationParameters {
    /// Fit means and population standard deviations.
    ///
    /// Dimensions without variance get a scale of 1 so they are only centered.
    pub fn fit(vectors: &[FeatureVector]) -> Result<Self> {
        if vectors.is_empty() {
            return Err(ScoringError::EmptyCorpus);
        }

        let n = vectors.len() as f64;
        let mut means = [0.0; FEATURE_COUNT];
        for vector in vectors {
            for (mean, x) in means.iter_mut().zip(vector.as_slice()) {
                *mean += x;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut scales = [0.0; FEATURE_COUNT];
        for vector in vectors {
            for (i, x) in vector.as_slice().iter().enumerate() {
                scales[i] += (x - means[i]).powi(2);
            }
        }
        for (i, scale) in scales.iter_mut().enumerate() {
            let std = (*scale / n).sqrt();
            if !std.is_finite() {
                return Err(ScoringError::DegenerateFeature {
                    dimension: i,
                    reason: format!("non-finite standard deviation for {}", FEATURE_NAMES[i]),
                });
            }
            *scale = if is_zero_variance(std, means[i]) {
                warn!(
                    dimension = i,
                    feature = FEATURE_NAMES[i],
                    "Zero variance feature, using unit scale"
                );
                1.0
            } else {
                std
            };
        }

        Ok(Self { means, scales })
    }

    /// Apply `(x - mean) / scale` elementwise.
    pub fn transform(&self, vector: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, x) in vector.as_slice().iter().enumerate() {
            out[i] = (x - self.means[i]) / self.scales[i];
        }
        FeatureVector(out)
    }

    pub fn transform_all(&self, vectors: &[FeatureVector]) -> Vec<FeatureVector> {
        vectors.iter().map(|v| self.transform(v)).collect()
    }

    /// Reject parameters that cannot have come from `fit`, e.g. a tampered
    /// artifact with a zero or negative scale.
    pub fn validate(&self) -> Result<()> {
        for i in 0..FEATURE_COUNT {
            if !self.means[i].is_finite() {
                return Err(ScoringError::DegenerateFeature {
                    dimension: i,
                    reason: "mean is not finite".to_string(),
                });
            }
            if !(self.scales[i].is_finite() && self.scales[i] > 0.0) {
                return Err(ScoringError::DegenerateFeature {
                    dimension: i,
                    reason: format!("scale must be positive, got {}", self.scales[i]),
                });
            }
        }
        Ok(())
    }

    pub fn means(&self) -> &[f64; FEATURE_COUNT] {
        &self.means
    }

    pub fn scales(&self) -> &[f64; FEATURE_COUNT] {
        &self.scales
    }
}

fn is_zero_variance(std: f64, mean: f64) -> bool {
    std <= 10.0 * f64::EPSILON * mean.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic;

    #[test]
    fn test_transform_standardizes_corpus() {
        let corpus = synthetic::generate(42, 500).unwrap();
        let params = NormalizationParameters::fit(&corpus.features).unwrap();
        let scaled = params.transform_all(&corpus.features);

        let n = scaled.len() as f64;
        for dim in 0..FEATURE_COUNT {
            let mean = scaled.iter().map(|v| v.0[dim]).sum::<f64>() / n;
            let var = scaled.iter().map(|v| (v.0[dim] - mean).powi(2)).sum::<f64>() / n;

            assert!(mean.abs() < 1e-9, "dimension {dim} mean {mean}");
            assert!((var.sqrt() - 1.0).abs() < 1e-9, "dimension {dim} std {}", var.sqrt());
        }
    }

    #[test]
    fn test_zero_variance_dimension_uses_unit_scale() {
        let vectors: Vec<FeatureVector> = (0..10)
            .map(|i| {
                let mut v = [5.0; FEATURE_COUNT];
                v[0] = i as f64;
                FeatureVector(v)
            })
            .collect();

        let params = NormalizationParameters::fit(&vectors).unwrap();

        assert_eq!(params.scales()[1], 1.0);
        assert!(params.validate().is_ok());
        let out = params.transform(&vectors[3]);
        assert!(out.0[1].abs() < 1e-12);
        assert!(out.0.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_empty_corpus_is_rejected() {
        assert!(matches!(
            NormalizationParameters::fit(&[]),
            Err(ScoringError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_validate_rejects_zero_scale() {
        let params = NormalizationParameters {
            means: [0.0; FEATURE_COUNT],
            scales: [0.0; FEATURE_COUNT],
        };
        assert!(matches!(
            params.validate(),
            Err(ScoringError::DegenerateFeature { dimension: 0, .. })
        ));
    }
}
