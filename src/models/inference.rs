//! Credit score inference

use crate::error::Result;
use crate::factors;
use crate::feature_extractor::FeatureExtractor;
use crate::models::forest::RandomForest;
use crate::models::store::{ModelStore, TrainedArtifacts};
use crate::normalizer::NormalizationParameters;
use crate::types::applicant::ApplicantRecord;
use crate::types::score::{RiskLevel, ScoreResult};
use std::sync::Arc;
use tracing::debug;

/// Map the probability of good credit to a 0-100 score.
pub fn probability_to_score(good_probability: f64) -> u8 {
    (good_probability * 100.0).floor().clamp(0.0, 100.0) as u8
}

/// Score one applicant with an explicit (model, normalizer) pair.
pub fn score(
    record: &ApplicantRecord,
    model: &RandomForest,
    params: &NormalizationParameters,
) -> Result<ScoreResult> {
    let features = FeatureExtractor::new().encode(record);
    let normalized = params.transform(&features);
    let proba = model.predict_proba(normalized.as_slice())?;

    let score = probability_to_score(proba.good);
    let risk_level = RiskLevel::from_score(score);

    debug!(
        applicant = %record.name,
        p_good = proba.good,
        score,
        risk_level = %risk_level,
        "Applicant scored"
    );

    Ok(ScoreResult {
        score,
        risk_level,
        factors: factors::analyze(record),
    })
}

/// Scores applicants against one loaded artifact pair.
///
/// Cheap to clone; the pair is shared and never mutated.
#[derive(Clone)]
pub struct ScoringEngine {
    artifacts: Arc<TrainedArtifacts>,
}

impl ScoringEngine {
    pub fn new(artifacts: Arc<TrainedArtifacts>) -> Self {
        Self { artifacts }
    }

    /// Load (or lazily train) the pair held by `store`
    pub fn from_store(store: &ModelStore) -> Result<Self> {
        Ok(Self::new(store.load()?))
    }

    pub fn run_id(&self) -> &str {
        &self.artifacts.run_id
    }

    pub fn artifacts(&self) -> &TrainedArtifacts {
        &self.artifacts
    }

    /// Score the applicant and attach rule-based factors.
    pub fn evaluate(&self, record: &ApplicantRecord) -> Result<ScoreResult> {
        score(record, &self.artifacts.model, &self.artifacts.normalizer)
    }

    pub fn evaluate_batch(&self, records: &[ApplicantRecord]) -> Vec<Result<ScoreResult>> {
        records.iter().map(|r| self.evaluate(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::models::store::{self, ArtifactPaths};

    fn quick_artifacts() -> TrainedArtifacts {
        store::train(&TrainingConfig {
            samples: 400,
            n_trees: 20,
            max_depth: 6,
            ..TrainingConfig::default()
        })
        .unwrap()
    }

    fn strong_applicant() -> ApplicantRecord {
        let mut record = ApplicantRecord::new("Ana", 30, 3000.0, 1200.0);
        record.marital_status = "casado".to_string();
        record.debt_percentage = 20.0;
        record.previous_loans = 2;
        record.active_credit_cards = true;
        record
    }

    fn weak_applicant() -> ApplicantRecord {
        let mut record = ApplicantRecord::new("Leo", 22, 1000.0, 950.0);
        record.debt_percentage = 75.0;
        record.late_payments = 5;
        record.previous_loans = 8;
        record.payment_delay = Some(25.0);
        record
    }

    #[test]
    fn test_probability_to_score() {
        assert_eq!(probability_to_score(0.0), 0);
        assert_eq!(probability_to_score(0.409), 40);
        assert_eq!(probability_to_score(0.415), 41);
        assert_eq!(probability_to_score(0.999), 99);
        assert_eq!(probability_to_score(1.0), 100);
    }

    #[test]
    fn test_score_is_bounded_and_bucketed() {
        let engine = ScoringEngine::new(Arc::new(quick_artifacts()));

        for record in [strong_applicant(), weak_applicant()] {
            let result = engine.evaluate(&record).unwrap();
            assert!(result.score <= 100);
            assert_eq!(result.risk_level, RiskLevel::from_score(result.score));
        }
    }

    #[test]
    fn test_strong_applicant_outscores_weak_one() {
        let engine = ScoringEngine::new(Arc::new(quick_artifacts()));

        let strong = engine.evaluate(&strong_applicant()).unwrap();
        let weak = engine.evaluate(&weak_applicant()).unwrap();

        assert!(strong.score > weak.score);
        assert!(!weak.factors.negative.is_empty());
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let engine = ScoringEngine::new(Arc::new(quick_artifacts()));
        let record = strong_applicant();

        assert_eq!(engine.evaluate(&record).unwrap(), engine.evaluate(&record).unwrap());
    }

    #[test]
    fn test_persist_round_trip_preserves_scores() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path(), "credit_model.json", "normalizer.json");
        let artifacts = quick_artifacts();
        let records = [strong_applicant(), weak_applicant()];

        let before: Vec<ScoreResult> = records
            .iter()
            .map(|r| score(r, &artifacts.model, &artifacts.normalizer).unwrap())
            .collect();

        store::persist(&paths, &artifacts).unwrap();
        let reloaded = store::read_pair(&paths).unwrap().unwrap();
        let after: Vec<ScoreResult> = records
            .iter()
            .map(|r| score(r, &reloaded.model, &reloaded.normalizer).unwrap())
            .collect();

        assert_eq!(before, after);
    }

    #[test]
    fn test_evaluate_batch() {
        let engine = ScoringEngine::new(Arc::new(quick_artifacts()));
        let results = engine.evaluate_batch(&[strong_applicant(), weak_applicant()]);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));
    }
}
