//! Synthetic training data generation.
//!
//! Applicants are sampled from fixed parametric distributions and labeled
//! with a noisy weighted risk rule. Everything is driven by an explicit
//! seed so the same `(seed, n)` always yields the same corpus.

use crate::error::{Result, ScoringError};
use crate::feature_extractor::{FeatureVector, FEATURE_COUNT};
use rand::distributions::{Bernoulli, Distribution};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Exp, LogNormal, Normal, Poisson};
use tracing::debug;

/// Label for applicants with good credit
pub const GOOD_CREDIT: u8 = 0;
/// Label for applicants with bad credit
pub const BAD_CREDIT: u8 = 1;

const RISK_THRESHOLD: f64 = 0.5;

/// Labeled feature vectors used for a single training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingCorpus {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<u8>,
}

impl TrainingCorpus {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Count of (good, bad) labels
    pub fn class_counts(&self) -> [usize; 2] {
        let bad = self.labels.iter().filter(|&&l| l == BAD_CREDIT).count();
        [self.labels.len() - bad, bad]
    }
}

/// Sampling distributions for every synthetic attribute
struct ApplicantDistributions {
    age: Normal<f64>,
    income: LogNormal<f64>,
    debt_share: Beta<f64>,
    previous_loans: Poisson<f64>,
    late_payments: Poisson<f64>,
    married: Bernoulli,
    active_debts: Bernoulli,
    active_cards: Bernoulli,
    payment_delay: Exp<f64>,
    balance: LogNormal<f64>,
    noise: Normal<f64>,
}

impl ApplicantDistributions {
    fn new() -> Result<Self> {
        Ok(Self {
            age: Normal::new(35.0, 12.0).map_err(distribution_error)?,
            income: LogNormal::new(9.0, 0.8).map_err(distribution_error)?,
            debt_share: Beta::new(2.0, 5.0).map_err(distribution_error)?,
            previous_loans: Poisson::new(2.0).map_err(distribution_error)?,
            late_payments: Poisson::new(1.0).map_err(distribution_error)?,
            married: Bernoulli::new(0.6).map_err(distribution_error)?,
            active_debts: Bernoulli::new(0.4).map_err(distribution_error)?,
            active_cards: Bernoulli::new(0.7).map_err(distribution_error)?,
            payment_delay: Exp::new(1.0 / 5.0).map_err(distribution_error)?,
            balance: LogNormal::new(7.0, 1.0).map_err(distribution_error)?,
            noise: Normal::new(0.0, 0.1).map_err(distribution_error)?,
        })
    }

    fn sample_applicant<R: Rng>(&self, rng: &mut R) -> [f64; FEATURE_COUNT] {
        let age = self.age.sample(rng).clamp(18.0, 80.0);
        let income = self.income.sample(rng);
        let expense = income * rng.gen_range(0.3..0.9);

        [
            age,
            income,
            expense,
            self.debt_share.sample(rng) * 100.0,
            self.previous_loans.sample(rng),
            self.late_payments.sample(rng),
            indicator(self.married.sample(rng)),
            indicator(self.active_debts.sample(rng)),
            indicator(self.active_cards.sample(rng)),
            self.payment_delay.sample(rng),
            self.balance.sample(rng),
        ]
    }
}

fn distribution_error(e: impl std::fmt::Display) -> ScoringError {
    ScoringError::ArtifactUnavailable(format!("invalid sampling distribution: {e}"))
}

fn indicator(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Weighted rule score before noise.
fn rule_risk(features: &[f64; FEATURE_COUNT]) -> f64 {
    use crate::feature_extractor::{
        DEBT_PERCENTAGE, EXPENSE, INCOME, LATE_PAYMENTS, PAYMENT_DELAY, PREVIOUS_LOANS,
    };

    let mut risk = 0.0;
    if features[DEBT_PERCENTAGE] > 50.0 {
        risk += 0.3;
    }
    if features[LATE_PAYMENTS] > 2.0 {
        risk += 0.4;
    }
    if features[EXPENSE] / features[INCOME] > 0.8 {
        risk += 0.2;
    }
    if features[PREVIOUS_LOANS] > 3.0 {
        risk += 0.1;
    }
    if features[PAYMENT_DELAY] > 10.0 {
        risk += 0.2;
    }
    risk
}

/// Generate `n` labeled applicants from `seed`.
pub fn generate(seed: u64, n: usize) -> Result<TrainingCorpus> {
    let distributions = ApplicantDistributions::new()?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut features = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);

    for _ in 0..n {
        let applicant = distributions.sample_applicant(&mut rng);
        let risk = rule_risk(&applicant) + distributions.noise.sample(&mut rng);

        labels.push(if risk > RISK_THRESHOLD { BAD_CREDIT } else { GOOD_CREDIT });
        features.push(FeatureVector(applicant));
    }

    let corpus = TrainingCorpus { features, labels };
    let [good, bad] = corpus.class_counts();
    debug!(seed, samples = n, good, bad, "Synthetic corpus generated");

    Ok(corpus)
}
