//! Feature extraction for credit scoring model inference.
//!
//! Maps an applicant record to the fixed-order numeric vector the
//! classifier and normalizer are trained on.

use crate::types::applicant::ApplicantRecord;
use serde::{Deserialize, Serialize};

/// Number of features in every vector
pub const FEATURE_COUNT: usize = 11;

/// Feature names in vector order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "edad",
    "ingresos_mensuales",
    "gastos_mensuales",
    "porcentaje_deuda",
    "prestamos_anteriores",
    "pagos_tardios",
    "estado_civil",
    "deudas_activas",
    "tarjetas_credito",
    "retraso_pagos",
    "saldo_promedio",
];

// Dimension indices used by the synthetic generator and tests.
pub const AGE: usize = 0;
pub const INCOME: usize = 1;
pub const EXPENSE: usize = 2;
pub const DEBT_PERCENTAGE: usize = 3;
pub const PREVIOUS_LOANS: usize = 4;
pub const LATE_PAYMENTS: usize = 5;
pub const MARITAL: usize = 6;
pub const ACTIVE_DEBTS: usize = 7;
pub const ACTIVE_CARDS: usize = 8;
pub const PAYMENT_DELAY: usize = 9;
pub const AVERAGE_BALANCE: usize = 10;

/// Fixed-length feature vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }
}

impl From<[f64; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }
}

/// Feature extractor that transforms applicant records into model input features.
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Encode an applicant.
    ///
    /// Total for any well-typed record: missing optional amounts become 0.
    pub fn encode(&self, record: &ApplicantRecord) -> FeatureVector {
        FeatureVector([
            record.age as f64,
            record.monthly_income,
            record.monthly_expense,
            record.debt_percentage,
            record.previous_loans as f64,
            record.late_payments as f64,
            encode_marital_status(&record.marital_status),
            flag(record.active_debts),
            flag(record.active_credit_cards),
            record.payment_delay.unwrap_or(0.0),
            record.average_balance.unwrap_or(0.0),
        ])
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in vector order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Married applicants encode as 1, everyone else as 0.
fn encode_marital_status(status: &str) -> f64 {
    if status.eq_ignore_ascii_case("casado") || status.eq_ignore_ascii_case("married") {
        1.0
    } else {
        0.0
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_extraction_order() {
        let extractor = FeatureExtractor::new();
        let mut record = ApplicantRecord::new("Ana", 30, 3000.0, 1200.0);
        record.marital_status = "Casado".to_string();
        record.debt_percentage = 20.0;
        record.previous_loans = 2;
        record.late_payments = 1;
        record.active_debts = true;
        record.active_credit_cards = false;
        record.payment_delay = Some(4.5);
        record.average_balance = Some(800.0);

        let features = extractor.encode(&record);

        assert_eq!(
            features.values(),
            &[30.0, 3000.0, 1200.0, 20.0, 2.0, 1.0, 1.0, 1.0, 0.0, 4.5, 800.0]
        );
    }

    #[test]
    fn test_missing_optionals_default_to_zero() {
        let extractor = FeatureExtractor::new();
        let record = ApplicantRecord::new("Luis", 45, 2000.0, 900.0);

        let features = extractor.encode(&record);

        assert_eq!(features.as_slice().len(), FEATURE_COUNT);
        assert_eq!(features.0[PAYMENT_DELAY], 0.0);
        assert_eq!(features.0[AVERAGE_BALANCE], 0.0);
    }

    #[test]
    fn test_marital_encoding() {
        assert_eq!(encode_marital_status("casado"), 1.0);
        assert_eq!(encode_marital_status("MARRIED"), 1.0);
        assert_eq!(encode_marital_status(" Married "), 0.0);
        assert_eq!(encode_marital_status("casado "), 0.0);
        assert_eq!(encode_marital_status("soltero"), 0.0);
        assert_eq!(encode_marital_status("casada"), 0.0);
        assert_eq!(encode_marital_status(""), 0.0);
    }

    #[test]
    fn test_feature_count() {
        let extractor = FeatureExtractor::new();
        assert_eq!(extractor.feature_count(), 11);
        assert_eq!(extractor.feature_names().len(), 11);
        assert_eq!(extractor.feature_names()[MARITAL], "estado_civil");
    }
}
