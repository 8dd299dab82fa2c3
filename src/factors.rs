//! Rule-based risk factor analysis.
//!
//! Runs directly on the applicant record, independently of the classifier,
//! and produces the explanation lists shown next to the score.

use crate::types::applicant::ApplicantRecord;
use crate::types::score::RiskFactors;

/// Which list a triggered rule contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorBucket {
    Positive,
    Negative,
    Neutral,
}

/// A single condition and the message it produces
pub struct FactorRule {
    pub bucket: FactorBucket,
    pub message: &'static str,
    applies: fn(&ApplicantRecord) -> bool,
}

impl FactorRule {
    pub fn applies(&self, record: &ApplicantRecord) -> bool {
        (self.applies)(record)
    }
}

fn income_expense_ratio(record: &ApplicantRecord) -> f64 {
    record.monthly_income / record.monthly_expense
}

/// Rules in output order within each bucket
pub const RULES: &[FactorRule] = &[
    FactorRule {
        bucket: FactorBucket::Positive,
        message: "Relación ingresos/gastos saludable",
        applies: |r| income_expense_ratio(r) > 1.5,
    },
    FactorRule {
        bucket: FactorBucket::Negative,
        message: "Gastos muy altos en relación a ingresos",
        applies: |r| income_expense_ratio(r) < 1.2,
    },
    FactorRule {
        bucket: FactorBucket::Positive,
        message: "Bajo nivel de endeudamiento",
        applies: |r| r.debt_percentage < 30.0,
    },
    FactorRule {
        bucket: FactorBucket::Negative,
        message: "Alto nivel de endeudamiento",
        applies: |r| r.debt_percentage > 60.0,
    },
    FactorRule {
        bucket: FactorBucket::Positive,
        message: "Historial de pagos perfecto",
        applies: |r| r.late_payments == 0,
    },
    FactorRule {
        bucket: FactorBucket::Negative,
        message: "Múltiples retrasos en pagos",
        applies: |r| r.late_payments > 2,
    },
    FactorRule {
        bucket: FactorBucket::Positive,
        message: "Edad en rango óptimo para crédito",
        applies: |r| (25..=55).contains(&r.age),
    },
    FactorRule {
        bucket: FactorBucket::Neutral,
        message: "Edad joven - historial crediticio limitado",
        applies: |r| r.age < 25,
    },
    FactorRule {
        bucket: FactorBucket::Negative,
        message: "Demasiados préstamos anteriores",
        applies: |r| r.previous_loans > 5,
    },
    FactorRule {
        bucket: FactorBucket::Positive,
        message: "Experiencia crediticia moderada",
        applies: |r| (1..=3).contains(&r.previous_loans),
    },
];

/// Evaluate every rule against the record.
pub fn analyze(record: &ApplicantRecord) -> RiskFactors {
    let mut factors = RiskFactors::default();
    for rule in RULES.iter().filter(|rule| rule.applies(record)) {
        let list = match rule.bucket {
            FactorBucket::Positive => &mut factors.positive,
            FactorBucket::Negative => &mut factors.negative,
            FactorBucket::Neutral => &mut factors.neutral,
        };
        list.push(rule.message.to_string());
    }
    factors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strong_applicant() -> ApplicantRecord {
        let mut record = ApplicantRecord::new("Ana", 30, 3000.0, 1200.0);
        record.marital_status = "casado".to_string();
        record.debt_percentage = 20.0;
        record.late_payments = 0;
        record.previous_loans = 2;
        record
    }

    #[test]
    fn test_strong_applicant_has_no_negatives() {
        let factors = analyze(&strong_applicant());

        assert_eq!(
            factors.positive,
            vec![
                "Relación ingresos/gastos saludable",
                "Bajo nivel de endeudamiento",
                "Historial de pagos perfecto",
                "Edad en rango óptimo para crédito",
                "Experiencia crediticia moderada",
            ]
        );
        assert!(factors.negative.is_empty());
        assert!(factors.neutral.is_empty());
    }

    #[test]
    fn test_weak_young_applicant() {
        let mut record = ApplicantRecord::new("Leo", 22, 1000.0, 950.0);
        record.debt_percentage = 75.0;
        record.late_payments = 5;
        record.previous_loans = 8;

        let factors = analyze(&record);

        assert_eq!(
            factors.negative,
            vec![
                "Gastos muy altos en relación a ingresos",
                "Alto nivel de endeudamiento",
                "Múltiples retrasos en pagos",
                "Demasiados préstamos anteriores",
            ]
        );
        assert_eq!(factors.neutral, vec!["Edad joven - historial crediticio limitado"]);
        assert!(factors.positive.is_empty());
    }

    #[test]
    fn test_middle_band_triggers_nothing() {
        let mut record = ApplicantRecord::new("Eva", 60, 1300.0, 1000.0);
        record.debt_percentage = 45.0;
        record.late_payments = 1;
        record.previous_loans = 4;

        assert!(analyze(&record).is_empty());
    }

    #[test]
    fn test_boundaries() {
        let mut record = strong_applicant();
        record.age = 25;
        record.debt_percentage = 30.0;
        record.previous_loans = 3;
        let factors = analyze(&record);
        assert!(factors.positive.contains(&"Edad en rango óptimo para crédito".to_string()));
        assert!(!factors.positive.contains(&"Bajo nivel de endeudamiento".to_string()));
        assert!(factors.positive.contains(&"Experiencia crediticia moderada".to_string()));

        record.age = 55;
        record.debt_percentage = 60.0;
        record.late_payments = 2;
        let factors = analyze(&record);
        assert!(factors.positive.contains(&"Edad en rango óptimo para crédito".to_string()));
        assert!(factors.negative.is_empty());
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let record = strong_applicant();
        assert_eq!(analyze(&record), analyze(&record));
    }
}
