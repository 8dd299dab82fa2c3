//! Applicant data structures for credit scoring

use crate::error::{Result, ScoringError};
use serde::{Deserialize, Serialize};

/// Financial profile of a credit applicant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    /// Applicant display name
    pub name: String,

    /// Age in years
    pub age: u32,

    /// Marital status as entered ("casado", "soltero", "married", ...)
    pub marital_status: String,

    #[serde(default)]
    pub gender: Option<String>,

    pub nationality: String,

    /// Monthly income
    pub monthly_income: f64,

    /// Monthly expense
    pub monthly_expense: f64,

    /// Share of income committed to debt service (0 - 100)
    pub debt_percentage: f64,

    /// Whether the applicant currently carries debts
    pub active_debts: bool,

    /// Number of loans taken in the past
    pub previous_loans: u32,

    /// Number of late payments on record
    pub late_payments: u32,

    /// Whether the applicant holds active credit cards
    pub active_credit_cards: bool,

    /// Free-form spending behavior label
    pub spending_behavior: String,

    /// Average payment delay in days
    #[serde(default)]
    pub payment_delay: Option<f64>,

    /// Average account balance
    #[serde(default)]
    pub average_balance: Option<f64>,
}

impl ApplicantRecord {
    /// Create a record with the required financial fields and neutral defaults
    pub fn new(name: impl Into<String>, age: u32, monthly_income: f64, monthly_expense: f64) -> Self {
        Self {
            name: name.into(),
            age,
            marital_status: "soltero".to_string(),
            gender: None,
            nationality: "N/A".to_string(),
            monthly_income,
            monthly_expense,
            debt_percentage: 0.0,
            active_debts: false,
            previous_loans: 0,
            late_payments: 0,
            active_credit_cards: false,
            spending_behavior: "moderado".to_string(),
            payment_delay: None,
            average_balance: None,
        }
    }

    /// Check the input contract the scoring core relies on.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ScoringError::validation("name", "must not be empty"));
        }
        if self.age == 0 {
            return Err(ScoringError::validation("age", "must be greater than 0"));
        }
        if !(self.monthly_income > 0.0 && self.monthly_income.is_finite()) {
            return Err(ScoringError::validation(
                "monthly_income",
                format!("must be a positive number, got {}", self.monthly_income),
            ));
        }
        if !(self.monthly_expense > 0.0 && self.monthly_expense.is_finite()) {
            return Err(ScoringError::validation(
                "monthly_expense",
                format!("must be a positive number, got {}", self.monthly_expense),
            ));
        }
        if !(0.0..=100.0).contains(&self.debt_percentage) {
            return Err(ScoringError::validation(
                "debt_percentage",
                format!("must lie in [0, 100], got {}", self.debt_percentage),
            ));
        }
        if self.payment_delay.is_some_and(|d| !(d >= 0.0)) {
            return Err(ScoringError::validation("payment_delay", "must be >= 0"));
        }
        if self.average_balance.is_some_and(|b| !(b >= 0.0)) {
            return Err(ScoringError::validation("average_balance", "must be >= 0"));
        }
        Ok(())
    }

    /// Business rules applied by callers before scoring: expenses below
    /// income and legal age.
    pub fn check_business_rules(&self) -> Result<()> {
        if self.monthly_expense >= self.monthly_income {
            return Err(ScoringError::validation(
                "monthly_expense",
                "Los gastos mensuales no pueden ser mayores o iguales a los ingresos",
            ));
        }
        if self.age < 18 {
            return Err(ScoringError::validation(
                "age",
                "El solicitante debe ser mayor de edad",
            ));
        }
        Ok(())
    }
}
