//! Type definitions for the credit scoring engine

pub mod applicant;
pub mod report;
pub mod score;

pub use applicant::ApplicantRecord;
pub use report::CreditReport;
pub use score::{RiskFactors, RiskLevel, ScoreResult};
