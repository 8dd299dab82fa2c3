//! Score and risk classification data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest score that still counts as high risk
pub const HIGH_RISK_MAX_SCORE: u8 = 40;
/// Highest score that still counts as medium risk
pub const MEDIUM_RISK_MAX_SCORE: u8 = 70;

/// Three-tier risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "riesgo alto")]
    High,
    #[serde(rename = "riesgo medio")]
    Medium,
    #[serde(rename = "bajo riesgo")]
    Low,
}

impl RiskLevel {
    /// Determine the risk bucket for a 0-100 score
    pub fn from_score(score: u8) -> Self {
        if score <= HIGH_RISK_MAX_SCORE {
            RiskLevel::High
        } else if score <= MEDIUM_RISK_MAX_SCORE {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "riesgo alto",
            RiskLevel::Medium => "riesgo medio",
            RiskLevel::Low => "bajo riesgo",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable explanation lists produced by the rule table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub neutral: Vec<String>,
}

impl RiskFactors {
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty() && self.neutral.is_empty()
    }
}

/// Outcome of scoring one applicant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Creditworthiness score (0 - 100, higher is better)
    pub score: u8,
    pub risk_level: RiskLevel,
    pub factors: RiskFactors,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(41), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(70), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(71), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Low);
    }

    #[test]
    fn test_risk_level_serialization() {
        let json = serde_json::to_string(&RiskLevel::Medium).unwrap();
        assert_eq!(json, "\"riesgo medio\"");

        let level: RiskLevel = serde_json::from_str("\"bajo riesgo\"").unwrap();
        assert_eq!(level, RiskLevel::Low);
        assert_eq!(RiskLevel::High.to_string(), "riesgo alto");
    }
}
