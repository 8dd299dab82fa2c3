//! Credit report returned to callers

use crate::types::score::{RiskFactors, RiskLevel, ScoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Scored application with its explanation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditReport {
    /// Unique report identifier
    pub report_id: String,

    /// Applicant name
    pub name: String,

    /// Creditworthiness score (0 - 100)
    pub score: u8,

    /// Risk bucket derived from the score
    pub risk_level: RiskLevel,

    /// Multi-line explanation with recommendations
    pub explanation: String,

    /// Rule-based factors behind the explanation
    pub factors: RiskFactors,

    /// Report generation timestamp
    pub created_at: DateTime<Utc>,
}

impl CreditReport {
    /// Build a report from a score result
    pub fn new(name: impl Into<String>, result: ScoreResult) -> Self {
        let name = name.into();
        let explanation = explain(&name, &result);

        Self {
            report_id: uuid::Uuid::new_v4().to_string(),
            name,
            score: result.score,
            risk_level: result.risk_level,
            explanation,
            factors: result.factors,
            created_at: Utc::now(),
        }
    }
}

/// Compose the explanation text: factor sections, then tier-specific advice.
pub fn explain(name: &str, result: &ScoreResult) -> String {
    let mut text = format!("{}: {} (score {}/100)\n\n", name, result.risk_level, result.score);

    let sections = [
        ("✅ Factores positivos:", &result.factors.positive),
        ("⚠️ Factores de riesgo:", &result.factors.negative),
        ("ℹ️ Consideraciones adicionales:", &result.factors.neutral),
    ];
    for (title, factors) in sections {
        if factors.is_empty() {
            continue;
        }
        text.push_str(title);
        text.push('\n');
        for factor in factors {
            let _ = writeln!(text, "• {}", factor);
        }
        text.push('\n');
    }

    match result.risk_level {
        RiskLevel::High => {
            text.push_str("💡 Recomendaciones:\n");
            text.push_str("• Reducir el nivel de endeudamiento\n");
            text.push_str("• Mejorar el historial de pagos\n");
            text.push_str("• Aumentar los ingresos o reducir gastos\n");
        }
        RiskLevel::Medium => {
            text.push_str("💡 Sugerencias para mejorar:\n");
            text.push_str("• Mantener un buen historial de pagos\n");
            text.push_str("• Considerar reducir deudas existentes\n");
        }
        RiskLevel::Low => {
            text.push_str(
                "🎉 Excelente perfil crediticio. Mantener las buenas prácticas financieras.",
            );
        }
    }

    text
}
