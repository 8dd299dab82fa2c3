//! Sample Applicant Generator
//!
//! Writes random applicant records as JSON lines for exercising batch scoring.
//!
//! Usage: sample-applicants [count] [risky_rate]

use credit_scoring::ApplicantRecord;
use rand::Rng;
use std::io::{self, BufWriter, Write};
use tracing::info;

const NAMES: &[&str] = &[
    "Ana", "Luis", "Carmen", "Jorge", "Lucía", "Pablo", "Marta", "Diego", "Sofía", "Andrés",
];

/// Applicant generator for testing
struct ApplicantGenerator {
    rng: rand::rngs::ThreadRng,
    counter: u64,
}

impl ApplicantGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            counter: 0,
        }
    }

    fn base(&mut self, age: u32, income: f64, expense_share: f64) -> ApplicantRecord {
        self.counter += 1;
        let name = format!("{} #{}", self.random_choice(NAMES), self.counter);
        let mut record = ApplicantRecord::new(name, age, income, income * expense_share);
        record.marital_status = self.random_choice(&["casado", "soltero", "married", "divorciado"]).to_string();
        record.nationality = self.random_choice(&["ES", "MX", "AR", "CO", "CL"]).to_string();
        record.gender = self.rng.gen_bool(0.9).then(|| self.random_choice(&["F", "M"]).to_string());
        record.spending_behavior = self.random_choice(&["ahorrador", "moderado", "impulsivo"]).to_string();
        record
    }

    /// Generate an applicant with a healthy profile
    fn generate_solid(&mut self) -> ApplicantRecord {
        let age = self.rng.gen_range(25..56);
        let income = self.rng.gen_range(2500.0..9000.0);
        let share = self.rng.gen_range(0.3..0.6);
        let mut record = self.base(age, income, share);
        record.debt_percentage = self.rng.gen_range(0.0..30.0);
        record.active_debts = self.rng.gen_bool(0.3);
        record.previous_loans = self.rng.gen_range(1..4);
        record.late_payments = 0;
        record.active_credit_cards = self.rng.gen_bool(0.7);
        record.payment_delay = Some(self.rng.gen_range(0.0..3.0));
        record.average_balance = Some(self.rng.gen_range(1000.0..8000.0));
        record
    }

    /// Generate an applicant with stacked risk indicators
    fn generate_risky(&mut self) -> ApplicantRecord {
        let age = self.rng.gen_range(18..30);
        let income = self.rng.gen_range(800.0..2000.0);
        let share = self.rng.gen_range(0.82..0.98);
        let mut record = self.base(age, income, share);
        record.debt_percentage = self.rng.gen_range(55.0..95.0);
        record.active_debts = true;
        record.previous_loans = self.rng.gen_range(4..10);
        record.late_payments = self.rng.gen_range(3..8);
        record.active_credit_cards = self.rng.gen_bool(0.9);
        record.payment_delay = Some(self.rng.gen_range(10.0..40.0));
        record.average_balance = Some(self.rng.gen_range(0.0..300.0));
        record
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_applicants=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let count: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100);
    let risky_rate: f64 = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.2_f64)
        .clamp(0.0, 1.0);

    let mut generator = ApplicantGenerator::new();
    let mut rng = rand::thread_rng();
    let mut out = BufWriter::new(io::stdout().lock());
    let mut risky_count = 0;

    for _ in 0..count {
        let record = if rng.gen_bool(risky_rate) {
            risky_count += 1;
            generator.generate_risky()
        } else {
            generator.generate_solid()
        };
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    info!(
        "Generated {} applicants ({} solid, {} risky)",
        count,
        count - risky_count,
        risky_count
    );

    Ok(())
}
