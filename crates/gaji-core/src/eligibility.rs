//! Loan eligibility on the net-salary percentage.
//!
//! Every rule yields exactly one result, in rule order, whatever the record
//! contains.

use tracing::debug;

use crate::models::eligibility::{EligibilityResult, InstitutionRule};
use crate::models::payslip::PayslipRecord;

/// Score tiers on the percentage, checked top down.
const TIERS: [(f64, u8, &str); 3] = [
    (85.0, 100, "excellent take-home ratio"),
    (75.0, 90, "very good take-home ratio"),
    (65.0, 80, "good take-home ratio"),
];
const BASE_SCORE: u8 = 70;
const BASE_TIER: &str = "take-home ratio meets the minimum";

/// Evaluate a record against every rule.
pub fn evaluate(record: &PayslipRecord, rules: &[InstitutionRule]) -> Vec<EligibilityResult> {
    EligibilityEvaluator::new().evaluate(record, rules)
}

/// Eligibility evaluator with optional applicant details.
#[derive(Debug, Clone, Default)]
pub struct EligibilityEvaluator {
    age: Option<u32>,
}

impl EligibilityEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enforce `max_umur` limits against this age.
    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn evaluate(&self, record: &PayslipRecord, rules: &[InstitutionRule]) -> Vec<EligibilityResult> {
        rules.iter().map(|rule| self.evaluate_rule(record, rule)).collect()
    }

    fn evaluate_rule(&self, record: &PayslipRecord, rule: &InstitutionRule) -> EligibilityResult {
        let (percentage, minimum) = match (record.peratus_gaji_bersih, rule.min_peratus_gaji_bersih) {
            (Some(percentage), Some(minimum)) => (percentage, minimum),
            (percentage, minimum) => {
                let mut reasons = Vec::new();
                if percentage.is_none() {
                    reasons.push("percentage not available".to_string());
                }
                if minimum.is_none() {
                    reasons.push("no eligibility criteria defined".to_string());
                }
                return EligibilityResult::ineligible(&rule.name, reasons);
            }
        };

        let mut failures = Vec::new();
        let mut notes = Vec::new();

        if percentage < minimum {
            failures.push(format!(
                "peratus gaji bersih {percentage:.2}% is below the minimum {minimum:.2}%"
            ));
        } else {
            notes.push(format!(
                "peratus gaji bersih {percentage:.2}% meets the minimum {minimum:.2}%"
            ));
        }

        check_amount(
            "gaji pokok",
            record.gaji_pokok,
            rule.min_gaji_pokok,
            &mut failures,
        );
        check_amount(
            "gaji bersih",
            record.gaji_bersih,
            rule.min_gaji_bersih,
            &mut failures,
        );

        if let Some(max_age) = rule.max_umur {
            match self.age {
                Some(age) if age > max_age => {
                    failures.push(format!("age {age} exceeds the maximum {max_age}"));
                }
                Some(_) => {}
                None => notes.push(format!("maximum age {max_age} not checked")),
            }
        }

        let result = if failures.is_empty() {
            let (score, tier) = tier(percentage);
            notes.push(tier.to_string());
            EligibilityResult {
                institution: rule.name.clone(),
                eligible: true,
                reasons: notes,
                score,
            }
        } else {
            EligibilityResult::ineligible(&rule.name, failures)
        };

        debug!(
            institution = rule.name.as_str(),
            eligible = result.eligible,
            score = result.score,
            "eligibility evaluated"
        );
        result
    }
}

fn check_amount(label: &str, value: Option<f64>, minimum: Option<f64>, failures: &mut Vec<String>) {
    let Some(minimum) = minimum else {
        return;
    };
    match value {
        None => failures.push(format!("{label} not available")),
        Some(v) if v < minimum => {
            failures.push(format!("{label} RM{v:.2} is below the minimum RM{minimum:.2}"))
        }
        Some(_) => {}
    }
}

fn tier(percentage: f64) -> (u8, &'static str) {
    TIERS
        .iter()
        .find(|(floor, _, _)| percentage >= *floor)
        .map(|(_, score, label)| (*score, *label))
        .unwrap_or((BASE_SCORE, BASE_TIER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(percentage: Option<f64>) -> PayslipRecord {
        PayslipRecord {
            peratus_gaji_bersih: percentage,
            gaji_pokok: Some(4672.76),
            gaji_bersih: Some(2705.36),
            ..Default::default()
        }
    }

    #[test]
    fn test_threshold() {
        let rules = [InstitutionRule::new("Koperasi", 70.0)];

        let below = evaluate(&record(Some(60.0)), &rules);
        assert!(!below[0].eligible);
        assert_eq!(below[0].score, 0);
        assert!(below[0].reasons[0].contains("60.00"));
        assert!(below[0].reasons[0].contains("70.00"));

        let above = evaluate(&record(Some(80.0)), &rules);
        assert!(above[0].eligible);
        assert_eq!(above[0].score, 90);

        let equal = evaluate(&record(Some(70.0)), &rules);
        assert!(equal[0].eligible);
    }

    #[test]
    fn test_score_tiers() {
        let rules = [InstitutionRule::new("Bank", 0.0)];
        let scores: Vec<u8> = [90.0, 85.0, 76.0, 65.0, 64.99, 10.0]
            .into_iter()
            .map(|p| evaluate(&record(Some(p)), &rules)[0].score)
            .collect();
        assert_eq!(scores, vec![100, 100, 90, 80, 70, 70]);
    }

    #[test]
    fn test_missing_percentage_lists_every_rule() {
        let rules = [
            InstitutionRule::new("A", 40.0),
            InstitutionRule::new("B", 60.0),
            InstitutionRule {
                name: "C".to_string(),
                ..Default::default()
            },
        ];
        let results = evaluate(&record(None), &rules);

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| !r.eligible && r.score == 0));
        assert_eq!(results[0].reasons, vec!["percentage not available".to_string()]);
        assert_eq!(
            results[2].reasons,
            vec![
                "percentage not available".to_string(),
                "no eligibility criteria defined".to_string()
            ]
        );
    }

    #[test]
    fn test_rule_without_minimum() {
        let rule = InstitutionRule {
            name: "Tiada Syarat".to_string(),
            ..Default::default()
        };
        let result = &evaluate(&record(Some(57.9)), &[rule])[0];

        assert!(!result.eligible);
        assert_eq!(result.score, 0);
        assert_eq!(result.reasons, vec!["no eligibility criteria defined".to_string()]);
    }

    #[test]
    fn test_refinements() {
        let rules = [
            InstitutionRule::new("Pokok", 40.0).with_min_gaji_pokok(5000.0),
            InstitutionRule::new("Bersih", 40.0).with_min_gaji_bersih(2000.0),
            InstitutionRule::new("Umur", 40.0).with_max_umur(55),
        ];

        let results = evaluate(&record(Some(57.9)), &rules);
        assert!(!results[0].eligible);
        assert!(results[1].eligible);
        assert!(results[2].eligible);
        assert!(results[2].reasons.iter().any(|r| r.contains("not checked")));

        let older = EligibilityEvaluator::new().with_age(58).evaluate(&record(Some(57.9)), &rules);
        assert!(!older[2].eligible);
        assert!(older[2].reasons[0].contains("58"));
    }
}
