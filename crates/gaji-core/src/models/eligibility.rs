//! Institution eligibility rules and evaluation results.

use serde::{Deserialize, Serialize};

/// Eligibility criteria of one lending institution (koperasi or bank).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstitutionRule {
    /// Institution name.
    pub name: String,

    /// Minimum net-salary percentage. Required for any positive decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_peratus_gaji_bersih: Option<f64>,

    /// Minimum basic salary in RM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_gaji_pokok: Option<f64>,

    /// Maximum applicant age in years.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_umur: Option<u32>,

    /// Minimum net salary in RM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_gaji_bersih: Option<f64>,
}

impl InstitutionRule {
    /// Create a rule gated only on the net-salary percentage.
    pub fn new(name: impl Into<String>, min_peratus_gaji_bersih: f64) -> Self {
        Self {
            name: name.into(),
            min_peratus_gaji_bersih: Some(min_peratus_gaji_bersih),
            ..Self::default()
        }
    }

    pub fn with_min_gaji_pokok(mut self, amount: f64) -> Self {
        self.min_gaji_pokok = Some(amount);
        self
    }

    pub fn with_min_gaji_bersih(mut self, amount: f64) -> Self {
        self.min_gaji_bersih = Some(amount);
        self
    }

    pub fn with_max_umur(mut self, age: u32) -> Self {
        self.max_umur = Some(age);
        self
    }

    /// Load a rule list from a JSON array.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Eligibility decision for one institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResult {
    /// Institution name.
    pub institution: String,

    /// Whether the payslip meets every defined criterion.
    pub eligible: bool,

    /// Explanations for the decision.
    pub reasons: Vec<String>,

    /// Qualitative score (0 - 100); zero when ineligible.
    pub score: u8,
}

impl EligibilityResult {
    pub fn ineligible(institution: impl Into<String>, reasons: Vec<String>) -> Self {
        Self {
            institution: institution.into(),
            eligible: false,
            reasons,
            score: 0,
        }
    }
}
