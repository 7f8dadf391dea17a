//! Request and result value types shared by every rule.
//!
//! - `DosageRequest` identifies the patient, visit, drug and order set
//! - `Dose` is the terminal answer of a resolution

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Request
// ============================================================================

/// Input to a dose calculation
///
/// `base_dose` is never set by callers. The CSV rule fills it in on a fresh
/// copy right before handing the request to a delegate, so each hop of a
/// delegation chain sees its own value and the caller's request is untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DosageRequest {
    pub patient_uuid: String,
    pub visit_uuid: String,
    pub drug_name: String,
    pub order_set_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dose: Option<f64>,
}

impl DosageRequest {
    pub fn new(
        patient_uuid: impl Into<String>,
        visit_uuid: impl Into<String>,
        drug_name: impl Into<String>,
        order_set_name: impl Into<String>,
    ) -> Self {
        Self {
            patient_uuid: patient_uuid.into(),
            visit_uuid: visit_uuid.into(),
            drug_name: drug_name.into(),
            order_set_name: order_set_name.into(),
            base_dose: None,
        }
    }

    /// Copy of this request carrying `base_dose` for the next hop
    pub fn with_base_dose(&self, base_dose: f64) -> Self {
        Self {
            base_dose: Some(base_dose),
            ..self.clone()
        }
    }
}

// ============================================================================
// Dose
// ============================================================================

/// Unit of a computed dose
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseUnit {
    Mg,
}

impl fmt::Display for DoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoseUnit::Mg => write!(f, "mg"),
        }
    }
}

/// A resolved dose
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Dose {
    pub drug_name: String,
    pub value: f64,
    pub unit: DoseUnit,
}

impl Dose {
    pub fn new(drug_name: impl Into<String>, value: f64, unit: DoseUnit) -> Self {
        Self {
            drug_name: drug_name.into(),
            value,
            unit,
        }
    }
}

impl fmt::Display for Dose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.drug_name, self.value, self.unit)
    }
}

/// Round half away from zero to two decimal places
pub(crate) fn round_dose(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
