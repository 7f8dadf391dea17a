//! Measurement validation.
//!
//! Which measurements are required depends on the rule family present in
//! the order set: any `mg/m2` row means height is needed as well as weight.

use crate::records::MeasurementKind;
use crate::rule_table::RuleRow;
use crate::rules::BSA_RULE;
use crate::{Error, Result};

/// Measurements a resolution path needs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeasurementRequirement {
    WeightOnly,
    WeightAndHeight,
}

impl MeasurementRequirement {
    /// Requirement implied by a whole rule table
    pub fn for_rows(rows: &[RuleRow]) -> Self {
        if rows.iter().any(|row| row.rule == BSA_RULE) {
            MeasurementRequirement::WeightAndHeight
        } else {
            MeasurementRequirement::WeightOnly
        }
    }

    pub fn needs_height(&self) -> bool {
        matches!(self, MeasurementRequirement::WeightAndHeight)
    }
}

/// Measurements that passed validation for one patient visit
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValidatedMeasurements {
    pub weight: f64,
    pub height: Option<f64>,
}

impl ValidatedMeasurements {
    pub fn get(&self, kind: MeasurementKind) -> Option<f64> {
        match kind {
            MeasurementKind::Weight => Some(self.weight),
            MeasurementKind::Height => self.height,
        }
    }
}

/// Check one measurement is present, finite and non-negative
pub fn validate_measurement(value: Option<f64>, kind: MeasurementKind) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(v) => {
            tracing::warn!("Invalid {} value: {}", kind, v);
            Err(Error::MissingOrInvalidMeasurement(kind.to_string()))
        }
        None => {
            tracing::warn!("No {} recorded", kind);
            Err(Error::MissingOrInvalidMeasurement(kind.to_string()))
        }
    }
}

/// Validate the measurements `requirement` calls for
///
/// Height is checked first when both are required. A height that is not
/// required is dropped rather than checked.
pub fn validate(
    requirement: MeasurementRequirement,
    weight: Option<f64>,
    height: Option<f64>,
) -> Result<ValidatedMeasurements> {
    let height = if requirement.needs_height() {
        Some(validate_measurement(height, MeasurementKind::Height)?)
    } else {
        None
    };
    let weight = validate_measurement(weight, MeasurementKind::Weight)?;
    Ok(ValidatedMeasurements { weight, height })
}
