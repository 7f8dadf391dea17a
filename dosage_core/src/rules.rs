//! Capability rules that scale a base dose by patient measurements.
//!
//! These are the usual delegates of a CSV row: the row supplies the base
//! dose per unit, the rule multiplies it out.

use crate::records::{ClinicalRecords, MeasurementKind};
use crate::registry::{DispatchContext, DosageRule};
use crate::types::round_dose;
use crate::validator::validate_measurement;
use crate::{Dose, DoseUnit, DosageRequest, Error, Result};
use std::sync::Arc;

/// Identifier of the weight-based rule
pub const WEIGHT_RULE: &str = "mg/kg";

/// Identifier of the body-surface-area rule
pub const BSA_RULE: &str = "mg/m2";

fn base_dose(request: &DosageRequest, identifier: &str) -> Result<f64> {
    request.base_dose.ok_or_else(|| {
        tracing::error!("Rule '{}' invoked without a base dose", identifier);
        Error::MissingBaseDose(identifier.to_string())
    })
}

/// Measurement validated earlier in the chain, else looked up and validated
fn measurement(
    records: &dyn ClinicalRecords,
    request: &DosageRequest,
    ctx: &DispatchContext<'_>,
    kind: MeasurementKind,
) -> Result<f64> {
    if let Some(value) = ctx.known_measurement(kind) {
        return Ok(value);
    }
    let value =
        records.latest_numeric_observation(&request.patient_uuid, kind, &request.visit_uuid)?;
    validate_measurement(value, kind)
}

/// Dose = base (mg/kg) × weight (kg)
pub struct WeightBasedDosageRule {
    records: Arc<dyn ClinicalRecords>,
}

impl WeightBasedDosageRule {
    pub fn new(records: Arc<dyn ClinicalRecords>) -> Self {
        Self { records }
    }
}

impl DosageRule for WeightBasedDosageRule {
    fn calculate_dose(&self, request: &DosageRequest, ctx: &DispatchContext<'_>) -> Result<Dose> {
        let base = base_dose(request, WEIGHT_RULE)?;
        let weight = measurement(self.records.as_ref(), request, ctx, MeasurementKind::Weight)?;

        let value = round_dose(base * weight);
        tracing::info!(
            "{}: {} mg/kg x {} kg = {} mg",
            request.drug_name,
            base,
            weight,
            value
        );
        Ok(Dose::new(&request.drug_name, value, DoseUnit::Mg))
    }
}

/// Dose = base (mg/m²) × body surface area (m²)
pub struct BsaBasedDosageRule {
    records: Arc<dyn ClinicalRecords>,
}

impl BsaBasedDosageRule {
    pub fn new(records: Arc<dyn ClinicalRecords>) -> Self {
        Self { records }
    }
}

impl DosageRule for BsaBasedDosageRule {
    fn calculate_dose(&self, request: &DosageRequest, ctx: &DispatchContext<'_>) -> Result<Dose> {
        let base = base_dose(request, BSA_RULE)?;
        let height = measurement(self.records.as_ref(), request, ctx, MeasurementKind::Height)?;
        let weight = measurement(self.records.as_ref(), request, ctx, MeasurementKind::Weight)?;

        let bsa = body_surface_area(height, weight);
        let value = round_dose(base * bsa);
        tracing::info!(
            "{}: {} mg/m2 x {:.4} m2 = {} mg",
            request.drug_name,
            base,
            bsa,
            value
        );
        Ok(Dose::new(&request.drug_name, value, DoseUnit::Mg))
    }
}

/// Mosteller body surface area in m² from height (cm) and weight (kg)
pub fn body_surface_area(height_cm: f64, weight_kg: f64) -> f64 {
    (height_cm * weight_kg / 3600.0).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Observation, PatientRecord, RecordStore};
    use crate::registry::{RuleRegistry, DEFAULT_MAX_DELEGATION_DEPTH};
    use crate::validator::ValidatedMeasurements;
    use chrono::{NaiveDate, Utc};

    fn records(weight: Option<f64>, height: Option<f64>) -> Arc<dyn ClinicalRecords> {
        let mut observations = Vec::new();
        for (kind, value) in [
            (MeasurementKind::Weight, weight),
            (MeasurementKind::Height, height),
        ] {
            if let Some(value) = value {
                observations.push(Observation {
                    visit_uuid: "v-1".into(),
                    kind,
                    value,
                    recorded_at: Utc::now(),
                });
            }
        }

        let mut store = RecordStore::new();
        store.insert(PatientRecord {
            uuid: "p-1".into(),
            birthdate: NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(),
            observations,
        });
        Arc::new(store)
    }

    fn request(base: Option<f64>) -> DosageRequest {
        let request = DosageRequest::new("p-1", "v-1", "Cisplatin", "Chemo");
        match base {
            Some(b) => request.with_base_dose(b),
            None => request,
        }
    }

    #[test]
    fn test_body_surface_area() {
        assert!((body_surface_area(180.0, 80.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_weight_based_dose() {
        let registry = RuleRegistry::new();
        let ctx = DispatchContext::new(&registry, DEFAULT_MAX_DELEGATION_DEPTH);
        let rule = WeightBasedDosageRule::new(records(Some(12.5), None));

        let dose = rule.calculate_dose(&request(Some(15.0)), &ctx).unwrap();
        assert_eq!(dose.value, 187.5);
        assert_eq!(dose.unit, DoseUnit::Mg);
    }

    #[test]
    fn test_bsa_based_dose() {
        let registry = RuleRegistry::new();
        let ctx = DispatchContext::new(&registry, DEFAULT_MAX_DELEGATION_DEPTH);
        let rule = BsaBasedDosageRule::new(records(Some(80.0), Some(180.0)));

        let dose = rule.calculate_dose(&request(Some(75.0)), &ctx).unwrap();
        assert_eq!(dose.value, 150.0);
    }

    #[test]
    fn test_bsa_uses_measurements_from_context() {
        let registry = RuleRegistry::new();
        let ctx = DispatchContext::new(&registry, DEFAULT_MAX_DELEGATION_DEPTH).with_measurements(
            ValidatedMeasurements {
                weight: 80.0,
                height: Some(180.0),
            },
        );
        // Nothing recorded: only the context can supply the measurements
        let rule = BsaBasedDosageRule::new(records(None, None));

        let dose = rule.calculate_dose(&request(Some(75.0)), &ctx).unwrap();
        assert_eq!(dose.value, 150.0);
    }

    #[test]
    fn test_bsa_requires_height() {
        let registry = RuleRegistry::new();
        let ctx = DispatchContext::new(&registry, DEFAULT_MAX_DELEGATION_DEPTH);
        let rule = BsaBasedDosageRule::new(records(Some(80.0), None));

        let err = rule.calculate_dose(&request(Some(75.0)), &ctx).unwrap_err();
        assert!(matches!(err, Error::MissingOrInvalidMeasurement(kind) if kind == "height"));
    }

    #[test]
    fn test_missing_base_dose() {
        let registry = RuleRegistry::new();
        let ctx = DispatchContext::new(&registry, DEFAULT_MAX_DELEGATION_DEPTH);
        let rule = WeightBasedDosageRule::new(records(Some(12.5), None));

        assert!(matches!(
            rule.calculate_dose(&request(None), &ctx),
            Err(Error::MissingBaseDose(_))
        ));
    }
}
