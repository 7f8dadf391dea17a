//! Clinical records: patient age and recorded observations.
//!
//! The engine only talks to the `ClinicalRecords` trait. `RecordStore` is a
//! JSON-file implementation used by the CLI and tests.

use crate::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Numeric observation kinds the engine asks for
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    /// Kilograms
    Weight,
    /// Centimetres
    Height,
}

impl MeasurementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementKind::Weight => "weight",
            MeasurementKind::Height => "height",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patient and observation lookups
pub trait ClinicalRecords: Send + Sync {
    /// Current age of the patient in whole years
    fn patient_age(&self, patient_uuid: &str) -> Result<u32>;

    /// Newest numeric value of `kind` recorded for the patient in `visit_uuid`
    fn latest_numeric_observation(
        &self,
        patient_uuid: &str,
        kind: MeasurementKind,
        visit_uuid: &str,
    ) -> Result<Option<f64>>;
}

/// A single recorded observation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub visit_uuid: String,
    pub kind: MeasurementKind,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// A patient and their observations
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    pub uuid: String,
    pub birthdate: NaiveDate,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

/// Records file format
#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordsFile {
    #[serde(default)]
    patients: Vec<PatientRecord>,
}

/// In-memory clinical records, optionally loaded from JSON
#[derive(Clone, Debug, Default)]
pub struct RecordStore {
    patients: HashMap<String, PatientRecord>,
    reference_date: Option<NaiveDate>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records from a JSON file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let file: RecordsFile = serde_json::from_str(&contents)?;
        tracing::info!(
            "Loaded {} patient records from {:?}",
            file.patients.len(),
            path
        );

        let mut store = Self::new();
        for patient in file.patients {
            store.insert(patient);
        }
        Ok(store)
    }

    pub fn insert(&mut self, patient: PatientRecord) {
        self.patients.insert(patient.uuid.clone(), patient);
    }

    /// Compute ages as of `date` instead of today
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    fn patient(&self, patient_uuid: &str) -> Result<&PatientRecord> {
        self.patients
            .get(patient_uuid)
            .ok_or_else(|| Error::PatientNotFound(patient_uuid.to_string()))
    }
}

impl ClinicalRecords for RecordStore {
    fn patient_age(&self, patient_uuid: &str) -> Result<u32> {
        let patient = self.patient(patient_uuid)?;
        let today = self
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());
        Ok(age_in_years(patient.birthdate, today))
    }

    fn latest_numeric_observation(
        &self,
        patient_uuid: &str,
        kind: MeasurementKind,
        visit_uuid: &str,
    ) -> Result<Option<f64>> {
        let patient = self.patient(patient_uuid)?;
        let latest = patient
            .observations
            .iter()
            .filter(|o| o.kind == kind && o.visit_uuid == visit_uuid)
            .max_by_key(|o| o.recorded_at)
            .map(|o| o.value);

        tracing::debug!(
            "Latest {} for patient {} in visit {}: {:?}",
            kind,
            patient_uuid,
            visit_uuid,
            latest
        );
        Ok(latest)
    }
}

/// Whole years between `birthdate` and `today`, zero for future dates
fn age_in_years(birthdate: NaiveDate, today: NaiveDate) -> u32 {
    if today < birthdate {
        return 0;
    }
    let mut years = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        years -= 1;
    }
    years.max(0) as u32
}
