//! Row selection over an order-set table.
//!
//! Selection is first-name-match: the first row naming the drug is the only
//! candidate. If its bands do not admit the patient the request fails, even
//! when a later row for the same drug would have matched.

use crate::rule_table::RuleRow;
use crate::{Error, Result};

/// A row that admitted the patient, with its dosage parsed
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedRule<'a> {
    pub row: &'a RuleRow,
    pub dosage: f64,
}

/// First row in table order naming `drug_name`
pub fn find_candidate<'a>(rows: &'a [RuleRow], drug_name: &str) -> Result<&'a RuleRow> {
    rows.iter()
        .find(|row| row.drug_name == drug_name)
        .ok_or_else(|| {
            tracing::error!("Dosage definition not found in CSV file for '{}'", drug_name);
            Error::DosageDefinitionNotFound(drug_name.to_string())
        })
}

/// Whether `[min, max)` bands of `row` admit the patient
pub fn admits(row: &RuleRow, age: u32, weight: f64) -> Result<bool> {
    let (min_age, max_age) = row.age_range()?;
    let (min_weight, max_weight) = row.weight_range()?;

    let age = i64::from(age);
    Ok(min_age <= age && age < max_age && min_weight <= weight && weight < max_weight)
}

/// Check the candidate row admits the patient and parse its dosage
pub fn check_candidate(row: &RuleRow, age: u32, weight: f64) -> Result<SelectedRule<'_>> {
    if !admits(row, age, weight)? {
        tracing::warn!(
            "Patient (age {}, weight {}) outside bands for '{}'",
            age,
            weight,
            row.drug_name
        );
        return Err(Error::PatientOutOfRange(row.drug_name.clone()));
    }

    Ok(SelectedRule {
        row,
        dosage: row.dosage_value()?,
    })
}

/// Select the rule row for a patient
pub fn select<'a>(
    rows: &'a [RuleRow],
    drug_name: &str,
    age: u32,
    weight: f64,
) -> Result<SelectedRule<'a>> {
    let candidate = find_candidate(rows, drug_name)?;
    check_candidate(candidate, age, weight)
}
