//! Rule tables: one CSV file per order set.
//!
//! Each row is an admissibility band for one drug. Numeric columns stay as
//! text until a row is actually evaluated, so a typo in an unrelated row
//! never blocks a request.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Rule identifier for rows whose dosage is the final answer
pub const BLOCK_RULE: &str = "block";

/// One row of an order-set rule table
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleRow {
    #[serde(rename = "Name")]
    pub drug_name: String,
    #[serde(rename = "Min Age")]
    pub min_age: String,
    #[serde(rename = "Max Age")]
    pub max_age: String,
    #[serde(rename = "Min Weight")]
    pub min_weight: String,
    #[serde(rename = "Max Weight")]
    pub max_weight: String,
    #[serde(rename = "Rule")]
    pub rule: String,
    #[serde(rename = "Dosage")]
    pub dosage: String,
}

impl RuleRow {
    pub fn new(
        drug_name: &str,
        age: (&str, &str),
        weight: (&str, &str),
        rule: &str,
        dosage: &str,
    ) -> Self {
        Self {
            drug_name: drug_name.into(),
            min_age: age.0.into(),
            max_age: age.1.into(),
            min_weight: weight.0.into(),
            max_weight: weight.1.into(),
            rule: rule.into(),
            dosage: dosage.into(),
        }
    }

    pub fn is_block(&self) -> bool {
        self.rule == BLOCK_RULE
    }

    /// Age band as `[min, max)` in whole years
    ///
    /// Bounds may be negative, e.g. `-1` for a band open at the bottom.
    pub fn age_range(&self) -> Result<(i64, i64)> {
        Ok((
            self.parse_field("Min Age", &self.min_age)?,
            self.parse_field("Max Age", &self.max_age)?,
        ))
    }

    /// Weight band as `[min, max)` in kilograms
    ///
    /// Bounds may be infinite (`Infinity`) for an unbounded band.
    pub fn weight_range(&self) -> Result<(f64, f64)> {
        Ok((
            self.parse_bound("Min Weight", &self.min_weight)?,
            self.parse_bound("Max Weight", &self.max_weight)?,
        ))
    }

    /// Literal dosage value of the row
    pub fn dosage_value(&self) -> Result<f64> {
        self.parse_number("Dosage", &self.dosage)
    }

    fn parse_number(&self, field: &'static str, value: &str) -> Result<f64> {
        let parsed: f64 = self.parse_field(field, value)?;
        if parsed.is_finite() {
            Ok(parsed)
        } else {
            Err(self.malformed(field, value))
        }
    }

    fn parse_bound(&self, field: &'static str, value: &str) -> Result<f64> {
        let parsed: f64 = self.parse_field(field, value)?;
        if parsed.is_nan() {
            Err(self.malformed(field, value))
        } else {
            Ok(parsed)
        }
    }

    fn parse_field<T: std::str::FromStr>(&self, field: &'static str, value: &str) -> Result<T> {
        value.trim().parse().map_err(|_| self.malformed(field, value))
    }

    fn malformed(&self, field: &'static str, value: &str) -> Error {
        Error::MalformedRuleRow {
            drug: self.drug_name.clone(),
            field,
            value: value.to_string(),
        }
    }
}

/// Supplies the ordered rows of an order set
pub trait RuleTableSource: Send + Sync {
    /// Load all rows for `order_set` in table order
    ///
    /// A table that does not exist loads as empty.
    fn load(&self, order_set: &str) -> Result<Vec<RuleRow>>;
}

/// Rule tables stored as `<dir>/<order_set>.csv`
#[derive(Clone, Debug)]
pub struct CsvRuleTable {
    dir: PathBuf,
}

impl CsvRuleTable {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the CSV file backing `order_set`
    pub fn path_for(&self, order_set: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", order_set))
    }
}

impl RuleTableSource for CsvRuleTable {
    fn load(&self, order_set: &str) -> Result<Vec<RuleRow>> {
        let unavailable = |reason: String| Error::RuleResourceUnavailable {
            order_set: order_set.to_string(),
            reason,
        };

        if order_set.is_empty() || order_set.contains(['/', '\\']) || order_set == ".." {
            return Err(unavailable("invalid order set name".into()));
        }

        let path = self.path_for(order_set);
        tracing::info!("Using CSV file path: {:?}", path);

        if !path.exists() {
            tracing::warn!("No rule table found at {:?}", path);
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| unavailable(e.to_string()))?;

        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<RuleRow>, _>>()
            .map_err(|e| unavailable(e.to_string()))?;

        tracing::debug!("Loaded {} rows for order set '{}'", rows.len(), order_set);
        Ok(rows)
    }
}

/// Rule tables held in memory, keyed by order set
#[derive(Clone, Debug, Default)]
pub struct InMemoryRuleTable {
    tables: HashMap<String, Vec<RuleRow>>,
}

impl InMemoryRuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, order_set: impl Into<String>, rows: Vec<RuleRow>) -> Self {
        self.tables.insert(order_set.into(), rows);
        self
    }
}

impl RuleTableSource for InMemoryRuleTable {
    fn load(&self, order_set: &str) -> Result<Vec<RuleRow>> {
        Ok(self.tables.get(order_set).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Name,Min Age,Max Age,Min Weight,Max Weight,Rule,Dosage\n";

    #[test]
    fn test_load_rows_in_table_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv = format!(
            "{}Paracetamol,0,12,0,40,block,250\nParacetamol,12,120,40,200,block,500\nCisplatin, 0 ,120,0,200,mg/m2,75\n",
            HEADER
        );
        std::fs::write(temp_dir.path().join("Pediatrics.csv"), csv).unwrap();

        let table = CsvRuleTable::new(temp_dir.path());
        let rows = table.load("Pediatrics").unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].dosage, "250");
        assert_eq!(rows[1].dosage, "500");
        assert_eq!(rows[2].min_age, "0");
        assert_eq!(rows[2].rule, "mg/m2");
    }

    #[test]
    fn test_missing_file_is_empty_table() {
        let temp_dir = tempfile::tempdir().unwrap();
        let table = CsvRuleTable::new(temp_dir.path());

        assert!(table.load("Nowhere").unwrap().is_empty());
    }

    #[test]
    fn test_missing_columns_are_unavailable() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("Broken.csv"),
            "Name,Dosage\nParacetamol,250\n",
        )
        .unwrap();

        let table = CsvRuleTable::new(temp_dir.path());
        let err = table.load("Broken").unwrap_err();
        assert!(matches!(err, Error::RuleResourceUnavailable { .. }));
    }

    #[test]
    fn test_rejects_path_like_order_set() {
        let table = CsvRuleTable::new("/tmp");
        assert!(matches!(
            table.load("../etc/passwd"),
            Err(Error::RuleResourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_numeric_fields_parse_lazily() {
        let row = RuleRow::new("Ibuprofen", ("0", "abc"), ("0", "50.5"), BLOCK_RULE, "100");

        assert_eq!(row.weight_range().unwrap(), (0.0, 50.5));
        assert_eq!(row.dosage_value().unwrap(), 100.0);
        match row.age_range() {
            Err(Error::MalformedRuleRow { drug, field, value }) => {
                assert_eq!(drug, "Ibuprofen");
                assert_eq!(field, "Max Age");
                assert_eq!(value, "abc");
            }
            other => panic!("Expected MalformedRuleRow, got {:?}", other),
        }
    }

    #[test]
    fn test_open_ended_bands() {
        let row = RuleRow::new("Ibuprofen", ("-1", "18"), ("40", "Infinity"), BLOCK_RULE, "100");

        assert_eq!(row.age_range().unwrap(), (-1, 18));
        assert_eq!(row.weight_range().unwrap(), (40.0, f64::INFINITY));

        let row = RuleRow::new("Ibuprofen", ("0", "18"), ("NaN", "100"), BLOCK_RULE, "100");
        assert!(matches!(row.weight_range(), Err(Error::MalformedRuleRow { .. })));
    }

    #[test]
    fn test_non_finite_dosage_is_malformed() {
        let row = RuleRow::new("Ibuprofen", ("0", "10"), ("0", "50"), BLOCK_RULE, "NaN");
        assert!(matches!(row.dosage_value(), Err(Error::MalformedRuleRow { .. })));
    }

    #[test]
    fn test_in_memory_table() {
        let rows = vec![RuleRow::new("X", ("0", "18"), ("0", "100"), BLOCK_RULE, "5")];
        let table = InMemoryRuleTable::new().with_table("Basic", rows.clone());

        assert_eq!(table.load("Basic").unwrap(), rows);
        assert!(table.load("Other").unwrap().is_empty());
    }
}
