#![forbid(unsafe_code)]

//! Rule resolution and dose calculation for drug order sets.
//!
//! This crate provides:
//! - Request and dose value types
//! - Order-set rule tables (CSV) and row selection
//! - Measurement validation against patient records
//! - A rule registry with depth-limited delegation
//! - Weight- and body-surface-area-based rules

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod rule_table;
pub mod records;
pub mod validator;
pub mod selector;
pub mod registry;
pub mod rules;
pub mod engine;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use rule_table::{CsvRuleTable, InMemoryRuleTable, RuleRow, RuleTableSource, BLOCK_RULE};
pub use records::{ClinicalRecords, MeasurementKind, RecordStore};
pub use registry::{DispatchContext, DosageRule, RuleRegistry};
pub use engine::{CsvDosageRule, RulesEngine, CSV_RULE};
