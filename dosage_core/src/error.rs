//! Error types for the dosage_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for rule resolution and dose calculation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The rule table for an order set could not be read
    #[error("Rule table for order set '{order_set}' is unavailable: {reason}")]
    RuleResourceUnavailable { order_set: String, reason: String },

    /// No row in the rule table names the requested drug
    #[error("Dosage definition not found in CSV file for '{0}'")]
    DosageDefinitionNotFound(String),

    /// A measurement needed for the calculation is absent or not a valid number
    #[error("Missing or invalid measurement: {0}")]
    MissingOrInvalidMeasurement(String),

    /// The drug is defined but the patient falls outside its age/weight band
    #[error("This patient doesn't fall under Age/Weight range defined in the dose calculation rule for drug '{0}'")]
    PatientOutOfRange(String),

    /// A row delegates to a rule identifier with nothing registered under it
    #[error("Rule implementation not found for {0}")]
    RuleImplementationNotFound(String),

    /// A numeric column of a rule row failed to parse
    #[error("Malformed rule row for drug '{drug}': {field} = '{value}'")]
    MalformedRuleRow {
        drug: String,
        field: &'static str,
        value: String,
    },

    /// Patient lookup failed
    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    /// A delegate rule was invoked without the base dose it scales
    #[error("Rule '{0}' requires a base dose")]
    MissingBaseDose(String),

    /// Delegation chain exceeded the configured depth
    #[error("Delegation to '{identifier}' exceeds the maximum depth of {limit}")]
    DelegationDepthExceeded { identifier: String, limit: usize },

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Stable label for logs and machine-readable output
    pub fn kind(&self) -> &'static str {
        match self {
            Error::RuleResourceUnavailable { .. } => "rule_resource_unavailable",
            Error::DosageDefinitionNotFound(_) => "dosage_definition_not_found",
            Error::MissingOrInvalidMeasurement(_) => "missing_or_invalid_measurement",
            Error::PatientOutOfRange(_) => "patient_out_of_range",
            Error::RuleImplementationNotFound(_) => "rule_implementation_not_found",
            Error::MalformedRuleRow { .. } => "malformed_rule_row",
            Error::PatientNotFound(_) => "patient_not_found",
            Error::MissingBaseDose(_) => "missing_base_dose",
            Error::DelegationDepthExceeded { .. } => "delegation_depth_exceeded",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Toml(_) => "toml",
            Error::Config(_) => "config",
        }
    }
}
