//! Dose calculation engine.
//!
//! `CsvDosageRule` resolves a request against the order-set rule table:
//! - Load the table for the request's order set
//! - Find the first row naming the drug
//! - Validate the measurements the table's rule family needs
//! - Check the row's age/weight bands
//! - Return a `block` row's dosage, or delegate to the named rule
//!
//! Validated measurements travel with the dispatch context, so delegates
//! and chained tables never fetch a measurement twice.
//!
//! `RulesEngine` owns the registry and is the entry point for callers.

use crate::config::Config;
use crate::records::{ClinicalRecords, MeasurementKind};
use crate::registry::{DispatchContext, DosageRule, RuleRegistry};
use crate::rule_table::{CsvRuleTable, RuleTableSource};
use crate::rules::{BsaBasedDosageRule, WeightBasedDosageRule, BSA_RULE, WEIGHT_RULE};
use crate::selector::{check_candidate, find_candidate};
use crate::validator::{self, MeasurementRequirement};
use crate::{Dose, DoseUnit, DosageRequest, Result};
use std::sync::Arc;

/// Identifier the CSV rule registers under
pub const CSV_RULE: &str = "customrule";

/// Rule backed by an order-set rule table
pub struct CsvDosageRule {
    table: Arc<dyn RuleTableSource>,
    records: Arc<dyn ClinicalRecords>,
}

impl CsvDosageRule {
    pub fn new(table: Arc<dyn RuleTableSource>, records: Arc<dyn ClinicalRecords>) -> Self {
        Self { table, records }
    }

    /// Measurement from earlier in the chain, else from the records
    fn observation(
        &self,
        request: &DosageRequest,
        ctx: &DispatchContext<'_>,
        kind: MeasurementKind,
    ) -> Result<Option<f64>> {
        match ctx.known_measurement(kind) {
            Some(value) => Ok(Some(value)),
            None => self
                .records
                .latest_numeric_observation(&request.patient_uuid, kind, &request.visit_uuid),
        }
    }
}

impl DosageRule for CsvDosageRule {
    fn calculate_dose(&self, request: &DosageRequest, ctx: &DispatchContext<'_>) -> Result<Dose> {
        let rows = self.table.load(&request.order_set_name)?;
        let candidate = find_candidate(&rows, &request.drug_name)?;

        let requirement = MeasurementRequirement::for_rows(&rows);
        let weight = self.observation(request, ctx, MeasurementKind::Weight)?;
        let height = if requirement.needs_height() {
            self.observation(request, ctx, MeasurementKind::Height)?
        } else {
            None
        };
        let mut measurements = validator::validate(requirement, weight, height)?;
        // Keep a height validated further up the chain
        measurements.height = measurements
            .height
            .or(ctx.known_measurement(MeasurementKind::Height));

        let age = self.records.patient_age(&request.patient_uuid)?;
        let selected = check_candidate(candidate, age, measurements.weight)?;

        if selected.row.is_block() {
            tracing::info!(
                "Block rule for '{}': {} mg",
                selected.row.drug_name,
                selected.dosage
            );
            return Ok(Dose::new(
                &selected.row.drug_name,
                selected.dosage,
                DoseUnit::Mg,
            ));
        }

        ctx.with_measurements(measurements)
            .dispatch(&selected.row.rule, &request.with_base_dose(selected.dosage))
    }
}

/// Entry point: a populated registry plus dispatch limits
#[derive(Debug)]
pub struct RulesEngine {
    registry: RuleRegistry,
    max_delegation_depth: usize,
}

impl RulesEngine {
    pub fn new(registry: RuleRegistry, max_delegation_depth: usize) -> Self {
        Self {
            registry,
            max_delegation_depth,
        }
    }

    /// Engine with the CSV, weight-based and BSA rules registered
    pub fn standard(config: &Config, records: Arc<dyn ClinicalRecords>) -> Self {
        let table = Arc::new(CsvRuleTable::new(&config.rules.dir));
        tracing::debug!("Rule tables read from {:?}", table.dir());

        let mut registry = RuleRegistry::new();
        registry.register(CSV_RULE, Arc::new(CsvDosageRule::new(table, records.clone())));
        registry.register(WEIGHT_RULE, Arc::new(WeightBasedDosageRule::new(records.clone())));
        registry.register(BSA_RULE, Arc::new(BsaBasedDosageRule::new(records)));

        Self::new(registry, config.rules.max_delegation_depth)
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Calculate a dose through the CSV rule
    pub fn calculate_dose(&self, request: &DosageRequest) -> Result<Dose> {
        self.calculate_dose_with(CSV_RULE, request)
    }

    /// Calculate a dose through the rule registered under `rule`
    pub fn calculate_dose_with(&self, rule: &str, request: &DosageRequest) -> Result<Dose> {
        tracing::info!(
            "Calculating dose of '{}' for patient {} (order set '{}', rule '{}')",
            request.drug_name,
            request.patient_uuid,
            request.order_set_name,
            rule
        );

        let ctx = DispatchContext::new(&self.registry, self.max_delegation_depth);
        ctx.dispatch(rule, request).inspect_err(|e| {
            tracing::error!(
                "Dose calculation failed for '{}' [{}]: {}",
                request.drug_name,
                e.kind(),
                e
            );
        })
    }
}
