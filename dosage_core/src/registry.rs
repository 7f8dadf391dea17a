//! Rule registry and delegation.
//!
//! Rules are registered by name at startup. Dispatch goes through a
//! `DispatchContext` that tracks how deep the current delegation chain is,
//! so a table that delegates back into itself stops at the configured limit.

use crate::records::MeasurementKind;
use crate::validator::ValidatedMeasurements;
use crate::{Dose, DosageRequest, Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Default bound on nested delegations
pub const DEFAULT_MAX_DELEGATION_DEPTH: usize = 8;

/// Something that can compute a dose for a request
pub trait DosageRule: Send + Sync {
    fn calculate_dose(&self, request: &DosageRequest, ctx: &DispatchContext<'_>) -> Result<Dose>;
}

/// Mapping from rule identifier to implementation
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<String, Arc<dyn DosageRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rule` under `name`, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, rule: Arc<dyn DosageRule>) {
        let name = name.into();
        if self.rules.insert(name.clone(), rule).is_some() {
            tracing::warn!("Replaced rule registered under '{}'", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DosageRule>> {
        self.rules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Registered identifiers in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.rules.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

/// Per-request dispatch state passed down a delegation chain
///
/// Besides the depth it carries the measurements already validated for the
/// request's patient and visit, so delegates don't look them up again.
#[derive(Clone, Copy, Debug)]
pub struct DispatchContext<'a> {
    registry: &'a RuleRegistry,
    depth: usize,
    max_depth: usize,
    measurements: Option<ValidatedMeasurements>,
}

impl<'a> DispatchContext<'a> {
    pub fn new(registry: &'a RuleRegistry, max_depth: usize) -> Self {
        Self {
            registry,
            depth: 0,
            max_depth,
            measurements: None,
        }
    }

    /// Copy of this context carrying `measurements` to later hops
    pub fn with_measurements(&self, measurements: ValidatedMeasurements) -> Self {
        Self {
            measurements: Some(measurements),
            ..*self
        }
    }

    /// A measurement validated earlier in the chain, if any
    pub fn known_measurement(&self, kind: MeasurementKind) -> Option<f64> {
        self.measurements.and_then(|m| m.get(kind))
    }

    /// Invoke the rule registered under `identifier`
    pub fn dispatch(&self, identifier: &str, request: &DosageRequest) -> Result<Dose> {
        let rule = self.registry.get(identifier).ok_or_else(|| {
            tracing::error!("Rule implementation not found for {}", identifier);
            Error::RuleImplementationNotFound(identifier.to_string())
        })?;

        if self.depth >= self.max_depth {
            tracing::error!(
                "Delegation to '{}' exceeds maximum depth {}",
                identifier,
                self.max_depth
            );
            return Err(Error::DelegationDepthExceeded {
                identifier: identifier.to_string(),
                limit: self.max_depth,
            });
        }

        tracing::debug!(
            "Delegating '{}' to rule '{}' at depth {}",
            request.drug_name,
            identifier,
            self.depth + 1
        );

        let child = DispatchContext {
            depth: self.depth + 1,
            ..*self
        };
        rule.calculate_dose(request, &child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DoseUnit;

    /// Returns its base dose doubled
    struct Doubler;

    impl DosageRule for Doubler {
        fn calculate_dose(&self, request: &DosageRequest, _ctx: &DispatchContext<'_>) -> Result<Dose> {
            let base = request
                .base_dose
                .ok_or_else(|| Error::MissingBaseDose("double".into()))?;
            Ok(Dose::new(&request.drug_name, base * 2.0, DoseUnit::Mg))
        }
    }

    /// Delegates to itself forever
    struct Loop;

    impl DosageRule for Loop {
        fn calculate_dose(&self, request: &DosageRequest, ctx: &DispatchContext<'_>) -> Result<Dose> {
            ctx.dispatch("loop", request)
        }
    }

    fn request() -> DosageRequest {
        DosageRequest::new("p-1", "v-1", "X", "Basic")
    }

    #[test]
    fn test_register_and_dispatch() {
        let mut registry = RuleRegistry::new();
        registry.register("double", Arc::new(Doubler));
        assert!(registry.contains("double"));
        assert_eq!(registry.names(), vec!["double"]);

        let ctx = DispatchContext::new(&registry, DEFAULT_MAX_DELEGATION_DEPTH);
        let dose = ctx.dispatch("double", &request().with_base_dose(4.0)).unwrap();
        assert_eq!(dose.value, 8.0);
    }

    #[test]
    fn test_unknown_identifier() {
        let registry = RuleRegistry::new();
        let ctx = DispatchContext::new(&registry, DEFAULT_MAX_DELEGATION_DEPTH);

        match ctx.dispatch("mg/lb", &request()) {
            Err(Error::RuleImplementationNotFound(name)) => assert_eq!(name, "mg/lb"),
            other => panic!("Expected RuleImplementationNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_stops_at_depth_limit() {
        let mut registry = RuleRegistry::new();
        registry.register("loop", Arc::new(Loop));
        let ctx = DispatchContext::new(&registry, 3);

        match ctx.dispatch("loop", &request()) {
            Err(Error::DelegationDepthExceeded { identifier, limit }) => {
                assert_eq!(identifier, "loop");
                assert_eq!(limit, 3);
            }
            other => panic!("Expected DelegationDepthExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_measurements_reach_delegates() {
        let registry = RuleRegistry::new();
        let ctx = DispatchContext::new(&registry, DEFAULT_MAX_DELEGATION_DEPTH);
        assert_eq!(ctx.known_measurement(MeasurementKind::Weight), None);

        let ctx = ctx.with_measurements(ValidatedMeasurements {
            weight: 40.0,
            height: None,
        });
        assert_eq!(ctx.known_measurement(MeasurementKind::Weight), Some(40.0));
        assert_eq!(ctx.known_measurement(MeasurementKind::Height), None);
    }
}
