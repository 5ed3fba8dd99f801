//! Manifest composer — trigger bindings to autoscaler trigger descriptors.
//!
//! Each binding is looked up in the schema registry, validated, and turned
//! into one `ScalingTriggerDescriptor`. Bindings are independent, so they
//! are composed in parallel; output order still follows input order.

use std::collections::BTreeMap;
use std::str::FromStr;

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use fnscale_core::{ScalingTriggerDescriptor, TriggerBinding};

use crate::error::{ComposeError, Violation};
use crate::schema::{SchemaRegistry, TriggerSchema};

/// What to do with a binding whose trigger type has no schema.
///
/// Not every trigger type is autoscale-eligible, so the binding is always
/// left out of the descriptors. The policy only decides how loudly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownTriggerPolicy {
    /// Exclude silently (debug log only).
    #[default]
    Skip,
    /// Exclude and emit a warning.
    Warn,
    /// Exclude and report an `UnknownTriggerType` error.
    Reject,
}

impl FromStr for UnknownTriggerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "warn" => Ok(Self::Warn),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown trigger policy '{other}' (expected skip, warn or reject)"
            )),
        }
    }
}

/// Result of composing one binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingOutcome {
    Descriptor(ScalingTriggerDescriptor),
    /// No schema for the trigger type, or a schema without a scaler; left
    /// out of the manifest.
    Excluded,
    Rejected(ComposeError),
}

/// Descriptors and errors from one `compose` call. Partial success is
/// normal: some bindings may compose while others are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composition {
    pub descriptors: Vec<ScalingTriggerDescriptor>,
    pub errors: Vec<ComposeError>,
}

impl Composition {
    /// True when no binding was rejected.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// SHA-256 of the serialized descriptor list.
    ///
    /// Identical bindings always give an identical digest.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(&self.descriptors).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

/// Builds scaling trigger descriptors from trigger bindings.
pub struct ManifestComposer<'r> {
    registry: &'r SchemaRegistry,
    unknown_triggers: UnknownTriggerPolicy,
}

impl Default for ManifestComposer<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestComposer<'static> {
    /// Composer over the builtin schema registry.
    pub fn new() -> Self {
        Self::with_registry(SchemaRegistry::builtin())
    }
}

impl<'r> ManifestComposer<'r> {
    pub fn with_registry(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            unknown_triggers: UnknownTriggerPolicy::default(),
        }
    }

    /// Set the policy for trigger types without a schema.
    pub fn unknown_triggers(mut self, policy: UnknownTriggerPolicy) -> Self {
        self.unknown_triggers = policy;
        self
    }

    /// Compose every binding, collecting all descriptors and all errors.
    pub fn compose(&self, bindings: &[TriggerBinding]) -> Composition {
        let outcomes: Vec<BindingOutcome> = bindings
            .par_iter()
            .map(|binding| self.compose_binding(binding))
            .collect();

        let mut composition = Composition::default();
        for outcome in outcomes {
            match outcome {
                BindingOutcome::Descriptor(d) => composition.descriptors.push(d),
                BindingOutcome::Excluded => {}
                BindingOutcome::Rejected(e) => composition.errors.push(e),
            }
        }

        info!(
            bindings = bindings.len(),
            descriptors = composition.descriptors.len(),
            errors = composition.errors.len(),
            "composed autoscaler triggers"
        );
        composition
    }

    /// Compose a single binding.
    pub fn compose_binding(&self, binding: &TriggerBinding) -> BindingOutcome {
        let Some(schema) = self.registry.lookup(&binding.trigger_type) else {
            return self.exclude_unknown(binding);
        };

        match validate_metadata(schema, &binding.metadata) {
            Ok(metadata) => {
                let Some(scaler) = &schema.scaler else {
                    debug!(
                        trigger = %binding.name,
                        trigger_type = %binding.trigger_type,
                        "trigger type has no autoscaler scaler, skipping"
                    );
                    return BindingOutcome::Excluded;
                };
                debug!(
                    trigger = %binding.name,
                    %scaler,
                    keys = metadata.len(),
                    "trigger descriptor composed"
                );
                BindingOutcome::Descriptor(ScalingTriggerDescriptor {
                    trigger_type: scaler.clone(),
                    name: binding.name.clone(),
                    metadata,
                })
            }
            Err(violations) => {
                debug!(
                    trigger = %binding.name,
                    violations = violations.len(),
                    "trigger failed validation"
                );
                BindingOutcome::Rejected(ComposeError::TriggerValidationFailed {
                    name: binding.name.clone(),
                    trigger_type: binding.trigger_type.clone(),
                    violations,
                })
            }
        }
    }

    fn exclude_unknown(&self, binding: &TriggerBinding) -> BindingOutcome {
        match self.unknown_triggers {
            UnknownTriggerPolicy::Skip => {
                debug!(
                    trigger = %binding.name,
                    trigger_type = %binding.trigger_type,
                    "trigger type is not autoscale-eligible, skipping"
                );
                BindingOutcome::Excluded
            }
            UnknownTriggerPolicy::Warn => {
                warn!(
                    trigger = %binding.name,
                    trigger_type = %binding.trigger_type,
                    "no autoscaler schema for trigger type, leaving it out of the manifest"
                );
                BindingOutcome::Excluded
            }
            UnknownTriggerPolicy::Reject => {
                BindingOutcome::Rejected(ComposeError::UnknownTriggerType {
                    name: binding.name.clone(),
                    trigger_type: binding.trigger_type.clone(),
                })
            }
        }
    }
}

/// Check a binding's metadata against its schema.
///
/// Returns exactly the required keys plus the supplied optional keys, or
/// every violation found. Keys outside the schema are dropped.
fn validate_metadata(
    schema: &TriggerSchema,
    raw: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, Vec<Violation>> {
    let mut violations = Vec::new();
    let mut metadata = BTreeMap::new();

    for key in &schema.required_keys {
        match raw.get(key) {
            Some(value) => check_value(schema, key, value, &mut metadata, &mut violations),
            None => violations.push(Violation::missing(key)),
        }
    }

    for key in &schema.optional_keys {
        if let Some(value) = raw.get(key) {
            check_value(schema, key, value, &mut metadata, &mut violations);
        }
    }

    if violations.is_empty() {
        Ok(metadata)
    } else {
        Err(violations)
    }
}

fn check_value(
    schema: &TriggerSchema,
    key: &str,
    value: &str,
    metadata: &mut BTreeMap<String, String>,
    violations: &mut Vec<Violation>,
) {
    let verdict = schema
        .validator(key)
        .map_or(Ok(()), |validator| validator.check(value));

    match verdict {
        Ok(()) => {
            metadata.insert(key.to_string(), value.to_string());
        }
        Err(reason) => violations.push(Violation::invalid(key, value, reason)),
    }
}
