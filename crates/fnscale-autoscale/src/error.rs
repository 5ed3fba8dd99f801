//! Error types for manifest composition and rendering.

use std::fmt;

use thiserror::Error;

/// A single problem with one metadata key of a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub key: String,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// A required key is absent.
    Missing,
    /// The key is present but its value fails the schema's validator.
    Invalid { value: String, reason: String },
}

impl Violation {
    pub fn missing(key: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: ViolationKind::Missing,
        }
    }

    pub fn invalid(key: &str, value: &str, reason: String) -> Self {
        Self {
            key: key.to_string(),
            kind: ViolationKind::Invalid {
                value: value.to_string(),
                reason,
            },
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "missing required key '{}'", self.key),
            ViolationKind::Invalid { value, reason } => {
                write!(f, "key '{}' = '{}': {}", self.key, value, reason)
            }
        }
    }
}

fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Per-binding composition errors. One binding failing never stops the
/// others from composing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("trigger '{name}' ({trigger_type}) failed validation: {}", describe(.violations))]
    TriggerValidationFailed {
        name: String,
        trigger_type: String,
        violations: Vec<Violation>,
    },

    #[error("trigger '{name}' has unknown type '{trigger_type}'")]
    UnknownTriggerType { name: String, trigger_type: String },
}

impl ComposeError {
    /// Name of the binding this error belongs to.
    pub fn binding_name(&self) -> &str {
        match self {
            ComposeError::TriggerValidationFailed { name, .. }
            | ComposeError::UnknownTriggerType { name, .. } => name,
        }
    }
}

/// Errors building or rendering a ScaledObject manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid resource name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("min replicas ({min}) exceeds max replicas ({max})")]
    InvalidReplicaBounds { min: u32, max: u32 },

    #[error("failed to render manifest as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to render manifest as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ManifestResult<T> = Result<T, ManifestError>;
