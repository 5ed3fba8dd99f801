//! Shared types used across fnscale crates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a remote deployment.
///
/// Remote status strings outside this enumeration map to `Unknown` so a
/// newer platform never crashes the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeployStatus {
    Pending,
    Building,
    Deploying,
    Succeeded,
    Failed,
    /// Indeterminate: the status could not be fetched or was not recognized.
    Unknown,
}

impl DeployStatus {
    /// `Succeeded` and `Failed` are terminal; nothing transitions out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployStatus::Succeeded | DeployStatus::Failed)
    }

    /// Map a status string reported by the remote system (case-insensitive).
    pub fn from_remote(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => DeployStatus::Pending,
            "building" => DeployStatus::Building,
            "deploying" => DeployStatus::Deploying,
            "succeeded" => DeployStatus::Succeeded,
            "failed" => DeployStatus::Failed,
            _ => DeployStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStatus::Pending => "Pending",
            DeployStatus::Building => "Building",
            DeployStatus::Deploying => "Deploying",
            DeployStatus::Succeeded => "Succeeded",
            DeployStatus::Failed => "Failed",
            DeployStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DeployStatus {
    fn from(s: String) -> Self {
        DeployStatus::from_remote(&s)
    }
}

impl From<DeployStatus> for String {
    fn from(status: DeployStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Handle and last known status of a submitted deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResponse {
    /// Opaque handle assigned by the remote system.
    pub id: String,
    pub status: DeployStatus,
}

impl DeploymentResponse {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: DeployStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A trigger binding as declared in a function's own configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerBinding {
    #[serde(rename = "type")]
    pub trigger_type: String,
    pub name: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl TriggerBinding {
    pub fn new(trigger_type: &str, name: &str) -> Self {
        Self {
            trigger_type: trigger_type.to_string(),
            name: name.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    /// Builder-style metadata insert.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Read the trigger bindings out of a `function.json` document.
    ///
    /// Only bindings whose type ends in `Trigger` are event sources; input
    /// and output bindings are skipped. String-valued fields other than
    /// `type` and `name` become metadata, everything else is dropped.
    pub fn from_function_json(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        let doc: serde_json::Value = serde_json::from_str(json)?;
        let bindings = doc
            .get("bindings")
            .and_then(|b| b.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();

        Ok(bindings.iter().filter_map(Self::from_json_binding).collect())
    }

    fn from_json_binding(value: &serde_json::Value) -> Option<Self> {
        let fields = value.as_object()?;
        let trigger_type = fields.get("type")?.as_str()?;
        if !trigger_type.to_ascii_lowercase().ends_with("trigger") {
            return None;
        }
        let name = fields.get("name").and_then(|n| n.as_str()).unwrap_or_default();

        let metadata = fields
            .iter()
            .filter(|(key, _)| key.as_str() != "type" && key.as_str() != "name")
            .filter_map(|(key, v)| v.as_str().map(|s| (key.clone(), s.to_string())))
            .collect();

        Some(Self {
            trigger_type: trigger_type.to_string(),
            name: name.to_string(),
            metadata,
        })
    }
}

/// One autoscaler trigger entry, ready for the ScaledObject trigger list.
///
/// `metadata` is a `BTreeMap` so keys always serialize in lexicographic
/// order and manifests diff cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingTriggerDescriptor {
    #[serde(rename = "type")]
    pub trigger_type: String,
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "metadata")]
    pub metadata: BTreeMap<String, String>,
}
