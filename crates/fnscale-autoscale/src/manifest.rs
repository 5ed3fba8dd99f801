//! ScaledObject manifest — wraps composed trigger descriptors in the
//! autoscaler's custom resource.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use fnscale_core::ScalingTriggerDescriptor;
use fnscale_core::config::ScalingConfig;

use crate::error::{ManifestError, ManifestResult};

pub const API_VERSION: &str = "keda.sh/v1alpha1";
pub const KIND: &str = "ScaledObject";

const MAX_NAME_LEN: usize = 253;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9.-]+$").expect("valid regex"));

/// Replica bounds and timing for the ScaledObject spec.
///
/// Unset fields are left out of the manifest so the autoscaler applies its
/// own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalingOptions {
    pub polling_interval: Option<u32>,
    pub cooldown_period: Option<u32>,
    pub min_replicas: Option<u32>,
    pub max_replicas: Option<u32>,
}

impl ScalingOptions {
    pub fn validate(&self) -> ManifestResult<()> {
        if let (Some(min), Some(max)) = (self.min_replicas, self.max_replicas)
            && min > max
        {
            return Err(ManifestError::InvalidReplicaBounds { min, max });
        }
        Ok(())
    }
}

impl From<&ScalingConfig> for ScalingOptions {
    fn from(config: &ScalingConfig) -> Self {
        Self {
            polling_interval: config.polling_interval,
            cooldown_period: config.cooldown_period,
            min_replicas: config.min_replicas,
            max_replicas: config.max_replicas,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaledObject {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ScaledObjectSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaledObjectSpec {
    pub scale_target_ref: ScaleTargetRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polling_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_period: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_replica_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_replica_count: Option<u32>,
    pub triggers: Vec<ScalingTriggerDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleTargetRef {
    pub name: String,
}

impl ScaledObject {
    /// Build a ScaledObject named `name` that scales the deployment `target`.
    pub fn new(
        name: &str,
        namespace: Option<&str>,
        target: &str,
        options: &ScalingOptions,
        triggers: Vec<ScalingTriggerDescriptor>,
    ) -> ManifestResult<Self> {
        validate_resource_name(name)?;
        validate_resource_name(target)?;
        if let Some(ns) = namespace {
            validate_resource_name(ns)?;
        }
        options.validate()?;

        let labels = BTreeMap::from([
            ("app".to_string(), target.to_string()),
            ("app.kubernetes.io/managed-by".to_string(), "fnscale".to_string()),
        ]);

        Ok(Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: namespace.map(str::to_string),
                labels,
            },
            spec: ScaledObjectSpec {
                scale_target_ref: ScaleTargetRef {
                    name: target.to_string(),
                },
                polling_interval: options.polling_interval,
                cooldown_period: options.cooldown_period,
                min_replica_count: options.min_replicas,
                max_replica_count: options.max_replicas,
                triggers,
            },
        })
    }

    pub fn to_yaml(&self) -> ManifestResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> ManifestResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Resource names must be lowercase alphanumerics, `-` or `.`, at most
/// 253 characters.
pub fn validate_resource_name(name: &str) -> ManifestResult<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(ManifestError::InvalidName {
            name: name.to_string(),
            reason: format!("longer than {MAX_NAME_LEN} characters"),
        });
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(ManifestError::InvalidName {
            name: name.to_string(),
            reason: format!("must match {}", NAME_PATTERN.as_str()),
        });
    }
    Ok(())
}
