//! fnscale.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::duration::parse_duration;
use crate::image::DEFAULT_REGISTRY;

/// Config file name looked up in the project root.
pub const CONFIG_FILE: &str = "fnscale.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration { field: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FnscaleConfig {
    pub app: AppConfig,
    pub image: Option<ImageConfig>,
    pub scaling: Option<ScalingConfig>,
    pub deploy: Option<DeployConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Registry used for references that do not name one.
    pub default_registry: Option<String>,
    pub repository: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Seconds between autoscaler checks of non-HTTP triggers.
    pub polling_interval: Option<u32>,
    /// Seconds before scaling back to zero once all triggers are idle.
    pub cooldown_period: Option<u32>,
    pub min_replicas: Option<u32>,
    pub max_replicas: Option<u32>,
    /// What to do with trigger types that have no schema: skip, warn, reject.
    pub unknown_triggers: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    pub timeout: Option<String>,
    pub poll_initial: Option<String>,
    pub poll_max: Option<String>,
}

impl FnscaleConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `fnscale.toml` from a project directory, if present.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Self::from_file(&path).map(Some)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn namespace(&self) -> &str {
        self.app.namespace.as_deref().unwrap_or("default")
    }

    pub fn default_registry(&self) -> &str {
        self.image
            .as_ref()
            .and_then(|i| i.default_registry.as_deref())
            .unwrap_or(DEFAULT_REGISTRY)
    }

    /// Overall deadline for a deployment to reach a terminal state.
    pub fn deploy_timeout(&self) -> Result<Duration, ConfigError> {
        let raw = self.deploy.as_ref().and_then(|d| d.timeout.as_deref());
        duration_field("deploy.timeout", raw, Duration::from_secs(600))
    }

    /// First poll delay and backoff cap.
    pub fn poll_bounds(&self) -> Result<(Duration, Duration), ConfigError> {
        let deploy = self.deploy.as_ref();
        let initial = duration_field(
            "deploy.poll_initial",
            deploy.and_then(|d| d.poll_initial.as_deref()),
            Duration::from_secs(1),
        )?;
        let max = duration_field(
            "deploy.poll_max",
            deploy.and_then(|d| d.poll_max.as_deref()),
            Duration::from_secs(15),
        )?;
        Ok((initial, max))
    }

    /// Scaffold a minimal fnscale.toml for the given app.
    pub fn scaffold(name: &str) -> Self {
        FnscaleConfig {
            app: AppConfig {
                name: name.to_string(),
                namespace: Some("default".to_string()),
            },
            image: Some(ImageConfig {
                default_registry: Some(DEFAULT_REGISTRY.to_string()),
                repository: Some(name.to_string()),
                tag: Some("latest".to_string()),
            }),
            scaling: Some(ScalingConfig {
                polling_interval: Some(30),
                cooldown_period: Some(300),
                min_replicas: Some(0),
                max_replicas: Some(10),
                unknown_triggers: Some("skip".to_string()),
            }),
            deploy: Some(DeployConfig {
                timeout: Some("10m".to_string()),
                poll_initial: Some("1s".to_string()),
                poll_max: Some("15s".to_string()),
            }),
        }
    }
}

fn duration_field(
    field: &'static str,
    raw: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
            field,
            value: value.to_string(),
        }),
    }
}
