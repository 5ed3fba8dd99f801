//! Container image reference parsing.
//!
//! Normalizes user-supplied `registry/repository:tag` strings into an
//! [`ImageReference`] before anything is pushed. Registries reject bad
//! names at push time with opaque errors, so every check here runs before
//! any network cost is paid.
//!
//! ```text
//! myrepo                          → docker.io / myrepo         : latest
//! reg.example.com/app:v2          → reg.example.com / app      : v2
//! localhost:5000/team/api:1.0     → localhost:5000 / team/api  : 1.0
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Registry used when the reference does not name one.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Tag used when the reference does not name one.
pub const DEFAULT_TAG: &str = "latest";

const MAX_TAG_LEN: usize = 128;

/// Host aliases accepted as a registry even without a dot or port.
const REGISTRY_ALIASES: &[&str] = &["localhost"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("malformed image reference '{input}': {reason}")]
    MalformedImageReference { input: String, reason: String },
}

fn malformed(input: &str, reason: impl Into<String>) -> ImageError {
    ImageError::MalformedImageReference {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// A validated `{registry, repository, tag}` triple.
///
/// Immutable once constructed. Serializes as its canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageReference {
    registry: String,
    repository: String,
    tag: String,
}

impl ImageReference {
    /// Parse a raw reference against [`DEFAULT_REGISTRY`].
    pub fn parse(raw: &str) -> Result<Self, ImageError> {
        Self::parse_with_default(raw, DEFAULT_REGISTRY)
    }

    /// Parse a raw reference, filling in `default_registry` when the first
    /// path component does not look like a host.
    pub fn parse_with_default(raw: &str, default_registry: &str) -> Result<Self, ImageError> {
        if raw.is_empty() {
            return Err(malformed(raw, "reference is empty"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(malformed(raw, "reference contains whitespace"));
        }

        let (registry, remainder) = match raw.split_once('/') {
            Some((first, rest)) if looks_like_host(first) => (first, rest),
            _ => (default_registry, raw),
        };

        if remainder.matches(':').count() > 1 {
            return Err(malformed(raw, "more than one ':' outside the registry port"));
        }

        let (repository, tag) = match remainder.rsplit_once(':') {
            Some((_, "")) => return Err(malformed(raw, "tag is empty after ':'")),
            Some((repository, tag)) => (repository, tag),
            None => (remainder, DEFAULT_TAG),
        };

        check_registry(registry).map_err(|reason| malformed(raw, reason))?;
        check_repository(repository).map_err(|reason| malformed(raw, reason))?;
        check_tag(tag).map_err(|reason| malformed(raw, reason))?;

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Build a reference from its parts, applying the same rules as `parse`.
    pub fn new(registry: &str, repository: &str, tag: &str) -> Result<Self, ImageError> {
        let display = format!("{registry}/{repository}:{tag}");
        check_registry(registry).map_err(|reason| malformed(&display, reason))?;
        check_repository(repository).map_err(|reason| malformed(&display, reason))?;
        check_tag(tag).map_err(|reason| malformed(&display, reason))?;
        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Same image, different tag.
    pub fn with_tag(&self, tag: &str) -> Result<Self, ImageError> {
        Self::new(&self.registry, &self.repository, tag)
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

impl FromStr for ImageReference {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ImageReference {
    type Error = ImageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ImageReference> for String {
    fn from(image: ImageReference) -> Self {
        image.to_string()
    }
}

/// A leading path component names a registry when it contains a dot or a
/// port, or is a known alias.
fn looks_like_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || REGISTRY_ALIASES.contains(&component)
}

fn check_registry(registry: &str) -> Result<(), String> {
    if !looks_like_host(registry) {
        return Err(format!("registry '{registry}' does not look like a host"));
    }

    let (host, port) = match registry.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (registry, None),
    };

    if host.is_empty() {
        return Err("registry host is empty".to_string());
    }
    if let Some(c) = host
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
    {
        return Err(format!("registry host contains invalid character '{c}'"));
    }
    if let Some(port) = port
        && (port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(format!("registry port '{port}' is not numeric"));
    }

    Ok(())
}

fn check_repository(repository: &str) -> Result<(), String> {
    if repository.is_empty() {
        return Err("repository is empty".to_string());
    }
    if let Some(c) = repository.chars().find(|c| {
        !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '/' | '_' | '.' | '-'))
    }) {
        return Err(format!("repository contains invalid character '{c}'"));
    }
    if repository.split('/').any(str::is_empty) {
        return Err("repository has an empty path component".to_string());
    }
    Ok(())
}

fn check_tag(tag: &str) -> Result<(), String> {
    if tag.is_empty() {
        return Err("tag is empty".to_string());
    }
    if tag.len() > MAX_TAG_LEN {
        return Err(format!("tag is longer than {MAX_TAG_LEN} characters"));
    }
    if tag.starts_with(['.', '-']) {
        return Err("tag must not start with '.' or '-'".to_string());
    }
    if let Some(c) = tag
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(format!("tag contains invalid character '{c}'"));
    }
    Ok(())
}
