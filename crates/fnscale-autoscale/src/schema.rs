//! Trigger metadata schemas.
//!
//! Maps a trigger type to the metadata keys its autoscaler scaler needs and
//! the constraints on their values. The builtin registry is built once and
//! never mutated, so it is read from any number of threads without locks.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::LazyLock;

use fnscale_core::parse_duration;

/// Constraint on a single metadata value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
    /// Value must contain a non-whitespace character.
    NonEmpty,
    /// Value must parse as a non-negative integer.
    Integer,
    /// Value must parse as a duration ("30s", "5m").
    Duration,
    /// Value must be a 5- or 6-field cron expression.
    Cron,
    /// Value must be one of the listed options (case-sensitive).
    OneOf(Vec<String>),
}

impl Validator {
    pub fn one_of(options: &[&str]) -> Self {
        Validator::OneOf(options.iter().map(|o| o.to_string()).collect())
    }

    /// Check a value, returning a human-readable reason on failure.
    pub fn check(&self, value: &str) -> Result<(), String> {
        match self {
            Validator::NonEmpty => {
                if value.trim().is_empty() {
                    Err("must not be empty".to_string())
                } else {
                    Ok(())
                }
            }
            Validator::Integer => value
                .trim()
                .parse::<u64>()
                .map(|_| ())
                .map_err(|_| "expected a non-negative integer".to_string()),
            Validator::Duration => parse_duration(value)
                .map(|_| ())
                .ok_or_else(|| "expected a duration like 30s or 5m".to_string()),
            Validator::Cron => check_cron(value),
            Validator::OneOf(options) => {
                if options.iter().any(|o| o == value) {
                    Ok(())
                } else {
                    Err(format!("expected one of: {}", options.join(", ")))
                }
            }
        }
    }
}

/// Metadata schema for one trigger type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSchema {
    /// Canonical trigger type, e.g. `queue`.
    pub trigger_type: String,
    /// Autoscaler scaler the trigger maps to, e.g. `azure-queue`. `None`
    /// for triggers that are validated but never autoscaled.
    pub scaler: Option<String>,
    pub required_keys: BTreeSet<String>,
    pub optional_keys: BTreeSet<String>,
    pub validators: BTreeMap<String, Validator>,
}

impl TriggerSchema {
    pub fn new(trigger_type: &str, scaler: &str) -> Self {
        Self {
            scaler: Some(scaler.to_string()),
            ..Self::unscaled(trigger_type)
        }
    }

    /// A schema with no autoscaler scaler.
    pub fn unscaled(trigger_type: &str) -> Self {
        Self {
            trigger_type: trigger_type.to_string(),
            scaler: None,
            required_keys: BTreeSet::new(),
            optional_keys: BTreeSet::new(),
            validators: BTreeMap::new(),
        }
    }

    /// Add a required key.
    pub fn require(mut self, key: &str, validator: Validator) -> Self {
        self.required_keys.insert(key.to_string());
        self.validators.insert(key.to_string(), validator);
        self
    }

    /// Add an optional key.
    pub fn optional(mut self, key: &str, validator: Validator) -> Self {
        self.optional_keys.insert(key.to_string());
        self.validators.insert(key.to_string(), validator);
        self
    }

    pub fn is_autoscaled(&self) -> bool {
        self.scaler.is_some()
    }

    pub fn validator(&self, key: &str) -> Option<&Validator> {
        self.validators.get(key)
    }

    pub fn is_known_key(&self, key: &str) -> bool {
        self.required_keys.contains(key) || self.optional_keys.contains(key)
    }
}

/// Read-only table of trigger schemas keyed by normalized trigger type.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, TriggerSchema>,
}

static BUILTIN: LazyLock<SchemaRegistry> = LazyLock::new(SchemaRegistry::with_builtin_schemas);

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide builtin registry.
    pub fn builtin() -> &'static SchemaRegistry {
        &BUILTIN
    }

    /// Register a schema, replacing any existing one for the same type.
    pub fn with_schema(mut self, schema: TriggerSchema) -> Self {
        self.schemas
            .insert(normalize_trigger_type(&schema.trigger_type), schema);
        self
    }

    /// Look up the schema for a trigger type.
    ///
    /// Matching ignores case and a trailing `Trigger`, so `queue`,
    /// `queueTrigger` and `QueueTrigger` all resolve to the same schema.
    /// `None` means the type is not autoscale-eligible; what to do about
    /// that is the caller's policy.
    pub fn lookup(&self, trigger_type: &str) -> Option<&TriggerSchema> {
        self.schemas.get(&normalize_trigger_type(trigger_type))
    }

    /// Registered trigger types, sorted.
    pub fn trigger_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self
            .schemas
            .values()
            .map(|s| s.trigger_type.as_str())
            .collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    fn with_builtin_schemas() -> Self {
        use Validator::*;

        const CLOUDS: &[&str] = &[
            "AzurePublicCloud",
            "AzureUSGovernmentCloud",
            "AzureChinaCloud",
            "AzureGermanCloud",
            "Private",
        ];

        Self::new()
            .with_schema(
                // The autoscaler has no http scaler.
                TriggerSchema::unscaled("http")
                    .optional("route", NonEmpty)
                    .optional("authLevel", Validator::one_of(&["anonymous", "function", "admin"]))
                    .optional("targetPendingRequests", Integer)
                    .optional("scaledownPeriod", Duration),
            )
            .with_schema(
                TriggerSchema::new("queue", "azure-queue")
                    .require("connection", NonEmpty)
                    .require("queueName", NonEmpty)
                    .optional("queueLength", Integer)
                    .optional("activationQueueLength", Integer)
                    .optional("accountName", NonEmpty)
                    .optional("cloud", Validator::one_of(CLOUDS)),
            )
            .with_schema(
                TriggerSchema::new("blob", "azure-blob")
                    .require("connection", NonEmpty)
                    .require("path", NonEmpty)
                    .optional("blobCount", Integer)
                    .optional("blobPrefix", NonEmpty)
                    .optional("blobDelimiter", NonEmpty)
                    .optional("cloud", Validator::one_of(CLOUDS)),
            )
            .with_schema(
                TriggerSchema::new("timer", "cron")
                    .require("schedule", Cron)
                    .optional("timezone", NonEmpty)
                    .optional("desiredReplicas", Integer),
            )
            .with_schema(
                TriggerSchema::new("eventHub", "azure-eventhub")
                    .require("connection", NonEmpty)
                    .require("eventHubName", NonEmpty)
                    .optional("consumerGroup", NonEmpty)
                    .optional("storageConnection", NonEmpty)
                    .optional("unprocessedEventThreshold", Integer)
                    .optional("activationUnprocessedEventThreshold", Integer)
                    .optional(
                        "checkpointStrategy",
                        Validator::one_of(&["azureFunction", "blobMetadata", "goSdk", "dapr"]),
                    ),
            )
            .with_schema(
                TriggerSchema::new("serviceBus", "azure-servicebus")
                    .require("connection", NonEmpty)
                    .optional("queueName", NonEmpty)
                    .optional("topicName", NonEmpty)
                    .optional("subscriptionName", NonEmpty)
                    .optional("messageCount", Integer)
                    .optional("activationMessageCount", Integer),
            )
            .with_schema(
                TriggerSchema::new("kafka", "kafka")
                    .require("brokerList", NonEmpty)
                    .require("topic", NonEmpty)
                    .require("consumerGroup", NonEmpty)
                    .optional("lagThreshold", Integer)
                    .optional("offsetResetPolicy", Validator::one_of(&["earliest", "latest"])),
            )
            .with_schema(
                TriggerSchema::new("rabbitMQ", "rabbitmq")
                    .require("connectionStringSetting", NonEmpty)
                    .require("queueName", NonEmpty)
                    .optional("mode", Validator::one_of(&["QueueLength", "MessageRate"]))
                    .optional("value", Integer),
            )
    }
}

/// Lowercase and strip a trailing `trigger` (unless that is all there is).
pub fn normalize_trigger_type(trigger_type: &str) -> String {
    let lower = trigger_type.trim().to_ascii_lowercase();
    match lower.strip_suffix("trigger") {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => lower,
    }
}

impl fmt::Display for TriggerSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scaler {
            Some(scaler) => write!(f, "{} -> {scaler}", self.trigger_type),
            None => write!(f, "{} (not autoscaled)", self.trigger_type),
        }
    }
}

fn check_cron(expr: &str) -> Result<(), String> {
    const FIVE: &[(&str, u32, u32)] = &[
        ("minute", 0, 59),
        ("hour", 0, 23),
        ("day-of-month", 1, 31),
        ("month", 1, 12),
        ("day-of-week", 0, 7),
    ];
    const SIX: &[(&str, u32, u32)] = &[
        ("second", 0, 59),
        ("minute", 0, 59),
        ("hour", 0, 23),
        ("day-of-month", 1, 31),
        ("month", 1, 12),
        ("day-of-week", 0, 7),
    ];

    let fields: Vec<&str> = expr.split_whitespace().collect();
    let bounds = match fields.len() {
        5 => FIVE,
        6 => SIX,
        n => return Err(format!("expected 5 or 6 cron fields, found {n}")),
    };

    for (field, (label, lo, hi)) in fields.iter().zip(bounds) {
        check_cron_field(field, *lo, *hi).map_err(|e| format!("{label} field '{field}': {e}"))?;
    }
    Ok(())
}

fn check_cron_field(field: &str, lo: u32, hi: u32) -> Result<(), String> {
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (item, None),
        };

        if let Some(step) = step {
            match step.parse::<u32>() {
                Ok(0) => return Err("step must be positive".to_string()),
                Ok(_) => {}
                Err(_) => return Err(format!("invalid step '{step}'")),
            }
        }

        if range == "*" {
            continue;
        }

        let (start, end) = range.split_once('-').unwrap_or((range, range));
        let start = cron_value(start, lo, hi)?;
        let end = cron_value(end, lo, hi)?;
        if start > end {
            return Err(format!("range {start}-{end} is reversed"));
        }
    }
    Ok(())
}

fn cron_value(s: &str, lo: u32, hi: u32) -> Result<u32, String> {
    let v: u32 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if v < lo || v > hi {
        return Err(format!("{v} is outside {lo}-{hi}"));
    }
    Ok(v)
}
