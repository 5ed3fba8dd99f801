//! fnscale-autoscale — autoscaler trigger manifests for function apps.
//!
//! Turns the trigger bindings a function app declares into the trigger list
//! of an event-driven autoscaler `ScaledObject`.
//!
//! # Components
//!
//! - **`schema`** — read-only registry of per-trigger-type metadata schemas
//! - **`composer`** — validates bindings against their schema and emits one
//!   `ScalingTriggerDescriptor` per eligible binding
//! - **`manifest`** — wraps descriptors in a `ScaledObject` and renders it
//!
//! # Composition rules
//!
//! ```text
//! schema = registry.lookup(binding.type)
//!
//! if schema is None:
//!     exclude binding            // policy: skip | warn | reject
//! elif some required key missing or some supplied key invalid:
//!     TriggerValidationFailed(all violations of this binding)
//! elif schema.scaler is None:
//!     exclude binding            // e.g. http: valid, never autoscaled
//! else:
//!     emit {type: schema.scaler, name, metadata: required ∪ supplied optional}
//! ```
//!
//! Metadata keys are kept sorted, so composing the same bindings twice
//! yields byte-identical manifests.

pub mod composer;
pub mod error;
pub mod manifest;
pub mod schema;

pub use composer::{BindingOutcome, Composition, ManifestComposer, UnknownTriggerPolicy};
pub use error::{ComposeError, ManifestError, ManifestResult, Violation, ViolationKind};
pub use manifest::{ScaledObject, ScalingOptions};
pub use schema::{SchemaRegistry, TriggerSchema, Validator};
