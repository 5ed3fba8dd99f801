//! fnscale deployment lifecycle — submit, poll, await a terminal state.
//!
//! This crate owns the state machine of a single remote deployment and
//! the pipeline that applies autoscaler triggers once it is live.
//!
//! ```text
//! Pending ──► Building ──► Deploying ──► Succeeded
//!    │            │            │
//!    └────────────┴────────────┴──────► Failed
//!
//! any poll error or unrecognized remote status ──► Unknown (not terminal)
//! ```
//!
//! # Components
//!
//! - **`transport`** — injected boundary to the registry/orchestrator
//! - **`backoff`** — poll cadence (fixed or exponential, 1s → 15s)
//! - **`tracker`** — submit, poll, await terminal with timeout and cancellation
//! - **`pipeline`** — submit → await → compose → apply

pub mod backoff;
pub mod error;
pub mod pipeline;
pub mod tracker;
pub mod transport;

pub use backoff::{AwaitOptions, PollInterval, PollSchedule};
pub use error::{DeployError, DeployResult};
pub use pipeline::{DeployPipeline, DeployReport};
pub use tracker::DeploymentTracker;
pub use transport::DeployTransport;
