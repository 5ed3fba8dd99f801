//! Boundary to the registry/orchestrator.
//!
//! The tracker never performs network I/O itself; callers inject a
//! transport that does.

use std::future::Future;

use fnscale_core::{DeployStatus, ImageReference, ScalingTriggerDescriptor};

/// Remote operations the deployment lifecycle depends on.
pub trait DeployTransport: Send + Sync {
    /// Build/push the image and start a deployment. Returns the remote
    /// system's opaque deployment handle.
    fn push_image(
        &self,
        image: &ImageReference,
    ) -> impl Future<Output = anyhow::Result<String>> + Send;

    /// Current status of a deployment.
    fn fetch_status(
        &self,
        deployment_id: &str,
    ) -> impl Future<Output = anyhow::Result<DeployStatus>> + Send;

    /// Apply autoscaler trigger descriptors to the cluster.
    fn apply_manifests(
        &self,
        manifests: &[ScalingTriggerDescriptor],
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}
