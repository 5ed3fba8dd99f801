//! End-to-end deploy: submit the image, wait for the deployment to
//! finish, then compose and apply the autoscaler triggers.

use tokio::sync::watch;
use tracing::{info, warn};

use fnscale_autoscale::{Composition, ManifestComposer};
use fnscale_core::{DeployStatus, DeploymentResponse, ImageReference, TriggerBinding};

use crate::backoff::AwaitOptions;
use crate::error::{DeployError, DeployResult};
use crate::tracker::DeploymentTracker;
use crate::transport::DeployTransport;

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub deployment: DeploymentResponse,
    pub composition: Composition,
    /// Number of trigger descriptors handed to the transport.
    pub applied: usize,
}

/// Runs one deployment from image to applied autoscaler triggers.
pub struct DeployPipeline<'r, T> {
    tracker: DeploymentTracker<T>,
    composer: ManifestComposer<'r>,
    options: AwaitOptions,
    allow_partial: bool,
}

impl<'r, T: DeployTransport> DeployPipeline<'r, T> {
    pub fn new(transport: T, composer: ManifestComposer<'r>) -> Self {
        Self {
            tracker: DeploymentTracker::new(transport),
            composer,
            options: AwaitOptions::default(),
            allow_partial: false,
        }
    }

    pub fn with_options(mut self, options: AwaitOptions) -> Self {
        self.options = options;
        self
    }

    /// Apply the valid triggers even when some bindings failed validation.
    pub fn allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    pub fn tracker(&self) -> &DeploymentTracker<T> {
        &self.tracker
    }

    pub async fn run(
        &self,
        image: &ImageReference,
        bindings: &[TriggerBinding],
        cancel: watch::Receiver<bool>,
    ) -> DeployResult<DeployReport> {
        let mut deployment = self.tracker.submit(image).await?;

        deployment.status = self
            .tracker
            .await_terminal_with_cancel(&deployment.id, &self.options, cancel)
            .await?;

        if deployment.status == DeployStatus::Failed {
            return Err(DeployError::DeploymentFailed { id: deployment.id });
        }

        let composition = self.composer.compose(bindings);
        if !composition.is_clean() {
            if !self.allow_partial {
                return Err(DeployError::Composition(composition.errors));
            }
            for error in &composition.errors {
                warn!(deployment = %deployment.id, %error, "skipping invalid trigger");
            }
        }

        let applied = composition.descriptors.len();
        if applied == 0 {
            info!(deployment = %deployment.id, "no autoscale-eligible triggers, nothing to apply");
        } else {
            self.tracker
                .transport()
                .apply_manifests(&composition.descriptors)
                .await
                .map_err(|e| DeployError::ApplyFailed {
                    diagnostic: format!("{e:#}"),
                })?;
            info!(
                deployment = %deployment.id,
                triggers = applied,
                digest = %composition.digest(),
                "autoscaler triggers applied"
            );
        }

        Ok(DeployReport {
            deployment,
            composition,
            applied,
        })
    }
}
