//! Deployment lifecycle tracker — drives one remote deployment to a
//! terminal state.
//!
//! The tracker submits through the injected transport, then polls status
//! with backoff until the deployment succeeds or fails, the deadline
//! passes, or the caller cancels. A failed poll is never fatal: it reads
//! as `Unknown` and the next poll decides.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use fnscale_core::{DeployStatus, DeploymentResponse, ImageReference};

use crate::backoff::AwaitOptions;
use crate::error::{DeployError, DeployResult};
use crate::transport::DeployTransport;

/// Tracks the lifecycle of deployments submitted through `T`.
pub struct DeploymentTracker<T> {
    transport: T,
}

impl<T: DeployTransport> DeploymentTracker<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submit a deployment of `image`.
    ///
    /// Fails with `SubmissionFailed` when the remote system rejects the
    /// request outright or hands back an empty deployment handle.
    pub async fn submit(&self, image: &ImageReference) -> DeployResult<DeploymentResponse> {
        info!(%image, "submitting deployment");

        let id = self
            .transport
            .push_image(image)
            .await
            .map_err(|e| DeployError::SubmissionFailed {
                image: image.to_string(),
                diagnostic: format!("{e:#}"),
            })?;

        if id.trim().is_empty() {
            return Err(DeployError::SubmissionFailed {
                image: image.to_string(),
                diagnostic: "remote system returned an empty deployment handle".to_string(),
            });
        }

        info!(%image, deployment = %id, "deployment submitted");
        Ok(DeploymentResponse::new(id))
    }

    /// Fetch the current status of a deployment.
    ///
    /// Transport errors yield `Unknown` instead of an error: the deployment
    /// is indeterminate, not failed, and callers must keep polling.
    pub async fn poll(&self, id: &str) -> DeployStatus {
        match self.transport.fetch_status(id).await {
            Ok(DeployStatus::Unknown) => {
                debug!(deployment = %id, "remote reported an unrecognized status");
                DeployStatus::Unknown
            }
            Ok(status) => status,
            Err(e) => {
                warn!(
                    deployment = %id,
                    error = %e,
                    "status poll failed, deployment state is indeterminate"
                );
                DeployStatus::Unknown
            }
        }
    }

    /// Re-fetch the status of `deployment` and store it.
    pub async fn refresh(&self, deployment: &mut DeploymentResponse) -> DeployStatus {
        deployment.status = self.poll(&deployment.id).await;
        deployment.status
    }

    /// Poll until the deployment reaches a terminal state or
    /// `options.timeout` elapses.
    pub async fn await_terminal(
        &self,
        id: &str,
        options: &AwaitOptions,
    ) -> DeployResult<DeployStatus> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.await_terminal_with_cancel(id, options, cancel_rx).await
    }

    /// Like [`await_terminal`](Self::await_terminal), but stops as soon as
    /// `cancel` flips to `true`, returning `Cancelled` with the last status
    /// seen. Dropping the sender never cancels.
    pub async fn await_terminal_with_cancel(
        &self,
        id: &str,
        options: &AwaitOptions,
        mut cancel: watch::Receiver<bool>,
    ) -> DeployResult<DeployStatus> {
        let deadline = deadline_after(Instant::now(), options.timeout);
        let mut schedule = options.interval.schedule();
        let mut last_status = DeployStatus::Pending;
        let mut polls: u32 = 0;

        info!(
            deployment = %id,
            timeout_secs = options.timeout.as_secs(),
            "waiting for deployment to finish"
        );

        loop {
            let status = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    return Err(self.cancelled_error(id, last_status));
                }
                _ = sleep_until(deadline) => {
                    return Err(self.timed_out_error(id, last_status, polls));
                }
                status = self.poll(id) => status,
            };
            polls += 1;

            if status != last_status {
                debug!(
                    deployment = %id,
                    from = %last_status,
                    to = %status,
                    polls,
                    "deployment status changed"
                );
            }
            last_status = status;

            if status.is_terminal() {
                info!(deployment = %id, %status, polls, "deployment finished");
                return Ok(status);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out_error(id, last_status, polls));
            }
            let wake = now
                .checked_add(schedule.next_delay())
                .map_or(deadline, |wake| wake.min(deadline));

            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    return Err(self.cancelled_error(id, last_status));
                }
                _ = sleep_until(wake) => {}
            }
        }
    }

    fn cancelled_error(&self, id: &str, last_status: DeployStatus) -> DeployError {
        info!(deployment = %id, %last_status, "stopped waiting for deployment: cancelled");
        DeployError::Cancelled {
            id: id.to_string(),
            last_status,
        }
    }

    fn timed_out_error(&self, id: &str, last_status: DeployStatus, polls: u32) -> DeployError {
        warn!(deployment = %id, %last_status, polls, "deployment timed out");
        DeployError::DeploymentTimedOut {
            id: id.to_string(),
            last_status,
            polls,
        }
    }
}

/// `now + timeout`, or roughly thirty years out when that overflows.
fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}

/// Resolves once the watched value is `true`. Never resolves if the
/// sender is dropped first.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use fnscale_core::ScalingTriggerDescriptor;

    use crate::backoff::PollInterval;

    /// Replays a fixed sequence of poll results.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<DeployStatus, String>>>,
        repeat: Option<DeployStatus>,
        push: Result<String, String>,
        polls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<DeployStatus, String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                repeat: None,
                push: Ok("dep-1".to_string()),
                polls: AtomicU32::new(0),
            }
        }

        fn statuses(statuses: &[DeployStatus]) -> Self {
            Self::new(statuses.iter().copied().map(Ok).collect())
        }

        fn repeating(status: DeployStatus) -> Self {
            Self {
                repeat: Some(status),
                ..Self::new(vec![])
            }
        }

        fn polls(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    impl DeployTransport for ScriptedTransport {
        async fn push_image(&self, _image: &ImageReference) -> anyhow::Result<String> {
            self.push.clone().map_err(anyhow::Error::msg)
        }

        async fn fetch_status(&self, _deployment_id: &str) -> anyhow::Result<DeployStatus> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(status)) => Ok(status),
                Some(Err(e)) => Err(anyhow::anyhow!(e)),
                None => self.repeat.ok_or_else(|| anyhow::anyhow!("script exhausted")),
            }
        }

        async fn apply_manifests(&self, _manifests: &[ScalingTriggerDescriptor]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// A transport whose status call never returns.
    struct HangingTransport;

    impl DeployTransport for HangingTransport {
        async fn push_image(&self, _image: &ImageReference) -> anyhow::Result<String> {
            Ok("dep-hang".to_string())
        }

        async fn fetch_status(&self, _deployment_id: &str) -> anyhow::Result<DeployStatus> {
            std::future::pending::<()>().await;
            Ok(DeployStatus::Unknown)
        }

        async fn apply_manifests(&self, _manifests: &[ScalingTriggerDescriptor]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn image() -> ImageReference {
        ImageReference::parse("reg.example.com/app:v2").unwrap()
    }

    #[tokio::test]
    async fn submit_returns_pending_response() {
        let tracker = DeploymentTracker::new(ScriptedTransport::new(vec![]));
        let response = tracker.submit(&image()).await.unwrap();
        assert_eq!(response.id, "dep-1");
        assert_eq!(response.status, DeployStatus::Pending);
    }

    #[tokio::test]
    async fn submit_rejection_carries_diagnostic() {
        let transport = ScriptedTransport {
            push: Err("quota exceeded".to_string()),
            ..ScriptedTransport::new(vec![])
        };
        let tracker = DeploymentTracker::new(transport);

        match tracker.submit(&image()).await.unwrap_err() {
            DeployError::SubmissionFailed { image, diagnostic } => {
                assert_eq!(image, "reg.example.com/app:v2");
                assert_eq!(diagnostic, "quota exceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn submit_rejects_empty_handle() {
        let transport = ScriptedTransport {
            push: Ok("  ".to_string()),
            ..ScriptedTransport::new(vec![])
        };
        let err = DeploymentTracker::new(transport).submit(&image()).await.unwrap_err();
        assert!(matches!(err, DeployError::SubmissionFailed { .. }));
    }

    #[tokio::test]
    async fn poll_degrades_transport_error_to_unknown() {
        let tracker = DeploymentTracker::new(ScriptedTransport::new(vec![
            Err("connection reset".to_string()),
            Ok(DeployStatus::Building),
        ]));
        assert_eq!(tracker.poll("dep-1").await, DeployStatus::Unknown);
        assert_eq!(tracker.poll("dep-1").await, DeployStatus::Building);
    }

    #[tokio::test]
    async fn refresh_updates_response() {
        let tracker = DeploymentTracker::new(ScriptedTransport::statuses(&[DeployStatus::Deploying]));
        let mut response = DeploymentResponse::new("dep-1");
        assert_eq!(tracker.refresh(&mut response).await, DeployStatus::Deploying);
        assert_eq!(response.status, DeployStatus::Deploying);
    }

    #[tokio::test(start_paused = true)]
    async fn await_terminal_stops_at_first_terminal_status() {
        let tracker = DeploymentTracker::new(ScriptedTransport::statuses(&[
            DeployStatus::Pending,
            DeployStatus::Building,
            DeployStatus::Deploying,
            DeployStatus::Succeeded,
        ]));

        let status = tracker
            .await_terminal("dep-1", &AwaitOptions::default())
            .await
            .unwrap();

        assert_eq!(status, DeployStatus::Succeeded);
        assert_eq!(tracker.transport().polls(), 4);

        // Nothing keeps polling in the background.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(tracker.transport().polls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn await_terminal_uses_backoff_between_polls() {
        let tracker = DeploymentTracker::new(ScriptedTransport::statuses(&[
            DeployStatus::Pending,
            DeployStatus::Building,
            DeployStatus::Deploying,
            DeployStatus::Failed,
        ]));

        let start = Instant::now();
        let status = tracker
            .await_terminal("dep-1", &AwaitOptions::default())
            .await
            .unwrap();

        assert_eq!(status, DeployStatus::Failed);
        // Polls at t=0, 1, 3, 7.
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn await_terminal_times_out_with_last_status() {
        let tracker = DeploymentTracker::new(ScriptedTransport::repeating(DeployStatus::Building));
        let options = AwaitOptions {
            timeout: Duration::from_secs(10),
            interval: PollInterval::Fixed(Duration::from_secs(3)),
        };

        match tracker.await_terminal("dep-1", &options).await.unwrap_err() {
            DeployError::DeploymentTimedOut {
                id,
                last_status,
                polls,
            } => {
                assert_eq!(id, "dep-1");
                assert_eq!(last_status, DeployStatus::Building);
                assert_eq!(polls, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_timeout_from_config_still_polls() {
        let config = fnscale_core::FnscaleConfig::from_toml_str(
            "[app]\nname = \"api\"\n\n[deploy]\ntimeout = \"18446744073709551615s\"\n",
        )
        .unwrap();
        let options = AwaitOptions::from_config(&config).unwrap();
        let tracker = DeploymentTracker::new(ScriptedTransport::statuses(&[
            DeployStatus::Building,
            DeployStatus::Succeeded,
        ]));

        let status = tracker.await_terminal("dep-1", &options).await.unwrap();
        assert_eq!(status, DeployStatus::Succeeded);
        assert_eq!(tracker.transport().polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_poll_interval_is_capped_by_deadline() {
        let tracker = DeploymentTracker::new(ScriptedTransport::repeating(DeployStatus::Building));
        let options = AwaitOptions {
            timeout: Duration::from_secs(10),
            interval: PollInterval::Fixed(Duration::MAX),
        };

        let start = Instant::now();
        let err = tracker.await_terminal("dep-1", &options).await.unwrap_err();
        assert!(matches!(err, DeployError::DeploymentTimedOut { polls: 1, .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_do_not_abort_waiting() {
        let tracker = DeploymentTracker::new(ScriptedTransport::new(vec![
            Err("503".to_string()),
            Ok(DeployStatus::Deploying),
            Err("timeout".to_string()),
            Ok(DeployStatus::Succeeded),
        ]));

        let status = tracker
            .await_terminal("dep-1", &AwaitOptions::default())
            .await
            .unwrap();
        assert_eq!(status, DeployStatus::Succeeded);
        assert_eq!(tracker.transport().polls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_returns_last_known_status() {
        let tracker = DeploymentTracker::new(ScriptedTransport::repeating(DeployStatus::Deploying));
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            let _ = tx.send(true);
        });

        let err = tracker
            .await_terminal_with_cancel("dep-1", &AwaitOptions::default(), rx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeployError::Cancelled {
                last_status: DeployStatus::Deploying,
                ..
            }
        ));
        assert_eq!(err.last_status(), Some(DeployStatus::Deploying));
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_does_not_poll() {
        let tracker = DeploymentTracker::new(ScriptedTransport::repeating(DeployStatus::Deploying));
        let (_tx, rx) = watch::channel(true);

        let err = tracker
            .await_terminal_with_cancel("dep-1", &AwaitOptions::default(), rx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeployError::Cancelled {
                last_status: DeployStatus::Pending,
                ..
            }
        ));
        assert_eq!(tracker.transport().polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_cancel_sender_does_not_cancel() {
        let tracker = DeploymentTracker::new(ScriptedTransport::statuses(&[
            DeployStatus::Building,
            DeployStatus::Succeeded,
        ]));
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let status = tracker
            .await_terminal_with_cancel("dep-1", &AwaitOptions::default(), rx)
            .await
            .unwrap();
        assert_eq!(status, DeployStatus::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_poll_is_bounded_by_deadline() {
        let tracker = DeploymentTracker::new(HangingTransport);
        let options = AwaitOptions {
            timeout: Duration::from_secs(30),
            ..Default::default()
        };

        let err = tracker.await_terminal("dep-hang", &options).await.unwrap_err();
        assert!(matches!(
            err,
            DeployError::DeploymentTimedOut {
                last_status: DeployStatus::Pending,
                polls: 0,
                ..
            }
        ));
    }
}
