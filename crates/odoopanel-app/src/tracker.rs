//! Observation of one remote job from its begin call to a terminal state.
//!
//! The poll loop is fixed-delay: sleep, fetch, classify, apply. Every state
//! change goes through [`JobRegistry::commit`] with the tracker's generation, so
//! a fetch that resolves after a cancel or release is dropped on the floor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use odoopanel_core::classify::{Classifier, JobStatus, TerminalReason};
use odoopanel_core::job::{SlotKey, TrackingPlan};
use odoopanel_core::models::{LogSnapshot, StartAccepted};
use odoopanel_core::time::job_started_at;
use serde::Serialize;
use tokio::sync::{Notify, watch};
use tracing::{debug, info, warn};

use crate::JobError;
use crate::registry::{JobRegistry, SharedState};
use crate::remote::RemoteError;

pub type PollFn =
    Arc<dyn Fn() -> BoxFuture<'static, Result<LogSnapshot, RemoteError>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TrackerPhase {
    #[default]
    Idle,
    Initiating,
    Polling,
    Succeeded,
    Failed,
    Closed,
}

impl TrackerPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initiating => "initiating",
            Self::Polling => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TrackerState {
    pub phase: TrackerPhase,
    /// Latest full snapshot.
    pub raw_log: String,
    pub terminal_reason: Option<TerminalReason>,
    /// Message returned by the begin call.
    pub message: Option<String>,
    pub polls: u32,
    pub transient_failures: u32,
    pub last_error: Option<String>,
    pub started_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Running,
    Succeeded,
    Failed,
    /// The tracker no longer owns its lane; the fetched snapshot was discarded.
    Stale,
}

/// Exclusive right to run one job in a lane, handed out by [`JobRegistry::acquire`].
/// Dropping it before a terminal state releases the lane.
pub struct OperationTracker {
    registry: JobRegistry,
    slot: SlotKey,
    generation: u64,
    state: SharedState,
    cancel: Arc<Notify>,
}

impl OperationTracker {
    pub(crate) fn new(
        registry: JobRegistry,
        slot: SlotKey,
        generation: u64,
        state: SharedState,
        cancel: Arc<Notify>,
    ) -> Self {
        Self {
            registry,
            slot,
            generation,
            state,
            cancel,
        }
    }

    pub fn slot(&self) -> &SlotKey {
        &self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> TrackerState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerState> {
        self.state.subscribe()
    }

    /// Issues the begin call and, once accepted, follows the job according to `plan`.
    pub async fn start<F>(
        self,
        begin: F,
        poll_fn: PollFn,
        plan: TrackingPlan,
    ) -> Result<TrackerHandle, JobError>
    where
        F: Future<Output = Result<StartAccepted, RemoteError>>,
    {
        self.registry.commit(&self.slot, self.generation, |state| {
            state.phase = TrackerPhase::Initiating;
            state.started_at = Some(job_started_at());
        });
        info!(slot = %self.slot, "starting remote job");

        let accepted = match begin.await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(slot = %self.slot, %error, "remote job was not accepted");
                self.registry
                    .release_generation(&self.slot, self.generation);
                self.state.send_modify(|state| {
                    state.phase = TrackerPhase::Closed;
                    state.last_error = Some(error.to_string());
                });
                return Err(JobError::from(error));
            }
        };

        let handle = self.handle();

        match plan {
            TrackingPlan::Immediate => {
                let reason = TerminalReason {
                    sentinel: accepted
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("{} accepted", self.slot.kind)),
                    remediation: accepted.warning.clone(),
                };
                let applied = self.registry.commit(&self.slot, self.generation, |state| {
                    state.phase = TrackerPhase::Succeeded;
                    state.message = accepted.message;
                    state.terminal_reason = Some(reason);
                });
                if applied {
                    info!(slot = %self.slot, "remote job completed");
                } else {
                    self.close();
                }
            }
            TrackingPlan::Polled {
                interval,
                classifier,
                success_grace,
            } => {
                let applied = self.registry.commit(&self.slot, self.generation, |state| {
                    state.phase = TrackerPhase::Polling;
                    state.message = accepted.message;
                });
                if applied {
                    tokio::spawn(run_poll_loop(
                        self,
                        poll_fn,
                        interval,
                        classifier,
                        success_grace,
                    ));
                } else {
                    self.close();
                }
            }
        }

        Ok(handle)
    }

    /// One fetch-classify-apply step. The fetch runs without the registry lock.
    pub async fn poll_once(&self, poll_fn: &PollFn, classifier: &Classifier) -> PollOutcome {
        let snapshot = match poll_fn().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                let message = error.to_string();
                let applied = self.registry.commit(&self.slot, self.generation, |state| {
                    state.transient_failures += 1;
                    state.last_error = Some(message);
                });
                if !applied {
                    return PollOutcome::Stale;
                }
                warn!(slot = %self.slot, %error, "log poll failed; retrying on next tick");
                return PollOutcome::Running;
            }
        };

        if !snapshot.exists {
            let applied = self
                .registry
                .commit(&self.slot, self.generation, |state| state.polls += 1);
            debug!(slot = %self.slot, "remote log not written yet");
            return if applied {
                PollOutcome::Running
            } else {
                PollOutcome::Stale
            };
        }

        let classification = classifier.classify(&snapshot.log);
        let status = classification.status;
        let applied = self.registry.commit(&self.slot, self.generation, |state| {
            state.polls += 1;
            state.raw_log = snapshot.log;
            state.last_error = None;
            match classification.status {
                JobStatus::Running => {}
                JobStatus::Succeeded => {
                    state.phase = TrackerPhase::Succeeded;
                    state.terminal_reason = classification.reason;
                }
                JobStatus::Failed => {
                    state.phase = TrackerPhase::Failed;
                    state.terminal_reason = classification.reason;
                }
            }
        });

        if !applied {
            debug!(slot = %self.slot, "discarding snapshot for released slot");
            return PollOutcome::Stale;
        }

        match status {
            JobStatus::Running => {
                debug!(slot = %self.slot, "remote job still running");
                PollOutcome::Running
            }
            JobStatus::Succeeded => {
                info!(slot = %self.slot, "remote job succeeded");
                PollOutcome::Succeeded
            }
            JobStatus::Failed => {
                warn!(slot = %self.slot, "remote job failed");
                PollOutcome::Failed
            }
        }
    }

    fn handle(&self) -> TrackerHandle {
        TrackerHandle {
            registry: self.registry.clone(),
            slot: self.slot.clone(),
            generation: self.generation,
            state: Arc::clone(&self.state),
        }
    }

    fn close(&self) {
        self.state
            .send_modify(|state| state.phase = TrackerPhase::Closed);
    }

    fn close_after_success(&self) {
        self.state.send_if_modified(|state| {
            if state.phase != TrackerPhase::Succeeded {
                return false;
            }
            state.phase = TrackerPhase::Closed;
            true
        });
    }
}

impl Drop for OperationTracker {
    fn drop(&mut self) {
        self.registry
            .release_generation(&self.slot, self.generation);
    }
}

async fn run_poll_loop(
    tracker: OperationTracker,
    poll_fn: PollFn,
    interval: Duration,
    classifier: Classifier,
    success_grace: Duration,
) {
    loop {
        tokio::select! {
            _ = tracker.cancel.notified() => {
                debug!(slot = %tracker.slot, "poll loop cancelled");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        match tracker.poll_once(&poll_fn, &classifier).await {
            PollOutcome::Running => continue,
            PollOutcome::Succeeded => {
                tokio::time::sleep(success_grace).await;
                tracker.close_after_success();
                return;
            }
            PollOutcome::Failed | PollOutcome::Stale => return,
        }
    }
}

/// Consumer view of a started job. Dropping the handle cancels a job that is still running.
pub struct TrackerHandle {
    registry: JobRegistry,
    slot: SlotKey,
    generation: u64,
    state: SharedState,
}

impl TrackerHandle {
    pub fn slot(&self) -> &SlotKey {
        &self.slot
    }

    pub fn state(&self) -> TrackerState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerState> {
        self.state.subscribe()
    }

    /// Stops polling, releases the lane and closes the state. Safe to call repeatedly.
    pub fn cancel(&self) {
        if self.registry.cancel(&self.slot, self.generation, &self.state) {
            info!(slot = %self.slot, "remote job observation cancelled");
        }
    }

    /// Closes a terminal state; running jobs are left alone.
    pub fn dismiss(&self) {
        self.state.send_if_modified(|state| {
            if !state.phase.is_terminal() {
                return false;
            }
            state.phase = TrackerPhase::Closed;
            true
        });
    }

    /// Resolves once the job is terminal or the handle was closed.
    pub async fn wait_terminal(&self) -> TrackerState {
        let mut receiver = self.state.subscribe();
        let result = receiver
            .wait_for(|state| state.phase.is_terminal() || state.phase == TrackerPhase::Closed)
            .await
            .map(|state| TrackerState::clone(&state));
        result.unwrap_or_else(|_| self.state())
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        if !self.state.borrow().phase.is_terminal() {
            self.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures::FutureExt;
    use odoopanel_core::config::PollingConfig;
    use odoopanel_core::job::OperationKind;

    use super::*;

    fn scripted_poll(snapshots: Vec<Result<LogSnapshot, RemoteError>>) -> PollFn {
        let queue = Arc::new(Mutex::new(VecDeque::from(snapshots)));
        Arc::new(move || {
            let next = queue
                .lock()
                .expect("queue lock")
                .pop_front()
                .unwrap_or_else(|| Ok(LogSnapshot::default()));
            async move { next }.boxed()
        })
    }

    fn log(text: &str) -> Result<LogSnapshot, RemoteError> {
        Ok(LogSnapshot {
            exists: true,
            log: text.to_string(),
        })
    }

    fn accepted() -> Result<StartAccepted, RemoteError> {
        Ok(StartAccepted {
            message: Some("started".to_string()),
            ..StartAccepted::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_plan_succeeds_on_acceptance_and_releases() {
        let registry = JobRegistry::new();
        let slot = SlotKey::new(OperationKind::Restart, "dev-acme");
        let tracker = registry.acquire(slot.clone()).expect("acquire");

        let handle = tracker
            .start(
                async { accepted() },
                scripted_poll(Vec::new()),
                TrackingPlan::Immediate,
            )
            .await
            .expect("start");

        let state = handle.state();
        assert_eq!(state.phase, TrackerPhase::Succeeded);
        assert_eq!(
            state.terminal_reason.map(|reason| reason.sentinel),
            Some("started".to_string())
        );
        assert!(registry.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_begin_releases_without_polling() {
        let registry = JobRegistry::new();
        let slot = SlotKey::new(OperationKind::UpdateDb, "dev-acme");
        let tracker = registry.acquire(slot.clone()).expect("acquire");
        let receiver = tracker.subscribe();

        let result = tracker
            .start(
                async {
                    Err(RemoteError::Rejected {
                        status: 400,
                        message: "instance is busy".to_string(),
                    })
                },
                scripted_poll(Vec::new()),
                OperationKind::UpdateDb.tracking_plan(&PollingConfig::default()),
            )
            .await;

        assert!(matches!(result, Err(JobError::Validation { .. })));
        assert!(registry.active().is_empty());
        assert_ne!(receiver.borrow().phase, TrackerPhase::Polling);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_keep_polling() {
        let registry = JobRegistry::new();
        let slot = SlotKey::new(OperationKind::UpdateFiles, "dev-acme");
        let tracker = registry.acquire(slot.clone()).expect("acquire");

        let handle = tracker
            .start(
                async { accepted() },
                scripted_poll(vec![
                    Err(RemoteError::Transport("timed out".to_string())),
                    Err(RemoteError::Status {
                        status: 502,
                        body: "bad gateway".to_string(),
                    }),
                    log("Pulling...\n✅ Actualización completada\n"),
                ]),
                OperationKind::UpdateFiles.tracking_plan(&PollingConfig::default()),
            )
            .await
            .expect("start");

        let state = handle.wait_terminal().await;
        assert_eq!(state.phase, TrackerPhase::Succeeded);
        assert_eq!(state.transient_failures, 2);
        assert_eq!(state.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_log_counts_as_not_started() {
        let registry = JobRegistry::new();
        let slot = SlotKey::new(OperationKind::CreateDev, "dev-acme");
        let tracker = registry.acquire(slot.clone()).expect("acquire");
        let classifier = Classifier::for_kind(OperationKind::CreateDev);
        let poll = scripted_poll(vec![Ok(LogSnapshot::default())]);

        assert_eq!(
            tracker.poll_once(&poll, &classifier).await,
            PollOutcome::Running
        );
        let state = tracker.state();
        assert_eq!(state.raw_log, "");
        assert_eq!(state.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_sentinel_carries_remediation() {
        let registry = JobRegistry::new();
        let slot = SlotKey::new(OperationKind::BackupRestore, "prod-acme");
        let tracker = registry.acquire(slot.clone()).expect("acquire");
        let classifier = Classifier::for_kind(OperationKind::BackupRestore);
        let poll = scripted_poll(vec![log(
            "Restoring...\n❌ ERROR EN LA RESTAURACIÓN\n💡 Check disk space\n",
        )]);

        assert_eq!(
            tracker.poll_once(&poll, &classifier).await,
            PollOutcome::Failed
        );
        let reason = tracker.state().terminal_reason.expect("reason");
        assert_eq!(reason.remediation.as_deref(), Some("💡 Check disk space"));
        assert!(registry.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn success_closes_after_grace_period() {
        let registry = JobRegistry::new();
        let slot = SlotKey::new(OperationKind::BackupCreate, "prod-acme");
        let tracker = registry.acquire(slot.clone()).expect("acquire");

        let handle = tracker
            .start(
                async { accepted() },
                scripted_poll(vec![log("✅ Backup completado\n")]),
                TrackingPlan::Polled {
                    interval: Duration::from_millis(100),
                    classifier: Classifier::for_kind(OperationKind::BackupCreate),
                    success_grace: Duration::from_millis(500),
                },
            )
            .await
            .expect("start");

        assert_eq!(handle.wait_terminal().await.phase, TrackerPhase::Succeeded);
        let mut receiver = handle.subscribe();
        receiver
            .wait_for(|state| state.phase == TrackerPhase::Closed)
            .await
            .expect("closed");
    }
}
