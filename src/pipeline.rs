//! Job orchestration: submit a staged batch, then poll it to a terminal
//! status on a bounded schedule.
//!
//! Lifecycle: `Idle -> Submitting -> Polling -> Completed`, with `Polling ->
//! Failed` on a transport error and `Polling -> TimedOut` when the check
//! bound is exhausted. Terminal states are terminal for that job only; a
//! fresh `submit` replaces the tracked job and aborts any scheduled check so
//! it can never fire against stale state. The check counter lives inside the
//! poll task, so it resets per job, and exhausting it genuinely halts the
//! loop.

use crate::client::{BackendClient, RemoteStatus};
use crate::config::PollSettings;
use crate::error::Result;
use crate::staging::StagedFile;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Client-side job lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobStatus {
    #[default]
    Idle,
    Submitting,
    Polling,
    Completed,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut
        )
    }

    /// True while the busy indicator should be shown.
    pub fn is_busy(&self) -> bool {
        matches!(self, JobStatus::Submitting | JobStatus::Polling)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Idle => "idle",
            JobStatus::Submitting => "submitting",
            JobStatus::Polling => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed out",
        };
        write!(f, "{}", name)
    }
}

/// Snapshot of the tracked job.
#[derive(Debug, Clone, Default)]
pub struct JobState {
    pub status: JobStatus,
    pub object_id: Option<String>,
    pub checks: u32,
}

/// Polling schedule. Injectable so tests can run on millisecond timers.
#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub max_checks: u32,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            interval: Duration::from_secs(3),
            max_checks: 4,
        }
    }
}

impl From<PollSettings> for PollSchedule {
    fn from(settings: PollSettings) -> Self {
        Self {
            initial_delay: Duration::from_secs(settings.initial_delay_secs),
            interval: Duration::from_secs(settings.interval_secs),
            max_checks: settings.max_checks,
        }
    }
}

/// Progress events emitted to the owning session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Submitted { object_id: String },
    StillProcessing { check: u32 },
    Completed { object_id: String },
    PollFailed { message: String },
    TimedOut { checks: u32 },
}

pub struct JobOrchestrator {
    client: Arc<BackendClient>,
    schedule: PollSchedule,
    state: Arc<Mutex<JobState>>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    poll_task: Option<JoinHandle<()>>,
}

impl JobOrchestrator {
    pub fn new(
        client: Arc<BackendClient>,
        schedule: PollSchedule,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            client,
            schedule,
            state: Arc::new(Mutex::new(JobState::default())),
            events: tx,
            poll_task: None,
        };
        (orchestrator, rx)
    }

    pub fn state(&self) -> JobState {
        self.state.lock().expect("job state poisoned").clone()
    }

    pub fn status(&self) -> JobStatus {
        self.state().status
    }

    pub fn object_id(&self) -> Option<String> {
        self.state().object_id
    }

    /// Submit the staged batch as one job. On success the orchestrator
    /// enters `Polling` and owns a freshly spawned poll task; on failure it
    /// returns to `Idle` with nothing tracked. Submitting while a previous
    /// job is live abandons that job (its poll task is aborted, no cancel
    /// request is sent to the backend).
    pub async fn submit(&mut self, files: &[StagedFile], token: &str) -> Result<String> {
        self.cancel_poll();
        self.set_state(JobStatus::Submitting, None, 0);

        match self.client.process(files, token).await {
            Ok(object_id) => {
                info!("Job submitted: {}", object_id);
                self.set_state(JobStatus::Polling, Some(object_id.clone()), 0);
                let _ = self.events.send(PipelineEvent::Submitted {
                    object_id: object_id.clone(),
                });
                self.poll_task = Some(tokio::spawn(poll_job(
                    Arc::clone(&self.client),
                    self.schedule,
                    Arc::clone(&self.state),
                    self.events.clone(),
                    object_id.clone(),
                    token.to_string(),
                )));
                Ok(object_id)
            }
            Err(e) => {
                error!("Job submission failed: {}", e);
                self.set_state(JobStatus::Idle, None, 0);
                Err(e)
            }
        }
    }

    /// Abort any scheduled status check. Safe to call at any time.
    pub fn cancel_poll(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
            debug!("Cancelled scheduled status check");
        }
    }

    /// Drop the tracked job entirely and return to `Idle`.
    pub fn reset(&mut self) {
        self.cancel_poll();
        self.set_state(JobStatus::Idle, None, 0);
    }

    fn set_state(&self, status: JobStatus, object_id: Option<String>, checks: u32) {
        let mut state = self.state.lock().expect("job state poisoned");
        state.status = status;
        state.object_id = object_id;
        state.checks = checks;
    }

    #[cfg(test)]
    pub(crate) fn has_poll_task(&self) -> bool {
        self.poll_task.is_some()
    }
}

impl Drop for JobOrchestrator {
    fn drop(&mut self) {
        self.cancel_poll();
    }
}

/// The poll loop for one job. Checks are strictly sequential: the next sleep
/// is scheduled only after the previous check resolves, so two checks for
/// one object id can never overlap.
async fn poll_job(
    client: Arc<BackendClient>,
    schedule: PollSchedule,
    state: Arc<Mutex<JobState>>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    object_id: String,
    token: String,
) {
    // The first check is deliberately delayed to avoid racing the backend.
    tokio::time::sleep(schedule.initial_delay).await;

    let mut checks: u32 = 0;
    loop {
        checks += 1;
        if let Ok(mut s) = state.lock() {
            s.checks = checks;
        }

        match client.status(&object_id, &token).await {
            Ok(RemoteStatus::Completed) => {
                info!("Job {} completed after {} check(s)", object_id, checks);
                if let Ok(mut s) = state.lock() {
                    s.status = JobStatus::Completed;
                }
                let _ = events.send(PipelineEvent::Completed { object_id });
                return;
            }
            Ok(RemoteStatus::Processing) => {
                debug!("Job {} still processing (check {})", object_id, checks);
                let _ = events.send(PipelineEvent::StillProcessing { check: checks });

                if checks >= schedule.max_checks {
                    error!(
                        "Job {} timed out after {} status check(s)",
                        object_id, checks
                    );
                    if let Ok(mut s) = state.lock() {
                        s.status = JobStatus::TimedOut;
                    }
                    let _ = events.send(PipelineEvent::TimedOut { checks });
                    return;
                }

                tokio::time::sleep(schedule.interval).await;
            }
            Err(e) => {
                // A failed check ends polling immediately; it is not retried.
                error!("Status check for job {} failed: {}", object_id, e);
                if let Ok(mut s) = state.lock() {
                    s.status = JobStatus::Failed;
                }
                let _ = events.send(PipelineEvent::PollFailed {
                    message: e.to_string(),
                });
                return;
            }
        }
    }
}
