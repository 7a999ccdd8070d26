use std::{future::Future, sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant},
};

use super::{JobId, JobSnapshot, JobState};
use crate::error::{Result, SyncError};
use crate::notify::{Notifier, UiEvent};

pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(300);

/// Handle for one started job; terminal transitions only apply while it is current.
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub id: JobId,
    pub deadline: Instant,
}

pub enum JobOutcome<T> {
    Finished(Result<T>),
    /// The deadline passed first. The remote call keeps running; its result
    /// can still be awaited through the handle.
    TimedOut(JoinHandle<Result<T>>),
}

struct ActiveJob {
    id: JobId,
    title: String,
    message: String,
    deadline: Instant,
    watchdog: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct JobSlot {
    state: JobState,
    current: Option<ActiveJob>,
    timeouts_reported: u64,
}

impl JobSlot {
    fn close_running(&mut self) -> Option<ActiveJob> {
        let mut job = self.current.take()?;
        if let Some(watchdog) = job.watchdog.take() {
            watchdog.abort();
        }
        self.state = JobState::Idle;
        Some(job)
    }
}

/// Owner of the single progress indicator. Clones share the same indicator.
#[derive(Clone)]
pub struct JobController {
    slot: Arc<Mutex<JobSlot>>,
    timeout: Duration,
    notifier: Notifier,
}

impl JobController {
    pub fn new(timeout: Duration, notifier: Notifier) -> Self {
        Self {
            slot: Arc::new(Mutex::new(JobSlot::default())),
            timeout,
            notifier,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Show the indicator for a new job and arm its safety deadline.
    ///
    /// A job already running is closed first and its deadline cancelled.
    pub async fn begin(&self, title: &str, message: &str) -> JobTicket {
        let mut slot = self.slot.lock().await;

        if slot.state == JobState::Running {
            if let Some(prev) = slot.close_running() {
                info!(
                    "[job] closing indicator for '{}' ({}) to start '{}'",
                    prev.title, prev.id, title
                );
            }
            self.notifier.emit(UiEvent::ProgressHidden);
        }

        let id = JobId::new();
        let deadline = Instant::now() + self.timeout;
        let watchdog = {
            let controller = self.clone();
            tokio::spawn(async move {
                time::sleep_until(deadline).await;
                controller.expire(id).await;
            })
        };

        slot.state = JobState::Running;
        slot.current = Some(ActiveJob {
            id,
            title: title.to_string(),
            message: message.to_string(),
            deadline,
            watchdog: Some(watchdog),
        });
        debug!("[job] started '{}' ({})", title, id);
        self.notifier.emit(UiEvent::ProgressShown {
            title: title.to_string(),
            message: message.to_string(),
        });

        JobTicket { id, deadline }
    }

    /// Record the terminal state of `ticket`. Returns false if the job was
    /// already closed by a newer job, a dismissal, or its deadline.
    pub async fn finish(&self, ticket: &JobTicket, succeeded: bool) -> bool {
        let mut slot = self.slot.lock().await;
        let is_current = slot.state == JobState::Running
            && slot.current.as_ref().map(|j| j.id) == Some(ticket.id);
        if !is_current {
            debug!("[job] ignoring late completion of {}", ticket.id);
            return false;
        }

        if let Some(job) = slot.current.as_mut() {
            if let Some(watchdog) = job.watchdog.take() {
                watchdog.abort();
            }
        }
        slot.state = if succeeded {
            JobState::Succeeded
        } else {
            JobState::Failed
        };
        debug!("[job] {} -> {:?}", ticket.id, slot.state);
        self.notifier.emit(UiEvent::ProgressHidden);
        true
    }

    /// Force the indicator closed once `id`'s deadline passes.
    async fn expire(&self, id: JobId) -> bool {
        let mut slot = self.slot.lock().await;
        let is_current = slot.state == JobState::Running
            && slot.current.as_ref().map(|j| j.id) == Some(id);
        if !is_current {
            return false;
        }

        let title = slot
            .close_running()
            .map(|job| job.title)
            .unwrap_or_default();
        slot.timeouts_reported += 1;
        warn!(
            "[job] '{}' ({}) exceeded {}s, forcing indicator closed",
            title,
            id,
            self.timeout.as_secs()
        );
        self.notifier.emit(UiEvent::ProgressHidden);
        self.notifier.warn(format!(
            "{} is taking longer than {} seconds; the server may still finish in the background",
            title.trim_end_matches("..."),
            self.timeout.as_secs()
        ));
        true
    }

    /// Close the indicator. A running job is abandoned, not cancelled.
    pub async fn dismiss(&self) {
        let mut slot = self.slot.lock().await;
        match slot.state {
            JobState::Idle => {}
            JobState::Running => {
                if let Some(job) = slot.close_running() {
                    info!("[job] dismissed running job '{}' ({})", job.title, job.id);
                }
                self.notifier.emit(UiEvent::ProgressHidden);
            }
            JobState::Succeeded | JobState::Failed => {
                slot.current = None;
                slot.state = JobState::Idle;
            }
        }
    }

    pub async fn state(&self) -> JobState {
        self.slot.lock().await.state
    }

    pub async fn snapshot(&self) -> JobSnapshot {
        let slot = self.slot.lock().await;
        let remaining_ms = match (&slot.current, slot.state) {
            (Some(job), JobState::Running) => job
                .deadline
                .saturating_duration_since(Instant::now())
                .as_millis() as u64,
            _ => 0,
        };
        JobSnapshot {
            state: slot.state,
            title: slot.current.as_ref().map(|j| j.title.clone()),
            message: slot.current.as_ref().map(|j| j.message.clone()),
            remaining_ms,
        }
    }

    pub async fn timeouts_reported(&self) -> u64 {
        self.slot.lock().await.timeouts_reported
    }

    /// Drive `job` under the indicator until it settles or the deadline fires.
    pub async fn run<T, F>(&self, title: &str, message: &str, job: F) -> JobOutcome<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let ticket = self.begin(title, message).await;
        let mut handle = tokio::spawn(job);

        tokio::select! {
            joined = &mut handle => {
                let result = joined.unwrap_or_else(|e| Err(SyncError::Job(e.to_string())));
                self.finish(&ticket, result.is_ok()).await;
                JobOutcome::Finished(result)
            }
            _ = time::sleep_until(ticket.deadline) => {
                self.expire(ticket.id).await;
                JobOutcome::TimedOut(handle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{StatusLevel, UiEvent};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn controller() -> (JobController, UnboundedReceiver<UiEvent>) {
        let (notifier, rx) = Notifier::channel(Duration::from_secs(5));
        (JobController::new(DEFAULT_JOB_TIMEOUT, notifier), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn timeout_warnings(events: &[UiEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, UiEvent::Status(m) if m.level == StatusLevel::Warning))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn successful_run_shows_then_hides_indicator() {
        let (jobs, mut rx) = controller();
        let outcome = jobs
            .run("Transcribing video...", "This may take a while.", async { Ok(42) })
            .await;

        assert!(matches!(outcome, JobOutcome::Finished(Ok(42))));
        assert_eq!(jobs.state().await, JobState::Succeeded);

        let events = drain(&mut rx);
        assert!(matches!(events.first(), Some(UiEvent::ProgressShown { title, .. }) if title == "Transcribing video..."));
        assert!(matches!(events.last(), Some(UiEvent::ProgressHidden)));

        jobs.dismiss().await;
        assert_eq!(jobs.state().await, JobState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_reports_failed() {
        let (jobs, _rx) = controller();
        let outcome: JobOutcome<()> = jobs
            .run("Running speaker identification...", "", async {
                Err(SyncError::Application("No video loaded".into()))
            })
            .await;

        assert!(matches!(outcome, JobOutcome::Finished(Err(SyncError::Application(_)))));
        assert_eq!(jobs.state().await, JobState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_job_is_released_once_at_deadline() {
        let (jobs, mut rx) = controller();
        let outcome: JobOutcome<()> = jobs
            .run("Transcribing video...", "", std::future::pending())
            .await;

        assert!(matches!(outcome, JobOutcome::TimedOut(_)));
        assert_eq!(jobs.state().await, JobState::Idle);

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(jobs.timeouts_reported().await, 1);
        assert_eq!(timeout_warnings(&drain(&mut rx)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_releases_indicator_without_run() {
        let (jobs, mut rx) = controller();
        let ticket = jobs.begin("Uploading segments file...", "").await;

        time::sleep(DEFAULT_JOB_TIMEOUT + Duration::from_secs(1)).await;
        assert_eq!(jobs.state().await, JobState::Idle);
        assert_eq!(timeout_warnings(&drain(&mut rx)), 1);

        // The late completion no longer owns the indicator.
        assert!(!jobs.finish(&ticket, true).await);
        assert_eq!(jobs.state().await, JobState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn new_job_replaces_running_one_and_rearms_deadline() {
        let (jobs, mut rx) = controller();
        let first = jobs.begin("Transcribing video...", "").await;

        time::sleep(Duration::from_secs(100)).await;
        let second = jobs.begin("Running speaker identification...", "").await;
        assert!(second.deadline > first.deadline);

        let events = drain(&mut rx);
        let hidden = events
            .iter()
            .filter(|e| matches!(e, UiEvent::ProgressHidden))
            .count();
        assert_eq!(hidden, 1);

        // Past the first job's deadline, the second keeps running.
        time::sleep(Duration::from_secs(201)).await;
        let snapshot = jobs.snapshot().await;
        assert_eq!(snapshot.state, JobState::Running);
        assert_eq!(snapshot.title.as_deref(), Some("Running speaker identification..."));
        assert!(snapshot.remaining_ms > 0);
        assert_eq!(jobs.timeouts_reported().await, 0);

        assert!(!jobs.finish(&first, false).await);

        time::sleep(Duration::from_secs(100)).await;
        assert_eq!(jobs.state().await, JobState::Idle);
        assert_eq!(jobs.timeouts_reported().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_result_is_still_available_after_timeout() {
        let (jobs, _rx) = controller();
        let outcome = jobs
            .run("Transcribing video...", "", async {
                time::sleep(Duration::from_secs(400)).await;
                Ok("done")
            })
            .await;

        let JobOutcome::TimedOut(handle) = outcome else {
            panic!("expected timeout");
        };
        assert_eq!(handle.await.unwrap().unwrap(), "done");
        assert_eq!(jobs.state().await, JobState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_closes_running_job() {
        let (jobs, _rx) = controller();
        let ticket = jobs.begin("Transcribing video...", "").await;
        jobs.dismiss().await;
        assert_eq!(jobs.state().await, JobState::Idle);
        assert!(!jobs.finish(&ticket, true).await);

        time::sleep(Duration::from_secs(400)).await;
        assert_eq!(jobs.timeouts_reported().await, 0);
    }
}
