//! Ingestion job polling.
//!
//! A [`JobPoller`] follows one bulk upload at a time. After
//! [`start`](JobPoller::start) it reads the job's status through the job
//! status cache, waits the poll interval, and reads again until the job
//! reaches `success` or `failed`. [`cancel`](JobPoller::cancel) stops it at
//! any point.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reports_cache::{QueryCache, QueryOptions};
use reports_core::{IngestionJob, JobId, JobStatus, ReportsError, ReportsGateway, Result};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::notify::Notifier;

/// Notice sent when a job finishes successfully.
pub const UPLOAD_COMPLETED: &str = "Upload completed successfully.";
/// Notice sent when a job finishes in the `failed` state.
pub const UPLOAD_REJECTED: &str = "Upload failed. Please fix the CSV and try again.";

/// Where the poller is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PollState {
    /// No job is being followed.
    #[default]
    Idle,
    /// The job is pending or processing, or has not been read yet.
    Polling {
        /// The job being followed.
        job_id: JobId,
        /// Last status read, `None` before the first read completes.
        job: Option<IngestionJob>,
        /// Error of the last read, cleared by the next successful read.
        last_error: Option<ReportsError>,
    },
    /// The job reached `success` or `failed`; no more reads are issued.
    Settled {
        /// Final status, including the failure description if any.
        job: IngestionJob,
    },
}

impl PollState {
    /// The job this state refers to.
    #[must_use]
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::Idle => None,
            Self::Polling { job_id, .. } => Some(job_id),
            Self::Settled { job } => Some(&job.job_id),
        }
    }

    /// Last known job status.
    #[must_use]
    pub fn job(&self) -> Option<&IngestionJob> {
        match self {
            Self::Idle => None,
            Self::Polling { job, .. } => job.as_ref(),
            Self::Settled { job } => Some(job),
        }
    }

    /// Returns true while reads are still being issued.
    #[must_use]
    pub const fn is_polling(&self) -> bool {
        matches!(self, Self::Polling { .. })
    }

    /// Returns true once the job reached a terminal status.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Settled { .. })
    }
}

/// Follows an ingestion job until it settles or is cancelled.
///
/// Reads go through a [`QueryCache`] keyed by job id, so they share its
/// single-flight and retry behaviour. Every `start` and `cancel` begins a new
/// session; a poll loop or late read from an older session never touches the
/// state.
#[derive(Clone)]
pub struct JobPoller {
    gateway: Arc<dyn ReportsGateway>,
    cache: QueryCache<JobId, IngestionJob>,
    options: QueryOptions,
    interval: Duration,
    notifier: Notifier,
    state: Arc<watch::Sender<PollState>>,
    session: Arc<AtomicU64>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for JobPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPoller")
            .field("interval", &self.interval)
            .field("retry", &self.options.retry)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl JobPoller {
    /// Create a poller reading through `cache` every `interval`.
    pub fn new(
        gateway: Arc<dyn ReportsGateway>,
        cache: QueryCache<JobId, IngestionJob>,
        options: QueryOptions,
        interval: Duration,
        notifier: Notifier,
    ) -> Self {
        let (state, _) = watch::channel(PollState::Idle);
        Self {
            gateway,
            cache,
            options,
            interval,
            notifier,
            state: Arc::new(state),
            session: Arc::new(AtomicU64::new(0)),
            task: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts following `job_id`, cancelling whatever was followed before.
    /// The first read is issued immediately.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn start(&self, job_id: JobId) {
        let mut task = self.task.lock().await;
        self.stop(&mut task).await;

        let session = self.session.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(PollState::Polling {
            job_id: job_id.clone(),
            job: None,
            last_error: None,
        });
        info!(session, "Polling job status");

        let poll = PollLoop {
            gateway: Arc::clone(&self.gateway),
            cache: self.cache.clone(),
            options: self.options,
            interval: self.interval,
            notifier: self.notifier.clone(),
            state: Arc::clone(&self.state),
            current: Arc::clone(&self.session),
            session,
            job_id,
        };
        *task = Some(tokio::spawn(poll.run()));
    }

    /// Stops following the current job and discards its cache entry.
    ///
    /// A read already sent is not aborted, but its result is ignored.
    /// Returns true if a job was being followed or had settled.
    pub async fn cancel(&self) -> bool {
        let mut task = self.task.lock().await;
        let cancelled = self.stop(&mut task).await;
        if cancelled {
            info!("Polling cancelled");
        }
        cancelled
    }

    async fn stop(&self, task: &mut Option<JoinHandle<()>>) -> bool {
        self.session.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = task.take() {
            handle.abort();
        }
        let previous = self.state.send_replace(PollState::Idle);
        match previous.job_id() {
            Some(job_id) => {
                self.cache.remove(job_id).await;
                true
            }
            None => false,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Returns true while a job is being polled.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.state.borrow().is_polling()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    /// Waits until polling stops. Returns the final job if it settled, or
    /// `None` if it was cancelled or nothing was being polled.
    pub async fn settled(&self) -> Option<IngestionJob> {
        let mut updates = self.state.subscribe();
        let state = updates.wait_for(|state| !state.is_polling()).await.ok()?;
        match &*state {
            PollState::Settled { job } => Some(job.clone()),
            PollState::Idle | PollState::Polling { .. } => None,
        }
    }
}

/// One session's poll loop.
struct PollLoop {
    gateway: Arc<dyn ReportsGateway>,
    cache: QueryCache<JobId, IngestionJob>,
    options: QueryOptions,
    interval: Duration,
    notifier: Notifier,
    state: Arc<watch::Sender<PollState>>,
    current: Arc<AtomicU64>,
    session: u64,
    job_id: JobId,
}

impl PollLoop {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.session
    }

    #[instrument(name = "poll", skip(self), fields(job_id = %self.job_id, session = self.session))]
    async fn run(self) {
        loop {
            let options = self.options.enabled(self.is_current());
            let gateway = Arc::clone(&self.gateway);
            let job_id = self.job_id.clone();
            let outcome = self
                .cache
                .fetch(self.job_id.clone(), &options, move || {
                    let gateway = Arc::clone(&gateway);
                    let job_id = job_id.clone();
                    async move { gateway.job_status(&job_id).await }
                })
                .await;

            let Some(outcome) = outcome else {
                debug!("Session ended before read");
                return;
            };

            if self.apply(outcome) {
                self.cache.remove(&self.job_id).await;
                return;
            }

            if !self.is_current() {
                debug!("Session ended, dropping read");
                return;
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Applies one read to the state. Returns true if the job just settled.
    fn apply(&self, outcome: Result<IngestionJob>) -> bool {
        let mut settled = false;
        self.state.send_if_modified(|state| {
            if !self.is_current() {
                return false;
            }
            let PollState::Polling { job, last_error, .. } = state else {
                return false;
            };
            match outcome {
                Err(err) => {
                    warn!(error = %err, "Status read failed, keeping last status");
                    *last_error = Some(err);
                    true
                }
                Ok(next)
                    if job
                        .as_ref()
                        .is_some_and(|known| next.status.stage() < known.status.stage()) =>
                {
                    debug!(status = %next.status, "Ignoring status that moves backward");
                    false
                }
                Ok(next) if next.is_terminal() => {
                    // Queued before the state change is visible to receivers.
                    self.announce(&next);
                    settled = true;
                    *state = PollState::Settled { job: next };
                    true
                }
                Ok(next) => {
                    debug!(
                        status = %next.status,
                        processed = next.processed,
                        total = next.total,
                        "Job progress"
                    );
                    *job = Some(next);
                    *last_error = None;
                    true
                }
            }
        });
        settled
    }

    fn announce(&self, job: &IngestionJob) {
        if job.status == JobStatus::Failed {
            warn!(error = ?job.error_message, "Job failed");
            self.notifier.error(UPLOAD_REJECTED);
        } else {
            info!(processed = job.processed, total = job.total, "Job completed");
            self.notifier.success(UPLOAD_COMPLETED);
        }
    }
}
