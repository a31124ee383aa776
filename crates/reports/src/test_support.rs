//! Scripted in-process gateway for controller tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reports_core::{
    CsvUpload, DashboardSnapshot, IngestionJob, JobId, JobStatus, Month, Report, ReportsError,
    ReportsGateway, Result, SubmitAck, UploadAccepted,
};
use tokio::sync::Notify;

/// Gateway that replays scripted responses and counts calls.
///
/// Job status responses are consumed in order; the last one repeats.
#[derive(Debug, Default)]
pub(crate) struct FakeGateway {
    statuses: Mutex<VecDeque<Result<IngestionJob>>>,
    submit: Mutex<Option<Result<SubmitAck>>>,
    upload: Mutex<Option<Result<UploadAccepted>>>,
    dashboards: Mutex<HashMap<Month, Result<DashboardSnapshot>>>,
    submitted: Mutex<Vec<Report>>,
    /// When set, every job status call waits for one notification.
    pub(crate) status_gate: Option<Notify>,
    pub(crate) status_calls: AtomicUsize,
    pub(crate) submit_calls: AtomicUsize,
    pub(crate) upload_calls: AtomicUsize,
    pub(crate) dashboard_calls: AtomicUsize,
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn gated() -> Self {
        Self {
            status_gate: Some(Notify::new()),
            ..Self::default()
        }
    }

    pub(crate) fn with_statuses(self, statuses: Vec<Result<IngestionJob>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub(crate) fn with_submit(self, response: Result<SubmitAck>) -> Self {
        *self.submit.lock().unwrap() = Some(response);
        self
    }

    pub(crate) fn with_upload(self, response: Result<UploadAccepted>) -> Self {
        *self.upload.lock().unwrap() = Some(response);
        self
    }

    pub(crate) fn with_dashboard(self, month: Month, response: Result<DashboardSnapshot>) -> Self {
        self.dashboards.lock().unwrap().insert(month, response);
        self
    }

    pub(crate) fn submitted(&self) -> Vec<Report> {
        self.submitted.lock().unwrap().clone()
    }

    pub(crate) fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportsGateway for FakeGateway {
    async fn submit_report(&self, report: &Report) -> Result<SubmitAck> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(report.clone());
        self.submit
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(SubmitAck::default()))
    }

    async fn upload_csv(&self, _file: &CsvUpload) -> Result<UploadAccepted> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.upload.lock().unwrap().clone().unwrap_or_else(|| {
            Ok(UploadAccepted {
                job_id: JobId::new("J1"),
            })
        })
    }

    async fn job_status(&self, job_id: &JobId) -> Result<IngestionJob> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.status_gate {
            gate.notified().await;
        }
        let next = {
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                statuses.pop_front()
            } else {
                statuses.front().cloned()
            }
        };
        next.unwrap_or_else(|| Ok(IngestionJob::new(job_id.clone(), JobStatus::Pending)))
    }

    async fn dashboard(&self, month: Month) -> Result<DashboardSnapshot> {
        self.dashboard_calls.fetch_add(1, Ordering::SeqCst);
        self.dashboards
            .lock()
            .unwrap()
            .get(&month)
            .cloned()
            .unwrap_or(Err(ReportsError::EmptyState { month }))
    }
}

pub(crate) fn job(id: &str, status: JobStatus, processed: u64, total: u64) -> IngestionJob {
    IngestionJob::new(JobId::new(id), status).with_progress(processed, total)
}
