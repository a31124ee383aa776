//! Client facade tying the gateway, caches and controllers together.

use std::path::Path;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use reports_cache::{CacheEntry, QueryCache, QueryOptions};
use reports_core::{
    CsvUpload, DashboardSnapshot, IngestionJob, JobId, Month, Report, ReportsError,
    ReportsGateway, Result, SubmitAck, UploadAccepted,
};
use tracing::{debug, info, instrument};

use crate::config::ClientConfig;
use crate::dashboard::DashboardView;
use crate::form::ReportForm;
use crate::mutation::{Mutation, MutationFailure, MutationState};
use crate::notify::{self, Notices, Notifier};
use crate::poll::{JobPoller, PollState};

/// Notice sent after a report is saved and the server sent no message.
pub const SUBMIT_SUCCEEDED: &str = "Report submitted successfully";
/// Banner shown when a submission fails without a server message.
pub const SUBMIT_FAILED: &str = "Failed to submit report. Please try again.";
/// Notice sent when an upload fails without a server message.
pub const UPLOAD_FAILED: &str = "Upload failed. Please try again.";
/// Notice sent when an upload is attempted while a job is still polling.
pub const UPLOAD_BUSY: &str = "Please wait for the current upload to finish.";
/// Error returned for a status read without a job id.
pub const JOB_ID_REQUIRED: &str = "Job ID is required";

/// Client for the reporting backend.
///
/// Owns one cache per read operation (job status keyed by [`JobId`],
/// dashboard keyed by [`Month`]), one [`Mutation`] per write, and the
/// [`JobPoller`] that follows uploads. User-facing messages are sent to the
/// [`Notices`] returned by [`new`](Self::new).
///
/// # Example
///
/// ```rust,ignore
/// use reports::{ClientConfig, ReportForm, ReportsClient};
///
/// let (client, mut notices) = ReportsClient::connect(ClientConfig::load()?)?;
///
/// let mut form = ReportForm::new();
/// form.draft_mut().ngo_id = "NGO_001".into();
/// // ...
/// client.submit_report(&mut form).await;
/// while let Some(notice) = notices.recv().await {
///     println!("{notice}");
/// }
/// ```
#[derive(Clone, Debug)]
pub struct ReportsClient {
    gateway: Arc<dyn ReportsGateway>,
    config: ClientConfig,
    dashboards: QueryCache<Month, DashboardSnapshot>,
    jobs: QueryCache<JobId, IngestionJob>,
    submit: Mutation<Report, SubmitAck>,
    upload: Mutation<CsvUpload, UploadAccepted>,
    poller: JobPoller,
    notifier: Notifier,
}

impl ReportsClient {
    /// Create a client over `gateway`.
    pub fn new(gateway: Arc<dyn ReportsGateway>, config: ClientConfig) -> (Self, Notices) {
        let (notifier, notices) = notify::channel();
        let jobs = QueryCache::new();

        let submit = {
            let gateway = Arc::clone(&gateway);
            Mutation::new("submit_report", SUBMIT_FAILED, move |report: Report| {
                let gateway = Arc::clone(&gateway);
                async move { gateway.submit_report(&report).await }
            })
        };
        let upload = {
            let gateway = Arc::clone(&gateway);
            Mutation::new("upload_csv", UPLOAD_FAILED, move |file: CsvUpload| {
                let gateway = Arc::clone(&gateway);
                async move { gateway.upload_csv(&file).await }
            })
        };
        let poller = JobPoller::new(
            Arc::clone(&gateway),
            jobs.clone(),
            QueryOptions::new(config.job_status_retry()),
            config.poll_interval(),
            notifier.clone(),
        );

        let client = Self {
            gateway,
            config,
            dashboards: QueryCache::new(),
            jobs,
            submit,
            upload,
            poller,
            notifier,
        };
        (client, notices)
    }

    /// Create a client talking HTTP to `config.base_url`.
    #[cfg(feature = "http")]
    pub fn connect(config: ClientConfig) -> Result<(Self, Notices)> {
        let gateway =
            reports_http::HttpGateway::with_timeout(&config.base_url, config.request_timeout())?;
        debug!(base_url = %gateway.base_url(), "Connected HTTP gateway");
        Ok(Self::new(Arc::new(gateway), config))
    }

    /// Settings this client was built with.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sender for additional notices, e.g. from the presentation layer.
    #[must_use]
    pub const fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    // ------------------------------------------------------------------------
    // Single report
    // ------------------------------------------------------------------------

    /// Validates and submits the form.
    ///
    /// Invalid input is reported on the form and nothing is sent. On success
    /// the form is cleared, a notice is sent and the dashboard for the
    /// report's month is invalidated. On failure the form gets the server's
    /// field messages and a banner. Returns `None` if a submission is
    /// already pending.
    #[instrument(skip_all)]
    pub async fn submit_report(&self, form: &mut ReportForm) -> Option<Result<SubmitAck>> {
        let Some(report) = form.validate() else {
            debug!(fields = ?form.field_errors().keys().collect::<Vec<_>>(), "Report rejected locally");
            return Some(Err(ReportsError::Validation(form.field_errors().clone())));
        };
        let month = report.month();

        let result = self.submit.trigger(report).await?;
        match &result {
            Ok(ack) => {
                let message = if ack.message.trim().is_empty() {
                    SUBMIT_SUCCEEDED
                } else {
                    ack.message.as_str()
                };
                self.notifier.success(message);
                form.clear();
                self.dashboards.invalidate(&month).await;
            }
            Err(err) => {
                form.apply_failure(&MutationFailure::new(err.clone(), SUBMIT_FAILED));
            }
        }
        Some(result)
    }

    /// State of the single-report mutation.
    #[must_use]
    pub fn submit_state(&self) -> MutationState<SubmitAck> {
        self.submit.state()
    }

    // ------------------------------------------------------------------------
    // Bulk upload
    // ------------------------------------------------------------------------

    /// Uploads a CSV and starts following the job it creates.
    ///
    /// Rejected while a previous upload is still polling. Returns `None` if
    /// an upload request is already pending.
    #[instrument(skip_all, fields(file = file.file_name()))]
    pub async fn upload_csv(&self, file: CsvUpload) -> Option<Result<UploadAccepted>> {
        if self.poller.is_polling() {
            self.notifier.error(UPLOAD_BUSY);
            return Some(Err(ReportsError::InvalidParameter(UPLOAD_BUSY.to_string())));
        }

        let result = self.upload.trigger(file).await?;
        match &result {
            Ok(accepted) => {
                self.notifier
                    .info(format!("Upload started. Job ID: {}", accepted.job_id));
                self.poller.start(accepted.job_id.clone()).await;
            }
            Err(err) => self.notifier.error(err.general_message(UPLOAD_FAILED)),
        }
        Some(result)
    }

    /// Reads a CSV file from disk and uploads it.
    pub async fn upload_file(&self, path: &Path) -> Option<Result<UploadAccepted>> {
        match read_csv(path).await {
            Ok(file) => self.upload_csv(file).await,
            Err(err) => {
                self.notifier.error(err.general_message(UPLOAD_FAILED));
                Some(Err(err))
            }
        }
    }

    /// State of the upload mutation.
    #[must_use]
    pub fn upload_state(&self) -> MutationState<UploadAccepted> {
        self.upload.state()
    }

    /// The poller following the current upload.
    #[must_use]
    pub const fn poller(&self) -> &JobPoller {
        &self.poller
    }

    /// Current polling state.
    #[must_use]
    pub fn job_state(&self) -> PollState {
        self.poller.state()
    }

    /// Stops following the current upload.
    pub async fn cancel_upload(&self) -> bool {
        self.poller.cancel().await
    }

    /// Reads one job's status without polling.
    ///
    /// A blank id is rejected without a request. The read's cache entry is
    /// dropped afterwards unless the poller is following the same job.
    pub async fn job_status(&self, job_id: JobId) -> Result<IngestionJob> {
        let options = QueryOptions::new(self.config.job_status_retry())
            .enabled(!job_id.as_str().trim().is_empty());
        let gateway = Arc::clone(&self.gateway);
        let id = job_id.clone();
        let fetched = self
            .jobs
            .fetch(job_id.clone(), &options, move || {
                let gateway = Arc::clone(&gateway);
                let id = id.clone();
                async move { gateway.job_status(&id).await }
            })
            .await;
        let Some(result) = fetched else {
            return Err(ReportsError::InvalidParameter(JOB_ID_REQUIRED.to_string()));
        };

        let polled = self.poller.state();
        if !(polled.is_polling() && polled.job_id() == Some(&job_id)) {
            self.jobs.remove(&job_id).await;
        }
        result
    }

    // ------------------------------------------------------------------------
    // Dashboard
    // ------------------------------------------------------------------------

    /// Loads the dashboard for `month`, joining a read already in flight.
    #[instrument(skip(self), fields(month = %month))]
    pub async fn dashboard(&self, month: Month) -> DashboardView {
        let result = self
            .dashboards
            .load(month, self.config.dashboard_retry(), self.dashboard_producer(month))
            .await;
        DashboardView::from_result(month, result)
    }

    /// Reloads the dashboard for `month`, superseding any read in flight.
    #[instrument(skip(self), fields(month = %month))]
    pub async fn refresh_dashboard(&self, month: Month) -> DashboardView {
        info!("Refreshing dashboard");
        let result = self
            .dashboards
            .reload(month, self.config.dashboard_retry(), self.dashboard_producer(month))
            .await;
        DashboardView::from_result(month, result)
    }

    /// Cached dashboard entry for `month`, without fetching.
    pub async fn dashboard_entry(&self, month: Month) -> Option<CacheEntry<DashboardSnapshot>> {
        self.dashboards.snapshot(&month).await
    }

    fn dashboard_producer(
        &self,
        month: Month,
    ) -> impl Fn() -> BoxFuture<'static, Result<DashboardSnapshot>> + Send + Sync + use<> {
        let gateway = Arc::clone(&self.gateway);
        move || {
            let gateway = Arc::clone(&gateway);
            async move { gateway.dashboard(month).await }.boxed()
        }
    }
}

async fn read_csv(path: &Path) -> Result<CsvUpload> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    // Reject by name before touching the disk.
    CsvUpload::new(file_name.as_str(), Vec::new())?;
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        ReportsError::InvalidParameter(format!("Could not read {}: {e}", path.display()))
    })?;
    CsvUpload::new(file_name, bytes)
}
