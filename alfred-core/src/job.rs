//! Remote generation job lifecycle: submit → poll → download.
//!
//! `JobApi` is the wire surface of a job-based generation service; `JobRunner`
//! drives a job through its states with the grace wait, fixed poll interval,
//! wall-clock ceiling, and download retry policy. Timing uses `tokio::time`, so
//! tests can run the whole lifecycle on a paused clock.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{RenderError, RenderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One status-check response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error: Option<String>,
}

impl StatusReport {
    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            result_url: None,
            error: None,
        }
    }

    pub fn completed(url: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            result_url: Some(url.into()),
            error: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            result_url: None,
            error: Some(detail.into()),
        }
    }
}

/// Client-side view of a remote job. Lives for one render call.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub job_id: String,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error: Option<String>,
}

impl GenerationJob {
    pub fn submitted(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Submitted,
            result_url: None,
            error: None,
        }
    }

    /// Terminal states are sticky; later reports are ignored.
    pub fn apply(&mut self, report: StatusReport) {
        if self.status.is_terminal() {
            return;
        }
        self.status = report.status;
        if report.result_url.is_some() {
            self.result_url = report.result_url;
        }
        if report.error.is_some() {
            self.error = report.error;
        }
    }
}

/// What goes into a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub text: String,
    pub avatar_id: String,
    pub voice_id: String,
}

/// A failed download attempt, classified for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadFailure {
    /// Connection reset, truncated body, 408/429/5xx: worth another attempt.
    Transient(String),
    /// Client-error HTTP status or local write failure: retrying will not help.
    Permanent(String),
}

impl std::fmt::Display for DownloadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadFailure::Transient(m) | DownloadFailure::Permanent(m) => f.write_str(m),
        }
    }
}

#[async_trait]
pub trait JobApi: Send + Sync {
    /// Returns the job identifier. Any failure is `RenderError::Submission`.
    async fn submit(&self, request: &SubmitRequest) -> RenderResult<String>;

    /// Failures are `RenderError::StatusCheck`.
    async fn status(&self, job_id: &str) -> RenderResult<StatusReport>;

    /// Stream `url` to `dest`, overwriting it.
    async fn download(&self, url: &str, dest: &Path) -> Result<PathBuf, DownloadFailure>;
}

/// Poll timing for a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTimings {
    /// Wait before the first status check.
    pub grace: Duration,
    pub poll_interval: Duration,
    /// Measured from the first status check.
    pub ceiling: Duration,
}

impl Default for JobTimings {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            poll_interval: Duration::from_secs(10),
            ceiling: Duration::from_secs(600),
        }
    }
}

/// Exponential backoff for the download phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(4),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `initial * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

pub struct JobRunner<A> {
    api: A,
    timings: JobTimings,
    retry: RetryPolicy,
}

impl<A: JobApi> JobRunner<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            timings: JobTimings::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timings(mut self, timings: JobTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Full lifecycle: submit, wait for completion, download to `dest`.
    pub async fn run(&self, request: &SubmitRequest, dest: &Path) -> RenderResult<PathBuf> {
        let mut job = self.submit(request).await?;
        let url = self.poll(&mut job).await?;
        self.download(&url, dest).await
    }

    pub async fn submit(&self, request: &SubmitRequest) -> RenderResult<GenerationJob> {
        let job_id = self.api.submit(request).await.inspect_err(|e| {
            error!(error = %e, "job submission failed");
        })?;
        info!(job_id = %job_id, "job submitted");
        Ok(GenerationJob::submitted(job_id))
    }

    /// Wait out the grace interval, then check status every `poll_interval` until the
    /// job completes (returns the result URL), fails, or the ceiling elapses.
    /// A failing status-check call ends the loop immediately.
    pub async fn poll(&self, job: &mut GenerationJob) -> RenderResult<String> {
        debug!(job_id = %job.job_id, grace = ?self.timings.grace, "waiting before first status check");
        sleep(self.timings.grace).await;

        let started = Instant::now();
        while started.elapsed() < self.timings.ceiling {
            let report = self.api.status(&job.job_id).await?;
            job.apply(report);
            match job.status {
                JobStatus::Completed => {
                    let url = job.result_url.clone().ok_or_else(|| RenderError::StatusCheck {
                        job_id: job.job_id.clone(),
                        message: "job completed without a result URL".to_string(),
                    })?;
                    info!(job_id = %job.job_id, elapsed = ?started.elapsed(), "job completed");
                    return Ok(url);
                }
                JobStatus::Failed => {
                    let detail = job
                        .error
                        .clone()
                        .unwrap_or_else(|| "no error detail provided".to_string());
                    error!(job_id = %job.job_id, detail = %detail, "job failed");
                    return Err(RenderError::GenerationFailed {
                        job_id: job.job_id.clone(),
                        detail,
                    });
                }
                JobStatus::Submitted | JobStatus::Processing => {
                    debug!(job_id = %job.job_id, elapsed = ?started.elapsed(), "job still processing");
                    sleep(self.timings.poll_interval).await;
                }
            }
        }

        let elapsed = started.elapsed();
        error!(job_id = %job.job_id, ?elapsed, "job timed out");
        Err(RenderError::PollTimeout {
            job_id: job.job_id.clone(),
            elapsed,
        })
    }

    /// Download with retry on transient failures only.
    pub async fn download(&self, url: &str, dest: &Path) -> RenderResult<PathBuf> {
        let max = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.api.download(url, dest).await {
                Ok(path) => {
                    info!(path = %path.display(), attempt, "download complete");
                    return Ok(path);
                }
                Err(DownloadFailure::Permanent(message)) => {
                    error!(attempt, error = %message, "download failed permanently");
                    return Err(RenderError::Download {
                        attempts: attempt,
                        message,
                    });
                }
                Err(DownloadFailure::Transient(message)) => {
                    if attempt >= max {
                        error!(attempt, error = %message, "download retries exhausted");
                        return Err(RenderError::Download {
                            attempts: attempt,
                            message,
                        });
                    }
                    let delay = self.retry.backoff(attempt);
                    warn!(attempt, ?delay, error = %message, "download failed, retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted responses; the last status repeats once the script runs out.
    #[derive(Default)]
    struct ScriptedApi {
        statuses: Mutex<VecDeque<RenderResult<StatusReport>>>,
        downloads: Mutex<VecDeque<Result<PathBuf, DownloadFailure>>>,
        status_calls: AtomicUsize,
        download_calls: AtomicUsize,
        status_times: Mutex<Vec<Instant>>,
    }

    impl ScriptedApi {
        fn with_statuses(statuses: Vec<StatusReport>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into_iter().map(Ok).collect()),
                ..Default::default()
            }
        }

        fn with_downloads(downloads: Vec<Result<PathBuf, DownloadFailure>>) -> Self {
            Self {
                downloads: Mutex::new(downloads.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl JobApi for ScriptedApi {
        async fn submit(&self, _request: &SubmitRequest) -> RenderResult<String> {
            Ok("job-1".to_string())
        }

        async fn status(&self, job_id: &str) -> RenderResult<StatusReport> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.status_times.lock().unwrap().push(Instant::now());
            let mut q = self.statuses.lock().unwrap();
            if q.len() > 1 {
                return q.pop_front().unwrap();
            }
            if let Some(Ok(last)) = q.front() {
                return Ok(last.clone());
            }
            q.pop_front().unwrap_or_else(|| {
                Err(RenderError::StatusCheck {
                    job_id: job_id.to_string(),
                    message: "script empty".into(),
                })
            })
        }

        async fn download(&self, _url: &str, dest: &Path) -> Result<PathBuf, DownloadFailure> {
            self.download_calls.fetch_add(1, Ordering::SeqCst);
            self.downloads
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(dest.to_path_buf()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn processing_twice_then_completed() {
        let api = ScriptedApi::with_statuses(vec![
            StatusReport::processing(),
            StatusReport::processing(),
            StatusReport::completed("https://cdn.example/v.mp4"),
        ]);
        let runner = JobRunner::new(api);
        let start = Instant::now();
        let mut job = GenerationJob::submitted("job-1");

        let url = runner.poll(&mut job).await.unwrap();

        assert_eq!(url, "https://cdn.example/v.mp4");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(runner.api().status_calls.load(Ordering::SeqCst), 3);
        let times = runner.api().status_times.lock().unwrap().clone();
        assert_eq!(times[0] - start, Duration::from_secs(30));
        assert_eq!(times[1] - times[0], Duration::from_secs(10));
        assert_eq!(times[2] - times[1], Duration::from_secs(10));
        assert_eq!(start.elapsed(), Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn never_terminal_times_out_within_ceiling_plus_interval() {
        let api = ScriptedApi::with_statuses(vec![StatusReport::processing()]);
        let runner = JobRunner::new(api);
        let start = Instant::now();
        let mut job = GenerationJob::submitted("job-slow");

        let err = runner.poll(&mut job).await.unwrap_err();

        match err {
            RenderError::PollTimeout { job_id, .. } => assert_eq!(job_id, "job-slow"),
            other => panic!("unexpected error: {other}"),
        }
        let t = JobTimings::default();
        assert!(start.elapsed() <= t.grace + t.ceiling + t.poll_interval);
        assert_eq!(runner.api().status_calls.load(Ordering::SeqCst), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_status_is_terminal() {
        let api = ScriptedApi::with_statuses(vec![
            StatusReport::processing(),
            StatusReport::failed("avatar not found"),
        ]);
        let runner = JobRunner::new(api);
        let mut job = GenerationJob::submitted("job-2");

        let err = runner.poll(&mut job).await.unwrap_err();

        match err {
            RenderError::GenerationFailed { job_id, detail } => {
                assert_eq!(job_id, "job-2");
                assert_eq!(detail, "avatar not found");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.api().status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn status_check_error_propagates_immediately() {
        let api = ScriptedApi {
            statuses: Mutex::new(
                vec![
                    Ok(StatusReport::processing()),
                    Err(RenderError::StatusCheck {
                        job_id: "job-3".into(),
                        message: "connection reset".into(),
                    }),
                    Ok(StatusReport::completed("never reached")),
                ]
                .into(),
            ),
            ..Default::default()
        };
        let runner = JobRunner::new(api);
        let mut job = GenerationJob::submitted("job-3");

        let err = runner.poll(&mut job).await.unwrap_err();

        assert!(matches!(err, RenderError::StatusCheck { .. }));
        assert_eq!(runner.api().status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn download_succeeds_on_third_attempt() {
        let dest = PathBuf::from("/tmp/out.mp4");
        let api = ScriptedApi::with_downloads(vec![
            Err(DownloadFailure::Transient("reset".into())),
            Err(DownloadFailure::Transient("reset".into())),
            Ok(dest.clone()),
            Err(DownloadFailure::Transient("a fourth call must not happen".into())),
        ]);
        let runner = JobRunner::new(api);
        let start = Instant::now();

        let out = runner.download("https://cdn.example/v.mp4", &dest).await.unwrap();

        assert_eq!(out, dest);
        assert_eq!(runner.api().download_calls.load(Ordering::SeqCst), 3);
        // 4s after the first failure, 8s after the second
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn download_exhaustion_surfaces_last_error() {
        let api = ScriptedApi::with_downloads(vec![
            Err(DownloadFailure::Transient("first".into())),
            Err(DownloadFailure::Transient("second".into())),
            Err(DownloadFailure::Transient("third".into())),
            Ok(PathBuf::from("/tmp/unreachable")),
        ]);
        let runner = JobRunner::new(api);

        let err = runner.download("u", Path::new("/tmp/x")).await.unwrap_err();

        match err {
            RenderError::Download { attempts, message } => {
                assert_eq!(attempts, 3);
                assert_eq!(message, "third");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.api().download_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn http_error_status_is_not_retried() {
        let api = ScriptedApi::with_downloads(vec![Err(DownloadFailure::Permanent(
            "HTTP 404 Not Found".into(),
        ))]);
        let runner = JobRunner::new(api);

        let err = runner.download("u", Path::new("/tmp/x")).await.unwrap_err();

        assert!(matches!(err, RenderError::Download { attempts: 1, .. }));
        assert_eq!(runner.api().download_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1), Duration::from_secs(4));
        assert_eq!(p.backoff(2), Duration::from_secs(8));
        assert_eq!(p.backoff(3), Duration::from_secs(10));
        assert_eq!(p.backoff(40), Duration::from_secs(10));
    }

    #[test]
    fn terminal_state_is_sticky() {
        let mut job = GenerationJob::submitted("j");
        job.apply(StatusReport::completed("u"));
        job.apply(StatusReport::failed("late"));
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn run_drives_full_lifecycle() {
        let api = ScriptedApi::with_statuses(vec![StatusReport::completed("https://cdn/x.mp4")]);
        let runner = JobRunner::new(api).with_timings(JobTimings {
            grace: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            ceiling: Duration::from_secs(5),
        });
        let req = SubmitRequest {
            text: "hello there world".into(),
            avatar_id: "a".into(),
            voice_id: "v".into(),
        };
        let out = runner.run(&req, Path::new("/tmp/dest.mp4")).await.unwrap();
        assert_eq!(out, PathBuf::from("/tmp/dest.mp4"));
        assert_eq!(runner.api().download_calls.load(Ordering::SeqCst), 1);
    }
}
