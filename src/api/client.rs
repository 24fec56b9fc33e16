//! REST client for the SOOS analysis service.
//!
//! [`SoosClient`] implements [`AnalysisService`] over HTTP: scan record
//! creation, file upload, scan start, status updates and the bounded polling
//! loop. File discovery stays local and delegates to [`crate::api::discovery`].

use crate::api::discovery;
use crate::model::{
    DiscoveredFiles, FileDiscoveryRequest, ScanContext, ScanStatus, ScanStatusReport, ScanType,
    SetupScanRequest, UploadOutcome,
};
use crate::scan::UPLOAD_ERROR_MESSAGE;
use crate::traits::{AnalysisService, ServiceError};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "x-soos-apikey";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30 * 60);

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupScanBody<'a> {
    project_name: &'a str,
    branch: &'a str, // empty string when source control had no branch
    commit_hash: Option<&'a str>,
    build_version: Option<&'a str>,
    integration_name: &'a str,
    integration_type: &'a str,
    script_version: &'a str,
    contributing_developer_audit: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestUploadBody<'a> {
    name: &'a str,
    package_manager: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileHashesBody<'a> {
    file_hashes: Vec<FileHashEntry<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileHashEntry<'a> {
    name: &'a str,
    sha256: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdateBody<'a> {
    status: ScanStatus,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Maps non-2xx responses to [`ServiceError::Api`], preferring the service's
/// own `message` field over the raw body.
async fn check_response(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body.trim().to_string()
            }
        });
    Err(ServiceError::Api {
        status: status.as_u16(),
        message,
    })
}

// ============================================================================
// Client
// ============================================================================

/// HTTP implementation of [`AnalysisService`].
///
/// Holds one shared [`reqwest::Client`]; cloning the struct is cheap and
/// shares the connection pool.
#[derive(Clone)]
pub struct SoosClient {
    http: Client,
    base_url: Url,
    api_key: String,
    poll_interval: Duration,
    max_wait: Duration,
}

// The API key stays out of Debug output.
impl std::fmt::Debug for SoosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoosClient")
            .field("base_url", &self.base_url.as_str())
            .field("poll_interval", &self.poll_interval)
            .field("max_wait", &self.max_wait)
            .finish_non_exhaustive()
    }
}

impl SoosClient {
    /// Creates a client for `base_url` authenticating with `api_key`.
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Result<Self, ServiceError> {
        // A trailing slash keeps Url::join from swallowing the last path
        // segment of the base.
        let mut normalized = base_url.trim_end_matches('/').to_string();
        normalized.push('/');
        let base = Url::parse(&normalized)
            .map_err(|_| ServiceError::InvalidUrl(base_url.to_string()))?;
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("soos-scan/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base,
            api_key: api_key.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        })
    }

    /// Sets the delay between status polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the maximum total time to wait for a scan to finish.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|_| ServiceError::InvalidUrl(path.to_string()))
    }

    fn scan_path(context: &ScanContext, client_id: &str) -> String {
        format!(
            "clients/{client_id}/scan-types/{}/scans/{}",
            context.scan_type, context.analysis_id
        )
    }

    async fn post_json<B: Serialize>(&self, url: Url, body: &B) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }

    async fn fetch_status(&self, url: Url) -> Result<ScanStatusReport, ServiceError> {
        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let response = check_response(response).await?;
        Ok(response.json::<ScanStatusReport>().await?)
    }
}

#[async_trait]
impl AnalysisService for SoosClient {
    #[instrument(skip(self, request), fields(project = %request.project_name))]
    async fn setup_scan(&self, request: &SetupScanRequest) -> Result<ScanContext, ServiceError> {
        let url = self.endpoint(&format!(
            "clients/{}/scan-types/{}/scans",
            request.client_id, request.scan_type
        ))?;
        let body = SetupScanBody {
            project_name: &request.project_name,
            branch: request.branch_name.as_deref().unwrap_or(""),
            commit_hash: request.commit_hash.as_deref(),
            build_version: None,
            integration_name: &request.integration.integration_name,
            integration_type: &request.integration.integration_type,
            script_version: &request.integration.script_version,
            contributing_developer_audit: Vec::new(),
        };
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_response(response).await?;
        let context = response.json::<ScanContext>().await?;
        debug!(analysis_id = %context.analysis_id, "scan record created");
        Ok(context)
    }

    async fn find_manifests_and_hashable_files(
        &self,
        request: &FileDiscoveryRequest,
    ) -> Result<DiscoveredFiles, ServiceError> {
        info!(
            path = %request.source_code_path.display(),
            match_type = ?request.file_match_type,
            "searching for manifests and hashable files"
        );
        let request = request.clone();
        tokio::task::spawn_blocking(move || {
            discovery::discover_files(
                &request.source_code_path,
                &request.files_to_exclude,
                &request.directories_to_exclude,
                &request.package_managers,
                request.file_match_type,
            )
        })
        .await
        .map_err(|e| {
            ServiceError::Io(std::io::Error::other(format!("discovery task failed: {e}")))
        })
    }

    #[instrument(skip_all, fields(analysis_id = %context.analysis_id))]
    async fn add_manifests_and_hashable_files_to_scan(
        &self,
        context: &ScanContext,
        client_id: &str,
        files: &DiscoveredFiles,
    ) -> Result<UploadOutcome, ServiceError> {
        let mut uploaded = 0usize;
        let mut failed = 0usize;
        let mut last_error: Option<String> = None;

        for manifest in &files.manifest_files {
            let content = match std::fs::read_to_string(&manifest.path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %manifest.path.display(), error = %e, "could not read manifest");
                    failed += 1;
                    continue;
                }
            };
            let url =
                self.endpoint(&format!("{}/manifests", Self::scan_path(context, client_id)))?;
            let body = ManifestUploadBody {
                name: &manifest.name,
                package_manager: &manifest.package_manager,
                content: &content,
            };
            match self.post_json(url, &body).await {
                Ok(()) => uploaded += 1,
                Err(e) => {
                    warn!(file = %manifest.name, error = %e, "manifest upload failed");
                    last_error = Some(match &e {
                        ServiceError::Api { message, .. } => message.clone(),
                        other => other.to_string(),
                    });
                    failed += 1;
                }
            }
        }

        if !files.hashable_files.is_empty() {
            let url = self.endpoint(&format!("{}/hashes", Self::scan_path(context, client_id)))?;
            let file_hashes = files
                .hashable_files
                .iter()
                .map(|file| FileHashEntry {
                    name: &file.name,
                    sha256: &file.sha256,
                })
                .collect();
            match self.post_json(url, &FileHashesBody { file_hashes }).await {
                Ok(()) => uploaded += files.hashable_files.len(),
                Err(e) => {
                    warn!(error = %e, "file hash upload failed");
                    last_error = Some(match &e {
                        ServiceError::Api { message, .. } => message.clone(),
                        other => other.to_string(),
                    });
                    failed += files.hashable_files.len();
                }
            }
        }

        if uploaded == 0 && failed > 0 {
            // Nothing was accepted, so the record can never progress; mark it
            // Incomplete here rather than leaving that to the caller.
            warn!("no files were accepted by the service");
            if let Err(e) = self
                .update_scan_status(context, client_id, ScanStatus::Incomplete, UPLOAD_ERROR_MESSAGE)
                .await
            {
                warn!(error = %e, "could not mark scan incomplete after failed upload");
            }
            let message = last_error.unwrap_or_else(|| UPLOAD_ERROR_MESSAGE.to_string());
            return Ok(UploadOutcome::failed(message));
        }

        if failed > 0 {
            warn!(uploaded, failed, "some files failed to upload");
        } else {
            info!(uploaded, "all files uploaded");
        }
        Ok(UploadOutcome::success())
    }

    async fn start_scan(
        &self,
        context: &ScanContext,
        client_id: &str,
    ) -> Result<(), ServiceError> {
        let url = self.endpoint(&Self::scan_path(context, client_id))?;
        let response = self
            .http
            .put(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        check_response(response).await?;
        info!(scan_url = %context.scan_url, "scan started");
        Ok(())
    }

    async fn update_scan_status(
        &self,
        context: &ScanContext,
        client_id: &str,
        status: ScanStatus,
        message: &str,
    ) -> Result<(), ServiceError> {
        let url = Url::parse(&context.scan_status_url)
            .map_err(|_| ServiceError::InvalidUrl(context.scan_status_url.clone()))?;
        let body = StatusUpdateBody { status, message };
        let response = self
            .http
            .patch(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;
        check_response(response).await?;
        debug!(client = client_id, %status, "scan status updated");
        Ok(())
    }

    #[instrument(skip_all, fields(analysis_id = %context.analysis_id))]
    async fn wait_for_scan_to_finish(
        &self,
        context: &ScanContext,
        client_id: &str,
    ) -> Result<ScanStatusReport, ServiceError> {
        let url = Url::parse(&context.scan_status_url)
            .map_err(|_| ServiceError::InvalidUrl(context.scan_status_url.clone()))?;
        debug!(client = client_id, "waiting for scan to finish");
        let started = Instant::now();
        loop {
            match self.fetch_status(url.clone()).await {
                Ok(report) if report.status.is_terminal() => {
                    if report.status.is_failure() {
                        let message = report.message.clone().unwrap_or_else(|| {
                            format!("Scan failed with status {}.", report.status)
                        });
                        return Err(ServiceError::ScanFailed { message });
                    }
                    info!(status = %report.status, "scan finished");
                    return Ok(report);
                }
                Ok(report) => {
                    debug!(
                        status = %report.status,
                        elapsed = ?started.elapsed(),
                        "scan still in progress"
                    );
                }
                // Transient poll failures are retried within the deadline.
                Err(e) => warn!(error = %e, "status poll failed, will retry"),
            }
            if started.elapsed() + self.poll_interval > self.max_wait {
                return Err(ServiceError::Timeout(self.max_wait));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn final_status_message(
        &self,
        scan_type: ScanType,
        report: &ScanStatusReport,
        scan_url: &str,
        verbose: bool,
    ) -> Vec<String> {
        format_final_status_message(scan_type, report, scan_url, verbose)
    }
}

// ============================================================================
// Result Formatting
// ============================================================================

/// Renders the user-facing summary lines for a terminal scan report.
pub fn format_final_status_message(
    scan_type: ScanType,
    report: &ScanStatusReport,
    scan_url: &str,
    verbose: bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    match report.status {
        ScanStatus::Finished => {
            lines.push(format!("{} scan completed successfully.", scan_type.label()))
        }
        ScanStatus::FinishedWithIssues => {
            lines.push(format!("{} scan completed with issues.", scan_type.label()))
        }
        other => lines.push(format!(
            "{} scan completed with status {other}.",
            scan_type.label()
        )),
    }
    if report.vulnerabilities > 0 || report.violations > 0 {
        lines.push(format!(
            "Found {} vulnerabilities and {} violations.",
            report.vulnerabilities, report.violations
        ));
    }
    if let Some(message) = report.message.as_deref() {
        if !message.is_empty() {
            lines.push(message.to_string());
        }
    }
    lines.push(format!("View the scan results at {scan_url}"));
    if verbose {
        lines.push(format!("Scan status: {}.", report.status));
    }
    lines
}
