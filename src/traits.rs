use crate::model::{
    DiscoveredFiles, FileDiscoveryRequest, ScanContext, ScanStatus, ScanStatusReport, ScanType,
    SetupScanRequest, UploadOutcome,
};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service responded {status}: {message}")]
    Api { status: u16, message: String },
    #[error("scan failed: {message}")]
    ScanFailed { message: String },
    #[error("scan did not finish within {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
}

/// Remote analysis service surface consumed by the scan workflow.
///
/// One implementation speaks to the real REST service; tests substitute
/// recording fakes. Every remote operation is asynchronous and may fail
/// with [`ServiceError`]; sequencing and failure policy belong to the
/// orchestrator, not to implementations.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Creates a new scan record and returns its identifiers.
    ///
    /// Not idempotent: a retry creates a duplicate record, so callers must
    /// not retry this call on failure.
    async fn setup_scan(&self, request: &SetupScanRequest) -> Result<ScanContext, ServiceError>;

    /// Enumerates dependency manifests and hashable files under the request's
    /// source path. Local read only; no remote side effects.
    async fn find_manifests_and_hashable_files(
        &self,
        request: &FileDiscoveryRequest,
    ) -> Result<DiscoveredFiles, ServiceError>;

    /// Uploads discovered files to the scan record.
    ///
    /// Individual file failures are tolerated. When nothing uploads at all,
    /// the implementation marks the record `Incomplete` itself and reports a
    /// non-zero exit code with an error message.
    async fn add_manifests_and_hashable_files_to_scan(
        &self,
        context: &ScanContext,
        client_id: &str,
        files: &DiscoveredFiles,
    ) -> Result<UploadOutcome, ServiceError>;

    /// Transitions the scan record from "files received" to running. Only
    /// valid once at least one file has been uploaded.
    async fn start_scan(&self, context: &ScanContext, client_id: &str)
        -> Result<(), ServiceError>;

    /// Sets the record's status together with a human-readable message.
    async fn update_scan_status(
        &self,
        context: &ScanContext,
        client_id: &str,
        status: ScanStatus,
        message: &str,
    ) -> Result<(), ServiceError>;

    /// Polls the record until a terminal status and returns the final
    /// report. Raises on terminal failure states and when the maximum wait
    /// is exceeded. Potentially long-running (minutes).
    async fn wait_for_scan_to_finish(
        &self,
        context: &ScanContext,
        client_id: &str,
    ) -> Result<ScanStatusReport, ServiceError>;

    /// Renders the user-facing summary lines for a terminal report.
    fn final_status_message(
        &self,
        scan_type: ScanType,
        report: &ScanStatusReport,
        scan_url: &str,
        verbose: bool,
    ) -> Vec<String>;
}
