//! Scan workflow orchestrator.
//!
//! This module provides the [`ScanOrchestrator`] coordinator that drives a
//! single scan from record creation to the final result message:
//! - Credential gate before any remote call
//! - Sequential stages (Setup → Discovery → Upload → Start → Poll)
//! - Discovery-empty and upload-failure abort policy with a compensating
//!   `Incomplete` status update
//! - Progress reporting via [`ProgressReporter`]
//! - Markdown link rewriting of the final message

use crate::markdown::convert_links_to_markdown;
use crate::model::{
    AnalysisArguments, DiscoveredFiles, FileDiscoveryRequest, FileMatchType, ScanStatus, ScanType,
    SetupScanRequest,
};
use crate::progress::ProgressReporter;
use crate::traits::{AnalysisService, ServiceError};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Message used when no discovered file uploads successfully.
pub const UPLOAD_ERROR_MESSAGE: &str = "Error uploading manifests";

/// Message used when `fileMatchType = Manifest` finds no manifests.
pub const NO_MANIFESTS_MESSAGE: &str = "No valid files found, cannot continue. For more help, \
     please visit https://kb.soos.io/help/error-no-valid-manifests-found";

/// Message used when `fileMatchType = FileHash` finds no hashable files.
pub const NO_HASHABLE_FILES_MESSAGE: &str = "No valid files to hash were found, cannot continue. \
     For more help, please visit https://kb.soos.io/help/error-no-valid-files-to-hash-found";

/// Message used when `fileMatchType = ManifestAndFileHash` finds nothing at all.
pub const NO_FILES_AT_ALL_MESSAGE: &str = "No valid files found, cannot continue. For more help, \
     please visit https://kb.soos.io/help/error-no-valid-manifests-found and \
     https://kb.soos.io/help/error-no-valid-files-to-hash-found";

// ============================================================================
// Errors
// ============================================================================

/// Failures surfaced by a scan run.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A credential was blank; no remote call was made.
    #[error(
        "'{name}' is required. Please configure your SOOS credentials first: \
         run `soos-scan configure-secrets`."
    )]
    MissingCredential { name: &'static str },

    /// Discovery found nothing under the active match type. The remote scan
    /// record has been marked `Incomplete`.
    #[error("{message}")]
    NoMatchingFiles { message: String },

    /// No discovered file was accepted by the service. The upload operation
    /// has already marked the record `Incomplete`.
    #[error("{message}")]
    UploadFailed { message: String },

    /// Any other service failure, surfaced as-is.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Returns the abort message for an empty discovery result, or `None` when
/// the result satisfies the match type.
///
/// Partial results satisfy `ManifestAndFileHash`: only both sequences being
/// empty aborts.
pub fn empty_discovery_error(
    match_type: FileMatchType,
    files: &DiscoveredFiles,
) -> Option<&'static str> {
    match match_type {
        FileMatchType::Manifest if files.manifest_files.is_empty() => Some(NO_MANIFESTS_MESSAGE),
        FileMatchType::FileHash if files.hashable_files.is_empty() => {
            Some(NO_HASHABLE_FILES_MESSAGE)
        }
        FileMatchType::ManifestAndFileHash if files.is_empty() => Some(NO_FILES_AT_ALL_MESSAGE),
        _ => None,
    }
}

fn missing_credential(arguments: &AnalysisArguments) -> Option<&'static str> {
    if arguments.api_key.trim().is_empty() {
        return Some("apiKey");
    }
    if arguments.client_id.trim().is_empty() {
        return Some("clientId");
    }
    None
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives one scan through its stages against an [`AnalysisService`].
///
/// The orchestrator holds no state between runs; every call to [`run`]
/// creates a brand-new remote scan record. Sequencing and abort policy live
/// here, remote mechanics live in the service implementation.
///
/// # Example
///
/// ```ignore
/// use soos_scan::api::SoosClient;
/// use soos_scan::progress::ConsoleReporter;
/// use soos_scan::scan::ScanOrchestrator;
///
/// let client = SoosClient::new(api_key, "https://api.soos.io/api")?;
/// let orchestrator = ScanOrchestrator::new(client).with_verbose(true);
/// let message = orchestrator.run(&arguments, path, &ConsoleReporter).await?;
/// println!("{message}");
/// ```
///
/// [`run`]: ScanOrchestrator::run
pub struct ScanOrchestrator<S> {
    service: S,
    verbose: bool,
}

impl<S: AnalysisService> ScanOrchestrator<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            verbose: false,
        }
    }

    /// Includes the raw scan status in the final message.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Runs one complete scan and returns the final user-facing message with
    /// URLs rewritten as markdown links.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] when a credential is blank, when discovery finds
    /// nothing under the active match type, when no file uploads, or when any
    /// remote stage fails.
    #[instrument(skip_all, fields(project = %arguments.project_name))]
    pub async fn run(
        &self,
        arguments: &AnalysisArguments,
        source_code_path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<String, ScanError> {
        if let Some(name) = missing_credential(arguments) {
            return Err(ScanError::MissingCredential { name });
        }

        info!(path = %source_code_path.display(), "starting scan");
        progress.report(0, "Initializing scan...");

        // ====================================================================
        // Stage 1: Scan record creation
        // ====================================================================
        //
        // Not idempotent on the remote side: a retry would create a duplicate
        // scan record, so a failure here propagates without retrying.

        progress.report(25, "Creating scan...");
        let setup = SetupScanRequest {
            client_id: arguments.client_id.clone(),
            project_name: arguments.project_name.clone(),
            branch_name: arguments.branch_name.clone(),
            commit_hash: arguments.commit_hash.clone(),
            integration: arguments.integration.clone(),
            scan_type: ScanType::Sca,
        };
        let context = self.service.setup_scan(&setup).await?;
        debug!(
            analysis_id = %context.analysis_id,
            scan_url = %context.scan_url,
            "scan record created"
        );

        // ====================================================================
        // Stage 2: File discovery
        // ====================================================================

        progress.report(50, "Locating manifests...");
        let request = FileDiscoveryRequest {
            client_id: arguments.client_id.clone(),
            project_hash: context.project_hash.clone(),
            files_to_exclude: arguments.files_to_exclude.clone(),
            directories_to_exclude: arguments.directories_to_exclude.clone(),
            package_managers: arguments.package_managers.clone(),
            file_match_type: arguments.file_match_type,
            source_code_path: source_code_path.to_path_buf(),
        };
        let files = self.service.find_manifests_and_hashable_files(&request).await?;
        info!(
            manifests = files.manifest_files.len(),
            hashable = files.hashable_files.len(),
            "file discovery finished"
        );

        if let Some(message) = empty_discovery_error(arguments.file_match_type, &files) {
            // Without this update the remote record would stay in progress
            // forever. The update's own failure is logged and swallowed so it
            // cannot mask the discovery error.
            warn!("{message}");
            if let Err(e) = self
                .service
                .update_scan_status(&context, &arguments.client_id, ScanStatus::Incomplete, message)
                .await
            {
                warn!(error = %e, "could not mark scan incomplete");
            }
            return Err(ScanError::NoMatchingFiles {
                message: message.to_string(),
            });
        }

        // ====================================================================
        // Stage 3: Upload
        // ====================================================================

        let outcome = self
            .service
            .add_manifests_and_hashable_files_to_scan(&context, &arguments.client_id, &files)
            .await?;
        if outcome.is_failure() {
            // The upload operation marks the record Incomplete itself; a
            // second status update here would be a duplicate.
            let message = outcome
                .error_message
                .unwrap_or_else(|| UPLOAD_ERROR_MESSAGE.to_string());
            return Err(ScanError::UploadFailed { message });
        }

        // ====================================================================
        // Stage 4: Start and poll
        // ====================================================================

        progress.report(75, "Starting Scan...");
        self.service.start_scan(&context, &arguments.client_id).await?;
        let report = self
            .service
            .wait_for_scan_to_finish(&context, &arguments.client_id)
            .await?;

        progress.report(100, "Scan finished!");
        let lines = self.service.final_status_message(
            context.scan_type,
            &report,
            &context.scan_url,
            self.verbose,
        );
        Ok(convert_links_to_markdown(&lines.join("\n")))
    }
}

// ============================================================================
// Tests
// ============================================================================
