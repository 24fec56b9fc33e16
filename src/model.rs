use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Scan configuration resolved from settings, stored credentials,
/// environment and source-control state. Built once per scan invocation
/// and read-only afterwards.
#[derive(Debug, Clone)]
pub struct AnalysisArguments {
    pub api_key: String,
    pub client_id: String,
    pub project_name: String,
    pub api_url: String,
    pub files_to_exclude: Vec<String>,
    pub directories_to_exclude: Vec<String>,
    pub package_managers: Vec<String>,
    pub file_match_type: FileMatchType,
    pub branch_name: Option<String>, // None when source control is unavailable
    pub commit_hash: Option<String>, // None when the repository has no commits yet
    pub integration: IntegrationMeta,
}

impl AnalysisArguments {
    /// Both credentials present and non-blank. The workflow must not start
    /// without them.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.client_id.trim().is_empty()
    }
}

/// Identity of this tool as reported to the analysis service at setup time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationMeta {
    pub integration_name: String,
    pub integration_type: String,
    pub script_version: String, // tool build version, supplied by the caller
}

impl IntegrationMeta {
    /// Metadata for a script-style integration running this crate's workflow.
    pub fn script(version: impl Into<String>) -> Self {
        Self {
            integration_name: "SoosSca".to_string(),
            integration_type: "Script".to_string(),
            script_version: version.into(),
        }
    }
}

/// Kind of analysis performed by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanType {
    #[default]
    Sca,
}

impl ScanType {
    /// Short human label used in result messages.
    pub fn label(&self) -> &'static str {
        match self {
            ScanType::Sca => "SCA",
        }
    }
}

impl fmt::Display for ScanType {
    // Lowercase form used in API routes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanType::Sca => write!(f, "sca"),
        }
    }
}

/// Remote lifecycle state of a scan record.
///
/// The service reports these as plain strings; anything unrecognized maps to
/// `Unknown` so newly introduced states never break polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScanStatus {
    Unknown,
    Queued,
    Manifest,
    Running,
    Finished,
    FinishedWithIssues,
    Incomplete,
    Error,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Unknown => "Unknown",
            ScanStatus::Queued => "Queued",
            ScanStatus::Manifest => "Manifest",
            ScanStatus::Running => "Running",
            ScanStatus::Finished => "Finished",
            ScanStatus::FinishedWithIssues => "FinishedWithIssues",
            ScanStatus::Incomplete => "Incomplete",
            ScanStatus::Error => "Error",
        }
    }

    /// Terminal states end the polling loop.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Finished
                | ScanStatus::FinishedWithIssues
                | ScanStatus::Incomplete
                | ScanStatus::Error
        )
    }

    /// Terminal states that represent a failed scan.
    pub fn is_failure(&self) -> bool {
        matches!(self, ScanStatus::Incomplete | ScanStatus::Error)
    }
}

impl From<String> for ScanStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Queued" => ScanStatus::Queued,
            "Manifest" => ScanStatus::Manifest,
            "Running" => ScanStatus::Running,
            "Finished" => ScanStatus::Finished,
            "FinishedWithIssues" => ScanStatus::FinishedWithIssues,
            "Incomplete" => ScanStatus::Incomplete,
            "Error" => ScanStatus::Error,
            _ => ScanStatus::Unknown,
        }
    }
}

impl From<ScanStatus> for String {
    fn from(status: ScanStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which discovery categories decide whether a scan is viable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileMatchType {
    #[default]
    Manifest,
    FileHash,
    ManifestAndFileHash,
}

impl FromStr for FileMatchType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "manifest" => Ok(FileMatchType::Manifest),
            "filehash" => Ok(FileMatchType::FileHash),
            "manifestandfilehash" => Ok(FileMatchType::ManifestAndFileHash),
            _ => Err(format!(
                "invalid file match type '{raw}' (expected Manifest, FileHash or ManifestAndFileHash)"
            )),
        }
    }
}

/// Identifiers and locators minted by the service when a scan record is
/// created. Produced once by setup and threaded read-only through every
/// later stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanContext {
    pub project_hash: String,
    pub branch_hash: String,
    pub analysis_id: String,
    pub scan_url: String,
    pub scan_status_url: String,
    #[serde(default)]
    pub scan_type: ScanType,
}

/// Inputs for scan record creation, assembled from the resolved arguments.
#[derive(Debug, Clone)]
pub struct SetupScanRequest {
    pub client_id: String,
    pub project_name: String,
    pub branch_name: Option<String>,
    pub commit_hash: Option<String>,
    pub integration: IntegrationMeta,
    pub scan_type: ScanType,
}

/// Inputs for the local file walk.
#[derive(Debug, Clone)]
pub struct FileDiscoveryRequest {
    pub client_id: String,
    pub project_hash: String,
    pub files_to_exclude: Vec<String>,
    pub directories_to_exclude: Vec<String>,
    pub package_managers: Vec<String>,
    pub file_match_type: FileMatchType,
    pub source_code_path: PathBuf,
}

/// A dependency declaration file matched by the package-manager table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub path: PathBuf,           // absolute path on disk
    pub name: String,            // file name as uploaded
    pub package_manager: String, // e.g. "Cargo", "NPM"
}

/// A file scanned by content digest rather than manifest parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashableFile {
    pub path: PathBuf,
    pub name: String,
    pub sha256: String, // lowercase hex digest of file contents
}

/// Outcome of the local file walk. Both lists may be empty; emptiness under
/// the active [`FileMatchType`] is the workflow's defined failure condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredFiles {
    pub manifest_files: Vec<ManifestFile>,
    pub hashable_files: Vec<HashableFile>,
}

impl DiscoveredFiles {
    pub fn is_empty(&self) -> bool {
        self.manifest_files.is_empty() && self.hashable_files.is_empty()
    }
}

/// Result of the upload stage. A non-zero exit code means nothing was
/// accepted by the service; partial success still reports zero.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub exit_code: i32,
    pub error_message: Option<String>,
}

impl UploadOutcome {
    pub fn success() -> Self {
        Self {
            exit_code: 0,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            error_message: Some(message.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.exit_code != 0
    }
}

/// Snapshot of a scan record's status as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatusReport {
    pub status: ScanStatus,
    #[serde(default)]
    pub vulnerabilities: u32,
    #[serde(default)]
    pub violations: u32,
    #[serde(default)]
    pub message: Option<String>,
}

impl ScanStatusReport {
    pub fn with_status(status: ScanStatus) -> Self {
        Self {
            status,
            vulnerabilities: 0,
            violations: 0,
            message: None,
        }
    }
}
