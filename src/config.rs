//! Persistent settings, stored credentials and per-invocation argument
//! resolution.
//!
//! Precedence when resolving a scan: command-line overrides, then
//! environment variables, then the settings and secrets files, then
//! defaults. Validation distinguishes missing credentials (fix with
//! `configure-secrets`) from any other missing field (fix with
//! `configure`); callers surface these messages without rewording them.

use crate::git::discover_git_context;
use crate::model::{AnalysisArguments, FileMatchType, IntegrationMeta};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "https://api.soos.io/api";

pub const ENV_API_KEY: &str = "SOOS_API_KEY";
pub const ENV_CLIENT_ID: &str = "SOOS_CLIENT_ID";
pub const ENV_PROJECT_NAME: &str = "SOOS_PROJECT_NAME";
pub const ENV_API_URL: &str = "SOOS_API_URL";

const SETTINGS_FILE: &str = "settings.json";
const SECRETS_FILE: &str = "secrets.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    /// Credential class: remediation is the `configure-secrets` command.
    #[error("'{name}' is required. Please configure your SOOS credentials first: run `soos-scan configure-secrets`.")]
    MissingCredential { name: &'static str },
    /// General class: remediation is the `configure` command.
    #[error("'{name}' is required. Please configure the scanner first: run `soos-scan configure`.")]
    MissingField { name: &'static str },
    #[error("could not determine a configuration directory for this platform")]
    NoConfigDir,
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration file {path}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode configuration for {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    fn read(path: PathBuf, source: std::io::Error) -> Self {
        ConfigError::Read { path, source }
    }

    fn write(path: PathBuf, source: std::io::Error) -> Self {
        ConfigError::Write { path, source }
    }
}

/// Persistent scanner settings, stored as JSON in the configuration
/// directory. Everything here has a usable default; credentials live in a
/// separate file (see [`Secrets`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub project_name: Option<String>,
    pub api_url: Option<String>,
    pub files_to_exclude: Vec<String>,
    pub directories_to_exclude: Vec<String>,
    pub package_managers: Vec<String>,
    pub file_match_type: FileMatchType,
}

/// Stored API credentials. Kept out of [`Settings`] so the settings file
/// can be shared or checked in without leaking secrets.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Secrets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

// Credential values stay out of Debug output.
impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("client_id", &self.client_id.as_ref().map(|_| "<set>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// Reads and writes the settings and secrets files under one directory.
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Opens the per-user configuration directory for this tool.
    pub fn open() -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from("io", "soos", "soos-scan").ok_or(ConfigError::NoConfigDir)?;
        Ok(Self {
            dir: dirs.config_dir().to_path_buf(),
        })
    }

    /// Uses an explicit directory instead of the platform default.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.dir.join(SECRETS_FILE)
    }

    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        self.read_json(self.settings_path())
    }

    pub fn load_secrets(&self) -> Result<Secrets, ConfigError> {
        self.read_json(self.secrets_path())
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<PathBuf, ConfigError> {
        self.write_json(self.settings_path(), settings)
    }

    pub fn save_secrets(&self, secrets: &Secrets) -> Result<PathBuf, ConfigError> {
        fs::create_dir_all(&self.dir)
            .map_err(|source| ConfigError::write(self.dir.clone(), source))?;
        let path = self.secrets_path();
        let raw = serde_json::to_string_pretty(secrets).map_err(|source| ConfigError::Encode {
            path: path.clone(),
            source,
        })?;
        write_restricted(&path, &raw).map_err(|source| ConfigError::write(path.clone(), source))?;
        Ok(path)
    }

    /// Removes stored credentials. Returns whether a secrets file existed.
    pub fn clear_secrets(&self) -> Result<bool, ConfigError> {
        let path = self.secrets_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ConfigError::write(path, source)),
        }
    }

    fn read_json<T>(&self, path: PathBuf) -> Result<T, ConfigError>
    where
        T: Default + for<'de> Deserialize<'de>,
    {
        match fs::read_to_string(&path) {
            Ok(raw) => {
                serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed { path, source })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "configuration file not found, using defaults");
                Ok(T::default())
            }
            Err(source) => Err(ConfigError::read(path, source)),
        }
    }

    fn write_json<T: Serialize>(&self, path: PathBuf, value: &T) -> Result<PathBuf, ConfigError> {
        fs::create_dir_all(&self.dir).map_err(|source| ConfigError::write(self.dir.clone(), source))?;
        let raw = serde_json::to_string_pretty(value).map_err(|source| ConfigError::Encode {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, raw).map_err(|source| ConfigError::write(path.clone(), source))?;
        Ok(path)
    }
}

// The secrets file is owner-only from the moment it exists.
#[cfg(unix)]
fn write_restricted(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() applies only at creation; a pre-existing file keeps its old
    // permissions unless tightened here.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents.as_bytes())
}

#[cfg(not(unix))]
fn write_restricted(path: &Path, contents: &str) -> std::io::Result<()> {
    fs::write(path, contents)
}

/// Per-invocation overrides supplied on the command line. Anything set here
/// wins over environment variables and the settings file.
#[derive(Debug, Clone, Default)]
pub struct ScanOverrides {
    pub project_name: Option<String>,
    pub api_url: Option<String>,
    pub branch_name: Option<String>,
    pub commit_hash: Option<String>,
    pub file_match_type: Option<FileMatchType>,
    pub files_to_exclude: Vec<String>,
    pub directories_to_exclude: Vec<String>,
    pub package_managers: Vec<String>,
}

/// Builds the validated arguments for one scan invocation.
///
/// `script_version` is the caller's build version, reported to the service
/// at setup time. Branch and commit come from the repository containing
/// `source_code_path` unless overridden; the project name falls back to the
/// scanned directory's last path segment.
pub fn resolve_analysis_arguments(
    store: &ConfigStore,
    source_code_path: &Path,
    overrides: &ScanOverrides,
    script_version: &str,
) -> Result<AnalysisArguments, ConfigError> {
    dotenvy::dotenv().ok();

    let settings = store.load_settings()?;
    let secrets = store.load_secrets()?;

    let api_key = env_non_blank(ENV_API_KEY)
        .or(secrets.api_key)
        .unwrap_or_default();
    let client_id = env_non_blank(ENV_CLIENT_ID)
        .or(secrets.client_id)
        .unwrap_or_default();

    let project_name = overrides
        .project_name
        .clone()
        .or_else(|| env_non_blank(ENV_PROJECT_NAME))
        .or(settings.project_name)
        .or_else(|| default_project_name(source_code_path))
        .unwrap_or_default();

    let api_url = overrides
        .api_url
        .clone()
        .or_else(|| env_non_blank(ENV_API_URL))
        .or(settings.api_url)
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

    let git = discover_git_context(source_code_path);
    let branch_name = overrides.branch_name.clone().or(git.branch_name);
    let commit_hash = overrides.commit_hash.clone().or(git.commit_hash);

    let args = AnalysisArguments {
        api_key,
        client_id,
        project_name,
        api_url,
        files_to_exclude: pick_list(&overrides.files_to_exclude, settings.files_to_exclude),
        directories_to_exclude: pick_list(
            &overrides.directories_to_exclude,
            settings.directories_to_exclude,
        ),
        package_managers: pick_list(&overrides.package_managers, settings.package_managers),
        file_match_type: overrides
            .file_match_type
            .unwrap_or(settings.file_match_type),
        branch_name,
        commit_hash,
        integration: IntegrationMeta::script(script_version),
    };

    validate_arguments(&args)?;
    Ok(args)
}

/// The configuration gate. Credential fields fail with the secrets
/// remediation class; every other required field fails with the general
/// class.
pub fn validate_arguments(args: &AnalysisArguments) -> Result<(), ConfigError> {
    if args.api_key.trim().is_empty() {
        return Err(ConfigError::MissingCredential { name: "apiKey" });
    }
    if args.client_id.trim().is_empty() {
        return Err(ConfigError::MissingCredential { name: "clientId" });
    }
    if args.project_name.trim().is_empty() {
        return Err(ConfigError::MissingField { name: "projectName" });
    }
    if args.api_url.trim().is_empty() {
        return Err(ConfigError::MissingField { name: "apiUrl" });
    }
    Ok(())
}

fn pick_list(overrides: &[String], base: Vec<String>) -> Vec<String> {
    if overrides.is_empty() {
        base
    } else {
        overrides.to_vec()
    }
}

fn env_non_blank(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn default_project_name(path: &Path) -> Option<String> {
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}
