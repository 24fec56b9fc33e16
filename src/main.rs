//! soos-scan command-line interface.
//!
//! Parses arguments, initializes the tracing subscriber, and dispatches the
//! chosen subcommand through the command registry. Owns exit codes and the
//! final rendering of errors.

use clap::{Parser, Subcommand};
use soos_scan::commands::{
    ClearSecretsCommand, CommandRegistry, ConfigureCommand, ConfigureSecretsCommand, ScanCommand,
};
use soos_scan::config::{ConfigError, ScanOverrides};
use soos_scan::markdown::convert_links_to_markdown;
use soos_scan::model::FileMatchType;
use soos_scan::scan::ScanError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Build version reported to the analysis service at setup time.
const SCRIPT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "soos-scan", version, about = "Trigger SOOS SCA scans from the command line")]
struct Cli {
    /// Increase log output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an SCA scan of a source directory
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Project name reported to the service
        #[arg(long)]
        project_name: Option<String>,

        /// Base URL of the analysis service API
        #[arg(long)]
        api_url: Option<String>,

        /// Branch name to report (defaults to the repository HEAD)
        #[arg(long)]
        branch: Option<String>,

        /// Commit hash to report
        #[arg(long)]
        commit: Option<String>,

        /// Which file categories make a scan viable
        /// (Manifest, FileHash or ManifestAndFileHash)
        #[arg(long, value_parser = parse_file_match_type)]
        file_match_type: Option<FileMatchType>,

        /// File name glob to skip (repeatable)
        #[arg(long = "exclude-file", value_name = "GLOB")]
        exclude_files: Vec<String>,

        /// Directory name glob to skip (repeatable)
        #[arg(long = "exclude-dir", value_name = "GLOB")]
        exclude_dirs: Vec<String>,

        /// Restrict discovery to a package manager (repeatable)
        #[arg(long = "package-manager", value_name = "NAME")]
        package_managers: Vec<String>,
    },
    /// Store scanner settings
    Configure {
        /// Project name reported to the service
        #[arg(long)]
        project_name: Option<String>,

        /// Base URL of the analysis service API
        #[arg(long)]
        api_url: Option<String>,

        /// Which file categories make a scan viable
        #[arg(long, value_parser = parse_file_match_type)]
        file_match_type: Option<FileMatchType>,

        /// File name glob to skip (repeatable)
        #[arg(long = "exclude-file", value_name = "GLOB")]
        exclude_files: Vec<String>,

        /// Directory name glob to skip (repeatable)
        #[arg(long = "exclude-dir", value_name = "GLOB")]
        exclude_dirs: Vec<String>,

        /// Restrict discovery to a package manager (repeatable)
        #[arg(long = "package-manager", value_name = "NAME")]
        package_managers: Vec<String>,
    },
    /// Store API credentials
    ConfigureSecrets {
        /// SOOS client id
        #[arg(long)]
        client_id: Option<String>,

        /// SOOS API key
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Remove stored API credentials
    ClearSecrets,
}

fn parse_file_match_type(raw: &str) -> Result<FileMatchType, String> {
    raw.parse()
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Registers the handler for the chosen subcommand and returns its
/// identifier for dispatch.
fn build_registry(command: Commands, verbose: bool) -> (CommandRegistry, &'static str) {
    let mut registry = CommandRegistry::new();
    let id = match command {
        Commands::Scan {
            path,
            project_name,
            api_url,
            branch,
            commit,
            file_match_type,
            exclude_files,
            exclude_dirs,
            package_managers,
        } => {
            let overrides = ScanOverrides {
                project_name,
                api_url,
                branch_name: branch,
                commit_hash: commit,
                file_match_type,
                files_to_exclude: exclude_files,
                directories_to_exclude: exclude_dirs,
                package_managers,
            };
            registry.register(Box::new(ScanCommand {
                source_code_path: path,
                overrides,
                script_version: SCRIPT_VERSION.to_string(),
                verbose,
            }));
            "scan"
        }
        Commands::Configure {
            project_name,
            api_url,
            file_match_type,
            exclude_files,
            exclude_dirs,
            package_managers,
        } => {
            registry.register(Box::new(ConfigureCommand {
                project_name,
                api_url,
                file_match_type,
                files_to_exclude: exclude_files,
                directories_to_exclude: exclude_dirs,
                package_managers,
            }));
            "configure"
        }
        Commands::ConfigureSecrets { client_id, api_key } => {
            registry.register(Box::new(ConfigureSecretsCommand { client_id, api_key }));
            "configure-secrets"
        }
        Commands::ClearSecrets => {
            registry.register(Box::new(ClearSecretsCommand));
            "clear-secrets"
        }
    };
    (registry, id)
}

/// Workflow and configuration failures carry their own remediation text and
/// are printed as-is; anything else gets the generic prefix. Every message
/// keeps its URLs clickable.
fn render_error(error: &anyhow::Error) -> String {
    if let Some(scan_error) = error.downcast_ref::<ScanError>() {
        convert_links_to_markdown(&scan_error.to_string())
    } else if let Some(config_error) = error.downcast_ref::<ConfigError>() {
        convert_links_to_markdown(&config_error.to_string())
    } else {
        convert_links_to_markdown(&format!("Error: {error:#}"))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let (registry, id) = build_registry(cli.command, cli.verbose > 0);
    match registry.execute(id).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", render_error(&error));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_subcommand_parses_overrides() {
        let cli = Cli::try_parse_from([
            "soos-scan",
            "scan",
            "project-dir",
            "--project-name",
            "demo",
            "--file-match-type",
            "filehash",
            "--exclude-dir",
            "fixtures",
            "--exclude-dir",
            "docs",
        ])
        .unwrap();

        match cli.command {
            Commands::Scan {
                path,
                project_name,
                file_match_type,
                exclude_dirs,
                ..
            } => {
                assert_eq!(path, PathBuf::from("project-dir"));
                assert_eq!(project_name.as_deref(), Some("demo"));
                assert_eq!(file_match_type, Some(FileMatchType::FileHash));
                assert_eq!(exclude_dirs, vec!["fixtures".to_string(), "docs".to_string()]);
            }
            _ => panic!("expected the scan command"),
        }
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let result = Cli::try_parse_from(["soos-scan", "-v", "-q", "clear-secrets"]);
        assert!(result.is_err());
    }

    #[test]
    fn render_error_keeps_workflow_messages_and_links() {
        let error = anyhow::Error::new(ScanError::NoMatchingFiles {
            message: soos_scan::scan::NO_MANIFESTS_MESSAGE.to_string(),
        });
        let rendered = render_error(&error);

        assert!(rendered.starts_with("No valid files found"));
        assert!(rendered.contains(
            "[https://kb.soos.io/help/error-no-valid-manifests-found]\
             (https://kb.soos.io/help/error-no-valid-manifests-found)"
        ));
        assert!(!rendered.starts_with("Error:"));
    }

    #[test]
    fn render_error_names_the_missing_credential() {
        let error = anyhow::Error::new(ConfigError::MissingCredential { name: "clientId" });
        let rendered = render_error(&error);
        assert!(rendered.contains("'clientId' is required."));
        assert!(rendered.contains("configure-secrets"));
    }

    #[test]
    fn render_error_prefixes_unexpected_errors() {
        let error = anyhow::anyhow!("boom");
        assert_eq!(render_error(&error), "Error: boom");
    }
}
