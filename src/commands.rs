//! Command registry and the handlers behind each CLI subcommand.
//!
//! The registry is a plain identifier-to-handler map with no behavior of its
//! own; hosts register the commands they expose and dispatch by identifier.
//! Handlers own process-facing output (stdout, prompts) and delegate all
//! scan behavior to the library core.

use crate::api::SoosClient;
use crate::config::{resolve_analysis_arguments, ConfigStore, ScanOverrides, Secrets};
use crate::model::FileMatchType;
use crate::progress::ConsoleReporter;
use crate::scan::ScanOrchestrator;
use anyhow::{bail, Context};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

/// A host-triggered entry point.
#[async_trait]
pub trait Command: Send + Sync {
    /// Identifier the registry dispatches on.
    fn id(&self) -> &'static str;

    async fn run(&self) -> anyhow::Result<()>;
}

/// Maps command identifiers to handlers.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Box<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Box<dyn Command>) {
        self.handlers.insert(command.id(), command);
    }

    /// Runs the handler registered under `id`.
    pub async fn execute(&self, id: &str) -> anyhow::Result<()> {
        match self.handlers.get(id) {
            Some(command) => command.run().await,
            None => bail!("unknown command '{id}'"),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Runs one SCA scan of a source directory.
pub struct ScanCommand {
    pub source_code_path: PathBuf,
    pub overrides: ScanOverrides,
    pub script_version: String,
    pub verbose: bool,
}

#[async_trait]
impl Command for ScanCommand {
    fn id(&self) -> &'static str {
        "scan"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let store = ConfigStore::open()?;
        let arguments = resolve_analysis_arguments(
            &store,
            &self.source_code_path,
            &self.overrides,
            &self.script_version,
        )?;
        let client = SoosClient::new(arguments.api_key.clone(), &arguments.api_url)?;
        let orchestrator = ScanOrchestrator::new(client).with_verbose(self.verbose);
        let message = orchestrator
            .run(&arguments, &self.source_code_path, &ConsoleReporter)
            .await?;
        println!("{message}");
        Ok(())
    }
}

/// Updates the settings file and prints the result.
pub struct ConfigureCommand {
    pub project_name: Option<String>,
    pub api_url: Option<String>,
    pub file_match_type: Option<FileMatchType>,
    pub files_to_exclude: Vec<String>,
    pub directories_to_exclude: Vec<String>,
    pub package_managers: Vec<String>,
}

#[async_trait]
impl Command for ConfigureCommand {
    fn id(&self) -> &'static str {
        "configure"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let store = ConfigStore::open()?;
        let mut settings = store.load_settings()?;
        if let Some(name) = &self.project_name {
            settings.project_name = Some(name.clone());
        }
        if let Some(url) = &self.api_url {
            settings.api_url = Some(url.clone());
        }
        if let Some(match_type) = self.file_match_type {
            settings.file_match_type = match_type;
        }
        if !self.files_to_exclude.is_empty() {
            settings.files_to_exclude = self.files_to_exclude.clone();
        }
        if !self.directories_to_exclude.is_empty() {
            settings.directories_to_exclude = self.directories_to_exclude.clone();
        }
        if !self.package_managers.is_empty() {
            settings.package_managers = self.package_managers.clone();
        }
        let path = store.save_settings(&settings)?;
        println!("Settings saved to {}", path.display());
        println!("{}", serde_json::to_string_pretty(&settings)?);
        Ok(())
    }
}

/// Stores API credentials, prompting for anything not passed as a flag.
pub struct ConfigureSecretsCommand {
    pub client_id: Option<String>,
    pub api_key: Option<String>,
}

#[async_trait]
impl Command for ConfigureSecretsCommand {
    fn id(&self) -> &'static str {
        "configure-secrets"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let store = ConfigStore::open()?;
        let client_id = match &self.client_id {
            Some(value) => value.clone(),
            None => prompt("SOOS Client ID: ")?,
        };
        let api_key = match &self.api_key {
            Some(value) => value.clone(),
            None => prompt("SOOS API Key: ")?,
        };
        if client_id.trim().is_empty() {
            bail!("'clientId' is required.");
        }
        if api_key.trim().is_empty() {
            bail!("'apiKey' is required.");
        }
        store.save_secrets(&Secrets {
            client_id: Some(client_id.trim().to_string()),
            api_key: Some(api_key.trim().to_string()),
        })?;
        println!("SOOS SCA secrets configured successfully.");
        Ok(())
    }
}

/// Removes stored API credentials.
pub struct ClearSecretsCommand;

#[async_trait]
impl Command for ClearSecretsCommand {
    fn id(&self) -> &'static str {
        "clear-secrets"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let store = ConfigStore::open()?;
        if store.clear_secrets()? {
            println!("SOOS SCA secrets cleared successfully.");
        } else {
            println!("No stored secrets to clear.");
        }
        Ok(())
    }
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}");
    std::io::stdout().flush().context("could not flush stdout")?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("could not read from stdin")?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ProbeCommand {
        id: &'static str,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Command for ProbeCommand {
        fn id(&self) -> &'static str {
            self.id
        }

        async fn run(&self) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn registry_dispatches_by_identifier() {
        let runs = Arc::new(AtomicUsize::new(0));
        let other_runs = Arc::new(AtomicUsize::new(0));
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(ProbeCommand {
            id: "probe",
            runs: Arc::clone(&runs),
        }));
        registry.register(Box::new(ProbeCommand {
            id: "other",
            runs: Arc::clone(&other_runs),
        }));

        registry.execute("probe").await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(other_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_command_is_an_error() {
        let registry = CommandRegistry::new();
        let error = registry.execute("missing").await.unwrap_err();
        assert!(error.to_string().contains("unknown command 'missing'"));
    }
}
