//! Probe configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The
//! configuration file path defaults to `lzprobe.yaml` but can be specified via `-f` flag or the
//! `LZPROBE_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `lzprobe.yaml`)
//! 2. **Environment variables** - Variables prefixed with `LZPROBE_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `LZPROBE_VAULT__URL=https://kv.example.net` sets the `vault.url` field.
//!
//! ## Placeholders
//!
//! The shipped defaults contain `<angle-bracket>` placeholders for every identifier an operator
//! must supply (vault name, storage account, SQL hosts, workspace URL). Placeholders are
//! templates, not executable defaults: each probe validates its own config section before
//! touching the network and rejects any value that is empty or still in placeholder form. Run
//! `lzprobe --validate` to check every section at once.

use clap::{Parser, Subcommand};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

use crate::errors::{Error, Result};

/// CLI arguments: config file selection plus the probe to run.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "LZPROBE_CONFIG", default_value = "lzprobe.yaml")]
    pub config: String,

    /// Validate every configuration section and exit without probing anything.
    /// Useful for checking a filled-in template before an interactive session.
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub probe: Option<ProbeCommand>,
}

/// The probe to run. Each subcommand is one self-contained verification
/// sequence against a single external service.
#[derive(Subcommand, Debug)]
pub enum ProbeCommand {
    /// Fetch a named secret from the vault and print the secret bundle
    Secret {
        /// Secret name (defaults to `vault.secret_name` from config)
        #[arg(long)]
        name: Option<String>,
    },
    /// Write the sample table to the data lake, list the filesystem, read it back
    Storage {
        /// Only read the configured path and display the first rows (no write)
        #[arg(long)]
        read_only: bool,
        /// Row limit for --read-only display
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Write the sample table to a relational target and read it back
    Sql {
        /// Which configured relational target to exercise (key in `sql.targets`)
        #[arg(long, default_value = "sqldb")]
        target: String,
    },
    /// Download the model artifact, register it, deploy (or package) it, and
    /// score the resulting endpoint
    Model {
        /// Build a container image from the model instead of deploying a service
        #[arg(long)]
        package_only: bool,
    },
    /// POST the question/context payload to the scoring endpoint
    Score {
        /// Question to send (defaults to `scoring.query` from config)
        #[arg(long)]
        query: Option<String>,
        /// Context passage to send (defaults to `scoring.context` from config)
        #[arg(long)]
        context: Option<String>,
        /// Scoring URI (defaults to `scoring.uri` from config)
        #[arg(long)]
        uri: Option<String>,
    },
}

/// Root configuration: one section per external service plus the identity
/// endpoints shared by every bearer-authenticated probe.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Identity provider endpoints for the device-code flow
    pub identity: IdentityConfig,
    /// Secret vault the `secret` probe (and the `sql` probe's password
    /// lookup) talks to
    pub vault: VaultConfig,
    /// Data lake path the `storage` probe writes and reads
    pub storage: StorageConfig,
    /// Relational targets for the `sql` probe
    pub sql: SqlConfig,
    /// Model registry/deployment workspace for the `model` probe
    pub workspace: WorkspaceConfig,
    /// Scoring endpoint for the `score` probe
    pub scoring: ScoringConfig,
    /// Timeout applied to each individual HTTP request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Identity provider endpoints for the OAuth device-authorization flow.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    /// Device authorization endpoint (returns the user code to display)
    pub device_code_url: String,
    /// Token endpoint polled while the operator completes the browser prompt
    pub token_url: String,
    /// Public client id the flow authenticates as
    pub client_id: String,
    /// Overall deadline for the interactive prompt. The flow fails with an
    /// authentication error once this elapses, so an abandoned prompt never
    /// hangs the probe.
    #[serde(with = "humantime_serde")]
    pub prompt_timeout: Duration,
}

/// Secret vault configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// Vault base URL, e.g. `https://my-vault.vault.example.net`
    pub url: String,
    /// Secret fetched by the `secret` probe when no `--name` is given
    pub secret_name: String,
    /// OAuth scope requested for vault operations
    pub scope: String,
}

/// Data lake configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// File path in `abfss://filesystem@account.host/path` form
    pub path: String,
    /// OAuth scope requested for storage operations
    pub scope: String,
}

/// One relational target: connection pieces plus where to find the password.
///
/// The password is never stored in configuration; it is fetched from the
/// vault by secret name at probe time.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqlTarget {
    /// Database server hostname
    pub host: String,
    /// Database server port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Login user
    pub user: String,
    /// Vault secret holding this target's password
    pub password_secret: String,
    /// Table written and read back by the probe
    pub table: String,
}

/// Relational probe configuration: named targets sharing one probe sequence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqlConfig {
    /// Targets selectable with `lzprobe sql --target <name>`
    pub targets: HashMap<String, SqlTarget>,
}

/// Where a model deployment should run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeploymentTarget {
    /// Deploy to a local container listening on `port`
    Local { port: u16 },
    /// Deploy to a managed compute cluster
    Cluster {
        /// Cluster name as known to the workspace
        name: String,
        /// CPU cores requested for the service
        cpu_cores: u32,
        /// Memory requested for the service, in GB
        memory_gb: u32,
    },
}

/// Model registry/deployment workspace configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Workspace API base URL
    pub url: String,
    /// OAuth scope requested for workspace operations
    pub scope: String,
    /// Name the artifact is registered under
    pub model_name: String,
    /// Where the model artifact is downloaded from
    pub model_url: String,
    /// Name of the deployed service
    pub service_name: String,
    /// Environment name in the inference config
    pub environment: String,
    /// Entry script in the inference config
    pub entry_script: String,
    /// Source directory bundled with the entry script
    pub source_directory: String,
    /// Image name used by `--package-only`
    pub image_name: String,
    /// Compute target the workspace builds images on
    pub image_build_compute: String,
    /// Deployment compute target
    pub deployment: DeploymentTarget,
    /// How often to poll a long-running operation
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Overall deadline for a deployment or packaging operation
    #[serde(with = "humantime_serde")]
    pub deployment_timeout: Duration,
}

/// Scoring endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Scoring URI to POST to
    pub uri: String,
    /// Bearer key for authenticated endpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Default question payload
    pub query: String,
    /// Default context payload
    pub context: String,
}

/// Reject a value the operator has not filled in yet. Placeholders keep their
/// `<angle-bracket>` template form from the shipped defaults.
fn require_filled(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains('<') {
        return Err(Error::config(format!(
            "{field} must be set before probing (currently {value:?}); fill in the template value"
        )));
    }
    Ok(())
}

/// Endpoint fields must additionally parse as URLs, so a mistyped host fails
/// here with the field name instead of deep inside a client call.
fn require_url(field: &'static str, value: &str) -> Result<()> {
    require_filled(field, value)?;
    url::Url::parse(value).map_err(|e| Error::config(format!("{field} {value:?} is not a valid URL: {e}")))?;
    Ok(())
}

impl IdentityConfig {
    pub fn validate(&self) -> Result<()> {
        require_url("identity.device_code_url", &self.device_code_url)?;
        require_url("identity.token_url", &self.token_url)?;
        require_filled("identity.client_id", &self.client_id)?;
        Ok(())
    }
}

impl VaultConfig {
    /// The SQL probe needs a reachable vault for its password lookup but has
    /// its own secret name; `secret_name` only matters to the secret probe.
    pub fn validate_url(&self) -> Result<()> {
        require_url("vault.url", &self.url)
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_url()?;
        require_filled("vault.secret_name", &self.secret_name)?;
        Ok(())
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        require_filled("storage.path", &self.path)
    }
}

impl SqlTarget {
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config(format!("sql.targets.{name}.port must be non-zero")));
        }
        require_filled("sql host", &self.host)?;
        require_filled("sql database", &self.database)?;
        require_filled("sql user", &self.user)?;
        require_filled("sql password_secret", &self.password_secret)?;
        require_filled("sql table", &self.table)?;
        Ok(())
    }
}

impl SqlConfig {
    /// Look up a target by CLI selector
    pub fn target(&self, name: &str) -> Result<&SqlTarget> {
        self.targets.get(name).ok_or_else(|| {
            let mut known: Vec<&str> = self.targets.keys().map(String::as_str).collect();
            known.sort_unstable();
            Error::config(format!("sql.targets has no entry {name:?} (configured: {})", known.join(", ")))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(Error::config("sql.targets must configure at least one target"));
        }
        for (name, target) in &self.targets {
            target.validate(name)?;
        }
        Ok(())
    }
}

impl WorkspaceConfig {
    pub fn validate(&self) -> Result<()> {
        require_url("workspace.url", &self.url)?;
        require_filled("workspace.model_name", &self.model_name)?;
        require_url("workspace.model_url", &self.model_url)?;
        require_filled("workspace.service_name", &self.service_name)?;
        require_filled("workspace.entry_script", &self.entry_script)?;
        Ok(())
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        require_url("scoring.uri", &self.uri)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            vault: VaultConfig::default(),
            storage: StorageConfig::default(),
            sql: SqlConfig::default(),
            workspace: WorkspaceConfig::default(),
            scoring: ScoringConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            device_code_url: "https://login.example.net/<tenant-id>/oauth2/v2.0/devicecode".to_string(),
            token_url: "https://login.example.net/<tenant-id>/oauth2/v2.0/token".to_string(),
            client_id: "<client-id>".to_string(),
            prompt_timeout: Duration::from_secs(15 * 60),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            url: "https://<name-key-vault>.vault.azure.net".to_string(),
            secret_name: "<name>".to_string(),
            scope: "https://vault.azure.net/.default".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "abfss://test@<storage-account>.dfs.core.windows.net/test.csv".to_string(),
            scope: "https://storage.azure.com/.default".to_string(),
        }
    }
}

impl Default for SqlTarget {
    fn default() -> Self {
        Self {
            host: "<sql-host>".to_string(),
            port: 5432,
            database: "test".to_string(),
            user: "login".to_string(),
            password_secret: "sqldbPassword".to_string(),
            table: "test".to_string(),
        }
    }
}

impl Default for SqlConfig {
    fn default() -> Self {
        // The landing zones ship a SQL database and a managed instance; both
        // get the same probe sequence under different target names.
        let mut targets = HashMap::new();
        targets.insert("sqldb".to_string(), SqlTarget::default());
        targets.insert(
            "sqlmi".to_string(),
            SqlTarget {
                password_secret: "sqlmiPassword".to_string(),
                ..SqlTarget::default()
            },
        );
        Self { targets }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            url: "https://<workspace-url>".to_string(),
            scope: "https://management.azure.com/.default".to_string(),
            model_name: "bidaf_onnx".to_string(),
            model_url: "https://aka.ms/bidaf-9-model".to_string(),
            service_name: "myservice".to_string(),
            environment: "project_environment".to_string(),
            entry_script: "echo_score.py".to_string(),
            source_directory: "./deployment-scripts".to_string(),
            image_name: "test_image".to_string(),
            image_build_compute: "test".to_string(),
            deployment: DeploymentTarget::Local { port: 6789 },
            poll_interval: Duration::from_secs(10),
            deployment_timeout: Duration::from_secs(20 * 60),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            key: None,
            query: "What color is the fox".to_string(),
            context: "The quick brown fox jumped over the lazy dog.".to_string(),
        }
    }
}

impl Config {
    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("LZPROBE_").split("__"))
    }

    /// Load configuration from file and environment. Structural errors
    /// (unknown fields, bad durations) fail here; placeholder checks run
    /// per-section when a probe starts, so a partially filled template can
    /// still drive the probes whose sections are complete.
    pub fn load(args: &Args) -> std::result::Result<Self, figment::Error> {
        Self::figment(args).extract()
    }

    /// Validate every section at once (the `--validate` path).
    pub fn validate(&self) -> Result<()> {
        self.identity.validate()?;
        self.vault.validate()?;
        self.storage.validate()?;
        self.sql.validate()?;
        self.workspace.validate()?;
        self.scoring.validate()?;
        Ok(())
    }
}
