//! Configuration file support
//!
//! Values come from, in increasing precedence: built-in defaults, the YAML
//! config file, then environment variables / command-line flags (applied by
//! the CLI layer). The config file is the first of:
//!
//! 1. the path given with `--config` (or `RELCHECK_CONFIG`)
//! 2. `./relcheck.yaml`
//! 3. `config.yaml` in the user configuration directory

use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::approval::{ApprovalPolicy, DEFAULT_BYPASS_LABELS};
use crate::core::tickets::DEFAULT_FOOTER_MARKER;
use crate::yaml::{parse_yaml_file, YamlError};

pub const DEFAULT_MANIFEST_PROJECT: &str = "ssh://git@github.com/couchbase/manifest";
pub const DEFAULT_CHECKOUT_DIR: &str = "manifest";
pub const DEFAULT_REPORT_PATH: &str = "restricted.html";
pub const DEFAULT_REQUEST_ADDRESS: &str = "build-team@couchbase.com";
pub const LOCAL_CONFIG_FILE: &str = "relcheck.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<YamlError>,
    },
}

/// Ticket tracker connection settings (the token is only read from the environment)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    pub url: Option<String>,
    pub user: Option<String>,
}

/// Approval rules
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    pub bypass_labels: Vec<String>,
    pub footer_marker: String,
    pub max_depth: Option<usize>,
    pub strict_lookups: bool,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            bypass_labels: DEFAULT_BYPASS_LABELS.iter().map(|s| s.to_string()).collect(),
            footer_marker: DEFAULT_FOOTER_MARKER.to_string(),
            max_depth: None,
            strict_lookups: false,
        }
    }
}

impl ApprovalConfig {
    pub fn policy(&self) -> ApprovalPolicy {
        ApprovalPolicy {
            bypass_labels: self.bypass_labels.clone(),
            footer_marker: self.footer_marker.clone(),
            max_depth: self.max_depth,
            strict_lookups: self.strict_lookups,
        }
    }
}

/// Report output settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub path: PathBuf,

    /// Recipient of "request approval" mails
    pub request_address: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_REPORT_PATH),
            request_address: DEFAULT_REQUEST_ADDRESS.to_string(),
        }
    }
}

/// relcheck configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Manifest repository URL, or a local directory/file
    pub manifest_project: String,

    /// Where a remote manifest repository is checked out
    pub checkout_dir: PathBuf,

    pub jira: JiraConfig,
    pub approval: ApprovalConfig,
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest_project: DEFAULT_MANIFEST_PROJECT.to_string(),
            checkout_dir: PathBuf::from(DEFAULT_CHECKOUT_DIR),
            jira: JiraConfig::default(),
            approval: ApprovalConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Config {
    /// Load the configuration, falling back to defaults when no file exists
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::from_file(path);
        }

        match Self::discover() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!("Loading config from {}", path.display());
        parse_yaml_file(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(e),
        })
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }

        ProjectDirs::from("com", "couchbase", "relcheck")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
            .filter(|p| p.exists())
    }
}
