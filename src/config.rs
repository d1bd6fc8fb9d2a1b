//! # Workspace Configuration
//!
//! This module defines the `.polyrepo.yaml` file that describes a workspace:
//! which repositories belong in it and how aggressively to talk to the hosting
//! API and to git.
//!
//! ```yaml
//! root: ./workspace
//! include:
//!   - acme/api
//!   - acme/web#develop
//!   - acme-tools/*
//! exclude:
//!   - acme-tools/archive
//! api:
//!   url: https://api.github.com/
//!   concurrency: 8
//!   page_size: 100
//! concurrency: 4
//! installer:
//!   program: pnpm
//!   args: [install]
//! ```
//!
//! Every key is optional. Command-line flags override what the file says;
//! that layering happens in the CLI, this module only parses and validates.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::github::DEFAULT_API_URL;
use crate::hosting::{DEFAULT_API_CONCURRENCY, DEFAULT_PAGE_SIZE};
use crate::installer::CommandInstaller;

/// File name looked up in the current directory when no path is given.
pub const CONFIG_FILE: &str = ".polyrepo.yaml";

/// Default number of repositories synchronized at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Largest page the hosting API serves.
pub const MAX_PAGE_SIZE: u32 = 100;

const TOP_LEVEL_KEYS: &[&str] = &["root", "include", "exclude", "api", "concurrency", "installer"];

/// Parsed `.polyrepo.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory the repositories are cloned into.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Repository patterns: `owner/name`, `owner/name#ref` or `owner/*`.
    #[serde(default)]
    pub include: Vec<String>,
    /// Full names removed after expansion (case-insensitive).
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub api: ApiConfig,
    /// Maximum concurrent git operations.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub installer: InstallerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: None,
            include: Vec::new(),
            exclude: Vec::new(),
            api: ApiConfig::default(),
            concurrency: DEFAULT_CONCURRENCY,
            installer: InstallerConfig::default(),
        }
    }
}

/// Hosting API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    /// Maximum concurrent API requests.
    #[serde(default = "default_api_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            concurrency: default_api_concurrency(),
            page_size: default_page_size(),
        }
    }
}

/// Command run once at the workspace root after the manifest merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallerConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        let installer = CommandInstaller::default();
        Self {
            program: installer.program,
            args: installer.args,
        }
    }
}

impl From<&InstallerConfig> for CommandInstaller {
    fn from(config: &InstallerConfig) -> Self {
        CommandInstaller::new(config.program.clone(), config.args.clone())
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_api_concurrency() -> usize {
    DEFAULT_API_CONCURRENCY
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Config {
    /// Check the values serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(invalid("concurrency must be at least 1", None));
        }
        if self.api.concurrency == 0 {
            return Err(invalid("api.concurrency must be at least 1", None));
        }
        if self.api.page_size == 0 || self.api.page_size > MAX_PAGE_SIZE {
            return Err(invalid(
                format!("api.page_size must be between 1 and {}", MAX_PAGE_SIZE),
                None,
            ));
        }
        if self.installer.program.trim().is_empty() {
            return Err(invalid(
                "installer.program must not be empty",
                Some("use `program: pnpm` for the default installer".to_string()),
            ));
        }
        Ok(())
    }
}

/// Parse and validate a configuration document. An empty document yields the
/// defaults.
pub fn parse(yaml_content: &str) -> Result<Config> {
    if yaml_content.trim().is_empty() {
        return Ok(Config::default());
    }

    let config: Config = serde_yaml::from_str(yaml_content).map_err(|e| {
        let message = e.to_string();
        let hint = message
            .contains("unknown field")
            .then(|| format!("supported keys are: {}", TOP_LEVEL_KEYS.join(", ")));
        Error::ConfigParse { message, hint }
    })?;
    config.validate()?;
    Ok(config)
}

/// Read and parse a configuration file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

/// `directory/.polyrepo.yaml` if it exists.
pub fn discover(directory: &Path) -> Option<PathBuf> {
    let candidate = directory.join(CONFIG_FILE);
    candidate.is_file().then_some(candidate)
}

fn invalid(message: impl Into<String>, hint: Option<String>) -> Error {
    Error::ConfigParse {
        message: message.into(),
        hint,
    }
}
