// src/config/mod.rs

//! Audit configuration
//!
//! The configuration is loaded once and passed explicitly to the crawler
//! and the collector. Nothing here is global.
//!
//! # Example packaudit.toml
//!
//! ```toml
//! # Directory names skipped everywhere in a node_modules tree
//! ignore_directories = [".bin", ".cache"]
//!
//! [license]
//! preferred = ["MIT", "ISC", "Apache-2.0"]
//!
//! [[projects]]
//! name = "web"
//! directory = "web"
//! ignore = ["web/fsevents"]
//! ignore_dev_dependencies = true
//!
//! [[projects]]
//! name = "tools"
//! directory = "/usr/lib/node_modules"
//! is_project = false
//! lockfile = false
//! dev = true
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Default config file name looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "packaudit.toml";

/// Directory names that never hold an installed module
pub const DEFAULT_IGNORE_DIRECTORIES: &[&str] = &[".bin", ".cache", ".staging", ".vite"];

/// Top level audit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Base names skipped at every level of the crawl
    #[serde(default = "default_ignore_directories")]
    pub ignore_directories: BTreeSet<String>,

    /// License preferences applied to the finished inventory
    #[serde(default)]
    pub license: LicenseConfig,

    /// Projects to audit, in order
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

fn default_ignore_directories() -> BTreeSet<String> {
    DEFAULT_IGNORE_DIRECTORIES
        .iter()
        .map(|dir| dir.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            ignore_directories: default_ignore_directories(),
            license: LicenseConfig::default(),
            projects: Vec::new(),
        }
    }
}

/// License section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LicenseConfig {
    /// Licenses picked as "preferred" when a package offers a choice
    #[serde(default)]
    pub preferred: Vec<String>,
}

/// One project (or bare dependency directory) to audit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Name used in logs and as the parent of top level ignore keys
    pub name: String,

    /// Project root, or the dependency directory itself when `is_project`
    /// is false
    pub directory: PathBuf,

    /// Fully qualified `parent/module` keys for directories allowed to have
    /// no manifest
    #[serde(default)]
    pub ignore: BTreeSet<String>,

    /// Reconcile against the project's lock file
    #[serde(default = "default_true")]
    pub lockfile: bool,

    /// Dependencies live in `<directory>/node_modules`
    #[serde(default = "default_true")]
    pub is_project: bool,

    /// Without a lock file, every top level package is stamped dev (true)
    /// or prod (false)
    #[serde(default)]
    pub dev: bool,

    /// Drop packages only reachable through dev edges
    #[serde(default)]
    pub ignore_dev_dependencies: bool,

    /// JSON file with metadata for modules that ship no manifest
    #[serde(default)]
    pub overrides: Option<PathBuf>,
}

impl ProjectConfig {
    /// A project with a lock file, dependencies under `node_modules`
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            ignore: BTreeSet::new(),
            lockfile: true,
            is_project: true,
            dev: false,
            ignore_dev_dependencies: false,
            overrides: None,
        }
    }

    /// Directory the crawl starts in
    pub fn modules_dir(&self) -> PathBuf {
        if self.is_project {
            self.directory.join("node_modules")
        } else {
            self.directory.clone()
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.directory.is_relative() {
            self.directory = base.join(&self.directory);
        }
        if let Some(overrides) = &self.overrides
            && overrides.is_relative()
        {
            self.overrides = Some(base.join(overrides));
        }
    }
}

impl AuditConfig {
    /// Check project names are present and unique
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for project in &self.projects {
            if project.name.trim().is_empty() {
                return Err(Error::Config(format!(
                    "project at {} has an empty name",
                    project.directory.display()
                )));
            }
            if !seen.insert(project.name.as_str()) {
                return Err(Error::Config(format!(
                    "project '{}' is defined more than once",
                    project.name
                )));
            }
        }
        Ok(())
    }
}

/// Parse a configuration from a TOML string
pub fn parse_config_string(content: &str) -> Result<AuditConfig> {
    let config: AuditConfig =
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load a configuration file
///
/// Relative project directories and override files are resolved against
/// the directory containing the config file.
pub fn load_config(path: &Path) -> Result<AuditConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut config = parse_config_string(&content)?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for project in &mut config.projects {
        project.resolve_paths(base);
    }

    Ok(config)
}
