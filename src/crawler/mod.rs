// src/crawler/mod.rs

//! Filesystem crawler for installed module trees
//!
//! Walks a `node_modules` directory and builds a [`DependencyForest`] from
//! the manifests it finds. Scope directories (`@scope`) are namespaces, not
//! modules, and are descended into transparently. A module's own nested
//! `node_modules` is crawled into that module's `bundled` forest, so the
//! resulting tree mirrors the shadowing on disk.
//!
//! A directory without a manifest is an error unless the project explicitly
//! ignores it or, for top level modules, supplies metadata for it.

mod manifest;

pub use manifest::{
    LicenseField, MANIFEST_FILE, PackageManifest, PersonField, RepositoryField, github_owner,
};

use crate::error::{Error, Result};
use crate::record::DependencyForest;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Name of the directory a package manager installs modules into
pub const MODULES_DIR: &str = "node_modules";

/// Externally supplied metadata keyed by module name, for modules that ship
/// without a manifest
pub type ModuleOverrides = BTreeMap<String, PackageManifest>;

/// Load an overrides file
///
/// The file is either a name-keyed object or a manifest-like document whose
/// `dependencies` object holds the name-keyed table.
pub fn load_overrides(path: &Path) -> Result<ModuleOverrides> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut document: Value =
        serde_json::from_str(&content).map_err(|e| Error::json(path, e))?;

    let wrapped = document.get("dependencies").is_some_and(Value::is_object);
    let table = if wrapped {
        document["dependencies"].take()
    } else {
        document
    };
    serde_json::from_value(table).map_err(|e| Error::json(path, e))
}

/// Recursive module crawler
#[derive(Debug, Clone, Copy)]
pub struct Crawler<'a> {
    ignore_directories: &'a BTreeSet<String>,
}

impl<'a> Crawler<'a> {
    /// Create a crawler skipping the given directory base names everywhere
    pub fn new(ignore_directories: &'a BTreeSet<String>) -> Self {
        Self { ignore_directories }
    }

    /// Crawl `directory`, adding every module found to `output`
    ///
    /// `parent_name` qualifies ignore keys (`parent_name/module`) for the
    /// modules directly inside `directory`.
    pub fn crawl(
        &self,
        parent_name: &str,
        directory: &Path,
        ignore: &BTreeSet<String>,
        output: &mut DependencyForest,
    ) -> Result<()> {
        self.crawl_dir(parent_name, directory, None, ignore, None, output)
    }

    /// Crawl like [`Crawler::crawl`], taking metadata from `overrides` for
    /// top level modules without a manifest
    ///
    /// Modules nested below a top level module are crawled from their
    /// manifests only.
    pub fn crawl_with_overrides(
        &self,
        parent_name: &str,
        directory: &Path,
        ignore: &BTreeSet<String>,
        overrides: &ModuleOverrides,
        output: &mut DependencyForest,
    ) -> Result<()> {
        self.crawl_dir(parent_name, directory, None, ignore, Some(overrides), output)
    }

    fn crawl_dir(
        &self,
        parent_name: &str,
        directory: &Path,
        scope: Option<&str>,
        ignore: &BTreeSet<String>,
        overrides: Option<&ModuleOverrides>,
        output: &mut DependencyForest,
    ) -> Result<()> {
        for (entry_name, path) in list_entries(directory)? {
            if self.ignore_directories.contains(&entry_name) {
                trace!("Skipping ignored directory {}", path.display());
                continue;
            }

            if !path.is_dir() {
                continue;
            }

            if entry_name.starts_with('@') {
                self.crawl_dir(
                    parent_name,
                    &path,
                    Some(entry_name.as_str()),
                    ignore,
                    overrides,
                    output,
                )?;
                continue;
            }

            let module = match scope {
                Some(scope) => format!("{scope}/{entry_name}"),
                None => entry_name.clone(),
            };
            let candidate = Candidate {
                parent_name,
                module: &module,
                entry_name: &entry_name,
                path: &path,
            };
            self.process_module(&candidate, ignore, overrides, output)?;
        }
        Ok(())
    }

    fn process_module(
        &self,
        candidate: &Candidate<'_>,
        ignore: &BTreeSet<String>,
        overrides: Option<&ModuleOverrides>,
        output: &mut DependencyForest,
    ) -> Result<()> {
        let manifest_path = candidate.path.join(MANIFEST_FILE);

        let mut record = if manifest_path.is_file() {
            PackageManifest::from_file(&manifest_path)?
                .into_record(candidate.module, candidate.path)?
        } else if candidate.is_ignored(ignore) {
            debug!(
                "No manifest for ignored module {}/{}",
                candidate.parent_name, candidate.module
            );
            return Ok(());
        } else if let Some(entry) = overrides.and_then(|o| o.get(candidate.module)) {
            debug!("Using supplied metadata for {}", candidate.module);
            entry.clone().into_record(candidate.module, candidate.path)?
        } else {
            return Err(Error::MissingMetadata {
                module: candidate.module.to_string(),
                path: candidate.path.to_path_buf(),
                project: candidate.parent_name.to_string(),
            });
        };

        let nested = candidate.path.join(MODULES_DIR);
        if nested.is_dir() {
            let parent = record.name.clone();
            self.crawl_dir(&parent, &nested, None, ignore, None, &mut record.bundled)?;
        }

        let handle = record.handle();
        if output.add(record) {
            trace!("Found {}", handle);
        } else {
            debug!(
                "Duplicate install of {} at {} ignored",
                handle,
                candidate.path.display()
            );
        }
        Ok(())
    }
}

/// A directory that should hold one installed module
struct Candidate<'a> {
    parent_name: &'a str,
    /// Module handle, `@scope/name` for scoped modules
    module: &'a str,
    entry_name: &'a str,
    path: &'a Path,
}

impl Candidate<'_> {
    /// Both `parent/@scope/name` and `parent/name` keys match a scoped module
    fn is_ignored(&self, ignore: &BTreeSet<String>) -> bool {
        ignore.contains(&format!("{}/{}", self.parent_name, self.module))
            || ignore.contains(&format!("{}/{}", self.parent_name, self.entry_name))
    }
}

/// Entries directly inside `directory`, sorted by file name
fn list_entries(directory: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::io(directory, std::io::Error::from(e)))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push((name, entry.into_path()));
    }
    Ok(entries)
}
