// src/lockfile/flat.rs

//! Flat `packages` lock files (npm lockfileVersion 2 and 3)
//!
//! Every installed package has one entry keyed by its install path relative
//! to the project, e.g. `node_modules/a/node_modules/@scope/b`. The path
//! tells exactly which bundled forest the package lives in.

use super::resolve::{DeclaredEdge, ForestStack, Reconciler};
use crate::crawler::MODULES_DIR;
use crate::error::Result;
use crate::record::{DependencyForest, RecordPath};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// A lock document keyed by `packages`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlatLock {
    #[serde(default)]
    pub packages: BTreeMap<String, FlatEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlatEntry {
    pub version: Option<String>,
    /// Real package name when installed under an alias
    pub name: Option<String>,
    pub dev: bool,
    pub optional: bool,
    pub dev_optional: bool,
    /// Symlinked workspace member; not part of the installed tree
    pub link: bool,
}

impl FlatEntry {
    /// Dev flag, with `devOptional` counting as both dev and optional
    pub fn is_dev(&self) -> bool {
        self.dev || self.dev_optional
    }

    pub fn is_optional(&self) -> bool {
        self.optional || self.dev_optional
    }
}

/// Package handles along an install path, outermost first
///
/// `node_modules/a/node_modules/@scope/b` gives `["a", "@scope/b"]`.
pub fn install_chain(path: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut segments = path.split('/');

    while let Some(segment) = segments.next() {
        if segment != MODULES_DIR {
            continue;
        }
        let Some(name) = segments.next() else {
            break;
        };
        if name.starts_with('@')
            && let Some(scoped) = segments.next()
        {
            chain.push(format!("{name}/{scoped}"));
        } else {
            chain.push(name.to_string());
        }
    }

    chain
}

/// Bare package handle of an install path
pub fn package_handle(path: &str) -> Option<String> {
    install_chain(path).pop()
}

fn install_prefix(chain: &[String]) -> String {
    chain
        .iter()
        .map(|handle| format!("{MODULES_DIR}/{handle}"))
        .collect::<Vec<_>>()
        .join("/")
}

impl FlatLock {
    pub(crate) fn walk(&self, reconciler: &mut Reconciler<'_>) -> Result<()> {
        for (path, entry) in &self.packages {
            if path.is_empty() || entry.link {
                continue;
            }
            if !path.starts_with(MODULES_DIR) {
                debug!("Skipping lock entry outside the dependency tree: {}", path);
                continue;
            }

            let chain = install_chain(path);
            let Some(handle) = chain.last() else {
                continue;
            };

            let stack = self.stack_for(reconciler.installed(), &chain);
            let edge = DeclaredEdge {
                name: entry.name.as_deref().unwrap_or(handle),
                requested: entry.version.as_deref().unwrap_or("*"),
                version: entry.version.as_deref(),
                dev: entry.is_dev(),
                optional: entry.is_optional(),
            };
            reconciler.resolve(&edge, &stack)?;
        }

        Ok(())
    }

    /// Stack for the package at the end of `chain`
    ///
    /// The forest the install path points into comes first. When one of its
    /// ancestors was not crawled (e.g. it was ignored), the lookup falls back
    /// to the top level forest alone.
    fn stack_for(&self, installed: &DependencyForest, chain: &[String]) -> ForestStack {
        let ancestors = &chain[..chain.len().saturating_sub(1)];
        match self.locate(installed, ancestors) {
            Some(path) if !path.is_empty() => ForestStack::root().push_front(path),
            _ => ForestStack::root(),
        }
    }

    fn locate(&self, installed: &DependencyForest, ancestors: &[String]) -> Option<RecordPath> {
        let mut path = RecordPath::new();

        for (depth, handle) in ancestors.iter().enumerate() {
            let forest = installed.forest_at(&path)?;
            let entry = self.packages.get(&install_prefix(&ancestors[..=depth]));
            let name = entry.and_then(|e| e.name.as_deref()).unwrap_or(handle);
            let record = entry
                .and_then(|e| e.version.as_deref())
                .and_then(|version| forest.get(name, version))
                .or_else(|| forest.first(name))?;
            path.push((name.to_string(), record.version.clone()));
        }

        Some(path)
    }
}
