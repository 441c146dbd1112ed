// src/lockfile/mod.rs

//! Lock file reconciliation
//!
//! A project's lock file declares which packages it depends on and whether
//! they are dev or optional. Reconciling walks that declared graph against
//! the crawled forest, marking each installed record visited and
//! accumulating its dev / prod / optional / mandatory flags.
//!
//! Three lock layouts are supported, each in its own module:
//!
//! - [`legacy`]: npm lockfileVersion 1, a nested `dependencies` tree
//! - [`flat`]: npm lockfileVersion 2 and 3, a `packages` table keyed by
//!   install path
//! - [`yarn`]: `yarn.lock` resolution tables, seeded from `package.json`

pub mod flat;
pub mod legacy;
mod resolve;
pub mod yarn;

pub use flat::{FlatEntry, FlatLock, install_chain, package_handle};
pub use legacy::{LegacyEntry, LegacyLock};
pub use resolve::{DeclaredEdge, ForestStack, Lookup, ReconcileSummary, Reconciler};
pub use yarn::{RangedLock, YarnEntry, YarnLock, alias_target, split_descriptor};

use crate::crawler::{MANIFEST_FILE, PackageManifest};
use crate::error::{Error, Result};
use crate::record::DependencyForest;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

/// Yarn resolution table
pub const YARN_LOCK: &str = "yarn.lock";

/// npm lock file at the project root
pub const PACKAGE_LOCK: &str = "package-lock.json";

/// Snapshot npm keeps of the last install, relative to the project root
pub const HIDDEN_LOCK: &str = "node_modules/.package-lock.json";

/// A project's declared dependency graph
#[derive(Debug, Clone)]
pub enum DeclaredGraph {
    Legacy(LegacyLock),
    Flat(FlatLock),
    Ranged(RangedLock),
}

impl DeclaredGraph {
    /// Short name of the layout, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Legacy(_) => "nested dependencies",
            Self::Flat(_) => "flat packages",
            Self::Ranged(_) => "yarn",
        }
    }

    /// Parse an npm lock document, picking the layout from its keys
    pub fn from_npm_json(content: &str, path: &Path) -> Result<Self> {
        let document: Value = serde_json::from_str(content).map_err(|e| Error::json(path, e))?;

        if document.get("packages").is_some_and(Value::is_object) {
            let lock = serde_json::from_value(document).map_err(|e| Error::json(path, e))?;
            Ok(Self::Flat(lock))
        } else if document.get("dependencies").is_some_and(Value::is_object) {
            let lock = serde_json::from_value(document).map_err(|e| Error::json(path, e))?;
            Ok(Self::Legacy(lock))
        } else {
            Err(Error::InvalidLockfile {
                path: path.to_path_buf(),
                reason: "neither a packages nor a dependencies table".to_string(),
            })
        }
    }

    /// Walk the declared graph, updating `installed` in place
    pub fn reconcile(&self, installed: &mut DependencyForest) -> Result<ReconcileSummary> {
        let mut reconciler = Reconciler::new(installed);
        match self {
            Self::Legacy(lock) => lock.walk(&mut reconciler)?,
            Self::Flat(lock) => lock.walk(&mut reconciler)?,
            Self::Ranged(lock) => lock.walk(&mut reconciler)?,
        }
        Ok(reconciler.finish())
    }
}

/// Reconcile `installed` against `graph`
pub fn reconcile(graph: &DeclaredGraph, installed: &mut DependencyForest) -> Result<ReconcileSummary> {
    let summary = graph.reconcile(installed)?;
    info!(
        "Reconciled {} lock: {} edges, {} matched, {} skipped",
        graph.kind(),
        summary.edges,
        summary.matched,
        summary.skipped
    );
    Ok(summary)
}

/// Find and parse the lock file of the project in `project_dir`
///
/// `yarn.lock` wins when present. Otherwise `package-lock.json` is used,
/// falling back to npm's hidden snapshot when it is missing or unreadable.
pub fn load_declared_graph(project_dir: &Path) -> Result<DeclaredGraph> {
    let yarn_path = project_dir.join(YARN_LOCK);
    if yarn_path.is_file() {
        return load_yarn(project_dir, &yarn_path);
    }

    let primary = project_dir.join(PACKAGE_LOCK);
    let hidden = project_dir.join(HIDDEN_LOCK);
    match load_npm(&primary) {
        Ok(graph) => Ok(graph),
        Err(err) if hidden.is_file() => {
            if primary.exists() {
                warn!("{}; falling back to {}", err, hidden.display());
            } else {
                debug!("No {}, using {}", PACKAGE_LOCK, hidden.display());
            }
            load_npm(&hidden)
        }
        Err(_) if !primary.exists() => Err(Error::LockfileNotFound(project_dir.to_path_buf())),
        Err(err) => Err(err),
    }
}

fn load_npm(path: &Path) -> Result<DeclaredGraph> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let graph = DeclaredGraph::from_npm_json(&content, path)?;
    debug!("Loaded {} lock from {}", graph.kind(), path.display());
    Ok(graph)
}

fn load_yarn(project_dir: &Path, path: &Path) -> Result<DeclaredGraph> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let lock = YarnLock::parse(&content).map_err(|reason| Error::InvalidLockfile {
        path: path.to_path_buf(),
        reason,
    })?;
    let manifest = PackageManifest::from_file(&project_dir.join(MANIFEST_FILE))?;
    debug!("Loaded yarn lock with {} entries from {}", lock.len(), path.display());
    Ok(DeclaredGraph::Ranged(RangedLock { lock, manifest }))
}
