// src/lockfile/legacy.rs

//! Nested `dependencies` lock files (npm lockfileVersion 1)
//!
//! Each entry's nested `dependencies` table mirrors a private
//! `node_modules` directory, so the walk narrows to the matched record's
//! bundled forest at every level. A level is never searched outside its own
//! forest.

use super::resolve::{DeclaredEdge, ForestStack, Reconciler};
use crate::error::Result;
use crate::record::RecordPath;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A lock document keyed by `dependencies`, nested per install location
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyLock {
    #[serde(default)]
    pub dependencies: BTreeMap<String, LegacyEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyEntry {
    pub version: String,
    pub dev: bool,
    pub optional: bool,
    pub dependencies: BTreeMap<String, LegacyEntry>,
}

impl LegacyLock {
    pub(crate) fn walk(&self, reconciler: &mut Reconciler<'_>) -> Result<()> {
        walk_level(&self.dependencies, Vec::new(), false, false, reconciler)
    }
}

/// Apply one `dependencies` table to the forest at `forest`
///
/// Flags accumulate downward: everything under a dev entry is dev, everything
/// under an optional entry is optional. A missing entry is only skipped when
/// it is optional or is itself marked dev; a dev parent does not excuse a
/// missing child. The installed version is not checked against the lock; the
/// first installed version of the name is taken.
fn walk_level(
    entries: &BTreeMap<String, LegacyEntry>,
    forest: RecordPath,
    dev: bool,
    optional: bool,
    reconciler: &mut Reconciler<'_>,
) -> Result<()> {
    let stack = ForestStack::single(forest);

    for (name, entry) in entries {
        let edge = DeclaredEdge {
            name,
            requested: &entry.version,
            version: None,
            dev: dev || entry.dev,
            optional: optional || entry.optional,
        };

        let tolerated = edge.optional || entry.dev;
        let Some(path) = reconciler.resolve_tolerating(&edge, &stack, tolerated)? else {
            continue;
        };
        if !entry.dependencies.is_empty() {
            walk_level(&entry.dependencies, path, edge.dev, edge.optional, reconciler)?;
        }
    }

    Ok(())
}
