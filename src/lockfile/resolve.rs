// src/lockfile/resolve.rs

//! Edge resolution shared by every lock file strategy
//!
//! A declared edge is resolved against a [`ForestStack`]: candidate forests
//! ordered from the innermost (closest to the current point of the walk) to
//! the project root. The first forest that contains the package name wins,
//! and the requested version must then be present in that forest. This is
//! the package manager's directory ascension order, so a private nested copy
//! always shadows a hoisted one.

use crate::error::{Error, Result};
use crate::record::{DependencyForest, RecordPath};
use tracing::debug;

/// One declared dependency edge, normalized across lock file formats
#[derive(Debug, Clone, Copy)]
pub struct DeclaredEdge<'a> {
    pub name: &'a str,
    /// What the lock file asked for, used in error messages
    pub requested: &'a str,
    /// Exact version to match; `None` takes the first installed version
    pub version: Option<&'a str>,
    pub dev: bool,
    pub optional: bool,
}

impl DeclaredEdge<'_> {
    /// Dev and optional edges may legitimately be missing from disk
    pub fn tolerates_absence(&self) -> bool {
        self.dev || self.optional
    }
}

/// Outcome of a shadowing lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(RecordPath),
    /// The innermost forest with the name lacks the requested version
    MissingVersion { installed: Vec<String> },
    MissingName,
}

/// Candidate forests, innermost first
///
/// Forests are addressed by the [`RecordPath`] of the record owning them;
/// the empty path is the top level forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForestStack {
    forests: Vec<RecordPath>,
}

impl ForestStack {
    /// A stack holding only the top level forest
    pub fn root() -> Self {
        Self::single(Vec::new())
    }

    /// A stack holding only the bundled forest of the record at `path`
    pub fn single(path: RecordPath) -> Self {
        Self {
            forests: vec![path],
        }
    }

    /// A new stack with the bundled forest of `path` in front of this one
    pub fn push_front(&self, path: RecordPath) -> Self {
        let mut forests = Vec::with_capacity(self.forests.len() + 1);
        forests.push(path);
        forests.extend(self.forests.iter().cloned());
        Self { forests }
    }

    /// Whether any forest in the stack has a package called `name`
    pub fn contains_name(&self, installed: &DependencyForest, name: &str) -> bool {
        self.forests
            .iter()
            .filter_map(|path| installed.forest_at(path))
            .any(|forest| forest.contains_name(name))
    }

    /// Resolve `name` at `version` through the stack
    pub fn lookup(&self, installed: &DependencyForest, name: &str, version: Option<&str>) -> Lookup {
        for path in &self.forests {
            let Some(forest) = installed.forest_at(path) else {
                continue;
            };
            if !forest.contains_name(name) {
                continue;
            }

            let record = match version {
                Some(version) => forest.get(name, version),
                None => forest.first(name),
            };
            return match record {
                Some(record) => {
                    let mut found = path.clone();
                    found.push((name.to_string(), record.version.clone()));
                    Lookup::Found(found)
                }
                None => Lookup::MissingVersion {
                    installed: forest.versions(name).into_iter().map(String::from).collect(),
                },
            };
        }
        Lookup::MissingName
    }
}

/// Counters reported once a declared graph has been walked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Declared edges examined
    pub edges: usize,
    /// Edges matched to an installed record
    pub matched: usize,
    /// Dev or optional edges with nothing installed
    pub skipped: usize,
}

/// Applies declared edges to an installed forest
pub struct Reconciler<'f> {
    installed: &'f mut DependencyForest,
    summary: ReconcileSummary,
}

impl<'f> Reconciler<'f> {
    pub fn new(installed: &'f mut DependencyForest) -> Self {
        Self {
            installed,
            summary: ReconcileSummary::default(),
        }
    }

    pub fn installed(&self) -> &DependencyForest {
        &*self.installed
    }

    /// Resolve `edge` through `stack` and visit the matching record
    ///
    /// Returns the path of the visited record, `None` when a dev or
    /// optional edge has nothing installed, and an error when a mandatory
    /// edge cannot be matched.
    pub fn resolve(&mut self, edge: &DeclaredEdge<'_>, stack: &ForestStack) -> Result<Option<RecordPath>> {
        self.resolve_tolerating(edge, stack, edge.tolerates_absence())
    }

    /// Like [`Reconciler::resolve`], with the caller deciding whether a
    /// missing package is skipped (`tolerated`) or fatal
    pub fn resolve_tolerating(
        &mut self,
        edge: &DeclaredEdge<'_>,
        stack: &ForestStack,
        tolerated: bool,
    ) -> Result<Option<RecordPath>> {
        self.summary.edges += 1;

        match stack.lookup(&*self.installed, edge.name, edge.version) {
            Lookup::Found(path) => {
                if let Some(record) = self.installed.record_at_mut(&path) {
                    record.visit(edge.dev, edge.optional);
                }
                self.summary.matched += 1;
                Ok(Some(path))
            }
            Lookup::MissingName | Lookup::MissingVersion { .. } if tolerated => {
                self.skip(edge);
                Ok(None)
            }
            Lookup::MissingName => Err(Error::MissingDependency {
                name: edge.name.to_string(),
                requested: edge.requested.to_string(),
            }),
            Lookup::MissingVersion { installed } => Err(Error::MissingVersion {
                name: edge.name.to_string(),
                requested: edge.requested.to_string(),
                installed,
            }),
        }
    }

    /// Record an edge dropped without a lookup
    pub fn skip(&mut self, edge: &DeclaredEdge<'_>) {
        debug!(
            "Skipping {}{} dependency {}@{}: not installed",
            if edge.dev { "dev " } else { "" },
            if edge.optional { "optional" } else { "mandatory" },
            edge.name,
            edge.requested
        );
        self.summary.skipped += 1;
    }

    pub fn finish(self) -> ReconcileSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DependencyRecord;

    fn key(name: &str, version: &str) -> (String, String) {
        (name.to_string(), version.to_string())
    }

    /// Top level a@1 (bundling b@2) and b@1
    fn shadowed_forest() -> DependencyForest {
        let mut a = DependencyRecord::new("a", "1.0.0");
        a.bundled.add(DependencyRecord::new("b", "2.0.0"));
        let mut forest = DependencyForest::new();
        forest.add(a);
        forest.add(DependencyRecord::new("b", "1.0.0"));
        forest
    }

    fn edge<'a>(name: &'a str, version: Option<&'a str>) -> DeclaredEdge<'a> {
        DeclaredEdge {
            name,
            requested: version.unwrap_or("*"),
            version,
            dev: false,
            optional: false,
        }
    }

    #[test]
    fn test_lookup_prefers_innermost_forest() {
        let forest = shadowed_forest();
        let stack = ForestStack::root().push_front(vec![key("a", "1.0.0")]);

        assert_eq!(
            stack.lookup(&forest, "b", Some("2.0.0")),
            Lookup::Found(vec![key("a", "1.0.0"), key("b", "2.0.0")])
        );
        // The inner forest has b, so an outer b@1 is never considered
        assert_eq!(
            stack.lookup(&forest, "b", Some("1.0.0")),
            Lookup::MissingVersion {
                installed: vec!["2.0.0".to_string()]
            }
        );
        assert_eq!(
            stack.lookup(&forest, "a", None),
            Lookup::Found(vec![key("a", "1.0.0")])
        );
        assert_eq!(stack.lookup(&forest, "zzz", None), Lookup::MissingName);
    }

    #[test]
    fn test_resolve_visits_record() {
        let mut forest = shadowed_forest();
        let mut reconciler = Reconciler::new(&mut forest);
        let stack = ForestStack::root();

        let path = reconciler.resolve(&edge("b", Some("1.0.0")), &stack).unwrap();
        assert_eq!(path, Some(vec![key("b", "1.0.0")]));
        let summary = reconciler.finish();
        assert_eq!(summary.matched, 1);

        let b = forest.get("b", "1.0.0").unwrap();
        assert!(b.visited && b.prod && b.mandatory);
    }

    #[test]
    fn test_resolve_missing_mandatory_fails() {
        let mut forest = DependencyForest::new();
        let mut reconciler = Reconciler::new(&mut forest);
        let err = reconciler
            .resolve(&edge("a", Some("1.0")), &ForestStack::root())
            .unwrap_err();
        assert!(matches!(err, Error::MissingDependency { ref name, .. } if name == "a"));
    }

    #[test]
    fn test_resolve_missing_version_fails_for_mandatory() {
        let mut forest = shadowed_forest();
        let mut reconciler = Reconciler::new(&mut forest);
        let err = reconciler
            .resolve(&edge("b", Some("3.0.0")), &ForestStack::root())
            .unwrap_err();
        assert!(matches!(err, Error::MissingVersion { .. }));
    }

    #[test]
    fn test_resolve_tolerates_dev_and_optional() {
        let mut forest = DependencyForest::new();
        let mut reconciler = Reconciler::new(&mut forest);
        let mut dev = edge("jest", Some("29.0.0"));
        dev.dev = true;
        let mut optional = edge("fsevents", Some("2.3.3"));
        optional.optional = true;

        assert_eq!(reconciler.resolve(&dev, &ForestStack::root()).unwrap(), None);
        assert_eq!(reconciler.resolve(&optional, &ForestStack::root()).unwrap(), None);
        assert_eq!(reconciler.finish().skipped, 2);
    }
}
