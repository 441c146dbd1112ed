// src/lockfile/yarn.rs

//! `yarn.lock` resolution tables
//!
//! A yarn lock maps `name@range` descriptors to the version they resolved
//! to, plus that version's own `name -> range` dependencies. It carries no
//! install layout, so the walk starts from the project manifest and follows
//! ranges breadth first, tracking the forests each package can see.

use super::resolve::{DeclaredEdge, ForestStack, Reconciler};
use crate::crawler::PackageManifest;
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// One resolved entry of a yarn lock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YarnEntry {
    pub version: String,
    pub dependencies: BTreeMap<String, String>,
    pub optional_dependencies: BTreeMap<String, String>,
}

/// Parsed yarn lock, every descriptor of a multi-key entry indexed
#[derive(Debug, Clone, Default)]
pub struct YarnLock {
    entries: Vec<YarnEntry>,
    index: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Dependencies,
    OptionalDependencies,
    Other,
}

impl YarnLock {
    /// Parse a yarn lock file
    ///
    /// Accepts the classic `key "value"` layout and the `key: value` layout
    /// of newer yarn releases. The error is a human readable reason.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut lock = Self::default();
        let mut current: Option<(Vec<String>, YarnEntry)> = None;
        let mut section = None;

        for (lineno, raw) in content.lines().enumerate() {
            let text = raw.trim_start();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let text = text.trim_end();
            let indent = raw.len() - raw.trim_start().len();

            if indent == 0 {
                if let Some((keys, entry)) = current.take() {
                    lock.insert(keys, entry);
                }
                let header = text
                    .strip_suffix(':')
                    .ok_or_else(|| format!("line {}: expected an entry header", lineno + 1))?;
                let keys = header
                    .split(',')
                    .map(|key| unquote(key.trim()).to_string())
                    .filter(|key| !key.is_empty())
                    .collect();
                current = Some((keys, YarnEntry::default()));
                section = None;
                continue;
            }

            let Some((_, entry)) = current.as_mut() else {
                return Err(format!("line {}: field outside of an entry", lineno + 1));
            };

            if indent <= 2 {
                if let Some(name) = text.strip_suffix(':') {
                    section = Some(match unquote(name) {
                        "dependencies" => Section::Dependencies,
                        "optionalDependencies" => Section::OptionalDependencies,
                        _ => Section::Other,
                    });
                    continue;
                }
                section = None;
                let (key, value) = split_field(text)
                    .ok_or_else(|| format!("line {}: malformed field", lineno + 1))?;
                if key == "version" {
                    entry.version = value.to_string();
                }
            } else if let Some(table) = section {
                let table = match table {
                    Section::Dependencies => &mut entry.dependencies,
                    Section::OptionalDependencies => &mut entry.optional_dependencies,
                    Section::Other => continue,
                };
                let (key, value) = split_field(text)
                    .ok_or_else(|| format!("line {}: malformed dependency", lineno + 1))?;
                table.insert(key.to_string(), value.to_string());
            }
        }

        if let Some((keys, entry)) = current.take() {
            lock.insert(keys, entry);
        }
        Ok(lock)
    }

    fn insert(&mut self, keys: Vec<String>, entry: YarnEntry) {
        let idx = self.entries.len();
        self.entries.push(entry);
        for key in keys {
            self.index.entry(key).or_insert(idx);
        }
    }

    /// Entry a `name@range` descriptor resolved to
    ///
    /// Newer lock files prefix registry ranges with `npm:`, so that form is
    /// tried as well.
    pub fn get(&self, name: &str, range: &str) -> Option<&YarnEntry> {
        self.index
            .get(&format!("{name}@{range}"))
            .or_else(|| self.index.get(&format!("{name}@npm:{range}")))
            .map(|&idx| &self.entries[idx])
    }

    /// Number of distinct resolved entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split `name@range`, keeping the `@` of a scoped name
pub fn split_descriptor(descriptor: &str) -> Option<(&str, &str)> {
    let start = usize::from(descriptor.starts_with('@'));
    let at = descriptor[start..].find('@')? + start;
    Some((&descriptor[..at], &descriptor[at + 1..]))
}

/// Real package name behind an `npm:<name>@<range>` alias range
///
/// `"npm:string-width@^4.2.0"` gives `string-width`. Plain ranges, including
/// the `npm:^1.0.0` form of newer lock files, give `None`.
pub fn alias_target(range: &str) -> Option<&str> {
    let (name, _) = split_descriptor(range.strip_prefix("npm:")?)?;
    (!name.is_empty()).then_some(name)
}

fn unquote(text: &str) -> &str {
    text.trim_matches('"')
}

/// Split a `key value` or `key: value` line
fn split_field(text: &str) -> Option<(&str, &str)> {
    let (key, rest) = if let Some(quoted) = text.strip_prefix('"') {
        let end = quoted.find('"')?;
        (&quoted[..end], &quoted[end + 1..])
    } else {
        let end = text.find(|c: char| c == ':' || c.is_whitespace())?;
        (&text[..end], &text[end..])
    };

    let value = rest.trim_start().strip_prefix(':').unwrap_or(rest).trim();
    Some((key, unquote(value)))
}

/// A yarn lock together with the project manifest that seeds the walk
#[derive(Debug, Clone, Default)]
pub struct RangedLock {
    pub lock: YarnLock,
    pub manifest: PackageManifest,
}

struct WorkItem {
    name: String,
    range: String,
    dev: bool,
    optional: bool,
    stack: ForestStack,
}

impl WorkItem {
    /// Installed packages are keyed by their real name, not the alias
    fn edge(&self) -> DeclaredEdge<'_> {
        DeclaredEdge {
            name: alias_target(&self.range).unwrap_or(&self.name),
            requested: &self.range,
            version: None,
            dev: self.dev,
            optional: self.optional,
        }
    }
}

impl RangedLock {
    pub(crate) fn walk(&self, reconciler: &mut Reconciler<'_>) -> Result<()> {
        let mut queue = VecDeque::new();
        let seeds = [
            (&self.manifest.dependencies, false, false),
            (&self.manifest.dev_dependencies, true, false),
            (&self.manifest.optional_dependencies, false, true),
        ];
        for (table, dev, optional) in seeds {
            for (name, range) in table {
                queue.push_back(WorkItem {
                    name: name.clone(),
                    range: range.clone(),
                    dev,
                    optional,
                    stack: ForestStack::root(),
                });
            }
        }

        let mut seen = HashSet::new();
        while let Some(item) = queue.pop_front() {
            let key = (format!("{}@{}", item.name, item.range), item.dev, item.optional);
            if !seen.insert(key) {
                continue;
            }

            let edge = item.edge();
            if !item.stack.contains_name(reconciler.installed(), edge.name) {
                if edge.tolerates_absence() {
                    reconciler.skip(&edge);
                    continue;
                }
                return Err(Error::MissingDependency {
                    name: edge.name.to_string(),
                    requested: item.range.clone(),
                });
            }

            let Some(entry) = self.lock.get(&item.name, &item.range) else {
                if edge.tolerates_absence() {
                    reconciler.skip(&edge);
                    continue;
                }
                return Err(Error::UnresolvedRange {
                    name: item.name.clone(),
                    range: item.range.clone(),
                });
            };

            let edge = DeclaredEdge {
                version: Some(entry.version.as_str()),
                ..edge
            };
            let Some(path) = reconciler.resolve(&edge, &item.stack)? else {
                continue;
            };

            let children = item.stack.push_front(path);
            let nested = entry
                .dependencies
                .iter()
                .map(|dep| (dep, item.optional))
                .chain(entry.optional_dependencies.iter().map(|dep| (dep, true)));
            for ((name, range), optional) in nested {
                queue.push_back(WorkItem {
                    name: name.clone(),
                    range: range.clone(),
                    dev: item.dev,
                    optional,
                    stack: children.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DependencyForest, DependencyRecord};

    const LOCK_V1: &str = r#"# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
# yarn lockfile v1


"@babel/code-frame@^7.0.0", "@babel/code-frame@^7.10.4":
  version "7.12.13"
  resolved "https://registry.yarnpkg.com/@babel/code-frame/-/code-frame-7.12.13.tgz"
  dependencies:
    "@babel/highlight" "^7.10.4"

"@babel/highlight@^7.10.4":
  version "7.13.10"

chokidar@^3.5.0:
  version "3.5.3"
  dependencies:
    braces "~3.0.2"
  optionalDependencies:
    fsevents "~2.3.2"

braces@~3.0.2:
  version "3.0.2"

fsevents@~2.3.2:
  version "2.3.3"
"#;

    fn manifest(deps: &[(&str, &str)], dev_deps: &[(&str, &str)]) -> PackageManifest {
        let table = |items: &[(&str, &str)]| {
            items
                .iter()
                .map(|(n, r)| (n.to_string(), r.to_string()))
                .collect()
        };
        PackageManifest {
            dependencies: table(deps),
            dev_dependencies: table(dev_deps),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_multi_key_entry() {
        let lock = YarnLock::parse(LOCK_V1).unwrap();
        assert_eq!(lock.len(), 5);

        let a = lock.get("@babel/code-frame", "^7.0.0").unwrap();
        let b = lock.get("@babel/code-frame", "^7.10.4").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.version, "7.12.13");
        assert_eq!(a.dependencies["@babel/highlight"], "^7.10.4");

        let chokidar = lock.get("chokidar", "^3.5.0").unwrap();
        assert_eq!(chokidar.optional_dependencies["fsevents"], "~2.3.2");
        assert!(!chokidar.dependencies.contains_key("fsevents"));
    }

    #[test]
    fn test_parse_colon_layout() {
        let lock = YarnLock::parse(
            "\"left-pad@npm:^1.3.0\":\n  version: 1.3.0\n  dependencies:\n    \"@scope/x\": \"npm:^2.0.0\"\n",
        )
        .unwrap();
        let entry = lock.get("left-pad", "^1.3.0").unwrap();
        assert_eq!(entry.version, "1.3.0");
        assert_eq!(entry.dependencies["@scope/x"], "npm:^2.0.0");
    }

    #[test]
    fn test_parse_rejects_stray_field() {
        assert!(YarnLock::parse("  version \"1.0.0\"\n").is_err());
    }

    #[test]
    fn test_split_descriptor() {
        assert_eq!(split_descriptor("a@^1.0.0"), Some(("a", "^1.0.0")));
        assert_eq!(split_descriptor("@scope/b@~2"), Some(("@scope/b", "~2")));
        assert_eq!(
            split_descriptor("c@npm:d@^1"),
            Some(("c", "npm:d@^1"))
        );
        assert_eq!(split_descriptor("nameonly"), None);
    }

    #[test]
    fn test_alias_target() {
        assert_eq!(alias_target("npm:string-width@^4.2.0"), Some("string-width"));
        assert_eq!(alias_target("npm:@scope/real@~1.0.0"), Some("@scope/real"));
        assert_eq!(alias_target("npm:^1.0.0"), None);
        assert_eq!(alias_target("^1.0.0"), None);
    }

    #[test]
    fn test_walk_matches_aliased_dependency_by_real_name() {
        let lock = YarnLock::parse(
            "\"foo@npm:bar@^1.0.0\":\n  version \"1.2.0\"\n  dependencies:\n    baz \"^3\"\n\n\
             baz@^3:\n  version \"3.0.0\"\n",
        )
        .unwrap();
        // node_modules/foo holds a manifest named bar
        let mut forest: DependencyForest = [
            DependencyRecord::new("bar", "1.2.0"),
            DependencyRecord::new("baz", "3.0.0"),
        ]
        .into_iter()
        .collect();

        let ranged = RangedLock {
            lock,
            manifest: manifest(&[("foo", "npm:bar@^1.0.0")], &[]),
        };
        let mut reconciler = Reconciler::new(&mut forest);
        ranged.walk(&mut reconciler).unwrap();

        let bar = forest.get("bar", "1.2.0").unwrap();
        assert!(bar.visited && bar.prod && bar.mandatory);
        assert!(forest.get("baz", "3.0.0").unwrap().visited);
    }

    #[test]
    fn test_walk_missing_alias_reports_real_name() {
        let lock = YarnLock::default();
        let mut forest = DependencyForest::new();
        let ranged = RangedLock {
            lock,
            manifest: manifest(&[("foo", "npm:bar@^1.0.0")], &[]),
        };
        let mut reconciler = Reconciler::new(&mut forest);
        let err = ranged.walk(&mut reconciler).unwrap_err();
        assert!(matches!(err, Error::MissingDependency { ref name, .. } if name == "bar"));
    }

    #[test]
    fn test_walk_resolves_shadowed_child() {
        let lock = YarnLock::parse(
            "a@^1:\n  version \"1.0.0\"\n  dependencies:\n    b \"^2\"\n\nb@^2:\n  version \"2.0.0\"\n",
        )
        .unwrap();
        let mut a = DependencyRecord::new("a", "1.0.0");
        a.bundled.add(DependencyRecord::new("b", "2.0.0"));
        let mut forest: DependencyForest = [a, DependencyRecord::new("b", "1.0.0")].into_iter().collect();

        let ranged = RangedLock {
            lock,
            manifest: manifest(&[("a", "^1")], &[]),
        };
        let mut reconciler = Reconciler::new(&mut forest);
        ranged.walk(&mut reconciler).unwrap();

        let nested_b = forest.get("a", "1.0.0").unwrap().bundled.get("b", "2.0.0").unwrap();
        assert!(nested_b.visited && nested_b.prod);
        assert!(!forest.get("b", "1.0.0").unwrap().visited);
    }

    #[test]
    fn test_walk_optional_dependencies_forced_optional() {
        let lock = YarnLock::parse(LOCK_V1).unwrap();
        let mut forest: DependencyForest = [
            DependencyRecord::new("chokidar", "3.5.3"),
            DependencyRecord::new("braces", "3.0.2"),
            DependencyRecord::new("fsevents", "2.3.3"),
        ]
        .into_iter()
        .collect();

        let ranged = RangedLock {
            lock,
            manifest: manifest(&[("chokidar", "^3.5.0")], &[]),
        };
        let mut reconciler = Reconciler::new(&mut forest);
        ranged.walk(&mut reconciler).unwrap();

        let braces = forest.get("braces", "3.0.2").unwrap();
        assert!(braces.mandatory && !braces.optional);
        let fsevents = forest.get("fsevents", "2.3.3").unwrap();
        assert!(fsevents.optional && !fsevents.mandatory && fsevents.prod);
    }

    #[test]
    fn test_walk_shared_dependency_processed_once_per_flags() {
        let lock = YarnLock::parse(
            "a@^1:\n  version \"1.0.0\"\n  dependencies:\n    c \"^1\"\n\n\
             b@^1:\n  version \"1.0.0\"\n  dependencies:\n    c \"^1\"\n\n\
             c@^1:\n  version \"1.0.0\"\n",
        )
        .unwrap();
        let mut forest: DependencyForest = ["a", "b", "c"]
            .into_iter()
            .map(|name| DependencyRecord::new(name, "1.0.0"))
            .collect();

        let ranged = RangedLock {
            lock,
            manifest: manifest(&[("a", "^1")], &[("b", "^1")]),
        };
        let mut reconciler = Reconciler::new(&mut forest);
        ranged.walk(&mut reconciler).unwrap();
        // a, b, c as prod, c as dev
        assert_eq!(reconciler.finish().edges, 4);

        let c = forest.get("c", "1.0.0").unwrap();
        assert!(c.prod && c.dev);
        let b = forest.get("b", "1.0.0").unwrap();
        assert!(b.dev && !b.prod);
    }

    #[test]
    fn test_walk_missing_mandatory() {
        let lock = YarnLock::parse("a@^1:\n  version \"1.0.0\"\n").unwrap();
        let mut forest = DependencyForest::new();
        let ranged = RangedLock {
            lock,
            manifest: manifest(&[("a", "^1")], &[]),
        };
        let mut reconciler = Reconciler::new(&mut forest);
        let err = ranged.walk(&mut reconciler).unwrap_err();
        assert!(matches!(err, Error::MissingDependency { ref name, .. } if name == "a"));
    }

    #[test]
    fn test_walk_unresolved_range() {
        let lock = YarnLock::default();
        let mut forest: DependencyForest = [DependencyRecord::new("a", "1.0.0")].into_iter().collect();
        let ranged = RangedLock {
            lock,
            manifest: manifest(&[("a", "^1")], &[]),
        };
        let mut reconciler = Reconciler::new(&mut forest);
        let err = ranged.walk(&mut reconciler).unwrap_err();
        assert!(matches!(err, Error::UnresolvedRange { ref range, .. } if range == "^1"));
    }

    #[test]
    fn test_walk_missing_dev_dependency_skipped() {
        let lock = YarnLock::default();
        let mut forest = DependencyForest::new();
        let ranged = RangedLock {
            lock,
            manifest: manifest(&[], &[("jest", "^29")]),
        };
        let mut reconciler = Reconciler::new(&mut forest);
        ranged.walk(&mut reconciler).unwrap();
        assert_eq!(reconciler.finish().skipped, 1);
    }
}
