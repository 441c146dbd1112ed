// src/record/mod.rs

//! Installed package records and the forests that hold them
//!
//! A [`DependencyForest`] maps package name to version to
//! [`DependencyRecord`]. Both levels are sorted so reports come out in the
//! same order on every run. Each record owns a private `bundled` forest
//! holding the packages installed in its own nested `node_modules`, which
//! models the package manager's shadowing rule: a dependency may carry a
//! private copy of a sub-dependency that differs from the hoisted one.
//!
//! # Example
//!
//! ```
//! use packaudit::record::{DependencyForest, DependencyRecord};
//!
//! let mut forest = DependencyForest::new();
//! forest.add(DependencyRecord::new("chalk", "4.1.2"));
//!
//! let chalk = forest.get_mut("chalk", "4.1.2").unwrap();
//! chalk.visit(false, false);
//! assert!(chalk.prod && chalk.mandatory);
//! ```

mod license;

pub use license::{License, split_license_expression};

use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::PathBuf;

/// One (name, version) installation found on disk
#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyRecord {
    pub name: String,
    pub version: String,
    pub description: String,
    pub license: License,
    /// First license of `license` found in the preferred whitelist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_license: Option<String>,
    /// Remaining licenses once the preferred one is taken out
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_licenses: Vec<String>,
    pub author: String,
    pub homepage: String,
    pub repository: String,
    /// Directory the package was installed in
    pub path: PathBuf,
    /// Reached from the declared dependency graph
    pub visited: bool,
    pub dev: bool,
    pub prod: bool,
    pub optional: bool,
    pub mandatory: bool,
    /// Packages installed in this package's own `node_modules`
    #[serde(skip_serializing_if = "DependencyForest::is_empty")]
    pub bundled: DependencyForest,
}

impl DependencyRecord {
    /// Create a record with nothing but a name and version
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// The `name/version` handle used in logs and reports
    pub fn handle(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }

    /// Mark this record as required by a declared edge
    ///
    /// Flags only ever get raised, so reaching the same package through a
    /// production and a development edge leaves both `prod` and `dev` set.
    pub fn visit(&mut self, is_dev: bool, is_optional: bool) {
        self.visited = true;
        if is_dev {
            self.dev = true;
        } else {
            self.prod = true;
        }
        if is_optional {
            self.optional = true;
        } else {
            self.mandatory = true;
        }
    }

    /// OR the classification flags of `other` into this record
    pub fn absorb_flags(&mut self, other: &DependencyRecord) {
        self.visited |= other.visited;
        self.dev |= other.dev;
        self.prod |= other.prod;
        self.optional |= other.optional;
        self.mandatory |= other.mandatory;
    }

    /// Only a development dependency: needed by some dev edge, by no prod edge
    pub fn is_dev_only(&self) -> bool {
        self.dev && !self.prod
    }

    /// Split the license and pick the first whitelisted one as preferred
    pub fn identify_preferred_license<'a, I>(&mut self, whitelist: I)
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        let all = self.license.to_list();
        let mut licenses = all.clone();
        self.preferred_license = None;

        if let Some(index) = licenses
            .iter()
            .position(|lic| whitelist.clone().into_iter().any(|w| w == lic.as_str()))
        {
            self.preferred_license = Some(licenses.remove(index));
        }

        self.additional_licenses = licenses;
        self.license = License::List(all);
    }
}

/// Address of a record inside a forest: the chain of (name, version) keys
/// walked from the root through successive bundled forests
pub type RecordPath = Vec<(String, String)>;

/// Sorted name -> version -> record mapping
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DependencyForest {
    packages: BTreeMap<String, BTreeMap<String, DependencyRecord>>,
}

impl DependencyForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless its (name, version) slot is already taken
    ///
    /// The first physically encountered copy is authoritative, so later
    /// duplicates are dropped. Returns whether the record was inserted.
    pub fn add(&mut self, record: DependencyRecord) -> bool {
        let versions = self.packages.entry(record.name.clone()).or_default();
        match versions.entry(record.version.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Insert a record, or OR its flags into the record already present
    pub fn merge(&mut self, record: DependencyRecord) {
        let versions = self.packages.entry(record.name.clone()).or_default();
        match versions.entry(record.version.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => slot.get_mut().absorb_flags(&record),
        }
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn get(&self, name: &str, version: &str) -> Option<&DependencyRecord> {
        self.packages.get(name)?.get(version)
    }

    pub fn get_mut(&mut self, name: &str, version: &str) -> Option<&mut DependencyRecord> {
        self.packages.get_mut(name)?.get_mut(version)
    }

    /// All installed versions of `name`, lowest key first
    pub fn versions(&self, name: &str) -> Vec<&str> {
        self.packages
            .get(name)
            .map(|versions| versions.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// The first version entry for `name` in key order
    pub fn first(&self, name: &str) -> Option<&DependencyRecord> {
        self.packages.get(name)?.values().next()
    }

    /// Number of records at this level (bundled forests not included)
    pub fn len(&self) -> usize {
        self.packages.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.values().all(BTreeMap::is_empty)
    }

    /// Yield every (name, version, record) of this level
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &DependencyRecord)> {
        self.packages.iter().flat_map(|(name, versions)| {
            versions
                .iter()
                .map(move |(version, record)| (name.as_str(), version.as_str(), record))
        })
    }

    /// Yield each record followed by the contents of its bundled forest
    pub fn iter_recursive(&self) -> RecursiveIter<'_> {
        RecursiveIter {
            stack: vec![Box::new(self.iter())],
        }
    }

    /// Mutable access to every record of this level
    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut DependencyRecord> {
        self.packages.values_mut().flat_map(BTreeMap::values_mut)
    }

    /// Drop every record at this level and below for which `keep` is false
    ///
    /// Returns how many records were removed.
    pub fn retain_recursive<F>(&mut self, keep: &mut F) -> usize
    where
        F: FnMut(&DependencyRecord) -> bool,
    {
        let mut removed = 0;
        for versions in self.packages.values_mut() {
            versions.retain(|_, record| {
                if keep(record) {
                    true
                } else {
                    removed += 1 + record.bundled.iter_recursive().count();
                    false
                }
            });
            for record in versions.values_mut() {
                removed += record.bundled.retain_recursive(keep);
            }
        }
        self.packages.retain(|_, versions| !versions.is_empty());
        removed
    }

    /// Consume the forest, returning every record at every depth in
    /// pre-order with its bundled forest moved out
    pub fn into_flat_records(self) -> Vec<DependencyRecord> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<DependencyRecord>) {
        for versions in self.packages.into_values() {
            for mut record in versions.into_values() {
                let bundled = std::mem::take(&mut record.bundled);
                out.push(record);
                bundled.flatten_into(out);
            }
        }
    }

    /// The bundled forest of the record at `path` (the root for an empty path)
    pub fn forest_at(&self, path: &[(String, String)]) -> Option<&DependencyForest> {
        let mut forest = self;
        for (name, version) in path {
            forest = &forest.get(name, version)?.bundled;
        }
        Some(forest)
    }

    pub fn record_at_mut(&mut self, path: &[(String, String)]) -> Option<&mut DependencyRecord> {
        let ((name, version), parents) = path.split_last()?;
        let mut forest = self;
        for (parent, parent_version) in parents {
            forest = &mut forest.get_mut(parent, parent_version)?.bundled;
        }
        forest.get_mut(name, version)
    }
}

impl FromIterator<DependencyRecord> for DependencyForest {
    fn from_iter<T: IntoIterator<Item = DependencyRecord>>(iter: T) -> Self {
        let mut forest = Self::new();
        for record in iter {
            forest.add(record);
        }
        forest
    }
}

type LevelIter<'a> = Box<dyn Iterator<Item = (&'a str, &'a str, &'a DependencyRecord)> + 'a>;

/// Depth-first iterator returned by [`DependencyForest::iter_recursive`]
pub struct RecursiveIter<'a> {
    stack: Vec<LevelIter<'a>>,
}

impl<'a> Iterator for RecursiveIter<'a> {
    type Item = (&'a str, &'a str, &'a DependencyRecord);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let level = self.stack.last_mut()?;
            match level.next() {
                Some(item) => {
                    let record = item.2;
                    if !record.bundled.is_empty() {
                        self.stack.push(Box::new(record.bundled.iter()));
                    }
                    return Some(item);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flagged(name: &str, version: &str, flags: [bool; 4]) -> DependencyRecord {
        let mut record = DependencyRecord::new(name, version);
        record.dev = flags[0];
        record.prod = flags[1];
        record.optional = flags[2];
        record.mandatory = flags[3];
        record
    }

    #[test]
    fn test_add_first_write_wins() {
        let mut forest = DependencyForest::new();
        let mut first = DependencyRecord::new("ms", "2.1.3");
        first.description = "first".to_string();
        let mut second = DependencyRecord::new("ms", "2.1.3");
        second.description = "second".to_string();
        second.prod = true;

        assert!(forest.add(first));
        assert!(!forest.add(second));

        let kept = forest.get("ms", "2.1.3").unwrap();
        assert_eq!(kept.description, "first");
        assert!(!kept.prod);
        assert_eq!(forest.len(), 1);
    }

    #[test]
    fn test_merge_ors_every_flag() {
        for a in 0..16u8 {
            for b in 0..16u8 {
                let bits = |n: u8| [n & 1 != 0, n & 2 != 0, n & 4 != 0, n & 8 != 0];
                let mut forest = DependencyForest::new();
                forest.merge(flagged("x", "1.0.0", bits(a)));
                forest.merge(flagged("x", "1.0.0", bits(b)));

                let merged = forest.get("x", "1.0.0").unwrap();
                let expected = bits(a | b);
                assert_eq!(
                    [merged.dev, merged.prod, merged.optional, merged.mandatory],
                    expected
                );
            }
        }
    }

    #[test]
    fn test_merge_keeps_distinct_versions() {
        let mut forest = DependencyForest::new();
        forest.merge(DependencyRecord::new("debug", "2.6.9"));
        forest.merge(DependencyRecord::new("debug", "4.3.4"));
        assert_eq!(forest.versions("debug"), vec!["2.6.9", "4.3.4"]);
    }

    #[test]
    fn test_visit_accumulates() {
        let mut record = DependencyRecord::new("a", "1.0.0");
        record.visit(false, false);
        let once = (record.visited, record.dev, record.prod, record.optional, record.mandatory);
        record.visit(false, false);
        let twice = (record.visited, record.dev, record.prod, record.optional, record.mandatory);
        assert_eq!(once, twice);
        assert_eq!(once, (true, false, true, false, true));

        record.visit(true, true);
        assert!(record.dev && record.prod && record.optional && record.mandatory);
    }

    #[test]
    fn test_iter_recursive_yields_each_record_once() {
        let mut inner = DependencyRecord::new("b", "2.0.0");
        inner.bundled.add(DependencyRecord::new("c", "3.0.0"));

        let mut outer = DependencyRecord::new("a", "1.0.0");
        outer.bundled.add(inner);
        outer.bundled.add(DependencyRecord::new("d", "1.0.0"));

        let mut forest = DependencyForest::new();
        forest.add(outer);
        forest.add(DependencyRecord::new("b", "1.0.0"));

        let seen: Vec<String> = forest
            .iter_recursive()
            .map(|(name, version, _)| format!("{name}@{version}"))
            .collect();
        assert_eq!(
            seen,
            vec!["a@1.0.0", "b@2.0.0", "c@3.0.0", "d@1.0.0", "b@1.0.0"]
        );
        assert_eq!(forest.iter().count(), 2);
    }

    #[test]
    fn test_record_paths() {
        let mut inner = DependencyRecord::new("b", "2.0.0");
        inner.bundled.add(DependencyRecord::new("c", "3.0.0"));
        let mut outer = DependencyRecord::new("a", "1.0.0");
        outer.bundled.add(inner);
        let mut forest = DependencyForest::new();
        forest.add(outer);

        let path: RecordPath = vec![
            ("a".to_string(), "1.0.0".to_string()),
            ("b".to_string(), "2.0.0".to_string()),
            ("c".to_string(), "3.0.0".to_string()),
        ];
        forest.record_at_mut(&path).unwrap().visit(true, false);
        let inner = forest.forest_at(&path[..2]).unwrap();
        assert!(inner.get("c", "3.0.0").unwrap().dev);
        assert!(forest.record_at_mut(&[]).is_none());
        assert!(forest.forest_at(&path[..1]).unwrap().contains_name("b"));
    }

    #[test]
    fn test_retain_recursive_counts_subtrees() {
        let mut dev_tool = DependencyRecord::new("jest", "29.0.0");
        dev_tool.dev = true;
        dev_tool.bundled.add(DependencyRecord::new("expect", "29.0.0"));

        let mut runtime = DependencyRecord::new("express", "4.18.2");
        runtime.prod = true;

        let mut forest = DependencyForest::new();
        forest.add(dev_tool);
        forest.add(runtime);

        let removed = forest.retain_recursive(&mut |r: &DependencyRecord| !r.is_dev_only());
        assert_eq!(removed, 2);
        assert!(!forest.contains_name("jest"));
        assert!(forest.contains_name("express"));
    }

    #[test]
    fn test_into_flat_records_empties_bundled() {
        let mut outer = DependencyRecord::new("a", "1.0.0");
        outer.bundled.add(DependencyRecord::new("b", "1.0.0"));
        let forest: DependencyForest = vec![outer].into_iter().collect();

        let flat = forest.into_flat_records();
        assert_eq!(flat.len(), 2);
        assert!(flat.iter().all(|r| r.bundled.is_empty()));
    }

    #[test]
    fn test_identify_preferred_license() {
        let mut record = DependencyRecord::new("a", "1.0.0");
        record.license = License::Expression("(GPL-3.0 OR MIT OR BSD-2-Clause)".to_string());
        record.identify_preferred_license(["MIT", "ISC"]);

        assert_eq!(record.preferred_license.as_deref(), Some("MIT"));
        assert_eq!(record.additional_licenses, vec!["GPL-3.0", "BSD-2-Clause"]);
        assert_eq!(
            record.license,
            License::List(vec![
                "GPL-3.0".to_string(),
                "MIT".to_string(),
                "BSD-2-Clause".to_string()
            ])
        );
    }

    #[test]
    fn test_identify_preferred_license_none_matching() {
        let mut record = DependencyRecord::new("a", "1.0.0");
        record.license = License::Expression("WTFPL".to_string());
        record.identify_preferred_license(["MIT"]);
        assert!(record.preferred_license.is_none());
        assert_eq!(record.additional_licenses, vec!["WTFPL"]);
    }
}
