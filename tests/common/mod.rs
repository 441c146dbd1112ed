// tests/common/mod.rs

//! Shared test utilities for building fake npm projects on disk.

#![allow(dead_code)]

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A project directory under a temporary root
///
/// Keep the value alive for the duration of the test; dropping it deletes
/// the tree.
pub struct FixtureProject {
    _root: TempDir,
    pub dir: PathBuf,
}

impl FixtureProject {
    pub fn new(name: &str) -> Self {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(name);
        fs::create_dir_all(dir.join("node_modules")).unwrap();
        Self { _root: root, dir }
    }

    pub fn modules(&self) -> PathBuf {
        self.dir.join("node_modules")
    }

    /// Install `name@version` at `node_modules/<chain...>/node_modules/<name>`
    ///
    /// `parents` lists the handles of the modules it is bundled under,
    /// outermost first.
    pub fn install(&self, parents: &[&str], name: &str, version: &str, license: &str) -> PathBuf {
        let mut dir = self.modules();
        for parent in parents {
            dir = dir.join(parent).join("node_modules");
        }
        let module = dir.join(name);
        write_manifest(
            &module,
            json!({
                "name": name,
                "version": version,
                "license": license,
                "description": format!("{name} test package"),
            }),
        );
        module
    }

    /// Write the project's own package.json
    pub fn manifest(&self, dependencies: &[(&str, &str)], dev_dependencies: &[(&str, &str)]) {
        let table = |items: &[(&str, &str)]| {
            items
                .iter()
                .map(|(name, range)| (name.to_string(), json!(range)))
                .collect::<serde_json::Map<_, _>>()
        };
        write_manifest(
            &self.dir,
            json!({
                "name": "fixture-app",
                "version": "1.0.0",
                "dependencies": table(dependencies),
                "devDependencies": table(dev_dependencies),
            }),
        );
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

pub fn write_manifest(dir: &Path, manifest: serde_json::Value) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("package.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}
