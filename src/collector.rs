// src/collector.rs

//! Per-project collection and the cross-project inventory
//!
//! For each configured project the collector crawls the installed tree,
//! classifies it (from the lock file, or from the project's static dev / prod
//! designation when it has none), optionally drops development-only
//! packages, and flattens everything into one [`Inventory`].

use crate::config::{AuditConfig, ProjectConfig};
use crate::crawler::{Crawler, load_overrides};
use crate::error::{Error, Result};
use crate::lockfile::{ReconcileSummary, load_declared_graph, reconcile};
use crate::record::{DependencyForest, DependencyRecord};
use serde::Serialize;
use tracing::{debug, info};

/// Collects one project at a time
pub struct Collector<'c> {
    config: &'c AuditConfig,
}

/// What collecting one project produced
#[derive(Debug)]
pub struct ProjectCollection {
    /// Installed tree, with bundled forests still nested
    pub forest: DependencyForest,
    /// Present when the project was reconciled against a lock file
    pub summary: Option<ReconcileSummary>,
    /// Records dropped as development-only
    pub purged: usize,
}

impl<'c> Collector<'c> {
    pub fn new(config: &'c AuditConfig) -> Self {
        Self { config }
    }

    /// Collect every configured project into a fresh inventory
    pub fn collect_all(&self) -> Result<Inventory> {
        let mut inventory = Inventory::new();
        for project in &self.config.projects {
            let collection = self.collect_project(project)?;
            inventory.merge_project(collection.forest);
        }
        Ok(inventory)
    }

    /// Crawl and classify a single project
    pub fn collect_project(&self, project: &ProjectConfig) -> Result<ProjectCollection> {
        info!("Inspecting {} modules", project.name);

        let mut forest = self.crawl(project)?;

        let summary = if project.lockfile {
            let graph = load_declared_graph(&project.directory)?;
            info!("Using {} lock for {}", graph.kind(), project.name);
            Some(reconcile(&graph, &mut forest)?)
        } else {
            stamp_top_level(&mut forest, project.dev);
            None
        };

        if summary.is_some() {
            for (_, _, record) in forest.iter_recursive().filter(|(_, _, r)| !r.visited) {
                debug!("Extraneous package {} at {}", record.handle(), record.path.display());
            }
        }

        let purged = if project.ignore_dev_dependencies {
            let purged = forest.retain_recursive(&mut |record: &DependencyRecord| !record.is_dev_only());
            debug!("Dropped {} development-only packages from {}", purged, project.name);
            purged
        } else {
            0
        };

        Ok(ProjectCollection {
            forest,
            summary,
            purged,
        })
    }

    fn crawl(&self, project: &ProjectConfig) -> Result<DependencyForest> {
        let modules_dir = project.modules_dir();
        let mut forest = DependencyForest::new();

        if !modules_dir.is_dir() {
            return Err(Error::io(
                &modules_dir,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no installed modules for project {}", project.name),
                ),
            ));
        }

        let crawler = Crawler::new(&self.config.ignore_directories);
        match &project.overrides {
            Some(path) => {
                let overrides = load_overrides(path)?;
                debug!("Loaded {} module overrides from {}", overrides.len(), path.display());
                crawler.crawl_with_overrides(
                    &project.name,
                    &modules_dir,
                    &project.ignore,
                    &overrides,
                    &mut forest,
                )?;
            }
            None => crawler.crawl(&project.name, &modules_dir, &project.ignore, &mut forest)?,
        }

        debug!(
            "Crawled {} top level packages for {}",
            forest.len(),
            project.name
        );
        Ok(forest)
    }
}

/// Without a lock file every top level package gets the project's static
/// designation. Bundled packages stay unclassified.
fn stamp_top_level(forest: &mut DependencyForest, dev: bool) {
    for record in forest.records_mut() {
        if dev {
            record.dev = true;
        } else {
            record.prod = true;
        }
    }
}

/// Every package found across all projects, keyed by name and version
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Inventory {
    records: DependencyForest,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a project's forest into the inventory
    ///
    /// Bundled records become top level entries. A package already present
    /// keeps its metadata and gains the incoming classification flags.
    pub fn merge_project(&mut self, forest: DependencyForest) {
        for record in forest.into_flat_records() {
            self.records.merge(record);
        }
    }

    /// Split into (production, development) inventories
    ///
    /// A package needed by any production edge is production; everything
    /// else, including packages no edge reached, is development.
    pub fn split_dev(&self) -> (Inventory, Inventory) {
        let mut production = Inventory::new();
        let mut development = Inventory::new();
        for (_, _, record) in self.records.iter() {
            let target = if record.prod {
                &mut production
            } else {
                &mut development
            };
            target.records.add(record.clone());
        }
        (production, development)
    }

    /// Pick each package's preferred license from `whitelist`
    pub fn apply_preferred_licenses(&mut self, whitelist: &[String]) {
        for record in self.records.records_mut() {
            record.identify_preferred_license(whitelist.iter().map(String::as_str));
        }
    }

    pub fn records(&self) -> &DependencyForest {
        &self.records
    }

    pub fn get(&self, name: &str, version: &str) -> Option<&DependencyRecord> {
        self.records.get(name, version)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
