// src/lib.rs

//! Packaudit
//!
//! Supply-chain audit engine for npm dependency trees. It inventories every
//! package installed under a project's `node_modules`, reconciles the tree
//! against the project's lock file, and classifies each package as
//! production or development and mandatory or optional.
//!
//! # Architecture
//!
//! - Record model: name -> version -> record forests, each record owning the
//!   forest of packages bundled in its own `node_modules`
//! - Crawler: builds the installed forest from manifests on disk
//! - Lock reconciler: walks the declared graph (nested npm lock, flat npm
//!   lock, or yarn lock) and accumulates classification flags
//! - Collector: runs each configured project and merges the results into
//!   one inventory

pub mod collector;
pub mod config;
pub mod crawler;
mod error;
pub mod lockfile;
pub mod record;

pub use collector::{Collector, Inventory, ProjectCollection};
pub use config::{AuditConfig, ProjectConfig, load_config};
pub use crawler::Crawler;
pub use error::{Error, Result};
pub use lockfile::{DeclaredGraph, ReconcileSummary, load_declared_graph, reconcile};
pub use record::{DependencyForest, DependencyRecord, License};
