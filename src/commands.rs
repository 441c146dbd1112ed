// src/commands.rs
//! Command handlers for the packaudit CLI

use anyhow::{Context, Result};
use packaudit::{AuditConfig, Collector, Error, Inventory, ProjectConfig, load_config};
use std::path::{Path, PathBuf};
use tracing::info;

/// Run every configured project and write the merged inventory as JSON
pub fn cmd_collect(config_path: &Path, output: Option<&Path>, split_dev: bool) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    if config.projects.is_empty() {
        return Err(anyhow::anyhow!(
            "No projects configured in {}",
            config_path.display()
        ));
    }

    let mut inventory = Collector::new(&config)
        .collect_all()
        .map_err(with_package_context)?;
    inventory.apply_preferred_licenses(&config.license.preferred);
    info!("Collected {} packages", inventory.len());

    let json = if split_dev {
        let (production, development) = inventory.split_dev();
        info!(
            "{} production, {} development packages",
            production.len(),
            development.len()
        );
        serde_json::to_string_pretty(&serde_json::json!({
            "production": production,
            "development": development,
        }))?
    } else {
        serde_json::to_string_pretty(&inventory)?
    };

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote inventory to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Audit one project directory and print a summary
pub fn cmd_check(directory: PathBuf, no_lockfile: bool, dev: bool, ignore_dev: bool) -> Result<()> {
    let name = directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    let mut project = ProjectConfig::new(name, directory);
    project.lockfile = !no_lockfile;
    project.dev = dev;
    project.ignore_dev_dependencies = ignore_dev;

    let config = AuditConfig::default();
    let collection = Collector::new(&config)
        .collect_project(&project)
        .map_err(with_package_context)?;

    let mut inventory = Inventory::new();
    inventory.merge_project(collection.forest);
    let (production, development) = inventory.split_dev();

    println!("Project: {}", project.name);
    println!("  Packages: {}", inventory.len());
    println!("  Production: {}", production.len());
    println!("  Development: {}", development.len());
    if let Some(summary) = collection.summary {
        println!(
            "  Lock edges: {} ({} matched, {} skipped)",
            summary.edges, summary.matched, summary.skipped
        );
    }
    if collection.purged > 0 {
        println!("  Dropped dev-only: {}", collection.purged);
    }

    let extraneous: Vec<_> = inventory
        .records()
        .iter()
        .filter(|(_, _, record)| project.lockfile && !record.visited)
        .map(|(name, version, _)| format!("{name}@{version}"))
        .collect();
    if !extraneous.is_empty() {
        println!("  Not in lock file: {}", extraneous.join(", "));
    }

    Ok(())
}

/// Prefix package-specific collection errors with the package name
fn with_package_context(err: Error) -> anyhow::Error {
    match err.package_name().map(str::to_string) {
        Some(name) => anyhow::Error::new(err).context(format!("Audit stopped at package {name}")),
        None => err.into(),
    }
}
