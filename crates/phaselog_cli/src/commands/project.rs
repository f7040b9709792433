//! Project creation, listing and renaming.

use super::Workspace;
use anyhow::{Context, Result};
use console::style;
use phaselog_core::{Config, CONFIG_FILE};
use std::fs;
use std::path::Path;

/// Create a project, initializing the projects root on first use.
pub fn init(root: &Path, name: &str, title: Option<&str>) -> Result<()> {
    fs::create_dir_all(root)
        .with_context(|| format!("Failed to create projects root {}", root.display()))?;
    if !root.join(CONFIG_FILE).exists() {
        Config::default()
            .save(root)
            .context("Failed to write default configuration")?;
        println!("Configuration written to {}", root.join(CONFIG_FILE).display());
    }

    let ws = Workspace::open(root)?;
    let slug = ws
        .catalog()
        .create_project(name, title.unwrap_or(name))
        .context("Failed to create project")?;

    println!("Created project {}", style(&slug).cyan());
    println!();
    println!("Directory structure:");
    println!("  {}/main/            - Root phase", slug);
    println!("  {}/main/context.md  - Root checkpoint (holds the title)", slug);
    println!("  {}/main/backups/    - Timestamped log snapshots", slug);
    Ok(())
}

/// List projects with their titles and phases.
pub fn list(root: &Path) -> Result<()> {
    let ws = Workspace::open(root)?;
    let projects = ws.catalog().list_projects()?;

    if projects.is_empty() {
        println!("No projects in {}", root.display());
        return Ok(());
    }

    for project in projects {
        println!(
            "{}  {}",
            style(&project.slug).cyan(),
            style(&project.title).bold()
        );
        if !project.phases.is_empty() {
            println!("    phases: {}", project.phases.join(", "));
        }
    }
    Ok(())
}

/// Set a new project title.
pub fn rename(root: &Path, project: &str, title: &str) -> Result<()> {
    let ws = Workspace::open(root)?;
    ws.catalog().rename_project(project, title)?;
    println!("Renamed {} to {}", project, style(title.trim()).bold());
    Ok(())
}
