//! Backup commands.

use super::Workspace;
use anyhow::Result;
use console::style;
use std::path::Path;

/// Snapshot a phase log now.
pub fn create(root: &Path, project: &str, phase: &str) -> Result<()> {
    let ws = Workspace::open(root)?;
    match ws.phase(project, phase)?.backup()? {
        Some(path) => println!("Backed up to {}", path.display()),
        None => println!("Log is missing or empty; nothing to back up"),
    }
    Ok(())
}

/// List backups, oldest first.
pub fn list(root: &Path, project: &str, phase: &str) -> Result<()> {
    let ws = Workspace::open(root)?;
    let backups = ws.phase(project, phase)?.backups()?;

    if backups.is_empty() {
        println!("No backups");
        return Ok(());
    }
    for path in &backups {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("  {}", name);
    }
    println!("{} backups", style(backups.len()).cyan());
    Ok(())
}

/// Keep only the newest `keep` backups.
pub fn prune(root: &Path, project: &str, phase: &str, keep: usize) -> Result<()> {
    let ws = Workspace::open(root)?;
    let session = ws.phase(project, phase)?;
    let removed = ws.store.prune_backups(session.log_path(), keep)?;

    if removed.is_empty() {
        println!("Nothing to prune");
    } else {
        println!(
            "Removed {} backups, kept the newest {}",
            style(removed.len()).yellow(),
            keep.max(1)
        );
    }
    Ok(())
}
