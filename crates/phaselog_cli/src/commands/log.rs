//! Reading and writing phase logs.

use super::Workspace;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use console::style;
use phaselog_core::{Meta, Role};
use std::path::Path;

/// Append one message.
pub fn say(
    root: &Path,
    project: &str,
    phase: &str,
    role: &str,
    content: &str,
    meta: Option<&str>,
) -> Result<()> {
    let role: Role = role.parse().map_err(|e: String| anyhow!(e))?;
    let meta = meta
        .map(|raw| serde_json::from_str::<Meta>(raw).context("--meta must be a JSON object"))
        .transpose()?;

    let ws = Workspace::open(root)?;
    let session = ws.phase(project, phase)?;
    let record = session.save(role, content, meta)?;

    println!(
        "[{}] {} appended to {}/{}",
        record.timestamp,
        record.role,
        project,
        session.phase()
    );
    Ok(())
}

/// Print a phase's messages and whether its checkpoint is stale.
pub fn history(root: &Path, project: &str, phase: &str, json: bool) -> Result<()> {
    let ws = Workspace::open(root)?;
    let status = ws.catalog().phase_status(project, phase)?;
    if let Some(backup) = &status.recovered_from {
        eprintln!(
            "{} log was corrupt; restored from {}",
            style("warning:").yellow().bold(),
            backup.display()
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&status.history)?);
        return Ok(());
    }

    for record in &status.history {
        let role = match record.role {
            Role::User => style(record.role.as_str()).green(),
            Role::Assistant => style(record.role.as_str()).cyan(),
        };
        println!("{} {}", style(&record.timestamp).dim(), role);
        println!("  {}", record.content);
    }

    println!();
    println!("Messages:   {}", status.history.len());
    if let Some(modified) = status.log_modified {
        let modified: DateTime<Local> = modified.into();
        println!("Last write: {}", modified.format("%Y-%m-%d %H:%M:%S"));
    }
    match (status.checkpoint_exists, status.pending) {
        (true, false) => println!("Checkpoint: {}", style("up to date").green()),
        (true, true) => println!("Checkpoint: {}", style("stale").yellow()),
        (false, _) => println!("Checkpoint: {}", style("none").dim()),
    }
    Ok(())
}

/// Remove the last message of a phase.
pub fn rollback(root: &Path, project: &str, phase: &str) -> Result<()> {
    let ws = Workspace::open(root)?;
    let session = ws.phase(project, phase)?;

    match session.rollback()? {
        Some(removed) => println!(
            "Removed last {} message ({} chars)",
            removed.role,
            removed.content.chars().count()
        ),
        None => println!("Nothing to roll back"),
    }
    Ok(())
}
