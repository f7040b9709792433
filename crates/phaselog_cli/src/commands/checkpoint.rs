//! Checkpoint, phase close and hierarchy commands.

use super::Workspace;
use anyhow::{Context, Result};
use console::style;
use phaselog_core::{CheckpointBuild, HierarchyLoader, SummaryOutcome};
use std::path::Path;

fn print_build(build: &CheckpointBuild) {
    let meta = &build.document.metadata;
    println!("  Title:    {}", style(&meta.title).bold());
    println!("  Tags:     {}", meta.tags.join(", "));
    println!("  Messages: {}", build.record_count);
    match &build.summary {
        SummaryOutcome::Generated(text) => println!("  Summary:  {}", text),
        SummaryOutcome::Fallback { text, reason } => {
            println!("  Summary:  {}", text);
            println!(
                "  {} automatic summary unavailable ({})",
                style("⚠").yellow(),
                reason
            );
        }
    }
    if let Some(backup) = &build.recovered_from {
        println!(
            "  {} log restored from {}",
            style("⚠").yellow(),
            backup.display()
        );
    }
}

/// Build and write a phase checkpoint.
pub fn build(root: &Path, project: &str, phase: &str) -> Result<()> {
    let ws = Workspace::open(root)?;
    ws.require_project(project)?;
    let (build, path) = ws
        .checkpoints()
        .generate(project, phase)
        .context("Failed to build checkpoint")?;

    println!("Checkpoint written to {}", path.display());
    print_build(&build);
    Ok(())
}

/// Checkpoint a phase and open the next one.
pub fn close(root: &Path, project: &str, phase: &str) -> Result<()> {
    let ws = Workspace::open(root)?;
    let closed = ws
        .catalog()
        .close_phase(project, phase)
        .context("Failed to close phase")?;

    println!("Checkpoint written to {}", closed.checkpoint.display());
    print_build(&closed.build);
    println!();
    println!(
        "{} next phase: {}",
        style("✓").green(),
        style(&closed.next_phase).cyan()
    );
    Ok(())
}

/// Print the merged context up to a phase.
pub fn hierarchy(root: &Path, project: &str, phase: &str) -> Result<()> {
    let ws = Workspace::open(root)?;
    ws.require_project(project)?;
    let hierarchy =
        HierarchyLoader::new(ws.layout.clone(), ws.store.clone()).load_hierarchy(project, phase)?;

    println!("{}", hierarchy.merged_text);
    println!();
    let phases: Vec<&str> = hierarchy
        .static_contexts
        .iter()
        .map(|c| c.phase.as_str())
        .collect();
    println!("{} {}", style("Phases:").bold(), phases.join(" → "));
    println!(
        "{} {} live messages in {}",
        style("Live:").bold(),
        hierarchy.live_records.len(),
        phase
    );
    Ok(())
}
