//! Project verification and recovery commands.

use super::Workspace;
use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use phaselog_core::{recover_project, verify_project, LogState};
use std::path::Path;

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Verify project integrity.
pub fn run(root: &Path, project: &str) -> Result<()> {
    let ws = Workspace::open(root)?;

    let pb = spinner("Verifying project...");
    let report = verify_project(&ws.layout, &ws.store, project);
    pb.finish_and_clear();
    let report = report?;

    println!();
    println!("{}", style("Verification Report:").bold());

    for phase in &report.phases {
        let state = match &phase.state {
            LogState::Records(n) => style(format!("{} records", n)).cyan(),
            LogState::Missing => style("no log".to_string()).dim(),
            LogState::Corrupt { reason } => style(format!("corrupt: {}", reason)).red(),
        };
        println!("  {:<12} {}", phase.phase, state);
        if let Some(fingerprint) = &phase.fingerprint {
            println!("    blake3:     {}", &fingerprint[..16.min(fingerprint.len())]);
        }
        println!("    backups:    {}", phase.backups);
        match (phase.checkpoint_exists, phase.pending) {
            (true, true) => println!("    checkpoint: {}", style("stale").yellow()),
            (true, false) => println!("    checkpoint: {}", style("up to date").green()),
            (false, _) => println!("    checkpoint: {}", style("none").dim()),
        }
        if let Some(err) = &phase.checkpoint_error {
            println!("    {} {}", style("×").red(), err);
        }
        for tmp in &phase.temp_files {
            println!("    {} leftover {}", style("⚠").yellow(), tmp.display());
        }
    }

    println!();
    if report.has_issues() {
        println!("{}", style(&report.summary()).yellow().bold());
        println!();
        println!("{}", style("Recommendations:").bold());
        println!(
            "  {} Run {} to restore corrupt logs and clean up temp files",
            style("→").cyan(),
            style(format!("phaselog recover {}", project)).cyan()
        );
        if report.phases.iter().any(|p| p.checkpoint_error.is_some()) {
            println!(
                "  {} Rebuild invalid checkpoints with {}",
                style("→").cyan(),
                style("phaselog checkpoint").cyan()
            );
        }
    } else {
        println!(
            "{} {}",
            style("✓").green(),
            style(&report.summary()).green()
        );
    }

    Ok(())
}

/// Restore corrupt logs from backups.
pub fn recover(root: &Path, project: &str) -> Result<()> {
    let ws = Workspace::open(root)?;

    let pb = spinner("Recovering project...");
    let report = recover_project(&ws.layout, &ws.store, project);
    pb.finish_and_clear();
    let report = report?;

    for (phase, backup) in &report.restored {
        println!(
            "  {} {} restored from {}",
            style("✓").green(),
            phase,
            backup.display()
        );
    }
    for (phase, reason) in &report.unrecoverable {
        println!("  {} {} unrecoverable: {}", style("×").red(), phase, reason);
    }
    for tmp in &report.temp_files_removed {
        println!("  {} removed {}", style("→").cyan(), tmp.display());
    }
    println!("{}", report.summary());
    Ok(())
}
