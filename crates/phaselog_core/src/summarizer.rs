//! Summarizer seam used by the checkpoint builder.
//!
//! The language model behind a summary is not part of this crate. Callers
//! plug one in through [`Summarizer`]; the CLI can run an external program
//! configured in `phaselog.toml`.

use crate::config::SummarizerConfig;
use crate::error::{PhaseLogError, Result};
use crate::types::ExchangeRecord;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;

/// Produces a short summary of a phase's exchanges.
pub trait Summarizer: Send + Sync {
    /// Summarizes the full record sequence of a phase.
    ///
    /// Failures are not fatal for callers; the checkpoint builder falls back
    /// to a summary built from the first user messages.
    fn summarize(&self, records: &[ExchangeRecord]) -> Result<String>;
}

impl<F> Summarizer for F
where
    F: Fn(&[ExchangeRecord]) -> Result<String> + Send + Sync,
{
    fn summarize(&self, records: &[ExchangeRecord]) -> Result<String> {
        self(records)
    }
}

/// Summarizer used when none is configured. Always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSummarizer;

impl Summarizer for NoSummarizer {
    fn summarize(&self, _records: &[ExchangeRecord]) -> Result<String> {
        Err(PhaseLogError::Summarizer(
            "no summarizer configured".to_string(),
        ))
    }
}

/// Runs an external program: transcript on stdin, summary on stdout.
#[derive(Debug, Clone)]
pub struct CommandSummarizer {
    program: String,
    args: Vec<String>,
}

impl CommandSummarizer {
    /// Creates a summarizer running `program` with `args`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Builds a summarizer from config, or `None` if no command is set.
    pub fn from_config(config: &SummarizerConfig) -> Option<Self> {
        config
            .command
            .as_ref()
            .map(|program| Self::new(program.clone(), config.args.clone()))
    }
}

impl Summarizer for CommandSummarizer {
    fn summarize(&self, records: &[ExchangeRecord]) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PhaseLogError::Summarizer(format!("failed to start {}: {}", self.program, e))
            })?;

        // Feed stdin from its own thread so a program that writes before it
        // has read everything cannot stall on a full stdout pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let transcript = conversation_text(records);
            thread::spawn(move || stdin.write_all(transcript.as_bytes()))
        });

        let output = child
            .wait_with_output()
            .map_err(|e| PhaseLogError::Summarizer(e.to_string()))?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // The program may legitimately stop reading early.
                Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => {
                    return Err(PhaseLogError::Summarizer(format!(
                        "failed to send transcript: {}",
                        e
                    )))
                }
                Err(_) => {
                    return Err(PhaseLogError::Summarizer(
                        "transcript writer panicked".to_string(),
                    ))
                }
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PhaseLogError::Summarizer(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let summary = String::from_utf8(output.stdout)
            .map_err(|e| PhaseLogError::Summarizer(format!("invalid UTF-8: {}", e)))?;
        Ok(summary.trim().to_string())
    }
}

/// Plain `role: content` transcript handed to summarizers.
pub fn conversation_text(records: &[ExchangeRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{}: {}", r.role, r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
