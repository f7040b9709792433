use super::assertions::Assertion;
use super::runner::ScenarioRunner;
use super::steps::ScenarioStep;
use phaselog_core::{Config, Meta, Role};
use serde_json::Value;

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    config: Config,
    summary: Option<String>,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            config: Config::default(),
            summary: None,
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Use a custom configuration for the projects root
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Summarizer that always returns `text`
    pub fn with_summary(mut self, text: &str) -> Self {
        self.summary = Some(text.to_string());
        self
    }

    /// Create the project every later step works on
    pub fn project(mut self, name: &str, title: &str) -> Self {
        self.steps.push(ScenarioStep::CreateProject {
            name: name.to_string(),
            title: title.to_string(),
        });
        self
    }

    /// Change the project title
    pub fn rename(mut self, title: &str) -> Self {
        self.steps.push(ScenarioStep::Rename {
            title: title.to_string(),
        });
        self
    }

    // ===== Direct log access =====

    /// Append a user message to a phase log
    pub fn user_says(mut self, phase: &str, content: &str) -> Self {
        self.steps.push(ScenarioStep::Append {
            phase: phase.to_string(),
            role: Role::User,
            content: content.to_string(),
            meta: None,
        });
        self
    }

    /// Append an assistant reply to a phase log
    pub fn assistant_says(mut self, phase: &str, content: &str) -> Self {
        self.steps.push(ScenarioStep::Append {
            phase: phase.to_string(),
            role: Role::Assistant,
            content: content.to_string(),
            meta: None,
        });
        self
    }

    /// Append an assistant reply carrying `meta`
    pub fn assistant_says_with_meta(mut self, phase: &str, content: &str, meta: Value) -> Self {
        self.steps.push(ScenarioStep::Append {
            phase: phase.to_string(),
            role: Role::Assistant,
            content: content.to_string(),
            meta: as_meta(meta),
        });
        self
    }

    /// Append `count` user/assistant pairs
    pub fn exchanges(mut self, phase: &str, count: usize) -> Self {
        for i in 0..count {
            self = self
                .user_says(phase, &format!("question {}", i))
                .assistant_says(phase, &format!("answer {}", i));
        }
        self
    }

    /// Remove the last record of a phase log
    pub fn rollback(mut self, phase: &str) -> Self {
        self.steps.push(ScenarioStep::Rollback {
            phase: phase.to_string(),
        });
        self
    }

    // ===== Live sessions =====

    /// Record a user turn through the phase's live session
    pub fn live_user(mut self, phase: &str, content: &str) -> Self {
        self.steps.push(ScenarioStep::LiveUser {
            phase: phase.to_string(),
            content: content.to_string(),
        });
        self
    }

    /// Record an assistant turn through the phase's live session
    pub fn live_assistant(mut self, phase: &str, content: &str, meta: Value) -> Self {
        self.steps.push(ScenarioStep::LiveAssistant {
            phase: phase.to_string(),
            content: content.to_string(),
            meta: as_meta(meta),
        });
        self
    }

    /// Rewrite a turn of the live buffer in place
    pub fn edit_buffer(mut self, phase: &str, index: usize, content: &str) -> Self {
        self.steps.push(ScenarioStep::EditBuffer {
            phase: phase.to_string(),
            index,
            content: content.to_string(),
        });
        self
    }

    /// Remove a turn from the live buffer
    pub fn drop_from_buffer(mut self, phase: &str, index: usize) -> Self {
        self.steps.push(ScenarioStep::DropFromBuffer {
            phase: phase.to_string(),
            index,
        });
        self
    }

    /// Finalize and close the phase's live session
    pub fn evict(mut self, phase: &str) -> Self {
        self.steps.push(ScenarioStep::Evict {
            phase: phase.to_string(),
        });
        self
    }

    // ===== Checkpoints =====

    /// Build and write a phase checkpoint
    pub fn checkpoint(mut self, phase: &str) -> Self {
        self.steps.push(ScenarioStep::Checkpoint {
            phase: phase.to_string(),
        });
        self
    }

    /// Checkpoint a phase and open the next
    pub fn close_phase(mut self, phase: &str) -> Self {
        self.steps.push(ScenarioStep::ClosePhase {
            phase: phase.to_string(),
        });
        self
    }

    // ===== Time control =====

    /// Advance the clock
    pub fn wait_secs(mut self, secs: u64) -> Self {
        self.steps.push(ScenarioStep::AdvanceSecs { secs });
        self
    }

    // ===== Failure simulation =====

    /// Overwrite a phase log with garbage
    pub fn corrupt_log(mut self, phase: &str) -> Self {
        self.steps.push(ScenarioStep::CorruptLog {
            phase: phase.to_string(),
        });
        self
    }

    /// Leave a half-written temp file next to a phase log, as a crash
    /// between write and rename would
    pub fn interrupted_write(mut self, phase: &str) -> Self {
        self.steps.push(ScenarioStep::InterruptedWrite {
            phase: phase.to_string(),
        });
        self
    }

    /// Run project recovery
    pub fn recover(mut self) -> Self {
        self.steps.push(ScenarioStep::Recover);
        self
    }

    // ===== Assertions =====

    /// Add an assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    /// Assert the number of records in a phase log
    pub fn assert_records(self, phase: &str, count: usize) -> Self {
        self.assert(Assertion::RecordCount {
            phase: phase.to_string(),
            count,
        })
    }

    /// Assert the content of one record
    pub fn assert_content(self, phase: &str, index: usize, content: &str) -> Self {
        self.assert(Assertion::ContentAt {
            phase: phase.to_string(),
            index,
            content: content.to_string(),
        })
    }

    /// Assert a hierarchy contains `text`
    pub fn assert_hierarchy_contains(self, current: &str, text: &str) -> Self {
        self.assert(Assertion::HierarchyContains {
            current: current.to_string(),
            text: text.to_string(),
        })
    }

    /// Assert a hierarchy does not contain `text`
    pub fn assert_hierarchy_excludes(self, current: &str, text: &str) -> Self {
        self.assert(Assertion::HierarchyExcludes {
            current: current.to_string(),
            text: text.to_string(),
        })
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let mut runner = match ScenarioRunner::new(self.config.clone(), self.summary.clone()) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name.clone(),
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

fn as_meta(value: Value) -> Option<Meta> {
    match value {
        Value::Object(map) if !map.is_empty() => Some(map),
        _ => None,
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
