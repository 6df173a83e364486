use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// The three checkpoints every work item passes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Precondition,
    Operation,
    Postcondition,
}

impl Stage {
    /// 1-based position, used for the `[n/3]` progress prefix
    pub fn position(self) -> usize {
        match self {
            Stage::Precondition => 1,
            Stage::Operation => 2,
            Stage::Postcondition => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Precondition => write!(f, "precondition"),
            Stage::Operation => write!(f, "operation"),
            Stage::Postcondition => write!(f, "postcondition"),
        }
    }
}

/// Human-readable labels for the three stages of one batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSet {
    pub precondition: String,
    pub operation: String,
    pub postcondition: String,
}

impl StageSet {
    pub fn new(
        precondition: impl Into<String>,
        operation: impl Into<String>,
        postcondition: impl Into<String>,
    ) -> Self {
        Self {
            precondition: precondition.into(),
            operation: operation.into(),
            postcondition: postcondition.into(),
        }
    }

    pub fn label(&self, stage: Stage) -> &str {
        match stage {
            Stage::Precondition => &self.precondition,
            Stage::Operation => &self.operation,
            Stage::Postcondition => &self.postcondition,
        }
    }
}

/// Why an item was intentionally not processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The probe reported a live or upcoming stream
    LiveContent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::LiveContent => write!(f, "live content detected"),
        }
    }
}

/// Failure classes, kept apart so operators can tell them apart in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The precondition check refused the item
    Rejected,
    /// An expected failure class, such as a download the engine could not complete
    Recoverable,
    /// Anything else raised (or panicked) inside the operation
    Unexpected,
    /// The operation exceeded the per-item time limit
    TimedOut,
    /// The operation returned but its output did not check out
    Postcondition,
}

/// A failure tagged with the stage that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub label: String,
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Final disposition of one work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { artifact: PathBuf },
    Skipped { reason: SkipReason },
    Failed(StageFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped { .. })
    }

    /// The stage a failed item stopped at
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Outcome::Failed(failure) => Some(failure.stage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Everything one batch run produced, in input order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_success()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded() - self.skipped()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs_err::write(path, content)?;
        Ok(())
    }
}
