//! Staged batch execution.
//!
//! [`BatchRunner`] walks work items one at a time through three stages
//! (precondition, operation, postcondition) supplied by an [`ItemOperation`].
//! Each item ends with exactly one [`Outcome`]; failures are tagged with the
//! stage that produced them and never stop the rest of the batch.

use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::report::Reporter;
use crate::utils::format_duration;

mod outcome;

pub use outcome::{
    BatchReport, FailureKind, ItemOutcome, Outcome, SkipReason, Stage, StageFailure, StageSet,
};

/// Placeholder substituted with the artifact path in success messages
pub const PATH_PLACEHOLDER: &str = "{path}";

/// What the operation stage hands back when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutput<T> {
    /// Work was done; the value goes on to the postcondition stage
    Produced(T),
    /// The item was deliberately left alone
    Skip(SkipReason),
}

/// Failures raised by the operation stage
#[derive(thiserror::Error, Debug)]
pub enum OperationError {
    /// An expected failure class; reported with a short reason, batch continues
    #[error("{reason}: {detail}")]
    Recoverable { reason: String, detail: String },

    /// Anything that was not anticipated; reported with the full error chain
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl OperationError {
    /// The engine could not retrieve the media
    pub fn fetch(detail: impl Into<String>) -> Self {
        Self::Recoverable {
            reason: "download failed".to_string(),
            detail: detail.into(),
        }
    }
}

/// A precondition or postcondition refusal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub message: String,
    pub detail: Option<String>,
}

impl Rejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Default precondition: the identifier must contain something other than whitespace
pub fn require_non_blank(item: &str) -> Result<(), Rejection> {
    if item.trim().is_empty() {
        Err(Rejection::new("identifier is empty"))
    } else {
        Ok(())
    }
}

/// Postcondition for file-producing operations: the artifact must exist on disk
pub fn require_existing(path: PathBuf) -> Result<PathBuf, Rejection> {
    if path.as_os_str().is_empty() || !path.exists() {
        Err(Rejection::new("output file not found").with_detail(path.display().to_string()))
    } else {
        Ok(path)
    }
}

/// The per-item work plugged into a [`BatchRunner`]
#[async_trait]
pub trait ItemOperation: Send + Sync {
    /// Value produced by [`run`](Self::run) and consumed by [`verify`](Self::verify)
    type Output: Send;

    /// Stage 1. Refusing here means [`run`](Self::run) is never called for the item.
    async fn check(&self, item: &str) -> Result<(), Rejection> {
        require_non_blank(item)
    }

    /// Stage 2
    async fn run(&self, item: &str) -> Result<OperationOutput<Self::Output>, OperationError>;

    /// Stage 3. Turns the produced value into the final artifact path.
    async fn verify(&self, item: &str, output: Self::Output) -> Result<PathBuf, Rejection>;
}

/// Sequential three-stage driver
pub struct BatchRunner {
    stages: StageSet,
    success_template: String,
    item_noun: &'static str,
    item_timeout: Option<Duration>,
    reporter: Reporter,
}

impl BatchRunner {
    /// `success_template` may contain `{path}`, replaced by the artifact path
    pub fn new(stages: StageSet, success_template: impl Into<String>) -> Self {
        Self {
            stages,
            success_template: success_template.into(),
            item_noun: "id",
            item_timeout: None,
            reporter: Reporter::default(),
        }
    }

    /// Word used for the item in progress lines (`id`, `file`)
    pub fn with_item_noun(mut self, noun: &'static str) -> Self {
        self.item_noun = noun;
        self
    }

    /// Upper bound on the operation stage of each item
    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout;
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Process every item in order and collect one outcome per item
    pub async fn run<O, I, S>(&self, items: I, operation: &O) -> BatchReport
    where
        O: ItemOperation + ?Sized,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let run_id = Uuid::new_v4();
        let started_at = chrono::Utc::now();

        let mut outcomes = Vec::new();
        for item in items {
            let item = item.as_ref();
            let outcome = self
                .process_item(item, operation)
                .instrument(tracing::info_span!("item", %run_id, item))
                .await;
            tracing::info!(%run_id, item, outcome = ?outcome, "item finished");
            outcomes.push(ItemOutcome {
                item: item.to_string(),
                outcome,
            });
        }

        let report = BatchReport {
            run_id,
            started_at,
            finished_at: chrono::Utc::now(),
            outcomes,
        };

        self.reporter.banner(&format!(
            "Done: {} succeeded, {} skipped, {} failed in {}",
            report.succeeded(),
            report.skipped(),
            report.failed(),
            format_duration(report.elapsed_seconds())
        ));

        report
    }

    async fn process_item<O>(&self, item: &str, operation: &O) -> Outcome
    where
        O: ItemOperation + ?Sized,
    {
        self.reporter
            .banner(&format!("Processing {}: {}", self.item_noun, display_item(item)));

        let outcome = match self.run_stages(item, operation).await {
            Ok(outcome) => outcome,
            Err(failure) => Outcome::Failed(failure),
        };

        self.report_outcome(item, &outcome);
        outcome
    }

    async fn run_stages<O>(&self, item: &str, operation: &O) -> Result<Outcome, StageFailure>
    where
        O: ItemOperation + ?Sized,
    {
        self.precondition(item, operation).await?;

        let produced = match self.operation(item, operation).await? {
            OperationOutput::Produced(value) => value,
            OperationOutput::Skip(reason) => return Ok(Outcome::Skipped { reason }),
        };

        let artifact = self.postcondition(item, produced, operation).await?;
        Ok(Outcome::Success { artifact })
    }

    async fn precondition<O>(&self, item: &str, operation: &O) -> Result<(), StageFailure>
    where
        O: ItemOperation + ?Sized,
    {
        self.enter(Stage::Precondition);
        match AssertUnwindSafe(operation.check(item)).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(rejection)) => Err(self.failure(
                Stage::Precondition,
                FailureKind::Rejected,
                rejection.message,
                rejection.detail,
            )),
            Err(panic) => Err(self.panicked(Stage::Precondition, panic.as_ref())),
        }
    }

    async fn operation<O>(
        &self,
        item: &str,
        operation: &O,
    ) -> Result<OperationOutput<O::Output>, StageFailure>
    where
        O: ItemOperation + ?Sized,
    {
        self.enter(Stage::Operation);

        let guarded = AssertUnwindSafe(operation.run(item)).catch_unwind();
        let result = match self.item_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(self.failure(
                        Stage::Operation,
                        FailureKind::TimedOut,
                        "operation timed out",
                        Some(format!("no result after {}", format_duration(limit.as_secs_f64()))),
                    ))
                }
            },
            None => guarded.await,
        };

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(OperationError::Recoverable { reason, detail })) => Err(self.failure(
                Stage::Operation,
                FailureKind::Recoverable,
                reason,
                Some(detail),
            )),
            Ok(Err(OperationError::Unexpected(error))) => Err(self.failure(
                Stage::Operation,
                FailureKind::Unexpected,
                "unexpected error",
                Some(format!("{:#}", error)),
            )),
            Err(panic) => Err(self.panicked(Stage::Operation, panic.as_ref())),
        }
    }

    async fn postcondition<O>(
        &self,
        item: &str,
        produced: O::Output,
        operation: &O,
    ) -> Result<PathBuf, StageFailure>
    where
        O: ItemOperation + ?Sized,
    {
        self.enter(Stage::Postcondition);
        match AssertUnwindSafe(operation.verify(item, produced)).catch_unwind().await {
            Ok(Ok(artifact)) => Ok(artifact),
            Ok(Err(rejection)) => Err(self.failure(
                Stage::Postcondition,
                FailureKind::Postcondition,
                rejection.message,
                rejection.detail,
            )),
            Err(panic) => Err(self.panicked(Stage::Postcondition, panic.as_ref())),
        }
    }

    fn enter(&self, stage: Stage) {
        tracing::debug!(%stage, label = self.stages.label(stage), "entering stage");
        self.reporter.stage(stage, self.stages.label(stage));
    }

    fn failure(
        &self,
        stage: Stage,
        kind: FailureKind,
        message: impl Into<String>,
        detail: Option<String>,
    ) -> StageFailure {
        StageFailure {
            stage,
            label: self.stages.label(stage).to_string(),
            kind,
            message: message.into(),
            detail,
        }
    }

    /// A panic in any stage is reported like an unexpected error of that stage
    fn panicked(&self, stage: Stage, payload: &(dyn Any + Send)) -> StageFailure {
        self.failure(
            stage,
            FailureKind::Unexpected,
            "unexpected error",
            Some(panic_message(payload)),
        )
    }

    fn report_outcome(&self, item: &str, outcome: &Outcome) {
        let id = format!("{}: {}", self.item_noun, display_item(item));
        match outcome {
            Outcome::Success { artifact } => {
                let path = artifact.display().to_string();
                self.reporter
                    .ok(&self.success_template.replace(PATH_PLACEHOLDER, &path));
            }
            Outcome::Skipped { reason } => {
                self.reporter.warn(&format!("{}, skipped ({})", reason, id));
            }
            Outcome::Failed(failure) => match failure.kind {
                FailureKind::Unexpected | FailureKind::TimedOut => {
                    self.reporter.error(&format!("{} ({})", failure.message, id));
                    self.reporter.detail("stage", &failure.label);
                    if let Some(detail) = &failure.detail {
                        self.reporter.detail("detail", detail);
                    }
                }
                FailureKind::Rejected | FailureKind::Recoverable | FailureKind::Postcondition => {
                    self.reporter.error(&format!("{} ({})", failure.message, id));
                    if let Some(detail) = &failure.detail {
                        tracing::debug!(item, stage = %failure.stage, detail, "failure detail");
                    }
                }
            },
        }
    }
}

fn display_item(item: &str) -> &str {
    if item.is_empty() {
        "<EMPTY>"
    } else {
        item
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "operation panicked".to_string()
    }
}
