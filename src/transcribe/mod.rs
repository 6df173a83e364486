//! Directory transcription with one shared model.
//!
//! The model is loaded once before the first file and only invoked afterwards.
//! Each file goes through the same three stages as an acquisition batch:
//! input check, inference, transcript write.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::batch::{BatchReport, BatchRunner, ItemOperation, OperationError, OperationOutput, Rejection, StageSet};
use crate::cli::TranscriptFormat;
use crate::config::TranscribeOptions;
use crate::output::{self, Transcript};
use crate::report::Reporter;
use crate::utils::{check_file_accessible, ensure_directory};
use crate::SetupError;

pub mod engine;
pub mod model;
#[cfg(feature = "whisper")]
pub mod whisper;

pub use engine::{available_engine, LoadedModel, SpeechEngine};

/// Extension of the files picked up from the input directory
pub const INPUT_EXTENSION: &str = "mp3";

/// How a transcription run ended
#[derive(Debug)]
pub enum TranscriptionSummary {
    /// The input directory had no eligible files; no model was loaded
    NothingToDo,
    Completed(BatchReport),
}

/// Eligible input files, sorted by path
pub fn list_audio_files(directory: &Path) -> Result<Vec<PathBuf>, SetupError> {
    if !directory.is_dir() {
        return Err(SetupError::InputDirNotFound(directory.to_path_buf()));
    }

    let entries = fs_err::read_dir(directory).map_err(|source| SetupError::Io {
        path: directory.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(INPUT_EXTENSION))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Main transcription pipeline
pub struct TranscriptionPipeline {
    engine: Box<dyn SpeechEngine>,
    reporter: Reporter,
}

impl TranscriptionPipeline {
    pub fn new(engine: Box<dyn SpeechEngine>, reporter: Reporter) -> Self {
        Self { engine, reporter }
    }

    /// Transcribe every eligible file in `options.input_dir`
    pub async fn run(&self, options: &TranscribeOptions) -> Result<TranscriptionSummary, SetupError> {
        self.reporter.banner("Transcription start");

        let files = list_audio_files(&options.input_dir)?;
        if files.is_empty() {
            self.reporter.warn(&format!(
                "no {} files in {}, nothing to do",
                INPUT_EXTENSION,
                options.input_dir.display()
            ));
            return Ok(TranscriptionSummary::NothingToDo);
        }

        ensure_directory(&options.output_dir)?;

        self.reporter.info(&format!(
            "loading {} model ({})...",
            self.engine.engine_name(),
            options.model_name
        ));
        let model = self
            .engine
            .load_model(&options.model_name)
            .await
            .map_err(|source| SetupError::ModelLoad {
                model: options.model_name.clone(),
                source,
            })?;
        tracing::info!(model = model.name(), files = files.len(), "model loaded");

        let operation = TranscribeFile {
            model: model.as_ref(),
            output_dir: &options.output_dir,
            verbose: options.verbose,
            format: options.format,
        };
        let runner = BatchRunner::new(
            StageSet::new("check input file", "transcribe audio", "save transcript"),
            "transcription complete: {path}",
        )
        .with_item_noun("file")
        .with_reporter(self.reporter);

        let items: Vec<String> = files
            .iter()
            .map(|path| path.to_string_lossy().into_owned())
            .collect();
        let report = runner.run(&items, &operation).await;

        Ok(TranscriptionSummary::Completed(report))
    }
}

/// Per-file operation sharing one loaded model
struct TranscribeFile<'a> {
    model: &'a dyn LoadedModel,
    output_dir: &'a Path,
    verbose: bool,
    format: TranscriptFormat,
}

#[async_trait]
impl ItemOperation for TranscribeFile<'_> {
    type Output = Transcript;

    async fn check(&self, item: &str) -> Result<(), Rejection> {
        check_file_accessible(Path::new(item))
            .map_err(|e| Rejection::new("input file not found").with_detail(e.to_string()))
    }

    async fn run(&self, item: &str) -> Result<OperationOutput<Transcript>, OperationError> {
        let source = PathBuf::from(item);
        let text = self
            .model
            .transcribe(&source, self.verbose)
            .await
            .map_err(|e| OperationError::Recoverable {
                reason: "transcription failed".to_string(),
                detail: e.to_string(),
            })?;

        Ok(OperationOutput::Produced(Transcript {
            source,
            model: self.model.name().to_string(),
            text: text.trim().to_string(),
            completed_at: chrono::Utc::now(),
        }))
    }

    async fn verify(&self, _item: &str, transcript: Transcript) -> Result<PathBuf, Rejection> {
        let path = output::transcript_path(&transcript.source, self.output_dir, self.format);
        output::save_to_file(&transcript, &path, self.format).map_err(|e| {
            Rejection::new("failed to save transcript").with_detail(format!("{:#}", e))
        })?;
        Ok(path)
    }
}
