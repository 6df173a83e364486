//! mediabatch - batch media acquisition and transcription
//!
//! This library walks lists of media URLs through a staged pipeline (validate,
//! download/convert with yt-dlp, verify output) and transcribes directories of
//! audio files with a single shared Whisper model. Every item gets its own
//! outcome; one bad item never aborts the batch.

use std::path::PathBuf;

pub mod batch;
pub mod cli;
pub mod commands;
pub mod config;
pub mod extractors;
pub mod output;
pub mod report;
pub mod resolver;
pub mod sources;
pub mod transcribe;
pub mod utils;

pub use batch::{BatchReport, BatchRunner, ItemOperation, Outcome, Stage, StageSet};
pub use cli::{Cli, Commands, TranscriptFormat};
pub use config::Config;
pub use extractors::{AcquisitionEngine, MediaKind, MediaMetadata};
pub use resolver::ArtifactResolver;
pub use transcribe::{TranscriptionPipeline, TranscriptionSummary};

/// Errors that stop a whole run before any item is processed
#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("no identifiers to process in {}", .0.display())]
    EmptySource(PathBuf),

    #[error("input directory {} not found", .0.display())]
    InputDirNotFound(PathBuf),

    #[error("directory is not writable: {}", .0.display())]
    NotWritable(PathBuf),

    #[error("speech engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("failed to load model '{model}': {source}")]
    ModelLoad {
        model: String,
        #[source]
        source: EngineError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the external acquisition and inference engines
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The engine ran but could not retrieve the media
    #[error("download failed: {0}")]
    Fetch(String),

    #[error("{0} is not installed or not on PATH")]
    NotInstalled(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("model download failed: {0}")]
    ModelDownload(String),

    #[error("audio decoding failed: {0}")]
    Decode(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid engine output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
