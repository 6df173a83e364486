use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cli::TranscriptFormat;

/// One finished transcription
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub source: PathBuf,
    pub model: String,
    pub text: String,
    pub completed_at: DateTime<Utc>,
}

/// `<output_dir>/<input stem>.<ext>`
pub fn transcript_path(input: &Path, output_dir: &Path, format: TranscriptFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transcript".to_string());
    output_dir.join(format!("{}.{}", stem, format.extension()))
}

pub fn render(transcript: &Transcript, format: TranscriptFormat) -> Result<String> {
    match format {
        TranscriptFormat::Text => Ok(transcript.text.clone()),
        TranscriptFormat::Json => {
            serde_json::to_string_pretty(transcript).context("Failed to serialize transcript")
        }
    }
}

/// Save a transcript; the file is written in full or not replaced at all
pub fn save_to_file(transcript: &Transcript, path: &Path, format: TranscriptFormat) -> Result<()> {
    let content = render(transcript, format)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut staged = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    staged.write_all(content.as_bytes())?;
    staged
        .persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}
