use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::Command;

use super::{AcquisitionEngine, FetchOptions, MediaKind, MediaMetadata};
use crate::EngineError;

/// Longest stderr excerpt carried in an error
const MAX_STDERR_CHARS: usize = 1000;

/// Acquisition engine backed by the yt-dlp executable
pub struct YtDlpEngine {
    yt_dlp_path: String,
}

impl YtDlpEngine {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }

    /// Format selection and post-processing arguments for a media kind
    fn format_args(options: &FetchOptions) -> Vec<String> {
        let args: Vec<&str> = match options.kind {
            MediaKind::Audio => vec![
                "--format", "bestaudio/best",
                "--extract-audio",
                "--audio-format", "mp3",
                "--audio-quality", options.audio_quality.as_str(),
            ],
            MediaKind::Video => vec![
                "--format", "bestvideo+bestaudio/best",
                "--merge-output-format", "mp4",
                "--recode-video", "mp4",
            ],
        };
        args.into_iter().map(str::to_string).collect()
    }

    fn probe_args(identifier: &str, options: &FetchOptions) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--output".to_string(),
            options.output_template.clone(),
        ];
        args.extend(Self::format_args(options));
        args.push(identifier.to_string());
        args
    }

    fn fetch_args(identifier: &str, options: &FetchOptions) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--no-progress".to_string(),
            "--output".to_string(),
            options.output_template.clone(),
            // Final path after post-processing, one line per file
            "--print".to_string(),
            "after_move:filepath".to_string(),
        ];
        args.extend(Self::format_args(options));
        args.push(identifier.to_string());
        args
    }

    async fn execute(&self, args: &[String]) -> Result<Output, EngineError> {
        tracing::debug!(program = %self.yt_dlp_path, ?args, "running yt-dlp");

        let output = Command::new(&self.yt_dlp_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => EngineError::NotInstalled(self.yt_dlp_path.clone()),
                _ => EngineError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
            return Err(EngineError::Fetch(excerpt));
        }

        Ok(output)
    }
}

#[async_trait]
impl AcquisitionEngine for YtDlpEngine {
    async fn probe(
        &self,
        identifier: &str,
        options: &FetchOptions,
    ) -> Result<MediaMetadata, EngineError> {
        tracing::debug!("Extracting media info for: {}", identifier);

        let output = self.execute(&Self::probe_args(identifier, options)).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let first = stdout.lines().find(|line| !line.trim().is_empty()).unwrap_or("");

        Ok(serde_json::from_str(first)?)
    }

    async fn fetch(
        &self,
        identifier: &str,
        options: &FetchOptions,
    ) -> Result<PathBuf, EngineError> {
        tracing::debug!(kind = %options.kind, "Downloading media for: {}", identifier);

        let output = self.execute(&Self::fetch_args(identifier, options)).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(PathBuf::from)
            .ok_or_else(|| EngineError::Fetch("yt-dlp did not report an output file".to_string()))
    }

    fn engine_name(&self) -> &'static str {
        "yt-dlp"
    }
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}
