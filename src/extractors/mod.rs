use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub mod live;
pub mod ytdlp;

pub use live::is_live_content;
pub use ytdlp::YtDlpEngine;

use crate::EngineError;

/// What the acquisition engine should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio only, extracted to MP3
    Audio,
    /// Best video and audio, merged into MP4
    Video,
}

impl MediaKind {
    /// Container extension of the final artifact
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Audio => "mp3",
            MediaKind::Video => "mp4",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Options shared by the probe and the real fetch of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub kind: MediaKind,

    /// yt-dlp output template, e.g. `audio/%(title)s.%(ext)s`
    pub output_template: String,

    /// Audio bitrate passed to the extractor, in kbps
    pub audio_quality: String,
}

impl FetchOptions {
    /// Options that name files after the media title inside `output_dir`
    pub fn new(kind: MediaKind, output_dir: &Path, audio_quality: impl Into<String>) -> Self {
        Self {
            kind,
            output_template: output_dir.join("%(title)s.%(ext)s").to_string_lossy().into_owned(),
            audio_quality: audio_quality.into(),
        }
    }
}

/// Metadata returned by a probe. Only the fields the pipeline reads are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub webpage_url: Option<String>,

    /// `not_live`, `is_live`, `is_upcoming`, `was_live`, `post_live`
    #[serde(default)]
    pub live_status: Option<String>,

    #[serde(default)]
    pub is_live: Option<bool>,

    #[serde(default)]
    pub is_upcoming: Option<bool>,

    #[serde(default)]
    pub duration: Option<f64>,

    /// File name the engine would write for the output template
    #[serde(default, rename = "_filename")]
    pub planned_filename: Option<String>,

    #[serde(default)]
    pub filename: Option<String>,
}

/// External engine that probes and downloads media
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AcquisitionEngine: Send + Sync {
    /// Query metadata only; must not download anything
    async fn probe(
        &self,
        identifier: &str,
        options: &FetchOptions,
    ) -> Result<MediaMetadata, EngineError>;

    /// Download and convert, returning the final file path
    async fn fetch(&self, identifier: &str, options: &FetchOptions)
        -> Result<PathBuf, EngineError>;

    /// Get the name of this engine
    fn engine_name(&self) -> &'static str;
}

fn youtube_live_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^(?P<scheme>https?://)?(?P<sub>www\.)?youtube\.com/live/(?P<video_id>[a-zA-Z0-9_-]{11})",
            )
            .ok()
        })
        .as_ref()
}

/// Rewrite YouTube `/live/<id>` links to the regular watch URL.
///
/// Pure and total: anything that does not match is returned unchanged.
pub fn normalize_identifier(identifier: &str) -> String {
    let captures = youtube_live_pattern().and_then(|pattern| pattern.captures(identifier.trim()));
    match captures.and_then(|c| c.name("video_id")) {
        Some(video_id) => format!("https://www.youtube.com/watch?v={}", video_id.as_str()),
        None => identifier.to_string(),
    }
}
