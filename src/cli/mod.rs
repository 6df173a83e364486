use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mediabatch",
    about = "Batch-download audio/video with yt-dlp and transcribe it with Whisper",
    version,
    long_about = "Processes a list of media URLs one at a time: each URL is checked, downloaded and converted with yt-dlp, and its output verified. Failures and skipped live streams are reported per item without stopping the batch. A separate command transcribes a directory of MP3 files with a single Whisper model."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Hide stage lines and progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to ./mediabatch.yaml, then the user config dir)
    #[arg(long, global = true, value_name = "FILE", env = "MEDIABATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write per-item outcomes as JSON
    #[arg(long, global = true, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download every URL in the source list as MP3
    #[command(alias = "acquire-audio")]
    Audio {
        /// Source list, one URL per line
        #[arg(long, value_name = "FILE")]
        source: Option<PathBuf>,

        /// MP3 output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Detect live streams before downloading and skip them
        #[arg(long, overrides_with = "no_skip_live")]
        skip_live: bool,

        /// Download live streams even when the config enables skipping
        #[arg(long, overrides_with = "skip_live")]
        no_skip_live: bool,
    },

    /// Download every URL in the source list as MP4
    #[command(alias = "acquire-video")]
    Video {
        /// Source list, one URL per line
        #[arg(long, value_name = "FILE")]
        source: Option<PathBuf>,

        /// MP4 output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Detect live streams before downloading and skip them
        #[arg(long, overrides_with = "no_skip_live")]
        skip_live: bool,

        /// Download live streams even when the config enables skipping
        #[arg(long, overrides_with = "skip_live")]
        no_skip_live: bool,
    },

    /// Transcribe every MP3 file in a directory
    Transcribe {
        /// Directory of MP3 files
        #[arg(long, value_name = "DIR")]
        audio_dir: Option<PathBuf>,

        /// Transcript output directory
        #[arg(long, value_name = "DIR")]
        transcripts_dir: Option<PathBuf>,

        /// Whisper model name
        #[arg(short, long, value_name = "NAME")]
        model: Option<String>,

        /// Do not print segments while transcribing
        #[arg(long)]
        quiet_inference: bool,

        /// Transcript format
        #[arg(short, long, value_enum)]
        format: Option<TranscriptFormat>,
    },

    /// Download a Whisper model into the local cache
    FetchModel {
        /// Model name (tiny, base, small, medium, large-v3, ...)
        #[arg(value_name = "NAME")]
        model: String,

        /// Cache directory (defaults to the configured model cache)
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<PathBuf>,
    },

    /// Show or initialise configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration to the user config directory
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptFormat {
    /// Plain text
    #[default]
    Text,
    /// JSON with source and model metadata
    Json,
}

/// `--skip-live` / `--no-skip-live`; `None` keeps the configured value
pub fn skip_live_override(skip_live: bool, no_skip_live: bool) -> Option<bool> {
    match (skip_live, no_skip_live) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl TranscriptFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TranscriptFormat::Text => "txt",
            TranscriptFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for TranscriptFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptFormat::Text => write!(f, "text"),
            TranscriptFormat::Json => write!(f, "json"),
        }
    }
}
