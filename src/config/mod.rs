use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::TranscriptFormat;
use crate::extractors::MediaKind;

/// File name looked up in the working directory before the user config dir
const LOCAL_CONFIG: &str = "mediabatch.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Media acquisition settings
    pub acquire: AcquireConfig,

    /// Transcription settings
    pub transcribe: TranscribeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    /// Identifier list, one URL per line
    pub source: PathBuf,

    /// Output directory for MP3 files
    pub audio_dir: PathBuf,

    /// Output directory for MP4 files
    pub video_dir: PathBuf,

    /// Skip live and upcoming streams
    pub skip_live: bool,

    /// yt-dlp executable
    pub yt_dlp_path: String,

    /// MP3 bitrate in kbps
    pub audio_quality: String,

    /// Per-item limit on the download stage, in seconds
    pub item_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeConfig {
    /// Directory of MP3 files to transcribe
    pub audio_dir: PathBuf,

    /// Output directory for transcripts
    pub transcripts_dir: PathBuf,

    /// Whisper model name (tiny, base, small, medium, large-v3, ...)
    pub model: String,

    /// Print segments while transcribing
    pub verbose: bool,

    /// Transcript file format
    pub format: TranscriptFormat,

    /// Where downloaded models are kept
    pub model_cache_dir: Option<PathBuf>,

    /// ffmpeg executable used to decode audio
    pub ffmpeg_path: String,

    /// Run inference on the GPU when one is available
    pub use_gpu: bool,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("source.csv"),
            audio_dir: PathBuf::from("audio"),
            video_dir: PathBuf::from("video"),
            skip_live: false,
            yt_dlp_path: "yt-dlp".to_string(),
            audio_quality: "192".to_string(),
            item_timeout_secs: None,
        }
    }
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::from("audio"),
            transcripts_dir: PathBuf::from("transcripts"),
            model: "small".to_string(),
            verbose: true,
            format: TranscriptFormat::Text,
            model_cache_dir: None,
            ffmpeg_path: "ffmpeg".to_string(),
            use_gpu: true,
        }
    }
}

/// Everything one acquisition run needs
#[derive(Debug, Clone, PartialEq)]
pub struct AcquireOptions {
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    pub kind: MediaKind,
    pub skip_live: bool,
    pub yt_dlp_path: String,
    pub audio_quality: String,
    pub item_timeout: Option<Duration>,
}

/// Everything one transcription run needs
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub model_name: String,
    pub verbose: bool,
    pub format: TranscriptFormat,
}

impl Config {
    /// Load configuration from an explicit file, the working directory,
    /// or the user config directory; defaults when none exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::discover(),
        };

        match path {
            Some(path) => Self::from_file(&path),
            None => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn discover() -> Option<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            return Some(local_config);
        }

        Self::user_config_path().filter(|path| path.exists())
    }

    /// Config file location in the user's config directory
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mediabatch").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.acquire.yt_dlp_path.trim().is_empty() {
            anyhow::bail!("acquire.yt_dlp_path must not be empty");
        }

        if self.acquire.audio_quality.trim().is_empty() {
            anyhow::bail!("acquire.audio_quality must not be empty");
        }

        if self.acquire.item_timeout_secs == Some(0) {
            anyhow::bail!("acquire.item_timeout_secs must be greater than zero");
        }

        if self.transcribe.model.trim().is_empty() {
            anyhow::bail!("transcribe.model must be configured");
        }

        Ok(())
    }

    /// Resolve the model cache directory
    pub fn model_cache_dir(&self) -> PathBuf {
        self.transcribe.model_cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("mediabatch")
                .join("models")
        })
    }

    /// Options for an acquisition run; `None` arguments fall back to the config
    pub fn acquire_options(
        &self,
        kind: MediaKind,
        source: Option<PathBuf>,
        output: Option<PathBuf>,
        skip_live: Option<bool>,
    ) -> AcquireOptions {
        let default_dir = match kind {
            MediaKind::Audio => &self.acquire.audio_dir,
            MediaKind::Video => &self.acquire.video_dir,
        };

        AcquireOptions {
            source_path: source.unwrap_or_else(|| self.acquire.source.clone()),
            output_dir: output.unwrap_or_else(|| default_dir.clone()),
            kind,
            skip_live: skip_live.unwrap_or(self.acquire.skip_live),
            yt_dlp_path: self.acquire.yt_dlp_path.clone(),
            audio_quality: self.acquire.audio_quality.clone(),
            item_timeout: self.acquire.item_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Options for a transcription run; `None` arguments fall back to the config
    pub fn transcribe_options(
        &self,
        audio_dir: Option<PathBuf>,
        transcripts_dir: Option<PathBuf>,
        model: Option<String>,
        quiet_inference: bool,
        format: Option<TranscriptFormat>,
    ) -> TranscribeOptions {
        TranscribeOptions {
            input_dir: audio_dir.unwrap_or_else(|| self.transcribe.audio_dir.clone()),
            output_dir: transcripts_dir.unwrap_or_else(|| self.transcribe.transcripts_dir.clone()),
            model_name: model.unwrap_or_else(|| self.transcribe.model.clone()),
            verbose: self.transcribe.verbose && !quiet_inference,
            format: format.unwrap_or(self.transcribe.format),
        }
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Source list: {}", self.acquire.source.display());
        println!("  Audio dir: {}", self.acquire.audio_dir.display());
        println!("  Video dir: {}", self.acquire.video_dir.display());
        println!("  Skip live: {}", self.acquire.skip_live);
        println!("  yt-dlp: {}", self.acquire.yt_dlp_path);
        println!("  Audio quality: {} kbps", self.acquire.audio_quality);
        if let Some(timeout) = self.acquire.item_timeout_secs {
            println!("  Item timeout: {}s", timeout);
        }
        println!("  Transcribe input: {}", self.transcribe.audio_dir.display());
        println!("  Transcripts dir: {}", self.transcribe.transcripts_dir.display());
        println!("  Whisper model: {}", self.transcribe.model);
        println!("  Transcript format: {}", self.transcribe.format);
        println!("  Model cache: {}", self.model_cache_dir().display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "acquire:\n  skip_live: true\ntranscribe:\n  model: tiny\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(config.acquire.skip_live);
        assert_eq!(config.acquire.audio_dir, PathBuf::from("audio"));
        assert_eq!(config.transcribe.model, "tiny");
        assert_eq!(config.transcribe.format, TranscriptFormat::Text);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = Config::default();
        config.acquire.item_timeout_secs = Some(600);
        config.transcribe.format = TranscriptFormat::Json;

        config.save(&path).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "acquire:\n  item_timeout_secs: 0\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());

        std::fs::write(&path, "transcribe:\n  model: \"\"\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.yaml"))).is_err());
    }

    #[test]
    fn test_cli_values_override_config() {
        let mut config = Config::default();
        config.acquire.skip_live = false;

        let options = config.acquire_options(MediaKind::Video, None, Some(PathBuf::from("clips")), Some(true));
        assert_eq!(options.source_path, PathBuf::from("source.csv"));
        assert_eq!(options.output_dir, PathBuf::from("clips"));
        assert!(options.skip_live);

        let audio = config.acquire_options(MediaKind::Audio, None, None, None);
        assert_eq!(audio.output_dir, PathBuf::from("audio"));
        assert!(!audio.skip_live);

        config.acquire.skip_live = true;
        assert!(config.acquire_options(MediaKind::Audio, None, None, None).skip_live);
        assert!(!config.acquire_options(MediaKind::Audio, None, None, Some(false)).skip_live);

        let transcribe = config.transcribe_options(None, None, Some("base".to_string()), true, None);
        assert_eq!(transcribe.model_name, "base");
        assert!(!transcribe.verbose);
        assert_eq!(transcribe.output_dir, PathBuf::from("transcripts"));
    }
}
