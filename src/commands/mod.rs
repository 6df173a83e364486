//! Subcommand handlers.
//!
//! Setup failures come back as errors so `main` can report them once and exit
//! non-zero. Per-item failures never do: they live in the returned report.

use anyhow::{Context, Result};
use std::path::Path;

use crate::batch::{BatchReport, BatchRunner, StageSet};
use crate::cli::Commands;
use crate::config::{AcquireOptions, Config, TranscribeOptions};
use crate::extractors::{AcquisitionEngine, MediaKind, YtDlpEngine};
use crate::report::Reporter;
use crate::resolver::ArtifactResolver;
use crate::sources::validate_source;
use crate::transcribe::{available_engine, model, TranscriptionPipeline, TranscriptionSummary};
use crate::utils::{ensure_directory, format_file_size};
use crate::SetupError;

/// Stage labels and success message for an acquisition run
fn acquisition_runner(kind: MediaKind) -> BatchRunner {
    match kind {
        MediaKind::Audio => BatchRunner::new(
            StageSet::new("check input", "convert to mp3", "check output"),
            "converted: {path}",
        ),
        MediaKind::Video => BatchRunner::new(
            StageSet::new("check input", "download video", "check output"),
            "download complete: {path}",
        ),
    }
}

/// Validate the source list and output directory, then walk every identifier
/// through the resolver.
pub async fn run_acquisition<E: AcquisitionEngine>(
    engine: E,
    options: &AcquireOptions,
    reporter: Reporter,
) -> Result<BatchReport, SetupError> {
    let items = validate_source(&options.source_path)?;
    ensure_directory(&options.output_dir)?;

    tracing::info!(
        engine = engine.engine_name(),
        items = items.len(),
        output = %options.output_dir.display(),
        "starting acquisition"
    );
    reporter.info(&format!(
        "{} identifiers from {}",
        items.len(),
        options.source_path.display()
    ));

    let resolver = ArtifactResolver::new(engine, &options.output_dir, options.kind)
        .with_skip_live(options.skip_live)
        .with_audio_quality(options.audio_quality.clone())
        .with_reporter(reporter);

    let runner = acquisition_runner(options.kind)
        .with_item_timeout(options.item_timeout)
        .with_reporter(reporter);

    Ok(runner.run(&items, &resolver).await)
}

/// External tools a command shells out to, with what they are used for
pub fn required_tools<'a>(command: &Commands, config: &'a Config) -> Vec<(&'a str, &'static str)> {
    match command {
        Commands::Audio { .. } | Commands::Video { .. } => vec![
            (config.acquire.yt_dlp_path.as_str(), "media download"),
            ("ffmpeg", "audio/video conversion"),
        ],
        // Only the whisper engine decodes through ffmpeg
        Commands::Transcribe { .. } if cfg!(feature = "whisper") => {
            vec![(config.transcribe.ffmpeg_path.as_str(), "audio decoding")]
        }
        Commands::Transcribe { .. } | Commands::FetchModel { .. } | Commands::Config { .. } => {
            Vec::new()
        }
    }
}

/// `audio` / `video`
pub async fn acquire(options: &AcquireOptions, reporter: Reporter, report_path: Option<&Path>) -> Result<()> {
    reporter.banner(&format!("{} download start", options.kind));

    let engine = YtDlpEngine::new(options.yt_dlp_path.clone());
    let report = run_acquisition(engine, options, reporter).await?;

    write_report(&report, report_path)
}

/// `transcribe`
pub async fn transcribe(
    config: &Config,
    options: &TranscribeOptions,
    reporter: Reporter,
    report_path: Option<&Path>,
) -> Result<()> {
    let engine = available_engine(config)?;
    let pipeline = TranscriptionPipeline::new(engine, reporter);

    match pipeline.run(options).await? {
        TranscriptionSummary::NothingToDo => Ok(()),
        TranscriptionSummary::Completed(report) => write_report(&report, report_path),
    }
}

/// `fetch-model`
pub async fn fetch_model(config: &Config, name: &str, cache_dir: Option<&Path>, reporter: Reporter) -> Result<()> {
    let cache_dir = cache_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.model_cache_dir());

    if let Some(size) = model::approximate_size(name) {
        reporter.info(&format!("model {} is about {}", name, size));
    }

    let path = model::ensure_model(name, &cache_dir)
        .await
        .with_context(|| format!("Failed to fetch model '{}'", name))?;

    let size = fs_err::metadata(&path).map(|m| m.len()).unwrap_or(0);
    reporter.ok(&format!("model ready: {} ({})", path.display(), format_file_size(size)));
    Ok(())
}

/// `config`
pub fn config(config: &Config, init: bool, reporter: Reporter) -> Result<()> {
    if !init {
        config.display();

        let cached = model::list_cached_models(&config.model_cache_dir());
        if !cached.is_empty() {
            println!("Cached models:");
            for path in cached {
                println!("  {}", path.display());
            }
        }
        return Ok(());
    }

    let path = Config::user_config_path().context("Could not determine the user config directory")?;
    if path.exists() {
        anyhow::bail!("Config file already exists: {}", path.display());
    }

    Config::default().save(&path)?;
    reporter.ok(&format!("wrote default configuration to {}", path.display()));
    Ok(())
}

fn write_report(report: &BatchReport, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        report.write_json(path)?;
        tracing::info!(path = %path.display(), "wrote batch report");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{Outcome, SkipReason, Stage};
    use crate::extractors::{MediaMetadata, MockAcquisitionEngine};
    use crate::EngineError;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn options(dir: &Path, source: &str) -> AcquireOptions {
        let source_path = dir.join("source.csv");
        std::fs::write(&source_path, source).unwrap();
        AcquireOptions {
            source_path,
            output_dir: dir.join("audio"),
            kind: MediaKind::Audio,
            skip_live: true,
            yt_dlp_path: "yt-dlp".to_string(),
            audio_quality: "192".to_string(),
            item_timeout: None,
        }
    }

    #[tokio::test]
    async fn test_missing_source_is_setup_error() {
        let dir = TempDir::new().unwrap();
        let mut options = options(dir.path(), "");
        options.source_path = dir.path().join("missing.csv");

        let mut engine = MockAcquisitionEngine::new();
        engine.expect_probe().never();
        engine.expect_fetch().never();

        let result = run_acquisition(engine, &options, Reporter::new(true)).await;
        assert!(matches!(result, Err(SetupError::SourceNotFound(_))));
        assert!(!options.output_dir.exists());
    }

    #[tokio::test]
    async fn test_blank_source_is_setup_error() {
        let dir = TempDir::new().unwrap();
        let options = options(dir.path(), "\n   \n\n");

        let mut engine = MockAcquisitionEngine::new();
        engine.expect_probe().never();

        let result = run_acquisition(engine, &options, Reporter::new(true)).await;
        assert!(matches!(result, Err(SetupError::EmptySource(_))));
    }

    #[tokio::test]
    async fn test_acquisition_reports_every_item() {
        let dir = TempDir::new().unwrap();
        let options = options(dir.path(), "https://example.com/ok\nhttps://example.com/live\nhttps://example.com/gone\n");
        let output_dir = options.output_dir.clone();

        let mut engine = MockAcquisitionEngine::new();
        engine.expect_engine_name().return_const("mock");
        engine.expect_probe().returning(|identifier, _| {
            let mut metadata = MediaMetadata {
                id: identifier.rsplit('/').next().map(str::to_string),
                title: identifier.rsplit('/').next().map(str::to_string),
                ..Default::default()
            };
            if identifier.ends_with("live") {
                metadata.live_status = Some("is_live".to_string());
            }
            Ok(metadata)
        });
        let fetch_dir = output_dir.clone();
        engine.expect_fetch().times(2).returning(move |identifier, _| {
            if identifier.ends_with("gone") {
                return Err(EngineError::Fetch("HTTP Error 404: Not Found".to_string()));
            }
            let path = fetch_dir.join("ok.mp3");
            std::fs::write(&path, b"audio").unwrap();
            Ok(path)
        });

        let report = run_acquisition(engine, &options, Reporter::new(true)).await.unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(
            report.outcomes[0].outcome,
            Outcome::Success {
                artifact: output_dir.join("ok.mp3")
            }
        );
        assert_eq!(
            report.outcomes[1].outcome,
            Outcome::Skipped {
                reason: SkipReason::LiveContent
            }
        );
        assert_eq!(report.outcomes[2].outcome.failed_stage(), Some(Stage::Operation));
    }

    fn transcribe_command() -> Commands {
        Commands::Transcribe {
            audio_dir: None,
            transcripts_dir: None,
            model: None,
            quiet_inference: false,
            format: None,
        }
    }

    #[test]
    fn test_required_tools_for_acquisition() {
        let mut config = Config::default();
        config.acquire.yt_dlp_path = "/opt/bin/yt-dlp".to_string();
        let command = Commands::Video {
            source: None,
            output: None,
            skip_live: false,
            no_skip_live: false,
        };

        let tools = required_tools(&command, &config);
        let names: Vec<&str> = tools.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["/opt/bin/yt-dlp", "ffmpeg"]);

        let config_command = Commands::Config { show: true, init: false };
        assert!(required_tools(&config_command, &config).is_empty());
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_transcribe_needs_no_tools_without_engine() {
        assert!(required_tools(&transcribe_command(), &Config::default()).is_empty());
    }

    #[cfg(feature = "whisper")]
    #[test]
    fn test_transcribe_needs_ffmpeg_with_engine() {
        let tools = required_tools(&transcribe_command(), &Config::default());
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].0, "ffmpeg");
    }

    #[test]
    fn test_write_report_only_when_requested() {
        let dir = TempDir::new().unwrap();
        let report = BatchReport {
            run_id: uuid::Uuid::new_v4(),
            started_at: chrono::Utc::now(),
            finished_at: chrono::Utc::now(),
            outcomes: Vec::new(),
        };

        write_report(&report, None).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let path: PathBuf = dir.path().join("report.json");
        write_report(&report, Some(&path)).unwrap();
        assert!(path.exists());
    }
}
