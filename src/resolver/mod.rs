//! Idempotent acquisition of one identifier.
//!
//! The resolver probes the identifier, applies the live-content guard, works
//! out where the finished artifact would live, and only asks the engine to
//! download when nothing is there yet.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::batch::{
    require_existing, ItemOperation, OperationError, OperationOutput, Rejection, SkipReason,
};
use crate::extractors::{
    is_live_content, normalize_identifier, AcquisitionEngine, FetchOptions, MediaKind,
    MediaMetadata,
};
use crate::report::Reporter;
use crate::utils::{extract_domain, sanitize_filename};
use crate::EngineError;

pub const DEFAULT_AUDIO_QUALITY: &str = "192";

pub struct ArtifactResolver<E> {
    engine: E,
    output_dir: PathBuf,
    kind: MediaKind,
    skip_live: bool,
    audio_quality: String,
    reporter: Reporter,
}

impl<E: AcquisitionEngine> ArtifactResolver<E> {
    pub fn new(engine: E, output_dir: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            engine,
            output_dir: output_dir.into(),
            kind,
            skip_live: false,
            audio_quality: DEFAULT_AUDIO_QUALITY.to_string(),
            reporter: Reporter::default(),
        }
    }

    /// Skip items whose probe reports a live or upcoming stream
    pub fn with_skip_live(mut self, skip_live: bool) -> Self {
        self.skip_live = skip_live;
        self
    }

    pub fn with_audio_quality(mut self, quality: impl Into<String>) -> Self {
        self.audio_quality = quality.into();
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions::new(self.kind, &self.output_dir, self.audio_quality.clone())
    }

    /// Where the finished artifact for this metadata lives.
    ///
    /// Uses the engine's own file name for the output template when the probe
    /// reports one, otherwise the sanitized title (or id) in the output directory.
    pub fn expected_path(&self, metadata: &MediaMetadata) -> Option<PathBuf> {
        let extension = self.kind.extension();

        if let Some(planned) = metadata
            .planned_filename
            .as_deref()
            .or(metadata.filename.as_deref())
            .filter(|name| !name.trim().is_empty())
        {
            return Some(PathBuf::from(planned).with_extension(extension));
        }

        metadata
            .title
            .as_deref()
            .or(metadata.id.as_deref())
            .map(sanitize_filename)
            .filter(|name| !name.is_empty())
            .map(|name| self.output_dir.join(format!("{}.{}", name, extension)))
    }

    /// Probe, guard, reuse or fetch
    pub async fn resolve(
        &self,
        identifier: &str,
    ) -> Result<OperationOutput<PathBuf>, OperationError> {
        let normalized = normalize_identifier(identifier);
        if normalized != identifier {
            tracing::debug!(identifier, %normalized, "normalized identifier");
        }

        let options = self.fetch_options();
        let metadata = self
            .engine
            .probe(&normalized, &options)
            .await
            .map_err(|e| self.classify(e, "probe"))?;
        tracing::debug!(
            title = ?metadata.title,
            url = ?metadata.webpage_url,
            duration = ?metadata.duration,
            "probed"
        );

        if self.skip_live && is_live_content(&metadata) {
            tracing::info!(identifier, live_status = ?metadata.live_status, "live content, skipping");
            return Ok(OperationOutput::Skip(SkipReason::LiveContent));
        }

        if let Some(expected) = self.expected_path(&metadata) {
            if expected.exists() {
                tracing::info!(path = %expected.display(), "reusing existing artifact");
                self.reporter
                    .info(&format!("reusing existing file: {}", expected.display()));
                return Ok(OperationOutput::Produced(expected));
            }
        }

        let source = extract_domain(&normalized).unwrap_or_else(|| normalized.clone());
        let progress = self.reporter.spinner(format!(
            "Downloading {} from {} with {}...",
            self.kind,
            source,
            self.engine.engine_name()
        ));
        let fetched = self.engine.fetch(&normalized, &options).await;
        progress.finish_and_clear();

        let downloaded = fetched.map_err(|e| self.classify(e, "fetch"))?;
        Ok(OperationOutput::Produced(
            downloaded.with_extension(self.kind.extension()),
        ))
    }

    /// Download failures are an expected class; anything else is unexpected
    fn classify(&self, error: EngineError, step: &str) -> OperationError {
        match error {
            EngineError::Fetch(detail) => OperationError::fetch(detail),
            other => OperationError::Unexpected(
                anyhow::Error::new(other)
                    .context(format!("{} {} failed", self.engine.engine_name(), step)),
            ),
        }
    }
}

#[async_trait]
impl<E: AcquisitionEngine> ItemOperation for ArtifactResolver<E> {
    type Output = PathBuf;

    async fn run(&self, item: &str) -> Result<OperationOutput<PathBuf>, OperationError> {
        self.resolve(item).await
    }

    async fn verify(&self, _item: &str, output: PathBuf) -> Result<PathBuf, Rejection> {
        require_existing(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchRunner, FailureKind, Outcome, Stage, StageSet};
    use crate::extractors::MockAcquisitionEngine;
    use mockall::predicate::always;
    use std::path::Path;
    use tempfile::TempDir;

    fn recorded(dir: &Path, title: &str) -> MediaMetadata {
        MediaMetadata {
            id: Some("abcdefghijk".to_string()),
            title: Some(title.to_string()),
            live_status: Some("not_live".to_string()),
            planned_filename: Some(dir.join(format!("{}.webm", title)).display().to_string()),
            ..Default::default()
        }
    }

    fn live() -> MediaMetadata {
        MediaMetadata {
            title: Some("Live now".to_string()),
            live_status: Some("is_live".to_string()),
            ..Default::default()
        }
    }

    fn engine() -> MockAcquisitionEngine {
        let mut engine = MockAcquisitionEngine::new();
        engine.expect_engine_name().return_const("yt-dlp");
        engine
    }

    fn resolver(engine: MockAcquisitionEngine, dir: &Path) -> ArtifactResolver<MockAcquisitionEngine> {
        ArtifactResolver::new(engine, dir, MediaKind::Audio).with_reporter(Reporter::new(true))
    }

    #[tokio::test]
    async fn test_second_resolve_reuses_artifact() {
        let dir = TempDir::new().unwrap();
        let metadata = recorded(dir.path(), "Song");
        let target = dir.path().join("Song.mp3");

        let mut engine = engine();
        engine
            .expect_probe()
            .times(2)
            .returning(move |_, _| Ok(metadata.clone()));
        let written = target.clone();
        engine.expect_fetch().times(1).returning(move |_, _| {
            std::fs::write(&written, b"mp3").unwrap();
            Ok(written.clone())
        });

        let resolver = resolver(engine, dir.path());
        let first = resolver.resolve("https://example.com/a").await.unwrap();
        let second = resolver.resolve("https://example.com/a").await.unwrap();

        assert_eq!(first, OperationOutput::Produced(target.clone()));
        assert_eq!(second, OperationOutput::Produced(target));
    }

    #[tokio::test]
    async fn test_live_content_skipped_without_fetch() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine();
        engine.expect_probe().returning(|_, _| Ok(live()));
        engine.expect_fetch().never();

        let resolver = resolver(engine, dir.path()).with_skip_live(true);
        let result = resolver.resolve("https://example.com/live").await.unwrap();

        assert_eq!(result, OperationOutput::Skip(SkipReason::LiveContent));
    }

    #[tokio::test]
    async fn test_live_content_fetched_when_guard_disabled() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("Live now.mp3");
        let mut engine = engine();
        engine.expect_probe().returning(|_, _| Ok(live()));
        let returned = dir.path().join("Live now.webm");
        engine
            .expect_fetch()
            .times(1)
            .returning(move |_, _| Ok(returned.clone()));

        let resolver = resolver(engine, dir.path());
        let result = resolver.resolve("https://example.com/live").await.unwrap();

        assert_eq!(result, OperationOutput::Produced(target));
    }

    #[tokio::test]
    async fn test_probe_receives_normalized_identifier() {
        let dir = TempDir::new().unwrap();
        let metadata = recorded(dir.path(), "Stream");
        std::fs::write(dir.path().join("Stream.mp3"), b"mp3").unwrap();

        let mut engine = engine();
        engine
            .expect_probe()
            .withf(|identifier, _| identifier == "https://www.youtube.com/watch?v=abcdefghijk")
            .times(1)
            .returning(move |_, _| Ok(metadata.clone()));
        engine.expect_fetch().never();

        let resolver = resolver(engine, dir.path());
        let result = resolver
            .resolve("https://www.youtube.com/live/abcdefghijk")
            .await
            .unwrap();
        assert!(matches!(result, OperationOutput::Produced(_)));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_recoverable() {
        let dir = TempDir::new().unwrap();
        let metadata = recorded(dir.path(), "Gone");
        let mut engine = engine();
        engine.expect_probe().returning(move |_, _| Ok(metadata.clone()));
        engine
            .expect_fetch()
            .with(always(), always())
            .returning(|_, _| Err(EngineError::Fetch("HTTP Error 403: Forbidden".to_string())));

        let resolver = resolver(engine, dir.path());
        let error = resolver.resolve("https://example.com/a").await.unwrap_err();

        match error {
            OperationError::Recoverable { reason, detail } => {
                assert_eq!(reason, "download failed");
                assert!(detail.contains("403"));
            }
            other => panic!("expected recoverable error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_engine_is_unexpected() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine();
        engine
            .expect_probe()
            .returning(|_, _| Err(EngineError::NotInstalled("yt-dlp".to_string())));

        let resolver = resolver(engine, dir.path());
        let error = resolver.resolve("https://example.com/a").await.unwrap_err();

        assert!(matches!(error, OperationError::Unexpected(_)));
        assert!(format!("{:#}", anyhow::Error::from(error)).contains("yt-dlp probe failed"));
    }

    #[test]
    fn test_expected_path_falls_back_to_title() {
        let dir = TempDir::new().unwrap();
        let resolver = ArtifactResolver::new(engine(), dir.path(), MediaKind::Video);
        let metadata = MediaMetadata {
            title: Some("Intro v1.2: basics?".to_string()),
            ..Default::default()
        };

        assert_eq!(
            resolver.expected_path(&metadata),
            Some(dir.path().join("Intro v1.2_ basics_.mp4"))
        );
        assert_eq!(resolver.expected_path(&MediaMetadata::default()), None);
    }

    #[tokio::test]
    async fn test_batch_scenario_with_live_guard() {
        let dir = TempDir::new().unwrap();
        let normal = "https://example.com/a";
        let live_url = "https://example.com/live/abcdefghijk";
        let metadata = recorded(dir.path(), "A");
        let target = dir.path().join("A.mp3");

        let mut engine = engine();
        engine.expect_probe().returning(move |identifier, _| {
            if identifier.contains("/live/") {
                Ok(live())
            } else {
                Ok(metadata.clone())
            }
        });
        let written = target.clone();
        engine
            .expect_fetch()
            .withf(move |identifier, _| identifier == normal)
            .times(1)
            .returning(move |_, _| {
                std::fs::write(&written, b"mp3").unwrap();
                Ok(written.clone())
            });

        let resolver = resolver(engine, dir.path()).with_skip_live(true);
        let runner = BatchRunner::new(
            StageSet::new("check input", "convert to mp3", "check output"),
            "converted: {path}",
        )
        .with_reporter(Reporter::new(true));

        let report = runner.run(["", normal, live_url], &resolver).await;

        assert_eq!(report.outcomes.len(), 3);
        match &report.outcomes[0].outcome {
            Outcome::Failed(failure) => {
                assert_eq!(failure.stage, Stage::Precondition);
                assert_eq!(failure.kind, FailureKind::Rejected);
            }
            other => panic!("expected precondition failure, got {:?}", other),
        }
        assert_eq!(report.outcomes[1].outcome, Outcome::Success { artifact: target });
        assert_eq!(
            report.outcomes[2].outcome,
            Outcome::Skipped {
                reason: SkipReason::LiveContent
            }
        );
    }
}
