use async_trait::async_trait;
use std::path::Path;

use crate::config::Config;
use crate::{EngineError, SetupError};

/// Speech-to-text backend able to load named models
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Load a model once; the handle is reused for every file of a run
    async fn load_model(&self, name: &str) -> Result<Box<dyn LoadedModel>, EngineError>;

    fn engine_name(&self) -> &'static str;
}

/// A loaded model. Calls must not change the model, so one handle serves a whole batch.
#[async_trait]
pub trait LoadedModel: Send + Sync {
    fn name(&self) -> &str;

    /// Transcribe one audio file to plain text
    async fn transcribe(&self, input: &Path, verbose: bool) -> Result<String, EngineError>;
}

/// The speech engine compiled into this binary, if any
#[cfg(feature = "whisper")]
pub fn available_engine(config: &Config) -> Result<Box<dyn SpeechEngine>, SetupError> {
    Ok(Box::new(super::whisper::WhisperEngine::new(
        config.model_cache_dir(),
        config.transcribe.ffmpeg_path.clone(),
        config.transcribe.use_gpu,
    )))
}

/// The speech engine compiled into this binary, if any
#[cfg(not(feature = "whisper"))]
pub fn available_engine(config: &Config) -> Result<Box<dyn SpeechEngine>, SetupError> {
    let _ = config;
    Err(SetupError::EngineUnavailable(
        "built without the `whisper` feature; reinstall with `cargo install mediabatch --features whisper`"
            .to_string(),
    ))
}

#[cfg(all(test, not(feature = "whisper")))]
mod tests {
    use super::*;

    #[test]
    fn test_missing_engine_is_setup_error() {
        let result = available_engine(&Config::default());
        assert!(matches!(result, Err(SetupError::EngineUnavailable(_))));
    }
}
