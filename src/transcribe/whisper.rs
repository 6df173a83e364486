use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::engine::{LoadedModel, SpeechEngine};
use super::model::ensure_model;
use crate::EngineError;

/// Sample rate whisper.cpp expects
const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// whisper.cpp running in-process
pub struct WhisperEngine {
    cache_dir: PathBuf,
    ffmpeg_path: String,
    use_gpu: bool,
}

impl WhisperEngine {
    pub fn new(cache_dir: PathBuf, ffmpeg_path: String, use_gpu: bool) -> Self {
        Self {
            cache_dir,
            ffmpeg_path,
            use_gpu,
        }
    }
}

#[async_trait]
impl SpeechEngine for WhisperEngine {
    async fn load_model(&self, name: &str) -> Result<Box<dyn LoadedModel>, EngineError> {
        let model_path = ensure_model(name, &self.cache_dir).await?;
        tracing::info!(model = %model_path.display(), "loading whisper model");

        let use_gpu = self.use_gpu;
        let context = tokio::task::spawn_blocking(move || {
            let mut params = WhisperContextParameters::new();
            params.use_gpu(use_gpu);

            let path = model_path.to_str().ok_or_else(|| {
                EngineError::Inference("model path contains invalid UTF-8".to_string())
            })?;
            WhisperContext::new_with_params(path, params)
                .map_err(|e| EngineError::Inference(e.to_string()))
        })
        .await
        .map_err(|e| EngineError::Inference(format!("model loader crashed: {}", e)))??;

        Ok(Box::new(WhisperModel {
            name: name.to_string(),
            context: Arc::new(context),
            ffmpeg_path: self.ffmpeg_path.clone(),
        }))
    }

    fn engine_name(&self) -> &'static str {
        "whisper.cpp"
    }
}

struct WhisperModel {
    name: String,
    context: Arc<WhisperContext>,
    ffmpeg_path: String,
}

impl WhisperModel {
    /// Decode any audio file to 16kHz mono f32 via ffmpeg
    async fn decode(&self, input: &Path) -> Result<Vec<f32>, EngineError> {
        let output = Command::new(&self.ffmpeg_path)
            .args(["-nostdin", "-threads", "0", "-i"])
            .arg(input)
            .args(["-f", "s16le", "-ac", "1", "-acodec", "pcm_s16le", "-ar"])
            .arg(WHISPER_SAMPLE_RATE.to_string())
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => EngineError::NotInstalled(self.ffmpeg_path.clone()),
                _ => EngineError::Decode(format!("failed to run ffmpeg: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Decode(format!("ffmpeg failed: {}", stderr.trim())));
        }

        if output.stdout.is_empty() {
            return Err(EngineError::Decode("ffmpeg produced no output".to_string()));
        }

        Ok(output
            .stdout
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
            .collect())
    }
}

#[async_trait]
impl LoadedModel for WhisperModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transcribe(&self, input: &Path, verbose: bool) -> Result<String, EngineError> {
        let samples = self.decode(input).await?;
        tracing::debug!(
            samples = samples.len(),
            seconds = samples.len() as f64 / WHISPER_SAMPLE_RATE as f64,
            "decoded audio"
        );

        let context = Arc::clone(&self.context);
        tokio::task::spawn_blocking(move || run_inference(&context, &samples, verbose))
            .await
            .map_err(|e| EngineError::Inference(format!("inference task crashed: {}", e)))?
    }
}

/// One inference pass with a fresh state; the shared context is only read
fn run_inference(context: &WhisperContext, samples: &[f32], verbose: bool) -> Result<String, EngineError> {
    let inference = |e: whisper_rs::WhisperError| EngineError::Inference(e.to_string());

    let mut state = context.create_state().map_err(inference)?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(Some("auto"));
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    state.full(params, samples).map_err(inference)?;

    let mut text = String::new();
    for i in 0..state.full_n_segments() {
        let segment = state
            .get_segment(i)
            .ok_or_else(|| EngineError::Inference(format!("segment {} not found", i)))?;
        let segment_text = segment.to_str_lossy().map_err(inference)?;

        if verbose {
            println!(
                "[{} --> {}] {}",
                format_timestamp(segment.start_timestamp()),
                format_timestamp(segment.end_timestamp()),
                segment_text.trim()
            );
        }
        text.push_str(&segment_text);
    }

    Ok(text.trim().to_string())
}

/// Centiseconds to `mm:ss.mmm`
fn format_timestamp(centiseconds: i64) -> String {
    let millis = centiseconds.max(0) * 10;
    format!("{:02}:{:02}.{:03}", millis / 60_000, (millis / 1000) % 60, millis % 1000)
}
