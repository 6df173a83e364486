use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::utils::format_file_size;
use crate::EngineError;

const HUGGINGFACE_BASE: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Smallest plausible model file; anything below is an error page
const MIN_MODEL_BYTES: u64 = 1_000_000;

/// Known model names and their approximate download size
pub const KNOWN_MODELS: &[(&str, &str)] = &[
    ("tiny", "75 MB"),
    ("tiny.en", "75 MB"),
    ("base", "142 MB"),
    ("base.en", "142 MB"),
    ("small", "466 MB"),
    ("small.en", "466 MB"),
    ("medium", "1.5 GB"),
    ("medium.en", "1.5 GB"),
    ("large-v2", "2.9 GB"),
    ("large-v3", "2.9 GB"),
    ("large-v3-turbo", "1.6 GB"),
];

/// ggml file name for a known model
pub fn model_filename(name: &str) -> Result<String, EngineError> {
    let name = name.trim().to_lowercase();
    if KNOWN_MODELS.iter().any(|(known, _)| *known == name) {
        Ok(format!("ggml-{}.bin", name))
    } else {
        Err(EngineError::UnknownModel(name))
    }
}

/// Approximate download size of a known model
pub fn approximate_size(name: &str) -> Option<&'static str> {
    let name = name.trim().to_lowercase();
    KNOWN_MODELS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, size)| *size)
}

/// Make sure a model is on disk, downloading it into `cache_dir` if needed.
///
/// `name` may also be a path to an existing `.bin` file.
pub async fn ensure_model(name: &str, cache_dir: &Path) -> Result<PathBuf, EngineError> {
    let custom = Path::new(name);
    if custom.extension().is_some_and(|ext| ext == "bin") {
        return if custom.is_file() {
            Ok(custom.to_path_buf())
        } else {
            Err(EngineError::UnknownModel(name.to_string()))
        };
    }

    let filename = model_filename(name)?;
    let model_path = cache_dir.join(&filename);

    if model_path.exists() {
        tracing::info!(path = %model_path.display(), "model already cached");
        return Ok(model_path);
    }

    fs_err::create_dir_all(cache_dir)?;

    let url = format!("{}/{}", HUGGINGFACE_BASE, filename);
    tracing::info!(%url, "downloading model");
    download_model(&url, &model_path).await?;

    Ok(model_path)
}

async fn download_model(url: &str, dest: &Path) -> Result<(), EngineError> {
    let response = reqwest::get(url)
        .await?
        .error_for_status()
        .map_err(|e| EngineError::ModelDownload(format!("HTTP error: {}", e)))?;

    let total_size = response.content_length().unwrap_or(0);

    let progress = ProgressBar::new(total_size);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
    ) {
        progress.set_style(style.progress_chars("#>-"));
    }
    progress.set_message(format!(
        "Downloading {}",
        dest.file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));

    // Write next to the destination, rename once complete
    let partial = dest.with_extension("bin.part");
    let mut file = fs_err::File::create(&partial)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        progress.set_position(downloaded);
    }
    file.flush()?;
    drop(file);

    if downloaded < MIN_MODEL_BYTES {
        fs_err::remove_file(&partial).ok();
        return Err(EngineError::ModelDownload(format!(
            "downloaded file too small ({})",
            format_file_size(downloaded)
        )));
    }

    fs_err::rename(&partial, dest)?;
    progress.finish_with_message("Download complete");

    if total_size > 0 && downloaded != total_size {
        tracing::warn!(expected = total_size, actual = downloaded, "model size mismatch");
    }

    tracing::info!(path = %dest.display(), size = downloaded, "model saved");
    Ok(())
}

/// Model files present in the cache
pub fn list_cached_models(cache_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(cache_dir) else {
        return Vec::new();
    };

    let mut models: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "bin"))
        .collect();
    models.sort();
    models
}
