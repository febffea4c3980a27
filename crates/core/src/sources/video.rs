use std::path::{Path, PathBuf};

use tokio::{fs, io::AsyncWriteExt, process::Command};
use tracing::info;

use crate::{
    cache::get_model_dir,
    error::{GifcutError, Result},
};

pub const WHISPER_MODEL_NAME: &str = "ggml-base.bin";

/// Small mp4s keep per-clip decoding cheap.
const VIDEO_FORMAT: &str = "best[ext=mp4][height<=480]/best[height<=480]/best";

/// Resolve the platform's id for a video URL
pub async fn resolve_video_id(url: &str) -> Result<String> {
    let output = Command::new("yt-dlp")
        .arg(url)
        .arg("--skip-download")
        .arg("--no-warnings")
        .arg("--print")
        .arg("id")
        .output()
        .await?;

    if !output.status.success() {
        return Err(GifcutError::DownloadFailed {
            url: url.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let id = String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if id.is_empty() {
        return Err(GifcutError::DownloadFailed {
            url: url.to_string(),
            reason: "yt-dlp printed no video id".into(),
        });
    }
    Ok(id)
}

/// Download a video from URL using yt-dlp
pub async fn download_video(url: &str, cache_dir: &Path) -> Result<PathBuf> {
    let output_template = cache_dir.join("video.%(ext)s");
    let output = Command::new("yt-dlp")
        .arg(url)
        .arg("--print")
        .arg("after_move:filepath")
        .arg("--extractor-args")
        .arg("youtube:player_client=android,web")
        .arg("-f")
        .arg(VIDEO_FORMAT)
        .arg("-o")
        .arg(&output_template)
        .output()
        .await?;

    if !output.status.success() {
        return Err(GifcutError::DownloadFailed {
            url: url.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout_str = String::from_utf8_lossy(output.stdout.as_slice());
    let filepath = stdout_str.trim();
    if filepath.is_empty() {
        return Err(GifcutError::DownloadFailed {
            url: url.to_string(),
            reason: "yt-dlp reported no output file".into(),
        });
    }
    Ok(PathBuf::from(filepath))
}

/// Extract 16 kHz mono PCM audio from a video using ffmpeg
pub async fn extract_audio(video_path: &Path, audio_path: &Path) -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(video_path)
        .arg("-vn")
        .arg("-acodec")
        .arg("pcm_s16le")
        .arg("-ar")
        .arg("16000")
        .arg("-ac")
        .arg("1")
        .arg(audio_path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(GifcutError::AudioExtractionFailed {
            video_path: video_path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(())
}

/// Fetch the whisper model into the cache once and return its path
pub async fn ensure_whisper_model(root_cache_dir: &Path) -> Result<PathBuf> {
    let download_url = format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        WHISPER_MODEL_NAME
    );
    let model_dir = get_model_dir(root_cache_dir);
    fs::create_dir_all(&model_dir).await?;

    let model_path = model_dir.join(WHISPER_MODEL_NAME);
    if model_path.exists() {
        return Ok(model_path);
    }

    info!(url = %download_url, "downloading whisper model");
    let model_download_failed = |reason: String| GifcutError::ModelDownloadFailed {
        url: download_url.clone(),
        reason,
    };

    let mut response = reqwest::get(&download_url)
        .await?
        .error_for_status()
        .map_err(|e| model_download_failed(e.to_string()))?;

    // write beside the final path so a broken download never looks complete
    let partial_path = model_dir.join(format!("{WHISPER_MODEL_NAME}.part"));
    let mut file = fs::File::create(&partial_path).await?;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| model_download_failed(e.to_string()))?
    {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    fs::rename(&partial_path, &model_path).await?;
    Ok(model_path)
}

/// Remove downloaded media from a cache directory, keeping transcripts.
pub async fn cleanup_media(cache_dir: &Path) -> Result<usize> {
    let mut removed = 0;
    let mut entries = fs::read_dir(cache_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_audio = path.extension().is_some_and(|e| e == "wav");
        if crate::cache::is_video_file(&path) || is_audio {
            fs::remove_file(&path).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cleanup_keeps_transcripts() {
        let dir = std::env::temp_dir().join(format!("gifcut-video-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("video.mp4"), b"x").unwrap();
        std::fs::write(dir.join("audio.wav"), b"x").unwrap();
        std::fs::write(dir.join("transcript.json"), b"[]").unwrap();

        assert_eq!(cleanup_media(&dir).await.unwrap(), 2);
        assert!(dir.join("transcript.json").exists());
        assert!(!dir.join("video.mp4").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    #[ignore = "needs yt-dlp and network access"]
    async fn resolves_youtube_ids() {
        let id = resolve_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }
}
