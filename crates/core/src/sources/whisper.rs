use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::{
    cache::{get_audio_path, get_model_dir},
    error::{GifcutError, Result},
    sources::{
        transcript::{TranscriptSource, normalize},
        video::{WHISPER_MODEL_NAME, ensure_whisper_model, extract_audio},
    },
    types::TranscriptSegment,
};

/// Machine transcription of the video's audio track with whisper.cpp.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    model_path: PathBuf,
    /// Cache root to fetch the model into when `model_path` is missing.
    model_cache: Option<PathBuf>,
    video_path: PathBuf,
    work_dir: PathBuf,
    use_gpu: bool,
}

impl WhisperTranscriber {
    pub fn new(
        model_path: impl Into<PathBuf>,
        video_path: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            model_cache: None,
            video_path: video_path.into(),
            work_dir: work_dir.into(),
            use_gpu: cfg!(feature = "cuda"),
        }
    }

    /// Use the cached `ggml-base` model, downloading it on first use.
    pub fn from_cache(
        root_cache_dir: &Path,
        video_path: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        let model_path = get_model_dir(root_cache_dir).join(WHISPER_MODEL_NAME);
        let mut transcriber = Self::new(model_path, video_path, work_dir);
        transcriber.model_cache = Some(root_cache_dir.to_path_buf());
        transcriber
    }
}

fn unavailable(reason: impl std::fmt::Display) -> GifcutError {
    GifcutError::TranscriptUnavailable {
        reason: format!("whisper: {reason}"),
    }
}

fn read_samples(audio_path: &Path) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(audio_path).map_err(unavailable)?;
    reader
        .samples::<i16>()
        .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(unavailable)
}

fn transcribe(model_path: &Path, samples: &[f32], use_gpu: bool) -> Result<Vec<TranscriptSegment>> {
    let ctx_params = WhisperContextParameters {
        use_gpu,
        flash_attn: use_gpu,
        ..Default::default()
    };
    let model_path_str = model_path
        .to_str()
        .ok_or_else(|| unavailable("model path is not valid UTF-8"))?;
    let ctx = WhisperContext::new_with_params(model_path_str, ctx_params).map_err(unavailable)?;

    let params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });
    let mut state = ctx.create_state().map_err(unavailable)?;
    state.full(params, samples).map_err(unavailable)?;

    let segments = state
        .as_iter()
        .filter_map(|segment| {
            let text = segment.to_str().ok()?.trim().to_string();
            // timestamps are in centiseconds
            let start = segment.start_timestamp() as f64 / 100.0;
            let end = segment.end_timestamp() as f64 / 100.0;
            (!text.is_empty()).then(|| TranscriptSegment::new(text, start, end - start))
        })
        .collect();

    Ok(normalize(segments))
}

#[async_trait]
impl TranscriptSource for WhisperTranscriber {
    fn name(&self) -> &str {
        "whisper"
    }

    async fn fetch(&self, _video_id: &str) -> Result<Vec<TranscriptSegment>> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let audio_path = get_audio_path(&self.work_dir);
        if !audio_path.exists() {
            debug!(video = %self.video_path.display(), "extracting audio for whisper");
            extract_audio(&self.video_path, &audio_path).await?;
        }

        let model_path = match &self.model_cache {
            Some(root) if !self.model_path.exists() => ensure_whisper_model(root).await?,
            _ => self.model_path.clone(),
        };

        info!(model = %model_path.display(), "transcribing with whisper");
        let use_gpu = self.use_gpu;
        tokio::task::spawn_blocking(move || {
            let samples = read_samples(&audio_path)?;
            transcribe(&model_path, &samples, use_gpu)
        })
        .await
        .map_err(unavailable)?
    }
}
