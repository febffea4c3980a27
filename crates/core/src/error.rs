use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GifcutError {
    #[error("Transcript unavailable: {reason}")]
    TranscriptUnavailable { reason: String },

    #[error("No relevant segments found")]
    NoRelevantSegments,

    #[error("Frame extraction failed at {start:.2}s: {reason}")]
    FrameExtractionFailed { start: f64, reason: String },

    #[error("GIF encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("All {attempted} segment jobs failed")]
    AllSegmentsFailed { attempted: usize },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Embedding failed: {reason}")]
    Embedding { reason: String },

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Model download failed for {url}: {reason}")]
    ModelDownloadFailed { url: String, reason: String },

    #[error("Audio extraction failed for {video_path}: {reason}")]
    AudioExtractionFailed { video_path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl GifcutError {
    /// Message safe to show an end user. Internal failures stay generic.
    pub fn user_message(&self) -> &'static str {
        match self {
            GifcutError::TranscriptUnavailable { .. } => {
                "Could not get or generate a transcript for this video."
            }
            GifcutError::NoRelevantSegments => "No relevant segments found for that prompt.",
            _ => "A server error occurred.",
        }
    }

    /// Failures that only cost one segment and never the whole request.
    pub fn is_segment_local(&self) -> bool {
        matches!(
            self,
            GifcutError::FrameExtractionFailed { .. } | GifcutError::EncodingFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GifcutError>;
