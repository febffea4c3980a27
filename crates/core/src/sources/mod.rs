//! Collaborators that feed the highlight pipeline: transcripts and the video
//! files they describe.

pub mod transcript;
pub mod video;
#[cfg(feature = "whisper")]
pub mod whisper;

pub use transcript::{
    FallbackTranscripts, PlatformCaptions, TranscriptFile, TranscriptSource, load_or_fetch,
    load_transcript, parse_json3, parse_transcript_json, save_transcript,
};
pub use video::{
    cleanup_media, download_video, ensure_whisper_model, extract_audio, resolve_video_id,
};
#[cfg(feature = "whisper")]
pub use whisper::WhisperTranscriber;
