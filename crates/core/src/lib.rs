//! gifcut core library
//!
//! Turns a video transcript and a free-text prompt into captioned highlight
//! GIFs: segment scoring and selection, frame sampling, caption rendering and
//! GIF encoding, plus the transcript and media collaborators they need.

pub mod cache;
pub mod config;
pub mod embedding;
pub mod error;
pub mod format;
pub mod keywords;
pub mod media;
pub mod pipeline;
pub mod render;
pub mod sampler;
pub mod scoring;
pub mod selector;
pub mod sources;
pub mod types;

// Re-export commonly used items at crate root
pub use cache::{find_video_in_cache, get_cache_dir, get_root_cache_dir, get_transcript_path};
pub use config::{CaptionStyle, HighlightConfig};
pub use embedding::{Embedder, cosine_similarity};
pub use error::{GifcutError, Result};
pub use format::{format_highlights_readable, format_timestamp};
pub use keywords::extract_keywords;
pub use media::{ChannelOrder, FfmpegMedia, Frame, MediaInfo, MediaSource};
pub use pipeline::{HighlightPipeline, HighlightRequest, SegmentOutcome, output_prefix};
pub use render::{CaptionRenderer, GifEncoder};
pub use sampler::{ClipWindow, FrameSampler, SampledClip};
pub use scoring::{ScoringStrategy, SegmentScorer};
pub use selector::select;
pub use sources::{FallbackTranscripts, PlatformCaptions, TranscriptFile, TranscriptSource};
pub use types::{GifArtifact, Highlight, MatchTier, ScoredSegment, Selection, TranscriptSegment};
