use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One caption record: `text` spoken from `start` for `duration` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }

    /// Key used to tell segments apart. Captions repeat, timestamps don't.
    pub fn start_key(&self) -> u64 {
        self.start.to_bits()
    }
}

/// Whisper-style transcript document, as written by the `whisper` CLI.
#[derive(Debug, Serialize, Deserialize)]
pub struct WhisperTranscript {
    #[serde(default)]
    pub text: String,
    pub segments: Vec<WhisperSegment>,
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WhisperSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl From<WhisperSegment> for TranscriptSegment {
    fn from(seg: WhisperSegment) -> Self {
        TranscriptSegment {
            text: seg.text,
            start: seg.start,
            duration: seg.end - seg.start,
        }
    }
}

/// Which stage of the lexical scorer admitted a segment.
///
/// Variants are declared strongest first, so the derived ordering ranks an
/// earlier tier ahead of any later one regardless of raw score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Keyword,
    BroadWord,
    Trigram,
    Positional,
    Semantic,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSegment {
    pub segment: TranscriptSegment,
    pub score: f64,
    pub tier: MatchTier,
}

impl ScoredSegment {
    pub fn new(segment: TranscriptSegment, score: f64, tier: MatchTier) -> Self {
        Self {
            segment,
            score,
            tier,
        }
    }
}

/// Final, de-duplicated list of segments to render.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selection {
    pub segments: Vec<TranscriptSegment>,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranscriptSegment> {
        self.segments.iter()
    }
}

/// An encoded, looping GIF on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GifArtifact {
    pub path: PathBuf,
    pub frame_count: usize,
    pub frame_duration_ms: u32,
    pub looping: bool,
}

/// A rendered GIF together with the segment it captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    /// Position of the segment in the selection.
    pub index: usize,
    pub segment: TranscriptSegment,
    pub artifact: GifArtifact,
}
