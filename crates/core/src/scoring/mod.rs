//! Segment relevance scoring.
//!
//! Two interchangeable strategies sit behind [`SegmentScorer`]: the tiered
//! lexical matcher (deterministic) and the embedding-based semantic matcher
//! (random sampling from a candidate pool). Randomness is always supplied by
//! the caller so runs can be reproduced from a seed.

pub mod semantic;
pub mod tiered;

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    embedding::Embedder,
    error::{GifcutError, Result},
    types::{ScoredSegment, TranscriptSegment},
};

pub use semantic::{DEFAULT_CANDIDATE_POOL, SemanticScorer, random_sample};
pub use tiered::TieredScorer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    #[default]
    Tiered,
    Semantic,
}

impl ScoringStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ScoringStrategy::Tiered => "tiered",
            ScoringStrategy::Semantic => "semantic",
        }
    }
}

#[derive(Clone)]
pub enum SegmentScorer {
    Tiered(TieredScorer),
    Semantic(SemanticScorer),
}

impl SegmentScorer {
    /// Build the scorer for `strategy`. The semantic strategy needs an embedder.
    pub fn new(
        strategy: ScoringStrategy,
        embedder: Option<Arc<dyn Embedder>>,
        candidate_pool: usize,
    ) -> Result<Self> {
        match (strategy, embedder) {
            (ScoringStrategy::Tiered, _) => Ok(SegmentScorer::Tiered(TieredScorer)),
            (ScoringStrategy::Semantic, Some(embedder)) => Ok(SegmentScorer::Semantic(
                SemanticScorer::new(embedder, candidate_pool),
            )),
            (ScoringStrategy::Semantic, None) => Err(GifcutError::InvalidConfig {
                reason: "semantic scoring requires an embedding model".into(),
            }),
        }
    }

    pub fn strategy(&self) -> ScoringStrategy {
        match self {
            SegmentScorer::Tiered(_) => ScoringStrategy::Tiered,
            SegmentScorer::Semantic(_) => ScoringStrategy::Semantic,
        }
    }

    /// Rank the transcript against the prompt. Empty only for an empty transcript.
    pub fn score<R: Rng + ?Sized>(
        &self,
        transcript: &[TranscriptSegment],
        prompt: &str,
        count: usize,
        rng: &mut R,
    ) -> Vec<ScoredSegment> {
        match self {
            SegmentScorer::Tiered(s) => s.score(transcript, prompt, count),
            SegmentScorer::Semantic(s) => s.score(transcript, prompt, count, rng),
        }
    }
}
