use std::{collections::HashSet, sync::Arc};

use rand::{Rng, seq::SliceRandom};
use tracing::{debug, info, warn};

use crate::{
    embedding::{Embedder, cosine_similarity},
    error::{GifcutError, Result},
    types::{MatchTier, ScoredSegment, TranscriptSegment},
};

pub const DEFAULT_CANDIDATE_POOL: usize = 20;

/// Embedding-similarity scorer. Ranks every segment against the prompt, keeps
/// the best `pool_size` as candidates and samples the final picks at random.
#[derive(Clone)]
pub struct SemanticScorer {
    embedder: Arc<dyn Embedder>,
    pool_size: usize,
}

impl SemanticScorer {
    pub fn new(embedder: Arc<dyn Embedder>, pool_size: usize) -> Self {
        Self {
            embedder,
            pool_size: pool_size.max(1),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Cosine similarity of every segment to the prompt, in transcript order.
    pub fn similarities(&self, transcript: &[TranscriptSegment], prompt: &str) -> Result<Vec<f32>> {
        let prompt_vec = self
            .embedder
            .embed_text(prompt)
            .map_err(|e| GifcutError::Embedding {
                reason: e.to_string(),
            })?;

        let texts: Vec<&str> = transcript.iter().map(|s| s.text.as_str()).collect();
        let segment_vecs = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| GifcutError::Embedding {
                reason: e.to_string(),
            })?;

        if segment_vecs.len() != transcript.len() {
            return Err(GifcutError::Embedding {
                reason: format!(
                    "expected {} vectors, embedder returned {}",
                    transcript.len(),
                    segment_vecs.len()
                ),
            });
        }

        Ok(segment_vecs
            .iter()
            .map(|v| cosine_similarity(&prompt_vec, v))
            .collect())
    }

    /// Top `pool_size` segments by similarity, best first, one per `start`.
    pub fn candidate_pool(
        &self,
        transcript: &[TranscriptSegment],
        prompt: &str,
    ) -> Result<Vec<ScoredSegment>> {
        self.ranked(transcript, prompt, self.pool_size)
    }

    fn ranked(
        &self,
        transcript: &[TranscriptSegment],
        prompt: &str,
        limit: usize,
    ) -> Result<Vec<ScoredSegment>> {
        let sims = self.similarities(transcript, prompt)?;

        let mut scored: Vec<ScoredSegment> = transcript
            .iter()
            .zip(sims)
            .map(|(segment, sim)| ScoredSegment::new(segment.clone(), sim as f64, MatchTier::Semantic))
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut seen = HashSet::new();
        scored.retain(|s| seen.insert(s.segment.start_key()));
        scored.truncate(limit);
        Ok(scored)
    }

    pub fn score<R: Rng + ?Sized>(
        &self,
        transcript: &[TranscriptSegment],
        prompt: &str,
        count: usize,
        rng: &mut R,
    ) -> Vec<ScoredSegment> {
        if transcript.is_empty() || count == 0 {
            return Vec::new();
        }

        // the pool grows to `count` so a large request is never cut short by it
        let pool = match self.ranked(transcript, prompt, self.pool_size.max(count)) {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "semantic search failed, falling back to random segments");
                return random_sample(transcript, count, rng);
            }
        };

        if pool.is_empty() {
            info!("semantic search found no candidates, falling back to random segments");
            return random_sample(transcript, count, rng);
        }

        debug!(pool = pool.len(), count, "sampling from candidate pool");
        let take = count.min(pool.len());
        pool.choose_multiple(rng, take).cloned().collect()
    }
}

/// Uniform sample without replacement of up to `count` segments, one per `start`.
pub fn random_sample<R: Rng + ?Sized>(
    transcript: &[TranscriptSegment],
    count: usize,
    rng: &mut R,
) -> Vec<ScoredSegment> {
    let mut seen = HashSet::new();
    let distinct: Vec<&TranscriptSegment> = transcript
        .iter()
        .filter(|s| seen.insert(s.start_key()))
        .collect();

    let take = count.min(distinct.len());
    distinct
        .choose_multiple(rng, take)
        .map(|s| ScoredSegment::new((*s).clone(), 0.0, MatchTier::Random))
        .collect()
}
