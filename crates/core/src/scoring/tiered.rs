use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::{
    keywords::{extract_keywords, prompt_words, tokens},
    types::{MatchTier, ScoredSegment, TranscriptSegment},
};

const TRIGRAM_SCORE: f64 = 0.5;

/// Lexical scorer that escalates keyword → broad word → trigram → positional
/// matching, stopping as soon as enough segments qualify.
#[derive(Debug, Clone, Copy, Default)]
pub struct TieredScorer;

/// Accumulates matches across tiers, refusing any `start` seen before.
struct Accumulator {
    picked: Vec<ScoredSegment>,
    used: HashSet<u64>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            picked: Vec::new(),
            used: HashSet::new(),
        }
    }

    fn is_used(&self, segment: &TranscriptSegment) -> bool {
        self.used.contains(&segment.start_key())
    }

    fn push(&mut self, segment: &TranscriptSegment, score: f64, tier: MatchTier) -> bool {
        if !self.used.insert(segment.start_key()) {
            return false;
        }
        self.picked
            .push(ScoredSegment::new(segment.clone(), score, tier));
        true
    }

    fn len(&self) -> usize {
        self.picked.len()
    }

    fn finish(mut self, count: usize) -> Vec<ScoredSegment> {
        // stable: ties keep insertion order
        self.picked.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then_with(|| b.score.total_cmp(&a.score))
        });
        self.picked.truncate(count);
        self.picked
    }
}

/// `2 * whole-word hits + substring hits` over the keyword set.
pub fn keyword_score(keywords: &BTreeSet<String>, lowered_text: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let words: HashSet<String> = tokens(lowered_text).collect();
    let exact = keywords.iter().filter(|k| words.contains(*k)).count();
    let partial = keywords
        .iter()
        .filter(|k| lowered_text.contains(k.as_str()))
        .count();
    (2 * exact + partial) as f64
}

/// Number of prompt words (stop words included) found as substrings.
pub fn broad_score(words: &[String], lowered_text: &str) -> f64 {
    words
        .iter()
        .filter(|w| lowered_text.contains(w.as_str()))
        .count() as f64
}

/// Every distinct 3-character window of the prompt that isn't pure whitespace.
pub fn prompt_trigrams(lowered_prompt: &str) -> Vec<String> {
    let chars: Vec<char> = lowered_prompt.chars().collect();
    let mut seen = HashSet::new();
    chars
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .filter(|t| !t.trim().is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Indices for the positional fallback: start, middle, end, then the rest in
/// order until `needed` positions are chosen.
pub fn positional_indices(len: usize, needed: usize) -> Vec<usize> {
    if len == 0 || needed == 0 {
        return Vec::new();
    }

    let mut order = Vec::with_capacity(len);
    for i in [0, len / 2, len - 1] {
        if !order.contains(&i) {
            order.push(i);
        }
    }
    if needed > order.len() {
        for i in 0..len {
            if order.len() >= needed {
                break;
            }
            if !order.contains(&i) {
                order.push(i);
            }
        }
    }
    order
}

impl TieredScorer {
    pub fn score(
        &self,
        transcript: &[TranscriptSegment],
        prompt: &str,
        count: usize,
    ) -> Vec<ScoredSegment> {
        if transcript.is_empty() || count == 0 {
            return Vec::new();
        }

        let lowered: Vec<String> = transcript.iter().map(|s| s.text.to_lowercase()).collect();
        let mut acc = Accumulator::new();

        let keywords = extract_keywords(prompt);
        for (segment, text) in transcript.iter().zip(&lowered) {
            let score = keyword_score(&keywords, text);
            if score > 0.0 {
                acc.push(segment, score, MatchTier::Keyword);
            }
        }
        debug!(keywords = ?keywords, matched = acc.len(), "keyword tier");

        if acc.len() < count {
            let words = prompt_words(prompt);
            for (segment, text) in transcript.iter().zip(&lowered) {
                if acc.is_used(segment) {
                    continue;
                }
                let score = broad_score(&words, text);
                if score > 0.0 {
                    acc.push(segment, score, MatchTier::BroadWord);
                }
            }
            debug!(matched = acc.len(), "broad word tier");
        }

        if acc.len() < count {
            let trigrams = prompt_trigrams(&prompt.to_lowercase());
            for (segment, text) in transcript.iter().zip(&lowered) {
                if acc.is_used(segment) {
                    continue;
                }
                if trigrams.iter().any(|t| text.contains(t.as_str())) {
                    acc.push(segment, TRIGRAM_SCORE, MatchTier::Trigram);
                }
            }
            debug!(matched = acc.len(), "trigram tier");
        }

        if acc.len() < count {
            let mut seen = HashSet::new();
            let unused: Vec<&TranscriptSegment> = transcript
                .iter()
                .filter(|s| !acc.is_used(s))
                .filter(|s| seen.insert(s.start_key()))
                .collect();
            let needed = count - acc.len();
            for i in positional_indices(unused.len(), needed) {
                acc.push(unused[i], 0.0, MatchTier::Positional);
            }
            debug!(matched = acc.len(), "positional tier");
        }

        acc.finish(count)
    }
}
