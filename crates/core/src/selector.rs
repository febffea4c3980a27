use std::collections::HashSet;

use crate::{
    error::{GifcutError, Result},
    types::{ScoredSegment, Selection},
};

/// Trim scorer output to at most `count` segments with distinct `start`s.
///
/// An empty selection (only possible for an empty transcript) is reported as
/// [`GifcutError::NoRelevantSegments`].
pub fn select(scored: Vec<ScoredSegment>, count: usize) -> Result<Selection> {
    let mut seen = HashSet::new();
    let segments: Vec<_> = scored
        .into_iter()
        .map(|s| s.segment)
        .filter(|s| seen.insert(s.start_key()))
        .take(count)
        .collect();

    if segments.is_empty() {
        return Err(GifcutError::NoRelevantSegments);
    }

    Ok(Selection { segments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scoring::TieredScorer,
        types::{MatchTier, TranscriptSegment},
    };

    fn scored(text: &str, start: f64) -> ScoredSegment {
        ScoredSegment::new(TranscriptSegment::new(text, start, 1.0), 1.0, MatchTier::Keyword)
    }

    #[test]
    fn empty_input_is_no_relevant_segments() {
        assert!(matches!(select(vec![], 3), Err(GifcutError::NoRelevantSegments)));
    }

    #[test]
    fn truncates_to_count() {
        let selection = select(vec![scored("a", 0.0), scored("b", 1.0), scored("c", 2.0)], 2).unwrap();
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.segments[0].text, "a");
    }

    #[test]
    fn drops_duplicate_starts() {
        let selection = select(vec![scored("a", 0.0), scored("a again", 0.0), scored("b", 1.0)], 3).unwrap();
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn selection_size_is_min_of_count_and_transcript() {
        let transcript: Vec<_> = (0..7)
            .map(|i| TranscriptSegment::new(format!("line {i}"), i as f64, 1.0))
            .collect();
        for count in 1..=10 {
            let selection = select(TieredScorer.score(&transcript, "unrelated prompt", count), count).unwrap();
            assert_eq!(selection.len(), count.min(transcript.len()));
            let mut starts: Vec<u64> = selection.iter().map(|s| s.start_key()).collect();
            starts.sort();
            starts.dedup();
            assert_eq!(starts.len(), selection.len());
        }
    }
}
