//! Prompt in, captioned GIFs out.
//!
//! Scoring and selection run once per request. Each selected segment then
//! becomes an independent job (sample, caption, encode) bounded by
//! `max_parallel_jobs`. A failed job is logged and left out of the result; the
//! request only fails when every job does.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rand::{SeedableRng, rngs::StdRng};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::HighlightConfig,
    embedding::Embedder,
    error::{GifcutError, Result},
    media::MediaSource,
    render::{CaptionRenderer, GifEncoder},
    sampler::FrameSampler,
    scoring::SegmentScorer,
    selector::select,
    types::{GifArtifact, Highlight, Selection, TranscriptSegment},
};

/// Output name prefix: the video id, or `upload_<6 hex>` for local files.
pub fn output_prefix(video_id: Option<&str>) -> String {
    let sanitized: Option<String> = video_id
        .map(|id| {
            id.chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
                .collect()
        })
        .filter(|id: &String| !id.is_empty());

    sanitized.unwrap_or_else(|| format!("upload_{}", short_hex(6)))
}

/// `<prefix>_<index>_<8 hex>.gif`
pub fn output_file_name(prefix: &str, index: usize) -> String {
    format!("{prefix}_{index}_{}.gif", short_hex(8))
}

fn short_hex(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_string()
}

#[derive(Debug, Clone)]
pub struct HighlightRequest {
    pub prompt: String,
    pub transcript: Vec<TranscriptSegment>,
    /// Number of GIFs wanted; the config's `count` when unset.
    pub count: Option<usize>,
    pub prefix: String,
    /// Seeds every random choice made for this request.
    pub seed: Option<u64>,
}

impl HighlightRequest {
    pub fn new(prompt: impl Into<String>, transcript: Vec<TranscriptSegment>) -> Self {
        Self {
            prompt: prompt.into(),
            transcript,
            count: None,
            prefix: output_prefix(None),
            seed: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// What became of one selected segment.
#[derive(Debug)]
pub enum SegmentOutcome {
    Rendered(Highlight),
    Failed {
        index: usize,
        start: f64,
        error: GifcutError,
    },
}

impl SegmentOutcome {
    pub fn index(&self) -> usize {
        match self {
            SegmentOutcome::Rendered(h) => h.index,
            SegmentOutcome::Failed { index, .. } => *index,
        }
    }
}

/// Everything one segment job needs, owned so the job can run on its own task.
#[derive(Clone)]
struct SegmentJob {
    sampler: FrameSampler,
    renderer: CaptionRenderer,
    encoder: GifEncoder,
}

impl SegmentJob {
    async fn run(
        &self,
        media: &dyn MediaSource,
        index: usize,
        segment: TranscriptSegment,
        path: PathBuf,
    ) -> SegmentOutcome {
        let start = segment.start;
        match self.render(media, &segment, path).await {
            Ok(artifact) => SegmentOutcome::Rendered(Highlight {
                index,
                segment,
                artifact,
            }),
            Err(error) => SegmentOutcome::Failed {
                index,
                start,
                error,
            },
        }
    }

    async fn render(
        &self,
        media: &dyn MediaSource,
        segment: &TranscriptSegment,
        path: PathBuf,
    ) -> Result<GifArtifact> {
        let clip = self.sampler.sample(media, segment).await?;
        debug!(start = segment.start, frames = clip.frames.len(), "captioning clip");

        let renderer = self.renderer.clone();
        let encoder = self.encoder;
        let caption = segment.text.trim().to_string();
        tokio::task::spawn_blocking(move || {
            let frames = renderer.render_all(&clip.frames, &caption);
            encoder.encode(&frames, &path)
        })
        .await
        .map_err(|e| GifcutError::EncodingFailed {
            reason: format!("render task failed: {e}"),
        })?
    }
}

pub struct HighlightPipeline {
    config: HighlightConfig,
    scorer: SegmentScorer,
    job: SegmentJob,
}

impl HighlightPipeline {
    /// Validate `config` and resolve the caption font. The semantic strategy
    /// needs an `embedder`.
    pub fn new(config: HighlightConfig, embedder: Option<Arc<dyn Embedder>>) -> Result<Self> {
        let renderer = CaptionRenderer::new(config.caption.clone());
        Self::with_renderer(config, embedder, renderer)
    }

    pub fn with_renderer(
        config: HighlightConfig,
        embedder: Option<Arc<dyn Embedder>>,
        renderer: CaptionRenderer,
    ) -> Result<Self> {
        config.validate()?;
        let scorer = SegmentScorer::new(config.strategy, embedder, config.candidate_pool)?;
        let job = SegmentJob {
            sampler: FrameSampler::from_config(&config),
            renderer,
            encoder: GifEncoder::new(config.frame_duration_ms()),
        };
        Ok(Self {
            config,
            scorer,
            job,
        })
    }

    pub fn config(&self) -> &HighlightConfig {
        &self.config
    }

    pub fn renderer(&self) -> &CaptionRenderer {
        &self.job.renderer
    }

    /// Score the transcript and pick the segments to render.
    pub fn select(&self, request: &HighlightRequest) -> Result<Selection> {
        let count = request.count.unwrap_or(self.config.count);
        if count == 0 {
            return Err(GifcutError::InvalidConfig {
                reason: "count must be at least 1".into(),
            });
        }

        let mut rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let scored = self
            .scorer
            .score(&request.transcript, &request.prompt, count, &mut rng);
        let selection = select(scored, count)?;

        info!(
            strategy = self.scorer.strategy().name(),
            requested = count,
            selected = selection.len(),
            "segments selected"
        );
        Ok(selection)
    }

    /// Render every selected segment, returning successes in selection order.
    pub async fn run(
        &self,
        media: Arc<dyn MediaSource>,
        request: &HighlightRequest,
    ) -> Result<Vec<Highlight>> {
        let selection = self.select(request)?;
        let outcomes = self.render_selection(media, &selection, &request.prefix).await?;

        let attempted = outcomes.len();
        let mut highlights = Vec::with_capacity(attempted);
        for outcome in outcomes {
            match outcome {
                SegmentOutcome::Rendered(highlight) => highlights.push(highlight),
                SegmentOutcome::Failed {
                    index,
                    start,
                    error,
                } => warn!(index, start, error = %error, "segment skipped"),
            }
        }

        if highlights.is_empty() {
            return Err(GifcutError::AllSegmentsFailed { attempted });
        }
        info!(rendered = highlights.len(), attempted, "highlights rendered");
        Ok(highlights)
    }

    /// One outcome per selected segment, ordered by selection index.
    pub async fn render_selection(
        &self,
        media: Arc<dyn MediaSource>,
        selection: &Selection,
        prefix: &str,
    ) -> Result<Vec<SegmentOutcome>> {
        let output_dir = self.config.output_dir.clone();
        tokio::fs::create_dir_all(&output_dir).await?;

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_jobs.max(1)));
        let mut jobs = JoinSet::new();

        for (index, segment) in selection.iter().cloned().enumerate() {
            let job = self.job.clone();
            let media = Arc::clone(&media);
            let semaphore = Arc::clone(&semaphore);
            let path = output_path(&output_dir, prefix, index);
            jobs.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                job.run(media.as_ref(), index, segment, path).await
            });
        }

        let mut outcomes = Vec::with_capacity(selection.len());
        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "segment job panicked"),
            }
        }
        // panicked jobs produce no outcome of their own
        for index in 0..selection.len() {
            if !outcomes.iter().any(|o| o.index() == index) {
                let start = selection.segments[index].start;
                outcomes.push(SegmentOutcome::Failed {
                    index,
                    start,
                    error: GifcutError::EncodingFailed {
                        reason: "segment job aborted".into(),
                    },
                });
            }
        }
        outcomes.sort_by_key(SegmentOutcome::index);
        Ok(outcomes)
    }
}

fn output_path(output_dir: &Path, prefix: &str, index: usize) -> PathBuf {
    output_dir.join(output_file_name(prefix, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_video_id_or_upload() {
        assert_eq!(output_prefix(Some("dQw4w9WgXcQ")), "dQw4w9WgXcQ");
        assert_eq!(output_prefix(Some("../etc")), "etc");

        let upload = output_prefix(None);
        assert!(upload.starts_with("upload_"));
        assert_eq!(upload.len(), "upload_".len() + 6);
        assert!(output_prefix(Some("///")).starts_with("upload_"));
    }

    #[test]
    fn file_names_are_unique_per_call() {
        let a = output_file_name("abc", 0);
        let b = output_file_name("abc", 0);
        assert_ne!(a, b);
        assert!(a.starts_with("abc_0_"));
        assert!(a.ends_with(".gif"));
        assert_eq!(a.len(), "abc_0_".len() + 8 + ".gif".len());
    }

    #[test]
    fn zero_count_request_is_rejected() {
        let pipeline = HighlightPipeline::new(HighlightConfig::default(), None).unwrap();
        let request = HighlightRequest::new("cats", vec![TranscriptSegment::new("cats", 0.0, 1.0)])
            .with_count(0);
        assert!(matches!(
            pipeline.select(&request),
            Err(GifcutError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn empty_transcript_selects_nothing() {
        let pipeline = HighlightPipeline::new(HighlightConfig::default(), None).unwrap();
        let request = HighlightRequest::new("cats", vec![]);
        assert!(matches!(
            pipeline.select(&request),
            Err(GifcutError::NoRelevantSegments)
        ));
    }
}
