use tracing::debug;

use crate::{
    config::HighlightConfig,
    error::{GifcutError, Result},
    media::{Frame, MediaSource},
    types::TranscriptSegment,
};

pub const MAX_CLIP_SECS: f64 = 5.0;
pub const SAMPLE_FPS: u32 = 10;

/// Absorbs float error so `0.3 * 10` still counts as 3 frames.
const FRAME_EPSILON: f64 = 1e-9;

/// The part of the media one GIF covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub start: f64,
    pub duration: f64,
}

impl ClipWindow {
    /// `[start, start + min(duration, max_clip_secs)]`
    pub fn for_segment(segment: &TranscriptSegment, max_clip_secs: f64) -> Self {
        Self {
            start: segment.start.max(0.0),
            duration: segment.duration.min(max_clip_secs),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn is_empty(&self) -> bool {
        !(self.duration > 0.0) || !self.duration.is_finite()
    }

    /// `floor(duration * fps)`, but at least one frame for any non-empty window.
    pub fn frame_count(&self, fps: u32) -> usize {
        if self.is_empty() || fps == 0 {
            return 0;
        }
        let n = (self.duration * fps as f64 + FRAME_EPSILON).floor() as usize;
        n.max(1)
    }

    /// Offsets from `start` at which frames are taken.
    pub fn frame_times(&self, fps: u32) -> Vec<f64> {
        (0..self.frame_count(fps))
            .map(|i| i as f64 / fps as f64)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SampledClip {
    pub window: ClipWindow,
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameSampler {
    fps: u32,
    max_clip_secs: f64,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(SAMPLE_FPS, MAX_CLIP_SECS)
    }
}

impl FrameSampler {
    /// `fps` and `max_clip_secs` are clamped to 10 and 5s, so no clip exceeds 50 frames.
    pub fn new(fps: u32, max_clip_secs: f64) -> Self {
        Self {
            fps: fps.clamp(1, SAMPLE_FPS),
            max_clip_secs: max_clip_secs.min(MAX_CLIP_SECS),
        }
    }

    pub fn from_config(config: &HighlightConfig) -> Self {
        Self::new(config.fps, config.max_clip_secs)
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Clip window for `segment`, also cut short at the end of the media when
    /// its length is known.
    pub fn window(&self, segment: &TranscriptSegment, media_duration: f64) -> ClipWindow {
        let mut window = ClipWindow::for_segment(segment, self.max_clip_secs);
        if media_duration > 0.0 {
            window.duration = window.duration.min(media_duration - window.start);
        }
        window
    }

    pub async fn sample(
        &self,
        media: &dyn MediaSource,
        segment: &TranscriptSegment,
    ) -> Result<SampledClip> {
        let window = self.window(segment, media.info().duration);
        let planned = window.frame_count(self.fps);
        if planned == 0 {
            return Err(GifcutError::FrameExtractionFailed {
                start: segment.start,
                reason: format!("empty clip window ({:.3}s)", window.duration),
            });
        }

        let mut frames = media.sample_frames(&window, self.fps).await?;
        frames.truncate(planned);
        if frames.is_empty() {
            return Err(GifcutError::FrameExtractionFailed {
                start: segment.start,
                reason: "no frames decoded".into(),
            });
        }

        debug!(
            start = window.start,
            duration = window.duration,
            planned,
            sampled = frames.len(),
            "sampled clip"
        );
        Ok(SampledClip { window, frames })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ChannelOrder, MediaInfo};
    use async_trait::async_trait;

    /// Hands out one grey frame per requested timestamp, plus one extra the way
    /// ffmpeg's fps filter sometimes does at the boundary.
    struct GreyMedia {
        duration: f64,
    }

    #[async_trait]
    impl MediaSource for GreyMedia {
        fn info(&self) -> MediaInfo {
            MediaInfo {
                width: 8,
                height: 6,
                duration: self.duration,
            }
        }

        async fn sample_frames(&self, window: &ClipWindow, fps: u32) -> Result<Vec<Frame>> {
            Ok((0..=window.frame_count(fps))
                .map(|_| Frame::solid(8, 6, ChannelOrder::Bgr, [90, 90, 90]))
                .collect())
        }
    }

    struct BrokenMedia;

    #[async_trait]
    impl MediaSource for BrokenMedia {
        fn info(&self) -> MediaInfo {
            MediaInfo {
                width: 8,
                height: 6,
                duration: 0.0,
            }
        }

        async fn sample_frames(&self, window: &ClipWindow, _fps: u32) -> Result<Vec<Frame>> {
            Err(GifcutError::FrameExtractionFailed {
                start: window.start,
                reason: "decoder exploded".into(),
            })
        }
    }

    #[test]
    fn long_segments_are_capped_at_five_seconds() {
        let window = ClipWindow::for_segment(&TranscriptSegment::new("x", 12.0, 7.3), MAX_CLIP_SECS);
        assert_eq!(window.duration, 5.0);
        assert_eq!(window.end(), 17.0);
        assert_eq!(window.frame_count(SAMPLE_FPS), 50);
    }

    #[test]
    fn frame_count_floors() {
        let window = ClipWindow { start: 0.0, duration: 4.0 };
        assert_eq!(window.frame_count(10), 40);
        let window = ClipWindow { start: 0.0, duration: 2.37 };
        assert_eq!(window.frame_count(10), 23);
        let window = ClipWindow { start: 0.0, duration: 0.3 };
        assert_eq!(window.frame_count(10), 3);
    }

    #[test]
    fn sub_interval_clip_still_gets_one_frame() {
        let window = ClipWindow { start: 3.0, duration: 0.04 };
        assert_eq!(window.frame_count(10), 1);
        assert_eq!(window.frame_times(10), vec![0.0]);
    }

    #[test]
    fn empty_window_has_no_frames() {
        assert_eq!(ClipWindow { start: 0.0, duration: 0.0 }.frame_count(10), 0);
        assert_eq!(ClipWindow { start: 0.0, duration: -1.0 }.frame_count(10), 0);
        assert_eq!(ClipWindow { start: 0.0, duration: f64::NAN }.frame_count(10), 0);
    }

    #[test]
    fn frame_times_step_by_a_tenth() {
        let times = ClipWindow { start: 10.0, duration: 0.5 }.frame_times(10);
        assert_eq!(times, vec![0.0, 0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn window_is_cut_at_end_of_media() {
        let sampler = FrameSampler::default();
        let window = sampler.window(&TranscriptSegment::new("x", 58.0, 4.0), 60.0);
        assert_eq!(window.duration, 2.0);
        let window = sampler.window(&TranscriptSegment::new("x", 58.0, 4.0), 0.0);
        assert_eq!(window.duration, 4.0);
    }

    #[test]
    fn oversized_config_still_caps_the_clip() {
        let config = HighlightConfig {
            max_clip_secs: 30.0,
            fps: 100,
            ..Default::default()
        };
        let sampler = FrameSampler::from_config(&config);
        let window = sampler.window(&TranscriptSegment::new("x", 0.0, 7.3), 100.0);
        assert_eq!(window.duration, MAX_CLIP_SECS);
        assert_eq!(window.frame_count(sampler.fps()), 50);
    }

    #[tokio::test]
    async fn sample_truncates_to_planned_count() {
        let media = GreyMedia { duration: 100.0 };
        let clip = FrameSampler::default()
            .sample(&media, &TranscriptSegment::new("x", 10.0, 7.3))
            .await
            .unwrap();
        assert_eq!(clip.frames.len(), 50);
        assert_eq!(clip.window.duration, 5.0);
    }

    #[tokio::test]
    async fn segment_past_end_of_media_fails() {
        let media = GreyMedia { duration: 20.0 };
        let err = FrameSampler::default()
            .sample(&media, &TranscriptSegment::new("x", 30.0, 2.0))
            .await
            .unwrap_err();
        assert!(matches!(err, GifcutError::FrameExtractionFailed { .. }));
    }

    #[tokio::test]
    async fn decoder_errors_surface_as_extraction_failures() {
        let err = FrameSampler::default()
            .sample(&BrokenMedia, &TranscriptSegment::new("x", 1.0, 2.0))
            .await
            .unwrap_err();
        assert!(err.is_segment_local());
    }
}
