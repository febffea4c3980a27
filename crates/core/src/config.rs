use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{GifcutError, Result},
    sampler::{MAX_CLIP_SECS, SAMPLE_FPS},
    scoring::{DEFAULT_CANDIDATE_POOL, ScoringStrategy},
};

pub const DEFAULT_CONFIG_FILE: &str = "gifcut.json";

/// Font names tried in order: bold faces first, then regular ones.
pub const DEFAULT_FONT_CANDIDATES: &[&str] = &[
    "arialbd.ttf",
    "Arial Bold.ttf",
    "DejaVuSans-Bold.ttf",
    "LiberationSans-Bold.ttf",
    "arial.ttf",
    "Arial.ttf",
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    pub font_size: f32,
    /// Characters per line are `frame_width / wrap_divisor`.
    pub wrap_divisor: u32,
    pub bottom_margin: u32,
    pub outline_radius: u32,
    pub font_candidates: Vec<String>,
    /// Searched before the platform font directories.
    pub font_dirs: Vec<PathBuf>,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 48.0,
            wrap_divisor: 22,
            bottom_margin: 40,
            outline_radius: 3,
            font_candidates: DEFAULT_FONT_CANDIDATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            font_dirs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub count: usize,
    pub strategy: ScoringStrategy,
    pub candidate_pool: usize,
    pub max_clip_secs: f64,
    pub fps: u32,
    pub max_parallel_jobs: usize,
    pub caption: CaptionStyle,
    pub output_dir: PathBuf,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            count: 3,
            strategy: ScoringStrategy::Tiered,
            candidate_pool: DEFAULT_CANDIDATE_POOL,
            max_clip_secs: MAX_CLIP_SECS,
            fps: SAMPLE_FPS,
            max_parallel_jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            caption: CaptionStyle::default(),
            output_dir: PathBuf::from("static/gifs"),
        }
    }
}

impl HighlightConfig {
    /// Read a JSON config from `path`, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded highlight config");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!("using default highlight config");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(GifcutError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.count == 0 {
            return invalid("count must be at least 1");
        }
        if self.fps == 0 || self.fps > SAMPLE_FPS {
            return invalid("fps must be between 1 and 10");
        }
        if !(self.max_clip_secs > 0.0 && self.max_clip_secs <= MAX_CLIP_SECS) {
            return invalid("max_clip_secs must be in (0, 5]");
        }
        if self.candidate_pool == 0 {
            return invalid("candidate_pool must be at least 1");
        }
        if self.caption.wrap_divisor == 0 {
            return invalid("caption.wrap_divisor must be at least 1");
        }
        if !(self.caption.font_size > 0.0) {
            return invalid("caption.font_size must be positive");
        }
        Ok(())
    }

    /// Per-frame display time matching the sample rate.
    pub fn frame_duration_ms(&self) -> u32 {
        (1000 / self.fps).max(1)
    }
}
