use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{fs, process::Command};
use tracing::{debug, info, warn};

use crate::{
    error::{GifcutError, Result},
    types::{TranscriptSegment, WhisperTranscript},
};

/// Something that can produce the timed captions for a video.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    fn name(&self) -> &str;

    /// Captions ordered by `start`, or `TranscriptUnavailable`.
    async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptSegment>>;
}

/// Drop records that can't be clipped and order the rest by `start`.
pub fn normalize(segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
    let before = segments.len();
    let mut segments: Vec<TranscriptSegment> = segments
        .into_iter()
        .filter(|s| s.start.is_finite() && s.start >= 0.0)
        .filter(|s| s.duration.is_finite() && s.duration > 0.0)
        .collect();
    if segments.len() < before {
        warn!(dropped = before - segments.len(), "dropped malformed transcript records");
    }
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    segments
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptDocument {
    Records(Vec<TranscriptSegment>),
    Whisper(WhisperTranscript),
}

/// Accepts either `[{text, start, duration}]` or a whisper-style
/// `{segments: [{start, end, text}]}` document.
pub fn parse_transcript_json(json: &str) -> Result<Vec<TranscriptSegment>> {
    let segments = match serde_json::from_str::<TranscriptDocument>(json)? {
        TranscriptDocument::Records(records) => records,
        TranscriptDocument::Whisper(doc) => doc.segments.into_iter().map(Into::into).collect(),
    };
    Ok(normalize(segments))
}

/// Load a transcript from a cached file
pub async fn load_transcript(path: &Path) -> Result<Vec<TranscriptSegment>> {
    let json_content = fs::read_to_string(path).await?;
    parse_transcript_json(&json_content)
}

pub async fn save_transcript(segments: &[TranscriptSegment], path: &Path) -> Result<()> {
    let pretty_json = serde_json::to_string_pretty(segments)?;
    fs::write(path, &pretty_json).await?;
    Ok(())
}

/// A transcript already on disk. The video id is ignored.
#[derive(Debug, Clone)]
pub struct TranscriptFile {
    path: PathBuf,
}

impl TranscriptFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TranscriptSource for TranscriptFile {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self, _video_id: &str) -> Result<Vec<TranscriptSegment>> {
        load_transcript(&self.path)
            .await
            .map_err(|e| GifcutError::TranscriptUnavailable {
                reason: format!("{}: {e}", self.path.display()),
            })
    }
}

#[derive(Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parse YouTube's json3 caption format.
pub fn parse_json3(json: &str) -> Result<Vec<TranscriptSegment>> {
    let doc: Json3 = serde_json::from_str(json)?;
    let segments = doc
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!text.is_empty()).then(|| {
                TranscriptSegment::new(
                    text,
                    event.t_start_ms as f64 / 1000.0,
                    event.d_duration_ms as f64 / 1000.0,
                )
            })
        })
        .collect();
    Ok(normalize(segments))
}

/// Captions published alongside the video, fetched with yt-dlp.
#[derive(Debug, Clone)]
pub struct PlatformCaptions {
    work_dir: PathBuf,
    lang: String,
}

impl PlatformCaptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            lang: "en".to_string(),
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    fn find_caption_file(&self) -> Option<PathBuf> {
        let entries = std::fs::read_dir(&self.work_dir).ok()?;
        entries.flatten().map(|e| e.path()).find(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().to_string());
            name.is_some_and(|n| n.starts_with("captions.") && n.ends_with(".json3"))
        })
    }
}

pub fn video_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

#[async_trait]
impl TranscriptSource for PlatformCaptions {
    fn name(&self) -> &str {
        "platform captions"
    }

    async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptSegment>> {
        fs::create_dir_all(&self.work_dir).await?;
        let output_template = self.work_dir.join("captions.%(ext)s");

        let output = Command::new("yt-dlp")
            .arg(video_url(video_id))
            .arg("--skip-download")
            .arg("--write-subs")
            .arg("--write-auto-subs")
            .arg("--sub-langs")
            .arg(&self.lang)
            .arg("--sub-format")
            .arg("json3")
            .arg("-o")
            .arg(&output_template)
            .output()
            .await?;

        if !output.status.success() {
            return Err(GifcutError::TranscriptUnavailable {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let Some(path) = self.find_caption_file() else {
            return Err(GifcutError::TranscriptUnavailable {
                reason: format!("no {} captions published", self.lang),
            });
        };
        debug!(path = %path.display(), "parsing platform captions");
        let json = fs::read_to_string(&path).await?;
        parse_json3(&json)
    }
}

/// Tries each source in order; the first non-empty transcript wins.
#[derive(Default)]
pub struct FallbackTranscripts {
    sources: Vec<Box<dyn TranscriptSource>>,
}

impl FallbackTranscripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl TranscriptSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn push(&mut self, source: Box<dyn TranscriptSource>) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl TranscriptSource for FallbackTranscripts {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptSegment>> {
        let mut failures = Vec::new();
        for source in &self.sources {
            match source.fetch(video_id).await {
                Ok(segments) if !segments.is_empty() => {
                    info!(source = source.name(), segments = segments.len(), "transcript fetched");
                    return Ok(segments);
                }
                Ok(_) => {
                    info!(source = source.name(), "transcript source returned nothing");
                    failures.push(format!("{}: empty", source.name()));
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "transcript source failed");
                    failures.push(format!("{}: {e}", source.name()));
                }
            }
        }
        Err(GifcutError::TranscriptUnavailable {
            reason: if failures.is_empty() {
                "no transcript sources configured".to_string()
            } else {
                failures.join("; ")
            },
        })
    }
}

/// Reuse the cached transcript at `cache_path` unless `force`, otherwise fetch
/// from `source` and cache the result.
pub async fn load_or_fetch(
    source: &dyn TranscriptSource,
    video_id: &str,
    cache_path: &Path,
    force: bool,
) -> Result<(Vec<TranscriptSegment>, bool)> {
    if !force && cache_path.exists() {
        match load_transcript(cache_path).await {
            Ok(segments) if !segments.is_empty() => return Ok((segments, true)),
            Ok(_) => debug!("cached transcript is empty, refetching"),
            Err(e) => warn!(error = %e, "ignoring unreadable cached transcript"),
        }
    }

    let segments = source.fetch(video_id).await?;
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    save_transcript(&segments, cache_path).await?;
    Ok((segments, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_captions_default_to_english() {
        let captions = PlatformCaptions::new("/tmp/gifcut-captions");
        assert_eq!(captions.lang(), "en");
        assert_eq!(captions.with_lang("de").lang(), "de");
    }

    struct Fixed(Vec<TranscriptSegment>);

    #[async_trait]
    impl TranscriptSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self, _video_id: &str) -> Result<Vec<TranscriptSegment>> {
            Ok(self.0.clone())
        }
    }

    struct Unavailable;

    #[async_trait]
    impl TranscriptSource for Unavailable {
        fn name(&self) -> &str {
            "unavailable"
        }

        async fn fetch(&self, _video_id: &str) -> Result<Vec<TranscriptSegment>> {
            Err(GifcutError::TranscriptUnavailable {
                reason: "captions disabled".into(),
            })
        }
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gifcut-transcript-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parses_plain_records_and_sorts() {
        let json = r#"[
            {"text": "outro", "start": 50, "duration": 2},
            {"text": "intro", "start": 0, "duration": 3},
            {"text": "broken", "start": 5, "duration": 0}
        ]"#;
        let segments = parse_transcript_json(json).unwrap();
        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["intro", "outro"]);
    }

    #[test]
    fn parses_whisper_documents() {
        let json = r#"{"text": "hi there", "language": "en",
            "segments": [{"start": 1.5, "end": 4.0, "text": "hi there"}]}"#;
        let segments = parse_transcript_json(json).unwrap();
        assert_eq!(segments, vec![TranscriptSegment::new("hi there", 1.5, 2.5)]);
    }

    #[test]
    fn parses_json3_captions() {
        let json = r#"{"events": [
            {"tStartMs": 0, "dDurationMs": 1000},
            {"tStartMs": 1200, "dDurationMs": 2500, "segs": [{"utf8": "the main"}, {"utf8": " topic\n"}]},
            {"tStartMs": 4000, "dDurationMs": 100, "segs": [{"utf8": "\n"}]}
        ]}"#;
        let segments = parse_json3(json).unwrap();
        assert_eq!(segments, vec![TranscriptSegment::new("the main topic", 1.2, 2.5)]);
    }

    #[tokio::test]
    async fn fallback_uses_next_source_after_failure() {
        let chain = FallbackTranscripts::new()
            .with(Unavailable)
            .with(Fixed(vec![]))
            .with(Fixed(vec![TranscriptSegment::new("cats", 0.0, 1.0)]));
        let segments = chain.fetch("abc").await.unwrap();
        assert_eq!(segments.len(), 1);
    }

    #[tokio::test]
    async fn fallback_reports_unavailable_when_all_fail() {
        let chain = FallbackTranscripts::new().with(Unavailable).with(Fixed(vec![]));
        let err = chain.fetch("abc").await.unwrap_err();
        assert!(matches!(err, GifcutError::TranscriptUnavailable { .. }));
        assert_eq!(err.user_message(), "Could not get or generate a transcript for this video.");
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let err = TranscriptFile::new("/no/such/transcript.json")
            .fetch("")
            .await
            .unwrap_err();
        assert!(matches!(err, GifcutError::TranscriptUnavailable { .. }));
    }

    #[tokio::test]
    async fn load_or_fetch_caches_then_reuses() {
        let dir = temp_dir();
        let path = dir.join("transcript.json");
        let source = Fixed(vec![TranscriptSegment::new("cats", 0.0, 1.0)]);

        let (first, cached) = load_or_fetch(&source, "abc", &path, false).await.unwrap();
        assert!(!cached);
        assert!(path.exists());

        let (second, cached) = load_or_fetch(&Unavailable, "abc", &path, false).await.unwrap();
        assert!(cached);
        assert_eq!(first, second);

        assert!(load_or_fetch(&Unavailable, "abc", &path, true).await.is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
