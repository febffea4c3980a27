use crate::types::{Highlight, TranscriptSegment};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

pub fn format_segment(segment: &TranscriptSegment) -> String {
    format!("[{}] {}", format_timestamp(segment.start), segment.text.trim())
}

/// Human-readable listing of rendered highlights, one per line
pub fn format_highlights_readable(highlights: &[Highlight]) -> String {
    let mut output = String::new();
    for highlight in highlights {
        output.push_str(&format!(
            "{}. {} → {} ({} frames)\n",
            highlight.index + 1,
            format_segment(&highlight.segment),
            highlight.artifact.path.display(),
            highlight.artifact.frame_count
        ));
    }
    output
}
