use std::{
    hash::{DefaultHasher, Hash, Hasher},
    path::{Path, PathBuf},
};

pub const CACHE_DIR_ENV: &str = "GIFCUT_CACHE_DIR";

/// Get the cache directory for a given source URL
pub fn get_cache_dir(url: &str) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    let url_hash = hasher.finish();

    get_root_cache_dir().join(url_hash.to_string())
}

pub fn get_root_cache_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("gifcut")
}

pub fn get_model_dir(root_cache_dir: &Path) -> PathBuf {
    root_cache_dir.join("models")
}

/// Find a downloaded video in the cache directory
pub fn find_video_in_cache(cache_dir: &Path) -> Option<PathBuf> {
    let Ok(entries) = std::fs::read_dir(cache_dir) else {
        return None;
    };

    entries
        .flatten()
        .map(|entry| entry.path())
        .find(|path| is_video_file(path))
}

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| matches!(ext.as_str(), "mp4" | "webm" | "mkv" | "mov" | "avi"))
}

pub fn get_audio_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("audio.wav")
}

pub fn get_transcript_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("transcript.json")
}

/// Where the video id resolved for a URL is remembered
pub fn get_video_id_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("video_id")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_url_maps_to_same_dir() {
        let a = get_cache_dir("https://youtu.be/abc");
        let b = get_cache_dir("https://youtu.be/abc");
        let c = get_cache_dir("https://youtu.be/xyz");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn recognizes_video_extensions() {
        assert!(is_video_file(Path::new("video.MP4")));
        assert!(is_video_file(Path::new("/tmp/x/video.webm")));
        assert!(!is_video_file(Path::new("transcript.json")));
        assert!(!is_video_file(Path::new("video")));
    }

    #[test]
    fn finds_cached_video() {
        let dir = std::env::temp_dir().join(format!("gifcut-cache-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(find_video_in_cache(&dir).is_none());

        std::fs::write(get_transcript_path(&dir), "[]").unwrap();
        std::fs::write(dir.join("video.mp4"), b"").unwrap();
        assert_eq!(find_video_in_cache(&dir), Some(dir.join("video.mp4")));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
