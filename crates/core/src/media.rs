//! Media collaborator: probing a video and pulling raw frames out of a clip.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use image::RgbImage;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::{
    error::{GifcutError, Result},
    sampler::ClipWindow,
};

/// Byte order of the three colour channels in a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    /// What ffmpeg and most codecs hand out.
    Bgr,
}

/// A packed 24-bit frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, order: ChannelOrder, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize * 3).then_some(Self {
            width,
            height,
            order,
            data,
        })
    }

    /// Frame filled with one colour, given as RGB regardless of `order`.
    pub fn solid(width: u32, height: u32, order: ChannelOrder, rgb: [u8; 3]) -> Self {
        let px = match order {
            ChannelOrder::Rgb => rgb,
            ChannelOrder::Bgr => [rgb[2], rgb[1], rgb[0]],
        };
        let data = px
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            order,
            data,
        }
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        let mut data = self.data.clone();
        if self.order == ChannelOrder::Bgr {
            swap_red_blue(&mut data);
        }
        RgbImage::from_raw(self.width, self.height, data)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// Pack an RGB image back into a frame with the requested channel order.
    pub fn from_rgb_image(image: RgbImage, order: ChannelOrder) -> Self {
        let (width, height) = image.dimensions();
        let mut data = image.into_raw();
        if order == ChannelOrder::Bgr {
            swap_red_blue(&mut data);
        }
        Self {
            width,
            height,
            order,
            data,
        }
    }

    /// Pixel at `(x, y)` as RGB.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        let px = [self.data[i], self.data[i + 1], self.data[i + 2]];
        match self.order {
            ChannelOrder::Rgb => px,
            ChannelOrder::Bgr => [px[2], px[1], px[0]],
        }
    }
}

fn swap_red_blue(data: &mut [u8]) {
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    /// Seconds; 0 when the container doesn't say.
    pub duration: f64,
}

/// A seekable video. Every `sample_frames` call must be independent of any
/// other in flight so segment jobs can run side by side.
#[async_trait]
pub trait MediaSource: Send + Sync {
    fn info(&self) -> MediaInfo;

    /// Frames across `window` at `fps`, in presentation order.
    async fn sample_frames(&self, window: &ClipWindow, fps: u32) -> Result<Vec<Frame>>;
}

/// `MediaSource` backed by the ffmpeg/ffprobe binaries. One ffmpeg process
/// per sampled clip.
#[derive(Debug, Clone)]
pub struct FfmpegMedia {
    path: PathBuf,
    info: MediaInfo,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Display rotation in degrees, from the display matrix or the legacy tag.
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse().ok())
            })
            .unwrap_or(0.0)
    }
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl FfmpegMedia {
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("media file not found: {}", path.display()),
            )
            .into());
        }
        let info = probe(path).await?;
        debug!(path = %path.display(), ?info, "opened media");
        Ok(Self {
            path: path.to_path_buf(),
            info,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read width, height and duration with ffprobe
pub async fn probe(path: &Path) -> Result<MediaInfo> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height:stream_tags=rotate:stream_side_data=rotation:format=duration")
        .arg("-of")
        .arg("json")
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(GifcutError::FrameExtractionFailed {
            start: 0.0,
            reason: format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    parse_probe(&output.stdout)
}

fn parse_probe(stdout: &[u8]) -> Result<MediaInfo> {
    let parsed: ProbeOutput = serde_json::from_slice(stdout)?;
    let stream = parsed
        .streams
        .into_iter()
        .find(|s| s.width.is_some() && s.height.is_some())
        .ok_or_else(|| GifcutError::FrameExtractionFailed {
            start: 0.0,
            reason: "no video stream".into(),
        })?;

    let duration = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    // ffmpeg autorotates while decoding, so frames come out in display orientation
    let (mut width, mut height) = (stream.width.unwrap_or_default(), stream.height.unwrap_or_default());
    if (stream.rotation().round() as i64).rem_euclid(180) == 90 {
        std::mem::swap(&mut width, &mut height);
    }

    Ok(MediaInfo {
        width,
        height,
        duration,
    })
}

#[async_trait]
impl MediaSource for FfmpegMedia {
    fn info(&self) -> MediaInfo {
        self.info
    }

    async fn sample_frames(&self, window: &ClipWindow, fps: u32) -> Result<Vec<Frame>> {
        let MediaInfo { width, height, .. } = self.info;
        let frame_size = width as usize * height as usize * 3;
        if frame_size == 0 {
            return Err(GifcutError::FrameExtractionFailed {
                start: window.start,
                reason: "media has no frame size".into(),
            });
        }

        let output = Command::new("ffmpeg")
            .arg("-v")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.3}", window.start))
            .arg("-i")
            .arg(&self.path)
            .arg("-t")
            .arg(format!("{:.3}", window.duration))
            .arg("-vf")
            .arg(format!("fps={fps}"))
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("bgr24")
            .arg("pipe:1")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| GifcutError::FrameExtractionFailed {
                start: window.start,
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(GifcutError::FrameExtractionFailed {
                start: window.start,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let frames: Vec<Frame> = output
            .stdout
            .chunks_exact(frame_size)
            .map(|chunk| Frame {
                width,
                height,
                order: ChannelOrder::Bgr,
                data: chunk.to_vec(),
            })
            .collect();

        debug!(start = window.start, frames = frames.len(), "ffmpeg sampled clip");
        Ok(frames)
    }
}
