use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use gif::{Encoder, Repeat};
use tracing::{debug, warn};

use crate::{
    error::{GifcutError, Result},
    media::Frame,
    types::GifArtifact,
};

pub const FRAME_DURATION_MS: u32 = 100;

/// Quantizer speed handed to the `gif` crate (1 best, 30 fastest).
const QUANTIZE_SPEED: i32 = 10;

/// Writes frames out as an infinitely looping GIF.
#[derive(Debug, Clone, Copy)]
pub struct GifEncoder {
    frame_duration_ms: u32,
}

impl Default for GifEncoder {
    fn default() -> Self {
        Self::new(FRAME_DURATION_MS)
    }
}

impl GifEncoder {
    pub fn new(frame_duration_ms: u32) -> Self {
        Self { frame_duration_ms }
    }

    /// GIF delays are in hundredths of a second.
    fn delay(&self) -> u16 {
        (self.frame_duration_ms / 10).clamp(1, u16::MAX as u32) as u16
    }

    /// Encode `frames` into `path`. On error nothing is left at `path`.
    pub fn encode(&self, frames: &[Frame], path: &Path) -> Result<GifArtifact> {
        let Some(first) = frames.first() else {
            return Err(GifcutError::EncodingFailed {
                reason: "no frames to encode".into(),
            });
        };
        let (width, height) = gif_dimensions(first)?;
        for (i, frame) in frames.iter().enumerate() {
            if gif_dimensions(frame)? != (width, height) {
                return Err(GifcutError::EncodingFailed {
                    reason: format!(
                        "frame {i} is {}x{}, expected {width}x{height}",
                        frame.width, frame.height
                    ),
                });
            }
        }

        if let Err(e) = self.write(frames, width, height, path) {
            if let Err(rm) = std::fs::remove_file(path) {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %rm, "failed to remove partial gif");
                }
            }
            return Err(e);
        }

        debug!(path = %path.display(), frames = frames.len(), "encoded gif");
        Ok(GifArtifact {
            path: path.to_path_buf(),
            frame_count: frames.len(),
            frame_duration_ms: self.frame_duration_ms,
            looping: true,
        })
    }

    fn write(&self, frames: &[Frame], width: u16, height: u16, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| GifcutError::EncodingFailed {
            reason: format!("failed to create {}: {e}", path.display()),
        })?;
        let mut encoder = Encoder::new(BufWriter::new(file), width, height, &[]).map_err(|e| {
            GifcutError::EncodingFailed {
                reason: format!("failed to create GIF encoder: {e}"),
            }
        })?;
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| GifcutError::EncodingFailed {
                reason: format!("failed to set GIF repeat: {e}"),
            })?;

        for (i, frame) in frames.iter().enumerate() {
            let rgb = frame.to_rgb_image().into_raw();
            let mut gif_frame = gif::Frame::from_rgb_speed(width, height, &rgb, QUANTIZE_SPEED);
            gif_frame.delay = self.delay();
            encoder
                .write_frame(&gif_frame)
                .map_err(|e| GifcutError::EncodingFailed {
                    reason: format!("failed to write GIF frame {i}: {e}"),
                })?;
        }

        encoder
            .into_inner()
            .and_then(|mut w| w.flush())
            .map_err(|e| GifcutError::EncodingFailed {
                reason: format!("failed to finish {}: {e}", path.display()),
            })
    }
}

fn gif_dimensions(frame: &Frame) -> Result<(u16, u16)> {
    let too_large = || GifcutError::EncodingFailed {
        reason: format!("frame {}x{} exceeds GIF limits", frame.width, frame.height),
    };
    let width = u16::try_from(frame.width).map_err(|_| too_large())?;
    let height = u16::try_from(frame.height).map_err(|_| too_large())?;
    if width == 0 || height == 0 {
        return Err(GifcutError::EncodingFailed {
            reason: "frame has zero size".into(),
        });
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ChannelOrder;
    use gif::DecodeOptions;
    use std::path::PathBuf;

    fn temp_gif(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gifcut-gif-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn decode(path: &Path) -> (usize, Vec<u16>, u16, u16) {
        let mut decoder = DecodeOptions::new()
            .read_info(File::open(path).unwrap())
            .unwrap();
        let (w, h) = (decoder.width(), decoder.height());
        let mut delays = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            delays.push(frame.delay);
        }
        (delays.len(), delays, w, h)
    }

    #[test]
    fn empty_input_is_rejected() {
        let path = temp_gif("empty.gif");
        let err = GifEncoder::default().encode(&[], &path).unwrap_err();
        assert!(matches!(err, GifcutError::EncodingFailed { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn single_frame_makes_a_looping_gif() {
        let path = temp_gif("one.gif");
        let frames = vec![Frame::solid(16, 12, ChannelOrder::Bgr, [255, 0, 0])];
        let artifact = GifEncoder::default().encode(&frames, &path).unwrap();

        assert_eq!(artifact.frame_count, 1);
        assert_eq!(artifact.frame_duration_ms, 100);
        assert!(artifact.looping);
        let (count, delays, w, h) = decode(&path);
        assert_eq!((count, w, h), (1, 16, 12));
        assert_eq!(delays, vec![10]);
    }

    #[test]
    fn frames_keep_their_order() {
        let path = temp_gif("order.gif");
        let colours = [[255, 0, 0], [0, 255, 0], [0, 0, 255]];
        let frames: Vec<Frame> = colours
            .iter()
            .map(|c| Frame::solid(8, 8, ChannelOrder::Rgb, *c))
            .collect();
        GifEncoder::default().encode(&frames, &path).unwrap();

        let mut options = DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(File::open(&path).unwrap()).unwrap();
        let mut seen = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            seen.push([frame.buffer[0], frame.buffer[1], frame.buffer[2]]);
        }
        let dominant = |px: [u8; 3]| (0..3).max_by_key(|&c| px[c]).unwrap();
        assert_eq!(seen.len(), 3);
        for (got, want) in seen.iter().zip(&colours) {
            assert_eq!(dominant(*got), dominant(*want));
        }
    }

    #[test]
    fn mismatched_frame_sizes_fail() {
        let path = temp_gif("mismatch.gif");
        let frames = vec![
            Frame::solid(8, 8, ChannelOrder::Rgb, [0, 0, 0]),
            Frame::solid(4, 4, ChannelOrder::Rgb, [0, 0, 0]),
        ];
        let err = GifEncoder::default().encode(&frames, &path).unwrap_err();
        assert!(matches!(err, GifcutError::EncodingFailed { .. }));
        assert!(!path.exists());
    }
}
