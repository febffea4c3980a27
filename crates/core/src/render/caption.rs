use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use font8x8::{BASIC_FONTS, UnicodeFonts};
use fontdue::{Font, FontSettings, LineMetrics, Metrics};
use image::RgbImage;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{config::CaptionStyle, media::Frame};

pub const FONT_DIR_ENV: &str = "GIFCUT_FONT_DIR";

const SYSTEM_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/Library/Fonts",
    "/System/Library/Fonts",
    "C:\\Windows\\Fonts",
];

const BITMAP_GLYPH: usize = 8;
const FALLBACK_GLYPH: char = '?';

/// Greedy word wrap at `width` characters. Lines only break at whitespace, so
/// a single word longer than `width` gets a line of its own.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if line_len == 0 {
            line.push_str(word);
            line_len = word_len;
        } else if line_len + 1 + word_len <= width {
            line.push(' ');
            line.push_str(word);
            line_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
            line_len = word_len;
        }
    }
    if line_len > 0 {
        lines.push(line);
    }
    lines
}

/// Characters per caption line for a frame `frame_width` pixels wide.
pub fn wrap_width(frame_width: u32, wrap_divisor: u32) -> usize {
    (frame_width / wrap_divisor.max(1)).max(1) as usize
}

pub enum CaptionFont {
    TrueType {
        font: Font,
        size: f32,
        source: PathBuf,
    },
    /// Built-in 8x8 bitmap glyphs, scaled up by an integer factor.
    Bitmap { scale: u32 },
}

impl CaptionFont {
    pub fn bitmap(font_size: f32) -> Self {
        CaptionFont::Bitmap {
            scale: ((font_size / 12.0) as u32).max(1),
        }
    }

    /// Font path for TrueType fonts, `None` for the bitmap fallback.
    pub fn source(&self) -> Option<&Path> {
        match self {
            CaptionFont::TrueType { source, .. } => Some(source.as_path()),
            CaptionFont::Bitmap { .. } => None,
        }
    }

    pub fn is_bitmap(&self) -> bool {
        matches!(self, CaptionFont::Bitmap { .. })
    }

    fn line_height(&self) -> u32 {
        match self {
            CaptionFont::TrueType { font, size, .. } => {
                Self::line_height_for(font.horizontal_line_metrics(*size), *size)
            }
            CaptionFont::Bitmap { scale } => (BITMAP_GLYPH as u32 + 2) * scale,
        }
    }

    fn line_height_for(metrics: Option<LineMetrics>, size: f32) -> u32 {
        metrics
            .map(|m| m.new_line_size)
            .unwrap_or(size * 1.2)
            .ceil()
            .max(1.0) as u32
    }
}

fn font_search_dirs(style: &CaptionStyle) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = style.font_dirs.clone();
    if let Some(dir) = std::env::var_os(FONT_DIR_ENV).filter(|d| !d.is_empty()) {
        dirs.push(PathBuf::from(dir));
    }
    if let Some(dir) = dirs::font_dir() {
        dirs.push(dir);
    }
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".fonts"));
    }
    dirs.extend(SYSTEM_FONT_DIRS.iter().map(PathBuf::from));
    dirs.retain(|d| d.is_dir());
    dirs
}

fn index_font_files(dirs: &[PathBuf]) -> Vec<PathBuf> {
    dirs.iter()
        .flat_map(|dir| {
            WalkDir::new(dir)
                .follow_links(true)
                .max_depth(6)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
        })
        .filter(|p| {
            p.extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| matches!(ext.as_str(), "ttf" | "otf" | "ttc"))
        })
        .collect()
}

fn load_font(path: &Path) -> anyhow::Result<Font> {
    let bytes = std::fs::read(path)?;
    Font::from_bytes(bytes, FontSettings::default())
        .map_err(|e| anyhow::anyhow!("failed to parse font {}: {e}", path.display()))
}

/// Walk `style.font_candidates` in order and load the first font that can be
/// found and parsed. Falls back to the built-in bitmap font, so this never
/// fails.
pub fn resolve_font(style: &CaptionStyle) -> CaptionFont {
    let dirs = font_search_dirs(style);
    let index = index_font_files(&dirs);

    for name in &style.font_candidates {
        let direct = Path::new(name);
        let path = if direct.is_absolute() && direct.is_file() {
            Some(direct.to_path_buf())
        } else {
            index
                .iter()
                .find(|p| {
                    p.file_name()
                        .is_some_and(|f| f.to_string_lossy().eq_ignore_ascii_case(name))
                })
                .cloned()
        };
        let Some(path) = path else {
            continue;
        };

        match load_font(&path) {
            Ok(font) => {
                info!(font = %path.display(), "caption font resolved");
                return CaptionFont::TrueType {
                    font,
                    size: style.font_size,
                    source: path,
                };
            }
            Err(e) => warn!(font = %path.display(), error = %e, "skipping unusable font"),
        }
    }

    warn!("no caption font found, using built-in bitmap font");
    CaptionFont::bitmap(style.font_size)
}

/// Caption pixels for one frame size, ready to be stamped on every frame of a
/// clip.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionOverlay {
    width: u32,
    height: u32,
    /// Inclusive-exclusive pixel bounds touched by either mask.
    bounds: (u32, u32, u32, u32),
    outline: Vec<u8>,
    fill: Vec<u8>,
}

impl CaptionOverlay {
    fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bounds: (0, 0, 0, 0),
            outline: Vec::new(),
            fill: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fill.is_empty()
    }

    /// Composite onto `frame`, returning a new frame in the same channel order.
    pub fn apply(&self, frame: &Frame) -> Frame {
        if self.is_empty() || frame.width != self.width || frame.height != self.height {
            return frame.clone();
        }

        let mut image = frame.to_rgb_image();
        self.paint(&mut image);
        Frame::from_rgb_image(image, frame.order)
    }

    fn paint(&self, image: &mut RgbImage) {
        let (x0, y0, x1, y1) = self.bounds;
        for y in y0..y1 {
            for x in x0..x1 {
                let i = (y * self.width + x) as usize;
                let (outline, fill) = (self.outline[i], self.fill[i]);
                if outline == 0 && fill == 0 {
                    continue;
                }
                let px = image.get_pixel_mut(x, y);
                blend(&mut px.0, [0, 0, 0], outline);
                blend(&mut px.0, [255, 255, 255], fill);
            }
        }
    }
}

fn blend(dst: &mut [u8; 3], src: [u8; 3], alpha: u8) {
    let alpha = u16::from(alpha);
    if alpha == 0 {
        return;
    }
    let inv_alpha = 255 - alpha;
    for c in 0..3 {
        dst[c] = ((u16::from(src[c]) * alpha + u16::from(dst[c]) * inv_alpha + 127) / 255) as u8;
    }
}

/// Coverage mask for the caption at offset (0, 0).
struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
    bounds: Option<(u32, u32, u32, u32)>,
}

impl Mask {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
            bounds: None,
        }
    }

    fn put(&mut self, x: i32, y: i32, coverage: u8) {
        if coverage == 0 || x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        let i = (y * self.width + x) as usize;
        self.data[i] = self.data[i].max(coverage);
        self.bounds = Some(match self.bounds {
            None => (x, y, x + 1, y + 1),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x + 1), y1.max(y + 1)),
        });
    }

    /// Max coverage over every `(dx, dy) != (0, 0)` with `|dx|, |dy| <= radius`.
    fn outline(&self, radius: u32) -> (Vec<u8>, (u32, u32, u32, u32)) {
        let Some((x0, y0, x1, y1)) = self.bounds else {
            return (Vec::new(), (0, 0, 0, 0));
        };
        let r = radius as i32;
        let bounds = (
            x0.saturating_sub(radius),
            y0.saturating_sub(radius),
            (x1 + radius).min(self.width),
            (y1 + radius).min(self.height),
        );

        let mut out = vec![0u8; self.data.len()];
        for y in bounds.1..bounds.3 {
            for x in bounds.0..bounds.2 {
                let mut best = 0u8;
                for dy in -r..=r {
                    for dx in -r..=r {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        // painting at +d covers pixel p from source p - d
                        let sx = x as i32 - dx;
                        let sy = y as i32 - dy;
                        if sx < 0 || sy < 0 || sx >= self.width as i32 || sy >= self.height as i32 {
                            continue;
                        }
                        best = best.max(self.data[(sy as u32 * self.width + sx as u32) as usize]);
                    }
                }
                out[(y * self.width + x) as usize] = best;
            }
        }
        (out, bounds)
    }
}

/// Draws a white, black-outlined caption near the bottom of a frame.
#[derive(Clone)]
pub struct CaptionRenderer {
    style: CaptionStyle,
    font: Arc<CaptionFont>,
}

impl CaptionRenderer {
    /// Resolve the font once; the renderer is then shared by every job.
    pub fn new(style: CaptionStyle) -> Self {
        let font = Arc::new(resolve_font(&style));
        Self { style, font }
    }

    pub fn with_font(style: CaptionStyle, font: CaptionFont) -> Self {
        Self {
            style,
            font: Arc::new(font),
        }
    }

    pub fn font(&self) -> &CaptionFont {
        &self.font
    }

    pub fn style(&self) -> &CaptionStyle {
        &self.style
    }

    /// Lay out `text` for a `width` x `height` frame.
    pub fn prepare(&self, text: &str, width: u32, height: u32) -> CaptionOverlay {
        let lines = wrap_text(text, wrap_width(width, self.style.wrap_divisor));
        if lines.is_empty() || width == 0 || height == 0 {
            return CaptionOverlay::empty(width, height);
        }

        // keep the outline plus a 2px border clear of both edges
        let avail = width.saturating_sub(2 * (self.style.outline_radius + 2)).max(1);
        let mut mask = Mask::new(width, height);
        match self.font.as_ref() {
            CaptionFont::TrueType { font, size, .. } => {
                let size = fit_truetype_size(font, *size, &lines, avail as f32);
                draw_truetype(&mut mask, font, size, &lines, &self.style)
            }
            CaptionFont::Bitmap { scale } => {
                let scale = fit_bitmap_scale(*scale, &lines, avail);
                draw_bitmap(&mut mask, scale, &lines, &self.style)
            }
        }

        if mask.bounds.is_none() {
            return CaptionOverlay::empty(width, height);
        }
        let (outline, bounds) = mask.outline(self.style.outline_radius);

        debug!(lines = lines.len(), ?bounds, "caption laid out");
        CaptionOverlay {
            width,
            height,
            bounds,
            outline,
            fill: mask.data,
        }
    }

    pub fn render(&self, frame: &Frame, text: &str) -> Frame {
        self.prepare(text, frame.width, frame.height).apply(frame)
    }

    /// Caption every frame of a clip. Layout happens once; compositing runs in
    /// parallel.
    pub fn render_all(&self, frames: &[Frame], text: &str) -> Vec<Frame> {
        let Some(first) = frames.first() else {
            return Vec::new();
        };
        let overlay = self.prepare(text, first.width, first.height);
        frames
            .par_iter()
            .map(|frame| {
                if frame.width == first.width && frame.height == first.height {
                    overlay.apply(frame)
                } else {
                    self.render(frame, text)
                }
            })
            .collect()
    }
}

/// Top-left of a text block `block_w` x `block_h`, centred horizontally and
/// `bottom_margin` above the bottom edge.
fn block_origin(width: u32, height: u32, block_w: u32, block_h: u32, style: &CaptionStyle) -> (i32, i32) {
    let x = (width as i32 - block_w as i32) / 2;
    let y = height as i32 - block_h as i32 - style.bottom_margin as i32;
    (x, y)
}

/// Horizontal ink extent `(left, right)` of `line` at `size`, relative to the
/// pen origin. `left` is never positive.
fn truetype_line_extent(font: &Font, size: f32, line: &str) -> (f32, f32) {
    let mut pen = 0.0f32;
    let (mut left, mut right) = (0.0f32, 0.0f32);
    for c in line.chars() {
        let m = font.metrics(c, size);
        left = left.min(pen + m.xmin as f32);
        right = right.max(pen + m.xmin as f32 + m.width as f32);
        pen += m.advance_width;
    }
    (left, right)
}

fn truetype_line_width(font: &Font, size: f32, line: &str) -> f32 {
    let (left, right) = truetype_line_extent(font, size, line);
    right - left
}

fn widest_truetype_line(font: &Font, size: f32, lines: &[String]) -> f32 {
    lines
        .iter()
        .map(|l| truetype_line_width(font, size, l))
        .fold(0.0, f32::max)
}

/// Largest size up to `size` whose widest line fits in `avail` pixels.
fn fit_truetype_size(font: &Font, size: f32, lines: &[String], avail: f32) -> f32 {
    let widest = widest_truetype_line(font, size, lines);
    if widest <= avail || widest <= 0.0 {
        return size;
    }
    // glyph metrics round per glyph, so proportional scaling can land a pixel over
    let mut fitted = size * avail / widest;
    while fitted > 1.0 && widest_truetype_line(font, fitted, lines) > avail {
        fitted *= 0.95;
    }
    debug!(size, fitted, "caption font shrunk to fit frame");
    fitted.max(1.0)
}

/// Largest integer scale up to `scale` at which the widest line fits.
fn fit_bitmap_scale(scale: u32, lines: &[String], avail: u32) -> u32 {
    let widest = lines.iter().map(|l| l.chars().count() as u32).max().unwrap_or(0);
    if widest == 0 {
        return scale;
    }
    scale.min(avail / (widest * BITMAP_GLYPH as u32)).max(1)
}

fn draw_truetype(mask: &mut Mask, font: &Font, size: f32, lines: &[String], style: &CaptionStyle) {
    let mut glyphs: HashMap<char, (Metrics, Vec<u8>)> = HashMap::new();
    for c in lines.iter().flat_map(|l| l.chars()) {
        glyphs.entry(c).or_insert_with(|| font.rasterize(c, size));
    }

    let line_metrics = font.horizontal_line_metrics(size);
    let ascent = line_metrics.map(|m| m.ascent).unwrap_or(size * 0.8);
    let line_height = CaptionFont::line_height_for(line_metrics, size);

    let line_widths: Vec<u32> = lines
        .iter()
        .map(|line| truetype_line_width(font, size, line).ceil() as u32)
        .collect();
    let block_w = line_widths.iter().copied().max().unwrap_or(0);
    let block_h = line_height * lines.len() as u32;
    let (x0, y0) = block_origin(mask.width, mask.height, block_w, block_h, style);

    for (row, line) in lines.iter().enumerate() {
        let baseline = y0 as f32 + row as f32 * line_height as f32 + ascent;
        let (left, _) = truetype_line_extent(font, size, line);
        let mut pen = x0 as f32 - left;
        for c in line.chars() {
            let Some((metrics, bitmap)) = glyphs.get(&c) else {
                continue;
            };
            let gx = (pen + metrics.xmin as f32).round() as i32;
            let gy = (baseline - metrics.height as f32 - metrics.ymin as f32).round() as i32;
            for (i, &coverage) in bitmap.iter().enumerate() {
                let (col, r) = (i % metrics.width.max(1), i / metrics.width.max(1));
                mask.put(gx + col as i32, gy + r as i32, coverage);
            }
            pen += metrics.advance_width;
        }
    }
}

fn draw_bitmap(mask: &mut Mask, scale: u32, lines: &[String], style: &CaptionStyle) {
    let glyph_px = BITMAP_GLYPH as u32 * scale;
    let line_height = CaptionFont::Bitmap { scale }.line_height();

    let block_w = lines
        .iter()
        .map(|l| l.chars().count() as u32 * glyph_px)
        .max()
        .unwrap_or(0);
    let block_h = line_height * lines.len() as u32;
    let (x0, y0) = block_origin(mask.width, mask.height, block_w, block_h, style);

    for (row, line) in lines.iter().enumerate() {
        let top = y0 + (row as u32 * line_height) as i32;
        for (col, c) in line.chars().enumerate() {
            let glyph = BASIC_FONTS
                .get(c)
                .or_else(|| BASIC_FONTS.get(FALLBACK_GLYPH))
                .unwrap_or([0; 8]);
            let left = x0 + (col as u32 * glyph_px) as i32;
            for (gy, bits) in glyph.iter().enumerate() {
                for gx in 0..BITMAP_GLYPH {
                    if bits & (1 << gx) == 0 {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            mask.put(
                                left + (gx as u32 * scale + sx) as i32,
                                top + (gy as u32 * scale + sy) as i32,
                                255,
                            );
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ChannelOrder;

    fn style(font_size: f32) -> CaptionStyle {
        CaptionStyle {
            font_size,
            font_candidates: vec!["definitely-not-installed.ttf".into()],
            ..Default::default()
        }
    }

    fn bitmap_renderer() -> CaptionRenderer {
        CaptionRenderer::with_font(style(24.0), CaptionFont::bitmap(24.0))
    }

    #[test]
    fn wraps_only_at_whitespace() {
        assert_eq!(
            wrap_text("the main topic is cats", 10),
            vec!["the main", "topic is", "cats"]
        );
        assert_eq!(wrap_text("extraordinarily long", 5), vec!["extraordinarily", "long"]);
        assert!(wrap_text("   ", 10).is_empty());
    }

    #[test]
    fn wrapped_lines_fit_unless_a_word_is_too_long() {
        let text = "a quick brown fox jumps over the lazy dog again and again";
        for width in 3..30 {
            for line in wrap_text(text, width) {
                assert!(line.chars().count() <= width || !line.contains(' '));
            }
        }
    }

    #[test]
    fn wrap_width_scales_with_frame() {
        assert_eq!(wrap_width(640, 22), 29);
        assert_eq!(wrap_width(640, 12), 53);
        assert_eq!(wrap_width(10, 22), 1);
    }

    #[test]
    fn missing_fonts_fall_back_to_bitmap() {
        let font = resolve_font(&style(48.0));
        assert!(font.is_bitmap());
        assert!(matches!(font, CaptionFont::Bitmap { scale: 4 }));
    }

    #[test]
    fn render_does_not_touch_input_and_is_repeatable() {
        let renderer = bitmap_renderer();
        let frame = Frame::solid(320, 200, ChannelOrder::Bgr, [90, 120, 150]);
        let original = frame.clone();

        let a = renderer.render(&frame, "hello cats");
        let b = renderer.render(&frame, "hello cats");

        assert_eq!(frame, original);
        assert_eq!(a, b);
        assert_ne!(a, frame);
        assert_eq!((a.width, a.height, a.order), (320, 200, ChannelOrder::Bgr));
    }

    #[test]
    fn caption_sits_above_bottom_margin_with_outline() {
        let renderer = bitmap_renderer();
        let frame = Frame::solid(320, 200, ChannelOrder::Rgb, [90, 120, 150]);
        let out = renderer.render(&frame, "hi");

        let radius = renderer.style().outline_radius;
        let margin = renderer.style().bottom_margin;
        let mut white = 0;
        let mut black = 0;
        for y in 0..200 {
            for x in 0..320 {
                let px = out.rgb_at(x, y);
                if px == [90, 120, 150] {
                    continue;
                }
                assert!(y < 200 - margin + radius, "painted below margin at y={y}");
                match px {
                    [255, 255, 255] => white += 1,
                    [0, 0, 0] => black += 1,
                    _ => {}
                }
            }
        }
        assert!(white > 0);
        assert!(black > 0);
    }

    #[test]
    fn caption_is_horizontally_centred() {
        let renderer = bitmap_renderer();
        let frame = Frame::solid(320, 200, ChannelOrder::Rgb, [0, 0, 255]);
        let out = renderer.render(&frame, "HH");

        let painted: Vec<u32> = (0..320)
            .filter(|&x| (0..200).any(|y| out.rgb_at(x, y) == [255, 255, 255]))
            .collect();
        let left = painted[0];
        let right = 319 - painted[painted.len() - 1];
        assert!(left.abs_diff(right) <= 6, "left {left} right {right}");
    }

    #[test]
    fn channel_order_is_preserved_symmetrically() {
        let renderer = bitmap_renderer();
        let rgb = Frame::solid(160, 120, ChannelOrder::Rgb, [10, 200, 40]);
        let bgr = Frame::solid(160, 120, ChannelOrder::Bgr, [10, 200, 40]);

        let out_rgb = renderer.render(&rgb, "ok");
        let out_bgr = renderer.render(&bgr, "ok");
        assert_eq!(out_bgr.order, ChannelOrder::Bgr);
        for y in 0..120 {
            for x in 0..160 {
                assert_eq!(out_rgb.rgb_at(x, y), out_bgr.rgb_at(x, y));
            }
        }
        assert_eq!(out_bgr.rgb_at(0, 0), [10, 200, 40]);
    }

    #[test]
    fn empty_caption_leaves_frame_unchanged() {
        let renderer = bitmap_renderer();
        let frame = Frame::solid(64, 48, ChannelOrder::Bgr, [1, 2, 3]);
        assert_eq!(renderer.render(&frame, "  "), frame);
    }

    #[test]
    fn render_all_matches_single_frame_render() {
        let renderer = bitmap_renderer();
        let frames: Vec<Frame> = (0..5u8)
            .map(|i| Frame::solid(96, 64, ChannelOrder::Bgr, [i * 40, 10, 10]))
            .collect();
        let rendered = renderer.render_all(&frames, "cats");
        assert_eq!(rendered.len(), 5);
        for (frame, out) in frames.iter().zip(&rendered) {
            assert_eq!(&renderer.render(frame, "cats"), out);
        }
    }

    const LONG_CAPTION: &str = "and that is exactly why my cat refuses to leave the box";

    /// Horizontal and vertical extent of every pixel that differs from `bg`.
    fn painted_extent(frame: &Frame, bg: [u8; 3]) -> Option<(u32, u32, u32, u32)> {
        let mut extent: Option<(u32, u32, u32, u32)> = None;
        for y in 0..frame.height {
            for x in 0..frame.width {
                if frame.rgb_at(x, y) == bg {
                    continue;
                }
                extent = Some(match extent {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        extent
    }

    /// First parseable `.ttf` on this machine, if any.
    fn system_font() -> Option<PathBuf> {
        let dirs = font_search_dirs(&CaptionStyle {
            font_dirs: Vec::new(),
            ..Default::default()
        });
        index_font_files(&dirs)
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("ttf")))
            .find(|p| load_font(p).is_ok())
    }

    fn truetype_renderer(path: &Path) -> CaptionRenderer {
        CaptionRenderer::new(CaptionStyle {
            font_candidates: vec![path.to_string_lossy().into_owned()],
            ..Default::default()
        })
    }

    #[test]
    fn bitmap_scale_shrinks_to_fit_width() {
        let lines = vec!["x".repeat(29)];
        assert_eq!(fit_bitmap_scale(4, &lines, 630), 2);
        assert_eq!(fit_bitmap_scale(4, &["hi".to_string()], 630), 4);
        assert_eq!(fit_bitmap_scale(4, &["x".repeat(500)], 630), 1);
    }

    #[test]
    fn bitmap_caption_stays_inside_frame() {
        let renderer = CaptionRenderer::with_font(style(48.0), CaptionFont::bitmap(48.0));
        let bg = [20, 40, 60];
        let frame = Frame::solid(640, 360, ChannelOrder::Rgb, bg);
        let out = renderer.render(&frame, LONG_CAPTION);

        let (x0, _, x1, _) = painted_extent(&out, bg).unwrap();
        assert!(x0 > 0 && x1 < 639, "painted x-range ({x0}, {x1})");
    }

    #[test]
    fn bold_candidate_wins_over_regular() {
        let Some(font) = system_font() else {
            eprintln!("no system font found, skipping");
            return;
        };
        let dir = std::env::temp_dir().join(format!("gifcut-fonts-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let bold = dir.join("GifcutFixture-Bold.ttf");
        let regular = dir.join("GifcutFixture-Regular.ttf");
        std::fs::copy(&font, &bold).unwrap();
        std::fs::copy(&font, &regular).unwrap();

        let style = CaptionStyle {
            font_candidates: vec![
                "GifcutFixture-Bold.ttf".into(),
                "GifcutFixture-Regular.ttf".into(),
            ],
            font_dirs: vec![dir.clone()],
            ..Default::default()
        };
        assert_eq!(resolve_font(&style).source(), Some(bold.as_path()));

        // an unparseable bold face falls through to the regular one
        std::fs::write(&bold, b"not a font").unwrap();
        assert_eq!(resolve_font(&style).source(), Some(regular.as_path()));

        std::fs::remove_file(&bold).unwrap();
        assert_eq!(resolve_font(&style).source(), Some(regular.as_path()));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn truetype_caption_is_centred_above_margin() {
        let Some(font) = system_font() else {
            eprintln!("no system font found, skipping");
            return;
        };
        let renderer = truetype_renderer(&font);
        assert!(!renderer.font().is_bitmap());

        let bg = [0, 0, 255];
        let frame = Frame::solid(640, 360, ChannelOrder::Bgr, bg);
        let out = renderer.render(&frame, "hello cats");

        let (x0, _, x1, y1) = painted_extent(&out, bg).unwrap();
        let left = x0;
        let right = 639 - x1;
        assert!(left.abs_diff(right) <= 4, "left {left} right {right}");

        let style = renderer.style();
        assert!(
            y1 <= 360 - style.bottom_margin + style.outline_radius,
            "painted down to y={y1}"
        );
    }

    #[test]
    fn truetype_caption_stays_inside_frame() {
        let Some(font) = system_font() else {
            eprintln!("no system font found, skipping");
            return;
        };
        let renderer = truetype_renderer(&font);
        let bg = [20, 40, 60];
        let frame = Frame::solid(640, 360, ChannelOrder::Rgb, bg);
        let out = renderer.render(&frame, LONG_CAPTION);

        let (x0, _, x1, _) = painted_extent(&out, bg).unwrap();
        assert!(x0 > 0 && x1 < 639, "painted x-range ({x0}, {x1})");
    }
}
