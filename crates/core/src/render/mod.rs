pub mod caption;
pub mod gif;

pub use caption::{CaptionFont, CaptionOverlay, CaptionRenderer, resolve_font, wrap_text};
pub use self::gif::{FRAME_DURATION_MS, GifEncoder};
