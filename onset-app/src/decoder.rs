use std::path::PathBuf;

use ab_glyph::FontVec;
use anyhow::{Context, Result, anyhow};
use onset_cache::AssetDecoder;
use onset_core::{PcmBuffer, Rgba};
use tiny_skia::Pixmap;

/// Loads stimuli from disk relative to `base`, and rasterises text with the
/// configured font.
pub struct FileDecoder {
    base: PathBuf,
    font: Option<FontVec>,
    font_size: f32,
    text_color: Rgba,
}

impl FileDecoder {
    pub fn new(base: impl Into<PathBuf>, font: Option<FontVec>, font_size: f32, text_color: Rgba) -> Self {
        Self {
            base: base.into(),
            font,
            font_size,
            text_color,
        }
    }

    pub fn resolve(&self, source: &str) -> PathBuf {
        self.base.join(source)
    }
}

impl AssetDecoder for FileDecoder {
    type Error = anyhow::Error;

    fn decode_image(&mut self, source: &str) -> Result<Pixmap> {
        let path = self.resolve(source);
        onset_render::load_image(&path).with_context(|| format!("image {}", path.display()))
    }

    fn decode_sound(&mut self, source: &str) -> Result<PcmBuffer> {
        let path = self.resolve(source);
        onset_audio::decode_file(&path).with_context(|| format!("sound {}", path.display()))
    }

    fn render_text(&mut self, text: &str) -> Result<Pixmap> {
        let font = self.font.as_ref().ok_or_else(|| anyhow!("no font available"))?;
        Ok(onset_render::render_text_pixmap(
            text,
            self.font_size,
            font,
            self.text_color,
        )?)
    }
}
