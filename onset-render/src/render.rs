use onset_cache::Texture;
use onset_core::Rgba;
use tiny_skia::{Color, FilterQuality, Paint, Pixmap, PixmapPaint, Rect, Transform};

use crate::error::RenderError;

/// Half the arm length of the fixation cross in logical pixels.
pub const FIXATION_HALF_SIZE: u32 = 20;
const FIXATION_THICKNESS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub background: Rgba,
    pub fixation: Rgba,
    /// Multiplier applied to every stimulus' natural size.
    pub scale_factor: f32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            background: Rgba::BLACK,
            fixation: Rgba::WHITE,
            scale_factor: 1.0,
        }
    }
}

/// Draws one full frame at a time into an offscreen canvas at the logical
/// resolution, then copies it into the display's frame buffer.
pub struct StimulusRenderer {
    width: u32,
    height: u32,
    style: RenderStyle,
    canvas: Pixmap,
    fixation: Pixmap,
}

impl StimulusRenderer {
    pub fn new(width: u32, height: u32, style: RenderStyle) -> Result<Self, RenderError> {
        let canvas = Pixmap::new(width, height).ok_or(RenderError::InvalidSize { width, height })?;
        let fixation = fixation_pixmap(style.fixation)?;
        let mut renderer = Self {
            width,
            height,
            style,
            canvas,
            fixation,
        };
        renderer.clear();
        Ok(renderer)
    }

    pub fn clear(&mut self) {
        self.canvas.fill(to_color(self.style.background));
    }

    pub fn draw_texture(&mut self, texture: &Texture) {
        self.draw_centered(&texture.pixmap);
    }

    /// Draws `pixmap` centred on the canvas, scaled by the style's factor.
    pub fn draw_centered(&mut self, pixmap: &Pixmap) {
        let s = self.style.scale_factor;
        let tx = ((self.width as f32 - pixmap.width() as f32 * s) * 0.5).floor();
        let ty = ((self.height as f32 - pixmap.height() as f32 * s) * 0.5).floor();
        let quality = if s == 1.0 {
            FilterQuality::Nearest
        } else {
            FilterQuality::Bilinear
        };
        let paint = PixmapPaint {
            quality,
            ..PixmapPaint::default()
        };
        self.canvas.draw_pixmap(
            0,
            0,
            pixmap.as_ref(),
            &paint,
            Transform::from_row(s, 0.0, 0.0, s, tx, ty),
            None,
        );
    }

    pub fn draw_fixation(&mut self) {
        let x = (self.width / 2) as i32 - FIXATION_HALF_SIZE as i32;
        let y = (self.height / 2) as i32 - FIXATION_HALF_SIZE as i32;
        self.canvas.draw_pixmap(
            x,
            y,
            self.fixation.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    /// Composes a whole frame: background, then the visual if any, else the
    /// fixation cross when `fixation` is set.
    pub fn compose(&mut self, visual: Option<&Texture>, fixation: bool) {
        self.clear();
        match visual {
            Some(texture) => self.draw_texture(texture),
            None if fixation => self.draw_fixation(),
            None => {}
        }
    }

    pub fn copy_to(&self, frame_buffer: &mut [u8]) -> Result<(), RenderError> {
        let data = self.canvas.data();
        if frame_buffer.len() != data.len() {
            return Err(RenderError::FrameSize {
                expected: data.len(),
                actual: frame_buffer.len(),
            });
        }
        frame_buffer.copy_from_slice(data);
        Ok(())
    }
}

fn to_color(c: Rgba) -> Color {
    Color::from_rgba8(c.r(), c.g(), c.b(), c.a())
}

fn fixation_pixmap(color: Rgba) -> Result<Pixmap, RenderError> {
    let size = FIXATION_HALF_SIZE * 2 + 1;
    let mut pm = Pixmap::new(size, size).ok_or(RenderError::InvalidSize {
        width: size,
        height: size,
    })?;

    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(to_color(color));

    let offset = (FIXATION_HALF_SIZE + 1 - FIXATION_THICKNESS) as f32;
    let bars = [
        Rect::from_xywh(0.0, offset, size as f32, FIXATION_THICKNESS as f32),
        Rect::from_xywh(offset, 0.0, FIXATION_THICKNESS as f32, size as f32),
    ];
    for bar in bars.into_iter().flatten() {
        pm.fill_rect(bar, &paint, Transform::identity(), None);
    }
    Ok(pm)
}
