use std::path::Path;

use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use onset_core::Rgba;
use tiny_skia::{Pixmap, PremultipliedColorU8};

use crate::error::RenderError;

/// Loads a TrueType font or the first face of a collection.
pub fn load_font(path: &Path) -> Result<FontVec, RenderError> {
    let data = std::fs::read(path).map_err(|source| RenderError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    FontVec::try_from_vec_and_index(data, 0)
        .map_err(|_| RenderError::InvalidFont(path.to_path_buf()))
}

/// Rasterises a single line of text into a tightly fitting, transparent
/// pixmap.
pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: Rgba,
) -> Result<Pixmap, RenderError> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // Layout with baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    // Whitespace-only text still yields a drawable (empty) texture.
    if outlines.is_empty() {
        let width = pen_x.ceil().max(1.0) as u32;
        let height = sf.height().ceil().max(1.0) as u32;
        return Pixmap::new(width, height).ok_or(RenderError::InvalidSize { width, height });
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h).ok_or(RenderError::InvalidSize {
        width: w,
        height: h,
    })?;

    let stride = pm.width() as usize;
    let dst = pm.pixels_mut();

    for out in &outlines {
        let bounds = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + bounds.min.x - min_x).floor() as i32;
            let iy = (y as f32 + bounds.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            // Premultiply by coverage * alpha, then source-over.
            let a = (cov * color.a() as f32 / 255.0).clamp(0.0, 1.0);
            let sr = (color.r() as f32 * a) as u8;
            let sg = (color.g() as f32 * a) as u8;
            let sb = (color.b() as f32 * a) as u8;
            let sa = (a * 255.0) as u8;

            let bg = dst[i];
            let inv = 1.0 - (sa as f32 / 255.0);
            let r = sr.saturating_add((bg.red() as f32 * inv) as u8);
            let g = sg.saturating_add((bg.green() as f32 * inv) as u8);
            let b = sb.saturating_add((bg.blue() as f32 * inv) as u8);
            let a = sa.saturating_add((bg.alpha() as f32 * inv) as u8);

            // Channels never exceed alpha after premultiplication.
            if let Some(px) = PremultipliedColorU8::from_rgba(r.min(a), g.min(a), b.min(a), a) {
                dst[i] = px;
            }
        });
    }

    Ok(pm)
}
