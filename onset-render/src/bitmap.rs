use std::path::Path;

use tiny_skia::{IntSize, Pixmap};

use crate::error::RenderError;

/// Decodes an image file into a premultiplied pixmap ready for drawing.
pub fn load_image(path: &Path) -> Result<Pixmap, RenderError> {
    let rgba = ::image::open(path)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut data = rgba.into_raw();
    premultiply_rgba(&mut data);

    IntSize::from_wh(width, height)
        .and_then(|size| Pixmap::from_vec(data, size))
        .ok_or(RenderError::InvalidSize { width, height })
}

/// In-place straight to premultiplied alpha, as tiny-skia expects.
pub fn premultiply_rgba(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
}
