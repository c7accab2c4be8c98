use std::path::Path;

use anyhow::Result;
use onset_cache::Texture;

use crate::display::Display;

/// Shows the image at `path` until a key is pressed. A missing or broken
/// image is skipped. Returns false if the window was closed instead.
pub fn show(display: &mut Display, path: Option<&Path>) -> Result<bool> {
    let Some(path) = path else {
        return Ok(true);
    };
    let pixmap = match onset_render::load_image(path) {
        Ok(pixmap) => pixmap,
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "splash image not shown");
            return Ok(true);
        }
    };
    tracing::info!(path = %path.display(), "waiting for key on splash");
    display.hold(&Texture::new(pixmap))
}
