pub mod bitmap;
pub mod error;
pub mod render;
pub mod text;

pub use bitmap::{load_image, premultiply_rgba};
pub use error::RenderError;
pub use render::{FIXATION_HALF_SIZE, RenderStyle, StimulusRenderer};
pub use text::{load_font, render_text_pixmap};
