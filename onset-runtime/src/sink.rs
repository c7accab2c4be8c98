use std::fmt::Display;

use onset_cache::Texture;

/// What a single frame shows.
#[derive(Debug, Clone, Copy)]
pub enum Scene<'a> {
    Blank,
    Fixation,
    Visual(&'a Texture),
}

impl Scene<'_> {
    pub fn texture(&self) -> Option<&Texture> {
        match self {
            Scene::Visual(texture) => Some(texture),
            _ => None,
        }
    }
}

/// Display the scheduler presents to. With vsync enabled `present` is
/// expected to block until the frame is scanned out.
pub trait FrameSink {
    type Error: Display;

    /// Nominal refresh rate; non-positive means unknown.
    fn refresh_rate_hz(&self) -> f64;
    fn present(&mut self, scene: &Scene<'_>) -> Result<(), Self::Error>;
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    type Error = S::Error;

    fn refresh_rate_hz(&self) -> f64 {
        (**self).refresh_rate_hz()
    }

    fn present(&mut self, scene: &Scene<'_>) -> Result<(), Self::Error> {
        (**self).present(scene)
    }
}
