use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Escape,
    /// Any other key, by its display name (e.g. `Space`, `A`, `Return`).
    Named(String),
}

impl Key {
    pub fn named(name: impl Into<String>) -> Self {
        Key::Named(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Key::Escape => "Escape",
            Key::Named(name) => name,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Window closed or the platform asked the process to quit.
    Quit,
    KeyDown(Key),
}

/// Platform event feed. `drain` moves everything queued since the previous
/// call into `out`, in arrival order, without blocking.
pub trait InputSource {
    fn drain(&mut self, out: &mut Vec<InputEvent>);
}

impl<S: InputSource + ?Sized> InputSource for &mut S {
    fn drain(&mut self, out: &mut Vec<InputEvent>) {
        (**self).drain(out);
    }
}

/// Plain FIFO queue, filled by a platform callback and drained by the
/// scheduler.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl InputSource for InputQueue {
    fn drain(&mut self, out: &mut Vec<InputEvent>) {
        out.extend(self.events.drain(..));
    }
}
