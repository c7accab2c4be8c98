use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use onset_cache::Texture;
use onset_render::{RenderStyle, StimulusRenderer};
use onset_runtime::{FrameSink, InputEvent, InputQueue, InputSource, Key, Scene};
use onset_timing::{CalibrationStats, FrameStatistics, HighPrecisionTimer, Timer};
use pixels::{Pixels, PixelsBuilder, SurfaceTexture};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key as WinitKey, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowId};

const STARTUP_PUMPS: usize = 200;
const SPLASH_POLL: Duration = Duration::from_millis(16);

/// Input queue shared between the window callbacks and the scheduler.
#[derive(Debug, Clone, Default)]
pub struct SharedInput(Rc<RefCell<InputQueue>>);

impl SharedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: InputEvent) {
        self.0.borrow_mut().push(event);
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn take_into(&self, out: &mut Vec<InputEvent>) {
        self.0.borrow_mut().drain(out);
    }
}

impl InputSource for SharedInput {
    fn drain(&mut self, out: &mut Vec<InputEvent>) {
        self.take_into(out);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowOptions {
    /// Logical resolution of the frame buffer.
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub display_index: usize,
    pub vsync: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonitorInfo {
    pub width: u32,
    pub height: u32,
    pub refresh_hz: Option<f64>,
}

struct Shell {
    options: WindowOptions,
    input: SharedInput,
    window: Option<Arc<Window>>,
    monitor: Option<MonitorInfo>,
    resized: Option<PhysicalSize<u32>>,
    error: Option<anyhow::Error>,
}

impl Shell {
    fn new(options: WindowOptions, input: SharedInput) -> Self {
        Self {
            options,
            input,
            window: None,
            monitor: None,
            resized: None,
            error: None,
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .available_monitors()
            .nth(self.options.display_index)
            .or_else(|| event_loop.primary_monitor())
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;

        let size = monitor.size();
        let refresh_hz = monitor
            .refresh_rate_millihertz()
            .map(|mhz| mhz as f64 / 1000.0);
        self.monitor = Some(MonitorInfo {
            width: size.width,
            height: size.height,
            refresh_hz,
        });

        let attributes = Window::default_attributes()
            .with_title("onset")
            .with_resizable(false);
        let attributes = if self.options.fullscreen {
            attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
        } else {
            attributes.with_inner_size(PhysicalSize::new(self.options.width, self.options.height))
        };

        let window = Arc::new(event_loop.create_window(attributes)?);
        let inner = window.inner_size();
        tracing::info!(
            monitor_width = size.width,
            monitor_height = size.height,
            refresh_hz,
            window_width = inner.width,
            window_height = inner.height,
            scale_factor = window.scale_factor(),
            fullscreen = self.options.fullscreen,
            "window created"
        );
        self.window = Some(window);
        Ok(())
    }
}

impl ApplicationHandler for Shell {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.create_window(event_loop) {
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.input.push(InputEvent::Quit),
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                self.input.push(InputEvent::KeyDown(key_of(&event.logical_key)));
            }
            WindowEvent::Resized(size) => self.resized = Some(size),
            _ => {}
        }
    }
}

fn key_of(key: &WinitKey) -> Key {
    match key {
        WinitKey::Named(NamedKey::Escape) => Key::Escape,
        WinitKey::Named(named) => Key::named(format!("{named:?}")),
        WinitKey::Character(text) => Key::named(text.to_uppercase()),
        other => Key::named(format!("{other:?}")),
    }
}

/// Window, pixel surface and renderer. Events are pumped without blocking
/// after every present, so the scheduler stays in control of the loop.
pub struct Display {
    event_loop: EventLoop<()>,
    shell: Shell,
    window: Arc<Window>,
    pixels: Pixels<'static>,
    renderer: StimulusRenderer,
    frames: FrameStatistics,
    timer: HighPrecisionTimer,
    closed: bool,
}

impl Display {
    pub fn open(
        options: WindowOptions,
        style: RenderStyle,
        input: SharedInput,
        timer: HighPrecisionTimer,
    ) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("failed to create event loop")?;
        let mut shell = Shell::new(options, input);

        // The window is created in `resumed`, delivered by the first pumps.
        for _ in 0..STARTUP_PUMPS {
            let status = event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut shell);
            if let Some(err) = shell.error.take() {
                return Err(err.context("failed to create window"));
            }
            if shell.window.is_some() {
                break;
            }
            if let PumpStatus::Exit(code) = status {
                bail!("event loop exited during startup (code {code})");
            }
        }
        let window = shell.window.clone().context("window was never created")?;

        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width, size.height, Arc::clone(&window));
        let pixels = PixelsBuilder::new(options.width, options.height, surface)
            .enable_vsync(options.vsync)
            .build()
            .context("failed to create pixel surface")?;
        let renderer = StimulusRenderer::new(options.width, options.height, style)?;
        window.set_cursor_visible(false);

        Ok(Self {
            event_loop,
            shell,
            window,
            pixels,
            renderer,
            frames: FrameStatistics::default(),
            timer,
            closed: false,
        })
    }

    pub fn monitor(&self) -> MonitorInfo {
        self.shell.monitor.unwrap_or_default()
    }

    pub fn frame_statistics(&self) -> CalibrationStats {
        self.frames.calibration_stats()
    }

    pub fn reset_statistics(&mut self) {
        self.frames = FrameStatistics::default();
    }

    /// Processes pending window events. A closed event loop turns into a
    /// single `Quit`.
    pub fn pump(&mut self, timeout: Option<Duration>) {
        if self.closed {
            return;
        }
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.shell) {
            tracing::info!(code, "event loop exited");
            self.closed = true;
            self.shell.input.push(InputEvent::Quit);
        }
        if let Some(size) = self.shell.resized.take() {
            if let Err(err) = self.pixels.resize_surface(size.width, size.height) {
                tracing::warn!(%err, width = size.width, height = size.height, "surface resize failed");
            }
        }
    }

    fn draw(&mut self, texture: Option<&Texture>, fixation: bool) -> Result<()> {
        self.renderer.compose(texture, fixation);
        self.renderer.copy_to(self.pixels.frame_mut())?;
        self.pixels.render().context("failed to present frame")?;
        self.frames.record_present(self.timer.now());
        Ok(())
    }

    /// Shows `texture` on the background until a key is pressed. Returns
    /// false if the subject closed the window instead.
    pub fn hold(&mut self, texture: &Texture) -> Result<bool> {
        self.shell.input.clear();
        self.draw(Some(texture), false)?;

        let mut events = Vec::new();
        while !self.closed {
            self.pump(Some(SPLASH_POLL));
            self.shell.input.take_into(&mut events);
            for event in events.drain(..) {
                match event {
                    InputEvent::Quit => return Ok(false),
                    InputEvent::KeyDown(_) => {
                        self.shell.input.clear();
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }
}

impl FrameSink for Display {
    type Error = anyhow::Error;

    fn refresh_rate_hz(&self) -> f64 {
        self.shell
            .monitor
            .and_then(|m| m.refresh_hz)
            .unwrap_or(0.0)
    }

    fn present(&mut self, scene: &Scene<'_>) -> Result<()> {
        let result = self.draw(scene.texture(), matches!(scene, Scene::Fixation));
        self.pump(Some(Duration::ZERO));
        result
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        self.window.set_cursor_visible(true);
    }
}
