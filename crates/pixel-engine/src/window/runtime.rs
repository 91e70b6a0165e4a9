use anyhow::{Context, Result};
use ouroboros::self_referencing;
use std::collections::HashMap;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App, AppControl, FrameCtx, WindowCtx};
use crate::device::{Gpu, GpuInit};
use crate::input::platform::winit::translate_window_event;
use crate::input::{InputFrame, InputState};
use crate::time::FrameClock;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "pixel studio".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
        }
    }
}

/// Deferred requests an app can make from inside `on_frame`.
///
/// Applied once the callback has returned and the window borrow is released.
#[derive(Default)]
pub struct RuntimeCtx {
    commands: Vec<Command>,
}

impl RuntimeCtx {
    pub fn close_window(&mut self, id: WindowId) {
        self.commands.push(Command::CloseWindow(id));
    }

    pub fn exit(&mut self) {
        self.commands.push(Command::Exit);
    }
}

enum Command {
    CloseWindow(WindowId),
    Exit,
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the initial window and blocks until the event loop exits.
    pub fn run<A>(initial: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut host = Host {
            initial,
            gpu_init,
            app,
            windows: HashMap::new(),
            exiting: false,
        };

        event_loop
            .run_app(&mut host)
            .context("winit event loop terminated with error")?;

        Ok(())
    }
}

/// A window, its surface-bound GPU context and its input bookkeeping.
#[self_referencing]
struct WindowEntry {
    input_state: InputState,
    input_frame: InputFrame,
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

impl WindowEntry {
    fn open(event_loop: &ActiveEventLoop, config: RuntimeConfig, gpu_init: GpuInit) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title(config.title)
            .with_inner_size(config.initial_size);
        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        WindowEntryTryBuilder {
            input_state: InputState::default(),
            input_frame: InputFrame::default(),
            clock: FrameClock::default(),
            window,
            gpu_builder: |w| {
                pollster::block_on(Gpu::new(w, gpu_init)).context("GPU initialization failed")
            },
        }
        .try_build()
    }

    /// Current `(inner size, scale factor)`.
    fn metrics(&self) -> (PhysicalSize<u32>, f64) {
        self.with_window(|w| (w.inner_size(), w.scale_factor()))
    }

    fn request_redraw(&self) {
        self.with_window(|w| w.request_redraw());
    }
}

struct Host<A: App + 'static> {
    initial: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    windows: HashMap<WindowId, WindowEntry>,
    exiting: bool,
}

impl<A: App + 'static> Host<A> {
    fn open_initial(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let entry = WindowEntry::open(event_loop, self.initial.clone(), self.gpu_init.clone())?;
        let id = entry.with_window(|w| w.id());
        let (size, scale) = entry.metrics();
        entry.request_redraw();
        self.windows.insert(id, entry);

        self.app.on_resized(id, size.width, size.height, scale);
        Ok(())
    }

    /// Folds `event` into the window's input state and forwards it to the app.
    fn dispatch(&mut self, id: WindowId, event: &WindowEvent) -> AppControl {
        let app = &mut self.app;
        let Some(entry) = self.windows.get_mut(&id) else {
            return AppControl::Continue;
        };

        entry.with_mut(|fields| {
            if let Some(ev) = translate_window_event(fields.window, fields.input_state, event) {
                fields.input_state.apply_event(fields.input_frame, ev);
            }
        });
        app.on_window_event(id, event)
    }

    /// Reconfigures the surface to the window's current size and tells the app.
    fn reconfigure(&mut self, id: WindowId) {
        let Some(entry) = self.windows.get_mut(&id) else { return };
        let (size, scale) = entry.metrics();
        entry.with_gpu_mut(|gpu| gpu.resize(size));
        entry.request_redraw();

        log::debug!("surface {id:?} -> {}x{} @{scale}", size.width, size.height);
        self.app.on_resized(id, size.width, size.height, scale);
    }

    fn redraw(&mut self, id: WindowId) -> RuntimeCtx {
        let mut runtime = RuntimeCtx::default();
        let app = &mut self.app;
        let Some(entry) = self.windows.get_mut(&id) else {
            return runtime;
        };

        let control = entry.with_mut(|fields| {
            let mut ctx = FrameCtx {
                window: WindowCtx {
                    id,
                    window: fields.window,
                },
                gpu: fields.gpu,
                input: fields.input_state,
                input_frame: fields.input_frame,
                time: fields.clock.tick(),
                runtime: &mut runtime,
            };
            let control = app.on_frame(&mut ctx);

            fields.input_frame.clear();
            control
        });

        if control == AppControl::Exit {
            runtime.exit();
        }
        runtime
    }

    fn apply(&mut self, runtime: RuntimeCtx) {
        for cmd in runtime.commands {
            match cmd {
                Command::CloseWindow(id) => {
                    self.windows.remove(&id);
                }
                Command::Exit => self.exiting = true,
            }
        }
        if self.windows.is_empty() {
            self.exiting = true;
        }
    }
}

impl<A: App + 'static> ApplicationHandler for Host<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !self.windows.is_empty() {
            return;
        }
        if let Err(e) = self.open_initial(event_loop) {
            log::error!("failed to create initial window: {e:#}");
            self.exiting = true;
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            event_loop.exit();
            return;
        }

        // Redraw every frame: the settle window and pending pick readbacks
        // only advance from `on_frame`.
        event_loop.set_control_flow(ControlFlow::Wait);
        for entry in self.windows.values() {
            entry.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if !self.exiting && self.dispatch(id, &event) == AppControl::Exit {
            self.exiting = true;
        }

        if !self.exiting {
            match event {
                WindowEvent::CloseRequested => {
                    let mut runtime = RuntimeCtx::default();
                    runtime.close_window(id);
                    self.apply(runtime);
                }
                WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                    self.reconfigure(id)
                }
                WindowEvent::RedrawRequested => {
                    let runtime = self.redraw(id);
                    self.apply(runtime);
                }
                _ => {}
            }
        }

        if self.exiting {
            event_loop.exit();
        }
    }
}
