use crate::keymap::{is_exit, key_name};
use crate::session::{RunOutcome, run_blocking};
use anyhow::{Context, Result, anyhow};
use coglab_core::{ExperimentDocument, PresentationSurface, ResolvedStimulus};
use coglab_experiment::{RunError, RunReport, RunnerConfig, VisualAngle};
use coglab_render::{FontArc, SkiaSurface, SurfaceStyle};
use coglab_timing::{CancelToken, Keyboard};
use log::{debug, error, info, warn};
use pixels::{Pixels, SurfaceTexture};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Fullscreen, Window, WindowId},
};

pub enum UserEvent {
    /// The scheduler presented a new frame.
    Frame,
    Finished(Box<Result<RunOutcome>>),
}

/// Latest presented canvas, handed from the scheduler thread to the window.
struct SharedFrame {
    rgba: Vec<u8>,
    generation: u64,
}

/// Scheduler-side surface: draws off-screen, publishes on present.
struct WindowSurface {
    inner: SkiaSurface,
    shared: Arc<Mutex<SharedFrame>>,
    proxy: EventLoopProxy<UserEvent>,
}

impl PresentationSurface for WindowSurface {
    fn clear(&mut self) {
        self.inner.clear();
    }

    fn draw(&mut self, stimulus: &ResolvedStimulus) {
        self.inner.draw(stimulus);
    }

    fn show_message(&mut self, text: &str) {
        self.inner.show_message(text);
    }

    fn present(&mut self) {
        self.inner.present();
        {
            let mut frame = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
            if self.inner.copy_to(&mut frame.rgba) {
                frame.generation = self.inner.generation();
            }
        }
        if self.proxy.send_event(UserEvent::Frame).is_err() {
            debug!("window closed, frame dropped");
        }
    }
}

pub struct App {
    doc: Option<ExperimentDocument>,
    config: RunnerConfig,
    font: Option<FontArc>,
    keyboard: Keyboard,
    cancel: CancelToken,
    proxy: EventLoopProxy<UserEvent>,

    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    shared: Option<Arc<Mutex<SharedFrame>>>,
    shown_generation: u64,
    runner: Option<JoinHandle<()>>,
    outcome: Option<Result<RunOutcome>>,
}

impl App {
    /// Runs `doc` full-screen on the primary monitor until it completes or
    /// the participant presses Escape.
    pub fn run(doc: ExperimentDocument, config: RunnerConfig, font: Option<FontArc>) -> Result<RunOutcome> {
        let event_loop = EventLoop::<UserEvent>::with_user_event()
            .build()
            .context("creating the event loop")?;
        let mut app = App {
            doc: Some(doc),
            config,
            font,
            keyboard: Keyboard::new(),
            cancel: CancelToken::new(),
            proxy: event_loop.create_proxy(),
            window: None,
            pixels: None,
            shared: None,
            shown_generation: 0,
            runner: None,
            outcome: None,
        };
        info!("platform {} / {}", std::env::consts::OS, std::env::consts::ARCH);
        info!("press ESC to abort the run");
        event_loop.run_app(&mut app)?;

        if let Some(runner) = app.runner.take() {
            if runner.join().is_err() {
                return Err(anyhow!("presentation thread panicked"));
            }
        }
        app.outcome.take().unwrap_or_else(|| {
            Ok(RunOutcome {
                report: RunReport::default(),
                error: Some(RunError::Cancelled),
            })
        })
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;

        let resolution = primary_monitor.size();
        info!("monitor resolution {}×{}", resolution.width, resolution.height);
        if let Some(rate) = primary_monitor.refresh_rate_millihertz() {
            info!("refresh rate {:.1} Hz", rate as f64 / 1000.0);
        }

        let window_attributes = Window::default_attributes()
            .with_title("coglab")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor))))
            .with_resizable(false);
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();
        info!("window {}×{}, scale factor {:.2}", size.width, size.height, window.scale_factor());

        if let Some(doc) = &self.doc {
            let apparatus = &doc.apparatus;
            if apparatus.resolution_x_px.is_some_and(|x| x != resolution.width)
                || apparatus.resolution_y_px.is_some_and(|y| y != resolution.height)
            {
                warn!(
                    "document expects {:?}×{:?} px, monitor is {}×{}",
                    apparatus.resolution_x_px, apparatus.resolution_y_px, resolution.width, resolution.height
                );
            }
            if let Some(angle) = VisualAngle::from_apparatus(apparatus) {
                info!(
                    "1 px = {:.4}° × {:.4}° at {:?} cm",
                    angle.deg_per_px_x, angle.deg_per_px_y, apparatus.viewing_distance_cm
                );
            }
        }

        let surface_texture = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface_texture)?);

        let canvas = SkiaSurface::new(size.width, size.height, self.font.take(), SurfaceStyle::default())?;
        let shared = Arc::new(Mutex::new(SharedFrame {
            rgba: vec![0; canvas.canvas().data().len()],
            generation: 0,
        }));
        self.shared = Some(shared.clone());

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);

        let surface = WindowSurface {
            inner: canvas,
            shared,
            proxy: self.proxy.clone(),
        };
        self.start_run(surface)
    }

    fn start_run(&mut self, mut surface: WindowSurface) -> Result<()> {
        let doc = self.doc.take().ok_or_else(|| anyhow!("run already started"))?;
        let config = self.config.clone();
        let keyboard = self.keyboard.clone();
        let cancel = self.cancel.clone();
        let proxy = self.proxy.clone();
        let handle = thread::Builder::new()
            .name("scheduler".into())
            .spawn(move || {
                let outcome = run_blocking(&doc, config, keyboard, cancel, &mut surface);
                if proxy.send_event(UserEvent::Finished(Box::new(outcome))).is_err() {
                    debug!("event loop closed before the run finished");
                }
            })
            .context("spawning the scheduler thread")?;
        self.runner = Some(handle);
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let (Some(pixels), Some(shared)) = (self.pixels.as_mut(), self.shared.as_ref()) else {
            return Ok(());
        };
        {
            let frame = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if frame.generation != self.shown_generation {
                let target = pixels.frame_mut();
                if target.len() == frame.rgba.len() {
                    target.copy_from_slice(&frame.rgba);
                    self.shown_generation = frame.generation;
                }
            }
        }
        pixels.render()?;
        Ok(())
    }

    fn handle_resize(&mut self, width: u32, height: u32) {
        // the canvas keeps its size; pixels scales it to the surface
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(width, height) {
                warn!("failed to resize surface: {e}");
            }
        }
        debug!("display resized to {width}×{height}");
    }

    /// Escape or closing the window: abort the run, then leave once the
    /// scheduler has cleared the screen.
    fn exit_action(&mut self, event_loop: &ActiveEventLoop) {
        info!("exit requested");
        self.cancel.cancel();
        if self.runner.is_none() {
            self.cleanup_and_exit(event_loop);
        }
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        event_loop.exit();
    }
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!("failed to create window and surface: {e:#}");
                self.outcome = Some(Err(e));
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::Frame => {
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            UserEvent::Finished(outcome) => {
                self.outcome = Some(*outcome);
                self.cleanup_and_exit(event_loop);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.exit_action(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    error!("render failed: {e}");
                    self.exit_action(event_loop);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                if is_exit(&event.logical_key) {
                    self.exit_action(event_loop);
                } else if let Some(name) = key_name(&event.logical_key) {
                    let listeners = self.keyboard.press(&name);
                    debug!("key {name:?} reached {listeners} listener(s)");
                }
            }
            WindowEvent::Resized(size) => self.handle_resize(size.width, size.height),
            _ => {}
        }
    }
}
