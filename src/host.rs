// eglquad/src/host.rs
//
//! View hosts that own a render thread and forward drawable lifecycle events to it.
//!
//! [`WorkerView`] hands its drawable to a single-shot [`RenderWorker`]. [`HostedView`] runs a
//! render loop that calls a [`Renderer`] for as long as a drawable is attached, in the manner
//! of a `GLSurfaceView`.

use crate::config::{ConfigRequest, SurfaceType};
use crate::context::ContextManager;
use crate::image::Image;
use crate::platform::{NativeDrawable, Platform};
use crate::quad::{Frame, QuadPass};
use crate::surface::SurfaceHandle;
use crate::worker::{RenderTarget, RenderWorker, WorkerOptions};
use crate::{gl, Error, Gl};

use euclid::default::Size2D;
use glow::HasContext;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A surface-view or texture-view style host backed by a single-shot render worker.
pub struct WorkerView<P: Platform> {
    worker: Option<RenderWorker<P>>,
    rendered: Option<Image>,
}

impl<P> WorkerView<P>
where
    P: Platform + Send + 'static,
{
    /// Starts the render worker with capture enabled.
    pub fn new(platform: P) -> Result<WorkerView<P>, Error> {
        WorkerView::with_options(platform, WorkerOptions { capture: true, ..WorkerOptions::default() })
    }

    pub fn with_options(platform: P, options: WorkerOptions) -> Result<WorkerView<P>, Error> {
        Ok(WorkerView { worker: Some(RenderWorker::spawn(platform, options)?), rendered: None })
    }
}

impl<P: Platform> WorkerView<P> {
    fn worker(&self) -> Result<&RenderWorker<P>, Error> {
        self.worker.as_ref().ok_or(Error::WorkerTerminated)
    }

    /// Sets the bitmap the render pass draws.
    pub fn load_bitmap(&self, image: Image) -> Result<(), Error> {
        self.worker()?.load_bitmap(image, false)
    }

    /// Sets the bitmap the render pass draws, with a diagonal line over it.
    pub fn add_diagonal_line(&self, image: Image) -> Result<(), Error> {
        self.worker()?.load_bitmap(image, true)
    }

    /// Returns the rendered frame once the render pass has finished.
    pub fn rendered_bitmap(&self) -> Option<Image> {
        match self.worker {
            Some(ref worker) => worker.rendered_image(),
            None => self.rendered.clone(),
        }
    }

    pub fn render_worker(&self) -> Option<&RenderWorker<P>> {
        self.worker.as_ref()
    }

    /// The host created the drawable.
    pub fn on_drawable_available(&self, drawable: NativeDrawable<P>) -> Result<(), Error> {
        debug!("drawable available: {:?}", drawable);
        self.worker()?.target_available(RenderTarget::Drawable(drawable))
    }

    pub fn on_drawable_changed(&self, size: Size2D<i32>) {
        debug!("drawable changed to {}x{}", size.width, size.height);
    }

    /// The host is destroying the drawable. Blocks until the render worker has let go of it,
    /// then returns true: the host may release the drawable.
    pub fn on_drawable_destroyed(&self) -> bool {
        debug!("drawable destroyed");
        if let Some(ref worker) = self.worker {
            worker.target_destroyed();
        }
        true
    }

    /// Stops and joins the render worker. Calling this more than once does nothing.
    pub fn destroy(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop_render();
            worker.join();
            self.rendered = worker.rendered_image();
        }
    }
}

impl<P: Platform> Drop for WorkerView<P> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Drawing callbacks driven by a [`HostedView`] render thread.
///
/// Every callback runs on the render thread with the context current.
pub trait Renderer: Send {
    /// The surface and context exist. Build programs and buffers here.
    fn on_surface_created(&mut self, gl: &Gl) -> Result<(), Error>;
    fn on_surface_changed(&mut self, gl: &Gl, size: Size2D<i32>);
    fn on_draw_frame(&mut self, gl: &Gl);
    /// The surface is about to go away. GL objects should be released here.
    fn on_surface_destroyed(&mut self, _gl: &Gl) {}
}

/// When a [`HostedView`] draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Draw every `HostOptions::frame_interval`.
    Continuously,
    /// Draw once after the surface is created or changed, then once per
    /// [`HostedView::request_render`].
    WhenDirty,
}

#[derive(Clone, Debug)]
pub struct HostOptions {
    pub config: ConfigRequest,
    pub render_mode: RenderMode,
    pub frame_interval: Duration,
}

impl Default for HostOptions {
    fn default() -> HostOptions {
        HostOptions {
            config: ConfigRequest::default(),
            render_mode: RenderMode::WhenDirty,
            frame_interval: Duration::from_millis(16),
        }
    }
}

enum HostMessage<P: Platform> {
    DrawableAvailable(NativeDrawable<P>),
    DrawableChanged(Size2D<i32>),
    DrawableDestroyed(Sender<()>),
    RequestRender,
    SetRenderMode(RenderMode),
    Stop,
}

#[derive(Default)]
struct HostState {
    frames_drawn: u64,
    failure: Option<String>,
}

struct HostShared {
    state: Mutex<HostState>,
    changed: Condvar,
}

impl HostShared {
    fn update(&self, f: impl FnOnce(&mut HostState)) {
        f(&mut lock(&self.state));
        self.changed.notify_all();
    }
}

/// A `GLSurfaceView` style host.
///
/// The render thread builds a window surface when the drawable arrives, calls the renderer's
/// `on_surface_created` and `on_surface_changed`, and then `on_draw_frame` according to the
/// render mode, presenting after every frame.
pub struct HostedView<P: Platform> {
    sender: Sender<HostMessage<P>>,
    shared: Arc<HostShared>,
    thread: Option<JoinHandle<()>>,
}

impl<P> HostedView<P>
where
    P: Platform + Send + 'static,
{
    pub fn spawn<R>(platform: P, renderer: R, options: HostOptions) -> Result<HostedView<P>, Error>
    where
        R: Renderer + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let shared = Arc::new(HostShared {
            state: Mutex::new(HostState::default()),
            changed: Condvar::new(),
        });
        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name("eglquad host renderer".to_owned())
            .spawn(move || {
                let mut render_thread = RenderThread {
                    renderer,
                    receiver,
                    shared: thread_shared,
                    render_mode: options.render_mode,
                    frame_interval: options.frame_interval,
                };
                let config = options.config.with_surface_type(SurfaceType::WINDOW);
                let manager = ContextManager::with_config(platform, &config);
                render_thread.run(&manager);
            })?;
        Ok(HostedView { sender, shared, thread: Some(thread) })
    }
}

impl<P: Platform> HostedView<P> {
    fn send(&self, message: HostMessage<P>) -> Result<(), Error> {
        self.sender.send(message).map_err(|_| Error::WorkerTerminated)
    }

    pub fn on_drawable_available(&self, drawable: NativeDrawable<P>) -> Result<(), Error> {
        debug!("drawable available: {:?}", drawable);
        self.send(HostMessage::DrawableAvailable(drawable))
    }

    pub fn on_drawable_changed(&self, size: Size2D<i32>) -> Result<(), Error> {
        self.send(HostMessage::DrawableChanged(size))
    }

    /// Detaches the drawable. Blocks until the render thread has released its surface, or
    /// never had one, then returns true: the host may release the drawable.
    ///
    /// Requests are handled in order, so a drawable handed over just before is attached and
    /// released again before this returns.
    pub fn on_drawable_destroyed(&self) -> bool {
        let (reply_sender, reply_receiver) = mpsc::channel();
        if self.send(HostMessage::DrawableDestroyed(reply_sender)).is_err() {
            debug!("host render thread already exited");
            return true;
        }
        // A disconnect means the thread exited without reading the message.
        if reply_receiver.recv().is_err() {
            debug!("host render thread exited before releasing the drawable");
        }
        true
    }

    /// Asks for one more frame in `WhenDirty` mode.
    pub fn request_render(&self) {
        if self.send(HostMessage::RequestRender).is_err() {
            debug!("host render thread already exited");
        }
    }

    pub fn set_render_mode(&self, mode: RenderMode) {
        if self.send(HostMessage::SetRenderMode(mode)).is_err() {
            debug!("host render thread already exited");
        }
    }

    /// Returns the number of frames drawn and presented so far.
    pub fn frames_drawn(&self) -> u64 {
        lock(&self.shared.state).frames_drawn
    }

    /// Returns the error that detached the renderer, if any.
    pub fn failure(&self) -> Option<String> {
        lock(&self.shared.state).failure.clone()
    }

    /// Blocks until at least `count` frames were drawn. Returns false on timeout.
    pub fn wait_for_frames(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.shared.state);
        while state.frames_drawn < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .shared
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Stops and joins the render thread. Calling this more than once does nothing.
    pub fn destroy(&mut self) {
        if let Some(thread) = self.thread.take() {
            if self.sender.send(HostMessage::Stop).is_err() {
                debug!("host render thread already exited");
            }
            if thread.join().is_err() {
                error!("host render thread panicked");
            }
        }
    }
}

impl<P: Platform> Drop for HostedView<P> {
    fn drop(&mut self) {
        self.destroy();
    }
}

enum Detach {
    Destroyed(Sender<()>),
    Stopped,
}

struct RenderThread<P: Platform, R> {
    renderer: R,
    receiver: Receiver<HostMessage<P>>,
    shared: Arc<HostShared>,
    render_mode: RenderMode,
    frame_interval: Duration,
}

impl<P: Platform, R: Renderer> RenderThread<P, R> {
    fn run(&mut self, manager: &ContextManager<P>) {
        loop {
            let drawable = match self.receiver.recv() {
                Ok(HostMessage::DrawableAvailable(drawable)) => drawable,
                Ok(HostMessage::SetRenderMode(mode)) => {
                    self.render_mode = mode;
                    continue;
                }
                Ok(HostMessage::DrawableDestroyed(reply)) => {
                    acknowledge(reply);
                    continue;
                }
                Ok(HostMessage::Stop) | Err(_) => return,
                Ok(_) => continue,
            };

            match self.attach(manager, &drawable) {
                // The surface is gone by now.
                Ok(Detach::Destroyed(reply)) => acknowledge(reply),
                Ok(Detach::Stopped) => return,
                Err(err) => {
                    error!("host render thread failed: {}", err);
                    self.shared.update(|state| state.failure = Some(err.to_string()));
                }
            }
        }
    }

    fn attach(
        &mut self,
        manager: &ContextManager<P>,
        drawable: &NativeDrawable<P>,
    ) -> Result<Detach, Error> {
        let mut surface = SurfaceHandle::new(manager);
        surface.create_window_surface(drawable)?;
        surface.make_current_for_draw()?;
        let gl = manager.gl()?;

        self.renderer.on_surface_created(gl)?;
        self.renderer.on_surface_changed(gl, surface.size()?);
        let mut dirty = true;

        let detach = loop {
            if dirty || self.render_mode == RenderMode::Continuously {
                self.renderer.on_draw_frame(gl);
                surface.present();
                self.shared.update(|state| state.frames_drawn += 1);
                dirty = false;
            }

            let message = match self.render_mode {
                RenderMode::Continuously => match self.receiver.recv_timeout(self.frame_interval) {
                    Ok(message) => Some(message),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break Detach::Stopped,
                },
                RenderMode::WhenDirty => match self.receiver.recv() {
                    Ok(message) => Some(message),
                    Err(_) => break Detach::Stopped,
                },
            };
            match message {
                None => {}
                Some(HostMessage::RequestRender) => dirty = true,
                Some(HostMessage::SetRenderMode(mode)) => self.render_mode = mode,
                Some(HostMessage::DrawableChanged(size)) => {
                    self.renderer.on_surface_changed(gl, size);
                    dirty = true;
                }
                Some(HostMessage::DrawableAvailable(_)) => warn!("a drawable is already attached"),
                Some(HostMessage::DrawableDestroyed(reply)) => break Detach::Destroyed(reply),
                Some(HostMessage::Stop) => break Detach::Stopped,
            }
        };

        self.renderer.on_surface_destroyed(gl);
        if let Err(err) = manager.release_current() {
            error!("failed to release the context: {}", err);
        }
        surface.release();
        Ok(detach)
    }
}

fn acknowledge(reply: Sender<()>) {
    if reply.send(()).is_err() {
        debug!("nobody is waiting for the drawable release");
    }
}

/// Holds the frame a [`TexturedQuadRenderer`] draws. Clones share the same slot.
#[derive(Clone, Default)]
pub struct FrameSlot {
    frame: Arc<Mutex<Option<Frame>>>,
}

impl FrameSlot {
    pub fn load_bitmap(&self, image: Image) {
        *lock(&self.frame) = Some(Frame::new(image));
    }

    pub fn add_diagonal_line(&self, image: Image) {
        *lock(&self.frame) = Some(Frame { diagonal_line: true, ..Frame::new(image) });
    }

    pub fn clear(&self) {
        *lock(&self.frame) = None;
    }
}

/// The stock renderer: draws the bitmap in its [`FrameSlot`] as a full-viewport quad.
pub struct TexturedQuadRenderer {
    slot: FrameSlot,
    pass: Option<QuadPass>,
    viewport: Size2D<i32>,
}

impl TexturedQuadRenderer {
    pub fn new(slot: FrameSlot) -> TexturedQuadRenderer {
        TexturedQuadRenderer { slot, pass: None, viewport: Size2D::zero() }
    }
}

impl Renderer for TexturedQuadRenderer {
    fn on_surface_created(&mut self, gl: &Gl) -> Result<(), Error> {
        self.pass = Some(QuadPass::new(gl)?);
        Ok(())
    }

    fn on_surface_changed(&mut self, gl: &Gl, size: Size2D<i32>) {
        debug!("surface changed to {}x{}", size.width, size.height);
        self.viewport = size;
        unsafe {
            gl.clear_color(1.0, 0.0, 0.0, 1.0);
            gl.clear(gl::COLOR_BUFFER_BIT);
            gl.viewport(0, 0, size.width, size.height);
        }
    }

    fn on_draw_frame(&mut self, gl: &Gl) {
        let frame = lock(&self.slot.frame);
        match (frame.as_ref(), self.pass.as_ref()) {
            (Some(frame), Some(pass)) => {
                if let Err(err) = pass.draw(gl, frame, self.viewport) {
                    error!("drawing the frame failed: {}", err);
                }
            }
            _ => debug!("no bitmap loaded"),
        }
    }

    fn on_surface_destroyed(&mut self, gl: &Gl) {
        if let Some(pass) = self.pass.take() {
            pass.destroy(gl);
        }
    }
}
