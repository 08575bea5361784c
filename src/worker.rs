// eglquad/src/worker.rs
//
//! A render thread that draws one frame once a target becomes available.

use crate::config::{ConfigRequest, SurfaceType};
use crate::context::ContextManager;
use crate::image::{Image, SaveOptions};
use crate::platform::{NativeDrawable, Platform};
use crate::quad::{Frame, QuadPass};
use crate::surface::SurfaceHandle;
use crate::Error;

use euclid::default::Size2D;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Where the render pass draws.
pub enum RenderTarget<P: Platform> {
    /// A native window or texture-backed window.
    Drawable(NativeDrawable<P>),
    /// An off-screen pixel buffer of the given size.
    Offscreen(Size2D<i32>),
}

/// The lifecycle of a render worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for a render target.
    Idle,
    /// A target arrived; the context and surface are being built.
    Armed,
    /// Drawing.
    Rendering,
    /// Finished or stopped. The thread has exited or is about to.
    Done,
}

#[derive(Clone, Debug)]
pub struct WorkerOptions {
    pub config: ConfigRequest,
    /// Read the frame back into an image before presenting it.
    pub capture: bool,
    /// Write the captured frame here as a PNG. Implies `capture`.
    pub save_path: Option<PathBuf>,
    pub clear_color: [f32; 4],
}

impl Default for WorkerOptions {
    fn default() -> WorkerOptions {
        WorkerOptions {
            config: ConfigRequest::default(),
            capture: false,
            save_path: None,
            clear_color: [1.0, 0.0, 0.0, 1.0],
        }
    }
}

enum Message<P: Platform> {
    LoadBitmap { image: Image, diagonal_line: bool },
    TargetAvailable(RenderTarget<P>),
    TargetDestroyed(Sender<()>),
    Stop,
}

struct Shared {
    state: WorkerState,
    rendered_image: Option<Image>,
    presents_issued: u32,
    failure: Option<String>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A single-shot render worker.
///
/// The worker thread blocks until a render target arrives, draws the loaded bitmap into it
/// once, presents once, and exits. Context-bound work happens only on the worker thread.
pub struct RenderWorker<P: Platform> {
    sender: Sender<Message<P>>,
    shared: Arc<Mutex<Shared>>,
    thread: Option<JoinHandle<()>>,
}

impl<P> RenderWorker<P>
where
    P: Platform + Send + 'static,
{
    /// Starts the worker thread in the `Idle` state.
    pub fn spawn(platform: P, options: WorkerOptions) -> Result<RenderWorker<P>, Error> {
        let (sender, receiver) = mpsc::channel();
        let shared = Arc::new(Mutex::new(Shared {
            state: WorkerState::Idle,
            rendered_image: None,
            presents_issued: 0,
            failure: None,
        }));
        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name("eglquad render worker".to_owned())
            .spawn(move || run(platform, options, receiver, thread_shared))?;
        Ok(RenderWorker { sender, shared, thread: Some(thread) })
    }
}

impl<P: Platform> RenderWorker<P> {
    /// Hands a bitmap to the worker, replacing any earlier one.
    pub fn load_bitmap(&self, image: Image, diagonal_line: bool) -> Result<(), Error> {
        self.send(Message::LoadBitmap { image, diagonal_line })
    }

    /// Delivers the render target, which starts the single render pass.
    pub fn target_available(&self, target: RenderTarget<P>) -> Result<(), Error> {
        self.send(Message::TargetAvailable(target))
    }

    /// Tells the worker that the drawable it was handed is going away.
    ///
    /// Blocks until the worker no longer uses the drawable: right away if it is still waiting
    /// for a target, otherwise once the render pass has released its surface and the thread
    /// has exited.
    pub fn target_destroyed(&self) {
        let (reply_sender, reply_receiver) = mpsc::channel();
        if self.sender.send(Message::TargetDestroyed(reply_sender)).is_err() {
            debug!("render worker already exited");
            return;
        }
        // A disconnect means the worker exited without reading the message.
        if reply_receiver.recv().is_err() {
            debug!("render worker exited before acknowledging the destroyed target");
        }
    }

    /// Asks the worker to exit, dropping any pending bitmap. A blocked worker always wakes.
    pub fn stop_render(&self) {
        if self.sender.send(Message::Stop).is_err() {
            debug!("render worker already exited");
        }
    }

    /// Waits for the worker thread to exit.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("render worker panicked");
            }
        }
    }

    fn send(&self, message: Message<P>) -> Result<(), Error> {
        self.sender.send(message).map_err(|_| Error::WorkerTerminated)
    }

    pub fn state(&self) -> WorkerState {
        lock(&self.shared).state
    }

    /// Returns the captured frame once the render pass has finished.
    pub fn rendered_image(&self) -> Option<Image> {
        let shared = lock(&self.shared);
        match shared.state {
            WorkerState::Done => shared.rendered_image.clone(),
            _ => None,
        }
    }

    /// Returns how many times the render pass presented.
    pub fn presents_issued(&self) -> u32 {
        lock(&self.shared).presents_issued
    }

    /// Returns the error that ended the render pass, if any.
    pub fn failure(&self) -> Option<String> {
        lock(&self.shared).failure.clone()
    }
}

impl<P: Platform> Drop for RenderWorker<P> {
    fn drop(&mut self) {
        self.stop_render();
        self.join();
    }
}

fn run<P: Platform>(
    platform: P,
    options: WorkerOptions,
    receiver: Receiver<Message<P>>,
    shared: Arc<Mutex<Shared>>,
) {
    let mut frame = None;
    let target = loop {
        match receiver.recv() {
            Ok(Message::LoadBitmap { image, diagonal_line }) => {
                debug!("bitmap loaded ({}x{})", image.width(), image.height());
                frame = Some(Frame { image, diagonal_line, clear_color: options.clear_color });
            }
            Ok(Message::TargetAvailable(target)) => break Some(target),
            Ok(Message::TargetDestroyed(reply)) => {
                debug!("render target destroyed while idle");
                if reply.send(()).is_err() {
                    debug!("nobody is waiting for the destroyed-target reply");
                }
            }
            Ok(Message::Stop) => {
                debug!("render worker stopped while idle");
                break None;
            }
            Err(_) => break None,
        }
    };

    if let Some(target) = target {
        lock(&shared).state = WorkerState::Armed;
        if let Err(err) = render_pass(platform, &options, target, frame.as_ref(), &shared) {
            error!("render pass failed: {}", err);
            lock(&shared).failure = Some(err.to_string());
        }
    }
    lock(&shared).state = WorkerState::Done;
}

fn render_pass<P: Platform>(
    platform: P,
    options: &WorkerOptions,
    target: RenderTarget<P>,
    frame: Option<&Frame>,
    shared: &Mutex<Shared>,
) -> Result<(), Error> {
    let surface_type = match target {
        RenderTarget::Drawable(_) => SurfaceType::WINDOW,
        RenderTarget::Offscreen(_) => SurfaceType::PBUFFER,
    };
    let config = options.config.with_surface_type(surface_type);
    let manager = ContextManager::with_config(platform, &config);
    let mut surface = SurfaceHandle::new(&manager);
    match target {
        RenderTarget::Drawable(ref drawable) => surface.create_window_surface(drawable)?,
        RenderTarget::Offscreen(size) => surface.create_offscreen_surface(size.width, size.height)?,
    }
    surface.make_current_for_draw_reading(&surface)?;
    manager.log_current("render pass");
    lock(shared).state = WorkerState::Rendering;

    let frame = match frame {
        Some(frame) => frame,
        None => {
            warn!("no bitmap loaded, nothing to render");
            return manager.release_current();
        }
    };

    let gl = manager.gl()?;
    let pass = QuadPass::new(gl)?;
    let drawn = pass.draw(gl, frame, surface.size()?);
    pass.destroy(gl);
    drawn?;

    if options.capture || options.save_path.is_some() {
        let image = surface.capture_to_image()?;
        if let Some(ref path) = options.save_path {
            image.save_png(path, &SaveOptions::default())?;
            info!("saved rendered frame to {}", path.display());
        }
        lock(shared).rendered_image = Some(image);
    }

    lock(shared).presents_issued += 1;
    surface.present();
    manager.release_current()
}
