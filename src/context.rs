// eglquad/src/context.rs
//
//! Display, config and context management.

use crate::config::{ConfigAttributes, ConfigRequest};
use crate::platform::{NativeDrawable, Platform, SurfaceAttribute, SurfaceRole};
use crate::{Error, Gl};

use euclid::default::Size2D;
use std::cell::OnceCell;
use std::marker::PhantomData;

/// Owns a display connection, the chosen config, and one rendering context.
///
/// A context manager belongs to the thread that created it. Surfaces created through it are
/// made current on that thread, and the manager is not `Send`.
///
/// Setup failures in [`ContextManager::new`] are logged and leave the manager without a
/// display, config or context. Every later operation on such a manager returns
/// [`Error::NotInitialized`].
pub struct ContextManager<P: Platform> {
    platform: P,
    display: Option<P::Display>,
    config: Option<P::Config>,
    context: Option<P::Context>,
    gl: OnceCell<Gl>,
    phantom: PhantomData<*const ()>,
}

impl<P: Platform> ContextManager<P> {
    /// Sets up a display, config and context with the default config request.
    pub fn new(platform: P) -> ContextManager<P> {
        ContextManager::with_config(platform, &ConfigRequest::default())
    }

    /// Sets up a display, config and context, logging the first failure.
    pub fn with_config(platform: P, request: &ConfigRequest) -> ContextManager<P> {
        let mut manager = ContextManager::uninitialized(platform);
        if let Err(err) = manager.set_up(request) {
            error!("context manager setup failed: {}", err);
        }
        manager
    }

    /// Sets up a display, config and context, returning the first failure.
    pub fn try_new(platform: P, request: &ConfigRequest) -> Result<ContextManager<P>, Error> {
        let mut manager = ContextManager::uninitialized(platform);
        manager.set_up(request)?;
        Ok(manager)
    }

    fn uninitialized(platform: P) -> ContextManager<P> {
        ContextManager {
            platform,
            display: None,
            config: None,
            context: None,
            gl: OnceCell::new(),
            phantom: PhantomData,
        }
    }

    fn set_up(&mut self, request: &ConfigRequest) -> Result<(), Error> {
        self.initialize()?;
        let config = self.choose_config(request)?;
        self.config = Some(config);
        self.create_context(request.client_version())
    }

    /// Acquires and initializes the default display.
    pub fn initialize(&mut self) -> Result<(), Error> {
        let display = match self.platform.default_display() {
            Some(display) => display,
            None => return Err(Error::NoDisplay),
        };
        let (major, minor) = self.platform.initialize(display)?;
        debug!("initialized display {:?}, version {}.{}", display, major, minor);
        self.display = Some(display);
        Ok(())
    }

    /// Returns the first config, in platform order, that satisfies the request.
    pub fn choose_config(&self, request: &ConfigRequest) -> Result<P::Config, Error> {
        let display = self.display.ok_or(Error::NotInitialized)?;
        let configs = self.platform.choose_configs(display, request)?;
        match configs.into_iter().next() {
            Some(config) => {
                debug!("chose config {:?} for {:?}", config, request);
                Ok(config)
            }
            None => Err(Error::NoPixelFormatFound),
        }
    }

    /// Creates the rendering context for the chosen config.
    ///
    /// The GL entry points are loaded the first time the context is made current.
    pub fn create_context(&mut self, client_version: u8) -> Result<(), Error> {
        let display = self.display.ok_or(Error::NotInitialized)?;
        let config = self.config.ok_or(Error::NotInitialized)?;
        let context = self.platform.create_context(display, config, client_version)?;
        debug!("created context {:?} (client version {})", context, client_version);
        self.context = Some(context);
        Ok(())
    }

    /// Returns true once a display, config and context all exist.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.display.is_some() && self.config.is_some() && self.context.is_some()
    }

    #[inline]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    pub fn context(&self) -> Option<P::Context> {
        self.context
    }

    /// Returns the GL function table of this manager's context.
    ///
    /// Fails with [`Error::NotCurrent`] until the context has been made current once.
    pub fn gl(&self) -> Result<&Gl, Error> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }
        self.gl.get().ok_or(Error::NotCurrent)
    }

    /// Returns the attributes of the chosen config.
    pub fn config_attributes(&self) -> Result<ConfigAttributes, Error> {
        let (display, config) = self.display_and_config()?;
        self.platform.config_attributes(display, config)
    }

    fn display_and_config(&self) -> Result<(P::Display, P::Config), Error> {
        match (self.display, self.config) {
            (Some(display), Some(config)) => Ok((display, config)),
            _ => Err(Error::NotInitialized),
        }
    }

    fn display_and_context(&self) -> Result<(P::Display, P::Context), Error> {
        match (self.display, self.context) {
            (Some(display), Some(context)) => Ok((display, context)),
            _ => Err(Error::NotInitialized),
        }
    }

    /// Creates a surface that renders into a native window or texture-backed window.
    pub fn create_window_surface(
        &self,
        drawable: &NativeDrawable<P>,
    ) -> Result<P::Surface, Error> {
        let (display, config) = self.display_and_config()?;
        let surface = self.platform.create_window_surface(display, config, drawable)?;
        debug!("created window surface {:?} for {:?}", surface, drawable);
        Ok(surface)
    }

    /// Creates an off-screen surface of the given size.
    pub fn create_offscreen_surface(&self, size: Size2D<i32>) -> Result<P::Surface, Error> {
        let (display, config) = self.display_and_config()?;
        let surface = self.platform.create_pbuffer_surface(display, config, size)?;
        debug!("created offscreen surface {:?} ({}x{})", surface, size.width, size.height);
        Ok(surface)
    }

    /// Makes the context current on this thread, drawing to and reading from `surface`.
    pub fn make_current(&self, surface: P::Surface) -> Result<(), Error> {
        self.make_current_with_read(surface, surface)
    }

    /// Makes the context current on this thread with separate draw and read surfaces.
    pub fn make_current_with_read(&self, draw: P::Surface, read: P::Surface) -> Result<(), Error> {
        let (display, context) = match self.display_and_context() {
            Ok(pair) => pair,
            Err(err) => {
                warn!("make_current called without a display or context");
                return Err(err);
            }
        };
        self.platform
            .make_current(display, Some(draw), Some(read), Some(context))?;
        if self.gl.get().is_none() {
            let gl = self.platform.load_gl(display, context)?;
            self.gl.get_or_init(|| gl);
        }
        Ok(())
    }

    /// Unbinds any context and surfaces from this thread.
    pub fn release_current(&self) -> Result<(), Error> {
        let display = self.display.ok_or(Error::NotInitialized)?;
        self.platform.make_current(display, None, None, None)
    }

    /// Posts the back buffer of `surface`. Returns false on failure.
    pub fn swap_buffers(&self, surface: P::Surface) -> bool {
        let display = match self.display {
            Some(display) => display,
            None => return false,
        };
        match self.platform.swap_buffers(display, surface) {
            Ok(()) => true,
            Err(err) => {
                debug!("swap_buffers({:?}) failed: {}", surface, err);
                false
            }
        }
    }

    /// Forwards a presentation timestamp for the next frame posted on `surface`.
    pub fn set_presentation_time(&self, surface: P::Surface, nanoseconds: i64) {
        let display = match self.display {
            Some(display) => display,
            None => return,
        };
        if let Err(err) = self.platform.set_presentation_time(display, surface, nanoseconds) {
            warn!("setting presentation time on {:?} failed: {}", surface, err);
        }
    }

    /// Returns true if this manager's context and `surface` are current on this thread.
    pub fn is_current(&self, surface: P::Surface) -> bool {
        match self.context {
            Some(context) => {
                self.platform.current_context() == Some(context)
                    && self.platform.current_surface(SurfaceRole::Draw) == Some(surface)
            }
            None => false,
        }
    }

    /// Returns the width or height of a surface, in pixels.
    pub fn query_surface(
        &self,
        surface: P::Surface,
        attribute: SurfaceAttribute,
    ) -> Result<i32, Error> {
        let display = self.display.ok_or(Error::NotInitialized)?;
        self.platform.query_surface(display, surface, attribute)
    }

    /// Destroys a surface created through this manager.
    pub fn destroy_surface(&self, surface: P::Surface) -> Result<(), Error> {
        let display = self.display.ok_or(Error::NotInitialized)?;
        self.platform.destroy_surface(display, surface)
    }

    /// Writes the current display, context and surface to the log.
    pub fn log_current(&self, message: &str) {
        debug!(
            "current ({}): display={:?}, context={:?}, surface={:?}",
            message,
            self.display,
            self.platform.current_context(),
            self.platform.current_surface(SurfaceRole::Draw)
        );
    }
}

impl<P: Platform> Drop for ContextManager<P> {
    fn drop(&mut self) {
        let (display, context) = match (self.display, self.context.take()) {
            (Some(display), Some(context)) => (display, context),
            _ => return,
        };
        self.gl.take();
        if self.platform.current_context() == Some(context) {
            if let Err(err) = self.platform.make_current(display, None, None, None) {
                debug!("releasing the current context failed: {}", err);
            }
        }
        if let Err(err) = self.platform.destroy_context(display, context) {
            debug!("destroying context {:?} failed: {}", context, err);
        }
    }
}
