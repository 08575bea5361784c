// eglquad/src/platform/mod.rs
//
//! Platform-specific backends and the display-level interface they all implement.

use crate::config::{ConfigAttributes, ConfigRequest};
use crate::{Error, Gl};

use euclid::default::Size2D;
use std::fmt::{self, Debug, Formatter};

#[cfg(egl_backend)]
pub mod egl;

#[cfg(egl_backend)]
pub use self::egl::EglPlatform as DefaultPlatform;

/// Which of a surface's dimensions to query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceAttribute {
    Width,
    Height,
}

/// Which of the calling thread's current surfaces to ask about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceRole {
    Draw,
    Read,
}

/// A native drawable a window surface can be created against.
///
/// Backends accept exactly two kinds: a native window (the `Surface` of a surface view) and a
/// texture-backed window (the `SurfaceTexture` of a texture view).
pub enum NativeDrawable<P: Platform> {
    Window(P::NativeWindow),
    Texture(P::NativeTexture),
}

impl<P: Platform> Debug for NativeDrawable<P> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            NativeDrawable::Window(ref window) => f.debug_tuple("Window").field(window).finish(),
            NativeDrawable::Texture(ref texture) => {
                f.debug_tuple("Texture").field(texture).finish()
            }
        }
    }
}

impl<P: Platform> Clone for NativeDrawable<P>
where
    P::NativeWindow: Clone,
    P::NativeTexture: Clone,
{
    fn clone(&self) -> Self {
        match *self {
            NativeDrawable::Window(ref window) => NativeDrawable::Window(window.clone()),
            NativeDrawable::Texture(ref texture) => NativeDrawable::Texture(texture.clone()),
        }
    }
}

/// The display-level windowing API: displays, configs, contexts, surfaces, and the per-thread
/// current binding.
///
/// The shape follows EGL. Handles are plain copyable values; the platform owns the objects they
/// name until they are destroyed through it.
pub trait Platform: Sized {
    /// A display connection.
    type Display: Copy + PartialEq + Debug;
    /// A framebuffer configuration.
    type Config: Copy + PartialEq + Debug;
    /// A rendering context.
    type Context: Copy + PartialEq + Debug;
    /// A window or pixel-buffer surface.
    type Surface: Copy + PartialEq + Debug;
    /// The native window kind of drawable.
    type NativeWindow: Send + Debug;
    /// The texture-backed kind of drawable.
    type NativeTexture: Send + Debug;

    /// Returns the default display, or `None` if the platform has none.
    fn default_display(&self) -> Option<Self::Display>;

    /// Initializes the display, returning the major and minor API version.
    fn initialize(&self, display: Self::Display) -> Result<(i32, i32), Error>;

    /// Returns every config matching the request, in platform preference order.
    fn choose_configs(
        &self,
        display: Self::Display,
        request: &ConfigRequest,
    ) -> Result<Vec<Self::Config>, Error>;

    /// Returns the attributes a config offers.
    fn config_attributes(
        &self,
        display: Self::Display,
        config: Self::Config,
    ) -> Result<ConfigAttributes, Error>;

    /// Creates a rendering context with no share context.
    fn create_context(
        &self,
        display: Self::Display,
        config: Self::Config,
        client_version: u8,
    ) -> Result<Self::Context, Error>;

    /// Destroys a rendering context.
    fn destroy_context(&self, display: Self::Display, context: Self::Context) -> Result<(), Error>;

    /// Creates a surface that renders into the given native drawable.
    fn create_window_surface(
        &self,
        display: Self::Display,
        config: Self::Config,
        drawable: &NativeDrawable<Self>,
    ) -> Result<Self::Surface, Error>;

    /// Creates an off-screen pixel-buffer surface of the given size.
    fn create_pbuffer_surface(
        &self,
        display: Self::Display,
        config: Self::Config,
        size: Size2D<i32>,
    ) -> Result<Self::Surface, Error>;

    /// Destroys a surface.
    fn destroy_surface(&self, display: Self::Display, surface: Self::Surface) -> Result<(), Error>;

    /// Binds the context and surfaces to the calling thread. Passing `None` everywhere unbinds.
    fn make_current(
        &self,
        display: Self::Display,
        draw: Option<Self::Surface>,
        read: Option<Self::Surface>,
        context: Option<Self::Context>,
    ) -> Result<(), Error>;

    /// Returns the context current on the calling thread.
    fn current_context(&self) -> Option<Self::Context>;

    /// Returns the draw or read surface current on the calling thread.
    fn current_surface(&self, role: SurfaceRole) -> Option<Self::Surface>;

    /// Posts the back buffer of a window surface.
    fn swap_buffers(&self, display: Self::Display, surface: Self::Surface) -> Result<(), Error>;

    /// Attaches a presentation timestamp, in nanoseconds, to the next posted frame.
    fn set_presentation_time(
        &self,
        display: Self::Display,
        surface: Self::Surface,
        nanoseconds: i64,
    ) -> Result<(), Error>;

    /// Returns the current width or height of a surface.
    fn query_surface(
        &self,
        display: Self::Display,
        surface: Self::Surface,
        attribute: SurfaceAttribute,
    ) -> Result<i32, Error>;

    /// Loads the OpenGL ES entry points for a context. The context must be current on the
    /// calling thread.
    fn load_gl(&self, display: Self::Display, context: Self::Context) -> Result<Gl, Error>;
}
