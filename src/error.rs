// eglquad/src/error.rs
//
//! Various errors that methods can produce.

use std::fmt::{self, Display, Formatter};
use std::io;

/// Various errors that methods can produce.
#[derive(Debug)]
pub enum Error {
    /// The platform reported no display to render to.
    NoDisplay,
    /// The display exists but could not be initialized.
    DisplayInitializationFailed(WindowingApiError),
    /// The context manager never finished its setup, so it has no display, config or context to
    /// work with.
    NotInitialized,
    /// Choosing a pixel format (config) failed.
    PixelFormatSelectionFailed(WindowingApiError),
    /// No config satisfies the requested attributes.
    NoPixelFormatFound,
    /// The system couldn't create a rendering context.
    ContextCreationFailed(WindowingApiError),
    /// The system couldn't destroy the rendering context.
    ContextDestructionFailed(WindowingApiError),
    /// The system couldn't make the context current or not current.
    MakeCurrentFailed(WindowingApiError),
    /// The system couldn't create a surface.
    SurfaceCreationFailed(WindowingApiError),
    /// The system couldn't destroy a surface.
    SurfaceDestructionFailed(WindowingApiError),
    /// Querying a surface attribute failed.
    SurfaceQueryFailed(WindowingApiError),
    /// The system couldn't present a window surface.
    PresentFailed(WindowingApiError),
    /// The surface handle already owns a surface.
    SurfaceAlreadyCreated,
    /// The surface handle does not own a surface.
    NoSurface,
    /// The surface is not the current draw surface of the calling thread.
    NotCurrent,
    /// The native drawable is null or no longer alive.
    InvalidNativeDrawable,
    /// The native drawable is not one of the kinds this backend can render to.
    IncompatibleNativeDrawable,
    /// An extension necessary for this operation isn't supported.
    RequiredExtensionUnavailable,
    /// The system EGL or GLES library couldn't be located.
    NoGLLibraryFound,
    /// Allocating an OpenGL object failed.
    ResourceCreationFailed(GlResource),
    /// A framebuffer object is not complete. Carries the `glCheckFramebufferStatus` result.
    IncompleteFramebuffer(u32),
    /// The render worker thread is gone.
    WorkerTerminated,
    /// Reading or writing a file failed.
    Io(io::Error),
    /// Encoding or decoding an image failed.
    ImageCodec(String),
    /// The pixel buffer does not match the image dimensions.
    InvalidImageData,
}

/// The kinds of OpenGL objects whose allocation can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlResource {
    Shader,
    Program,
    Texture,
    Buffer,
    Framebuffer,
}

/// Abstraction of the errors that EGL returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowingApiError {
    /// Miscellaneous error.
    Failed,
    /// EGL is not initialized, or could not be initialized, for the specified display.
    NotInitialized,
    /// EGL cannot access a requested resource (for example a context is bound in another
    /// thread).
    BadAccess,
    /// EGL failed to allocate resources for the requested operation.
    BadAlloc,
    /// An unrecognized attribute or attribute value was passed in the attribute list.
    BadAttribute,
    /// The config argument does not name a valid config.
    BadConfig,
    /// The context argument does not name a valid rendering context.
    BadContext,
    /// The current surface of the calling thread is no longer valid.
    BadCurrentSurface,
    /// The display argument does not name a valid display connection.
    BadDisplay,
    /// Arguments are inconsistent (for example, a valid context requires buffers not supplied
    /// by a valid surface).
    BadMatch,
    /// A native pixmap argument does not refer to a valid native pixmap.
    BadNativePixmap,
    /// A native window argument does not refer to a valid native window.
    BadNativeWindow,
    /// One or more argument values are invalid.
    BadParameter,
    /// A surface argument does not name a valid surface configured for GL rendering.
    BadSurface,
    /// A power management event has occurred. The application must destroy all contexts and
    /// reinitialise OpenGL ES state and objects to continue rendering.
    ContextLost,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Error::NoDisplay => f.write_str("no display available"),
            Error::DisplayInitializationFailed(err) => {
                write!(f, "display initialization failed: {:?}", err)
            }
            Error::NotInitialized => f.write_str("context manager is not initialized"),
            Error::PixelFormatSelectionFailed(err) => {
                write!(f, "config selection failed: {:?}", err)
            }
            Error::NoPixelFormatFound => f.write_str("no matching configuration"),
            Error::ContextCreationFailed(err) => write!(f, "context creation failed: {:?}", err),
            Error::ContextDestructionFailed(err) => {
                write!(f, "context destruction failed: {:?}", err)
            }
            Error::MakeCurrentFailed(err) => write!(f, "make current failed: {:?}", err),
            Error::SurfaceCreationFailed(err) => write!(f, "surface creation failed: {:?}", err),
            Error::SurfaceDestructionFailed(err) => {
                write!(f, "surface destruction failed: {:?}", err)
            }
            Error::SurfaceQueryFailed(err) => write!(f, "surface query failed: {:?}", err),
            Error::PresentFailed(err) => write!(f, "present failed: {:?}", err),
            Error::SurfaceAlreadyCreated => f.write_str("surface already created"),
            Error::NoSurface => f.write_str("no surface has been created"),
            Error::NotCurrent => f.write_str("expected context/surface is not current"),
            Error::InvalidNativeDrawable => f.write_str("invalid native drawable"),
            Error::IncompatibleNativeDrawable => {
                f.write_str("native drawable kind is not supported by this backend")
            }
            Error::RequiredExtensionUnavailable => f.write_str("required extension unavailable"),
            Error::NoGLLibraryFound => f.write_str("no EGL/GLES library found"),
            Error::ResourceCreationFailed(resource) => {
                write!(f, "failed to create {:?} object", resource)
            }
            Error::IncompleteFramebuffer(status) => {
                write!(f, "framebuffer incomplete: 0x{:x}", status)
            }
            Error::WorkerTerminated => f.write_str("render worker has terminated"),
            Error::Io(ref err) => write!(f, "I/O error: {}", err),
            Error::ImageCodec(ref message) => write!(f, "image codec error: {}", message),
            Error::InvalidImageData => f.write_str("pixel data does not match image size"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<png::EncodingError> for Error {
    fn from(err: png::EncodingError) -> Error {
        match err {
            png::EncodingError::IoError(err) => Error::Io(err),
            err => Error::ImageCodec(err.to_string()),
        }
    }
}

impl From<png::DecodingError> for Error {
    fn from(err: png::DecodingError) -> Error {
        match err {
            png::DecodingError::IoError(err) => Error::Io(err),
            err => Error::ImageCodec(err.to_string()),
        }
    }
}
