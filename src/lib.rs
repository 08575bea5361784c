// eglquad/src/lib.rs
//
//! Rendering-context lifecycle management and a single-shot textured-quad renderer.
//!
//! This crate wraps the display → config → context → surface sequence of EGL-style windowing
//! APIs, binds the result either to a native drawable or to an off-screen pixel buffer, and
//! draws a bitmap as a textured quad from a dedicated render thread. The rendered pixels can be
//! read back into an [`Image`] or written out as a PNG file.
//!
//! The [`Platform`] trait is implemented by the EGL backend, which renders with the system
//! OpenGL ES library through `glow`. On Android it uses the default EGL display; on Linux it
//! opens a surfaceless Mesa display, so off-screen rendering works without a window system.

#[macro_use]
extern crate log;

pub use glow as gl;
pub use glow::Context as Gl;

pub mod platform;
#[cfg(egl_backend)]
pub use crate::platform::DefaultPlatform;
pub use crate::platform::{NativeDrawable, Platform, SurfaceAttribute, SurfaceRole};

pub mod error;
pub use crate::error::{Error, GlResource, WindowingApiError};

mod config;
pub use crate::config::{ConfigAttributes, ConfigRequest, RenderableType, SurfaceType};

mod context;
pub use crate::context::ContextManager;

mod surface;
pub use crate::surface::SurfaceHandle;

mod image;
pub use crate::image::{Image, SaveOptions};

mod program;
pub use crate::program::Program;

mod framebuffer;
pub use crate::framebuffer::FrameBuffer;

pub mod quad;
pub use crate::quad::{Frame, QuadPass};

mod worker;
pub use crate::worker::{RenderTarget, RenderWorker, WorkerOptions, WorkerState};

pub mod host;

#[cfg(egl_backend)]
#[allow(non_camel_case_types, dead_code, clippy::all)]
mod egl {
    use std::os::raw::{c_long, c_void};
    pub type khronos_utime_nanoseconds_t = khronos_uint64_t;
    pub type khronos_uint64_t = u64;
    pub type khronos_ssize_t = c_long;
    pub type EGLint = i32;
    pub type EGLNativeDisplayType = *const c_void;
    pub type EGLNativePixmapType = *const c_void;
    pub type EGLNativeWindowType = *const c_void;
    pub type NativeDisplayType = EGLNativeDisplayType;
    pub type NativePixmapType = EGLNativePixmapType;
    pub type NativeWindowType = EGLNativeWindowType;
    include!(concat!(env!("OUT_DIR"), "/egl_bindings.rs"));
}

#[cfg(all(test, egl_backend))]
mod tests;
