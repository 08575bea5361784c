// eglquad/src/platform/egl/mod.rs
//
//! The EGL backend, rendering with the system OpenGL ES library.
//!
//! On Android the default display is used. Elsewhere the backend opens a surfaceless Mesa
//! display, which supports pixel-buffer surfaces and no native windows.

use self::ffi::EGL_RECORDABLE_ANDROID;
use crate::config::{ConfigAttributes, ConfigRequest, RenderableType, SurfaceType};
use crate::egl;
use crate::egl::types::{EGLConfig, EGLContext, EGLDisplay, EGLSurface, EGLenum, EGLint};
use crate::egl::{Egl, EGLNativeWindowType};
use crate::platform::{NativeDrawable, Platform, SurfaceAttribute, SurfaceRole};
use crate::{Error, Gl, WindowingApiError};

use euclid::default::Size2D;
use rwh_06::RawWindowHandle;
use std::ffi::CStr;
use std::os::raw::c_void;
use std::ptr;

mod ffi;

/// The EGL display-level API.
#[derive(Clone, Copy, Debug, Default)]
pub struct EglPlatform;

/// An `ANativeWindow` from a surface view's `Surface`.
#[derive(Debug)]
pub struct NativeWindow(*mut c_void);

/// An `ANativeWindow` created from a texture view's `SurfaceTexture`.
#[derive(Debug)]
pub struct NativeTexture(*mut c_void);

unsafe impl Send for NativeWindow {}
unsafe impl Send for NativeTexture {}

impl NativeWindow {
    /// Wraps an `ANativeWindow` pointer.
    ///
    /// # Safety
    ///
    /// The window must stay alive until every surface created against it has been destroyed.
    pub unsafe fn from_native_window(window: *mut c_void) -> Result<NativeWindow, Error> {
        if window.is_null() {
            return Err(Error::InvalidNativeDrawable);
        }
        Ok(NativeWindow(window))
    }
}

impl NativeTexture {
    /// Wraps the `ANativeWindow` obtained from a `SurfaceTexture`.
    ///
    /// # Safety
    ///
    /// The window must stay alive until every surface created against it has been destroyed.
    pub unsafe fn from_native_window(window: *mut c_void) -> Result<NativeTexture, Error> {
        if window.is_null() {
            return Err(Error::InvalidNativeDrawable);
        }
        Ok(NativeTexture(window))
    }
}

impl NativeDrawable<EglPlatform> {
    /// Builds a window drawable from a raw window handle. Only Android NDK handles are accepted.
    ///
    /// # Safety
    ///
    /// The window behind the handle must outlive every surface created against it.
    pub unsafe fn from_raw_window_handle(
        handle: RawWindowHandle,
    ) -> Result<NativeDrawable<EglPlatform>, Error> {
        match handle {
            RawWindowHandle::AndroidNdk(handle) => Ok(NativeDrawable::Window(
                NativeWindow::from_native_window(handle.a_native_window.as_ptr())?,
            )),
            _ => Err(Error::IncompatibleNativeDrawable),
        }
    }
}

static ERROR_CODES: [(EGLenum, WindowingApiError); 14] = [
    (egl::NOT_INITIALIZED, WindowingApiError::NotInitialized),
    (egl::BAD_ACCESS, WindowingApiError::BadAccess),
    (egl::BAD_ALLOC, WindowingApiError::BadAlloc),
    (egl::BAD_ATTRIBUTE, WindowingApiError::BadAttribute),
    (egl::BAD_CONFIG, WindowingApiError::BadConfig),
    (egl::BAD_CONTEXT, WindowingApiError::BadContext),
    (egl::BAD_CURRENT_SURFACE, WindowingApiError::BadCurrentSurface),
    (egl::BAD_DISPLAY, WindowingApiError::BadDisplay),
    (egl::BAD_MATCH, WindowingApiError::BadMatch),
    (egl::BAD_NATIVE_PIXMAP, WindowingApiError::BadNativePixmap),
    (egl::BAD_NATIVE_WINDOW, WindowingApiError::BadNativeWindow),
    (egl::BAD_PARAMETER, WindowingApiError::BadParameter),
    (egl::BAD_SURFACE, WindowingApiError::BadSurface),
    (egl::CONTEXT_LOST, WindowingApiError::ContextLost),
];

fn windowing_api_error(code: EGLint) -> WindowingApiError {
    ERROR_CODES
        .iter()
        .find(|&&(egl_code, _)| egl_code as EGLint == code)
        .map_or(WindowingApiError::Failed, |&(_, err)| err)
}

/// Fetches and clears the calling thread's EGL error.
fn last_error(egl: &Egl) -> WindowingApiError {
    windowing_api_error(unsafe { egl.GetError() })
}

fn get_config_attr(
    egl: &Egl,
    display: EGLDisplay,
    config: EGLConfig,
    attr: EGLenum,
) -> Result<EGLint, WindowingApiError> {
    let mut value = 0;
    unsafe {
        if egl.GetConfigAttrib(display, config, attr as EGLint, &mut value) == egl::FALSE {
            return Err(last_error(egl));
        }
    }
    Ok(value)
}

fn attr_u8(value: EGLint) -> u8 {
    value.clamp(0, u8::MAX as EGLint) as u8
}

fn has_extension(egl: &Egl, display: EGLDisplay, name: &str) -> bool {
    unsafe {
        let extensions = egl.QueryString(display, egl::EXTENSIONS as EGLint);
        if extensions.is_null() {
            return false;
        }
        CStr::from_ptr(extensions)
            .to_string_lossy()
            .split_whitespace()
            .any(|extension| extension == name)
    }
}

#[cfg(android_platform)]
unsafe fn open_default_display(egl: &Egl) -> EGLDisplay {
    egl.GetDisplay(egl::DEFAULT_DISPLAY as egl::EGLNativeDisplayType)
}

#[cfg(not(android_platform))]
unsafe fn open_default_display(egl: &Egl) -> EGLDisplay {
    if !egl.GetPlatformDisplay.is_loaded() {
        debug!("eglGetPlatformDisplay is unavailable, falling back to eglGetDisplay");
        return egl.GetDisplay(egl::DEFAULT_DISPLAY as egl::EGLNativeDisplayType);
    }
    let attributes = [egl::NONE as egl::types::EGLAttrib];
    egl.GetPlatformDisplay(
        ffi::EGL_PLATFORM_SURFACELESS_MESA,
        egl::DEFAULT_DISPLAY as *mut c_void,
        attributes.as_ptr(),
    )
}

impl Platform for EglPlatform {
    type Display = EGLDisplay;
    type Config = EGLConfig;
    type Context = EGLContext;
    type Surface = EGLSurface;
    type NativeWindow = NativeWindow;
    type NativeTexture = NativeTexture;

    fn default_display(&self) -> Option<EGLDisplay> {
        let display = ffi::with_egl(|egl| unsafe { open_default_display(egl) }).ok()?;
        if display == egl::NO_DISPLAY {
            None
        } else {
            Some(display)
        }
    }

    fn initialize(&self, display: EGLDisplay) -> Result<(i32, i32), Error> {
        ffi::with_egl(|egl| unsafe {
            let (mut major, mut minor) = (0, 0);
            if egl.Initialize(display, &mut major, &mut minor) == egl::FALSE {
                return Err(Error::DisplayInitializationFailed(last_error(egl)));
            }
            Ok((major, minor))
        })?
    }

    fn choose_configs(
        &self,
        display: EGLDisplay,
        request: &ConfigRequest,
    ) -> Result<Vec<EGLConfig>, Error> {
        let mut attributes = vec![
            egl::RED_SIZE as EGLint,
            request.red_size as EGLint,
            egl::GREEN_SIZE as EGLint,
            request.green_size as EGLint,
            egl::BLUE_SIZE as EGLint,
            request.blue_size as EGLint,
            egl::ALPHA_SIZE as EGLint,
            request.alpha_size as EGLint,
            egl::DEPTH_SIZE as EGLint,
            request.depth_size as EGLint,
            egl::STENCIL_SIZE as EGLint,
            request.stencil_size as EGLint,
            egl::RENDERABLE_TYPE as EGLint,
            request.renderable.bits() as EGLint,
        ];
        // EGL assumes window surfaces unless told otherwise.
        let surface_type = if request.surface_type.is_empty() {
            egl::DONT_CARE as EGLint
        } else {
            request.surface_type.bits() as EGLint
        };
        attributes.extend_from_slice(&[egl::SURFACE_TYPE as EGLint, surface_type]);

        ffi::with_egl(|egl| unsafe {
            if request.recordable {
                if !has_extension(egl, display, "EGL_ANDROID_recordable") {
                    debug!("EGL_ANDROID_recordable is unsupported, no config is recordable");
                    return Ok(vec![]);
                }
                attributes.extend_from_slice(&[EGL_RECORDABLE_ANDROID as EGLint, 1]);
            }
            attributes.extend_from_slice(&[egl::NONE as EGLint, 0, 0, 0]);

            // Count first, then fetch.
            let mut config_count = 0;
            let result =
                egl.ChooseConfig(display, attributes.as_ptr(), ptr::null_mut(), 0, &mut config_count);
            if result == egl::FALSE {
                return Err(Error::PixelFormatSelectionFailed(last_error(egl)));
            }
            if config_count <= 0 {
                return Ok(vec![]);
            }

            let mut configs = vec![ptr::null(); config_count as usize];
            let result = egl.ChooseConfig(
                display,
                attributes.as_ptr(),
                configs.as_mut_ptr(),
                config_count,
                &mut config_count,
            );
            if result == egl::FALSE {
                return Err(Error::PixelFormatSelectionFailed(last_error(egl)));
            }
            configs.truncate(config_count.max(0) as usize);
            Ok(configs)
        })?
    }

    fn config_attributes(
        &self,
        display: EGLDisplay,
        config: EGLConfig,
    ) -> Result<ConfigAttributes, Error> {
        ffi::with_egl(|egl| {
            let get = |attr| {
                get_config_attr(egl, display, config, attr).map_err(Error::PixelFormatSelectionFailed)
            };
            let recordable = has_extension(egl, display, "EGL_ANDROID_recordable")
                && get(EGL_RECORDABLE_ANDROID)? != 0;
            Ok(ConfigAttributes {
                config_id: get(egl::CONFIG_ID)?,
                red_size: attr_u8(get(egl::RED_SIZE)?),
                green_size: attr_u8(get(egl::GREEN_SIZE)?),
                blue_size: attr_u8(get(egl::BLUE_SIZE)?),
                alpha_size: attr_u8(get(egl::ALPHA_SIZE)?),
                depth_size: attr_u8(get(egl::DEPTH_SIZE)?),
                stencil_size: attr_u8(get(egl::STENCIL_SIZE)?),
                renderable: RenderableType::from_bits_truncate(get(egl::RENDERABLE_TYPE)? as u32),
                surface_type: SurfaceType::from_bits_truncate(get(egl::SURFACE_TYPE)? as u32),
                recordable,
            })
        })?
    }

    fn create_context(
        &self,
        display: EGLDisplay,
        config: EGLConfig,
        client_version: u8,
    ) -> Result<EGLContext, Error> {
        let attributes = [
            egl::CONTEXT_CLIENT_VERSION as EGLint,
            client_version as EGLint,
            egl::NONE as EGLint,
            0,
            0,
            0,
        ];
        ffi::with_egl(|egl| unsafe {
            let context = egl.CreateContext(display, config, egl::NO_CONTEXT, attributes.as_ptr());
            if context == egl::NO_CONTEXT {
                return Err(Error::ContextCreationFailed(last_error(egl)));
            }
            Ok(context)
        })?
    }

    fn destroy_context(&self, display: EGLDisplay, context: EGLContext) -> Result<(), Error> {
        ffi::with_egl(|egl| unsafe {
            if egl.DestroyContext(display, context) == egl::FALSE {
                return Err(Error::ContextDestructionFailed(last_error(egl)));
            }
            Ok(())
        })?
    }

    fn create_window_surface(
        &self,
        display: EGLDisplay,
        config: EGLConfig,
        drawable: &NativeDrawable<EglPlatform>,
    ) -> Result<EGLSurface, Error> {
        let window = match *drawable {
            NativeDrawable::Window(ref window) => window.0,
            NativeDrawable::Texture(ref texture) => texture.0,
        };
        if window.is_null() {
            return Err(Error::InvalidNativeDrawable);
        }

        let attributes = [egl::NONE as EGLint];
        ffi::with_egl(|egl| unsafe {
            let surface = egl.CreateWindowSurface(
                display,
                config,
                window as EGLNativeWindowType,
                attributes.as_ptr(),
            );
            // Check the error code even when a handle came back.
            let result = egl.GetError();
            if surface == egl::NO_SURFACE || result != egl::SUCCESS as EGLint {
                return Err(Error::SurfaceCreationFailed(windowing_api_error(result)));
            }
            Ok(surface)
        })?
    }

    fn create_pbuffer_surface(
        &self,
        display: EGLDisplay,
        config: EGLConfig,
        size: Size2D<i32>,
    ) -> Result<EGLSurface, Error> {
        if size.width < 0 || size.height < 0 {
            return Err(Error::SurfaceCreationFailed(WindowingApiError::BadParameter));
        }
        let attributes = [
            egl::WIDTH as EGLint,
            size.width,
            egl::HEIGHT as EGLint,
            size.height,
            egl::NONE as EGLint,
            0,
            0,
            0,
        ];
        ffi::with_egl(|egl| unsafe {
            // A zero maximum means the driver does not report one.
            let max_width = get_config_attr(egl, display, config, egl::MAX_PBUFFER_WIDTH)
                .map_err(Error::SurfaceCreationFailed)?;
            let max_height = get_config_attr(egl, display, config, egl::MAX_PBUFFER_HEIGHT)
                .map_err(Error::SurfaceCreationFailed)?;
            if (max_width > 0 && size.width > max_width)
                || (max_height > 0 && size.height > max_height)
            {
                debug!(
                    "pbuffer {}x{} exceeds the {}x{} maximum",
                    size.width, size.height, max_width, max_height
                );
                return Err(Error::SurfaceCreationFailed(WindowingApiError::BadAlloc));
            }

            let surface = egl.CreatePbufferSurface(display, config, attributes.as_ptr());
            let result = egl.GetError();
            if surface == egl::NO_SURFACE || result != egl::SUCCESS as EGLint {
                return Err(Error::SurfaceCreationFailed(windowing_api_error(result)));
            }
            Ok(surface)
        })?
    }

    fn destroy_surface(&self, display: EGLDisplay, surface: EGLSurface) -> Result<(), Error> {
        ffi::with_egl(|egl| unsafe {
            if egl.DestroySurface(display, surface) == egl::FALSE {
                return Err(Error::SurfaceDestructionFailed(last_error(egl)));
            }
            Ok(())
        })?
    }

    fn make_current(
        &self,
        display: EGLDisplay,
        draw: Option<EGLSurface>,
        read: Option<EGLSurface>,
        context: Option<EGLContext>,
    ) -> Result<(), Error> {
        ffi::with_egl(|egl| unsafe {
            let result = egl.MakeCurrent(
                display,
                draw.unwrap_or(egl::NO_SURFACE),
                read.unwrap_or(egl::NO_SURFACE),
                context.unwrap_or(egl::NO_CONTEXT),
            );
            if result == egl::FALSE {
                return Err(Error::MakeCurrentFailed(last_error(egl)));
            }
            Ok(())
        })?
    }

    fn current_context(&self) -> Option<EGLContext> {
        let context = ffi::with_egl(|egl| unsafe { egl.GetCurrentContext() }).ok()?;
        if context == egl::NO_CONTEXT {
            None
        } else {
            Some(context)
        }
    }

    fn current_surface(&self, role: SurfaceRole) -> Option<EGLSurface> {
        let which = match role {
            SurfaceRole::Draw => egl::DRAW,
            SurfaceRole::Read => egl::READ,
        };
        let surface = ffi::with_egl(|egl| unsafe { egl.GetCurrentSurface(which as EGLint) }).ok()?;
        if surface == egl::NO_SURFACE {
            None
        } else {
            Some(surface)
        }
    }

    fn swap_buffers(&self, display: EGLDisplay, surface: EGLSurface) -> Result<(), Error> {
        ffi::with_egl(|egl| unsafe {
            if egl.SwapBuffers(display, surface) == egl::FALSE {
                return Err(Error::PresentFailed(last_error(egl)));
            }
            Ok(())
        })?
    }

    fn set_presentation_time(
        &self,
        display: EGLDisplay,
        surface: EGLSurface,
        nanoseconds: i64,
    ) -> Result<(), Error> {
        let presentation_time = ffi::lookup_presentation_time()?;
        ffi::with_egl(|egl| unsafe {
            if presentation_time(display, surface, nanoseconds) == egl::FALSE {
                return Err(Error::PresentFailed(last_error(egl)));
            }
            Ok(())
        })?
    }

    fn query_surface(
        &self,
        display: EGLDisplay,
        surface: EGLSurface,
        attribute: SurfaceAttribute,
    ) -> Result<i32, Error> {
        let attribute = match attribute {
            SurfaceAttribute::Width => egl::WIDTH,
            SurfaceAttribute::Height => egl::HEIGHT,
        };
        ffi::with_egl(|egl| unsafe {
            let mut value = 0;
            if egl.QuerySurface(display, surface, attribute as EGLint, &mut value) == egl::FALSE {
                return Err(Error::SurfaceQueryFailed(last_error(egl)));
            }
            Ok(value)
        })?
    }

    fn load_gl(&self, _: EGLDisplay, context: EGLContext) -> Result<Gl, Error> {
        // glow reads the version string while loading, which needs a current context.
        if self.current_context() != Some(context) {
            return Err(Error::NotCurrent);
        }
        if !ffi::gles_library_available() {
            return Err(Error::NoGLLibraryFound);
        }
        unsafe { Ok(Gl::from_loader_function(ffi::get_gl_proc_address)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(windowing_api_error(egl::BAD_ACCESS as EGLint), WindowingApiError::BadAccess);
        assert_eq!(
            windowing_api_error(egl::BAD_NATIVE_WINDOW as EGLint),
            WindowingApiError::BadNativeWindow
        );
        assert_eq!(windowing_api_error(egl::SUCCESS as EGLint), WindowingApiError::Failed);
        assert_eq!(windowing_api_error(0x7fff), WindowingApiError::Failed);
    }
}
