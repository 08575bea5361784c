// eglquad/src/platform/egl/ffi.rs
//
//! Run-time loading of the system EGL and OpenGL ES libraries.

use crate::egl::types::{EGLBoolean, EGLDisplay, EGLSurface, EGLenum};
use crate::egl::Egl;
use crate::Error;

use libc::{dlopen, dlsym, RTLD_LAZY};
use std::ffi::{CStr, CString};
use std::mem;
use std::os::raw::c_void;
use std::ptr;
use std::sync::LazyLock;

pub const EGL_RECORDABLE_ANDROID: EGLenum = 0x3142;
#[cfg(not(android_platform))]
pub const EGL_PLATFORM_SURFACELESS_MESA: EGLenum = 0x31dd;

pub type EGLnsecsANDROID = i64;

pub type PresentationTimeANDROID =
    unsafe extern "C" fn(dpy: EGLDisplay, surface: EGLSurface, time: EGLnsecsANDROID) -> EGLBoolean;

struct LibraryHandle(*mut c_void);

unsafe impl Send for LibraryHandle {}
unsafe impl Sync for LibraryHandle {}

fn open_library(sonames: &[&CStr]) -> Option<LibraryHandle> {
    for soname in sonames {
        unsafe {
            let handle = dlopen(soname.as_ptr(), RTLD_LAZY);
            if !handle.is_null() {
                return Some(LibraryHandle(handle));
            }
        }
    }
    None
}

static EGL_LIBRARY: LazyLock<Option<LibraryHandle>> =
    LazyLock::new(|| open_library(&[c"libEGL.so.1", c"libEGL.so"]));

static GLES_LIBRARY: LazyLock<Option<LibraryHandle>> =
    LazyLock::new(|| open_library(&[c"libGLESv2.so.2", c"libGLESv2.so"]));

thread_local! {
    static EGL_FUNCTIONS: Option<Egl> = EGL_LIBRARY
        .as_ref()
        .map(|library| Egl::load_with(|symbol_name| lookup(library, symbol_name)));
}

fn lookup(library: &LibraryHandle, symbol_name: &str) -> *const c_void {
    let symbol_name = match CString::new(symbol_name) {
        Ok(symbol_name) => symbol_name,
        Err(_) => return ptr::null(),
    };
    unsafe { dlsym(library.0, symbol_name.as_ptr()).cast_const() }
}

/// Runs `f` with the EGL function table, or fails if there is no EGL library.
pub(crate) fn with_egl<R>(f: impl FnOnce(&Egl) -> R) -> Result<R, Error> {
    EGL_FUNCTIONS.with(|egl| match *egl {
        Some(ref egl) => Ok(f(egl)),
        None => Err(Error::NoGLLibraryFound),
    })
}

/// Resolves an OpenGL ES entry point, preferring the library export over `eglGetProcAddress`.
pub(crate) fn get_gl_proc_address(symbol_name: &str) -> *const c_void {
    if let Some(ref library) = *GLES_LIBRARY {
        let address = lookup(library, symbol_name);
        if !address.is_null() {
            return address;
        }
    }
    let symbol_name = match CString::new(symbol_name) {
        Ok(symbol_name) => symbol_name,
        Err(_) => return ptr::null(),
    };
    with_egl(|egl| unsafe { egl.GetProcAddress(symbol_name.as_ptr()) as *const c_void })
        .unwrap_or(ptr::null())
}

pub(crate) fn gles_library_available() -> bool {
    GLES_LIBRARY.is_some() || !get_gl_proc_address("glGetError").is_null()
}

pub(crate) fn lookup_presentation_time() -> Result<PresentationTimeANDROID, Error> {
    let address = with_egl(|egl| unsafe {
        egl.GetProcAddress(c"eglPresentationTimeANDROID".as_ptr()) as *const c_void
    })?;
    if address.is_null() {
        return Err(Error::RequiredExtensionUnavailable);
    }
    Ok(unsafe { mem::transmute::<*const c_void, PresentationTimeANDROID>(address) })
}
