// eglquad/src/surface.rs
//
//! Drawing surfaces bound to a context manager.

use crate::context::ContextManager;
use crate::image::{Image, SaveOptions};
use crate::platform::{NativeDrawable, Platform, SurfaceAttribute};
use crate::{gl, Error, Gl};

use euclid::default::Size2D;
use glow::{HasContext, PixelPackData};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// One drawing surface, either backed by a native drawable or off-screen.
///
/// A handle holds at most one surface at a time. The size of an off-screen surface is fixed at
/// creation; a window surface reports the live size of its native window.
pub struct SurfaceHandle<'a, P: Platform> {
    manager: &'a ContextManager<P>,
    surface: Option<P::Surface>,
    size: Option<Size2D<i32>>,
}

impl<'a, P: Platform> SurfaceHandle<'a, P> {
    pub fn new(manager: &'a ContextManager<P>) -> SurfaceHandle<'a, P> {
        SurfaceHandle { manager, surface: None, size: None }
    }

    #[inline]
    pub fn manager(&self) -> &'a ContextManager<P> {
        self.manager
    }

    /// Returns the underlying surface, if one was created and not yet released.
    #[inline]
    pub fn surface(&self) -> Option<P::Surface> {
        self.surface
    }

    /// Creates a surface that renders into `drawable`.
    pub fn create_window_surface(&mut self, drawable: &NativeDrawable<P>) -> Result<(), Error> {
        if self.surface.is_some() {
            return Err(Error::SurfaceAlreadyCreated);
        }
        self.surface = Some(self.manager.create_window_surface(drawable)?);
        Ok(())
    }

    /// Creates an off-screen surface of `width` by `height` pixels.
    pub fn create_offscreen_surface(&mut self, width: i32, height: i32) -> Result<(), Error> {
        if self.surface.is_some() {
            return Err(Error::SurfaceAlreadyCreated);
        }
        let size = Size2D::new(width, height);
        self.surface = Some(self.manager.create_offscreen_surface(size)?);
        self.size = Some(size);
        Ok(())
    }

    pub fn width(&self) -> Result<i32, Error> {
        self.dimension(SurfaceAttribute::Width)
    }

    pub fn height(&self) -> Result<i32, Error> {
        self.dimension(SurfaceAttribute::Height)
    }

    fn dimension(&self, attribute: SurfaceAttribute) -> Result<i32, Error> {
        let surface = self.surface.ok_or(Error::NoSurface)?;
        match (self.size, attribute) {
            (Some(size), SurfaceAttribute::Width) => Ok(size.width),
            (Some(size), SurfaceAttribute::Height) => Ok(size.height),
            (None, _) => self.manager.query_surface(surface, attribute),
        }
    }

    /// Returns the size of the surface in pixels.
    pub fn size(&self) -> Result<Size2D<i32>, Error> {
        Ok(Size2D::new(self.width()?, self.height()?))
    }

    /// Makes the manager's context current, drawing to and reading from this surface.
    pub fn make_current_for_draw(&self) -> Result<(), Error> {
        let surface = self.surface.ok_or(Error::NoSurface)?;
        self.manager.make_current(surface)
    }

    /// Makes the manager's context current, drawing to this surface and reading from `read`.
    pub fn make_current_for_draw_reading(&self, read: &SurfaceHandle<P>) -> Result<(), Error> {
        let draw = self.surface.ok_or(Error::NoSurface)?;
        let read = read.surface.ok_or(Error::NoSurface)?;
        self.manager.make_current_with_read(draw, read)
    }

    /// Returns true if the manager's context is current with this surface as its draw target.
    pub fn is_current(&self) -> bool {
        match self.surface {
            Some(surface) => self.manager.is_current(surface),
            None => false,
        }
    }

    /// Posts the back buffer. Returns false if there is no surface or the platform refuses.
    pub fn present(&self) -> bool {
        let surface = match self.surface {
            Some(surface) => surface,
            None => return false,
        };
        let presented = self.manager.swap_buffers(surface);
        if !presented {
            warn!("present failed on {:?}", surface);
        }
        presented
    }

    /// Attaches a presentation timestamp, in nanoseconds, to the next presented frame.
    pub fn set_presentation_time(&self, nanoseconds: i64) {
        if let Some(surface) = self.surface {
            self.manager.set_presentation_time(surface, nanoseconds);
        }
    }

    /// Reads the color buffer back into an image.
    ///
    /// The surface must be the current draw target of the calling thread.
    pub fn capture_to_image(&self) -> Result<Image, Error> {
        if !self.is_current() {
            return Err(Error::NotCurrent);
        }
        let (width, height) = (self.width()?, self.height()?);
        let gl = self.manager.gl()?;

        // Rows come back bottom-up.
        let mut image = read_color_buffer(gl, width, height)?;
        image.rotate_180();
        Ok(image)
    }

    /// Captures the color buffer and writes it to `path` as a PNG.
    pub fn save_to_file<Q: AsRef<Path>>(&self, path: Q) -> Result<(), Error> {
        self.save_to_file_with(path, &SaveOptions::default())
    }

    pub fn save_to_file_with<Q: AsRef<Path>>(
        &self,
        path: Q,
        options: &SaveOptions,
    ) -> Result<(), Error> {
        let path = path.as_ref();
        let image = self.capture_to_image()?;
        let writer = BufWriter::new(File::create(path)?);
        image.encode_png(writer, options)?;
        info!("saved {}x{} capture to {}", image.width(), image.height(), path.display());
        Ok(())
    }

    /// Destroys the surface. The handle can create a new one afterwards.
    pub fn release(&mut self) {
        self.size = None;
        if let Some(surface) = self.surface.take() {
            if let Err(err) = self.manager.destroy_surface(surface) {
                warn!("destroying surface {:?} failed: {}", surface, err);
            }
        }
    }
}

impl<'a, P: Platform> Drop for SurfaceHandle<'a, P> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Reads the `width` by `height` pixels at the origin of the current read framebuffer as
/// RGBA8, bottom row first.
pub(crate) fn read_color_buffer(gl: &Gl, width: i32, height: i32) -> Result<Image, Error> {
    let mut pixels = vec![0; width.max(0) as usize * height.max(0) as usize * 4];
    unsafe {
        gl.pixel_store_i32(gl::PACK_ALIGNMENT, 1);
        debug!(
            "implementation read format 0x{:x}, type 0x{:x}",
            gl.get_parameter_i32(gl::IMPLEMENTATION_COLOR_READ_FORMAT),
            gl.get_parameter_i32(gl::IMPLEMENTATION_COLOR_READ_TYPE)
        );
        gl.read_pixels(
            0,
            0,
            width,
            height,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            PixelPackData::Slice(Some(&mut pixels)),
        );
        let err = gl.get_error();
        if err != gl::NO_ERROR {
            error!("glReadPixels failed: 0x{:x}", err);
        }
    }
    Image::from_rgba(width.max(0) as u32, height.max(0) as u32, pixels)
}
