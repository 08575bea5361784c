// eglquad/src/framebuffer.rs
//
//! A framebuffer object that renders into a texture.

use crate::image::Image;
use crate::surface;
use crate::{gl, Error, Gl, GlResource};

use euclid::default::Size2D;
use glow::{HasContext, PixelUnpackData};

/// A framebuffer object with an RGBA texture as its color attachment.
///
/// Drawing while the framebuffer is active lands in the texture, which can then be sampled by
/// another pass or read back. Call [`FrameBuffer::destroy`] with the owning context current.
pub struct FrameBuffer {
    framebuffer: glow::Framebuffer,
    texture: glow::Texture,
    size: Size2D<i32>,
}

impl FrameBuffer {
    /// Allocates the color texture, attaches it and checks completeness.
    ///
    /// The context owning `gl` must be current. The previous framebuffer and texture bindings
    /// are restored.
    pub fn new(gl: &Gl, size: Size2D<i32>) -> Result<FrameBuffer, Error> {
        unsafe {
            let texture = gl.create_texture().map_err(|err| {
                debug!("glGenTextures failed: {}", err);
                Error::ResourceCreationFailed(GlResource::Texture)
            })?;
            let old_texture = gl.get_parameter_texture(gl::TEXTURE_BINDING_2D);
            gl.bind_texture(gl::TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::NEAREST as i32);
            gl.tex_parameter_i32(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::NEAREST as i32);
            gl.tex_parameter_i32(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
            gl.tex_image_2d(
                gl::TEXTURE_2D,
                0,
                gl::RGBA as i32,
                size.width,
                size.height,
                0,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                PixelUnpackData::Slice(None),
            );
            gl.bind_texture(gl::TEXTURE_2D, old_texture);

            let framebuffer = match gl.create_framebuffer() {
                Ok(framebuffer) => framebuffer,
                Err(err) => {
                    debug!("glGenFramebuffers failed: {}", err);
                    gl.delete_texture(texture);
                    return Err(Error::ResourceCreationFailed(GlResource::Framebuffer));
                }
            };
            let old_framebuffer = gl.get_parameter_framebuffer(gl::FRAMEBUFFER_BINDING);
            gl.bind_framebuffer(gl::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(
                gl::FRAMEBUFFER,
                gl::COLOR_ATTACHMENT0,
                gl::TEXTURE_2D,
                Some(texture),
                0,
            );
            let status = gl.check_framebuffer_status(gl::FRAMEBUFFER);
            gl.bind_framebuffer(gl::FRAMEBUFFER, old_framebuffer);

            if status != gl::FRAMEBUFFER_COMPLETE {
                error!("framebuffer {:?} is incomplete: 0x{:x}", framebuffer, status);
                gl.delete_framebuffer(framebuffer);
                gl.delete_texture(texture);
                return Err(Error::IncompleteFramebuffer(status));
            }

            debug!("created {}x{} framebuffer {:?}", size.width, size.height, framebuffer);
            Ok(FrameBuffer { framebuffer, texture, size })
        }
    }

    #[inline]
    pub fn size(&self) -> Size2D<i32> {
        self.size
    }

    #[inline]
    pub fn framebuffer(&self) -> glow::Framebuffer {
        self.framebuffer
    }

    /// The color attachment, for sampling what was drawn.
    #[inline]
    pub fn texture(&self) -> glow::Texture {
        self.texture
    }

    /// Binds the framebuffer for drawing and reading and sets the viewport to cover it.
    pub fn activate(&self, gl: &Gl) {
        unsafe {
            gl.bind_framebuffer(gl::FRAMEBUFFER, Some(self.framebuffer));
            gl.viewport(0, 0, self.size.width, self.size.height);
        }
    }

    /// Returns true if this framebuffer is bound.
    pub fn is_active(&self, gl: &Gl) -> bool {
        unsafe { gl.get_parameter_framebuffer(gl::FRAMEBUFFER_BINDING) == Some(self.framebuffer) }
    }

    /// Rebinds the surface's default framebuffer if this one is bound.
    pub fn deactivate(&self, gl: &Gl) {
        if self.is_active(gl) {
            unsafe { gl.bind_framebuffer(gl::FRAMEBUFFER, None) }
        }
    }

    /// Reads the color attachment back, first row at the top.
    pub fn read_image(&self, gl: &Gl) -> Result<Image, Error> {
        if !self.is_active(gl) {
            return Err(Error::NotCurrent);
        }
        let mut image = surface::read_color_buffer(gl, self.size.width, self.size.height)?;
        image.flip_rows();
        Ok(image)
    }

    pub fn destroy(self, gl: &Gl) {
        self.deactivate(gl);
        unsafe {
            gl.delete_framebuffer(self.framebuffer);
            gl.delete_texture(self.texture);
        }
    }
}
