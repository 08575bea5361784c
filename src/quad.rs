// eglquad/src/quad.rs
//
//! The textured quad and its diagonal line overlay.

use crate::image::Image;
use crate::program::Program;
use crate::{gl, Error, Gl, GlResource};

use euclid::default::Size2D;
use glow::{HasContext, PixelUnpackData};
use std::{mem, slice};

/// Clip-space corners of a full-viewport triangle strip.
pub const QUAD_POSITIONS: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

/// Texture coordinates matching `QUAD_POSITIONS`. The first image row lands at the top.
pub const QUAD_TEX_COORDS: [f32; 8] = [0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];

/// Two line segments crossing the viewport corner to corner.
pub const DIAGONAL_LINE_POSITIONS: [f32; 8] = [-1.0, -1.0, 1.0, 1.0, 1.0, -1.0, -1.0, 1.0];

pub const LINE_WIDTH: f32 = 5.0;

pub static VERTEX_SHADER: &str = "\
attribute vec4 position;
attribute vec2 texcoord;
varying highp vec2 tex_coord;
void main() {
    gl_Position = position;
    tex_coord = texcoord;
}
";

pub static TEXTURE_FRAGMENT_SHADER: &str = "\
precision mediump float;
uniform sampler2D bitmap;
varying highp vec2 tex_coord;
void main() {
    gl_FragColor = texture2D(bitmap, tex_coord);
}
";

pub static LINE_FRAGMENT_SHADER: &str = "\
precision mediump float;
void main() {
    gl_FragColor = vec4(1.0, 0.0, 0.0, 1.0);
}
";

/// What one pass draws.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: Image,
    pub diagonal_line: bool,
    pub clear_color: [f32; 4],
}

impl Frame {
    pub fn new(image: Image) -> Frame {
        Frame { image, diagonal_line: false, clear_color: [1.0, 0.0, 0.0, 1.0] }
    }
}

/// Programs and vertex buffers for drawing frames.
pub struct QuadPass {
    texture_program: Program,
    line_program: Program,
    position_buffer: glow::Buffer,
    tex_coord_buffer: glow::Buffer,
    line_buffer: glow::Buffer,
}

impl QuadPass {
    /// Builds both programs and uploads the vertex data.
    ///
    /// The context owning `gl` must be current.
    pub fn new(gl: &Gl) -> Result<QuadPass, Error> {
        let texture_program = Program::new(gl, VERTEX_SHADER, TEXTURE_FRAGMENT_SHADER)?;
        let line_program = Program::new(gl, VERTEX_SHADER, LINE_FRAGMENT_SHADER)?;
        unsafe {
            let position_buffer = upload_buffer(gl, &QUAD_POSITIONS)?;
            let tex_coord_buffer = upload_buffer(gl, &QUAD_TEX_COORDS)?;
            let line_buffer = upload_buffer(gl, &DIAGONAL_LINE_POSITIONS)?;
            gl.bind_buffer(gl::ARRAY_BUFFER, None);
            Ok(QuadPass {
                texture_program,
                line_program,
                position_buffer,
                tex_coord_buffer,
                line_buffer,
            })
        }
    }

    /// Draws `frame` over the whole viewport.
    pub fn draw(&self, gl: &Gl, frame: &Frame, viewport: Size2D<i32>) -> Result<(), Error> {
        unsafe {
            gl.viewport(0, 0, viewport.width, viewport.height);
            let [red, green, blue, alpha] = frame.clear_color;
            gl.clear_color(red, green, blue, alpha);
            gl.clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);

            gl.active_texture(gl::TEXTURE0);
            let texture = gl.create_texture().map_err(|err| {
                debug!("glGenTextures failed: {}", err);
                Error::ResourceCreationFailed(GlResource::Texture)
            })?;
            gl.bind_texture(gl::TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::NEAREST as i32);
            gl.tex_parameter_i32(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::NEAREST as i32);
            gl.tex_parameter_i32(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
            gl.pixel_store_i32(gl::UNPACK_ALIGNMENT, 1);
            gl.tex_image_2d(
                gl::TEXTURE_2D,
                0,
                gl::RGBA as i32,
                frame.image.width() as i32,
                frame.image.height() as i32,
                0,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(frame.image.pixels())),
            );

            self.texture_program.use_program(gl);
            if let Some(location) = self.texture_program.uniform_location(gl, "bitmap") {
                gl.uniform_1_i32(Some(&location), 0);
            }
            bind_attribute(gl, &self.texture_program, "position", self.position_buffer, 2);
            bind_attribute(gl, &self.texture_program, "texcoord", self.tex_coord_buffer, 2);
            gl.draw_arrays(gl::TRIANGLE_STRIP, 0, 4);

            if frame.diagonal_line {
                self.line_program.use_program(gl);
                bind_attribute(gl, &self.line_program, "position", self.line_buffer, 2);
                gl.line_width(LINE_WIDTH);
                gl.draw_arrays(gl::LINES, 0, 4);
            }

            gl.bind_texture(gl::TEXTURE_2D, None);
            gl.delete_texture(texture);
            gl.bind_buffer(gl::ARRAY_BUFFER, None);
            gl.use_program(None);
        }
        Ok(())
    }

    pub fn destroy(self, gl: &Gl) {
        unsafe {
            gl.delete_buffer(self.position_buffer);
            gl.delete_buffer(self.tex_coord_buffer);
            gl.delete_buffer(self.line_buffer);
        }
        self.texture_program.destroy(gl);
        self.line_program.destroy(gl);
    }
}

unsafe fn bind_attribute(
    gl: &Gl,
    program: &Program,
    name: &str,
    buffer: glow::Buffer,
    components: i32,
) {
    match program.attribute_location(gl, name) {
        Some(location) => {
            gl.bind_buffer(gl::ARRAY_BUFFER, Some(buffer));
            gl.vertex_attrib_pointer_f32(location, components, gl::FLOAT, false, 0, 0);
            gl.enable_vertex_attrib_array(location);
        }
        None => debug!("attribute {} is not active", name),
    }
}

unsafe fn upload_buffer(gl: &Gl, data: &[f32]) -> Result<glow::Buffer, Error> {
    let buffer = gl.create_buffer().map_err(|err| {
        debug!("glGenBuffers failed: {}", err);
        Error::ResourceCreationFailed(GlResource::Buffer)
    })?;
    gl.bind_buffer(gl::ARRAY_BUFFER, Some(buffer));
    let bytes = slice::from_raw_parts(data.as_ptr() as *const u8, mem::size_of_val(data));
    gl.buffer_data_u8_slice(gl::ARRAY_BUFFER, bytes, gl::STATIC_DRAW);
    Ok(buffer)
}
