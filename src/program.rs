// eglquad/src/program.rs
//
//! Shader programs.

use crate::{gl, Error, Gl, GlResource};

use glow::{HasContext, UniformLocation};

/// A linked vertex and fragment shader pair.
///
/// Compile, link and validation failures are logged and leave the program unusable rather than
/// failing construction. Using an unusable program does nothing.
pub struct Program {
    object: glow::Program,
    usable: bool,
}

impl Program {
    /// Compiles both stages, links them and validates the result.
    ///
    /// The context owning `gl` must be current.
    pub fn new(gl: &Gl, vertex_source: &str, fragment_source: &str) -> Result<Program, Error> {
        unsafe {
            let vertex = compile_shader(gl, gl::VERTEX_SHADER, vertex_source)?;
            let fragment = match compile_shader(gl, gl::FRAGMENT_SHADER, fragment_source) {
                Ok(fragment) => fragment,
                Err(err) => {
                    gl.delete_shader(vertex.0);
                    return Err(err);
                }
            };

            let object = match gl.create_program() {
                Ok(object) => object,
                Err(err) => {
                    debug!("glCreateProgram failed: {}", err);
                    gl.delete_shader(vertex.0);
                    gl.delete_shader(fragment.0);
                    return Err(Error::ResourceCreationFailed(GlResource::Program));
                }
            };

            let mut usable = vertex.1 && fragment.1;
            if usable {
                gl.attach_shader(object, vertex.0);
                gl.attach_shader(object, fragment.0);
                gl.link_program(object);
                if !gl.get_program_link_status(object) {
                    error!("program link failed");
                    debug!("program info log: {}", gl.get_program_info_log(object));
                    usable = false;
                }
            }
            if usable {
                gl.validate_program(object);
                if !gl.get_program_validate_status(object) {
                    error!("program validation failed");
                    debug!("program info log: {}", gl.get_program_info_log(object));
                    usable = false;
                }
            }

            // The program keeps attached shaders alive.
            gl.delete_shader(vertex.0);
            gl.delete_shader(fragment.0);

            Ok(Program { object, usable })
        }
    }

    #[inline]
    pub fn is_usable(&self) -> bool {
        self.usable
    }

    #[inline]
    pub fn object(&self) -> glow::Program {
        self.object
    }

    /// Installs the program for drawing, or logs a warning if it failed to build.
    pub fn use_program(&self, gl: &Gl) {
        if !self.usable {
            warn!("ignoring use of unusable program {:?}", self.object);
            return;
        }
        unsafe { gl.use_program(Some(self.object)) }
    }

    pub fn attribute_location(&self, gl: &Gl, name: &str) -> Option<u32> {
        if !self.usable {
            return None;
        }
        unsafe { gl.get_attrib_location(self.object, name) }
    }

    pub fn uniform_location(&self, gl: &Gl, name: &str) -> Option<UniformLocation> {
        if !self.usable {
            return None;
        }
        unsafe { gl.get_uniform_location(self.object, name) }
    }

    pub fn destroy(self, gl: &Gl) {
        unsafe { gl.delete_program(self.object) }
    }
}

// Returns the shader and whether it compiled.
unsafe fn compile_shader(gl: &Gl, kind: u32, source: &str) -> Result<(glow::Shader, bool), Error> {
    let stage = if kind == gl::VERTEX_SHADER { "vertex" } else { "fragment" };
    let shader = gl.create_shader(kind).map_err(|err| {
        debug!("glCreateShader failed: {}", err);
        Error::ResourceCreationFailed(GlResource::Shader)
    })?;
    if source.trim().is_empty() {
        error!("{} shader source is empty", stage);
        return Ok((shader, false));
    }
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        error!("{} shader failed to compile", stage);
        debug!("shader info log: {}", gl.get_shader_info_log(shader));
        return Ok((shader, false));
    }
    Ok((shader, true))
}
