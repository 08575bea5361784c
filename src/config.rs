// eglquad/src/config.rs
//
//! Framebuffer configuration requests.

use bitflags::bitflags;

bitflags! {
    /// The client APIs a config can render with, as in `EGL_RENDERABLE_TYPE`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct RenderableType: u32 {
        const OPENGL_ES  = 0x0001;
        const OPENVG     = 0x0002;
        const OPENGL_ES2 = 0x0004;
        const OPENGL     = 0x0008;
        const OPENGL_ES3 = 0x0040;
    }
}

bitflags! {
    /// The surface kinds a config can back, as in `EGL_SURFACE_TYPE`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SurfaceType: u32 {
        const PBUFFER = 0x0001;
        const PIXMAP  = 0x0002;
        const WINDOW  = 0x0004;
    }
}

/// The attributes a config has to satisfy.
///
/// Channel sizes are minimums. A config with more bits than requested is still a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigRequest {
    pub red_size: u8,
    pub green_size: u8,
    pub blue_size: u8,
    pub alpha_size: u8,
    pub depth_size: u8,
    pub stencil_size: u8,
    pub renderable: RenderableType,
    /// Surface kinds the config must support. Empty places no constraint.
    pub surface_type: SurfaceType,
    /// Ask for a config whose surfaces can feed a video encoder (`EGL_RECORDABLE_ANDROID`).
    pub recordable: bool,
}

impl Default for ConfigRequest {
    fn default() -> ConfigRequest {
        ConfigRequest {
            red_size: 8,
            green_size: 8,
            blue_size: 8,
            alpha_size: 8,
            depth_size: 16,
            stencil_size: 0,
            renderable: RenderableType::OPENGL_ES2,
            surface_type: SurfaceType::empty(),
            recordable: false,
        }
    }
}

impl ConfigRequest {
    /// The context client version implied by the requested renderable type.
    pub fn client_version(&self) -> u8 {
        if self.renderable.contains(RenderableType::OPENGL_ES3) {
            3
        } else {
            2
        }
    }

    /// Returns a copy of this request that also requires `surface_type`.
    pub fn with_surface_type(mut self, surface_type: SurfaceType) -> ConfigRequest {
        self.surface_type |= surface_type;
        self
    }

    /// Returns true if a config with the given attributes meets every minimum in this request.
    pub fn is_satisfied_by(&self, attributes: &ConfigAttributes) -> bool {
        attributes.red_size >= self.red_size
            && attributes.green_size >= self.green_size
            && attributes.blue_size >= self.blue_size
            && attributes.alpha_size >= self.alpha_size
            && attributes.depth_size >= self.depth_size
            && attributes.stencil_size >= self.stencil_size
            && attributes.renderable.contains(self.renderable)
            && attributes.surface_type.contains(self.surface_type)
            && (!self.recordable || attributes.recordable)
    }
}

/// The attributes a platform config actually offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigAttributes {
    pub config_id: i32,
    pub red_size: u8,
    pub green_size: u8,
    pub blue_size: u8,
    pub alpha_size: u8,
    pub depth_size: u8,
    pub stencil_size: u8,
    pub renderable: RenderableType,
    pub surface_type: SurfaceType,
    pub recordable: bool,
}

impl ConfigAttributes {
    /// Bits per pixel across the four colour channels.
    pub fn color_bits(&self) -> u32 {
        self.red_size as u32 + self.green_size as u32 + self.blue_size as u32 + self.alpha_size as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba8(depth: u8, stencil: u8) -> ConfigAttributes {
        ConfigAttributes {
            config_id: 1,
            red_size: 8,
            green_size: 8,
            blue_size: 8,
            alpha_size: 8,
            depth_size: depth,
            stencil_size: stencil,
            renderable: RenderableType::OPENGL_ES | RenderableType::OPENGL_ES2,
            surface_type: SurfaceType::PBUFFER,
            recordable: false,
        }
    }

    #[test]
    fn test_default_request_matches_rgba8_depth16() {
        let request = ConfigRequest::default();
        assert!(request.is_satisfied_by(&rgba8(16, 0)));
        assert!(request.is_satisfied_by(&rgba8(24, 8)));
        assert!(!request.is_satisfied_by(&rgba8(0, 0)));
        assert_eq!(request.client_version(), 2);
    }

    #[test]
    fn test_renderable_bits_must_all_be_present() {
        let request = ConfigRequest {
            renderable: RenderableType::OPENGL_ES2 | RenderableType::OPENGL_ES3,
            ..ConfigRequest::default()
        };
        assert!(!request.is_satisfied_by(&rgba8(16, 0)));
        assert_eq!(request.client_version(), 3);
    }

    #[test]
    fn test_surface_type_constraint() {
        let pbuffer_only = rgba8(16, 0);
        assert!(ConfigRequest::default().is_satisfied_by(&pbuffer_only));

        let request = ConfigRequest::default().with_surface_type(SurfaceType::PBUFFER);
        assert!(request.is_satisfied_by(&pbuffer_only));
        let request = request.with_surface_type(SurfaceType::WINDOW);
        assert_eq!(request.surface_type, SurfaceType::PBUFFER | SurfaceType::WINDOW);
        assert!(!request.is_satisfied_by(&pbuffer_only));
    }

    #[test]
    fn test_recordable_is_only_required_when_requested() {
        let request = ConfigRequest { recordable: true, ..ConfigRequest::default() };
        let mut attributes = rgba8(16, 0);
        assert!(!request.is_satisfied_by(&attributes));
        attributes.recordable = true;
        assert!(request.is_satisfied_by(&attributes));
        assert_eq!(attributes.color_bits(), 32);
    }
}
