// eglquad/src/tests.rs
//
//! Unit tests, run against a surfaceless EGL display.
//!
//! Window drawables are stood in for by `HeadlessPlatform`, which backs each test window with a
//! pixel buffer on the real display and records what the window receives.

use crate::config::{ConfigAttributes, ConfigRequest, RenderableType, SurfaceType};
use crate::context::ContextManager;
use crate::egl::types::{EGLConfig, EGLContext, EGLDisplay, EGLSurface};
use crate::framebuffer::FrameBuffer;
use crate::host::{FrameSlot, HostOptions, HostedView, RenderMode, TexturedQuadRenderer, WorkerView};
use crate::image::Image;
use crate::platform::egl::EglPlatform;
use crate::platform::{NativeDrawable, Platform, SurfaceAttribute, SurfaceRole};
use crate::program::Program;
use crate::quad::{Frame, QuadPass, LINE_FRAGMENT_SHADER, TEXTURE_FRAGMENT_SHADER, VERTEX_SHADER};
use crate::surface::{self, SurfaceHandle};
use crate::worker::{RenderTarget, RenderWorker, WorkerOptions, WorkerState};
use crate::{gl, DefaultPlatform, Error, Gl, WindowingApiError};

use euclid::default::Size2D;
use glow::{HasContext, PixelPackData};
use rand::seq::SliceRandom;
use rand::Rng;
use serial_test::serial;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

const FRAME_TIMEOUT: Duration = Duration::from_secs(10);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct WindowState {
    size: Size2D<i32>,
    connected: bool,
    released: bool,
    presents: u64,
    presentation_time: Option<i64>,
    front: Option<Image>,
}

/// A native window stand-in. Clones share the same window.
#[derive(Clone, Debug)]
struct TestWindow(Arc<Mutex<WindowState>>);

impl TestWindow {
    fn new(width: i32, height: i32) -> TestWindow {
        TestWindow(Arc::new(Mutex::new(WindowState {
            size: Size2D::new(width, height),
            connected: false,
            released: false,
            presents: 0,
            presentation_time: None,
            front: None,
        })))
    }

    fn resize(&self, width: i32, height: i32) {
        lock(&self.0).size = Size2D::new(width, height);
    }

    /// Gives the window up, the way a host frees its `Surface`.
    fn release(&self) {
        lock(&self.0).released = true;
    }

    fn size(&self) -> Size2D<i32> {
        lock(&self.0).size
    }

    fn is_connected(&self) -> bool {
        lock(&self.0).connected
    }

    fn is_released(&self) -> bool {
        lock(&self.0).released
    }

    fn presents(&self) -> u64 {
        lock(&self.0).presents
    }

    fn presentation_time(&self) -> Option<i64> {
        lock(&self.0).presentation_time
    }

    /// The last posted frame, first row at the top.
    fn front_buffer(&self) -> Option<Image> {
        lock(&self.0).front.clone()
    }
}

/// A texture-backed window stand-in.
#[derive(Clone, Debug)]
struct TestTexture(TestWindow);

impl TestTexture {
    fn new(width: i32, height: i32) -> TestTexture {
        TestTexture(TestWindow::new(width, height))
    }

    fn window(&self) -> &TestWindow {
        &self.0
    }
}

#[derive(Default)]
struct HeadlessState {
    no_display: bool,
    fail_initialize: bool,
    live_contexts: usize,
    live_surfaces: usize,
    requested_surface_types: Vec<SurfaceType>,
    // Keyed by surface address.
    windows: HashMap<usize, TestWindow>,
}

/// The EGL platform with window surfaces backed by pixel buffers.
#[derive(Clone, Default)]
struct HeadlessPlatform {
    egl: EglPlatform,
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessPlatform {
    fn no_display() -> HeadlessPlatform {
        let platform = HeadlessPlatform::default();
        lock(&platform.state).no_display = true;
        platform
    }

    fn fail_initialize() -> HeadlessPlatform {
        let platform = HeadlessPlatform::default();
        lock(&platform.state).fail_initialize = true;
        platform
    }

    fn live_contexts(&self) -> usize {
        lock(&self.state).live_contexts
    }

    fn live_surfaces(&self) -> usize {
        lock(&self.state).live_surfaces
    }

    fn requested_surface_types(&self) -> Vec<SurfaceType> {
        lock(&self.state).requested_surface_types.clone()
    }

    fn window(&self, surface: EGLSurface) -> Option<TestWindow> {
        lock(&self.state).windows.get(&(surface as usize)).cloned()
    }

    fn is_released_window(&self, surface: Option<EGLSurface>) -> bool {
        surface
            .and_then(|surface| self.window(surface))
            .map_or(false, |window| window.is_released())
    }

    // Reads what the window is about to receive.
    fn read_back_buffer(
        &self,
        display: EGLDisplay,
        surface: EGLSurface,
        size: Size2D<i32>,
    ) -> Option<Image> {
        let context = self.egl.current_context()?;
        if self.egl.current_surface(SurfaceRole::Draw) != Some(surface) {
            return None;
        }
        let gl = self.egl.load_gl(display, context).ok()?;
        let mut image = surface::read_color_buffer(&gl, size.width, size.height).ok()?;
        image.rotate_180();
        Some(image)
    }
}

impl Platform for HeadlessPlatform {
    type Display = EGLDisplay;
    type Config = EGLConfig;
    type Context = EGLContext;
    type Surface = EGLSurface;
    type NativeWindow = TestWindow;
    type NativeTexture = TestTexture;

    fn default_display(&self) -> Option<EGLDisplay> {
        if lock(&self.state).no_display {
            return None;
        }
        self.egl.default_display()
    }

    fn initialize(&self, display: EGLDisplay) -> Result<(i32, i32), Error> {
        if lock(&self.state).fail_initialize {
            return Err(Error::DisplayInitializationFailed(WindowingApiError::NotInitialized));
        }
        self.egl.initialize(display)
    }

    fn choose_configs(
        &self,
        display: EGLDisplay,
        request: &ConfigRequest,
    ) -> Result<Vec<EGLConfig>, Error> {
        let mut request = *request;
        lock(&self.state).requested_surface_types.push(request.surface_type);
        if request.surface_type.contains(SurfaceType::WINDOW) {
            request.surface_type.remove(SurfaceType::WINDOW);
            request.surface_type.insert(SurfaceType::PBUFFER);
        }
        self.egl.choose_configs(display, &request)
    }

    fn config_attributes(
        &self,
        display: EGLDisplay,
        config: EGLConfig,
    ) -> Result<ConfigAttributes, Error> {
        self.egl.config_attributes(display, config)
    }

    fn create_context(
        &self,
        display: EGLDisplay,
        config: EGLConfig,
        client_version: u8,
    ) -> Result<EGLContext, Error> {
        let context = self.egl.create_context(display, config, client_version)?;
        lock(&self.state).live_contexts += 1;
        Ok(context)
    }

    fn destroy_context(&self, display: EGLDisplay, context: EGLContext) -> Result<(), Error> {
        self.egl.destroy_context(display, context)?;
        lock(&self.state).live_contexts -= 1;
        Ok(())
    }

    fn create_window_surface(
        &self,
        display: EGLDisplay,
        config: EGLConfig,
        drawable: &NativeDrawable<HeadlessPlatform>,
    ) -> Result<EGLSurface, Error> {
        let window = match *drawable {
            NativeDrawable::Window(ref window) => window.clone(),
            NativeDrawable::Texture(ref texture) => texture.window().clone(),
        };
        if window.is_released() {
            return Err(Error::InvalidNativeDrawable);
        }
        if window.is_connected() {
            return Err(Error::SurfaceCreationFailed(WindowingApiError::BadAlloc));
        }

        let surface = self.egl.create_pbuffer_surface(display, config, window.size())?;
        lock(&window.0).connected = true;
        let mut state = lock(&self.state);
        state.live_surfaces += 1;
        state.windows.insert(surface as usize, window);
        Ok(surface)
    }

    fn create_pbuffer_surface(
        &self,
        display: EGLDisplay,
        config: EGLConfig,
        size: Size2D<i32>,
    ) -> Result<EGLSurface, Error> {
        let surface = self.egl.create_pbuffer_surface(display, config, size)?;
        lock(&self.state).live_surfaces += 1;
        Ok(surface)
    }

    fn destroy_surface(&self, display: EGLDisplay, surface: EGLSurface) -> Result<(), Error> {
        self.egl.destroy_surface(display, surface)?;
        let mut state = lock(&self.state);
        state.live_surfaces -= 1;
        if let Some(window) = state.windows.remove(&(surface as usize)) {
            lock(&window.0).connected = false;
        }
        Ok(())
    }

    fn make_current(
        &self,
        display: EGLDisplay,
        draw: Option<EGLSurface>,
        read: Option<EGLSurface>,
        context: Option<EGLContext>,
    ) -> Result<(), Error> {
        if self.is_released_window(draw) || self.is_released_window(read) {
            return Err(Error::MakeCurrentFailed(WindowingApiError::BadNativeWindow));
        }
        self.egl.make_current(display, draw, read, context)
    }

    fn current_context(&self) -> Option<EGLContext> {
        self.egl.current_context()
    }

    fn current_surface(&self, role: SurfaceRole) -> Option<EGLSurface> {
        self.egl.current_surface(role)
    }

    fn swap_buffers(&self, display: EGLDisplay, surface: EGLSurface) -> Result<(), Error> {
        let window = match self.window(surface) {
            Some(window) => window,
            None => return self.egl.swap_buffers(display, surface),
        };
        if window.is_released() {
            return Err(Error::PresentFailed(WindowingApiError::BadNativeWindow));
        }
        let front = self.read_back_buffer(display, surface, window.size());
        self.egl.swap_buffers(display, surface)?;
        let mut window = lock(&window.0);
        window.presents += 1;
        if front.is_some() {
            window.front = front;
        }
        Ok(())
    }

    fn set_presentation_time(
        &self,
        display: EGLDisplay,
        surface: EGLSurface,
        nanoseconds: i64,
    ) -> Result<(), Error> {
        match self.window(surface) {
            Some(window) => {
                lock(&window.0).presentation_time = Some(nanoseconds);
                Ok(())
            }
            None => self.egl.set_presentation_time(display, surface, nanoseconds),
        }
    }

    fn query_surface(
        &self,
        display: EGLDisplay,
        surface: EGLSurface,
        attribute: SurfaceAttribute,
    ) -> Result<i32, Error> {
        let window = match self.window(surface) {
            Some(window) => window,
            None => return self.egl.query_surface(display, surface, attribute),
        };
        if window.is_released() {
            return Err(Error::SurfaceQueryFailed(WindowingApiError::BadNativeWindow));
        }
        let size = window.size();
        Ok(match attribute {
            SurfaceAttribute::Width => size.width,
            SurfaceAttribute::Height => size.height,
        })
    }

    fn load_gl(&self, display: EGLDisplay, context: EGLContext) -> Result<Gl, Error> {
        self.egl.load_gl(display, context)
    }
}

fn headless_manager() -> (HeadlessPlatform, ContextManager<HeadlessPlatform>) {
    let platform = HeadlessPlatform::default();
    let manager = ContextManager::try_new(platform.clone(), &ConfigRequest::default()).unwrap();
    (platform, manager)
}

fn assert_solid(image: &Image, rgba: [u8; 4]) {
    for y in 0..image.height() {
        for x in 0..image.width() {
            assert_eq!(image.pixel(x, y), Some(rgba), "pixel ({}, {})", x, y);
        }
    }
}

fn clear(gl: &Gl, rgba: [f32; 4]) {
    unsafe {
        gl.clear_color(rgba[0], rgba[1], rgba[2], rgba[3]);
        gl.clear(gl::COLOR_BUFFER_BIT);
    }
}

// Draws `image` over a black clear.
fn draw_bitmap(gl: &Gl, image: Image, viewport: Size2D<i32>) {
    let pass = QuadPass::new(gl).unwrap();
    let frame = Frame { clear_color: BLACK, ..Frame::new(image) };
    pass.draw(gl, &frame, viewport).unwrap();
    pass.destroy(gl);
}

#[test]
#[serial]
fn test_default_manager_setup() {
    let manager = ContextManager::new(DefaultPlatform::default());
    assert!(manager.is_initialized());
    let attributes = manager.config_attributes().unwrap();
    assert!(ConfigRequest::default().is_satisfied_by(&attributes));
    assert!(attributes.color_bits() >= 32);
    assert!(matches!(manager.gl(), Err(Error::NotCurrent)));
}

// Random requests against the display's configs: whatever is chosen meets the request and is
// the display's first match, and only a request nothing meets fails.
#[test]
fn test_config_selection() {
    let platform = EglPlatform;
    let display = platform.default_display().unwrap();
    platform.initialize(display).unwrap();
    let anything = ConfigRequest {
        red_size: 0,
        green_size: 0,
        blue_size: 0,
        alpha_size: 0,
        depth_size: 0,
        stencil_size: 0,
        renderable: RenderableType::empty(),
        surface_type: SurfaceType::empty(),
        recordable: false,
    };
    let all_configs: Vec<ConfigAttributes> = platform
        .choose_configs(display, &anything)
        .unwrap()
        .into_iter()
        .map(|config| platform.config_attributes(display, config).unwrap())
        .collect();
    assert!(!all_configs.is_empty());

    let mut rng = rand::thread_rng();
    let color_sizes = [0u8, 1, 4, 5, 6, 8, 10, 12];
    let depth_sizes = [0u8, 16, 24, 32];
    let stencil_sizes = [0u8, 1, 8];
    let renderables = [
        RenderableType::OPENGL_ES2,
        RenderableType::OPENGL_ES | RenderableType::OPENGL_ES2,
        RenderableType::OPENGL_ES3,
    ];

    for _ in 0..32 {
        let request = ConfigRequest {
            red_size: *color_sizes.choose(&mut rng).unwrap(),
            green_size: *color_sizes.choose(&mut rng).unwrap(),
            blue_size: *color_sizes.choose(&mut rng).unwrap(),
            alpha_size: *color_sizes.choose(&mut rng).unwrap(),
            depth_size: *depth_sizes.choose(&mut rng).unwrap(),
            stencil_size: *stencil_sizes.choose(&mut rng).unwrap(),
            renderable: *renderables.choose(&mut rng).unwrap(),
            surface_type: SurfaceType::PBUFFER,
            recordable: rng.gen_bool(0.25),
        };
        let satisfiable = all_configs.iter().any(|attributes| request.is_satisfied_by(attributes));
        match ContextManager::try_new(platform, &request) {
            Ok(manager) => {
                let chosen = manager.config_attributes().unwrap();
                assert!(request.is_satisfied_by(&chosen), "{:?} for {:?}", chosen, request);
                let first = platform.choose_configs(display, &request).unwrap()[0];
                assert_eq!(chosen, platform.config_attributes(display, first).unwrap());
            }
            Err(Error::NoPixelFormatFound) => assert!(!satisfiable, "nothing for {:?}", request),
            Err(err) => panic!("{:?} failed: {}", request, err),
        }
    }
}

#[test]
fn test_unsatisfiable_config_request() {
    let request = ConfigRequest { red_size: 64, ..ConfigRequest::default() };
    let platform = HeadlessPlatform::default();
    match ContextManager::try_new(platform.clone(), &request) {
        Err(Error::NoPixelFormatFound) => {}
        other => panic!("unexpected result: {:?}", other.err()),
    }
    assert_eq!(platform.live_contexts(), 0);
}

#[test]
fn test_pbuffer_request_chooses_pbuffer_config() {
    let request = ConfigRequest::default().with_surface_type(SurfaceType::PBUFFER);
    let manager = ContextManager::try_new(EglPlatform, &request).unwrap();
    let attributes = manager.config_attributes().unwrap();
    assert!(attributes.surface_type.contains(SurfaceType::PBUFFER));
    assert!(request.is_satisfied_by(&attributes));
}

#[test]
fn test_degraded_manager() {
    for platform in [HeadlessPlatform::no_display(), HeadlessPlatform::fail_initialize()] {
        let manager = ContextManager::new(platform.clone());
        assert!(!manager.is_initialized());
        assert!(matches!(manager.gl(), Err(Error::NotInitialized)));

        let mut surface = SurfaceHandle::new(&manager);
        assert!(matches!(surface.create_offscreen_surface(16, 16), Err(Error::NotInitialized)));
        let window = TestWindow::new(16, 16);
        assert!(matches!(
            surface.create_window_surface(&NativeDrawable::Window(window.clone())),
            Err(Error::NotInitialized)
        ));
        assert!(!window.is_connected());
        assert!(matches!(surface.make_current_for_draw(), Err(Error::NoSurface)));
        assert!(!surface.present());
        assert_eq!(platform.live_contexts(), 0);
    }
}

#[test]
fn test_try_new_reports_setup_failure() {
    match ContextManager::try_new(HeadlessPlatform::no_display(), &ConfigRequest::default()) {
        Err(Error::NoDisplay) => {}
        other => panic!("unexpected result: {:?}", other.err()),
    }
    match ContextManager::try_new(HeadlessPlatform::fail_initialize(), &ConfigRequest::default()) {
        Err(Error::DisplayInitializationFailed(_)) => {}
        other => panic!("unexpected result: {:?}", other.err()),
    }
}

#[test]
fn test_context_destroyed_on_drop() {
    let (platform, manager) = headless_manager();
    assert_eq!(platform.live_contexts(), 1);
    {
        let mut surface = SurfaceHandle::new(&manager);
        surface.create_offscreen_surface(8, 8).unwrap();
        surface.make_current_for_draw().unwrap();
        assert!(manager.gl().is_ok());
        assert_eq!(platform.live_surfaces(), 1);
    }
    assert_eq!(platform.live_surfaces(), 0);
    drop(manager);
    assert_eq!(platform.live_contexts(), 0);
    assert_eq!(platform.current_context(), None);
}

#[test]
fn test_surface_created_once() {
    let (platform, manager) = headless_manager();
    let mut surface = SurfaceHandle::new(&manager);
    surface.create_offscreen_surface(32, 32).unwrap();
    assert!(matches!(surface.create_offscreen_surface(64, 64), Err(Error::SurfaceAlreadyCreated)));
    let window = TestWindow::new(32, 32);
    assert!(matches!(
        surface.create_window_surface(&NativeDrawable::Window(window.clone())),
        Err(Error::SurfaceAlreadyCreated)
    ));
    assert!(!window.is_connected());
    assert_eq!(surface.size().unwrap(), Size2D::new(32, 32));
    assert_eq!(platform.live_surfaces(), 1);

    // A released handle can create again.
    surface.release();
    assert!(matches!(surface.width(), Err(Error::NoSurface)));
    surface.create_window_surface(&NativeDrawable::Window(window.clone())).unwrap();
    assert!(window.is_connected());
    assert_eq!(platform.live_surfaces(), 1);
}

#[test]
fn test_pbuffer_size_bounds() {
    let manager = ContextManager::try_new(EglPlatform, &ConfigRequest::default()).unwrap();
    let mut surface = SurfaceHandle::new(&manager);
    match surface.create_offscreen_surface(i32::MAX, i32::MAX) {
        Err(Error::SurfaceCreationFailed(WindowingApiError::BadAlloc)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    match surface.create_offscreen_surface(-1, 16) {
        Err(Error::SurfaceCreationFailed(WindowingApiError::BadParameter)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(surface.surface().is_none());
    surface.create_offscreen_surface(16, 16).unwrap();
}

#[test]
fn test_capture_requires_current_surface() {
    let (_platform, manager) = headless_manager();
    let mut first = SurfaceHandle::new(&manager);
    let mut second = SurfaceHandle::new(&manager);
    assert!(matches!(first.capture_to_image(), Err(Error::NotCurrent)));
    first.create_offscreen_surface(4, 4).unwrap();
    second.create_offscreen_surface(4, 4).unwrap();
    assert!(matches!(first.capture_to_image(), Err(Error::NotCurrent)));

    second.make_current_for_draw().unwrap();
    assert!(second.is_current());
    assert!(!first.is_current());
    assert!(matches!(first.capture_to_image(), Err(Error::NotCurrent)));
    assert!(second.capture_to_image().is_ok());
}

// The quad covers the viewport at every size, so none of the black clear shows.
#[test]
fn test_solid_color_capture() {
    let (_platform, manager) = headless_manager();
    for &(width, height, rgba) in &[(1, 1, RED), (64, 64, GREEN), (1920, 1080, BLUE)] {
        let mut surface = SurfaceHandle::new(&manager);
        surface.create_offscreen_surface(width, height).unwrap();
        surface.make_current_for_draw().unwrap();
        draw_bitmap(manager.gl().unwrap(), Image::solid(4, 4, rgba), Size2D::new(width, height));

        let image = surface.capture_to_image().unwrap();
        assert_eq!((image.width(), image.height()), (width as u32, height as u32));
        assert_solid(&image, rgba);
        manager.release_current().unwrap();
    }
}

#[test]
fn test_capture_is_rotated() {
    let (_platform, manager) = headless_manager();
    let mut surface = SurfaceHandle::new(&manager);
    surface.create_offscreen_surface(2, 2).unwrap();
    surface.make_current_for_draw().unwrap();
    let gl = manager.gl().unwrap();

    // Rows top to bottom: red, blue.
    let bitmap = Image::from_rgba(2, 2, [RED, RED, BLUE, BLUE].concat()).unwrap();
    draw_bitmap(gl, bitmap, Size2D::new(2, 2));

    let mut readback = vec![0; 16];
    unsafe {
        gl.pixel_store_i32(gl::PACK_ALIGNMENT, 1);
        gl.read_pixels(
            0,
            0,
            2,
            2,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            PixelPackData::Slice(Some(&mut readback)),
        );
    }
    // Bottom row first.
    assert_eq!(&readback[0..4], &BLUE);
    assert_eq!(&readback[8..12], &RED);

    // The capture is the readback turned by 180 degrees.
    let image = surface.capture_to_image().unwrap();
    assert_eq!(image.pixel(0, 0), Some(RED));
    assert_eq!(image.pixel(1, 1), Some(BLUE));
}

#[test]
fn test_framebuffer_renders_to_texture() {
    let (_platform, manager) = headless_manager();
    let mut surface = SurfaceHandle::new(&manager);
    surface.create_offscreen_surface(4, 4).unwrap();
    surface.make_current_for_draw().unwrap();
    let gl = manager.gl().unwrap();
    clear(gl, [0.0, 1.0, 0.0, 1.0]);

    let framebuffer = FrameBuffer::new(gl, Size2D::new(2, 2)).unwrap();
    assert_eq!(framebuffer.size(), Size2D::new(2, 2));
    assert!(!framebuffer.is_active(gl));
    assert!(matches!(framebuffer.read_image(gl), Err(Error::NotCurrent)));

    framebuffer.activate(gl);
    assert!(framebuffer.is_active(gl));
    let bitmap = Image::from_rgba(2, 2, [RED, RED, BLUE, BLUE].concat()).unwrap();
    draw_bitmap(gl, bitmap, framebuffer.size());
    let image = framebuffer.read_image(gl).unwrap();
    assert_eq!((image.width(), image.height()), (2, 2));
    assert_eq!(image.pixel(0, 0), Some(RED));
    assert_eq!(image.pixel(1, 0), Some(RED));
    assert_eq!(image.pixel(0, 1), Some(BLUE));
    assert_eq!(image.pixel(1, 1), Some(BLUE));

    // The surface itself was not drawn to.
    framebuffer.deactivate(gl);
    assert!(!framebuffer.is_active(gl));
    assert_solid(&surface.capture_to_image().unwrap(), GREEN);

    framebuffer.destroy(gl);
    unsafe {
        assert_eq!(gl.get_error(), gl::NO_ERROR);
    }
}

#[test]
fn test_present_after_release() {
    let (_platform, manager) = headless_manager();
    let window = TestWindow::new(16, 16);
    let mut surface = SurfaceHandle::new(&manager);
    surface.create_window_surface(&NativeDrawable::Window(window.clone())).unwrap();
    surface.make_current_for_draw().unwrap();
    assert!(surface.present());
    assert_eq!(window.presents(), 1);

    surface.release();
    assert!(!surface.present());
    assert_eq!(window.presents(), 1);
    assert!(!window.is_connected());
}

#[test]
fn test_window_present_posts_back_buffer() {
    let (_platform, manager) = headless_manager();
    let window = TestWindow::new(24, 12);
    let mut surface = SurfaceHandle::new(&manager);
    surface.create_window_surface(&NativeDrawable::Window(window.clone())).unwrap();
    surface.make_current_for_draw().unwrap();
    assert!(window.front_buffer().is_none());

    clear(manager.gl().unwrap(), [0.0, 1.0, 0.0, 1.0]);
    surface.set_presentation_time(1_000_000);
    assert!(surface.present());

    let front = window.front_buffer().unwrap();
    assert_eq!((front.width(), front.height()), (24, 12));
    assert_solid(&front, GREEN);
    assert_eq!(window.presentation_time(), Some(1_000_000));
}

#[test]
fn test_window_surface_tracks_window_size() {
    let (_platform, manager) = headless_manager();
    let window = TestWindow::new(64, 48);
    let mut surface = SurfaceHandle::new(&manager);
    surface.create_window_surface(&NativeDrawable::Window(window.clone())).unwrap();
    assert_eq!(surface.size().unwrap(), Size2D::new(64, 48));

    window.resize(32, 16);
    assert_eq!(surface.width().unwrap(), 32);
    assert_eq!(surface.height().unwrap(), 16);

    surface.make_current_for_draw().unwrap();
    clear(manager.gl().unwrap(), [0.0, 0.0, 1.0, 1.0]);
    let image = surface.capture_to_image().unwrap();
    assert_eq!((image.width(), image.height()), (32, 16));
    assert_solid(&image, BLUE);
}

#[test]
fn test_texture_drawable() {
    let (_platform, manager) = headless_manager();
    let texture = TestTexture::new(20, 10);
    let mut surface = SurfaceHandle::new(&manager);
    surface.create_window_surface(&NativeDrawable::Texture(texture.clone())).unwrap();
    assert!(texture.window().is_connected());
    assert_eq!(surface.size().unwrap(), Size2D::new(20, 10));
    surface.make_current_for_draw().unwrap();
    assert!(surface.present());
    assert_eq!(texture.window().presents(), 1);
}

#[test]
fn test_window_connects_once() {
    let (_platform, manager) = headless_manager();
    let window = TestWindow::new(16, 16);
    let mut first = SurfaceHandle::new(&manager);
    let mut second = SurfaceHandle::new(&manager);
    first.create_window_surface(&NativeDrawable::Window(window.clone())).unwrap();
    match second.create_window_surface(&NativeDrawable::Window(window.clone())) {
        Err(Error::SurfaceCreationFailed(WindowingApiError::BadAlloc)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    first.release();
    second.create_window_surface(&NativeDrawable::Window(window)).unwrap();
}

#[test]
fn test_released_window() {
    let (_platform, manager) = headless_manager();
    let window = TestWindow::new(16, 16);
    let mut surface = SurfaceHandle::new(&manager);
    surface.create_window_surface(&NativeDrawable::Window(window.clone())).unwrap();
    surface.make_current_for_draw().unwrap();

    window.release();
    assert!(!surface.present());
    match surface.width() {
        Err(Error::SurfaceQueryFailed(WindowingApiError::BadNativeWindow)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    manager.release_current().unwrap();
    match surface.make_current_for_draw() {
        Err(Error::MakeCurrentFailed(WindowingApiError::BadNativeWindow)) => {}
        other => panic!("unexpected result: {:?}", other),
    }

    surface.release();
    assert!(matches!(
        surface.create_window_surface(&NativeDrawable::Window(window)),
        Err(Error::InvalidNativeDrawable)
    ));
}

#[test]
#[serial]
fn test_context_bound_to_one_thread() {
    let platform = EglPlatform;
    let display = platform.default_display().unwrap();
    platform.initialize(display).unwrap();
    let request = ConfigRequest::default().with_surface_type(SurfaceType::PBUFFER);
    let config = platform.choose_configs(display, &request).unwrap()[0];
    let context = platform.create_context(display, config, 2).unwrap();
    let surface = platform.create_pbuffer_surface(display, config, Size2D::new(8, 8)).unwrap();
    platform.make_current(display, Some(surface), Some(surface), Some(context)).unwrap();
    assert_eq!(platform.current_context(), Some(context));
    assert_eq!(platform.current_surface(SurfaceRole::Read), Some(surface));

    // Raw EGL handles are not `Send`.
    let handles = (display as usize, surface as usize, context as usize);
    let bind_elsewhere = move || {
        let display = handles.0 as EGLDisplay;
        let (surface, context) = (handles.1 as EGLSurface, handles.2 as EGLContext);
        let result = platform.make_current(display, Some(surface), Some(surface), Some(context));
        let bound = platform.current_context().is_some();
        if result.is_ok() {
            platform.make_current(display, None, None, None).unwrap();
        }
        (result, bound)
    };

    match thread::spawn(bind_elsewhere).join().unwrap() {
        (Err(Error::MakeCurrentFailed(WindowingApiError::BadAccess)), false) => {}
        (other, _) => panic!("unexpected result: {:?}", other),
    }

    platform.make_current(display, None, None, None).unwrap();
    match thread::spawn(bind_elsewhere).join().unwrap() {
        (Ok(()), true) => {}
        (other, _) => panic!("unexpected result: {:?}", other),
    }

    platform.destroy_surface(display, surface).unwrap();
    platform.destroy_context(display, context).unwrap();
}

#[test]
fn test_broken_program_is_unusable() {
    let (_platform, manager) = headless_manager();
    let mut surface = SurfaceHandle::new(&manager);
    surface.create_offscreen_surface(4, 4).unwrap();
    surface.make_current_for_draw().unwrap();
    let gl = manager.gl().unwrap();

    let broken = Program::new(gl, "void main() { gl_Position = nonsense(; }", LINE_FRAGMENT_SHADER)
        .unwrap();
    assert!(!broken.is_usable());
    assert!(broken.attribute_location(gl, "position").is_none());
    broken.use_program(gl);
    broken.destroy(gl);

    let empty = Program::new(gl, "", LINE_FRAGMENT_SHADER).unwrap();
    assert!(!empty.is_usable());
    empty.destroy(gl);

    let line = Program::new(gl, VERTEX_SHADER, LINE_FRAGMENT_SHADER).unwrap();
    assert!(line.is_usable());
    assert!(line.attribute_location(gl, "position").is_some());
    line.destroy(gl);

    let texture = Program::new(gl, VERTEX_SHADER, TEXTURE_FRAGMENT_SHADER).unwrap();
    assert!(texture.is_usable());
    assert!(texture.uniform_location(gl, "bitmap").is_some());
    texture.destroy(gl);
    unsafe {
        assert_eq!(gl.get_error(), gl::NO_ERROR);
    }
}

#[test]
fn test_diagonal_line_overlay() {
    let (_platform, manager) = headless_manager();
    let mut surface = SurfaceHandle::new(&manager);
    surface.create_offscreen_surface(64, 64).unwrap();
    surface.make_current_for_draw().unwrap();
    let gl = manager.gl().unwrap();

    let frame = Frame { diagonal_line: true, ..Frame::new(Image::solid(16, 16, BLUE)) };
    let pass = QuadPass::new(gl).unwrap();
    pass.draw(gl, &frame, Size2D::new(64, 64)).unwrap();
    pass.destroy(gl);

    let image = surface.capture_to_image().unwrap();
    assert_eq!(image.pixel(32, 32), Some(RED));
    assert_eq!(image.pixel(10, 10), Some(RED));
    assert_eq!(image.pixel(53, 10), Some(RED));
    assert_eq!(image.pixel(32, 1), Some(BLUE));
    assert_eq!(image.pixel(1, 32), Some(BLUE));
}

#[test]
fn test_save_and_reopen_capture() {
    let (_platform, manager) = headless_manager();
    let mut surface = SurfaceHandle::new(&manager);
    surface.create_offscreen_surface(40, 30).unwrap();
    surface.make_current_for_draw().unwrap();
    clear(manager.gl().unwrap(), [0.0, 0.0, 1.0, 1.0]);

    let path = std::env::temp_dir().join(format!("eglquad-capture-{}.png", std::process::id()));
    surface.save_to_file(&path).unwrap();
    let reopened = Image::open_png(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(reopened, surface.capture_to_image().unwrap());
    assert_solid(&reopened, BLUE);
}

// The default clear color is red, so an all-green capture means the bitmap was drawn.
#[test]
fn test_worker_renders_offscreen_once() {
    let platform = HeadlessPlatform::default();
    let options = WorkerOptions { capture: true, ..WorkerOptions::default() };
    let mut worker = RenderWorker::spawn(platform.clone(), options).unwrap();
    assert_eq!(worker.state(), WorkerState::Idle);

    worker.load_bitmap(Image::solid(100, 100, GREEN), false).unwrap();
    worker.target_available(RenderTarget::Offscreen(Size2D::new(256, 256))).unwrap();
    worker.join();

    assert_eq!(worker.state(), WorkerState::Done);
    assert_eq!(worker.failure(), None);
    assert_eq!(worker.presents_issued(), 1);
    let image = worker.rendered_image().unwrap();
    assert_eq!((image.width(), image.height()), (256, 256));
    assert_solid(&image, GREEN);
    assert_eq!(platform.live_contexts(), 0);
    assert_eq!(platform.live_surfaces(), 0);
    assert_eq!(platform.requested_surface_types(), vec![SurfaceType::PBUFFER]);

    // The worker is single-shot.
    assert!(matches!(
        worker.target_available(RenderTarget::Offscreen(Size2D::new(8, 8))),
        Err(Error::WorkerTerminated)
    ));
}

#[test]
fn test_worker_stopped_while_idle() {
    let platform = HeadlessPlatform::default();
    let mut worker = RenderWorker::spawn(platform.clone(), WorkerOptions::default()).unwrap();
    worker.load_bitmap(Image::solid(4, 4, GREEN), false).unwrap();
    worker.target_destroyed();
    worker.stop_render();
    worker.join();
    assert_eq!(worker.state(), WorkerState::Done);
    assert_eq!(worker.presents_issued(), 0);
    assert!(worker.rendered_image().is_none());
    assert_eq!(platform.live_contexts(), 0);
}

#[test]
fn test_worker_without_bitmap() {
    let options = WorkerOptions { capture: true, ..WorkerOptions::default() };
    let mut worker = RenderWorker::spawn(HeadlessPlatform::default(), options).unwrap();
    worker.target_available(RenderTarget::Offscreen(Size2D::new(16, 16))).unwrap();
    worker.join();
    assert_eq!(worker.state(), WorkerState::Done);
    assert_eq!(worker.presents_issued(), 0);
    assert!(worker.rendered_image().is_none());
    assert_eq!(worker.failure(), None);
}

#[test]
fn test_worker_reports_setup_failure() {
    let platform = HeadlessPlatform::fail_initialize();
    let mut worker = RenderWorker::spawn(platform, WorkerOptions::default()).unwrap();
    worker.load_bitmap(Image::solid(4, 4, GREEN), false).unwrap();
    worker.target_available(RenderTarget::Offscreen(Size2D::new(16, 16))).unwrap();
    worker.join();
    assert_eq!(worker.state(), WorkerState::Done);
    assert_eq!(worker.presents_issued(), 0);
    assert!(worker.failure().is_some());
}

#[test]
fn test_worker_saves_png() {
    let path = std::env::temp_dir().join(format!("eglquad-worker-{}.png", std::process::id()));
    let options = WorkerOptions { save_path: Some(path.clone()), ..WorkerOptions::default() };
    let mut worker = RenderWorker::spawn(HeadlessPlatform::default(), options).unwrap();
    worker.load_bitmap(Image::solid(10, 10, GREEN), false).unwrap();
    worker.target_available(RenderTarget::Offscreen(Size2D::new(48, 32))).unwrap();
    worker.join();

    let saved = Image::open_png(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (48, 32));
    assert_solid(&saved, GREEN);
}

#[test]
fn test_worker_view_draws_into_window() {
    let platform = HeadlessPlatform::default();
    let window = TestWindow::new(64, 64);
    let mut view = WorkerView::new(platform.clone()).unwrap();
    view.load_bitmap(Image::solid(8, 8, GREEN)).unwrap();
    view.on_drawable_available(NativeDrawable::Window(window.clone())).unwrap();
    view.on_drawable_changed(Size2D::new(64, 64));
    view.destroy();
    view.destroy();

    assert_eq!(window.presents(), 1);
    assert!(!window.is_connected());
    assert_solid(&window.front_buffer().unwrap(), GREEN);
    let rendered = view.rendered_bitmap().unwrap();
    assert_solid(&rendered, GREEN);
    assert_eq!(platform.requested_surface_types(), vec![SurfaceType::WINDOW]);
    assert!(view.on_drawable_destroyed());
    assert!(matches!(view.load_bitmap(Image::solid(1, 1, RED)), Err(Error::WorkerTerminated)));
}

// Once the destroyed callback returns, the host may free the window.
#[test]
fn test_worker_view_releases_window_before_destroyed_returns() {
    let window = TestWindow::new(32, 32);
    let mut view = WorkerView::new(HeadlessPlatform::default()).unwrap();
    view.load_bitmap(Image::solid(4, 4, BLUE)).unwrap();
    view.on_drawable_available(NativeDrawable::Window(window.clone())).unwrap();
    assert!(view.on_drawable_destroyed());
    assert!(!window.is_connected());
    assert_eq!(window.presents(), 1);
    window.release();

    view.destroy();
    assert_solid(&view.rendered_bitmap().unwrap(), BLUE);
}

#[test]
fn test_hosted_view_when_dirty() {
    let platform = HeadlessPlatform::default();
    let window = TestWindow::new(32, 32);
    let slot = FrameSlot::default();
    slot.load_bitmap(Image::solid(4, 4, BLUE));

    let mut view = HostedView::spawn(
        platform.clone(),
        TexturedQuadRenderer::new(slot.clone()),
        HostOptions::default(),
    )
    .unwrap();
    view.on_drawable_available(NativeDrawable::Window(window.clone())).unwrap();
    assert!(view.wait_for_frames(1, FRAME_TIMEOUT));
    assert_solid(&window.front_buffer().unwrap(), BLUE);

    slot.load_bitmap(Image::solid(4, 4, GREEN));
    view.request_render();
    assert!(view.wait_for_frames(2, FRAME_TIMEOUT));
    assert_solid(&window.front_buffer().unwrap(), GREEN);

    window.resize(16, 8);
    view.on_drawable_changed(Size2D::new(16, 8)).unwrap();
    assert!(view.wait_for_frames(3, FRAME_TIMEOUT));

    assert!(view.on_drawable_destroyed());
    assert!(!window.is_connected());
    assert_eq!(view.frames_drawn(), 3);
    assert_eq!(window.presents(), 3);
    let front = window.front_buffer().unwrap();
    assert_eq!((front.width(), front.height()), (16, 8));
    assert_solid(&front, GREEN);
    assert_eq!(view.failure(), None);

    view.destroy();
    view.destroy();
    assert_eq!(platform.live_contexts(), 0);
    assert_eq!(platform.requested_surface_types(), vec![SurfaceType::WINDOW]);
}

#[test]
fn test_hosted_view_continuous() {
    let window = TestWindow::new(8, 8);
    let slot = FrameSlot::default();
    slot.add_diagonal_line(Image::solid(2, 2, GREEN));
    let options = HostOptions {
        render_mode: RenderMode::Continuously,
        frame_interval: Duration::from_millis(1),
        ..HostOptions::default()
    };
    let renderer = TexturedQuadRenderer::new(slot);
    let view = HostedView::spawn(HeadlessPlatform::default(), renderer, options).unwrap();
    view.on_drawable_available(NativeDrawable::Window(window.clone())).unwrap();
    assert!(view.wait_for_frames(5, FRAME_TIMEOUT));

    view.set_render_mode(RenderMode::WhenDirty);
    assert!(view.on_drawable_destroyed());
    let drawn = view.frames_drawn();
    assert!(drawn >= 5);
    assert_eq!(window.presents(), drawn);
}

#[test]
fn test_hosted_view_reports_surface_failure() {
    let window = TestWindow::new(8, 8);
    window.release();
    let view = HostedView::spawn(
        HeadlessPlatform::default(),
        TexturedQuadRenderer::new(FrameSlot::default()),
        HostOptions::default(),
    )
    .unwrap();
    view.on_drawable_available(NativeDrawable::Window(window)).unwrap();
    assert!(view.on_drawable_destroyed());
    assert!(view.failure().is_some());
    assert_eq!(view.frames_drawn(), 0);
}

// A drawable handed over and taken straight back is attached, drawn once and released before
// the destroyed callback returns, so the host can free it right away.
#[test]
fn test_hosted_view_destroyed_right_after_available() {
    let platform = HeadlessPlatform::default();
    let slot = FrameSlot::default();
    slot.load_bitmap(Image::solid(4, 4, GREEN));
    let renderer = TexturedQuadRenderer::new(slot);
    let mut view = HostedView::spawn(platform.clone(), renderer, HostOptions::default()).unwrap();

    for _ in 0..8 {
        let window = TestWindow::new(16, 16);
        view.on_drawable_available(NativeDrawable::Window(window.clone())).unwrap();
        assert!(view.on_drawable_destroyed());
        assert!(!window.is_connected());
        assert_eq!(window.presents(), 1);
        window.release();
    }

    assert_eq!(view.frames_drawn(), 8);
    assert_eq!(platform.live_surfaces(), 0);
    view.destroy();
    assert_eq!(view.failure(), None);
    assert_eq!(platform.live_contexts(), 0);
}
