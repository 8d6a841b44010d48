/// Model viewer engine: one mesh, one camera, one surface, one render loop
///
/// The host owns I/O. `ModelViewer::mount` hands back a `LoadTicket`; the
/// host fetches the bytes however it likes and returns them through
/// `ModelViewer::complete_load`. Tickets carry a generation number so a
/// completion arriving for a viewer that has since been torn down or replaced
/// is recognized and dropped.
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::Point3;

use crate::config::ViewerConfig;
use crate::controls::OrbitControls;
use crate::error::{LoadError, ViewerError};
use crate::geometry::Mesh;
use crate::projection::Camera;
use crate::render_loop::{FrameScheduler, RenderLoop};
use crate::scene::{MeshNode, Scene};
use crate::stl;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Locator of an STL resource (URL or file path)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeshSource(String);

impl MeshSource {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeshSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MeshSource {
    fn from(locator: &str) -> Self {
        Self::new(locator)
    }
}

impl From<String> for MeshSource {
    fn from(locator: String) -> Self {
        Self(locator)
    }
}

/// Display area the viewer draws into, in layout pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MountRegion {
    width: u32,
    height: u32,
    pixel_ratio: f32,
}

impl MountRegion {
    pub fn new(width: u32, height: u32) -> Result<Self, ViewerError> {
        if width == 0 || height == 0 {
            return Err(ViewerError::InvalidMountRegion { width, height });
        }
        Ok(Self {
            width,
            height,
            pixel_ratio: 1.0,
        })
    }

    /// Device pixels per layout pixel; non-positive or non-finite ratios fall back to 1
    pub fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        self.pixel_ratio = if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 };
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Drawing-buffer size in device pixels, never below 1x1
    pub fn device_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.pixel_ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }
}

/// Status surfaced to the host for overlays
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerState {
    Loading,
    Ready,
    Failed(String),
}

impl ViewerState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewerState::Loading)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ViewerState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Identity of one outstanding mesh load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    source: MeshSource,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> &MeshSource {
        &self.source
    }
}

/// What a load completion did to the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Ready,
    Failed,
    /// The completion belonged to a superseded or torn-down viewer and was ignored
    Stale,
}

/// Rendering target provided by the host
pub trait Surface {
    /// Match the mount region; the drawing buffer uses device pixels
    fn set_size(&mut self, region: &MountRegion);

    /// Current size in layout pixels
    fn size(&self) -> (u32, u32);

    fn render(&mut self, scene: &Scene, camera: &Camera);

    /// Release graphics resources; rendering afterwards must be a no-op
    fn dispose(&mut self);

    /// Whether the surface output is still part of the mount region
    fn is_attached(&self) -> bool;

    /// Remove the output from the mount region; tolerate it being gone already
    fn detach(&mut self);
}

/// A mounted viewer instance for exactly one [`MeshSource`]
pub struct ModelViewer<S: Surface, F: FrameScheduler> {
    generation: u64,
    source: MeshSource,
    region: MountRegion,
    config: ViewerConfig,
    scene: Scene,
    camera: Camera,
    controls: OrbitControls,
    surface: S,
    render_loop: RenderLoop<F>,
    state: ViewerState,
    torn_down: bool,
}

impl<S: Surface, F: FrameScheduler> ModelViewer<S, F> {
    /// Build scene, camera, controls and surface, start the loop, issue the load
    pub fn mount(
        source: MeshSource,
        region: MountRegion,
        mut surface: S,
        scheduler: F,
        config: ViewerConfig,
    ) -> (Self, LoadTicket) {
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);

        let scene = Scene::new(config.background, config.ambient, config.directional);
        let camera = Camera::perspective(config.fov_degrees, region.aspect(), config.near, config.far);
        surface.set_size(&region);

        let mut controls = OrbitControls::new(Point3::origin());
        controls.enable_damping = config.enable_damping;
        controls.damping_factor = config.damping_factor;

        let mut render_loop = RenderLoop::new(scheduler);
        render_loop.start();

        log::debug!("viewer {generation} mounted for {source} at {}x{}", region.width, region.height);

        let ticket = LoadTicket {
            generation,
            source: source.clone(),
        };
        let viewer = Self {
            generation,
            source,
            region,
            config,
            scene,
            camera,
            controls,
            surface,
            render_loop,
            state: ViewerState::Loading,
            torn_down: false,
        };
        (viewer, ticket)
    }

    /// Deliver the result of the load issued for `ticket`
    pub fn complete_load<B: AsRef<[u8]>>(
        &mut self,
        ticket: &LoadTicket,
        result: Result<B, LoadError>,
    ) -> LoadOutcome {
        if !self.accepts(ticket) {
            log::debug!(
                "discarding stale load of {} (generation {}, current {})",
                ticket.source,
                ticket.generation,
                self.generation
            );
            return LoadOutcome::Stale;
        }

        let mesh = result.and_then(|bytes| {
            let mesh = stl::parse_stl(bytes.as_ref())?;
            if mesh.is_empty() {
                return Err(LoadError::EmptyGeometry);
            }
            Ok(mesh)
        });

        match mesh {
            Ok(mesh) => {
                log::info!("loaded {} ({} triangles)", self.source, mesh.triangles.len());
                self.apply_geometry(mesh);
                self.state = ViewerState::Ready;
                LoadOutcome::Ready
            }
            Err(err) => {
                log::error!("failed to load {}: {err}", self.source);
                self.state = ViewerState::Failed(self.config.failure_message.clone());
                LoadOutcome::Failed
            }
        }
    }

    fn accepts(&self, ticket: &LoadTicket) -> bool {
        !self.torn_down && ticket.generation == self.generation && self.state.is_loading()
    }

    /// Center the mesh on the origin and back the camera off to frame it
    fn apply_geometry(&mut self, geometry: Mesh) {
        let mut node = MeshNode::new(geometry, self.config.material);
        node.center_at_origin();

        let distance = self.camera.framing_distance(node.bounding_box(), self.config.framing_margin);
        self.scene.set_mesh(node);

        if distance.is_finite() && distance > 0.0 {
            self.camera.position.z = distance;
        } else {
            log::warn!("{} has no spatial extent, keeping default camera distance", self.source);
        }
        self.controls.update(&mut self.camera);
    }

    /// Run one scheduled frame: advance controls, then render
    ///
    /// Returns `false` without touching anything when no frame was pending.
    pub fn frame(&mut self) -> bool {
        if self.torn_down || !self.render_loop.begin_frame() {
            return false;
        }
        self.controls.update(&mut self.camera);
        self.surface.render(&self.scene, &self.camera);
        true
    }

    /// Adopt new mount dimensions immediately
    pub fn resize(&mut self, region: MountRegion) {
        if self.torn_down {
            return;
        }
        self.camera.aspect = region.aspect();
        self.camera.update_projection_matrix();
        self.surface.set_size(&region);
        self.region = region;
    }

    /// Release everything; safe to call any number of times
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.render_loop.cancel();
        self.scene.clear();
        self.surface.dispose();
        if self.surface.is_attached() {
            self.surface.detach();
        }
        log::debug!("viewer {} torn down", self.generation);
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn source(&self) -> &MeshSource {
        &self.source
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn region(&self) -> &MountRegion {
        &self.region
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn render_loop(&self) -> &RenderLoop<F> {
        &self.render_loop
    }

    /// Whether a frame is waiting to be run
    pub fn frame_pending(&self) -> bool {
        !self.torn_down && self.render_loop.pending().is_some()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl<S: Surface, F: FrameScheduler> Drop for ModelViewer<S, F> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Host-side holder guaranteeing at most one resident viewer
pub struct ViewerSlot<S: Surface, F: FrameScheduler> {
    current: Option<ModelViewer<S, F>>,
}

impl<S: Surface, F: FrameScheduler> ViewerSlot<S, F> {
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Replace whatever is mounted; the old viewer is torn down first
    pub fn mount(
        &mut self,
        source: MeshSource,
        region: MountRegion,
        surface: S,
        scheduler: F,
        config: ViewerConfig,
    ) -> LoadTicket {
        self.unmount();
        let (viewer, ticket) = ModelViewer::mount(source, region, surface, scheduler, config);
        self.current = Some(viewer);
        ticket
    }

    pub fn unmount(&mut self) {
        if let Some(mut viewer) = self.current.take() {
            viewer.teardown();
        }
    }

    pub fn complete_load<B: AsRef<[u8]>>(
        &mut self,
        ticket: &LoadTicket,
        result: Result<B, LoadError>,
    ) -> LoadOutcome {
        match self.current.as_mut() {
            Some(viewer) => viewer.complete_load(ticket, result),
            None => {
                log::debug!("discarding load of {} with nothing mounted", ticket.source);
                LoadOutcome::Stale
            }
        }
    }

    pub fn frame(&mut self) -> bool {
        self.current.as_mut().is_some_and(ModelViewer::frame)
    }

    pub fn resize(&mut self, region: MountRegion) {
        if let Some(viewer) = self.current.as_mut() {
            viewer.resize(region);
        }
    }

    pub fn viewer(&self) -> Option<&ModelViewer<S, F>> {
        self.current.as_ref()
    }

    pub fn viewer_mut(&mut self) -> Option<&mut ModelViewer<S, F>> {
        self.current.as_mut()
    }

    pub fn state(&self) -> Option<&ViewerState> {
        self.current.as_ref().map(ModelViewer::state)
    }
}

impl<S: Surface, F: FrameScheduler> Default for ViewerSlot<S, F> {
    fn default() -> Self {
        Self::new()
    }
}
