use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use stlview_core::config::LOAD_FAILURE_MESSAGE;
use stlview_core::render_loop::LoopState;
use stlview_core::stl::write_binary_stl;
use stlview_core::{
    Camera, FrameScheduler, LoadError, LoadOutcome, Mesh, MeshSource, ModelViewer, MountRegion,
    Scene, Surface, ViewerConfig, ViewerSlot, ViewerState,
};

#[derive(Debug, Default)]
struct SurfaceLog {
    size: (u32, u32),
    device_size: (u32, u32),
    renders: usize,
    renders_after_dispose: usize,
    /// Camera position handed to each render
    seen_positions: Vec<Point3<f32>>,
    disposed: usize,
    detached: usize,
    attached: bool,
}

struct FakeSurface(Rc<RefCell<SurfaceLog>>);

impl FakeSurface {
    fn attached() -> (Self, Rc<RefCell<SurfaceLog>>) {
        let log = Rc::new(RefCell::new(SurfaceLog {
            attached: true,
            ..Default::default()
        }));
        (Self(log.clone()), log)
    }

    fn detached() -> (Self, Rc<RefCell<SurfaceLog>>) {
        let log = Rc::new(RefCell::new(SurfaceLog::default()));
        (Self(log.clone()), log)
    }
}

impl Surface for FakeSurface {
    fn set_size(&mut self, region: &MountRegion) {
        let mut log = self.0.borrow_mut();
        log.size = (region.width(), region.height());
        log.device_size = region.device_size();
    }

    fn size(&self) -> (u32, u32) {
        self.0.borrow().size
    }

    fn render(&mut self, _scene: &Scene, camera: &Camera) {
        let mut log = self.0.borrow_mut();
        log.renders += 1;
        log.seen_positions.push(camera.position);
        if log.disposed > 0 {
            log.renders_after_dispose += 1;
        }
    }

    fn dispose(&mut self) {
        self.0.borrow_mut().disposed += 1;
    }

    fn is_attached(&self) -> bool {
        self.0.borrow().attached
    }

    fn detach(&mut self) {
        let mut log = self.0.borrow_mut();
        log.attached = false;
        log.detached += 1;
    }
}

#[derive(Debug, Default)]
struct FrameLog {
    next: u32,
    live: Vec<u32>,
}

struct FakeScheduler(Rc<RefCell<FrameLog>>);

impl FakeScheduler {
    fn new() -> (Self, Rc<RefCell<FrameLog>>) {
        let log = Rc::new(RefCell::new(FrameLog::default()));
        (Self(log.clone()), log)
    }
}

impl FrameScheduler for FakeScheduler {
    type Handle = u32;

    fn request_frame(&mut self) -> Option<u32> {
        let mut log = self.0.borrow_mut();
        log.next += 1;
        let handle = log.next;
        // The previous frame has fired by the time the next one is requested
        log.live.clear();
        log.live.push(handle);
        Some(handle)
    }

    fn cancel_frame(&mut self, handle: u32) {
        self.0.borrow_mut().live.retain(|h| *h != handle);
    }
}

type Viewer = ModelViewer<FakeSurface, FakeScheduler>;

fn offset_cube(size: f32, offset: Vector3<f32>) -> Vec<u8> {
    let mut cube = Mesh::cube(size);
    cube.translate(&offset);
    write_binary_stl(&cube)
}

fn region(width: u32, height: u32) -> MountRegion {
    MountRegion::new(width, height).unwrap()
}

fn mount(source: &str) -> (Viewer, stlview_core::LoadTicket, Rc<RefCell<SurfaceLog>>, Rc<RefCell<FrameLog>>) {
    let (surface, surface_log) = FakeSurface::attached();
    let (scheduler, frame_log) = FakeScheduler::new();
    let (viewer, ticket) = ModelViewer::mount(
        MeshSource::from(source),
        region(800, 600).with_pixel_ratio(2.0),
        surface,
        scheduler,
        ViewerConfig::default(),
    );
    (viewer, ticket, surface_log, frame_log)
}

#[test]
fn mount_initializes_scene_camera_and_surface() {
    let (viewer, ticket, surface_log, frame_log) = mount("/part.stl");

    assert_eq!(viewer.state(), &ViewerState::Loading);
    assert_eq!(ticket.source().as_str(), "/part.stl");
    assert_eq!(ticket.generation(), viewer.generation());
    assert!(viewer.scene().mesh().is_none());
    assert_eq!(viewer.scene().background, stlview_core::Color::from_hex(0x111827));
    assert_relative_eq!(viewer.camera().fov, 50f32.to_radians());
    assert_relative_eq!(viewer.camera().aspect, 800.0 / 600.0);
    assert_eq!(surface_log.borrow().size, (800, 600));
    assert_eq!(surface_log.borrow().device_size, (1600, 1200));
    assert_eq!(frame_log.borrow().live.len(), 1);
    assert!(viewer.frame_pending());
}

#[test]
fn scenario_a_offset_cube_is_centered_and_framed() {
    let (mut viewer, ticket, _, _) = mount("/cube.stl");
    let bytes = offset_cube(1.0, Vector3::new(5.0, 0.0, 0.0));

    assert_eq!(viewer.complete_load(&ticket, Ok(bytes)), LoadOutcome::Ready);

    let node = viewer.scene().mesh().unwrap();
    assert_relative_eq!(node.position, Vector3::new(-5.0, 0.0, 0.0), epsilon = 1e-5);
    assert_relative_eq!(node.world_bounding_box().center(), Point3::origin(), epsilon = 1e-5);

    let expected = 0.5 / 25f32.to_radians().tan() * 1.5;
    assert_relative_eq!(viewer.camera().position.z, expected, epsilon = 1e-4);
    assert!((viewer.camera().position.z - 1.61).abs() < 0.01);
    assert_relative_eq!(viewer.camera().target, Point3::origin());
}

#[test]
fn framed_box_lies_inside_frustum() {
    let mut slab = Mesh::cube(1.0);
    for triangle in &mut slab.triangles {
        for vertex in &mut triangle.vertices {
            vertex.position.x *= 4.0;
            vertex.position.z *= 2.0;
        }
    }
    slab.translate(&Vector3::new(-3.0, 7.0, 11.0));

    let (mut viewer, ticket, _, _) = mount("/slab.stl");
    viewer.complete_load(&ticket, Ok(write_binary_stl(&slab)));

    let expected = 2.0 / 25f32.to_radians().tan() * 1.5;
    assert_relative_eq!(viewer.camera().position.z, expected, epsilon = 1e-3);

    let bbox = viewer.scene().mesh().unwrap().world_bounding_box();
    for corner in bbox.corners() {
        assert!(viewer.camera().contains_point(&corner), "{corner:?} outside frustum");
    }
}

#[test]
fn scenario_b_http_failure_surfaces_message() {
    let (mut viewer, ticket, _, _) = mount("/missing.stl");
    let result: Result<Vec<u8>, _> = Err(LoadError::Http {
        status: 404,
        url: "/missing.stl".into(),
    });

    assert_eq!(viewer.complete_load(&ticket, result), LoadOutcome::Failed);
    assert_eq!(
        viewer.state(),
        &ViewerState::Failed("Failed to load the 3D model. Check the URL and CORS policy.".into())
    );
    assert_eq!(viewer.state().error_message(), Some(LOAD_FAILURE_MESSAGE));
    assert!(viewer.scene().mesh().is_none());
}

#[test]
fn malformed_and_empty_meshes_fail() {
    let (mut viewer, ticket, _, _) = mount("/garbage.stl");
    assert_eq!(viewer.complete_load(&ticket, Ok(b"solid x\nnonsense".to_vec())), LoadOutcome::Failed);
    assert!(viewer.scene().mesh().is_none());

    let (mut viewer, ticket, _, _) = mount("/empty.stl");
    assert_eq!(viewer.complete_load(&ticket, Ok(write_binary_stl(&Mesh::new()))), LoadOutcome::Failed);
    assert!(viewer.scene().mesh().is_none());
}

#[test]
fn state_transitions_exactly_once() {
    let (mut viewer, ticket, _, _) = mount("/cube.stl");
    let bytes = offset_cube(1.0, Vector3::zeros());

    assert_eq!(viewer.complete_load(&ticket, Ok(bytes.clone())), LoadOutcome::Ready);
    assert_eq!(viewer.complete_load(&ticket, Ok(bytes)), LoadOutcome::Stale);
    let late_error: Result<Vec<u8>, _> = Err(LoadError::Network("reset".into()));
    assert_eq!(viewer.complete_load(&ticket, late_error), LoadOutcome::Stale);
    assert_eq!(viewer.state(), &ViewerState::Ready);
}

#[test]
fn degenerate_mesh_keeps_default_distance() {
    let mut point = Mesh::cube(1.0);
    for triangle in &mut point.triangles {
        for vertex in &mut triangle.vertices {
            vertex.position = Point3::new(2.0, 2.0, 2.0);
        }
    }
    let (mut viewer, ticket, _, _) = mount("/point.stl");

    assert_eq!(viewer.complete_load(&ticket, Ok(write_binary_stl(&point))), LoadOutcome::Ready);
    assert_relative_eq!(viewer.camera().position.z, 5.0, epsilon = 1e-4);
    assert_relative_eq!(
        viewer.scene().mesh().unwrap().world_bounding_box().center(),
        Point3::origin(),
        epsilon = 1e-5
    );
}

#[test]
fn frames_render_while_mounted_regardless_of_load() {
    let (mut viewer, ticket, surface_log, _) = mount("/cube.stl");

    assert!(viewer.frame());
    assert!(viewer.frame());
    assert_eq!(surface_log.borrow().renders, 2);

    let result: Result<Vec<u8>, _> = Err(LoadError::Network("offline".into()));
    viewer.complete_load(&ticket, result);
    assert!(viewer.frame());
    assert_eq!(surface_log.borrow().renders, 3);
}

#[test]
fn frame_advances_damped_controls_before_rendering() {
    let (mut viewer, _, surface_log, _) = mount("/cube.stl");
    let azimuth = |p: &Point3<f32>| p.x.atan2(p.z);

    viewer.controls_mut().rotate_left(1.0);
    assert!(viewer.frame());
    let first = azimuth(&surface_log.borrow().seen_positions[0]);
    assert_relative_eq!(first, -0.05, epsilon = 1e-5);
    assert_relative_eq!(azimuth(&viewer.camera().position), first, epsilon = 1e-6);

    // Remaining motion decays by the damping factor on the next frame
    assert!(viewer.frame());
    let second = azimuth(&surface_log.borrow().seen_positions[1]);
    assert_relative_eq!(second - first, -0.05 * 0.95, epsilon = 1e-5);
    assert_eq!(surface_log.borrow().renders, 2);
}

#[test]
fn resize_updates_camera_and_surface_before_next_frame() {
    let (mut viewer, _, surface_log, _) = mount("/cube.stl");
    viewer.resize(region(1024, 512).with_pixel_ratio(1.5));

    assert_relative_eq!(viewer.camera().aspect, 2.0);
    assert_relative_eq!(viewer.camera().projection_aspect(), 2.0, epsilon = 1e-5);
    assert_eq!(surface_log.borrow().size, (1024, 512));
    assert_eq!(surface_log.borrow().device_size, (1536, 768));
    assert_eq!(viewer.surface().size(), (1024, 512));
    assert_eq!(viewer.region().width(), 1024);
    assert_eq!(surface_log.borrow().renders, 0);
}

#[test]
fn teardown_is_idempotent_and_cancels_frames() {
    let (mut viewer, _, surface_log, frame_log) = mount("/cube.stl");
    viewer.frame();

    viewer.teardown();
    viewer.teardown();

    assert!(frame_log.borrow().live.is_empty());
    assert_eq!(viewer.render_loop().state(), LoopState::Cancelled);
    assert_eq!(surface_log.borrow().disposed, 1);
    assert_eq!(surface_log.borrow().detached, 1);
    assert!(!viewer.frame());
    assert!(!viewer.frame_pending());
    assert_eq!(surface_log.borrow().renders_after_dispose, 0);
}

#[test]
fn teardown_skips_detach_when_surface_never_attached() {
    let (surface, surface_log) = FakeSurface::detached();
    let (scheduler, frame_log) = FakeScheduler::new();
    let (mut viewer, _) = ModelViewer::mount(
        MeshSource::from("/cube.stl"),
        region(10, 10),
        surface,
        scheduler,
        ViewerConfig::default(),
    );

    viewer.teardown();
    viewer.teardown();

    assert_eq!(surface_log.borrow().detached, 0);
    assert_eq!(surface_log.borrow().disposed, 1);
    assert!(frame_log.borrow().live.is_empty());
}

#[test]
fn dropping_viewer_tears_down() {
    let (viewer, _, surface_log, frame_log) = mount("/cube.stl");
    drop(viewer);
    assert_eq!(surface_log.borrow().disposed, 1);
    assert!(frame_log.borrow().live.is_empty());
}

#[test]
fn scenario_c_load_after_unmount_is_ignored() {
    let mut slot: ViewerSlot<FakeSurface, FakeScheduler> = ViewerSlot::new();
    let (surface, surface_log) = FakeSurface::attached();
    let (scheduler, frame_log) = FakeScheduler::new();
    let ticket = slot.mount(
        MeshSource::from("/cube.stl"),
        region(640, 480),
        surface,
        scheduler,
        ViewerConfig::default(),
    );

    slot.unmount();
    let outcome = slot.complete_load(&ticket, Ok(offset_cube(1.0, Vector3::zeros())));

    assert_eq!(outcome, LoadOutcome::Stale);
    assert!(slot.viewer().is_none());
    assert!(!slot.frame());
    assert_eq!(surface_log.borrow().disposed, 1);
    assert!(frame_log.borrow().live.is_empty());
}

#[test]
fn load_after_teardown_does_not_mutate_viewer() {
    let (mut viewer, ticket, _, _) = mount("/cube.stl");
    viewer.teardown();

    let outcome = viewer.complete_load(&ticket, Ok(offset_cube(1.0, Vector3::zeros())));
    assert_eq!(outcome, LoadOutcome::Stale);
    assert!(viewer.scene().mesh().is_none());
    assert_eq!(viewer.state(), &ViewerState::Loading);
    assert_relative_eq!(viewer.camera().position.z, 5.0);
}

#[test]
fn superseded_source_ignores_old_completion() {
    let mut slot: ViewerSlot<FakeSurface, FakeScheduler> = ViewerSlot::new();

    let (first_surface, first_log) = FakeSurface::attached();
    let (first_scheduler, first_frames) = FakeScheduler::new();
    let first = slot.mount(
        MeshSource::from("/a.stl"),
        region(640, 480),
        first_surface,
        first_scheduler,
        ViewerConfig::default(),
    );

    let (second_surface, _) = FakeSurface::attached();
    let (second_scheduler, _) = FakeScheduler::new();
    let second = slot.mount(
        MeshSource::from("/b.stl"),
        region(640, 480),
        second_surface,
        second_scheduler,
        ViewerConfig::default(),
    );

    // The previous viewer was fully released before the new one was built
    assert_eq!(first_log.borrow().disposed, 1);
    assert_eq!(first_log.borrow().detached, 1);
    assert!(first_frames.borrow().live.is_empty());
    assert_ne!(first.generation(), second.generation());

    let stale = slot.complete_load(&first, Ok(offset_cube(1.0, Vector3::zeros())));
    assert_eq!(stale, LoadOutcome::Stale);
    assert_eq!(slot.state(), Some(&ViewerState::Loading));

    let fresh = slot.complete_load(&second, Ok(offset_cube(2.0, Vector3::zeros())));
    assert_eq!(fresh, LoadOutcome::Ready);
    assert_eq!(slot.viewer().unwrap().source().as_str(), "/b.stl");
}
