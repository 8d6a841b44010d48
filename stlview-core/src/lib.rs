/// stlview Core Library - Shared geometry and viewer logic
///
/// This library provides the host-independent part of the STL model viewer:
/// STL parsing, camera framing, orbit controls, the scene, the render loop
/// and the viewer lifecycle. Hosts supply a `Surface` and a
/// `FrameScheduler` and perform the actual I/O.

pub mod catalog;
pub mod config;
pub mod controls;
pub mod error;
pub mod geometry;
pub mod projection;
pub mod render_loop;
pub mod scene;
pub mod stl;
pub mod transform;
pub mod viewer;

// Re-export commonly used types
pub use config::ViewerConfig;
pub use controls::OrbitControls;
pub use error::{LoadError, StlError, ViewerError};
pub use geometry::{BoundingBox, Mesh, Triangle, Vertex};
pub use projection::Camera;
pub use render_loop::{FrameScheduler, RenderLoop};
pub use scene::{Color, MeshNode, Scene};
pub use transform::Transform;
pub use viewer::{
    LoadOutcome, LoadTicket, MeshSource, ModelViewer, MountRegion, Surface, ViewerSlot, ViewerState,
};
