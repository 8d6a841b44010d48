/// Camera and projection utilities
use nalgebra::{Matrix4, Point3, Vector3};

use crate::geometry::BoundingBox;
use crate::transform::Transform;

pub const DEFAULT_FOV_DEGREES: f32 = 50.0;
pub const DEFAULT_NEAR: f32 = 0.1;
pub const DEFAULT_FAR: f32 = 1000.0;

/// Perspective camera looking at a target point
///
/// The projection matrix is cached: changing `aspect`, `fov`, `near` or `far`
/// has no effect on rendering until [`Camera::update_projection_matrix`] runs.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view in radians
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    projection: Matrix4<f32>,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self::perspective(
            DEFAULT_FOV_DEGREES,
            width as f32 / height as f32,
            DEFAULT_NEAR,
            DEFAULT_FAR,
        )
    }

    pub fn perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Point3::new(0.0, 0.0, 5.0),
            target: Point3::origin(),
            up: Vector3::new(0.0, 1.0, 0.0),
            fov: fov_degrees.to_radians(),
            aspect,
            near,
            far,
            projection: Matrix4::identity(),
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn look_at(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    /// Recompute the cached projection from the current parameters
    pub fn update_projection_matrix(&mut self) {
        self.projection = Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far);
    }

    /// Create the view matrix (camera transformation)
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection
    }

    /// Aspect ratio the cached projection was built with
    pub fn projection_aspect(&self) -> f32 {
        // For a perspective matrix m[(1,1)] / m[(0,0)] == aspect
        self.projection[(1, 1)] / self.projection[(0, 0)]
    }

    /// Distance at which a box with the given extents is fully framed
    pub fn framing_distance(&self, bbox: &BoundingBox, margin: f32) -> f32 {
        framing_distance(bbox.max_extent(), self.fov, margin)
    }

    /// Project a 3D point to 2D screen space
    ///
    /// Returns `(x, y, depth)` with depth in normalized device range
    /// `[-1, 1]`, or `None` when the point falls outside the view volume.
    pub fn project_to_screen(
        &self,
        point: &Point3<f32>,
        model_matrix: &Matrix4<f32>,
        width: u32,
        height: u32,
    ) -> Option<(f32, f32, f32)> {
        let mvp = Transform::mvp_matrix(model_matrix, &self.view_matrix(), &self.projection);
        ndc_of(&mvp, point).map(|ndc| to_screen(&ndc, width, height))
    }

    /// Like [`Camera::project_to_screen`] but keeps points beyond the viewport
    /// edges, so rasterizers can clip partially visible triangles themselves
    pub fn project_unclipped(
        &self,
        point: &Point3<f32>,
        model_matrix: &Matrix4<f32>,
        width: u32,
        height: u32,
    ) -> Option<(f32, f32, f32)> {
        let mvp = Transform::mvp_matrix(model_matrix, &self.view_matrix(), &self.projection);
        perspective_divide(&mvp, point).map(|ndc| to_screen(&ndc, width, height))
    }

    /// Whether a world-space point lies inside the view frustum
    pub fn contains_point(&self, point: &Point3<f32>) -> bool {
        let view_projection = self.projection * self.view_matrix();
        ndc_of(&view_projection, point).is_some()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// Normalized device coordinates, `None` behind the eye
fn perspective_divide(mvp: &Matrix4<f32>, point: &Point3<f32>) -> Option<Vector3<f32>> {
    let clip = Transform::to_clip(mvp, point);
    (clip.w > 1e-6).then(|| clip.xyz() / clip.w)
}

/// Normalized device coordinates of `point`, `None` if clipped
fn ndc_of(mvp: &Matrix4<f32>, point: &Point3<f32>) -> Option<Vector3<f32>> {
    let ndc = perspective_divide(mvp, point)?;
    let inside = (-1.0..=1.0).contains(&ndc.x)
        && (-1.0..=1.0).contains(&ndc.y)
        && (-1.0..=1.0).contains(&ndc.z);
    inside.then_some(ndc)
}

fn to_screen(ndc: &Vector3<f32>, width: u32, height: u32) -> (f32, f32, f32) {
    let screen_x = (ndc.x + 1.0) * 0.5 * width as f32;
    let screen_y = (1.0 - ndc.y) * 0.5 * height as f32;
    (screen_x, screen_y, ndc.z)
}

/// `|max_dim / 2 / tan(fov / 2)| * margin`, with `fov` in radians
pub fn framing_distance(max_dim: f32, fov: f32, margin: f32) -> f32 {
    (max_dim / 2.0 / (fov / 2.0).tan()).abs() * margin
}
