/// Scene graph for a single-mesh viewer: background, two lights, one mesh node
use nalgebra::{Matrix4, Point3, Vector3};

use crate::geometry::{BoundingBox, Mesh};
use crate::transform::Transform;

/// Linear RGB color with components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// From a `0xRRGGBB` literal
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self::new(channel(16), channel(8), channel(0))
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }

    /// Rec. 709 relative luminance
    pub fn luminance(self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }

    pub fn to_rgb8(self) -> (u8, u8, u8) {
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        (byte(self.r), byte(self.g), byte(self.b))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

/// Light arriving from `position` towards the origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    pub position: Point3<f32>,
}

impl DirectionalLight {
    /// Unit vector pointing from the scene towards the light
    pub fn direction(&self) -> Vector3<f32> {
        self.position
            .coords
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::y)
    }
}

/// Untextured physically-based surface description
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: Color,
    pub metalness: f32,
    pub roughness: f32,
}

/// The single renderable mesh of a scene
#[derive(Debug, Clone)]
pub struct MeshNode {
    pub geometry: Mesh,
    pub material: Material,
    pub position: Vector3<f32>,
    bounding_box: BoundingBox,
}

impl MeshNode {
    pub fn new(geometry: Mesh, material: Material) -> Self {
        let bounding_box = geometry.bounding_box();
        Self {
            geometry,
            material,
            position: Vector3::zeros(),
            bounding_box,
        }
    }

    /// Geometry bounds in model space, computed once at construction
    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    pub fn world_bounding_box(&self) -> BoundingBox {
        self.bounding_box.translated(&self.position)
    }

    /// Offset the node so its bounding-box center sits on the world origin
    ///
    /// Returns the geometry center that was compensated for.
    pub fn center_at_origin(&mut self) -> Point3<f32> {
        let center = self.bounding_box.center();
        self.position -= center.coords;
        center
    }

    pub fn model_matrix(&self) -> Matrix4<f32> {
        Transform::translation_matrix(&self.position)
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub background: Color,
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
    mesh: Option<MeshNode>,
    revision: u64,
}

impl Scene {
    pub fn new(background: Color, ambient: AmbientLight, directional: DirectionalLight) -> Self {
        Self {
            background,
            ambient,
            directional,
            mesh: None,
            revision: 0,
        }
    }

    pub fn mesh(&self) -> Option<&MeshNode> {
        self.mesh.as_ref()
    }

    pub fn set_mesh(&mut self, node: MeshNode) {
        self.mesh = Some(node);
        self.revision += 1;
    }

    pub fn clear(&mut self) {
        if self.mesh.take().is_some() {
            self.revision += 1;
        }
    }

    /// Bumped whenever the mesh node is replaced or removed
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Scalar irradiance for a world-space surface normal
    ///
    /// Ambient term plus Lambert term of the directional light, weighted by
    /// light color luminance. Intended for renderers without a shader stage.
    pub fn shade(&self, normal: &Vector3<f32>) -> f32 {
        let ambient = self.ambient.intensity * self.ambient.color.luminance();
        let lambert = normal.dot(&self.directional.direction()).max(0.0);
        let diffuse = self.directional.intensity * self.directional.color.luminance() * lambert;
        ambient + diffuse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn lights() -> (AmbientLight, DirectionalLight) {
        (
            AmbientLight { color: Color::WHITE, intensity: 0.6 },
            DirectionalLight {
                color: Color::WHITE,
                intensity: 0.8,
                position: Point3::new(10.0, 20.0, 15.0),
            },
        )
    }

    fn material() -> Material {
        Material { color: Color::from_hex(0xc4c4c4), metalness: 0.2, roughness: 0.6 }
    }

    #[test]
    fn test_from_hex() {
        let color = Color::from_hex(0x111827);
        assert_relative_eq!(color.r, 17.0 / 255.0);
        assert_relative_eq!(color.g, 24.0 / 255.0);
        assert_relative_eq!(color.b, 39.0 / 255.0);
        assert_eq!(color.to_rgb8(), (0x11, 0x18, 0x27));
    }

    #[test]
    fn test_center_at_origin() {
        let mut geometry = Mesh::cube(1.0);
        geometry.translate(&Vector3::new(5.0, 5.0, 5.0));
        let mut node = MeshNode::new(geometry, material());

        let center = node.center_at_origin();
        assert_relative_eq!(center, Point3::new(5.0, 5.0, 5.0), epsilon = 1e-6);
        assert_relative_eq!(node.position, Vector3::new(-5.0, -5.0, -5.0), epsilon = 1e-6);
        assert_relative_eq!(node.world_bounding_box().center(), Point3::origin(), epsilon = 1e-6);
    }

    #[test]
    fn test_revision_tracks_mesh_changes() {
        let (ambient, directional) = lights();
        let mut scene = Scene::new(Color::from_hex(0x111827), ambient, directional);
        assert_eq!(scene.revision(), 0);
        scene.clear();
        assert_eq!(scene.revision(), 0);
        scene.set_mesh(MeshNode::new(Mesh::cube(1.0), material()));
        assert_eq!(scene.revision(), 1);
        scene.clear();
        assert_eq!(scene.revision(), 2);
        assert!(scene.mesh().is_none());
    }

    #[test]
    fn test_shade_faces_light_brighter() {
        let (ambient, directional) = lights();
        let scene = Scene::new(Color::from_hex(0x111827), ambient, directional);
        let lit = scene.shade(&directional.direction());
        let unlit = scene.shade(&-directional.direction());
        assert_relative_eq!(lit, 1.4, epsilon = 1e-5);
        assert_relative_eq!(unlit, 0.6, epsilon = 1e-5);
    }
}
