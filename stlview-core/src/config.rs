/// Appearance and behavior settings of the model viewer
use nalgebra::Point3;

use crate::projection::{DEFAULT_FAR, DEFAULT_FOV_DEGREES, DEFAULT_NEAR};
use crate::scene::{AmbientLight, Color, DirectionalLight, Material};

/// Message surfaced to the host for every load failure
pub const LOAD_FAILURE_MESSAGE: &str = "Failed to load the 3D model. Check the URL and CORS policy.";

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub background: Color,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub enable_damping: bool,
    pub damping_factor: f32,
    /// Headroom multiplier applied to the fitted camera distance
    pub framing_margin: f32,
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
    pub material: Material,
    pub failure_message: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            background: Color::from_hex(0x111827),
            fov_degrees: DEFAULT_FOV_DEGREES,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
            enable_damping: true,
            damping_factor: 0.05,
            framing_margin: 1.5,
            ambient: AmbientLight {
                color: Color::WHITE,
                intensity: 0.6,
            },
            directional: DirectionalLight {
                color: Color::WHITE,
                intensity: 0.8,
                position: Point3::new(10.0, 20.0, 15.0),
            },
            material: Material {
                color: Color::from_hex(0xc4c4c4),
                metalness: 0.2,
                roughness: 0.6,
            },
            failure_message: LOAD_FAILURE_MESSAGE.to_string(),
        }
    }
}
