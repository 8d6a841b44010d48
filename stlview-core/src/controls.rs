/// Orbit controls with inertial (damped) motion
///
/// Only orbit and dolly are supported. There is no panning: no input moves the
/// target, so the centered model stays at the middle of the view.
use std::f32::consts::PI;

use nalgebra::{Point3, Vector3};

use crate::projection::Camera;

const POLE_EPSILON: f32 = 1e-6;
const ZOOM_STEP: f32 = 0.95;
const KEY_ROTATE_STEP: f32 = 0.1;

/// Spherical coordinates around a y-up axis
#[derive(Debug, Clone, Copy, PartialEq)]
struct Spherical {
    radius: f32,
    /// Polar angle from +y
    phi: f32,
    /// Azimuth around +y, measured from +z
    theta: f32,
}

impl Spherical {
    fn from_vector(v: &Vector3<f32>) -> Self {
        let radius = v.norm();
        if radius == 0.0 {
            return Self { radius, phi: 0.0, theta: 0.0 };
        }
        Self {
            radius,
            theta: v.x.atan2(v.z),
            phi: (v.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_vector(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

/// Rotates and dollies a [`Camera`] around a fixed target from pointer input
///
/// Input only accumulates deltas; nothing moves until [`OrbitControls::update`]
/// runs, normally once per frame.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pointer: Option<(f32, f32)>,
}

impl OrbitControls {
    pub fn new(target: Point3<f32>) -> Self {
        Self {
            target,
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pointer: None,
        }
    }

    pub fn with_damping(mut self, factor: f32) -> Self {
        self.enable_damping = true;
        self.damping_factor = factor;
        self
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Move towards the target; `factor` < 1 shrinks the orbit radius
    pub fn dolly(&mut self, factor: f32) {
        if factor > 0.0 {
            self.scale *= factor;
        }
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.pointer = Some((x, y));
    }

    /// Drag across the full viewport height turns the camera by a full circle
    pub fn pointer_move(&mut self, x: f32, y: f32, viewport_height: f32) {
        let Some((last_x, last_y)) = self.pointer else {
            return;
        };
        if viewport_height > 0.0 {
            let turn = 2.0 * PI * self.rotate_speed / viewport_height;
            self.rotate_left((x - last_x) * turn);
            self.rotate_up((y - last_y) * turn);
        }
        self.pointer = Some((x, y));
    }

    pub fn pointer_up(&mut self) {
        self.pointer = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.pointer.is_some()
    }

    /// Scroll input; negative `delta_y` (scrolling up) zooms in
    pub fn wheel(&mut self, delta_y: f32) {
        let step = ZOOM_STEP.powf(self.zoom_speed);
        if delta_y < 0.0 {
            self.dolly(step);
        } else if delta_y > 0.0 {
            self.dolly(1.0 / step);
        }
    }

    pub fn key_rotate(&mut self, left: f32, up: f32) {
        self.rotate_left(left * KEY_ROTATE_STEP);
        self.rotate_up(up * KEY_ROTATE_STEP);
    }

    /// Apply accumulated input to the camera
    ///
    /// Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let previous = camera.position;
        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_vector(&offset);

        if self.enable_damping {
            spherical.theta += self.delta_theta * self.damping_factor;
            spherical.phi += self.delta_phi * self.damping_factor;
        } else {
            spherical.theta += self.delta_theta;
            spherical.phi += self.delta_phi;
        }

        spherical.phi = spherical.phi.clamp(POLE_EPSILON, PI - POLE_EPSILON);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        camera.position = self.target + spherical.to_vector();
        camera.look_at(self.target);

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.scale = 1.0;

        (camera.position - previous).norm_squared() > POLE_EPSILON * POLE_EPSILON
    }
}
