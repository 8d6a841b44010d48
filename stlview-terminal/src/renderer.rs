/// ASCII rasterizer for terminal rendering
use crossterm::{
    cursor,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::Matrix4;
use std::io::{self, Write};
use stlview_core::scene::{Color as SceneColor, Material};
use stlview_core::transform::Transform;
use stlview_core::{Camera, MountRegion, Scene, Surface, Triangle};

/// Character luminosity ramp for depth/shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Vertical samples per character cell; cells are about twice as tall as wide
pub const SAMPLES_PER_CELL: u32 = 2;

/// ASCII renderer that converts the viewer scene to terminal characters
///
/// The virtual pixel grid is `columns x rows * SAMPLES_PER_CELL`; each drawn
/// character takes the brighter of its two vertical samples.
pub struct AsciiRenderer<W: Write> {
    out: W,
    /// Mount region in layout pixels, as reported through `Surface::size`
    layout: (u32, u32),
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    /// Lit intensity per sample, negative where nothing was drawn
    shade_buffer: Vec<f32>,
    background: SceneColor,
    tint: SceneColor,
    /// Rows reserved at the top for the host's status line
    top_margin: u16,
    attached: bool,
    disposed: bool,
    frames: u64,
}

impl<W: Write> AsciiRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            layout: (0, 0),
            width: 0,
            height: 0,
            depth_buffer: Vec::new(),
            shade_buffer: Vec::new(),
            background: SceneColor::new(0.0, 0.0, 0.0),
            tint: SceneColor::WHITE,
            top_margin: 0,
            attached: true,
            disposed: false,
            frames: 0,
        }
    }

    pub fn with_top_margin(mut self, rows: u16) -> Self {
        self.top_margin = rows;
        self
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.shade_buffer.fill(-1.0);
    }

    /// Rasterize the scene into the sample buffers
    pub fn rasterize(&mut self, scene: &Scene, camera: &Camera) {
        self.clear();
        self.background = scene.background;

        let Some(node) = scene.mesh() else {
            return;
        };
        self.tint = tint_of(&node.material);

        let model = node.model_matrix();
        let normal_matrix = Transform::normal_matrix(&model);
        for triangle in &node.geometry.triangles {
            let normal = (normal_matrix * triangle.vertices[0].normal)
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(|| triangle.calculate_normal());
            let shade = scene.shade(&normal);
            self.render_triangle(triangle, &model, camera, shade);
        }
    }

    fn render_triangle(&mut self, triangle: &Triangle, model_matrix: &Matrix4<f32>, camera: &Camera, shade: f32) {
        // Project vertices to screen space
        let mut screen_coords = [(0.0, 0.0, 0.0); 3];
        for (slot, vertex) in screen_coords.iter_mut().zip(&triangle.vertices) {
            match camera.project_unclipped(
                &vertex.position,
                model_matrix,
                self.width as u32,
                self.height as u32,
            ) {
                Some(coords) => *slot = coords,
                None => return, // Vertex behind the camera
            }
        }

        self.rasterize_triangle(&screen_coords, shade);
    }

    fn rasterize_triangle(&mut self, coords: &[(f32, f32, f32); 3], shade: f32) {
        let (v0, v1, v2) = (coords[0], coords[1], coords[2]);

        // Bounding box
        let min_x = v0.0.min(v1.0).min(v2.0).floor() as i32;
        let max_x = v0.0.max(v1.0).max(v2.0).ceil() as i32;
        let min_y = v0.1.min(v1.1).min(v2.1).floor() as i32;
        let max_y = v0.1.max(v1.1).max(v2.1).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        // Scanline rasterization
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                // Barycentric coordinates
                if let Some((w0, w1, w2)) = barycentric(
                    (v0.0, v0.1),
                    (v1.0, v1.1),
                    (v2.0, v2.1),
                    (px, py),
                ) {
                    if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                        // Interpolate depth
                        let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                        if !(-1.0..=1.0).contains(&depth) {
                            continue;
                        }

                        let idx = y as usize * self.width + x as usize;
                        if depth < self.depth_buffer[idx] {
                            self.depth_buffer[idx] = depth;
                            self.shade_buffer[idx] = shade;
                        }
                    }
                }
            }
        }
    }

    /// Lit intensity of a character cell, `None` for background
    pub fn cell_shade(&self, column: usize, row: usize) -> Option<f32> {
        let samples = SAMPLES_PER_CELL as usize;
        (0..samples)
            .filter_map(|s| {
                let y = row * samples + s;
                (y < self.height).then(|| self.shade_buffer[y * self.width + column])
            })
            .filter(|shade| *shade >= 0.0)
            .reduce(f32::max)
    }

    pub fn draw(&mut self) -> io::Result<()> {
        let rows = self.height / SAMPLES_PER_CELL as usize;
        let (br, bg, bb) = self.background.to_rgb8();

        self.out.queue(SetBackgroundColor(Color::Rgb { r: br, g: bg, b: bb }))?;
        for row in 0..rows {
            self.out.queue(cursor::MoveTo(0, row as u16 + self.top_margin))?;
            for column in 0..self.width {
                let (character, color) = match self.cell_shade(column, row) {
                    Some(shade) => {
                        let (r, g, b) = self.tint.scaled(shade.min(1.0)).to_rgb8();
                        (ramp_char(shade), Color::Rgb { r, g, b })
                    }
                    None => (' ', Color::Reset),
                };
                self.out.queue(SetForegroundColor(color))?;
                self.out.queue(Print(character))?;
            }
        }
        self.out.queue(ResetColor)?;
        self.out.flush()
    }
}

impl<W: Write> Surface for AsciiRenderer<W> {
    fn set_size(&mut self, region: &MountRegion) {
        self.layout = (region.width(), region.height());
        let (width, height) = region.device_size();
        self.width = width as usize;
        self.height = height as usize;
        let size = self.width * self.height;
        self.depth_buffer = vec![f32::INFINITY; size];
        self.shade_buffer = vec![-1.0; size];
    }

    fn size(&self) -> (u32, u32) {
        self.layout
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) {
        if self.disposed {
            return;
        }
        self.rasterize(scene, camera);
        if let Err(err) = self.draw() {
            log::warn!("terminal draw failed: {err}");
        }
        self.frames += 1;
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.depth_buffer = Vec::new();
        self.shade_buffer = Vec::new();
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn detach(&mut self) {
        self.attached = false;
        // Leave a blank screen behind; the terminal may already be gone
        let _ = self
            .out
            .queue(ResetColor)
            .and_then(|out| out.queue(crossterm::terminal::Clear(crossterm::terminal::ClearType::All)))
            .and_then(|out| out.flush());
    }
}

/// Map a lit intensity onto the luminosity ramp, never choosing blank
fn ramp_char(shade: f32) -> char {
    // Ambient 0.6 + directional 0.8 peaks at 1.4
    let normalized = (shade / 1.4).clamp(0.0, 1.0);
    let index = 1 + (normalized * (LUMINOSITY_RAMP.len() - 2) as f32).round() as usize;
    LUMINOSITY_RAMP[index.min(LUMINOSITY_RAMP.len() - 1)]
}

fn tint_of(material: &Material) -> SceneColor {
    // Rough metals reflect less of their base color
    material.color.scaled(1.0 - 0.5 * material.metalness * material.roughness)
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stlview_core::{Mesh, MeshNode, ViewerConfig};

    fn scene_with_cube() -> Scene {
        let config = ViewerConfig::default();
        let mut scene = Scene::new(config.background, config.ambient, config.directional);
        scene.set_mesh(MeshNode::new(Mesh::cube(1.0), config.material));
        scene
    }

    fn sized(columns: u32, rows: u32) -> AsciiRenderer<Vec<u8>> {
        let mut renderer = AsciiRenderer::new(Vec::new());
        let region = MountRegion::new(columns, rows * SAMPLES_PER_CELL).unwrap();
        renderer.set_size(&region);
        renderer
    }

    #[test]
    fn test_cube_covers_center_cell() {
        let mut renderer = sized(40, 20);
        let mut camera = Camera::new(40, 40);
        camera.position.z = 2.0;

        renderer.rasterize(&scene_with_cube(), &camera);
        assert!(renderer.cell_shade(20, 10).is_some());
        assert!(renderer.cell_shade(0, 0).is_none());
    }

    #[test]
    fn test_empty_scene_draws_background_only() {
        let mut renderer = sized(8, 4);
        let config = ViewerConfig::default();
        let scene = Scene::new(config.background, config.ambient, config.directional);

        renderer.render(&scene, &Camera::new(8, 8));
        assert_eq!(renderer.frames(), 1);
        assert!((0..8).all(|c| (0..4).all(|r| renderer.cell_shade(c, r).is_none())));
        assert!(!renderer.output().is_empty());
    }

    #[test]
    fn test_dispose_stops_rendering() {
        let mut renderer = sized(8, 4);
        renderer.dispose();
        renderer.render(&scene_with_cube(), &Camera::new(8, 8));
        assert_eq!(renderer.frames(), 0);

        assert!(renderer.is_attached());
        renderer.detach();
        renderer.detach();
        assert!(!renderer.is_attached());
    }

    #[test]
    fn test_size_reports_layout_pixels() {
        let mut renderer = AsciiRenderer::new(Vec::new());
        let region = MountRegion::new(8, 4).unwrap().with_pixel_ratio(2.0);
        renderer.set_size(&region);

        assert_eq!(renderer.size(), (8, 4));
        // The sample grid itself is at device resolution
        assert_eq!((renderer.width, renderer.height), (16, 8));
    }

    #[test]
    fn test_ramp_never_blank_for_lit_samples() {
        assert_ne!(ramp_char(0.0), ' ');
        assert_eq!(ramp_char(1.4), '@');
        assert_eq!(ramp_char(5.0), '@');
    }

    #[test]
    fn test_barycentric_degenerate() {
        assert!(barycentric((0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (0.5, 0.5)).is_none());
    }
}
