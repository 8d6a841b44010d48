/// WebGL2 surface for the model viewer
use js_sys::{Float32Array, Object, Reflect};
use stlview_core::transform::Transform;
use stlview_core::{Camera, Mesh, MountRegion, Scene, Surface};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    HtmlCanvasElement, WebGl2RenderingContext as Gl, WebGlBuffer, WebGlProgram, WebGlShader,
    WebGlUniformLocation, WebGlVertexArrayObject,
};

/// Floats per vertex: position then normal
pub const VERTEX_STRIDE: usize = 6;

const VERTEX_SHADER: &str = r#"#version 300 es
in vec3 a_position;
in vec3 a_normal;
uniform mat4 u_mvp;
uniform mat4 u_model;
uniform mat3 u_normal_matrix;
out vec3 v_normal;
out vec3 v_world;
void main() {
    v_normal = u_normal_matrix * a_normal;
    v_world = (u_model * vec4(a_position, 1.0)).xyz;
    gl_Position = u_mvp * vec4(a_position, 1.0);
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
in vec3 v_normal;
in vec3 v_world;
uniform vec3 u_eye;
uniform vec3 u_light_dir;
uniform vec3 u_ambient;
uniform vec3 u_directional;
uniform vec3 u_base_color;
uniform float u_metalness;
uniform float u_roughness;
out vec4 frag_color;
void main() {
    vec3 n = normalize(v_normal);
    if (!gl_FrontFacing) n = -n;
    vec3 l = normalize(u_light_dir);
    vec3 v = normalize(u_eye - v_world);
    vec3 h = normalize(l + v);
    float diffuse = max(dot(n, l), 0.0);
    float shininess = mix(128.0, 4.0, u_roughness);
    float specular = pow(max(dot(n, h), 0.0), shininess) * (1.0 - u_roughness);
    vec3 albedo = u_base_color * (1.0 - u_metalness);
    vec3 tint = mix(vec3(0.04), u_base_color, u_metalness);
    vec3 color = albedo * (u_ambient + u_directional * diffuse) + tint * u_directional * specular;
    frag_color = vec4(color, 1.0);
}
"#;

struct Uniforms {
    mvp: Option<WebGlUniformLocation>,
    model: Option<WebGlUniformLocation>,
    normal_matrix: Option<WebGlUniformLocation>,
    eye: Option<WebGlUniformLocation>,
    light_dir: Option<WebGlUniformLocation>,
    ambient: Option<WebGlUniformLocation>,
    directional: Option<WebGlUniformLocation>,
    base_color: Option<WebGlUniformLocation>,
    metalness: Option<WebGlUniformLocation>,
    roughness: Option<WebGlUniformLocation>,
}

impl Uniforms {
    fn locate(gl: &Gl, program: &WebGlProgram) -> Self {
        let at = |name: &str| gl.get_uniform_location(program, name);
        Self {
            mvp: at("u_mvp"),
            model: at("u_model"),
            normal_matrix: at("u_normal_matrix"),
            eye: at("u_eye"),
            light_dir: at("u_light_dir"),
            ambient: at("u_ambient"),
            directional: at("u_directional"),
            base_color: at("u_base_color"),
            metalness: at("u_metalness"),
            roughness: at("u_roughness"),
        }
    }
}

/// Geometry currently resident on the GPU
struct GpuMesh {
    vao: WebGlVertexArrayObject,
    buffer: WebGlBuffer,
    vertex_count: i32,
}

pub struct WebGlSurface {
    canvas: HtmlCanvasElement,
    gl: Gl,
    program: WebGlProgram,
    uniforms: Uniforms,
    mesh: Option<GpuMesh>,
    uploaded_revision: Option<u64>,
    size: (u32, u32),
    disposed: bool,
}

impl WebGlSurface {
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, JsValue> {
        let options = Object::new();
        Reflect::set(&options, &"antialias".into(), &JsValue::TRUE)?;
        let gl: Gl = canvas
            .get_context_with_context_options("webgl2", &options)?
            .ok_or_else(|| JsValue::from_str("WebGL2 is not available"))?
            .dyn_into()?;

        let vertex = compile_shader(&gl, Gl::VERTEX_SHADER, VERTEX_SHADER)?;
        let fragment = compile_shader(&gl, Gl::FRAGMENT_SHADER, FRAGMENT_SHADER)?;
        let program = link_program(&gl, &vertex, &fragment);
        gl.delete_shader(Some(&vertex));
        gl.delete_shader(Some(&fragment));
        let program = program?;

        gl.enable(Gl::DEPTH_TEST);
        let uniforms = Uniforms::locate(&gl, &program);
        Ok(Self {
            canvas,
            gl,
            program,
            uniforms,
            mesh: None,
            uploaded_revision: None,
            size: (0, 0),
            disposed: false,
        })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    fn upload(&mut self, scene: &Scene) -> Result<(), JsValue> {
        self.release_mesh();
        self.uploaded_revision = Some(scene.revision());
        let Some(node) = scene.mesh() else {
            return Ok(());
        };

        let data = vertex_data(&node.geometry);
        let gl = &self.gl;
        let vao = gl
            .create_vertex_array()
            .ok_or_else(|| JsValue::from_str("failed to create vertex array"))?;
        let buffer = gl
            .create_buffer()
            .ok_or_else(|| JsValue::from_str("failed to create buffer"))?;

        gl.bind_vertex_array(Some(&vao));
        gl.bind_buffer(Gl::ARRAY_BUFFER, Some(&buffer));
        let array = Float32Array::from(data.as_slice());
        gl.buffer_data_with_array_buffer_view(Gl::ARRAY_BUFFER, &array, Gl::STATIC_DRAW);

        let stride = (VERTEX_STRIDE * std::mem::size_of::<f32>()) as i32;
        for (name, offset) in [("a_position", 0), ("a_normal", 3)] {
            let location = gl.get_attrib_location(&self.program, name);
            if location < 0 {
                continue;
            }
            let location = location as u32;
            gl.enable_vertex_attrib_array(location);
            gl.vertex_attrib_pointer_with_i32(
                location,
                3,
                Gl::FLOAT,
                false,
                stride,
                offset * std::mem::size_of::<f32>() as i32,
            );
        }
        gl.bind_vertex_array(None);

        self.mesh = Some(GpuMesh {
            vao,
            buffer,
            vertex_count: (data.len() / VERTEX_STRIDE) as i32,
        });
        Ok(())
    }

    fn release_mesh(&mut self) {
        if let Some(mesh) = self.mesh.take() {
            self.gl.delete_vertex_array(Some(&mesh.vao));
            self.gl.delete_buffer(Some(&mesh.buffer));
        }
    }

    fn draw(&self, scene: &Scene, camera: &Camera) {
        let gl = &self.gl;
        let [r, g, b] = scene.background.to_array();
        gl.viewport(
            0,
            0,
            self.canvas.width() as i32,
            self.canvas.height() as i32,
        );
        gl.clear_color(r, g, b, 1.0);
        gl.clear(Gl::COLOR_BUFFER_BIT | Gl::DEPTH_BUFFER_BIT);

        let (Some(node), Some(mesh)) = (scene.mesh(), self.mesh.as_ref()) else {
            return;
        };

        let model = node.model_matrix();
        let mvp = Transform::mvp_matrix(&model, &camera.view_matrix(), &camera.projection_matrix());
        let normal_matrix = Transform::normal_matrix(&model);
        let ambient = scene.ambient.color.scaled(scene.ambient.intensity);
        let directional = scene.directional.color.scaled(scene.directional.intensity);
        let u = &self.uniforms;

        gl.use_program(Some(&self.program));
        gl.uniform_matrix4fv_with_f32_array(u.mvp.as_ref(), false, mvp.as_slice());
        gl.uniform_matrix4fv_with_f32_array(u.model.as_ref(), false, model.as_slice());
        gl.uniform_matrix3fv_with_f32_array(u.normal_matrix.as_ref(), false, normal_matrix.as_slice());
        gl.uniform3fv_with_f32_array(u.eye.as_ref(), camera.position.coords.as_slice());
        gl.uniform3fv_with_f32_array(u.light_dir.as_ref(), scene.directional.direction().as_slice());
        gl.uniform3fv_with_f32_array(u.ambient.as_ref(), &ambient.to_array());
        gl.uniform3fv_with_f32_array(u.directional.as_ref(), &directional.to_array());
        gl.uniform3fv_with_f32_array(u.base_color.as_ref(), &node.material.color.to_array());
        gl.uniform1f(u.metalness.as_ref(), node.material.metalness);
        gl.uniform1f(u.roughness.as_ref(), node.material.roughness);

        gl.bind_vertex_array(Some(&mesh.vao));
        gl.draw_arrays(Gl::TRIANGLES, 0, mesh.vertex_count);
        gl.bind_vertex_array(None);
    }
}

impl Surface for WebGlSurface {
    fn set_size(&mut self, region: &MountRegion) {
        let (width, height) = region.device_size();
        self.canvas.set_width(width);
        self.canvas.set_height(height);

        let style = self.canvas.style();
        let css = style
            .set_property("width", &format!("{}px", region.width()))
            .and_then(|()| style.set_property("height", &format!("{}px", region.height())));
        if let Err(err) = css {
            log::warn!("failed to size canvas: {err:?}");
        }
        self.size = (region.width(), region.height());
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) {
        if self.disposed {
            return;
        }
        if self.uploaded_revision != Some(scene.revision()) {
            if let Err(err) = self.upload(scene) {
                log::error!("failed to upload mesh: {err:?}");
            }
        }
        self.draw(scene, camera);
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.release_mesh();
        self.gl.delete_program(Some(&self.program));
        self.disposed = true;
    }

    fn is_attached(&self) -> bool {
        self.canvas.parent_node().is_some()
    }

    fn detach(&mut self) {
        if let Some(parent) = self.canvas.parent_node() {
            if let Err(err) = parent.remove_child(&self.canvas) {
                log::warn!("failed to detach canvas: {err:?}");
            }
        }
    }
}

/// Interleaved position/normal buffer for `gl.TRIANGLES`
pub fn vertex_data(mesh: &Mesh) -> Vec<f32> {
    let mut data = Vec::with_capacity(mesh.vertex_count() * VERTEX_STRIDE);
    for vertex in mesh.vertices() {
        data.extend_from_slice(vertex.position.coords.as_slice());
        data.extend_from_slice(vertex.normal.as_slice());
    }
    data
}

fn compile_shader(gl: &Gl, kind: u32, source: &str) -> Result<WebGlShader, JsValue> {
    let shader = gl
        .create_shader(kind)
        .ok_or_else(|| JsValue::from_str("failed to create shader"))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);

    if gl
        .get_shader_parameter(&shader, Gl::COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(shader)
    } else {
        let log = gl.get_shader_info_log(&shader).unwrap_or_default();
        gl.delete_shader(Some(&shader));
        Err(JsValue::from_str(&format!("shader compile failed: {log}")))
    }
}

fn link_program(gl: &Gl, vertex: &WebGlShader, fragment: &WebGlShader) -> Result<WebGlProgram, JsValue> {
    let program = gl
        .create_program()
        .ok_or_else(|| JsValue::from_str("failed to create program"))?;
    gl.attach_shader(&program, vertex);
    gl.attach_shader(&program, fragment);
    gl.link_program(&program);

    if gl
        .get_program_parameter(&program, Gl::LINK_STATUS)
        .as_bool()
        .unwrap_or(false)
    {
        Ok(program)
    } else {
        let log = gl.get_program_info_log(&program).unwrap_or_default();
        gl.delete_program(Some(&program));
        Err(JsValue::from_str(&format!("program link failed: {log}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_data_interleaves_position_and_normal() {
        let cube = Mesh::cube(2.0);
        let data = vertex_data(&cube);
        assert_eq!(data.len(), 12 * 3 * VERTEX_STRIDE);

        let first = &cube.triangles[0].vertices[0];
        assert_eq!(&data[..3], first.position.coords.as_slice());
        assert_eq!(&data[3..6], first.normal.as_slice());
    }
}
