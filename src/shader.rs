use nalgebra as na;
use na::vector;

use crate::camera::FrameContext;
use crate::image::Color;
use crate::model::Mesh;
use crate::util::{from_hom_vector, normal_matrix, transform_direction, Mat4f, Vec3f, Vec4f};

/// Two stage shading program.
///
/// For every triangle the rasterizer calls `vertex` once per corner (0, 1, 2) and only
/// then `fragment` once per covered pixel, so anything `fragment` needs can be cached
/// per corner in `vertex`.
pub trait Shader {
    /// Clip space position of one corner of a mesh face.
    fn vertex(&mut self, face: usize, corner: usize) -> Vec4f;
    /// Color of a pixel given its barycentric weights, None to discard it.
    fn fragment(&self, bar: Vec3f) -> Option<Color>;
}

/// Shader with no lighting at all.
pub struct FlatShader<'a> {
    mesh: &'a Mesh,
    projection: Mat4f,
    color: Color,
    random: bool,
    face_color: Color, // Color of the triangle currently being drawn.
}

impl<'a> FlatShader<'a> {
    /// Every face gets `color`.
    pub fn new(mesh: &'a Mesh, frame: &FrameContext, color: Color) -> Self {
        let projection = frame.projection();
        return Self { mesh, projection, color, random: false, face_color: color };
    }

    /// Every face gets its own color, derived from the face index, so the same mesh
    /// always comes out the same.
    pub fn random(mesh: &'a Mesh, frame: &FrameContext) -> Self {
        let color = Color::rgb(255, 255, 255);
        let projection = frame.projection();
        return Self { mesh, projection, color, random: true, face_color: color };
    }
}

impl Shader for FlatShader<'_> {
    fn vertex(&mut self, face: usize, corner: usize) -> Vec4f {
        if corner == 0 {
            self.face_color = if self.random { face_color(face) } else { self.color };
        }
        return self.projection * self.mesh.vertex_at(face, corner);
    }

    fn fragment(&self, _bar: Vec3f) -> Option<Color> {
        return Some(self.face_color);
    }
}

/// Hashes a face index into an opaque color (splitmix64 finalizer).
fn face_color(face: usize) -> Color {
    let mut z = (face as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    let [r, g, b, ..] = z.to_le_bytes();
    return Color::rgb(r, g, b);
}

/// Weights of the Phong reflection model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhongParams {
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub shininess: f32,
}

impl Default for PhongParams {
    fn default() -> Self {
        return Self { ambient: 0.3, diffuse: 0.4, specular: 0.9, shininess: 35.0 };
    }
}

/// Where the shading normal comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normals {
    /// One normal per triangle, from its eye space edges.
    #[default]
    Flat,
    /// Mesh normals interpolated over the triangle. Faces without normals are shaded flat.
    Smooth,
}

/// Phong lighting with a single directional light, computed in eye space where the
/// viewer looks down -z.
pub struct PhongShader<'a> {
    mesh: &'a Mesh,
    model_view: Mat4f,
    perspective: Mat4f,
    normal_matrix: Option<Mat4f>, // Inverse transpose of model_view, applied to mesh normals.
    light: Vec3f,                 // Direction towards the light in eye space.
    pub params: PhongParams,
    pub normals: Normals,
    pub color: Color,
    // Filled by the vertex stage, read by the fragment stage.
    eye_positions: [Vec3f; 3],
    eye_normals: [Option<Vec3f>; 3],
}

impl<'a> PhongShader<'a> {
    /// `light` is the direction towards the light in world space.
    pub fn new(mesh: &'a Mesh, frame: &FrameContext, light: Vec3f, color: Color) -> Self {
        return Self {
            mesh,
            model_view: frame.model_view,
            perspective: frame.perspective,
            normal_matrix: normal_matrix(&frame.model_view),
            light: transform_direction(&frame.model_view, light),
            params: PhongParams::default(),
            normals: Normals::default(),
            color,
            eye_positions: [Vec3f::zeros(); 3],
            eye_normals: [None; 3],
        };
    }

    pub fn with_normals(mut self, normals: Normals) -> Self {
        self.normals = normals;
        return self;
    }

    pub fn with_params(mut self, params: PhongParams) -> Self {
        self.params = params;
        return self;
    }

    fn normal(&self, bar: Vec3f) -> Option<Vec3f> {
        if let [Some(a), Some(b), Some(c)] = self.eye_normals {
            return (a * bar.x + b * bar.y + c * bar.z).try_normalize(f32::EPSILON);
        }
        let [a, b, c] = self.eye_positions;
        return (b - a).cross(&(c - a)).try_normalize(f32::EPSILON);
    }
}

impl Shader for PhongShader<'_> {
    fn vertex(&mut self, face: usize, corner: usize) -> Vec4f {
        let eye = self.model_view * self.mesh.vertex_at(face, corner);
        self.eye_positions[corner] = from_hom_vector(eye);
        self.eye_normals[corner] = match (self.normals, self.normal_matrix) {
            (Normals::Smooth, Some(m)) => {
                self.mesh.normal_at(face, corner).map(|n| transform_direction(&m, n))
            }
            _ => None,
        };
        return self.perspective * eye;
    }

    fn fragment(&self, bar: Vec3f) -> Option<Color> {
        let Some(n) = self.normal(bar) else {
            // Degenerate in eye space, nothing to light.
            return Some(self.color.scale(self.params.ambient));
        };
        let n_dot_l = n.dot(&self.light);
        let diffuse = n_dot_l.max(0.0);
        // Reflected light direction, the viewer sits on +z.
        let specular = match (n * (2.0 * n_dot_l) - self.light).try_normalize(f32::EPSILON) {
            Some(r) => r.z.max(0.0).powf(self.params.shininess),
            None => 0.0,
        };
        let PhongParams { ambient, diffuse: kd, specular: ks, .. } = self.params;
        let intensity = ambient + kd * diffuse + ks * specular;
        return Some(self.color.scale(intensity.min(1.0)));
    }
}
