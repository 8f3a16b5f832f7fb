use nalgebra as na;
use na::{vector, Matrix4, Vector2, Vector3, Vector4};

/// Integer pixel coordinate. i32 to allow coordinates outside of the image and to remove a
/// lot of casts.
pub type Vec2i = Vector2<i32>;
pub type Vec3f = Vector3<f32>;
pub type Vec4f = Vector4<f32>;
pub type Mat4f = Matrix4<f32>;

/// Transformation of a point to homogenous coordinates.
pub fn to_hom_point(v: Vec3f) -> Vec4f {
    return vector![v.x, v.y, v.z, 1.0];
}

/// Transformation of a vector to homogenous coordinates.
pub fn to_hom_vector(v: Vec3f) -> Vec4f {
    return vector![v.x, v.y, v.z, 0.0];
}

/// Transformation of a point from homogenous coordinates.
/// Returns None when w is zero, i.e. the point lies at infinity.
pub fn from_hom_point(v: Vec4f) -> Option<Vec3f> {
    if v.w == 0.0 {
        return None;
    }
    return Some(vector![v.x / v.w, v.y / v.w, v.z / v.w]);
}

/// Transformation of a vector from homogenous coordinates.
pub fn from_hom_vector(v: Vec4f) -> Vec3f {
    return vector![v.x, v.y, v.z];
}

/// Applies a transform to a direction (w = 0) and renormalizes it.
pub fn transform_direction(m: &Mat4f, v: Vec3f) -> Vec3f {
    return from_hom_vector(m * to_hom_vector(v)).normalize();
}

/// Inverse-transpose of a transform, used to carry normals through it.
/// None if the transform is singular.
pub fn normal_matrix(m: &Mat4f) -> Option<Mat4f> {
    return m.try_inverse().map(|inverse| inverse.transpose());
}
