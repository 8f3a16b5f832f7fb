use nalgebra as na;
use na::matrix;

use crate::util::{Mat4f, Vec3f};

/// Viewport maps depth into [0, DEPTH_RANGE].
pub const DEPTH_RANGE: f32 = 255.0;

/// World to eye space transform. The camera ends up at the origin looking down -z
/// with `up` projected to +y.
pub fn look_at(eye: Vec3f, center: Vec3f, up: Vec3f) -> Mat4f {
    // New coordinate system l, m, n around camera position.
    let n = (eye - center).normalize();
    let l = up.cross(&n).normalize();
    let m = n.cross(&l).normalize();
    let rotation = matrix![l.x, l.y, l.z, 0.0;
                           m.x, m.y, m.z, 0.0;
                           n.x, n.y, n.z, 0.0;
                           0.0, 0.0, 0.0, 1.0];
    let translation = matrix![1.0, 0.0, 0.0, -eye.x;
                              0.0, 1.0, 0.0, -eye.y;
                              0.0, 0.0, 1.0, -eye.z;
                              0.0, 0.0, 0.0, 1.0];
    return rotation * translation;
}

/// Central projection: after the homogeneous divide x and y are scaled by 1 / (1 - z / focal).
pub fn perspective(focal: f32) -> Mat4f {
    let coef = -1.0 / focal;
    return matrix![1.0, 0.0, 0.0,  0.0;
                   0.0, 1.0, 0.0,  0.0;
                   0.0, 0.0, 1.0,  0.0;
                   0.0, 0.0, coef, 1.0];
}

/// Maps the [-1, 1] cube to the pixel rectangle [x, x + w] x [y, y + h] and depth to
/// [0, DEPTH_RANGE].
pub fn viewport(x: i32, y: i32, w: i32, h: i32) -> Mat4f {
    // Redef for convenience.
    let (x, y, w, h) = (x as f32, y as f32, w as f32, h as f32);
    let d = DEPTH_RANGE;
    return matrix![w / 2.0, 0.0,     0.0,     x + w / 2.0;
                   0.0,     h / 2.0, 0.0,     y + h / 2.0;
                   0.0,     0.0,     d / 2.0, d / 2.0;
                   0.0,     0.0,     0.0,     1.0];
}

/// Transforms of one frame, built once and read by shaders and the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub model_view: Mat4f,
    pub perspective: Mat4f,
    pub viewport: Mat4f,
}

impl FrameContext {
    /// Camera looking from `eye` at `center`, focal distance equal to their distance and a
    /// viewport covering the whole `width` x `height` screen.
    pub fn new(eye: Vec3f, center: Vec3f, up: Vec3f, width: u32, height: u32) -> Self {
        return Self {
            model_view: look_at(eye, center, up),
            perspective: perspective((eye - center).norm()),
            viewport: viewport(0, 0, width as i32, height as i32),
        };
    }

    /// Object space to clip space.
    pub fn projection(&self) -> Mat4f {
        return self.perspective * self.model_view;
    }
}
