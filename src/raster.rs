//! Triangle and line rasterization.
//!
//! Every filled triangle goes through one edge function loop (`fill`), whether it comes
//! in as integer pixel coordinates, as floating screen points with depth, or as a clip
//! space triangle handed over by a [`Shader`]. The scanline filler is kept as a separate,
//! depth-less entry point.
//!
//! Conventions shared by all edge function paths:
//! * pixels are sampled at their integer coordinates,
//! * a triangle whose signed screen area (counter-clockwise positive, y up) is below one
//!   square pixel is skipped, which also culls clockwise triangles,
//! * depth is "greater is nearer": a fragment passes when its interpolated depth is
//!   strictly greater than the stored one.

use std::cmp::{max, min};

use nalgebra as na;
use na::vector;
use rayon::prelude::*;

use crate::image::{Color, Image, PixelSink};
use crate::model::Mesh;
use crate::shader::Shader;
use crate::util::{Mat4f, Vec2i, Vec3f, Vec4f};

/// Per-pixel depth, initialized to "nothing drawn yet".
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    width: u32,
    height: u32,
    pub(crate) values: Vec<f32>, // Big ol' fat z-buffer
}

impl DepthBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let values = vec![f32::NEG_INFINITY; width as usize * height as usize];
        return Self { width, height, values };
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    pub fn height(&self) -> u32 {
        return self.height;
    }

    /// Resets every value to negative infinity. Must be called before each frame.
    pub fn clear(&mut self) {
        self.values.fill(f32::NEG_INFINITY);
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        return Some(x as usize + y as usize * self.width as usize);
    }

    pub fn get(&self, x: i32, y: i32) -> Option<f32> {
        return self.index(x, y).map(|i| self.values[i]);
    }

    /// Depth test. Stores `z` and returns true if it is nearer than what is there.
    pub fn test_and_set(&mut self, x: i32, y: i32, z: f32) -> bool {
        let Some(i) = self.index(x, y) else {
            return false;
        };
        if z <= self.values[i] {
            return false;
        }
        self.values[i] = z;
        return true;
    }

    /// Grayscale picture of the buffer, nearest in white. Empty pixels are black.
    pub fn to_image(&self) -> Image {
        let finite = || self.values.iter().copied().filter(|z| z.is_finite());
        let z_min = finite().fold(f32::MAX, f32::min);
        let z_max = finite().fold(f32::MIN, f32::max);
        let scale = if z_max > z_min { z_max - z_min } else { 1.0 };
        let mut image = Image::new(self.width, self.height, crate::image::Format::Grayscale);
        for (pixel, z) in image.data.iter_mut().zip(&self.values) {
            if z.is_finite() {
                *pixel = (((z - z_min) / scale) * 200.0) as u8 + 55;
            }
        }
        return image;
    }
}

/// Draws a line between a and b with specified color.
/// The pixel set does not depend on the order of the endpoints.
pub fn line<P: PixelSink + ?Sized>(a: Vec2i, b: Vec2i, target: &mut P, color: Color) {
    let (mut x0, mut y0, mut x1, mut y1) = (a.x, a.y, b.x, b.y);
    // Walking along the longer axis, so there are no gaps.
    let steep = (x0 - x1).abs() < (y0 - y1).abs();
    if steep {
        std::mem::swap(&mut x0, &mut y0);
        std::mem::swap(&mut x1, &mut y1);
    }
    if x0 > x1 {
        std::mem::swap(&mut x0, &mut x1);
        std::mem::swap(&mut y0, &mut y1);
    }
    let dx = x1 - x0;
    let derror2 = (y1 - y0).abs() * 2;
    let y_step = if y1 > y0 { 1 } else { -1 };
    let mut error2 = 0;
    let mut y = y0;
    for x in x0..=x1 {
        if steep {
            target.set(y, x, color);
        } else {
            target.set(x, y, color);
        }
        error2 += derror2;
        if error2 > dx {
            y += y_step;
            error2 -= dx * 2;
        }
    }
}

/// Fills a triangle row by row, interpolating the left and right boundary along its edges.
/// Both windings are filled. A triangle with all three vertices on one row draws nothing.
pub fn triangle_scanline<P: PixelSink + ?Sized>(
    t0: Vec2i,
    t1: Vec2i,
    t2: Vec2i,
    target: &mut P,
    color: Color,
) {
    if t0.y == t1.y && t0.y == t2.y {
        return;
    }
    // Sorting the vertices bottom to top.
    let mut t = [t0, t1, t2];
    t.sort_by_key(|v| v.y);
    let [t0, t1, t2] = t;

    let total_height = t2.y - t0.y;
    for i in 0..=total_height {
        let second_half = i > t1.y - t0.y || t1.y == t0.y;
        let segment_height = if second_half { t2.y - t1.y } else { t1.y - t0.y };
        let alpha = i as f32 / total_height as f32;
        // With the above conditions segment_height is never zero here.
        let beta = (i - if second_half { t1.y - t0.y } else { 0 }) as f32 / segment_height as f32;
        let mut a = t0.x + ((t2.x - t0.x) as f32 * alpha) as i32;
        let mut b = if second_half {
            t1.x + ((t2.x - t1.x) as f32 * beta) as i32
        } else {
            t0.x + ((t1.x - t0.x) as f32 * beta) as i32
        };
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }
        for x in a..=b {
            target.set(x, t0.y + i, color);
        }
    }
}

/// Fills a triangle given in integer pixel coordinates with a flat color.
pub fn triangle<P: PixelSink + ?Sized>(pts: [Vec2i; 3], target: &mut P, color: Color) {
    let points = pts.map(|p| vector![p.x as f32, p.y as f32, 0.0]);
    fill(points, None, target, |_| Some(color));
}

/// Fills a triangle given in screen space (x, y in pixels, z is depth), testing and
/// updating the depth buffer.
pub fn triangle_depth<P: PixelSink + ?Sized>(
    pts: [Vec3f; 3],
    depth: &mut DepthBuffer,
    target: &mut P,
    color: Color,
) {
    fill(pts, Some(depth), target, |_| Some(color));
}

/// Perspective divide followed by the viewport transform. Keeps depth in z and 1/w in w.
///
/// None for points that are not in front of the camera. The perspective matrix leaves z
/// alone, so clip z is still the eye space z and the camera plane is z = 0. Points with
/// a non-positive w are rejected as well.
pub fn to_screen(clip: Vec4f, viewport: &Mat4f) -> Option<Vec4f> {
    if clip.z >= 0.0 || clip.w <= f32::EPSILON {
        return None;
    }
    let ndc = vector![clip.x / clip.w, clip.y / clip.w, clip.z / clip.w, 1.0];
    let screen = viewport * ndc;
    return Some(vector![screen.x, screen.y, screen.z, 1.0 / clip.w]);
}

/// Rasterizes a clip space triangle whose vertex stage has already been run on `shader`.
/// The fragment stage decides the color of every covered pixel, or discards it.
pub fn rasterize<S, P>(
    clip: &[Vec4f; 3],
    viewport: &Mat4f,
    depth: &mut DepthBuffer,
    target: &mut P,
    shader: &S,
) where
    S: Shader + ?Sized,
    P: PixelSink + ?Sized,
{
    let Some(points) = screen_triangle(clip, viewport) else {
        return;
    };
    fill(points, Some(depth), target, |bar| shader.fragment(bar));
}

/// Same as [`rasterize`], with the rows of the bounding box spread over the rayon pool.
/// Each row owns a disjoint slice of the pixel and depth buffers.
pub fn rasterize_parallel<S>(
    clip: &[Vec4f; 3],
    viewport: &Mat4f,
    depth: &mut DepthBuffer,
    target: &mut Image,
    shader: &S,
) where
    S: Shader + Sync + ?Sized,
{
    if depth.width != target.width || depth.height != target.height {
        rasterize(clip, viewport, depth, target, shader);
        return;
    }
    let Some(points) = screen_triangle(clip, viewport) else {
        return;
    };
    let Some(setup) = TriangleSetup::new(points) else {
        return;
    };
    let Some(bbox) = setup.bounding_box(target.width, target.height) else {
        return;
    };

    let width = target.width as usize;
    let bytes_per_pixel = target.bytes_per_pixel();
    target
        .data
        .par_chunks_mut(width * bytes_per_pixel)
        .zip(depth.values.par_chunks_mut(width))
        .enumerate()
        .skip(bbox.min.y as usize)
        .take((bbox.max.y - bbox.min.y + 1) as usize)
        .for_each(|(y, (pixels, depths))| {
            for x in bbox.min.x..=bbox.max.x {
                let Some(bar) = setup.barycentric(x as f32, y as f32) else {
                    continue;
                };
                let Some(color) = shader.fragment(bar) else {
                    continue;
                };
                let z = setup.depth(bar);
                let x = x as usize;
                if z <= depths[x] {
                    continue;
                }
                depths[x] = z;
                let pixel = &mut pixels[x * bytes_per_pixel..(x + 1) * bytes_per_pixel];
                pixel.copy_from_slice(&color.raw[..bytes_per_pixel]);
            }
        });
}

/// Runs the vertex stage on the three corners of every face, then rasterizes the face.
pub fn draw_mesh<S, P>(
    mesh: &Mesh,
    shader: &mut S,
    viewport: &Mat4f,
    depth: &mut DepthBuffer,
    target: &mut P,
) where
    S: Shader + ?Sized,
    P: PixelSink + ?Sized,
{
    for face in 0..mesh.face_count() {
        let clip = [shader.vertex(face, 0), shader.vertex(face, 1), shader.vertex(face, 2)];
        rasterize(&clip, viewport, depth, target, &*shader);
    }
}

/// [`draw_mesh`] with every triangle rasterized by [`rasterize_parallel`].
pub fn draw_mesh_parallel<S>(
    mesh: &Mesh,
    shader: &mut S,
    viewport: &Mat4f,
    depth: &mut DepthBuffer,
    target: &mut Image,
) where
    S: Shader + Sync + ?Sized,
{
    for face in 0..mesh.face_count() {
        let clip = [shader.vertex(face, 0), shader.vertex(face, 1), shader.vertex(face, 2)];
        rasterize_parallel(&clip, viewport, depth, target, &*shader);
    }
}

/// Draws the edges of every face, looking at the mesh along -z and scaling it by its
/// largest coordinate so it fits the target.
pub fn draw_wireframe<P: PixelSink + ?Sized>(mesh: &Mesh, target: &mut P, color: Color) {
    let extent = if mesh.max_extent() > 0.0 { mesh.max_extent() } else { 1.0 };
    let size = min(target.width(), target.height()) as f32 - 1.0;
    let to_pixel = |v: Vec4f| -> Vec2i {
        let x = (v.x / extent + 1.0) * size / 2.0;
        let y = (v.y / extent + 1.0) * size / 2.0;
        return vector![x as i32, y as i32];
    };
    for face in 0..mesh.face_count() {
        for corner in 0..3 {
            let a = to_pixel(mesh.vertex_at(face, corner));
            let b = to_pixel(mesh.vertex_at(face, (corner + 1) % 3));
            line(a, b, target, color);
        }
    }
}

fn screen_triangle(clip: &[Vec4f; 3], viewport: &Mat4f) -> Option<[Vec3f; 3]> {
    let a = to_screen(clip[0], viewport)?;
    let b = to_screen(clip[1], viewport)?;
    let c = to_screen(clip[2], viewport)?;
    return Some([a.xyz(), b.xyz(), c.xyz()]);
}

/// Signed area of a triangle in the xy plane, positive for counter-clockwise order.
pub fn signed_area(a: Vec3f, b: Vec3f, c: Vec3f) -> f32 {
    return 0.5 * ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y));
}

/// Barycentric coordinates of (x, y) relative to a triangle, None if the triangle is
/// degenerate or back facing.
pub fn barycentric(points: [Vec3f; 3], x: f32, y: f32) -> Option<Vec3f> {
    let setup = TriangleSetup::new(points)?;
    return Some(setup.weights(x, y));
}

/// Simple local bounding box struct for convenience. Corners are inclusive.
#[derive(Debug, Clone, Copy)]
struct BoundingBox {
    min: Vec2i, // lower left corner
    max: Vec2i, // upper right corner
}

/// Everything about a triangle that stays fixed while its pixels are visited.
#[derive(Debug, Clone, Copy)]
struct TriangleSetup {
    points: [Vec3f; 3],
    total_area: f32,
}

impl TriangleSetup {
    fn new(points: [Vec3f; 3]) -> Option<Self> {
        let total_area = signed_area(points[0], points[1], points[2]);
        if !(total_area >= 1.0) {
            return None;
        }
        return Some(Self { points, total_area });
    }

    /// Bounding box clamped to a width x height target, None if they do not overlap.
    fn bounding_box(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let [a, b, c] = self.points;
        let lower = |u: f32, v: f32, w: f32| u.min(v).min(w).floor();
        let upper = |u: f32, v: f32, w: f32| u.max(v).max(w).ceil();
        let bbox = BoundingBox {
            min: vector![
                max(0, lower(a.x, b.x, c.x) as i32),
                max(0, lower(a.y, b.y, c.y) as i32)
            ],
            max: vector![
                min(width as i32 - 1, upper(a.x, b.x, c.x) as i32),
                min(height as i32 - 1, upper(a.y, b.y, c.y) as i32)
            ],
        };
        if bbox.min.x > bbox.max.x || bbox.min.y > bbox.max.y {
            return None;
        }
        return Some(bbox);
    }

    /// Sub-triangle areas opposite to each vertex, normalized by the total area.
    fn weights(&self, x: f32, y: f32) -> Vec3f {
        let [a, b, c] = self.points;
        let p = vector![x, y, 0.0];
        return vector![
            signed_area(p, b, c) / self.total_area,
            signed_area(a, p, c) / self.total_area,
            signed_area(a, b, p) / self.total_area
        ];
    }

    /// Weights of a pixel that lies inside the triangle, None otherwise.
    fn barycentric(&self, x: f32, y: f32) -> Option<Vec3f> {
        let bar = self.weights(x, y);
        if bar.x < 0.0 || bar.y < 0.0 || bar.z < 0.0 {
            return None;
        }
        return Some(bar);
    }

    fn depth(&self, bar: Vec3f) -> f32 {
        return bar.x * self.points[0].z + bar.y * self.points[1].z + bar.z * self.points[2].z;
    }
}

/// The one triangle filling loop. `fragment` gets the barycentric weights of each covered
/// pixel and returns its color, or None to discard it. Surviving fragments go through the
/// depth test when a depth buffer is given.
fn fill<P, F>(
    points: [Vec3f; 3],
    mut depth: Option<&mut DepthBuffer>,
    target: &mut P,
    mut fragment: F,
) where
    P: PixelSink + ?Sized,
    F: FnMut(Vec3f) -> Option<Color>,
{
    let Some(setup) = TriangleSetup::new(points) else {
        return;
    };
    let (mut width, mut height) = (target.width(), target.height());
    if let Some(depth) = depth.as_deref() {
        width = width.min(depth.width);
        height = height.min(depth.height);
    }
    let Some(bbox) = setup.bounding_box(width, height) else {
        return;
    };

    for y in bbox.min.y..=bbox.max.y {
        for x in bbox.min.x..=bbox.max.x {
            let Some(bar) = setup.barycentric(x as f32, y as f32) else {
                // A negative weight means the point is outside, so skipping it.
                continue;
            };
            let Some(color) = fragment(bar) else {
                continue;
            };
            if let Some(depth) = depth.as_deref_mut() {
                if !depth.test_and_set(x, y, setup.depth(bar)) {
                    continue;
                }
            }
            target.set(x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Format, BLUE, RED, WHITE};
    use std::collections::BTreeSet;

    /// Records every pixel write, in order.
    #[derive(Default)]
    struct Recorder {
        pixels: Vec<(i32, i32)>,
    }

    impl PixelSink for Recorder {
        fn width(&self) -> u32 {
            return 64;
        }

        fn height(&self) -> u32 {
            return 64;
        }

        fn set(&mut self, x: i32, y: i32, _color: Color) -> bool {
            self.pixels.push((x, y));
            return true;
        }
    }

    fn pixel_set(recorder: &Recorder) -> BTreeSet<(i32, i32)> {
        return recorder.pixels.iter().copied().collect();
    }

    fn count(image: &Image, color: Color) -> usize {
        let bytes_per_pixel = image.bytes_per_pixel();
        return image
            .as_bytes()
            .chunks_exact(bytes_per_pixel)
            .filter(|pixel| *pixel == &color.raw[..bytes_per_pixel])
            .count();
    }

    #[test]
    fn test_line_symmetry() {
        let cases = [
            ((3, 5), (40, 17)),
            ((0, 0), (10, 30)),
            ((50, 2), (2, 50)),
            ((7, 7), (7, 20)),
            ((4, 9), (30, 9)),
        ];
        for ((x0, y0), (x1, y1)) in cases {
            let mut forward = Recorder::default();
            let mut backward = Recorder::default();
            line(vector![x0, y0], vector![x1, y1], &mut forward, WHITE);
            line(vector![x1, y1], vector![x0, y0], &mut backward, WHITE);
            assert_eq!(pixel_set(&forward), pixel_set(&backward));
            assert!(forward.pixels.contains(&(x0, y0)) && forward.pixels.contains(&(x1, y1)));
        }
    }

    #[test]
    fn test_line_is_gapless() {
        let mut recorder = Recorder::default();
        line(vector![2, 1], vector![9, 40], &mut recorder, WHITE);
        let rows: BTreeSet<i32> = recorder.pixels.iter().map(|p| p.1).collect();
        assert_eq!(rows.len(), 40);
    }

    #[test]
    fn test_scanline_degenerate() {
        let mut recorder = Recorder::default();
        triangle_scanline(vector![1, 5], vector![20, 5], vector![40, 5], &mut recorder, WHITE);
        assert!(recorder.pixels.is_empty());
    }

    #[test]
    fn test_scanline_fills_both_windings() {
        let pts = [vector![10, 7], vector![50, 16], vector![70, 8]];
        let mut ccw = Image::new(80, 20, Format::Grayscale);
        let mut cw = Image::new(80, 20, Format::Grayscale);
        triangle_scanline(pts[0], pts[1], pts[2], &mut ccw, Color::gray(1));
        triangle_scanline(pts[0], pts[2], pts[1], &mut cw, Color::gray(1));
        assert_eq!(ccw, cw);
        assert!(count(&ccw, Color::gray(1)) > 0);
        // Top and bottom rows of the triangle are covered.
        assert!(ccw.get(50, 16).unwrap().raw[0] == 1);
        assert!(ccw.get(10, 7).unwrap().raw[0] == 1);
    }

    #[test]
    fn test_scanline_axis_aligned_right_triangle() {
        let mut image = Image::new(16, 16, Format::Grayscale);
        let gray = Color::gray(1);
        triangle_scanline(vector![0, 0], vector![10, 0], vector![0, 10], &mut image, gray);
        for (x, y) in [(0, 0), (10, 0), (0, 10), (5, 5)] {
            assert_eq!(image.get(x, y), Some(Color::gray(1)));
        }
        assert_eq!(image.get(6, 6), Some(Color::gray(0)));
        assert_eq!(image.get(11, 0), Some(Color::gray(0)));
    }

    #[test]
    fn test_barycentric_partition() {
        let points = [vector![2.0, 3.0, 0.0], vector![40.0, 10.0, 0.0], vector![15.0, 35.0, 0.0]];
        for y in 0..40 {
            for x in 0..45 {
                let bar = barycentric(points, x as f32, y as f32).unwrap();
                assert!((bar.sum() - 1.0).abs() < 1e-5);
            }
        }
        let inside = barycentric(points, 18.0, 15.0).unwrap();
        assert!(inside.x >= 0.0 && inside.y >= 0.0 && inside.z >= 0.0);
        let outside = barycentric(points, 1.0, 30.0).unwrap();
        assert!(outside.x < 0.0 || outside.y < 0.0 || outside.z < 0.0);
        // Vertices get a weight of one.
        assert!((barycentric(points, 40.0, 10.0).unwrap() - vector![0.0, 1.0, 0.0]).norm() < 1e-5);
    }

    #[test]
    fn test_fill_matches_weights() {
        let pts: [Vec2i; 3] = [vector![2, 3], vector![40, 10], vector![15, 35]];
        let points = pts.map(|p| vector![p.x as f32, p.y as f32, 0.0]);
        let mut recorder = Recorder::default();
        triangle(pts, &mut recorder, WHITE);
        let drawn = pixel_set(&recorder);
        for y in 0..64 {
            for x in 0..64 {
                let bar = barycentric(points, x as f32, y as f32).unwrap();
                let inside = bar.x >= 0.0 && bar.y >= 0.0 && bar.z >= 0.0;
                assert_eq!(drawn.contains(&(x, y)), inside, "pixel {} {}", x, y);
            }
        }
    }

    #[test]
    fn test_small_and_clockwise_triangles_are_skipped() {
        let mut recorder = Recorder::default();
        // Area 0.5.
        triangle([vector![0, 0], vector![1, 0], vector![0, 1]], &mut recorder, WHITE);
        // Collinear.
        triangle([vector![0, 0], vector![5, 5], vector![10, 10]], &mut recorder, WHITE);
        // Clockwise.
        triangle([vector![0, 0], vector![0, 20], vector![20, 0]], &mut recorder, WHITE);
        assert!(recorder.pixels.is_empty());
        let clockwise = [vector![0.0, 0.0, 0.0], vector![0.0, 20.0, 0.0], vector![20.0, 0.0, 0.0]];
        assert!(barycentric(clockwise, 1.0, 1.0).is_none());

        triangle([vector![0, 0], vector![20, 0], vector![0, 20]], &mut recorder, WHITE);
        assert!(!recorder.pixels.is_empty());
    }

    #[test]
    fn test_bounding_box_is_clamped() {
        let mut image = Image::new(10, 10, Format::Rgb);
        triangle([vector![-50, -50], vector![100, -50], vector![-50, 100]], &mut image, RED);
        assert_eq!(count(&image, RED), 100);

        let mut image = Image::new(10, 10, Format::Rgb);
        triangle([vector![20, 20], vector![40, 20], vector![20, 40]], &mut image, RED);
        assert_eq!(count(&image, RED), 0);
    }

    #[test]
    fn test_depth_order_independence() {
        // Two crossing triangles: `near` is in front on the left, `far` is in front on the right.
        let near = [vector![0.0, 0.0, 10.0], vector![30.0, 0.0, 0.0], vector![0.0, 30.0, 10.0]];
        let far = [vector![0.0, 0.0, 1.0], vector![30.0, 0.0, 11.0], vector![0.0, 30.0, 1.0]];

        let mut first = Image::new(32, 32, Format::Rgba);
        let mut depth = DepthBuffer::new(32, 32);
        triangle_depth(near, &mut depth, &mut first, RED);
        triangle_depth(far, &mut depth, &mut first, BLUE);

        let mut second = Image::new(32, 32, Format::Rgba);
        let mut depth = DepthBuffer::new(32, 32);
        triangle_depth(far, &mut depth, &mut second, BLUE);
        triangle_depth(near, &mut depth, &mut second, RED);

        assert_eq!(first.get(2, 2), Some(RED));
        assert_eq!(first.get(25, 2), Some(BLUE));
        assert_eq!(first, second);
    }

    #[test]
    fn test_depth_buffer() {
        let mut depth = DepthBuffer::new(4, 2);
        assert_eq!(depth.get(3, 1), Some(f32::NEG_INFINITY));
        assert!(depth.test_and_set(1, 1, -100.0));
        assert!(!depth.test_and_set(1, 1, -100.0));
        assert!(depth.test_and_set(1, 1, 5.0));
        assert!(!depth.test_and_set(4, 0, 5.0));
        assert_eq!(depth.get(1, 1), Some(5.0));
        depth.clear();
        assert!(depth.values.iter().all(|z| *z == f32::NEG_INFINITY));
        assert_eq!(depth.values.len(), 8);
    }

    #[test]
    fn test_depth_image() {
        let mut depth = DepthBuffer::new(3, 1);
        depth.test_and_set(0, 0, 1.0);
        depth.test_and_set(1, 0, 3.0);
        let image = depth.to_image();
        assert_eq!(image.as_bytes(), &[55, 255, 0]);
    }

    #[test]
    fn test_to_screen() {
        let viewport = crate::camera::viewport(0, 0, 100, 100);
        let screen = to_screen(vector![1.0, 0.0, -1.0, 2.0], &viewport).unwrap();
        assert!((screen.x - 75.0).abs() < 1e-4);
        assert!((screen.y - 50.0).abs() < 1e-4);
        assert!((screen.w - 0.5).abs() < 1e-6);
        assert!(to_screen(vector![1.0, 0.0, -1.0, 0.0], &viewport).is_none());
        assert!(to_screen(vector![1.0, 0.0, -1.0, -1.0], &viewport).is_none());
        // On and behind the camera plane, even with a positive w.
        assert!(to_screen(vector![1.0, 0.0, 0.0, 1.0], &viewport).is_none());
        assert!(to_screen(vector![1.0, 0.0, 0.5, 0.8], &viewport).is_none());
    }

    /// Hands out fixed clip coordinates and discards everything close to the first corner.
    struct HalfDiscard {
        clip: [Vec4f; 3],
    }

    impl Shader for HalfDiscard {
        fn vertex(&mut self, _face: usize, corner: usize) -> Vec4f {
            return self.clip[corner];
        }

        fn fragment(&self, bar: Vec3f) -> Option<Color> {
            if bar.x > 0.5 {
                return None;
            }
            return Some(RED);
        }
    }

    #[test]
    fn test_discarded_fragments_write_nothing() {
        let viewport = crate::camera::viewport(0, 0, 64, 64);
        let shader = HalfDiscard {
            clip: [
                vector![-0.8, -0.8, -0.5, 1.0],
                vector![0.8, -0.8, -0.5, 1.0],
                vector![-0.8, 0.8, -0.5, 1.0],
            ],
        };
        let points = screen_triangle(&shader.clip, &viewport).unwrap();
        let setup = TriangleSetup::new(points).unwrap();

        let mut serial = Image::new(64, 64, Format::Rgba);
        let mut serial_depth = DepthBuffer::new(64, 64);
        rasterize(&shader.clip, &viewport, &mut serial_depth, &mut serial, &shader);
        let mut parallel = Image::new(64, 64, Format::Rgba);
        let mut parallel_depth = DepthBuffer::new(64, 64);
        rasterize_parallel(&shader.clip, &viewport, &mut parallel_depth, &mut parallel, &shader);

        let (mut drawn, mut discarded) = (0, 0);
        for y in 0..64 {
            for x in 0..64 {
                let kept = match setup.barycentric(x as f32, y as f32) {
                    Some(bar) if bar.x > 0.5 => {
                        discarded += 1;
                        false
                    }
                    Some(_) => {
                        drawn += 1;
                        true
                    }
                    None => false,
                };
                for (image, depth) in [(&serial, &serial_depth), (&parallel, &parallel_depth)] {
                    let z = depth.get(x, y).unwrap();
                    if kept {
                        assert_eq!(image.get(x, y), Some(RED), "pixel {} {}", x, y);
                        assert!(z.is_finite());
                    } else {
                        let black = Color::from_bytes(&[0; 4]);
                        assert_eq!(image.get(x, y), Some(black), "pixel {} {}", x, y);
                        assert_eq!(z, f32::NEG_INFINITY, "pixel {} {}", x, y);
                    }
                }
            }
        }
        assert!(drawn > 0 && discarded > 0);
        assert_eq!(serial, parallel);
        assert_eq!(serial_depth, parallel_depth);
    }

    #[test]
    fn test_wireframe_of_empty_mesh() {
        let mut recorder = Recorder::default();
        draw_wireframe(&Mesh::default(), &mut recorder, WHITE);
        assert!(recorder.pixels.is_empty());
    }
}
