use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use nalgebra::vector;

use tiny_rasterizer::app::{self, Params, ShaderName};
use tiny_rasterizer::camera::FrameContext;
use tiny_rasterizer::image::{Color, Format, Image};
use tiny_rasterizer::model::Mesh;
use tiny_rasterizer::raster::{
    draw_mesh, draw_mesh_parallel, signed_area, to_screen, DepthBuffer,
};
use tiny_rasterizer::shader::{FlatShader, PhongShader, Shader};
use tiny_rasterizer::util::Vec3f;

const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/1/1 2/1/1 3/1/1\n";

fn camera(eye: Vec3f, center: Vec3f, width: u32, height: u32) -> FrameContext {
    return FrameContext::new(eye, center, vector![0.0, 1.0, 0.0], width, height);
}

fn frame(width: u32, height: u32) -> FrameContext {
    return camera(vector![0.0, 0.0, 3.0], vector![0.0, 0.0, 0.0], width, height);
}

/// Draws `text` flat white on a black image and returns the image.
fn draw_flat(text: &str, frame: &FrameContext, width: u32, height: u32) -> Image {
    let mesh = Mesh::parse(Cursor::new(text)).unwrap();
    let mut image = Image::new(width, height, Format::Rgb);
    let mut depth = DepthBuffer::new(width, height);
    let mut shader = FlatShader::new(&mesh, frame, Color::rgb(255, 255, 255));
    draw_mesh(&mesh, &mut shader, &frame.viewport, &mut depth, &mut image);
    return image;
}

fn covered(image: &Image) -> usize {
    return image
        .as_bytes()
        .chunks_exact(3)
        .filter(|pixel| pixel.iter().any(|c| *c != 0))
        .count();
}

fn temp_dir(name: &str) -> PathBuf {
    let name = format!("tiny_rasterizer_{}_{}", name, std::process::id());
    let dir = std::env::temp_dir().join(name);
    fs::create_dir_all(&dir).unwrap();
    return dir;
}

#[test]
fn test_unit_triangle_fills_its_projected_area() {
    let mesh = Mesh::parse(Cursor::new(TRIANGLE)).unwrap();
    assert_eq!(mesh.face_count(), 1);

    let frame = frame(100, 100);
    let mut image = Image::new(100, 100, Format::Rgb);
    let mut depth = DepthBuffer::new(100, 100);
    let mut shader = FlatShader::new(&mesh, &frame, Color::rgb(255, 255, 255));
    draw_mesh(&mesh, &mut shader, &frame.viewport, &mut depth, &mut image);

    // Projected area of the triangle on screen.
    let screen = [0, 1, 2].map(|corner| {
        let clip = shader.vertex(0, corner);
        return to_screen(clip, &frame.viewport).unwrap().xyz();
    });
    let area = signed_area(screen[0], screen[1], screen[2]);
    assert!((area - 312.5).abs() < 1e-2, "area {}", area);

    let count = covered(&image) as f32;
    assert!(
        count > 0.8 * area && count < 1.25 * area,
        "{} pixels for an area of {}",
        count,
        area
    );
    // Depth was written exactly where color was.
    let written = (0..100)
        .flat_map(|y| (0..100).map(move |x| (x, y)))
        .filter(|&(x, y)| depth.get(x, y).unwrap().is_finite())
        .count();
    assert_eq!(written as f32, count);
}

#[test]
fn test_parallel_matches_serial() {
    let text = fs::read_to_string("assets/cube.obj").unwrap();
    let mesh = Mesh::parse(Cursor::new(text)).unwrap();
    let frame = camera(vector![1.0, 1.5, 2.5], vector![0.0, 0.0, 0.0], 120, 90);
    let light = vector![1.0, 1.0, 1.0];

    let mut serial = Image::new(120, 90, Format::Rgb);
    let mut serial_depth = DepthBuffer::new(120, 90);
    let mut shader = PhongShader::new(&mesh, &frame, light, Color::rgb(200, 180, 160));
    draw_mesh(&mesh, &mut shader, &frame.viewport, &mut serial_depth, &mut serial);

    let mut parallel = Image::new(120, 90, Format::Rgb);
    let mut parallel_depth = DepthBuffer::new(120, 90);
    let mut shader = PhongShader::new(&mesh, &frame, light, Color::rgb(200, 180, 160));
    draw_mesh_parallel(&mesh, &mut shader, &frame.viewport, &mut parallel_depth, &mut parallel);

    assert!(covered(&serial) > 0);
    assert_eq!(serial, parallel);
    assert_eq!(serial_depth, parallel_depth);
}

#[test]
fn test_camera_behind_the_mesh_skips_it() {
    // Looking away from the triangle, which ends up with w = -1 at every vertex.
    let frame = camera(vector![0.0, 0.0, -2.0], vector![0.0, 0.0, -3.0], 50, 50);
    assert_eq!(covered(&draw_flat(TRIANGLE, &frame, 50, 50)), 0);
}

#[test]
fn test_mesh_just_behind_the_camera_is_not_drawn() {
    // Eye space z of the triangle is 0.5, closer than the focal distance of 2.5, so w
    // stays positive. It is still behind the camera.
    let frame = camera(vector![0.0, 0.0, -0.5], vector![0.0, 0.0, -3.0], 100, 100);
    assert_eq!(covered(&draw_flat(TRIANGLE, &frame, 100, 100)), 0);

    // Triangle crossing the camera plane.
    let crossing = "v -1 -1 -1\nv 1 -1 -1\nv 0 1 1\nf 1 2 3\n";
    let frame = camera(vector![0.0, 0.0, 0.0], vector![0.0, 0.0, -1.0], 100, 100);
    assert_eq!(covered(&draw_flat(crossing, &frame, 100, 100)), 0);
}

#[test]
fn test_mesh_just_in_front_of_the_camera_is_drawn() {
    let frame = camera(vector![0.0, 0.0, 0.5], vector![0.0, 0.0, 0.0], 100, 100);
    assert!(covered(&draw_flat(TRIANGLE, &frame, 100, 100)) > 0);
}

#[test]
fn test_run_writes_tga() {
    let dir = temp_dir("run");
    let output = dir.join("cube.tga");
    let params = Params {
        width: 80,
        height: 60,
        shader: ShaderName::Smooth,
        output: output.clone(),
        mesh_path: PathBuf::from("assets/cube.obj"),
        ..Default::default()
    };
    app::run(params).unwrap();

    let image = Image::read_tga_file(&output).unwrap();
    assert_eq!((image.width(), image.height()), (80, 60));
    assert!(covered(&image) > 0);
    assert!(!dir.join("cube.tga.tmp").exists());
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_run_writes_depth_picture() {
    let dir = temp_dir("depth");
    let output = dir.join("cube.tga");
    let depth_output = dir.join("cube_depth.tga");
    let params = Params {
        width: 40,
        height: 30,
        shader: ShaderName::Flat,
        output: output.clone(),
        depth_output: Some(depth_output.clone()),
        ..Default::default()
    };
    app::run(params).unwrap();

    let color = Image::read_tga_file(&output).unwrap();
    let depth = Image::read_tga_file(&depth_output).unwrap();
    assert_eq!(depth.format(), Format::Grayscale);
    assert_eq!((depth.width(), depth.height()), (40, 30));
    let nonzero = depth.as_bytes().iter().filter(|value| **value != 0).count();
    assert!(nonzero > 0);
    assert_eq!(nonzero, covered(&color));
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_run_with_missing_mesh_writes_black_image() {
    let dir = temp_dir("missing");
    let output = dir.join("empty.tga");
    let params = Params {
        width: 16,
        height: 16,
        output: output.clone(),
        mesh_path: dir.join("missing.obj"),
        rle: false,
        ..Default::default()
    };
    app::run(params).unwrap();

    let image = Image::read_tga_file(&output).unwrap();
    assert_eq!(covered(&image), 0);
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_run_fails_on_bad_output_directory() {
    let dir = temp_dir("bad_output");
    let params = Params {
        width: 8,
        height: 8,
        output: dir.join("no/such/dir/out.tga"),
        ..Default::default()
    };
    assert!(app::run(params).is_err());
    fs::remove_dir_all(&dir).unwrap();
}
