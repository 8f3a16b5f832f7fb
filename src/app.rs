use std::path::{Path, PathBuf};
use std::{thread, time};

use nalgebra as na;
use na::{vector, Rotation3, Vector3};
use show_image::{create_window, event, ImageInfo, ImageView, WindowOptions};

use crate::camera::FrameContext;
use crate::image::{Color, Format, Image, WHITE};
use crate::model::Mesh;
use crate::raster::{draw_mesh, draw_mesh_parallel, draw_wireframe, DepthBuffer};
use crate::shader::{FlatShader, Normals, PhongShader, Shader};
use crate::util::Vec3f;

/// Shading programs selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ShaderName {
    /// Edges only, no depth test.
    Wireframe,
    /// One white color for every face.
    Flat,
    /// A different color for every face.
    Random,
    /// Phong lighting with one normal per face.
    Phong,
    /// Phong lighting with interpolated mesh normals.
    Smooth,
}

/// Everything a run needs to know.
#[derive(Debug, Clone)]
pub struct Params {
    pub width: u32,
    pub height: u32,
    pub mesh_path: PathBuf,
    pub shader: ShaderName,
    pub output: PathBuf,
    pub depth_output: Option<PathBuf>, // Grayscale picture of the depth buffer, if set.
    pub eye: Vec3f,
    pub center: Vec3f,
    pub up: Vec3f,
    pub light: Vec3f,
    pub rle: bool,
    pub parallel: bool,
    pub window: bool,
    pub fps: u32,
    pub print_fps: bool,
}

impl Default for Params {
    fn default() -> Self {
        return Self {
            width: 800,
            height: 800,
            mesh_path: PathBuf::from("assets/cube.obj"),
            shader: ShaderName::Phong,
            output: PathBuf::from("output.tga"),
            depth_output: None,
            eye: vector![1.0, 1.0, 3.0],
            center: vector![0.0, 0.0, 0.0],
            up: vector![0.0, 1.0, 0.0],
            light: vector![1.0, 1.0, 1.0],
            rle: true,
            parallel: false,
            window: false,
            fps: 60,
            print_fps: false,
        };
    }
}

/// Shading color of the lit shaders.
const BASE_COLOR: Color = Color::rgb(255, 255, 255);

/// Renders one frame of `mesh` seen from `eye`. Row 0 of the result is the bottom row.
pub fn render(params: &Params, mesh: &Mesh, eye: Vec3f) -> Image {
    return render_with_depth(params, mesh, eye).0;
}

/// Same as `render`, also handing back the depth buffer of the frame.
/// The wireframe shader leaves the depth buffer empty.
pub fn render_with_depth(params: &Params, mesh: &Mesh, eye: Vec3f) -> (Image, DepthBuffer) {
    let mut image = Image::new(params.width, params.height, Format::Rgb);
    let mut depth = DepthBuffer::new(params.width, params.height);
    let frame = FrameContext::new(eye, params.center, params.up, params.width, params.height);

    match params.shader {
        ShaderName::Wireframe => draw_wireframe(mesh, &mut image, WHITE),
        ShaderName::Flat => {
            let mut shader = FlatShader::new(mesh, &frame, BASE_COLOR);
            draw(params.parallel, mesh, &mut shader, &frame, &mut depth, &mut image);
        }
        ShaderName::Random => {
            let mut shader = FlatShader::random(mesh, &frame);
            draw(params.parallel, mesh, &mut shader, &frame, &mut depth, &mut image);
        }
        ShaderName::Phong | ShaderName::Smooth => {
            let normals = match params.shader {
                ShaderName::Smooth => Normals::Smooth,
                _ => Normals::Flat,
            };
            let mut shader =
                PhongShader::new(mesh, &frame, params.light, BASE_COLOR).with_normals(normals);
            draw(params.parallel, mesh, &mut shader, &frame, &mut depth, &mut image);
        }
    }
    return (image, depth);
}

fn draw<S: Shader + Sync>(
    parallel: bool,
    mesh: &Mesh,
    shader: &mut S,
    frame: &FrameContext,
    depth: &mut DepthBuffer,
    image: &mut Image,
) {
    if parallel {
        draw_mesh_parallel(mesh, shader, &frame.viewport, depth, image);
    } else {
        draw_mesh(mesh, shader, &frame.viewport, depth, image);
    }
}

/// Writes the image, as tga for a `.tga` path and in whatever format the extension
/// names otherwise.
pub fn save(image: &Image, path: &Path, rle: bool) -> Result<(), Box<dyn std::error::Error>> {
    let is_tga = path
        .extension()
        .map(|extension| extension.eq_ignore_ascii_case("tga"))
        .unwrap_or(false);
    if is_tga {
        image.write_tga_file(path, rle)?;
    } else {
        image.to_rgba_image().save(path)?;
    }
    log::info!("written {}", path.display());
    return Ok(());
}

/// Loads the mesh, then either renders a single frame to the output file or opens a
/// window with the camera orbiting the mesh.
/// The window needs a show_image context, see `show_image::run_context`.
pub fn run(params: Params) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = Mesh::load(&params.mesh_path)?;
    if params.window {
        return run_window(&params, &mesh);
    }

    let time_begin = time::Instant::now();
    let (mut image, depth) = render_with_depth(&params, &mesh, params.eye);
    log::info!("rendered {}x{} in {:?}", params.width, params.height, time_begin.elapsed());
    // Rendering happens with y pointing up, files and windows want row 0 on top.
    image.flip_vertically();
    save(&image, &params.output, params.rle)?;

    if let Some(path) = &params.depth_output {
        let mut depth_image = depth.to_image();
        depth_image.flip_vertically();
        save(&depth_image, path, params.rle)?;
    }
    return Ok(());
}

/// Helper, defining exit event to be an Escape key press.
fn is_exit_event(window_event: event::WindowEvent) -> bool {
    if let event::WindowEvent::KeyboardInput(event) = window_event {
        let input = event.input;
        if input.key_code == Some(event::VirtualKeyCode::Escape) && input.state.is_released() {
            return true;
        }
    }

    return false;
}

/// Camera position after orbiting `eye` around the vertical axis through `center`.
fn orbit(eye: Vec3f, center: Vec3f, angle: f32) -> Vec3f {
    let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), angle);
    return center + rotation * (eye - center);
}

/// Actualy launches the window, showing frames until Escape is released.
fn run_window(params: &Params, mesh: &Mesh) -> Result<(), Box<dyn std::error::Error>> {
    let window_options = WindowOptions {
        size: Some([params.width, params.height]),
        ..Default::default()
    };
    let window = create_window("output", window_options)?;
    let event_channel = window.event_channel()?;

    let tick = time::Duration::from_secs_f32(1.0 / params.fps.max(1) as f32);
    let time_begin = time::Instant::now();
    let mut frame_counter_time_begin = time::Instant::now();
    let mut frame_counter: u32 = 0;
    let mut exit = false;
    while !exit {
        let frame_begin = time::Instant::now();
        let passed_time = frame_begin.duration_since(time_begin).as_secs_f32();

        let mut image = render(params, mesh, orbit(params.eye, params.center, passed_time * 0.5));
        image.flip_vertically();
        let image_info = ImageInfo::bgr8(params.width, params.height);
        let image_data = ImageView::new(image_info, image.as_bytes());
        window.set_image("image", image_data)?;

        // Unloading all the garbage from event channel, that has piled up, looking for exit event.
        exit = event_channel
            .try_iter()
            .fold(false, |was_exit_event, window_event| {
                is_exit_event(window_event) || was_exit_event
            });

        if params.print_fps {
            // Counting frames to printout stats every second.
            frame_counter += 1;
            let elapsed = frame_counter_time_begin.elapsed().as_secs_f32();
            if elapsed >= 1.0 {
                log::info!("fps: {:.1}", frame_counter as f32 / elapsed);
                frame_counter = 0;
                frame_counter_time_begin = time::Instant::now();
            }
        }

        if let Some(rest) = tick.checked_sub(frame_begin.elapsed()) {
            thread::sleep(rest);
        }
    }

    return Ok(());
}
