use std::path::PathBuf;
use std::process::exit;

use clap::Parser as _;
use nalgebra as na;
use na::vector;

use tiny_rasterizer::app::{self, Params, ShaderName};
use tiny_rasterizer::util::Vec3f;

#[derive(Debug, Clone, clap::Parser)]
#[clap(about = "Renders a wavefront obj mesh with a software rasterizer")]
struct ProgramArgs {
    /// Mesh to render.
    #[clap(short = 'p', long = "mesh", default_value = "assets/cube.obj")]
    mesh: PathBuf,
    /// Shading program.
    #[clap(short = 's', long = "shader", value_enum, default_value_t = ShaderName::Phong)]
    shader: ShaderName,
    /// Output image, `.tga` or anything the image crate can encode.
    #[clap(short = 'o', long = "output", default_value = "output.tga")]
    output: PathBuf,
    /// Also write a grayscale picture of the depth buffer, nearest in white.
    #[clap(long = "depth")]
    depth: Option<PathBuf>,
    /// Image width.
    #[clap(short = 'W', long = "width", default_value_t = 800)]
    width: u32,
    /// Image height.
    #[clap(short = 'H', long = "height", default_value_t = 800)]
    height: u32,
    /// Camera position, as x,y,z.
    #[clap(long = "eye", default_value = "1,1,3", value_parser = parse_vec3)]
    eye: Vec3f,
    /// Point the camera looks at.
    #[clap(long = "center", default_value = "0,0,0", value_parser = parse_vec3)]
    center: Vec3f,
    /// Up direction of the camera.
    #[clap(long = "up", default_value = "0,1,0", value_parser = parse_vec3)]
    up: Vec3f,
    /// Direction towards the light.
    #[clap(long = "light", default_value = "1,1,1", value_parser = parse_vec3)]
    light: Vec3f,
    /// Write uncompressed tga.
    #[clap(long = "no-rle")]
    no_rle: bool,
    /// Spread the rows of each triangle over all cores.
    #[clap(long = "parallel")]
    parallel: bool,
    /// Show an orbiting camera in a window instead of writing a file.
    #[clap(long = "window")]
    window: bool,
    /// Frame rate cap of the window.
    #[clap(long = "fps", default_value_t = 60)]
    fps: u32,
    /// Log the frame rate of the window every second.
    #[clap(long = "print-fps")]
    print_fps: bool,
}

fn parse_vec3(s: &str) -> Result<Vec3f, String> {
    let values = s
        .split(',')
        .map(|part| {
            let part = part.trim();
            return part.parse::<f32>().map_err(|error| format!("{:?}: {}", part, error));
        })
        .collect::<Result<Vec<f32>, String>>()?;
    if let [x, y, z] = values[..] {
        return Ok(vector![x, y, z]);
    }
    return Err(format!("expected three comma separated numbers, got {:?}", s));
}

fn run_or_exit(params: Params) {
    if let Err(error) = app::run(params) {
        log::error!("{}", error);
        exit(1);
    }
}

fn main() {
    env_logger::init();

    let args = ProgramArgs::parse();
    let params = Params {
        width: args.width,
        height: args.height,
        mesh_path: args.mesh,
        shader: args.shader,
        output: args.output,
        depth_output: args.depth,
        eye: args.eye,
        center: args.center,
        up: args.up,
        light: args.light,
        rle: !args.no_rle,
        parallel: args.parallel,
        window: args.window,
        fps: args.fps,
        print_fps: args.print_fps,
    };

    if params.window {
        // The window event loop has to own the main thread.
        show_image::run_context(move || run_or_exit(params));
    } else {
        run_or_exit(params);
    }
}
