//! Small software rasterizer: wavefront obj meshes in, TGA images out.
//!
//! Triangles go through a [`shader::Shader`] vertex stage and are filled with edge
//! functions and depth tested in [`raster::rasterize`]. The result is an
//! [`image::Image`] that [`tga`] can write. Triangles reaching behind the camera are
//! dropped, not clipped.

pub mod app;
pub mod camera;
pub mod image;
pub mod model;
pub mod raster;
pub mod shader;
pub mod tga;
pub mod util;
