use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use derive_more::{Display, Error};
use nalgebra as na;
use na::vector;

use crate::util::{to_hom_point, Vec3f, Vec4f};

#[derive(Debug, Display, Error)]
pub enum MeshError {
    #[display("cannot read line {line}: {error}")]
    Read { line: usize, error: io::Error },
    #[display("malformed vertex record on line {line}")]
    BadVertex { line: usize },
    #[display("malformed face record on line {line}")]
    BadFace { line: usize },
    #[display("index {index} on line {line} is out of range")]
    IndexOutOfRange { line: usize, index: i64 },
}

/// Triangle of the mesh, 0-based indices into the vertex list and, when the file
/// provides them, into the normal list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub positions: [usize; 3],
    pub normals: Option<[usize; 3]>,
}

/// Triangle mesh loaded from a wavefront obj style text file.
/// Only `v`, `vn` and `f` records are understood, everything else is skipped.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    vertices: Vec<Vec3f>,
    normals: Vec<Vec3f>,
    faces: Vec<Face>,
    max_extent: f32, // Largest absolute coordinate over all vertices.
}

/// One corner of a face record: `v`, `v/vt`, `v//vn` or `v/vt/vn`.
struct Corner {
    position: usize,
    normal: Option<usize>,
}

impl Mesh {
    /// Loads a mesh from disk.
    ///
    /// A file that cannot be opened is not an error: it is logged and an empty mesh is
    /// returned, so callers have to cope with zero faces. Malformed content is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Mesh, MeshError> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) => {
                log::warn!("failed to open mesh file {}: {}", path.display(), error);
                return Ok(Mesh::default());
            }
        };
        let mesh = Mesh::parse(BufReader::new(file))?;
        let (vertices, faces) = (mesh.vertex_count(), mesh.face_count());
        log::info!("{}: {} vertices, {} faces", path.display(), vertices, faces);
        return Ok(mesh);
    }

    /// Parses mesh records line by line.
    pub fn parse(reader: impl BufRead) -> Result<Mesh, MeshError> {
        let mut mesh = Mesh::default();
        for (i, line) in reader.lines().enumerate() {
            let line_number = i + 1;
            let line = line.map_err(|error| MeshError::Read { line: line_number, error })?;
            let mut fields = line.split_whitespace();
            match fields.next() {
                Some("v") => {
                    let v = parse_vector(fields).ok_or(MeshError::BadVertex { line: line_number })?;
                    mesh.max_extent = mesh.max_extent.max(v.amax());
                    mesh.vertices.push(v);
                }
                Some("vn") => {
                    let n = parse_vector(fields).ok_or(MeshError::BadVertex { line: line_number })?;
                    mesh.normals.push(n);
                }
                Some("f") => mesh.push_polygon(fields, line_number)?,
                _ => (),
            }
        }
        return Ok(mesh);
    }

    /// Adds a polygon as a fan of triangles around its first corner.
    fn push_polygon<'a>(
        &mut self,
        fields: impl Iterator<Item = &'a str>,
        line: usize,
    ) -> Result<(), MeshError> {
        let corners = fields
            .map(|group| self.parse_corner(group, line))
            .collect::<Result<Vec<Corner>, MeshError>>()?;
        if corners.len() < 3 {
            return Err(MeshError::BadFace { line });
        }
        // Normals are only kept when every corner has one.
        let has_normals = corners.iter().all(|corner| corner.normal.is_some());
        for i in 1..corners.len() - 1 {
            let triangle = [&corners[0], &corners[i], &corners[i + 1]];
            self.faces.push(Face {
                positions: triangle.map(|corner| corner.position),
                normals: has_normals
                    .then(|| triangle.map(|corner| corner.normal.unwrap_or_default())),
            });
        }
        return Ok(());
    }

    fn parse_corner(&self, group: &str, line: usize) -> Result<Corner, MeshError> {
        let mut indices = group.split('/');
        let position = indices
            .next()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(MeshError::BadFace { line })?;
        let position = resolve_index(position, self.vertices.len(), line)?;
        // Texture index is read and thrown away. A normal index that does not resolve
        // only drops normals for this face, flat shading does not need them.
        let _texture = indices.next();
        let normal = match indices.next() {
            Some(s) if !s.is_empty() => {
                let index = s.parse::<i64>().map_err(|_| MeshError::BadFace { line })?;
                resolve_index(index, self.normals.len(), line).ok()
            }
            _ => None,
        };
        return Ok(Corner { position, normal });
    }

    pub fn vertex_count(&self) -> usize {
        return self.vertices.len();
    }

    pub fn face_count(&self) -> usize {
        return self.faces.len();
    }

    pub fn max_extent(&self) -> f32 {
        return self.max_extent;
    }

    pub fn has_normals(&self) -> bool {
        return self.faces.iter().all(|face| face.normals.is_some()) && !self.faces.is_empty();
    }

    pub fn face(&self, i: usize) -> Face {
        return self.faces[i];
    }

    pub fn vertex(&self, i: usize) -> Vec3f {
        return self.vertices[i];
    }

    /// Homogeneous position (w = 1) of one corner of a face.
    pub fn vertex_at(&self, face: usize, corner: usize) -> Vec4f {
        return to_hom_point(self.vertices[self.faces[face].positions[corner]]);
    }

    /// Normal of one corner of a face, if the file provided normals for it.
    pub fn normal_at(&self, face: usize, corner: usize) -> Option<Vec3f> {
        let normals = self.faces[face].normals?;
        return Some(self.normals[normals[corner]]);
    }
}

fn parse_vector<'a>(mut fields: impl Iterator<Item = &'a str>) -> Option<Vec3f> {
    let mut next = || fields.next()?.parse::<f32>().ok();
    return Some(vector![next()?, next()?, next()?]);
}

/// Converts a 1-based index (or a negative one, counting back from the last element
/// read so far) to a 0-based one.
fn resolve_index(index: i64, len: usize, line: usize) -> Result<usize, MeshError> {
    let resolved = if index > 0 { index - 1 } else { len as i64 + index };
    if index == 0 || resolved < 0 || resolved >= len as i64 {
        return Err(MeshError::IndexOutOfRange { line, index });
    }
    return Ok(resolved as usize);
}
