//! Mesh file loading.
//!
//! Mesh files are plain text, whitespace delimited:
//!
//! ```text
//! <vertex count> <face count>
//! <vertex count rows of x y z>   positions
//! <vertex count rows of x y z>   normals
//! <vertex count rows of r g b>   colors (0.0 to 1.0)
//! <face count rows of i j k>     triangle vertex indices
//! ```
//!
//! The header must sit alone on the first line. After it, line breaks carry no meaning and
//! fields are consumed in order. The loader reads the file in a
//! single pass and produces a [`MeshData`], or a [`MeshError`] describing the first problem.

use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::{Path, PathBuf},
    str::FromStr,
};

use glam::Vec3;
use glow::HasContext;

use crate::abs::Vertex;

/// The block of the mesh file being read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Positions,
    Normals,
    Colors,
    Indices,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Positions => "positions",
            Section::Normals => "normals",
            Section::Colors => "colors",
            Section::Indices => "indices",
        };
        f.write_str(name)
    }
}

/// Everything that can go wrong while loading a mesh file.
///
/// Rows are 1-based.
#[derive(Debug)]
pub enum MeshError {
    Open { path: PathBuf, source: io::Error },
    Read(io::Error),
    /// The first line did not hold exactly two unsigned integers. `found` is how many valid
    /// counts were read before the problem.
    Header { found: usize },
    UnexpectedEof { section: Section, row: u32, found: usize },
    InvalidToken { section: Section, row: u32, token: String },
    Alloc { section: Section, rows: u32 },
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::Open { path, source } => {
                write!(f, "cannot open mesh file {}: {}", path.display(), source)
            }
            MeshError::Read(err) => write!(f, "mesh file read error: {}", err),
            MeshError::Header { found } => write!(
                f,
                "mesh file read error: header line must be a vertex count and a face count ({} valid)",
                found
            ),
            MeshError::UnexpectedEof {
                section,
                row,
                found,
            } => write!(
                f,
                "mesh file read error: input ended at {} row {} ({} of 3 fields)",
                section, row, found
            ),
            MeshError::InvalidToken {
                section,
                row,
                token,
            } => write!(
                f,
                "mesh file read error: invalid value '{}' at {} row {}",
                token, section, row
            ),
            MeshError::Alloc { section, rows } => {
                write!(f, "cannot allocate {} rows for mesh {}", rows, section)
            }
        }
    }
}

impl std::error::Error for MeshError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MeshError::Open { source, .. } => Some(source),
            MeshError::Read(err) => Some(err),
            _ => None,
        }
    }
}

/// Whitespace separated tokens pulled from a buffered reader one at a time.
struct Tokens<R> {
    reader: R,
    token: Vec<u8>,
}

impl<R: BufRead> Tokens<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            token: Vec::new(),
        }
    }

    /// Returns the next token, or `None` at the end of input.
    fn next_token(&mut self) -> io::Result<Option<&[u8]>> {
        self.token.clear();

        loop {
            let (used, complete) = {
                let available = self.reader.fill_buf()?;
                if available.is_empty() {
                    break;
                }

                let mut used = 0;
                let mut complete = false;
                for &byte in available {
                    used += 1;
                    if byte.is_ascii_whitespace() {
                        if !self.token.is_empty() {
                            complete = true;
                            break;
                        }
                    } else {
                        self.token.push(byte);
                    }
                }
                (used, complete)
            };

            self.reader.consume(used);
            if complete {
                break;
            }
        }

        Ok(if self.token.is_empty() {
            None
        } else {
            Some(self.token.as_slice())
        })
    }

    /// Reads the first line, which must hold exactly the vertex and face counts.
    fn read_header(&mut self) -> Result<(u32, u32), MeshError> {
        let mut line = Vec::new();
        self.reader
            .read_until(b'\n', &mut line)
            .map_err(MeshError::Read)?;
        let line = String::from_utf8_lossy(&line);

        let mut counts = [0u32; 2];
        let mut fields = line.split_whitespace();
        for (found, count) in counts.iter_mut().enumerate() {
            *count = fields
                .next()
                .and_then(|field| field.parse().ok())
                .ok_or(MeshError::Header { found })?;
        }
        if fields.next().is_some() {
            return Err(MeshError::Header { found: 2 });
        }
        Ok((counts[0], counts[1]))
    }

    fn read_row<T: FromStr + Default + Copy>(
        &mut self,
        section: Section,
        row: u32,
    ) -> Result<[T; 3], MeshError> {
        let mut values = [T::default(); 3];
        for (found, value) in values.iter_mut().enumerate() {
            let token = self
                .next_token()
                .map_err(MeshError::Read)?
                .ok_or(MeshError::UnexpectedEof {
                    section,
                    row,
                    found,
                })?;
            *value = std::str::from_utf8(token)
                .ok()
                .and_then(|field| field.parse().ok())
                .ok_or_else(|| MeshError::InvalidToken {
                    section,
                    row,
                    token: String::from_utf8_lossy(token).into_owned(),
                })?;
        }
        Ok(values)
    }

    /// Reads exactly `rows` triples into a buffer sized up front.
    fn read_block<T, U>(
        &mut self,
        section: Section,
        rows: u32,
        convert: impl Fn([T; 3]) -> U,
    ) -> Result<Vec<U>, MeshError>
    where
        T: FromStr + Default + Copy,
    {
        let mut data = Vec::new();
        data.try_reserve_exact(rows as usize)
            .map_err(|_| MeshError::Alloc { section, rows })?;

        for row in 1..=rows {
            data.push(convert(self.read_row(section, row)?));
        }
        Ok(data)
    }
}

/// Interleaved vertex layout uploaded to the GPU.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
}

impl Vertex for MeshVertex {
    fn vertex_attribs(gl: &glow::Context) {
        unsafe {
            let stride = std::mem::size_of::<MeshVertex>() as i32;
            let vec3 = std::mem::size_of::<Vec3>() as i32;

            // Position attribute
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);

            // Normal attribute
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, stride, vec3);

            // Color attribute
            gl.enable_vertex_attrib_array(2);
            gl.vertex_attrib_pointer_f32(2, 3, glow::FLOAT, false, stride, vec3 * 2);
        }
    }
}

/// A triangle mesh as read from a mesh file. Immutable once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    vertex_count: u32,
    face_count: u32,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    colors: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
}

impl MeshData {
    /// Loads a mesh from the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MeshError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| MeshError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Parses a mesh from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, MeshError> {
        let mut tokens = Tokens::new(BufReader::new(reader));

        let (vertex_count, face_count) = tokens.read_header()?;

        // Order of vertex blocks: positions, normals, colors.
        let positions = tokens.read_block(Section::Positions, vertex_count, Vec3::from_array)?;
        let normals = tokens.read_block(Section::Normals, vertex_count, Vec3::from_array)?;
        let colors = tokens.read_block(Section::Colors, vertex_count, Vec3::from_array)?;
        let indices = tokens.read_block(Section::Indices, face_count, |row: [u32; 3]| row)?;

        if tokens.next_token().map_err(MeshError::Read)?.is_some() {
            log::warn!("Ignoring data after the last of {} faces", face_count);
        }

        Ok(Self {
            vertex_count,
            face_count,
            positions,
            normals,
            colors,
            indices,
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn face_count(&self) -> u32 {
        self.face_count
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    pub fn indices(&self) -> &[[u32; 3]] {
        &self.indices
    }

    /// Interleaves positions, normals and colors into GPU vertices.
    pub fn vertices(&self) -> Vec<MeshVertex> {
        self.positions()
            .iter()
            .zip(self.normals())
            .zip(self.colors())
            .map(|((&position, &normal), &color)| MeshVertex {
                position,
                normal,
                color,
            })
            .collect()
    }

    /// Returns the triangle list as a flat index buffer.
    pub fn flat_indices(&self) -> Vec<u32> {
        self.indices().iter().flatten().copied().collect()
    }

    /// Finds the first face referencing a vertex that does not exist.
    /// Returns the 0-based face number and the offending index.
    ///
    /// Loading does not check this.
    pub fn first_out_of_range_index(&self) -> Option<(usize, u32)> {
        self.indices.iter().enumerate().find_map(|(face, triangle)| {
            triangle
                .iter()
                .find(|&&index| index >= self.vertex_count)
                .map(|&index| (face, index))
        })
    }
}

impl FromStr for MeshData {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_reader(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "3 1\n0 0 0 1 0 0 0 1 0\n0 0 1 0 0 1 0 0 1\n1 1 1 1 1 1 1 1 1\n0 1 2\n";

    #[test]
    fn test_triangle_example() {
        let mesh = TRIANGLE.parse::<MeshData>().unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.indices(), &[[0, 1, 2]]);
        assert_eq!(mesh.colors(), &[Vec3::ONE; 3]);
        assert_eq!(
            mesh.positions(),
            &[Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)]
        );
        assert_eq!(mesh.normals(), &[Vec3::Z; 3]);
    }

    #[test]
    fn test_counts_match_header() {
        let input = "4 2\n\
            0 0 0\n1 0 0\n1 1 0\n0 1 0\n\
            0 0 1\n0 0 1\n0 0 1\n0 0 1\n\
            1 0 0\n0 1 0\n0 0 1\n1 1 1\n\
            0 1 2\n0 2 3\n";
        let mesh = input.parse::<MeshData>().unwrap();
        assert_eq!(mesh.positions().len(), 4);
        assert_eq!(mesh.normals().len(), 4);
        assert_eq!(mesh.colors().len(), 4);
        assert_eq!(mesh.indices().len(), 2);
        assert_eq!(mesh.indices()[1], [0, 2, 3]);
    }

    #[test]
    fn test_rows_keep_file_order() {
        let input = "2 0\n1 2 3\n4 5 6\n0 0 0\n0 0 0\n0 0 0\n0 0 0\n";
        let mesh = input.parse::<MeshData>().unwrap();
        assert_eq!(
            mesh.positions(),
            &[Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)]
        );
    }

    #[test]
    fn test_empty_mesh() {
        let mesh = "0 0".parse::<MeshData>().unwrap();
        assert_eq!(mesh.vertex_count(), 0);
        assert!(mesh.positions().is_empty());
        assert!(mesh.indices().is_empty());
    }

    #[test]
    fn test_short_header() {
        let err = "3\n0 0 0\n".parse::<MeshData>().unwrap_err();
        assert!(matches!(err, MeshError::Header { found: 1 }));

        let err = "".parse::<MeshData>().unwrap_err();
        assert!(matches!(err, MeshError::Header { found: 0 }));
    }

    #[test]
    fn test_header_is_first_line_only() {
        // The face count on the next line is not picked up.
        let err = "3\n1\n0 0 0 1 0 0 0 1 0\n".parse::<MeshData>().unwrap_err();
        assert!(matches!(err, MeshError::Header { found: 1 }));

        let err = "\n3 1\n".parse::<MeshData>().unwrap_err();
        assert!(matches!(err, MeshError::Header { found: 0 }));

        let err = "3 1 0\n".parse::<MeshData>().unwrap_err();
        assert!(matches!(err, MeshError::Header { found: 2 }));
    }

    #[test]
    fn test_header_with_crlf() {
        let input = TRIANGLE.replace('\n', "\r\n");
        let mesh = input.parse::<MeshData>().unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices(), &[[0, 1, 2]]);
    }

    #[test]
    fn test_invalid_token_keeps_utf8() {
        let err = "1 0\n0 0 0\n\u{e9} 0 0\n1 1 1\n".parse::<MeshData>().unwrap_err();
        assert!(err.to_string().contains("'\u{e9}'"));
        match err {
            MeshError::InvalidToken { section, token, .. } => {
                assert_eq!(section, Section::Normals);
                assert_eq!(token, "\u{e9}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_header() {
        let err = "three 1\n".parse::<MeshData>().unwrap_err();
        assert!(matches!(err, MeshError::Header { found: 0 }));

        let err = "3 -1\n".parse::<MeshData>().unwrap_err();
        assert!(matches!(err, MeshError::Header { found: 1 }));
    }

    #[test]
    fn test_truncated_positions() {
        // Two vertices declared, one and a half position rows present.
        let err = "2 0\n1 2 3\n4 5".parse::<MeshData>().unwrap_err();
        match err {
            MeshError::UnexpectedEof {
                section,
                row,
                found,
            } => {
                assert_eq!(section, Section::Positions);
                assert_eq!(row, 2);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_index_rows() {
        let input = "3 2\n0 0 0 1 0 0 0 1 0\n0 0 1 0 0 1 0 0 1\n1 1 1 1 1 1 1 1 1\n0 1 2\n";
        let err = input.parse::<MeshData>().unwrap_err();
        assert!(matches!(
            err,
            MeshError::UnexpectedEof {
                section: Section::Indices,
                row: 2,
                found: 0,
            }
        ));
    }

    #[test]
    fn test_invalid_float() {
        let input = "1 0\n0 0 0\n0 x 1\n1 1 1\n";
        let err = input.parse::<MeshData>().unwrap_err();
        match err {
            MeshError::InvalidToken {
                section,
                row,
                token,
            } => {
                assert_eq!(section, Section::Normals);
                assert_eq!(row, 1);
                assert_eq!(token, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_index_rejected() {
        let input = "3 1\n0 0 0 1 0 0 0 1 0\n0 0 1 0 0 1 0 0 1\n1 1 1 1 1 1 1 1 1\n0 -1 2\n";
        let err = input.parse::<MeshData>().unwrap_err();
        assert!(matches!(
            err,
            MeshError::InvalidToken {
                section: Section::Indices,
                row: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_trailing_data_ignored() {
        let input = format!("{TRIANGLE}3 4 5\n");
        let mesh = input.parse::<MeshData>().unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.indices(), &[[0, 1, 2]]);
    }

    #[test]
    fn test_out_of_range_index() {
        let mesh = TRIANGLE.parse::<MeshData>().unwrap();
        assert_eq!(mesh.first_out_of_range_index(), None);

        let input = "3 2\n0 0 0 1 0 0 0 1 0\n0 0 1 0 0 1 0 0 1\n1 1 1 1 1 1 1 1 1\n0 1 2\n2 3 1\n";
        let mesh = input.parse::<MeshData>().unwrap();
        assert_eq!(mesh.first_out_of_range_index(), Some((1, 3)));
    }

    #[test]
    fn test_vertices_and_flat_indices() {
        let mesh = TRIANGLE.parse::<MeshData>().unwrap();
        let vertices = mesh.vertices();
        assert_eq!(vertices.len(), 3);
        assert_eq!(
            vertices[1],
            MeshVertex {
                position: Vec3::new(1.0, 0.0, 0.0),
                normal: Vec3::Z,
                color: Vec3::ONE,
            }
        );
        assert_eq!(mesh.flat_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("meshview-{}.mesh", std::process::id()));
        std::fs::write(&path, TRIANGLE).unwrap();
        let mesh = MeshData::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(mesh.unwrap(), TRIANGLE.parse::<MeshData>().unwrap());
    }

    #[test]
    fn test_bundled_meshes() {
        let cube = include_str!("../meshes/cube.mesh").parse::<MeshData>().unwrap();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.face_count(), 12);
        assert_eq!(cube.first_out_of_range_index(), None);

        let triangle = include_str!("../meshes/triangle.mesh").parse::<MeshData>().unwrap();
        assert_eq!(triangle, TRIANGLE.parse::<MeshData>().unwrap());
    }

    #[test]
    fn test_load_missing_file() {
        let err = MeshData::load("does/not/exist.mesh").unwrap_err();
        assert!(matches!(err, MeshError::Open { .. }));
        assert!(err.to_string().contains("does/not/exist.mesh"));
    }
}
