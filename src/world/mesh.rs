//! # Object mesh decoder
//!
//! Meshes arrive as a flat stream of little-endian 16-bit words:
//!
//! ```text
//! cx cy cz radius
//! nverts   (x y z)*
//! nnormals (nx ny nz)*        or   -nshades shade*
//! ngt4     (v0 v1 v2 v3 tex)*
//! ngt3     (v0 v1 v2 tex)*
//! ng4      (v0 v1 v2 v3 color)*
//! ng3      (v0 v1 v2 color)*
//! ```
//!
//! Everything is validated here, once, so the per-frame loops never check.

use byteorder::{LittleEndian as LE, ReadBytesExt};
use glam::IVec3;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MeshError {
    #[error("stream ends at word {0}")]
    Truncated(usize),

    #[error("byte stream length {0} is not a whole number of words")]
    OddLength(usize),

    #[error("{what} count {count} is negative")]
    NegativeCount { what: &'static str, count: i32 },

    #[error("face {face} references vertex {index}, only {count} present")]
    BadVertex { face: usize, index: u16, count: usize },

    #[error("{lights} normals/shades for {verts} vertices")]
    LightingCount { lights: usize, verts: usize },
}

/// Quad: four vertex indices plus an object texture id or a palette colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Face4 {
    pub verts: [u16; 4],
    pub tex: u16,
}

/// Triangle: three vertex indices plus an object texture id or a palette colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Face3 {
    pub verts: [u16; 3],
    pub tex: u16,
}

/// Per-vertex lighting input; the stream tells them apart by the sign of
/// the count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshLighting {
    /// Unit normals scaled by `1 << 14`.
    Normals(Vec<IVec3>),
    /// Precomputed 13-bit shades.
    Shades(Vec<u16>),
}

impl MeshLighting {
    pub fn len(&self) -> usize {
        match self {
            MeshLighting::Normals(n) => n.len(),
            MeshLighting::Shades(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mesh {
    pub center: IVec3,
    pub radius: i32,
    pub vertices: Vec<IVec3>,
    pub lighting: MeshLighting,
    /// Textured quads / triangles.
    pub gt4: Vec<Face4>,
    pub gt3: Vec<Face3>,
    /// Gouraud-coloured quads / triangles.
    pub g4: Vec<Face4>,
    pub g3: Vec<Face3>,
}

/// Cursor over a word stream.
pub(crate) struct WordReader<'a> {
    words: &'a [i16],
    pos: usize,
}

impl<'a> WordReader<'a> {
    pub(crate) fn new(words: &'a [i16]) -> Self {
        Self { words, pos: 0 }
    }

    pub(crate) fn word(&mut self) -> Result<i16, MeshError> {
        let w = *self.words.get(self.pos).ok_or(MeshError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(w)
    }

    pub(crate) fn count(&mut self, what: &'static str) -> Result<usize, MeshError> {
        let c = self.word()?;
        if c < 0 {
            return Err(MeshError::NegativeCount { what, count: c as i32 });
        }
        Ok(c as usize)
    }

    pub(crate) fn ivec3(&mut self) -> Result<IVec3, MeshError> {
        Ok(IVec3::new(self.word()? as i32, self.word()? as i32, self.word()? as i32))
    }

    fn index(&mut self, face: usize, count: usize) -> Result<u16, MeshError> {
        let index = self.word()? as u16;
        if index as usize >= count {
            return Err(MeshError::BadVertex { face, index, count });
        }
        Ok(index)
    }

    pub(crate) fn faces4(&mut self, what: &'static str, nverts: usize) -> Result<Vec<Face4>, MeshError> {
        let n = self.count(what)?;
        let mut out = Vec::with_capacity(n);
        for face in 0..n {
            let mut verts = [0u16; 4];
            for v in verts.iter_mut() {
                *v = self.index(face, nverts)?;
            }
            out.push(Face4 {
                verts,
                tex: self.word()? as u16,
            });
        }
        Ok(out)
    }

    pub(crate) fn faces3(&mut self, what: &'static str, nverts: usize) -> Result<Vec<Face3>, MeshError> {
        let n = self.count(what)?;
        let mut out = Vec::with_capacity(n);
        for face in 0..n {
            let mut verts = [0u16; 3];
            for v in verts.iter_mut() {
                *v = self.index(face, nverts)?;
            }
            out.push(Face3 {
                verts,
                tex: self.word()? as u16,
            });
        }
        Ok(out)
    }
}

/// Little-endian bytes → words.
pub(crate) fn words_from_bytes(bytes: &[u8]) -> Result<Vec<i16>, MeshError> {
    if bytes.len() % 2 != 0 {
        return Err(MeshError::OddLength(bytes.len()));
    }
    let n = bytes.len() / 2;
    let mut words = vec![0i16; n];
    let mut cur = bytes;
    cur.read_i16_into::<LE>(&mut words)
        .map_err(|_| MeshError::Truncated(n))?;
    Ok(words)
}

impl Mesh {
    pub fn from_words(words: &[i16]) -> Result<Self, MeshError> {
        let mut r = WordReader::new(words);

        let center = r.ivec3()?;
        let radius = r.word()? as i32;

        let nverts = r.count("vertex")?;
        let vertices = (0..nverts).map(|_| r.ivec3()).collect::<Result<Vec<_>, _>>()?;

        let nlights = r.word()?;
        let lighting = if nlights >= 0 {
            MeshLighting::Normals((0..nlights).map(|_| r.ivec3()).collect::<Result<_, _>>()?)
        } else {
            let n = -(nlights as i32);
            MeshLighting::Shades((0..n).map(|_| r.word().map(|w| w as u16)).collect::<Result<_, _>>()?)
        };
        if lighting.len() != nverts {
            return Err(MeshError::LightingCount {
                lights: lighting.len(),
                verts: nverts,
            });
        }

        let gt4 = r.faces4("textured quad", nverts)?;
        let gt3 = r.faces3("textured triangle", nverts)?;
        let g4 = r.faces4("coloured quad", nverts)?;
        let g3 = r.faces3("coloured triangle", nverts)?;

        Ok(Self {
            center,
            radius,
            vertices,
            lighting,
            gt4,
            gt3,
            g4,
            g3,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MeshError> {
        Self::from_words(&words_from_bytes(bytes)?)
    }

    pub fn face_count(&self) -> usize {
        self.gt4.len() + self.gt3.len() + self.g4.len() + self.g3.len()
    }
}

/// Word stream of an axis-aligned cube of half-size `half` centred on the
/// origin, every face using object texture `tex`.
///
/// Corner `i` sits at `(±half, ±half, ±half)` with bit 0 selecting +x, bit 1
/// +y and bit 2 +z. Faces wind clockwise seen from outside (y down).
pub fn cube_words(half: i16, tex: u16) -> Vec<i16> {
    const FACES: [[i16; 4]; 6] = [
        [0, 1, 3, 2], // -z
        [5, 4, 6, 7], // +z
        [4, 0, 2, 6], // -x
        [1, 5, 7, 3], // +x
        [4, 5, 1, 0], // -y
        [2, 3, 7, 6], // +y
    ];
    // 1 / sqrt(3) in 1.14
    const N: i16 = 9459;
    let sign = |bit: bool| if bit { 1 } else { -1 };

    let mut w = vec![0, 0, 0, (half as f64 * 1.75) as i16, 8];
    for i in 0..8 {
        w.extend([sign(i & 1 != 0) * half, sign(i & 2 != 0) * half, sign(i & 4 != 0) * half]);
    }
    w.push(8);
    for i in 0..8 {
        w.extend([sign(i & 1 != 0) * N, sign(i & 2 != 0) * N, sign(i & 4 != 0) * N]);
    }
    w.push(FACES.len() as i16);
    for f in FACES {
        w.extend(f);
        w.push(tex as i16);
    }
    w.extend([0, 0, 0]);
    w
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;

    fn tri_words(nlights: i16) -> Vec<i16> {
        let mut w = vec![0, 0, 0, 100, 3, 0, 0, 0, 100, 0, 0, 0, 100, 0, nlights];
        if nlights < 0 {
            w.extend([0x100, 0x200, 0x300]);
        } else {
            w.extend([0, 0, -16384, 0, 0, -16384, 0, 0, -16384]);
        }
        w.extend([0, 1, 0, 1, 2, 5, 0, 1, 0, 1, 0, 2]);
        w
    }

    #[test]
    fn decodes_cube() {
        let mesh = Mesh::from_words(&cube_words(512, 3)).unwrap();
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.gt4.len(), 6);
        assert!(mesh.gt3.is_empty() && mesh.g4.is_empty() && mesh.g3.is_empty());
        assert_eq!(mesh.vertices[7], IVec3::splat(512));
        assert_eq!(mesh.gt4[0], Face4 { verts: [0, 1, 3, 2], tex: 3 });
        assert!(matches!(mesh.lighting, MeshLighting::Normals(ref n) if n.len() == 8));
    }

    #[test]
    fn negative_count_selects_shades() {
        let mesh = Mesh::from_words(&tri_words(-3)).unwrap();
        assert_eq!(mesh.lighting, MeshLighting::Shades(vec![0x100, 0x200, 0x300]));
        assert_eq!(mesh.gt3[0], Face3 { verts: [0, 1, 2], tex: 5 });
        assert_eq!(mesh.g3[0], Face3 { verts: [0, 1, 0], tex: 2 });
        assert_eq!(mesh.g4.len(), 0);
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn bytes_round_through_little_endian() {
        let words = tri_words(3);
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        assert_eq!(Mesh::from_bytes(&bytes).unwrap(), Mesh::from_words(&words).unwrap());
        assert_eq!(Mesh::from_bytes(&bytes[1..]).unwrap_err(), MeshError::OddLength(bytes.len() - 1));
    }

    #[test]
    fn malformed_streams() {
        let w = tri_words(3);
        assert_eq!(Mesh::from_words(&w[..10]).unwrap_err(), MeshError::Truncated(10));

        let mut bad_index = w.clone();
        bad_index[26] = 9;
        assert_eq!(
            Mesh::from_words(&bad_index).unwrap_err(),
            MeshError::BadVertex { face: 0, index: 9, count: 3 }
        );

        let mut short_lights = tri_words(-2);
        short_lights.remove(15);
        assert_eq!(
            Mesh::from_words(&short_lights).unwrap_err(),
            MeshError::LightingCount { lights: 2, verts: 3 }
        );
    }
}
