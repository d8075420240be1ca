//! Room geometry stream.
//!
//! ```text
//! nverts   (x y z shade flags)*
//! ngt4     (v0 v1 v2 v3 tex)*
//! ngt3     (v0 v1 v2 tex)*
//! nsprites (vertex sprite)*
//! ```
//!
//! Coordinates are relative to the room origin; the caller positions the
//! matrix with `translate_abs` before inserting.

use glam::IVec3;

use super::mesh::{Face3, Face4, MeshError, WordReader, words_from_bytes};

/// Vertex flag: takes part in the underwater shimmer.
pub const VERTEX_WIBBLE: u16 = 0x8000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoomVertex {
    pub pos: IVec3,
    /// Baked 13-bit shade.
    pub shade: u16,
    pub wibble: bool,
}

/// Billboard standing on a room vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoomSprite {
    pub vertex: u16,
    pub sprite: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Room {
    pub vertices: Vec<RoomVertex>,
    pub gt4: Vec<Face4>,
    pub gt3: Vec<Face3>,
    pub sprites: Vec<RoomSprite>,
}

impl Room {
    pub fn from_words(words: &[i16]) -> Result<Self, MeshError> {
        let mut r = WordReader::new(words);

        let nverts = r.count("room vertex")?;
        let mut vertices = Vec::with_capacity(nverts);
        for _ in 0..nverts {
            let pos = r.ivec3()?;
            let shade = r.word()? as u16;
            let flags = r.word()? as u16;
            vertices.push(RoomVertex {
                pos,
                shade,
                wibble: flags & VERTEX_WIBBLE != 0,
            });
        }

        let gt4 = r.faces4("room quad", nverts)?;
        let gt3 = r.faces3("room triangle", nverts)?;

        let nsprites = r.count("room sprite")?;
        let mut sprites = Vec::with_capacity(nsprites);
        for face in 0..nsprites {
            let vertex = r.word()? as u16;
            if vertex as usize >= nverts {
                return Err(MeshError::BadVertex {
                    face,
                    index: vertex,
                    count: nverts,
                });
            }
            sprites.push(RoomSprite {
                vertex,
                sprite: r.word()? as u16,
            });
        }

        Ok(Self {
            vertices,
            gt4,
            gt3,
            sprites,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MeshError> {
        Self::from_words(&words_from_bytes(bytes)?)
    }
}
