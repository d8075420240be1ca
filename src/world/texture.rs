// Read-only texture data the renderer samples: 8-bit pages, the per-polygon
// texture descriptors that point into them, sprites, the palette and the
// depth-cue remap built from it.

use std::ops::{Index, IndexMut};

use crate::engine::types::SHADE_BAND_SHIFT;

/// Pages are 256×256 texels, one palette index each.
pub const PAGE_SIZE: usize = 256;
pub const PAGE_TEXELS: usize = PAGE_SIZE * PAGE_SIZE;
/// Darkness bands in the depth-cue table.
pub const DEPTHQ_BANDS: usize = 32;
/// Band that maps every colour onto itself.
pub const NEUTRAL_BAND: usize = 16;
/// Palette index treated as transparent by colour-keyed fills.
pub const COLOR_KEY: u8 = 0;

pub type PageId = u16;
pub type ObjectTextureId = u16;
pub type SpriteId = u16;

/// How a textured polygon combines with what is behind it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DrawType {
    #[default]
    Opaque,
    /// Texel [`COLOR_KEY`] is a hole.
    ColorKey,
    /// Blended over the background; software draws it colour-keyed.
    SemiTransparent,
}

/// Per-polygon texture descriptor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectTexture {
    pub draw: DrawType,
    pub page: PageId,
    /// Corner UVs in 8.8 texels, in polygon vertex order (triangles use three).
    pub uv: [(u16, u16); 4],
}

impl ObjectTexture {
    /// Corner `i` in texels.
    #[inline]
    pub fn uv_f(&self, i: usize) -> (f64, f64) {
        let (u, v) = self.uv[i];
        (u as f64 / 256.0, v as f64 / 256.0)
    }
}

/// Sprite: a texel rectangle on a page plus its extents in world units
/// around the sprite origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpriteTexture {
    pub page: PageId,
    pub u: u8,
    pub v: u8,
    pub width: u16,
    pub height: u16,
    pub x1: i16,
    pub y1: i16,
    pub x2: i16,
    pub y2: i16,
}

/// Things that can go wrong when using the bank.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextureError {
    #[error("texture page must be 65536 texels, got {0}")]
    PageSize(usize),

    #[error("texture page {0} out of range")]
    BadPage(PageId),

    #[error("object texture {0} out of range")]
    BadObjectTexture(ObjectTextureId),

    #[error("sprite {0} out of range")]
    BadSprite(SpriteId),
}

/// 256 colours, `0x00RRGGBB`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette(pub [u32; 256]);

impl Default for Palette {
    fn default() -> Self {
        Palette::grayscale()
    }
}

impl Palette {
    pub fn grayscale() -> Self {
        let mut p = [0u32; 256];
        for (i, c) in p.iter_mut().enumerate() {
            let i = i as u32;
            *c = (i << 16) | (i << 8) | i;
        }
        Palette(p)
    }

    /// From 768 bytes of 6-bit VGA RGB triplets.
    pub fn from_vga(rgb: &[u8; 768]) -> Self {
        let mut p = [0u32; 256];
        for (c, t) in p.iter_mut().zip(rgb.chunks_exact(3)) {
            let e = |x: u8| ((x & 0x3F) as u32) << 2;
            *c = (e(t[0]) << 16) | (e(t[1]) << 8) | e(t[2]);
        }
        Palette(p)
    }

    fn nearest(&self, r: i32, g: i32, b: i32) -> u8 {
        let mut best = (i32::MAX, 1u8);
        // index 0 stays reserved for the colour key
        for (i, &c) in self.0.iter().enumerate().skip(1) {
            let dr = ((c >> 16) & 0xFF) as i32 - r;
            let dg = ((c >> 8) & 0xFF) as i32 - g;
            let db = (c & 0xFF) as i32 - b;
            let d = dr * dr + dg * dg + db * db;
            if d < best.0 {
                best = (d, i as u8);
                if d == 0 {
                    break;
                }
            }
        }
        best.1
    }
}

impl Index<usize> for Palette {
    type Output = u32;
    fn index(&self, idx: usize) -> &u32 {
        &self.0[idx]
    }
}
impl IndexMut<usize> for Palette {
    fn index_mut(&mut self, idx: usize) -> &mut u32 {
        &mut self.0[idx]
    }
}

/// Per-band palette remap: band 0 brightest, [`NEUTRAL_BAND`] identity,
/// band 31 nearly black.
#[derive(Clone, Debug)]
pub struct DepthQTable(pub Box<[[u8; 256]; DEPTHQ_BANDS]>);

impl DepthQTable {
    pub fn build(palette: &Palette) -> Self {
        let mut t = Box::new([[0u8; 256]; DEPTHQ_BANDS]);
        for (band, row) in t.iter_mut().enumerate() {
            if band == NEUTRAL_BAND {
                for (i, e) in row.iter_mut().enumerate() {
                    *e = i as u8;
                }
                continue;
            }
            // brightness 2.0 at band 0, 1.0 at 16, 1/16 at 31
            let scale = (DEPTHQ_BANDS - band) as i32;
            for (i, e) in row.iter_mut().enumerate().skip(1) {
                let c = palette[i];
                let ch = |s: u32| ((((c >> s) & 0xFF) as i32 * scale) >> 4).min(255);
                *e = palette.nearest(ch(16), ch(8), ch(0));
            }
        }
        DepthQTable(t)
    }

    /// Remap row for a 13-bit shade.
    #[inline]
    pub fn for_shade(&self, g: i32) -> &[u8; 256] {
        &self.0[((g >> SHADE_BAND_SHIFT) as usize).min(DEPTHQ_BANDS - 1)]
    }
}

impl Index<usize> for DepthQTable {
    type Output = [u8; 256];
    fn index(&self, band: usize) -> &Self::Output {
        &self.0[band]
    }
}

/// Everything the rasterizers read: pages, descriptors, sprites, palette.
///
/// Owned by the level loader; the render pass only borrows it.
pub struct TextureBank {
    pages: Vec<Box<[u8]>>,
    object_textures: Vec<ObjectTexture>,
    sprites: Vec<SpriteTexture>,
    palette: Palette,
    depthq: DepthQTable,
}

impl Default for TextureBank {
    fn default() -> Self {
        Self::new(Palette::default())
    }
}

impl TextureBank {
    // ---------------------------------------------------------------------
    // Constructors
    // ---------------------------------------------------------------------

    pub fn new(palette: Palette) -> Self {
        let depthq = DepthQTable::build(&palette);
        Self {
            pages: Vec::new(),
            object_textures: Vec::new(),
            sprites: Vec::new(),
            palette,
            depthq,
        }
    }

    /// Bank with one checkerboard page and object texture 0 covering it.
    pub fn default_with_checker() -> Self {
        const LIGHT_IDX: u8 = 200;
        const DARK_IDX: u8 = 90;
        let mut bank = Self::default();
        let mut pix = vec![0u8; PAGE_TEXELS];
        for y in 0..PAGE_SIZE {
            for x in 0..PAGE_SIZE {
                pix[y * PAGE_SIZE + x] = if ((x >> 5) ^ (y >> 5)) & 1 == 0 {
                    LIGHT_IDX
                } else {
                    DARK_IDX
                };
            }
        }
        bank.pages.push(pix.into_boxed_slice());
        bank.object_textures.push(ObjectTexture {
            draw: DrawType::Opaque,
            page: 0,
            uv: [(0, 0), (0xFF00, 0), (0xFF00, 0xFF00), (0, 0xFF00)],
        });
        bank
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.depthq = DepthQTable::build(&palette);
        self.palette = palette;
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    pub fn add_page(&mut self, texels: Vec<u8>) -> Result<PageId, TextureError> {
        if texels.len() != PAGE_TEXELS {
            return Err(TextureError::PageSize(texels.len()));
        }
        self.pages.push(texels.into_boxed_slice());
        Ok((self.pages.len() - 1) as PageId)
    }

    pub fn add_object_texture(&mut self, tex: ObjectTexture) -> Result<ObjectTextureId, TextureError> {
        self.page(tex.page)?;
        self.object_textures.push(tex);
        Ok((self.object_textures.len() - 1) as ObjectTextureId)
    }

    pub fn add_sprite(&mut self, sprite: SpriteTexture) -> Result<SpriteId, TextureError> {
        self.page(sprite.page)?;
        self.sprites.push(sprite);
        Ok((self.sprites.len() - 1) as SpriteId)
    }

    // ---------------------------------------------------------------------
    // Query helpers
    // ---------------------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, id: PageId) -> Result<&[u8], TextureError> {
        self.pages
            .get(id as usize)
            .map(|p| &p[..])
            .ok_or(TextureError::BadPage(id))
    }

    pub fn object_texture(&self, id: ObjectTextureId) -> Result<&ObjectTexture, TextureError> {
        self.object_textures
            .get(id as usize)
            .ok_or(TextureError::BadObjectTexture(id))
    }

    pub fn sprite(&self, id: SpriteId) -> Result<&SpriteTexture, TextureError> {
        self.sprites.get(id as usize).ok_or(TextureError::BadSprite(id))
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn depthq(&self) -> &DepthQTable {
        &self.depthq
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checker_bank_has_page_and_texture_zero() {
        let bank = TextureBank::default_with_checker();
        assert_eq!(bank.page_count(), 1);
        let page = bank.page(0).unwrap();
        assert_eq!(page.len(), PAGE_TEXELS);
        assert_eq!((page[0], page[32]), (200, 90));
        assert_eq!(page[33 * PAGE_SIZE + 33], 200);
        let tex = bank.object_texture(0).unwrap();
        assert_eq!((tex.draw, tex.page), (DrawType::Opaque, 0));
        assert_eq!(bank.object_texture(1).unwrap_err(), TextureError::BadObjectTexture(1));
    }

    #[test]
    fn insert_and_lookup() {
        let mut bank = TextureBank::default_with_checker();
        let page = bank.add_page(vec![7u8; PAGE_TEXELS]).unwrap();
        assert_eq!(page, 1);
        let tex = bank
            .add_object_texture(ObjectTexture {
                draw: DrawType::ColorKey,
                page,
                uv: [(0, 0); 4],
            })
            .unwrap();
        assert_eq!(bank.object_texture(tex).unwrap().draw, DrawType::ColorKey);
        assert_eq!(bank.page(page).unwrap()[1234], 7);
    }

    #[test]
    fn bad_ids_guarded() {
        let mut bank = TextureBank::default_with_checker();
        assert_eq!(bank.page(9).unwrap_err(), TextureError::BadPage(9));
        assert_eq!(bank.object_texture(9).unwrap_err(), TextureError::BadObjectTexture(9));
        assert_eq!(bank.sprite(0).unwrap_err(), TextureError::BadSprite(0));
        assert_eq!(bank.add_page(vec![0; 10]).unwrap_err(), TextureError::PageSize(10));
        let err = bank
            .add_sprite(SpriteTexture {
                page: 3,
                ..SpriteTexture::default()
            })
            .unwrap_err();
        assert_eq!(err, TextureError::BadPage(3));
    }

    #[test]
    fn depthq_bands() {
        let bank = TextureBank::default();
        let dq = bank.depthq();
        // neutral band is identity, key colour never remaps away from 0
        assert!((0..256).all(|i| dq[NEUTRAL_BAND][i] == i as u8));
        assert!((0..DEPTHQ_BANDS).all(|b| dq[b][0] == 0));
        // grey 128: brighter in band 0, darker in band 31
        assert_eq!(dq[0][128], 255);
        assert_eq!(dq[31][128], 8);
        assert_eq!(dq.for_shade(0x1000)[77], 77);
        assert_eq!(dq.for_shade(0x1FFF)[128], 8);
    }

    #[test]
    fn vga_palette_expands_to_8_bit() {
        let mut rgb = [0u8; 768];
        rgb[3..6].copy_from_slice(&[63, 32, 1]);
        let p = Palette::from_vga(&rgb);
        assert_eq!(p[1], (252 << 16) | (128 << 8) | 4);
    }
}
