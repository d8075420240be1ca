//! Frame-scoped primitive store and its depth sort.
//!
//! Insertion appends a [`Primitive`] plus a [`SortItem`]; `sort` orders the
//! items back to front; the rasterizer walks them. Everything is reset by
//! `init` at the start of the next frame.

use smallvec::SmallVec;

use crate::world::texture::{DrawType, TextureError};

/// Vertex storage of one record; clipped polygons may spill to the heap.
pub type PolyVerts<V> = SmallVec<[V; 8]>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RenderError {
    /// More primitives this frame than the poly list was sized for.
    #[error("poly list full ({0} primitives); frame truncated")]
    ResourceExhausted(usize),

    /// Geometry referenced a texture the bank does not hold.
    #[error(transparent)]
    Texture(#[from] TextureError),
}

/// Screen corner with shade, for flat and gouraud fills.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadeVertex {
    pub x: i32,
    pub y: i32,
    pub g: i32,
}

/// Affine textured corner; `u`, `v` are texels in 16.16.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AffineVertex {
    pub x: i32,
    pub y: i32,
    pub g: i32,
    pub u: i32,
    pub v: i32,
}

/// Perspective-correct corner; `u`, `v` are texels pre-multiplied by `rhw`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PerspVertex {
    pub x: i32,
    pub y: i32,
    pub g: i32,
    pub rhw: f32,
    pub u: f32,
    pub v: f32,
}

/// One vertex of the hardware vertex buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HwVertex {
    pub x: f32,
    pub y: f32,
    /// Depth-buffer value, `0.005 ..= 0.995` between near and far.
    pub z: f32,
    pub rhw: f32,
    /// `0xAARRGGBB`.
    pub color: u32,
    /// Normalized page coordinates.
    pub u: f32,
    pub v: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwKind {
    TriangleFan,
    TriangleList,
    Line,
}

/// What a hardware primitive samples before the vertex colour modulates it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwSource {
    Page(u16),
    /// Solid palette entry.
    Palette(u8),
    /// Vertex colour only.
    None,
}

/// Hardware draw record: a slice of [`PolyList::hw_verts`] plus render state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HwPrimitive {
    pub kind: HwKind,
    pub source: HwSource,
    pub draw: DrawType,
    pub first: u32,
    pub count: u32,
}

/// Type tag every record can report; what the draw loop dispatches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PolyType {
    Line,
    FlatRect,
    Flat,
    Gouraud,
    Translucent,
    Affine,
    AffineColorKey,
    Persp,
    PerspColorKey,
    Sprite,
    HwFan,
    HwList,
    HwLine,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Line {
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        color: u8,
    },
    FlatRect {
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        color: u8,
    },
    /// Evenly lit: one depth-cued colour for the whole polygon.
    Flat { color: u8, verts: PolyVerts<ShadeVertex> },
    Gouraud { color: u8, verts: PolyVerts<ShadeVertex> },
    /// Darkens what is already on screen by `g` (shadows).
    Translucent { g: i32, verts: PolyVerts<ShadeVertex> },
    Affine {
        page: u16,
        draw: DrawType,
        verts: PolyVerts<AffineVertex>,
    },
    Persp {
        page: u16,
        draw: DrawType,
        verts: PolyVerts<PerspVertex>,
    },
    /// Scaled, shaded, colour-keyed blit of a sprite texture.
    Sprite {
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        g: i32,
        sprite: u16,
    },
    Hw(HwPrimitive),
}

impl Primitive {
    pub fn poly_type(&self) -> PolyType {
        let keyed = |d: &DrawType| *d != DrawType::Opaque;
        match self {
            Primitive::Line { .. } => PolyType::Line,
            Primitive::FlatRect { .. } => PolyType::FlatRect,
            Primitive::Flat { .. } => PolyType::Flat,
            Primitive::Gouraud { .. } => PolyType::Gouraud,
            Primitive::Translucent { .. } => PolyType::Translucent,
            Primitive::Affine { draw, .. } if keyed(draw) => PolyType::AffineColorKey,
            Primitive::Affine { .. } => PolyType::Affine,
            Primitive::Persp { draw, .. } if keyed(draw) => PolyType::PerspColorKey,
            Primitive::Persp { .. } => PolyType::Persp,
            Primitive::Sprite { .. } => PolyType::Sprite,
            Primitive::Hw(hw) => match hw.kind {
                HwKind::TriangleFan => PolyType::HwFan,
                HwKind::TriangleList => PolyType::HwList,
                HwKind::Line => PolyType::HwLine,
            },
        }
    }

    /// Vertex count of polygon records; 0 for the others.
    pub fn vertex_count(&self) -> usize {
        match self {
            Primitive::Flat { verts, .. }
            | Primitive::Gouraud { verts, .. }
            | Primitive::Translucent { verts, .. } => verts.len(),
            Primitive::Affine { verts, .. } => verts.len(),
            Primitive::Persp { verts, .. } => verts.len(),
            Primitive::Hw(hw) => hw.count as usize,
            _ => 0,
        }
    }
}

/// `(record index, key)`; larger keys draw first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortItem {
    pub index: u32,
    pub key: u64,
}

/// Combine a mid-sort band with a depth into one key.
#[inline]
pub fn sort_key(band: u32, depth: u32) -> u64 {
    ((band as u64) << 32) | depth as u64
}

#[derive(Debug)]
pub struct PolyList {
    prims: Vec<Primitive>,
    sort: Vec<SortItem>,
    /// Opaque z-buffered records, drawn unsorted before the sorted list.
    immediate: Vec<u32>,
    pub hw_verts: Vec<HwVertex>,
    capacity: usize,
    mid_sort: u32,
    overflowed: bool,
}

impl PolyList {
    pub fn new(capacity: usize) -> Self {
        Self {
            prims: Vec::with_capacity(capacity),
            sort: Vec::with_capacity(capacity),
            immediate: Vec::new(),
            hw_verts: Vec::with_capacity(capacity * 4),
            capacity,
            mid_sort: 0,
            overflowed: false,
        }
    }

    /// Frame start: drop every record and vertex.
    pub fn init(&mut self) {
        self.prims.clear();
        self.sort.clear();
        self.immediate.clear();
        self.hw_verts.clear();
        self.mid_sort = 0;
        self.overflowed = false;
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    /// Band stamped into the high half of every following key.
    pub fn set_mid_sort(&mut self, band: u32) {
        self.mid_sort = band;
    }

    pub fn mid_sort(&self) -> u32 {
        self.mid_sort
    }

    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    fn reserve_slot(&mut self) -> Result<u32, RenderError> {
        if self.prims.len() >= self.capacity {
            if !self.overflowed {
                log::warn!("poly list full at {} primitives, truncating frame", self.capacity);
                self.overflowed = true;
            }
            return Err(RenderError::ResourceExhausted(self.capacity));
        }
        Ok(self.prims.len() as u32)
    }

    /// Append a depth-sorted record.
    pub fn push(&mut self, prim: Primitive, depth: u32) -> Result<(), RenderError> {
        let index = self.reserve_slot()?;
        self.prims.push(prim);
        self.sort.push(SortItem {
            index,
            key: sort_key(self.mid_sort, depth),
        });
        Ok(())
    }

    /// Append a record drawn before, and independent of, the sorted list.
    pub fn push_immediate(&mut self, prim: Primitive) -> Result<(), RenderError> {
        let index = self.reserve_slot()?;
        self.prims.push(prim);
        self.immediate.push(index);
        Ok(())
    }

    /// Back to front: keys descending, insertion order among equal keys.
    pub fn sort(&mut self) {
        self.sort
            .sort_unstable_by(|a, b| b.key.cmp(&a.key).then(a.index.cmp(&b.index)));
    }

    pub fn sort_items(&self) -> &[SortItem] {
        &self.sort
    }

    pub fn get(&self, index: u32) -> Option<&Primitive> {
        self.prims.get(index as usize)
    }

    /// Sorted records in draw order.
    pub fn sorted(&self) -> impl Iterator<Item = &Primitive> + '_ {
        self.sort.iter().map(move |s| &self.prims[s.index as usize])
    }

    pub fn immediate(&self) -> impl Iterator<Item = &Primitive> + '_ {
        self.immediate.iter().map(move |&i| &self.prims[i as usize])
    }

    pub fn immediate_len(&self) -> usize {
        self.immediate.len()
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;

    fn line(tag: i32) -> Primitive {
        Primitive::Line {
            x0: tag,
            y0: 0,
            x1: 0,
            y1: 0,
            color: 1,
        }
    }

    fn tag(p: &Primitive) -> i32 {
        match p {
            Primitive::Line { x0, .. } => *x0,
            _ => unreachable!(),
        }
    }

    #[test]
    fn sort_is_descending_and_stable() {
        let mut pl = PolyList::new(16);
        for (i, depth) in [5, 5, 3, 8].into_iter().enumerate() {
            pl.push(line(i as i32), depth).unwrap();
        }
        pl.sort();
        let order: Vec<i32> = pl.sorted().map(tag).collect();
        assert_eq!(order, vec![3, 0, 1, 2]);
        let keys: Vec<u64> = pl.sort_items().iter().map(|s| s.key).collect();
        assert!(keys.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn mid_sort_band_dominates_depth() {
        let mut pl = PolyList::new(16);
        pl.set_mid_sort(1);
        pl.push(line(0), 10).unwrap();
        pl.set_mid_sort(2);
        pl.push(line(1), 1).unwrap();
        pl.sort();
        let order: Vec<i32> = pl.sorted().map(tag).collect();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn many_equal_keys_keep_insertion_order() {
        let mut pl = PolyList::new(1000);
        for i in 0..500 {
            pl.push(line(i), (i % 3) as u32).unwrap();
        }
        pl.sort();
        let order: Vec<i32> = pl.sorted().map(tag).collect();
        for w in order.windows(2) {
            let (a, b) = (w[0], w[1]);
            if a % 3 == b % 3 {
                assert!(a < b);
            } else {
                assert!(a % 3 > b % 3);
            }
        }
    }

    #[test]
    fn overflow_is_reported_and_truncates() {
        let mut pl = PolyList::new(2);
        pl.push(line(0), 0).unwrap();
        pl.push_immediate(line(1)).unwrap();
        assert_eq!(pl.push(line(2), 0), Err(RenderError::ResourceExhausted(2)));
        assert_eq!(pl.push_immediate(line(3)), Err(RenderError::ResourceExhausted(2)));
        assert!(pl.overflowed());
        assert_eq!(pl.len(), 2);
        assert_eq!(pl.immediate_len(), 1);

        pl.init();
        assert!(pl.is_empty());
        assert!(!pl.overflowed());
        pl.push(line(4), 0).unwrap();
    }

    #[test]
    fn poly_type_tags() {
        let affine = Primitive::Affine {
            page: 0,
            draw: DrawType::ColorKey,
            verts: PolyVerts::new(),
        };
        assert_eq!(affine.poly_type(), PolyType::AffineColorKey);
        let persp = Primitive::Persp {
            page: 0,
            draw: DrawType::Opaque,
            verts: PolyVerts::new(),
        };
        assert_eq!(persp.poly_type(), PolyType::Persp);
        assert_eq!(line(0).poly_type(), PolyType::Line);
    }
}
