//! Hardware rasterizer front end.
//!
//! The engine already produced float vertices and per-record state; what is
//! left is ordering and state changes:
//!
//! * the immediate list first, depth-tested and depth-written;
//! * then the sorted list back to front. With a depth buffer it is still
//!   tested, blended records stop writing it; without one both are off.
//!
//! Every state change goes through a [`StateCache`] so a device only sees the
//! ones that actually change something.

pub mod device;

pub use device::SoftDevice;

use crate::engine::polylist::{HwKind, HwPrimitive, HwSource, HwVertex, PolyList, Primitive};
use crate::world::texture::{DrawType, TextureBank};

/// What a 3-D accelerator has to offer the core.
pub trait HwDevice {
    /// Make every page and the palette of `bank` available to [`set_texture`](Self::set_texture).
    fn upload_textures(&mut self, bank: &TextureBank);

    fn set_texture(&mut self, source: HwSource);
    /// Palette index 0 of a page is transparent.
    fn set_color_key(&mut self, on: bool);
    /// Blend by vertex alpha.
    fn set_blend(&mut self, on: bool);
    fn set_z_test(&mut self, on: bool);
    fn set_z_write(&mut self, on: bool);

    fn draw(&mut self, kind: HwKind, verts: &[HwVertex]);
}

/// Full render state of one draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderState {
    pub source: HwSource,
    pub color_key: bool,
    pub blend: bool,
    pub z_test: bool,
    pub z_write: bool,
}

/// Remembers what the device was last told and forwards only differences.
pub struct StateCache<D: HwDevice> {
    device: D,
    current: Option<RenderState>,
    changes: usize,
}

impl<D: HwDevice> StateCache<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            current: None,
            changes: 0,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_inner(self) -> D {
        self.device
    }

    /// State changes forwarded since the last [`invalidate`](Self::invalidate).
    pub fn changes(&self) -> usize {
        self.changes
    }

    /// Forget the cached state; the next [`apply`](Self::apply) sets everything.
    pub fn invalidate(&mut self) {
        self.current = None;
        self.changes = 0;
    }

    pub fn apply(&mut self, want: RenderState) {
        let cur = self.current;
        let d = &mut self.device;
        let mut n = 0;
        if cur.map(|c| c.source) != Some(want.source) {
            d.set_texture(want.source);
            n += 1;
        }
        if cur.map(|c| c.color_key) != Some(want.color_key) {
            d.set_color_key(want.color_key);
            n += 1;
        }
        if cur.map(|c| c.blend) != Some(want.blend) {
            d.set_blend(want.blend);
            n += 1;
        }
        if cur.map(|c| c.z_test) != Some(want.z_test) {
            d.set_z_test(want.z_test);
            n += 1;
        }
        if cur.map(|c| c.z_write) != Some(want.z_write) {
            d.set_z_write(want.z_write);
            n += 1;
        }
        self.changes += n;
        self.current = Some(want);
    }

    pub fn draw(&mut self, kind: HwKind, verts: &[HwVertex]) {
        self.device.draw(kind, verts);
    }
}

/// Walks a poly list's hardware records.
#[derive(Clone, Copy, Debug, Default)]
pub struct HardwareRasterizer {
    pub zbuffer: bool,
}

impl HardwareRasterizer {
    pub fn new(zbuffer: bool) -> Self {
        Self { zbuffer }
    }

    fn state(&self, hw: &HwPrimitive, immediate: bool) -> RenderState {
        let blend = hw.draw == DrawType::SemiTransparent;
        RenderState {
            source: hw.source,
            color_key: hw.draw != DrawType::Opaque && matches!(hw.source, HwSource::Page(_)),
            blend,
            z_test: immediate || self.zbuffer,
            z_write: immediate || (self.zbuffer && !blend),
        }
    }

    pub fn draw_poly_list<D: HwDevice>(&self, pl: &PolyList, cache: &mut StateCache<D>) {
        for prim in pl.immediate() {
            self.draw_record(pl, prim, true, cache);
        }
        for prim in pl.sorted() {
            self.draw_record(pl, prim, false, cache);
        }
    }

    fn draw_record<D: HwDevice>(&self, pl: &PolyList, prim: &Primitive, immediate: bool, cache: &mut StateCache<D>) {
        let Primitive::Hw(hw) = prim else { return };
        let first = hw.first as usize;
        let Some(verts) = pl.hw_verts.get(first..first + hw.count as usize) else {
            log::warn!("hardware record past the vertex buffer ({first}+{})", hw.count);
            return;
        };
        cache.apply(self.state(hw, immediate));
        cache.draw(hw.kind, verts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        textures: Vec<HwSource>,
        z_writes: Vec<bool>,
        draws: Vec<(HwKind, usize)>,
    }

    impl HwDevice for Recorder {
        fn upload_textures(&mut self, _bank: &TextureBank) {}
        fn set_texture(&mut self, source: HwSource) {
            self.textures.push(source);
        }
        fn set_color_key(&mut self, _on: bool) {}
        fn set_blend(&mut self, _on: bool) {}
        fn set_z_test(&mut self, _on: bool) {}
        fn set_z_write(&mut self, on: bool) {
            self.z_writes.push(on);
        }
        fn draw(&mut self, kind: HwKind, verts: &[HwVertex]) {
            self.draws.push((kind, verts.len()));
        }
    }

    fn record(pl: &mut PolyList, source: HwSource, draw: DrawType, n: usize, sort: Option<u32>) {
        let prim = Primitive::Hw(HwPrimitive {
            kind: HwKind::TriangleFan,
            source,
            draw,
            first: pl.hw_verts.len() as u32,
            count: n as u32,
        });
        match sort {
            Some(depth) => pl.push(prim, depth).unwrap(),
            None => pl.push_immediate(prim).unwrap(),
        }
        pl.hw_verts.extend(std::iter::repeat_n(HwVertex::default(), n));
    }

    #[test]
    fn cache_drops_repeated_state() {
        let mut cache = StateCache::new(Recorder::default());
        let s = RenderState {
            source: HwSource::Page(0),
            color_key: false,
            blend: false,
            z_test: true,
            z_write: true,
        };
        cache.apply(s);
        assert_eq!(cache.changes(), 5);
        cache.apply(s);
        cache.apply(RenderState { source: HwSource::Page(1), ..s });
        assert_eq!(cache.changes(), 6);
        assert_eq!(cache.device().textures, vec![HwSource::Page(0), HwSource::Page(1)]);
        cache.invalidate();
        cache.apply(s);
        assert_eq!(cache.changes(), 5);
    }

    #[test]
    fn immediate_before_sorted_and_blend_skips_z_write() {
        let mut pl = PolyList::new(8);
        record(&mut pl, HwSource::Page(0), DrawType::SemiTransparent, 3, Some(10));
        record(&mut pl, HwSource::Page(0), DrawType::Opaque, 4, None);
        record(&mut pl, HwSource::Page(1), DrawType::Opaque, 5, None);
        pl.sort();

        let mut cache = StateCache::new(Recorder::default());
        HardwareRasterizer::new(true).draw_poly_list(&pl, &mut cache);
        let dev = cache.into_inner();
        assert_eq!(
            dev.draws,
            vec![(HwKind::TriangleFan, 4), (HwKind::TriangleFan, 5), (HwKind::TriangleFan, 3)]
        );
        assert_eq!(dev.textures, vec![HwSource::Page(0), HwSource::Page(1), HwSource::Page(0)]);
        assert_eq!(dev.z_writes, vec![true, false]);
    }

    #[test]
    fn sorted_mode_turns_depth_off() {
        let mut pl = PolyList::new(4);
        record(&mut pl, HwSource::Palette(3), DrawType::Opaque, 3, Some(1));
        pl.sort();
        let r = HardwareRasterizer::new(false);
        let st = r.state(&HwPrimitive {
            kind: HwKind::TriangleList,
            source: HwSource::Palette(3),
            draw: DrawType::Opaque,
            first: 0,
            count: 3,
        }, false);
        assert!(!st.z_test && !st.z_write && !st.blend && !st.color_key);

        let mut cache = StateCache::new(Recorder::default());
        r.draw_poly_list(&pl, &mut cache);
        assert_eq!(cache.device().z_writes, vec![false]);
    }

    #[test]
    fn dangling_record_is_skipped() {
        let mut pl = PolyList::new(4);
        pl.push(
            Primitive::Hw(HwPrimitive {
                kind: HwKind::Line,
                source: HwSource::None,
                draw: DrawType::Opaque,
                first: 10,
                count: 2,
            }),
            0,
        )
        .unwrap();
        pl.sort();
        let mut cache = StateCache::new(Recorder::default());
        HardwareRasterizer::new(true).draw_poly_list(&pl, &mut cache);
        assert!(cache.device().draws.is_empty());
    }
}
