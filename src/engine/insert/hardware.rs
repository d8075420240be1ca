//! Records for a hardware rasterizer: float vertices with depth-buffer z,
//! packed colour and normalized UVs.
//!
//! Sorted mode puts every record on the depth-sorted list. Z-buffered mode
//! sends opaque polygons to the immediate list and keeps only what blends
//! (colour-keyed, semi-transparent, shadows, 2-D overlays) sorted.

use smallvec::SmallVec;

use crate::engine::clip::{ShadedVertex, TexturedVertex, XyVertex};
use crate::engine::config::Backend;
use crate::engine::insert::{Cull, Depth, PolygonInserter, ScreenRect};
use crate::engine::polylist::{HwKind, HwPrimitive, HwSource, HwVertex, PolyList, Primitive, RenderError};
use crate::engine::types::MAX_SHADE;
use crate::engine::view::ViewState;
use crate::world::texture::{DrawType, ObjectTexture, PAGE_SIZE, SpriteId, SpriteTexture};

/// Vertex colour of a neutral (unshaded) vertex.
pub const NEUTRAL_COLOR: u32 = 0xFF80_8080;

/// Opaque grey for a 13-bit shade; `0x1000` is neutral (`0x80`), the device
/// modulates `texel * colour / 128`.
pub fn shade_color(g: i32) -> u32 {
    let i = ((MAX_SHADE + 1 - g) >> 5).clamp(0, 255) as u32;
    0xFF00_0000 | i * 0x0001_0101
}

/// Black with alpha growing from zero at the neutral shade to opaque at
/// [`MAX_SHADE`].
pub fn shadow_color(g: i32) -> u32 {
    let a = ((g - 0x1000) >> 4).clamp(0, 255) as u32;
    a << 24
}

type HwVerts = SmallVec<[HwVertex; 8]>;

fn hw_vertex(view: &ViewState, x: f64, y: f64, rhw: f64, color: u32, u: f64, v: f64) -> HwVertex {
    HwVertex {
        x: x as f32,
        y: y as f32,
        z: view.hw_z(rhw) as f32,
        rhw: rhw as f32,
        color,
        u: u as f32,
        v: v as f32,
    }
}

/// `rhw` of a flat overlay at view depth `z`.
fn overlay_rhw(view: &ViewState, z: f64) -> f64 {
    view.rhw(z.max(view.flt_near_z))
}

fn emit(
    polys: &mut PolyList,
    kind: HwKind,
    source: HwSource,
    draw: DrawType,
    verts: &[HwVertex],
    sort: Option<u32>,
) -> Result<(), RenderError> {
    let prim = Primitive::Hw(HwPrimitive {
        kind,
        source,
        draw,
        first: polys.hw_verts.len() as u32,
        count: verts.len() as u32,
    });
    match sort {
        Some(depth) => polys.push(prim, depth)?,
        None => polys.push_immediate(prim)?,
    }
    polys.hw_verts.extend_from_slice(verts);
    Ok(())
}

fn polygon_kind(n: usize) -> HwKind {
    if n > 3 { HwKind::TriangleFan } else { HwKind::TriangleList }
}

fn textured(
    view: &ViewState,
    polys: &mut PolyList,
    poly: &[TexturedVertex],
    tex: &ObjectTexture,
    sort: Option<u32>,
) -> Result<(), RenderError> {
    let scale = 1.0 / PAGE_SIZE as f64;
    let alpha = match tex.draw {
        DrawType::SemiTransparent => 0x8000_0000,
        _ => 0xFF00_0000,
    };
    let verts: HwVerts = poly
        .iter()
        .map(|p| {
            let u = p.u / p.rhw * scale;
            let v = p.v / p.rhw * scale;
            let color = (shade_color(p.g as i32) & 0x00FF_FFFF) | alpha;
            hw_vertex(view, p.x, p.y, p.rhw, color, u, v)
        })
        .collect();
    emit(polys, polygon_kind(verts.len()), HwSource::Page(tex.page), tex.draw, &verts, sort)
}

fn colored(
    view: &ViewState,
    polys: &mut PolyList,
    poly: &[ShadedVertex],
    color: u8,
    sort: Option<u32>,
) -> Result<(), RenderError> {
    let verts: HwVerts = poly
        .iter()
        .map(|p| hw_vertex(view, p.x, p.y, p.rhw, shade_color(p.g as i32), 0.0, 0.0))
        .collect();
    emit(polys, polygon_kind(verts.len()), HwSource::Palette(color), DrawType::Opaque, &verts, sort)
}

fn translucent(view: &ViewState, polys: &mut PolyList, poly: &[XyVertex], g: i32, depth: Depth) -> Result<(), RenderError> {
    let rhw = overlay_rhw(view, depth.z);
    let color = shadow_color(g);
    let verts: HwVerts = poly
        .iter()
        .map(|p| hw_vertex(view, p.x, p.y, rhw, color, 0.0, 0.0))
        .collect();
    emit(
        polys,
        polygon_kind(verts.len()),
        HwSource::None,
        DrawType::SemiTransparent,
        &verts,
        Some(depth.key),
    )
}

fn sort_depth(z: f64) -> u32 {
    z.max(0.0) as u32
}

fn line(
    view: &ViewState,
    polys: &mut PolyList,
    p0: (f64, f64),
    p1: (f64, f64),
    z: f64,
    color: u8,
) -> Result<(), RenderError> {
    let rhw = overlay_rhw(view, z);
    let verts = [
        hw_vertex(view, p0.0, p0.1, rhw, NEUTRAL_COLOR, 0.0, 0.0),
        hw_vertex(view, p1.0, p1.1, rhw, NEUTRAL_COLOR, 0.0, 0.0),
    ];
    emit(
        polys,
        HwKind::Line,
        HwSource::Palette(color),
        DrawType::Opaque,
        &verts,
        Some(sort_depth(z)),
    )
}

fn rect_fan(view: &ViewState, rect: ScreenRect, rhw: f64, color: u32, uv: [(f64, f64); 2]) -> [HwVertex; 4] {
    let [(u0, v0), (u1, v1)] = uv;
    [
        hw_vertex(view, rect.x0, rect.y0, rhw, color, u0, v0),
        hw_vertex(view, rect.x1, rect.y0, rhw, color, u1, v0),
        hw_vertex(view, rect.x1, rect.y1, rhw, color, u1, v1),
        hw_vertex(view, rect.x0, rect.y1, rhw, color, u0, v1),
    ]
}

fn flat_rect(view: &ViewState, polys: &mut PolyList, rect: ScreenRect, z: f64, color: u8) -> Result<(), RenderError> {
    let verts = rect_fan(view, rect, overlay_rhw(view, z), NEUTRAL_COLOR, [(0.0, 0.0); 2]);
    emit(
        polys,
        HwKind::TriangleFan,
        HwSource::Palette(color),
        DrawType::Opaque,
        &verts,
        Some(sort_depth(z)),
    )
}

fn sprite(
    view: &ViewState,
    polys: &mut PolyList,
    rect: ScreenRect,
    z: f64,
    g: i32,
    sprite: &SpriteTexture,
) -> Result<(), RenderError> {
    let page = PAGE_SIZE as f64;
    let u0 = sprite.u as f64 / page;
    let v0 = sprite.v as f64 / page;
    let u1 = (sprite.u as f64 + sprite.width as f64) / page;
    let v1 = (sprite.v as f64 + sprite.height as f64) / page;
    let verts = rect_fan(view, rect, overlay_rhw(view, z), shade_color(g), [(u0, v0), (u1, v1)]);
    emit(
        polys,
        HwKind::TriangleFan,
        HwSource::Page(sprite.page),
        DrawType::ColorKey,
        &verts,
        Some(sort_depth(z)),
    )
}

/// Painter's-algorithm hardware path: everything depth-sorted.
#[derive(Clone, Copy, Debug, Default)]
pub struct HardwareSorted;

impl PolygonInserter for HardwareSorted {
    fn backend(&self) -> Backend {
        Backend::HardwareSorted
    }

    fn textured(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        poly: &[TexturedVertex],
        tex: &ObjectTexture,
        depth: Depth,
    ) -> Result<(), RenderError> {
        textured(view, polys, poly, tex, Some(depth.key))
    }

    fn colored(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        poly: &[ShadedVertex],
        color: u8,
        depth: Depth,
    ) -> Result<(), RenderError> {
        colored(view, polys, poly, color, Some(depth.key))
    }

    fn translucent(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        poly: &[XyVertex],
        g: i32,
        depth: Depth,
    ) -> Result<(), RenderError> {
        translucent(view, polys, poly, g, depth)
    }

    fn line(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        p0: (f64, f64),
        p1: (f64, f64),
        z: f64,
        color: u8,
    ) -> Result<(), RenderError> {
        line(view, polys, p0, p1, z, color)
    }

    fn flat_rect(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        rect: ScreenRect,
        z: f64,
        color: u8,
    ) -> Result<(), RenderError> {
        flat_rect(view, polys, rect, z, color)
    }

    fn sprite(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        rect: ScreenRect,
        z: f64,
        g: i32,
        _id: SpriteId,
        sprite_tex: &SpriteTexture,
    ) -> Result<(), RenderError> {
        sprite(view, polys, rect, z, g, sprite_tex)
    }
}

/// Depth-buffered hardware path.
///
/// Quads are culled per half so a non-planar quad keeps its visible
/// triangle; opaque surfaces skip the sort entirely.
#[derive(Clone, Copy, Debug, Default)]
pub struct HardwareZBuffered;

impl PolygonInserter for HardwareZBuffered {
    fn backend(&self) -> Backend {
        Backend::HardwareZBuffered
    }

    fn quad_cull(&self) -> Cull {
        Cull::SplitQuad
    }

    fn textured(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        poly: &[TexturedVertex],
        tex: &ObjectTexture,
        depth: Depth,
    ) -> Result<(), RenderError> {
        let sort = (tex.draw != DrawType::Opaque).then_some(depth.key);
        textured(view, polys, poly, tex, sort)
    }

    fn colored(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        poly: &[ShadedVertex],
        color: u8,
        _depth: Depth,
    ) -> Result<(), RenderError> {
        colored(view, polys, poly, color, None)
    }

    fn translucent(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        poly: &[XyVertex],
        g: i32,
        depth: Depth,
    ) -> Result<(), RenderError> {
        translucent(view, polys, poly, g, depth)
    }

    fn line(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        p0: (f64, f64),
        p1: (f64, f64),
        z: f64,
        color: u8,
    ) -> Result<(), RenderError> {
        line(view, polys, p0, p1, z, color)
    }

    fn flat_rect(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        rect: ScreenRect,
        z: f64,
        color: u8,
    ) -> Result<(), RenderError> {
        flat_rect(view, polys, rect, z, color)
    }

    fn sprite(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        rect: ScreenRect,
        z: f64,
        g: i32,
        _id: SpriteId,
        sprite_tex: &SpriteTexture,
    ) -> Result<(), RenderError> {
        sprite(view, polys, rect, z, g, sprite_tex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::polylist::PolyType;

    fn depth(z: f64) -> Depth {
        Depth { key: z as u32, z }
    }

    fn tri(rhw: f64) -> [TexturedVertex; 3] {
        let t = |x, u| TexturedVertex {
            x,
            y: x * 0.5,
            rhw,
            g: 0x1000 as f64,
            u: u * rhw,
            v: 64.0 * rhw,
        };
        [t(10.0, 0.0), t(100.0, 128.0), t(40.0, 256.0)]
    }

    #[test]
    fn shade_colour_ramp() {
        assert_eq!(shade_color(0x1000), 0xFF80_8080);
        assert_eq!(shade_color(0), 0xFFFF_FFFF);
        assert_eq!(shade_color(MAX_SHADE), 0xFF00_0000);
        assert_eq!(shadow_color(0x1000), 0);
        assert_eq!(shadow_color(MAX_SHADE) >> 24, 0xFF);
    }

    #[test]
    fn textured_vertices_are_normalized() {
        let view = ViewState::default();
        let mut pl = PolyList::new(4);
        let rhw = view.rhw(1000.0);
        HardwareSorted
            .textured(&view, &mut pl, &tri(rhw), &ObjectTexture::default(), depth(1000.0))
            .unwrap();
        assert_eq!(pl.get(0).unwrap().poly_type(), PolyType::HwList);
        assert_eq!(pl.sort_items().len(), 1);
        let v = &pl.hw_verts;
        assert_eq!(v.len(), 3);
        assert!((v[1].u - 0.5).abs() < 1e-5);
        assert!((v[2].u - 1.0).abs() < 1e-5);
        assert!((v[0].v - 0.25).abs() < 1e-5);
        assert_eq!(v[0].color, NEUTRAL_COLOR);
        assert!(v[0].z > 0.0 && v[0].z < 1.0);
    }

    #[test]
    fn nearer_vertices_get_smaller_z() {
        let view = ViewState::default();
        let mut pl = PolyList::new(4);
        for z in [500.0, 5000.0] {
            HardwareSorted
                .textured(&view, &mut pl, &tri(view.rhw(z)), &ObjectTexture::default(), depth(z))
                .unwrap();
        }
        assert!(pl.hw_verts[0].z < pl.hw_verts[3].z);
    }

    #[test]
    fn zbuffer_sorts_only_blended_records() {
        let view = ViewState::default();
        let mut pl = PolyList::new(16);
        let ins = HardwareZBuffered;
        let rhw = view.rhw(1000.0);
        let semi = ObjectTexture {
            draw: DrawType::SemiTransparent,
            ..ObjectTexture::default()
        };
        ins.textured(&view, &mut pl, &tri(rhw), &ObjectTexture::default(), depth(1000.0)).unwrap();
        ins.textured(&view, &mut pl, &tri(rhw), &semi, depth(1000.0)).unwrap();
        let shaded: Vec<ShadedVertex> = tri(rhw)
            .iter()
            .map(|t| ShadedVertex { x: t.x, y: t.y, rhw: t.rhw, g: t.g })
            .collect();
        ins.colored(&view, &mut pl, &shaded, 7, depth(1000.0)).unwrap();
        let xy: Vec<XyVertex> = shaded.iter().map(|s| XyVertex { x: s.x, y: s.y }).collect();
        ins.translucent(&view, &mut pl, &xy, 0x1800, depth(1000.0)).unwrap();

        assert_eq!(pl.immediate_len(), 2);
        assert_eq!(pl.sort_items().len(), 2);
        assert_eq!(pl.hw_verts.len(), 12);
        match pl.get(3).unwrap() {
            Primitive::Hw(hw) => {
                assert_eq!(hw.draw, DrawType::SemiTransparent);
                assert_eq!(hw.source, HwSource::None);
                assert_eq!((hw.first, hw.count), (9, 3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn overlays_are_sorted_with_uvs() {
        let view = ViewState::default();
        let mut pl = PolyList::new(8);
        let rect = ScreenRect { x0: 10.0, y0: 20.0, x1: 74.0, y1: 52.0 };
        let spr = SpriteTexture {
            page: 2,
            u: 64,
            v: 128,
            width: 64,
            height: 32,
            ..SpriteTexture::default()
        };
        HardwareZBuffered.sprite(&view, &mut pl, rect, 800.0, 0x1000, 0, &spr).unwrap();
        HardwareZBuffered.line(&view, &mut pl, (0.0, 0.0), (5.0, 5.0), 100.0, 3).unwrap();
        HardwareZBuffered.flat_rect(&view, &mut pl, rect, 50.0, 4).unwrap();
        assert_eq!(pl.immediate_len(), 0);
        assert_eq!(pl.sort_items().len(), 3);
        assert_eq!(pl.get(1).unwrap().poly_type(), PolyType::HwLine);

        let v = &pl.hw_verts;
        assert_eq!(v.len(), 4 + 2 + 4);
        assert!((v[0].u - 0.25).abs() < 1e-6 && (v[0].v - 0.5).abs() < 1e-6);
        assert!((v[2].u - 0.5).abs() < 1e-6 && (v[2].v - 0.625).abs() < 1e-6);
        assert_eq!((v[2].x, v[2].y), (74.0, 52.0));
    }

    #[test]
    fn full_list_leaves_no_orphan_vertices() {
        let view = ViewState::default();
        let mut pl = PolyList::new(1);
        let rhw = view.rhw(1000.0);
        let tex = ObjectTexture::default();
        HardwareSorted.textured(&view, &mut pl, &tri(rhw), &tex, depth(1.0)).unwrap();
        assert!(HardwareSorted.textured(&view, &mut pl, &tri(rhw), &tex, depth(1.0)).is_err());
        assert_eq!(pl.hw_verts.len(), 3);
    }
}
