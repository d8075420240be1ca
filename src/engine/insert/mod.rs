//! Polygon insertion: reject, cull, clip, then hand off to a backend.
//!
//! Every polygon goes through the same three tiers:
//!
//! 1. AND of the corner clip codes non-zero → dropped.
//! 2. No corner behind the near plane → screen-space facing test, then the
//!    edge clipper if any edge bit is set in the OR.
//! 3. Some corner behind the near plane → view-space facing test, near
//!    clipper, then the edge clipper on its output.
//!
//! What survives is emitted by the active [`PolygonInserter`]: software
//! records, sorted hardware vertices, or z-buffered hardware vertices.

pub mod hardware;
pub mod software;

pub use hardware::{HardwareSorted, HardwareZBuffered, shade_color};
pub use software::Software;

use smallvec::SmallVec;

use crate::engine::clip::{
    ClipBuf, ClipVertex, NearVertex, ShadedVertex, TexturedVertex, XyVertex, clip_near_plane, clip_or_and,
    clip_screen_edges, is_front_facing, is_front_facing_view,
};
use crate::engine::config::{Backend, RenderConfig};
use crate::engine::polylist::{PolyList, RenderError};
use crate::engine::types::{ClipFlags, PhdVbuf, SortMetric};
use crate::engine::view::ViewState;
use crate::world::texture::{ObjectTexture, SpriteId, SpriteTexture};

/// Sort depth plus the depth the perspective cut-off compares against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Depth {
    pub key: u32,
    pub z: f64,
}

impl Depth {
    pub fn of(metric: SortMetric, zs: impl Iterator<Item = f64> + Clone) -> Self {
        let (key, z) = metric.depth(zs);
        Self { key, z }
    }
}

/// Screen rectangle, pixel edges, `x1` / `y1` exclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

/// Which facing test a polygon gets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cull {
    /// First three corners must wind front-facing.
    FirstThree,
    /// Quads: each half `(0,1,2)` / `(0,2,3)` tested on its own, the
    /// back-facing half dropped.
    SplitQuad,
    /// No facing test (shadows, overlays that share a host's test).
    None,
}

/// Emission strategy, picked once per `init_window`.
///
/// Implementations receive polygons that are already clipped and known to
/// be visible; they only decide the record format and the list it goes on.
pub trait PolygonInserter {
    fn backend(&self) -> Backend;

    /// Facing test applied to quads by this backend.
    fn quad_cull(&self) -> Cull {
        Cull::FirstThree
    }

    fn textured(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        poly: &[TexturedVertex],
        tex: &ObjectTexture,
        depth: Depth,
    ) -> Result<(), RenderError>;

    fn colored(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        poly: &[ShadedVertex],
        color: u8,
        depth: Depth,
    ) -> Result<(), RenderError>;

    /// Darken whatever is behind `poly` by shade `g`.
    fn translucent(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        poly: &[XyVertex],
        g: i32,
        depth: Depth,
    ) -> Result<(), RenderError>;

    fn line(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        p0: (f64, f64),
        p1: (f64, f64),
        z: f64,
        color: u8,
    ) -> Result<(), RenderError>;

    fn flat_rect(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        rect: ScreenRect,
        z: f64,
        color: u8,
    ) -> Result<(), RenderError>;

    #[allow(clippy::too_many_arguments)]
    fn sprite(
        &self,
        view: &ViewState,
        polys: &mut PolyList,
        rect: ScreenRect,
        z: f64,
        g: i32,
        id: SpriteId,
        sprite: &SpriteTexture,
    ) -> Result<(), RenderError>;
}

/// Inserter for `cfg`.
pub fn make_inserter(cfg: &RenderConfig) -> Box<dyn PolygonInserter> {
    match cfg.backend() {
        Backend::Software => Box::new(Software::new(cfg.perspective_distance)),
        Backend::HardwareSorted => Box::new(HardwareSorted),
        Backend::HardwareZBuffered => Box::new(HardwareZBuffered),
    }
}

/*──────────────────────── shared pipeline ─────────────────────────*/

/// Run the reject / cull / clip tiers over `corners` (indices into `vbuf`).
///
/// `uv(i)` returns texel UVs for corner slot `i`. Returns the screen-space
/// polygon ready for emission, or `None` when nothing is visible.
pub fn prepare<V: ClipVertex>(
    view: &ViewState,
    vbuf: &[PhdVbuf],
    corners: &[u16],
    uv: impl Fn(usize) -> (f64, f64),
    cull: Cull,
    metric: SortMetric,
) -> Option<(ClipBuf<V>, Depth)> {
    // a corner outside the vertex buffer drops the whole polygon
    let pts = corners
        .iter()
        .map(|&c| vbuf.get(c as usize))
        .collect::<Option<SmallVec<[&PhdVbuf; 8]>>>()?;
    if pts.len() < 3 {
        return None;
    }
    let vb = |slot: usize| pts[slot];

    let (clip_or, clip_and) = clip_or_and(pts.iter().copied());
    if !clip_and.is_empty() {
        return None;
    }

    let mut slots: SmallVec<[usize; 8]> = (0..corners.len()).collect();

    let poly = if !clip_or.contains(ClipFlags::NEAR) {
        let scr = |s: usize| (vb(s).xs, vb(s).ys);
        match cull {
            Cull::SplitQuad if slots.len() == 4 => {
                let first = is_front_facing(scr(0), scr(1), scr(2));
                let second = is_front_facing(scr(0), scr(2), scr(3));
                match (first, second) {
                    (true, true) => {}
                    (true, false) => slots.truncate(3),
                    (false, true) => slots = SmallVec::from_slice(&[0, 2, 3]),
                    (false, false) => return None,
                }
            }
            Cull::FirstThree | Cull::SplitQuad => {
                if !is_front_facing(scr(0), scr(1), scr(2)) {
                    return None;
                }
            }
            Cull::None => {}
        }

        let poly: ClipBuf<V> = slots
            .iter()
            .map(|&s| {
                let (u, v) = uv(s);
                V::from_textured(&TexturedVertex::from_vbuf(vb(s), u, v))
            })
            .collect();
        if clip_or.intersects(ClipFlags::EDGES) {
            clip_screen_edges(&poly, view)
        } else {
            poly
        }
    } else {
        if cull != Cull::None && !is_front_facing_view(vb(0), vb(1), vb(2)) {
            return None;
        }
        let near: SmallVec<[NearVertex<'_>; 8]> = slots
            .iter()
            .map(|&s| {
                let (u, v) = uv(s);
                NearVertex { vb: vb(s), u, v }
            })
            .collect();
        let poly: ClipBuf<V> = clip_near_plane(&near, view);
        if poly.is_empty() {
            return None;
        }
        clip_screen_edges(&poly, view)
    };

    if poly.is_empty() {
        return None;
    }
    let depth = Depth::of(metric, slots.iter().map(|&s| vb(s).zv));
    Some((poly, depth))
}

/// Textured quad or triangle.
pub fn insert_textured(
    ins: &dyn PolygonInserter,
    view: &ViewState,
    polys: &mut PolyList,
    vbuf: &[PhdVbuf],
    corners: &[u16],
    tex: &ObjectTexture,
    metric: SortMetric,
) -> Result<(), RenderError> {
    insert_textured_with(ins, view, polys, vbuf, corners, tex, |s| tex.uv_f(s), metric)
}

/// Textured quad or triangle whose corner UVs (texels) come from `uv`
/// instead of the texture descriptor; used by environment-mapped overlays.
#[allow(clippy::too_many_arguments)]
pub fn insert_textured_with(
    ins: &dyn PolygonInserter,
    view: &ViewState,
    polys: &mut PolyList,
    vbuf: &[PhdVbuf],
    corners: &[u16],
    tex: &ObjectTexture,
    uv: impl Fn(usize) -> (f64, f64),
    metric: SortMetric,
) -> Result<(), RenderError> {
    let cull = if corners.len() == 4 {
        ins.quad_cull()
    } else {
        Cull::FirstThree
    };
    match prepare::<TexturedVertex>(view, vbuf, corners, uv, cull, metric) {
        Some((poly, depth)) => ins.textured(view, polys, &poly, tex, depth),
        None => Ok(()),
    }
}

/// Gouraud-coloured quad or triangle.
pub fn insert_colored(
    ins: &dyn PolygonInserter,
    view: &ViewState,
    polys: &mut PolyList,
    vbuf: &[PhdVbuf],
    corners: &[u16],
    color: u8,
    metric: SortMetric,
) -> Result<(), RenderError> {
    let cull = if corners.len() == 4 {
        ins.quad_cull()
    } else {
        Cull::FirstThree
    };
    match prepare::<ShadedVertex>(view, vbuf, corners, |_| (0.0, 0.0), cull, metric) {
        Some((poly, depth)) => ins.colored(view, polys, &poly, color, depth),
        None => Ok(()),
    }
}

/// Translucent silhouette over every vertex of `vbuf`, in order.
pub fn insert_translucent(
    ins: &dyn PolygonInserter,
    view: &ViewState,
    polys: &mut PolyList,
    vbuf: &[PhdVbuf],
    g: i32,
    metric: SortMetric,
) -> Result<(), RenderError> {
    let corners: SmallVec<[u16; 32]> = (0..vbuf.len() as u16).collect();
    match prepare::<XyVertex>(view, vbuf, &corners, |_| (0.0, 0.0), Cull::None, metric) {
        Some((poly, depth)) => ins.translucent(view, polys, &poly, g, depth),
        None => Ok(()),
    }
}
