//! Object → view → screen for whole vertex lists.
//!
//! Results go into a caller-owned `Vec<PhdVbuf>` that is cleared first; the
//! returned [`ClipFlags`] is the OR over every vertex, or `None` when the AND
//! is non-zero and nothing in the list can be visible.

use glam::IVec3;
use once_cell::sync::Lazy;

use crate::engine::types::{ClipFlags, PhdVbuf, clamp_shade};
use crate::engine::view::ViewState;
use crate::math::{MatrixStack, W2V_SCALE};
use crate::world::room::RoomVertex;

const WIBBLE_SIZE: usize = 32;
const WIBBLE_MASK: i32 = WIBBLE_SIZE as i32 - 1;

/// Screen-space wave: ±2 px.
static WIBBLE_TABLE: Lazy<[f64; WIBBLE_SIZE]> = Lazy::new(|| {
    let mut t = [0.0; WIBBLE_SIZE];
    for (i, w) in t.iter_mut().enumerate() {
        *w = (i as f64 * std::f64::consts::TAU / WIBBLE_SIZE as f64).sin() * 2.0;
    }
    t
});

/// Shade shimmer, a quarter band peak to peak.
static SHADE_TABLE: Lazy<[i32; WIBBLE_SIZE]> = Lazy::new(|| {
    let mut t = [0; WIBBLE_SIZE];
    for (i, s) in t.iter_mut().enumerate() {
        *s = ((i as f64 * std::f64::consts::TAU / WIBBLE_SIZE as f64).sin() * 768.0) as i32;
    }
    t
});

/// Per-vertex phase scramble so neighbouring vertices do not pulse in step.
static RANDOM_TABLE: Lazy<[i32; WIBBLE_SIZE]> = Lazy::new(|| {
    let mut t = [0; WIBBLE_SIZE];
    let mut seed: u32 = 0xD5A7_9E31;
    for r in t.iter_mut() {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
        *r = ((seed >> 16) & WIBBLE_MASK as u32) as i32;
    }
    t
});

#[inline]
fn screen_clip(view: &ViewState, xs: f64, ys: f64) -> ClipFlags {
    let mut clip = ClipFlags::empty();
    if xs < view.left {
        clip |= ClipFlags::LEFT;
    } else if xs > view.right {
        clip |= ClipFlags::RIGHT;
    }
    if ys < view.top {
        clip |= ClipFlags::TOP;
    } else if ys > view.bottom {
        clip |= ClipFlags::BOTTOM;
    }
    clip
}

/// Rotate + translate one point through the top matrix into view units.
#[inline]
fn to_view(ms: &MatrixStack, v: IVec3) -> (f64, f64, f64) {
    let [x, y, z] = ms.top().transform(v);
    let s = W2V_SCALE as f64;
    (x as f64 / s, y as f64 / s, z as f64 / s)
}

/// Project one view-space point: near test, screen position, `rhw`.
#[inline]
fn project_vertex(view: &ViewState, xv: f64, yv: f64, zv: f64) -> PhdVbuf {
    let mut vb = PhdVbuf {
        xv,
        yv,
        zv,
        ..PhdVbuf::default()
    };
    if zv < view.flt_near_z {
        vb.clip = ClipFlags::NEAR;
        return vb;
    }
    let (xs, ys) = view.project(xv, yv, zv);
    vb.xs = xs;
    vb.ys = ys;
    vb.rhw = view.rhw(zv);
    vb
}

/// Transform an object's vertex list through the current matrix.
///
/// With `needs_clip == false` the caller's bounds test has already proven
/// the object lies inside the window, so the edge bits are not computed.
/// Vertices in front of the near plane keep `xs/ys/rhw` at zero.
pub fn transform_object_vertices(
    ms: &MatrixStack,
    view: &ViewState,
    verts: &[IVec3],
    needs_clip: bool,
    out: &mut Vec<PhdVbuf>,
) -> Option<ClipFlags> {
    out.clear();
    out.reserve(verts.len());

    let mut clip_or = ClipFlags::empty();
    let mut clip_and = ClipFlags::all();
    for &v in verts {
        let (xv, yv, zv) = to_view(ms, v);
        let mut vb = project_vertex(view, xv, yv, zv);
        if needs_clip && !vb.clip.contains(ClipFlags::NEAR) {
            vb.clip = screen_clip(view, vb.xs, vb.ys);
            if zv > view.flt_far_z {
                vb.clip |= ClipFlags::FAR;
            }
        }
        clip_or |= vb.clip;
        clip_and &= vb.clip;
        out.push(vb);
    }

    if verts.is_empty() || !clip_and.is_empty() {
        None
    } else {
        Some(clip_or)
    }
}

/// Underwater animation inputs for room vertices.
#[derive(Clone, Copy, Debug)]
pub struct Wibble {
    pub offset: u32,
}

/// Transform a room's vertex list.
///
/// On top of the object path this adds the vertex's stored base shade and
/// depth fog, the underwater shimmer for eligible vertices when `wibble` is
/// set, and `far_clip` on vertices beyond the far distance (pass
/// [`ClipFlags::FAR`] to reject polygons lying entirely past it, or empty).
pub fn transform_room_vertices(
    ms: &MatrixStack,
    view: &ViewState,
    verts: &[RoomVertex],
    far_clip: ClipFlags,
    wibble: Option<Wibble>,
    out: &mut Vec<PhdVbuf>,
) -> Option<ClipFlags> {
    out.clear();
    out.reserve(verts.len());

    let mut clip_or = ClipFlags::empty();
    let mut clip_and = ClipFlags::all();
    for (i, rv) in verts.iter().enumerate() {
        let (xv, yv, zv) = to_view(ms, rv.pos);
        let mut vb = project_vertex(view, xv, yv, zv);

        let mut g = rv.shade as i32;
        if let Some(w) = wibble.filter(|_| rv.wibble) {
            let phase = (w.offset as i32 + RANDOM_TABLE[i & (WIBBLE_SIZE - 1)]) & WIBBLE_MASK;
            g += SHADE_TABLE[phase as usize];
        }
        g += view.calculate_fog_shade(zv);
        vb.g = clamp_shade(g);

        if !vb.clip.contains(ClipFlags::NEAR) {
            if let Some(w) = wibble.filter(|_| rv.wibble) {
                let off = w.offset as i32;
                let (xs, ys) = (vb.xs, vb.ys);
                vb.xs += WIBBLE_TABLE[((off + ys as i32) & WIBBLE_MASK) as usize];
                vb.ys += WIBBLE_TABLE[((off + xs as i32) & WIBBLE_MASK) as usize];
            }
            vb.clip = screen_clip(view, vb.xs, vb.ys);
            if zv > view.flt_far_z {
                vb.clip |= far_clip;
            }
        }

        clip_or |= vb.clip;
        clip_and &= vb.clip;
        out.push(vb);
    }

    if verts.is_empty() || !clip_and.is_empty() {
        None
    } else {
        Some(clip_or)
    }
}
