//! Polygon clipping against the near plane and the window edges.
//!
//! Both clippers are Sutherland–Hodgman walks over a vertex loop. Scratch
//! lives in `SmallVec`s local to each call; nothing survives a call.
//!
//! Vertex attributes are interpolated linearly in *screen* space. Texture
//! coordinates travel pre-multiplied by `rhw` so that linear interpolation
//! of `(u·rhw, v·rhw, rhw)` stays perspective-correct.

use smallvec::SmallVec;

use crate::engine::types::{ClipFlags, PhdVbuf};
use crate::engine::view::ViewState;

/// Inline capacity of every clip scratch buffer.
pub const CLIP_CAPACITY: usize = 32;

pub type ClipBuf<V> = SmallVec<[V; CLIP_CAPACITY]>;

/// Attribute set carried through the clippers.
pub trait ClipVertex: Copy {
    fn x(&self) -> f64;
    fn y(&self) -> f64;
    fn set_x(&mut self, x: f64);
    fn set_y(&mut self, y: f64);
    /// `self + (other - self) * t` over every attribute.
    fn lerp(&self, other: &Self, t: f64) -> Self;
    /// Narrow a full vertex to this attribute set.
    fn from_textured(v: &TexturedVertex) -> Self;
}

/// Position only: flat and translucent polygons.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct XyVertex {
    pub x: f64,
    pub y: f64,
}

/// Position, `rhw` and shade: gouraud polygons.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShadedVertex {
    pub x: f64,
    pub y: f64,
    pub rhw: f64,
    pub g: f64,
}

/// Position, `rhw`, shade and `u·rhw`, `v·rhw` in texels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TexturedVertex {
    pub x: f64,
    pub y: f64,
    pub rhw: f64,
    pub g: f64,
    pub u: f64,
    pub v: f64,
}

#[inline(always)]
fn mix(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

impl ClipVertex for XyVertex {
    fn x(&self) -> f64 {
        self.x
    }
    fn y(&self) -> f64 {
        self.y
    }
    fn set_x(&mut self, x: f64) {
        self.x = x;
    }
    fn set_y(&mut self, y: f64) {
        self.y = y;
    }
    fn lerp(&self, o: &Self, t: f64) -> Self {
        Self {
            x: mix(self.x, o.x, t),
            y: mix(self.y, o.y, t),
        }
    }
    fn from_textured(v: &TexturedVertex) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl ClipVertex for ShadedVertex {
    fn x(&self) -> f64 {
        self.x
    }
    fn y(&self) -> f64 {
        self.y
    }
    fn set_x(&mut self, x: f64) {
        self.x = x;
    }
    fn set_y(&mut self, y: f64) {
        self.y = y;
    }
    fn lerp(&self, o: &Self, t: f64) -> Self {
        Self {
            x: mix(self.x, o.x, t),
            y: mix(self.y, o.y, t),
            rhw: mix(self.rhw, o.rhw, t),
            g: mix(self.g, o.g, t),
        }
    }
    fn from_textured(v: &TexturedVertex) -> Self {
        Self {
            x: v.x,
            y: v.y,
            rhw: v.rhw,
            g: v.g,
        }
    }
}

impl ClipVertex for TexturedVertex {
    fn x(&self) -> f64 {
        self.x
    }
    fn y(&self) -> f64 {
        self.y
    }
    fn set_x(&mut self, x: f64) {
        self.x = x;
    }
    fn set_y(&mut self, y: f64) {
        self.y = y;
    }
    fn lerp(&self, o: &Self, t: f64) -> Self {
        Self {
            x: mix(self.x, o.x, t),
            y: mix(self.y, o.y, t),
            rhw: mix(self.rhw, o.rhw, t),
            g: mix(self.g, o.g, t),
            u: mix(self.u, o.u, t),
            v: mix(self.v, o.v, t),
        }
    }
    fn from_textured(v: &TexturedVertex) -> Self {
        *v
    }
}

impl TexturedVertex {
    /// Screen-space vertex from a projected vertex buffer entry and plain texel UVs.
    pub fn from_vbuf(vb: &PhdVbuf, u: f64, v: f64) -> Self {
        Self {
            x: vb.xs,
            y: vb.ys,
            rhw: vb.rhw,
            g: vb.g as f64,
            u: u * vb.rhw,
            v: v * vb.rhw,
        }
    }
}

/*──────────────────────── reject / facing ─────────────────────────*/

/// `(OR, AND)` of the clip codes of `vs`.
pub fn clip_or_and<'a>(vs: impl IntoIterator<Item = &'a PhdVbuf>) -> (ClipFlags, ClipFlags) {
    vs.into_iter()
        .fold((ClipFlags::empty(), ClipFlags::all()), |(or, and), v| (or | v.clip, and & v.clip))
}

/// Screen-space winding test: clockwise in y-down screen space is front.
#[inline]
pub fn is_front_facing(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> bool {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0) > 0.0
}

/// View-space winding test for polygons whose screen coordinates are not
/// valid yet; same sign as [`is_front_facing`] on the projected points.
#[inline]
pub fn is_front_facing_view(a: &PhdVbuf, b: &PhdVbuf, c: &PhdVbuf) -> bool {
    let (cx, cy, cz) = (
        b.yv * c.zv - b.zv * c.yv,
        b.zv * c.xv - b.xv * c.zv,
        b.xv * c.yv - b.yv * c.xv,
    );
    a.xv * cx + a.yv * cy + a.zv * cz > 0.0
}

/*──────────────────────── screen edges ────────────────────────────*/

#[derive(Clone, Copy, Debug)]
enum Edge {
    Left(f64),
    Right(f64),
    Top(f64),
    Bottom(f64),
}

impl Edge {
    /// Signed distance, `>= 0` on the kept side.
    #[inline]
    fn dist<V: ClipVertex>(self, v: &V) -> f64 {
        match self {
            Edge::Left(b) => v.x() - b,
            Edge::Right(b) => b - v.x(),
            Edge::Top(b) => v.y() - b,
            Edge::Bottom(b) => b - v.y(),
        }
    }

    #[inline]
    fn snap<V: ClipVertex>(self, v: &mut V) {
        match self {
            Edge::Left(b) | Edge::Right(b) => v.set_x(b),
            Edge::Top(b) | Edge::Bottom(b) => v.set_y(b),
        }
    }
}

fn clip_edge<V: ClipVertex>(input: &[V], edge: Edge) -> ClipBuf<V> {
    let mut out = ClipBuf::new();
    let n = input.len();
    for i in 0..n {
        let a = &input[i];
        let b = &input[(i + 1) % n];
        let (da, db) = (edge.dist(a), edge.dist(b));
        if da >= 0.0 {
            out.push(*a);
        }
        if (da >= 0.0) != (db >= 0.0) {
            let mut p = a.lerp(b, da / (da - db));
            edge.snap(&mut p);
            out.push(p);
        }
    }
    out
}

/// Clip a screen-space polygon to the window: the horizontal edges first,
/// then the vertical ones. Fewer than three survivors means nothing to draw
/// and an empty buffer comes back.
pub fn clip_screen_edges<V: ClipVertex>(input: &[V], view: &ViewState) -> ClipBuf<V> {
    let mut poly: ClipBuf<V> = input.iter().copied().collect();
    for edge in [
        Edge::Left(view.left),
        Edge::Right(view.right),
        Edge::Top(view.top),
        Edge::Bottom(view.bottom),
    ] {
        if poly.iter().all(|v| edge.dist(v) >= 0.0) {
            continue;
        }
        poly = clip_edge(&poly, edge);
        if poly.len() < 3 {
            poly.clear();
            break;
        }
    }
    poly
}

/*──────────────────────── near plane ──────────────────────────────*/

/// A polygon corner as the near clipper sees it: the transformed vertex and
/// its texel UVs (zero for untextured polygons).
#[derive(Clone, Copy, Debug)]
pub struct NearVertex<'a> {
    pub vb: &'a PhdVbuf,
    pub u: f64,
    pub v: f64,
}

/// Clip a polygon against `zv == near` and project the result.
///
/// Corners in front of the plane keep their projection; every edge crossing
/// the plane gets a vertex synthesized on it, projected with the near-plane
/// scale. Those projections may land far off screen; the window clip that
/// follows cuts them back along the original edge.
pub fn clip_near_plane<V: ClipVertex>(input: &[NearVertex<'_>], view: &ViewState) -> ClipBuf<V> {
    let near = view.flt_near_z;
    let near_rhw = view.rhw(near);
    let mut out = ClipBuf::new();

    let n = input.len();
    for i in 0..n {
        let a = &input[i];
        let b = &input[(i + 1) % n];
        let (da, db) = (a.vb.zv - near, b.vb.zv - near);

        if da >= 0.0 {
            out.push(V::from_textured(&TexturedVertex::from_vbuf(a.vb, a.u, a.v)));
        }
        if (da >= 0.0) != (db >= 0.0) {
            let t = da / (da - db);
            let xv = mix(a.vb.xv, b.vb.xv, t);
            let yv = mix(a.vb.yv, b.vb.yv, t);
            let tv = TexturedVertex {
                x: view.center_x + xv * view.persp_o_near_z,
                y: view.center_y + yv * view.persp_o_near_z,
                rhw: near_rhw,
                g: mix(a.vb.g as f64, b.vb.g as f64, t),
                u: mix(a.u, b.u, t) * near_rhw,
                v: mix(a.v, b.v, t) * near_rhw,
            };
            out.push(V::from_textured(&tv));
        }
    }

    if out.len() < 3 {
        out.clear();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{RenderConfig, WindowParams};

    fn view() -> ViewState {
        let mut v = ViewState::default();
        v.init_window(&WindowParams::fullscreen(640, 480), &RenderConfig::default());
        v
    }

    fn tv(x: f64, y: f64, u: f64, g: f64) -> TexturedVertex {
        TexturedVertex {
            x,
            y,
            rhw: 1.0,
            g,
            u,
            v: 2.0 * u,
        }
    }

    #[test]
    fn inside_polygon_is_untouched() {
        let v = view();
        let tri = [tv(10.0, 10.0, 0.0, 0.0), tv(100.0, 10.0, 1.0, 0.0), tv(50.0, 90.0, 2.0, 0.0)];
        let out = clip_screen_edges(&tri, &v);
        assert_eq!(out.as_slice(), &tri);
    }

    #[test]
    fn left_edge_interpolates_attributes() {
        let v = view();
        // two corners left of x = 0, one inside; u and g grow with x
        let tri = [
            tv(-100.0, 0.0, 0.0, 0.0),
            tv(100.0, 50.0, 200.0, 1000.0),
            tv(-100.0, 100.0, 0.0, 0.0),
        ];
        let out = clip_screen_edges(&tri, &v);
        assert_eq!(out.len(), 3);

        let on_edge: Vec<_> = out.iter().filter(|p| p.x == 0.0).collect();
        assert_eq!(on_edge.len(), 2);
        for p in on_edge {
            // crossing at t = 0.5 along both cut edges
            assert!((p.u - 100.0).abs() < 1e-9);
            assert!((p.v - 200.0).abs() < 1e-9);
            assert!((p.g - 500.0).abs() < 1e-9);
            assert!((p.y - 25.0).abs() < 1e-9 || (p.y - 75.0).abs() < 1e-9);
        }
    }

    #[test]
    fn corner_straddle_adds_vertices() {
        let v = view();
        let quad = [
            XyVertex { x: -50.0, y: -50.0 },
            XyVertex { x: 50.0, y: -50.0 },
            XyVertex { x: 50.0, y: 50.0 },
            XyVertex { x: -50.0, y: 50.0 },
        ];
        let out = clip_screen_edges(&quad, &v);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|p| p.x >= 0.0 && p.y >= 0.0));
    }

    #[test]
    fn many_sided_polygon_spills_and_clips() {
        let v = view();
        let ring: Vec<XyVertex> = (0..48)
            .map(|i| {
                let a = i as f64 * std::f64::consts::TAU / 48.0;
                XyVertex {
                    x: 40.0 * a.cos(),
                    y: 240.0 + 100.0 * a.sin(),
                }
            })
            .collect();
        let out = clip_screen_edges(&ring, &v);
        assert!(out.len() > CLIP_CAPACITY / 2);
        assert!(out.iter().all(|p| p.x >= 0.0));
        assert_eq!(out.iter().filter(|p| p.x == 0.0).count(), 2);

        let whole: Vec<XyVertex> = ring.iter().map(|p| XyVertex { x: p.x + 320.0, y: p.y }).collect();
        let out = clip_screen_edges(&whole, &v);
        assert!(out.spilled());
        assert_eq!(out.as_slice(), whole.as_slice());
    }

    #[test]
    fn fully_outside_collapses() {
        let v = view();
        let tri = [
            XyVertex { x: -50.0, y: 10.0 },
            XyVertex { x: -10.0, y: 10.0 },
            XyVertex { x: -30.0, y: 40.0 },
        ];
        assert!(clip_screen_edges(&tri, &v).is_empty());
    }

    fn vbuf(view: &ViewState, xv: f64, yv: f64, zv: f64) -> PhdVbuf {
        let mut vb = PhdVbuf {
            xv,
            yv,
            zv,
            g: 0x1000,
            ..PhdVbuf::default()
        };
        if zv < view.flt_near_z {
            vb.clip = ClipFlags::NEAR;
        } else {
            (vb.xs, vb.ys) = view.project(xv, yv, zv);
            vb.rhw = view.rhw(zv);
        }
        vb
    }

    #[test]
    fn near_clip_one_behind() {
        let v = view();
        let a = vbuf(&v, -100.0, -100.0, 500.0);
        let b = vbuf(&v, 100.0, -100.0, 500.0);
        let c = vbuf(&v, 0.0, 100.0, 0.0);
        assert!(is_front_facing_view(&a, &b, &c));

        let input = [
            NearVertex { vb: &a, u: 0.0, v: 0.0 },
            NearVertex { vb: &b, u: 64.0, v: 0.0 },
            NearVertex { vb: &c, u: 32.0, v: 64.0 },
        ];
        let out: ClipBuf<TexturedVertex> = clip_near_plane(&input, &v);
        assert_eq!(out.len(), 4);
        for p in &out {
            assert!(p.x.is_finite() && p.y.is_finite());
            assert!(p.rhw > 0.0);
        }

        // synthesized corner on b → c sits on the near plane
        let t = (500.0 - v.flt_near_z) / 500.0;
        let xv = 100.0 - 100.0 * t;
        let expect_x = v.center_x + xv * v.persp / v.flt_near_z;
        assert!((out[2].x - expect_x).abs() < 1e-6);
        assert!((out[2].u / out[2].rhw - (64.0 - 32.0 * t)).abs() < 1e-6);
    }

    #[test]
    fn near_clip_two_behind_or_all_behind() {
        let v = view();
        let a = vbuf(&v, -100.0, -100.0, 500.0);
        let b = vbuf(&v, 100.0, -100.0, 5.0);
        let c = vbuf(&v, 0.0, 100.0, 1.0);
        let input = [
            NearVertex { vb: &a, u: 0.0, v: 0.0 },
            NearVertex { vb: &b, u: 0.0, v: 0.0 },
            NearVertex { vb: &c, u: 0.0, v: 0.0 },
        ];
        let out: ClipBuf<ShadedVertex> = clip_near_plane(&input, &v);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|p| p.x.is_finite() && p.y.is_finite() && p.rhw > 0.0));

        let behind = [
            NearVertex { vb: &b, u: 0.0, v: 0.0 },
            NearVertex { vb: &c, u: 0.0, v: 0.0 },
            NearVertex { vb: &b, u: 0.0, v: 0.0 },
        ];
        assert!(clip_near_plane::<XyVertex>(&behind, &v).is_empty());
    }

    #[test]
    fn near_clip_far_off_screen_stays_on_edge() {
        let mut v = view();
        v.set_field_of_view(crate::math::degrees(80.0));
        let a = vbuf(&v, 0.0, 400.0, 2000.0);
        let b = vbuf(&v, 3000.0, 600.0, 0.0);
        let c = vbuf(&v, 0.0, 600.0, 2000.0);
        let input = [
            NearVertex { vb: &a, u: 0.0, v: 0.0 },
            NearVertex { vb: &b, u: 0.0, v: 0.0 },
            NearVertex { vb: &c, u: 0.0, v: 0.0 },
        ];

        // where a -> b pierces the near plane, projected
        let near = v.flt_near_z;
        let t = (2000.0 - near) / 2000.0;
        let (px, py) = v.project(3000.0 * t, 400.0 + 200.0 * t, near);
        assert!(px > 10.0 * v.right);

        let near_poly: ClipBuf<XyVertex> = clip_near_plane(&input, &v);
        assert_eq!(near_poly.len(), 4);
        assert!(near_poly.iter().any(|p| (p.x - px).abs() < 1e-6 && (p.y - py).abs() < 1e-6));

        // the projected a -> b line crosses the right window edge here
        let expect_y = a.ys + (py - a.ys) * (v.right - a.xs) / (px - a.xs);
        let out = clip_screen_edges(&near_poly, &v);
        let on_right: Vec<_> = out.iter().filter(|p| p.x == v.right).collect();
        assert_eq!(on_right.len(), 2);
        assert!(on_right.iter().any(|p| (p.y - expect_y).abs() < 1e-6));
        assert!(out.iter().all(|p| p.x >= v.left && p.x <= v.right && p.y >= v.top && p.y <= v.bottom));
    }

    #[test]
    fn facing_tests_agree() {
        let v = view();
        let a = vbuf(&v, -100.0, -100.0, 900.0);
        let b = vbuf(&v, 100.0, -80.0, 700.0);
        let c = vbuf(&v, 30.0, 120.0, 800.0);
        let scr = |p: &PhdVbuf| (p.xs, p.ys);
        assert!(is_front_facing(scr(&a), scr(&b), scr(&c)));
        assert!(is_front_facing_view(&a, &b, &c));
        assert!(!is_front_facing(scr(&a), scr(&c), scr(&b)));
        assert!(!is_front_facing_view(&a, &c, &b));
    }
}
