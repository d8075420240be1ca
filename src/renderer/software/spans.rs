//! Horizontal span fillers. Each writes `[x0, x1)` of one scanline row.

use crate::world::texture::{COLOR_KEY, DepthQTable, PAGE_SIZE};

/// Pixels between true perspective divides.
pub const PERSP_BATCH: i32 = 32;

/// Below this per-pixel texel step the perspective filler writes each
/// sampled texel to two pixels. The error is at most this many texels.
pub const DOUBLE_PIXEL_STEP: f32 = 0.25;

const PAGE_MASK: i32 = PAGE_SIZE as i32 - 1;

#[inline]
fn texel(page: &[u8], u: f32, v: f32) -> u8 {
    let u = (u as i32) & PAGE_MASK;
    let v = (v as i32) & PAGE_MASK;
    page[(v * PAGE_SIZE as i32 + u) as usize]
}

/// Span limits from the two edge x values.
#[inline]
pub fn limits(xl: f32, xr: f32, x_min: i32, x_max: i32) -> Option<(i32, i32, f32)> {
    let x0 = xl.round() as i32;
    let x1 = xr.round() as i32;
    if x1 <= x0 {
        return None;
    }
    // attributes are stepped from the unclipped left end
    let skip = (x_min - x0).max(0) as f32;
    let (c0, c1) = (x0.max(x_min), x1.min(x_max));
    (c0 < c1).then_some((c0, c1, skip))
}

pub fn flat(row: &mut [u8], x0: i32, x1: i32, color: u8) {
    row[x0 as usize..x1 as usize].fill(color);
}

pub fn gouraud(row: &mut [u8], x0: i32, x1: i32, color: u8, g: f32, dg: f32, depthq: &DepthQTable) {
    let mut g = g;
    for px in &mut row[x0 as usize..x1 as usize] {
        *px = depthq.for_shade(g as i32)[color as usize];
        g += dg;
    }
}

/// Remap what is already there through shade `g`.
pub fn translucent(row: &mut [u8], x0: i32, x1: i32, remap: &[u8; 256]) {
    for px in &mut row[x0 as usize..x1 as usize] {
        *px = remap[*px as usize];
    }
}

/// Shade / u / v stepped linearly.
#[derive(Clone, Copy, Debug)]
pub struct AffineSpan {
    pub g: f32,
    pub u: f32,
    pub v: f32,
    pub dg: f32,
    pub du: f32,
    pub dv: f32,
}

pub fn affine(row: &mut [u8], x0: i32, x1: i32, s: AffineSpan, page: &[u8], keyed: bool, depthq: &DepthQTable) {
    let AffineSpan { mut g, mut u, mut v, dg, du, dv } = s;
    for px in &mut row[x0 as usize..x1 as usize] {
        let t = texel(page, u, v);
        if !(keyed && t == COLOR_KEY) {
            *px = depthq.for_shade(g as i32)[t as usize];
        }
        g += dg;
        u += du;
        v += dv;
    }
}

/// Shade plus `u·rhw`, `v·rhw`, `rhw`, all stepped linearly.
#[derive(Clone, Copy, Debug)]
pub struct PerspSpan {
    pub g: f32,
    pub uw: f32,
    pub vw: f32,
    pub w: f32,
    pub dg: f32,
    pub duw: f32,
    pub dvw: f32,
    pub dw: f32,
}

/// Perspective-correct fill.
///
/// `u` and `v` are divided out exactly every [`PERSP_BATCH`] pixels and
/// interpolated linearly in between. When a batch steps less than
/// [`DOUBLE_PIXEL_STEP`] texels per pixel, pixels are written in pairs from
/// one sample: an approximation, off by at most that step.
pub fn persp(row: &mut [u8], x0: i32, x1: i32, s: PerspSpan, page: &[u8], keyed: bool, depthq: &DepthQTable) {
    let PerspSpan { mut g, mut uw, mut vw, mut w, dg, duw, dvw, dw } = s;
    let mut x = x0;
    let mut u = uw / w;
    let mut v = vw / w;
    while x < x1 {
        let n = (x1 - x).min(PERSP_BATCH);
        let nf = n as f32;
        uw += duw * nf;
        vw += dvw * nf;
        w += dw * nf;
        let (u_end, v_end) = (uw / w, vw / w);
        let du = (u_end - u) / nf;
        let dv = (v_end - v) / nf;
        let step = if du.abs() < DOUBLE_PIXEL_STEP && dv.abs() < DOUBLE_PIXEL_STEP { 2 } else { 1 };

        let end = x + n;
        while x < end {
            let t = texel(page, u, v);
            let color = depthq.for_shade(g as i32)[t as usize];
            let run = step.min(end - x);
            if !(keyed && t == COLOR_KEY) {
                row[x as usize..(x + run) as usize].fill(color);
            }
            let k = run as f32;
            g += dg * k;
            u += du * k;
            v += dv * k;
            x += run;
        }
        u = u_end;
        v = v_end;
    }
}

/// Bresenham from `(x0, y0)` to `(x1, y1)`, both ends inclusive and already
/// inside the surface.
pub fn line(plot: &mut impl FnMut(i32, i32), x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let (mut x, mut y, mut err) = (x0, y0, dx + dy);
    loop {
        plot(x, y);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
