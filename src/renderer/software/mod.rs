//! Scanline software rasterizer.
//!
//! Walks a sorted [`PolyList`] back to front and draws every software
//! record into an 8-bit [`Surface`]: edge table first, then one span per
//! scanline. Shading goes through the bank's depth-cue table, colour-keyed
//! textures skip index 0. Hardware records are ignored.

pub mod edges;
pub mod spans;

use crate::engine::polylist::{AffineVertex, PerspVertex, PolyList, Primitive, ShadeVertex};
use crate::renderer::software::edges::{EdgeTable, EdgeVertex};
use crate::renderer::software::spans::{AffineSpan, PerspSpan, limits};
use crate::renderer::{ClipRect, Surface};
use crate::world::texture::{DrawType, SpriteTexture, TextureBank};

/// Reusable edge tables, one per attribute set.
pub struct Software {
    flat: EdgeTable<0>,
    gouraud: EdgeTable<1>,
    affine: EdgeTable<3>,
    persp: EdgeTable<4>,
}

impl Software {
    pub fn new(height: usize) -> Self {
        Self {
            flat: EdgeTable::new(height),
            gouraud: EdgeTable::new(height),
            affine: EdgeTable::new(height),
            persp: EdgeTable::new(height),
        }
    }

    fn ensure_height(&mut self, height: usize) {
        if self.flat.height() < height {
            *self = Self::new(height);
        }
    }

    /// Draw every record: the immediate list first, then the sorted order.
    pub fn draw_poly_list(&mut self, pl: &PolyList, bank: &TextureBank, surface: &mut Surface) {
        self.ensure_height(surface.height());
        for prim in pl.immediate().chain(pl.sorted()) {
            self.draw(prim, bank, surface);
        }
    }

    fn draw(&mut self, prim: &Primitive, bank: &TextureBank, s: &mut Surface) {
        let win = s.window();
        match prim {
            Primitive::Line { x0, y0, x1, y1, color } => draw_line(s, win, (*x0, *y0), (*x1, *y1), *color),
            Primitive::FlatRect { x0, y0, x1, y1, color } => {
                let (cx0, cx1) = ((*x0).max(win.x0), (*x1).min(win.x1));
                for y in (*y0).max(win.y0)..(*y1).min(win.y1) {
                    if cx0 < cx1 {
                        spans::flat(s.row_mut(y as usize), cx0, cx1, *color);
                    }
                }
            }
            Primitive::Flat { color, verts } => {
                let Some(first) = verts.first() else { return };
                let c = bank.depthq().for_shade(first.g)[*color as usize];
                let ev: Vec<EdgeVertex<0>> = verts.iter().map(|v| EdgeVertex { x: v.x, y: v.y, a: [] }).collect();
                let Some((y0, y1)) = self.flat.build(&ev, win.y0, win.y1) else { return };
                for y in y0..y1 {
                    let (l, r) = self.flat.span(y);
                    if let Some((x0, x1, _)) = limits(l.x, r.x, win.x0, win.x1) {
                        spans::flat(s.row_mut(y as usize), x0, x1, c);
                    }
                }
            }
            Primitive::Gouraud { color, verts } => {
                let ev = shade_verts(verts);
                let Some((y0, y1)) = self.gouraud.build(&ev, win.y0, win.y1) else { return };
                for y in y0..y1 {
                    let (l, r) = self.gouraud.span(y);
                    let Some((x0, x1, skip)) = limits(l.x, r.x, win.x0, win.x1) else { continue };
                    let dg = (r.a[0] - l.a[0]) / (r.x - l.x);
                    let g = l.a[0] + dg * skip;
                    spans::gouraud(s.row_mut(y as usize), x0, x1, *color, g, dg, bank.depthq());
                }
            }
            Primitive::Translucent { g, verts } => {
                let remap = bank.depthq().for_shade(*g);
                let ev: Vec<EdgeVertex<0>> = verts.iter().map(|v| EdgeVertex { x: v.x, y: v.y, a: [] }).collect();
                let Some((y0, y1)) = self.flat.build(&ev, win.y0, win.y1) else { return };
                for y in y0..y1 {
                    let (l, r) = self.flat.span(y);
                    if let Some((x0, x1, _)) = limits(l.x, r.x, win.x0, win.x1) {
                        spans::translucent(s.row_mut(y as usize), x0, x1, remap);
                    }
                }
            }
            Primitive::Affine { page, draw, verts } => {
                let Ok(page) = bank.page(*page) else { return };
                let keyed = *draw != DrawType::Opaque;
                let ev = affine_verts(verts);
                let Some((y0, y1)) = self.affine.build(&ev, win.y0, win.y1) else { return };
                for y in y0..y1 {
                    let (l, r) = self.affine.span(y);
                    let Some((x0, x1, skip)) = limits(l.x, r.x, win.x0, win.x1) else { continue };
                    let inv = 1.0 / (r.x - l.x);
                    let d = |k: usize| (r.a[k] - l.a[k]) * inv;
                    let (dg, du, dv) = (d(0), d(1), d(2));
                    let span = AffineSpan {
                        g: l.a[0] + dg * skip,
                        u: l.a[1] + du * skip,
                        v: l.a[2] + dv * skip,
                        dg,
                        du,
                        dv,
                    };
                    spans::affine(s.row_mut(y as usize), x0, x1, span, page, keyed, bank.depthq());
                }
            }
            Primitive::Persp { page, draw, verts } => {
                let Ok(page) = bank.page(*page) else { return };
                let keyed = *draw != DrawType::Opaque;
                let ev = persp_verts(verts);
                let Some((y0, y1)) = self.persp.build(&ev, win.y0, win.y1) else { return };
                for y in y0..y1 {
                    let (l, r) = self.persp.span(y);
                    let Some((x0, x1, skip)) = limits(l.x, r.x, win.x0, win.x1) else { continue };
                    let inv = 1.0 / (r.x - l.x);
                    let d = |k: usize| (r.a[k] - l.a[k]) * inv;
                    let (dg, duw, dvw, dw) = (d(0), d(1), d(2), d(3));
                    let span = PerspSpan {
                        g: l.a[0] + dg * skip,
                        uw: l.a[1] + duw * skip,
                        vw: l.a[2] + dvw * skip,
                        w: l.a[3] + dw * skip,
                        dg,
                        duw,
                        dvw,
                        dw,
                    };
                    spans::persp(s.row_mut(y as usize), x0, x1, span, page, keyed, bank.depthq());
                }
            }
            Primitive::Sprite { x0, y0, x1, y1, g, sprite } => {
                let Ok(spr) = bank.sprite(*sprite) else { return };
                let Ok(page) = bank.page(spr.page) else { return };
                draw_sprite(s, win, (*x0, *y0, *x1, *y1), spr, page, bank.depthq().for_shade(*g));
            }
            Primitive::Hw(_) => {}
        }
    }
}

/// One-shot draw with fresh scratch.
pub fn draw_poly_list(pl: &PolyList, bank: &TextureBank, surface: &mut Surface) {
    Software::new(surface.height()).draw_poly_list(pl, bank, surface);
}

fn shade_verts(verts: &[ShadeVertex]) -> Vec<EdgeVertex<1>> {
    verts
        .iter()
        .map(|v| EdgeVertex { x: v.x, y: v.y, a: [v.g as f32] })
        .collect()
}

fn affine_verts(verts: &[AffineVertex]) -> Vec<EdgeVertex<3>> {
    const ONE: f32 = 65536.0;
    verts
        .iter()
        .map(|v| EdgeVertex {
            x: v.x,
            y: v.y,
            a: [v.g as f32, v.u as f32 / ONE, v.v as f32 / ONE],
        })
        .collect()
}

fn persp_verts(verts: &[PerspVertex]) -> Vec<EdgeVertex<4>> {
    verts
        .iter()
        .map(|v| EdgeVertex {
            x: v.x,
            y: v.y,
            a: [v.g as f32, v.u, v.v, v.rhw],
        })
        .collect()
}

/// Liang–Barsky: cut the segment to the window, then step it.
fn draw_line(s: &mut Surface, win: ClipRect, p0: (i32, i32), p1: (i32, i32), color: u8) {
    let (x0, y0) = (p0.0 as f32, p0.1 as f32);
    let (dx, dy) = ((p1.0 - p0.0) as f32, (p1.1 - p0.1) as f32);
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    let bounds = [
        (-dx, x0 - win.x0 as f32),
        (dx, (win.x1 - 1) as f32 - x0),
        (-dy, y0 - win.y0 as f32),
        (dy, (win.y1 - 1) as f32 - y0),
    ];
    for (p, q) in bounds {
        if p == 0.0 {
            if q < 0.0 {
                return;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return;
        }
    }
    let clamp_x = |v: f32| (v.round() as i32).clamp(win.x0, win.x1 - 1);
    let clamp_y = |v: f32| (v.round() as i32).clamp(win.y0, win.y1 - 1);
    let (ax, ay) = (clamp_x(x0 + dx * t0), clamp_y(y0 + dy * t0));
    let (bx, by) = (clamp_x(x0 + dx * t1), clamp_y(y0 + dy * t1));
    spans::line(&mut |x, y| s.set(x as usize, y as usize, color), ax, ay, bx, by);
}

/// Scaled blit of a sprite's texel rectangle into `rect`, colour-keyed.
fn draw_sprite(s: &mut Surface, win: ClipRect, rect: (i32, i32, i32, i32), spr: &SpriteTexture, page: &[u8], remap: &[u8; 256]) {
    let (x0, y0, x1, y1) = rect;
    if x1 <= x0 || y1 <= y0 {
        return;
    }
    let du = spr.width as f32 / (x1 - x0) as f32;
    let dv = spr.height as f32 / (y1 - y0) as f32;
    for y in y0.max(win.y0)..y1.min(win.y1) {
        let v = spr.v as usize + ((y - y0) as f32 * dv) as usize;
        let src = &page[(v & 0xFF) * 256..(v & 0xFF) * 256 + 256];
        let row = s.row_mut(y as usize);
        for x in x0.max(win.x0)..x1.min(win.x1) {
            let u = spr.u as usize + ((x - x0) as f32 * du) as usize;
            let t = src[u & 0xFF];
            if t != 0 {
                row[x as usize] = remap[t as usize];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::polylist::{PolyVerts, ShadeVertex};
    use crate::world::texture::{COLOR_KEY, PAGE_SIZE, PAGE_TEXELS, Palette};

    fn list(prims: Vec<Primitive>) -> PolyList {
        let mut pl = PolyList::new(16);
        for (i, p) in prims.into_iter().enumerate() {
            pl.push(p, 100 - i as u32).unwrap();
        }
        pl.sort();
        pl
    }

    fn sv(x: i32, y: i32, g: i32) -> ShadeVertex {
        ShadeVertex { x, y, g }
    }

    fn square(x0: i32, y0: i32, x1: i32, y1: i32, g: i32) -> PolyVerts<ShadeVertex> {
        PolyVerts::from_slice(&[sv(x0, y0, g), sv(x1, y0, g), sv(x1, y1, g), sv(x0, y1, g)])
    }

    #[test]
    fn flat_square_fills_exact_pixels() {
        let bank = TextureBank::default();
        let mut s = Surface::new(32, 32);
        let pl = list(vec![Primitive::Flat { color: 7, verts: square(4, 4, 12, 10, 0x1000) }]);
        draw_poly_list(&pl, &bank, &mut s);
        let lit = s.pixels().iter().filter(|&&p| p == 7).count();
        assert_eq!(lit, 8 * 6);
        assert_eq!(s.get(4, 4), 7);
        assert_eq!(s.get(12, 4), 0);
        assert_eq!(s.get(4, 10), 0);
    }

    #[test]
    fn later_records_paint_over() {
        let bank = TextureBank::default();
        let mut s = Surface::new(32, 32);
        let pl = list(vec![
            Primitive::Flat { color: 1, verts: square(0, 0, 20, 20, 0x1000) },
            Primitive::Flat { color: 2, verts: square(5, 5, 10, 10, 0x1000) },
        ]);
        draw_poly_list(&pl, &bank, &mut s);
        assert_eq!(s.get(6, 6), 2);
        assert_eq!(s.get(15, 15), 1);
    }

    #[test]
    fn translucent_darkens_through_depthq() {
        let bank = TextureBank::default();
        let mut s = Surface::new(16, 16);
        s.clear(200);
        let pl = list(vec![Primitive::Translucent { g: 0x1800, verts: square(0, 0, 8, 8, 0) }]);
        draw_poly_list(&pl, &bank, &mut s);
        let dark = bank.depthq().for_shade(0x1800)[200];
        assert!(dark < 200);
        assert_eq!(s.get(2, 2), dark);
        assert_eq!(s.get(12, 12), 200);
    }

    #[test]
    fn gouraud_ramps_left_to_right() {
        let bank = TextureBank::default();
        let mut s = Surface::new(64, 8);
        let verts = PolyVerts::from_slice(&[sv(0, 0, 0x0000), sv(64, 0, 0x1F00), sv(64, 8, 0x1F00), sv(0, 8, 0x0000)]);
        let pl = list(vec![Primitive::Gouraud { color: 128, verts }]);
        draw_poly_list(&pl, &bank, &mut s);
        assert!(s.get(2, 4) > s.get(60, 4));
    }

    #[test]
    fn line_is_cut_to_window() {
        let bank = TextureBank::default();
        let mut s = Surface::new(20, 20);
        s.set_window(5, 5, 10, 10);
        let pl = list(vec![Primitive::Line { x0: 0, y0: 10, x1: 30, y1: 10, color: 9 }]);
        draw_poly_list(&pl, &bank, &mut s);
        let row: Vec<u8> = (0..20).map(|x| s.get(x, 10)).collect();
        assert_eq!(row.iter().filter(|&&p| p == 9).count(), 10);
        assert_eq!((row[4], row[5], row[14], row[15]), (0, 9, 9, 0));
    }

    #[test]
    fn sprite_blit_is_keyed_and_scaled() {
        let mut bank = TextureBank::new(Palette::grayscale());
        let mut texels = vec![0u8; PAGE_TEXELS];
        // 4x4 sprite, left half key
        for y in 0..4 {
            for x in 2..4 {
                texels[y * PAGE_SIZE + x] = 50;
            }
        }
        let page = bank.add_page(texels).unwrap();
        let id = bank
            .add_sprite(SpriteTexture { page, width: 4, height: 4, ..SpriteTexture::default() })
            .unwrap();
        let mut s = Surface::new(16, 16);
        s.clear(3);
        let pl = list(vec![Primitive::Sprite { x0: 0, y0: 0, x1: 8, y1: 8, g: 0x1000, sprite: id }]);
        draw_poly_list(&pl, &bank, &mut s);
        assert_eq!(s.get(1, 1), 3);
        assert_ne!(COLOR_KEY, 50);
        assert_eq!(s.get(5, 5), 50);
        assert_eq!(s.get(9, 5), 3);
    }

    #[test]
    fn checker_quad_textures_both_ways() {
        let bank = TextureBank::default_with_checker();
        let quad = |x: i32| {
            [(x, 0, 0, 0), (x + 64, 0, 64, 0), (x + 64, 64, 64, 64), (x, 64, 0, 64)]
        };
        let affine: PolyVerts<AffineVertex> = quad(0)
            .iter()
            .map(|&(x, y, u, v)| AffineVertex { x, y, g: 0x1000, u: u << 16, v: v << 16 })
            .collect();
        let persp: PolyVerts<PerspVertex> = quad(100)
            .iter()
            .map(|&(x, y, u, v)| PerspVertex { x, y, g: 0x1000, rhw: 0.5, u: u as f32 * 0.5, v: v as f32 * 0.5 })
            .collect();
        let pl = list(vec![
            Primitive::Affine { page: 0, draw: DrawType::Opaque, verts: affine },
            Primitive::Persp { page: 0, draw: DrawType::Opaque, verts: persp },
        ]);
        let mut s = Surface::new(200, 64);
        draw_poly_list(&pl, &bank, &mut s);
        // checker squares are 32 texels, light first
        assert_eq!(s.get(10, 10), 200);
        assert_eq!(s.get(40, 10), 90);
        assert_eq!(s.get(110, 10), 200);
        assert_eq!(s.get(140, 10), 90);
        assert_eq!(s.get(170, 10), 0);
    }
}
