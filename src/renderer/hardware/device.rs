//! Reference [`HwDevice`]: a 32-bit colour buffer plus a float depth buffer,
//! filled the way a fixed-function card would.
//!
//! Triangles are rasterized by barycentric coverage at pixel centres with
//! `rhw`-corrected texture coordinates. The texel is modulated by the vertex
//! colour (`0x80` is 1.0), depth compares less-or-equal.

use crate::engine::polylist::{HwKind, HwSource, HwVertex};
use crate::renderer::Rgba;
use crate::renderer::hardware::HwDevice;
use crate::world::texture::{COLOR_KEY, PAGE_SIZE, Palette, TextureBank};

const OPAQUE_BLACK: Rgba = 0xFF00_0000;

pub struct SoftDevice {
    width: usize,
    height: usize,
    color: Vec<Rgba>,
    depth: Vec<f32>,
    pages: Vec<Box<[u8]>>,
    palette: Palette,

    source: HwSource,
    color_key: bool,
    blend: bool,
    z_test: bool,
    z_write: bool,
}

impl SoftDevice {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            color: vec![OPAQUE_BLACK; width * height],
            depth: vec![1.0; width * height],
            pages: Vec::new(),
            palette: Palette::default(),
            source: HwSource::None,
            color_key: false,
            blend: false,
            z_test: false,
            z_write: false,
        }
    }

    /// Resize if needed, then clear colour to black and depth to far.
    pub fn begin_frame(&mut self, width: usize, height: usize) {
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.color.resize(width * height, OPAQUE_BLACK);
            self.depth.resize(width * height, 1.0);
        }
        self.clear(OPAQUE_BLACK);
    }

    /// Hand the finished frame to `submit(buffer, width, height)`.
    pub fn end_frame<F>(&mut self, submit: F)
    where
        F: FnOnce(&[Rgba], usize, usize),
    {
        submit(&self.color, self.width, self.height);
    }

    pub fn clear(&mut self, color: Rgba) {
        self.color.fill(color);
        self.depth.fill(1.0);
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Rgba {
        self.color[y * self.width + x]
    }

    #[inline]
    pub fn depth_at(&self, x: usize, y: usize) -> f32 {
        self.depth[y * self.width + x]
    }

    /// Base colour for normalized `(u, v)`; `None` where the key punches a hole.
    fn sample(&self, u: f32, v: f32) -> Option<u32> {
        match self.source {
            HwSource::Page(id) => {
                let page = self.pages.get(id as usize)?;
                let tx = (u * PAGE_SIZE as f32).floor() as i32 & 0xFF;
                let ty = (v * PAGE_SIZE as f32).floor() as i32 & 0xFF;
                let idx = page[ty as usize * PAGE_SIZE + tx as usize];
                if self.color_key && idx == COLOR_KEY {
                    return None;
                }
                Some(self.palette[idx as usize])
            }
            HwSource::Palette(idx) => Some(self.palette[idx as usize]),
            HwSource::None => Some(0x0080_8080),
        }
    }

    /// Write one fragment through depth test, blend and depth write.
    fn plot(&mut self, x: usize, y: usize, z: f32, src: Rgba) {
        let i = y * self.width + x;
        if self.z_test && z > self.depth[i] {
            return;
        }
        self.color[i] = if self.blend {
            blend(src, self.color[i])
        } else {
            src | OPAQUE_BLACK
        };
        if self.z_write {
            self.depth[i] = z;
        }
    }

    fn triangle(&mut self, a: &HwVertex, b: &HwVertex, c: &HwVertex) {
        let area = edge(a, b, c.x, c.y);
        if area.abs() < 1e-6 {
            return;
        }
        let x0 = a.x.min(b.x).min(c.x).floor().max(0.0) as usize;
        let x1 = (a.x.max(b.x).max(c.x).ceil().max(0.0) as usize).min(self.width);
        let y0 = a.y.min(b.y).min(c.y).floor().max(0.0) as usize;
        let y1 = (a.y.max(b.y).max(c.y).ceil().max(0.0) as usize).min(self.height);

        for y in y0..y1 {
            let py = y as f32 + 0.5;
            for x in x0..x1 {
                let px = x as f32 + 0.5;
                let wa = edge(b, c, px, py) / area;
                let wb = edge(c, a, px, py) / area;
                let wc = 1.0 - wa - wb;
                if wa < 0.0 || wb < 0.0 || wc < 0.0 {
                    continue;
                }
                let w = [wa, wb, wc];
                let z = wa * a.z + wb * b.z + wc * c.z;
                let rhw = wa * a.rhw + wb * b.rhw + wc * c.rhw;
                let u = (wa * a.u * a.rhw + wb * b.u * b.rhw + wc * c.u * c.rhw) / rhw;
                let v = (wa * a.v * a.rhw + wb * b.v * b.rhw + wc * c.v * c.rhw) / rhw;
                let vc = lerp_color([a.color, b.color, c.color], w);
                if let Some(src) = self.fragment(vc, u, v) {
                    self.plot(x, y, z, src);
                }
            }
        }
    }

    fn line(&mut self, a: &HwVertex, b: &HwVertex) {
        let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).ceil().max(1.0) as i32;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = a.x + (b.x - a.x) * t;
            let y = a.y + (b.y - a.y) * t;
            if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
                continue;
            }
            let vc = lerp_color([a.color, b.color, b.color], [1.0 - t, t, 0.0]);
            let z = a.z + (b.z - a.z) * t;
            let (u, v) = (a.u + (b.u - a.u) * t, a.v + (b.v - a.v) * t);
            if let Some(src) = self.fragment(vc, u, v) {
                self.plot(x as usize, y as usize, z, src);
            }
        }
    }

    fn fragment(&self, vc: Rgba, u: f32, v: f32) -> Option<Rgba> {
        let base = self.sample(u, v)?;
        if self.source == HwSource::None {
            return Some(vc);
        }
        Some(modulate(base, vc))
    }
}

impl HwDevice for SoftDevice {
    fn upload_textures(&mut self, bank: &TextureBank) {
        self.pages = (0..bank.page_count())
            .filter_map(|i| bank.page(i as u16).ok())
            .map(Box::from)
            .collect();
        self.palette = bank.palette().clone();
        log::debug!("uploaded {} texture pages", self.pages.len());
    }

    fn set_texture(&mut self, source: HwSource) {
        self.source = source;
    }

    fn set_color_key(&mut self, on: bool) {
        self.color_key = on;
    }

    fn set_blend(&mut self, on: bool) {
        self.blend = on;
    }

    fn set_z_test(&mut self, on: bool) {
        self.z_test = on;
    }

    fn set_z_write(&mut self, on: bool) {
        self.z_write = on;
    }

    fn draw(&mut self, kind: HwKind, verts: &[HwVertex]) {
        match kind {
            HwKind::TriangleFan => {
                let Some((first, rest)) = verts.split_first() else { return };
                for pair in rest.windows(2) {
                    self.triangle(first, &pair[0], &pair[1]);
                }
            }
            HwKind::TriangleList => {
                for t in verts.chunks_exact(3) {
                    self.triangle(&t[0], &t[1], &t[2]);
                }
            }
            HwKind::Line => {
                for l in verts.chunks_exact(2) {
                    self.line(&l[0], &l[1]);
                }
            }
        }
    }
}

/// Twice the signed area of `(a, b, p)`.
#[inline]
fn edge(a: &HwVertex, b: &HwVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

#[inline]
fn channel(c: u32, shift: u32) -> u32 {
    (c >> shift) & 0xFF
}

fn lerp_color(c: [u32; 3], w: [f32; 3]) -> u32 {
    let mut out = 0;
    for shift in [0, 8, 16, 24] {
        let v: f32 = (0..3).map(|k| channel(c[k], shift) as f32 * w[k]).sum();
        out |= (v.round().clamp(0.0, 255.0) as u32) << shift;
    }
    out
}

/// `texel * colour / 128` per channel, alpha from the vertex.
fn modulate(base: u32, vc: u32) -> u32 {
    let mut out = vc & 0xFF00_0000;
    for shift in [0, 8, 16] {
        out |= ((channel(base, shift) * channel(vc, shift)) >> 7).min(255) << shift;
    }
    out
}

fn blend(src: u32, dst: u32) -> u32 {
    let a = channel(src, 24);
    let mut out = OPAQUE_BLACK;
    for shift in [0, 8, 16] {
        let c = (channel(src, shift) * a + channel(dst, shift) * (255 - a)) / 255;
        out |= c << shift;
    }
    out
}
