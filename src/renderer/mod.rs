//! Rasterizer backends.
//!
//! *Nothing upstream touches pixels.* The engine fills a
//! [`PolyList`](crate::engine::PolyList); a backend walks it:
//!
//! * [`software`] draws palette indices into a [`Surface`] with the
//!   scanline edge-table rasterizer.
//! * [`hardware`] feeds vertex batches to an [`HwDevice`](hardware::HwDevice)
//!   through a render-state cache.

pub mod hardware;
pub mod software;

use crate::world::texture::Palette;

/// Pixel format of 32-bit frame buffers (0xAARRGGBB).
pub type Rgba = u32;

/// Window rectangle in pixels, `x1` / `y1` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

/// 8-bit palettized frame buffer.
#[derive(Clone, Debug)]
pub struct Surface {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    window: ClipRect,
}

impl Surface {
    /// Cleared to index 0, window covering the whole surface.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
            window: ClipRect {
                x0: 0,
                y0: 0,
                x1: width as i32,
                y1: height as i32,
            },
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Restrict drawing to a sub-rectangle (the game window).
    pub fn set_window(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.window = ClipRect {
            x0: x.max(0),
            y0: y.max(0),
            x1: (x + width).min(self.width as i32),
            y1: (y + height).min(self.height as i32),
        };
    }

    pub fn window(&self) -> ClipRect {
        self.window
    }

    pub fn clear(&mut self, index: u8) {
        self.pixels.fill(index);
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, index: u8) {
        self.pixels[y * self.width + x] = index;
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let w = self.width;
        &mut self.pixels[y * w..(y + 1) * w]
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Expand through `palette` into a 32-bit buffer of the same size.
    pub fn to_rgba(&self, palette: &Palette, out: &mut [Rgba]) {
        debug_assert_eq!(out.len(), self.pixels.len());
        for (dst, &i) in out.iter_mut().zip(&self.pixels) {
            *dst = 0xFF00_0000 | palette[i as usize];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_clamped_to_surface() {
        let mut s = Surface::new(320, 200);
        s.set_window(-10, 20, 400, 100);
        assert_eq!(s.window(), ClipRect { x0: 0, y0: 20, x1: 320, y1: 120 });
    }

    #[test]
    fn expands_through_palette() {
        let mut s = Surface::new(2, 1);
        s.set(1, 0, 7);
        let mut out = [0u32; 2];
        s.to_rgba(&Palette::grayscale(), &mut out);
        assert_eq!(out, [0xFF00_0000, 0xFF07_0707]);
    }
}
