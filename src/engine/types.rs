use bitflags::bitflags;

/// Darkest shade; shades run `0 ..= MAX_SHADE` (13 bits).
pub const MAX_SHADE: i32 = 0x1FFF;
/// Shade → depth-cue band (`0 ..= 31`).
pub const SHADE_BAND_SHIFT: u32 = 8;

bitflags! {
    /// Which half-planes a transformed vertex violates.
    ///
    /// AND over a primitive's vertices ≠ 0 → reject the primitive.
    /// OR over them selects edge clipping (edge bits) or near clipping (`NEAR`).
    #[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ClipFlags: u8 {
        const LEFT   = 0x01;
        const RIGHT  = 0x02;
        const TOP    = 0x04;
        const BOTTOM = 0x08;
        /// Beyond the quantized far threshold of a room draw call.
        const FAR    = 0x10;
        /// Behind the near plane; screen coords are invalid.
        const NEAR   = 0x80;

        const EDGES  = 0x0F;
    }
}

/// One transformed vertex.
///
/// `xv/yv/zv` are view-space world units. `xs/ys/rhw` are only meaningful
/// when `clip` lacks [`ClipFlags::NEAR`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhdVbuf {
    pub xv: f64,
    pub yv: f64,
    pub zv: f64,
    pub xs: f64,
    pub ys: f64,
    pub rhw: f64,
    /// Shade, `0 ..= MAX_SHADE` (0 = full bright).
    pub g: i32,
    pub clip: ClipFlags,
}

/// Which depth measure becomes a polygon's sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortMetric {
    /// Mean view-space Z; objects.
    AverageZ,
    /// Largest view-space Z; room geometry.
    MaxZ,
    /// Constant far sentinel; sky / background.
    Far,
}

/// Sort depth used by [`SortMetric::Far`].
pub const FAR_SORT_DEPTH: u32 = u32::MAX >> 1;

impl SortMetric {
    /// Representative depth of `zs` for this metric, plus the depth that the
    /// perspective/affine threshold compares against.
    pub fn depth(self, zs: impl Iterator<Item = f64> + Clone) -> (u32, f64) {
        let max = zs.clone().fold(f64::MIN, f64::max);
        match self {
            SortMetric::AverageZ => {
                let (sum, n) = zs.fold((0.0, 0usize), |(s, n), z| (s + z, n + 1));
                let avg = sum / n.max(1) as f64;
                (avg.max(0.0) as u32, avg)
            }
            SortMetric::MaxZ => (max.max(0.0) as u32, max),
            SortMetric::Far => (FAR_SORT_DEPTH, max),
        }
    }
}

#[inline]
pub fn clamp_shade(g: i32) -> i32 {
    g.clamp(0, MAX_SHADE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_metrics() {
        let zs = [100.0, 300.0, 200.0];
        assert_eq!(SortMetric::AverageZ.depth(zs.iter().copied()).0, 200);
        assert_eq!(SortMetric::MaxZ.depth(zs.iter().copied()).0, 300);
        let (key, threshold_z) = SortMetric::Far.depth(zs.iter().copied());
        assert_eq!(key, FAR_SORT_DEPTH);
        assert_eq!(threshold_z, 300.0);
    }

    #[test]
    fn near_bit_is_not_an_edge_bit() {
        assert!(!ClipFlags::EDGES.contains(ClipFlags::NEAR));
        assert!(!ClipFlags::EDGES.intersects(ClipFlags::FAR));
    }
}
