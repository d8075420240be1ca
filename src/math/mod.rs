//! Fixed-point math primitives shared by every stage of the pipeline.
//!
//! * Angles are 16-bit: `0x10000` is a full turn, [`PHD_90`] a quarter turn.
//! * Trig results are scaled by [`W2V_SCALE`] (`1.0 == 1 << 14`).
//! * The sine table is built once, lazily, on first use.

pub mod matrix;

pub use matrix::{MAX_MATRICES, Matrix, MatrixStack};

use once_cell::sync::Lazy;

/// Fixed-point shift of every rotation coefficient.
pub const W2V_SHIFT: u32 = 14;
/// `1.0` in rotation-coefficient units.
pub const W2V_SCALE: i32 = 1 << W2V_SHIFT;

/// Engine angle: 16 bits per full turn, wrapping.
pub type PhdAngle = i16;

pub const PHD_ONE: i32 = 0x10000;
pub const PHD_45: PhdAngle = 0x2000;
pub const PHD_90: PhdAngle = 0x4000;
pub const PHD_180: PhdAngle = i16::MIN;

/// Number of entries in the sine table (one per 16 angle units).
const SIN_TABLE_LEN: usize = 4096;
const SIN_TABLE_SHIFT: u32 = 4;

static SIN_TABLE: Lazy<[i32; SIN_TABLE_LEN]> = Lazy::new(|| {
    let mut table = [0i32; SIN_TABLE_LEN];
    for (i, entry) in table.iter_mut().enumerate() {
        let rad = i as f64 * std::f64::consts::TAU / SIN_TABLE_LEN as f64;
        *entry = (rad.sin() * W2V_SCALE as f64).round() as i32;
    }
    table
});

/// Sine of `angle`, scaled by [`W2V_SCALE`].
#[inline]
pub fn phd_sin(angle: PhdAngle) -> i32 {
    SIN_TABLE[(angle as u16 >> SIN_TABLE_SHIFT) as usize]
}

/// Cosine of `angle`, scaled by [`W2V_SCALE`].
#[inline]
pub fn phd_cos(angle: PhdAngle) -> i32 {
    phd_sin(angle.wrapping_add(PHD_90))
}

/// Angle of the vector `(x, y)` measured from the +x axis towards +y.
///
/// The engine calls this with `(z, x)` to get a heading where 0 looks
/// down +z and [`PHD_90`] looks down +x.
pub fn phd_atan(x: i32, y: i32) -> PhdAngle {
    if x == 0 && y == 0 {
        return 0;
    }
    let rad = (y as f64).atan2(x as f64);
    let units = (rad * PHD_ONE as f64 / std::f64::consts::TAU).round() as i32;
    units as u16 as PhdAngle
}

/// Integer square root (floor).
pub fn phd_sqrt(n: i64) -> i32 {
    if n <= 0 {
        return 0;
    }
    let mut n = n as u64;
    let mut root = 0u64;
    let mut bit = 1u64 << 62;
    while bit > n {
        bit >>= 2;
    }
    while bit != 0 {
        if n >= root + bit {
            n -= root + bit;
            root = (root >> 1) + bit;
        } else {
            root >>= 1;
        }
        bit >>= 2;
    }
    root as i32
}

/// `(a * b) >> W2V_SHIFT` without intermediate overflow.
#[inline(always)]
pub fn trig_mul(a: i32, b: i32) -> i32 {
    ((a as i64 * b as i64) >> W2V_SHIFT) as i32
}

/// Angle from degrees, the unit options screens use for the field of view.
pub fn degrees(deg: f64) -> PhdAngle {
    ((deg * PHD_ONE as f64 / 360.0).round() as i32) as u16 as PhdAngle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_cardinal_points() {
        assert_eq!(phd_sin(0), 0);
        assert_eq!(phd_sin(PHD_90), W2V_SCALE);
        assert_eq!(phd_sin(PHD_180), 0);
        assert_eq!(phd_sin(-PHD_90), -W2V_SCALE);
        assert_eq!(phd_cos(0), W2V_SCALE);
        assert_eq!(phd_cos(PHD_90), 0);
    }

    #[test]
    fn atan_quadrants() {
        assert_eq!(phd_atan(100, 0), 0);
        assert_eq!(phd_atan(0, 100), PHD_90);
        assert_eq!(phd_atan(100, 100), PHD_45);
        assert_eq!(phd_atan(0, -100), -PHD_90);
        assert_eq!(phd_atan(-100, 0), PHD_180);
    }

    #[test]
    fn sqrt_floors() {
        assert_eq!(phd_sqrt(0), 0);
        assert_eq!(phd_sqrt(1), 1);
        assert_eq!(phd_sqrt(15), 3);
        assert_eq!(phd_sqrt(16), 4);
        assert_eq!(phd_sqrt(1 << 40), 1 << 20);
    }

    #[test]
    fn degrees_to_units() {
        assert_eq!(degrees(90.0), PHD_90);
        assert_eq!(degrees(45.0), PHD_45);
        assert_eq!(degrees(180.0), PHD_180);
    }
}
