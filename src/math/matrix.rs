use glam::IVec3;

use super::{PhdAngle, W2V_SCALE, W2V_SHIFT, phd_atan, phd_cos, phd_sin, phd_sqrt, trig_mul};

/// Depth of the matrix stack. Hierarchical meshes rarely nest past ~12.
pub const MAX_MATRICES: usize = 40;

/// 3×4 affine transform: rotation coefficients scaled by `W2V_SCALE`,
/// translation column scaled by `W2V_SCALE` as well (view units `<< 14`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Matrix {
    pub m: [[i32; 4]; 3],
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        m: [
            [W2V_SCALE, 0, 0, 0],
            [0, W2V_SCALE, 0, 0],
            [0, 0, W2V_SCALE, 0],
        ],
    };

    /// Translation column, still in shifted view units.
    #[inline]
    pub fn translation(&self) -> [i32; 3] {
        [self.m[0][3], self.m[1][3], self.m[2][3]]
    }

    /// Rotate + translate `v`; result is in shifted view units (`<< W2V_SHIFT`).
    #[inline(always)]
    pub fn transform(&self, v: IVec3) -> [i64; 3] {
        let (x, y, z) = (v.x as i64, v.y as i64, v.z as i64);
        let row = |r: &[i32; 4]| r[0] as i64 * x + r[1] as i64 * y + r[2] as i64 * z + r[3] as i64;
        [row(&self.m[0]), row(&self.m[1]), row(&self.m[2])]
    }

    /// Rotate `v` by the transpose of the rotation part: view space → object space.
    pub fn rotate_inverse(&self, v: IVec3) -> [i64; 3] {
        let (x, y, z) = (v.x as i64, v.y as i64, v.z as i64);
        let col = |c: usize| self.m[0][c] as i64 * x + self.m[1][c] as i64 * y + self.m[2][c] as i64 * z;
        [col(0), col(1), col(2)]
    }

    /// Rotate `v` (no translation); result in shifted units.
    pub fn rotate(&self, v: IVec3) -> [i64; 3] {
        let (x, y, z) = (v.x as i64, v.y as i64, v.z as i64);
        let row = |r: &[i32; 4]| r[0] as i64 * x + r[1] as i64 * y + r[2] as i64 * z;
        [row(&self.m[0]), row(&self.m[1]), row(&self.m[2])]
    }

    fn rot_x(&mut self, angle: PhdAngle) {
        let (s, c) = (phd_sin(angle) as i64, phd_cos(angle) as i64);
        for row in self.m.iter_mut() {
            let (a, b) = (row[1] as i64, row[2] as i64);
            row[1] = ((a * c + b * s) >> W2V_SHIFT) as i32;
            row[2] = ((b * c - a * s) >> W2V_SHIFT) as i32;
        }
    }

    fn rot_y(&mut self, angle: PhdAngle) {
        let (s, c) = (phd_sin(angle) as i64, phd_cos(angle) as i64);
        for row in self.m.iter_mut() {
            let (a, b) = (row[0] as i64, row[2] as i64);
            row[0] = ((a * c - b * s) >> W2V_SHIFT) as i32;
            row[2] = ((b * c + a * s) >> W2V_SHIFT) as i32;
        }
    }

    fn rot_z(&mut self, angle: PhdAngle) {
        let (s, c) = (phd_sin(angle) as i64, phd_cos(angle) as i64);
        for row in self.m.iter_mut() {
            let (a, b) = (row[0] as i64, row[1] as i64);
            row[0] = ((a * c + b * s) >> W2V_SHIFT) as i32;
            row[1] = ((b * c - a * s) >> W2V_SHIFT) as i32;
        }
    }
}

/// Camera placement handed to [`MatrixStack::generate_view_matrix`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewPoint {
    pub pos: IVec3,
    pub pitch: PhdAngle,
    pub yaw: PhdAngle,
    pub roll: PhdAngle,
}

/// Bounded stack of object → view transforms.
///
/// Push/pop balance is the caller's job; an unbalanced pop is a programming
/// error and trips a debug assertion.
#[derive(Clone, Debug)]
pub struct MatrixStack {
    stack: [Matrix; MAX_MATRICES],
    top: usize,
    /// World → view snapshot taken by the last `generate_view_matrix`.
    w2v: Matrix,
    view_pos: IVec3,
    /// Far clip distance in shifted units, bounds `translate_rel`.
    z_far: i64,
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixStack {
    pub fn new() -> Self {
        Self {
            stack: [Matrix::IDENTITY; MAX_MATRICES],
            top: 0,
            w2v: Matrix::IDENTITY,
            view_pos: IVec3::ZERO,
            z_far: (20 * 1024i64) << W2V_SHIFT,
        }
    }

    /// Far distance (world units) used to cancel out-of-range relative translations.
    pub fn set_far_clip(&mut self, far_z: i32) {
        self.z_far = (far_z as i64) << W2V_SHIFT;
    }

    #[inline]
    pub fn top(&self) -> &Matrix {
        &self.stack[self.top]
    }

    #[inline]
    pub fn top_mut(&mut self) -> &mut Matrix {
        &mut self.stack[self.top]
    }

    /// Number of live matrices (1 right after `generate_view_matrix`).
    #[inline]
    pub fn depth(&self) -> usize {
        self.top + 1
    }

    pub fn w2v(&self) -> &Matrix {
        &self.w2v
    }

    pub fn view_pos(&self) -> IVec3 {
        self.view_pos
    }

    /*──────────────────────── view setup ──────────────────────────*/

    /// Build the world → view matrix for `vp` and reset the stack to depth 1.
    pub fn generate_view_matrix(&mut self, vp: &ViewPoint) {
        let (sx, cx) = (phd_sin(vp.pitch), phd_cos(vp.pitch));
        let (sy, cy) = (phd_sin(vp.yaw), phd_cos(vp.yaw));
        let (sz, cz) = (phd_sin(vp.roll), phd_cos(vp.roll));

        let m = Matrix {
            m: [
                [
                    trig_mul(trig_mul(sx, sy), sz) + trig_mul(cy, cz),
                    trig_mul(cx, sz),
                    trig_mul(trig_mul(sx, cy), sz) - trig_mul(sy, cz),
                    0,
                ],
                [
                    trig_mul(trig_mul(sx, sy), cz) - trig_mul(cy, sz),
                    trig_mul(cx, cz),
                    trig_mul(trig_mul(sx, cy), cz) + trig_mul(sy, sz),
                    0,
                ],
                [trig_mul(cx, sy), -sx, trig_mul(cx, cy), 0],
            ],
        };

        self.top = 0;
        self.stack[0] = m;
        self.w2v = m;
        self.view_pos = vp.pos;
    }

    /// Aim the camera from `src` at `target`, then generate the view matrix.
    pub fn look_at(&mut self, src: IVec3, target: IVec3, roll: PhdAngle) {
        let (yaw, pitch) = vector_angles(target - src);
        self.generate_view_matrix(&ViewPoint {
            pos: src,
            pitch,
            yaw,
            roll,
        });
    }

    /*──────────────────────── stack ───────────────────────────────*/

    pub fn push(&mut self) {
        debug_assert!(self.top + 1 < MAX_MATRICES, "matrix stack overflow");
        self.stack[self.top + 1] = self.stack[self.top];
        self.top += 1;
    }

    /// Push an identity rotation with zero translation.
    pub fn push_unit(&mut self) {
        debug_assert!(self.top + 1 < MAX_MATRICES, "matrix stack overflow");
        self.top += 1;
        self.stack[self.top] = Matrix::IDENTITY;
    }

    pub fn pop(&mut self) {
        debug_assert!(self.top > 0, "matrix stack underflow");
        self.top -= 1;
    }

    /*──────────────────────── translation ─────────────────────────*/

    /// Move the origin by an object-local offset.
    ///
    /// Returns `false` when the new origin lies beyond the far clip on any
    /// axis. The partial translation is *not* rolled back: the caller pops.
    pub fn translate_rel(&mut self, x: i32, y: i32, z: i32) -> bool {
        let z_far = self.z_far;
        let m = self.top_mut();
        let mut in_range = true;
        for row in m.m.iter_mut() {
            let t = row[3] as i64 + row[0] as i64 * x as i64 + row[1] as i64 * y as i64 + row[2] as i64 * z as i64;
            if t.abs() > z_far {
                in_range = false;
            }
            row[3] = t.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        }
        in_range
    }

    /// Place the origin at world position `(x, y, z)`.
    pub fn translate_abs(&mut self, x: i32, y: i32, z: i32) {
        let d = IVec3::new(x, y, z) - self.view_pos;
        let m = self.top_mut();
        for row in m.m.iter_mut() {
            let t = row[0] as i64 * d.x as i64 + row[1] as i64 * d.y as i64 + row[2] as i64 * d.z as i64;
            row[3] = t.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        }
    }

    /*──────────────────────── rotation ────────────────────────────*/

    pub fn rot_x(&mut self, angle: PhdAngle) {
        if angle != 0 {
            self.top_mut().rot_x(angle);
        }
    }

    pub fn rot_y(&mut self, angle: PhdAngle) {
        if angle != 0 {
            self.top_mut().rot_y(angle);
        }
    }

    pub fn rot_z(&mut self, angle: PhdAngle) {
        if angle != 0 {
            self.top_mut().rot_z(angle);
        }
    }

    /// Yaw, then pitch, then roll.
    pub fn rot_yxz(&mut self, y: PhdAngle, x: PhdAngle, z: PhdAngle) {
        self.rot_y(y);
        self.rot_x(x);
        self.rot_z(z);
    }

    /// Three 10-bit angles packed into one word, as stored in animation frames.
    pub fn rot_yxz_packed(&mut self, packed: u32) {
        let (y, x, z) = unpack_angles(packed);
        self.rot_yxz(y, x, z);
    }
}

/// Split a packed rotation word into `(y, x, z)` angles.
pub fn unpack_angles(packed: u32) -> (PhdAngle, PhdAngle, PhdAngle) {
    let y = ((packed >> 14) & 0xFFC0) as u16 as PhdAngle;
    let x = ((packed >> 4) & 0xFFC0) as u16 as PhdAngle;
    let z = ((packed << 6) & 0xFFC0) as u16 as PhdAngle;
    (y, x, z)
}

/// `(yaw, pitch)` that points the view axis along `d`.
pub fn vector_angles(d: IVec3) -> (PhdAngle, PhdAngle) {
    let yaw = phd_atan(d.z, d.x);

    // keep the squared terms inside 32 bits
    let (mut x, mut y, mut z) = (d.x, d.y, d.z);
    while x as i16 as i32 != x || y as i16 as i32 != y || z as i16 as i32 != z {
        x >>= 2;
        y >>= 2;
        z >>= 2;
    }
    let horiz = phd_sqrt(x as i64 * x as i64 + z as i64 * z as i64);
    let mut pitch = phd_atan(horiz, y);
    if (y > 0 && pitch > 0) || (y < 0 && pitch < 0) {
        pitch = pitch.wrapping_neg();
    }
    (yaw, pitch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{PHD_45, PHD_90};

    fn camera() -> MatrixStack {
        let mut ms = MatrixStack::new();
        ms.generate_view_matrix(&ViewPoint {
            pos: IVec3::new(1000, -500, 2000),
            pitch: 0x0800,
            yaw: 0x1234,
            roll: 0,
        });
        ms
    }

    #[test]
    fn push_pop_restores_parent() {
        let mut ms = camera();
        ms.translate_abs(3000, 0, 5000);
        let before = *ms.top();

        ms.push();
        ms.rot_y(PHD_45);
        ms.rot_x(0x0321);
        ms.rot_z(-0x1000);
        ms.translate_rel(100, -200, 300);
        ms.rot_yxz_packed(0x1234_5678);
        ms.push_unit();
        ms.translate_rel(5, 5, 5);
        ms.pop();
        ms.pop();

        assert_eq!(*ms.top(), before);
        assert_eq!(ms.depth(), 1);
    }

    #[test]
    fn zero_rotation_is_bit_identical() {
        let mut ms = camera();
        ms.translate_rel(17, 33, -99);
        let before = *ms.top();
        ms.rot_x(0);
        ms.rot_y(0);
        ms.rot_z(0);
        ms.rot_yxz(0, 0, 0);
        ms.rot_yxz_packed(0);
        assert_eq!(*ms.top(), before);
    }

    #[test]
    fn rot_y_quarter_turn_swaps_axes() {
        let mut ms = MatrixStack::new();
        ms.generate_view_matrix(&ViewPoint::default());
        ms.rot_y(PHD_90);
        // object +z ends up along view +x after a quarter yaw
        let p = ms.top().transform(IVec3::new(0, 0, 1000));
        assert_eq!(p[0] >> W2V_SHIFT, 1000);
        assert_eq!(p[2] >> W2V_SHIFT, 0);
    }

    #[test]
    fn translate_abs_puts_camera_at_origin() {
        let mut ms = camera();
        let cam = ms.view_pos();
        ms.translate_abs(cam.x, cam.y, cam.z);
        assert_eq!(ms.top().translation(), [0, 0, 0]);
    }

    #[test]
    fn translate_rel_rejects_beyond_far() {
        let mut ms = MatrixStack::new();
        ms.set_far_clip(1000);
        ms.generate_view_matrix(&ViewPoint::default());
        ms.push();
        assert!(ms.translate_rel(0, 0, 999));
        assert!(!ms.translate_rel(0, 0, 2));
        ms.pop();
        assert_eq!(*ms.top(), *ms.w2v());
    }

    #[test]
    fn packed_matches_separate_rotations() {
        let packed = (0x100u32 << 20) | (0x2A << 10) | 0x3F;
        let (y, x, z) = unpack_angles(packed);
        assert_eq!(y as u16, 0x100 << 6);
        assert_eq!(x as u16, 0x2A << 6);
        assert_eq!(z as u16, 0x3F << 6);

        let mut a = camera();
        let mut b = camera();
        a.rot_yxz_packed(packed);
        b.rot_y(y);
        b.rot_x(x);
        b.rot_z(z);
        assert_eq!(a.top(), b.top());
    }

    #[test]
    fn look_at_points_view_axis_at_target() {
        let mut ms = MatrixStack::new();
        let src = IVec3::new(100, -300, 50);
        let target = IVec3::new(2100, 700, 4050);
        ms.look_at(src, target, 0);
        ms.translate_abs(target.x, target.y, target.z);
        let [x, y, z] = ms.top().translation();
        let dist = ((target - src).as_dvec3().length() * W2V_SCALE as f64) as i32;
        assert!(x.abs() < dist / 100, "x {x}");
        assert!(y.abs() < dist / 100, "y {y}");
        assert!((z - dist).abs() < dist / 100, "z {z} vs {dist}");
    }
}
