//! Window, projection and fog constants.
//!
//! Every float here is derived; the inputs are the window rectangle, the
//! field of view and the near / far distances. Change one of those and the
//! matching `set_*` recomputes its dependants.

use crate::engine::config::{RenderConfig, WindowParams};
use crate::engine::types::MAX_SHADE;
use crate::math::{PhdAngle, degrees, phd_cos, phd_sin};

/// Numerator of every `rhw`: `rhw = RHW_FACTOR / zv`.
pub const RHW_FACTOR: f64 = 0x14_0000 as f64;
/// Depth-buffer values at the near and far planes sit this far inside `0..1`.
pub const Z_BIAS: f64 = 0.005;

/// Linear fog ramp between two view-space depths.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FogRange {
    pub begin: f64,
    pub end: f64,
}

impl FogRange {
    pub fn new(begin: f64, end: f64) -> Self {
        Self { begin, end }
    }

    /// `0` before `begin`, [`MAX_SHADE`] from `end` on, linear in between.
    pub fn shade(&self, depth: f64) -> i32 {
        if depth >= self.end {
            MAX_SHADE
        } else if depth < self.begin {
            0
        } else {
            ((depth - self.begin) * MAX_SHADE as f64 / (self.end - self.begin)) as i32
        }
    }
}

#[derive(Clone, Debug)]
pub struct ViewState {
    // ---- window -------------------------------------------------------
    pub win_x: i32,
    pub win_y: i32,
    pub win_width: i32,
    pub win_height: i32,
    pub screen_width: i32,
    pub screen_height: i32,
    /// Clip rectangle; `right` / `bottom` are exclusive pixel edges.
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub center_x: f64,
    pub center_y: f64,

    // ---- projection ---------------------------------------------------
    pub fov: PhdAngle,
    /// Screen distance: pixels per world unit at `zv == 1`.
    pub persp: f64,
    pub rhw_o_persp: f64,
    pub persp_o_near_z: f64,

    // ---- depth range --------------------------------------------------
    pub near_z: i32,
    pub far_z: i32,
    pub flt_near_z: f64,
    pub flt_far_z: f64,
    pub res_z: f64,
    pub res_z_o_rhw: f64,
    pub res_z_buf: f64,

    // ---- fog ----------------------------------------------------------
    pub fog: FogRange,
    pub water_fog: FogRange,
    pub underwater: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        let mut view = Self {
            win_x: 0,
            win_y: 0,
            win_width: 0,
            win_height: 0,
            screen_width: 0,
            screen_height: 0,
            left: 0.0,
            right: 0.0,
            top: 0.0,
            bottom: 0.0,
            center_x: 0.0,
            center_y: 0.0,
            fov: 0,
            persp: 1.0,
            rhw_o_persp: 0.0,
            persp_o_near_z: 0.0,
            near_z: 0,
            far_z: 0,
            flt_near_z: 0.0,
            flt_far_z: 0.0,
            res_z: 0.0,
            res_z_o_rhw: 0.0,
            res_z_buf: 0.0,
            fog: FogRange::default(),
            water_fog: FogRange::default(),
            underwater: false,
        };
        view.init_window(&WindowParams::fullscreen(640, 480), &RenderConfig::default());
        view
    }
}

impl ViewState {
    /// Aggregate setup: window rectangle, depth range, field of view and fog.
    pub fn init_window(&mut self, p: &WindowParams, cfg: &RenderConfig) {
        self.win_x = p.x;
        self.win_y = p.y;
        self.win_width = p.width;
        self.win_height = p.height;
        self.screen_width = p.screen_width;
        self.screen_height = p.screen_height;

        self.left = p.x as f64;
        self.top = p.y as f64;
        self.right = (p.x + p.width) as f64;
        self.bottom = (p.y + p.height) as f64;
        self.center_x = p.x as f64 + p.width as f64 / 2.0;
        self.center_y = p.y as f64 + p.height as f64 / 2.0;

        let far_z = (p.far_z as f64 * cfg.view_distance_factor) as i32;
        // near first: the far setter reads it
        self.set_near_z(p.near_z);
        self.set_far_z(far_z.max(p.near_z + 1));
        self.set_field_of_view(degrees(p.view_angle));

        let far = self.flt_far_z;
        self.fog = FogRange::new(cfg.fog_begin * far, cfg.fog_end * far);
        self.water_fog = FogRange::new(cfg.water_fog_begin * far, cfg.water_fog_end * far);
        self.underwater = cfg.water_effect;
    }

    /// Full horizontal field of view; the projection uses half of it.
    pub fn set_field_of_view(&mut self, fov: PhdAngle) {
        let half = ((fov as u16) / 2) as PhdAngle;
        let (s, c) = (phd_sin(half), phd_cos(half));
        self.fov = fov;
        self.persp = if s > 0 {
            self.win_width as f64 / 2.0 * c as f64 / s as f64
        } else {
            self.win_width as f64 / 2.0
        };
        self.rhw_o_persp = RHW_FACTOR / self.persp;
        self.persp_o_near_z = self.persp / self.flt_near_z;
    }

    pub fn set_near_z(&mut self, near_z: i32) {
        self.near_z = near_z;
        self.flt_near_z = near_z as f64;
        self.persp_o_near_z = self.persp / self.flt_near_z;
        self.update_res_z();
    }

    pub fn set_far_z(&mut self, far_z: i32) {
        self.far_z = far_z;
        self.flt_far_z = far_z as f64;
        self.update_res_z();
    }

    fn update_res_z(&mut self) {
        let (n, f) = (self.flt_near_z, self.flt_far_z);
        if f <= n || n <= 0.0 {
            return;
        }
        self.res_z = (1.0 - 2.0 * Z_BIAS) * n * f / (f - n);
        self.res_z_o_rhw = self.res_z / RHW_FACTOR;
        self.res_z_buf = Z_BIAS + self.res_z / n;
    }

    /*──────────────────────── per-vertex helpers ──────────────────────*/

    /// `rhw` for a vertex at view depth `zv`.
    #[inline]
    pub fn rhw(&self, zv: f64) -> f64 {
        self.persp / zv * self.rhw_o_persp
    }

    /// Project a view-space point that is in front of the near plane.
    #[inline]
    pub fn project(&self, xv: f64, yv: f64, zv: f64) -> (f64, f64) {
        let k = self.persp / zv;
        (self.center_x + xv * k, self.center_y + yv * k)
    }

    /// Depth-buffer value in `Z_BIAS ..= 1 - Z_BIAS` for a given `rhw`.
    #[inline]
    pub fn hw_z(&self, rhw: f64) -> f64 {
        self.res_z_buf - self.res_z_o_rhw * rhw
    }

    /// Fog shade for a view-space depth, using the active (air / water) ramp.
    pub fn calculate_fog_shade(&self, depth: f64) -> i32 {
        if self.underwater {
            self.water_fog.shade(depth)
        } else {
            self.fog.shade(depth)
        }
    }
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> ViewState {
        let mut v = ViewState::default();
        let cfg = RenderConfig {
            fog_begin: 0.5,
            fog_end: 1.0,
            water_fog_begin: 0.1,
            water_fog_end: 0.3,
            ..RenderConfig::default()
        };
        v.init_window(&WindowParams::fullscreen(640, 480), &cfg);
        v
    }

    #[test]
    fn fov_90_gives_half_width() {
        let mut v = view();
        v.set_field_of_view(degrees(90.0));
        assert!((v.persp - 320.0).abs() < 0.1, "persp {}", v.persp);
    }

    #[test]
    fn project_centre_and_edge() {
        let mut v = view();
        v.set_field_of_view(degrees(90.0));
        let (x, y) = v.project(0.0, 0.0, 1000.0);
        assert_eq!((x, y), (320.0, 240.0));
        let (x, _) = v.project(1000.0, 0.0, 1000.0);
        assert!((x - 640.0).abs() < 0.1);
    }

    #[test]
    fn hw_z_maps_depth_range() {
        let v = view();
        let near = v.hw_z(v.rhw(v.flt_near_z));
        let far = v.hw_z(v.rhw(v.flt_far_z));
        assert!((near - Z_BIAS).abs() < 1e-9, "near {near}");
        assert!((far - (1.0 - Z_BIAS)).abs() < 1e-9, "far {far}");
        let mid = v.hw_z(v.rhw(1000.0));
        assert!(near < mid && mid < far);
    }

    fn check_fog_ramp(v: &ViewState, range: FogRange) {
        let mut last = 0;
        let mut depth = 0.0;
        while depth < range.end + 500.0 {
            let g = v.calculate_fog_shade(depth);
            if depth < range.begin {
                assert_eq!(g, 0, "depth {depth}");
            } else if depth >= range.end {
                assert_eq!(g, MAX_SHADE, "depth {depth}");
            }
            assert!(g >= last, "fog not monotonic at {depth}");
            last = g;
            depth += 37.0;
        }
    }

    #[test]
    fn fog_is_monotonic_in_air_and_water() {
        let mut v = view();
        check_fog_ramp(&v, v.fog);

        v.underwater = true;
        assert!(v.water_fog.end < v.fog.end);
        check_fog_ramp(&v, v.water_fog);
    }

    #[test]
    fn fog_exact_boundaries() {
        let r = FogRange::new(1000.0, 2000.0);
        assert_eq!(r.shade(999.9), 0);
        assert_eq!(r.shade(1000.0), 0);
        assert_eq!(r.shade(1500.0), MAX_SHADE / 2);
        assert_eq!(r.shade(2000.0), MAX_SHADE);
        // degenerate ramp is a step
        let step = FogRange::new(500.0, 500.0);
        assert_eq!(step.shade(499.0), 0);
        assert_eq!(step.shade(500.0), MAX_SHADE);
    }

    #[test]
    fn view_distance_factor_scales_far() {
        let mut v = ViewState::default();
        let cfg = RenderConfig {
            view_distance_factor: 0.5,
            ..RenderConfig::default()
        };
        let p = WindowParams::fullscreen(320, 200);
        v.init_window(&p, &cfg);
        assert_eq!(v.far_z, p.far_z / 2);
        assert_eq!(v.right, 320.0);
        assert_eq!(v.center_y, 100.0);
    }
}
