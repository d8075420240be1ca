//! Settings the options screen and the game loop hand to the core.
//!
//! Nothing here changes mid-frame: window, mode and fog only move on an
//! explicit [`RenderContext::init_window`](crate::engine::RenderContext::init_window).

/// Which family of insertion routines is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    #[default]
    Software,
    Hardware,
}

/// Concrete backend picked from `(RenderMode, zbuffer)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Edge-table rasterizer, painter's order.
    Software,
    /// Hardware vertices, everything sorted, no depth buffer.
    HardwareSorted,
    /// Hardware vertices, opaque geometry depth-tested and unsorted.
    HardwareZBuffered,
}

impl Backend {
    pub fn select(mode: RenderMode, zbuffer: bool) -> Self {
        match (mode, zbuffer) {
            (RenderMode::Software, _) => Backend::Software,
            (RenderMode::Hardware, false) => Backend::HardwareSorted,
            (RenderMode::Hardware, true) => Backend::HardwareZBuffered,
        }
    }
}

/// Perspective-correct texturing cut-off presets (view-space world units).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetailLevel {
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl DetailLevel {
    /// Polygons nearer than this get perspective-correct texturing.
    pub fn perspective_distance(self) -> i32 {
        match self {
            DetailLevel::Low => 0,
            DetailLevel::Medium => 0x30_0000 >> 14,
            DetailLevel::High => 0x300_0000 >> 14,
            DetailLevel::Ultra => i32::MAX,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RenderConfig {
    pub mode: RenderMode,
    pub zbuffer: bool,
    pub perspective_distance: i32,
    /// Multiplies the far distance passed to `init_window`.
    pub view_distance_factor: f64,
    /// Fog begin / end as fractions of the far distance, in air.
    pub fog_begin: f64,
    pub fog_end: f64,
    /// Same, underwater.
    pub water_fog_begin: f64,
    pub water_fog_end: f64,
    /// Camera is underwater: water fog and shimmer apply.
    pub water_effect: bool,
    /// Primitives one frame may emit before the poly list truncates.
    pub max_primitives: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Software,
            zbuffer: false,
            perspective_distance: DetailLevel::High.perspective_distance(),
            view_distance_factor: 1.0,
            fog_begin: 0.6,
            fog_end: 1.0,
            water_fog_begin: 0.1,
            water_fog_end: 0.6,
            water_effect: false,
            max_primitives: 8000,
        }
    }
}

impl RenderConfig {
    pub fn backend(&self) -> Backend {
        Backend::select(self.mode, self.zbuffer)
    }

    pub fn with_detail(mut self, detail: DetailLevel) -> Self {
        self.perspective_distance = detail.perspective_distance();
        self
    }
}

/// Arguments of `init_window`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowParams {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub near_z: i32,
    pub far_z: i32,
    /// Full horizontal field of view in degrees.
    pub view_angle: f64,
    pub screen_width: i32,
    pub screen_height: i32,
}

impl WindowParams {
    /// Full-screen window with the classic defaults.
    pub fn fullscreen(width: i32, height: i32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
            near_z: 20,
            far_z: 20 * 1024,
            view_angle: 80.0,
            screen_width: width,
            screen_height: height,
        }
    }
}
