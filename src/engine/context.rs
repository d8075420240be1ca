//! Frame-scoped render state and the entry points the scene walker calls.
//!
//! A frame is:
//!
//! ```text
//! init_poly_list
//!   generate_view_matrix
//!   per room:   push, translate_abs, insert_room, pop
//!   per object: push, translate_abs / rotate, put_polygons, pop
//!   sprites, shadows, overlays
//! sort_poly_list
//! (rasterizer walks poly_list())
//! ```

use glam::IVec3;

use crate::engine::config::{RenderConfig, WindowParams};
use crate::engine::insert::{
    PolygonInserter, ScreenRect, insert_colored, insert_textured, insert_textured_with, insert_translucent,
    make_inserter,
};
use crate::engine::lighting::{Lighting, calc_vertex_light, env_uv};
use crate::engine::polylist::{PolyList, RenderError};
use crate::engine::transform::{Wibble, transform_object_vertices, transform_room_vertices};
use crate::engine::types::{ClipFlags, PhdVbuf, SortMetric, clamp_shade};
use crate::engine::view::ViewState;
use crate::math::{MatrixStack, PHD_ONE, W2V_SHIFT, phd_cos, phd_sin};
use crate::world::mesh::{Mesh, MeshLighting};
use crate::world::room::Room;
use crate::world::texture::{DrawType, ObjectTexture, PAGE_SIZE, PageId, SpriteId, TextureBank};

/// Neutral shade: depth-cue band 16, colours unchanged.
pub const NEUTRAL_SHADE: i32 = 0x1000;

/// Which polygons of a mesh get the environment-mapped overlay, counted
/// from the front of each face list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReflectionFilter {
    /// Page holding the environment map.
    pub page: PageId,
    /// Textured quads / triangles.
    pub quads: usize,
    pub tris: usize,
    /// Gouraud-coloured quads / triangles.
    pub colored_quads: usize,
    pub colored_tris: usize,
}

pub struct RenderContext {
    pub ms: MatrixStack,
    view: ViewState,
    config: RenderConfig,
    polys: PolyList,
    inserter: Box<dyn PolygonInserter>,
    vbuf: Vec<PhdVbuf>,
    env: Vec<(f64, f64)>,
    lighting: Lighting,
    wibble_offset: u32,
}

impl RenderContext {
    pub fn new(params: &WindowParams, config: RenderConfig) -> Self {
        let mut ctx = Self {
            ms: MatrixStack::new(),
            view: ViewState::default(),
            polys: PolyList::new(config.max_primitives),
            inserter: make_inserter(&config),
            vbuf: Vec::new(),
            env: Vec::new(),
            lighting: Lighting::default(),
            wibble_offset: 0,
            config,
        };
        ctx.init_window(params, config);
        ctx
    }

    /// Window, projection, fog and backend setup. Call again on resize or
    /// when the render options change.
    pub fn init_window(&mut self, params: &WindowParams, config: RenderConfig) {
        self.view.init_window(params, &config);
        self.ms.set_far_clip(self.view.far_z);
        self.polys.set_capacity(config.max_primitives);
        self.inserter = make_inserter(&config);
        self.config = config;
        log::debug!(
            "window {}x{}+{}+{}, near {} far {}, persp {:.1}, backend {:?}",
            params.width,
            params.height,
            params.x,
            params.y,
            self.view.near_z,
            self.view.far_z,
            self.view.persp,
            self.inserter.backend()
        );
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn poly_list(&self) -> &PolyList {
        &self.polys
    }

    pub fn set_lighting(&mut self, lighting: Lighting) {
        self.lighting = lighting;
    }

    /// Switch between the air and the water fog ramp.
    pub fn set_underwater(&mut self, underwater: bool) {
        self.view.underwater = underwater;
    }

    /// Once per logic tick.
    pub fn advance_wibble(&mut self) {
        self.wibble_offset = self.wibble_offset.wrapping_add(1);
    }

    pub fn wibble_offset(&self) -> u32 {
        self.wibble_offset
    }

    /*──────────────────────── frame bracket ──────────────────────────*/

    pub fn init_poly_list(&mut self) {
        self.polys.init();
        self.vbuf.clear();
    }

    /// Band stamped on everything inserted from now on (room draw order).
    pub fn set_mid_sort(&mut self, band: u32) {
        self.polys.set_mid_sort(band);
    }

    pub fn sort_poly_list(&mut self) {
        self.polys.sort();
    }

    /*──────────────────────── meshes ─────────────────────────────────*/

    /// Draw an object mesh through the current matrix.
    ///
    /// `needs_clip` comes from the caller's bounds test: `false` promises
    /// the whole mesh is inside the window.
    pub fn put_polygons(&mut self, mesh: &Mesh, needs_clip: bool, bank: &TextureBank) -> Result<(), RenderError> {
        self.put_mesh(mesh, needs_clip, None, bank)
    }

    /// [`put_polygons`](Self::put_polygons) plus a semitransparent
    /// environment-mapped overlay on the polygons `filter` selects. Each
    /// overlay is inserted right after its host so it draws on top of it.
    pub fn put_polygons_reflective(
        &mut self,
        mesh: &Mesh,
        filter: &ReflectionFilter,
        bank: &TextureBank,
    ) -> Result<(), RenderError> {
        self.put_mesh(mesh, true, Some(filter), bank)
    }

    fn put_mesh(
        &mut self,
        mesh: &Mesh,
        needs_clip: bool,
        filter: Option<&ReflectionFilter>,
        bank: &TextureBank,
    ) -> Result<(), RenderError> {
        if transform_object_vertices(&self.ms, &self.view, &mesh.vertices, needs_clip, &mut self.vbuf).is_none() {
            return Ok(());
        }
        calc_vertex_light(&self.ms, &self.view, &self.lighting, &mesh.lighting, &mut self.vbuf);

        // overlays need normals; shade-table meshes get none
        let filter = match (&mesh.lighting, filter) {
            (MeshLighting::Normals(normals), Some(f)) => {
                let max = (PAGE_SIZE - 1) as f64;
                self.env.clear();
                self.env.extend(normals.iter().map(|&n| {
                    let (u, v) = env_uv(&self.ms, n);
                    (u * max, v * max)
                }));
                Some(f)
            }
            _ => None,
        };

        let ins = self.inserter.as_ref();
        let metric = SortMetric::AverageZ;
        let env = self.env.as_slice();
        let overlay = |polys: &mut PolyList, verts: &[u16], page: PageId| {
            let uv = |s: usize| verts.get(s).and_then(|&c| env.get(c as usize)).copied().unwrap_or_default();
            insert_textured_with(ins, &self.view, polys, &self.vbuf, verts, &overlay_texture(page), uv, metric)
        };
        for (i, face) in mesh.gt4.iter().enumerate() {
            let tex = bank.object_texture(face.tex)?;
            insert_textured(ins, &self.view, &mut self.polys, &self.vbuf, &face.verts, tex, metric)?;
            if let Some(f) = filter.filter(|f| i < f.quads) {
                overlay(&mut self.polys, &face.verts, f.page)?;
            }
        }
        for (i, face) in mesh.gt3.iter().enumerate() {
            let tex = bank.object_texture(face.tex)?;
            insert_textured(ins, &self.view, &mut self.polys, &self.vbuf, &face.verts, tex, metric)?;
            if let Some(f) = filter.filter(|f| i < f.tris) {
                overlay(&mut self.polys, &face.verts, f.page)?;
            }
        }
        for (i, face) in mesh.g4.iter().enumerate() {
            insert_colored(ins, &self.view, &mut self.polys, &self.vbuf, &face.verts, face.tex as u8, metric)?;
            if let Some(f) = filter.filter(|f| i < f.colored_quads) {
                overlay(&mut self.polys, &face.verts, f.page)?;
            }
        }
        for (i, face) in mesh.g3.iter().enumerate() {
            insert_colored(ins, &self.view, &mut self.polys, &self.vbuf, &face.verts, face.tex as u8, metric)?;
            if let Some(f) = filter.filter(|f| i < f.colored_tris) {
                overlay(&mut self.polys, &face.verts, f.page)?;
            }
        }
        Ok(())
    }

    /// Draw one room; the caller has already done `translate_abs` to the
    /// room origin. Outside rooms are exempt from the far reject.
    pub fn insert_room(&mut self, room: &Room, is_outside: bool, bank: &TextureBank) -> Result<(), RenderError> {
        let far_clip = if is_outside { ClipFlags::empty() } else { ClipFlags::FAR };
        let wibble = self.view.underwater.then_some(Wibble {
            offset: self.wibble_offset,
        });
        if transform_room_vertices(&self.ms, &self.view, &room.vertices, far_clip, wibble, &mut self.vbuf).is_none() {
            return Ok(());
        }

        let ins = self.inserter.as_ref();
        let metric = SortMetric::MaxZ;
        for face in &room.gt4 {
            let tex = bank.object_texture(face.tex)?;
            insert_textured(ins, &self.view, &mut self.polys, &self.vbuf, &face.verts, tex, metric)?;
        }
        for face in &room.gt3 {
            let tex = bank.object_texture(face.tex)?;
            insert_textured(ins, &self.view, &mut self.polys, &self.vbuf, &face.verts, tex, metric)?;
        }

        for rs in &room.sprites {
            let Some(&vb) = self.vbuf.get(rs.vertex as usize) else {
                continue;
            };
            self.sprite_at(vb.xv, vb.yv, vb.zv, rs.sprite, vb.g, bank)?;
        }
        Ok(())
    }

    /// Skybox: drawn behind everything, unfogged.
    pub fn insert_background(&mut self, mesh: &Mesh, bank: &TextureBank) -> Result<(), RenderError> {
        if transform_object_vertices(&self.ms, &self.view, &mesh.vertices, true, &mut self.vbuf).is_none() {
            return Ok(());
        }
        match &mesh.lighting {
            MeshLighting::Shades(shades) => {
                for (vb, &s) in self.vbuf.iter_mut().zip(shades.iter()) {
                    vb.g = clamp_shade(s as i32);
                }
            }
            MeshLighting::Normals(_) => {
                for vb in self.vbuf.iter_mut() {
                    vb.g = NEUTRAL_SHADE;
                }
            }
        }

        let ins = self.inserter.as_ref();
        let metric = SortMetric::Far;
        for face in &mesh.gt4 {
            let tex = bank.object_texture(face.tex)?;
            insert_textured(ins, &self.view, &mut self.polys, &self.vbuf, &face.verts, tex, metric)?;
        }
        for face in &mesh.gt3 {
            let tex = bank.object_texture(face.tex)?;
            insert_textured(ins, &self.view, &mut self.polys, &self.vbuf, &face.verts, tex, metric)?;
        }
        for face in &mesh.g4 {
            insert_colored(ins, &self.view, &mut self.polys, &self.vbuf, &face.verts, face.tex as u8, metric)?;
        }
        for face in &mesh.g3 {
            insert_colored(ins, &self.view, &mut self.polys, &self.vbuf, &face.verts, face.tex as u8, metric)?;
        }
        Ok(())
    }

    /*──────────────────────── sprites ────────────────────────────────*/

    /// Billboard at a world position, sized by the sprite's world extents.
    pub fn draw_sprite(&mut self, pos: IVec3, sprite: SpriteId, shade: i32, bank: &TextureBank) -> Result<(), RenderError> {
        let [x, y, z] = self.ms.w2v().rotate(pos - self.ms.view_pos());
        let s = (1i64 << W2V_SHIFT) as f64;
        let (xv, yv, zv) = (x as f64 / s, y as f64 / s, z as f64 / s);
        let g = clamp_shade(shade + self.view.calculate_fog_shade(zv));
        self.sprite_at(xv, yv, zv, sprite, g, bank)
    }

    /// Billboard at a view-space position, `g` already fogged.
    fn sprite_at(&mut self, xv: f64, yv: f64, zv: f64, id: SpriteId, g: i32, bank: &TextureBank) -> Result<(), RenderError> {
        if zv < self.view.flt_near_z || zv > self.view.flt_far_z {
            return Ok(());
        }
        let spr = bank.sprite(id)?;
        let k = self.view.persp / zv;
        let rect = ScreenRect {
            x0: self.view.center_x + (xv + spr.x1 as f64) * k,
            y0: self.view.center_y + (yv + spr.y1 as f64) * k,
            x1: self.view.center_x + (xv + spr.x2 as f64) * k,
            y1: self.view.center_y + (yv + spr.y2 as f64) * k,
        };
        if !self.rect_visible(&rect) {
            return Ok(());
        }
        self.inserter.sprite(&self.view, &mut self.polys, rect, zv, g, id, spr)
    }

    /// Inventory pickup: sprite centred on a screen point at `scale`
    /// (16.16), drawn in front of the scene.
    pub fn draw_pickup(
        &mut self,
        sx: i32,
        sy: i32,
        scale: i32,
        sprite: SpriteId,
        shade: i32,
        bank: &TextureBank,
    ) -> Result<(), RenderError> {
        let spr = bank.sprite(sprite)?;
        let k = scale as f64 / PHD_ONE as f64;
        let (w, h) = ((spr.x2 - spr.x1) as f64 * k, (spr.y2 - spr.y1) as f64 * k);
        let rect = ScreenRect {
            x0: sx as f64 - w / 2.0,
            y0: sy as f64 - h / 2.0,
            x1: sx as f64 + w / 2.0,
            y1: sy as f64 + h / 2.0,
        };
        if !self.rect_visible(&rect) {
            return Ok(());
        }
        let z = self.view.flt_near_z;
        self.inserter.sprite(&self.view, &mut self.polys, rect, z, clamp_shade(shade), sprite, spr)
    }

    /// Screen sprite sized by its world extents, scaled by `scale_h` /
    /// `scale_v` (16.16) around `(sx, sy)`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_screen_sprite(
        &mut self,
        sx: i32,
        sy: i32,
        z: i32,
        scale_h: i32,
        scale_v: i32,
        sprite: SpriteId,
        shade: i32,
        bank: &TextureBank,
    ) -> Result<(), RenderError> {
        let spr = bank.sprite(sprite)?;
        let (kh, kv) = (scale_h as f64 / PHD_ONE as f64, scale_v as f64 / PHD_ONE as f64);
        let rect = ScreenRect {
            x0: sx as f64 + spr.x1 as f64 * kh,
            y0: sy as f64 + spr.y1 as f64 * kv,
            x1: sx as f64 + spr.x2 as f64 * kh,
            y1: sy as f64 + spr.y2 as f64 * kv,
        };
        if !self.rect_visible(&rect) {
            return Ok(());
        }
        self.inserter.sprite(&self.view, &mut self.polys, rect, z as f64, clamp_shade(shade), sprite, spr)
    }

    /// Screen sprite sized by its texel rectangle, top-left at `(sx, sy)`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_screen_sprite_2d(
        &mut self,
        sx: i32,
        sy: i32,
        z: i32,
        scale_h: i32,
        scale_v: i32,
        sprite: SpriteId,
        shade: i32,
        bank: &TextureBank,
    ) -> Result<(), RenderError> {
        let spr = bank.sprite(sprite)?;
        let (kh, kv) = (scale_h as f64 / PHD_ONE as f64, scale_v as f64 / PHD_ONE as f64);
        let rect = ScreenRect {
            x0: sx as f64,
            y0: sy as f64,
            x1: sx as f64 + spr.width as f64 * kh,
            y1: sy as f64 + spr.height as f64 * kv,
        };
        if !self.rect_visible(&rect) {
            return Ok(());
        }
        self.inserter.sprite(&self.view, &mut self.polys, rect, z as f64, clamp_shade(shade), sprite, spr)
    }

    fn rect_visible(&self, r: &ScreenRect) -> bool {
        r.x1 > r.x0
            && r.y1 > r.y0
            && r.x1 > self.view.left
            && r.x0 < self.view.right
            && r.y1 > self.view.top
            && r.y0 < self.view.bottom
    }

    /*──────────────────────── 2-D overlays ───────────────────────────*/

    /// Screen-space line; the rasterizer clips it to the window.
    pub fn insert_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, z: i32, color: u8) -> Result<(), RenderError> {
        let v = &self.view;
        let (lx, hx) = (x0.min(x1) as f64, x0.max(x1) as f64);
        let (ly, hy) = (y0.min(y1) as f64, y0.max(y1) as f64);
        if hx < v.left || lx >= v.right || hy < v.top || ly >= v.bottom {
            return Ok(());
        }
        self.inserter.line(
            &self.view,
            &mut self.polys,
            (x0 as f64, y0 as f64),
            (x1 as f64, y1 as f64),
            z as f64,
            color,
        )
    }

    /// Solid rectangle, `x1` / `y1` exclusive, cut to the window.
    pub fn insert_flat_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, z: i32, color: u8) -> Result<(), RenderError> {
        let v = &self.view;
        let rect = ScreenRect {
            x0: (x0 as f64).max(v.left),
            y0: (y0 as f64).max(v.top),
            x1: (x1 as f64).min(v.right),
            y1: (y1 as f64).min(v.bottom),
        };
        if rect.x1 <= rect.x0 || rect.y1 <= rect.y0 {
            return Ok(());
        }
        self.inserter.flat_rect(&self.view, &mut self.polys, rect, z as f64, color)
    }

    /// Blob shadow: an ellipse on the object's `y = center.y` plane with
    /// radii `rx`, `rz`, darkening what is under it by shade `g`. `detailed`
    /// selects 32 instead of 8 vertices.
    pub fn insert_shadow(&mut self, center: IVec3, rx: i32, rz: i32, g: i32, detailed: bool) -> Result<(), RenderError> {
        let n: i32 = if detailed { 32 } else { 8 };
        let verts: Vec<IVec3> = (0..n)
            .map(|i| {
                let a = (i * PHD_ONE / n) as i16;
                IVec3::new(
                    center.x + ((rx as i64 * phd_sin(a) as i64) >> W2V_SHIFT) as i32,
                    center.y,
                    center.z + ((rz as i64 * phd_cos(a) as i64) >> W2V_SHIFT) as i32,
                )
            })
            .collect();
        if transform_object_vertices(&self.ms, &self.view, &verts, true, &mut self.vbuf).is_none() {
            return Ok(());
        }
        insert_translucent(
            self.inserter.as_ref(),
            &self.view,
            &mut self.polys,
            &self.vbuf,
            clamp_shade(g),
            SortMetric::AverageZ,
        )
    }
}

fn overlay_texture(page: PageId) -> ObjectTexture {
    ObjectTexture {
        draw: DrawType::SemiTransparent,
        page,
        ..ObjectTexture::default()
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
