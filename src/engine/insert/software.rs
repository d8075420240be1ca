//! Records for the software rasterizer: integer corners, affine or
//! perspective texturing picked by depth.

use crate::engine::clip::{ShadedVertex, TexturedVertex, XyVertex};
use crate::engine::config::Backend;
use crate::engine::insert::{Depth, PolygonInserter, ScreenRect};
use crate::engine::polylist::{
    AffineVertex, PerspVertex, PolyList, PolyVerts, Primitive, RenderError, ShadeVertex,
};
use crate::engine::view::ViewState;
use crate::world::texture::{ObjectTexture, SpriteId, SpriteTexture};

#[derive(Clone, Copy, Debug)]
pub struct Software {
    /// Textured polygons nearer than this get perspective-correct mapping.
    perspective_distance: i32,
}

impl Software {
    pub fn new(perspective_distance: i32) -> Self {
        Self { perspective_distance }
    }
}

#[inline]
fn px(v: f64) -> i32 {
    v.round() as i32
}

impl PolygonInserter for Software {
    fn backend(&self) -> Backend {
        Backend::Software
    }

    fn textured(
        &self,
        _view: &ViewState,
        polys: &mut PolyList,
        poly: &[TexturedVertex],
        tex: &ObjectTexture,
        depth: Depth,
    ) -> Result<(), RenderError> {
        let prim = if depth.z >= self.perspective_distance as f64 {
            Primitive::Affine {
                page: tex.page,
                draw: tex.draw,
                verts: poly
                    .iter()
                    .map(|p| AffineVertex {
                        x: px(p.x),
                        y: px(p.y),
                        g: p.g as i32,
                        u: (p.u / p.rhw * 65536.0) as i32,
                        v: (p.v / p.rhw * 65536.0) as i32,
                    })
                    .collect(),
            }
        } else {
            Primitive::Persp {
                page: tex.page,
                draw: tex.draw,
                verts: poly
                    .iter()
                    .map(|p| PerspVertex {
                        x: px(p.x),
                        y: px(p.y),
                        g: p.g as i32,
                        rhw: p.rhw as f32,
                        u: p.u as f32,
                        v: p.v as f32,
                    })
                    .collect(),
            }
        };
        polys.push(prim, depth.key)
    }

    fn colored(
        &self,
        _view: &ViewState,
        polys: &mut PolyList,
        poly: &[ShadedVertex],
        color: u8,
        depth: Depth,
    ) -> Result<(), RenderError> {
        let verts = poly
            .iter()
            .map(|p| ShadeVertex {
                x: px(p.x),
                y: px(p.y),
                g: p.g as i32,
            })
            .collect::<PolyVerts<_>>();
        // evenly lit faces skip the shade interpolation
        let flat = verts.windows(2).all(|w| w[0].g == w[1].g);
        let prim = if flat {
            Primitive::Flat { color, verts }
        } else {
            Primitive::Gouraud { color, verts }
        };
        polys.push(prim, depth.key)
    }

    fn translucent(
        &self,
        _view: &ViewState,
        polys: &mut PolyList,
        poly: &[XyVertex],
        g: i32,
        depth: Depth,
    ) -> Result<(), RenderError> {
        let verts = poly
            .iter()
            .map(|p| ShadeVertex {
                x: px(p.x),
                y: px(p.y),
                g,
            })
            .collect();
        polys.push(Primitive::Translucent { g, verts }, depth.key)
    }

    fn line(
        &self,
        _view: &ViewState,
        polys: &mut PolyList,
        p0: (f64, f64),
        p1: (f64, f64),
        z: f64,
        color: u8,
    ) -> Result<(), RenderError> {
        let prim = Primitive::Line {
            x0: px(p0.0),
            y0: px(p0.1),
            x1: px(p1.0),
            y1: px(p1.1),
            color,
        };
        polys.push(prim, z.max(0.0) as u32)
    }

    fn flat_rect(
        &self,
        _view: &ViewState,
        polys: &mut PolyList,
        rect: ScreenRect,
        z: f64,
        color: u8,
    ) -> Result<(), RenderError> {
        let prim = Primitive::FlatRect {
            x0: px(rect.x0),
            y0: px(rect.y0),
            x1: px(rect.x1),
            y1: px(rect.y1),
            color,
        };
        polys.push(prim, z.max(0.0) as u32)
    }

    fn sprite(
        &self,
        _view: &ViewState,
        polys: &mut PolyList,
        rect: ScreenRect,
        z: f64,
        g: i32,
        id: SpriteId,
        _sprite: &SpriteTexture,
    ) -> Result<(), RenderError> {
        let prim = Primitive::Sprite {
            x0: px(rect.x0),
            y0: px(rect.y0),
            x1: px(rect.x1),
            y1: px(rect.y1),
            g,
            sprite: id,
        };
        polys.push(prim, z.max(0.0) as u32)
    }
}
