//! Per-vertex shade for object meshes.

use glam::IVec3;

use crate::engine::types::{PhdVbuf, clamp_shade};
use crate::engine::view::ViewState;
use crate::math::{MatrixStack, W2V_SHIFT};
use crate::world::mesh::MeshLighting;

/// How the current object is lit. Set by the caller before `put_polygons`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lighting {
    /// Same shade everywhere.
    Ambient { adder: i32 },
    /// `adder + (normal · light) >> 16`; `vector` is a world-space unit
    /// vector scaled by `1 << 14`, `divider` attenuates it.
    Directional {
        adder: i32,
        divider: i32,
        vector: IVec3,
    },
}

impl Default for Lighting {
    fn default() -> Self {
        Lighting::Ambient { adder: 0x1000 }
    }
}

/// Light direction in the current object's local frame.
fn light_in_object_space(ms: &MatrixStack, vector: IVec3, divider: i32) -> IVec3 {
    // world → view with the camera matrix, then back into the object frame
    // with the transpose of the current top
    let [vx, vy, vz] = ms.w2v().rotate(vector);
    let view = IVec3::new(
        (vx >> W2V_SHIFT) as i32,
        (vy >> W2V_SHIFT) as i32,
        (vz >> W2V_SHIFT) as i32,
    );
    let [ox, oy, oz] = ms.top().rotate_inverse(view);
    let d = divider.max(1) as i64;
    IVec3::new(
        ((ox >> W2V_SHIFT) / d) as i32,
        ((oy >> W2V_SHIFT) / d) as i32,
        ((oz >> W2V_SHIFT) / d) as i32,
    )
}

/// Fill `g` of already transformed vertices, then add depth fog.
pub fn calc_vertex_light(
    ms: &MatrixStack,
    view: &ViewState,
    lighting: &Lighting,
    mesh: &MeshLighting,
    vbuf: &mut [PhdVbuf],
) {
    match (mesh, *lighting) {
        (MeshLighting::Shades(shades), _) => {
            for (vb, &s) in vbuf.iter_mut().zip(shades.iter()) {
                vb.g = s as i32;
            }
        }
        (
            MeshLighting::Normals(normals),
            Lighting::Directional {
                adder,
                divider,
                vector,
            },
        ) => {
            let l = light_in_object_space(ms, vector, divider);
            for (vb, n) in vbuf.iter_mut().zip(normals.iter()) {
                let dot = n.x as i64 * l.x as i64 + n.y as i64 * l.y as i64 + n.z as i64 * l.z as i64;
                vb.g = adder + (dot >> 16) as i32;
            }
        }
        (MeshLighting::Normals(_), Lighting::Ambient { adder }) => {
            for vb in vbuf.iter_mut() {
                vb.g = adder;
            }
        }
    }

    for vb in vbuf.iter_mut() {
        vb.g = clamp_shade(vb.g + view.calculate_fog_shade(vb.zv));
    }
}

/// Environment-map coordinates (`0.0 ..= 1.0`) for a vertex normal, taken
/// from the normal's direction in view space.
pub fn env_uv(ms: &MatrixStack, normal: IVec3) -> (f64, f64) {
    let [x, y, _] = ms.top().rotate(normal);
    let scale = (1i64 << (2 * W2V_SHIFT)) as f64;
    let u = (x as f64 / scale * 0.5 + 0.5).clamp(0.0, 1.0);
    let v = (y as f64 / scale * 0.5 + 0.5).clamp(0.0, 1.0);
    (u, v)
}
