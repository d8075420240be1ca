pub mod mesh;
pub mod room;
pub mod texture;

pub use mesh::{Face3, Face4, Mesh, MeshError, MeshLighting, cube_words};
pub use room::{Room, RoomSprite, RoomVertex};
pub use texture::{
    DepthQTable, DrawType, ObjectTexture, ObjectTextureId, PageId, Palette, SpriteId, SpriteTexture,
    TextureBank, TextureError,
};
