//! Transform, clip, insert and sort: everything between the scene walker
//! and a rasterizer.

pub mod clip;
pub mod config;
pub mod context;
pub mod insert;
pub mod lighting;
pub mod polylist;
pub mod transform;
pub mod types;
pub mod view;

pub use config::{Backend, DetailLevel, RenderConfig, RenderMode, WindowParams};
pub use context::{ReflectionFilter, RenderContext};
pub use lighting::Lighting;
pub use polylist::{HwKind, HwPrimitive, HwSource, HwVertex, PolyList, PolyType, Primitive, RenderError};
pub use types::{ClipFlags, MAX_SHADE, PhdVbuf, SortMetric};
pub use view::ViewState;
