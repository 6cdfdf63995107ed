//! Scene module
//!
//! Drawables (GPU geometry of each unique mesh) and the instances that place
//! them, in the form the acceleration structure builder consumes.

mod drawable;
mod scene;

pub use drawable::{Drawable, Material, Vertex};
pub use scene::{to_row_major_3x4, InstanceData, InstanceKind, Scene, SceneInstance};
