//! Ray tracing module
//!
//! Bottom-level structures per mesh, the top-level structure over the scene
//! instances, and the builder driving both.

mod acceleration_structure;
mod builder;
mod geometry;
mod instance;

pub use acceleration_structure::{AccelerationStructure, Blas, BlasSource};
pub use builder::{
    AccelerationStructureBuilder, AccelerationStructureConfig, BuildState, BuildStats,
    STATIC_GROUP_CUSTOM_INDEX,
};
pub use geometry::convert_to_geometry;
pub use instance::{GeometryInstance, TlasInstance, MAX_INSTANCE_CUSTOM_INDEX};
