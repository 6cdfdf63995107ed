/// Acceleration-structure build inputs
///
/// These types describe a bottom-level structure (triangle geometries) or a
/// top-level structure (instance count, instances read from a buffer at
/// build time) independently of the backend.

use bitflags::bitflags;

use crate::graphics_device::{BufferFormat, BufferHandle, IndexType};

/// Level of an acceleration structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccelerationStructureType {
    /// Built from triangle geometry
    BottomLevel,
    /// Built from instances of bottom-level structures
    TopLevel,
}

bitflags! {
    /// Build preference flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BuildAccelerationStructureFlags: u32 {
        const ALLOW_UPDATE = 1 << 0;
        const ALLOW_COMPACTION = 1 << 1;
        const PREFER_FAST_TRACE = 1 << 2;
        const PREFER_FAST_BUILD = 1 << 3;
        const LOW_MEMORY = 1 << 4;
    }
}

bitflags! {
    /// Per-geometry flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GeometryFlags: u32 {
        /// Any-hit shaders are never invoked for this geometry
        const OPAQUE = 1 << 0;
        const NO_DUPLICATE_ANY_HIT_INVOCATION = 1 << 1;
    }
}

bitflags! {
    /// Per-instance flags (8 bits in the packed instance record)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GeometryInstanceFlags: u8 {
        const TRIANGLE_CULL_DISABLE = 1 << 0;
        const TRIANGLE_FRONT_COUNTERCLOCKWISE = 1 << 1;
        const FORCE_OPAQUE = 1 << 2;
        const FORCE_NO_OPAQUE = 1 << 3;
    }
}

/// Indexed triangle input of a bottom-level structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryTriangles {
    pub vertex_buffer: BufferHandle,
    pub vertex_offset: u64,
    pub vertex_count: u32,
    pub vertex_stride: u64,
    pub vertex_format: BufferFormat,
    pub index_buffer: BufferHandle,
    pub index_offset: u64,
    pub index_count: u32,
    pub index_type: IndexType,
    /// Optional 3x4 row-major transform applied at build time
    pub transform_buffer: Option<BufferHandle>,
    pub transform_offset: u64,
}

impl GeometryTriangles {
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}

/// One geometry of a bottom-level structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub triangles: GeometryTriangles,
    pub flags: GeometryFlags,
}

/// Everything needed to create and build an acceleration structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccelerationStructureInfo {
    pub ty: AccelerationStructureType,
    pub flags: BuildAccelerationStructureFlags,
    /// Number of instances (top level only)
    pub instance_count: u32,
    /// Triangle geometries (bottom level only)
    pub geometries: Vec<Geometry>,
}

impl AccelerationStructureInfo {
    pub fn bottom_level(flags: BuildAccelerationStructureFlags, geometries: Vec<Geometry>) -> Self {
        Self {
            ty: AccelerationStructureType::BottomLevel,
            flags,
            instance_count: 0,
            geometries,
        }
    }

    pub fn top_level(flags: BuildAccelerationStructureFlags, instance_count: u32) -> Self {
        Self {
            ty: AccelerationStructureType::TopLevel,
            flags,
            instance_count,
            geometries: Vec::new(),
        }
    }

    /// Total triangle count over all geometries
    pub fn triangle_count(&self) -> u64 {
        self.geometries
            .iter()
            .map(|geometry| geometry.triangles.triangle_count() as u64)
            .sum()
    }
}

/// Which memory requirement of an acceleration structure to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccelerationStructureMemoryKind {
    /// Backing memory of the structure itself
    Object,
    /// Scratch memory needed by a full build
    BuildScratch,
}
