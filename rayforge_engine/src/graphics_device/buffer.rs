/// Buffer descriptor, usage flags and vertex/index formats

use bitflags::bitflags;

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsageFlags: u32 {
        /// Source of a transfer command (staging buffers)
        const TRANSFER_SRC = 1 << 0;
        /// Destination of a transfer command
        const TRANSFER_DST = 1 << 1;
        /// Uniform/constant buffer
        const UNIFORM = 1 << 4;
        /// Storage buffer
        const STORAGE = 1 << 5;
        /// Index buffer
        const INDEX = 1 << 6;
        /// Vertex buffer
        const VERTEX = 1 << 7;
        /// Acceleration-structure input, instance data or build scratch
        const RAY_TRACING = 1 << 10;
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsageFlags,
}

/// Region of a buffer-to-buffer copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// Buffer data format for vertex attributes
///
/// Only the float formats accepted as acceleration-structure vertex input
/// are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum BufferFormat {
    R32G32_SFLOAT,       // vec2 (8 bytes)
    R32G32B32_SFLOAT,    // vec3 (12 bytes)
    R32G32B32A32_SFLOAT, // vec4 (16 bytes)
}

impl BufferFormat {
    /// Returns size in bytes for this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            BufferFormat::R32G32_SFLOAT => 8,
            BufferFormat::R32G32B32_SFLOAT => 12,
            BufferFormat::R32G32B32A32_SFLOAT => 16,
        }
    }
}

/// Index type for indexed geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}
