/// Synchronization types recorded into command buffers

use bitflags::bitflags;

use crate::graphics_device::{ImageAspect, ImageHandle, ImageLayout};

bitflags! {
    /// Memory access types made available or visible by a barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const SHADER_READ = 1 << 0;
        const SHADER_WRITE = 1 << 1;
        const TRANSFER_READ = 1 << 2;
        const TRANSFER_WRITE = 1 << 3;
        const HOST_WRITE = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 5;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 6;
        const ACCELERATION_STRUCTURE_READ = 1 << 7;
        const ACCELERATION_STRUCTURE_WRITE = 1 << 8;
    }
}

bitflags! {
    /// Pipeline stages a barrier waits on or blocks
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStageFlags: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const TRANSFER = 1 << 1;
        const EARLY_FRAGMENT_TESTS = 1 << 2;
        const FRAGMENT_SHADER = 1 << 3;
        const COMPUTE_SHADER = 1 << 4;
        const RAY_TRACING_SHADER = 1 << 5;
        const ACCELERATION_STRUCTURE_BUILD = 1 << 6;
        const HOST = 1 << 7;
        const BOTTOM_OF_PIPE = 1 << 8;
    }
}

/// Global memory barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBarrier {
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

/// Image memory barrier with a layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    pub image: ImageHandle,
    pub aspect: ImageAspect,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}
