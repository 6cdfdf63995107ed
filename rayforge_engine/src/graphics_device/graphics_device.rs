/// GraphicsDevice trait - the leaf abstraction over the low-level graphics API
///
/// A device owns the logical device, one queue, a transient command pool and
/// the memory-type table. Every object it creates is referred to by an opaque
/// handle and must be destroyed explicitly; the RAII owners in the resource
/// module take care of that.

use crate::error::Result;
use crate::graphics_device::{
    AccelerationStructureInfo, AccelerationStructureMemoryKind, BufferCopy, BufferDesc,
    Extent2D, ImageAspect, ImageBarrier, ImageDesc, ImageFormat, ImageLayout, MemoryBarrier,
    MemoryProperties, MemoryRequirements, PipelineStageFlags, SamplerDesc,
};

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw backend handle
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Raw backend handle
            pub const fn as_raw(self) -> u64 {
                self.0
            }
        }
    };
}

define_handle!(
    /// Opaque buffer handle
    BufferHandle
);
define_handle!(
    /// Opaque image handle
    ImageHandle
);
define_handle!(
    /// Opaque image view handle
    ImageViewHandle
);
define_handle!(
    /// Opaque sampler handle
    SamplerHandle
);
define_handle!(
    /// Opaque device memory allocation handle
    MemoryHandle
);
define_handle!(
    /// Opaque command buffer handle (allocated from the transient pool)
    CommandBufferHandle
);
define_handle!(
    /// Opaque acceleration structure handle
    AccelerationStructureHandle
);

/// Low-level graphics device
///
/// Implemented by backend-specific devices (e.g., VulkanGraphicsDevice).
/// Shared as `Arc<dyn GraphicsDevice>` by every component that needs it.
///
/// Host-side issuance is single-threaded: the transient command pool and the
/// queue are not meant for concurrent recording from several threads.
pub trait GraphicsDevice: Send + Sync {
    // ===== MEMORY =====

    /// Memory-type table of the physical device
    fn memory_properties(&self) -> MemoryProperties;

    /// Allocate device memory from one memory type
    ///
    /// # Arguments
    ///
    /// * `size` - Allocation size in bytes
    /// * `memory_type_index` - Index into the memory-type table
    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<MemoryHandle>;

    /// Free a device memory allocation
    fn free_memory(&self, memory: MemoryHandle);

    /// Write bytes into host-visible memory (map, copy, unmap)
    fn write_memory(&self, memory: MemoryHandle, offset: u64, data: &[u8]) -> Result<()>;

    /// Read bytes back from host-visible memory
    fn read_memory(&self, memory: MemoryHandle, offset: u64, size: u64) -> Result<Vec<u8>>;

    // ===== BUFFERS =====

    /// Create a buffer object (not yet backed by memory)
    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle>;

    fn destroy_buffer(&self, buffer: BufferHandle);

    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> Result<MemoryRequirements>;

    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: MemoryHandle, offset: u64) -> Result<()>;

    // ===== IMAGES =====

    /// Create an image object in the Undefined layout (not yet backed by memory)
    fn create_image(&self, desc: &ImageDesc) -> Result<ImageHandle>;

    fn destroy_image(&self, image: ImageHandle);

    fn image_memory_requirements(&self, image: ImageHandle) -> Result<MemoryRequirements>;

    fn bind_image_memory(&self, image: ImageHandle, memory: MemoryHandle, offset: u64) -> Result<()>;

    fn create_image_view(
        &self,
        image: ImageHandle,
        format: ImageFormat,
        aspect: ImageAspect,
    ) -> Result<ImageViewHandle>;

    fn destroy_image_view(&self, view: ImageViewHandle);

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle>;

    fn destroy_sampler(&self, sampler: SamplerHandle);

    // ===== COMMAND BUFFERS =====

    /// Allocate a primary command buffer from the transient pool
    fn allocate_command_buffer(&self) -> Result<CommandBufferHandle>;

    /// Begin recording with the one-time-submit usage
    fn begin_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()>;

    fn end_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()>;

    /// Submit to the queue and block until the queue is idle
    fn submit_and_wait_idle(&self, command_buffer: CommandBufferHandle) -> Result<()>;

    fn free_command_buffer(&self, command_buffer: CommandBufferHandle);

    // ===== RECORDING =====

    fn cmd_copy_buffer(
        &self,
        command_buffer: CommandBufferHandle,
        src: BufferHandle,
        dst: BufferHandle,
        region: BufferCopy,
    );

    /// Copy tightly packed texels from a buffer into the whole image
    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        extent: Extent2D,
    );

    fn cmd_pipeline_barrier(
        &self,
        command_buffer: CommandBufferHandle,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        memory_barriers: &[MemoryBarrier],
        image_barriers: &[ImageBarrier],
    );

    // ===== ACCELERATION STRUCTURES =====

    fn create_acceleration_structure(
        &self,
        info: &AccelerationStructureInfo,
    ) -> Result<AccelerationStructureHandle>;

    fn destroy_acceleration_structure(&self, handle: AccelerationStructureHandle);

    fn acceleration_structure_memory_requirements(
        &self,
        handle: AccelerationStructureHandle,
        kind: AccelerationStructureMemoryKind,
    ) -> Result<MemoryRequirements>;

    fn bind_acceleration_structure_memory(
        &self,
        handle: AccelerationStructureHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<()>;

    /// Opaque 64-bit reference stored in top-level instance records
    ///
    /// Only valid once memory is bound.
    fn acceleration_structure_reference(&self, handle: AccelerationStructureHandle) -> Result<u64>;

    /// Record a full (non-update) build
    ///
    /// # Arguments
    ///
    /// * `info` - Same description the structure was created with
    /// * `instance_buffer` - Packed instance records (top level only)
    /// * `dst` - Structure to build
    /// * `scratch` - Scratch buffer, at least the BuildScratch requirement in size
    fn cmd_build_acceleration_structure(
        &self,
        command_buffer: CommandBufferHandle,
        info: &AccelerationStructureInfo,
        instance_buffer: Option<BufferHandle>,
        dst: AccelerationStructureHandle,
        scratch: BufferHandle,
    );
}
