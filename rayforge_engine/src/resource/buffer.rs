/// Buffer resource owning its device memory

use std::sync::Arc;

use crate::graphics_device::{BufferHandle, BufferUsageFlags, GraphicsDevice};
use crate::resource::MemoryBlock;

/// GPU buffer bound to a dedicated MemoryBlock
///
/// Created only by the ResourceManager, so a Buffer is always allocated and
/// bound. The buffer object is destroyed on drop, then its memory is freed.
pub struct Buffer {
    device: Arc<dyn GraphicsDevice>,
    handle: BufferHandle,
    size: u64,
    usage: BufferUsageFlags,
    // Dropped after the buffer object is destroyed in Drop::drop
    memory: MemoryBlock,
}

impl Buffer {
    pub(crate) fn new(
        device: Arc<dyn GraphicsDevice>,
        handle: BufferHandle,
        size: u64,
        usage: BufferUsageFlags,
        memory: MemoryBlock,
    ) -> Self {
        Self {
            device,
            handle,
            size,
            usage,
            memory,
        }
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Logical size in bytes, as requested at creation
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> BufferUsageFlags {
        self.usage
    }

    pub fn memory(&self) -> &MemoryBlock {
        &self.memory
    }

    pub fn is_host_visible(&self) -> bool {
        self.memory.is_host_visible()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.device.destroy_buffer(self.handle);
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("usage", &self.usage)
            .field("memory", &self.memory)
            .finish()
    }
}
