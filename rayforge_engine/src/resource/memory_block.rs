/// Dedicated device memory allocation owned by exactly one resource

use std::sync::Arc;

use crate::graphics_device::{GraphicsDevice, MemoryHandle};

/// One device memory allocation
///
/// Never shared: each buffer, image or acceleration structure owns its own
/// block (no sub-allocation). The allocation is freed on drop.
pub struct MemoryBlock {
    device: Arc<dyn GraphicsDevice>,
    handle: MemoryHandle,
    size: u64,
    memory_type_index: u32,
    host_visible: bool,
}

impl MemoryBlock {
    pub(crate) fn new(
        device: Arc<dyn GraphicsDevice>,
        handle: MemoryHandle,
        size: u64,
        memory_type_index: u32,
        host_visible: bool,
    ) -> Self {
        Self {
            device,
            handle,
            size,
            memory_type_index,
            host_visible,
        }
    }

    pub fn handle(&self) -> MemoryHandle {
        self.handle
    }

    /// Allocation size in bytes (the resource's memory requirement, not its logical size)
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    /// True if the host can map this memory
    pub fn is_host_visible(&self) -> bool {
        self.host_visible
    }
}

impl Drop for MemoryBlock {
    fn drop(&mut self) {
        self.device.free_memory(self.handle);
    }
}

impl std::fmt::Debug for MemoryBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlock")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("memory_type_index", &self.memory_type_index)
            .field("host_visible", &self.host_visible)
            .finish()
    }
}

// ===== PENDING OBJECT =====

/// Scope guard for a device object created but not yet handed to its owner
///
/// Destroys the object when dropped, unless `disarm` was called. Lets the
/// multi-step create/allocate/bind sequences bail out with `?` at any point.
pub(crate) struct PendingObject<'a, H: Copy> {
    device: &'a dyn GraphicsDevice,
    handle: H,
    destroy: fn(&dyn GraphicsDevice, H),
    armed: bool,
}

impl<'a, H: Copy> PendingObject<'a, H> {
    pub(crate) fn new(device: &'a dyn GraphicsDevice, handle: H, destroy: fn(&dyn GraphicsDevice, H)) -> Self {
        Self {
            device,
            handle,
            destroy,
            armed: true,
        }
    }

    /// Keep the object alive and return its handle
    pub(crate) fn disarm(mut self) -> H {
        self.armed = false;
        self.handle
    }
}

impl<H: Copy> Drop for PendingObject<'_, H> {
    fn drop(&mut self) {
        if self.armed {
            (self.destroy)(self.device, self.handle);
        }
    }
}
