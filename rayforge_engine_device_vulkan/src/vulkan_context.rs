/// GpuContext - logical device objects shared by every device call
///
/// Contains everything needed to issue GPU work:
/// - Device for Vulkan API calls
/// - Ray tracing extension loader
/// - Queue for command submission
/// - Transient command pool for single-use command buffers

use ash::vk;
use std::sync::Mutex;

/// Logical device, queue and transient command pool.
///
/// Note: Device destruction is handled by VulkanGraphicsDevice::drop()
/// so the debug messenger and instance are torn down in the right order.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// VK_NV_ray_tracing function table
    pub ray_tracing: ash::nv::ray_tracing::Device,

    /// Queue used for every submission (external synchronization required)
    pub queue: Mutex<vk::Queue>,

    /// Queue family index of `queue`
    pub queue_family: u32,

    /// Pool for single-use command buffers
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    pub command_pool: Mutex<vk::CommandPool>,
}

impl GpuContext {
    /// Create a new GPU context
    ///
    /// # Arguments
    ///
    /// * `instance` - Vulkan instance the device was created from
    /// * `device` - Vulkan logical device
    /// * `queue` - Queue for command submission
    /// * `queue_family` - Queue family index
    /// * `command_pool` - Transient command pool
    pub fn new(
        instance: &ash::Instance,
        device: ash::Device,
        queue: vk::Queue,
        queue_family: u32,
        command_pool: vk::CommandPool,
    ) -> Self {
        let ray_tracing = ash::nv::ray_tracing::Device::new(instance, &device);
        Self {
            device,
            ray_tracing,
            queue: Mutex::new(queue),
            queue_family,
            command_pool: Mutex::new(command_pool),
        }
    }
}
