/*!
# RayForge Engine - Vulkan Device Backend

Vulkan implementation of the RayForge `GraphicsDevice` trait.

This crate provides a headless Vulkan device using the Ash library for
Vulkan bindings and the `VK_NV_ray_tracing` extension for acceleration
structures. Memory is allocated directly through the device; the engine's
`ResourceManager` decides sizes and memory types.

Validation layer support (debug messenger, colored output, statistics) is
compiled in only with the `vulkan-validation` feature.

# Example

```no_run
use std::sync::Arc;
use rayforge_engine::rayforge::device::GraphicsDevice;
use rayforge_engine::rayforge::log::Diagnostics;
use rayforge_engine_device_vulkan::{VulkanDeviceConfig, VulkanGraphicsDevice};

let device = VulkanGraphicsDevice::new(VulkanDeviceConfig::default(), Diagnostics::console())?;
let device: Arc<dyn GraphicsDevice> = Arc::new(device);
# Ok::<(), rayforge_engine::rayforge::Error>(())
```
*/

mod vulkan;
mod vulkan_context;
mod vulkan_format;
#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan::{
    DebugOutput, DebugSeverity, RayTracingProperties, VulkanDeviceConfig, VulkanGraphicsDevice,
};

// Re-export debug utilities
#[cfg(feature = "vulkan-validation")]
pub use debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
