/*!
# RayForge Engine

Core types for GPU resource management and hardware ray-tracing
acceleration structures.

This crate is backend-agnostic. Every GPU call goes through the
`GraphicsDevice` trait; backend crates (Vulkan) provide the implementation
and are injected as `Arc<dyn GraphicsDevice>` together with a `Diagnostics`
logging handle.

## Architecture

- **GraphicsDevice**: Leaf trait over the low-level device (memory, buffers,
  images, command buffers, acceleration structures)
- **ResourceManager**: Allocation, staged uploads, layout transitions,
  texture cache
- **Scene**: Drawables and their static or dynamic instances
- **AccelerationStructureBuilder**: Bottom-level structures per mesh, one
  top-level structure per scene, storage image

All GPU objects are owned by RAII types that release them on drop.
*/

// Internal modules
mod error;
pub mod log;
pub mod graphics_device;
pub mod resource;
pub mod scene;
pub mod raytracing;

// Main rayforge namespace module
pub mod rayforge {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging sub-module (types only, the rf_* macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{
            DefaultLogger, Diagnostics, LogEntry, LogSeverity, Logger, MemoryLogger, NullLogger,
        };
    }

    // Device trait, handles and value types
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    // Scene sub-module
    pub mod scene {
        pub use crate::scene::*;
    }

    // Ray tracing sub-module
    pub mod raytracing {
        pub use crate::raytracing::*;
    }
}

// Re-export math library at crate root
pub use glam;
