/// Graphics device module - device trait, handles and value types

// Module declarations
pub mod graphics_device;
pub mod memory;
pub mod buffer;
pub mod image;
pub mod command;
pub mod acceleration_structure;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use memory::*;
pub use buffer::*;
pub use image::*;
pub use command::*;
pub use acceleration_structure::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
