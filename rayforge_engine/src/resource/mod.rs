//! Resource management module
//!
//! Allocation, upload and lifetime of GPU buffers, images, samplers and
//! textures, plus the single-use command scope and layout transition rules.

mod resource_manager;
pub mod memory_block;
pub mod buffer;
pub mod image;
pub mod command;
pub mod layout;
pub mod texture_loader;

pub use resource_manager::{ResourceManager, ResourceManagerConfig, DescriptorImageInfo};
pub use memory_block::MemoryBlock;
pub use buffer::Buffer;
pub use image::{Image, ImageView, Sampler, Texture, RenderImage};
pub use command::SingleUseCommand;
pub use layout::{layout_transition_access, LayoutTransitionAccess, SUPPORTED_TRANSITIONS};
pub use texture_loader::{ImageLoader, ImageCrateLoader, PixelData};
