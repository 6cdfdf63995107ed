/// Image, image view, sampler and texture resources
///
/// Every type here releases its device object on drop. Composite owners
/// declare their fields so that views and samplers go before the image
/// they reference.

use std::sync::Arc;

use crate::graphics_device::{
    Extent2D, GraphicsDevice, ImageAspect, ImageDesc, ImageFormat, ImageHandle, ImageLayout,
    ImageUsageFlags, ImageViewHandle, SamplerDesc, SamplerHandle,
};
use crate::resource::MemoryBlock;

// ===== IMAGE =====

/// 2D image bound to a dedicated MemoryBlock, tracking its current layout
pub struct Image {
    device: Arc<dyn GraphicsDevice>,
    handle: ImageHandle,
    desc: ImageDesc,
    layout: ImageLayout,
    memory: MemoryBlock,
}

impl Image {
    pub(crate) fn new(device: Arc<dyn GraphicsDevice>, handle: ImageHandle, desc: ImageDesc, memory: MemoryBlock) -> Self {
        Self {
            device,
            handle,
            desc,
            layout: ImageLayout::Undefined,
            memory,
        }
    }

    pub fn handle(&self) -> ImageHandle {
        self.handle
    }

    pub fn extent(&self) -> Extent2D {
        self.desc.extent
    }

    pub fn format(&self) -> ImageFormat {
        self.desc.format
    }

    pub fn usage(&self) -> ImageUsageFlags {
        self.desc.usage
    }

    /// Layout after every transition recorded so far
    pub fn layout(&self) -> ImageLayout {
        self.layout
    }

    pub fn memory(&self) -> &MemoryBlock {
        &self.memory
    }

    /// Aspect implied by the format
    pub fn aspect(&self) -> ImageAspect {
        if self.desc.format.is_depth() {
            ImageAspect::Depth
        } else {
            ImageAspect::Color
        }
    }

    pub(crate) fn set_layout(&mut self, layout: ImageLayout) {
        self.layout = layout;
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        self.device.destroy_image(self.handle);
    }
}

// ===== IMAGE VIEW =====

pub struct ImageView {
    device: Arc<dyn GraphicsDevice>,
    handle: ImageViewHandle,
    image: ImageHandle,
    aspect: ImageAspect,
}

impl ImageView {
    pub(crate) fn new(device: Arc<dyn GraphicsDevice>, handle: ImageViewHandle, image: ImageHandle, aspect: ImageAspect) -> Self {
        Self { device, handle, image, aspect }
    }

    pub fn handle(&self) -> ImageViewHandle {
        self.handle
    }

    /// Image this view was created from
    pub fn image(&self) -> ImageHandle {
        self.image
    }

    pub fn aspect(&self) -> ImageAspect {
        self.aspect
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        self.device.destroy_image_view(self.handle);
    }
}

// ===== SAMPLER =====

pub struct Sampler {
    device: Arc<dyn GraphicsDevice>,
    handle: SamplerHandle,
    desc: SamplerDesc,
}

impl Sampler {
    pub(crate) fn new(device: Arc<dyn GraphicsDevice>, handle: SamplerHandle, desc: SamplerDesc) -> Self {
        Self { device, handle, desc }
    }

    pub fn handle(&self) -> SamplerHandle {
        self.handle
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.device.destroy_sampler(self.handle);
    }
}

// ===== TEXTURE =====

/// Sampled texture loaded from a file
///
/// Registered in the ResourceManager texture table under its path.
pub struct Texture {
    path: String,
    sampler: Sampler,
    view: ImageView,
    image: Image,
}

impl Texture {
    pub(crate) fn new(path: String, image: Image, view: ImageView, sampler: Sampler) -> Self {
        Self { path, sampler, view, image }
    }

    /// Key of this texture in the texture table
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn view(&self) -> &ImageView {
        &self.view
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }
}

// ===== RENDER IMAGE =====

/// Image with a view, used for depth buffers and storage output images
pub struct RenderImage {
    view: ImageView,
    image: Image,
}

impl RenderImage {
    pub(crate) fn new(image: Image, view: ImageView) -> Self {
        Self { view, image }
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn view(&self) -> &ImageView {
        &self.view
    }
}
