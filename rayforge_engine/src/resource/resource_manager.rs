/// Central resource manager for GPU memory, buffers, images and textures.
///
/// The ResourceManager is the only path through which device memory is
/// allocated. Every buffer or image it returns is allocated and bound, and
/// owns its memory (one dedicated allocation per resource, no pooling).
///
/// Uploads go through host-visible staging buffers and blocking single-use
/// command scopes. Textures are cached by path for the lifetime of the
/// manager.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferCopy, BufferDesc, BufferUsageFlags, Extent2D, GraphicsDevice, ImageAspect, ImageBarrier,
    ImageDesc, ImageFormat, ImageLayout, ImageUsageFlags, ImageViewHandle, MemoryProperties,
    MemoryPropertyFlags, MemoryRequirements, PipelineStageFlags, SamplerDesc, SamplerHandle,
    AddressMode, Filter,
};
use crate::log::Diagnostics;
use crate::resource::layout::layout_transition_access;
use crate::resource::memory_block::PendingObject;
use crate::resource::{
    Buffer, Image, ImageCrateLoader, ImageLoader, ImageView, MemoryBlock, PixelData, RenderImage,
    Sampler, SingleUseCommand, Texture,
};
use crate::{rf_bail, rf_debug, rf_err, rf_error, rf_info, rf_trace};

const SOURCE: &str = "rayforge::ResourceManager";

// ===== CONFIG =====

/// ResourceManager configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceManagerConfig {
    /// Format of textures loaded by create_texture (4 bytes per texel)
    pub texture_format: ImageFormat,
    /// Sampler used for every loaded texture
    pub texture_sampler: SamplerDesc,
    /// Format of depth images
    pub depth_format: ImageFormat,
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self {
            texture_format: ImageFormat::R8G8B8A8_SRGB,
            texture_sampler: SamplerDesc {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                address_mode: AddressMode::Repeat,
                max_anisotropy: Some(16.0),
            },
            depth_format: ImageFormat::D32_FLOAT,
        }
    }
}

// ===== DESCRIPTOR INFO =====

/// Combined image-sampler descriptor payload of one texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorImageInfo {
    pub sampler: Option<SamplerHandle>,
    pub image_view: ImageViewHandle,
    pub image_layout: ImageLayout,
}

// ===== RESOURCE MANAGER =====

pub struct ResourceManager {
    device: Arc<dyn GraphicsDevice>,
    diagnostics: Diagnostics,
    config: ResourceManagerConfig,
    memory_properties: MemoryProperties,
    loader: Box<dyn ImageLoader>,
    /// Loaded textures, indexed by the value returned from create_texture
    textures: Vec<Texture>,
    /// Parallel to `textures`
    descriptor_infos: Vec<DescriptorImageInfo>,
    /// Path -> index into `textures`
    texture_indices: FxHashMap<PathBuf, usize>,
}

impl ResourceManager {
    /// Create a resource manager for a device
    ///
    /// The memory-type table is read once here.
    pub fn new(device: Arc<dyn GraphicsDevice>, diagnostics: Diagnostics, config: ResourceManagerConfig) -> Self {
        let memory_properties = device.memory_properties();
        rf_debug!(diagnostics, SOURCE, "{} memory types available", memory_properties.memory_types.len());
        Self {
            device,
            diagnostics,
            config,
            memory_properties,
            loader: Box::new(ImageCrateLoader),
            textures: Vec::new(),
            descriptor_infos: Vec::new(),
            texture_indices: FxHashMap::default(),
        }
    }

    /// Replace the pixel decoder used by create_texture
    pub fn with_image_loader(mut self, loader: Box<dyn ImageLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn config(&self) -> &ResourceManagerConfig {
        &self.config
    }

    pub fn memory_properties(&self) -> &MemoryProperties {
        &self.memory_properties
    }

    // ===== MEMORY =====

    /// Index of the first memory type allowed by `type_bits` that has all `properties`
    ///
    /// # Errors
    ///
    /// `AllocationFailed` if no memory type matches. Not retried with weaker properties.
    pub fn find_memory_type_from_properties(&self, type_bits: u32, properties: MemoryPropertyFlags) -> Result<u32> {
        self.memory_properties
            .find_memory_type(type_bits, properties)
            .ok_or_else(|| {
                rf_err!(
                    self.diagnostics,
                    AllocationFailed,
                    SOURCE,
                    "No memory type in {:#b} provides {:?}",
                    type_bits,
                    properties
                )
            })
    }

    /// Allocate a dedicated MemoryBlock satisfying `requirements` and `properties`
    pub fn allocate_memory(&self, requirements: &MemoryRequirements, properties: MemoryPropertyFlags) -> Result<MemoryBlock> {
        let memory_type_index = self.find_memory_type_from_properties(requirements.memory_type_bits, properties)?;
        let handle = self
            .device
            .allocate_memory(requirements.size, memory_type_index)
            .map_err(|e| {
                rf_error!(
                    self.diagnostics,
                    SOURCE,
                    "Failed to allocate {} bytes from memory type {}: {}",
                    requirements.size,
                    memory_type_index,
                    e
                );
                match e {
                    Error::OutOfMemory => Error::OutOfMemory,
                    other => Error::AllocationFailed(format!(
                        "{} bytes from memory type {}: {}",
                        requirements.size, memory_type_index, other
                    )),
                }
            })?;

        let host_visible = self
            .memory_properties
            .property_flags(memory_type_index)
            .is_some_and(|flags| flags.contains(MemoryPropertyFlags::HOST_VISIBLE));

        Ok(MemoryBlock::new(
            self.device.clone(),
            handle,
            requirements.size,
            memory_type_index,
            host_visible,
        ))
    }

    // ===== BUFFERS =====

    /// Create a buffer with its own bound memory
    ///
    /// # Arguments
    ///
    /// * `size` - Size in bytes (must be > 0)
    /// * `usage` - Buffer usage flags
    /// * `properties` - Required memory properties (e.g. DEVICE_LOCAL, HOST_VISIBLE)
    ///
    /// # Errors
    ///
    /// `CreationFailed` if the device rejects the buffer, `AllocationFailed`
    /// or `OutOfMemory` if no memory can be allocated and bound. Nothing is
    /// leaked on failure.
    pub fn create_buffer(&self, size: u64, usage: BufferUsageFlags, properties: MemoryPropertyFlags) -> Result<Buffer> {
        if size == 0 {
            rf_bail!(self.diagnostics, CreationFailed, SOURCE,
                "Buffer size must be greater than zero (usage {:?})", usage);
        }

        let handle = self
            .device
            .create_buffer(&BufferDesc { size, usage })
            .map_err(|e| rf_err!(self.diagnostics, CreationFailed, SOURCE,
                "Failed to create buffer of {} bytes: {}", size, e))?;
        let pending = PendingObject::new(self.device.as_ref(), handle, |device, handle| device.destroy_buffer(handle));

        let requirements = self
            .device
            .buffer_memory_requirements(handle)
            .map_err(|e| rf_err!(self.diagnostics, AllocationFailed, SOURCE,
                "Failed to query buffer memory requirements: {}", e))?;
        let memory = self.allocate_memory(&requirements, properties)?;
        self.device
            .bind_buffer_memory(handle, memory.handle(), 0)
            .map_err(|e| rf_err!(self.diagnostics, AllocationFailed, SOURCE,
                "Failed to bind buffer memory: {}", e))?;

        let handle = pending.disarm();
        rf_trace!(self.diagnostics, SOURCE, "Created buffer {:?} ({} bytes, {:?}, memory type {})",
            handle, size, usage, memory.memory_type_index());
        Ok(Buffer::new(self.device.clone(), handle, size, usage, memory))
    }

    /// Create a device-local buffer filled with `data` through a staging buffer
    ///
    /// TRANSFER_DST is added to `usage`. The destination is fully populated
    /// when this returns; the staging buffer is already released.
    pub fn create_optimal_buffer(&self, data: &[u8], usage: BufferUsageFlags) -> Result<Buffer> {
        if data.is_empty() {
            rf_bail!(self.diagnostics, CreationFailed, SOURCE,
                "Cannot create an optimal buffer from empty data (usage {:?})", usage);
        }
        let size = data.len() as u64;

        let staging = self.create_staging_buffer(data)?;
        let buffer = self.create_buffer(
            size,
            usage | BufferUsageFlags::TRANSFER_DST,
            MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        self.with_single_use_command(|cmd| {
            cmd.copy_buffer(&staging, &buffer, BufferCopy { src_offset: 0, dst_offset: 0, size });
            Ok(())
        })?;

        rf_debug!(self.diagnostics, SOURCE, "Uploaded {} bytes to device-local buffer {:?}", size, buffer.handle());
        Ok(buffer)
    }

    /// Typed variant of create_optimal_buffer
    pub fn create_optimal_buffer_from_slice<T: bytemuck::Pod>(&self, data: &[T], usage: BufferUsageFlags) -> Result<Buffer> {
        self.create_optimal_buffer(bytemuck::cast_slice(data), usage)
    }

    /// Re-upload part of an existing device-local buffer through a staging buffer
    ///
    /// # Errors
    ///
    /// `InvalidResource` if the range exceeds the buffer or the buffer lacks TRANSFER_DST.
    pub fn update_optimal_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.check_range(buffer, offset, data.len())?;
        if !buffer.usage().contains(BufferUsageFlags::TRANSFER_DST) {
            rf_bail!(self.diagnostics, InvalidResource, SOURCE,
                "Buffer {:?} was not created with TRANSFER_DST usage", buffer.handle());
        }

        let staging = self.create_staging_buffer(data)?;
        self.with_single_use_command(|cmd| {
            cmd.copy_buffer(&staging, buffer, BufferCopy {
                src_offset: 0,
                dst_offset: offset,
                size: data.len() as u64,
            });
            Ok(())
        })
    }

    /// Write `data` directly into a host-visible buffer
    ///
    /// # Errors
    ///
    /// `InvalidResource` if the range exceeds the buffer or its memory is not host-visible.
    pub fn copy_data_to_memory(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<()> {
        self.check_range(buffer, offset, data.len())?;
        if !buffer.is_host_visible() {
            rf_bail!(self.diagnostics, InvalidResource, SOURCE,
                "Buffer {:?} is not host-visible, use update_optimal_buffer", buffer.handle());
        }
        if data.is_empty() {
            return Ok(());
        }
        self.device
            .write_memory(buffer.memory().handle(), offset, data)
            .map_err(|e| rf_err!(self.diagnostics, BackendError, SOURCE,
                "Failed to write {} bytes to buffer {:?}: {}", data.len(), buffer.handle(), e))
    }

    fn create_staging_buffer(&self, data: &[u8]) -> Result<Buffer> {
        let staging = self.create_buffer(
            data.len() as u64,
            BufferUsageFlags::TRANSFER_SRC,
            MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
        )?;
        self.copy_data_to_memory(&staging, 0, data)?;
        Ok(staging)
    }

    fn check_range(&self, buffer: &Buffer, offset: u64, len: usize) -> Result<()> {
        let end = offset.checked_add(len as u64);
        if end.map_or(true, |end| end > buffer.size()) {
            rf_bail!(self.diagnostics, InvalidResource, SOURCE,
                "Range of {} bytes at offset {} exceeds buffer {:?} of {} bytes",
                len, offset, buffer.handle(), buffer.size());
        }
        Ok(())
    }

    // ===== IMAGES =====

    /// Create a 2D image with its own bound memory, in the Undefined layout
    pub fn create_image(&self, desc: ImageDesc, properties: MemoryPropertyFlags) -> Result<Image> {
        if desc.extent.width == 0 || desc.extent.height == 0 {
            rf_bail!(self.diagnostics, CreationFailed, SOURCE,
                "Image extent must be non-zero ({}x{})", desc.extent.width, desc.extent.height);
        }

        let handle = self
            .device
            .create_image(&desc)
            .map_err(|e| rf_err!(self.diagnostics, CreationFailed, SOURCE,
                "Failed to create {}x{} {:?} image: {}", desc.extent.width, desc.extent.height, desc.format, e))?;
        let pending = PendingObject::new(self.device.as_ref(), handle, |device, handle| device.destroy_image(handle));

        let requirements = self
            .device
            .image_memory_requirements(handle)
            .map_err(|e| rf_err!(self.diagnostics, AllocationFailed, SOURCE,
                "Failed to query image memory requirements: {}", e))?;
        let memory = self.allocate_memory(&requirements, properties)?;
        self.device
            .bind_image_memory(handle, memory.handle(), 0)
            .map_err(|e| rf_err!(self.diagnostics, AllocationFailed, SOURCE,
                "Failed to bind image memory: {}", e))?;

        Ok(Image::new(self.device.clone(), pending.disarm(), desc, memory))
    }

    pub fn create_image_view(&self, image: &Image, aspect: ImageAspect) -> Result<ImageView> {
        let handle = self
            .device
            .create_image_view(image.handle(), image.format(), aspect)
            .map_err(|e| rf_err!(self.diagnostics, CreationFailed, SOURCE,
                "Failed to create {:?} view of image {:?}: {}", aspect, image.handle(), e))?;
        Ok(ImageView::new(self.device.clone(), handle, image.handle(), aspect))
    }

    /// Record a layout transition barrier and update the tracked layout
    ///
    /// # Errors
    ///
    /// `InvalidState` if the image is not currently in `old`,
    /// `UnsupportedTransition` if the pair has no access-mask entry.
    pub fn transition_image_layout(
        &self,
        cmd: &SingleUseCommand,
        image: &mut Image,
        old: ImageLayout,
        new: ImageLayout,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
    ) -> Result<()> {
        if image.layout() != old {
            rf_bail!(self.diagnostics, InvalidState, SOURCE,
                "Image {:?} is in {:?}, transition expects {:?}", image.handle(), image.layout(), old);
        }
        let Some(access) = layout_transition_access(old, new) else {
            rf_error!(self.diagnostics, SOURCE, "Unsupported layout transition {:?} -> {:?}", old, new);
            return Err(Error::UnsupportedTransition { old, new });
        };

        cmd.pipeline_barrier(src_stage, dst_stage, &[], &[ImageBarrier {
            image: image.handle(),
            aspect: image.aspect(),
            old_layout: old,
            new_layout: new,
            src_access: access.src_access,
            dst_access: access.dst_access,
        }]);
        image.set_layout(new);
        Ok(())
    }

    /// Upload RGBA8 pixels into a new sampled image, left in ShaderReadOnly
    pub fn create_texture_image(&self, pixels: &PixelData) -> Result<Image> {
        let expected = PixelData::expected_len(pixels.width, pixels.height);
        if pixels.width == 0 || pixels.height == 0 || expected != Some(pixels.pixels.len()) {
            rf_bail!(self.diagnostics, InvalidResource, SOURCE,
                "Pixel data of {} bytes does not match a {}x{} RGBA8 image",
                pixels.pixels.len(), pixels.width, pixels.height);
        }
        if self.config.texture_format.bytes_per_pixel() != 4 {
            rf_bail!(self.diagnostics, InvalidResource, SOURCE,
                "Texture format {:?} is not a 4-byte format", self.config.texture_format);
        }

        let staging = self.create_staging_buffer(&pixels.pixels)?;
        let mut image = self.create_image(
            ImageDesc {
                extent: Extent2D { width: pixels.width, height: pixels.height },
                format: self.config.texture_format,
                usage: ImageUsageFlags::TRANSFER_DST | ImageUsageFlags::SAMPLED,
            },
            MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        self.with_single_use_command(|cmd| {
            self.transition_image_layout(
                cmd,
                &mut image,
                ImageLayout::Undefined,
                ImageLayout::TransferDst,
                PipelineStageFlags::TOP_OF_PIPE,
                PipelineStageFlags::TRANSFER,
            )?;
            cmd.copy_buffer_to_image(&staging, &image);
            self.transition_image_layout(
                cmd,
                &mut image,
                ImageLayout::TransferDst,
                ImageLayout::ShaderReadOnly,
                PipelineStageFlags::TRANSFER,
                PipelineStageFlags::FRAGMENT_SHADER | PipelineStageFlags::RAY_TRACING_SHADER,
            )
        })?;

        Ok(image)
    }

    pub fn create_texture_sampler(&self) -> Result<Sampler> {
        let desc = self.config.texture_sampler;
        let handle = self
            .device
            .create_sampler(&desc)
            .map_err(|e| rf_err!(self.diagnostics, CreationFailed, SOURCE,
                "Failed to create texture sampler: {}", e))?;
        Ok(Sampler::new(self.device.clone(), handle, desc))
    }

    /// Depth image in the DepthStencilAttachment layout, with a depth view
    pub fn create_depth_image(&self, width: u32, height: u32) -> Result<RenderImage> {
        let mut image = self.create_image(
            ImageDesc {
                extent: Extent2D { width, height },
                format: self.config.depth_format,
                usage: ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            },
            MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        self.with_single_use_command(|cmd| {
            self.transition_image_layout(
                cmd,
                &mut image,
                ImageLayout::Undefined,
                ImageLayout::DepthStencilAttachment,
                PipelineStageFlags::TOP_OF_PIPE,
                PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
        })?;
        let view = self.create_image_view(&image, ImageAspect::Depth)?;
        Ok(RenderImage::new(image, view))
    }

    /// Storage image (STORAGE | TRANSFER_SRC) in the General layout, with a color view
    pub fn create_storage_image(&self, width: u32, height: u32, format: ImageFormat) -> Result<RenderImage> {
        if format.is_depth() {
            rf_bail!(self.diagnostics, InvalidResource, SOURCE,
                "Storage images cannot use the depth format {:?}", format);
        }
        let mut image = self.create_image(
            ImageDesc {
                extent: Extent2D { width, height },
                format,
                usage: ImageUsageFlags::STORAGE | ImageUsageFlags::TRANSFER_SRC,
            },
            MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        self.with_single_use_command(|cmd| {
            self.transition_image_layout(
                cmd,
                &mut image,
                ImageLayout::Undefined,
                ImageLayout::General,
                PipelineStageFlags::TOP_OF_PIPE,
                PipelineStageFlags::RAY_TRACING_SHADER,
            )
        })?;
        let view = self.create_image_view(&image, ImageAspect::Color)?;
        Ok(RenderImage::new(image, view))
    }

    // ===== TEXTURES =====

    /// Load a texture from a file and return its index in the texture table
    ///
    /// A path that was already loaded returns the cached index without
    /// touching the file again.
    pub fn create_texture(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let key = path.to_string_lossy().into_owned();
        if let Some(&index) = self.texture_indices.get(path) {
            rf_trace!(self.diagnostics, SOURCE, "Texture '{}' already loaded at index {}", key, index);
            return Ok(index);
        }

        let pixels = self.loader.load(path).map_err(|e| {
            rf_error!(self.diagnostics, SOURCE, "Failed to load texture '{}': {}", key, e);
            e
        })?;
        let image = self.create_texture_image(&pixels)?;
        let view = self.create_image_view(&image, ImageAspect::Color)?;
        let sampler = self.create_texture_sampler()?;

        let index = self.textures.len();
        self.descriptor_infos.push(DescriptorImageInfo {
            sampler: Some(sampler.handle()),
            image_view: view.handle(),
            image_layout: image.layout(),
        });
        self.textures.push(Texture::new(key.clone(), image, view, sampler));
        self.texture_indices.insert(path.to_path_buf(), index);

        rf_info!(self.diagnostics, SOURCE, "Loaded texture '{}' ({}x{}) at index {}",
            key, pixels.width, pixels.height, index);
        Ok(index)
    }

    pub fn number_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn texture(&self, index: usize) -> Option<&Texture> {
        self.textures.get(index)
    }

    /// Index of an already loaded texture
    pub fn texture_index(&self, path: impl AsRef<Path>) -> Option<usize> {
        self.texture_indices.get(path.as_ref()).copied()
    }

    pub fn descriptor_image_info(&self, index: usize) -> Result<DescriptorImageInfo> {
        self.descriptor_infos.get(index).copied().ok_or_else(|| {
            rf_err!(self.diagnostics, InvalidResource, SOURCE,
                "Texture index {} out of range ({} textures)", index, self.descriptor_infos.len())
        })
    }

    /// Descriptor payloads of all textures, in index order
    pub fn descriptor_image_infos(&self) -> &[DescriptorImageInfo] {
        &self.descriptor_infos
    }

    // ===== SINGLE-USE COMMANDS =====

    /// Allocate and begin a one-time-submit command buffer
    pub fn create_single_use_command(&self) -> Result<SingleUseCommand> {
        SingleUseCommand::begin(self.device.clone()).map_err(|e| {
            rf_error!(self.diagnostics, SOURCE, "Failed to begin single-use command buffer: {}", e);
            e
        })
    }

    /// End, submit and wait for the queue to be idle, then free the command buffer
    pub fn end_single_use_command(&self, cmd: SingleUseCommand) -> Result<()> {
        cmd.submit().map_err(|e| {
            rf_error!(self.diagnostics, SOURCE, "Single-use command submission failed: {}", e);
            e
        })
    }

    /// Run `record` inside a single-use command scope and submit it
    ///
    /// If `record` fails, nothing is submitted and the command buffer is freed.
    pub fn with_single_use_command<T, F>(&self, record: F) -> Result<T>
    where
        F: FnOnce(&SingleUseCommand) -> Result<T>,
    {
        let cmd = self.create_single_use_command()?;
        let value = record(&cmd)?;
        self.end_single_use_command(cmd)?;
        Ok(value)
    }
}

#[cfg(test)]
#[path = "resource_manager_tests.rs"]
mod tests;
