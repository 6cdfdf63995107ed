/// VulkanGraphicsDevice - GraphicsDevice implementation on ash + VK_NV_ray_tracing
///
/// Headless: no surface and no swapchain. One queue family supporting
/// graphics and compute is used for every submission.

use ash::vk;
use ash::vk::Handle;
use rayforge_engine::rayforge::device::{
    AccelerationStructureHandle, AccelerationStructureInfo, AccelerationStructureMemoryKind,
    BufferCopy, BufferDesc, BufferHandle, CommandBufferHandle, Extent2D, GraphicsDevice,
    ImageAspect, ImageBarrier, ImageDesc, ImageFormat, ImageHandle, ImageLayout,
    ImageViewHandle, MemoryBarrier, MemoryHandle, MemoryProperties, MemoryRequirements,
    MemoryType, PipelineStageFlags, SamplerDesc, SamplerHandle,
};
use rayforge_engine::rayforge::log::Diagnostics;
use rayforge_engine::rayforge::{Error, Result};
use rayforge_engine::{rf_debug, rf_err, rf_error, rf_info, rf_warn};
use rustc_hash::FxHashMap;
use std::ffi::CString;
use std::sync::{Mutex, MutexGuard};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    acceleration_structure_type_to_vk, access_flags_to_vk, address_mode_to_vk, buffer_format_to_vk,
    buffer_usage_to_vk, build_flags_to_vk, filter_to_vk, geometry_flags_to_vk, image_format_to_vk,
    image_layout_to_vk, image_usage_to_vk, index_type_to_vk, memory_kind_to_vk,
    memory_property_flags_from_vk, pipeline_stage_to_vk, subresource_range,
};

const SOURCE: &str = "rayforge::vulkan";

// ===== CONFIGURATION =====

/// Which validation messages are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Where validation messages are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    Console,
    /// Append to a log file
    File(String),
    Both(String),
}

/// Vulkan device configuration
#[derive(Debug, Clone)]
pub struct VulkanDeviceConfig {
    /// Enable VK_LAYER_KHRONOS_validation and the debug messenger
    /// (only honored when built with the `vulkan-validation` feature)
    pub enable_validation: bool,
    pub application_name: String,
    pub application_version: u32,
    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    /// Abort the process on the first validation error
    pub break_on_validation_error: bool,
}

impl Default for VulkanDeviceConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            application_name: "RayForge Application".to_string(),
            application_version: vk::make_api_version(0, 1, 0, 0),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            break_on_validation_error: false,
        }
    }
}

/// Ray tracing limits of the selected physical device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RayTracingProperties {
    pub shader_group_handle_size: u32,
    pub max_recursion_depth: u32,
    pub max_geometry_count: u64,
    pub max_instance_count: u64,
    pub max_triangle_count: u64,
    pub max_descriptor_set_acceleration_structures: u32,
}

// ===== HANDLE CONVERSIONS =====

fn vk_buffer(handle: BufferHandle) -> vk::Buffer {
    vk::Buffer::from_raw(handle.as_raw())
}

fn vk_image(handle: ImageHandle) -> vk::Image {
    vk::Image::from_raw(handle.as_raw())
}

fn vk_memory(handle: MemoryHandle) -> vk::DeviceMemory {
    vk::DeviceMemory::from_raw(handle.as_raw())
}

fn vk_command_buffer(handle: CommandBufferHandle) -> vk::CommandBuffer {
    vk::CommandBuffer::from_raw(handle.as_raw())
}

fn vk_acceleration_structure(handle: AccelerationStructureHandle) -> vk::AccelerationStructureNV {
    vk::AccelerationStructureNV::from_raw(handle.as_raw())
}

fn memory_requirements_from_vk(requirements: vk::MemoryRequirements) -> MemoryRequirements {
    MemoryRequirements {
        size: requirements.size,
        alignment: requirements.alignment,
        memory_type_bits: requirements.memory_type_bits,
    }
}

fn is_out_of_memory(result: vk::Result) -> bool {
    matches!(
        result,
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY
    )
}

/// Triangle geometries of a bottom-level description
fn geometries_to_vk(info: &AccelerationStructureInfo) -> Vec<vk::GeometryNV<'static>> {
    info.geometries
        .iter()
        .map(|geometry| {
            let triangles = &geometry.triangles;
            let vk_triangles = vk::GeometryTrianglesNV::default()
                .vertex_data(vk_buffer(triangles.vertex_buffer))
                .vertex_offset(triangles.vertex_offset)
                .vertex_count(triangles.vertex_count)
                .vertex_stride(triangles.vertex_stride)
                .vertex_format(buffer_format_to_vk(triangles.vertex_format))
                .index_data(vk_buffer(triangles.index_buffer))
                .index_offset(triangles.index_offset)
                .index_count(triangles.index_count)
                .index_type(index_type_to_vk(triangles.index_type))
                .transform_data(triangles.transform_buffer.map(vk_buffer).unwrap_or_default())
                .transform_offset(triangles.transform_offset);
            vk::GeometryNV::default()
                .geometry_type(vk::GeometryTypeNV::TRIANGLES)
                .geometry(vk::GeometryDataNV::default().triangles(vk_triangles))
                .flags(geometry_flags_to_vk(geometry.flags))
        })
        .collect()
}

// ===== HOST ACCESS =====

/// Mapped and flushed/invalidated range of an allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MappedRange {
    offset: u64,
    size: u64,
}

/// Range to map for host access to `offset..offset + len`, None if it does not fit the allocation
///
/// The start is rounded down and the end rounded up to `atom_size`, clamped to the allocation end.
fn mapped_range(offset: u64, len: u64, allocation_size: u64, atom_size: u64) -> Option<MappedRange> {
    let end = offset.checked_add(len)?;
    if end > allocation_size {
        return None;
    }
    let start = offset - offset % atom_size;
    let aligned_end = end.div_ceil(atom_size).saturating_mul(atom_size).min(allocation_size);
    Some(MappedRange {
        offset: start,
        size: aligned_end - start,
    })
}

// ===== DEVICE =====

/// Vulkan graphics device
pub struct VulkanGraphicsDevice {
    /// Vulkan entry (must outlive the instance)
    _entry: ash::Entry,

    instance: ash::Instance,

    physical_device: vk::PhysicalDevice,

    /// Logical device, queue and command pool
    context: GpuContext,

    /// Memory-type table, queried once
    memory_properties: MemoryProperties,

    ray_tracing_properties: RayTracingProperties,

    device_name: String,

    /// Max sampler anisotropy, None if the feature is unsupported
    max_sampler_anisotropy: Option<f32>,

    /// Alignment of flushed/invalidated ranges on non-coherent memory
    non_coherent_atom_size: u64,

    /// Size of every live allocation
    allocation_sizes: Mutex<FxHashMap<MemoryHandle, u64>>,

    diagnostics: Diagnostics,

    #[cfg(feature = "vulkan-validation")]
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanGraphicsDevice {
    /// Create a headless Vulkan device with VK_NV_ray_tracing enabled
    ///
    /// # Arguments
    ///
    /// * `config` - Device configuration
    /// * `diagnostics` - Logging handle used by every device call
    ///
    /// # Errors
    ///
    /// `InitializationFailed` if the loader, the instance or the logical device
    /// cannot be created, or if no GPU supports VK_NV_ray_tracing.
    pub fn new(config: VulkanDeviceConfig, diagnostics: Diagnostics) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| rf_err!(diagnostics, InitializationFailed, SOURCE, "Failed to load Vulkan: {:?}", e))?;

            let app_name = CString::new(config.application_name.as_str())
                .map_err(|e| rf_err!(diagnostics, InitializationFailed, SOURCE, "Invalid application name: {}", e))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(config.application_version)
                .engine_name(c"RayForge Engine")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let enable_validation = Self::validation_enabled(&config, &diagnostics);

            let mut extension_names = Vec::new();
            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if enable_validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| rf_err!(diagnostics, InitializationFailed, SOURCE, "Failed to create Vulkan instance: {:?}", e))?;

            #[cfg(feature = "vulkan-validation")]
            let debug_messenger = if enable_validation {
                match Self::create_debug_messenger(&entry, &instance, &config, &diagnostics) {
                    Ok(messenger) => Some(messenger),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            match Self::create_device(entry, instance, diagnostics) {
                #[cfg(feature = "vulkan-validation")]
                Ok(mut device) => {
                    device.debug_messenger = debug_messenger;
                    Ok(device)
                }
                #[cfg(not(feature = "vulkan-validation"))]
                Ok(device) => Ok(device),
                Err((instance, e)) => {
                    #[cfg(feature = "vulkan-validation")]
                    if let Some((debug_utils, messenger)) = debug_messenger {
                        crate::debug::cleanup_debug_config();
                        debug_utils.destroy_debug_utils_messenger(messenger, None);
                    }
                    instance.destroy_instance(None);
                    Err(e)
                }
            }
        }
    }

    fn validation_enabled(config: &VulkanDeviceConfig, diagnostics: &Diagnostics) -> bool {
        if cfg!(feature = "vulkan-validation") {
            config.enable_validation
        } else {
            if config.enable_validation {
                rf_warn!(diagnostics, SOURCE,
                    "Validation requested but the vulkan-validation feature is disabled");
            }
            false
        }
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &VulkanDeviceConfig,
        diagnostics: &Diagnostics,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        crate::debug::init_debug_config(crate::debug::Config {
            severity: config.debug_severity,
            output: config.debug_output.clone(),
            break_on_error: config.break_on_validation_error,
        });

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(crate::debug::severity_flags(config.debug_severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

        let messenger = debug_utils
            .create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| rf_err!(diagnostics, InitializationFailed, SOURCE, "Failed to create debug messenger: {:?}", e))?;

        rf_debug!(diagnostics, SOURCE, "Validation layers enabled");
        Ok((debug_utils, messenger))
    }

    /// Pick a physical device and create the logical device
    ///
    /// Hands the instance back on failure so the caller can destroy it.
    unsafe fn create_device(
        entry: ash::Entry,
        instance: ash::Instance,
        diagnostics: Diagnostics,
    ) -> std::result::Result<Self, (ash::Instance, Error)> {
        let (physical_device, queue_family) = match Self::pick_physical_device(&instance, &diagnostics) {
            Ok(selection) => selection,
            Err(e) => return Err((instance, e)),
        };

        let mut ray_tracing = vk::PhysicalDeviceRayTracingPropertiesNV::default();
        let (device_name, max_anisotropy_limit, non_coherent_atom_size) = {
            let mut properties2 = vk::PhysicalDeviceProperties2::default().push_next(&mut ray_tracing);
            instance.get_physical_device_properties2(physical_device, &mut properties2);
            let name = properties2
                .properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let limits = properties2.properties.limits;
            (name, limits.max_sampler_anisotropy, limits.non_coherent_atom_size.max(1))
        };
        let ray_tracing_properties = RayTracingProperties {
            shader_group_handle_size: ray_tracing.shader_group_handle_size,
            max_recursion_depth: ray_tracing.max_recursion_depth,
            max_geometry_count: ray_tracing.max_geometry_count,
            max_instance_count: ray_tracing.max_instance_count,
            max_triangle_count: ray_tracing.max_triangle_count,
            max_descriptor_set_acceleration_structures: ray_tracing
                .max_descriptor_set_acceleration_structures,
        };

        let supported_features = instance.get_physical_device_features(physical_device);
        let anisotropy_supported = supported_features.sampler_anisotropy == vk::TRUE;

        let queue_priorities = [1.0];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities)];

        let device_extension_names = [ash::nv::ray_tracing::NAME.as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(anisotropy_supported);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .enabled_features(&device_features);

        let device = match instance.create_device(physical_device, &device_create_info, None) {
            Ok(device) => device,
            Err(e) => {
                let error = rf_err!(diagnostics, InitializationFailed, SOURCE, "Failed to create logical device: {:?}", e);
                return Err((instance, error));
            }
        };

        let queue = device.get_device_queue(queue_family, 0);

        let pool_create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = match device.create_command_pool(&pool_create_info, None) {
            Ok(pool) => pool,
            Err(e) => {
                let error = rf_err!(diagnostics, InitializationFailed, SOURCE, "Failed to create command pool: {:?}", e);
                device.destroy_device(None);
                return Err((instance, error));
            }
        };

        let vk_memory_properties = instance.get_physical_device_memory_properties(physical_device);
        let memory_types = vk_memory_properties.memory_types[..vk_memory_properties.memory_type_count as usize]
            .iter()
            .map(|memory_type| MemoryType {
                property_flags: memory_property_flags_from_vk(memory_type.property_flags),
                heap_index: memory_type.heap_index,
            })
            .collect();

        rf_info!(diagnostics, SOURCE, "Using '{}' (queue family {})", device_name, queue_family);
        rf_debug!(diagnostics, SOURCE, "Ray tracing properties: {:?}", ray_tracing_properties);

        let context = GpuContext::new(&instance, device, queue, queue_family, command_pool);

        Ok(Self {
            _entry: entry,
            instance,
            physical_device,
            context,
            memory_properties: MemoryProperties { memory_types },
            ray_tracing_properties,
            device_name,
            max_sampler_anisotropy: anisotropy_supported.then_some(max_anisotropy_limit),
            non_coherent_atom_size,
            allocation_sizes: Mutex::new(FxHashMap::default()),
            diagnostics,
            #[cfg(feature = "vulkan-validation")]
            debug_messenger: None,
        })
    }

    /// First GPU exposing VK_NV_ray_tracing and a graphics+compute queue,
    /// discrete GPUs first
    unsafe fn pick_physical_device(
        instance: &ash::Instance,
        diagnostics: &Diagnostics,
    ) -> Result<(vk::PhysicalDevice, u32)> {
        let mut physical_devices = instance
            .enumerate_physical_devices()
            .map_err(|e| rf_err!(diagnostics, InitializationFailed, SOURCE, "Failed to enumerate physical devices: {:?}", e))?;

        physical_devices.sort_by_key(|&physical_device| {
            let properties = instance.get_physical_device_properties(physical_device);
            properties.device_type != vk::PhysicalDeviceType::DISCRETE_GPU
        });

        for physical_device in physical_devices {
            let extensions = match instance.enumerate_device_extension_properties(physical_device) {
                Ok(extensions) => extensions,
                Err(_) => continue,
            };
            let has_ray_tracing = extensions
                .iter()
                .any(|extension| {
                    extension
                        .extension_name_as_c_str()
                        .map_or(false, |name| name == ash::nv::ray_tracing::NAME)
                });
            if !has_ray_tracing {
                continue;
            }

            let queue_family = instance
                .get_physical_device_queue_family_properties(physical_device)
                .iter()
                .position(|family| {
                    family.queue_flags.contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
                });
            if let Some(queue_family) = queue_family {
                return Ok((physical_device, queue_family as u32));
            }
        }

        Err(rf_err!(diagnostics, InitializationFailed, SOURCE,
            "No GPU with {:?} and a graphics+compute queue found", ash::nv::ray_tracing::NAME))
    }

    /// Name of the selected GPU
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn ray_tracing_properties(&self) -> RayTracingProperties {
        self.ray_tracing_properties
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.context
                .device
                .device_wait_idle()
                .map_err(|e| rf_err!(self.diagnostics, BackendError, SOURCE, "Failed to wait for device idle: {:?}", e))
        }
    }

    /// Map the whole allocation (offset 0, VK_WHOLE_SIZE keeps flush ranges valid)
    fn allocation_sizes(&self) -> MutexGuard<'_, FxHashMap<MemoryHandle, u64>> {
        self.allocation_sizes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Atom-aligned range covering `offset..offset + len` of a live allocation
    fn host_range(&self, memory: MemoryHandle, offset: u64, len: u64) -> Result<MappedRange> {
        let Some(allocation_size) = self.allocation_sizes().get(&memory).copied() else {
            return Err(rf_err!(self.diagnostics, InvalidResource, SOURCE, "Unknown memory {:?}", memory));
        };
        mapped_range(offset, len, allocation_size, self.non_coherent_atom_size).ok_or_else(|| {
            rf_err!(self.diagnostics, InvalidResource, SOURCE,
                "Range {}..{} is outside {:?} ({} bytes)", offset, offset.saturating_add(len), memory, allocation_size)
        })
    }

    unsafe fn map(&self, memory: MemoryHandle, range: &MappedRange) -> Result<*mut u8> {
        self.context
            .device
            .map_memory(vk_memory(memory), range.offset, range.size, vk::MemoryMapFlags::empty())
            .map(|ptr| ptr as *mut u8)
            .map_err(|e| rf_err!(self.diagnostics, BackendError, SOURCE, "Failed to map memory: {:?}", e))
    }

    fn vk_range(memory: MemoryHandle, range: &MappedRange) -> vk::MappedMemoryRange<'static> {
        vk::MappedMemoryRange::default()
            .memory(vk_memory(memory))
            .offset(range.offset)
            .size(range.size)
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    // ===== MEMORY =====

    fn memory_properties(&self) -> MemoryProperties {
        self.memory_properties.clone()
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<MemoryHandle> {
        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type_index);
        unsafe {
            match self.context.device.allocate_memory(&allocate_info, None) {
                Ok(memory) => {
                    let handle = MemoryHandle::from_raw(memory.as_raw());
                    self.allocation_sizes().insert(handle, size);
                    Ok(handle)
                }
                Err(e) if is_out_of_memory(e) => {
                    rf_error!(self.diagnostics, SOURCE,
                        "Out of memory allocating {} bytes from memory type {}", size, memory_type_index);
                    Err(Error::OutOfMemory)
                }
                Err(e) => Err(rf_err!(self.diagnostics, AllocationFailed, SOURCE,
                    "Failed to allocate {} bytes from memory type {}: {:?}", size, memory_type_index, e)),
            }
        }
    }

    fn free_memory(&self, memory: MemoryHandle) {
        self.allocation_sizes().remove(&memory);
        unsafe {
            self.context.device.free_memory(vk_memory(memory), None);
        }
    }

    fn write_memory(&self, memory: MemoryHandle, offset: u64, data: &[u8]) -> Result<()> {
        let range = self.host_range(memory, offset, data.len() as u64)?;
        if data.is_empty() {
            return Ok(());
        }
        unsafe {
            let ptr = self.map(memory, &range)?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add((offset - range.offset) as usize), data.len());
            let flushed = self.context.device.flush_mapped_memory_ranges(&[Self::vk_range(memory, &range)]);
            self.context.device.unmap_memory(vk_memory(memory));
            flushed.map_err(|e| rf_err!(self.diagnostics, BackendError, SOURCE, "Failed to flush mapped memory: {:?}", e))
        }
    }

    fn read_memory(&self, memory: MemoryHandle, offset: u64, size: u64) -> Result<Vec<u8>> {
        let range = self.host_range(memory, offset, size)?;
        if size == 0 {
            return Ok(Vec::new());
        }
        unsafe {
            let ptr = self.map(memory, &range)?;
            if let Err(e) = self.context.device.invalidate_mapped_memory_ranges(&[Self::vk_range(memory, &range)]) {
                self.context.device.unmap_memory(vk_memory(memory));
                return Err(rf_err!(self.diagnostics, BackendError, SOURCE, "Failed to invalidate mapped memory: {:?}", e));
            }
            let bytes = std::slice::from_raw_parts(ptr.add((offset - range.offset) as usize), size as usize).to_vec();
            self.context.device.unmap_memory(vk_memory(memory));
            Ok(bytes)
        }
    }

    // ===== BUFFERS =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle> {
        let create_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(buffer_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        unsafe {
            self.context
                .device
                .create_buffer(&create_info, None)
                .map(|buffer| BufferHandle::from_raw(buffer.as_raw()))
                .map_err(|e| rf_err!(self.diagnostics, CreationFailed, SOURCE,
                    "Failed to create buffer ({} bytes, {:?}): {:?}", desc.size, desc.usage, e))
        }
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        unsafe {
            self.context.device.destroy_buffer(vk_buffer(buffer), None);
        }
    }

    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> Result<MemoryRequirements> {
        unsafe {
            Ok(memory_requirements_from_vk(
                self.context.device.get_buffer_memory_requirements(vk_buffer(buffer)),
            ))
        }
    }

    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: MemoryHandle, offset: u64) -> Result<()> {
        unsafe {
            self.context
                .device
                .bind_buffer_memory(vk_buffer(buffer), vk_memory(memory), offset)
                .map_err(|e| rf_err!(self.diagnostics, BackendError, SOURCE, "Failed to bind buffer memory: {:?}", e))
        }
    }

    // ===== IMAGES =====

    fn create_image(&self, desc: &ImageDesc) -> Result<ImageHandle> {
        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(image_format_to_vk(desc.format))
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(image_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        unsafe {
            self.context
                .device
                .create_image(&create_info, None)
                .map(|image| ImageHandle::from_raw(image.as_raw()))
                .map_err(|e| rf_err!(self.diagnostics, CreationFailed, SOURCE,
                    "Failed to create {}x{} {:?} image: {:?}", desc.extent.width, desc.extent.height, desc.format, e))
        }
    }

    fn destroy_image(&self, image: ImageHandle) {
        unsafe {
            self.context.device.destroy_image(vk_image(image), None);
        }
    }

    fn image_memory_requirements(&self, image: ImageHandle) -> Result<MemoryRequirements> {
        unsafe {
            Ok(memory_requirements_from_vk(
                self.context.device.get_image_memory_requirements(vk_image(image)),
            ))
        }
    }

    fn bind_image_memory(&self, image: ImageHandle, memory: MemoryHandle, offset: u64) -> Result<()> {
        unsafe {
            self.context
                .device
                .bind_image_memory(vk_image(image), vk_memory(memory), offset)
                .map_err(|e| rf_err!(self.diagnostics, BackendError, SOURCE, "Failed to bind image memory: {:?}", e))
        }
    }

    fn create_image_view(
        &self,
        image: ImageHandle,
        format: ImageFormat,
        aspect: ImageAspect,
    ) -> Result<ImageViewHandle> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(vk_image(image))
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(image_format_to_vk(format))
            .subresource_range(subresource_range(aspect));
        unsafe {
            self.context
                .device
                .create_image_view(&create_info, None)
                .map(|view| ImageViewHandle::from_raw(view.as_raw()))
                .map_err(|e| rf_err!(self.diagnostics, CreationFailed, SOURCE, "Failed to create image view: {:?}", e))
        }
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        unsafe {
            self.context
                .device
                .destroy_image_view(vk::ImageView::from_raw(view.as_raw()), None);
        }
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        let address_mode = address_mode_to_vk(desc.address_mode);
        let anisotropy = match (desc.max_anisotropy, self.max_sampler_anisotropy) {
            (Some(requested), Some(limit)) => Some(requested.min(limit)),
            (Some(_), None) => {
                rf_warn!(self.diagnostics, SOURCE, "Sampler anisotropy unsupported, disabling it");
                None
            }
            (None, _) => None,
        };
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .compare_enable(false)
            .min_lod(0.0)
            .max_lod(0.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false);
        unsafe {
            self.context
                .device
                .create_sampler(&create_info, None)
                .map(|sampler| SamplerHandle::from_raw(sampler.as_raw()))
                .map_err(|e| rf_err!(self.diagnostics, CreationFailed, SOURCE, "Failed to create sampler: {:?}", e))
        }
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        unsafe {
            self.context
                .device
                .destroy_sampler(vk::Sampler::from_raw(sampler.as_raw()), None);
        }
    }

    // ===== COMMAND BUFFERS =====

    fn allocate_command_buffer(&self) -> Result<CommandBufferHandle> {
        let pool = self.context.command_pool.lock()
            .map_err(|_| rf_err!(self.diagnostics, BackendError, SOURCE, "Command pool lock poisoned"))?;
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(*pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        unsafe {
            let command_buffers = self
                .context
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| rf_err!(self.diagnostics, AllocationFailed, SOURCE, "Failed to allocate command buffer: {:?}", e))?;
            command_buffers
                .first()
                .map(|command_buffer| CommandBufferHandle::from_raw(command_buffer.as_raw()))
                .ok_or_else(|| rf_err!(self.diagnostics, AllocationFailed, SOURCE, "Driver returned no command buffer"))
        }
    }

    fn begin_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.context
                .device
                .begin_command_buffer(vk_command_buffer(command_buffer), &begin_info)
                .map_err(|e| rf_err!(self.diagnostics, BackendError, SOURCE, "Failed to begin command buffer: {:?}", e))
        }
    }

    fn end_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        unsafe {
            self.context
                .device
                .end_command_buffer(vk_command_buffer(command_buffer))
                .map_err(|e| rf_err!(self.diagnostics, BackendError, SOURCE, "Failed to end command buffer: {:?}", e))
        }
    }

    fn submit_and_wait_idle(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        let command_buffers = [vk_command_buffer(command_buffer)];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        let queue = self.context.queue.lock()
            .map_err(|_| rf_err!(self.diagnostics, BackendError, SOURCE, "Queue lock poisoned"))?;
        unsafe {
            self.context
                .device
                .queue_submit(*queue, &[submit_info], vk::Fence::null())
                .map_err(|e| rf_err!(self.diagnostics, BackendError, SOURCE, "Failed to submit command buffer: {:?}", e))?;
            self.context
                .device
                .queue_wait_idle(*queue)
                .map_err(|e| rf_err!(self.diagnostics, BackendError, SOURCE, "Failed to wait for queue idle: {:?}", e))
        }
    }

    fn free_command_buffer(&self, command_buffer: CommandBufferHandle) {
        match self.context.command_pool.lock() {
            Ok(pool) => unsafe {
                self.context
                    .device
                    .free_command_buffers(*pool, &[vk_command_buffer(command_buffer)]);
            },
            Err(_) => {
                rf_error!(self.diagnostics, SOURCE, "Command pool lock poisoned, leaking command buffer");
            }
        }
    }

    // ===== RECORDING =====

    fn cmd_copy_buffer(
        &self,
        command_buffer: CommandBufferHandle,
        src: BufferHandle,
        dst: BufferHandle,
        region: BufferCopy,
    ) {
        let copy = vk::BufferCopy {
            src_offset: region.src_offset,
            dst_offset: region.dst_offset,
            size: region.size,
        };
        unsafe {
            self.context.device.cmd_copy_buffer(
                vk_command_buffer(command_buffer),
                vk_buffer(src),
                vk_buffer(dst),
                &[copy],
            );
        }
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        extent: Extent2D,
    ) {
        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            });
        unsafe {
            self.context.device.cmd_copy_buffer_to_image(
                vk_command_buffer(command_buffer),
                vk_buffer(src),
                vk_image(dst),
                image_layout_to_vk(dst_layout),
                &[region],
            );
        }
    }

    fn cmd_pipeline_barrier(
        &self,
        command_buffer: CommandBufferHandle,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        memory_barriers: &[MemoryBarrier],
        image_barriers: &[ImageBarrier],
    ) {
        let vk_memory_barriers: Vec<vk::MemoryBarrier> = memory_barriers
            .iter()
            .map(|barrier| {
                vk::MemoryBarrier::default()
                    .src_access_mask(access_flags_to_vk(barrier.src_access))
                    .dst_access_mask(access_flags_to_vk(barrier.dst_access))
            })
            .collect();
        let vk_image_barriers: Vec<vk::ImageMemoryBarrier> = image_barriers
            .iter()
            .map(|barrier| {
                vk::ImageMemoryBarrier::default()
                    .old_layout(image_layout_to_vk(barrier.old_layout))
                    .new_layout(image_layout_to_vk(barrier.new_layout))
                    .src_access_mask(access_flags_to_vk(barrier.src_access))
                    .dst_access_mask(access_flags_to_vk(barrier.dst_access))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(vk_image(barrier.image))
                    .subresource_range(subresource_range(barrier.aspect))
            })
            .collect();
        unsafe {
            self.context.device.cmd_pipeline_barrier(
                vk_command_buffer(command_buffer),
                pipeline_stage_to_vk(src_stage),
                pipeline_stage_to_vk(dst_stage),
                vk::DependencyFlags::empty(),
                &vk_memory_barriers,
                &[],
                &vk_image_barriers,
            );
        }
    }

    // ===== ACCELERATION STRUCTURES =====

    fn create_acceleration_structure(
        &self,
        info: &AccelerationStructureInfo,
    ) -> Result<AccelerationStructureHandle> {
        let geometries = geometries_to_vk(info);
        let vk_info = vk::AccelerationStructureInfoNV::default()
            .ty(acceleration_structure_type_to_vk(info.ty))
            .flags(build_flags_to_vk(info.flags))
            .instance_count(info.instance_count)
            .geometries(&geometries);
        let create_info = vk::AccelerationStructureCreateInfoNV::default()
            .compacted_size(0)
            .info(vk_info);
        unsafe {
            self.context
                .ray_tracing
                .create_acceleration_structure(&create_info, None)
                .map(|handle| AccelerationStructureHandle::from_raw(handle.as_raw()))
                .map_err(|e| rf_err!(self.diagnostics, CreationFailed, SOURCE,
                    "Failed to create {:?} acceleration structure: {:?}", info.ty, e))
        }
    }

    fn destroy_acceleration_structure(&self, handle: AccelerationStructureHandle) {
        unsafe {
            self.context
                .ray_tracing
                .destroy_acceleration_structure(vk_acceleration_structure(handle), None);
        }
    }

    fn acceleration_structure_memory_requirements(
        &self,
        handle: AccelerationStructureHandle,
        kind: AccelerationStructureMemoryKind,
    ) -> Result<MemoryRequirements> {
        let info = vk::AccelerationStructureMemoryRequirementsInfoNV::default()
            .ty(memory_kind_to_vk(kind))
            .acceleration_structure(vk_acceleration_structure(handle));
        unsafe {
            let requirements = self
                .context
                .ray_tracing
                .get_acceleration_structure_memory_requirements(&info);
            Ok(memory_requirements_from_vk(requirements.memory_requirements))
        }
    }

    fn bind_acceleration_structure_memory(
        &self,
        handle: AccelerationStructureHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<()> {
        let bind_info = vk::BindAccelerationStructureMemoryInfoNV::default()
            .acceleration_structure(vk_acceleration_structure(handle))
            .memory(vk_memory(memory))
            .memory_offset(offset);
        unsafe {
            self.context
                .ray_tracing
                .bind_acceleration_structure_memory(&[bind_info])
                .map_err(|e| rf_err!(self.diagnostics, BackendError, SOURCE,
                    "Failed to bind acceleration structure memory: {:?}", e))
        }
    }

    fn acceleration_structure_reference(&self, handle: AccelerationStructureHandle) -> Result<u64> {
        unsafe {
            self.context
                .ray_tracing
                .get_acceleration_structure_handle(vk_acceleration_structure(handle))
                .map_err(|e| rf_err!(self.diagnostics, BuildFailed, SOURCE,
                    "Failed to get acceleration structure handle: {:?}", e))
        }
    }

    fn cmd_build_acceleration_structure(
        &self,
        command_buffer: CommandBufferHandle,
        info: &AccelerationStructureInfo,
        instance_buffer: Option<BufferHandle>,
        dst: AccelerationStructureHandle,
        scratch: BufferHandle,
    ) {
        let geometries = geometries_to_vk(info);
        let vk_info = vk::AccelerationStructureInfoNV::default()
            .ty(acceleration_structure_type_to_vk(info.ty))
            .flags(build_flags_to_vk(info.flags))
            .instance_count(info.instance_count)
            .geometries(&geometries);
        unsafe {
            self.context.ray_tracing.cmd_build_acceleration_structure(
                vk_command_buffer(command_buffer),
                &vk_info,
                instance_buffer.map(vk_buffer).unwrap_or_default(),
                0,
                false,
                vk_acceleration_structure(dst),
                vk::AccelerationStructureNV::null(),
                vk_buffer(scratch),
                0,
            );
        }
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            // Wait for device to finish
            self.context.device.device_wait_idle().ok();

            // 1. Destroy the transient command pool (frees any leftover command buffers)
            if let Ok(mut pool) = self.context.command_pool.lock() {
                if *pool != vk::CommandPool::null() {
                    self.context.device.destroy_command_pool(*pool, None);
                    *pool = vk::CommandPool::null();
                }
            }

            // 2. Destroy device
            self.context.device.destroy_device(None);

            // 3. Stop callbacks, then destroy the debug messenger BEFORE the instance
            #[cfg(feature = "vulkan-validation")]
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                crate::debug::cleanup_debug_config();
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            // 4. Destroy instance
            self.instance.destroy_instance(None);
        }
    }
}

impl std::fmt::Debug for VulkanGraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanGraphicsDevice")
            .field("device_name", &self.device_name)
            .field("queue_family", &self.context.queue_family)
            .field("memory_types", &self.memory_properties.memory_types.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "vulkan_tests.rs"]
mod tests;
