/// Conversions between engine value types and their Vulkan equivalents
///
/// Pure functions, no device required. Flag conversions go bit by bit so the
/// engine's bitflags layout never has to match Vulkan's.

use ash::vk;
use rayforge_engine::rayforge::device::{
    AccelerationStructureMemoryKind, AccelerationStructureType, AccessFlags, AddressMode,
    BufferFormat, BufferUsageFlags, BuildAccelerationStructureFlags, Filter, GeometryFlags,
    ImageAspect, ImageFormat, ImageLayout, ImageUsageFlags, IndexType, MemoryPropertyFlags,
    PipelineStageFlags,
};

/// Convert ImageFormat to Vulkan format
pub(crate) fn image_format_to_vk(format: ImageFormat) -> vk::Format {
    match format {
        ImageFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        ImageFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        ImageFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        ImageFormat::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        ImageFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        ImageFormat::D32_FLOAT => vk::Format::D32_SFLOAT,
    }
}

/// Convert BufferFormat (vertex position input) to Vulkan format
pub(crate) fn buffer_format_to_vk(format: BufferFormat) -> vk::Format {
    match format {
        BufferFormat::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        BufferFormat::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
        BufferFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
    }
}

pub(crate) fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

pub(crate) fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::General => vk::ImageLayout::GENERAL,
    }
}

pub(crate) fn image_aspect_to_vk(aspect: ImageAspect) -> vk::ImageAspectFlags {
    match aspect {
        ImageAspect::Color => vk::ImageAspectFlags::COLOR,
        ImageAspect::Depth => vk::ImageAspectFlags::DEPTH,
    }
}

/// Whole-image subresource range (single mip, single layer)
pub(crate) fn subresource_range(aspect: ImageAspect) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: image_aspect_to_vk(aspect),
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

pub(crate) fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub(crate) fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
    }
}

pub(crate) fn buffer_usage_to_vk(usage: BufferUsageFlags) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsageFlags::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsageFlags::TRANSFER_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    if usage.contains(BufferUsageFlags::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsageFlags::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsageFlags::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsageFlags::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsageFlags::RAY_TRACING) {
        flags |= vk::BufferUsageFlags::RAY_TRACING_NV;
    }
    flags
}

pub(crate) fn image_usage_to_vk(usage: ImageUsageFlags) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(ImageUsageFlags::TRANSFER_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(ImageUsageFlags::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(ImageUsageFlags::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(ImageUsageFlags::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(ImageUsageFlags::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    flags
}

/// Memory property flags reported by the physical device
///
/// Vulkan bits the engine has no name for are dropped.
pub(crate) fn memory_property_flags_from_vk(flags: vk::MemoryPropertyFlags) -> MemoryPropertyFlags {
    let mut result = MemoryPropertyFlags::empty();
    if flags.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL) {
        result |= MemoryPropertyFlags::DEVICE_LOCAL;
    }
    if flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
        result |= MemoryPropertyFlags::HOST_VISIBLE;
    }
    if flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
        result |= MemoryPropertyFlags::HOST_COHERENT;
    }
    if flags.contains(vk::MemoryPropertyFlags::HOST_CACHED) {
        result |= MemoryPropertyFlags::HOST_CACHED;
    }
    if flags.contains(vk::MemoryPropertyFlags::LAZILY_ALLOCATED) {
        result |= MemoryPropertyFlags::LAZILY_ALLOCATED;
    }
    result
}

pub(crate) fn access_flags_to_vk(access: AccessFlags) -> vk::AccessFlags {
    const TABLE: [(AccessFlags, vk::AccessFlags); 9] = [
        (AccessFlags::SHADER_READ, vk::AccessFlags::SHADER_READ),
        (AccessFlags::SHADER_WRITE, vk::AccessFlags::SHADER_WRITE),
        (AccessFlags::TRANSFER_READ, vk::AccessFlags::TRANSFER_READ),
        (AccessFlags::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_WRITE),
        (AccessFlags::HOST_WRITE, vk::AccessFlags::HOST_WRITE),
        (AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ),
        (AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
        (AccessFlags::ACCELERATION_STRUCTURE_READ, vk::AccessFlags::ACCELERATION_STRUCTURE_READ_NV),
        (AccessFlags::ACCELERATION_STRUCTURE_WRITE, vk::AccessFlags::ACCELERATION_STRUCTURE_WRITE_NV),
    ];
    TABLE
        .iter()
        .filter(|(engine, _)| access.contains(*engine))
        .fold(vk::AccessFlags::empty(), |flags, (_, vulkan)| flags | *vulkan)
}

pub(crate) fn pipeline_stage_to_vk(stages: PipelineStageFlags) -> vk::PipelineStageFlags {
    const TABLE: [(PipelineStageFlags, vk::PipelineStageFlags); 9] = [
        (PipelineStageFlags::TOP_OF_PIPE, vk::PipelineStageFlags::TOP_OF_PIPE),
        (PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::TRANSFER),
        (PipelineStageFlags::EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS),
        (PipelineStageFlags::FRAGMENT_SHADER, vk::PipelineStageFlags::FRAGMENT_SHADER),
        (PipelineStageFlags::COMPUTE_SHADER, vk::PipelineStageFlags::COMPUTE_SHADER),
        (PipelineStageFlags::RAY_TRACING_SHADER, vk::PipelineStageFlags::RAY_TRACING_SHADER_NV),
        (
            PipelineStageFlags::ACCELERATION_STRUCTURE_BUILD,
            vk::PipelineStageFlags::ACCELERATION_STRUCTURE_BUILD_NV,
        ),
        (PipelineStageFlags::HOST, vk::PipelineStageFlags::HOST),
        (PipelineStageFlags::BOTTOM_OF_PIPE, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
    ];
    TABLE
        .iter()
        .filter(|(engine, _)| stages.contains(*engine))
        .fold(vk::PipelineStageFlags::empty(), |flags, (_, vulkan)| flags | *vulkan)
}

pub(crate) fn acceleration_structure_type_to_vk(ty: AccelerationStructureType) -> vk::AccelerationStructureTypeNV {
    match ty {
        AccelerationStructureType::BottomLevel => vk::AccelerationStructureTypeNV::BOTTOM_LEVEL,
        AccelerationStructureType::TopLevel => vk::AccelerationStructureTypeNV::TOP_LEVEL,
    }
}

pub(crate) fn build_flags_to_vk(flags: BuildAccelerationStructureFlags) -> vk::BuildAccelerationStructureFlagsNV {
    let mut result = vk::BuildAccelerationStructureFlagsNV::empty();
    if flags.contains(BuildAccelerationStructureFlags::ALLOW_UPDATE) {
        result |= vk::BuildAccelerationStructureFlagsNV::ALLOW_UPDATE;
    }
    if flags.contains(BuildAccelerationStructureFlags::ALLOW_COMPACTION) {
        result |= vk::BuildAccelerationStructureFlagsNV::ALLOW_COMPACTION;
    }
    if flags.contains(BuildAccelerationStructureFlags::PREFER_FAST_TRACE) {
        result |= vk::BuildAccelerationStructureFlagsNV::PREFER_FAST_TRACE;
    }
    if flags.contains(BuildAccelerationStructureFlags::PREFER_FAST_BUILD) {
        result |= vk::BuildAccelerationStructureFlagsNV::PREFER_FAST_BUILD;
    }
    if flags.contains(BuildAccelerationStructureFlags::LOW_MEMORY) {
        result |= vk::BuildAccelerationStructureFlagsNV::LOW_MEMORY;
    }
    result
}

pub(crate) fn geometry_flags_to_vk(flags: GeometryFlags) -> vk::GeometryFlagsNV {
    let mut result = vk::GeometryFlagsNV::empty();
    if flags.contains(GeometryFlags::OPAQUE) {
        result |= vk::GeometryFlagsNV::OPAQUE;
    }
    if flags.contains(GeometryFlags::NO_DUPLICATE_ANY_HIT_INVOCATION) {
        result |= vk::GeometryFlagsNV::NO_DUPLICATE_ANY_HIT_INVOCATION;
    }
    result
}

pub(crate) fn memory_kind_to_vk(
    kind: AccelerationStructureMemoryKind,
) -> vk::AccelerationStructureMemoryRequirementsTypeNV {
    match kind {
        AccelerationStructureMemoryKind::Object => vk::AccelerationStructureMemoryRequirementsTypeNV::OBJECT,
        AccelerationStructureMemoryKind::BuildScratch => {
            vk::AccelerationStructureMemoryRequirementsTypeNV::BUILD_SCRATCH
        }
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
