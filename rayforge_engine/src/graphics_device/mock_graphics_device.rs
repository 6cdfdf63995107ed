/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Simulates what the resource manager and the acceleration structure
/// builder observe from a real device: a configurable memory-type table,
/// memory contents, command recording, queue submission (copies, layout
/// transitions and builds are executed at submit time) and object lifetimes.
///
/// Tests can inject failures and inspect live-object counters to prove that
/// every exit path releases what it created.

use std::sync::{Mutex, MutexGuard};

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::{
    AccelerationStructureHandle, AccelerationStructureInfo, AccelerationStructureMemoryKind,
    AccelerationStructureType, BufferCopy, BufferDesc, BufferHandle,
    CommandBufferHandle, Extent2D, GraphicsDevice, ImageAspect, ImageBarrier, ImageDesc,
    ImageFormat, ImageHandle, ImageLayout, ImageViewHandle, MemoryBarrier, MemoryHandle,
    MemoryProperties, MemoryPropertyFlags, MemoryRequirements, MemoryType, PipelineStageFlags,
    SamplerDesc, SamplerHandle,
};

/// Base of the fake 64-bit acceleration-structure references
pub const MOCK_REFERENCE_BASE: u64 = 0x5A00_0000_0000;

/// Size in bytes of one packed top-level instance record
const INSTANCE_RECORD_SIZE: usize = 64;

/// Byte offset of the BLAS reference inside an instance record
const INSTANCE_REFERENCE_OFFSET: usize = 56;

const BUFFER_ALIGNMENT: u64 = 256;
const IMAGE_ALIGNMENT: u64 = 1024;

/// Device call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    CreateBuffer,
    AllocateMemory,
    BindMemory,
    CreateImage,
    CreateImageView,
    CreateSampler,
    AllocateCommandBuffer,
    Submit,
    CreateAccelerationStructure,
    AccelerationStructureReference,
}

/// Command recorded into a mock command buffer
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    CopyBuffer {
        src: BufferHandle,
        dst: BufferHandle,
        region: BufferCopy,
    },
    CopyBufferToImage {
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        extent: Extent2D,
    },
    PipelineBarrier {
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        memory_barriers: Vec<MemoryBarrier>,
        image_barriers: Vec<ImageBarrier>,
    },
    BuildAccelerationStructure {
        info: AccelerationStructureInfo,
        instance_buffer: Option<BufferHandle>,
        dst: AccelerationStructureHandle,
        scratch: BufferHandle,
    },
}

// ============================================================================
// Internal state
// ============================================================================

struct MockMemory {
    memory_type_index: u32,
    data: Vec<u8>,
}

struct MockBuffer {
    desc: BufferDesc,
    binding: Option<(MemoryHandle, u64)>,
}

struct MockImage {
    desc: ImageDesc,
    layout: ImageLayout,
    bound: bool,
    texels: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordingState {
    Initial,
    Recording,
    Executable,
}

struct MockCommandBuffer {
    state: RecordingState,
    commands: Vec<MockCommand>,
    errors: Vec<String>,
}

struct MockAccelerationStructure {
    info: AccelerationStructureInfo,
    bound: bool,
    built: bool,
    instance_references: Vec<u64>,
}

struct MockState {
    next_handle: u64,
    memory_properties: MemoryProperties,
    memory_type_bits: Option<u32>,
    memories: FxHashMap<u64, MockMemory>,
    buffers: FxHashMap<u64, MockBuffer>,
    images: FxHashMap<u64, MockImage>,
    views: FxHashMap<u64, ImageHandle>,
    samplers: FxHashMap<u64, SamplerDesc>,
    command_buffers: FxHashMap<u64, MockCommandBuffer>,
    structures: FxHashMap<u64, MockAccelerationStructure>,
    failures: Vec<(MockFailure, usize)>,
    buffer_history: Vec<BufferDesc>,
    allocation_history: Vec<(u64, u32)>,
    submitted: Vec<MockCommand>,
    submit_count: usize,
    double_destroys: usize,
}

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

fn mock_error(message: impl Into<String>) -> Error {
    Error::BackendError(message.into())
}

impl MockState {
    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn memory_type_bits(&self) -> u32 {
        self.memory_type_bits.unwrap_or_else(|| {
            let count = self.memory_properties.memory_types.len().min(32) as u32;
            if count == 32 { u32::MAX } else { (1u32 << count) - 1 }
        })
    }

    fn check_failure(&mut self, kind: MockFailure) -> Result<()> {
        if let Some(position) = self.failures.iter().position(|(k, _)| *k == kind) {
            if self.failures[position].1 == 0 {
                self.failures.remove(position);
                return Err(match kind {
                    MockFailure::AllocateMemory => Error::OutOfMemory,
                    _ => mock_error(format!("injected {:?} failure", kind)),
                });
            }
            self.failures[position].1 -= 1;
        }
        Ok(())
    }

    fn bind_check(&self, memory: MemoryHandle, offset: u64, size: u64) -> Result<()> {
        let allocation = self
            .memories
            .get(&memory.as_raw())
            .ok_or_else(|| mock_error(format!("unknown memory {:?}", memory)))?;
        if offset + size > allocation.data.len() as u64 {
            return Err(mock_error(format!(
                "binding {} bytes at offset {} exceeds allocation of {} bytes",
                size,
                offset,
                allocation.data.len()
            )));
        }
        Ok(())
    }

    fn buffer_bytes(&self, buffer: BufferHandle) -> Result<&[u8]> {
        let entry = self
            .buffers
            .get(&buffer.as_raw())
            .ok_or_else(|| mock_error(format!("unknown buffer {:?}", buffer)))?;
        let (memory, offset) = entry
            .binding
            .ok_or_else(|| mock_error(format!("buffer {:?} has no memory bound", buffer)))?;
        let allocation = self
            .memories
            .get(&memory.as_raw())
            .ok_or_else(|| mock_error(format!("memory of buffer {:?} was freed", buffer)))?;
        let start = offset as usize;
        Ok(&allocation.data[start..start + entry.desc.size as usize])
    }

    fn buffer_bytes_mut(&mut self, buffer: BufferHandle) -> Result<&mut [u8]> {
        let entry = self
            .buffers
            .get(&buffer.as_raw())
            .ok_or_else(|| mock_error(format!("unknown buffer {:?}", buffer)))?;
        let (memory, offset) = entry
            .binding
            .ok_or_else(|| mock_error(format!("buffer {:?} has no memory bound", buffer)))?;
        let size = entry.desc.size as usize;
        let allocation = self
            .memories
            .get_mut(&memory.as_raw())
            .ok_or_else(|| mock_error(format!("memory of buffer {:?} was freed", buffer)))?;
        let start = offset as usize;
        Ok(&mut allocation.data[start..start + size])
    }

    fn scratch_size(info: &AccelerationStructureInfo) -> u64 {
        match info.ty {
            AccelerationStructureType::BottomLevel => 4096 + 64 * info.triangle_count(),
            AccelerationStructureType::TopLevel => 4096 + 128 * info.instance_count as u64,
        }
    }

    fn object_size(info: &AccelerationStructureInfo) -> u64 {
        let primitives = match info.ty {
            AccelerationStructureType::BottomLevel => info.triangle_count(),
            AccelerationStructureType::TopLevel => info.instance_count as u64,
        };
        2048 + 32 * primitives
    }

    fn execute(&mut self, command: &MockCommand) -> Result<()> {
        match command {
            MockCommand::CopyBuffer { src, dst, region } => {
                let bytes = self.buffer_bytes(*src)?;
                let src_end = region.src_offset + region.size;
                if src_end > bytes.len() as u64 {
                    return Err(mock_error(format!("copy reads past the end of {:?}", src)));
                }
                let chunk = bytes[region.src_offset as usize..src_end as usize].to_vec();
                let target = self.buffer_bytes_mut(*dst)?;
                let dst_end = region.dst_offset + region.size;
                if dst_end > target.len() as u64 {
                    return Err(mock_error(format!("copy writes past the end of {:?}", dst)));
                }
                target[region.dst_offset as usize..dst_end as usize].copy_from_slice(&chunk);
                Ok(())
            }
            MockCommand::CopyBufferToImage { src, dst, dst_layout, extent } => {
                let bytes = self.buffer_bytes(*src)?.to_vec();
                let image = self
                    .images
                    .get_mut(&dst.as_raw())
                    .ok_or_else(|| mock_error(format!("unknown image {:?}", dst)))?;
                if !image.bound {
                    return Err(mock_error(format!("image {:?} has no memory bound", dst)));
                }
                if *dst_layout != ImageLayout::TransferDst || image.layout != ImageLayout::TransferDst {
                    return Err(mock_error(format!(
                        "copy into image {:?} in layout {:?}",
                        dst, image.layout
                    )));
                }
                if *extent != image.desc.extent {
                    return Err(mock_error("copy extent does not match the image extent"));
                }
                let size = (extent.width * extent.height * image.desc.format.bytes_per_pixel()) as usize;
                if bytes.len() < size {
                    return Err(mock_error("source buffer smaller than the image"));
                }
                image.texels = bytes[..size].to_vec();
                Ok(())
            }
            MockCommand::PipelineBarrier { image_barriers, .. } => {
                for barrier in image_barriers {
                    let image = self
                        .images
                        .get_mut(&barrier.image.as_raw())
                        .ok_or_else(|| mock_error(format!("unknown image {:?}", barrier.image)))?;
                    if barrier.old_layout != ImageLayout::Undefined && barrier.old_layout != image.layout {
                        return Err(mock_error(format!(
                            "barrier expects {:?} but image is in {:?}",
                            barrier.old_layout, image.layout
                        )));
                    }
                    image.layout = barrier.new_layout;
                }
                Ok(())
            }
            MockCommand::BuildAccelerationStructure { info, instance_buffer, dst, scratch } => {
                self.execute_build(info, *instance_buffer, *dst, *scratch)
            }
        }
    }

    fn execute_build(
        &mut self,
        info: &AccelerationStructureInfo,
        instance_buffer: Option<BufferHandle>,
        dst: AccelerationStructureHandle,
        scratch: BufferHandle,
    ) -> Result<()> {
        let structure = self
            .structures
            .get(&dst.as_raw())
            .ok_or_else(|| Error::BuildFailed(format!("unknown acceleration structure {:?}", dst)))?;
        if !structure.bound {
            return Err(Error::BuildFailed(format!("{:?} has no memory bound", dst)));
        }
        if structure.info != *info {
            return Err(Error::BuildFailed("build info differs from creation info".to_string()));
        }

        let required_scratch = Self::scratch_size(info);
        let scratch_len = self.buffer_bytes(scratch)?.len() as u64;
        if scratch_len < required_scratch {
            return Err(Error::BuildFailed(format!(
                "scratch buffer of {} bytes, {} required",
                scratch_len, required_scratch
            )));
        }

        let mut references = Vec::new();
        match info.ty {
            AccelerationStructureType::BottomLevel => {
                for geometry in &info.geometries {
                    let triangles = &geometry.triangles;
                    let vertices = self.buffer_bytes(triangles.vertex_buffer)?.len() as u64;
                    let needed = triangles.vertex_offset + triangles.vertex_count as u64 * triangles.vertex_stride;
                    if needed > vertices {
                        return Err(Error::BuildFailed("vertex range exceeds vertex buffer".to_string()));
                    }
                    let indices = self.buffer_bytes(triangles.index_buffer)?.len() as u64;
                    let needed = triangles.index_offset
                        + triangles.index_count as u64 * triangles.index_type.size_bytes() as u64;
                    if needed > indices {
                        return Err(Error::BuildFailed("index range exceeds index buffer".to_string()));
                    }
                    if let Some(transform_buffer) = triangles.transform_buffer {
                        let transforms = self.buffer_bytes(transform_buffer)?.len() as u64;
                        if triangles.transform_offset + 48 > transforms {
                            return Err(Error::BuildFailed("transform offset exceeds transform buffer".to_string()));
                        }
                    }
                }
            }
            AccelerationStructureType::TopLevel => {
                let instance_buffer = instance_buffer
                    .ok_or_else(|| Error::BuildFailed("top-level build without instance buffer".to_string()))?;
                let bytes = self.buffer_bytes(instance_buffer)?;
                let needed = info.instance_count as usize * INSTANCE_RECORD_SIZE;
                if bytes.len() < needed {
                    return Err(Error::BuildFailed("instance buffer too small".to_string()));
                }
                for (index, record) in bytes[..needed].chunks_exact(INSTANCE_RECORD_SIZE).enumerate() {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(&record[INSTANCE_REFERENCE_OFFSET..INSTANCE_RECORD_SIZE]);
                    let reference = u64::from_le_bytes(raw);
                    let target = reference
                        .checked_sub(MOCK_REFERENCE_BASE)
                        .and_then(|id| self.structures.get(&id));
                    match target {
                        Some(blas) if blas.built && blas.info.ty == AccelerationStructureType::BottomLevel => {
                            references.push(reference);
                        }
                        _ => {
                            return Err(Error::BuildFailed(format!(
                                "instance {} references unbuilt bottom-level structure {:#x}",
                                index, reference
                            )));
                        }
                    }
                }
            }
        }

        if let Some(structure) = self.structures.get_mut(&dst.as_raw()) {
            structure.built = true;
            structure.instance_references = references;
        }
        Ok(())
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    state: Mutex<MockState>,
}

impl MockGraphicsDevice {
    /// Mock with three memory types: device-local, host-visible|coherent, and both
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_handle: 0,
                memory_properties: MemoryProperties {
                    memory_types: vec![
                        MemoryType {
                            property_flags: MemoryPropertyFlags::DEVICE_LOCAL,
                            heap_index: 0,
                        },
                        MemoryType {
                            property_flags: MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
                            heap_index: 1,
                        },
                        MemoryType {
                            property_flags: MemoryPropertyFlags::DEVICE_LOCAL
                                | MemoryPropertyFlags::HOST_VISIBLE
                                | MemoryPropertyFlags::HOST_COHERENT,
                            heap_index: 0,
                        },
                    ],
                },
                memory_type_bits: None,
                memories: FxHashMap::default(),
                buffers: FxHashMap::default(),
                images: FxHashMap::default(),
                views: FxHashMap::default(),
                samplers: FxHashMap::default(),
                command_buffers: FxHashMap::default(),
                structures: FxHashMap::default(),
                failures: Vec::new(),
                buffer_history: Vec::new(),
                allocation_history: Vec::new(),
                submitted: Vec::new(),
                submit_count: 0,
                double_destroys: 0,
            }),
        }
    }

    /// Replace the memory-type table
    pub fn with_memory_types(self, memory_types: Vec<MemoryType>) -> Self {
        self.state().memory_properties = MemoryProperties { memory_types };
        self
    }

    /// Restrict the memory types reported in every MemoryRequirements
    pub fn with_memory_type_bits(self, bits: u32) -> Self {
        self.state().memory_type_bits = Some(bits);
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ===== TEST CONTROL =====

    /// Make the call of `kind` fail after `skip` successful calls
    pub fn inject_failure(&self, kind: MockFailure, skip: usize) {
        self.state().failures.push((kind, skip));
    }

    // ===== INSPECTION =====

    pub fn live_buffers(&self) -> usize {
        self.state().buffers.len()
    }

    pub fn live_images(&self) -> usize {
        self.state().images.len()
    }

    pub fn live_image_views(&self) -> usize {
        self.state().views.len()
    }

    pub fn live_samplers(&self) -> usize {
        self.state().samplers.len()
    }

    pub fn live_memory_allocations(&self) -> usize {
        self.state().memories.len()
    }

    pub fn live_command_buffers(&self) -> usize {
        self.state().command_buffers.len()
    }

    pub fn live_acceleration_structures(&self) -> usize {
        self.state().structures.len()
    }

    /// Sum of all live device objects
    pub fn live_objects(&self) -> usize {
        let state = self.state();
        state.memories.len()
            + state.buffers.len()
            + state.images.len()
            + state.views.len()
            + state.samplers.len()
            + state.command_buffers.len()
            + state.structures.len()
    }

    /// Destroy/free calls on handles that were not alive
    pub fn double_destroys(&self) -> usize {
        self.state().double_destroys
    }

    /// Every BufferDesc passed to create_buffer, in call order
    pub fn buffer_history(&self) -> Vec<BufferDesc> {
        self.state().buffer_history.clone()
    }

    /// Every (size, memory type index) passed to allocate_memory, in call order
    pub fn allocation_history(&self) -> Vec<(u64, u32)> {
        self.state().allocation_history.clone()
    }

    /// Every command executed by a successful submit, in order
    pub fn submitted_commands(&self) -> Vec<MockCommand> {
        self.state().submitted.clone()
    }

    pub fn submit_count(&self) -> usize {
        self.state().submit_count
    }

    /// Bytes of a bound buffer, whatever its memory type
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state().buffer_bytes(buffer).ok().map(|bytes| bytes.to_vec())
    }

    /// Memory type index backing a buffer
    pub fn buffer_memory_type(&self, buffer: BufferHandle) -> Option<u32> {
        let state = self.state();
        let (memory, _) = state.buffers.get(&buffer.as_raw())?.binding?;
        state.memories.get(&memory.as_raw()).map(|m| m.memory_type_index)
    }

    pub fn buffer_desc(&self, buffer: BufferHandle) -> Option<BufferDesc> {
        self.state().buffers.get(&buffer.as_raw()).map(|b| b.desc)
    }

    pub fn image_layout(&self, image: ImageHandle) -> Option<ImageLayout> {
        self.state().images.get(&image.as_raw()).map(|i| i.layout)
    }

    pub fn image_contents(&self, image: ImageHandle) -> Option<Vec<u8>> {
        self.state().images.get(&image.as_raw()).map(|i| i.texels.clone())
    }

    pub fn image_desc(&self, image: ImageHandle) -> Option<ImageDesc> {
        self.state().images.get(&image.as_raw()).map(|i| i.desc)
    }

    pub fn is_built(&self, handle: AccelerationStructureHandle) -> bool {
        self.state()
            .structures
            .get(&handle.as_raw())
            .is_some_and(|s| s.built)
    }

    /// BLAS references consumed by the last build of a top-level structure
    pub fn built_instance_references(&self, handle: AccelerationStructureHandle) -> Vec<u64> {
        self.state()
            .structures
            .get(&handle.as_raw())
            .map(|s| s.instance_references.clone())
            .unwrap_or_default()
    }

    pub fn acceleration_structure_info(&self, handle: AccelerationStructureHandle) -> Option<AccelerationStructureInfo> {
        self.state().structures.get(&handle.as_raw()).map(|s| s.info.clone())
    }

    /// Scratch size the mock reports for a build description
    pub fn scratch_size_for(info: &AccelerationStructureInfo) -> u64 {
        MockState::scratch_size(info)
    }

    fn record(&self, command_buffer: CommandBufferHandle, command: MockCommand) {
        let mut state = self.state();
        match state.command_buffers.get_mut(&command_buffer.as_raw()) {
            Some(entry) if entry.state == RecordingState::Recording => entry.commands.push(command),
            Some(entry) => entry.errors.push(format!("{:?} recorded outside begin/end", command)),
            None => {}
        }
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn memory_properties(&self) -> MemoryProperties {
        self.state().memory_properties.clone()
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<MemoryHandle> {
        let mut state = self.state();
        state.check_failure(MockFailure::AllocateMemory)?;
        if size == 0 {
            return Err(mock_error("zero-sized allocation"));
        }
        if memory_type_index as usize >= state.memory_properties.memory_types.len() {
            return Err(mock_error(format!("memory type {} does not exist", memory_type_index)));
        }
        let id = state.next();
        state.allocation_history.push((size, memory_type_index));
        state.memories.insert(id, MockMemory {
            memory_type_index,
            data: vec![0; size as usize],
        });
        Ok(MemoryHandle::from_raw(id))
    }

    fn free_memory(&self, memory: MemoryHandle) {
        let mut state = self.state();
        if state.memories.remove(&memory.as_raw()).is_none() {
            state.double_destroys += 1;
        }
    }

    fn write_memory(&self, memory: MemoryHandle, offset: u64, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        let properties = state.memory_properties.clone();
        let allocation = state
            .memories
            .get_mut(&memory.as_raw())
            .ok_or_else(|| mock_error(format!("unknown memory {:?}", memory)))?;
        let host_visible = properties
            .property_flags(allocation.memory_type_index)
            .is_some_and(|flags| flags.contains(MemoryPropertyFlags::HOST_VISIBLE));
        if !host_visible {
            return Err(mock_error("mapping memory that is not host-visible"));
        }
        let end = offset as usize + data.len();
        if end > allocation.data.len() {
            return Err(mock_error("write past the end of the allocation"));
        }
        allocation.data[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn read_memory(&self, memory: MemoryHandle, offset: u64, size: u64) -> Result<Vec<u8>> {
        let state = self.state();
        let allocation = state
            .memories
            .get(&memory.as_raw())
            .ok_or_else(|| mock_error(format!("unknown memory {:?}", memory)))?;
        let host_visible = state
            .memory_properties
            .property_flags(allocation.memory_type_index)
            .is_some_and(|flags| flags.contains(MemoryPropertyFlags::HOST_VISIBLE));
        if !host_visible {
            return Err(mock_error("mapping memory that is not host-visible"));
        }
        let end = (offset + size) as usize;
        if end > allocation.data.len() {
            return Err(mock_error("read past the end of the allocation"));
        }
        Ok(allocation.data[offset as usize..end].to_vec())
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle> {
        let mut state = self.state();
        state.check_failure(MockFailure::CreateBuffer)?;
        if desc.size == 0 {
            return Err(mock_error("zero-sized buffer"));
        }
        let id = state.next();
        state.buffer_history.push(*desc);
        state.buffers.insert(id, MockBuffer { desc: *desc, binding: None });
        Ok(BufferHandle::from_raw(id))
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state();
        if state.buffers.remove(&buffer.as_raw()).is_none() {
            state.double_destroys += 1;
        }
    }

    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> Result<MemoryRequirements> {
        let state = self.state();
        let entry = state
            .buffers
            .get(&buffer.as_raw())
            .ok_or_else(|| mock_error(format!("unknown buffer {:?}", buffer)))?;
        Ok(MemoryRequirements {
            size: align_up(entry.desc.size, BUFFER_ALIGNMENT),
            alignment: BUFFER_ALIGNMENT,
            memory_type_bits: state.memory_type_bits(),
        })
    }

    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: MemoryHandle, offset: u64) -> Result<()> {
        let mut state = self.state();
        state.check_failure(MockFailure::BindMemory)?;
        let size = state
            .buffers
            .get(&buffer.as_raw())
            .map(|b| align_up(b.desc.size, BUFFER_ALIGNMENT))
            .ok_or_else(|| mock_error(format!("unknown buffer {:?}", buffer)))?;
        state.bind_check(memory, offset, size)?;
        match state.buffers.get_mut(&buffer.as_raw()) {
            Some(entry) if entry.binding.is_none() => {
                entry.binding = Some((memory, offset));
                Ok(())
            }
            _ => Err(mock_error(format!("buffer {:?} is already bound", buffer))),
        }
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<ImageHandle> {
        let mut state = self.state();
        state.check_failure(MockFailure::CreateImage)?;
        if desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(mock_error("zero-sized image"));
        }
        let id = state.next();
        state.images.insert(id, MockImage {
            desc: *desc,
            layout: ImageLayout::Undefined,
            bound: false,
            texels: Vec::new(),
        });
        Ok(ImageHandle::from_raw(id))
    }

    fn destroy_image(&self, image: ImageHandle) {
        let mut state = self.state();
        if state.images.remove(&image.as_raw()).is_none() {
            state.double_destroys += 1;
        }
    }

    fn image_memory_requirements(&self, image: ImageHandle) -> Result<MemoryRequirements> {
        let state = self.state();
        let entry = state
            .images
            .get(&image.as_raw())
            .ok_or_else(|| mock_error(format!("unknown image {:?}", image)))?;
        let bytes = entry.desc.extent.width as u64
            * entry.desc.extent.height as u64
            * entry.desc.format.bytes_per_pixel() as u64;
        Ok(MemoryRequirements {
            size: align_up(bytes, IMAGE_ALIGNMENT),
            alignment: IMAGE_ALIGNMENT,
            memory_type_bits: state.memory_type_bits(),
        })
    }

    fn bind_image_memory(&self, image: ImageHandle, memory: MemoryHandle, offset: u64) -> Result<()> {
        let mut state = self.state();
        state.check_failure(MockFailure::BindMemory)?;
        let desc = state
            .images
            .get(&image.as_raw())
            .map(|i| i.desc)
            .ok_or_else(|| mock_error(format!("unknown image {:?}", image)))?;
        let size = desc.extent.width as u64 * desc.extent.height as u64 * desc.format.bytes_per_pixel() as u64;
        state.bind_check(memory, offset, align_up(size, IMAGE_ALIGNMENT))?;
        match state.images.get_mut(&image.as_raw()) {
            Some(entry) if !entry.bound => {
                entry.bound = true;
                Ok(())
            }
            _ => Err(mock_error(format!("image {:?} is already bound", image))),
        }
    }

    fn create_image_view(&self, image: ImageHandle, format: ImageFormat, aspect: ImageAspect) -> Result<ImageViewHandle> {
        let mut state = self.state();
        state.check_failure(MockFailure::CreateImageView)?;
        let desc = state
            .images
            .get(&image.as_raw())
            .map(|i| i.desc)
            .ok_or_else(|| mock_error(format!("unknown image {:?}", image)))?;
        if desc.format != format {
            return Err(mock_error("view format differs from image format"));
        }
        if (aspect == ImageAspect::Depth) != format.is_depth() {
            return Err(mock_error("view aspect does not match the image format"));
        }
        let id = state.next();
        state.views.insert(id, image);
        Ok(ImageViewHandle::from_raw(id))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        let mut state = self.state();
        if state.views.remove(&view.as_raw()).is_none() {
            state.double_destroys += 1;
        }
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        let mut state = self.state();
        state.check_failure(MockFailure::CreateSampler)?;
        let id = state.next();
        state.samplers.insert(id, *desc);
        Ok(SamplerHandle::from_raw(id))
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        let mut state = self.state();
        if state.samplers.remove(&sampler.as_raw()).is_none() {
            state.double_destroys += 1;
        }
    }

    fn allocate_command_buffer(&self) -> Result<CommandBufferHandle> {
        let mut state = self.state();
        state.check_failure(MockFailure::AllocateCommandBuffer)?;
        let id = state.next();
        state.command_buffers.insert(id, MockCommandBuffer {
            state: RecordingState::Initial,
            commands: Vec::new(),
            errors: Vec::new(),
        });
        Ok(CommandBufferHandle::from_raw(id))
    }

    fn begin_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        let mut state = self.state();
        let entry = state
            .command_buffers
            .get_mut(&command_buffer.as_raw())
            .ok_or_else(|| mock_error(format!("unknown command buffer {:?}", command_buffer)))?;
        if entry.state != RecordingState::Initial {
            return Err(mock_error("begin on a command buffer that is not in the initial state"));
        }
        entry.state = RecordingState::Recording;
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        let mut state = self.state();
        let entry = state
            .command_buffers
            .get_mut(&command_buffer.as_raw())
            .ok_or_else(|| mock_error(format!("unknown command buffer {:?}", command_buffer)))?;
        if entry.state != RecordingState::Recording {
            return Err(mock_error("end on a command buffer that is not recording"));
        }
        entry.state = RecordingState::Executable;
        Ok(())
    }

    fn submit_and_wait_idle(&self, command_buffer: CommandBufferHandle) -> Result<()> {
        let mut state = self.state();
        state.check_failure(MockFailure::Submit)?;
        let (commands, errors) = match state.command_buffers.get(&command_buffer.as_raw()) {
            Some(entry) if entry.state == RecordingState::Executable => {
                (entry.commands.clone(), entry.errors.clone())
            }
            Some(_) => return Err(mock_error("submit of a command buffer that was not ended")),
            None => return Err(mock_error(format!("unknown command buffer {:?}", command_buffer))),
        };
        if let Some(error) = errors.first() {
            return Err(mock_error(error.clone()));
        }
        for command in &commands {
            state.execute(command)?;
        }
        state.submitted.extend(commands);
        state.submit_count += 1;
        Ok(())
    }

    fn free_command_buffer(&self, command_buffer: CommandBufferHandle) {
        let mut state = self.state();
        if state.command_buffers.remove(&command_buffer.as_raw()).is_none() {
            state.double_destroys += 1;
        }
    }

    fn cmd_copy_buffer(&self, command_buffer: CommandBufferHandle, src: BufferHandle, dst: BufferHandle, region: BufferCopy) {
        self.record(command_buffer, MockCommand::CopyBuffer { src, dst, region });
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: CommandBufferHandle,
        src: BufferHandle,
        dst: ImageHandle,
        dst_layout: ImageLayout,
        extent: Extent2D,
    ) {
        self.record(command_buffer, MockCommand::CopyBufferToImage { src, dst, dst_layout, extent });
    }

    fn cmd_pipeline_barrier(
        &self,
        command_buffer: CommandBufferHandle,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        memory_barriers: &[MemoryBarrier],
        image_barriers: &[ImageBarrier],
    ) {
        self.record(command_buffer, MockCommand::PipelineBarrier {
            src_stage,
            dst_stage,
            memory_barriers: memory_barriers.to_vec(),
            image_barriers: image_barriers.to_vec(),
        });
    }

    fn create_acceleration_structure(&self, info: &AccelerationStructureInfo) -> Result<AccelerationStructureHandle> {
        let mut state = self.state();
        state.check_failure(MockFailure::CreateAccelerationStructure)?;
        match info.ty {
            AccelerationStructureType::BottomLevel if info.geometries.is_empty() => {
                return Err(mock_error("bottom-level structure without geometry"));
            }
            AccelerationStructureType::TopLevel if !info.geometries.is_empty() => {
                return Err(mock_error("top-level structure with triangle geometry"));
            }
            _ => {}
        }
        let id = state.next();
        state.structures.insert(id, MockAccelerationStructure {
            info: info.clone(),
            bound: false,
            built: false,
            instance_references: Vec::new(),
        });
        Ok(AccelerationStructureHandle::from_raw(id))
    }

    fn destroy_acceleration_structure(&self, handle: AccelerationStructureHandle) {
        let mut state = self.state();
        if state.structures.remove(&handle.as_raw()).is_none() {
            state.double_destroys += 1;
        }
    }

    fn acceleration_structure_memory_requirements(
        &self,
        handle: AccelerationStructureHandle,
        kind: AccelerationStructureMemoryKind,
    ) -> Result<MemoryRequirements> {
        let state = self.state();
        let structure = state
            .structures
            .get(&handle.as_raw())
            .ok_or_else(|| mock_error(format!("unknown acceleration structure {:?}", handle)))?;
        let size = match kind {
            AccelerationStructureMemoryKind::Object => MockState::object_size(&structure.info),
            AccelerationStructureMemoryKind::BuildScratch => MockState::scratch_size(&structure.info),
        };
        Ok(MemoryRequirements {
            size,
            alignment: BUFFER_ALIGNMENT,
            memory_type_bits: state.memory_type_bits(),
        })
    }

    fn bind_acceleration_structure_memory(
        &self,
        handle: AccelerationStructureHandle,
        memory: MemoryHandle,
        offset: u64,
    ) -> Result<()> {
        let mut state = self.state();
        state.check_failure(MockFailure::BindMemory)?;
        let size = state
            .structures
            .get(&handle.as_raw())
            .map(|s| MockState::object_size(&s.info))
            .ok_or_else(|| mock_error(format!("unknown acceleration structure {:?}", handle)))?;
        state.bind_check(memory, offset, size)?;
        match state.structures.get_mut(&handle.as_raw()) {
            Some(entry) if !entry.bound => {
                entry.bound = true;
                Ok(())
            }
            _ => Err(mock_error(format!("{:?} is already bound", handle))),
        }
    }

    fn acceleration_structure_reference(&self, handle: AccelerationStructureHandle) -> Result<u64> {
        let mut state = self.state();
        state.check_failure(MockFailure::AccelerationStructureReference)?;
        match state.structures.get(&handle.as_raw()) {
            Some(structure) if structure.bound => Ok(MOCK_REFERENCE_BASE + handle.as_raw()),
            Some(_) => Err(mock_error(format!("{:?} has no memory bound", handle))),
            None => Err(mock_error(format!("unknown acceleration structure {:?}", handle))),
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
        self.record(command_buffer, MockCommand::BuildAccelerationStructure {
            info: info.clone(),
            instance_buffer,
            dst,
            scratch,
        });
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
