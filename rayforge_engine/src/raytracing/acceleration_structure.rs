/// Owned acceleration structures
///
/// An AccelerationStructure owns its device object and a dedicated
/// MemoryBlock. The structure is destroyed before its memory is freed.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{
    AccelerationStructureHandle, AccelerationStructureInfo, AccelerationStructureMemoryKind,
    AccelerationStructureType, GraphicsDevice, MemoryPropertyFlags, MemoryRequirements,
};
use crate::resource::memory_block::PendingObject;
use crate::resource::{MemoryBlock, ResourceManager};
use crate::{rf_err, rf_trace};

const SOURCE: &str = "rayforge::AccelerationStructure";

pub struct AccelerationStructure {
    device: Arc<dyn GraphicsDevice>,
    handle: AccelerationStructureHandle,
    info: AccelerationStructureInfo,
    reference: u64,
    /// Dropped after `handle` is destroyed
    memory: MemoryBlock,
}

impl AccelerationStructure {
    /// Create the object, allocate and bind its memory, fetch its reference
    ///
    /// Everything created here is released again if a later step fails.
    pub(crate) fn create(resource_manager: &ResourceManager, info: AccelerationStructureInfo) -> Result<Self> {
        let device = resource_manager.device();
        let diagnostics = resource_manager.diagnostics();

        let handle = device
            .create_acceleration_structure(&info)
            .map_err(|e| rf_err!(diagnostics, CreationFailed, SOURCE,
                "Failed to create {:?} acceleration structure: {}", info.ty, e))?;
        let pending = PendingObject::new(device.as_ref(), handle, |device, handle| {
            device.destroy_acceleration_structure(handle)
        });

        let requirements = device
            .acceleration_structure_memory_requirements(handle, AccelerationStructureMemoryKind::Object)
            .map_err(|e| rf_err!(diagnostics, AllocationFailed, SOURCE,
                "Failed to query memory requirements of {:?}: {}", handle, e))?;
        let memory = resource_manager.allocate_memory(&requirements, MemoryPropertyFlags::DEVICE_LOCAL)?;
        device
            .bind_acceleration_structure_memory(handle, memory.handle(), 0)
            .map_err(|e| rf_err!(diagnostics, AllocationFailed, SOURCE,
                "Failed to bind memory of {:?}: {}", handle, e))?;
        let reference = device
            .acceleration_structure_reference(handle)
            .map_err(|e| rf_err!(diagnostics, CreationFailed, SOURCE,
                "Failed to get the reference of {:?}: {}", handle, e))?;

        let handle = pending.disarm();
        rf_trace!(diagnostics, SOURCE, "Created {:?} {:?} ({} bytes, reference {:#x})",
            info.ty, handle, memory.size(), reference);

        Ok(Self {
            device: device.clone(),
            handle,
            info,
            reference,
            memory,
        })
    }

    pub fn handle(&self) -> AccelerationStructureHandle {
        self.handle
    }

    /// Opaque 64-bit reference used in top-level instance records
    pub fn reference(&self) -> u64 {
        self.reference
    }

    pub fn info(&self) -> &AccelerationStructureInfo {
        &self.info
    }

    pub fn ty(&self) -> AccelerationStructureType {
        self.info.ty
    }

    pub fn memory(&self) -> &MemoryBlock {
        &self.memory
    }

    /// Scratch memory a full build of this structure needs
    pub fn scratch_requirements(&self) -> Result<MemoryRequirements> {
        self.device
            .acceleration_structure_memory_requirements(self.handle, AccelerationStructureMemoryKind::BuildScratch)
    }
}

impl Drop for AccelerationStructure {
    fn drop(&mut self) {
        self.device.destroy_acceleration_structure(self.handle);
    }
}

impl fmt::Debug for AccelerationStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccelerationStructure")
            .field("handle", &self.handle)
            .field("ty", &self.info.ty)
            .field("reference", &format_args!("{:#x}", self.reference))
            .field("memory", &self.memory)
            .finish()
    }
}

// ===== BLAS =====

/// What a bottom-level structure was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlasSource {
    /// All dynamic instances of one mesh
    Mesh(usize),
    /// Every static instance, one geometry each, transforms baked in
    StaticInstances(Vec<usize>),
}

/// A bottom-level structure whose build has completed
///
/// Only the builder creates these, after the build submission returned.
#[derive(Debug)]
pub struct Blas {
    structure: AccelerationStructure,
    source: BlasSource,
}

impl Blas {
    pub(crate) fn new(structure: AccelerationStructure, source: BlasSource) -> Self {
        Self { structure, source }
    }

    pub fn handle(&self) -> AccelerationStructureHandle {
        self.structure.handle()
    }

    pub fn reference(&self) -> u64 {
        self.structure.reference()
    }

    pub fn source(&self) -> &BlasSource {
        &self.source
    }

    pub fn structure(&self) -> &AccelerationStructure {
        &self.structure
    }

    pub fn geometry_count(&self) -> usize {
        self.structure.info().geometries.len()
    }

    pub fn triangle_count(&self) -> u64 {
        self.structure.info().triangle_count()
    }
}
