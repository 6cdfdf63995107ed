/// Two-level acceleration structure builder.
///
/// A build goes through four phases, each one a separate call:
///
/// 1. `prepare_drawable_instances` - split the scene instances into static
///    ones and per-mesh lists of dynamic ones
/// 2. `create_blas` - one bottom-level structure per dynamic mesh, plus one
///    holding every static instance with its transform baked in
/// 3. `create_tlas` - pack one instance record per dynamic instance (and one
///    for the static group) and build the top-level structure
/// 4. `create_storage_image` - the output image of the ray-tracing dispatch
///
/// State: `Uninitialized -> GeometryPrepared -> BlasBuilt -> TlasBuilt -> Ready`.
/// A phase called out of order fails with `InvalidState` and changes nothing.
/// `reset` releases everything and returns to `Uninitialized`.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Mat4;

use crate::error::{Error, Result};
use crate::graphics_device::{
    AccelerationStructureHandle, AccelerationStructureInfo, AccessFlags,
    BuildAccelerationStructureFlags, BufferUsageFlags, Geometry, GeometryInstanceFlags,
    GraphicsDevice, ImageFormat, MemoryBarrier, MemoryPropertyFlags, PipelineStageFlags,
};
use crate::log::Diagnostics;
use crate::raytracing::{
    convert_to_geometry, AccelerationStructure, Blas, BlasSource, GeometryInstance, TlasInstance,
    MAX_INSTANCE_CUSTOM_INDEX,
};
use crate::resource::{Buffer, RenderImage, ResourceManager, SingleUseCommand};
use crate::scene::{InstanceKind, Scene};
use crate::{rf_bail, rf_debug, rf_err, rf_error, rf_info, rf_warn};

const SOURCE: &str = "rayforge::AccelerationStructureBuilder";

/// Custom index of the instance holding the static group
pub const STATIC_GROUP_CUSTOM_INDEX: u32 = MAX_INSTANCE_CUSTOM_INDEX;

// ===== CONFIG =====

/// Build parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelerationStructureConfig {
    pub blas_flags: BuildAccelerationStructureFlags,
    pub tlas_flags: BuildAccelerationStructureFlags,
    /// Mask of the static group instance
    pub instance_mask: u8,
    /// Hit group offset written into every instance record
    pub hit_group_offset: u32,
    pub instance_flags: GeometryInstanceFlags,
    pub storage_image_format: ImageFormat,
}

impl Default for AccelerationStructureConfig {
    fn default() -> Self {
        Self {
            blas_flags: BuildAccelerationStructureFlags::PREFER_FAST_TRACE,
            tlas_flags: BuildAccelerationStructureFlags::PREFER_FAST_TRACE,
            instance_mask: 0xFF,
            hit_group_offset: 0,
            instance_flags: GeometryInstanceFlags::TRIANGLE_CULL_DISABLE,
            storage_image_format: ImageFormat::R8G8B8A8_UNORM,
        }
    }
}

// ===== STATE =====

/// Build phase reached so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildState {
    Uninitialized,
    GeometryPrepared,
    BlasBuilt,
    TlasBuilt,
    Ready,
}

/// Figures of the last build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub blas_count: usize,
    pub geometry_count: usize,
    pub triangle_count: u64,
    /// Size of the scratch buffer shared by all bottom-level builds
    pub blas_scratch_size: u64,
    pub blas_memory_size: u64,
    pub tlas_instance_count: u32,
    pub tlas_scratch_size: u64,
    pub tlas_memory_size: u64,
}

// ===== BUILDER =====

pub struct AccelerationStructureBuilder {
    device: Arc<dyn GraphicsDevice>,
    diagnostics: Diagnostics,
    config: AccelerationStructureConfig,
    state: BuildState,
    static_instances: Vec<usize>,
    /// Mesh -> dynamic instances, in mesh order
    dynamic_instances: BTreeMap<usize, Vec<usize>>,
    // Declaration order is drop order: top level before bottom level
    storage_image: Option<RenderImage>,
    tlas: Option<AccelerationStructure>,
    instance_buffer: Option<Buffer>,
    blas: Vec<Blas>,
    stats: BuildStats,
}

impl AccelerationStructureBuilder {
    pub fn new(device: Arc<dyn GraphicsDevice>, diagnostics: Diagnostics, config: AccelerationStructureConfig) -> Self {
        Self {
            device,
            diagnostics,
            config,
            state: BuildState::Uninitialized,
            static_instances: Vec::new(),
            dynamic_instances: BTreeMap::new(),
            storage_image: None,
            tlas: None,
            instance_buffer: None,
            blas: Vec::new(),
            stats: BuildStats::default(),
        }
    }

    /// Run all four phases
    pub fn build(&mut self, resource_manager: &ResourceManager, scene: &Scene, width: u32, height: u32) -> Result<()> {
        self.prepare_drawable_instances(scene)?;
        self.create_blas(resource_manager, scene)?;
        self.create_tlas(resource_manager, scene)?;
        self.create_storage_image(resource_manager, width, height)
    }

    // ===== PHASE 1: PARTITION =====

    /// Split instances into the static list and per-mesh dynamic lists
    pub fn prepare_drawable_instances(&mut self, scene: &Scene) -> Result<()> {
        self.require_state(BuildState::Uninitialized, "prepare_drawable_instances")?;

        let mut static_instances = Vec::new();
        let mut dynamic_instances: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, instance) in scene.instances().iter().enumerate() {
            if scene.drawable(instance.mesh).is_none() {
                rf_bail!(self.diagnostics, InvalidResource, SOURCE,
                    "Instance {} references missing mesh {}", index, instance.mesh);
            }
            match instance.kind {
                InstanceKind::Static => static_instances.push(index),
                InstanceKind::Dynamic => dynamic_instances.entry(instance.mesh).or_default().push(index),
            }
        }

        rf_debug!(self.diagnostics, SOURCE, "{} static instances, {} dynamic instances over {} meshes",
            static_instances.len(),
            dynamic_instances.values().map(Vec::len).sum::<usize>(),
            dynamic_instances.len());

        self.static_instances = static_instances;
        self.dynamic_instances = dynamic_instances;
        self.state = BuildState::GeometryPrepared;
        Ok(())
    }

    /// Geometry description of a mesh, optionally with an instance transform
    pub fn convert_to_geometry(&self, scene: &Scene, mesh: usize, instance: Option<usize>) -> Result<Geometry> {
        convert_to_geometry(scene, mesh, instance).map_err(|e| {
            rf_error!(self.diagnostics, SOURCE, "Cannot convert mesh {} (instance {:?}): {}", mesh, instance, e);
            e
        })
    }

    // ===== PHASE 2: BOTTOM LEVEL =====

    /// Create and build every bottom-level structure
    ///
    /// All builds share one scratch buffer sized to the largest requirement
    /// and are recorded into one single-use scope, each followed by an
    /// acceleration-structure write/read barrier.
    pub fn create_blas(&mut self, resource_manager: &ResourceManager, scene: &Scene) -> Result<()> {
        self.require_state(BuildState::GeometryPrepared, "create_blas")?;

        let mut plan: Vec<(BlasSource, AccelerationStructureInfo)> = Vec::new();
        for &mesh in self.dynamic_instances.keys() {
            let geometry = self.convert_to_geometry(scene, mesh, None)?;
            plan.push((
                BlasSource::Mesh(mesh),
                AccelerationStructureInfo::bottom_level(self.config.blas_flags, vec![geometry]),
            ));
        }
        if !self.static_instances.is_empty() {
            let mut geometries = Vec::with_capacity(self.static_instances.len());
            for &index in &self.static_instances {
                let mesh = scene.instance(index).map(|instance| instance.mesh).unwrap_or(usize::MAX);
                geometries.push(self.convert_to_geometry(scene, mesh, Some(index))?);
            }
            plan.push((
                BlasSource::StaticInstances(self.static_instances.clone()),
                AccelerationStructureInfo::bottom_level(self.config.blas_flags, geometries),
            ));
        }
        if plan.is_empty() {
            rf_bail!(self.diagnostics, BuildFailed, SOURCE, "Scene has no instances to build");
        }

        let mut structures = Vec::with_capacity(plan.len());
        let mut scratch_size = 0;
        for (_, info) in &plan {
            let structure = AccelerationStructure::create(resource_manager, info.clone())?;
            let requirements = structure.scratch_requirements().map_err(|e| {
                rf_err!(self.diagnostics, AllocationFailed, SOURCE,
                    "Failed to query scratch size of {:?}: {}", structure.handle(), e)
            })?;
            scratch_size = scratch_size.max(requirements.size);
            structures.push(structure);
        }

        let scratch = resource_manager.create_buffer(
            scratch_size,
            BufferUsageFlags::RAY_TRACING,
            MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        resource_manager
            .with_single_use_command(|cmd| {
                for structure in &structures {
                    cmd.build_acceleration_structure(structure.info(), None, structure.handle(), &scratch);
                    Self::record_build_barrier(cmd);
                }
                Ok(())
            })
            .map_err(|e| self.build_error("bottom-level", e))?;

        let mut stats = BuildStats {
            blas_scratch_size: scratch_size,
            ..BuildStats::default()
        };
        self.blas = structures
            .into_iter()
            .zip(plan)
            .map(|(structure, (source, _))| {
                stats.blas_count += 1;
                stats.geometry_count += structure.info().geometries.len();
                stats.triangle_count += structure.info().triangle_count();
                stats.blas_memory_size += structure.memory().size();
                Blas::new(structure, source)
            })
            .collect();
        self.stats = stats;

        rf_info!(self.diagnostics, SOURCE, "Built {} bottom-level structures ({} triangles, {} bytes scratch)",
            stats.blas_count, stats.triangle_count, scratch_size);
        self.state = BuildState::BlasBuilt;
        Ok(())
    }

    // ===== PHASE 3: TOP LEVEL =====

    /// Build the top-level structure over the scene instances
    ///
    /// Each dynamic instance becomes one record pointing at its mesh's
    /// structure. The static group, if any, gets one identity record with
    /// the custom index `STATIC_GROUP_CUSTOM_INDEX`.
    pub fn create_tlas(&mut self, resource_manager: &ResourceManager, scene: &Scene) -> Result<()> {
        self.require_state(BuildState::BlasBuilt, "create_tlas")?;

        let mut instances = Vec::with_capacity(scene.instances().len());
        for (index, instance) in scene.instances().iter().enumerate() {
            if instance.kind != InstanceKind::Dynamic {
                continue;
            }
            let Some(blas) = self.blas_for_mesh(instance.mesh) else {
                rf_bail!(self.diagnostics, InvalidResource, SOURCE,
                    "Instance {} uses mesh {} which has no bottom-level structure", index, instance.mesh);
            };
            let custom_index = instance.custom_index.unwrap_or(index as u32);
            if custom_index > MAX_INSTANCE_CUSTOM_INDEX {
                rf_warn!(self.diagnostics, SOURCE,
                    "Custom index {} of instance {} truncated to 24 bits", custom_index, index);
            }
            instances.push(
                TlasInstance::new(blas, instance.transform)
                    .with_custom_index(custom_index)
                    .with_mask(instance.mask)
                    .with_hit_group_offset(self.config.hit_group_offset)
                    .with_flags(self.config.instance_flags),
            );
        }
        if let Some(group) = self.static_blas() {
            instances.push(
                TlasInstance::new(group, Mat4::IDENTITY)
                    .with_custom_index(STATIC_GROUP_CUSTOM_INDEX)
                    .with_mask(self.config.instance_mask)
                    .with_hit_group_offset(self.config.hit_group_offset)
                    .with_flags(self.config.instance_flags),
            );
        }

        self.build_tlas(resource_manager, &instances)
    }

    /// Pack `instances` into a host-visible buffer and build the top level
    ///
    /// # Errors
    ///
    /// `InvalidResource` if `instances` is empty or names a bottom-level
    /// structure this builder does not own.
    pub fn build_tlas(&mut self, resource_manager: &ResourceManager, instances: &[TlasInstance]) -> Result<()> {
        self.require_state(BuildState::BlasBuilt, "build_tlas")?;

        if instances.is_empty() {
            rf_bail!(self.diagnostics, InvalidResource, SOURCE, "Top-level structure needs at least one instance");
        }
        if let Some((index, instance)) = instances
            .iter()
            .enumerate()
            .find(|(_, instance)| !self.owns_blas(instance))
        {
            rf_bail!(self.diagnostics, InvalidResource, SOURCE,
                "Instance {} references {:?}, which is not a built bottom-level structure of this builder",
                index, instance.blas());
        }
        let Ok(instance_count) = u32::try_from(instances.len()) else {
            rf_bail!(self.diagnostics, InvalidResource, SOURCE, "{} instances exceed u32", instances.len());
        };

        let records: Vec<GeometryInstance> = instances.iter().map(TlasInstance::to_geometry_instance).collect();
        let record_bytes: &[u8] = bytemuck::cast_slice(&records);
        let instance_buffer = resource_manager.create_buffer(
            record_bytes.len() as u64,
            BufferUsageFlags::RAY_TRACING,
            MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
        )?;
        resource_manager.copy_data_to_memory(&instance_buffer, 0, record_bytes)?;

        let tlas = AccelerationStructure::create(
            resource_manager,
            AccelerationStructureInfo::top_level(self.config.tlas_flags, instance_count),
        )?;
        let scratch_size = tlas
            .scratch_requirements()
            .map_err(|e| rf_err!(self.diagnostics, AllocationFailed, SOURCE,
                "Failed to query scratch size of {:?}: {}", tlas.handle(), e))?
            .size;
        let scratch = resource_manager.create_buffer(
            scratch_size,
            BufferUsageFlags::RAY_TRACING,
            MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        resource_manager
            .with_single_use_command(|cmd| {
                cmd.build_acceleration_structure(tlas.info(), Some(&instance_buffer), tlas.handle(), &scratch);
                Self::record_build_barrier(cmd);
                Ok(())
            })
            .map_err(|e| self.build_error("top-level", e))?;

        self.stats.tlas_instance_count = instance_count;
        self.stats.tlas_scratch_size = scratch_size;
        self.stats.tlas_memory_size = tlas.memory().size();
        rf_info!(self.diagnostics, SOURCE, "Built top-level structure {:?} with {} instances",
            tlas.handle(), instance_count);

        self.tlas = Some(tlas);
        self.instance_buffer = Some(instance_buffer);
        self.state = BuildState::TlasBuilt;
        Ok(())
    }

    // ===== PHASE 4: OUTPUT IMAGE =====

    /// Create the storage image written by the ray-tracing dispatch
    pub fn create_storage_image(&mut self, resource_manager: &ResourceManager, width: u32, height: u32) -> Result<()> {
        self.require_state(BuildState::TlasBuilt, "create_storage_image")?;
        let image = resource_manager.create_storage_image(width, height, self.config.storage_image_format)?;
        rf_debug!(self.diagnostics, SOURCE, "Storage image {}x{} {:?}", width, height, self.config.storage_image_format);
        self.storage_image = Some(image);
        self.state = BuildState::Ready;
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn config(&self) -> &AccelerationStructureConfig {
        &self.config
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn static_instances(&self) -> &[usize] {
        &self.static_instances
    }

    pub fn dynamic_instances(&self) -> &BTreeMap<usize, Vec<usize>> {
        &self.dynamic_instances
    }

    /// Built bottom-level structures: dynamic meshes in mesh order, then the static group
    pub fn blas(&self) -> &[Blas] {
        &self.blas
    }

    /// Bottom-level structure of a dynamic mesh
    pub fn blas_for_mesh(&self, mesh: usize) -> Option<&Blas> {
        self.blas.iter().find(|blas| *blas.source() == BlasSource::Mesh(mesh))
    }

    /// Bottom-level structure holding the static instances
    pub fn static_blas(&self) -> Option<&Blas> {
        self.blas
            .iter()
            .find(|blas| matches!(blas.source(), BlasSource::StaticInstances(_)))
    }

    pub fn tlas(&self) -> Option<&AccelerationStructure> {
        self.tlas.as_ref()
    }

    pub fn tlas_handle(&self) -> Option<AccelerationStructureHandle> {
        self.tlas.as_ref().map(AccelerationStructure::handle)
    }

    /// Packed instance records of the top level, kept for descriptor binding
    pub fn instance_buffer(&self) -> Option<&Buffer> {
        self.instance_buffer.as_ref()
    }

    pub fn storage_image(&self) -> Option<&RenderImage> {
        self.storage_image.as_ref()
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Release every structure and buffer and return to `Uninitialized`
    pub fn reset(&mut self) {
        self.storage_image = None;
        self.tlas = None;
        self.instance_buffer = None;
        self.blas.clear();
        self.static_instances.clear();
        self.dynamic_instances.clear();
        self.stats = BuildStats::default();
        self.state = BuildState::Uninitialized;
        rf_debug!(self.diagnostics, SOURCE, "Builder reset");
    }

    // ===== HELPERS =====

    fn require_state(&self, expected: BuildState, operation: &str) -> Result<()> {
        if self.state != expected {
            rf_bail!(self.diagnostics, InvalidState, SOURCE,
                "{} requires state {:?}, builder is in {:?}", operation, expected, self.state);
        }
        Ok(())
    }

    /// Handle and reference must both match a built structure (handle values are reused after `reset()`)
    fn owns_blas(&self, instance: &TlasInstance) -> bool {
        self.blas
            .iter()
            .any(|blas| blas.handle() == instance.blas() && blas.reference() == instance.blas_reference())
    }

    fn record_build_barrier(cmd: &SingleUseCommand) {
        let access = AccessFlags::ACCELERATION_STRUCTURE_WRITE | AccessFlags::ACCELERATION_STRUCTURE_READ;
        cmd.pipeline_barrier(
            PipelineStageFlags::ACCELERATION_STRUCTURE_BUILD,
            PipelineStageFlags::ACCELERATION_STRUCTURE_BUILD,
            &[MemoryBarrier {
                src_access: access,
                dst_access: access,
            }],
            &[],
        );
    }

    fn build_error(&self, level: &str, error: Error) -> Error {
        rf_error!(self.diagnostics, SOURCE, "{} build failed: {}", level, error);
        match error {
            Error::BuildFailed(_) => error,
            other => Error::BuildFailed(format!("{} build: {}", level, other)),
        }
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
