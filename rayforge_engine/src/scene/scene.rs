/// Scene description consumed by the acceleration structure builder.
///
/// A Scene owns the drawables (one per unique mesh) and the list of
/// instances placing them in the world. Each instance is authored as either
/// static (baked into a shared bottom-level structure through a build-time
/// transform) or dynamic (instanced from the per-mesh bottom-level structure
/// in the top-level structure).

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::error::{Error, Result};
use crate::graphics_device::BufferUsageFlags;
use crate::resource::{Buffer, ResourceManager};
use crate::scene::Drawable;
use crate::rf_debug;

const SOURCE: &str = "rayforge::Scene";

// ===== INSTANCES =====

/// How an instance is placed in the acceleration structures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceKind {
    /// Transform applied when the bottom-level structure is built
    Static,
    /// Transform applied by the top-level instance record
    Dynamic,
}

/// One placement of a drawable in the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneInstance {
    /// Index of the drawable in the scene
    pub mesh: usize,
    pub transform: Mat4,
    pub kind: InstanceKind,
    /// Custom index seen by shaders (24 bits). Defaults to the instance index.
    pub custom_index: Option<u32>,
    /// Visibility mask
    pub mask: u8,
    pub material_index: u32,
}

impl SceneInstance {
    pub fn new(mesh: usize, transform: Mat4, kind: InstanceKind) -> Self {
        Self {
            mesh,
            transform,
            kind,
            custom_index: None,
            mask: 0xFF,
            material_index: mesh as u32,
        }
    }

    pub fn with_custom_index(mut self, custom_index: u32) -> Self {
        self.custom_index = Some(custom_index);
        self
    }

    pub fn with_mask(mut self, mask: u8) -> Self {
        self.mask = mask;
        self
    }

    pub fn with_material_index(mut self, material_index: u32) -> Self {
        self.material_index = material_index;
        self
    }

    pub fn is_static(&self) -> bool {
        self.kind == InstanceKind::Static
    }
}

// ===== INSTANCE DATA =====

/// GPU record of one instance in the instance-data buffer
///
/// The transform is a row-major 3x4 matrix at offset 0, which is the layout
/// expected for a build-time geometry transform.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub transform: [f32; 12],
    pub mesh_index: u32,
    pub material_index: u32,
    pub _pad: [u32; 2],
}

impl InstanceData {
    /// Size of one record in the instance-data buffer
    pub const STRIDE: u64 = std::mem::size_of::<InstanceData>() as u64;

    /// Byte offset of the transform inside a record
    pub const TRANSFORM_OFFSET: u64 = std::mem::offset_of!(InstanceData, transform) as u64;

    pub fn from_instance(instance: &SceneInstance) -> Self {
        Self {
            transform: to_row_major_3x4(&instance.transform),
            mesh_index: instance.mesh as u32,
            material_index: instance.material_index,
            _pad: [0; 2],
        }
    }
}

/// First three rows of an affine matrix, row by row
pub fn to_row_major_3x4(matrix: &Mat4) -> [f32; 12] {
    let rows = matrix.transpose().to_cols_array();
    let mut out = [0.0; 12];
    out.copy_from_slice(&rows[..12]);
    out
}

// ===== SCENE =====

pub struct Scene {
    drawables: Vec<Drawable>,
    instances: Vec<SceneInstance>,
    /// Device-local copy of `instance_data()`, once uploaded
    instance_data_buffer: Option<Buffer>,
}

impl Scene {
    /// Create a scene
    ///
    /// # Errors
    ///
    /// `InvalidResource` if there are no instances or an instance names a
    /// drawable that does not exist.
    pub fn new(drawables: Vec<Drawable>, instances: Vec<SceneInstance>) -> Result<Self> {
        if instances.is_empty() {
            return Err(Error::InvalidResource("scene has no instances".to_string()));
        }
        if let Some((index, instance)) = instances
            .iter()
            .enumerate()
            .find(|(_, instance)| instance.mesh >= drawables.len())
        {
            return Err(Error::InvalidResource(format!(
                "instance {} references mesh {} but the scene has {} drawables",
                index,
                instance.mesh,
                drawables.len()
            )));
        }

        Ok(Self {
            drawables,
            instances,
            instance_data_buffer: None,
        })
    }

    pub fn drawables(&self) -> &[Drawable] {
        &self.drawables
    }

    pub fn drawable(&self, mesh: usize) -> Option<&Drawable> {
        self.drawables.get(mesh)
    }

    pub fn instances(&self) -> &[SceneInstance] {
        &self.instances
    }

    pub fn instance(&self, index: usize) -> Option<&SceneInstance> {
        self.instances.get(index)
    }

    /// Packed records of every instance, in instance order
    pub fn instance_data(&self) -> Vec<InstanceData> {
        self.instances.iter().map(InstanceData::from_instance).collect()
    }

    /// Upload the instance records to a device-local buffer
    ///
    /// Replaces any previous upload.
    pub fn upload_instance_data(&mut self, resource_manager: &ResourceManager) -> Result<()> {
        let records = self.instance_data();
        let buffer = resource_manager.create_optimal_buffer_from_slice(
            &records,
            BufferUsageFlags::RAY_TRACING | BufferUsageFlags::STORAGE,
        )?;
        rf_debug!(resource_manager.diagnostics(), SOURCE,
            "Uploaded {} instance records ({} bytes)", records.len(), buffer.size());
        self.instance_data_buffer = Some(buffer);
        Ok(())
    }

    pub fn instance_data_buffer(&self) -> Option<&Buffer> {
        self.instance_data_buffer.as_ref()
    }

    /// Byte offset of an instance's transform in the instance-data buffer
    pub fn transform_offset(instance: usize) -> u64 {
        instance as u64 * InstanceData::STRIDE + InstanceData::TRANSFORM_OFFSET
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
