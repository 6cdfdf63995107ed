/// Drawable: the GPU geometry of one mesh
///
/// A Drawable owns its vertex, index and material buffers. The vertex and
/// index counts are the ones used when the mesh is converted into
/// acceleration-structure input. Drawables are created once when the scene
/// is loaded and never resized.

use bytemuck::{Pod, Zeroable};

use crate::error::Result;
use crate::graphics_device::{BufferFormat, BufferUsageFlags, IndexType};
use crate::resource::{Buffer, ResourceManager};
use crate::{rf_bail, rf_debug};

const SOURCE: &str = "rayforge::Drawable";

// ===== VERTEX =====

/// Interleaved vertex
///
/// `position` comes first so the position attribute sits at offset 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Format of the position attribute
    pub const POSITION_FORMAT: BufferFormat = BufferFormat::R32G32B32_SFLOAT;

    /// Distance in bytes between two consecutive vertices
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }
}

// ===== MATERIAL =====

/// Per-drawable material constants (uniform buffer layout)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Material {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    /// Index into the texture table, -1 for none
    pub texture_index: i32,
    pub _pad: u32,
}

impl Material {
    pub const NO_TEXTURE: i32 = -1;

    pub fn new(base_color: [f32; 4]) -> Self {
        Self {
            base_color,
            ..Self::default()
        }
    }

    pub fn with_texture(mut self, texture_index: usize) -> Self {
        self.texture_index = i32::try_from(texture_index).unwrap_or(Self::NO_TEXTURE);
        self
    }

    pub fn with_metallic_roughness(mut self, metallic: f32, roughness: f32) -> Self {
        self.metallic = metallic;
        self.roughness = roughness;
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 1.0,
            texture_index: Self::NO_TEXTURE,
            _pad: 0,
        }
    }
}

// ===== DRAWABLE =====

pub struct Drawable {
    name: String,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    material_buffer: Buffer,
    vertex_count: u32,
    index_count: u32,
    material: Material,
}

impl Drawable {
    /// Upload a mesh into three device-local buffers
    ///
    /// # Arguments
    ///
    /// * `resource_manager` - Allocates and uploads the buffers
    /// * `name` - Name used in log messages
    /// * `vertices` - Vertex data (must not be empty)
    /// * `indices` - Triangle list indices (non-empty, multiple of 3, all < vertex count)
    /// * `material` - Material constants
    pub fn new(
        resource_manager: &ResourceManager,
        name: impl Into<String>,
        vertices: &[Vertex],
        indices: &[u32],
        material: &Material,
    ) -> Result<Self> {
        let name = name.into();
        let diagnostics = resource_manager.diagnostics();

        if vertices.is_empty() || indices.is_empty() {
            rf_bail!(diagnostics, InvalidResource, SOURCE,
                "Drawable '{}' has no geometry ({} vertices, {} indices)",
                name, vertices.len(), indices.len());
        }
        if indices.len() % 3 != 0 {
            rf_bail!(diagnostics, InvalidResource, SOURCE,
                "Drawable '{}' index count {} is not a multiple of 3", name, indices.len());
        }
        let (Ok(vertex_count), Ok(index_count)) = (u32::try_from(vertices.len()), u32::try_from(indices.len())) else {
            rf_bail!(diagnostics, InvalidResource, SOURCE, "Drawable '{}' is too large", name);
        };
        if let Some(bad) = indices.iter().find(|&&index| index >= vertex_count) {
            rf_bail!(diagnostics, InvalidResource, SOURCE,
                "Drawable '{}' index {} out of range ({} vertices)", name, bad, vertex_count);
        }

        let vertex_buffer = resource_manager
            .create_optimal_buffer_from_slice(vertices, BufferUsageFlags::VERTEX | BufferUsageFlags::STORAGE)?;
        let index_buffer = resource_manager
            .create_optimal_buffer_from_slice(indices, BufferUsageFlags::INDEX | BufferUsageFlags::STORAGE)?;
        let material_buffer = resource_manager
            .create_optimal_buffer_from_slice(std::slice::from_ref(material), BufferUsageFlags::UNIFORM)?;

        rf_debug!(diagnostics, SOURCE, "Drawable '{}': {} vertices, {} triangles",
            name, vertex_count, index_count / 3);

        Ok(Self {
            name,
            vertex_buffer,
            index_buffer,
            material_buffer,
            vertex_count,
            index_count,
            material: *material,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &Buffer {
        &self.index_buffer
    }

    pub fn material_buffer(&self) -> &Buffer {
        &self.material_buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }

    pub fn index_type(&self) -> IndexType {
        IndexType::U32
    }

    pub fn material(&self) -> &Material {
        &self.material
    }
}

#[cfg(test)]
#[path = "drawable_tests.rs"]
mod tests;
