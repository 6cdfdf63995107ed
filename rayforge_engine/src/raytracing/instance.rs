/// Top-level instance records
///
/// `GeometryInstance` is the exact 64-byte record read by a top-level build.
/// `TlasInstance` is the host-side description of one instance; it can only
/// be made from a built `Blas`, so a record never carries a reference to a
/// structure that has not been built.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::graphics_device::{AccelerationStructureHandle, GeometryInstanceFlags};
use crate::raytracing::Blas;
use crate::scene::to_row_major_3x4;

/// Largest value of a 24-bit field
pub const MAX_INSTANCE_CUSTOM_INDEX: u32 = 0x00FF_FFFF;

/// Packed instance record
///
/// Layout: row-major 3x4 transform, then `custom_index:24 | mask:8`,
/// `hit_group_offset:24 | flags:8`, then the 64-bit structure reference.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GeometryInstance {
    pub transform: [f32; 12],
    pub instance_custom_index_and_mask: u32,
    pub instance_offset_and_flags: u32,
    pub acceleration_structure_reference: u64,
}

impl GeometryInstance {
    pub const SIZE: usize = std::mem::size_of::<GeometryInstance>();

    /// Pack the fields; values wider than 24 bits are truncated
    pub fn new(
        transform: [f32; 12],
        custom_index: u32,
        mask: u8,
        hit_group_offset: u32,
        flags: GeometryInstanceFlags,
        acceleration_structure_reference: u64,
    ) -> Self {
        Self {
            transform,
            instance_custom_index_and_mask: (custom_index & MAX_INSTANCE_CUSTOM_INDEX) | ((mask as u32) << 24),
            instance_offset_and_flags: (hit_group_offset & MAX_INSTANCE_CUSTOM_INDEX) | ((flags.bits() as u32) << 24),
            acceleration_structure_reference,
        }
    }

    pub fn custom_index(&self) -> u32 {
        self.instance_custom_index_and_mask & MAX_INSTANCE_CUSTOM_INDEX
    }

    pub fn mask(&self) -> u8 {
        (self.instance_custom_index_and_mask >> 24) as u8
    }

    pub fn hit_group_offset(&self) -> u32 {
        self.instance_offset_and_flags & MAX_INSTANCE_CUSTOM_INDEX
    }

    pub fn flags(&self) -> GeometryInstanceFlags {
        GeometryInstanceFlags::from_bits_truncate((self.instance_offset_and_flags >> 24) as u8)
    }
}

/// One instance of a built bottom-level structure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TlasInstance {
    blas: AccelerationStructureHandle,
    blas_reference: u64,
    transform: Mat4,
    custom_index: u32,
    mask: u8,
    hit_group_offset: u32,
    flags: GeometryInstanceFlags,
}

impl TlasInstance {
    /// Instance of `blas` placed with `transform`, full mask, no flags
    pub fn new(blas: &Blas, transform: Mat4) -> Self {
        Self {
            blas: blas.handle(),
            blas_reference: blas.reference(),
            transform,
            custom_index: 0,
            mask: 0xFF,
            hit_group_offset: 0,
            flags: GeometryInstanceFlags::empty(),
        }
    }

    /// Custom index, keeping the low 24 bits
    pub fn with_custom_index(mut self, custom_index: u32) -> Self {
        self.custom_index = custom_index & MAX_INSTANCE_CUSTOM_INDEX;
        self
    }

    pub fn with_mask(mut self, mask: u8) -> Self {
        self.mask = mask;
        self
    }

    /// Hit group offset, keeping the low 24 bits
    pub fn with_hit_group_offset(mut self, hit_group_offset: u32) -> Self {
        self.hit_group_offset = hit_group_offset & MAX_INSTANCE_CUSTOM_INDEX;
        self
    }

    pub fn with_flags(mut self, flags: GeometryInstanceFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn blas(&self) -> AccelerationStructureHandle {
        self.blas
    }

    #[cfg(test)]
    pub(crate) fn with_blas_reference(mut self, blas_reference: u64) -> Self {
        self.blas_reference = blas_reference;
        self
    }

    pub fn blas_reference(&self) -> u64 {
        self.blas_reference
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn custom_index(&self) -> u32 {
        self.custom_index
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn to_geometry_instance(&self) -> GeometryInstance {
        GeometryInstance::new(
            to_row_major_3x4(&self.transform),
            self.custom_index,
            self.mask,
            self.hit_group_offset,
            self.flags,
            self.blas_reference,
        )
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
