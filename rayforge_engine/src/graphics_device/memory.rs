/// Device memory types and memory-type selection

use bitflags::bitflags;

bitflags! {
    /// Memory property flags of a device memory type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryPropertyFlags: u32 {
        /// Fastest memory for device access, usually not host-mappable
        const DEVICE_LOCAL = 1 << 0;
        /// Host can map this memory
        const HOST_VISIBLE = 1 << 1;
        /// Host writes are visible to the device without explicit flushes
        const HOST_COHERENT = 1 << 2;
        /// Host reads are cached
        const HOST_CACHED = 1 << 3;
        /// Backing memory may be provided lazily by the implementation
        const LAZILY_ALLOCATED = 1 << 4;
    }
}

/// One entry of the device memory-type table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub property_flags: MemoryPropertyFlags,
    pub heap_index: u32,
}

/// Memory-type table reported by the device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryProperties {
    pub memory_types: Vec<MemoryType>,
}

impl MemoryProperties {
    /// Find the first memory type allowed by `type_bits` that has every flag in `required`
    ///
    /// # Arguments
    ///
    /// * `type_bits` - Bit i set means memory type i is acceptable (from MemoryRequirements)
    /// * `required` - Property flags the memory type must contain
    ///
    /// # Returns
    ///
    /// The lowest matching index, or None if no memory type matches
    pub fn find_memory_type(&self, type_bits: u32, required: MemoryPropertyFlags) -> Option<u32> {
        self.memory_types
            .iter()
            .take(32)
            .enumerate()
            .find(|(index, memory_type)| {
                type_bits & (1u32 << index) != 0 && memory_type.property_flags.contains(required)
            })
            .map(|(index, _)| index as u32)
    }

    /// Property flags of a memory type, if the index is valid
    pub fn property_flags(&self, memory_type_index: u32) -> Option<MemoryPropertyFlags> {
        self.memory_types
            .get(memory_type_index as usize)
            .map(|memory_type| memory_type.property_flags)
    }
}

/// Size, alignment and acceptable memory types of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirements {
    pub size: u64,
    pub alignment: u64,
    pub memory_type_bits: u32,
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
