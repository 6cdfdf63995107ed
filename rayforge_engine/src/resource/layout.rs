/// Access masks for image layout transitions
///
/// The table only lists the transitions the engine itself performs. Any
/// other pair is refused instead of guessed.

use crate::graphics_device::{AccessFlags, ImageLayout};

/// Source and destination access masks of one layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransitionAccess {
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

/// Every (old, new) pair with a known access-mask pairing
pub const SUPPORTED_TRANSITIONS: [(ImageLayout, ImageLayout); 5] = [
    (ImageLayout::Undefined, ImageLayout::TransferDst),
    (ImageLayout::TransferDst, ImageLayout::ShaderReadOnly),
    (ImageLayout::Undefined, ImageLayout::DepthStencilAttachment),
    (ImageLayout::Undefined, ImageLayout::General),
    (ImageLayout::General, ImageLayout::ShaderReadOnly),
];

/// Look up the access masks for a transition
///
/// # Returns
///
/// None if the pair is not in the table
pub fn layout_transition_access(old: ImageLayout, new: ImageLayout) -> Option<LayoutTransitionAccess> {
    let (src_access, dst_access) = match (old, new) {
        (ImageLayout::Undefined, ImageLayout::TransferDst) => {
            (AccessFlags::empty(), AccessFlags::TRANSFER_WRITE)
        }
        (ImageLayout::TransferDst, ImageLayout::ShaderReadOnly) => {
            (AccessFlags::TRANSFER_WRITE, AccessFlags::SHADER_READ)
        }
        (ImageLayout::Undefined, ImageLayout::DepthStencilAttachment) => (
            AccessFlags::empty(),
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        (ImageLayout::Undefined, ImageLayout::General) => {
            (AccessFlags::empty(), AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE)
        }
        (ImageLayout::General, ImageLayout::ShaderReadOnly) => {
            (AccessFlags::SHADER_WRITE, AccessFlags::SHADER_READ)
        }
        _ => return None,
    };
    Some(LayoutTransitionAccess { src_access, dst_access })
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
