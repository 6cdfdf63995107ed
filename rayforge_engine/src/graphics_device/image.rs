/// Image, image view and sampler descriptors

use bitflags::bitflags;

/// Image pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum ImageFormat {
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,
    D32_FLOAT,
}

impl ImageFormat {
    /// Returns size in bytes of one texel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            ImageFormat::R8G8B8A8_SRGB
            | ImageFormat::R8G8B8A8_UNORM
            | ImageFormat::B8G8R8A8_UNORM
            | ImageFormat::D32_FLOAT => 4,
            ImageFormat::R16G16B16A16_SFLOAT => 8,
            ImageFormat::R32G32B32A32_SFLOAT => 16,
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(self, ImageFormat::D32_FLOAT)
    }
}

/// Current layout of an image
///
/// Every GPU access happens at a layout compatible with it; layout changes
/// are explicit barriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents undefined (freshly created)
    Undefined,
    /// Destination of transfer commands
    TransferDst,
    /// Sampled from shaders
    ShaderReadOnly,
    /// Depth/stencil attachment
    DepthStencilAttachment,
    /// Storage image (shader read/write)
    General,
}

bitflags! {
    /// Image usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsageFlags: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const SAMPLED = 1 << 2;
        const STORAGE = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
    }
}

/// Image aspect used by views and barriers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAspect {
    Color,
    Depth,
}

/// 2D extent in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

/// Descriptor for creating a 2D image (single mip level, single layer, optimal tiling)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub extent: Extent2D,
    pub format: ImageFormat,
    pub usage: ImageUsageFlags,
}

/// Texture filtering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Texture addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

/// Descriptor for creating a sampler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub address_mode: AddressMode,
    /// Anisotropic filtering level, None disables it
    pub max_anisotropy: Option<f32>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            address_mode: AddressMode::Repeat,
            max_anisotropy: None,
        }
    }
}
