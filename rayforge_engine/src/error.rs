//! Error types for the RayForge engine
//!
//! This module defines the error type shared by the resource manager,
//! the acceleration structure builder and the device backends.
//!
//! The variants follow the failure taxonomy of the GPU setup path:
//! allocation, object creation, acceleration-structure builds and
//! image layout transitions.

use std::fmt;

use crate::graphics_device::ImageLayout;

/// Result type for RayForge operations
pub type Result<T> = std::result::Result<T, Error>;

/// RayForge errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// No memory type matches the request, or the allocation call failed
    AllocationFailed(String),

    /// Out of GPU memory
    OutOfMemory,

    /// The device rejected a create-info (buffer, image, view, sampler, ...)
    CreationFailed(String),

    /// Acceleration-structure build or handle retrieval failed
    BuildFailed(String),

    /// No access-mask pairing is known for this layout transition
    UnsupportedTransition {
        old: ImageLayout,
        new: ImageLayout,
    },

    /// Invalid resource (out-of-range index, wrong usage, bad data size, ...)
    InvalidResource(String),

    /// Operation called in the wrong build phase
    InvalidState(String),

    /// Backend-specific error (Vulkan, mock, ...)
    BackendError(String),

    /// Initialization failed (instance, device, queues)
    InitializationFailed(String),

    /// File could not be read or decoded
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AllocationFailed(msg) => write!(f, "Allocation failed: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::CreationFailed(msg) => write!(f, "Creation failed: {}", msg),
            Error::BuildFailed(msg) => write!(f, "Acceleration structure build failed: {}", msg),
            Error::UnsupportedTransition { old, new } => {
                write!(f, "Unsupported image layout transition: {:?} -> {:?}", old, new)
            }
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
