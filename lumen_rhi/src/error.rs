//! Error types for the Lumen RHI
//!
//! This module defines the error types used throughout the RHI,
//! including device-call failures, recording misuse, and shader loading.

use std::fmt;

/// Result type for Lumen RHI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen RHI errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock device, etc.)
    BackendError(String),

    /// Out of GPU (or host) memory
    OutOfMemory,

    /// Invalid resource (buffer, mesh, descriptor set, etc.)
    InvalidResource(String),

    /// Initialization failed (context, swapchain, subsystems)
    InitializationFailed(String),

    /// A native device call failed while constructing an object
    ///
    /// `code` is the raw result code returned by the graphics API
    /// (for Vulkan, `vk::Result::as_raw()`).
    Native {
        /// What was being attempted, e.g. "create graphics pipeline"
        operation: String,
        /// Raw native result code
        code: i32,
    },

    /// Call not legal in the current recording state
    InvalidState(String),

    /// A SPIR-V binary could not be read or is malformed
    ShaderLoad {
        /// Path of the offending file
        path: String,
        /// Why loading failed
        reason: String,
    },
}

impl Error {
    /// Native result code carried by the error, if any
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Error::Native { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::Native { operation, code } => {
                write!(f, "Failed to {} - native result code {}", operation, code)
            }
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::ShaderLoad { path, reason } => {
                write!(f, "Failed to load shader '{}': {}", path, reason)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
