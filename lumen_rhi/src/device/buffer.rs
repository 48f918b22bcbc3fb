/// Buffer trait, buffer descriptor and vertex attribute formats

use std::any::Any;
use crate::error::Result;

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Vertex buffer
    Vertex,
    /// Index buffer
    Index,
    /// Uniform/constant buffer
    Uniform,
    /// Storage buffer
    Storage,
}

/// Descriptor for creating a buffer
///
/// Buffers created through a `Device` are host-visible: they are filled
/// with `update` and made visible to the GPU with `flush`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes (must be non-zero)
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
}

/// Vertex attribute formats
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferFormat {
    R32_SFLOAT,          // float
    R32G32_SFLOAT,       // vec2
    R32G32B32_SFLOAT,    // vec3
    R32G32B32A32_SFLOAT, // vec4
    R32_SINT,
    R32G32_SINT,
    R32G32B32_SINT,
    R32G32B32A32_SINT,
    R32_UINT,
    R32G32_UINT,
    R32G32B32_UINT,
    R32G32B32A32_UINT,
    R8G8B8A8_UNORM,
}

impl BufferFormat {
    /// Size in bytes of one element of this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            BufferFormat::R32_SFLOAT | BufferFormat::R32_SINT | BufferFormat::R32_UINT => 4,
            BufferFormat::R32G32_SFLOAT | BufferFormat::R32G32_SINT | BufferFormat::R32G32_UINT => 8,
            BufferFormat::R32G32B32_SFLOAT | BufferFormat::R32G32B32_SINT | BufferFormat::R32G32B32_UINT => 12,
            BufferFormat::R32G32B32A32_SFLOAT | BufferFormat::R32G32B32A32_SINT | BufferFormat::R32G32B32A32_UINT => 16,
            BufferFormat::R8G8B8A8_UNORM => 4,
        }
    }
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// GPU buffer resource
///
/// Implemented by backend-specific buffer types. The buffer and its
/// memory are released when the last handle is dropped.
pub trait Buffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    /// Copy `data` into the mapped memory at `offset`
    ///
    /// Fails with `InvalidResource` when the write would overrun the buffer.
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Make every write done so far visible to the device
    fn flush(&self) -> Result<()>;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}

/// Bounds check shared by backend `update` implementations
pub fn check_write_range(size: u64, offset: u64, len: usize) -> Result<()> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(crate::error::Error::InvalidResource(format!(
            "Write of {} bytes at offset {} overruns buffer of {} bytes",
            len, offset, size
        ))),
    }
}
