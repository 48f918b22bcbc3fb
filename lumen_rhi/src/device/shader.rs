/// Shader stages, shader modules and SPIR-V loading

use std::any::Any;
use std::path::{Path, PathBuf};
use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::device::DescriptorType;

/// SPIR-V magic number (little-endian word 0)
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl ShaderStage {
    /// Stage mask containing only this stage
    pub fn flag(&self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::TessellationControl => ShaderStageFlags::TESSELLATION_CONTROL,
            ShaderStage::TessellationEvaluation => ShaderStageFlags::TESSELLATION_EVALUATION,
            ShaderStage::Geometry => ShaderStageFlags::GEOMETRY,
            ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => ShaderStageFlags::COMPUTE,
        }
    }
}

bitflags! {
    /// Set of shader stages that may access a descriptor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 0x01;
        const TESSELLATION_CONTROL = 0x02;
        const TESSELLATION_EVALUATION = 0x04;
        const GEOMETRY = 0x08;
        const FRAGMENT = 0x10;
        const COMPUTE = 0x20;
        const ALL_GRAPHICS = 0x1F;
    }
}

/// Descriptor binding found by reflecting a shader binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    /// None for descriptor kinds the RHI does not model
    pub descriptor_type: Option<DescriptorType>,
}

/// Compiled shader stage module
///
/// Transient: pipeline construction creates one per stage and drops it
/// as soon as the pipeline exists.
pub trait ShaderModule: Send + Sync {
    fn stage(&self) -> ShaderStage;

    /// Entry point name ("main")
    fn entry_point(&self) -> &str {
        "main"
    }

    /// Descriptor bindings used by the module, when the backend reflects SPIR-V
    fn reflected_bindings(&self) -> &[ReflectedBinding] {
        &[]
    }

    fn as_any(&self) -> &dyn Any;
}

/// Decode a SPIR-V binary into 32-bit words
///
/// `label` names the source in error messages.
pub fn spirv_words(label: &str, bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(Error::ShaderLoad {
            path: label.to_string(),
            reason: format!("size {} is not a non-zero multiple of 4", bytes.len()),
        });
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    if words[0] != SPIRV_MAGIC {
        return Err(Error::ShaderLoad {
            path: label.to_string(),
            reason: format!("bad magic number {:#010x}", words[0]),
        });
    }

    Ok(words)
}

/// Read and decode a compiled SPIR-V file
pub fn load_spirv(path: &Path) -> Result<Vec<u32>> {
    let label = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| Error::ShaderLoad {
        path: label.clone(),
        reason: e.to_string(),
    })?;
    spirv_words(&label, &bytes)
}

/// Conventional location of a compiled shader: `<data_dir>/shaders/Vulkan/<name>`
pub fn resolve_shader_path(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join("shaders").join("Vulkan").join(name)
}
