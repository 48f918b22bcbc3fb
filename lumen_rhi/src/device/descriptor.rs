/// Descriptor set layouts, pool sizing and descriptor sets

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;
use crate::device::{Buffer, ShaderStageFlags};

/// Kind of resource bound through a descriptor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    StorageBuffer,
    CombinedImageSampler,
}

/// One slot of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    /// Array size of the slot
    pub count: u32,
    /// Stages that read the slot
    pub stages: ShaderStageFlags,
}

/// How many descriptors of one type a pool must reserve per set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    pub descriptor_type: DescriptorType,
    pub count: u32,
}

/// Compiled descriptor set layout
pub trait DescriptorSetLayout: Send + Sync {
    fn bindings(&self) -> &[DescriptorBinding];
    fn as_any(&self) -> &dyn Any;
}

/// Allocated descriptor set
pub trait DescriptorSet: Send + Sync {
    /// Point `binding` at `range` bytes of `buffer` starting at `offset`
    fn write_uniform_buffer(
        &self,
        binding: u32,
        buffer: &Arc<dyn Buffer>,
        offset: u64,
        range: u64,
    ) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
