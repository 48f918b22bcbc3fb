/// Device trait - factory for every GPU object the RHI needs

use std::sync::Arc;
use crate::error::Result;
use crate::device::{
    Buffer, BufferDesc, CommandBufferKind, CommandEncoder, DescriptorBinding,
    DescriptorPoolSize, DescriptorSet, DescriptorSetLayout, GraphicsPipeline,
    GraphicsState, PipelineLayout, RenderPass, ShaderModule, ShaderStage, VertexLayout,
};

/// Everything needed to compile a graphics pipeline
pub struct GraphicsPipelineDesc<'a> {
    /// One module per stage, in attachment order
    pub stages: &'a [Box<dyn ShaderModule>],
    pub layout: &'a dyn PipelineLayout,
    pub vertex_layout: &'a VertexLayout,
    pub state: &'a GraphicsState,
    pub render_pass: &'a dyn RenderPass,
    pub subpass: u32,
}

/// Logical device plus its memory manager, seen through the RHI
///
/// Every creation call either returns a complete object or an error;
/// a failed call never leaves a native object behind.
pub trait Device: Send + Sync {
    /// Number of frames the CPU may record ahead of the GPU
    fn frames_in_flight(&self) -> u32;

    /// Allocate a host-visible buffer
    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a transient shader module from SPIR-V words
    fn create_shader_module(&self, stage: ShaderStage, code: &[u32]) -> Result<Box<dyn ShaderModule>>;

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> Result<Arc<dyn DescriptorSetLayout>>;

    fn create_pipeline_layout(&self, set_layouts: &[Arc<dyn DescriptorSetLayout>]) -> Result<Arc<dyn PipelineLayout>>;

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc<'_>) -> Result<Arc<dyn GraphicsPipeline>>;

    /// Allocate `count` sets of `layout` from a pool sized by `pool_sizes` (per set)
    fn allocate_descriptor_sets(
        &self,
        layout: &Arc<dyn DescriptorSetLayout>,
        pool_sizes: &[DescriptorPoolSize],
        count: u32,
    ) -> Result<Vec<Arc<dyn DescriptorSet>>>;

    fn create_command_encoder(&self, kind: CommandBufferKind) -> Result<Box<dyn CommandEncoder>>;
}
