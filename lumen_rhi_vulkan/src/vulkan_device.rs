/// VulkanDevice - the RHI `Device` on top of a shared `GpuContext`

use lumen_rhi::lumen::Result;
use lumen_rhi::lumen::device::{
    Buffer, BufferDesc, CommandBufferKind, CommandEncoder, DescriptorBinding, DescriptorPoolSize,
    DescriptorSet, DescriptorSetLayout, Device, GraphicsPipeline, GraphicsPipelineDesc,
    PipelineLayout, ShaderModule, ShaderStage,
};
use lumen_rhi::rhi_trace;
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::VulkanCommandEncoder;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_set::allocate_descriptor_sets;
use crate::vulkan_pipeline::{create_graphics_pipeline, VulkanDescriptorSetLayout, VulkanPipelineLayout};
use crate::vulkan_shader::VulkanShaderModule;

pub struct VulkanDevice {
    ctx: Arc<GpuContext>,
    frames_in_flight: u32,
}

impl VulkanDevice {
    pub(crate) fn new(ctx: Arc<GpuContext>, frames_in_flight: u32) -> Self {
        Self { ctx, frames_in_flight }
    }
}

impl Device for VulkanDevice {
    fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        let buffer = VulkanBuffer::new(Arc::clone(&self.ctx), desc)?;
        rhi_trace!("lumen::vulkan", "Created {:?} buffer of {} bytes", desc.usage, desc.size);
        Ok(Arc::new(buffer))
    }

    fn create_shader_module(&self, stage: ShaderStage, code: &[u32]) -> Result<Box<dyn ShaderModule>> {
        Ok(Box::new(VulkanShaderModule::new(Arc::clone(&self.ctx), stage, code)?))
    }

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> Result<Arc<dyn DescriptorSetLayout>> {
        Ok(Arc::new(VulkanDescriptorSetLayout::new(Arc::clone(&self.ctx), bindings)?))
    }

    fn create_pipeline_layout(&self, set_layouts: &[Arc<dyn DescriptorSetLayout>]) -> Result<Arc<dyn PipelineLayout>> {
        Ok(Arc::new(VulkanPipelineLayout::new(Arc::clone(&self.ctx), set_layouts)?))
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc<'_>) -> Result<Arc<dyn GraphicsPipeline>> {
        Ok(Arc::new(create_graphics_pipeline(&self.ctx, desc)?))
    }

    fn allocate_descriptor_sets(
        &self,
        layout: &Arc<dyn DescriptorSetLayout>,
        pool_sizes: &[DescriptorPoolSize],
        count: u32,
    ) -> Result<Vec<Arc<dyn DescriptorSet>>> {
        allocate_descriptor_sets(&self.ctx, layout, pool_sizes, count)
    }

    fn create_command_encoder(&self, kind: CommandBufferKind) -> Result<Box<dyn CommandEncoder>> {
        Ok(Box::new(VulkanCommandEncoder::new(Arc::clone(&self.ctx), kind)?))
    }
}
