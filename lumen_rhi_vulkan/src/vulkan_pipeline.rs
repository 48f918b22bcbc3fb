/// Descriptor set layouts, pipeline layouts and graphics pipelines

use ash::vk;
use lumen_rhi::lumen::{Error, Result};
use lumen_rhi::lumen::device::{
    DescriptorBinding, DescriptorSetLayout, DynamicState, GraphicsPipeline, GraphicsPipelineDesc,
    PipelineLayout,
};
use lumen_rhi::{rhi_bail, rhi_debug};
use std::any::Any;
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    blend_factor_to_vk, blend_op_to_vk, buffer_format_to_vk, color_write_mask_to_vk,
    cull_mode_to_vk, descriptor_type_to_vk, dynamic_state_to_vk, front_face_to_vk,
    input_rate_to_vk, polygon_mode_to_vk, sample_count_to_vk, shader_stage_to_vk,
    stage_flags_to_vk, topology_to_vk, vk_error,
};
use crate::vulkan_render_pass::downcast_render_pass;
use crate::vulkan_shader::VulkanShaderModule;

// ===== Descriptor set layout =====

pub struct VulkanDescriptorSetLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::DescriptorSetLayout,
    bindings: Vec<DescriptorBinding>,
}

impl VulkanDescriptorSetLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, bindings: &[DescriptorBinding]) -> Result<Self> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                    .descriptor_count(b.count)
                    .stage_flags(stage_flags_to_vk(b.stages))
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let layout = unsafe { ctx.device.create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| vk_error("create descriptor set layout", e))?;

        Ok(Self { ctx, layout, bindings: bindings.to_vec() })
    }
}

impl DescriptorSetLayout for VulkanDescriptorSetLayout {
    fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

pub(crate) fn downcast_set_layout(layout: &dyn DescriptorSetLayout) -> Result<&VulkanDescriptorSetLayout> {
    match layout.as_any().downcast_ref::<VulkanDescriptorSetLayout>() {
        Some(layout) => Ok(layout),
        None => rhi_bail!("lumen::vulkan", "Descriptor set layout was not created by the Vulkan device"),
    }
}

// ===== Pipeline layout =====

pub struct VulkanPipelineLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::PipelineLayout,
    _set_layouts: Vec<Arc<dyn DescriptorSetLayout>>,
}

impl VulkanPipelineLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, set_layouts: &[Arc<dyn DescriptorSetLayout>]) -> Result<Self> {
        let handles = set_layouts
            .iter()
            .map(|l| downcast_set_layout(l.as_ref()).map(|l| l.layout))
            .collect::<Result<Vec<_>>>()?;

        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&handles);
        let layout = unsafe { ctx.device.create_pipeline_layout(&create_info, None) }
            .map_err(|e| vk_error("create pipeline layout", e))?;

        Ok(Self { ctx, layout, _set_layouts: set_layouts.to_vec() })
    }
}

impl PipelineLayout for VulkanPipelineLayout {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

pub(crate) fn downcast_pipeline_layout(layout: &dyn PipelineLayout) -> Result<&VulkanPipelineLayout> {
    match layout.as_any().downcast_ref::<VulkanPipelineLayout>() {
        Some(layout) => Ok(layout),
        None => rhi_bail!("lumen::vulkan", "Pipeline layout was not created by the Vulkan device"),
    }
}

// ===== Graphics pipeline =====

pub struct VulkanGraphicsPipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
}

impl GraphicsPipeline for VulkanGraphicsPipeline {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanGraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

/// Compile a graphics pipeline for `desc.subpass` of `desc.render_pass`
///
/// Viewport and scissor are always dynamic; depth and stencil tests are off.
pub(crate) fn create_graphics_pipeline(ctx: &Arc<GpuContext>, desc: &GraphicsPipelineDesc<'_>) -> Result<VulkanGraphicsPipeline> {
    let layout = downcast_pipeline_layout(desc.layout)?.layout;
    let render_pass = downcast_render_pass(desc.render_pass)?;

    // Shader stages
    let mut entry_points = Vec::with_capacity(desc.stages.len());
    let mut modules = Vec::with_capacity(desc.stages.len());
    for stage in desc.stages {
        let Some(module) = stage.as_any().downcast_ref::<VulkanShaderModule>() else {
            rhi_bail!("lumen::vulkan", "{:?} shader module was not created by the Vulkan device", stage.stage());
        };
        let entry = CString::new(stage.entry_point()).map_err(|_| {
            Error::InvalidResource(format!("Entry point of {:?} shader contains a NUL byte", stage.stage()))
        })?;
        entry_points.push(entry);
        modules.push((shader_stage_to_vk(stage.stage()), module.module));
    }
    let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = modules
        .iter()
        .zip(&entry_points)
        .map(|(&(stage, module), entry)| {
            vk::PipelineShaderStageCreateInfo::default()
                .stage(stage)
                .module(module)
                .name(entry)
        })
        .collect();

    // Vertex input state
    let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc.vertex_layout.bindings
        .iter()
        .map(|binding| vk::VertexInputBindingDescription {
            binding: binding.binding,
            stride: binding.stride,
            input_rate: input_rate_to_vk(binding.input_rate),
        })
        .collect();

    let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc.vertex_layout.attributes
        .iter()
        .map(|attribute| vk::VertexInputAttributeDescription {
            location: attribute.location,
            binding: attribute.binding,
            format: buffer_format_to_vk(attribute.format),
            offset: attribute.offset,
        })
        .collect();

    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&vertex_bindings)
        .vertex_attribute_descriptions(&vertex_attributes);

    let state = desc.state;
    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(topology_to_vk(state.topology))
        .primitive_restart_enable(false);

    let viewport_count = state.viewport_count.max(1);
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(viewport_count)
        .scissor_count(viewport_count);

    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(polygon_mode_to_vk(state.rasterization.polygon_mode))
        .line_width(state.rasterization.line_width)
        .cull_mode(cull_mode_to_vk(state.rasterization.cull_mode))
        .front_face(front_face_to_vk(state.rasterization.front_face))
        .depth_bias_enable(false);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(sample_count_to_vk(state.samples));

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(false)
        .depth_write_enable(false)
        .stencil_test_enable(false);

    let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = state.color_blend
        .iter()
        .map(|blend| {
            let mut attachment = vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(color_write_mask_to_vk(&blend.write_mask))
                .blend_enable(blend.blend_enable);
            if blend.blend_enable {
                attachment = attachment
                    .src_color_blend_factor(blend_factor_to_vk(blend.src_color_factor))
                    .dst_color_blend_factor(blend_factor_to_vk(blend.dst_color_factor))
                    .color_blend_op(blend_op_to_vk(blend.color_op))
                    .src_alpha_blend_factor(blend_factor_to_vk(blend.src_alpha_factor))
                    .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_alpha_factor))
                    .alpha_blend_op(blend_op_to_vk(blend.alpha_op));
            }
            attachment
        })
        .collect();

    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let mut dynamic: Vec<DynamicState> = state.dynamic_states.clone();
    for required in [DynamicState::Viewport, DynamicState::Scissor] {
        if !dynamic.contains(&required) {
            rhi_debug!("lumen::vulkan", "Adding {:?} to the dynamic states", required);
            dynamic.push(required);
        }
    }
    let dynamic_states: Vec<vk::DynamicState> = dynamic.into_iter().map(dynamic_state_to_vk).collect();
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .multisample_state(&multisample_state)
        .depth_stencil_state(&depth_stencil_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass.render_pass)
        .subpass(desc.subpass);

    let pipelines = unsafe {
        ctx.device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
    }
    .map_err(|(_, e)| vk_error("create graphics pipeline", e))?;

    let Some(&pipeline) = pipelines.first() else {
        rhi_bail!("lumen::vulkan", "Pipeline creation returned no pipeline");
    };

    Ok(VulkanGraphicsPipeline { ctx: Arc::clone(ctx), pipeline })
}

pub(crate) fn downcast_pipeline(pipeline: &dyn GraphicsPipeline) -> Result<&VulkanGraphicsPipeline> {
    match pipeline.as_any().downcast_ref::<VulkanGraphicsPipeline>() {
        Some(pipeline) => Ok(pipeline),
        None => rhi_bail!("lumen::vulkan", "Pipeline was not created by the Vulkan device"),
    }
}
