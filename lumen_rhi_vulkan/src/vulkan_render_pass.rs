/// RenderPass - Vulkan implementation of the RHI RenderPass trait

use ash::vk;
use lumen_rhi::lumen::Result;
use lumen_rhi::lumen::device::RenderPass;
use lumen_rhi::{rhi_bail, rhi_debug};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::vk_error;

/// Render pass over a single cleared color attachment
///
/// Every subpass writes that attachment; subpass `n` waits for the color
/// writes of subpass `n - 1`.
pub struct VulkanRenderPass {
    ctx: Arc<GpuContext>,
    pub(crate) render_pass: vk::RenderPass,
    pub(crate) format: vk::Format,
    subpass_count: u32,
}

impl VulkanRenderPass {
    pub(crate) fn new_color(
        ctx: Arc<GpuContext>,
        format: vk::Format,
        subpass_count: u32,
        final_layout: vk::ImageLayout,
    ) -> Result<Self> {
        if subpass_count == 0 {
            rhi_bail!("lumen::vulkan", "A render pass needs at least one subpass");
        }

        let attachments = [vk::AttachmentDescription::default()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(final_layout)];

        let color_refs = [vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

        let subpasses: Vec<vk::SubpassDescription> = (0..subpass_count)
            .map(|_| {
                vk::SubpassDescription::default()
                    .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                    .color_attachments(&color_refs)
            })
            .collect();

        let dependencies = subpass_dependencies(subpass_count);

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { ctx.device.create_render_pass(&render_pass_info, None) }
            .map_err(|e| vk_error("create render pass", e))?;

        rhi_debug!("lumen::vulkan",
            "Created render pass ({:?}, {} subpass(es), final layout {:?})", format, subpass_count, final_layout);

        Ok(Self { ctx, render_pass, format, subpass_count })
    }
}

/// External -> 0, then a chain between consecutive subpasses
pub(crate) fn subpass_dependencies(subpass_count: u32) -> Vec<vk::SubpassDependency> {
    let color_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;

    let mut dependencies = vec![vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(color_stage)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(color_stage)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

    for subpass in 1..subpass_count {
        dependencies.push(vk::SubpassDependency::default()
            .src_subpass(subpass - 1)
            .dst_subpass(subpass)
            .src_stage_mask(color_stage)
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dst_stage_mask(color_stage)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dependency_flags(vk::DependencyFlags::BY_REGION));
    }
    dependencies
}

impl RenderPass for VulkanRenderPass {
    fn subpass_count(&self) -> u32 {
        self.subpass_count
    }

    fn color_attachment_count(&self, subpass: u32) -> u32 {
        if subpass < self.subpass_count { 1 } else { 0 }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanRenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

pub(crate) fn downcast_render_pass(render_pass: &dyn RenderPass) -> Result<&VulkanRenderPass> {
    match render_pass.as_any().downcast_ref::<VulkanRenderPass>() {
        Some(render_pass) => Ok(render_pass),
        None => rhi_bail!("lumen::vulkan", "Render pass was not created by the Vulkan backend"),
    }
}
