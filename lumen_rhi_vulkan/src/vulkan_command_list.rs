/// CommandEncoder - Vulkan implementation of the RHI CommandEncoder trait
///
/// Every emission goes into a secondary command buffer recorded inside the
/// render pass (RENDER_PASS_CONTINUE). An Executable encoder also owns the
/// primary buffer that is submitted: at submit time it opens the render pass
/// and executes its own secondary plus every appended thread-local one,
/// subpass by subpass.

use ash::vk;
use lumen_rhi::lumen::Result;
use lumen_rhi::lumen::device::{
    Buffer, CommandBufferKind, CommandEncoder, DescriptorSet, Framebuffer, GraphicsPipeline,
    IndexType, PipelineLayout, Rect2D, Viewport,
};
use lumen_rhi::{rhi_bail, rhi_trace, rhi_warn};
use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::{GpuContext, QueueType};
use crate::vulkan_descriptor_set::VulkanDescriptorSet;
use crate::vulkan_format::{extent_to_vk, index_type_to_vk, rect_to_vk, viewport_to_vk, vk_error};
use crate::vulkan_frame_buffer::downcast_framebuffer;
use crate::vulkan_pipeline::{downcast_pipeline, downcast_pipeline_layout};

/// Command pool plus the secondary buffers it can hand out again
///
/// Buffers appended to an Executable encoder come back here once the
/// frame that executed them has been recycled.
struct EncoderPool {
    ctx: Arc<GpuContext>,
    pool: vk::CommandPool,
    retired: Mutex<Vec<vk::CommandBuffer>>,
}

impl EncoderPool {
    fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let pool = ctx.create_command_pool(QueueType::Graphics, vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)?;
        Ok(Self { ctx, pool, retired: Mutex::new(Vec::new()) })
    }

    fn retire(&self, buffer: vk::CommandBuffer) {
        match self.retired.lock() {
            Ok(mut retired) => retired.push(buffer),
            // Leaked until the pool is destroyed
            Err(_) => rhi_warn!("lumen::vulkan", "Secondary buffer list poisoned; buffer not reused"),
        }
    }

    fn secondary(&self) -> Result<vk::CommandBuffer> {
        let reused = match self.retired.lock() {
            Ok(mut retired) => retired.pop(),
            Err(_) => None,
        };
        match reused {
            Some(buffer) => Ok(buffer),
            None => self.ctx.allocate_command_buffer(self.pool, vk::CommandBufferLevel::SECONDARY),
        }
    }
}

impl Drop for EncoderPool {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// Render pass instance an encoder is recording for
#[derive(Clone, Copy)]
struct RenderTarget {
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    subpass_count: u32,
    subpass: u32,
}

/// Finished secondary buffer waiting to be executed in `subpass`
struct RecordedSecondary {
    buffer: vk::CommandBuffer,
    subpass: u32,
    owner: Arc<EncoderPool>,
}

pub struct VulkanCommandEncoder {
    ctx: Arc<GpuContext>,
    kind: CommandBufferKind,
    pool: Arc<EncoderPool>,
    /// Submitted buffer (Executable only)
    primary: Option<vk::CommandBuffer>,
    /// Secondary buffer being recorded
    recording: Option<vk::CommandBuffer>,
    target: Option<RenderTarget>,
    /// Own commands, once recording ended
    finished: Option<RecordedSecondary>,
    /// Thread-local commands merged through `append` (Executable only)
    appended: Vec<RecordedSecondary>,
}

impl VulkanCommandEncoder {
    pub(crate) fn new(ctx: Arc<GpuContext>, kind: CommandBufferKind) -> Result<Self> {
        let pool = Arc::new(EncoderPool::new(Arc::clone(&ctx))?);
        let primary = match kind {
            CommandBufferKind::Executable => {
                Some(ctx.allocate_command_buffer(pool.pool, vk::CommandBufferLevel::PRIMARY)?)
            }
            CommandBufferKind::ThreadLocal => None,
        };

        Ok(Self {
            ctx,
            kind,
            pool,
            primary,
            recording: None,
            target: None,
            finished: None,
            appended: Vec::new(),
        })
    }

    fn recording(&self) -> Result<vk::CommandBuffer> {
        match self.recording {
            Some(buffer) => Ok(buffer),
            None => rhi_bail!("lumen::vulkan", "{:?} encoder is not recording", self.kind),
        }
    }

    /// Secondaries to execute in `subpass`, own commands first
    fn secondaries_for(&self, subpass: u32) -> Vec<vk::CommandBuffer> {
        self.finished
            .iter()
            .chain(self.appended.iter())
            .filter(|secondary| secondary.subpass == subpass)
            .map(|secondary| secondary.buffer)
            .collect()
    }

    /// Record the primary buffer that runs the whole render pass
    ///
    /// Recording must have ended. Returns the buffer to submit.
    pub(crate) fn record_primary(&mut self) -> Result<vk::CommandBuffer> {
        let Some(primary) = self.primary else {
            rhi_bail!("lumen::vulkan", "Only Executable encoders can be submitted");
        };
        let (Some(target), None) = (self.target, self.recording) else {
            rhi_bail!("lumen::vulkan", "Executable encoder submitted before recording ended");
        };

        let device = &self.ctx.device;
        unsafe {
            device.reset_command_buffer(primary, vk::CommandBufferResetFlags::empty())
                .map_err(|e| vk_error("reset command buffer", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(primary, &begin_info)
                .map_err(|e| vk_error("begin command buffer", e))?;

            let clear_values = [vk::ClearValue {
                color: vk::ClearColorValue { float32: [0.0, 0.0, 0.0, 1.0] },
            }];
            let render_pass_begin = vk::RenderPassBeginInfo::default()
                .render_pass(target.render_pass)
                .framebuffer(target.framebuffer)
                .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: target.extent })
                .clear_values(&clear_values);

            device.cmd_begin_render_pass(primary, &render_pass_begin, vk::SubpassContents::SECONDARY_COMMAND_BUFFERS);
            for subpass in 0..target.subpass_count {
                if subpass > 0 {
                    device.cmd_next_subpass(primary, vk::SubpassContents::SECONDARY_COMMAND_BUFFERS);
                }
                let secondaries = self.secondaries_for(subpass);
                if !secondaries.is_empty() {
                    device.cmd_execute_commands(primary, &secondaries);
                }
            }
            device.cmd_end_render_pass(primary);

            device.end_command_buffer(primary)
                .map_err(|e| vk_error("end command buffer", e))?;
        }

        rhi_trace!("lumen::vulkan",
            "Recorded primary buffer: {} subpass(es), {} appended secondary buffer(s)",
            target.subpass_count, self.appended.len());
        Ok(primary)
    }

    fn release_secondaries(&mut self) {
        if let Some(buffer) = self.recording.take() {
            unsafe {
                self.ctx.device.reset_command_buffer(buffer, vk::CommandBufferResetFlags::empty()).ok();
            }
            self.pool.retire(buffer);
        }
        if let Some(secondary) = self.finished.take() {
            secondary.owner.retire(secondary.buffer);
        }
        for secondary in self.appended.drain(..) {
            secondary.owner.retire(secondary.buffer);
        }
    }
}

impl CommandEncoder for VulkanCommandEncoder {
    fn kind(&self) -> CommandBufferKind {
        self.kind
    }

    fn begin(&mut self, framebuffer: &dyn Framebuffer, subpass: u32) -> Result<()> {
        let vk_framebuffer = downcast_framebuffer(framebuffer)?;
        let subpass_count = framebuffer.render_pass().subpass_count();
        if subpass >= subpass_count {
            rhi_bail!("lumen::vulkan", "Subpass {} out of range (render pass has {})", subpass, subpass_count);
        }

        // Anything left from the previous recording goes back to its pool
        self.release_secondaries();

        let target = RenderTarget {
            render_pass: vk_framebuffer.vk_render_pass(),
            framebuffer: vk_framebuffer.framebuffer,
            extent: extent_to_vk(framebuffer.extent()),
            subpass_count,
            subpass,
        };

        let buffer = self.pool.secondary()?;
        let inheritance = vk::CommandBufferInheritanceInfo::default()
            .render_pass(target.render_pass)
            .subpass(subpass)
            .framebuffer(target.framebuffer);
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE)
            .inheritance_info(&inheritance);

        unsafe {
            let begun = self.ctx.device
                .reset_command_buffer(buffer, vk::CommandBufferResetFlags::empty())
                .and_then(|_| self.ctx.device.begin_command_buffer(buffer, &begin_info));
            if let Err(e) = begun {
                self.pool.retire(buffer);
                return Err(vk_error("begin secondary command buffer", e));
            }
        }

        self.recording = Some(buffer);
        self.target = Some(target);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let buffer = self.recording()?;
        let subpass = match self.target {
            Some(target) => target.subpass,
            None => 0,
        };

        unsafe { self.ctx.device.end_command_buffer(buffer) }
            .map_err(|e| vk_error("end command buffer", e))?;

        self.recording = None;
        self.finished = Some(RecordedSecondary { buffer, subpass, owner: Arc::clone(&self.pool) });
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        let buffer = self.recording()?;
        unsafe {
            self.ctx.device.cmd_set_viewport(buffer, 0, &[viewport_to_vk(&viewport)]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        let buffer = self.recording()?;
        unsafe {
            self.ctx.device.cmd_set_scissor(buffer, 0, &[rect_to_vk(&scissor)]);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn GraphicsPipeline) -> Result<()> {
        let buffer = self.recording()?;
        let pipeline = downcast_pipeline(pipeline)?;
        unsafe {
            self.ctx.device.cmd_bind_pipeline(buffer, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
        }
        Ok(())
    }

    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[(&Arc<dyn Buffer>, u64)]) -> Result<()> {
        let command_buffer = self.recording()?;
        let mut handles = Vec::with_capacity(buffers.len());
        let mut offsets = Vec::with_capacity(buffers.len());
        for (buffer, offset) in buffers {
            let Some(vk_buffer) = buffer.as_any().downcast_ref::<VulkanBuffer>() else {
                rhi_bail!("lumen::vulkan", "Vertex buffer was not created by the Vulkan device");
            };
            handles.push(vk_buffer.buffer);
            offsets.push(*offset);
        }
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(command_buffer, first_binding, &handles, &offsets);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()> {
        let command_buffer = self.recording()?;
        let Some(vk_buffer) = buffer.as_any().downcast_ref::<VulkanBuffer>() else {
            rhi_bail!("lumen::vulkan", "Index buffer was not created by the Vulkan device");
        };
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(command_buffer, vk_buffer.buffer, offset, index_type_to_vk(index_type));
        }
        Ok(())
    }

    fn bind_descriptor_set(&mut self, layout: &dyn PipelineLayout, set_index: u32, set: &dyn DescriptorSet) -> Result<()> {
        let buffer = self.recording()?;
        let layout = downcast_pipeline_layout(layout)?;
        let Some(set) = set.as_any().downcast_ref::<VulkanDescriptorSet>() else {
            rhi_bail!("lumen::vulkan", "Descriptor set was not allocated by the Vulkan device");
        };
        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout.layout,
                set_index,
                &[set.set],
                &[],
            );
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        let buffer = self.recording()?;
        unsafe {
            self.ctx.device.cmd_draw(buffer, vertex_count, instance_count, first_vertex, first_instance);
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        let buffer = self.recording()?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(buffer, index_count, instance_count, first_index, vertex_offset, first_instance);
        }
        Ok(())
    }

    fn append(&mut self, other: &mut dyn CommandEncoder) -> Result<()> {
        if self.kind != CommandBufferKind::Executable {
            rhi_bail!("lumen::vulkan", "Only Executable encoders accept appended commands");
        }
        let Some(target) = self.target else {
            rhi_bail!("lumen::vulkan", "Cannot append to an encoder that never began");
        };
        let Some(other) = other.as_any_mut().downcast_mut::<VulkanCommandEncoder>() else {
            rhi_bail!("lumen::vulkan", "Appended encoder was not created by the Vulkan device");
        };
        if other.kind != CommandBufferKind::ThreadLocal {
            rhi_bail!("lumen::vulkan", "Only ThreadLocal encoders can be appended");
        }
        if other.target.map(|t| t.framebuffer) != Some(target.framebuffer) {
            rhi_bail!("lumen::vulkan", "Appended commands target a different framebuffer");
        }
        let Some(secondary) = other.finished.take() else {
            rhi_bail!("lumen::vulkan", "Appended encoder has no finished recording");
        };

        other.target = None;
        self.appended.push(secondary);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.release_secondaries();
        self.target = None;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for VulkanCommandEncoder {
    fn drop(&mut self) {
        // Appended buffers belong to other pools; hand them back before they go away
        self.release_secondaries();
    }
}
