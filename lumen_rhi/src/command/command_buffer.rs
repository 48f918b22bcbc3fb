/// CommandBuffer - recording state machine over a backend encoder

use std::sync::Arc;
use crate::error::Result;
use crate::device::{
    Buffer, CommandBufferKind, CommandEncoder, DescriptorSet, Extent2D, Framebuffer,
    IndexType, PipelineLayout, Rect2D, Viewport,
};
use crate::pipeline::Pipeline;
use crate::{rhi_bail_warn, rhi_trace};

/// Recording state
///
/// Executable: `Idle -> Writing -> Written -> Submitted -> Idle`.
/// ThreadLocal: `Idle -> Writing -> Written -> (merged) -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    Idle,
    Writing,
    Written,
    Submitted,
}

/// Command buffer with an explicit, checked recording lifecycle
///
/// Every rejected call returns `Error::InvalidState` and leaves the
/// buffer untouched.
pub struct CommandBuffer {
    kind: CommandBufferKind,
    state: CommandBufferState,
    /// Address of the framebuffer of the current recording
    target: Option<usize>,
    encoder: Box<dyn CommandEncoder>,
}

fn framebuffer_address(framebuffer: &dyn Framebuffer) -> usize {
    std::ptr::from_ref(framebuffer).cast::<()>() as usize
}

impl CommandBuffer {
    /// Wrap a freshly created encoder; the buffer starts `Idle`
    pub fn new(encoder: Box<dyn CommandEncoder>) -> Self {
        Self {
            kind: encoder.kind(),
            state: CommandBufferState::Idle,
            target: None,
            encoder,
        }
    }

    pub fn kind(&self) -> CommandBufferKind {
        self.kind
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    /// Backend encoder (read-only)
    pub fn encoder(&self) -> &dyn CommandEncoder {
        self.encoder.as_ref()
    }

    pub(crate) fn encoder_mut(&mut self) -> &mut dyn CommandEncoder {
        self.encoder.as_mut()
    }

    pub(crate) fn expect_writing(&self, op: &str) -> Result<()> {
        if self.state != CommandBufferState::Writing {
            rhi_bail_warn!("lumen::CommandBuffer",
                "{} requires Writing state (current: {:?}, kind: {:?})", op, self.state, self.kind);
        }
        Ok(())
    }

    /// Start recording into `framebuffer` for `pipeline`'s subpass
    ///
    /// Binds `pipeline` and sets viewport and scissor to the whole
    /// framebuffer, so the recording is self-contained even when it is
    /// later merged into another buffer.
    pub fn begin_writing(&mut self, framebuffer: &dyn Framebuffer, pipeline: &Pipeline) -> Result<()> {
        self.begin_subpass(framebuffer, pipeline.subpass())?;
        if let Err(e) = self.bind_target_state(framebuffer.extent(), pipeline) {
            self.reset()?;
            return Err(e);
        }
        Ok(())
    }

    fn bind_target_state(&mut self, extent: Extent2D, pipeline: &Pipeline) -> Result<()> {
        self.encoder.bind_pipeline(pipeline.native().as_ref())?;
        self.encoder.set_viewport(Viewport::from_extent(extent))?;
        self.encoder.set_scissor(Rect2D::from_extent(extent))
    }

    /// Start recording into `framebuffer` for `subpass`
    pub(crate) fn begin_subpass(&mut self, framebuffer: &dyn Framebuffer, subpass: u32) -> Result<()> {
        if self.state != CommandBufferState::Idle {
            rhi_bail_warn!("lumen::CommandBuffer",
                "begin_writing requires Idle state (current: {:?})", self.state);
        }
        self.encoder.begin(framebuffer, subpass)?;
        self.state = CommandBufferState::Writing;
        self.target = Some(framebuffer_address(framebuffer));
        Ok(())
    }

    /// Stop recording; no emission is accepted until the next `begin_writing`
    pub fn end_writing(&mut self) -> Result<()> {
        self.expect_writing("end_writing")?;
        self.encoder.end()?;
        self.state = CommandBufferState::Written;
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.expect_writing("set_viewport")?;
        self.encoder.set_viewport(viewport)
    }

    pub fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.expect_writing("set_scissor")?;
        self.encoder.set_scissor(scissor)
    }

    pub fn bind_pipeline(&mut self, pipeline: &Pipeline) -> Result<()> {
        self.expect_writing("bind_pipeline")?;
        self.encoder.bind_pipeline(pipeline.native().as_ref())
    }

    pub fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[(&Arc<dyn Buffer>, u64)]) -> Result<()> {
        self.expect_writing("bind_vertex_buffers")?;
        self.encoder.bind_vertex_buffers(first_binding, buffers)
    }

    pub fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.expect_writing("bind_index_buffer")?;
        self.encoder.bind_index_buffer(buffer, offset, index_type)
    }

    pub fn bind_descriptor_set(&mut self, layout: &dyn PipelineLayout, set_index: u32, set: &dyn DescriptorSet) -> Result<()> {
        self.expect_writing("bind_descriptor_set")?;
        self.encoder.bind_descriptor_set(layout, set_index, set)
    }

    /// Non-indexed draw
    pub fn draw_vertices(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.expect_writing("draw_vertices")?;
        self.encoder.draw(vertex_count, instance_count, first_vertex, first_instance)
    }

    /// Indexed draw using the bound index buffer
    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.expect_writing("draw_indexed")?;
        self.encoder.draw_indexed(index_count, instance_count, first_index, vertex_offset, first_instance)
    }

    /// Whether the current (or last) recording targets `framebuffer`
    pub fn targets(&self, framebuffer: &dyn Framebuffer) -> bool {
        self.target == Some(framebuffer_address(framebuffer))
    }

    /// Checks `add_commands` performs before touching either encoder
    pub(crate) fn check_mergeable(&self, other: &CommandBuffer) -> Result<()> {
        if self.kind != CommandBufferKind::Executable || self.state != CommandBufferState::Written {
            rhi_bail_warn!("lumen::CommandBuffer",
                "add_commands target must be a Written Executable buffer (got {:?} {:?})",
                self.state, self.kind);
        }
        if other.kind != CommandBufferKind::ThreadLocal || other.state != CommandBufferState::Written {
            rhi_bail_warn!("lumen::CommandBuffer",
                "add_commands source must be a Written ThreadLocal buffer (got {:?} {:?})",
                other.state, other.kind);
        }
        if self.target != other.target {
            rhi_bail_warn!("lumen::CommandBuffer", "add_commands source was recorded for another framebuffer");
        }
        Ok(())
    }

    /// Merge a finished thread-local buffer into this executable one
    ///
    /// Requires `self` to be `Written` + Executable and `other` to be
    /// `Written` + ThreadLocal, both recorded for the same framebuffer.
    /// On success `other` is back to `Idle`.
    pub fn add_commands(&mut self, other: &mut CommandBuffer) -> Result<()> {
        self.check_mergeable(other)?;
        self.encoder.append(other.encoder.as_mut())?;
        other.state = CommandBufferState::Idle;
        other.target = None;
        Ok(())
    }

    /// Discard any unsubmitted work and return to `Idle`
    pub fn reset(&mut self) -> Result<()> {
        self.encoder.reset()?;
        if self.state != CommandBufferState::Idle {
            rhi_trace!("lumen::CommandBuffer", "Reset from {:?}", self.state);
        }
        self.state = CommandBufferState::Idle;
        self.target = None;
        Ok(())
    }

    /// Written -> Submitted, after a successful queue submission
    pub(crate) fn mark_submitted(&mut self) -> Result<()> {
        if self.kind != CommandBufferKind::Executable || self.state != CommandBufferState::Written {
            rhi_bail_warn!("lumen::CommandBuffer",
                "Only Written Executable buffers can be submitted (got {:?} {:?})",
                self.state, self.kind);
        }
        self.state = CommandBufferState::Submitted;
        Ok(())
    }

    /// Submitted -> Idle once the frame slot is reused
    pub(crate) fn recycle(&mut self) -> Result<()> {
        if self.state == CommandBufferState::Submitted {
            self.encoder.reset()?;
            self.state = CommandBufferState::Idle;
            self.target = None;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;
