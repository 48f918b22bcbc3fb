/// CommandEncoder trait - backend command recording

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;
use crate::device::{
    Buffer, DescriptorSet, Framebuffer, GraphicsPipeline, IndexType,
    PipelineLayout, Rect2D, Viewport,
};

/// Role of a command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBufferKind {
    /// Primary buffer submitted to a queue, one per frame in flight
    Executable,
    /// Secondary buffer recorded on a worker thread, merged into an Executable one
    ThreadLocal,
}

/// Native command recording
///
/// Encoders do not track legality: `CommandBuffer` validates every call
/// against its state machine before forwarding it here.
pub trait CommandEncoder: Send {
    fn kind(&self) -> CommandBufferKind;

    /// Start recording commands that target `subpass` of `framebuffer`
    fn begin(&mut self, framebuffer: &dyn Framebuffer, subpass: u32) -> Result<()>;

    /// Finish recording
    fn end(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    fn bind_pipeline(&mut self, pipeline: &dyn GraphicsPipeline) -> Result<()>;

    /// Bind `buffers` (buffer, byte offset) to consecutive bindings from `first_binding`
    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[(&Arc<dyn Buffer>, u64)]) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()>;

    fn bind_descriptor_set(&mut self, layout: &dyn PipelineLayout, set_index: u32, set: &dyn DescriptorSet) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()>;

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()>;

    /// Append the finished commands of a thread-local encoder to this one
    fn append(&mut self, other: &mut dyn CommandEncoder) -> Result<()>;

    /// Drop everything recorded since the last `begin`
    fn reset(&mut self) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
