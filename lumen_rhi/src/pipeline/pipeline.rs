/// Pipeline - compiled graphics pipeline plus its uniform bindings

use std::sync::Arc;
use crate::command::CommandBuffer;
use crate::device::{
    Buffer, BufferDesc, BufferUsage, DescriptorPoolSize, DescriptorSet, DescriptorSetLayout,
    DescriptorType, Device, GraphicsPipeline, PipelineLayout,
};
use crate::error::{Error, Result};
use crate::pipeline::VertexFormat;
use crate::{rhi_bail, rhi_debug};

/// Uniform buffer slot of a pipeline
///
/// Owns one host-visible buffer and one descriptor set per in-flight frame
/// (or a single set when not per-frame), all pointing at that buffer.
pub struct UniformBinding {
    binding: u32,
    device: Arc<dyn Device>,
    set_layout: Arc<dyn DescriptorSetLayout>,
    pool_sizes: Vec<DescriptorPoolSize>,
    buffer: Option<Arc<dyn Buffer>>,
    sets: Vec<Arc<dyn DescriptorSet>>,
    size: u64,
    uploads: u64,
}

impl UniformBinding {
    pub(crate) fn new(
        binding: u32,
        device: Arc<dyn Device>,
        set_layout: Arc<dyn DescriptorSetLayout>,
        pool_sizes: Vec<DescriptorPoolSize>,
    ) -> Self {
        Self {
            binding,
            device,
            set_layout,
            pool_sizes,
            buffer: None,
            sets: Vec::new(),
            size: 0,
            uploads: 0,
        }
    }

    pub fn binding(&self) -> u32 {
        self.binding
    }

    /// Size in bytes of the backing buffer (0 before `alloc`)
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_allocated(&self) -> bool {
        self.buffer.is_some()
    }

    /// Number of descriptor sets (frames in flight when per-frame)
    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    /// Number of successful `upload` calls
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    /// Allocate the backing buffer and descriptor sets
    ///
    /// Re-allocating replaces the previous buffer and sets.
    pub fn alloc(&mut self, size: u64, per_frame: bool) -> Result<()> {
        if size == 0 {
            return Err(Error::InvalidResource(format!(
                "Uniform binding {} cannot be allocated with size 0", self.binding
            )));
        }

        let buffer = self.device.create_buffer(BufferDesc { size, usage: BufferUsage::Uniform })?;
        let count = if per_frame { self.device.frames_in_flight().max(1) } else { 1 };
        let sets = self.device.allocate_descriptor_sets(&self.set_layout, &self.pool_sizes, count)?;
        for set in &sets {
            set.write_uniform_buffer(self.binding, &buffer, 0, size)?;
        }

        rhi_debug!("lumen::Pipeline", "Uniform binding {}: {} bytes, {} descriptor set(s)", self.binding, size, count);

        self.buffer = Some(buffer);
        self.sets = sets;
        self.size = size;
        Ok(())
    }

    /// Copy `data` to the start of the buffer and flush it
    pub fn upload(&mut self, data: &[u8]) -> Result<()> {
        let Some(buffer) = &self.buffer else {
            rhi_bail!("lumen::Pipeline", "Uniform binding {} uploaded before alloc", self.binding);
        };
        if data.len() as u64 > self.size {
            return Err(Error::InvalidResource(format!(
                "Uniform upload of {} bytes exceeds binding {} size {}",
                data.len(), self.binding, self.size
            )));
        }
        buffer.update(0, data)?;
        buffer.flush()?;
        self.uploads += 1;
        Ok(())
    }

    /// Bind the descriptor set of `frame_index` as set 0
    pub fn bind(&self, cmd: &mut CommandBuffer, layout: &dyn PipelineLayout, frame_index: u32) -> Result<()> {
        if self.sets.is_empty() {
            rhi_bail!("lumen::Pipeline", "Uniform binding {} bound before alloc", self.binding);
        }
        let set = &self.sets[frame_index as usize % self.sets.len()];
        cmd.bind_descriptor_set(layout, 0, set.as_ref())
    }

    /// Backing buffer, once allocated
    pub fn buffer(&self) -> Option<&Arc<dyn Buffer>> {
        self.buffer.as_ref()
    }
}

/// Compiled pipeline for one render pass subpass
///
/// Built by `PipelineBuilder`. Immutable apart from its uniform bindings.
pub struct Pipeline {
    native: Arc<dyn GraphicsPipeline>,
    layout: Arc<dyn PipelineLayout>,
    set_layout: Arc<dyn DescriptorSetLayout>,
    format: VertexFormat,
    subpass: u32,
    uniform_bindings: Vec<UniformBinding>,
}

impl Pipeline {
    pub(crate) fn new(
        device: Arc<dyn Device>,
        native: Arc<dyn GraphicsPipeline>,
        layout: Arc<dyn PipelineLayout>,
        set_layout: Arc<dyn DescriptorSetLayout>,
        format: VertexFormat,
        subpass: u32,
    ) -> Self {
        let uniform_bindings = format
            .descriptor_bindings
            .iter()
            .filter(|b| b.descriptor_type == DescriptorType::UniformBuffer)
            .map(|b| {
                UniformBinding::new(
                    b.binding,
                    Arc::clone(&device),
                    Arc::clone(&set_layout),
                    format.pool_sizes.clone(),
                )
            })
            .collect();

        Self {
            native,
            layout,
            set_layout,
            format,
            subpass,
            uniform_bindings,
        }
    }

    pub fn native(&self) -> &Arc<dyn GraphicsPipeline> {
        &self.native
    }

    pub fn layout(&self) -> &Arc<dyn PipelineLayout> {
        &self.layout
    }

    pub fn set_layout(&self) -> &Arc<dyn DescriptorSetLayout> {
        &self.set_layout
    }

    pub fn format(&self) -> &VertexFormat {
        &self.format
    }

    pub fn subpass(&self) -> u32 {
        self.subpass
    }

    pub fn uniform_binding(&self, binding: u32) -> Option<&UniformBinding> {
        self.uniform_bindings.iter().find(|u| u.binding == binding)
    }

    /// Uniform slot `binding`; fails if the vertex format declares no uniform buffer there
    pub fn uniform_binding_mut(&mut self, binding: u32) -> Result<&mut UniformBinding> {
        self.uniform_bindings
            .iter_mut()
            .find(|u| u.binding == binding)
            .ok_or_else(|| Error::InvalidResource(format!("Pipeline has no uniform binding {}", binding)))
    }

    /// Upload `data` to uniform slot `binding`
    pub fn upload_uniform(&mut self, binding: u32, data: &[u8]) -> Result<()> {
        self.uniform_binding_mut(binding)?.upload(data)
    }

    /// Bind uniform slot `binding` for `frame_index`
    pub fn bind_uniform(&self, cmd: &mut CommandBuffer, binding: u32, frame_index: u32) -> Result<()> {
        let uniform = self
            .uniform_binding(binding)
            .ok_or_else(|| Error::InvalidResource(format!("Pipeline has no uniform binding {}", binding)))?;
        uniform.bind(cmd, self.layout.as_ref(), frame_index)
    }
}
