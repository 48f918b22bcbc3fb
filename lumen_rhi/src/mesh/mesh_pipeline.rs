/// MeshPipeline - pipeline for `StaticMesh` with a per-pipeline GPU buffer cache

use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::command::CommandBuffer;
use crate::device::{Device, Extent2D, IndexType, Rect2D, RenderPass, ShaderStage, Viewport, resolve_shader_path};
use crate::error::{Error, Result};
use crate::mesh::{GpuMeshBuffers, MeshCache, StaticMesh};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::{rhi_debug, rhi_info};

/// Per-draw entry point of a pipeline for objects of type `T`
pub trait ProcessObject<T: ?Sized> {
    /// Record everything needed to draw `object` into `cmd`
    fn process_object(&mut self, cmd: &mut CommandBuffer, frame_index: u32, object: &T) -> Result<()>;
}

/// Counters accumulated between `begin_processing` and `end_processing`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub uploads: u32,
    pub cache_hits: u32,
    pub cache_misses: u32,
}

/// Pipeline drawing colored 2D meshes
///
/// Uniform binding 0 holds a single `f32` oscillator (`sin` of an internal
/// timer) read by the fragment shader. Mesh buffers are cached by content,
/// so resubmitting the same geometry every frame costs no uploads.
pub struct MeshPipeline {
    device: Arc<dyn Device>,
    builder: PipelineBuilder,
    pipeline: Pipeline,
    cache: MeshCache,
    timer: f32,
    stats: FrameStats,
}

impl MeshPipeline {
    /// Vertex shader file name under the shader directory
    pub const VERTEX_SHADER: &'static str = "triangle_vert.spv";
    /// Fragment shader file name under the shader directory
    pub const FRAGMENT_SHADER: &'static str = "triangle_frag.spv";
    /// Size in bytes of uniform binding 0
    pub const UNIFORM_SIZE: u64 = std::mem::size_of::<f32>() as u64;
    /// Timer increment per processed object
    pub const TIMER_STEP: f32 = 0.001;

    /// Build the pipeline for `subpass` of `render_pass`
    pub fn new(
        device: Arc<dyn Device>,
        shader_stages: &[(ShaderStage, PathBuf)],
        render_pass: &dyn RenderPass,
        subpass: u32,
    ) -> Result<Self> {
        let mut builder = PipelineBuilder::new(Arc::clone(&device));
        for (stage, path) in shader_stages {
            builder.attach_shader(*stage, path.clone());
        }
        builder.shader_api::<StaticMesh>();

        let pipeline = Self::compile(&builder, render_pass, subpass)?;

        rhi_info!("lumen::MeshPipeline", "Mesh pipeline created for subpass {}", subpass);

        Ok(Self {
            device,
            builder,
            pipeline,
            cache: MeshCache::new(),
            timer: 0.0,
            stats: FrameStats::default(),
        })
    }

    /// Build with `triangle_vert.spv` / `triangle_frag.spv` from `<data_dir>/shaders/Vulkan`
    pub fn with_default_shaders(
        device: Arc<dyn Device>,
        data_dir: &Path,
        render_pass: &dyn RenderPass,
        subpass: u32,
    ) -> Result<Self> {
        let stages = [
            (ShaderStage::Vertex, resolve_shader_path(data_dir, Self::VERTEX_SHADER)),
            (ShaderStage::Fragment, resolve_shader_path(data_dir, Self::FRAGMENT_SHADER)),
        ];
        Self::new(device, &stages, render_pass, subpass)
    }

    fn compile(builder: &PipelineBuilder, render_pass: &dyn RenderPass, subpass: u32) -> Result<Pipeline> {
        let mut pipeline = builder.build(render_pass, subpass)?;
        pipeline.uniform_binding_mut(0)?.alloc(Self::UNIFORM_SIZE, true)?;
        Ok(pipeline)
    }

    /// Rebuild the compiled pipeline against a new render pass
    ///
    /// Called after the owning swapchain or framebuffer was rebuilt. The mesh
    /// cache survives; the uniform binding is reallocated.
    pub fn invalidate(&mut self, render_pass: &dyn RenderPass) -> Result<()> {
        let subpass = self.pipeline.subpass();
        self.pipeline = Self::compile(&self.builder, render_pass, subpass)?;
        rhi_debug!("lumen::MeshPipeline", "Pipeline rebuilt, {} cached meshes kept", self.cache.len());
        Ok(())
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn cache(&self) -> &MeshCache {
        &self.cache
    }

    /// Current oscillator phase
    pub fn timer(&self) -> f32 {
        self.timer
    }

    /// Bind the pipeline and cover `extent` with the dynamic viewport and scissor
    ///
    /// Needed for frame buffers from `Swapchain::begin_frame`, which are not
    /// begun for a particular pipeline.
    pub fn begin_processing(&mut self, cmd: &mut CommandBuffer, extent: Extent2D) -> Result<()> {
        cmd.bind_pipeline(&self.pipeline)?;
        cmd.set_viewport(Viewport::from_extent(extent))?;
        cmd.set_scissor(Rect2D::from_extent(extent))?;
        self.stats = FrameStats::default();
        Ok(())
    }

    /// Close the processing pass and return its counters
    pub fn end_processing(&mut self) -> FrameStats {
        std::mem::take(&mut self.stats)
    }

    /// Upload `mesh` if needed, without recording anything
    ///
    /// Lets the main thread fill the cache before worker threads record
    /// through `draw_cached`.
    pub fn prepare(&mut self, mesh: &StaticMesh<'_>) -> Result<()> {
        let (_, hit) = self.cache.get_or_upload(self.device.as_ref(), mesh)?;
        if !hit {
            self.stats.uploads += 1;
        }
        Ok(())
    }

    /// Record the draw of an already cached mesh
    ///
    /// Read-only: usable from several threads at once. Does not touch the
    /// uniform binding.
    pub fn draw_cached(&self, cmd: &mut CommandBuffer, frame_index: u32, mesh: &StaticMesh<'_>) -> Result<()> {
        let buffers = self.cache.get(mesh).ok_or_else(|| {
            Error::InvalidResource("Mesh drawn from cache before prepare".to_string())
        })?;
        record_draw(&self.pipeline, cmd, frame_index, buffers)
    }
}

impl<'a> ProcessObject<StaticMesh<'a>> for MeshPipeline {
    fn process_object(&mut self, cmd: &mut CommandBuffer, frame_index: u32, mesh: &StaticMesh<'a>) -> Result<()> {
        cmd.expect_writing("process_object")?;

        let (buffers, hit) = self.cache.get_or_upload(self.device.as_ref(), mesh)?;
        let buffers = buffers.clone();
        if hit {
            self.stats.cache_hits += 1;
        } else {
            self.stats.cache_misses += 1;
            self.stats.uploads += 1;
        }

        let t = self.timer.sin();
        self.timer += Self::TIMER_STEP;
        if frame_index == 0 {
            self.pipeline.upload_uniform(0, bytemuck::bytes_of(&t))?;
        }

        record_draw(&self.pipeline, cmd, frame_index, &buffers)?;
        self.stats.draw_calls += 1;
        Ok(())
    }
}

/// Bind the mesh streams and uniform set, then issue exactly one draw
fn record_draw(pipeline: &Pipeline, cmd: &mut CommandBuffer, frame_index: u32, buffers: &GpuMeshBuffers) -> Result<()> {
    cmd.bind_vertex_buffers(0, &[(&buffers.vertex, 0), (&buffers.vertex, buffers.color_offset)])?;
    pipeline.bind_uniform(cmd, 0, frame_index)?;

    match &buffers.index {
        Some(index) if buffers.index_count > 0 => {
            cmd.bind_index_buffer(index, 0, IndexType::U32)?;
            cmd.draw_indexed(buffers.index_count, 1, 0, 0, 0)
        }
        _ => cmd.draw_vertices(buffers.vertex_count, 1, 0, 0),
    }
}

#[cfg(test)]
#[path = "mesh_pipeline_tests.rs"]
mod tests;
