/// PipelineBuilder - turns shader binaries and a vertex format into a `Pipeline`
///
/// Construction is split across three independent sub-builders:
/// - `DescriptorSetLayoutBuilder` for the descriptor slots of the vertex format
/// - `PipelineLayoutBuilder` for the set layouts
/// - `GraphicsStateBuilder` for blend, rasterization, multisample and dynamic state
///
/// Build order is fixed: descriptor set layout, pipeline layout, shader
/// modules, fixed-function state, pipeline. Any failing device call aborts
/// the build; objects created up to that point are dropped with the error.

use std::path::PathBuf;
use std::sync::Arc;
use crate::device::{
    BlendFactor, BlendOp, ColorBlendAttachment, ColorWriteMask, CullMode, DescriptorBinding,
    DescriptorSetLayout, Device, DynamicState, FrontFace, GraphicsPipelineDesc, GraphicsState,
    PipelineLayout, PolygonMode, PrimitiveTopology, RenderPass, SampleCount, ShaderModule,
    ShaderStage, load_spirv,
};
use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, ShaderApi, VertexFormat, VertexFormatRegistry};
use crate::{rhi_debug, rhi_error, rhi_warn};

// ============================================================================
// Descriptor set layout
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binding(&mut self, binding: DescriptorBinding) -> &mut Self {
        self.bindings.push(binding);
        self
    }

    pub fn add_bindings(&mut self, bindings: &[DescriptorBinding]) -> &mut Self {
        self.bindings.extend_from_slice(bindings);
        self
    }

    pub fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    pub fn build(&self, device: &dyn Device) -> Result<Arc<dyn DescriptorSetLayout>> {
        device.create_descriptor_set_layout(&self.bindings)
    }
}

// ============================================================================
// Pipeline layout
// ============================================================================

#[derive(Default)]
pub struct PipelineLayoutBuilder {
    set_layouts: Vec<Arc<dyn DescriptorSetLayout>>,
}

impl PipelineLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_set_layout(&mut self, layout: Arc<dyn DescriptorSetLayout>) -> &mut Self {
        self.set_layouts.push(layout);
        self
    }

    pub fn build(&self, device: &dyn Device) -> Result<Arc<dyn PipelineLayout>> {
        device.create_pipeline_layout(&self.set_layouts)
    }
}

// ============================================================================
// Fixed-function state
// ============================================================================

/// Builder for `GraphicsState`
///
/// Defaults: triangle list, fill, back-face culling, clockwise front face,
/// line width 1, one sample, blending disabled with an RGBA write mask,
/// viewport and scissor dynamic.
#[derive(Debug, Clone, Default)]
pub struct GraphicsStateBuilder {
    state: GraphicsState,
}

impl GraphicsStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the default state
    pub fn reset(&mut self) -> &mut Self {
        self.state = GraphicsState::default();
        self
    }

    pub fn topology(&mut self, topology: PrimitiveTopology) -> &mut Self {
        self.state.topology = topology;
        self
    }

    pub fn polygon_mode(&mut self, mode: PolygonMode) -> &mut Self {
        self.state.rasterization.polygon_mode = mode;
        self
    }

    pub fn cull_mode(&mut self, mode: CullMode) -> &mut Self {
        self.state.rasterization.cull_mode = mode;
        self
    }

    pub fn front_face(&mut self, face: FrontFace) -> &mut Self {
        self.state.rasterization.front_face = face;
        self
    }

    pub fn line_width(&mut self, width: f32) -> &mut Self {
        self.state.rasterization.line_width = width;
        self
    }

    pub fn samples(&mut self, samples: SampleCount) -> &mut Self {
        self.state.samples = samples;
        self
    }

    /// Enable blending on every color attachment with one equation for color and alpha
    pub fn blend(&mut self, src: BlendFactor, dst: BlendFactor, op: BlendOp) -> &mut Self {
        for attachment in &mut self.state.color_blend {
            attachment.blend_enable = true;
            attachment.src_color_factor = src;
            attachment.dst_color_factor = dst;
            attachment.color_op = op;
            attachment.src_alpha_factor = src;
            attachment.dst_alpha_factor = dst;
            attachment.alpha_op = op;
        }
        self
    }

    pub fn disable_blend(&mut self) -> &mut Self {
        for attachment in &mut self.state.color_blend {
            *attachment = ColorBlendAttachment {
                write_mask: attachment.write_mask,
                ..ColorBlendAttachment::default()
            };
        }
        self
    }

    pub fn write_mask(&mut self, mask: ColorWriteMask) -> &mut Self {
        for attachment in &mut self.state.color_blend {
            attachment.write_mask = mask;
        }
        self
    }

    pub fn dynamic_states(&mut self, states: &[DynamicState]) -> &mut Self {
        self.state.dynamic_states = states.to_vec();
        self
    }

    /// Final state for a subpass with `color_attachments` outputs
    ///
    /// The blend entry of attachment 0 is replicated to every attachment.
    pub fn build(&self, color_attachments: u32) -> GraphicsState {
        let mut state = self.state.clone();
        let template = state.color_blend.first().copied().unwrap_or_default();
        state.color_blend = vec![template; color_attachments.max(1) as usize];
        state
    }
}

// ============================================================================
// Pipeline builder
// ============================================================================

/// Declarative pipeline construction
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use lumen_rhi::lumen::{Result, device::{Device, RenderPass, ShaderStage}};
/// # use lumen_rhi::lumen::pipeline::PipelineBuilder;
/// # use lumen_rhi::lumen::mesh::StaticMesh;
/// # fn f(device: Arc<dyn Device>, render_pass: &dyn RenderPass) -> Result<()> {
/// let pipeline = PipelineBuilder::new(device)
///     .attach_shader(ShaderStage::Vertex, "shaders/Vulkan/triangle_vert.spv")
///     .attach_shader(ShaderStage::Fragment, "shaders/Vulkan/triangle_frag.spv")
///     .shader_api::<StaticMesh>()
///     .build(render_pass, 0)?;
/// # Ok(()) }
/// ```
pub struct PipelineBuilder {
    device: Arc<dyn Device>,
    shaders: Vec<(ShaderStage, PathBuf)>,
    format: Option<VertexFormat>,
    state: GraphicsStateBuilder,
}

impl PipelineBuilder {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self {
            device,
            shaders: Vec::new(),
            format: None,
            state: GraphicsStateBuilder::new(),
        }
    }

    /// Add a compiled SPIR-V stage; attaching a stage twice replaces the path
    pub fn attach_shader(&mut self, stage: ShaderStage, path: impl Into<PathBuf>) -> &mut Self {
        let path = path.into();
        match self.shaders.iter_mut().find(|(s, _)| *s == stage) {
            Some(entry) => entry.1 = path,
            None => self.shaders.push((stage, path)),
        }
        self
    }

    /// Use the vertex format published by `T`
    pub fn shader_api<T: ShaderApi>(&mut self) -> &mut Self {
        self.format = Some(T::vertex_format());
        self
    }

    pub fn vertex_format(&mut self, format: VertexFormat) -> &mut Self {
        self.format = Some(format);
        self
    }

    /// Use the format registered under `tag`
    pub fn vertex_format_from(&mut self, registry: &VertexFormatRegistry, tag: &str) -> Result<&mut Self> {
        let format = registry
            .get(tag)
            .ok_or_else(|| Error::InvalidResource(format!("No vertex format registered as '{}'", tag)))?;
        self.format = Some(format.clone());
        Ok(self)
    }

    pub fn state_mut(&mut self) -> &mut GraphicsStateBuilder {
        &mut self.state
    }

    pub fn shaders(&self) -> &[(ShaderStage, PathBuf)] {
        &self.shaders
    }

    /// Compile the pipeline for `subpass` of `render_pass`
    pub fn build(&self, render_pass: &dyn RenderPass, subpass: u32) -> Result<Pipeline> {
        let format = self
            .format
            .clone()
            .ok_or_else(|| Error::InvalidResource("Pipeline built without a vertex format".to_string()))?;
        format.validate()?;

        if self.shaders.is_empty() {
            return Err(Error::InvalidResource("Pipeline built without shader stages".to_string()));
        }
        if subpass >= render_pass.subpass_count() {
            return Err(Error::InvalidResource(format!(
                "Subpass {} out of range (render pass has {})",
                subpass, render_pass.subpass_count()
            )));
        }

        let device = self.device.as_ref();

        let set_layout = DescriptorSetLayoutBuilder::new()
            .add_bindings(&format.descriptor_bindings)
            .build(device)?;

        let layout = PipelineLayoutBuilder::new()
            .add_set_layout(Arc::clone(&set_layout))
            .build(device)?;

        let mut modules: Vec<Box<dyn ShaderModule>> = Vec::with_capacity(self.shaders.len());
        for (stage, path) in &self.shaders {
            let code = load_spirv(path).map_err(|e| {
                rhi_error!("lumen::PipelineBuilder", "{}", e);
                e
            })?;
            let module = device.create_shader_module(*stage, &code)?;
            check_reflection(module.as_ref(), &format.descriptor_bindings);
            modules.push(module);
        }

        let state = self.state.build(render_pass.color_attachment_count(subpass));
        let vertex_layout = format.vertex_layout();

        let native = device.create_graphics_pipeline(&GraphicsPipelineDesc {
            stages: &modules,
            layout: layout.as_ref(),
            vertex_layout: &vertex_layout,
            state: &state,
            render_pass,
            subpass,
        })?;

        // Shader modules are only needed during pipeline creation
        drop(modules);

        rhi_debug!("lumen::PipelineBuilder",
            "Built pipeline: {} stage(s), {} vertex binding(s), {} descriptor binding(s), subpass {}",
            self.shaders.len(), format.bindings.len(), format.descriptor_bindings.len(), subpass);

        Ok(Pipeline::new(
            Arc::clone(&self.device),
            native,
            layout,
            set_layout,
            format,
            subpass,
        ))
    }
}

/// Warn about descriptors a shader reads that the vertex format does not declare
fn check_reflection(module: &dyn ShaderModule, declared: &[DescriptorBinding]) {
    for reflected in module.reflected_bindings() {
        let matching = declared.iter().find(|d| d.binding == reflected.binding);
        match matching {
            _ if reflected.set != 0 => {
                rhi_warn!("lumen::PipelineBuilder",
                    "{:?} shader uses set {} binding {} ('{}'); only set 0 is laid out",
                    module.stage(), reflected.set, reflected.binding, reflected.name);
            }
            None => {
                rhi_warn!("lumen::PipelineBuilder",
                    "{:?} shader uses binding {} ('{}') missing from the vertex format",
                    module.stage(), reflected.binding, reflected.name);
            }
            Some(d) if reflected.descriptor_type.is_some_and(|t| t != d.descriptor_type) => {
                rhi_warn!("lumen::PipelineBuilder",
                    "{:?} shader binding {} is {:?} but the vertex format declares {:?}",
                    module.stage(), reflected.binding, reflected.descriptor_type, d.descriptor_type);
            }
            Some(d) if !d.stages.contains(module.stage().flag()) => {
                rhi_warn!("lumen::PipelineBuilder",
                    "Binding {} is not visible to the {:?} stage that reads it",
                    reflected.binding, module.stage());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "pipeline_builder_tests.rs"]
mod tests;
