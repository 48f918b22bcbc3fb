/// Pipeline module - vertex format strategies, pipeline construction, uniform bindings

pub mod vertex_format;
pub mod pipeline_builder;
pub mod pipeline;

pub use vertex_format::{ShaderApi, VertexFormat, VertexFormatRegistry};
pub use pipeline_builder::{
    DescriptorSetLayoutBuilder, GraphicsStateBuilder, PipelineBuilder, PipelineLayoutBuilder,
};
pub use pipeline::{Pipeline, UniformBinding};
