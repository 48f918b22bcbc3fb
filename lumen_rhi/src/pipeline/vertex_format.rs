/// Per-vertex-type strategy table
///
/// A `VertexFormat` is the static capability record the pipeline builder
/// needs for one vertex type: vertex streams, attribute mapping, the
/// descriptor layout the shaders expect, and how to size descriptor pools.
/// Vertex types publish theirs through `ShaderApi` and are looked up by tag.

use rustc_hash::FxHashMap;
use crate::device::{
    DescriptorBinding, DescriptorPoolSize, VertexAttribute, VertexBinding, VertexLayout,
};
use crate::error::{Error, Result};

/// Static pipeline configuration for one vertex type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexFormat {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
    pub descriptor_bindings: Vec<DescriptorBinding>,
    pub pool_sizes: Vec<DescriptorPoolSize>,
}

impl VertexFormat {
    pub fn vertex_layout(&self) -> VertexLayout {
        VertexLayout {
            bindings: self.bindings.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Check internal consistency
    ///
    /// Every attribute must reference a declared binding and fit in its
    /// stride; attribute locations and binding numbers must be unique.
    pub fn validate(&self) -> Result<()> {
        for (i, b) in self.bindings.iter().enumerate() {
            if self.bindings[..i].iter().any(|o| o.binding == b.binding) {
                return Err(Error::InvalidResource(format!("Duplicate vertex binding {}", b.binding)));
            }
        }

        for (i, attr) in self.attributes.iter().enumerate() {
            if self.attributes[..i].iter().any(|o| o.location == attr.location) {
                return Err(Error::InvalidResource(format!("Duplicate attribute location {}", attr.location)));
            }
            let binding = self.bindings.iter().find(|b| b.binding == attr.binding).ok_or_else(|| {
                Error::InvalidResource(format!(
                    "Attribute at location {} references undeclared binding {}",
                    attr.location, attr.binding
                ))
            })?;
            if attr.offset + attr.format.size_bytes() > binding.stride {
                return Err(Error::InvalidResource(format!(
                    "Attribute at location {} ({:?} at offset {}) exceeds stride {} of binding {}",
                    attr.location, attr.format, attr.offset, binding.stride, binding.binding
                )));
            }
        }

        for (i, d) in self.descriptor_bindings.iter().enumerate() {
            if self.descriptor_bindings[..i].iter().any(|o| o.binding == d.binding) {
                return Err(Error::InvalidResource(format!("Duplicate descriptor binding {}", d.binding)));
            }
        }

        Ok(())
    }
}

/// Implemented by every vertex type that can be drawn through a pipeline
pub trait ShaderApi {
    /// Registry key
    const TAG: &'static str;

    fn vertex_format() -> VertexFormat;
}

/// Tag -> vertex format table consulted by the pipeline builder
#[derive(Debug, Clone, Default)]
pub struct VertexFormatRegistry {
    formats: FxHashMap<&'static str, VertexFormat>,
}

impl VertexFormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with the built-in vertex types
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register::<crate::mesh::StaticMesh<'static>>();
        registry
    }

    /// Register `T`'s format under `T::TAG`, replacing any previous entry
    pub fn register<T: ShaderApi>(&mut self) {
        self.formats.insert(T::TAG, T::vertex_format());
    }

    /// Register a format that has no Rust vertex type behind it
    pub fn register_format(&mut self, tag: &'static str, format: VertexFormat) {
        self.formats.insert(tag, format);
    }

    pub fn get(&self, tag: &str) -> Option<&VertexFormat> {
        self.formats.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.formats.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

#[cfg(test)]
#[path = "vertex_format_tests.rs"]
mod tests;
