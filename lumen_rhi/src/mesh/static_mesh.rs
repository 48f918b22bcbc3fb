/// StaticMesh - colored 2D geometry and its cache identity

use std::hash::Hasher;
use glam::{Vec2, Vec3};
use rustc_hash::FxHasher;
use crate::device::{
    BufferFormat, DescriptorBinding, DescriptorPoolSize, DescriptorType, ShaderStageFlags,
    VertexAttribute, VertexBinding, VertexInputRate,
};
use crate::error::{Error, Result};
use crate::pipeline::{ShaderApi, VertexFormat};

/// Size in bytes of one position (vec2)
pub const POSITION_STRIDE: u32 = std::mem::size_of::<Vec2>() as u32;
/// Size in bytes of one color (vec3)
pub const COLOR_STRIDE: u32 = std::mem::size_of::<Vec3>() as u32;

/// Borrowed view of a mesh: one position and one color per vertex, optional u32 indices
#[derive(Debug, Clone, Copy)]
pub struct StaticMesh<'a> {
    positions: &'a [Vec2],
    colors: &'a [Vec3],
    indices: &'a [u32],
}

impl<'a> StaticMesh<'a> {
    /// Fails when the streams differ in length or the mesh has no vertices
    pub fn new(positions: &'a [Vec2], colors: &'a [Vec3], indices: &'a [u32]) -> Result<Self> {
        if positions.is_empty() {
            return Err(Error::InvalidResource("Mesh has no vertices".to_string()));
        }
        if positions.len() != colors.len() {
            return Err(Error::InvalidResource(format!(
                "Mesh has {} positions but {} colors",
                positions.len(),
                colors.len()
            )));
        }
        if u32::try_from(positions.len()).is_err() || u32::try_from(indices.len()).is_err() {
            return Err(Error::InvalidResource("Mesh exceeds u32 element counts".to_string()));
        }
        Ok(Self { positions, colors, indices })
    }

    pub fn positions(&self) -> &'a [Vec2] {
        self.positions
    }

    pub fn colors(&self) -> &'a [Vec3] {
        self.colors
    }

    pub fn indices(&self) -> &'a [u32] {
        self.indices
    }

    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn position_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.positions)
    }

    pub fn color_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.colors)
    }

    pub fn index_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.indices)
    }

    /// Byte offset of the color stream inside the packed vertex buffer
    pub fn color_offset(&self) -> u64 {
        self.vertex_count() as u64 * POSITION_STRIDE as u64
    }

    /// Size of the packed vertex buffer (positions then colors)
    pub fn vertex_buffer_size(&self) -> u64 {
        self.vertex_count() as u64 * (POSITION_STRIDE + COLOR_STRIDE) as u64
    }

    /// Size of the index buffer, 0 when the mesh is not indexed
    pub fn index_buffer_size(&self) -> u64 {
        self.index_count() as u64 * std::mem::size_of::<u32>() as u64
    }

    pub fn identity(&self) -> MeshIdentity {
        MeshIdentity::of(self)
    }
}

/// Cache key of a mesh
///
/// Two meshes are the same entry iff their counts and the bytes of their
/// position, color and index streams are equal. Where the data lives is
/// irrelevant: equal content at different addresses shares an entry, and
/// different content reusing a freed address never does.
///
/// The content hash is computed once; lookups compare a borrowed mesh with
/// `hash_of` and `matches`, so only a cache miss copies the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeshIdentity {
    hash: u64,
    vertex_count: u32,
    index_count: u32,
    content: Box<[u8]>,
}

impl MeshIdentity {
    pub fn of(mesh: &StaticMesh<'_>) -> Self {
        let mut content = Vec::with_capacity(
            mesh.position_bytes().len() + mesh.color_bytes().len() + mesh.index_bytes().len(),
        );
        content.extend_from_slice(mesh.position_bytes());
        content.extend_from_slice(mesh.color_bytes());
        content.extend_from_slice(mesh.index_bytes());

        Self {
            hash: Self::hash_of(mesh),
            vertex_count: mesh.vertex_count(),
            index_count: mesh.index_count(),
            content: content.into_boxed_slice(),
        }
    }

    /// Content hash of `mesh`, equal to `MeshIdentity::of(mesh).content_hash()`
    pub fn hash_of(mesh: &StaticMesh<'_>) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write_u32(mesh.vertex_count());
        hasher.write_u32(mesh.index_count());
        hasher.write(mesh.position_bytes());
        hasher.write(mesh.color_bytes());
        hasher.write(mesh.index_bytes());
        hasher.finish()
    }

    /// Whether `mesh` has exactly this identity's content
    pub fn matches(&self, mesh: &StaticMesh<'_>) -> bool {
        if self.vertex_count != mesh.vertex_count() || self.index_count != mesh.index_count() {
            return false;
        }
        let positions = mesh.position_bytes();
        let colors = mesh.color_bytes();
        let (stored_positions, rest) = self.content.split_at(positions.len());
        let (stored_colors, stored_indices) = rest.split_at(colors.len());
        stored_positions == positions && stored_colors == colors && stored_indices == mesh.index_bytes()
    }

    pub fn content_hash(&self) -> u64 {
        self.hash
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

impl ShaderApi for StaticMesh<'_> {
    const TAG: &'static str = "static_mesh";

    fn vertex_format() -> VertexFormat {
        VertexFormat {
            bindings: vec![
                VertexBinding { binding: 0, stride: POSITION_STRIDE, input_rate: VertexInputRate::Vertex },
                VertexBinding { binding: 1, stride: COLOR_STRIDE, input_rate: VertexInputRate::Vertex },
            ],
            attributes: vec![
                VertexAttribute { location: 0, binding: 0, format: BufferFormat::R32G32_SFLOAT, offset: 0 },
                VertexAttribute { location: 1, binding: 1, format: BufferFormat::R32G32B32_SFLOAT, offset: 0 },
            ],
            descriptor_bindings: vec![DescriptorBinding {
                binding: 0,
                descriptor_type: DescriptorType::UniformBuffer,
                count: 1,
                stages: ShaderStageFlags::FRAGMENT,
            }],
            pool_sizes: vec![DescriptorPoolSize {
                descriptor_type: DescriptorType::UniformBuffer,
                count: 1,
            }],
        }
    }
}

#[cfg(test)]
#[path = "static_mesh_tests.rs"]
mod tests;
