/// MeshCache - content-addressed GPU buffers, one pair per distinct mesh

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::device::{Buffer, BufferDesc, BufferUsage, Device};
use crate::error::Result;
use crate::mesh::{MeshIdentity, StaticMesh};
use crate::rhi_trace;

/// GPU copy of one mesh
///
/// The vertex buffer packs all positions followed by all colors.
#[derive(Clone)]
pub struct GpuMeshBuffers {
    pub vertex: Arc<dyn Buffer>,
    /// None when the mesh has no indices
    pub index: Option<Arc<dyn Buffer>>,
    pub vertex_count: u32,
    pub index_count: u32,
    /// Byte offset of the color stream in `vertex`
    pub color_offset: u64,
}

impl GpuMeshBuffers {
    /// Allocate, fill and flush the buffers for `mesh`
    pub fn upload(device: &dyn Device, mesh: &StaticMesh<'_>) -> Result<Self> {
        let vertex = device.create_buffer(BufferDesc {
            size: mesh.vertex_buffer_size(),
            usage: BufferUsage::Vertex,
        })?;
        vertex.update(0, mesh.position_bytes())?;
        vertex.update(mesh.color_offset(), mesh.color_bytes())?;
        vertex.flush()?;

        let index = if mesh.index_count() > 0 {
            let index = device.create_buffer(BufferDesc {
                size: mesh.index_buffer_size(),
                usage: BufferUsage::Index,
            })?;
            index.update(0, mesh.index_bytes())?;
            index.flush()?;
            Some(index)
        } else {
            None
        };

        Ok(Self {
            vertex,
            index,
            vertex_count: mesh.vertex_count(),
            index_count: mesh.index_count(),
            color_offset: mesh.color_offset(),
        })
    }
}

/// Mesh identity -> GPU buffers
///
/// Owned by one pipeline and mutated through `&mut self` only. At most one
/// upload happens per distinct identity for the lifetime of the cache.
///
/// There is no eviction: every distinct mesh ever drawn keeps its buffers
/// until the cache is cleared or dropped. Callers streaming unbounded
/// distinct geometry must call `clear` themselves.
#[derive(Default)]
pub struct MeshCache {
    /// Content hash -> entries sharing that hash
    entries: FxHashMap<u64, Vec<(MeshIdentity, GpuMeshBuffers)>>,
    len: usize,
    uploads: u64,
    hits: u64,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached buffers for `mesh`, uploading them on first sight
    ///
    /// Returns the buffers and whether they were already cached. A hit
    /// hashes and compares the borrowed streams without copying them.
    pub fn get_or_upload(&mut self, device: &dyn Device, mesh: &StaticMesh<'_>) -> Result<(&GpuMeshBuffers, bool)> {
        let bucket = self.entries.entry(MeshIdentity::hash_of(mesh)).or_default();
        let (index, hit) = match bucket.iter().position(|(identity, _)| identity.matches(mesh)) {
            Some(index) => {
                self.hits += 1;
                (index, true)
            }
            None => {
                let buffers = GpuMeshBuffers::upload(device, mesh)?;
                self.uploads += 1;
                self.len += 1;
                rhi_trace!("lumen::MeshCache",
                    "Uploaded mesh: {} vertices, {} indices ({} entries)",
                    mesh.vertex_count(), mesh.index_count(), self.len);
                bucket.push((MeshIdentity::of(mesh), buffers));
                (bucket.len() - 1, false)
            }
        };
        Ok((&bucket[index].1, hit))
    }

    /// Cached buffers for `mesh`, without uploading
    pub fn get(&self, mesh: &StaticMesh<'_>) -> Option<&GpuMeshBuffers> {
        self.entries
            .get(&MeshIdentity::hash_of(mesh))?
            .iter()
            .find(|(identity, _)| identity.matches(mesh))
            .map(|(_, buffers)| buffers)
    }

    pub fn contains(&self, mesh: &StaticMesh<'_>) -> bool {
        self.get(mesh).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total uploads since creation
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    /// Total lookups served from the cache since creation
    pub fn hit_count(&self) -> u64 {
        self.hits
    }

    /// Release every cached buffer
    pub fn clear(&mut self) {
        self.entries.clear();
        self.len = 0;
    }
}

#[cfg(test)]
#[path = "mesh_cache_tests.rs"]
mod tests;
