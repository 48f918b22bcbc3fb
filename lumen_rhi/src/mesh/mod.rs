/// Mesh module - mesh data, content-addressed GPU cache, mesh pipeline

pub mod static_mesh;
pub mod mesh_cache;
pub mod mesh_pipeline;

pub use static_mesh::{MeshIdentity, StaticMesh, COLOR_STRIDE, POSITION_STRIDE};
pub use mesh_cache::{GpuMeshBuffers, MeshCache};
pub use mesh_pipeline::{FrameStats, MeshPipeline, ProcessObject};
