/*!
# Lumen RHI

Backend-agnostic rendering hardware interface.

Every GPU object is reached through a trait object created by a `Device`
(see `lumen::device`); the Vulkan implementation lives in `lumen_rhi_vulkan`.

## Architecture

- **Device**: factory for buffers, shader modules, layouts, pipelines and encoders
- **PipelineBuilder**: compiles a pipeline from SPIR-V stages and a per-vertex-type `VertexFormat`
- **MeshPipeline**: draws `StaticMesh` objects through a content-addressed GPU buffer cache
- **CommandBuffer**: checked recording state machine, Executable or ThreadLocal
- **Swapchain**: acquire / record / submit / present loop with automatic rebuilds
*/

// Internal modules
mod error;
mod rhi;
pub mod log;
pub mod config;
pub mod device;
pub mod command;
pub mod pipeline;
pub mod mesh;
pub mod swapchain;

// Main lumen namespace module
pub mod lumen {
    // Error types
    pub use crate::error::{Error, Result};

    // Global services (logger)
    pub use crate::rhi::Rhi;

    // Configuration
    pub use crate::config::{
        Config, DebugMessageFilter, DebugOutput, DebugSeverity, SurfaceConfig, ValidationStats,
    };

    // Logging sub-module (types only; the rhi_* macros live at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Backend traits and value types
    pub mod device {
        pub use crate::device::*;
    }

    pub mod command {
        pub use crate::command::*;
    }

    pub mod pipeline {
        pub use crate::pipeline::*;
    }

    pub mod mesh {
        pub use crate::mesh::*;
    }

    pub mod swapchain {
        pub use crate::swapchain::*;
    }
}

// Re-export math library at crate root
pub use glam;
