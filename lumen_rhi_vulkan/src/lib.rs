/*!
# Lumen RHI - Vulkan Backend

Vulkan implementation of the `lumen_rhi` device traits, built on `ash` for
the API bindings and `gpu-allocator` for memory management.

```no_run
use lumen_rhi::lumen::{Config, SurfaceConfig};
use lumen_rhi_vulkan::VulkanContext;
# fn run(window: &winit::window::Window) -> lumen_rhi::lumen::Result<()> {
let context = VulkanContext::new(&SurfaceConfig::from_window(window)?, Config::default())?;
let mut swapchain = context.create_swapchain()?;
let recorded = match swapchain.begin_frame()? {
    // record into frame.command_buffer
    Some(_frame) => true,
    None => false,
};
if recorded {
    swapchain.end_frame()?;
}
# Ok(())
# }
```
*/

mod vulkan_format;
mod vulkan_context;
mod vulkan_device;
mod vulkan_buffer;
mod vulkan_shader;
mod vulkan_pipeline;
mod vulkan_descriptor_set;
mod vulkan_render_pass;
mod vulkan_frame_buffer;
mod vulkan_command_list;
mod vulkan_swapchain;
#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan_context::{QueueType, VulkanContext};
pub use vulkan_device::VulkanDevice;
pub use vulkan_frame_buffer::VulkanFramebuffer;

// Re-export debug utilities
#[cfg(feature = "vulkan-validation")]
pub use debug::{get_validation_stats, print_validation_stats_report};
