//! Tests for the Vulkan backend against a real device
//!
//! All tests require a GPU and a window system and are marked with #[ignore].
//!
//! Run with: cargo test --test vulkan_context_tests -- --ignored

use lumen_rhi::lumen::{Config, Error, SurfaceConfig};
use lumen_rhi::lumen::command::CommandBufferState;
use lumen_rhi::lumen::device::{
    BufferDesc, BufferUsage, CommandBufferKind, DescriptorBinding, DescriptorPoolSize,
    DescriptorType, Extent2D, Rect2D, ShaderStageFlags, Viewport,
};
use lumen_rhi_vulkan::{QueueType, VulkanContext};
use winit::event_loop::EventLoop;
use winit::window::Window;

/// Helper to create a hidden test window
#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = EventLoop::new().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("Lumen Vulkan Test")
        .with_inner_size(winit::dpi::LogicalSize::new(800, 600))
        .with_visible(false);
    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

fn create_context(window: &Window) -> VulkanContext {
    let surface_config = SurfaceConfig::from_window(window).unwrap();
    VulkanContext::new(&surface_config, Config::default()).unwrap()
}

// ============================================================================
// CONTEXT TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_context_creation() {
    let (window, _event_loop) = create_test_window();
    let context = create_context(&window);

    assert!(!context.gpu_name().is_empty());
    assert_eq!(context.device().frames_in_flight(), 2);
    assert_eq!(context.default_render_pass().subpass_count(), 1);
    context.wait_for_idle().unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_zero_frames_in_flight_rejected() {
    let (window, _event_loop) = create_test_window();
    let surface_config = SurfaceConfig::from_window(&window).unwrap();
    let config = Config { frames_in_flight: 0, ..Config::default() };

    let result = VulkanContext::new(&surface_config, config);
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_sync_objects_and_pools() {
    let (window, _event_loop) = create_test_window();
    let context = create_context(&window);

    let semaphore = context.create_semaphore().unwrap();
    let fence = context.create_fence(true).unwrap();
    let pool = context
        .create_command_pool(QueueType::Graphics, ash::vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
        .unwrap();
    let buffer = context.create_command_buffer(pool, ash::vk::CommandBufferLevel::PRIMARY).unwrap();
    assert_ne!(buffer, ash::vk::CommandBuffer::null());

    context.destroy_command_pool(pool);
    context.destroy_fence(fence);
    context.destroy_semaphore(semaphore);
}

// ============================================================================
// RESOURCE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_buffer_update_and_flush() {
    let (window, _event_loop) = create_test_window();
    let context = create_context(&window);
    let device = context.device();

    let buffer = device.create_buffer(BufferDesc { size: 256, usage: BufferUsage::Vertex }).unwrap();
    assert_eq!(buffer.size(), 256);

    buffer.update(0, &[1u8; 128]).unwrap();
    buffer.update(128, &[2u8; 128]).unwrap();
    buffer.flush().unwrap();

    assert!(buffer.update(200, &[0u8; 100]).is_err());
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_zero_sized_buffer_rejected() {
    let (window, _event_loop) = create_test_window();
    let context = create_context(&window);

    let result = context.device().create_buffer(BufferDesc { size: 0, usage: BufferUsage::Uniform });
    assert!(result.is_err());
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_descriptor_sets_per_frame() {
    let (window, _event_loop) = create_test_window();
    let context = create_context(&window);
    let device = context.device();

    let layout = device
        .create_descriptor_set_layout(&[DescriptorBinding {
            binding: 0,
            descriptor_type: DescriptorType::UniformBuffer,
            count: 1,
            stages: ShaderStageFlags::VERTEX,
        }])
        .unwrap();
    let sets = device
        .allocate_descriptor_sets(
            &layout,
            &[DescriptorPoolSize { descriptor_type: DescriptorType::UniformBuffer, count: 1 }],
            device.frames_in_flight(),
        )
        .unwrap();
    assert_eq!(sets.len(), device.frames_in_flight() as usize);

    let uniform = device.create_buffer(BufferDesc { size: 64, usage: BufferUsage::Uniform }).unwrap();
    for set in &sets {
        set.write_uniform_buffer(0, &uniform, 0, 64).unwrap();
    }
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_offscreen_framebuffer_resize() {
    let (window, _event_loop) = create_test_window();
    let context = create_context(&window);

    let mut framebuffer = context.create_framebuffer(Extent2D::new(256, 128)).unwrap();
    assert_eq!(framebuffer.extent(), Extent2D::new(256, 128));

    framebuffer.set_extent(Extent2D::new(512, 512));
    framebuffer.invalidate().unwrap();
    assert_eq!(framebuffer.extent(), Extent2D::new(512, 512));

    framebuffer.set_extent(Extent2D::new(0, 512));
    assert!(framebuffer.invalidate().is_err());
}

// ============================================================================
// SWAPCHAIN TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_swapchain_frame_loop() {
    let (window, _event_loop) = create_test_window();
    let context = create_context(&window);
    let mut swapchain = context.create_swapchain().unwrap();
    assert!(swapchain.surface().image_count() >= 2);

    let mut presented = 0;
    for _ in 0..6 {
        let recorded = match swapchain.begin_frame().unwrap() {
            Some(frame) => {
                assert_eq!(frame.command_buffer.state(), CommandBufferState::Writing);
                frame.command_buffer.set_viewport(Viewport::from_extent(frame.extent)).unwrap();
                frame.command_buffer.set_scissor(Rect2D::from_extent(frame.extent)).unwrap();
                true
            }
            None => false,
        };
        if recorded {
            swapchain.end_frame().unwrap();
            presented += 1;
        }
    }
    assert!(presented > 0);
    context.wait_for_idle().unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_swapchain_rebuild_bumps_generation() {
    let (window, _event_loop) = create_test_window();
    let context = create_context(&window);
    let mut swapchain = context.create_swapchain().unwrap();

    swapchain.invalidate();
    if swapchain.begin_frame().unwrap().is_some() {
        swapchain.end_frame().unwrap();
    }
    assert_eq!(swapchain.generation(), 1);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_thread_local_buffer_kind() {
    let (window, _event_loop) = create_test_window();
    let context = create_context(&window);
    let swapchain = context.create_swapchain().unwrap();

    let worker = swapchain.create_command_buffer().unwrap();
    assert_eq!(worker.kind(), CommandBufferKind::ThreadLocal);
    assert_eq!(worker.state(), CommandBufferState::Idle);
}
