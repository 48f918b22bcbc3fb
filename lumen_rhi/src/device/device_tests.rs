/// Tests for the device-level helpers and value types
///
/// SPIR-V decoding, buffer range checks and state defaults are backend
/// independent; the mock device covers the trait contracts.

use super::*;
use super::mock_device::{MockDevice, MockStep, temp_spirv};
use crate::error::Error;
use std::path::Path;

// ============================================================================
// SPIR-V loading
// ============================================================================

fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[test]
fn test_spirv_words_decodes_little_endian() {
    let bytes = words_to_bytes(&[SPIRV_MAGIC, 0x0001_0000, 42]);
    let words = spirv_words("inline", &bytes).unwrap();
    assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000, 42]);
}

#[test]
fn test_spirv_words_rejects_empty() {
    let err = spirv_words("empty.spv", &[]).unwrap_err();
    assert!(matches!(err, Error::ShaderLoad { ref path, .. } if path == "empty.spv"));
}

#[test]
fn test_spirv_words_rejects_unaligned_size() {
    let mut bytes = words_to_bytes(&[SPIRV_MAGIC]);
    bytes.push(0);
    assert!(matches!(spirv_words("odd.spv", &bytes), Err(Error::ShaderLoad { .. })));
}

#[test]
fn test_spirv_words_rejects_bad_magic() {
    let bytes = words_to_bytes(&[0xDEAD_BEEF, 0]);
    let err = spirv_words("bad.spv", &bytes).unwrap_err();
    assert!(err.to_string().contains("magic"));
}

#[test]
fn test_load_spirv_missing_file() {
    let err = load_spirv(Path::new("/nonexistent/lumen/shader.spv")).unwrap_err();
    match err {
        Error::ShaderLoad { path, .. } => assert!(path.ends_with("shader.spv")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_load_spirv_from_file() {
    let path = temp_spirv("load");
    let words = load_spirv(&path).unwrap();
    assert_eq!(words[0], SPIRV_MAGIC);
    assert_eq!(words.len(), 5);
    let _ = std::fs::remove_file(path);
}

#[test]
fn test_resolve_shader_path() {
    let path = resolve_shader_path(Path::new("data"), "triangle_vert.spv");
    assert_eq!(path, Path::new("data").join("shaders").join("Vulkan").join("triangle_vert.spv"));
}

// ============================================================================
// Buffers
// ============================================================================

#[test]
fn test_check_write_range() {
    assert!(check_write_range(16, 0, 16).is_ok());
    assert!(check_write_range(16, 8, 8).is_ok());
    assert!(check_write_range(16, 16, 0).is_ok());
    assert!(matches!(check_write_range(16, 12, 8), Err(Error::InvalidResource(_))));
    assert!(check_write_range(16, u64::MAX, 1).is_err());
}

#[test]
fn test_buffer_format_sizes() {
    assert_eq!(BufferFormat::R32_SFLOAT.size_bytes(), 4);
    assert_eq!(BufferFormat::R32G32_SFLOAT.size_bytes(), 8);
    assert_eq!(BufferFormat::R32G32B32_SFLOAT.size_bytes(), 12);
    assert_eq!(BufferFormat::R32G32B32A32_UINT.size_bytes(), 16);
    assert_eq!(BufferFormat::R8G8B8A8_UNORM.size_bytes(), 4);
    assert_eq!(IndexType::U16.size_bytes(), 2);
    assert_eq!(IndexType::U32.size_bytes(), 4);
}

#[test]
fn test_mock_buffer_update_and_overrun() {
    let (mock, device) = MockDevice::shared(2);
    let buffer = device.create_buffer(BufferDesc { size: 8, usage: BufferUsage::Vertex }).unwrap();

    buffer.update(4, &[1, 2, 3, 4]).unwrap();
    assert!(buffer.update(6, &[0; 4]).is_err());

    assert_eq!(mock.buffers()[0].data(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
    assert_eq!(mock.count("update"), 1);
}

#[test]
fn test_mock_failure_injection_carries_native_code() {
    let (mock, device) = MockDevice::shared(2);
    mock.fail_at(MockStep::CreateBuffer, -2);

    let err = device.create_buffer(BufferDesc { size: 4, usage: BufferUsage::Uniform }).err().unwrap();
    assert_eq!(err.native_code(), Some(-2));

    // Injected failures are one-shot
    assert!(device.create_buffer(BufferDesc { size: 4, usage: BufferUsage::Uniform }).is_ok());
}

// ============================================================================
// Shader stages
// ============================================================================

#[test]
fn test_shader_stage_flags() {
    assert_eq!(ShaderStage::Vertex.flag(), ShaderStageFlags::VERTEX);
    assert_eq!(ShaderStage::Fragment.flag(), ShaderStageFlags::FRAGMENT);
    assert!(ShaderStageFlags::ALL_GRAPHICS.contains(ShaderStage::Geometry.flag()));
    assert!(!ShaderStageFlags::ALL_GRAPHICS.contains(ShaderStage::Compute.flag()));
}

#[test]
fn test_shader_module_entry_point_and_lifetime() {
    let (mock, device) = MockDevice::shared(2);
    let module = device.create_shader_module(ShaderStage::Vertex, &[SPIRV_MAGIC]).unwrap();
    assert_eq!(module.entry_point(), "main");
    assert_eq!(mock.live_shader_modules(), 1);
    drop(module);
    assert_eq!(mock.live_shader_modules(), 0);
}

// ============================================================================
// State defaults
// ============================================================================

#[test]
fn test_graphics_state_defaults() {
    let state = GraphicsState::default();
    assert_eq!(state.topology, PrimitiveTopology::TriangleList);
    assert_eq!(state.rasterization.polygon_mode, PolygonMode::Fill);
    assert_eq!(state.rasterization.cull_mode, CullMode::Back);
    assert_eq!(state.rasterization.front_face, FrontFace::Clockwise);
    assert_eq!(state.rasterization.line_width, 1.0);
    assert_eq!(state.samples, SampleCount::S1);
    assert_eq!(state.color_blend.len(), 1);
    assert!(!state.color_blend[0].blend_enable);
    assert_eq!(state.color_blend[0].write_mask, ColorWriteMask::ALL);
    assert_eq!(state.dynamic_states, vec![DynamicState::Viewport, DynamicState::Scissor]);
    assert_eq!(state.viewport_count, 1);
}

#[test]
fn test_extent_viewport_scissor() {
    let extent = Extent2D::new(800, 600);
    assert!(!extent.is_empty());
    assert!(Extent2D::new(0, 600).is_empty());

    let viewport = Viewport::from_extent(extent);
    assert_eq!((viewport.width, viewport.height), (800.0, 600.0));
    assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));

    let scissor = Rect2D::from_extent(extent);
    assert_eq!(scissor, Rect2D { x: 0, y: 0, width: 800, height: 600 });
}
