//! Integration tests for the backend-independent public API
//!
//! Covers vertex format lookup, SPIR-V loading, mesh identity and the
//! fixed-function state builder. No GPU required.
//!
//! Run with: cargo test --test api_integration_tests

use lumen_rhi::glam::{Vec2, Vec3};
use lumen_rhi::lumen::{Config, Error};
use lumen_rhi::lumen::device::{
    CullMode, DescriptorType, GraphicsState, ShaderStage, ShaderStageFlags, SPIRV_MAGIC,
    load_spirv, resolve_shader_path,
};
use lumen_rhi::lumen::mesh::StaticMesh;
use lumen_rhi::lumen::pipeline::{GraphicsStateBuilder, ShaderApi, VertexFormatRegistry};

// ============================================================================
// VERTEX FORMATS
// ============================================================================

#[test]
fn test_integration_static_mesh_format_lookup() {
    let registry = VertexFormatRegistry::with_builtin();
    let format = registry.get(StaticMesh::TAG).expect("static mesh registered");

    assert!(format.validate().is_ok());
    assert_eq!(format.bindings.iter().map(|b| b.stride).collect::<Vec<_>>(), vec![8, 12]);
    assert_eq!(format.descriptor_bindings[0].descriptor_type, DescriptorType::UniformBuffer);
    assert!(format.descriptor_bindings[0].stages.contains(ShaderStage::Fragment.flag()));
    assert!(!format.descriptor_bindings[0].stages.contains(ShaderStageFlags::VERTEX));
}

// ============================================================================
// SHADERS
// ============================================================================

#[test]
fn test_integration_load_spirv_round_trip_through_file() {
    let dir = std::env::temp_dir().join(format!("lumen_rhi_api_{}", std::process::id()));
    let path = resolve_shader_path(&dir, "triangle_vert.spv");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let bytes: Vec<u8> = [SPIRV_MAGIC, 0x0001_0300, 0, 1, 0].iter().flat_map(|w| w.to_le_bytes()).collect();
    std::fs::write(&path, &bytes).unwrap();
    assert_eq!(load_spirv(&path).unwrap()[1], 0x0001_0300);

    std::fs::write(&path, &bytes[..7]).unwrap();
    assert!(matches!(load_spirv(&path), Err(Error::ShaderLoad { .. })));

    let _ = std::fs::remove_dir_all(dir);
}

// ============================================================================
// MESHES
// ============================================================================

#[test]
fn test_integration_mesh_identity_is_content_based() {
    let positions = vec![Vec2::new(0.0, -0.5), Vec2::new(0.5, 0.5), Vec2::new(-0.5, 0.5)];
    let colors = vec![Vec3::X, Vec3::Y, Vec3::Z];
    let copy = (positions.clone(), colors.clone());

    let a = StaticMesh::new(&positions, &colors, &[]).unwrap();
    let b = StaticMesh::new(&copy.0, &copy.1, &[]).unwrap();
    let c = StaticMesh::new(&positions, &colors, &[0, 1, 2]).unwrap();

    assert_eq!(a.identity(), b.identity());
    assert_ne!(a.identity(), c.identity());
    assert_eq!(a.vertex_buffer_size(), 60);
}

// ============================================================================
// STATE AND CONFIG
// ============================================================================

#[test]
fn test_integration_state_builder() {
    let mut builder = GraphicsStateBuilder::new();
    builder.cull_mode(CullMode::None);
    let state = builder.build(2);

    assert_eq!(state.rasterization.cull_mode, CullMode::None);
    assert_eq!(state.color_blend.len(), 2);
    assert_eq!(builder.reset().build(1), GraphicsState::default());
}

#[test]
fn test_integration_default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.frames_in_flight, 2);

    let broken = Config { frames_in_flight: 0, ..Config::default() };
    assert!(broken.validate().is_err());
}
