/// Tests for StaticMesh validation, byte views and identity

use super::*;

fn quad() -> (Vec<Vec2>, Vec<Vec3>, Vec<u32>) {
    (
        vec![Vec2::new(-0.5, -0.5), Vec2::new(0.5, -0.5), Vec2::new(0.5, 0.5), Vec2::new(-0.5, 0.5)],
        vec![Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE],
        vec![0, 1, 2, 2, 3, 0],
    )
}

#[test]
fn test_new_rejects_invalid_meshes() {
    let (positions, colors, _) = quad();
    assert!(matches!(StaticMesh::new(&[], &[], &[]), Err(Error::InvalidResource(_))));
    assert!(StaticMesh::new(&positions, &colors[..3], &[]).is_err());
}

#[test]
fn test_sizes_and_offsets() {
    let (positions, colors, indices) = quad();
    let mesh = StaticMesh::new(&positions, &colors, &indices).unwrap();

    assert_eq!(mesh.vertex_count(), 4);
    assert_eq!(mesh.index_count(), 6);
    assert_eq!(mesh.color_offset(), 32);
    assert_eq!(mesh.vertex_buffer_size(), 80);
    assert_eq!(mesh.index_buffer_size(), 24);
    assert_eq!(mesh.position_bytes().len(), 32);
    assert_eq!(mesh.color_bytes().len(), 48);
    assert_eq!(mesh.index_bytes().len(), 24);
}

#[test]
fn test_byte_views_are_little_endian_floats() {
    let (positions, colors, _) = quad();
    let mesh = StaticMesh::new(&positions, &colors, &[]).unwrap();
    assert_eq!(&mesh.position_bytes()[..4], &(-0.5f32).to_le_bytes());
    assert_eq!(&mesh.color_bytes()[..4], &1.0f32.to_le_bytes());
    assert_eq!(mesh.index_buffer_size(), 0);
}

#[test]
fn test_identity_ignores_storage_location() {
    let (positions, colors, indices) = quad();
    let (positions_copy, colors_copy, indices_copy) = quad();

    let a = StaticMesh::new(&positions, &colors, &indices).unwrap();
    let b = StaticMesh::new(&positions_copy, &colors_copy, &indices_copy).unwrap();

    assert_ne!(positions.as_ptr(), positions_copy.as_ptr());
    assert_eq!(a.identity(), b.identity());
}

#[test]
fn test_identity_differs_on_any_stream() {
    let (positions, colors, indices) = quad();
    let base = StaticMesh::new(&positions, &colors, &indices).unwrap().identity();

    let mut moved = positions.clone();
    moved[0].x = 0.25;
    assert_ne!(StaticMesh::new(&moved, &colors, &indices).unwrap().identity(), base);

    let mut recolored = colors.clone();
    recolored[3] = Vec3::ZERO;
    assert_ne!(StaticMesh::new(&positions, &recolored, &indices).unwrap().identity(), base);

    assert_ne!(StaticMesh::new(&positions, &colors, &indices[..3]).unwrap().identity(), base);
    assert_ne!(StaticMesh::new(&positions, &colors, &[]).unwrap().identity(), base);
}

#[test]
fn test_identity_counts() {
    let (positions, colors, indices) = quad();
    let identity = MeshIdentity::of(&StaticMesh::new(&positions, &colors, &indices).unwrap());
    assert_eq!(identity.vertex_count(), 4);
    assert_eq!(identity.index_count(), 6);
}

#[test]
fn test_identity_matches_borrowed_mesh() {
    let (positions, colors, indices) = quad();
    let identity = StaticMesh::new(&positions, &colors, &indices).unwrap().identity();

    let (positions_copy, colors_copy, indices_copy) = quad();
    let copy = StaticMesh::new(&positions_copy, &colors_copy, &indices_copy).unwrap();
    assert!(identity.matches(&copy));
    assert_eq!(MeshIdentity::hash_of(&copy), identity.content_hash());

    let mut recolored = colors.clone();
    recolored[0] = Vec3::ZERO;
    let other = StaticMesh::new(&positions, &recolored, &indices).unwrap();
    assert!(!identity.matches(&other));
    assert!(!identity.matches(&StaticMesh::new(&positions, &colors, &indices[..3]).unwrap()));
    assert!(!identity.matches(&StaticMesh::new(&positions[..3], &colors[..3], &indices).unwrap()));
}

#[test]
fn test_shader_api_format() {
    let format = StaticMesh::vertex_format();
    assert_eq!(StaticMesh::TAG, "static_mesh");
    assert_eq!(format.bindings.len(), 2);
    assert_eq!(format.bindings[0].stride, POSITION_STRIDE);
    assert_eq!(format.bindings[1].stride, COLOR_STRIDE);
    assert_eq!(format.attributes[0].format, BufferFormat::R32G32_SFLOAT);
    assert_eq!(format.attributes[1].format, BufferFormat::R32G32B32_SFLOAT);
    assert_eq!(format.descriptor_bindings[0].descriptor_type, DescriptorType::UniformBuffer);
    assert_eq!(format.descriptor_bindings[0].stages, ShaderStageFlags::FRAGMENT);
    assert_eq!(format.pool_sizes, vec![DescriptorPoolSize { descriptor_type: DescriptorType::UniformBuffer, count: 1 }]);
}
