/// Tests for convert_to_geometry

use super::*;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{BufferFormat, GraphicsDevice};
use crate::log::Diagnostics;
use crate::resource::{ResourceManager, ResourceManagerConfig};
use crate::scene::{Drawable, InstanceKind, Material, SceneInstance};
use glam::{Mat4, Vec3};
use std::sync::Arc;

fn create_manager() -> ResourceManager {
    let device: Arc<dyn GraphicsDevice> = Arc::new(MockGraphicsDevice::new());
    ResourceManager::new(device, Diagnostics::silent(), ResourceManagerConfig::default())
}

fn create_scene(manager: &ResourceManager) -> Scene {
    let n = [0.0, 0.0, 1.0];
    let vertices = [
        Vertex::new([0.0, 0.0, 0.0], n, [0.0, 0.0]),
        Vertex::new([1.0, 0.0, 0.0], n, [1.0, 0.0]),
        Vertex::new([0.0, 1.0, 0.0], n, [0.0, 1.0]),
        Vertex::new([1.0, 1.0, 0.0], n, [1.0, 1.0]),
    ];
    let triangle = Drawable::new(manager, "triangle", &vertices[..3], &[0, 1, 2], &Material::default()).unwrap();
    let quad = Drawable::new(manager, "quad", &vertices, &[0, 1, 2, 2, 1, 3], &Material::default()).unwrap();
    Scene::new(
        vec![triangle, quad],
        vec![
            SceneInstance::new(0, Mat4::from_translation(Vec3::X), InstanceKind::Static),
            SceneInstance::new(1, Mat4::from_translation(Vec3::Y), InstanceKind::Static),
        ],
    )
    .unwrap()
}

#[test]
fn test_convert_mesh_without_transform() {
    let manager = create_manager();
    let scene = create_scene(&manager);
    let geometry = convert_to_geometry(&scene, 1, None).unwrap();
    let quad = scene.drawable(1).unwrap();

    assert_eq!(geometry.flags, GeometryFlags::OPAQUE);
    assert_eq!(geometry.triangles.vertex_buffer, quad.vertex_buffer().handle());
    assert_eq!(geometry.triangles.vertex_count, 4);
    assert_eq!(geometry.triangles.vertex_stride, 32);
    assert_eq!(geometry.triangles.vertex_format, BufferFormat::R32G32B32_SFLOAT);
    assert_eq!(geometry.triangles.index_buffer, quad.index_buffer().handle());
    assert_eq!(geometry.triangles.index_count, 6);
    assert_eq!(geometry.triangles.index_type, IndexType::U32);
    assert_eq!(geometry.triangles.transform_buffer, None);
}

#[test]
fn test_convert_with_instance_transform() {
    let manager = create_manager();
    let mut scene = create_scene(&manager);
    scene.upload_instance_data(&manager).unwrap();

    let geometry = convert_to_geometry(&scene, 1, Some(1)).unwrap();
    let instance_data = scene.instance_data_buffer().unwrap().handle();
    assert_eq!(geometry.triangles.transform_buffer, Some(instance_data));
    assert_eq!(geometry.triangles.transform_offset, 64);
}

#[test]
fn test_convert_with_instance_requires_upload() {
    let manager = create_manager();
    let scene = create_scene(&manager);
    assert!(matches!(convert_to_geometry(&scene, 0, Some(0)), Err(Error::InvalidState(_))));
}

#[test]
fn test_convert_rejects_mismatched_instance() {
    let manager = create_manager();
    let mut scene = create_scene(&manager);
    scene.upload_instance_data(&manager).unwrap();
    assert!(matches!(convert_to_geometry(&scene, 0, Some(1)), Err(Error::InvalidResource(_))));
}

#[test]
fn test_convert_rejects_out_of_range() {
    let manager = create_manager();
    let scene = create_scene(&manager);
    assert!(matches!(convert_to_geometry(&scene, 2, None), Err(Error::InvalidResource(_))));
    assert!(matches!(convert_to_geometry(&scene, 0, Some(9)), Err(Error::InvalidResource(_))));
}
