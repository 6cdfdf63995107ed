//! RayForge headless demo
//!
//! Creates a Vulkan device, uploads two meshes placed by four instances,
//! builds the bottom-level and top-level acceleration structures plus the
//! storage image, and logs what was built.
//!
//! Usage: rayforge_demo [WIDTH HEIGHT]

use glam::{Mat4, Vec3};
use rayforge_engine::rayforge::device::GraphicsDevice;
use rayforge_engine::rayforge::log::{Diagnostics, LogSeverity};
use rayforge_engine::rayforge::raytracing::{AccelerationStructureBuilder, AccelerationStructureConfig};
use rayforge_engine::rayforge::resource::{ResourceManager, ResourceManagerConfig};
use rayforge_engine::rayforge::scene::{Drawable, InstanceKind, Material, Scene, SceneInstance, Vertex};
use rayforge_engine::rayforge::Result;
use rayforge_engine::{rf_error, rf_info};
use rayforge_engine_device_vulkan::{VulkanDeviceConfig, VulkanGraphicsDevice};
use std::sync::Arc;

const SOURCE: &str = "rayforge::demo";

const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;

fn main() {
    let diagnostics = Diagnostics::console().with_min_severity(LogSeverity::Debug);
    let (width, height) = parse_extent(std::env::args().skip(1).collect());

    if let Err(e) = run(&diagnostics, width, height) {
        rf_error!(diagnostics, SOURCE, "Demo failed: {}", e);
        std::process::exit(1);
    }
}

/// Storage image extent from the command line, defaults when absent or invalid
fn parse_extent(args: Vec<String>) -> (u32, u32) {
    match args.as_slice() {
        [width, height] => match (width.parse(), height.parse()) {
            (Ok(width), Ok(height)) if width > 0 && height > 0 => (width, height),
            _ => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
        },
        _ => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
    }
}

fn run(diagnostics: &Diagnostics, width: u32, height: u32) -> Result<()> {
    let config = VulkanDeviceConfig {
        application_name: "RayForge Demo".to_string(),
        ..VulkanDeviceConfig::default()
    };
    let vulkan = VulkanGraphicsDevice::new(config, diagnostics.clone())?;
    rf_info!(diagnostics, SOURCE, "Device: {}", vulkan.device_name());
    let device: Arc<dyn GraphicsDevice> = Arc::new(vulkan);

    let resource_manager = ResourceManager::new(
        device.clone(),
        diagnostics.clone(),
        ResourceManagerConfig::default(),
    );

    let scene = create_scene(&resource_manager)?;

    let mut builder = AccelerationStructureBuilder::new(
        device,
        diagnostics.clone(),
        AccelerationStructureConfig::default(),
    );
    builder.build(&resource_manager, &scene, width, height)?;

    let stats = builder.stats();
    rf_info!(diagnostics, SOURCE,
        "Built {} BLAS ({} triangles, {} bytes), TLAS with {} instances ({} bytes)",
        stats.blas_count, stats.triangle_count, stats.blas_memory_size,
        stats.tlas_instance_count, stats.tlas_memory_size);
    for blas in builder.blas() {
        rf_info!(diagnostics, SOURCE, "  {:?} -> reference {:#x}", blas.source(), blas.reference());
    }
    rf_info!(diagnostics, SOURCE, "Storage image {}x{} ready", width, height);

    Ok(())
}

/// A triangle and a quad, each placed twice
fn create_scene(resource_manager: &ResourceManager) -> Result<Scene> {
    let normal = [0.0, 0.0, 1.0];
    let triangle_vertices = [
        Vertex::new([0.0, 1.0, 0.0], normal, [0.5, 0.0]),
        Vertex::new([-1.0, -1.0, 0.0], normal, [0.0, 1.0]),
        Vertex::new([1.0, -1.0, 0.0], normal, [1.0, 1.0]),
    ];
    let quad_vertices = [
        Vertex::new([-1.0, -1.0, 0.0], normal, [0.0, 1.0]),
        Vertex::new([1.0, -1.0, 0.0], normal, [1.0, 1.0]),
        Vertex::new([-1.0, 1.0, 0.0], normal, [0.0, 0.0]),
        Vertex::new([1.0, 1.0, 0.0], normal, [1.0, 0.0]),
    ];

    let triangle = Drawable::new(
        resource_manager,
        "triangle",
        &triangle_vertices,
        &[0, 1, 2],
        &Material::new([1.0, 0.3, 0.2, 1.0]),
    )?;
    let quad = Drawable::new(
        resource_manager,
        "quad",
        &quad_vertices,
        &[0, 1, 2, 2, 1, 3],
        &Material::new([0.2, 0.4, 1.0, 1.0]).with_metallic_roughness(0.5, 0.3),
    )?;

    let placed = |mesh: usize, x: f32, y: f32| {
        SceneInstance::new(mesh, Mat4::from_translation(Vec3::new(x, y, 0.0)), InstanceKind::Dynamic)
    };
    Scene::new(
        vec![triangle, quad],
        vec![
            placed(0, 2.0, 2.0),
            placed(0, -2.0, -2.0),
            placed(1, 2.0, -2.0),
            placed(1, -2.0, 2.0),
        ],
    )
}
