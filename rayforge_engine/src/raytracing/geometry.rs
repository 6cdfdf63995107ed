/// Conversion of drawables into bottom-level build input

use crate::error::{Error, Result};
use crate::graphics_device::{Geometry, GeometryFlags, GeometryTriangles, IndexType};
use crate::scene::{Scene, Vertex};

/// Describe a drawable's triangles for a bottom-level build
///
/// Positions are read as 3 x f32 at the start of each `Vertex`, indices as
/// u32. With `instance`, the geometry also carries that instance's transform,
/// read from the scene's instance-data buffer at build time.
///
/// # Errors
///
/// `InvalidResource` if `mesh` or `instance` is out of range or the instance
/// places another mesh, `InvalidState` if the transform is requested before
/// the instance data was uploaded.
pub fn convert_to_geometry(scene: &Scene, mesh: usize, instance: Option<usize>) -> Result<Geometry> {
    let drawable = scene.drawable(mesh).ok_or_else(|| {
        Error::InvalidResource(format!("mesh {} out of range ({} drawables)", mesh, scene.drawables().len()))
    })?;

    let (transform_buffer, transform_offset) = match instance {
        None => (None, 0),
        Some(index) => {
            let placed = scene.instance(index).ok_or_else(|| {
                Error::InvalidResource(format!(
                    "instance {} out of range ({} instances)",
                    index,
                    scene.instances().len()
                ))
            })?;
            if placed.mesh != mesh {
                return Err(Error::InvalidResource(format!(
                    "instance {} places mesh {}, not mesh {}",
                    index, placed.mesh, mesh
                )));
            }
            let buffer = scene.instance_data_buffer().ok_or_else(|| {
                Error::InvalidState("instance data must be uploaded before static geometry is converted".to_string())
            })?;
            (Some(buffer.handle()), Scene::transform_offset(index))
        }
    };

    Ok(Geometry {
        triangles: GeometryTriangles {
            vertex_buffer: drawable.vertex_buffer().handle(),
            vertex_offset: 0,
            vertex_count: drawable.vertex_count(),
            vertex_stride: Vertex::STRIDE,
            vertex_format: Vertex::POSITION_FORMAT,
            index_buffer: drawable.index_buffer().handle(),
            index_offset: 0,
            index_count: drawable.index_count(),
            index_type: IndexType::U32,
            transform_buffer,
            transform_offset,
        },
        flags: GeometryFlags::OPAQUE,
    })
}

#[cfg(test)]
#[path = "geometry_tests.rs"]
mod tests;
