//! Static meshes, polygon groups and the materials they are drawn with.
//!
//! A mesh is split into polygon groups, each a contiguous batch of vertices
//! and indices sharing one material binding. Scene nodes reference groups by
//! index and hand the material in at draw time.

use std::sync::Arc;

use cgmath::Point3;

use crate::{
    data_structures::{bounding_box::BoundingBox, texture::Texture},
    render::{Color, RenderBackend},
};

/// The vertex layout of polygon groups as it lands in GPU buffers.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            tex_coords,
            normal: [0.0, 0.0, 1.0],
        }
    }
}

/// A batch of geometry drawn with a single material.
#[derive(Clone, Debug)]
pub struct PolygonGroup {
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    bounding_box: BoundingBox,
}

impl PolygonGroup {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        let bounding_box = BoundingBox::from_points(vertices.iter().map(|v| Point3::from(v.position)));
        Self {
            vertices,
            indices,
            bounding_box,
        }
    }

    /// Box of the group's vertices in mesh space.
    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

/// Surface description handed to a polygon group draw.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub diffuse: Option<Arc<Texture>>,
    pub color: Color,
}

impl Material {
    pub fn new(name: &str, diffuse: Option<Arc<Texture>>) -> Self {
        Self {
            name: name.to_string(),
            diffuse,
            color: Color::WHITE,
        }
    }
}

/// Geometry that scene nodes can submit by polygon group index.
pub trait StaticMesh: Send + Sync {
    fn polygon_group_count(&self) -> usize;

    fn polygon_group(&self, index: usize) -> Option<&PolygonGroup>;

    /// Binds `material` and submits group `index`. Unknown indices draw nothing.
    fn draw_polygon_group(&self, index: usize, material: &Material, backend: &dyn RenderBackend);
}

/// A mesh whose geometry lives in host memory and is submitted on every draw.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub name: String,
    groups: Vec<PolygonGroup>,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            groups: Vec::new(),
        }
    }

    /// Appends a group and returns its index.
    pub fn add_polygon_group(&mut self, group: PolygonGroup) -> usize {
        self.groups.push(group);
        self.groups.len() - 1
    }
}

impl StaticMesh for Mesh {
    fn polygon_group_count(&self) -> usize {
        self.groups.len()
    }

    fn polygon_group(&self, index: usize) -> Option<&PolygonGroup> {
        self.groups.get(index)
    }

    fn draw_polygon_group(&self, index: usize, material: &Material, backend: &dyn RenderBackend) {
        let Some(group) = self.groups.get(index) else {
            log::warn!("Mesh {} has no polygon group {}", self.name, index);
            return;
        };
        backend.bind_texture(material.diffuse.as_ref().map(|texture| texture.handle()));
        backend.set_color(material.color);
        backend.draw_indexed(group.vertices(), group.indices());
    }
}
