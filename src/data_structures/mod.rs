//! Engine data structures: pixel formats, textures, meshes and scene nodes.
//!
//! - `pixel_format` is the format registry (bit sizes, names, fallbacks)
//! - `mipmap` holds mip chain math and box-filter downsampling
//! - `texture` contains the backend texture wrapper
//! - `bounding_box` is the axis aligned box shared by meshes and nodes
//! - `mesh` holds vertices, polygon groups and materials
//! - `instance` holds the local transformation of a node
//! - `scene_graph` enables hierarchical scene organization
//! - `mesh_instance` is the node that draws (mesh, group, material) triples

pub mod bounding_box;
pub mod instance;
pub mod mesh;
pub mod mesh_instance;
pub mod mipmap;
pub mod pixel_format;
pub mod scene_graph;
pub mod texture;
