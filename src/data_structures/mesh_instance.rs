//! Scene node drawing a list of (mesh, polygon group, material) entries.

use std::{any::Any, fmt, sync::Arc};

use bitflags::bitflags;
use cgmath::{Matrix4, Point3};

use crate::{
    data_structures::{
        bounding_box::BoundingBox,
        mesh::{Material, PolygonGroup, StaticMesh},
        scene_graph::{NodeBase, SceneId, SceneNode},
    },
    error::SceneError,
    render::{Color, MatrixSlot, RenderBackend},
};

/// Length of each local axis line in node units.
pub const AXIS_LENGTH: f32 = 50.0;

bitflags! {
    /// Overlays drawn on top of a node's geometry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DebugFlags: u32 {
        const AABBOX = 1;
        const LOCAL_AXIS = 1 << 1;
    }
}

/// One draw instruction of a [`MeshInstanceNode`].
#[derive(Clone)]
pub struct PolygonGroupEntry {
    pub mesh: Arc<dyn StaticMesh>,
    pub polygon_group: usize,
    pub material: Arc<Material>,
}

impl fmt::Debug for PolygonGroupEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolygonGroupEntry")
            .field("polygon_group", &self.polygon_group)
            .field("material", &self.material.name)
            .finish()
    }
}

/// Puts a saved matrix back when dropped, also on early returns.
struct MatrixRestore<'a> {
    backend: &'a dyn RenderBackend,
    slot: MatrixSlot,
    matrix: Matrix4<f32>,
}

impl Drop for MatrixRestore<'_> {
    fn drop(&mut self) {
        self.backend.set_matrix(self.slot, self.matrix);
    }
}

pub struct MeshInstanceNode {
    base: NodeBase,
    entries: Vec<PolygonGroupEntry>,
    bbox: BoundingBox,
    visible: bool,
    debug_flags: DebugFlags,
}

impl MeshInstanceNode {
    pub fn new(scene: SceneId) -> Self {
        Self {
            base: NodeBase::new(scene),
            entries: Vec::new(),
            bbox: BoundingBox::empty(),
            visible: true,
            debug_flags: DebugFlags::empty(),
        }
    }

    /// Appends a draw entry and grows the node's box by the group's box.
    ///
    /// An index the mesh doesn't have is rejected and leaves the node as it
    /// was.
    pub fn add_polygon_group(
        &mut self,
        mesh: Arc<dyn StaticMesh>,
        polygon_group: usize,
        material: Arc<Material>,
    ) -> Result<(), SceneError> {
        let group_box = mesh
            .polygon_group(polygon_group)
            .map(PolygonGroup::bounding_box)
            .ok_or_else(|| SceneError::PolygonGroupOutOfRange {
                index: polygon_group,
                count: mesh.polygon_group_count(),
            })?;
        self.bbox.add_box(&group_box);
        self.entries.push(PolygonGroupEntry {
            mesh,
            polygon_group,
            material,
        });
        Ok(())
    }

    pub fn entries(&self) -> &[PolygonGroupEntry] {
        &self.entries
    }

    pub fn polygon_group_count(&self) -> usize {
        self.entries.len()
    }

    /// Union of the boxes of all added groups, in node space.
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn debug_flags(&self) -> DebugFlags {
        self.debug_flags
    }

    pub fn set_debug_flags(&mut self, flags: DebugFlags) {
        self.debug_flags = flags;
    }

    /// Draws every entry under the node's world transform.
    ///
    /// The model-view matrix found on entry is composed with the world
    /// transform for the duration of the call and put back before returning.
    pub fn draw(&self, backend: &dyn RenderBackend) {
        if !self.visible {
            return;
        }

        let previous = backend.matrix(MatrixSlot::ModelView);
        let _restore = MatrixRestore {
            backend,
            slot: MatrixSlot::ModelView,
            matrix: previous,
        };
        backend.set_matrix(MatrixSlot::ModelView, previous * self.base.world_transform());

        for entry in &self.entries {
            entry
                .mesh
                .draw_polygon_group(entry.polygon_group, &entry.material, backend);
        }

        if !self.debug_flags.is_empty() {
            self.draw_debug(backend);
        }
    }

    fn draw_debug(&self, backend: &dyn RenderBackend) {
        backend.enable_depth_test(false);
        backend.enable_texturing(false);
        backend.flush_state();

        if self.debug_flags.contains(DebugFlags::AABBOX) {
            backend.set_color(Color::WHITE);
            backend.draw_box(&self.bbox);
        }
        if self.debug_flags.contains(DebugFlags::LOCAL_AXIS) {
            let origin = Point3::new(0.0, 0.0, 0.0);
            backend.set_color(Color::RED);
            backend.draw_line(origin, Point3::new(AXIS_LENGTH, 0.0, 0.0));
            backend.set_color(Color::GREEN);
            backend.draw_line(origin, Point3::new(0.0, AXIS_LENGTH, 0.0));
            backend.set_color(Color::BLUE);
            backend.draw_line(origin, Point3::new(0.0, 0.0, AXIS_LENGTH));
        }

        backend.enable_depth_test(true);
        backend.enable_texturing(true);
        backend.set_color(Color::WHITE);
    }

    /// Copies this node into `target`: the base clone first, then entries,
    /// box, visibility and debug flags. Meshes and materials are shared.
    pub fn clone_into(&self, target: &mut MeshInstanceNode) {
        self.base.clone_into(&mut target.base);
        target.entries = self.entries.clone();
        target.bbox = self.bbox;
        target.visible = self.visible;
        target.debug_flags = self.debug_flags;
    }

    /// Populates `target` if given, or a new node of the same scene.
    pub fn clone_with(&self, target: Option<MeshInstanceNode>) -> MeshInstanceNode {
        let mut node = target.unwrap_or_else(|| MeshInstanceNode::new(self.base.scene()));
        self.clone_into(&mut node);
        node
    }
}

impl Clone for MeshInstanceNode {
    fn clone(&self) -> Self {
        self.clone_with(None)
    }
}

impl fmt::Debug for MeshInstanceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshInstanceNode")
            .field("name", &self.base.name)
            .field("entries", &self.entries)
            .field("bbox", &self.bbox)
            .field("visible", &self.visible)
            .field("debug_flags", &self.debug_flags)
            .finish()
    }
}

impl SceneNode for MeshInstanceNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn draw(&self, backend: &dyn RenderBackend) {
        MeshInstanceNode::draw(self, backend);
    }

    fn clone_node(&self) -> Box<dyn SceneNode> {
        Box::new(self.clone_with(None))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
