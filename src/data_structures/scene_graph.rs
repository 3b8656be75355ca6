//! Scene graph and hierarchical scene organization.
//!
//! Every node embeds a [`NodeBase`] holding what all nodes share: the scene
//! it belongs to, its local and world transforms and its children. Concrete
//! node kinds implement [`SceneNode`] on top of it.

use std::{
    any::Any,
    sync::atomic::{AtomicU32, Ordering},
};

use cgmath::{Matrix4, SquareMatrix};
use log::warn;

use crate::{data_structures::instance::Instance, render::RenderBackend};

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

/// Identifies the scene a node was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(u32);

/// State shared by every node kind.
pub struct NodeBase {
    pub name: String,
    scene: SceneId,
    pub local: Instance,
    world: Matrix4<f32>,
    children: Vec<Box<dyn SceneNode>>,
}

impl NodeBase {
    pub fn new(scene: SceneId) -> Self {
        Self {
            name: String::new(),
            scene,
            local: Instance::default(),
            world: Matrix4::identity(),
            children: Vec::new(),
        }
    }

    pub fn scene(&self) -> SceneId {
        self.scene
    }

    /// Transform from node space to scene space, as of the last
    /// [`SceneNode::update_world_transforms`].
    pub fn world_transform(&self) -> Matrix4<f32> {
        self.world
    }

    pub fn children(&self) -> &[Box<dyn SceneNode>] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    /**
     * The clone hook of the base: copies name, scene, transforms and a deep
     * clone of every child into `target`. Node kinds call it before copying
     * their own fields.
     */
    pub fn clone_into(&self, target: &mut NodeBase) {
        target.name = self.name.clone();
        target.scene = self.scene;
        target.local = self.local;
        target.world = self.world;
        target.children = self.children.iter().map(|child| child.clone_node()).collect();
    }
}

pub trait SceneNode: Send + Sync {
    fn base(&self) -> &NodeBase;

    fn base_mut(&mut self) -> &mut NodeBase;

    /// Draws this node alone, children are drawn by [`SceneNode::draw_tree`].
    fn draw(&self, backend: &dyn RenderBackend);

    /// Deep copy of this node and its subtree.
    fn clone_node(&self) -> Box<dyn SceneNode>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        if child.base().scene() != self.base().scene() {
            warn!(
                "Node {:?} was created for another scene than its new parent {:?}",
                child.base().name,
                self.base().name
            );
        }
        self.base_mut().children.push(child);
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.base_mut().local = instance;
    }

    fn update_world_transforms(&mut self, parent: &Matrix4<f32>) {
        let base = self.base_mut();
        base.world = *parent * base.local.to_matrix();
        let world = base.world;
        for child in base.children.iter_mut() {
            child.update_world_transforms(&world);
        }
    }

    fn draw_tree(&self, backend: &dyn RenderBackend) {
        self.draw(backend);
        for child in self.base().children() {
            child.draw_tree(backend);
        }
    }
}

/// A node without geometry that groups and transforms its children.
pub struct ContainerNode {
    base: NodeBase,
}

impl ContainerNode {
    pub fn new(scene: SceneId) -> Self {
        Self {
            base: NodeBase::new(scene),
        }
    }
}

impl SceneNode for ContainerNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn draw(&self, _backend: &dyn RenderBackend) {}

    fn clone_node(&self) -> Box<dyn SceneNode> {
        let mut node = ContainerNode::new(self.base.scene());
        self.base.clone_into(&mut node.base);
        Box::new(node)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A scene: an id that nodes are created for and the root of their tree.
pub struct Scene {
    id: SceneId,
    root: ContainerNode,
}

impl Scene {
    pub fn new() -> Self {
        let id = SceneId(NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed));
        let mut root = ContainerNode::new(id);
        root.base.name = "root".to_string();
        Self { id, root }
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn root(&self) -> &ContainerNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut ContainerNode {
        &mut self.root
    }

    pub fn add_node(&mut self, node: Box<dyn SceneNode>) {
        self.root.add_child(node);
    }

    pub fn update_transforms(&mut self) {
        self.root.update_world_transforms(&Matrix4::identity());
    }

    pub fn draw(&self, backend: &dyn RenderBackend) {
        self.root.draw_tree(backend);
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Vector3, Vector4};

    use super::*;

    #[test]
    fn world_transforms_accumulate_down_the_tree() {
        let mut scene = Scene::new();
        let mut parent = ContainerNode::new(scene.id());
        parent.set_local_transform(Instance::from(Vector3::new(1.0, 0.0, 0.0)));
        let mut child = ContainerNode::new(scene.id());
        child.set_local_transform(Instance::from(Vector3::new(0.0, 2.0, 0.0)));
        parent.add_child(Box::new(child));
        scene.add_node(Box::new(parent));

        scene.update_transforms();

        let parent = &scene.root().base().children()[0];
        let child = &parent.base().children()[0];
        let origin = child.base().world_transform() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(origin, Vector4::new(1.0, 2.0, 0.0, 1.0));
    }

    #[test]
    fn clone_copies_the_subtree() {
        let scene = Scene::new();
        let mut node = ContainerNode::new(scene.id());
        node.base_mut().name = "group".to_string();
        node.add_child(Box::new(ContainerNode::new(scene.id())));

        let copy = node.clone_node();
        node.base_mut().children_mut().clear();

        assert_eq!(copy.base().name, "group");
        assert_eq!(copy.base().children().len(), 1);
        assert_eq!(copy.base().scene(), scene.id());
    }

    #[test]
    fn scenes_get_distinct_ids() {
        assert_ne!(Scene::new().id(), Scene::new().id());
    }
}
