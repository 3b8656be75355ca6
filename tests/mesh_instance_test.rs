use std::sync::Arc;

use cgmath::{Matrix4, SquareMatrix, Vector3};
use tex_ngin::{
    backends::BackendCall,
    data_structures::{
        bounding_box::BoundingBox,
        instance::Instance,
        mesh::{Material, StaticMesh},
        mesh_instance::{DebugFlags, MeshInstanceNode},
        pixel_format::PixelFormat,
        scene_graph::{Scene, SceneNode},
    },
    error::SceneError,
    render::{Capabilities, Color, MatrixSlot, RenderBackend},
};

use crate::common::test_utils::{box_mesh, cache_on, point, rgba, software};

mod common;

fn material(name: &str) -> Arc<Material> {
    Arc::new(Material::new(name, None))
}

fn two_group_mesh() -> Arc<dyn StaticMesh> {
    box_mesh(
        "crate",
        &[
            ([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]),
            ([-2.0, 0.5, 0.0], [0.5, 3.0, 4.0]),
        ],
    )
}

#[test]
fn bad_group_index_leaves_the_node_untouched() {
    let scene = Scene::new();
    let mesh = two_group_mesh();
    let mut node = MeshInstanceNode::new(scene.id());
    node.add_polygon_group(mesh.clone(), 0, material("wood")).unwrap();
    let bbox = node.bounding_box();

    let result = node.add_polygon_group(mesh, 3, material("wood"));

    assert_eq!(
        result,
        Err(SceneError::PolygonGroupOutOfRange { index: 3, count: 2 })
    );
    assert_eq!(node.polygon_group_count(), 1);
    assert_eq!(node.bounding_box(), bbox);
}

#[test]
fn bounding_box_is_the_union_of_the_groups() {
    let scene = Scene::new();
    let mesh = two_group_mesh();
    let mut node = MeshInstanceNode::new(scene.id());
    assert!(node.bounding_box().is_empty());

    node.add_polygon_group(mesh.clone(), 0, material("a")).unwrap();
    node.add_polygon_group(mesh.clone(), 1, material("b")).unwrap();
    node.add_polygon_group(mesh, 0, material("c")).unwrap();

    assert_eq!(
        node.bounding_box(),
        BoundingBox::new(point(-2.0, 0.0, 0.0), point(1.0, 3.0, 4.0))
    );
    let indices: Vec<usize> = node.entries().iter().map(|e| e.polygon_group).collect();
    assert_eq!(indices, vec![0, 1, 0]);
}

#[test]
fn clone_copies_state_and_shares_resources() {
    let scene = Scene::new();
    let mesh = two_group_mesh();
    let mut source = MeshInstanceNode::new(scene.id());
    source.add_polygon_group(mesh.clone(), 1, material("stone")).unwrap();
    source.set_visible(false);
    source.set_debug_flags(DebugFlags::AABBOX);

    let mut copy = source.clone();
    assert_eq!(copy.bounding_box(), source.bounding_box());
    assert_eq!(copy.is_visible(), source.is_visible());
    assert_eq!(copy.debug_flags(), source.debug_flags());
    assert_eq!(copy.base().scene(), scene.id());
    assert!(Arc::ptr_eq(&copy.entries()[0].mesh, &source.entries()[0].mesh));
    assert!(Arc::ptr_eq(
        &copy.entries()[0].material,
        &source.entries()[0].material
    ));

    copy.add_polygon_group(mesh, 0, material("moss")).unwrap();
    assert_eq!(source.polygon_group_count(), 1);
    assert_eq!(copy.polygon_group_count(), 2);
}

#[test]
fn clone_populates_a_supplied_node() {
    let scene = Scene::new();
    let mesh = two_group_mesh();
    let mut source = MeshInstanceNode::new(scene.id());
    source.base_mut().name = "barrel".to_string();
    source.add_polygon_group(mesh.clone(), 0, material("oak")).unwrap();

    let mut target = MeshInstanceNode::new(scene.id());
    target.add_polygon_group(mesh.clone(), 1, material("old")).unwrap();
    target.add_polygon_group(mesh, 1, material("old")).unwrap();

    let copy = source.clone_with(Some(target));

    assert_eq!(copy.base().name, "barrel");
    assert_eq!(copy.polygon_group_count(), 1);
    assert_eq!(copy.entries()[0].material.name, "oak");
    assert_eq!(copy.bounding_box(), source.bounding_box());
}

#[test]
fn invisible_nodes_issue_no_backend_calls() {
    let backend = software(Capabilities::desktop_gl());
    let scene = Scene::new();
    let mut node = MeshInstanceNode::new(scene.id());
    node.add_polygon_group(two_group_mesh(), 0, material("a")).unwrap();
    node.set_debug_flags(DebugFlags::all());
    node.set_visible(false);
    backend.clear_calls();

    node.draw(backend.as_ref());

    assert!(backend.calls().is_empty());
}

#[test]
fn draw_composes_and_restores_the_model_view() {
    let backend = software(Capabilities::desktop_gl());
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_on(&backend, dir.path());
    let texture = cache
        .create_from_pixels(PixelFormat::Rgba8888, &rgba(8, 8, [9; 4]), 8, 8)
        .unwrap();
    let painted = Arc::new(Material::new("painted", Some(texture.clone())));

    let scene = Scene::new();
    let mut node = MeshInstanceNode::new(scene.id());
    node.add_polygon_group(two_group_mesh(), 0, painted).unwrap();
    node.add_polygon_group(two_group_mesh(), 1, material("bare")).unwrap();
    node.set_local_transform(Instance::from(Vector3::new(1.0, 2.0, 3.0)));
    node.update_world_transforms(&Matrix4::identity());

    let camera = Matrix4::from_translation(Vector3::new(0.0, 0.0, -10.0));
    backend.set_matrix(MatrixSlot::ModelView, camera);
    backend.clear_calls();

    node.draw(backend.as_ref());

    let world = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
    let calls = backend.calls();
    assert_eq!(
        calls,
        vec![
            BackendCall::SetMatrix(MatrixSlot::ModelView, camera * world),
            BackendCall::BindTexture(Some(texture.handle())),
            BackendCall::SetColor(Color::WHITE),
            BackendCall::DrawIndexed {
                texture: Some(texture.handle()),
                vertices: 3,
                indices: 3
            },
            BackendCall::BindTexture(None),
            BackendCall::SetColor(Color::WHITE),
            BackendCall::DrawIndexed {
                texture: None,
                vertices: 3,
                indices: 3
            },
            BackendCall::SetMatrix(MatrixSlot::ModelView, camera),
        ]
    );
    assert_eq!(backend.matrix(MatrixSlot::ModelView), camera);
}

#[test]
fn debug_overlays_follow_the_geometry() {
    let backend = software(Capabilities::desktop_gl());
    let scene = Scene::new();
    let mut node = MeshInstanceNode::new(scene.id());
    node.add_polygon_group(two_group_mesh(), 0, material("a")).unwrap();
    node.set_debug_flags(DebugFlags::AABBOX | DebugFlags::LOCAL_AXIS);
    backend.clear_calls();

    node.draw(backend.as_ref());

    let calls = backend.calls();
    let draw = calls
        .iter()
        .position(|call| matches!(call, BackendCall::DrawIndexed { .. }))
        .unwrap();
    let origin = point(0.0, 0.0, 0.0);
    assert_eq!(
        calls[draw + 1..],
        [
            BackendCall::EnableDepthTest(false),
            BackendCall::EnableTexturing(false),
            BackendCall::FlushState,
            BackendCall::SetColor(Color::WHITE),
            BackendCall::DrawBox(node.bounding_box()),
            BackendCall::SetColor(Color::RED),
            BackendCall::DrawLine {
                from: origin,
                to: point(50.0, 0.0, 0.0)
            },
            BackendCall::SetColor(Color::GREEN),
            BackendCall::DrawLine {
                from: origin,
                to: point(0.0, 50.0, 0.0)
            },
            BackendCall::SetColor(Color::BLUE),
            BackendCall::DrawLine {
                from: origin,
                to: point(0.0, 0.0, 50.0)
            },
            BackendCall::EnableDepthTest(true),
            BackendCall::EnableTexturing(true),
            BackendCall::SetColor(Color::WHITE),
            BackendCall::SetMatrix(MatrixSlot::ModelView, Matrix4::identity()),
        ]
    );
    assert!(backend.is_depth_test_enabled());
    assert!(backend.is_texturing_enabled());
}

#[test]
fn only_the_requested_overlay_is_drawn() {
    let backend = software(Capabilities::desktop_gl());
    let scene = Scene::new();
    let mut node = MeshInstanceNode::new(scene.id());
    node.add_polygon_group(two_group_mesh(), 0, material("a")).unwrap();
    node.set_debug_flags(DebugFlags::LOCAL_AXIS);
    backend.clear_calls();

    node.draw(backend.as_ref());

    let calls = backend.calls();
    assert!(!calls.iter().any(|c| matches!(c, BackendCall::DrawBox(_))));
    assert_eq!(
        calls
            .iter()
            .filter(|c| matches!(c, BackendCall::DrawLine { .. }))
            .count(),
        3
    );
}

#[test]
fn scene_draws_attached_nodes_under_their_parents() {
    let backend = software(Capabilities::desktop_gl());
    let mut scene = Scene::new();
    let mut node = MeshInstanceNode::new(scene.id());
    node.add_polygon_group(two_group_mesh(), 0, material("a")).unwrap();
    node.set_local_transform(Instance::from(Vector3::new(0.0, 5.0, 0.0)));
    let mut hidden = node.clone();
    hidden.set_visible(false);
    scene.add_node(Box::new(node));
    scene.add_node(Box::new(hidden));
    scene.update_transforms();
    backend.clear_calls();

    scene.draw(backend.as_ref());

    let calls = backend.calls();
    let draws = calls
        .iter()
        .filter(|c| matches!(c, BackendCall::DrawIndexed { .. }))
        .count();
    assert_eq!(draws, 1);
    assert_eq!(
        calls[0],
        BackendCall::SetMatrix(
            MatrixSlot::ModelView,
            Matrix4::from_translation(Vector3::new(0.0, 5.0, 0.0))
        )
    );

    let copy = scene.root().clone_node();
    assert_eq!(copy.base().children().len(), 2);
    let first = copy.base().children()[0]
        .as_any()
        .downcast_ref::<MeshInstanceNode>()
        .unwrap();
    assert_eq!(first.polygon_group_count(), 1);
}
