//! Hierarchy Integration Tests
//!
//! Tests for:
//! - Re-parenting with global / local preservation
//! - Hierarchy levels and level batches
//! - Cycle rejection
//! - Static/dynamic contagion through parents and components
//! - Active-state propagation

use glam::{Quat, Vec3};
use scenegraph::{
    Component, ObjectHandle, Preserve, Track, Transform, World, WorldConfig, WorldError,
};

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f32 = 1e-4;

fn lenient_world() -> World {
    let _ = env_logger::builder().is_test(true).try_init();
    World::new(WorldConfig::default().with_strict_contracts(false))
}

fn placed(world: &mut World, position: Vec3, rotation: Quat, scale: Vec3) -> ObjectHandle {
    let handle = world.create_empty();
    world
        .set_local_transform(handle, Transform::new(position, rotation, scale))
        .unwrap();
    handle
}

fn global(world: &World, handle: ObjectHandle) -> Transform {
    world.resolved_global_transform(handle).unwrap()
}

struct Mover;

impl Component for Mover {
    fn is_dynamic(&self) -> bool {
        true
    }
}

// ============================================================================
// Re-parenting
// ============================================================================

#[test]
fn preserve_global_keeps_world_placement() {
    let mut world = lenient_world();
    let parent = placed(
        &mut world,
        Vec3::new(3.0, -2.0, 5.0),
        Quat::from_rotation_z(0.8),
        Vec3::new(2.0, 0.5, 1.5),
    );
    let child = placed(
        &mut world,
        Vec3::new(1.0, 1.0, 1.0),
        Quat::from_rotation_x(-0.4),
        Vec3::splat(0.75),
    );
    let before = global(&world, child);

    world.set_parent(child, Some(parent), Preserve::Global).unwrap();

    assert!(global(&world, child).abs_diff_eq(&before, EPSILON));
    assert!(world.get(child).unwrap().global_transform().abs_diff_eq(&before, EPSILON));
    assert_eq!(
        world.get(child).unwrap().hierarchy_level(),
        world.get(parent).unwrap().hierarchy_level() + 1
    );
}

#[test]
fn preserve_local_keeps_local_and_composes_global() {
    let mut world = lenient_world();
    let parent = placed(
        &mut world,
        Vec3::new(-1.0, 4.0, 0.0),
        Quat::from_rotation_y(1.1),
        Vec3::new(1.0, 2.0, 3.0),
    );
    let child = placed(&mut world, Vec3::X, Quat::from_rotation_z(0.2), Vec3::ONE);
    let local = *world.get(child).unwrap().local_transform();

    world.set_parent(child, Some(parent), Preserve::Local).unwrap();

    assert_eq!(*world.get(child).unwrap().local_transform(), local);
    let expected = global(&world, parent).compose(&local);
    assert!(global(&world, child).abs_diff_eq(&expected, EPSILON));
}

#[test]
fn detach_and_return_round_trip() {
    let mut world = lenient_world();
    let parent = placed(&mut world, Vec3::new(0.0, 2.0, 0.0), Quat::from_rotation_y(0.5), Vec3::splat(2.0));
    let child = placed(&mut world, Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE);
    world.set_parent(child, Some(parent), Preserve::Local).unwrap();
    let original = global(&world, child);

    world.set_parent(child, None, Preserve::Global).unwrap();
    assert!(global(&world, child).abs_diff_eq(&original, EPSILON));

    world.set_parent(child, Some(parent), Preserve::Global).unwrap();
    assert!(global(&world, child).abs_diff_eq(&original, EPSILON));
    assert!(
        world
            .get(child)
            .unwrap()
            .local_transform()
            .position
            .abs_diff_eq(Vec3::X, EPSILON)
    );
}

#[test]
fn reparenting_relevels_whole_subtree() {
    let mut world = lenient_world();
    let a = world.create_empty();
    let b = world.create_empty();
    let c = world.create_empty();
    let d = world.create_empty();
    world.set_parent(c, Some(b), Preserve::Global).unwrap();
    world.set_parent(d, Some(c), Preserve::Global).unwrap();

    world.set_parent(b, Some(a), Preserve::Global).unwrap();

    assert_eq!(world.get(b).unwrap().hierarchy_level(), 1);
    assert_eq!(world.get(c).unwrap().hierarchy_level(), 2);
    assert_eq!(world.get(d).unwrap().hierarchy_level(), 3);
    let batches = world.level_batches(Track::Static);
    assert_eq!(batches.level(3), &[d]);
    assert_eq!(batches.total_objects(), 4);
}

#[test]
fn reparent_to_same_parent_is_a_no_op() {
    let mut world = lenient_world();
    let parent = world.create_empty();
    let a = world.create_empty();
    let b = world.create_empty();
    world.set_parent(a, Some(parent), Preserve::Global).unwrap();
    world.set_parent(b, Some(parent), Preserve::Global).unwrap();

    world.set_parent(a, Some(parent), Preserve::Global).unwrap();
    assert_eq!(world.children(parent).collect::<Vec<_>>(), vec![a, b]);
}

#[test]
fn reparent_stale_handles_fail() {
    let mut world = lenient_world();
    let a = world.create_empty();
    let dead = world.create_empty();
    world.destroy(dead).unwrap();

    assert_eq!(
        world.set_parent(a, Some(dead), Preserve::Global),
        Err(WorldError::InvalidHandle(dead))
    );
    assert_eq!(
        world.set_parent(dead, Some(a), Preserve::Global),
        Err(WorldError::InvalidHandle(dead))
    );
}

// ============================================================================
// Cycle rejection
// ============================================================================

#[test]
fn cycle_through_grandchild_is_rejected() {
    let mut world = lenient_world();
    let a = world.create_empty();
    let b = world.create_empty();
    let c = world.create_empty();
    world.set_parent(b, Some(a), Preserve::Global).unwrap();
    world.set_parent(c, Some(b), Preserve::Global).unwrap();

    assert_eq!(
        world.set_parent(a, Some(c), Preserve::Global),
        Err(WorldError::CyclicHierarchy { child: a, parent: c })
    );
    assert_eq!(
        world.set_parent(a, Some(a), Preserve::Global),
        Err(WorldError::CyclicHierarchy { child: a, parent: a })
    );
    assert_eq!(world.parent(a), None);
}

#[test]
#[should_panic(expected = "contract violation")]
fn cycle_panics_in_strict_mode() {
    let mut world = World::new(WorldConfig::default().with_strict_contracts(true));
    let a = world.create_empty();
    let b = world.create_empty();
    world.set_parent(b, Some(a), Preserve::Global).unwrap();
    let _ = world.set_parent(a, Some(b), Preserve::Global);
}

// ============================================================================
// Depth limit
// ============================================================================

/// Builds a single chain whose tail sits on `deepest` level.
fn chain_to_level(world: &mut World, deepest: u16) -> Vec<ObjectHandle> {
    let mut chain = vec![world.create_empty()];
    for _ in 0..deepest {
        let next = world.create_empty();
        let tail = *chain.last().unwrap();
        world.set_parent(next, Some(tail), Preserve::Local).unwrap();
        chain.push(next);
    }
    chain
}

#[test]
fn depth_overflow_is_rejected_without_side_effects() {
    let mut world = lenient_world();
    let chain = chain_to_level(&mut world, u16::MAX);
    let tail = *chain.last().unwrap();
    assert_eq!(world.get(tail).unwrap().hierarchy_level(), u16::MAX);

    // Leaf under the deepest object
    let leaf = world.create_empty();
    assert_eq!(
        world.set_parent(leaf, Some(tail), Preserve::Local),
        Err(WorldError::HierarchyTooDeep { child: leaf, parent: tail })
    );
    assert_eq!(world.parent(leaf), None);
    assert_eq!(world.get(leaf).unwrap().hierarchy_level(), 0);
    assert_eq!(world.get(tail).unwrap().child_count(), 0);

    // A two-level subtree only fits one level higher up
    let top = world.create_empty();
    let bottom = world.create_empty();
    world.set_parent(bottom, Some(top), Preserve::Local).unwrap();
    let second_last = chain[chain.len() - 2];
    assert_eq!(
        world.set_parent(top, Some(second_last), Preserve::Local),
        Err(WorldError::HierarchyTooDeep { child: top, parent: second_last })
    );
    assert_eq!(world.get(bottom).unwrap().hierarchy_level(), 1);

    let third_last = chain[chain.len() - 3];
    world.set_parent(top, Some(third_last), Preserve::Local).unwrap();
    assert_eq!(world.get(bottom).unwrap().hierarchy_level(), u16::MAX);
    assert!(
        world
            .level_batches(Track::Static)
            .level(u16::MAX)
            .contains(&bottom)
    );
}

#[test]
#[should_panic(expected = "contract violation")]
fn depth_overflow_panics_in_strict_mode() {
    let mut world = World::new(WorldConfig::default().with_strict_contracts(true));
    let chain = chain_to_level(&mut world, u16::MAX);
    let leaf = world.create_empty();
    let _ = world.set_parent(leaf, chain.last().copied(), Preserve::Local);
}

// ============================================================================
// Static / dynamic classification
// ============================================================================

#[test]
fn dynamic_component_scenario() {
    let mut world = lenient_world();
    let a = world.create_empty();
    let b = world.create_empty();
    let c = world.create_empty();
    world.set_parent(b, Some(a), Preserve::Global).unwrap();
    world.set_parent(c, Some(b), Preserve::Global).unwrap();

    let mover = world.create_component(c, Mover).unwrap();
    assert!(world.get(c).unwrap().is_dynamic());
    assert!(world.get(b).unwrap().is_static());
    assert!(world.get(a).unwrap().is_static());

    world.set_parent(c, Some(a), Preserve::Global).unwrap();
    assert!(world.get(c).unwrap().is_dynamic());
    assert!(world.get(b).unwrap().is_static());
    assert!(world.get(a).unwrap().is_static());

    world.remove_component(c, mover).unwrap();
    world.conditional_make_static(c, None);
    assert!(world.get(c).unwrap().is_static());
    assert_eq!(world.level_batches(Track::Dynamic).total_objects(), 0);
}

#[test]
fn moving_under_dynamic_parent_makes_subtree_dynamic() {
    let mut world = lenient_world();
    let mover_host = world.create_empty();
    world.create_component(mover_host, Mover).unwrap();

    let subtree = world.create_empty();
    let leaf = world.create_empty();
    world.set_parent(leaf, Some(subtree), Preserve::Global).unwrap();
    assert!(world.get(leaf).unwrap().is_static());

    world.set_parent(subtree, Some(mover_host), Preserve::Global).unwrap();
    assert!(world.get(subtree).unwrap().is_dynamic());
    assert!(world.get(leaf).unwrap().is_dynamic());

    // Detaching to root re-evaluates
    world.set_parent(subtree, None, Preserve::Global).unwrap();
    assert!(world.get(subtree).unwrap().is_static());
    assert!(world.get(leaf).unwrap().is_static());
}

#[test]
fn static_recursion_stops_at_children_dynamic_on_their_own() {
    let mut world = lenient_world();
    let root = world.create_empty();
    let plain = world.create_empty();
    let moving = world.create_empty();
    let below_moving = world.create_empty();
    world.set_parent(plain, Some(root), Preserve::Global).unwrap();
    world.set_parent(moving, Some(root), Preserve::Global).unwrap();
    world.set_parent(below_moving, Some(moving), Preserve::Global).unwrap();
    world.create_component(moving, Mover).unwrap();

    world.make_dynamic(root).unwrap();
    assert!(world.descendants(root).all(|h| world.get(h).unwrap().is_dynamic()));

    world.make_static(root).unwrap();
    assert!(world.get(root).unwrap().is_static());
    assert!(world.get(plain).unwrap().is_static());
    assert!(world.get(moving).unwrap().is_dynamic());
    assert!(world.get(below_moving).unwrap().is_dynamic());
}

#[test]
fn make_dynamic_and_make_static_are_idempotent() {
    let mut world = lenient_world();
    let a = world.create_empty();
    let b = world.create_empty();
    world.set_parent(b, Some(a), Preserve::Global).unwrap();

    world.make_dynamic(a).unwrap();
    let flags_once = (world.get(a).unwrap().flags(), world.get(b).unwrap().flags());
    let dynamic_once = world.level_batches(Track::Dynamic).total_objects();
    world.make_dynamic(a).unwrap();
    assert_eq!(
        (world.get(a).unwrap().flags(), world.get(b).unwrap().flags()),
        flags_once
    );
    assert_eq!(world.level_batches(Track::Dynamic).total_objects(), dynamic_once);

    world.make_static(a).unwrap();
    let flags_static = (world.get(a).unwrap().flags(), world.get(b).unwrap().flags());
    world.make_static(a).unwrap();
    assert_eq!(
        (world.get(a).unwrap().flags(), world.get(b).unwrap().flags()),
        flags_static
    );
    assert_eq!(world.level_batches(Track::Static).total_objects(), 2);
}

#[test]
fn determine_dynamic_can_ignore_a_component() {
    let mut world = lenient_world();
    let object = world.create_empty();
    let mover = world.create_component(object, Mover).unwrap();

    assert!(world.determine_dynamic(object, None));
    assert!(!world.determine_dynamic(object, Some(mover)));
    // Pure: nothing changed
    assert!(world.get(object).unwrap().is_dynamic());
}

// ============================================================================
// Active state
// ============================================================================

#[test]
fn inactive_ancestor_deactivates_subtree() {
    let mut world = lenient_world();
    let a = world.create_empty();
    let b = world.create_empty();
    let c = world.create_empty();
    world.set_parent(b, Some(a), Preserve::Global).unwrap();
    world.set_parent(c, Some(b), Preserve::Global).unwrap();
    world.set_active_flag(c, false).unwrap();

    world.set_active_flag(a, false).unwrap();
    for handle in [a, b, c] {
        assert!(!world.get(handle).unwrap().is_active());
    }
    assert!(world.get(b).unwrap().active_flag());

    world.set_active_flag(a, true).unwrap();
    assert!(world.get(a).unwrap().is_active());
    assert!(world.get(b).unwrap().is_active());
    // Own flag still off
    assert!(!world.get(c).unwrap().is_active());
}

#[test]
fn reparenting_under_inactive_parent_deactivates() {
    let mut world = lenient_world();
    let off = world.create_empty();
    world.set_active_flag(off, false).unwrap();
    let object = world.create_empty();
    assert!(world.get(object).unwrap().is_active());

    world.set_parent(object, Some(off), Preserve::Global).unwrap();
    assert!(!world.get(object).unwrap().is_active());

    world.set_parent(object, None, Preserve::Global).unwrap();
    assert!(world.get(object).unwrap().is_active());
}
