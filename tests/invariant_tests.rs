//! Randomized structural invariant tests
//!
//! Drives a world through seeded random sequences of re-parents, component
//! attach/detach, force-dynamic toggles, activation changes, moves, ticks and
//! destroys, checking after every step that:
//! - an object is dynamic iff it is forced, its parent is dynamic or one of
//!   its components is dynamic
//! - sibling links, child counts and hierarchy levels agree
//! - every object sits in the level batch of its track and level
//! - active state equals own flag AND parent active state
//! - cached global transforms of static objects match their local chain,
//!   with arbitrary rotations and per-axis scales

use anyhow::{Context, Result, ensure};
use glam::{EulerRot, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scenegraph::{
    ChildPolicy, Component, ComponentHandle, ObjectHandle, Preserve, Track, Transform, World,
    WorldConfig,
};

// ============================================================================
// Helper
// ============================================================================

struct Mover;

impl Component for Mover {
    fn is_dynamic(&self) -> bool {
        true
    }
}

struct Inert;

impl Component for Inert {}

fn pick<T: Copy>(rng: &mut StdRng, items: &[T]) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[rng.random_range(0..items.len())])
    }
}

/// Global transform composed from locals, root first, together with the
/// largest magnitude met along the chain.
fn chain_global(world: &World, handle: ObjectHandle) -> Option<(Transform, f32)> {
    let mut chain = vec![handle];
    let mut current = world.parent(handle);
    while let Some(parent) = current {
        chain.push(parent);
        current = world.parent(parent);
    }
    let mut global: Option<Transform> = None;
    let mut reach = 1.0_f32;
    for &handle in chain.iter().rev() {
        let local = *world.get(handle)?.local_transform();
        let next = match global {
            Some(parent) => parent.compose(&local),
            None => local,
        };
        reach = reach
            .max(next.position.length())
            .max(next.scale.max_element() * 10.0);
        global = Some(next);
    }
    global.map(|global| (global, reach))
}

/// Tolerance grows with the magnitudes composed along the chain, since
/// per-axis scales compound with depth.
fn close(a: &Transform, b: &Transform, reach: f32) -> bool {
    let tolerance = 1e-3 * reach;
    a.position.abs_diff_eq(b.position, tolerance)
        && a.scale.abs_diff_eq(b.scale, tolerance)
        && (a.rotation.abs_diff_eq(b.rotation, 1e-3) || a.rotation.abs_diff_eq(-b.rotation, 1e-3))
}

fn check_invariants(world: &World) -> Result<()> {
    let mut tracked = 0;
    for (handle, object) in world.store().iter() {
        // Classification
        let parent_dynamic = object
            .parent()
            .and_then(|parent| world.get(parent))
            .is_some_and(|parent| parent.is_dynamic());
        let component_dynamic = object
            .components()
            .iter()
            .any(|&component| world.component_dyn(component).is_some_and(|c| c.is_dynamic()));
        let expected = object.is_force_dynamic() || parent_dynamic || component_dynamic;
        ensure!(
            object.is_dynamic() == expected,
            "{handle:?}: dynamic={} expected={expected}",
            object.is_dynamic()
        );

        // Links
        let children: Vec<_> = world.children(handle).collect();
        ensure!(children.len() == object.child_count() as usize, "{handle:?}: child count");
        ensure!(object.first_child() == children.first().copied(), "{handle:?}: first child");
        ensure!(object.last_child() == children.last().copied(), "{handle:?}: last child");
        for &child in &children {
            let child_object = world.get(child).context("dangling child")?;
            ensure!(child_object.parent() == Some(handle), "{child:?}: parent link");
            ensure!(
                child_object.hierarchy_level() == object.hierarchy_level() + 1,
                "{child:?}: level"
            );
        }
        if object.parent().is_none() {
            ensure!(object.hierarchy_level() == 0, "{handle:?}: root level");
        }

        // Level tracks
        let track = if object.is_dynamic() { Track::Dynamic } else { Track::Static };
        ensure!(
            world
                .level_batches(track)
                .level(object.hierarchy_level())
                .contains(&handle),
            "{handle:?}: missing from its level batch"
        );
        tracked += 1;

        // Active state
        let parent_active = object
            .parent()
            .and_then(|parent| world.get(parent))
            .is_none_or(|parent| parent.is_active());
        ensure!(
            object.is_active() == (object.active_flag() && parent_active),
            "{handle:?}: active state"
        );
        for &component in object.components() {
            ensure!(
                world.is_component_active(component) == object.is_active(),
                "{component:?}: component active state"
            );
        }

        // Transforms
        let (expected, reach) = chain_global(world, handle).context("broken parent chain")?;
        let resolved = world.resolved_global_transform(handle).context("unresolvable")?;
        ensure!(close(&resolved, &expected, reach), "{handle:?}: resolved global");
        if object.is_static() {
            ensure!(
                close(object.global_transform(), &expected, reach),
                "{handle:?}: static cache"
            );
        }
    }

    let in_batches = world.level_batches(Track::Static).total_objects()
        + world.level_batches(Track::Dynamic).total_objects();
    ensure!(in_batches == tracked, "batches hold {in_batches}, world holds {tracked}");
    Ok(())
}

/// Arbitrary rotation with per-axis scale, the case where composition
/// order matters most.
fn random_transform(rng: &mut StdRng) -> Transform {
    Transform::new(
        Vec3::new(
            rng.random_range(-5.0..5.0),
            rng.random_range(-5.0..5.0),
            rng.random_range(-5.0..5.0),
        ),
        Quat::from_euler(
            EulerRot::XYZ,
            rng.random_range(-3.0..3.0),
            rng.random_range(-1.5..1.5),
            rng.random_range(-3.0..3.0),
        ),
        Vec3::new(
            rng.random_range(0.5..2.0),
            rng.random_range(0.5..2.0),
            rng.random_range(0.5..2.0),
        ),
    )
}

fn run_sequence(seed: u64, steps: usize) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut world = World::new(
        WorldConfig::default()
            .with_strict_contracts(true)
            .with_static_move_reports(false)
            .with_velocity_tracking(true),
    );
    let mut objects: Vec<ObjectHandle> = (0..12).map(|_| world.create_empty()).collect();
    let mut components: Vec<ComponentHandle> = Vec::new();

    for step in 0..steps {
        match rng.random_range(0..10) {
            0 | 1 => {
                let (Some(child), Some(parent)) = (pick(&mut rng, &objects), pick(&mut rng, &objects))
                else {
                    continue;
                };
                let parent = (!rng.random_bool(0.2)).then_some(parent);
                if let Some(parent) = parent
                    && (parent == child || world.is_ancestor(child, parent))
                {
                    continue;
                }
                let preserve = if rng.random_bool(0.5) {
                    Preserve::Global
                } else {
                    Preserve::Local
                };
                world.set_parent(child, parent, preserve)?;
            }
            2 => {
                let Some(object) = pick(&mut rng, &objects) else { continue };
                let handle = if rng.random_bool(0.6) {
                    world.create_component(object, Mover)?
                } else {
                    world.create_component(object, Inert)?
                };
                components.push(handle);
            }
            3 => {
                let Some(component) = pick(&mut rng, &components) else { continue };
                if let Some(owner) = world.component_owner(component) {
                    world.remove_component(owner, component)?;
                }
                world.destroy_component(component)?;
                components.retain(|&handle| handle != component);
            }
            4 => {
                let Some(object) = pick(&mut rng, &objects) else { continue };
                if rng.random_bool(0.5) {
                    world.make_dynamic(object)?;
                } else {
                    world.make_static(object)?;
                }
            }
            5 => {
                let Some(object) = pick(&mut rng, &objects) else { continue };
                world.set_active_flag(object, rng.random_bool(0.5))?;
            }
            6 => {
                let Some(object) = pick(&mut rng, &objects) else { continue };
                let local = random_transform(&mut rng);
                world.set_local_transform(object, local)?;
            }
            7 => world.update(1.0 / 60.0),
            8 => {
                let Some(object) = pick(&mut rng, &objects) else { continue };
                let policy = match rng.random_range(0..3) {
                    0 => ChildPolicy::DestroyRecursive,
                    1 => ChildPolicy::ReparentToGrandparent,
                    _ => ChildPolicy::PromoteToRoot,
                };
                world.destroy_with(object, policy)?;
                objects.retain(|&handle| world.contains(handle));
                components.retain(|&handle| world.component_dyn(handle).is_some());
            }
            _ => objects.push(world.create_empty()),
        }
        check_invariants(&world).with_context(|| format!("seed {seed}, step {step}"))?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn invariants_hold_under_random_mutation() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    for seed in 0..16 {
        run_sequence(seed, 300)?;
    }
    Ok(())
}

#[test]
fn invariants_hold_in_a_long_sequence() -> Result<()> {
    run_sequence(0x5eed, 2000)
}
