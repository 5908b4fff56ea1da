//! Entity Hierarchies — headless solar system.
//!
//! Builds sun → planets → moons with `add_child`, spins the planets for a
//! few frames, propagates transforms and prints world positions. Then
//! duplicates a planet with its moon and tears one system down with
//! `remove_and_destroy`.
//!
//! Run with: `cargo run -p tarn --example scene_hierarchy`

use tarn::prelude::*;

#[derive(Clone)]
struct Orbit {
    speed: f32,
}

fn main() {
    env_logger::init();

    let mut registry = Registry::new();

    let sun = registry.spawn("sun", "stars").insert(Transform::default()).id();

    for (i, speed) in [0.8_f32, 0.5, 0.3].into_iter().enumerate() {
        let distance = 120.0 * (i as f32 + 1.0);
        let planet = registry
            .spawn(&format!("planet{i}"), "planets")
            .insert(Transform::from_xy(distance, 0.0))
            .insert(Orbit { speed })
            .id();
        registry.add_child(sun, planet);

        let moon = registry
            .spawn(&format!("moon{i}"), "moons")
            .insert(Transform::from_xy(30.0, 0.0))
            .id();
        registry.add_child(planet, moon);
    }

    // Rotating a planet's parent frame is enough; children follow.
    let dt = 1.0 / 60.0;
    for _ in 0..60 {
        registry.query::<(&mut Transform, &Orbit)>(|_, (transform, orbit)| {
            transform.rotation += orbit.speed * dt;
        });
    }
    propagate_transforms(&mut registry);

    registry.apply_to_hierarchy(sun, |registry, entity| {
        let depth = std::iter::successors(registry.parent(entity), |&e| registry.parent(e)).count();
        let world = registry.get::<GlobalTransform>(entity).0.translation;
        println!(
            "{:indent$}{} at ({:.1}, {:.1})",
            "",
            registry.name_of(entity).unwrap_or("?"),
            world.x,
            world.y,
            indent = depth * 2
        );
    });

    let planet0 = registry.named("planet0");
    if let Some(copy) = registry.duplicate_recursive(planet0, Some(sun)) {
        let moons: Vec<_> = registry
            .children(copy)
            .into_iter()
            .filter_map(|e| registry.name_of(e).map(str::to_string))
            .collect();
        println!("duplicated planet0 as {} with {moons:?}", registry.name_of(copy).unwrap_or("?"));
    }

    let removed = registry.remove_and_destroy(registry.named("planet1"));
    println!("removed (children first): {removed:?}");
    println!("{} entities left, roots: {}", registry.entity_count(), registry.roots().len());
}
