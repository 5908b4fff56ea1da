//! Scene Save & Load — headless round trip.
//!
//! Builds a small level, saves it to a JSON file, clears the registry and
//! loads it back. The hierarchy is restored from the entity names stored in
//! each `relationship` block.
//!
//! Run with: `cargo run -p tarn --example scene_save_load`

use tarn::prelude::*;

fn main() -> tarn::Result<()> {
    env_logger::init();

    let scenes = SceneRegistry::with_engine_components();
    let mut registry = Registry::new();

    let player = registry
        .spawn("player", "actors")
        .insert(Transform::from_xy(64.0, 32.0))
        .insert(Sprite::new("player.png").layer(2))
        .insert(BoxCollider::default())
        .insert(Physics::dynamic())
        .id();
    let label = registry
        .spawn("label", "ui")
        .insert(Transform::from_xy(0.0, -20.0))
        .insert(Text::new("Player 1"))
        .id();
    registry.add_child(player, label);
    registry
        .spawn("coin", "pickups")
        .insert(Transform::from_xy(200.0, 32.0))
        .insert(CircleCollider::default());

    let path = std::env::temp_dir().join("tarn_scene_save_load.json");
    scenes.save_to_file(&registry, &path)?;
    println!("saved {} entities to {}", registry.entity_count(), path.display());
    println!("{}", std::fs::read_to_string(&path)?);

    registry.clear();
    let loaded = scenes.load_from_file(&mut registry, &path)?;
    println!("loaded {} entities", loaded.len());

    let player = registry.named("player");
    for child in registry.children(player) {
        println!("player child: {}", registry.name_of(child).unwrap_or("?"));
    }
    println!("player is at {:?}", registry.get::<Transform>(player).position);

    std::fs::remove_file(&path)?;
    Ok(())
}
