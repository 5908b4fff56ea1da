//! # Scenes — Save, Load, and Switch
//!
//! A scene document is plain JSON: one [`SceneEntity`] per entity with its
//! name, group and a map of component key → component value.
//!
//! ```json
//! {
//!   "entities": [
//!     { "name": "ship", "components": {
//!         "transform": { "position": [100.0, 50.0], "rotation": 0.0, "scale": [1.0, 1.0] },
//!         "relationship": { "firstChild": "turret" } } },
//!     { "name": "turret", "components": {
//!         "sprite": { "texture": "turret.png" },
//!         "relationship": { "parent": "ship" } } }
//!   ]
//! }
//! ```
//!
//! Entity handles are not stable across runs, so the `relationship` block
//! stores *names*. Loading creates every entity first, then re-resolves the
//! names and rebuilds the tree through `add_child`.
//!
//! ## Quick Start
//!
//! ```ignore
//! let scenes = SceneRegistry::with_engine_components();
//! scenes.save_to_file(&registry, "level.json")?;
//!
//! registry.clear();
//! let entities = scenes.load_from_file(&mut registry, "level.json")?;
//! ```

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::components::{Animation, BoxCollider, CircleCollider, Physics, Sprite, Text, Transform, Ui};
use crate::ecs::{Component, Entity, Registry, Relationship};

/// Document key of the hierarchy block.
pub const RELATIONSHIP_KEY: &str = "relationship";

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("scene file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed scene document: {0}")]
    Json(#[from] serde_json::Error),

    /// A component value does not match its registered type.
    #[error("component `{key}` of entity \"{entity}\" is invalid: {source}")]
    Component {
        key: String,
        entity: String,
        source: serde_json::Error,
    },

    #[error("relationship of \"{entity}\" refers to unknown entity \"{name}\"")]
    UnknownEntity { entity: String, name: String },

    #[error("scene document names \"{0}\" more than once")]
    DuplicateName(String),
}

// ── SceneRegistry ────────────────────────────────────────────────────────

type SerializeFn = fn(&dyn Any) -> Option<Value>;
type DeserializeFn = fn(Value) -> Result<Box<dyn Any>, serde_json::Error>;
type InsertFn = fn(&mut Registry, Entity, Box<dyn Any>);
type DefaultFn = fn() -> Value;

struct ComponentFns {
    key: String,
    serialize: SerializeFn,
    deserialize: DeserializeFn,
    insert: InsertFn,
    default_value: DefaultFn,
}

/// Maps component types to document keys and serde function pointers.
#[derive(Default)]
pub struct SceneRegistry {
    by_type_id: HashMap<TypeId, ComponentFns>,
    by_key: HashMap<String, TypeId>,
    /// Registration order; components are written in this order.
    order: Vec<TypeId>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every engine component under its standard key.
    pub fn with_engine_components() -> Self {
        let mut scenes = Self::new();
        scenes.register::<Transform>("transform");
        scenes.register::<Sprite>("sprite");
        scenes.register::<Animation>("animation");
        scenes.register::<BoxCollider>("boxCollider");
        scenes.register::<CircleCollider>("circleCollider");
        scenes.register::<Physics>("physics");
        scenes.register::<Text>("text");
        scenes.register::<Ui>("ui");
        scenes
    }

    /// Register a component type under a document key. Re-registering a
    /// type moves it to the new key.
    pub fn register<T>(&mut self, key: &str)
    where
        T: Component + Serialize + DeserializeOwned + Default,
    {
        let type_id = TypeId::of::<T>();
        debug_assert!(key != RELATIONSHIP_KEY, "`{RELATIONSHIP_KEY}` is reserved");

        let fns = ComponentFns {
            key: key.to_string(),
            serialize: |any| {
                let value = any.downcast_ref::<T>()?;
                serde_json::to_value(value).ok()
            },
            deserialize: |json| {
                let value: T = serde_json::from_value(json)?;
                Ok(Box::new(value))
            },
            insert: |registry, entity, boxed| {
                if let Ok(value) = boxed.downcast::<T>() {
                    registry.add_or_replace(entity, *value);
                }
            },
            default_value: || serde_json::to_value(T::default()).unwrap_or(Value::Null),
        };

        if let Some(old) = self.by_type_id.insert(type_id, fns) {
            self.by_key.remove(&old.key);
        } else {
            self.order.push(type_id);
        }
        self.by_key.insert(key.to_string(), type_id);
    }

    /// Registered keys in registration order.
    pub fn component_keys(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter_map(|tid| self.by_type_id.get(tid))
            .map(|fns| fns.key.as_str())
            .collect()
    }

    /// Default JSON for a key, e.g. for an editor's "Add Component" action.
    pub fn default_value(&self, key: &str) -> Option<Value> {
        let fns = self.by_type_id.get(self.by_key.get(key)?)?;
        Some((fns.default_value)())
    }

    // ── Convenience methods (wrap the free functions) ────────────────

    pub fn save(&self, registry: &Registry) -> SceneData {
        save_scene(registry, self)
    }

    pub fn save_to_file(&self, registry: &Registry, path: impl AsRef<Path>) -> Result<(), SceneError> {
        save_scene_to_file(registry, self, path)
    }

    pub fn load(&self, registry: &mut Registry, data: &SceneData) -> Result<Vec<Entity>, SceneError> {
        load_scene(registry, self, data)
    }

    pub fn load_from_file(&self, registry: &mut Registry, path: impl AsRef<Path>) -> Result<Vec<Entity>, SceneError> {
        load_scene_from_file(registry, self, path)
    }

    pub fn load_tagged(&self, registry: &mut Registry, data: &SceneData, scene_name: &str) -> Result<Vec<Entity>, SceneError> {
        load_scene_tagged(registry, self, data, scene_name)
    }

    pub fn switch(
        &self,
        registry: &mut Registry,
        old_name: &str,
        new_data: &SceneData,
        new_name: &str,
    ) -> Result<Vec<Entity>, SceneError> {
        switch_scene(registry, self, old_name, new_data, new_name)
    }
}

// ── Scene Data (JSON wire format) ────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneData {
    pub entities: Vec<SceneEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneEntity {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(default)]
    pub components: BTreeMap<String, Value>,
}

impl SceneEntity {
    /// The decoded `relationship` block, if any.
    pub fn relationship(&self) -> Result<Option<SceneRelationship>, SceneError> {
        self.components
            .get(RELATIONSHIP_KEY)
            .map(|json| {
                serde_json::from_value(json.clone()).map_err(|source| SceneError::Component {
                    key: RELATIONSHIP_KEY.to_string(),
                    entity: self.name.clone(),
                    source,
                })
            })
            .transpose()
    }
}

/// Hierarchy links by entity name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneRelationship {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_child: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_sibling: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_sibling: Option<String>,
}

impl SceneRelationship {
    fn names(&self) -> impl Iterator<Item = &str> {
        [&self.parent, &self.first_child, &self.prev_sibling, &self.next_sibling]
            .into_iter()
            .filter_map(|name| name.as_deref())
    }
}

// ── Save / Load functions ────────────────────────────────────────────────

fn entity_name(registry: &Registry, entity: Entity) -> String {
    registry
        .name_of(entity)
        .map(str::to_string)
        .unwrap_or_else(|| entity.to_string())
}

/// Save every entity in slot order.
pub fn save_scene(registry: &Registry, scenes: &SceneRegistry) -> SceneData {
    let entities = registry
        .entities()
        .into_iter()
        .map(|entity| {
            let mut components = BTreeMap::new();
            for tid in &scenes.order {
                let Some(fns) = scenes.by_type_id.get(tid) else {
                    continue;
                };
                if let Some(json) = registry.get_any(entity, *tid).and_then(fns.serialize) {
                    components.insert(fns.key.clone(), json);
                }
            }

            if let Some(rel) = registry.try_get::<Relationship>(entity) {
                let name = |link: Option<Entity>| link.map(|e| entity_name(registry, e));
                let links = SceneRelationship {
                    parent: name(rel.parent),
                    first_child: name(rel.first_child),
                    prev_sibling: name(rel.prev_sibling),
                    next_sibling: name(rel.next_sibling),
                };
                if links != SceneRelationship::default() {
                    if let Ok(json) = serde_json::to_value(&links) {
                        components.insert(RELATIONSHIP_KEY.to_string(), json);
                    }
                }
            }

            SceneEntity {
                name: entity_name(registry, entity),
                group: registry.group_of(entity).unwrap_or("").to_string(),
                components,
            }
        })
        .collect();

    SceneData { entities }
}

/// Load a document into the registry, on top of whatever is already there.
///
/// The document is fully validated before the first entity is created, so
/// an error leaves the registry untouched. Names that collide with existing
/// entities get the usual `_N` suffix; links inside the document still
/// resolve to the entities it created. Returns the new entities in
/// document order.
pub fn load_scene(registry: &mut Registry, scenes: &SceneRegistry, data: &SceneData) -> Result<Vec<Entity>, SceneError> {
    // Validate: unique names, known link targets, decodable components.
    let mut names = HashSet::new();
    for scene_entity in &data.entities {
        if !names.insert(scene_entity.name.as_str()) {
            return Err(SceneError::DuplicateName(scene_entity.name.clone()));
        }
    }

    let mut relationships: HashMap<&str, SceneRelationship> = HashMap::new();
    let mut decoded = Vec::with_capacity(data.entities.len());
    for scene_entity in &data.entities {
        if let Some(rel) = scene_entity.relationship()? {
            if let Some(missing) = rel.names().find(|name| !names.contains(name)) {
                return Err(SceneError::UnknownEntity {
                    entity: scene_entity.name.clone(),
                    name: missing.to_string(),
                });
            }
            relationships.insert(scene_entity.name.as_str(), rel);
        }

        let mut components = Vec::new();
        for (key, json) in &scene_entity.components {
            if key == RELATIONSHIP_KEY {
                continue;
            }
            let Some(fns) = scenes.by_key.get(key).and_then(|tid| scenes.by_type_id.get(tid)) else {
                log::warn!("scene: skipping unknown component `{key}` on \"{}\"", scene_entity.name);
                continue;
            };
            let value = (fns.deserialize)(json.clone()).map_err(|source| SceneError::Component {
                key: key.clone(),
                entity: scene_entity.name.clone(),
                source,
            })?;
            components.push((fns.insert, value));
        }
        decoded.push(components);
    }

    // First pass: create entities and attach components.
    let mut by_name: HashMap<&str, Entity> = HashMap::new();
    let mut spawned = Vec::with_capacity(data.entities.len());
    for (scene_entity, components) in data.entities.iter().zip(decoded) {
        let entity = registry.create_entity(&scene_entity.name, &scene_entity.group);
        for (insert, value) in components {
            insert(registry, entity, value);
        }
        by_name.insert(scene_entity.name.as_str(), entity);
        spawned.push(entity);
    }

    // Second pass: rebuild the tree, children in sibling order.
    for scene_entity in &data.entities {
        let Some(first) = relationships
            .get(scene_entity.name.as_str())
            .and_then(|rel| rel.first_child.as_deref())
        else {
            continue;
        };
        let parent = by_name[scene_entity.name.as_str()];
        let mut visited = HashSet::new();
        let mut cursor = Some(first);
        while let Some(name) = cursor {
            if !visited.insert(name) {
                break;
            }
            registry.add_child(parent, by_name[name]);
            cursor = relationships.get(name).and_then(|rel| rel.next_sibling.as_deref());
        }
    }
    // Children the sibling chains missed still know their parent.
    for scene_entity in &data.entities {
        let child = by_name[scene_entity.name.as_str()];
        if let Some(parent) = relationships
            .get(scene_entity.name.as_str())
            .and_then(|rel| rel.parent.as_deref())
            .map(|name| by_name[name])
        {
            if registry.parent(child) != Some(parent) {
                registry.add_child(parent, child);
            }
        }
    }

    log::info!("scene: loaded {} entities", spawned.len());
    Ok(spawned)
}

pub fn save_scene_to_file(registry: &Registry, scenes: &SceneRegistry, path: impl AsRef<Path>) -> Result<(), SceneError> {
    let data = save_scene(registry, scenes);
    let json = serde_json::to_string_pretty(&data)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_scene_from_file(
    registry: &mut Registry,
    scenes: &SceneRegistry,
    path: impl AsRef<Path>,
) -> Result<Vec<Entity>, SceneError> {
    let json = std::fs::read_to_string(path)?;
    let data: SceneData = serde_json::from_str(&json)?;
    load_scene(registry, scenes, &data)
}

// ── Scene Switching ──────────────────────────────────────────────────────

/// Tags an entity as belonging to a named scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneMarker(pub String);

/// Load a document and tag every new entity with `scene_name`.
pub fn load_scene_tagged(
    registry: &mut Registry,
    scenes: &SceneRegistry,
    data: &SceneData,
    scene_name: &str,
) -> Result<Vec<Entity>, SceneError> {
    let entities = load_scene(registry, scenes, data)?;
    for &entity in &entities {
        registry.add_or_replace(entity, SceneMarker(scene_name.to_string()));
    }
    Ok(entities)
}

/// Destroy every entity tagged with `scene_name`, with its subtree.
/// Returns the destroyed names.
pub fn unload_scene(registry: &mut Registry, scene_name: &str) -> Vec<String> {
    let mut tagged = Vec::new();
    registry.query::<(&SceneMarker,)>(|entity, (marker,)| {
        if marker.0 == scene_name {
            tagged.push(entity);
        }
    });

    let mut removed = Vec::new();
    for entity in tagged {
        // May already be gone with an earlier subtree.
        if registry.is_alive(entity) {
            removed.extend(registry.remove_and_destroy(entity));
        }
    }
    removed
}

/// Unload an old scene and load a new one.
pub fn switch_scene(
    registry: &mut Registry,
    scenes: &SceneRegistry,
    old_name: &str,
    new_data: &SceneData,
    new_name: &str,
) -> Result<Vec<Entity>, SceneError> {
    unload_scene(registry, old_name);
    load_scene_tagged(registry, scenes, new_data, new_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Health(u32);

    fn test_scenes() -> SceneRegistry {
        let mut scenes = SceneRegistry::with_engine_components();
        scenes.register::<Health>("health");
        scenes
    }

    fn entity(name: &str, components: Value) -> SceneEntity {
        SceneEntity {
            name: name.to_string(),
            group: String::new(),
            components: serde_json::from_value(components).unwrap(),
        }
    }

    #[test]
    fn round_trip_simple() {
        let scenes = test_scenes();
        let mut registry = Registry::new();
        let a = registry.create_entity("hero", "players");
        registry.add(a, Transform::from_xy(1.0, 2.0));
        registry.add(a, Health(100));
        let b = registry.create_entity("label", "");
        registry.add(b, Text::new("hello"));

        let data = save_scene(&registry, &scenes);
        assert_eq!(data.entities.len(), 2);
        assert_eq!(data.entities[0].group, "players");
        assert!(data.entities[0].components.contains_key("transform"));
        assert!(!data.entities[0].components.contains_key(RELATIONSHIP_KEY));

        registry.clear();
        let loaded = load_scene(&mut registry, &scenes, &data).unwrap();
        assert_eq!(loaded.len(), 2);

        let hero = registry.named("hero");
        assert_eq!(registry.get::<Health>(hero), &Health(100));
        assert_eq!(registry.get::<Transform>(hero), &Transform::from_xy(1.0, 2.0));
        assert_eq!(registry.group_of(hero), Some("players"));
        assert_eq!(registry.get::<Text>(registry.named("label")).text, "hello");
    }

    #[test]
    fn hierarchy_round_trips_by_name() {
        let scenes = test_scenes();
        let mut registry = Registry::new();
        let ship = registry.create_entity("ship", "");
        let left = registry.create_entity("left", "");
        let right = registry.create_entity("right", "");
        let gun = registry.create_entity("gun", "");
        registry.add_child(ship, left);
        registry.add_child(ship, right);
        registry.add_child(right, gun);

        let data = save_scene(&registry, &scenes);
        let ship_doc = &data.entities[0];
        assert_eq!(ship_doc.components[RELATIONSHIP_KEY], json!({ "firstChild": "left" }));
        let left_doc = &data.entities[1];
        assert_eq!(
            left_doc.components[RELATIONSHIP_KEY],
            json!({ "parent": "ship", "nextSibling": "right" })
        );

        registry.clear();
        load_scene(&mut registry, &scenes, &data).unwrap();
        let ship = registry.named("ship");
        let kids: Vec<_> = registry
            .children(ship)
            .into_iter()
            .map(|e| registry.name_of(e).unwrap().to_string())
            .collect();
        assert_eq!(kids, vec!["left", "right"]);
        assert_eq!(registry.parent(registry.named("gun")), Some(registry.named("right")));
    }

    #[test]
    fn loading_twice_suffixes_names_but_links_stay_local() {
        let scenes = test_scenes();
        let data = SceneData {
            entities: vec![
                entity("door", json!({ "relationship": { "firstChild": "knob" } })),
                entity("knob", json!({ "relationship": { "parent": "door" } })),
            ],
        };
        let mut registry = Registry::new();
        let first = load_scene(&mut registry, &scenes, &data).unwrap();
        let second = load_scene(&mut registry, &scenes, &data).unwrap();

        assert_eq!(registry.name_of(second[0]), Some("door_1"));
        assert_eq!(registry.children(first[0]), vec![first[1]]);
        assert_eq!(registry.children(second[0]), vec![second[1]]);
    }

    #[test]
    fn unknown_link_is_rejected_before_any_entity_exists() {
        let scenes = test_scenes();
        let data = SceneData {
            entities: vec![entity("orphan", json!({ "relationship": { "parent": "ghost" } }))],
        };
        let mut registry = Registry::new();
        let err = load_scene(&mut registry, &scenes, &data).unwrap_err();
        assert!(matches!(err, SceneError::UnknownEntity { ref name, .. } if name == "ghost"));
        assert_eq!(registry.entity_count(), 0);
    }

    #[test]
    fn invalid_component_and_duplicate_name() {
        let scenes = test_scenes();
        let mut registry = Registry::new();

        let bad = SceneData {
            entities: vec![entity("a", json!({ "health": "lots" }))],
        };
        assert!(matches!(
            load_scene(&mut registry, &scenes, &bad),
            Err(SceneError::Component { ref key, .. }) if key == "health"
        ));

        let dup = SceneData {
            entities: vec![entity("a", json!({})), entity("a", json!({}))],
        };
        assert!(matches!(load_scene(&mut registry, &scenes, &dup), Err(SceneError::DuplicateName(_))));
        assert_eq!(registry.entity_count(), 0);
    }

    #[test]
    fn unknown_component_keys_are_skipped() {
        let scenes = test_scenes();
        let mut registry = Registry::new();
        let data = SceneData {
            entities: vec![entity("a", json!({ "jetpack": { "fuel": 3 }, "health": 7 }))],
        };
        let loaded = load_scene(&mut registry, &scenes, &data).unwrap();
        assert_eq!(registry.get::<Health>(loaded[0]), &Health(7));
    }

    #[test]
    fn file_round_trip() {
        let scenes = test_scenes();
        let mut registry = Registry::new();
        let e = registry.create_entity("crate", "props");
        registry.add(e, BoxCollider::default());

        let path = std::env::temp_dir().join(format!("tarn_scene_{}.json", std::process::id()));
        save_scene_to_file(&registry, &scenes, &path).unwrap();
        registry.clear();
        let loaded = load_scene_from_file(&mut registry, &scenes, &path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.len(), 1);
        assert!(registry.has::<BoxCollider>(loaded[0]));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let scenes = test_scenes();
        let mut registry = Registry::new();
        let err = load_scene_from_file(&mut registry, &scenes, "/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SceneError::Io(_)));
    }

    #[test]
    fn scene_tagging_and_switch() {
        let scenes = test_scenes();
        let mut registry = Registry::new();
        let menu = SceneData {
            entities: vec![entity("title", json!({})), entity("start", json!({}))],
        };
        let level = SceneData {
            entities: vec![entity("player", json!({ "health": 3 }))],
        };

        load_scene_tagged(&mut registry, &scenes, &menu, "menu").unwrap();
        registry.create_entity("camera", "");
        assert_eq!(registry.entity_count(), 3);

        let spawned = switch_scene(&mut registry, &scenes, "menu", &level, "level").unwrap();
        assert_eq!(spawned.len(), 1);
        assert_eq!(registry.entity_count(), 2);
        assert!(registry.find_by_name("title").is_none());
        assert!(registry.find_by_name("camera").is_some());
    }

    #[test]
    fn keys_and_defaults() {
        let scenes = test_scenes();
        assert_eq!(scenes.component_keys()[0], "transform");
        assert_eq!(scenes.default_value("health"), Some(json!(0)));
        assert_eq!(
            scenes.default_value("boxCollider"),
            Some(json!({ "size": [16.0, 16.0], "offset": [0.0, 0.0], "trigger": false }))
        );
        assert!(scenes.default_value("nope").is_none());
    }
}
