//! End-to-end behavior across the registry, bridge, hierarchy, events and
//! scene format.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tarn::prelude::*;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Position {
    x: f32,
    y: f32,
}

impl Reflect for Position {
    const TYPE_NAME: &'static str = "Position";
}

fn quiet_core() -> Core {
    let mut meta = MetaRegistry::new();
    meta.register_component::<Position>().unwrap();
    Core::with_bridge(
        CoreConfig {
            hot_reload: false,
            ..CoreConfig::default()
        },
        meta,
    )
    .unwrap()
}

#[test]
fn bridge_view_and_recursive_removal() {
    let core = quiet_core();
    let meta = core.meta();
    let mut registry = core.registry_mut();

    let a = registry.create_entity("A", "");
    let position = meta.find_by_name("Position").unwrap();
    let added = meta.invoke(
        position,
        op::ADD,
        MetaTarget::Entity(&mut registry, a),
        vec![MetaAny::new(json!({ "x": 1.0, "y": 2.0 }))],
    );
    assert_eq!(added.downcast_ref::<Position>(), Some(&Position { x: 1.0, y: 2.0 }));

    let b = registry.create_entity("B", "");
    assert!(registry.add_child(a, b));

    let view = meta.build_view(&[position]);
    let mut visited = Vec::new();
    view.each(&registry, |entity| visited.push(entity));
    assert_eq!(visited, vec![a]);

    let removed = registry.remove_and_destroy(a);
    assert_eq!(removed, vec!["B".to_string(), "A".to_string()]);
    assert!(!registry.has::<Position>(a));
    assert!(!registry.is_alive(b));
    assert_eq!(registry.entity_count(), 0);
}

#[test]
fn bridge_get_returns_what_add_stored() {
    let core = quiet_core();
    let mut registry = core.registry_mut();
    let e = registry.create_entity("", "");
    assert_eq!(registry.name_of(e), Some(DEFAULT_ENTITY_NAME));

    let id = Position::TYPE_ID;
    core.meta().invoke(
        id,
        op::ADD,
        MetaTarget::Entity(&mut registry, e),
        vec![MetaAny::new(Position { x: 5.0, y: -1.0 })],
    );
    let got = core.meta().invoke(id, op::GET, MetaTarget::Entity(&mut registry, e), Vec::new());
    assert_eq!(got.take::<Position>().ok(), Some(Position { x: 5.0, y: -1.0 }));
}

#[test]
fn unknown_type_id_is_a_soft_failure() {
    let core = quiet_core();
    let mut registry = core.registry_mut();
    let e = registry.create_entity("e", "");
    let result = core.meta().invoke(
        RuntimeTypeId::from_name("NotRegistered"),
        op::ADD,
        MetaTarget::Entity(&mut registry, e),
        Vec::new(),
    );
    assert!(result.is_empty());
    assert!(!result.as_bool());
    assert_eq!(core.meta().build_view(&[RuntimeTypeId(1)]).count(&registry), 0);
}

#[test]
fn destroy_leaves_no_dangling_links() {
    let mut registry = Registry::new();
    let root = registry.create_entity("root", "");
    let kids: Vec<_> = (0..3)
        .map(|i| {
            let kid = registry.create_entity(&format!("kid{i}"), "");
            registry.add_child(root, kid);
            kid
        })
        .collect();
    let grandkid = registry.create_entity("grandkid", "");
    registry.add_child(kids[1], grandkid);

    assert!(registry.destroy(kids[1]));
    assert_eq!(registry.children(root), vec![kids[0], kids[2]]);
    assert_eq!(registry.parent(grandkid), None);

    for entity in registry.entities() {
        let rel = registry.get::<Relationship>(entity);
        for link in [rel.parent, rel.first_child, rel.prev_sibling, rel.next_sibling]
            .into_iter()
            .flatten()
        {
            assert!(registry.is_alive(link));
        }
    }
}

#[test]
fn duplicated_subtree_survives_a_scene_round_trip() {
    let scenes = SceneRegistry::with_engine_components();
    let mut registry = Registry::new();
    let ship = registry
        .spawn("ship", "fleet")
        .insert(Transform::from_xy(10.0, 0.0))
        .id();
    let turret = registry
        .spawn("turret", "fleet")
        .insert(Sprite::new("turret.png"))
        .id();
    registry.add_child(ship, turret);
    let copy = registry.duplicate_recursive(ship, None).unwrap();
    assert_ne!(registry.name_of(copy), Some("ship"));

    let data = scenes.save(&registry);
    let json = serde_json::to_string(&data).unwrap();
    let reparsed: SceneData = serde_json::from_str(&json).unwrap();

    let mut restored = Registry::new();
    scenes.load(&mut restored, &reparsed).unwrap();
    assert_eq!(restored.entity_count(), 4);
    assert_eq!(restored.roots().len(), 2);
    for root in restored.roots() {
        let children = restored.children(root);
        assert_eq!(children.len(), 1);
        assert_eq!(restored.get::<Sprite>(children[0]).texture, "turret.png");
        assert_eq!(restored.get::<Transform>(root).position, Vec2::new(10.0, 0.0));
    }
}

#[test]
fn events_delivered_in_order_on_update() {
    let mut core = quiet_core();
    let log = Rc::new(RefCell::new(Vec::new()));
    for tag in ["h1", "h2"] {
        let log = Rc::clone(&log);
        core.events_mut()
            .subscribe(move |e: &AssetReloaded| log.borrow_mut().push(format!("{tag}:{}", e.name)));
    }
    for name in ["a", "b", "c"] {
        core.events_mut().enqueue(AssetReloaded {
            name: name.into(),
            path: String::new(),
        });
    }
    assert_eq!(core.update(), 3);
    assert_eq!(
        *log.borrow(),
        vec!["h1:a", "h2:a", "h1:b", "h2:b", "h1:c", "h2:c"]
    );
}

#[cfg(feature = "hot-reload")]
#[test]
fn marked_asset_becomes_an_event_on_update() {
    let path = std::env::temp_dir().join(format!("tarn_scenario_{}.txt", std::process::id()));
    std::fs::write(&path, "x").unwrap();

    let mut core = Core::new(CoreConfig::default()).unwrap();
    {
        let mut registry = core.registry_mut();
        let watcher = registry.get_context_mut::<AssetWatcher>();
        watcher.watch("note", &path).unwrap();
        watcher.mark_dirty(&path);
    }
    let names = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&names);
    core.events_mut()
        .subscribe(move |e: &AssetReloaded| sink.borrow_mut().push(e.name.clone()));

    // Default debounce is 100ms.
    std::thread::sleep(std::time::Duration::from_millis(150));
    core.update();
    assert_eq!(*names.borrow(), vec!["note"]);

    let _ = std::fs::remove_file(&path);
}

#[cfg(feature = "scripting")]
#[test]
fn scenario_from_lua() {
    let mut core = quiet_core();
    let removed: Vec<String> = core
        .scripts()
        .unwrap()
        .eval(
            r#"
            local a = Registry.createEntity("A")
            a:add_component(Position, { x = 1, y = 2 })
            local b = Registry.createEntity("B")
            a:add_child(b)

            local visited = {}
            Registry.getEntities(Position):forEach(function(e) visited[#visited + 1] = e:name() end)
            assert(#visited == 1 and visited[1] == "A")
            return a:kill_recursive()
            "#,
        )
        .unwrap();
    assert_eq!(removed, vec!["B", "A"]);
    assert_eq!(core.registry().entity_count(), 0);
}
