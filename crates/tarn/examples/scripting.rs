//! Scripting — drive the registry and events from Lua.
//!
//! Registers a game component next to the engine ones, then runs a script
//! that spawns entities, walks a view and listens for an engine event.
//!
//! Run with: `cargo run -p tarn --example scripting`

use serde::{Deserialize, Serialize};
use tarn::prelude::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Health {
    current: i32,
    max: i32,
}

impl Reflect for Health {
    const TYPE_NAME: &'static str = "Health";
}

const SCRIPT: &str = r#"
for i = 1, 3 do
    local e = Registry.createEntity("goblin", "enemies")
    e:add_component(Transform, { position = { i * 10, 0 } })
    e:add_component(Health { current = 10 * i, max = 30 })
end

Registry.getEntities(Health, Transform):forEach(function(e)
    local hp = e:get_component(Health)
    print(e:name() .. " hp " .. hp.current .. "/" .. hp.max)
end)

EventDispatcher.add_handler(function(ev)
    print("script saw reload of " .. ev.name)
end, AssetReloaded)
"#;

fn main() -> tarn::Result<()> {
    env_logger::init();

    let mut meta = MetaRegistry::new();
    meta.register_component::<Health>()?;
    let mut core = Core::with_bridge(CoreConfig::default(), meta)?;

    core.scripts()?.exec(SCRIPT)?;
    println!("{} entities after script", core.registry().entity_count());

    core.events_mut().enqueue(AssetReloaded {
        name: "goblin.png".into(),
        path: "assets/goblin.png".into(),
    });
    core.update();
    Ok(())
}
