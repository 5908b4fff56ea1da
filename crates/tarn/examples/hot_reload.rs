//! Hot-reload — watch a file and react to edits.
//!
//! Writes a small text asset to the temp directory, watches it through a
//! `Core`, then rewrites it. The watcher thread flags the file; the next
//! `Core::update` turns the flag into an `AssetReloaded` event.
//!
//! Run with: `cargo run -p tarn --example hot_reload`

use std::time::{Duration, Instant};

use tarn::prelude::*;

fn main() -> tarn::Result<()> {
    env_logger::init();

    let path = std::env::temp_dir().join("tarn_hot_reload.txt");
    std::fs::write(&path, "version 1")?;

    let mut core = Core::new(CoreConfig::default().watching("greeting", &path))?;
    core.events_mut().subscribe(|event: &AssetReloaded| {
        let contents = std::fs::read_to_string(&event.path).unwrap_or_default();
        println!("'{}' reloaded: {contents:?}", event.name);
    });

    std::fs::write(&path, "version 2")?;

    // Debounce is 100ms; give the watcher up to two seconds.
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if core.update() > 0 {
            break;
        }
        std::thread::sleep(Duration::from_millis(16));
    }

    std::fs::remove_file(&path)?;
    Ok(())
}
