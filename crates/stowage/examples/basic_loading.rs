//! Basic loading example.
//!
//! This example shows:
//! - Registering a custom decoder
//! - Loading assets synchronously and asynchronously
//! - Mounting a local bundle from disk
//! - Releasing references and watching the cache reclaim them
//!
//! Run with `RUST_LOG=debug` to see the cache's own logging.

use std::cell::Cell;
use std::rc::Rc;

use stowage::prelude::*;
use stowage::{DecodeContext, FileMounter, FileReader};

/// `key=value` settings file.
#[derive(Debug)]
struct Settings {
    entries: Vec<(String, String)>,
}

impl Asset for Settings {
    fn type_name() -> &'static str {
        "Settings"
    }
}

struct SettingsDecoder;

impl Decoder for SettingsDecoder {
    type Asset = Settings;

    fn extensions(&self) -> &[&str] {
        &["cfg"]
    }

    fn decode(&self, ctx: DecodeContext<'_>) -> LoadResult<Settings> {
        let text = std::str::from_utf8(ctx.bytes).map_err(|e| LoadError::Decode {
            key: ctx.key.to_string(),
            message: e.to_string(),
        })?;

        let entries = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Ok(Settings { entries })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    stowage_core::logging::init();

    let root = tempfile::tempdir()?;
    std::fs::write(root.path().join("game.cfg"), "difficulty = hard\nlives = 3\n")?;
    std::fs::write(root.path().join("motd.txt"), "Welcome back!")?;
    std::fs::create_dir_all(root.path().join("bundles"))?;
    std::fs::write(root.path().join("bundles/ui_7f3a"), b"packed ui archive")?;

    let mut manifest = Manifest::new().with_bundle_root(root.path().join("bundles"));
    manifest.add_asset("game.cfg");
    manifest.add_asset("motd.txt");
    manifest.add_bundle(
        BundleDescriptor::new("ui", "7f3a", 17, 0),
        ["ui/title.png", "ui/menu.png"],
    );

    let mut cache = ResourceCache::new()
        .with_resolver(manifest)
        .with_reader(FileReader::new(root.path()))
        .with_mounter(FileMounter::new());
    cache.register_decoder(SettingsDecoder);

    // Synchronous: done before the call returns.
    let settings = cache.load_asset::<Settings>("game.cfg")?;
    if let Some(settings) = cache.asset(settings) {
        for (key, value) in &settings.entries {
            println!("setting {} = {}", key, value);
        }
    }

    // Asynchronous: finished by a later tick.
    let finished = Rc::new(Cell::new(false));
    let flag = finished.clone();
    let motd = cache.load_asset_async::<String>(
        "motd.txt",
        Some(Box::new(move |loaded: &Loadable| {
            println!(
                "{} finished after {} frame(s)",
                loaded.key(),
                loaded.frames().unwrap_or_default()
            );
            flag.set(true);
        })),
    )?;
    let ui = cache.load_bundle_async("ui/title.png", None)?;

    while !finished.get() || !cache.is_done(ui) {
        stowage_core::profiling::new_frame();
        cache.tick();
    }
    if let Some(text) = cache.asset(motd) {
        println!("motd: {}", text);
    }
    println!(
        "bundle {:?} mounted as {:?}",
        cache.status(ui),
        cache.mounted_archive("ui")
    );

    cache.release(settings);
    cache.release(motd);
    cache.release(ui);
    cache.tick();

    for event in cache.drain_events() {
        println!("event: {:?}", event);
    }
    println!("cache empty: {}", cache.is_empty());
    Ok(())
}
