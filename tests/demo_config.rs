// The shipped demo config must parse, validate and spawn every archetype.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use walker_sandbox::sandbox::assets::{ManifestLoader, find_limbs};
use walker_sandbox::sandbox::audio::NullAudio;
use walker_sandbox::sandbox::names::MemoryStore;
use walker_sandbox::sandbox::{Command, SandboxConfig, Session};

fn demo_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demo")
}

#[test]
fn demo_config_spawns_every_model() {
    let mut config = SandboxConfig::load(&demo_dir().join("sandbox.toml")).unwrap();
    config.seed = Some(9);
    assert_eq!(config.models.len(), 2);
    assert_eq!(config.arena.floors.len(), 2);

    let mut session = Session::new(
        &config,
        Arc::new(ManifestLoader::new(demo_dir())),
        Arc::new(MemoryStore::default()),
        Box::new(NullAudio),
    )
    .unwrap();
    assert_eq!(session.population().arena().floor, Some(0));
    assert_eq!(session.population().arena().half, 11.0);
    assert_eq!(session.population().obstacles().len(), 4);

    session.send(Command::Spawn);
    session.send(Command::Spawn);
    assert_eq!(session.finish_loads(Duration::from_secs(5)), 2);

    let entries = session.population().entries();
    let names: Vec<&str> = entries.iter().map(|(w, _)| w.name()).collect();
    assert_eq!(names, vec!["Lantern Bot", "Ghost"]);

    let lantern = entries[0].1.unwrap();
    assert_eq!(lantern.model.parts.len(), 6);
    let limbs = find_limbs(&lantern.model);
    assert_eq!((limbs.arms.len(), limbs.legs.len()), (2, 2));
    assert!((lantern.tag_height - (1.3 + config.walker.tag_margin)).abs() < 1e-4);
}
