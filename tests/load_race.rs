use showroom::config::AppConfig;
use showroom::loader::{CarLoader, CarSource};
use showroom::material_registry::MaterialRegistry;
use showroom::scene::Stage;
use std::time::{Duration, Instant};

fn resolve(loader: &mut CarLoader) -> CarSource {
    let started = Instant::now();
    loop {
        if let Some(outcome) = loader.poll(Instant::now()) {
            return outcome;
        }
        assert!(started.elapsed() < Duration::from_secs(10), "load race never resolved");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn missing_model_resolves_to_the_fallback() {
    let mut loader = CarLoader::spawn("does/not/exist.glb", Duration::from_secs(30));
    match resolve(&mut loader) {
        CarSource::Fallback(car) => assert!(!car.parts.is_empty()),
        CarSource::Loaded(_) => panic!("a missing file must not produce a loaded car"),
    }
    assert!(loader.progress_text().is_none(), "the indicator hides once the outcome lands");
}

#[test]
fn expired_deadline_wins_and_the_late_result_is_dropped() {
    // Zero deadline: the fallback wins before the worker can possibly finish.
    let mut loader = CarLoader::spawn("does/not/exist.glb", Duration::ZERO);
    let outcome = resolve(&mut loader);
    assert!(matches!(outcome, CarSource::Fallback(_)), "the deadline should fire first");

    let mut stage = Stage::new(&AppConfig::default());
    let mut materials = MaterialRegistry::new();
    stage.spawn_car(outcome, 1.0, &mut materials);

    // Keep draining: the worker's own (error) result arrives later and must
    // never produce a second outcome.
    let drain_until = Instant::now() + Duration::from_secs(2);
    while Instant::now() < drain_until {
        assert!(loader.poll(Instant::now()).is_none(), "the race must resolve exactly once");
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(loader.is_decided());
    assert!(stage.has_car());
}

#[test]
fn exactly_one_car_survives_duplicate_outcomes() {
    let mut stage = Stage::new(&AppConfig::default());
    let mut materials = MaterialRegistry::new();

    let mut first = CarLoader::spawn("does/not/exist.glb", Duration::ZERO);
    stage.spawn_car(resolve(&mut first), 1.0, &mut materials);

    // A second outcome (from a buggy caller) must not replace the car.
    let mut second = CarLoader::spawn("does/not/exist.glb", Duration::ZERO);
    stage.spawn_car(resolve(&mut second), 1.0, &mut materials);

    use bevy_ecs::prelude::*;
    use showroom::scene::CarRoot;
    let mut roots = stage.world.query_filtered::<Entity, With<CarRoot>>();
    assert_eq!(roots.iter(&stage.world).count(), 1, "the load outcome is irrevocable");
}
