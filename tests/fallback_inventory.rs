use showroom::config::AppConfig;
use showroom::fallback::{build_fallback_car, PartKind};
use showroom::loader::CarSource;
use showroom::material_registry::MaterialRegistry;
use showroom::scene::{CarPart, Stage};

#[test]
fn the_procedural_car_carries_the_full_inventory() {
    let car = build_fallback_car();
    assert_eq!(car.count(PartKind::Wheel), 4, "four wheels");
    assert_eq!(car.count(PartKind::Rim), 4, "one rim per wheel");
    assert_eq!(car.count(PartKind::Headlight), 2, "two headlights");
    assert_eq!(car.count(PartKind::Body), 1);
    assert_eq!(car.count(PartKind::Cabin), 1);
    assert_eq!(car.count(PartKind::Spoiler), 1);
}

#[test]
fn spawning_the_fallback_mirrors_every_part_into_the_arena() {
    let blueprint = build_fallback_car();
    let part_count = blueprint.parts.len();
    let root_offset = blueprint.root_offset;

    let mut stage = Stage::new(&AppConfig::default());
    let mut materials = MaterialRegistry::new();
    stage.spawn_car(CarSource::Fallback(blueprint), 1.0, &mut materials);

    let mut parts = stage.world.query::<&CarPart>();
    assert_eq!(parts.iter(&stage.world).count(), part_count);
    let pos = stage.car_position().expect("car root position");
    assert_eq!(pos, root_offset, "the assembly sits at its blueprint offset");
}

#[test]
fn fallback_headlights_glow() {
    let car = build_fallback_car();
    for part in car.parts.iter().filter(|part| part.kind == PartKind::Headlight) {
        assert!(
            part.material.emissive_factor.iter().any(|&c| c > 0.0),
            "headlights need an emissive material"
        );
    }
}
