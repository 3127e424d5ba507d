use showroom::animate::{self, figure_eight_heading, figure_eight_position, idle_bob_height};
use showroom::config::{AppConfig, DriveVariant};
use showroom::fallback::build_fallback_car;
use showroom::loader::CarSource;
use showroom::material_registry::MaterialRegistry;
use showroom::scene::{Stage, Transform3D};
use showroom::time::FrameClock;

fn stage_with_car(config: &AppConfig) -> (Stage, MaterialRegistry) {
    let mut stage = Stage::new(config);
    let mut materials = MaterialRegistry::new();
    stage.spawn_car(CarSource::Fallback(build_fallback_car()), 1.0, &mut materials);
    (stage, materials)
}

#[test]
fn figure_eight_heading_regression_at_zero() {
    let (radius, speed) = (6.0, 0.6);
    let expected = (radius * speed * 0.5f32).atan2(0.0) + std::f32::consts::PI;
    assert!(
        (figure_eight_heading(0.0, radius, speed) - expected).abs() < 1e-6,
        "heading at t=0 must equal atan2(R*speed*0.5, 0) + pi"
    );
}

#[test]
fn drive_pose_follows_the_figure_eight() {
    let (mut stage, _materials) = stage_with_car(&AppConfig::default());
    assert!(stage.toggle_driving(0.0), "entering driving mode");

    for step in 1..=120 {
        let t = step as f32 / 60.0;
        animate::advance(&mut stage, FrameClock::at(t, 1.0 / 60.0));
        let pos = stage.car_position().expect("car position");
        let expected = figure_eight_position(t, 6.0, 0.6);
        assert!((pos.x - expected.x).abs() < 1e-4, "x off the curve at t={t}");
        assert!((pos.z - expected.z).abs() < 1e-4, "z off the curve at t={t}");
    }
}

#[test]
fn leaving_driving_mode_restores_the_entry_snapshot() {
    let (mut stage, _materials) = stage_with_car(&AppConfig::default());
    let root = stage.car_root().expect("car root");

    // Let the idle float move the car somewhere non-trivial first.
    animate::advance(&mut stage, FrameClock::at(0.8, 1.0 / 60.0));
    let entry = *stage.world.get::<Transform3D>(root).expect("car transform");

    assert!(stage.toggle_driving(0.8));
    for step in 1..=90 {
        let t = 0.8 + step as f32 / 60.0;
        animate::advance(&mut stage, FrameClock::at(t, 1.0 / 60.0));
    }
    let driven = *stage.world.get::<Transform3D>(root).expect("car transform");
    assert_ne!(driven, entry, "the drive must actually move the car");

    assert!(!stage.toggle_driving(2.3));
    let restored = *stage.world.get::<Transform3D>(root).expect("car transform");
    assert_eq!(restored, entry, "exit restores the snapshot verbatim, no drift");
}

#[test]
fn idle_bob_is_suppressed_while_driving() {
    let (mut stage, _materials) = stage_with_car(&AppConfig::default());
    stage.toggle_driving(0.0);
    let t = 2.1;
    animate::advance(&mut stage, FrameClock::at(t, 1.0 / 60.0));
    let pos = stage.car_position().expect("car position");
    let bob = idle_bob_height(t, -1.0, 0.12, 1.0);
    assert!((pos.y - bob).abs() > 1e-4, "driving height must not come from the idle bob");
}

#[test]
fn straight_sweep_variant_moves_along_the_lane() {
    let mut config = AppConfig::default();
    config.drive.variant = DriveVariant::StraightSweep;
    let (mut stage, _materials) = stage_with_car(&config);
    stage.toggle_driving(0.0);

    animate::advance(&mut stage, FrameClock::at(0.5, 1.0 / 60.0));
    let early = stage.car_position().expect("car position");
    animate::advance(&mut stage, FrameClock::at(1.5, 1.0 / 60.0));
    let late = stage.car_position().expect("car position");
    assert!(late.x > early.x, "the sweep advances along x");
    assert!((late.z - early.z).abs() < 1e-5, "the lane keeps its z");
}

#[test]
fn pose_replays_identically_for_the_same_timestamp() {
    let config = AppConfig::default();
    let (mut a, _ma) = stage_with_car(&config);
    let (mut b, _mb) = stage_with_car(&config);
    a.toggle_driving(0.0);
    b.toggle_driving(0.0);
    for stage in [&mut a, &mut b] {
        animate::advance(stage, FrameClock::at(3.7, 1.0 / 60.0));
    }
    let pa = a.car_position().expect("car position");
    let pb = b.car_position().expect("car position");
    assert_eq!(pa, pb, "the drive pose is a pure function of elapsed time");
}
