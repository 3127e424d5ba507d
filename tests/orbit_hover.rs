use glam::Vec3;
use showroom::camera3d::OrbitRig;
use showroom::config::AppConfig;
use showroom::scene::{AnimationState, Stage};

#[test]
fn hovering_suspends_auto_rotate_without_touching_the_preference() {
    let mut rig = OrbitRig::new(Vec3::ZERO, 7.0, 3.0, 15.0);
    assert!(rig.auto_rotate, "auto-rotate defaults on");

    let resting_yaw = rig.yaw_radians;
    rig.update(1.0 / 60.0);
    assert_ne!(rig.yaw_radians, resting_yaw, "auto-rotation turns the rig");

    rig.set_hovered(true);
    let hovered_yaw = rig.yaw_radians;
    for _ in 0..60 {
        rig.update(1.0 / 60.0);
    }
    assert_eq!(rig.yaw_radians, hovered_yaw, "hover pins the rig in place");
    assert!(rig.auto_rotate, "the persisted preference survives the hover");

    rig.set_hovered(false);
    rig.update(1.0 / 60.0);
    assert_ne!(rig.yaw_radians, hovered_yaw, "leaving resumes the preference");
}

#[test]
fn hover_does_nothing_while_the_preference_is_off() {
    let mut rig = OrbitRig::new(Vec3::ZERO, 7.0, 3.0, 15.0);
    rig.auto_rotate = false;
    rig.set_hovered(true);
    rig.set_hovered(false);
    let yaw = rig.yaw_radians;
    rig.update(1.0 / 60.0);
    assert_eq!(rig.yaw_radians, yaw, "no preference, no rotation, hover or not");
}

#[test]
fn rotate_action_flips_the_persisted_preference() {
    let mut stage = Stage::new(&AppConfig::default());
    assert!(stage.world.resource::<AnimationState>().auto_rotate);
    assert!(!stage.toggle_auto_rotate());
    assert!(!stage.world.resource::<AnimationState>().auto_rotate);
    assert!(stage.toggle_auto_rotate());
    assert!(stage.world.resource::<AnimationState>().auto_rotate);
}
