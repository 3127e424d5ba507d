use showroom::animate;
use showroom::config::AppConfig;
use showroom::scene::{Light, Stage, Transform3D};
use showroom::time::FrameClock;

fn switchable_bases(stage: &mut Stage) -> Vec<(String, f32)> {
    let mut query = stage.world.query::<&Light>();
    query
        .iter(&stage.world)
        .filter(|light| light.switchable)
        .map(|light| (light.name.to_string(), light.base_intensity))
        .collect()
}

#[test]
fn lights_toggle_round_trips_after_the_pulses_ran() {
    let mut stage = Stage::new(&AppConfig::default());
    let before = switchable_bases(&mut stage);
    assert!(!before.is_empty(), "the rig has switchable lights");

    // Run the pulse step so intensities wander off their bases, then toggle.
    for step in 1..=47 {
        animate::advance(&mut stage, FrameClock::at(step as f32 / 60.0, 1.0 / 60.0));
    }
    assert!(!stage.toggle_lights(), "first toggle disables");
    for step in 48..=90 {
        animate::advance(&mut stage, FrameClock::at(step as f32 / 60.0, 1.0 / 60.0));
    }
    {
        let mut query = stage.world.query::<&Light>();
        for light in query.iter(&stage.world).filter(|light| light.switchable) {
            assert_eq!(light.intensity, 0.0, "{} must stay dark while disabled", light.name);
        }
    }

    assert!(stage.toggle_lights(), "second toggle re-enables");
    let after = switchable_bases(&mut stage);
    assert_eq!(after, before, "re-enabling restores the pre-toggle magnitudes exactly");
}

#[test]
fn pulses_desynchronize_across_the_rig() {
    let mut stage = Stage::new(&AppConfig::default());
    let mut frequencies: Vec<f32> = {
        let mut query = stage.world.query::<&Light>();
        query.iter(&stage.world).filter_map(|light| light.pulse.map(|p| p.frequency)).collect()
    };
    frequencies.sort_by(f32::total_cmp);
    let len_before = frequencies.len();
    frequencies.dedup();
    assert_eq!(frequencies.len(), len_before, "every pulsing light carries its own frequency");
}

#[test]
fn the_orbiting_light_rides_its_circle() {
    let mut stage = Stage::new(&AppConfig::default());
    let mut positions = Vec::new();
    for &t in &[0.5f32, 2.0, 5.5] {
        animate::advance(&mut stage, FrameClock::at(t, 1.0 / 60.0));
        let mut query = stage.world.query::<(&Transform3D, &Light)>();
        for (transform, light) in query.iter(&stage.world) {
            let Some(orbit) = light.orbit else { continue };
            let radial = (transform.translation.x * transform.translation.x
                + transform.translation.z * transform.translation.z)
                .sqrt();
            assert!((radial - orbit.radius).abs() < 1e-3, "orbit radius must stay fixed");
            assert!((transform.translation.y - orbit.height).abs() < 1e-5);
            positions.push(transform.translation);
        }
    }
    assert!(positions.len() >= 3, "the rig has an orbiting light");
    assert_ne!(positions[0], positions[1], "the light must actually move over time");
}

#[test]
fn intensity_pulses_center_on_the_base() {
    let mut stage = Stage::new(&AppConfig::default());
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for step in 0..600 {
        animate::advance(&mut stage, FrameClock::at(step as f32 / 60.0, 1.0 / 60.0));
        let mut query = stage.world.query::<&Light>();
        for light in query.iter(&stage.world) {
            if light.name == "accent" {
                min = min.min(light.intensity);
                max = max.max(light.intensity);
            }
        }
    }
    assert!(min < 2.0 && max > 2.0, "the accent pulse swings around its base of 2.0");
    assert!(min >= 0.0, "intensities never go negative");
}
