use crate::config::DriveVariant;
use crate::scene::{
    AnimationState, CarClips, CarPart, DriveSettings, IdleMotion, Light, LightOrbit, LightPulse,
    ParticleField, Stage, Transform3D,
};
use crate::time::FrameClock;
use glam::{Quat, Vec3};

const DRIVE_ROLL_RADIANS: f32 = 0.06;
const SWEEP_SWAY_AMPLITUDE: f32 = 0.05;
const SWEEP_SWAY_FREQUENCY: f32 = 10.0;
const SWEEP_ROLL_FREQUENCY: f32 = 5.0;
const SWEEP_ROLL_RADIANS: f32 = 0.035;

/// One tick of the showcase. Steps run in a fixed order and each one
/// short-circuits when its precondition is absent; a partially configured
/// stage is normal, not an error.
pub fn advance(stage: &mut Stage, clock: FrameClock) {
    advance_mixer(stage, clock.delta);
    update_car(stage, clock);
    update_lights(stage, clock.elapsed);
    update_particles(stage, clock);
}

// ---------- Pure time functions ----------

/// Idle float height. Pure in `t`: replaying a timestamp replays the pose.
pub fn idle_bob_height(t: f32, baseline: f32, amplitude: f32, frequency: f32) -> f32 {
    baseline + amplitude * (frequency * t).sin()
}

/// Figure-eight ground track: `x = R sin u`, `z = R sin u cos u`.
pub fn figure_eight_position(t: f32, radius: f32, speed: f32) -> Vec3 {
    let u = speed * t;
    Vec3::new(radius * u.sin(), 0.0, radius * u.sin() * u.cos())
}

/// Heading from the path's velocity components via atan2. At `t = 0` this is
/// `atan2(R·speed·0.5, 0) + π`.
pub fn figure_eight_heading(t: f32, radius: f32, speed: f32) -> f32 {
    let u = speed * t;
    let lateral = 0.5 * radius * speed * (2.0 * u).cos();
    let forward = -radius * speed * u.sin();
    lateral.atan2(forward) + std::f32::consts::PI
}

/// Small roll keyed to the sign of the lateral acceleration.
pub fn figure_eight_roll(t: f32, speed: f32) -> f32 {
    let u = speed * t;
    -DRIVE_ROLL_RADIANS * u.sin().signum()
}

/// Straight sweep across the stage with a lateral sine sway, wrapping at the
/// far edge back to the start.
pub fn straight_sweep_position(t: f32, span: f32, speed: f32) -> Vec3 {
    let travel = (speed * t).rem_euclid(2.0 * span);
    Vec3::new(
        -span + travel,
        SWEEP_SWAY_AMPLITUDE * (SWEEP_SWAY_FREQUENCY * t).sin(),
        0.0,
    )
}

pub fn light_pulse_intensity(base: f32, pulse: &LightPulse, t: f32) -> f32 {
    base + pulse.amplitude * (pulse.frequency * t + pulse.phase).sin()
}

pub fn light_orbit_position(orbit: &LightOrbit, t: f32) -> Vec3 {
    let angle = orbit.speed * t + orbit.phase;
    Vec3::new(orbit.radius * angle.cos(), orbit.height, orbit.radius * angle.sin())
}

// ---------- Update steps ----------

/// Step 1: clip mixer. Skipped when the loaded model carried no animations.
fn advance_mixer(stage: &mut Stage, delta: f32) {
    let (clips, time) = {
        let mut car_clips = stage.world.resource_mut::<CarClips>();
        if car_clips.clips.is_empty() {
            return;
        }
        car_clips.time += delta;
        (std::mem::take(&mut car_clips.clips), car_clips.time)
    };
    let mut parts = stage.world.query::<(&CarPart, &mut Transform3D)>();
    for (part, mut transform) in parts.iter_mut(&mut stage.world) {
        for clip in &clips {
            let Some(track) = clip.track_for(&part.name) else { continue };
            let local_time = if clip.duration > 0.0 { time.rem_euclid(clip.duration) } else { 0.0 };
            if let Some(translation) = track.sample_translation(local_time) {
                transform.translation = translation;
            }
            if let Some(rotation) = track.sample_rotation(local_time) {
                transform.rotation = rotation;
            }
            if let Some(scale) = track.sample_scale(local_time) {
                transform.scale = scale;
            }
        }
    }
    stage.world.resource_mut::<CarClips>().clips = clips;
}

/// Step 3: driving pose or idle float. The two branches are mutually
/// exclusive; the idle bob must never stack onto the driving path.
fn update_car(stage: &mut Stage, clock: FrameClock) {
    let Some(root) = stage.car_root() else {
        return;
    };
    let state = stage.world.resource::<AnimationState>().clone();
    let drive = *stage.world.resource::<DriveSettings>();
    let idle = *stage.world.resource::<IdleMotion>();
    let Some(mut transform) = stage.world.get_mut::<Transform3D>(root) else {
        return;
    };
    if state.driving {
        let t = clock.elapsed - state.drive_entered_at.unwrap_or(clock.elapsed);
        match drive.variant {
            DriveVariant::FigureEight => {
                let track = figure_eight_position(t, drive.radius, drive.speed);
                transform.translation = Vec3::new(track.x, idle.baseline, track.z);
                let heading = figure_eight_heading(t, drive.radius, drive.speed);
                let roll = figure_eight_roll(t, drive.speed);
                transform.rotation = Quat::from_rotation_y(heading) * Quat::from_rotation_z(roll);
            }
            DriveVariant::StraightSweep => {
                let track = straight_sweep_position(t, drive.radius, drive.speed.max(0.01) * 4.0);
                transform.translation =
                    Vec3::new(track.x, idle.baseline + track.y, transform.translation.z);
                let roll = SWEEP_ROLL_RADIANS * (SWEEP_ROLL_FREQUENCY * t).sin();
                transform.rotation =
                    Quat::from_rotation_y(std::f32::consts::FRAC_PI_2) * Quat::from_rotation_z(roll);
            }
        }
    } else {
        transform.translation.y =
            idle_bob_height(clock.elapsed, idle.baseline, idle.amplitude, idle.frequency);
        if !state.auto_rotate {
            let yaw = Quat::from_rotation_y(idle.yaw_rate * clock.delta);
            transform.rotation = yaw * transform.rotation;
        }
    }
}

/// Step 4: pulse and orbit the light rig. Skipped wholesale while the
/// `lights` toggle is off.
fn update_lights(stage: &mut Stage, t: f32) {
    if !stage.world.resource::<AnimationState>().lights_on {
        return;
    }
    let mut lights = stage.world.query::<(&mut Light, &mut Transform3D)>();
    for (mut light, mut transform) in lights.iter_mut(&mut stage.world) {
        if let Some(pulse) = light.pulse {
            light.intensity = light_pulse_intensity(light.base_intensity, &pulse, t).max(0.0);
        }
        if let Some(orbit) = light.orbit {
            transform.translation = light_orbit_position(&orbit, t);
        }
    }
}

/// Step 5: particle drift, edge bounce, slow field yaw, shader time.
fn update_particles(stage: &mut Stage, clock: FrameClock) {
    let Some(mut field) = stage.world.get_resource_mut::<ParticleField>() else {
        return;
    };
    let field = &mut *field;
    for particle in &mut field.particles {
        particle.position += particle.velocity * clock.delta;
        for axis in 0..3 {
            let limit = field.half_extent[axis];
            if particle.position[axis] < -limit {
                particle.position[axis] = -limit;
                particle.velocity[axis] = particle.velocity[axis].abs();
            } else if particle.position[axis] > limit {
                particle.position[axis] = limit;
                particle.velocity[axis] = -particle.velocity[axis].abs();
            }
        }
    }
    field.rotation = crate::wrap_angle(field.rotation + field.rotation_rate * clock.delta);
    field.time = clock.elapsed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::fallback::build_fallback_car;
    use crate::loader::CarSource;
    use crate::material_registry::MaterialRegistry;

    #[test]
    fn path_functions_are_pure_in_time() {
        for &t in &[0.0f32, 0.37, 2.0, 17.5] {
            assert_eq!(figure_eight_position(t, 6.0, 0.6), figure_eight_position(t, 6.0, 0.6));
            assert_eq!(figure_eight_heading(t, 6.0, 0.6), figure_eight_heading(t, 6.0, 0.6));
            assert_eq!(idle_bob_height(t, -1.0, 0.12, 1.0), idle_bob_height(t, -1.0, 0.12, 1.0));
            assert_eq!(straight_sweep_position(t, 6.0, 2.0), straight_sweep_position(t, 6.0, 2.0));
        }
    }

    #[test]
    fn figure_eight_heading_at_zero_matches_the_stated_formula() {
        let radius = 6.0f32;
        let speed = 0.6f32;
        let expected = (radius * speed * 0.5).atan2(0.0) + std::f32::consts::PI;
        let heading = figure_eight_heading(0.0, radius, speed);
        assert!((heading - expected).abs() < 1e-6, "heading {heading} != expected {expected}");
    }

    #[test]
    fn figure_eight_track_stays_on_the_curve() {
        let (radius, speed) = (6.0, 0.6);
        for step in 0..200 {
            let t = step as f32 * 0.05;
            let pos = figure_eight_position(t, radius, speed);
            let u = speed * t;
            assert!((pos.x - radius * u.sin()).abs() < 1e-5);
            assert!((pos.z - radius * u.sin() * u.cos()).abs() < 1e-5);
        }
    }

    #[test]
    fn idle_bob_never_runs_while_driving() {
        let mut stage = Stage::new(&AppConfig::default());
        let mut materials = MaterialRegistry::new();
        stage.spawn_car(CarSource::Fallback(build_fallback_car()), 1.0, &mut materials);
        stage.toggle_driving(0.0);

        advance(&mut stage, FrameClock::at(1.3, 1.0 / 60.0));
        let root = stage.car_root().expect("car root");
        let driven = stage.world.get::<Transform3D>(root).expect("transform").translation;
        let expected = figure_eight_position(1.3, 6.0, 0.6);
        assert!((driven.x - expected.x).abs() < 1e-5);
        assert!((driven.z - expected.z).abs() < 1e-5);
        let bob = idle_bob_height(1.3, -1.0, 0.12, 1.0);
        assert!((driven.y - bob).abs() > 1e-4, "driving height must come from the path, not the bob");
    }

    #[test]
    fn light_pulses_use_distinct_frequencies() {
        let mut stage = Stage::new(&AppConfig::default());
        let mut frequencies: Vec<f32> = {
            let mut query = stage.world.query::<&Light>();
            query.iter(&stage.world).filter_map(|light| light.pulse.map(|p| p.frequency)).collect()
        };
        frequencies.sort_by(f32::total_cmp);
        frequencies.dedup();
        assert!(frequencies.len() >= 3, "pulsing lights must not share a frequency");
    }

    #[test]
    fn disabled_lights_skip_the_pulse_step() {
        let mut stage = Stage::new(&AppConfig::default());
        stage.toggle_lights();
        advance(&mut stage, FrameClock::at(2.0, 1.0 / 60.0));
        let mut query = stage.world.query::<&Light>();
        for light in query.iter(&stage.world).filter(|light| light.switchable) {
            assert_eq!(light.intensity, 0.0, "{} must stay dark while toggled off", light.name);
        }
    }

    #[test]
    fn particles_bounce_inside_the_field() {
        let mut stage = Stage::new(&AppConfig::default());
        for _ in 0..600 {
            advance(&mut stage, FrameClock::at(0.0, 0.1));
        }
        let field = stage.world.resource::<ParticleField>();
        for particle in &field.particles {
            for axis in 0..3 {
                assert!(particle.position[axis].abs() <= field.half_extent[axis] + 1e-4);
            }
        }
    }

    #[test]
    fn missing_car_short_circuits_only_its_own_step() {
        let mut stage = Stage::new(&AppConfig::default());
        advance(&mut stage, FrameClock::at(1.0, 1.0 / 60.0));
        let field = stage.world.resource::<ParticleField>();
        assert!(field.time > 0.0, "particle step must still run without a car");
    }
}
