use crate::animate;
use crate::camera3d::OrbitRig;
use crate::config::{AppConfig, AppConfigOverrides};
use crate::environment::Environment;
use crate::fallback::build_fallback_car;
use crate::input::{CarControl, Input, InputEvent};
use crate::loader::{CarLoader, CarSource};
use crate::material_registry::MaterialRegistry;
use crate::renderer::{FrameDraws, MeshDraw, ParticleInstance, ParticleUniforms, Renderer};
#[cfg(feature = "overlay")]
use crate::scene::AnimationState;
use crate::scene::{MeshLibrary, ParticleField, Stage};
use crate::time::{FrameClock, Time};
#[cfg(feature = "overlay")]
use crate::overlay::Overlay;

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};

const CAMERA_START: Vec3 = Vec3::new(5.0, 3.0, 5.0);
const CAMERA_NEAR: f32 = 0.1;
const CAMERA_FAR: f32 = 1000.0;
const ORBIT_DRAG_SENSITIVITY: f32 = 0.005;
const PARTICLE_WORLD_SIZE: f32 = 0.08;

pub fn run() -> Result<()> {
    run_with_overrides(AppConfigOverrides::default())
}

pub fn run_with_overrides(overrides: AppConfigOverrides) -> Result<()> {
    let mut config = AppConfig::load_or_default("config/app.json");
    config.apply_overrides(&overrides);
    let event_loop = EventLoop::new().context("Failed to create winit event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("Event loop execution failed")?;
    Ok(())
}

pub struct App {
    config: AppConfig,
    renderer: Renderer,
    stage: Stage,
    time: Time,
    input: Input,
    materials: MaterialRegistry,
    environment: Environment,
    orbit: OrbitRig,
    loader: Option<CarLoader>,
    should_close: bool,
    #[cfg(feature = "overlay")]
    overlay: Overlay,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let mut renderer = Renderer::new(&config.window);
        renderer.set_clear_color(Vec3::from_array(config.stage.background));
        let mut stage = Stage::new(&config);
        let mut materials = MaterialRegistry::new();
        materials.insert(Stage::ground_material_definition());
        let environment =
            Environment::new(config.reflection.interval_seconds, config.stage.backdrop.as_deref());

        let mut orbit = OrbitRig::framing(
            CAMERA_START,
            Vec3::ZERO,
            config.camera.min_distance,
            config.camera.max_distance,
        );
        orbit.damping = config.camera.damping;
        orbit.auto_rotate_speed = config.camera.auto_rotate_speed;

        // The load race starts now; the frame loop resolves it.
        let loader = if config.model.force_fallback {
            stage.spawn_car(
                CarSource::Fallback(build_fallback_car()),
                config.model.scale,
                &mut materials,
            );
            None
        } else {
            Some(CarLoader::spawn(
                config.model.path.clone(),
                Duration::from_secs_f32(config.model.timeout_seconds.max(0.0)),
            ))
        };

        Self {
            config,
            renderer,
            stage,
            time: Time::new(),
            input: Input::from_config("config/input.json"),
            materials,
            environment,
            orbit,
            loader,
            should_close: false,
            #[cfg(feature = "overlay")]
            overlay: Overlay::new(),
        }
    }

    fn apply_control(&mut self, control: CarControl, elapsed: f32) {
        if !self.stage.has_car() {
            return;
        }
        match control {
            CarControl::ToggleRotate => {
                let preference = self.stage.toggle_auto_rotate();
                self.orbit.auto_rotate = preference;
            }
            CarControl::ToggleLights => {
                self.stage.toggle_lights();
            }
            CarControl::ToggleDriving => {
                self.stage.toggle_driving(elapsed);
            }
        }
    }

    fn render_frame(&mut self, _clock: FrameClock) -> Result<()> {
        let environment_gpu = self.environment.ensure_gpu(&self.renderer)?;
        let infos = self.stage.collect_mesh_draws();
        let lights = self.stage.collect_lights();

        let mut draws: Vec<MeshDraw> = Vec::with_capacity(infos.len());
        {
            let library = self.stage.world.resource::<MeshLibrary>();
            for info in infos {
                let Some(mesh) = library.get(&info.mesh_key) else {
                    continue;
                };
                let mesh_gpu = match self.renderer.ensure_mesh(&info.mesh_key, mesh) {
                    Ok(gpu) => gpu,
                    Err(err) => {
                        eprintln!("[renderer] mesh '{}' unavailable: {err:?}", info.mesh_key);
                        continue;
                    }
                };
                let material_key = if self.materials.has(&info.material_key) {
                    info.material_key
                } else {
                    self.materials.default_key().to_string()
                };
                let material_gpu = match self.materials.prepare_gpu(&material_key, &mut self.renderer)
                {
                    Ok(gpu) => gpu,
                    Err(err) => {
                        eprintln!("[material] '{material_key}' unavailable: {err:?}");
                        continue;
                    }
                };
                draws.push(MeshDraw { mesh: mesh_gpu, material: material_gpu, model: info.model });
            }
        }

        let camera = self.orbit.to_camera(
            self.config.camera.fov_degrees.to_radians(),
            CAMERA_NEAR,
            CAMERA_FAR,
        );
        let view = camera.view_matrix();
        let camera_right = Vec3::new(view.x_axis.x, view.y_axis.x, view.z_axis.x);
        let camera_up = Vec3::new(view.x_axis.y, view.y_axis.y, view.z_axis.y);

        let field = self.stage.world.resource::<ParticleField>();
        let instances: Vec<ParticleInstance> = field
            .particles
            .iter()
            .map(|particle| ParticleInstance {
                position: particle.position.to_array(),
                size: particle.size,
                color: [field.color.x, field.color.y, field.color.z, particle.opacity],
            })
            .collect();
        let particle_uniforms = ParticleUniforms {
            view_proj: camera.view_projection(self.renderer.size()).to_cols_array_2d(),
            camera_right: camera_right.extend(0.0).to_array(),
            camera_up: camera_up.extend(0.0).to_array(),
            params: [field.time, field.rotation, PARTICLE_WORLD_SIZE, 0.0],
        };

        let frame = self.renderer.render_frame(FrameDraws {
            camera: &camera,
            lights: &lights,
            environment: &environment_gpu,
            draws,
            particles: Some((&instances, particle_uniforms)),
            fog_color: Vec3::from_array(self.config.stage.background),
            fog_near: self.config.stage.fog_near,
            fog_far: self.config.stage.fog_far,
        })?;

        #[cfg(feature = "overlay")]
        {
            let progress = self
                .loader
                .as_ref()
                .and_then(|loader| loader.progress_text())
                .map(str::to_string);
            let animation = self.stage.world.resource::<AnimationState>().clone();
            match self.overlay.draw(&self.renderer, &frame, progress.as_deref(), &animation) {
                Ok(controls) => {
                    for control in controls {
                        self.input.queue_control(control);
                    }
                }
                Err(err) => eprintln!("[overlay] draw failed: {err:?}"),
            }
        }
        frame.present();
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.renderer.ensure_window(event_loop) {
            eprintln!("Renderer initialization error: {err:?}");
            self.should_close = true;
            return;
        }
        #[cfg(feature = "overlay")]
        if let Some(window) = self.renderer.window() {
            if let Err(err) = self.overlay.ensure(window, &self.renderer) {
                eprintln!("[overlay] initialization failed: {err:?}");
            }
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let mut consumed = false;
        #[cfg(feature = "overlay")]
        if let Some(window) = self.renderer.window() {
            if window_id == window.id() {
                consumed = self.overlay.on_window_event(window, &event);
            }
        }
        #[cfg(not(feature = "overlay"))]
        let _ = window_id;

        let input_event = InputEvent::from_window_event(&event);
        let always_forward = matches!(
            input_event,
            InputEvent::CursorPos { .. } | InputEvent::PointerEntered | InputEvent::PointerLeft
        );
        if !consumed || always_forward {
            self.input.push(input_event);
        }
        if consumed {
            return;
        }

        match &event {
            WindowEvent::CloseRequested => self.should_close = true,
            WindowEvent::Resized(size) => self.renderer.resize(*size),
            WindowEvent::KeyboardInput { event: KeyEvent { logical_key, state, .. }, .. } => {
                if let Key::Named(NamedKey::Escape) = logical_key {
                    if *state == ElementState::Pressed {
                        self.should_close = true;
                    }
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        self.input.push(InputEvent::from_device_event(&event));
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_close {
            event_loop.exit();
            return;
        }
        let clock = self.time.tick();

        // Resolve (or keep draining) the load race.
        if let Some(loader) = self.loader.as_mut() {
            if let Some(outcome) = loader.poll(Instant::now()) {
                self.stage.spawn_car(outcome, self.config.model.scale, &mut self.materials);
            }
        }

        // Interaction dispatcher: hover override, discrete controls, drag/zoom.
        if let Some(hovered) = self.input.take_hover_change() {
            self.orbit.set_hovered(hovered);
        }
        for control in self.input.take_controls() {
            self.apply_control(control, clock.elapsed);
        }
        if self.input.left_held() {
            let (dx, dy) = self.input.mouse_delta;
            if dx.abs() > f32::EPSILON || dy.abs() > f32::EPSILON {
                self.orbit.orbit(Vec2::new(dx, dy) * ORBIT_DRAG_SENSITIVITY);
            }
        }
        if let Some(wheel) = self.input.consume_wheel_delta() {
            self.orbit.zoom(1.0 - wheel * 0.1);
        }

        self.orbit.update(clock.delta);
        animate::advance(&mut self.stage, clock);

        // Reflection capture, throttled on its own interval.
        if self.environment.probe.refresh_due(clock.elapsed) {
            let center = self.stage.car_position().unwrap_or(Vec3::ZERO);
            self.environment.refresh(clock.elapsed, center);
        }

        if let Err(err) = self.render_frame(clock) {
            eprintln!("Render error: {err:?}");
        }
        if let Some(window) = self.renderer.window() {
            window.request_redraw();
        }
        self.input.clear_frame();
    }
}
