use crate::fallback::{build_fallback_car, CarBlueprint};
use crate::material_registry::apply_showroom_styling;
use crate::mesh::{load_gltf_vehicle, VehicleImport};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// The single active car representation. Loaded and fallback are mutually
/// exclusive; whichever wins the race is final.
pub enum CarSource {
    Loaded(Box<VehicleImport>),
    Fallback(CarBlueprint),
}

enum WorkerMessage {
    Progress(String),
    Finished(Result<VehicleImport>),
}

/// Runs the glTF import on a worker thread and races its completion against
/// a deadline. `poll` resolves the race: the first signal to land is latched,
/// the deadline is disarmed on success, and a result arriving after the
/// fallback was chosen is drained and dropped.
pub struct CarLoader {
    rx: mpsc::Receiver<WorkerMessage>,
    deadline: Option<Instant>,
    decided: bool,
    progress: Option<String>,
}

impl CarLoader {
    pub fn spawn(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        let path = path.into();
        let (tx, rx) = mpsc::channel();
        let started = Instant::now();
        let spawn_result = thread::Builder::new().name("model-load".to_string()).spawn(move || {
            let size_note = std::fs::metadata(&path)
                .map(|meta| format!(" ({} KB)", meta.len() / 1024))
                .unwrap_or_default();
            let _ = tx.send(WorkerMessage::Progress(format!("Loading car model…{size_note}")));
            let result = load_gltf_vehicle(&path).map(|mut import| {
                apply_showroom_styling(&mut import);
                import
            });
            let _ = tx.send(WorkerMessage::Finished(result));
        });
        let deadline = match spawn_result {
            // No worker means no result will ever arrive; expire immediately.
            Err(err) => {
                eprintln!("[model] failed to spawn load worker: {err:?}");
                Some(started)
            }
            Ok(_) => Some(started + timeout),
        };
        Self { rx, deadline, decided: false, progress: Some("Loading car model…".to_string()) }
    }

    /// Resolves the race. Returns an outcome exactly once; afterwards every
    /// call drains and discards whatever the worker still sends.
    pub fn poll(&mut self, now: Instant) -> Option<CarSource> {
        while let Ok(message) = self.rx.try_recv() {
            match message {
                WorkerMessage::Progress(text) => {
                    if !self.decided {
                        self.progress = Some(text);
                    }
                }
                WorkerMessage::Finished(result) => {
                    if self.decided {
                        // The fallback already won; suppress the late result.
                        continue;
                    }
                    self.decided = true;
                    self.deadline = None;
                    self.progress = None;
                    return Some(match result {
                        Ok(import) => CarSource::Loaded(Box::new(import)),
                        Err(err) => {
                            eprintln!("[model] load failed: {err:?}");
                            CarSource::Fallback(build_fallback_car())
                        }
                    });
                }
            }
        }
        if !self.decided {
            if let Some(deadline) = self.deadline {
                if now >= deadline {
                    self.decided = true;
                    self.deadline = None;
                    self.progress = None;
                    eprintln!("[model] load deadline passed; using procedural fallback");
                    return Some(CarSource::Fallback(build_fallback_car()));
                }
            }
        }
        None
    }

    /// Indicator text; `None` once the outcome is known (indicator hidden in
    /// both outcomes).
    pub fn progress_text(&self) -> Option<&str> {
        if self.decided {
            None
        } else {
            self.progress.as_deref()
        }
    }

    pub fn is_decided(&self) -> bool {
        self.decided
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Quat, Vec3};

    fn empty_import() -> VehicleImport {
        VehicleImport { parts: Vec::new(), materials: Vec::new(), textures: Vec::new(), clips: Vec::new() }
    }

    fn loader_with(rx: mpsc::Receiver<WorkerMessage>, deadline: Option<Instant>) -> CarLoader {
        CarLoader { rx, deadline, decided: false, progress: Some("Loading car model…".to_string()) }
    }

    #[test]
    fn immediate_error_falls_back() {
        let mut loader =
            CarLoader::spawn("does/not/exist.glb", Duration::from_secs(30));
        let started = Instant::now();
        let outcome = loop {
            if let Some(outcome) = loader.poll(Instant::now()) {
                break outcome;
            }
            assert!(started.elapsed() < Duration::from_secs(10), "loader never resolved");
            thread::sleep(Duration::from_millis(5));
        };
        match outcome {
            CarSource::Fallback(car) => assert!(!car.parts.is_empty()),
            CarSource::Loaded(_) => panic!("nonexistent model must not load"),
        }
        assert!(loader.is_decided());
        assert!(loader.progress_text().is_none(), "indicator hides after the outcome");
    }

    #[test]
    fn success_disarms_the_deadline() {
        let (tx, rx) = mpsc::channel();
        let now = Instant::now();
        let mut loader = loader_with(rx, Some(now + Duration::from_secs(4)));
        tx.send(WorkerMessage::Finished(Ok(empty_import()))).expect("send result");
        match loader.poll(now) {
            Some(CarSource::Loaded(_)) => {}
            _ => panic!("success should win while the deadline is pending"),
        }
        assert!(loader.deadline.is_none(), "deadline must be cancelled, not merely ignored");
        assert!(loader.poll(now + Duration::from_secs(60)).is_none(), "no second outcome");
    }

    #[test]
    fn late_success_after_timeout_is_suppressed() {
        let (tx, rx) = mpsc::channel();
        let now = Instant::now();
        let mut loader = loader_with(rx, Some(now));
        match loader.poll(now + Duration::from_millis(1)) {
            Some(CarSource::Fallback(car)) => assert!(!car.parts.is_empty()),
            _ => panic!("expired deadline should produce the fallback"),
        }
        let mut import = empty_import();
        import.parts.push(crate::mesh::ImportedPart {
            name: "body".to_string(),
            mesh: crate::mesh::Mesh::cuboid(Vec3::ONE),
            parent: Mat4::IDENTITY,
            rest_translation: Vec3::ZERO,
            rest_rotation: Quat::IDENTITY,
            rest_scale: Vec3::ONE,
            material: None,
        });
        tx.send(WorkerMessage::Finished(Ok(import))).expect("send late result");
        assert!(loader.poll(now + Duration::from_secs(1)).is_none(), "late success must not replace the fallback");
        assert!(loader.is_decided());
    }

    #[test]
    fn progress_is_visible_until_decided() {
        let (tx, rx) = mpsc::channel();
        let now = Instant::now();
        let mut loader = loader_with(rx, Some(now + Duration::from_secs(4)));
        tx.send(WorkerMessage::Progress("Loading car model… (812 KB)".to_string())).expect("send progress");
        assert!(loader.poll(now).is_none());
        assert_eq!(loader.progress_text(), Some("Loading car model… (812 KB)"));
    }
}
