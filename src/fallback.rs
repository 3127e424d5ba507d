use crate::material_registry::MaterialDefinition;
use crate::mesh::Mesh;
use glam::{Quat, Vec3};

/// Part classes of the procedural car. Wheels and rims come in pairs per
/// corner; everything else is a singleton or a left/right pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Body,
    Cabin,
    Spoiler,
    Wheel,
    Rim,
    Headlight,
    Exhaust,
}

#[derive(Clone)]
pub struct CarPartBlueprint {
    pub name: String,
    pub kind: PartKind,
    pub mesh: Mesh,
    pub translation: Vec3,
    pub rotation: Quat,
    pub material: MaterialDefinition,
}

#[derive(Clone)]
pub struct CarBlueprint {
    /// Offset of the whole assembly; the car sits just above the ground.
    pub root_offset: Vec3,
    pub parts: Vec<CarPartBlueprint>,
}

impl CarBlueprint {
    pub fn count(&self, kind: PartKind) -> usize {
        self.parts.iter().filter(|part| part.kind == kind).count()
    }
}

const WHEEL_CORNERS: [(f32, f32); 4] = [(-1.5, 1.2), (1.5, 1.2), (-1.5, -1.2), (1.5, -1.2)];

/// Builds the stand-in car from primitives. Pure function of no inputs;
/// always succeeds, used whenever the model load loses the race.
pub fn build_fallback_car() -> CarBlueprint {
    let mut parts = Vec::new();
    // Cylinders generate along Y; wheels spin around the car's Z axis.
    let wheel_rotation = Quat::from_rotation_x(std::f32::consts::FRAC_PI_2);

    parts.push(CarPartBlueprint {
        name: "body".to_string(),
        kind: PartKind::Body,
        mesh: Mesh::cuboid(Vec3::new(4.0, 1.0, 2.0)),
        translation: Vec3::new(0.0, 0.5, 0.0),
        rotation: Quat::IDENTITY,
        material: material(
            "fallback::body",
            "Body",
            [0.72, 0.32, 0.12, 1.0],
            0.9,
            0.25,
            [0.25, 0.08, 0.02],
        ),
    });
    parts.push(CarPartBlueprint {
        name: "cabin".to_string(),
        kind: PartKind::Cabin,
        mesh: Mesh::cuboid(Vec3::new(2.5, 0.8, 1.8)),
        translation: Vec3::new(0.0, 1.4, 0.0),
        rotation: Quat::IDENTITY,
        material: material("fallback::cabin", "Cabin", [0.55, 0.20, 0.09, 1.0], 0.7, 0.35, [0.0; 3]),
    });
    parts.push(CarPartBlueprint {
        name: "spoiler".to_string(),
        kind: PartKind::Spoiler,
        mesh: Mesh::cuboid(Vec3::new(0.5, 0.1, 2.2)),
        translation: Vec3::new(-1.9, 1.2, 0.0),
        rotation: Quat::IDENTITY,
        material: material("fallback::spoiler", "Spoiler", [0.10, 0.10, 0.11, 1.0], 0.8, 0.4, [0.0; 3]),
    });

    for (index, (x, z)) in WHEEL_CORNERS.iter().enumerate() {
        parts.push(CarPartBlueprint {
            name: format!("wheel_{index}"),
            kind: PartKind::Wheel,
            mesh: Mesh::cylinder(0.4, 0.3, 16),
            translation: Vec3::new(*x, 0.0, *z),
            rotation: wheel_rotation,
            material: material(
                "fallback::wheel",
                "Wheel",
                [0.05, 0.05, 0.06, 1.0],
                1.0,
                0.5,
                [0.0; 3],
            ),
        });
        parts.push(CarPartBlueprint {
            name: format!("rim_{index}"),
            kind: PartKind::Rim,
            mesh: Mesh::cylinder(0.22, 0.32, 12),
            translation: Vec3::new(*x, 0.0, *z),
            rotation: wheel_rotation,
            material: material("fallback::rim", "Rim", [0.62, 0.62, 0.66, 1.0], 1.0, 0.2, [0.0; 3]),
        });
    }

    for (index, z) in [0.6f32, -0.6].iter().enumerate() {
        parts.push(CarPartBlueprint {
            name: format!("headlight_{index}"),
            kind: PartKind::Headlight,
            mesh: Mesh::uv_sphere(0.12, 12, 8),
            translation: Vec3::new(2.0, 0.55, *z),
            rotation: Quat::IDENTITY,
            material: material(
                "fallback::headlight",
                "Headlight",
                [1.0, 0.95, 0.85, 1.0],
                0.0,
                0.1,
                [1.0, 0.9, 0.7],
            ),
        });
    }

    for (index, z) in [0.4f32, -0.4].iter().enumerate() {
        parts.push(CarPartBlueprint {
            name: format!("exhaust_{index}"),
            kind: PartKind::Exhaust,
            mesh: Mesh::uv_sphere(0.08, 10, 6),
            translation: Vec3::new(-2.05, 0.3, *z),
            rotation: Quat::IDENTITY,
            material: material("fallback::exhaust", "Exhaust", [0.35, 0.35, 0.38, 1.0], 1.0, 0.3, [0.0; 3]),
        });
    }

    CarBlueprint { root_offset: Vec3::new(0.0, -1.0, 0.0), parts }
}

fn material(
    key: &str,
    label: &str,
    base_color: [f32; 4],
    metallic: f32,
    roughness: f32,
    emissive: [f32; 3],
) -> MaterialDefinition {
    MaterialDefinition {
        key: key.to_string(),
        label: label.to_string(),
        base_color_factor: base_color,
        metallic_factor: metallic,
        roughness_factor: roughness,
        emissive_factor: emissive,
        transparent: false,
        base_color_texture: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_matches_contract() {
        let car = build_fallback_car();
        assert_eq!(car.count(PartKind::Wheel), 4);
        assert_eq!(car.count(PartKind::Rim), 4);
        assert_eq!(car.count(PartKind::Headlight), 2);
        assert_eq!(car.count(PartKind::Body), 1);
        assert_eq!(car.count(PartKind::Cabin), 1);
        assert_eq!(car.count(PartKind::Spoiler), 1);
    }

    #[test]
    fn builder_is_deterministic() {
        let a = build_fallback_car();
        let b = build_fallback_car();
        assert_eq!(a.parts.len(), b.parts.len());
        for (pa, pb) in a.parts.iter().zip(b.parts.iter()) {
            assert_eq!(pa.name, pb.name);
            assert!((pa.translation - pb.translation).length() < 1e-6);
            assert_eq!(pa.mesh.vertices.len(), pb.mesh.vertices.len());
        }
    }

    #[test]
    fn wheels_sit_under_the_body() {
        let car = build_fallback_car();
        for part in car.parts.iter().filter(|part| part.kind == PartKind::Wheel) {
            assert!(part.translation.y <= 0.0 + 1e-6);
            assert!(part.translation.x.abs() > 1.0, "wheels belong at the corners");
        }
    }
}
