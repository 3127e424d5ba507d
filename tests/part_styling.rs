use glam::{Mat4, Quat, Vec3};
use showroom::material_registry::{apply_showroom_styling, style_for_part, PartStyle};
use showroom::mesh::{ImportedMaterial, ImportedPart, Mesh, VehicleImport};

fn part(name: &str, material: Option<&str>) -> ImportedPart {
    ImportedPart {
        name: name.to_string(),
        mesh: Mesh::cuboid(Vec3::ONE),
        parent: Mat4::IDENTITY,
        rest_translation: Vec3::ZERO,
        rest_rotation: Quat::IDENTITY,
        rest_scale: Vec3::ONE,
        material: material.map(str::to_string),
    }
}

fn import_with(parts: Vec<ImportedPart>, materials: Vec<ImportedMaterial>) -> VehicleImport {
    VehicleImport { parts, materials, textures: Vec::new(), clips: Vec::new() }
}

fn material_for<'a>(import: &'a VehicleImport, part_name: &str) -> &'a ImportedMaterial {
    let key = import
        .parts
        .iter()
        .find(|part| part.name == part_name)
        .and_then(|part| part.material.as_deref())
        .expect("styled part keeps a material key");
    import
        .materials
        .iter()
        .find(|mat| mat.key == key)
        .expect("the part's key resolves in the styled material set")
}

#[test]
fn substring_rule_classifies_part_names() {
    assert_eq!(style_for_part("CarBody_low"), PartStyle::Body);
    assert_eq!(style_for_part("rear_CHASSIS"), PartStyle::Body);
    assert_eq!(style_for_part("Wheel_FL"), PartStyle::Wheel);
    assert_eq!(style_for_part("rim_03"), PartStyle::Wheel);
    assert_eq!(style_for_part("windshield"), PartStyle::Glass);
    assert_eq!(style_for_part("door_window_r"), PartStyle::Glass);
    assert_eq!(style_for_part("mirror_arm"), PartStyle::Trim);
}

#[test]
fn styling_swaps_in_the_showroom_palette() {
    let mut import = import_with(
        vec![part("CarBody", None), part("wheel_front_left", None), part("Windshield", None)],
        Vec::new(),
    );
    apply_showroom_styling(&mut import);

    let body = material_for(&import, "CarBody");
    assert!(body.metallic_factor > 0.5, "the body turns metallic copper");
    assert!(body.emissive_factor.iter().any(|&c| c > 0.0), "the body glows");

    let wheel = material_for(&import, "wheel_front_left");
    assert!(wheel.base_color_factor[..3].iter().all(|&c| c < 0.2), "wheels go dark");
    assert!(wheel.metallic_factor >= 0.9);

    let glass = material_for(&import, "Windshield");
    assert!(glass.base_color_factor[3] < 1.0, "glass becomes transparent");
}

#[test]
fn trim_parts_keep_their_source_material_normalized() {
    let source = ImportedMaterial {
        key: "m::paint".to_string(),
        label: "side mirror".to_string(),
        base_color_factor: [0.3, 0.6, 0.3, 1.0],
        metallic_factor: 2.5,
        roughness_factor: 0.0,
        emissive_factor: [0.0, 0.0, 0.0],
        base_color_texture: None,
    };
    let mut import = import_with(vec![part("mirror_left", Some("m::paint"))], vec![source]);
    apply_showroom_styling(&mut import);

    let mirror = material_for(&import, "mirror_left");
    assert_eq!(mirror.base_color_factor, [0.3, 0.6, 0.3, 1.0], "trim keeps its color");
    assert!(mirror.metallic_factor <= 1.0, "metallic clamps into the lighting model");
    assert!(mirror.roughness_factor >= 0.05, "roughness clamps away from zero");
}

#[test]
fn styling_is_deterministic() {
    let build = || {
        let mut import = import_with(
            vec![part("CarBody", None), part("wheel_rr", None), part("trim_piece", None)],
            Vec::new(),
        );
        apply_showroom_styling(&mut import);
        import
    };
    let a = build();
    let b = build();
    for (pa, pb) in a.parts.iter().zip(b.parts.iter()) {
        assert_eq!(pa.material, pb.material);
    }
    assert_eq!(a.materials.len(), b.materials.len());
}
