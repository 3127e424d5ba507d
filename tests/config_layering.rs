use showroom::cli::CliOverrides;
use showroom::config::AppConfig;
use std::fs;
use std::io::Write;

#[test]
fn cli_flags_layer_over_the_config_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("app.json");
    let mut file = fs::File::create(&path).expect("create config");
    write!(
        file,
        "{}",
        r#"{"window":{"title":"Showroom","width":1024,"height":576,"vsync":true,"fullscreen":false},
            "model":{"path":"from_config.glb","timeout_seconds":3.5}}"#
    )
    .expect("write config");

    let mut config = AppConfig::load(&path).expect("load config");
    assert_eq!(config.window.width, 1024);
    assert_eq!(config.model.path, "from_config.glb");
    assert_eq!(config.model.timeout_seconds, 3.5);

    let overrides = CliOverrides::parse(["showroom", "--width", "1920", "--model", "from_cli.glb"])
        .expect("parse flags")
        .into_config_overrides();
    config.apply_overrides(&overrides);

    assert_eq!(config.window.width, 1920, "the flag wins");
    assert_eq!(config.window.height, 576, "untouched fields keep the file's value");
    assert_eq!(config.model.path, "from_cli.glb");
    assert_eq!(config.model.timeout_seconds, 3.5, "the deadline stays file-configured");
}

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = AppConfig::load_or_default(dir.path().join("nope.json"));
    assert_eq!(config.window.width, 1280);
    assert_eq!(config.camera.fov_degrees, 75.0);
    assert!(!config.model.force_fallback);
}

#[test]
fn fallback_flag_forces_the_procedural_car() {
    let overrides = CliOverrides::parse(["showroom", "--fallback"])
        .expect("parse flags")
        .into_config_overrides();
    let mut config = AppConfig::default();
    config.apply_overrides(&overrides);
    assert!(config.model.force_fallback);
}
