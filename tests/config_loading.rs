use std::io::Write;

use media_veil::{load_config, load_config_with_options, EngineConfig, EngineError, LoadOptions};
use pretty_assertions::assert_eq;
use serial_test::serial;

fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn defaults_without_file() {
    let config = load_config(None).unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.markers.blur_class, "nsfw-blur");
    assert_eq!(config.overlay.frame_interval_ms, 16);
    assert!(config.markers.obstruct_unresolved);
}

#[test]
#[serial]
fn yaml_file_overrides_defaults() {
    let file = write_config(
        ".yaml",
        "markers:\n  blur_class: veil\n  media_tags: [img, video]\noverlay:\n  intent_grace_frames: 5\n",
    );
    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.markers.blur_class, "veil");
    assert_eq!(config.markers.media_tags, vec!["img", "video"]);
    assert_eq!(config.overlay.intent_grace_frames, 5);
    assert_eq!(config.markers.preblur_class, "nsfw-mmv-preblur");
    assert_eq!(config.resolver, EngineConfig::default().resolver);
}

#[test]
#[serial]
fn json_file_is_accepted() {
    let file = write_config(".json", r#"{"resolver": {"asset_roots": ["media"]}}"#);
    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.resolver.asset_roots, vec!["media"]);
}

#[test]
#[serial]
fn environment_wins_over_file() {
    let file = write_config(".yaml", "overlay:\n  intent_grace_frames: 5\n");
    std::env::set_var("MEDIA_VEIL__OVERLAY__INTENT_GRACE_FRAMES", "9");
    std::env::set_var("MEDIA_VEIL__MARKERS__OBSTRUCT_UNRESOLVED", "false");
    let loaded = load_config(Some(file.path()));
    std::env::remove_var("MEDIA_VEIL__OVERLAY__INTENT_GRACE_FRAMES");
    std::env::remove_var("MEDIA_VEIL__MARKERS__OBSTRUCT_UNRESOLVED");

    let config = loaded.unwrap();
    assert_eq!(config.overlay.intent_grace_frames, 9);
    assert!(!config.markers.obstruct_unresolved);
}

#[test]
#[serial]
fn environment_is_optional() {
    std::env::set_var("MEDIA_VEIL__OVERLAY__ROOT_CLASS", "viewer");
    let options = LoadOptions::default();
    let loaded = load_config_with_options(&options);
    std::env::remove_var("MEDIA_VEIL__OVERLAY__ROOT_CLASS");
    assert_eq!(loaded.unwrap().overlay.root_class, "mw-mmv-wrapper");
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let options = LoadOptions::with_path(dir.path().join("absent.yaml"));
    assert_eq!(load_config_with_options(&options).unwrap(), EngineConfig::default());
}

#[test]
#[serial]
fn mistyped_values_are_rejected() {
    let file = write_config(".yaml", "overlay:\n  intent_grace_frames: soon\n");
    assert!(matches!(
        load_config(Some(file.path())),
        Err(EngineError::Config(_))
    ));
}
