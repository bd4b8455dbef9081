//! Coverage for settings parsing, file lookup, and env overrides.

use std::fs;
use std::path::PathBuf;

use hacktools::config::{Settings, SETTINGS_PATH_ENV};
use hacktools::secrets::KeyPolicy;

#[test]
fn parse_full_settings() {
    let toml_str = r#"
[logging]
level = "debug"

[pluginconfig]
path = "pluginconfig/pluginconfig-311.yaml"
trusted_registry = "registry.example.com/openshift3"

[secrets]
input = "ci/vault-secrets.json"
output_dir = "/run/secrets"
key_policy = "flat"
private_files = false
"#;
    let settings = match Settings::from_toml(toml_str) {
        Ok(settings) => settings,
        Err(err) => panic!("full settings should parse: {err}"),
    };

    assert_eq!(settings.logging.level, "debug");
    assert_eq!(
        settings.pluginconfig.trusted_registry,
        "registry.example.com/openshift3"
    );
    assert_eq!(settings.secrets.input, PathBuf::from("ci/vault-secrets.json"));
    assert_eq!(settings.secrets.output_dir, PathBuf::from("/run/secrets"));
    assert_eq!(settings.secrets.key_policy, KeyPolicy::Flat);
    assert!(!settings.secrets.private_files);
}

#[test]
fn partial_settings_keep_section_defaults() {
    let settings = match Settings::from_toml("[secrets]\noutput_dir = \"out\"\n") {
        Ok(settings) => settings,
        Err(err) => panic!("partial settings should parse: {err}"),
    };

    assert_eq!(settings.secrets.output_dir, PathBuf::from("out"));
    assert_eq!(settings.secrets.input, PathBuf::from("vault-secrets.json"));
    assert_eq!(settings.secrets.key_policy, KeyPolicy::Nested);
    assert_eq!(settings.logging.level, "warn");
}

#[test]
fn unknown_key_policy_is_rejected() {
    assert!(Settings::from_toml("[secrets]\nkey_policy = \"deep\"\n").is_err());
}

#[test]
fn env_overrides_file_values() {
    let mut settings = match Settings::from_toml("[secrets]\noutput_dir = \"from-file\"\n") {
        Ok(settings) => settings,
        Err(err) => panic!("settings should parse: {err}"),
    };
    settings.apply_overrides(|key| match key {
        "HACKTOOLS_SECRETS_DIR" => Some("from-env".to_owned()),
        "HACKTOOLS_KEY_POLICY" => Some("flat".to_owned()),
        "HACKTOOLS_PLUGINCONFIG" => Some("other.yaml".to_owned()),
        _ => None,
    });

    assert_eq!(settings.secrets.output_dir, PathBuf::from("from-env"));
    assert_eq!(settings.secrets.key_policy, KeyPolicy::Flat);
    assert_eq!(settings.pluginconfig.path, PathBuf::from("other.yaml"));
}

#[test]
fn invalid_env_policy_is_ignored() {
    let mut settings = Settings::default();
    settings.apply_overrides(|key| (key == "HACKTOOLS_KEY_POLICY").then(|| "sideways".to_owned()));
    assert_eq!(settings.secrets.key_policy, KeyPolicy::Nested);
    assert_eq!(settings.ignored_overrides.len(), 1);
    assert!(settings.ignored_overrides[0].reason.contains("sideways"));
}

#[test]
fn valid_overrides_record_nothing_ignored() {
    let mut settings = Settings::default();
    settings.apply_overrides(|key| match key {
        "HACKTOOLS_TRUSTED_REGISTRY" => Some("quay.io/team".to_owned()),
        "HACKTOOLS_KEY_POLICY" => Some("flat".to_owned()),
        _ => None,
    });
    assert_eq!(settings.pluginconfig.trusted_registry, "quay.io/team");
    assert!(settings.ignored_overrides.is_empty());
}

#[test]
fn load_with_reads_file_named_by_env() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("custom.toml");
    fs::write(&path, "[logging]\nlevel = \"info\"\n").expect("should write settings");
    let path_str = path.display().to_string();

    let settings = Settings::load_with(None, |key| {
        (key == SETTINGS_PATH_ENV).then(|| path_str.clone())
    })
    .expect("settings should load");

    assert_eq!(settings.logging.level, "info");
}

#[test]
fn load_with_missing_default_file_uses_defaults() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let absent = dir.path().join("absent.toml").display().to_string();

    let settings = Settings::load_with(None, |key| {
        (key == SETTINGS_PATH_ENV).then(|| absent.clone())
    })
    .expect("missing file should fall back to defaults");

    assert_eq!(settings.secrets.output_dir, PathBuf::from("secrets"));
}

#[test]
fn load_with_missing_explicit_file_fails() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let absent = dir.path().join("absent.toml");
    let result = Settings::load_with(Some(absent.as_path()), |_| None);
    assert!(result.is_err());
}

#[test]
fn load_with_applies_env_after_explicit_file() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("hacktools.toml");
    fs::write(&path, "[logging]\nlevel = \"info\"\n").expect("should write settings");

    let settings = Settings::load_with(Some(path.as_path()), |key| {
        (key == "HACKTOOLS_LOG_LEVEL").then(|| "trace".to_owned())
    })
    .expect("settings should load");

    assert_eq!(settings.logging.level, "trace");
}
