//! Coverage for the version consistency rules.

use hacktools::pluginconfig::{validate, CheckRules, Mismatch, PluginConfig, ValidationError};

fn parse(yaml: &str) -> PluginConfig {
    match PluginConfig::from_yaml(yaml) {
        Ok(config) => config,
        Err(err) => panic!("fixture should parse: {err}"),
    }
}

#[test]
fn matching_tags_are_consistent() {
    let config = parse(
        r#"
versions:
  v5.1:
    imageVersion: 311.129.20190601
    images:
      alertManager: registry.access.redhat.com/openshift3/prometheus-alertmanager:v3.11.129
      console: registry.access.redhat.com/openshift3/ose-console:v3.11.129
"#,
    );
    assert_eq!(validate(&config, &CheckRules::default()), Ok(()));
}

#[test]
fn mismatched_trusted_tag_is_reported() {
    let config = parse(
        r#"
versions:
  v5.1:
    imageVersion: "3.11.7"
    images:
      foo: registry.access.redhat.com/openshift3/foo:v3.11.9
"#,
    );
    let result = validate(&config, &CheckRules::default());
    assert_eq!(
        result,
        Err(ValidationError::Mismatch(Mismatch {
            plugin_version: "v5.1".to_owned(),
            image: "foo".to_owned(),
            image_version: "3.11.7".to_owned(),
            tag: "v3.11.9".to_owned(),
        }))
    );

    let message = match result {
        Err(err) => err.to_string(),
        Ok(()) => panic!("mismatch should fail"),
    };
    assert!(message.contains("3.11.7"));
    assert!(message.contains("v3.11.9"));
}

#[test]
fn untrusted_registry_is_exempt() {
    let config = parse(
        r#"
versions:
  v5.1:
    imageVersion: 311.129.20190601
    images:
      sync: quay.io/openshift-on-azure/sync:v3.11.1
      etcdBackup: docker.io/library/etcdbackup:v3.11.42
"#,
    );
    assert_eq!(validate(&config, &CheckRules::default()), Ok(()));
}

#[test]
fn references_without_version_tag_are_skipped() {
    let config = parse(
        r#"
versions:
  v5.1:
    imageVersion: 311.129.20190601
    images:
      node: registry.access.redhat.com/openshift3/ose-node
      router: registry.access.redhat.com/openshift3/ose-haproxy-router:latest
      azureControllers: quay.io/openshift-on-azure/azure:v5.1
"#,
    );
    assert_eq!(validate(&config, &CheckRules::default()), Ok(()));
}

#[test]
fn image_version_without_dot_is_fatal() {
    let config = parse(
        r#"
versions:
  v5.1:
    imageVersion: "311"
    images: {}
"#,
    );
    assert_eq!(
        validate(&config, &CheckRules::default()),
        Err(ValidationError::MalformedImageVersion {
            plugin_version: "v5.1".to_owned(),
            image_version: "311".to_owned(),
        })
    );
}

#[test]
fn missing_image_version_is_fatal() {
    let config = parse(
        r#"
versions:
  v5.1:
    images:
      foo: registry.access.redhat.com/openshift3/foo:v3.11.1
"#,
    );
    assert!(matches!(
        validate(&config, &CheckRules::default()),
        Err(ValidationError::MalformedImageVersion { .. })
    ));
}

#[test]
fn first_violation_in_key_order_wins() {
    let config = parse(
        r#"
versions:
  v6.0:
    imageVersion: 311.135.20190701
    images:
      zeta: registry.access.redhat.com/openshift3/zeta:v3.11.1
  v5.1:
    imageVersion: 311.129.20190601
    images:
      beta: registry.access.redhat.com/openshift3/beta:v3.11.2
      alpha: registry.access.redhat.com/openshift3/alpha:v3.11.3
"#,
    );
    let err = match validate(&config, &CheckRules::default()) {
        Err(ValidationError::Mismatch(mismatch)) => mismatch,
        other => panic!("expected a mismatch, got {other:?}"),
    };
    assert_eq!(err.plugin_version, "v5.1");
    assert_eq!(err.image, "alpha");
    assert_eq!(err.tag, "v3.11.3");
}

#[test]
fn custom_registry_changes_which_images_are_checked() {
    let config = parse(
        r#"
versions:
  v5.1:
    imageVersion: 311.129.20190601
    images:
      redhat: registry.access.redhat.com/openshift3/foo:v3.11.1
      internal: registry.example.com/mirror/foo:v3.11.1
"#,
    );
    let rules = CheckRules::with_registry("registry.example.com/mirror").expect("registry is not blank");
    let err = match validate(&config, &rules) {
        Err(ValidationError::Mismatch(mismatch)) => mismatch,
        other => panic!("expected a mismatch, got {other:?}"),
    };
    assert_eq!(err.image, "internal");
}

#[test]
fn empty_document_is_consistent() {
    let config = parse("{}");
    assert!(config.versions.is_empty());
    assert_eq!(validate(&config, &CheckRules::default()), Ok(()));
}

#[test]
fn blank_registry_cannot_build_rules() {
    match CheckRules::with_registry(" ") {
        Err(ValidationError::EmptyTrustedRegistry) => {}
        other => panic!("expected blank registry rejection, got {other:?}"),
    }
}
