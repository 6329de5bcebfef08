use tm_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

const YAML: &str = r#"
sync:
  enabled: true
  interval_secs: 120
storage:
  cache_path: "/var/lib/tm/cache.json"

unused_section:
  foo: 123
  bar: 456
sync_extra:
  enabled: true
"#;

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();

    assert!(!report.is_clean());
    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/sync_extra/enabled".to_string(),
            "/unused_section/bar".to_string(),
            "/unused_section/foo".to_string(),
        ],
        "sorted, and /sync does not consume /sync_extra"
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn consumed_keys_only_is_clean() {
    let yaml = r#"
sync:
  enabled: false
daemon:
  addr: "0.0.0.0:8899"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
}
