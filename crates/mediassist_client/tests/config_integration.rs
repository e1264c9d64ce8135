//! Integration tests for config load/save and default resolution.

use mediassist_client::config::{self, DEFAULT_BASE_URL, DEFAULT_TOP_K};
use mediassist_client::Config;
use predicates::prelude::*;
use std::time::Duration;

#[test]
fn load_existing_yaml_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        r#"
api:
  base_url: "http://10.0.0.5:8000"
  timeout_secs: 30
endpoints:
  chat: "/api/ask"
  history: "/api/history"
  clear: "/api/clear"
query:
  top_k: 4
  use_memory: false
"#,
    )
    .unwrap();

    let cfg = config::load(&config_path).expect("load should succeed");
    assert_eq!(cfg.api.base_url.as_deref(), Some("http://10.0.0.5:8000"));
    assert_eq!(cfg.api.timeout_secs, Some(30));
    assert_eq!(cfg.endpoints.chat.as_deref(), Some("/api/ask"));
    assert_eq!(cfg.query.top_k, Some(4));

    let settings = cfg.settings();
    assert_eq!(settings.base_url, "http://10.0.0.5:8000");
    assert_eq!(settings.chat_path, "/api/ask");
    assert_eq!(settings.history_path, "/api/history");
    assert_eq!(settings.clear_path, "/api/clear");
    assert_eq!(settings.timeout, Duration::from_secs(30));
    assert_eq!(settings.query.top_k, 4);
    assert!(!settings.query.use_memory);
}

#[test]
fn missing_fields_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "query:\n  top_k: 0\n").unwrap();

    let settings = config::load(&config_path).unwrap().settings();
    assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    assert_eq!(settings.chat_path, "/chat");
    assert_eq!(settings.history_path, "/history");
    assert_eq!(settings.clear_path, "/clear");
    assert_eq!(settings.timeout, Duration::from_secs(60));
    assert_eq!(settings.query.top_k, DEFAULT_TOP_K);
    assert!(settings.query.use_memory);
}

#[test]
fn zero_timeout_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "api:\n  timeout_secs: 0\n").unwrap();

    let settings = config::load(&config_path).unwrap().settings();
    assert_eq!(settings.timeout, Duration::from_secs(60));
}

#[test]
fn load_reports_missing_and_invalid_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = config::load(&dir.path().join("nope.yaml")).unwrap_err();
    assert!(missing.is_not_found());

    let bad_path = dir.path().join("bad.yaml");
    std::fs::write(&bad_path, "api: [unclosed").unwrap();
    let bad = config::load(&bad_path).unwrap_err();
    assert!(!bad.is_not_found());
    assert!(bad.to_string().contains("bad.yaml"));
}

#[test]
fn save_creates_directory_and_file_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join("mediassist");
    let config_path = config_dir.join("config.yaml");
    assert!(!config_dir.exists(), "config dir should not exist yet");

    let mut config = Config::default();
    config.api.base_url = Some("http://127.0.0.1:9000".into());
    config.query.use_memory = Some(true);

    config::save(&config_path, &config).expect("save should succeed");
    let pred = predicates::path::exists();
    assert!(
        pred.eval(&config_path),
        "config file should exist after save"
    );
    assert!(config_dir.exists(), "config directory should be created");
}

#[test]
fn round_trip_preserves_schema() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    let yaml = r#"
api:
  base_url: "http://127.0.0.1:8000"
endpoints:
  history: "/api/history"
query:
  top_k: 8
"#;
    std::fs::write(&config_path, yaml).unwrap();

    let loaded = config::load(&config_path).expect("load should succeed");
    config::save(&config_path, &loaded).expect("save should succeed");

    let contents = std::fs::read_to_string(&config_path).unwrap();
    assert!(predicates::str::contains("base_url").eval(&contents));
    assert!(predicates::str::contains("history").eval(&contents));
    assert!(predicates::str::contains("top_k").eval(&contents));
    // Unset fields stay out of the file.
    assert!(predicates::str::contains("timeout_secs").not().eval(&contents));
    assert!(predicates::str::contains("use_memory").not().eval(&contents));

    let reloaded = config::load(&config_path).expect("reload should succeed");
    assert_eq!(reloaded.settings(), loaded.settings());
}

/// Config path resolves to `~/.mediassist/config.yaml` using the current platform's home dir.
#[test]
fn default_config_path_uses_home_directory() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().to_str().unwrap().to_string();

    let key = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    let original = std::env::var(key).ok();

    std::env::set_var(key, &home);
    let path = config::default_config_path();
    match original {
        Some(v) => std::env::set_var(key, v),
        None => std::env::remove_var(key),
    }

    let path = path.expect("should resolve a config path");
    let expected = dir.path().join(".mediassist").join("config.yaml");
    assert_eq!(path, expected);
}
