use std::{env, fs};

use confgov_server::AppConfig;
use confgov_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("confgov.toml");

    let toml_content = r#"
[logging]
level = "debug"

[cache]
refresh_interval_secs = 120
store_timeout_ms = 2000
refresh_after_write = false

[permissions]
public_group_prefix = "public."

[[seed.configurations]]
key = "site_name"
value = "Acme"
name = "Site name"
group = "site"

[[seed.configurations]]
key = "feature_flags"
value = '{"beta": true, "max_items": 25}'
name = "Feature flags"
group = "features"
description = "Toggles for beta features"

[[seed.policies]]
role = "admin"
group = "site"
operation = "write"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.cache.refresh_interval_secs, 120);
    assert!(!cfg.cache.refresh_after_write);
    assert_eq!(cfg.permissions.public_group_prefix.as_deref(), Some("public."));
    assert_eq!(cfg.seed.configurations.len(), 2);
    assert_eq!(
        cfg.seed.configurations[1].description.as_deref(),
        Some("Toggles for beta features")
    );
    assert_eq!(cfg.seed.policies[0].operation, "write");

    let refresh = cfg.cache.refresh_config();
    assert_eq!(refresh.refresh_interval.as_secs(), 120);
    assert_eq!(refresh.store_timeout.as_millis(), 2000);

    // 2) Env override should win over file
    unsafe {
        env::set_var("CONFGOV__CACHE__REFRESH_INTERVAL_SECS", "60");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.cache.refresh_interval_secs, 60);
    unsafe {
        env::remove_var("CONFGOV__CACHE__REFRESH_INTERVAL_SECS");
    }

    // 3) Invalid configs are rejected
    let invalid_path = dir.path().join("invalid.toml");
    fs::write(&invalid_path, "[cache]\nrefresh_interval_secs = 0\n").expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("refresh_interval_secs must be > 0"));

    let invalid_policy = r#"
[[seed.policies]]
role = "admin"
group = "site"
operation = "delete"
"#;
    fs::write(&invalid_path, invalid_policy).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("seed.policies[0]"));

    let invalid_seed = r#"
[[seed.configurations]]
key = "empty"
value = ""
name = "Empty"
group = "site"
"#;
    fs::write(&invalid_path, invalid_seed).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("seed.configurations[0]"));
}

#[test]
fn defaults_apply_without_a_file() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let missing = dir.path().join("absent.toml");

    let cfg = load_config(missing.to_str()).expect("defaults should validate");
    assert_eq!(cfg.logging.level, "info");
    assert_eq!(cfg.cache.store_timeout_ms, 5000);
    assert!(cfg.cache.refresh_after_write);
    assert!(cfg.permissions.public_group_prefix.is_none());

    // The defaults serialize to a file that loads back unchanged.
    let path = dir.path().join("defaults.toml");
    fs::write(&path, toml::to_string(&AppConfig::default()).expect("serialize")).expect("write");
    let reloaded = load_config(path.to_str()).expect("reload defaults");
    assert_eq!(reloaded.cache.store_timeout_ms, 5000);
    assert_eq!(reloaded.logging.level, "info");
    assert!(reloaded.seed.configurations.is_empty());
}
