//! Configuration loading tests

use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;

use pulsewatch::config::{secret, Config};
use pulsewatch::probe::{LivenessRule, ProbeMethod};

const ENV_KEYS: [&str; 9] = [
    "PULSEWATCH_SWEEP_INTERVAL",
    "PULSEWATCH_MAX_CONCURRENT_PROBES",
    "PULSEWATCH_PROBE_TIMEOUT",
    "PULSEWATCH_PROBE_SCHEME",
    "PULSEWATCH_SQLITE_PATH",
    "PULSEWATCH_BOT_TOKEN",
    "BOT_TOKEN",
    "PULSEWATCH_LOG_LEVEL",
    "PULSEWATCH_LOG_FORMAT",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();

    let config = Config::from_env().unwrap();
    assert_eq!(config.sweep.interval_secs, 300);
    assert!(config.telegram.bot_token.is_none());
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    std::env::set_var("PULSEWATCH_SWEEP_INTERVAL", "60");
    std::env::set_var("PULSEWATCH_PROBE_SCHEME", "http");
    std::env::set_var("PULSEWATCH_SQLITE_PATH", "/tmp/watch.db");
    std::env::set_var("BOT_TOKEN", "fallback-token");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.sweep.interval_secs, 60);
    assert_eq!(config.probe.default_scheme, "http");
    assert_eq!(config.storage.sqlite_path, PathBuf::from("/tmp/watch.db"));
    assert_eq!(config.telegram.bot_token.as_deref(), Some("fallback-token"));
}

#[test]
#[serial]
fn test_from_env_rejects_garbage_numbers() {
    clear_env();
    std::env::set_var("PULSEWATCH_MAX_CONCURRENT_PROBES", "lots");

    let result = Config::from_env();
    clear_env();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("PULSEWATCH_MAX_CONCURRENT_PROBES"));
}

#[test]
#[serial]
fn test_example_config_parses() {
    clear_env();
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.example.toml");

    let config = Config::from_file(&path).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.probe.method, ProbeMethod::Get);
    assert_eq!(config.probe.rule, LivenessRule::Success);
    assert_eq!(config.seeds.len(), 1);
    assert_eq!(
        config.seeds[0].display_name.as_deref(),
        Some("Example status page")
    );
}

#[test]
#[serial]
fn test_token_from_env_when_file_has_none() {
    clear_env();
    std::env::set_var("PULSEWATCH_BOT_TOKEN", "env-token");

    let config = Config::from_toml_str("[sweep]\ninterval_secs = 30\n").unwrap();
    clear_env();

    assert_eq!(config.sweep.interval_secs, 30);
    assert_eq!(config.telegram.bot_token.as_deref(), Some("env-token"));
}

#[test]
#[serial]
fn test_encrypted_file_round_trip() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.enc");

    let plain = r#"
[telegram]
bot_token = "123:secret"

[probe.rule]
kind = "status_in"
codes = [200, 401]
"#;
    std::fs::write(&path, secret::encrypt(plain, "hunter2").unwrap()).unwrap();

    let config = Config::from_encrypted_file(&path, "hunter2").unwrap();
    assert_eq!(config.telegram.bot_token.as_deref(), Some("123:secret"));
    assert_eq!(
        config.probe.rule,
        LivenessRule::StatusIn {
            codes: vec![200, 401]
        }
    );

    assert!(Config::from_encrypted_file(&path, "wrong").is_err());
}
