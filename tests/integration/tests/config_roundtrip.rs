//! Config save/load roundtrip integration tests.

use chatrelay_core::config::Config;
use chatrelay_core::ConfigError;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json5");

    let config = Config {
        api_key: "sk-roundtrip".into(),
        ..Default::default()
    };
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.port, config.port);
    assert_eq!(loaded.model, config.model);
    assert_eq!(loaded.interval_seconds, config.interval_seconds);
    assert_eq!(
        loaded.keepalive.ping_period_secs,
        config.keepalive.ping_period_secs
    );
    assert_eq!(loaded.api_key.expose_secret(), "sk-roundtrip");
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json5");

    let mut config = Config::default();
    config.port = 9090;
    config.model = "text-davinci-003".to_string();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.port, 9090);
    assert!(!loaded.model_spec().unwrap().uses_history());
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/config.json5"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_config_parse_invalid() {
    assert!(Config::parse("not valid json5").is_err());
}

#[test]
fn test_unknown_model_fails_validation() {
    let config = Config::parse("{ apiKey: 'k', model: 'gpt-7' }").unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::UnknownModel(model)) if model == "gpt-7"
    ));
}
