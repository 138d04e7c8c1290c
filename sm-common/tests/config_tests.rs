//! Tests for configuration resolution and graceful degradation
//!
//! Tests that manipulate SM_CONFIG are marked with #[serial] so they run
//! sequentially, not in parallel.

use serial_test::serial;
use sm_common::config::{load_or_default, load_toml_config, ConfigResolver, CONFIG_ENV_VAR};
use std::env;
use std::io::Write;
use std::path::PathBuf;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_cli_argument_takes_precedence_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/sm-from-env.toml");

    let resolver = ConfigResolver::new(Some(PathBuf::from("/tmp/sm-from-cli.toml")));
    assert_eq!(resolver.resolve(), Some(PathBuf::from("/tmp/sm-from-cli.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/sm-from-env.toml");

    let resolver = ConfigResolver::new(None);
    assert_eq!(resolver.resolve(), Some(PathBuf::from("/tmp/sm-from-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    env::set_var(CONFIG_ENV_VAR, "/nonexistent/streetmatch/config.toml");

    let config = ConfigResolver::new(None).load();
    assert_eq!(config.port, 5780);
    assert_eq!(config.game.max_batch_size, 12);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_load_full_config_file() {
    let file = write_config(
        r#"
        port = 7001
        bind = "0.0.0.0"

        [images]
        dir = "/srv/streets"
        base_path = "/images/"
        entries = ["a.jpg", "b.jpg"]

        [similarity]
        path = "/srv/similarity.js"

        [game]
        default_batch_size = 6
        max_batch_size = 10
        session_ttl_secs = 600

        [logging]
        level = "debug"
        "#,
    );

    let config = load_toml_config(file.path()).unwrap();
    assert_eq!(config.port, 7001);
    assert_eq!(config.bind, "0.0.0.0");
    assert_eq!(config.images.dir, PathBuf::from("/srv/streets"));
    assert_eq!(config.images.base_path, "/images/");
    assert_eq!(
        config.images.entries,
        Some(vec!["a.jpg".to_string(), "b.jpg".to_string()])
    );
    assert_eq!(config.similarity.path, PathBuf::from("/srv/similarity.js"));
    assert_eq!(config.game.default_batch_size, 6);
    assert_eq!(config.game.max_batch_size, 10);
    assert_eq!(config.game.session_ttl_secs, 600);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_config_degrades_to_defaults() {
    let file = write_config("port = \"not a number\"");

    assert!(load_toml_config(file.path()).is_err());

    let config = load_or_default(file.path());
    assert_eq!(config.port, 5780);
}
