use coderun::config::{Config, ConfigError, SourceNaming};

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.languages.contains_key("python"));
    assert!(config.languages.contains_key("java"));
    assert!(config.languages.contains_key("cpp"));
    assert_eq!(config.deadline, 2.0);
    assert_eq!(config.kill_grace, 0.5);
    assert!(!config.cache_probes);
    assert_eq!(config.max_output, 65536);
    assert_eq!(config.max_concurrent_jobs, Some(4));
    assert_eq!(
        config.work_root(),
        std::path::PathBuf::from("/var/tmp/coderun-fixture")
    );

    let python = &config.languages["python"];
    assert_eq!(python.run.env["PYTHONIOENCODING"], "utf-8");
    assert_eq!(python.toolchain[0].probe, vec!["python3", "--version"]);

    let java = &config.languages["java"];
    assert_eq!(
        java.naming,
        SourceNaming::PublicType {
            fallback: "Main".to_owned()
        }
    );
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.languages.contains_key("test"));
    assert_eq!(config.deadline, 10.0);
    assert!(config.cache_probes);
    assert_eq!(config.languages["test"].naming, SourceNaming::default());
}

#[test]
fn test_load_invalid_configs() {
    for name in [
        "invalid_empty_name",
        "invalid_empty_extension",
        "invalid_empty_run_command",
        "invalid_negative_deadline",
        "invalid_public_type_without_compile",
        "invalid_output_name",
    ] {
        let path = format!("{FIXTURES_PATH}/configs/{name}.toml");
        assert!(Config::from_file(&path).is_err(), "{name} should be rejected");
    }
}

#[test]
fn test_load_missing_file() {
    let path = format!("{FIXTURES_PATH}/configs/does_not_exist.toml");
    assert!(matches!(
        Config::from_file(&path),
        Err(ConfigError::ReadFile { .. })
    ));
}

#[test]
fn test_example_config_is_valid() {
    let config = Config::parse_toml(coderun::EXAMPLE_CONFIG).expect("Example config is invalid");
    for id in ["python", "javascript", "java", "c", "cpp"] {
        assert!(config.languages.contains_key(id), "missing {id}");
    }
}
